//! `gogit checkout`: clone and move to a branch, tag or pull request.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Args;
use console::style;

use gogit::checkout::{CheckoutOptions, checkout};

#[derive(Args, Debug, Clone)]
pub struct CheckoutArgs {
    /// Repository URL (same as --url)
    pub url_arg: Option<String>,

    /// Repository URL
    #[arg(long)]
    pub url: Option<String>,

    /// Name of the remote
    #[arg(long, default_value = "origin")]
    pub remote: String,

    /// Branch to clone
    #[arg(long, default_value = "master")]
    pub branch: String,

    /// Tag to check out
    #[arg(long)]
    pub tag: Option<String>,

    /// Pull request number to check out into branch pr-<N>
    #[arg(long, default_value_t = -1, allow_hyphen_values = true)]
    pub pr: i64,

    /// Directory to clone into
    #[arg(long, default_value = ".")]
    pub target: PathBuf,

    /// File that receives the checked-out HEAD name
    #[arg(long)]
    pub version_output: Option<PathBuf>,
}

pub fn cmd_checkout(args: &CheckoutArgs) -> Result<()> {
    let url = match (&args.url, &args.url_arg) {
        (Some(flag), Some(positional)) if flag != positional => {
            bail!("conflicting repository URLs: '{}' and '{}'", flag, positional)
        }
        (Some(url), _) | (None, Some(url)) => Some(url.clone()),
        (None, None) => None,
    };

    let head = checkout(&CheckoutOptions {
        url,
        remote: args.remote.clone(),
        branch: args.branch.clone(),
        tag: args.tag.clone(),
        pr: args.pr,
        target: args.target.clone(),
        version_output: args.version_output.clone(),
        show_progress: console::Term::stderr().is_term(),
    })?;

    println!("{} {}", style("Checked out").green(), style(head).bold());
    Ok(())
}

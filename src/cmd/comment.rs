//! `gogit comment`: keep one marked comment on a pull request.

use anyhow::Result;
use clap::Args;
use console::style;

use gogit::reconcile::{CommentOutcome, DEFAULT_COMMENT_MARKER, StatusReconciler};
use gogit::scm::new_client;

use super::ProviderArgs;
use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct CommentArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Comment body
    #[arg(short, long)]
    pub message: String,

    /// Trailing marker that identifies comments from this tool
    #[arg(long, default_value = DEFAULT_COMMENT_MARKER)]
    pub identity: String,
}

pub async fn cmd_comment(cli: &Cli, args: &CommentArgs) -> Result<()> {
    if args.provider.is_skipped() {
        println!("{}", style("Skipped: no pull request").dim());
        return Ok(());
    }

    let settings = args.provider.settings(cli)?;
    let target = args.provider.target(&settings)?;

    let reconciler = StatusReconciler::new(new_client(&settings.scm)?);
    match reconciler
        .upsert_comment(&target, &args.message, &args.identity)
        .await?
    {
        CommentOutcome::Skipped => println!("{}", style("Skipped: no pull request").dim()),
        CommentOutcome::Created => {
            println!("{} on {}", style("Comment created").green(), target)
        }
        CommentOutcome::Updated { id, removed } => {
            println!("{} {} on {}", style("Comment updated").green(), id, target);
            if removed > 0 {
                println!("  removed {} duplicate comment(s)", removed);
            }
        }
    }
    Ok(())
}

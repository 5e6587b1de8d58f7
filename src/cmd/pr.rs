//! `gogit pr`: inspect a pull request and notify its participants.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::Args;
use console::style;

use gogit::credentials::parse_token_pairs;
use gogit::notify::{DingTalk, participants, render_message};
use gogit::scm::{User, new_client};

use super::ProviderArgs;
use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct PrArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Print the author of the pull request
    #[arg(long)]
    pub author: bool,

    /// Print the reviewers of the pull request
    #[arg(long)]
    pub reviewer: bool,

    /// Print the assignees of the pull request
    #[arg(long)]
    pub assignee: bool,

    /// Message sent to participants; may use {{pr.number}}, {{pr.title}}, {{pr.sha}}, {{pr.author}}
    #[arg(long, default_value = "")]
    pub msg: String,

    /// DingTalk robot tokens, format: login=token
    #[arg(long, value_delimiter = ',')]
    pub dingding_tokens: Vec<String>,

    /// Skip silently when the pull request number is not positive
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub skip_invalid_pr: bool,
}

fn print_user(user: &User) {
    println!(
        "{} {} {} {}",
        user.email.as_deref().unwrap_or(""),
        user.name.as_deref().unwrap_or(""),
        user.login,
        user.id
    );
}

pub async fn cmd_pr(cli: &Cli, args: &PrArgs) -> Result<()> {
    let tokens = parse_token_pairs(&args.dingding_tokens)?;

    if args.provider.pr <= 0 {
        if args.skip_invalid_pr {
            return Ok(());
        }
        bail!("invalid pr number {}", args.provider.pr);
    }

    let settings = args.provider.settings(cli)?;
    let target = args.provider.target(&settings)?;
    let client = new_client(&settings.scm)?;
    let pr = client
        .find_pull_request(&target.repo.path(), target.pr_number)
        .await
        .with_context(|| format!("Failed to find pull request {}", target))?;

    if args.author {
        print_user(&pr.author);
    }
    if args.reviewer {
        pr.reviewers.iter().for_each(print_user);
    }
    if args.assignee {
        pr.assignees.iter().for_each(print_user);
    }

    if tokens.is_empty() {
        return Ok(());
    }

    let message = render_message(&args.msg, &pr);
    let robot = DingTalk::new(settings.scm.timeout.max(Duration::from_secs(1)))?;
    for (login, result) in robot.notify_all(&participants(&pr), &tokens, &message).await {
        match result {
            Ok(()) => eprintln!("{} {}", style("Notified").green(), login),
            Err(e) => eprintln!("{} {}: {:#}", style("Failed to notify").red(), login, e),
        }
    }
    Ok(())
}

//! `gogit status`: post a build status to a pull request.

use anyhow::Result;
use clap::Args;
use console::style;

use gogit::reconcile::{StatusOutcome, StatusReconciler};
use gogit::scm::{DesiredStatus, new_client};
use gogit::status::normalize_status;

use super::ProviderArgs;
use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub provider: ProviderArgs,

    /// Build status, such as: pending, success, failure, error, cancelled
    #[arg(long)]
    pub status: String,

    /// Address of the build server
    #[arg(long, default_value = "https://github.com/LinuxSuRen/gogit")]
    pub target: String,

    /// Identity of the build status
    #[arg(long, default_value = "gogit")]
    pub label: String,

    /// Description of the build status
    #[arg(long, default_value = "")]
    pub description: String,
}

pub async fn cmd_status(cli: &Cli, args: &StatusArgs) -> Result<()> {
    if args.provider.is_skipped() {
        println!("{}", style("Skipped: no pull request").dim());
        return Ok(());
    }

    let state = normalize_status(&args.status)?;
    let settings = args.provider.settings(cli)?;
    let target = args.provider.target(&settings)?;
    let desired = DesiredStatus {
        label: args.label.clone(),
        state,
        description: args.description.clone(),
        target: args.target.clone(),
    };

    let reconciler = StatusReconciler::new(new_client(&settings.scm)?);
    let outcome = reconciler.reconcile_status(&target, &desired).await?;

    match outcome {
        StatusOutcome::Skipped => println!("{}", style("Skipped: no pull request").dim()),
        StatusOutcome::Unchanged => println!(
            "{} {} is already {} on {}",
            style("Unchanged:").yellow(),
            desired.label,
            desired.state,
            target
        ),
        StatusOutcome::Created => println!(
            "{} {} set to {} on {}",
            style("Status sent:").green(),
            desired.label,
            style(desired.state).bold(),
            target
        ),
    }
    Ok(())
}

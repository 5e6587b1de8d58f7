use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use gogit::logging::{self, LogFormat};

mod cmd;

#[derive(Parser)]
#[command(name = "gogit")]
#[command(version, about = "Git client across GitLab/GitHub")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Log output format: text or json
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    /// Path to a TOML config file
    #[arg(long, global = true, env = "GOGIT_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone a repository and check out a branch, tag or pull request
    #[command(visible_alias = "co")]
    Checkout(cmd::checkout::CheckoutArgs),
    /// Send a build status to a pull request
    Status(cmd::status::StatusArgs),
    /// Create or update the marked comment on a pull request
    #[command(visible_alias = "c")]
    Comment(cmd::comment::CommentArgs),
    /// Pull request related commands
    Pr(cmd::pr::PrArgs),
    /// Run the Argo Workflows executor plugin server
    Plugin(cmd::plugin::PluginArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.log_format);

    match &cli.command {
        Commands::Checkout(args) => cmd::cmd_checkout(args)?,
        Commands::Status(args) => cmd::cmd_status(&cli, args).await?,
        Commands::Comment(args) => cmd::cmd_comment(&cli, args).await?,
        Commands::Pr(args) => cmd::cmd_pr(&cli, args).await?,
        Commands::Plugin(args) => cmd::cmd_plugin(&cli, args).await?,
    }

    Ok(())
}

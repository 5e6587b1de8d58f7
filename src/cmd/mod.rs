//! CLI command implementations.
//!
//! | Module     | Commands handled |
//! |------------|------------------|
//! | `checkout` | `Checkout`       |
//! | `status`   | `Status`         |
//! | `comment`  | `Comment`        |
//! | `pr`       | `Pr`             |
//! | `plugin`   | `Plugin`         |

pub mod checkout;
pub mod comment;
pub mod plugin;
pub mod pr;
pub mod status;

pub use checkout::cmd_checkout;
pub use comment::cmd_comment;
pub use plugin::cmd_plugin;
pub use pr::cmd_pr;
pub use status::cmd_status;

use anyhow::{Result, bail};
use clap::Args;

use gogit::config::{GogitToml, ProviderFlags, ProviderSettings};
use gogit::scm::{Provider, PullRequestTarget, RepoRef, SKIP_PR_NUMBER};

use super::Cli;

/// Flags shared by every command that talks to a hosting provider.
#[derive(Args, Debug, Clone)]
pub struct ProviderArgs {
    /// Git provider: github or gitlab [default: github]
    #[arg(short, long)]
    pub provider: Option<Provider>,

    /// Server address, only needed for a self-hosted provider
    #[arg(short, long)]
    pub server: Option<String>,

    /// Owner of the repository (defaults to --username)
    #[arg(short, long)]
    pub owner: Option<String>,

    /// Name of the repository
    #[arg(short, long)]
    pub repo: Option<String>,

    /// Pull request number; -1 skips the command
    #[arg(long, default_value_t = 1, allow_hyphen_values = true)]
    pub pr: i64,

    /// Username on the git server
    #[arg(short, long)]
    pub username: Option<String>,

    /// Access token, or a file reference such as file:///var/token
    #[arg(short, long, env = "GOGIT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP timeout in seconds [default: 30]
    #[arg(long)]
    pub timeout: Option<u64>,
}

impl ProviderArgs {
    pub fn flags(&self) -> ProviderFlags {
        ProviderFlags {
            provider: self.provider,
            server: self.server.clone(),
            username: self.username.clone(),
            token: self.token.clone(),
            timeout: self.timeout,
        }
    }

    /// `--pr -1` turns the command into a no-op, whatever the other flags say.
    pub fn is_skipped(&self) -> bool {
        self.pr == SKIP_PR_NUMBER
    }

    /// Layer these flags over the config file.
    pub fn settings(&self, cli: &Cli) -> Result<ProviderSettings> {
        GogitToml::load_or_default(cli.config.as_deref())?.provider_settings(self.flags())
    }

    /// The pull request these flags point at.
    pub fn target(&self, settings: &ProviderSettings) -> Result<PullRequestTarget> {
        let repo_name = match self.repo.as_deref().filter(|r| !r.is_empty()) {
            Some(repo) => repo,
            None => bail!("--repo is required"),
        };
        let owner = match self.owner.as_deref().filter(|o| !o.is_empty()) {
            Some(owner) => owner,
            None if !settings.username.is_empty() => &settings.username,
            None => bail!("--owner or --username is required"),
        };
        let mut repo = RepoRef::new(settings.scm.provider, owner, repo_name);
        repo.server = settings.scm.server.clone();
        Ok(PullRequestTarget::new(repo, self.pr))
    }
}

//! `gogit plugin`: run the Argo Workflows executor plugin server.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;

use gogit::argo::{AppState, Executor, KubeWorkflowSource, start_server};
use gogit::config::{GogitToml, PluginFlags, ProviderFlags};
use gogit::scm::Provider;

use crate::Cli;

#[derive(Args, Debug, Clone)]
pub struct PluginArgs {
    /// Git provider: github or gitlab [default: github]
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Git server address, only needed when it's not a public service
    #[arg(long)]
    pub server: Option<String>,

    /// Username on the git server
    #[arg(long)]
    pub username: Option<String>,

    /// Personal access token, or file:///path/to/token
    #[arg(long, env = "GOGIT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// HTTP timeout for provider calls in seconds [default: 30]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Root URL of the Argo Workflows UI [default: http://argo.argo-server.svc:2746]
    #[arg(long)]
    pub target: Option<String>,

    /// Port of the HTTP server [default: 3001]
    #[arg(long)]
    pub port: Option<u16>,

    /// Kubeconfig file; in-cluster credentials are used when omitted
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Create or update a summary comment on the pull request
    #[arg(long, num_args = 0..=1, default_missing_value = "true")]
    pub create_comment: Option<bool>,

    /// Template of the summary comment
    #[arg(long)]
    pub comment_template: Option<String>,

    /// Marker used to find an existing summary comment
    #[arg(long)]
    pub comment_identity: Option<String>,

    /// Seconds between status attempts [default: 2]
    #[arg(long)]
    pub retry_interval: Option<u64>,

    /// Seconds before giving up on a status [default: 20]
    #[arg(long)]
    pub retry_timeout: Option<u64>,
}

pub async fn cmd_plugin(cli: &Cli, args: &PluginArgs) -> Result<()> {
    let config = GogitToml::load_or_default(cli.config.as_deref())?;
    let settings = config.plugin_settings(
        ProviderFlags {
            provider: args.provider,
            server: args.server.clone(),
            username: args.username.clone(),
            token: args.token.clone(),
            timeout: args.timeout,
        },
        PluginFlags {
            target: args.target.clone(),
            port: args.port,
            kubeconfig: args.kubeconfig.clone(),
            create_comment: args.create_comment,
            comment_template: args.comment_template.clone(),
            comment_identity: args.comment_identity.clone(),
            retry_interval: args.retry_interval,
            retry_timeout: args.retry_timeout,
        },
    )?;

    let workflows = KubeWorkflowSource::load(settings.kubeconfig.as_deref())?;
    tracing::info!(
        provider = %settings.options.provider,
        argo = %settings.options.target,
        create_comment = settings.options.create_comment,
        "starting executor plugin"
    );

    let state = AppState {
        executor: Arc::new(Executor::with_default_clients(settings.options)),
        workflows: Arc::new(workflows),
    };
    start_server(settings.port, state).await
}

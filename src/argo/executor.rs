//! Plugin step execution: commit status and summary comment for one workflow.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;

use super::comment::{DEFAULT_COMMENT_TEMPLATE, annotate_links, prune_nodes, render_comment};
use super::{ExecuteTemplateArgs, ExecuteTemplateReply, PluginArgs, Workflow};
use crate::credentials::resolve_token;
use crate::errors::ScmError;
use crate::reconcile::{DEFAULT_COMMENT_MARKER, StatusReconciler};
use crate::retry::{RetryPolicy, poll_immediate};
use crate::scm::{
    DesiredStatus, Provider, PullRequestTarget, RepoRef, ScmClient, ScmOptions, StatusState,
};
use crate::status::normalize_status;

pub const DEFAULT_ARGO_TARGET: &str = "http://argo.argo-server.svc:2746";

/// Builds the provider client for a request; swapped out in tests.
pub type ClientFactory =
    Arc<dyn Fn(&ScmOptions) -> Result<Arc<dyn ScmClient>, ScmError> + Send + Sync>;

/// Server-wide defaults, set from flags and the config file.
#[derive(Debug, Clone)]
pub struct PluginOptions {
    pub provider: Provider,
    pub server: Option<String>,
    pub username: String,
    pub token: String,
    pub target: String,
    pub timeout: Duration,
    pub create_comment: bool,
    pub comment_template: Option<String>,
    pub comment_identity: String,
    pub retry: RetryPolicy,
}

impl Default for PluginOptions {
    fn default() -> Self {
        Self {
            provider: Provider::GitHub,
            server: None,
            username: String::new(),
            token: String::new(),
            target: DEFAULT_ARGO_TARGET.to_string(),
            timeout: Duration::from_secs(30),
            create_comment: false,
            comment_template: None,
            comment_identity: DEFAULT_COMMENT_MARKER.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Settings for a single step after applying the step's plugin arguments.
#[derive(Debug, Clone)]
struct StepSettings {
    scm: ScmOptions,
    repo: RepoRef,
    pr: Option<i64>,
    target: String,
    status: Option<String>,
    label: Option<String>,
    description: Option<String>,
    create_comment: bool,
    comment_template: String,
    comment_identity: String,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

fn merge(defaults: &PluginOptions, args: &PluginArgs) -> Result<StepSettings, ScmError> {
    let provider = match non_empty(&args.provider) {
        Some(p) => p.parse()?,
        None => defaults.provider,
    };
    let server = non_empty(&args.server)
        .map(str::to_string)
        .or_else(|| defaults.server.clone());
    let token = resolve_token(non_empty(&args.token).unwrap_or(&defaults.token))?;
    let username = non_empty(&args.username).unwrap_or(&defaults.username);
    let owner = non_empty(&args.owner).unwrap_or(username);

    let mut repo = RepoRef::new(provider, owner, non_empty(&args.repo).unwrap_or_default());
    repo.server = server;

    let pr = match args.pr.as_deref().map(str::trim).filter(|p| !p.is_empty()) {
        None => None,
        Some(text) => Some(text.parse::<i64>().map_err(|_| {
            ScmError::InvalidInput(format!("wrong pull-request number '{}'", text))
        })?),
    };

    Ok(StepSettings {
        scm: ScmOptions::for_repo(&repo, token, defaults.timeout),
        repo,
        pr,
        target: non_empty(&args.target)
            .unwrap_or(&defaults.target)
            .trim_end_matches('/')
            .to_string(),
        status: non_empty(&args.status).map(str::to_string),
        label: non_empty(&args.label).map(str::to_string),
        description: non_empty(&args.description).map(str::to_string),
        create_comment: args.create_comment.unwrap_or(defaults.create_comment),
        comment_template: non_empty(&args.comment_template)
            .or(defaults.comment_template.as_deref().filter(|t| !t.is_empty()))
            .unwrap_or(DEFAULT_COMMENT_TEMPLATE)
            .to_string(),
        comment_identity: non_empty(&args.comment_identity)
            .unwrap_or(&defaults.comment_identity)
            .to_string(),
    })
}

/// State to report for a workflow phase when the step does not name one.
pub fn state_for_phase(phase: &str) -> Result<StatusState, ScmError> {
    if phase.trim().is_empty() {
        return Ok(StatusState::Pending);
    }
    normalize_status(phase)
}

pub struct Executor {
    defaults: PluginOptions,
    client_factory: ClientFactory,
}

impl Executor {
    pub fn new(defaults: PluginOptions, client_factory: ClientFactory) -> Self {
        Self {
            defaults,
            client_factory,
        }
    }

    /// Executor that talks to the real hosting providers.
    pub fn with_default_clients(defaults: PluginOptions) -> Self {
        Self::new(defaults, Arc::new(|opts: &ScmOptions| crate::scm::new_client(opts)))
    }

    /// Run one plugin step. Every outcome, including errors, becomes a reply envelope.
    pub async fn execute(
        &self,
        args: &ExecuteTemplateArgs,
        workflow: Workflow,
    ) -> ExecuteTemplateReply {
        match self.run(args, workflow).await {
            Ok(message) => ExecuteTemplateReply::succeeded(message),
            Err(e) => {
                tracing::error!(
                    workflow = %args.workflow.metadata.name,
                    namespace = %args.workflow.metadata.namespace,
                    error = %format!("{:#}", e),
                    "plugin step failed"
                );
                ExecuteTemplateReply::failed(format!("{:#}", e))
            }
        }
    }

    async fn run(&self, args: &ExecuteTemplateArgs, mut wf: Workflow) -> Result<String> {
        let settings = merge(&self.defaults, &args.template.plugin.gogit)?;
        let meta = &args.workflow.metadata;

        let Some(pr_number) = settings.pr else {
            tracing::info!(workflow = %meta.name, "no pull request number, skipping");
            return Ok("skipped: no pull request".to_string());
        };

        // Pruning removes the root node, so settle the run's phase first.
        wf.status.phase = wf.phase().to_string();

        let state = match &settings.status {
            Some(text) => normalize_status(text)?,
            None => state_for_phase(&wf.status.phase)?,
        };
        let label = settings
            .label
            .clone()
            .or_else(|| wf.template_ref().map(|t| t.name.clone()))
            .unwrap_or_default();
        let workflow_link = format!(
            "{}/workflows/{}/{}",
            settings.target, meta.namespace, meta.name
        );
        let desired = DesiredStatus {
            label,
            state,
            description: settings
                .description
                .clone()
                .unwrap_or_else(|| wf.status.message.clone()),
            target: workflow_link.clone(),
        };
        let pr_target = PullRequestTarget::new(settings.repo.clone(), pr_number);

        let client = (self.client_factory)(&settings.scm)?;
        let reconciler = StatusReconciler::new(client);

        tracing::info!(
            pr = %pr_target,
            label = %desired.label,
            state = %desired.state,
            "sending status"
        );
        let outcome = poll_immediate(self.defaults.retry, || {
            reconciler.reconcile_status(&pr_target, &desired)
        })
        .await
        .with_context(|| format!("failed to send the status to {}", pr_target))?;
        tracing::info!(pr = %pr_target, ?outcome, "status sent");

        if settings.create_comment {
            prune_nodes(&mut wf, Utc::now());
            annotate_links(&mut wf, &workflow_link, &settings.target);
            let body = render_comment(&wf, &settings.comment_template, &settings.target)
                .context("failed to render comment template")?;
            let outcome = reconciler
                .upsert_comment(&pr_target, &body, &settings.comment_identity)
                .await
                .with_context(|| format!("failed to create comment on {}", pr_target))?;
            tracing::info!(pr = %pr_target, ?outcome, "comment upserted");
        }

        Ok("success".to_string())
    }
}

//! Hosting-provider abstraction.
//!
//! The reconciler only ever talks to a provider through [`ScmClient`], which
//! covers exactly the seven operations it needs. `github` and `gitlab` are thin
//! REST implementations; tests use the recording fake in `fake`.

pub mod github;
pub mod gitlab;
mod http;

#[cfg(test)]
pub(crate) mod fake;
#[cfg(test)]
mod fake_api;

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::ScmError;

pub use github::GitHubClient;
pub use gitlab::GitLabClient;

/// PR number meaning "no pull request context".
pub const SKIP_PR_NUMBER: i64 = -1;

/// Comments are listed and statuses searched within a single page of this size.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    #[default]
    GitHub,
    GitLab,
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Provider::GitHub => write!(f, "github"),
            Provider::GitLab => write!(f, "gitlab"),
        }
    }
}

impl FromStr for Provider {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "github" => Ok(Provider::GitHub),
            "gitlab" => Ok(Provider::GitLab),
            other => Err(ScmError::InvalidInput(format!(
                "unknown provider '{}', valid values: github, gitlab",
                other
            ))),
        }
    }
}

/// A repository on a hosting provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub provider: Provider,
    /// Only set for private or self-hosted instances.
    pub server: Option<String>,
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(provider: Provider, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            provider,
            server: None,
            owner: owner.into(),
            repo: repo.into(),
        }
    }

    /// `owner/repo`, the path form used by every API call.
    pub fn path(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestTarget {
    pub repo: RepoRef,
    pub pr_number: i64,
}

impl PullRequestTarget {
    pub fn new(repo: RepoRef, pr_number: i64) -> Self {
        Self { repo, pr_number }
    }

    pub fn is_skipped(&self) -> bool {
        self.pr_number == SKIP_PR_NUMBER
    }
}

impl std::fmt::Display for PullRequestTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.repo.path(), self.pr_number)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusState {
    Pending,
    Success,
    Failure,
    Error,
    Cancelled,
}

impl StatusState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusState::Pending => "pending",
            StatusState::Success => "success",
            StatusState::Failure => "failure",
            StatusState::Error => "error",
            StatusState::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StatusState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One previously posted commit status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRecord {
    pub label: String,
    pub state: StatusState,
    pub description: String,
    pub target: String,
}

/// The status a caller wants posted now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredStatus {
    pub label: String,
    pub state: StatusState,
    pub description: String,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub id: u64,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullRequest {
    pub number: i64,
    /// Head commit SHA.
    pub sha: String,
    pub title: String,
    pub author: User,
    pub reviewers: Vec<User>,
    pub assignees: Vec<User>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListOptions {
    pub page: u32,
    pub size: u32,
}

impl Default for ListOptions {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// The hosting-provider operations the reconciler consumes.
/// Real implementations: `GitHubClient`, `GitLabClient`. Test double: `fake::FakeScm`.
#[async_trait]
pub trait ScmClient: Send + Sync {
    async fn find_pull_request(&self, repo: &str, number: i64) -> Result<PullRequest, ScmError>;

    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
        opts: ListOptions,
    ) -> Result<Vec<StatusRecord>, ScmError>;

    async fn create_commit_status(
        &self,
        repo: &str,
        sha: &str,
        status: &DesiredStatus,
    ) -> Result<(), ScmError>;

    async fn list_pr_comments(
        &self,
        repo: &str,
        number: i64,
        opts: ListOptions,
    ) -> Result<Vec<Comment>, ScmError>;

    async fn create_pr_comment(&self, repo: &str, number: i64, body: &str) -> Result<(), ScmError>;

    async fn edit_pr_comment(
        &self,
        repo: &str,
        number: i64,
        id: u64,
        body: &str,
    ) -> Result<(), ScmError>;

    async fn delete_pr_comment(&self, repo: &str, number: i64, id: u64) -> Result<(), ScmError>;

    /// The state a status written as `state` is read back as.
    ///
    /// Providers without a native value for every [`StatusState`] fold some
    /// states together, so comparisons against listed statuses go through this.
    fn canonical_state(&self, state: StatusState) -> StatusState {
        state
    }
}

/// Connection settings for a hosting provider.
#[derive(Debug, Clone)]
pub struct ScmOptions {
    pub provider: Provider,
    pub server: Option<String>,
    pub token: String,
    pub timeout: Duration,
}

impl Default for ScmOptions {
    fn default() -> Self {
        Self {
            provider: Provider::GitHub,
            server: None,
            token: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl ScmOptions {
    /// Connection settings for the provider and server hosting `repo`.
    pub fn for_repo(repo: &RepoRef, token: impl Into<String>, timeout: Duration) -> Self {
        Self {
            provider: repo.provider,
            server: repo.server.clone(),
            token: token.into(),
            timeout,
        }
    }
}

/// Build the client matching `opts.provider`.
pub fn new_client(opts: &ScmOptions) -> Result<Arc<dyn ScmClient>, ScmError> {
    let server = opts.server.as_deref().filter(|s| !s.trim().is_empty());
    Ok(match opts.provider {
        Provider::GitHub => Arc::new(GitHubClient::new(server, &opts.token, opts.timeout)?),
        Provider::GitLab => Arc::new(GitLabClient::new(server, &opts.token, opts.timeout)?),
    })
}

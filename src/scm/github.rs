use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};

use super::http::{RestApi, server_base};
use super::{
    Comment, DesiredStatus, ListOptions, PullRequest, ScmClient, StatusRecord, StatusState, User,
};
use crate::errors::ScmError;

const GITHUB_API_URL: &str = "https://api.github.com";

/// A GitHub user (subset of fields).
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubHead {
    sha: String,
}

/// A GitHub pull request (subset of fields).
#[derive(Debug, Deserialize)]
struct GitHubPullRequest {
    number: i64,
    title: String,
    head: GitHubHead,
    user: GitHubUser,
    #[serde(default)]
    requested_reviewers: Vec<GitHubUser>,
    #[serde(default)]
    assignees: Vec<GitHubUser>,
}

#[derive(Debug, Deserialize)]
struct GitHubStatus {
    context: String,
    state: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct GitHubStatusInput<'a> {
    state: &'static str,
    context: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    target_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitHubComment {
    id: u64,
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Serialize)]
struct CommentInput<'a> {
    body: &'a str,
}

impl From<GitHubUser> for User {
    fn from(u: GitHubUser) -> Self {
        User {
            id: u.id,
            login: u.login,
            name: u.name,
            email: u.email,
        }
    }
}

/// GitHub has no cancelled state; it is reported as an error.
fn to_github_state(state: StatusState) -> &'static str {
    match state {
        StatusState::Pending => "pending",
        StatusState::Success => "success",
        StatusState::Failure => "failure",
        StatusState::Error | StatusState::Cancelled => "error",
    }
}

fn from_github_state(state: &str) -> StatusState {
    match state {
        "pending" => StatusState::Pending,
        "success" => StatusState::Success,
        "failure" => StatusState::Failure,
        _ => StatusState::Error,
    }
}

/// What GitHub reports back after `state` was written.
pub(crate) fn canonical_github_state(state: StatusState) -> StatusState {
    from_github_state(to_github_state(state))
}

/// Base API URL; GitHub Enterprise serves the REST API under `/api/v3`.
fn api_base(server: Option<&str>) -> String {
    match server {
        None => GITHUB_API_URL.to_string(),
        Some(server) => {
            let base = server_base(server);
            if base.ends_with("/api/v3") || base == GITHUB_API_URL {
                base
            } else {
                format!("{}/api/v3", base)
            }
        }
    }
}

pub struct GitHubClient {
    api: RestApi,
}

impl GitHubClient {
    pub fn new(server: Option<&str>, token: &str, timeout: Duration) -> Result<Self, ScmError> {
        let auth = (!token.is_empty())
            .then(|| (reqwest::header::AUTHORIZATION, format!("Bearer {}", token)));
        Ok(Self {
            api: RestApi::new("GitHub", api_base(server), auth, timeout)?,
        })
    }
}

#[async_trait]
impl ScmClient for GitHubClient {
    async fn find_pull_request(&self, repo: &str, number: i64) -> Result<PullRequest, ScmError> {
        let pr: GitHubPullRequest = self
            .api
            .get_json(&format!("/repos/{}/pulls/{}", repo, number), &[])
            .await?;
        Ok(PullRequest {
            number: pr.number,
            sha: pr.head.sha,
            title: pr.title,
            author: pr.user.into(),
            reviewers: pr.requested_reviewers.into_iter().map(User::from).collect(),
            assignees: pr.assignees.into_iter().map(User::from).collect(),
        })
    }

    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
        opts: ListOptions,
    ) -> Result<Vec<StatusRecord>, ScmError> {
        let statuses: Vec<GitHubStatus> = self
            .api
            .get_json(
                &format!("/repos/{}/commits/{}/statuses", repo, sha),
                &[("page", opts.page.to_string()), ("per_page", opts.size.to_string())],
            )
            .await?;
        Ok(statuses
            .into_iter()
            .map(|s| StatusRecord {
                label: s.context,
                state: from_github_state(&s.state),
                description: s.description.unwrap_or_default(),
                target: s.target_url.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_commit_status(
        &self,
        repo: &str,
        sha: &str,
        status: &DesiredStatus,
    ) -> Result<(), ScmError> {
        let input = GitHubStatusInput {
            state: to_github_state(status.state),
            context: &status.label,
            description: &status.description,
            target_url: &status.target,
        };
        self.api
            .send_json(Method::POST, &format!("/repos/{}/statuses/{}", repo, sha), &input)
            .await
    }

    async fn list_pr_comments(
        &self,
        repo: &str,
        number: i64,
        opts: ListOptions,
    ) -> Result<Vec<Comment>, ScmError> {
        let comments: Vec<GitHubComment> = self
            .api
            .get_json(
                &format!("/repos/{}/issues/{}/comments", repo, number),
                &[("page", opts.page.to_string()), ("per_page", opts.size.to_string())],
            )
            .await?;
        Ok(comments
            .into_iter()
            .map(|c| Comment {
                id: c.id,
                body: c.body.unwrap_or_default(),
            })
            .collect())
    }

    async fn create_pr_comment(&self, repo: &str, number: i64, body: &str) -> Result<(), ScmError> {
        self.api
            .send_json(
                Method::POST,
                &format!("/repos/{}/issues/{}/comments", repo, number),
                &CommentInput { body },
            )
            .await
    }

    async fn edit_pr_comment(
        &self,
        repo: &str,
        _number: i64,
        id: u64,
        body: &str,
    ) -> Result<(), ScmError> {
        self.api
            .send_json(
                Method::PATCH,
                &format!("/repos/{}/issues/comments/{}", repo, id),
                &CommentInput { body },
            )
            .await
    }

    async fn delete_pr_comment(&self, repo: &str, _number: i64, id: u64) -> Result<(), ScmError> {
        self.api
            .delete(&format!("/repos/{}/issues/comments/{}", repo, id))
            .await
    }

    fn canonical_state(&self, state: StatusState) -> StatusState {
        canonical_github_state(state)
    }
}

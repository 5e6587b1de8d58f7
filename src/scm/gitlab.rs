use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use reqwest::header::HeaderName;
use serde::{Deserialize, Serialize};

use super::http::{RestApi, server_base};
use super::{
    Comment, DesiredStatus, ListOptions, PullRequest, ScmClient, StatusRecord, StatusState, User,
};
use crate::errors::ScmError;

const GITLAB_URL: &str = "https://gitlab.com";

#[derive(Debug, Deserialize)]
struct GitLabUser {
    id: u64,
    username: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// A GitLab merge request (subset of fields).
#[derive(Debug, Deserialize)]
struct GitLabMergeRequest {
    iid: i64,
    title: String,
    sha: String,
    author: GitLabUser,
    #[serde(default)]
    reviewers: Vec<GitLabUser>,
    #[serde(default)]
    assignees: Vec<GitLabUser>,
}

#[derive(Debug, Deserialize)]
struct GitLabStatus {
    name: String,
    status: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    target_url: Option<String>,
}

#[derive(Debug, Serialize)]
struct GitLabStatusInput<'a> {
    state: &'static str,
    name: &'a str,
    description: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    target_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct GitLabNote {
    id: u64,
    #[serde(default)]
    body: String,
}

#[derive(Debug, Serialize)]
struct NoteInput<'a> {
    body: &'a str,
}

impl From<GitLabUser> for User {
    fn from(u: GitLabUser) -> Self {
        User {
            id: u.id,
            login: u.username,
            name: u.name,
            email: u.email,
        }
    }
}

fn to_gitlab_state(state: StatusState) -> &'static str {
    match state {
        StatusState::Pending => "pending",
        StatusState::Success => "success",
        StatusState::Failure | StatusState::Error => "failed",
        StatusState::Cancelled => "canceled",
    }
}

fn from_gitlab_state(state: &str) -> StatusState {
    match state {
        "pending" | "running" | "created" | "waiting_for_resource" | "preparing" | "scheduled" => {
            StatusState::Pending
        }
        "success" => StatusState::Success,
        "failed" => StatusState::Failure,
        "canceled" | "skipped" => StatusState::Cancelled,
        _ => StatusState::Error,
    }
}

/// What GitLab reports back after `state` was written.
pub(crate) fn canonical_gitlab_state(state: StatusState) -> StatusState {
    from_gitlab_state(to_gitlab_state(state))
}

/// Project paths are addressed URL-encoded (`owner%2Frepo`).
fn project_id(repo: &str) -> String {
    repo.replace('/', "%2F")
}

pub struct GitLabClient {
    api: RestApi,
}

impl GitLabClient {
    pub fn new(server: Option<&str>, token: &str, timeout: Duration) -> Result<Self, ScmError> {
        let server = server
            .map(server_base)
            .unwrap_or_else(|| GITLAB_URL.to_string());
        let base = format!("{}/api/v4", server);
        let auth = (!token.is_empty())
            .then(|| (HeaderName::from_static("private-token"), token.to_string()));
        Ok(Self {
            api: RestApi::new("GitLab", base, auth, timeout)?,
        })
    }
}

#[async_trait]
impl ScmClient for GitLabClient {
    async fn find_pull_request(&self, repo: &str, number: i64) -> Result<PullRequest, ScmError> {
        let mr: GitLabMergeRequest = self
            .api
            .get_json(
                &format!("/projects/{}/merge_requests/{}", project_id(repo), number),
                &[],
            )
            .await?;
        Ok(PullRequest {
            number: mr.iid,
            sha: mr.sha,
            title: mr.title,
            author: mr.author.into(),
            reviewers: mr.reviewers.into_iter().map(User::from).collect(),
            assignees: mr.assignees.into_iter().map(User::from).collect(),
        })
    }

    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
        opts: ListOptions,
    ) -> Result<Vec<StatusRecord>, ScmError> {
        let statuses: Vec<GitLabStatus> = self
            .api
            .get_json(
                &format!("/projects/{}/repository/commits/{}/statuses", project_id(repo), sha),
                &[("page", opts.page.to_string()), ("per_page", opts.size.to_string())],
            )
            .await?;
        Ok(statuses
            .into_iter()
            .map(|s| StatusRecord {
                label: s.name,
                state: from_gitlab_state(&s.status),
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
        let input = GitLabStatusInput {
            state: to_gitlab_state(status.state),
            name: &status.label,
            description: &status.description,
            target_url: &status.target,
        };
        self.api
            .send_json(
                Method::POST,
                &format!("/projects/{}/statuses/{}", project_id(repo), sha),
                &input,
            )
            .await
    }

    async fn list_pr_comments(
        &self,
        repo: &str,
        number: i64,
        opts: ListOptions,
    ) -> Result<Vec<Comment>, ScmError> {
        let notes: Vec<GitLabNote> = self
            .api
            .get_json(
                &format!("/projects/{}/merge_requests/{}/notes", project_id(repo), number),
                &[
                    ("page", opts.page.to_string()),
                    ("per_page", opts.size.to_string()),
                    ("sort", "asc".to_string()),
                ],
            )
            .await?;
        Ok(notes
            .into_iter()
            .map(|n| Comment {
                id: n.id,
                body: n.body,
            })
            .collect())
    }

    async fn create_pr_comment(&self, repo: &str, number: i64, body: &str) -> Result<(), ScmError> {
        self.api
            .send_json(
                Method::POST,
                &format!("/projects/{}/merge_requests/{}/notes", project_id(repo), number),
                &NoteInput { body },
            )
            .await
    }

    async fn edit_pr_comment(
        &self,
        repo: &str,
        number: i64,
        id: u64,
        body: &str,
    ) -> Result<(), ScmError> {
        self.api
            .send_json(
                Method::PUT,
                &format!(
                    "/projects/{}/merge_requests/{}/notes/{}",
                    project_id(repo),
                    number,
                    id
                ),
                &NoteInput { body },
            )
            .await
    }

    async fn delete_pr_comment(&self, repo: &str, number: i64, id: u64) -> Result<(), ScmError> {
        self.api
            .delete(&format!(
                "/projects/{}/merge_requests/{}/notes/{}",
                project_id(repo),
                number,
                id
            ))
            .await
    }

    fn canonical_state(&self, state: StatusState) -> StatusState {
        canonical_gitlab_state(state)
    }
}

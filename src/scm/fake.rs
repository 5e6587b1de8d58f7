//! Recording in-memory `ScmClient` for tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{
    Comment, DesiredStatus, ListOptions, PullRequest, ScmClient, StatusRecord, StatusState,
};
use crate::errors::ScmError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    FindPullRequest { repo: String, number: i64 },
    ListStatuses { repo: String, sha: String },
    CreateStatus { repo: String, sha: String, status: DesiredStatus },
    ListComments { repo: String, number: i64 },
    CreateComment { number: i64, body: String },
    EditComment { number: i64, id: u64, body: String },
    DeleteComment { number: i64, id: u64 },
}

impl Call {
    pub(crate) fn is_write(&self) -> bool {
        matches!(
            self,
            Call::CreateStatus { .. }
                | Call::CreateComment { .. }
                | Call::EditComment { .. }
                | Call::DeleteComment { .. }
        )
    }
}

#[derive(Default)]
pub(crate) struct FakeScm {
    pub(crate) pull_requests: HashMap<i64, PullRequest>,
    pub(crate) statuses: Vec<StatusRecord>,
    pub(crate) comments: Vec<Comment>,
    /// Name of the operation that should fail with a provider error.
    pub(crate) fail_on: Option<&'static str>,
    /// Read-back state mapping of the emulated provider; identity when unset.
    pub(crate) fold_state: Option<fn(StatusState) -> StatusState>,
    calls: Mutex<Vec<Call>>,
}

impl FakeScm {
    pub(crate) fn with_pr(number: i64, sha: &str) -> Self {
        let mut fake = FakeScm::default();
        fake.pull_requests.insert(
            number,
            PullRequest {
                number,
                sha: sha.to_string(),
                title: format!("PR {}", number),
                ..Default::default()
            },
        );
        fake
    }

    pub(crate) fn status(mut self, label: &str, state: StatusState) -> Self {
        self.statuses.push(StatusRecord {
            label: label.to_string(),
            state,
            description: String::new(),
            target: String::new(),
        });
        self
    }

    pub(crate) fn comment(mut self, id: u64, body: &str) -> Self {
        self.comments.push(Comment {
            id,
            body: body.to_string(),
        });
        self
    }

    pub(crate) fn failing(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub(crate) fn folding(mut self, fold: fn(StatusState) -> StatusState) -> Self {
        self.fold_state = Some(fold);
        self
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn writes(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_write).collect()
    }

    fn record(&self, op: &'static str, call: Call) -> Result<(), ScmError> {
        self.calls.lock().unwrap().push(call);
        if self.fail_on == Some(op) {
            return Err(ScmError::provider(format!("{} failed", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ScmClient for FakeScm {
    async fn find_pull_request(&self, repo: &str, number: i64) -> Result<PullRequest, ScmError> {
        self.record(
            "find_pull_request",
            Call::FindPullRequest {
                repo: repo.to_string(),
                number,
            },
        )?;
        self.pull_requests
            .get(&number)
            .cloned()
            .ok_or_else(|| ScmError::not_found(format!("pull request {}", number)))
    }

    async fn list_commit_statuses(
        &self,
        repo: &str,
        sha: &str,
        _opts: ListOptions,
    ) -> Result<Vec<StatusRecord>, ScmError> {
        self.record(
            "list_commit_statuses",
            Call::ListStatuses {
                repo: repo.to_string(),
                sha: sha.to_string(),
            },
        )?;
        Ok(self.statuses.clone())
    }

    async fn create_commit_status(
        &self,
        repo: &str,
        sha: &str,
        status: &DesiredStatus,
    ) -> Result<(), ScmError> {
        self.record(
            "create_commit_status",
            Call::CreateStatus {
                repo: repo.to_string(),
                sha: sha.to_string(),
                status: status.clone(),
            },
        )
    }

    async fn list_pr_comments(
        &self,
        repo: &str,
        number: i64,
        _opts: ListOptions,
    ) -> Result<Vec<Comment>, ScmError> {
        self.record(
            "list_pr_comments",
            Call::ListComments {
                repo: repo.to_string(),
                number,
            },
        )?;
        Ok(self.comments.clone())
    }

    async fn create_pr_comment(
        &self,
        _repo: &str,
        number: i64,
        body: &str,
    ) -> Result<(), ScmError> {
        self.record(
            "create_pr_comment",
            Call::CreateComment {
                number,
                body: body.to_string(),
            },
        )
    }

    async fn edit_pr_comment(
        &self,
        _repo: &str,
        number: i64,
        id: u64,
        body: &str,
    ) -> Result<(), ScmError> {
        self.record(
            "edit_pr_comment",
            Call::EditComment {
                number,
                id,
                body: body.to_string(),
            },
        )
    }

    async fn delete_pr_comment(&self, _repo: &str, number: i64, id: u64) -> Result<(), ScmError> {
        self.record("delete_pr_comment", Call::DeleteComment { number, id })
    }

    fn canonical_state(&self, state: StatusState) -> StatusState {
        self.fold_state.map_or(state, |fold| fold(state))
    }
}

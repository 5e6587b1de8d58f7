//! Pull-request status and comment reconciliation.
//!
//! [`StatusReconciler`] decides whether a newly computed status supersedes the
//! one already posted for the same label, and keeps a single marker-tagged
//! comment per pull request. Each call is a stateless read-decide-write
//! sequence against the provider; nothing is locked, so concurrent callers
//! on the same label get last-write-wins.

use std::sync::Arc;

use crate::errors::ScmError;
use crate::scm::{DesiredStatus, ListOptions, PullRequestTarget, ScmClient, StatusRecord};

/// Trailing marker identifying comments written by this tool.
pub const DEFAULT_COMMENT_MARKER: &str =
    "Comment from [gogit](https://github.com/linuxsuren/gogit).";

/// Returns `true` when writing `desired` would be redundant given `previous`.
pub type ExpirationCheck =
    Arc<dyn Fn(Option<&StatusRecord>, &DesiredStatus) -> bool + Send + Sync>;

/// Skip the write only when the latest status for the label already has the same state.
pub fn same_state_check() -> ExpirationCheck {
    Arc::new(|previous: Option<&StatusRecord>, desired: &DesiredStatus| {
        previous.is_some_and(|p| p.state == desired.state)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutcome {
    /// PR number was the `-1` sentinel.
    Skipped,
    /// The expiration check found the write redundant.
    Unchanged,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentOutcome {
    Skipped,
    Created,
    /// The first marked comment was edited and `removed` duplicates were deleted.
    Updated { id: u64, removed: usize },
}

pub struct StatusReconciler {
    client: Arc<dyn ScmClient>,
    expiration_check: ExpirationCheck,
}

impl StatusReconciler {
    pub fn new(client: Arc<dyn ScmClient>) -> Self {
        Self {
            client,
            expiration_check: same_state_check(),
        }
    }

    pub fn with_expiration_check(mut self, check: ExpirationCheck) -> Self {
        self.expiration_check = check;
        self
    }

    /// Post `desired` on the PR's head commit unless the expiration check says it is redundant.
    pub async fn reconcile_status(
        &self,
        target: &PullRequestTarget,
        desired: &DesiredStatus,
    ) -> Result<StatusOutcome, ScmError> {
        if target.is_skipped() {
            tracing::info!("skip status: pr number is -1");
            return Ok(StatusOutcome::Skipped);
        }

        let repo = target.repo.path();
        let pr = self
            .client
            .find_pull_request(&repo, target.pr_number)
            .await
            .map_err(|e| e.context(format!("finding pull request {}", target)))?;

        let previous = self.find_previous_status(&repo, &pr.sha, &desired.label).await?;
        // Compare in the provider's vocabulary: GitHub reads a cancelled status back as error.
        let comparable = DesiredStatus {
            state: self.client.canonical_state(desired.state),
            ..desired.clone()
        };
        if (self.expiration_check)(previous.as_ref(), &comparable) {
            tracing::info!(
                pr = %target,
                sha = %pr.sha,
                label = %desired.label,
                state = %desired.state,
                "status unchanged, skip writing"
            );
            return Ok(StatusOutcome::Unchanged);
        }

        self.client
            .create_commit_status(&repo, &pr.sha, desired)
            .await
            .map_err(|e| e.context(format!("creating status on {}@{}", repo, pr.sha)))?;
        tracing::info!(
            pr = %target,
            sha = %pr.sha,
            label = %desired.label,
            state = %desired.state,
            "status created"
        );
        Ok(StatusOutcome::Created)
    }

    /// The first status in provider order carrying `label`, if any.
    pub async fn find_previous_status(
        &self,
        repo: &str,
        sha: &str,
        label: &str,
    ) -> Result<Option<StatusRecord>, ScmError> {
        let statuses = self
            .client
            .list_commit_statuses(repo, sha, ListOptions::default())
            .await
            .map_err(|e| e.context(format!("listing statuses for {}@{}", repo, sha)))?;
        Ok(statuses.into_iter().find(|s| s.label == label))
    }

    /// Create or update the single comment ending with `marker`, deleting any duplicates.
    pub async fn upsert_comment(
        &self,
        target: &PullRequestTarget,
        body: &str,
        marker: &str,
    ) -> Result<CommentOutcome, ScmError> {
        if target.is_skipped() {
            tracing::info!("skip comment: pr number is -1");
            return Ok(CommentOutcome::Skipped);
        }

        let repo = target.repo.path();
        let number = target.pr_number;
        let comments = self
            .client
            .list_pr_comments(&repo, number, ListOptions::default())
            .await
            .map_err(|e| e.context(format!("listing comments on {}", target)))?;

        let ours: Vec<u64> = comments
            .iter()
            .filter(|c| c.body.ends_with(marker))
            .map(|c| c.id)
            .collect();
        let full_body = format!("{}\n\n{}", body, marker);

        let Some((&first, duplicates)) = ours.split_first() else {
            self.client
                .create_pr_comment(&repo, number, &full_body)
                .await
                .map_err(|e| e.context(format!("creating comment on {}", target)))?;
            tracing::info!(pr = %target, "comment created");
            return Ok(CommentOutcome::Created);
        };

        self.client
            .edit_pr_comment(&repo, number, first, &full_body)
            .await
            .map_err(|e| e.context(format!("editing comment {} on {}", first, target)))?;
        for &id in duplicates {
            tracing::warn!(pr = %target, id, "deleting duplicate comment");
            self.client
                .delete_pr_comment(&repo, number, id)
                .await
                .map_err(|e| e.context(format!("deleting comment {} on {}", id, target)))?;
        }
        tracing::info!(pr = %target, id = first, "comment updated");
        Ok(CommentOutcome::Updated {
            id: first,
            removed: duplicates.len(),
        })
    }
}

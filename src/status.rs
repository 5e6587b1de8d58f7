//! Status text normalization.
//!
//! Callers hand us status text from different systems (Argo phases such as
//! `Succeeded`, GitLab's `canceled`, plain `success`). Everything is folded to
//! one of the canonical [`StatusState`] values, case-insensitively.

use std::str::FromStr;

use crate::errors::ScmError;
use crate::scm::StatusState;

/// Fold caller-provided status text to its canonical state.
///
/// Canonical names map to themselves, so normalizing a normalized value is a no-op.
pub fn normalize_status(text: &str) -> Result<StatusState, ScmError> {
    match text.trim().to_lowercase().as_str() {
        "success" | "succeeded" => Ok(StatusState::Success),
        "failure" | "failed" => Ok(StatusState::Failure),
        "error" | "errored" => Ok(StatusState::Error),
        "pending" | "running" | "queued" => Ok(StatusState::Pending),
        "cancelled" | "canceled" => Ok(StatusState::Cancelled),
        "" => Err(ScmError::InvalidInput("status must not be empty".into())),
        other => Err(ScmError::InvalidInput(format!(
            "unknown status '{}', valid values: pending, success, failure, error, cancelled",
            other
        ))),
    }
}

impl FromStr for StatusState {
    type Err = ScmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize_status(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeded_folds_to_success() {
        for text in ["Succeeded", "SUCCEEDED", "success", "Success"] {
            assert_eq!(normalize_status(text).unwrap(), StatusState::Success, "{}", text);
        }
    }

    #[test]
    fn test_argo_and_gitlab_synonyms() {
        assert_eq!(normalize_status("Failed").unwrap(), StatusState::Failure);
        assert_eq!(normalize_status("Running").unwrap(), StatusState::Pending);
        assert_eq!(normalize_status("canceled").unwrap(), StatusState::Cancelled);
        assert_eq!(normalize_status("Error").unwrap(), StatusState::Error);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for text in ["Succeeded", "failed", "Running", "canceled", "error", "PENDING"] {
            let once = normalize_status(text).unwrap();
            let twice = normalize_status(once.as_str()).unwrap();
            assert_eq!(once, twice, "{}", text);
        }
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        assert_eq!(normalize_status("  success\n").unwrap(), StatusState::Success);
    }

    #[test]
    fn test_empty_status_is_invalid() {
        assert!(matches!(normalize_status(""), Err(ScmError::InvalidInput(_))));
    }

    #[test]
    fn test_unknown_status_is_invalid() {
        let err = normalize_status("done").unwrap_err();
        assert!(matches!(err, ScmError::InvalidInput(_)));
        assert!(err.to_string().contains("done"));
    }

    #[test]
    fn test_from_str_uses_normalization() {
        let state: StatusState = "Succeeded".parse().unwrap();
        assert_eq!(state, StatusState::Success);
    }
}

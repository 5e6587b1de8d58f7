//! Typed error kinds for hosting-provider operations.
//!
//! `ScmError` is what the reconciler and the provider clients return:
//! - `NotFound`: the pull request or another resource does not exist
//! - `Provider`: transport, authentication, rate-limit or decoding failures
//! - `InvalidInput`: malformed caller input (credentials, status text, PR number)
//!
//! A PR number of `-1` is not an error; it surfaces as a `Skipped` outcome.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScmError {
    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Provider error: {message}")]
    Provider { message: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl ScmError {
    pub fn not_found(message: impl Into<String>) -> Self {
        ScmError::NotFound {
            message: message.into(),
        }
    }

    pub fn provider(message: impl Into<String>) -> Self {
        ScmError::Provider {
            message: message.into(),
        }
    }

    /// Prefix the message with what was being processed, keeping the kind.
    pub fn context(self, context: impl std::fmt::Display) -> Self {
        match self {
            ScmError::NotFound { message } => ScmError::NotFound {
                message: format!("{}: {}", context, message),
            },
            ScmError::Provider { message } => ScmError::Provider {
                message: format!("{}: {}", context, message),
            },
            ScmError::InvalidInput(message) => {
                ScmError::InvalidInput(format!("{}: {}", context, message))
            }
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ScmError::NotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_keeps_not_found_kind() {
        let err = ScmError::not_found("pull request 7").context("owner/repo");
        match &err {
            ScmError::NotFound { message } => assert_eq!(message, "owner/repo: pull request 7"),
            _ => panic!("Expected NotFound"),
        }
        assert!(err.is_not_found());
    }

    #[test]
    fn context_keeps_provider_kind() {
        let err = ScmError::provider("401 Unauthorized").context("listing statuses for abc123");
        assert!(matches!(err, ScmError::Provider { .. }));
        assert!(err.to_string().contains("listing statuses for abc123"));
        assert!(err.to_string().contains("401 Unauthorized"));
    }

    #[test]
    fn invalid_input_display() {
        let err = ScmError::InvalidInput("unknown status 'done'".into());
        assert_eq!(err.to_string(), "Invalid input: unknown status 'done'");
        assert!(!err.is_not_found());
    }

    #[test]
    fn scm_error_implements_std_error_trait() {
        fn assert_std_error<E: std::error::Error + Send + Sync + 'static>(_: &E) {}
        assert_std_error(&ScmError::provider("x"));
        let wrapped: anyhow::Error = ScmError::provider("boom").into();
        assert!(wrapped.downcast_ref::<ScmError>().is_some());
    }
}

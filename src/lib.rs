//! Relay pull request build status and comments to GitHub or GitLab.
//!
//! The core is [`reconcile::StatusReconciler`], which posts a commit status
//! only when it changes and keeps a single marked comment per pull request.
//! The CLI commands and the Argo Workflows executor plugin are thin layers on top.

pub mod argo;
pub mod checkout;
pub mod config;
pub mod credentials;
pub mod errors;
pub mod logging;
pub mod notify;
pub mod reconcile;
pub mod retry;
pub mod scm;
pub mod status;
pub mod template;

//! Error taxonomy for mirror runs.
//!
//! [`MirrorError`] is fatal and aborts a run before any repository is
//! admitted. [`TaskFailure`] is scoped to one repository and only ever
//! surfaces as report data.

use std::path::PathBuf;

use crate::provider::ProviderError;

/// Errors that abort a whole mirror run.
#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error("list repos failed: {0}")]
    Listing(#[source] ProviderError),

    #[error("list repos failed: deadline exceeded")]
    ListingDeadlineExceeded,

    #[error("create work dir {path} failed: {source}")]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Result type for mirror runs.
pub type Result<T> = std::result::Result<T, MirrorError>;

/// Why a single mirror task ended in `Failed`.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TaskFailure {
    #[error("clone failed: {0}")]
    Clone(String),

    #[error("exists-check failed: {0}")]
    ExistsCheck(String),

    #[error("create failed: {0}")]
    Create(String),

    #[error("push failed: {0}")]
    Push(String),

    #[error("cancelled: deadline exceeded")]
    Cancelled,

    #[error("internal fault: {0}")]
    InternalFault(String),
}

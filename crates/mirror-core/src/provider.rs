//! Provider capabilities: the two seams between the orchestrator and a
//! concrete git hosting backend.
//!
//! Implement [`SourceProvider`] for a host repositories are read from and
//! [`TargetProvider`] for a host they are mirrored to. Both are shared by every
//! concurrent mirror task, so implementations must be `Send + Sync` and keep no
//! per-call mutable state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::RepositoryDescriptor;

/// Errors returned by provider calls.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ProviderError {
    /// The request never produced a response.
    #[error("network error: {0}")]
    Network(String),

    /// The host answered with an unexpected status.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The response body could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The provider is missing configuration or credentials.
    #[error("configuration error: {0}")]
    Config(String),

    /// The provider cannot act in the requested role.
    #[error("provider `{provider}` cannot be used as a {role}")]
    UnsupportedRole { provider: String, role: String },
}

/// Convenience result alias.
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// How a target wants repositories cloned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MirrorMode {
    /// `git clone --bare`, followed by `git push --mirror`.
    #[default]
    Bare,
    /// A regular working-copy clone; the clone itself is the deliverable.
    WorkingCopy,
}

/// What happens to cloned workspaces once a task finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RetentionPolicy {
    #[default]
    Delete,
    Keep,
}

/// A host repositories are listed and cloned from.
#[async_trait]
pub trait SourceProvider: Send + Sync {
    /// Stable provider id, e.g. `"github"`.
    fn identifier(&self) -> &str;

    /// List every repository to mirror. Called once per run.
    async fn list_repos(&self) -> ProviderResult<Vec<RepositoryDescriptor>>;

    /// Clone URL for `repo`, with credentials embedded.
    fn clone_address(&self, repo: &RepositoryDescriptor) -> String;
}

/// A host repositories are mirrored to.
#[async_trait]
pub trait TargetProvider: Send + Sync {
    /// Stable provider id, e.g. `"gitlab"`.
    fn identifier(&self) -> &str;

    fn mirror_mode(&self) -> MirrorMode {
        MirrorMode::Bare
    }

    fn retention(&self) -> RetentionPolicy {
        RetentionPolicy::Delete
    }

    async fn repo_exists(&self, name: &str) -> ProviderResult<bool>;

    async fn create_repo(&self, name: &str, description: &str, private: bool)
        -> ProviderResult<()>;

    /// Push URL for `name`, or `None` when the target takes no push.
    fn push_address(&self, name: &str) -> Option<String>;
}

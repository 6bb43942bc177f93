//! Mirror data model: repository descriptors, per-repository outcomes and the
//! run report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

/// Errors produced when constructing a [`RepositoryDescriptor`].
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DescriptorError {
    #[error("repository path must not be empty (namespace path: {path_with_namespace:?})")]
    EmptyPath { path_with_namespace: String },
}

/// One repository to mirror, as listed by a source provider.
///
/// `path_with_namespace` addresses the repository on the source,
/// `path` addresses it on the (single-namespace) target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryDescriptor {
    path: String,
    path_with_namespace: String,
    description: String,
    private: bool,
}

impl RepositoryDescriptor {
    pub fn new(
        path: impl Into<String>,
        path_with_namespace: impl Into<String>,
        description: impl Into<String>,
        private: bool,
    ) -> Result<Self, DescriptorError> {
        let path = path.into();
        let path_with_namespace = path_with_namespace.into();
        if path.trim().is_empty() {
            return Err(DescriptorError::EmptyPath {
                path_with_namespace,
            });
        }
        Ok(Self {
            path,
            path_with_namespace,
            description: description.into(),
            private,
        })
    }

    /// Repository name on the target.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Full path on the source, e.g. `group/project`.
    pub fn path_with_namespace(&self) -> &str {
        &self.path_with_namespace
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn is_private(&self) -> bool {
        self.private
    }
}

/// Result of mirroring a single repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MirrorOutcome {
    Success,
    Failure { reason: String },
}

impl MirrorOutcome {
    pub fn failure(reason: impl Into<String>) -> Self {
        Self::Failure {
            reason: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Failure reason, `None` on success.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Success => None,
            Self::Failure { reason } => Some(reason),
        }
    }
}

/// A descriptor paired with the outcome of its mirror task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MirrorEntry {
    pub repository: RepositoryDescriptor,
    pub outcome: MirrorOutcome,
}

/// Aggregated result of one mirror run.
///
/// Holds exactly one entry per admitted repository, in completion order.
/// Repositories never admitted because the deadline expired are not entries;
/// they are listed in [`MirrorReport::not_attempted`].
#[derive(Debug, Clone, Serialize)]
pub struct MirrorReport {
    entries: Vec<MirrorEntry>,
    not_attempted: Vec<RepositoryDescriptor>,
    started_at: DateTime<Utc>,
    finished_at: DateTime<Utc>,
}

impl MirrorReport {
    pub fn new(
        entries: Vec<MirrorEntry>,
        not_attempted: Vec<RepositoryDescriptor>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entries,
            not_attempted,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// Report for a source that listed no repositories.
    pub fn empty(started_at: DateTime<Utc>) -> Self {
        Self::new(Vec::new(), Vec::new(), started_at)
    }

    pub fn entries(&self) -> &[MirrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn not_attempted(&self) -> &[RepositoryDescriptor] {
        &self.not_attempted
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> DateTime<Utc> {
        self.finished_at
    }

    /// Outcome recorded for the repository with the given target path.
    pub fn outcome_of(&self, path: &str) -> Option<&MirrorOutcome> {
        self.entries
            .iter()
            .find(|e| e.repository.path() == path)
            .map(|e| &e.outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = &MirrorEntry> {
        self.entries.iter().filter(|e| !e.outcome.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }

    /// `true` when every listed repository was admitted and succeeded.
    pub fn all_succeeded(&self) -> bool {
        self.not_attempted.is_empty() && self.entries.iter().all(|e| e.outcome.is_success())
    }
}

/// Append-only, task-safe collector of mirror entries.
///
/// Each [`ReportCollector::record`] holds the lock for a single push.
#[derive(Debug, Default)]
pub struct ReportCollector {
    entries: Mutex<Vec<MirrorEntry>>,
}

impl ReportCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record(&self, repository: RepositoryDescriptor, outcome: MirrorOutcome) {
        self.entries.lock().await.push(MirrorEntry {
            repository,
            outcome,
        });
    }

    /// Copy of every entry recorded so far.
    pub async fn snapshot(&self) -> Vec<MirrorEntry> {
        self.entries.lock().await.clone()
    }
}

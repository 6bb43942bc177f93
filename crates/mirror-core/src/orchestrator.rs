//! Bounded-concurrency mirror orchestrator.
//!
//! The source is listed once; the descriptors become a FIFO admission queue
//! drained by a fixed pool of `max_workers` workers. A worker admits the next
//! descriptor only when it is idle, so at most `max_workers` tasks run at any
//! instant and admission follows list order. Once the deadline passes the queue
//! closes: nothing further is admitted and in-flight tasks are cancelled by
//! their own deadline-aware calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{error, info, instrument, warn};

use crate::error::{MirrorError, Result};
use crate::git::GitTransport;
use crate::model::{MirrorReport, ReportCollector, RepositoryDescriptor};
use crate::provider::{SourceProvider, TargetProvider};
use crate::task::{self, MirrorServices};
use crate::workspace::WorkspaceManager;

/// Default number of concurrently running mirror tasks.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Default global timeout of a run, in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 3600;

/// Configuration for a mirror run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum number of concurrent mirror tasks.
    pub max_workers: usize,
    /// Wall-clock budget of the whole run.
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: DEFAULT_MAX_WORKERS,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_workers == 0 {
            return Err(MirrorError::Config(
                "max_workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, ser: S) -> Result<S::Ok, S::Error> {
        ser.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(de: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(de)?))
    }
}

/// FIFO of descriptors waiting for admission.
struct AdmissionQueue {
    state: Mutex<AdmissionState>,
    deadline: Instant,
}

struct AdmissionState {
    pending: VecDeque<RepositoryDescriptor>,
    not_attempted: Vec<RepositoryDescriptor>,
    closed: bool,
}

impl AdmissionQueue {
    fn new(repos: Vec<RepositoryDescriptor>, deadline: Instant) -> Self {
        Self {
            state: Mutex::new(AdmissionState {
                pending: repos.into(),
                not_attempted: Vec::new(),
                closed: false,
            }),
            deadline,
        }
    }

    /// Next descriptor to run, or `None` once drained or past the deadline.
    async fn admit(&self) -> Option<RepositoryDescriptor> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        if Instant::now() >= self.deadline {
            state.closed = true;
            let skipped: Vec<_> = state.pending.drain(..).collect();
            if !skipped.is_empty() {
                warn!(
                    remaining = skipped.len(),
                    "deadline exceeded, stopping repo processing"
                );
            }
            state.not_attempted.extend(skipped);
            return None;
        }
        state.pending.pop_front()
    }

    async fn not_attempted(&self) -> Vec<RepositoryDescriptor> {
        self.state.lock().await.not_attempted.clone()
    }
}

/// Mirrors every repository of a source to a target.
pub struct MirrorOrchestrator {
    services: Arc<MirrorServices>,
    config: OrchestratorConfig,
}

impl MirrorOrchestrator {
    /// The target's retention policy governs every workspace of the run,
    /// whatever policy `workspaces` was created with.
    pub fn new(
        source: Arc<dyn SourceProvider>,
        target: Arc<dyn TargetProvider>,
        transport: Arc<dyn GitTransport>,
        workspaces: WorkspaceManager,
        config: OrchestratorConfig,
    ) -> Self {
        let workspaces = workspaces.with_retention(target.retention());
        Self {
            services: Arc::new(MirrorServices {
                source,
                target,
                transport,
                workspaces: Arc::new(workspaces),
            }),
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.services.workspaces
    }

    /// Run with a deadline of `config.timeout` from now.
    pub async fn run(&self) -> Result<MirrorReport> {
        self.run_until(Instant::now() + self.config.timeout).await
    }

    /// Run until every admitted task finishes.
    ///
    /// Fails only when the source listing fails; per-repository failures are
    /// recorded in the returned report. The run root is cleaned up on every
    /// path unless the target retains clones.
    #[instrument(
        skip(self, deadline),
        fields(
            source = %self.services.source.identifier(),
            target = %self.services.target.identifier(),
        )
    )]
    pub async fn run_until(&self, deadline: Instant) -> Result<MirrorReport> {
        let result = match self.config.validate() {
            Ok(()) => self.mirror_all(deadline).await,
            Err(e) => Err(e),
        };
        if let Err(e) = self.services.workspaces.finish() {
            error!(
                dir = %self.services.workspaces.root().display(),
                error = %e,
                "remove clone dir failed"
            );
        }
        result
    }

    async fn mirror_all(&self, deadline: Instant) -> Result<MirrorReport> {
        let started_at = Utc::now();
        let source = &self.services.source;

        let repos = match tokio::time::timeout_at(deadline, source.list_repos()).await {
            Ok(Ok(repos)) => repos,
            Ok(Err(e)) => {
                error!(error = %e, source = %source.identifier(), "list repos failed");
                return Err(MirrorError::Listing(e));
            }
            Err(_) => {
                error!(
                    source = %source.identifier(),
                    "list repos did not finish before the deadline"
                );
                return Err(MirrorError::ListingDeadlineExceeded);
            }
        };

        if repos.is_empty() {
            info!(source = %source.identifier(), "no repos found");
            return Ok(MirrorReport::empty(started_at));
        }
        info!(count = repos.len(), source = %source.identifier(), "total repos");

        let worker_count = self.config.max_workers.min(repos.len());
        let queue = Arc::new(AdmissionQueue::new(repos, deadline));
        let collector = Arc::new(ReportCollector::new());

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let queue = Arc::clone(&queue);
            let collector = Arc::clone(&collector);
            let services = Arc::clone(&self.services);
            workers.spawn(async move {
                while let Some(repo) = queue.admit().await {
                    let outcome =
                        task::execute(repo.clone(), Arc::clone(&services), deadline).await;
                    collector.record(repo, outcome).await;
                }
                tracing::debug!(worker_id, "worker drained");
            });
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "mirror worker terminated abnormally");
            }
        }

        let entries = collector.snapshot().await;
        let not_attempted = queue.not_attempted().await;

        let report = MirrorReport::new(entries, not_attempted, started_at);
        log_summary(&report);
        Ok(report)
    }
}

fn log_summary(report: &MirrorReport) {
    info!(
        succeeded = report.success_count(),
        failed = report.failure_count(),
        not_attempted = report.not_attempted().len(),
        "mirror run finished"
    );
    if report.failure_count() > 0 {
        info!(count = report.failure_count(), "some repos mirror failed");
        for entry in report.failures() {
            info!(
                repo = %entry.repository.path_with_namespace(),
                reason = entry.outcome.reason().unwrap_or_default(),
                "failed repo"
            );
        }
    }
    for repo in report.not_attempted() {
        info!(repo = %repo.path_with_namespace(), "repo not attempted before the deadline");
    }
}

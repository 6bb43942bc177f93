//! The per-repository mirror state machine.
//!
//! `Pending -> Cloning -> CheckingTarget -> (CreatingTarget) -> Pushing -> Done`,
//! with `Failed` reachable from every non-terminal state. [`execute`] is the
//! task boundary: it always yields a [`MirrorOutcome`], converting panics into
//! `internal fault` failures.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::error::TaskFailure;
use crate::git::GitTransport;
use crate::model::{MirrorOutcome, RepositoryDescriptor};
use crate::process::{redact_url, CommandError};
use crate::provider::{ProviderResult, SourceProvider, TargetProvider};
use crate::workspace::{Workspace, WorkspaceManager};

/// State of a mirror task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Cloning,
    CheckingTarget,
    CreatingTarget,
    Pushing,
    Done,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Cloning => "cloning",
            Self::CheckingTarget => "checking_target",
            Self::CreatingTarget => "creating_target",
            Self::Pushing => "pushing",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Collaborators shared by every task of a run.
#[derive(Clone)]
pub struct MirrorServices {
    pub source: Arc<dyn SourceProvider>,
    pub target: Arc<dyn TargetProvider>,
    pub transport: Arc<dyn GitTransport>,
    pub workspaces: Arc<WorkspaceManager>,
}

/// Transient state owned by one running task.
#[derive(Debug)]
pub struct TaskContext {
    pub workspace: Workspace,
    pub deadline: Instant,
    pub target_name: String,
}

/// Mirror of a single repository.
pub struct MirrorTask {
    repo: RepositoryDescriptor,
    services: Arc<MirrorServices>,
    deadline: Instant,
    state: TaskState,
}

impl MirrorTask {
    pub fn new(
        repo: RepositoryDescriptor,
        services: Arc<MirrorServices>,
        deadline: Instant,
    ) -> Self {
        Self {
            repo,
            services,
            deadline,
            state: TaskState::Pending,
        }
    }

    pub fn state(&self) -> TaskState {
        self.state
    }

    fn transition(&mut self, next: TaskState) {
        debug!(
            repo = %self.repo.path_with_namespace(),
            from = %self.state,
            to = %next,
            "task state change"
        );
        self.state = next;
    }

    /// Drive the task to a terminal state.
    pub async fn run(&mut self) -> Result<(), TaskFailure> {
        if Instant::now() >= self.deadline {
            self.transition(TaskState::Failed);
            return Err(TaskFailure::Cancelled);
        }

        self.transition(TaskState::Cloning);
        let workspace = match self.services.workspaces.allocate(self.repo.path()) {
            Ok(ws) => ws,
            Err(e) => {
                self.transition(TaskState::Failed);
                return Err(TaskFailure::Clone(format!("cannot allocate workspace: {e}")));
            }
        };
        let ctx = TaskContext {
            workspace,
            deadline: self.deadline,
            target_name: self.repo.path().to_string(),
        };

        let result = self.drive(&ctx).await;

        if let Err(e) = ctx.workspace.release() {
            warn!(repo = %self.repo.path(), error = %e, "failed to release workspace");
        }

        match &result {
            Ok(()) => self.transition(TaskState::Done),
            Err(_) => self.transition(TaskState::Failed),
        }
        result
    }

    async fn drive(&mut self, ctx: &TaskContext) -> Result<(), TaskFailure> {
        let services = Arc::clone(&self.services);
        let target = services.target.as_ref();

        let clone_url = services.source.clone_address(&self.repo);
        info!(
            repo = %self.repo.path_with_namespace(),
            url = %redact_url(&clone_url),
            dir = %ctx.workspace.path().display(),
            "clone repo"
        );
        services
            .transport
            .clone_repo(&clone_url, ctx.workspace.path(), target.mirror_mode(), ctx.deadline)
            .await
            .map_err(|e| transfer_failure(e, TaskFailure::Clone))?;

        self.transition(TaskState::CheckingTarget);
        let exists = until_deadline(ctx.deadline, target.repo_exists(&ctx.target_name))
            .await?
            .map_err(|e| TaskFailure::ExistsCheck(e.to_string()))?;

        if exists {
            debug!(repo = %ctx.target_name, target = %target.identifier(), "target repo exists");
        } else {
            self.transition(TaskState::CreatingTarget);
            info!(
                repo = %ctx.target_name,
                target = %target.identifier(),
                "repo not exists, create it"
            );
            until_deadline(
                ctx.deadline,
                target.create_repo(
                    &ctx.target_name,
                    self.repo.description(),
                    self.repo.is_private(),
                ),
            )
            .await?
            .map_err(|e| TaskFailure::Create(e.to_string()))?;
        }

        self.transition(TaskState::Pushing);
        match target.push_address(&ctx.target_name).filter(|a| !a.is_empty()) {
            None => {
                debug!(repo = %ctx.target_name, "target takes no push, clone kept as is");
            }
            Some(push_url) => {
                info!(repo = %ctx.target_name, url = %redact_url(&push_url), "push repo");
                services
                    .transport
                    .push_mirror(ctx.workspace.path(), &push_url, ctx.deadline)
                    .await
                    .map_err(|e| transfer_failure(e, TaskFailure::Push))?;
            }
        }

        Ok(())
    }
}

/// Run one repository through a [`MirrorTask`], never letting a fault escape.
pub async fn execute(
    repo: RepositoryDescriptor,
    services: Arc<MirrorServices>,
    deadline: Instant,
) -> MirrorOutcome {
    let name = repo.path_with_namespace().to_string();
    info!(repo = %name, "mirror repo");

    let mut task = MirrorTask::new(repo, services, deadline);
    match AssertUnwindSafe(task.run()).catch_unwind().await {
        Ok(Ok(())) => {
            info!(repo = %name, "mirror repo success");
            MirrorOutcome::Success
        }
        Ok(Err(failure)) => {
            warn!(repo = %name, reason = %failure, "mirror repo failed");
            MirrorOutcome::failure(failure.to_string())
        }
        Err(payload) => {
            let failure = TaskFailure::InternalFault(panic_message(payload.as_ref()));
            error!(repo = %name, reason = %failure, "mirror task panicked");
            MirrorOutcome::failure(failure.to_string())
        }
    }
}

async fn until_deadline<T>(
    deadline: Instant,
    call: impl Future<Output = ProviderResult<T>>,
) -> Result<ProviderResult<T>, TaskFailure> {
    tokio::time::timeout_at(deadline, call)
        .await
        .map_err(|_| TaskFailure::Cancelled)
}

fn transfer_failure(err: CommandError, wrap: fn(String) -> TaskFailure) -> TaskFailure {
    if err.is_deadline_exceeded() {
        TaskFailure::Cancelled
    } else {
        wrap(err.to_string())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(TaskState::Done.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(!TaskState::Pending.is_terminal());
        assert!(!TaskState::Pushing.is_terminal());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(TaskState::CheckingTarget.to_string(), "checking_target");
        assert_eq!(TaskState::CreatingTarget.to_string(), "creating_target");
    }

    #[test]
    fn test_deadline_maps_to_cancelled() {
        let failure = transfer_failure(CommandError::DeadlineExceeded, TaskFailure::Push);
        assert_eq!(failure, TaskFailure::Cancelled);
    }

    #[test]
    fn test_panic_message_from_str_and_string() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("index out of bounds"));
        assert_eq!(panic_message(payload.as_ref()), "index out of bounds");
        let payload: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(payload.as_ref()), "task panicked");
    }
}

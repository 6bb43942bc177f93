//! Mirror Core Library
//!
//! Lists every repository of a source git host and mirrors each one to a
//! target host with bounded concurrency, a global deadline and per-repository
//! fault isolation. Concrete hosts plug in through [`SourceProvider`] and
//! [`TargetProvider`]; git itself sits behind [`GitTransport`].

pub mod error;
pub mod fakes;
pub mod git;
pub mod model;
pub mod orchestrator;
pub mod process;
pub mod provider;
pub mod task;
pub mod telemetry;
pub mod workspace;

pub use error::{MirrorError, Result, TaskFailure};

pub use git::{GitCli, GitTransport};

pub use model::{
    DescriptorError, MirrorEntry, MirrorOutcome, MirrorReport, ReportCollector,
    RepositoryDescriptor,
};

pub use orchestrator::{
    MirrorOrchestrator, OrchestratorConfig, DEFAULT_MAX_WORKERS, DEFAULT_TIMEOUT_SECS,
};

pub use process::{redact_url, CommandError};

pub use provider::{
    MirrorMode, ProviderError, ProviderResult, RetentionPolicy, SourceProvider, TargetProvider,
};

pub use task::{MirrorServices, MirrorTask, TaskState};

pub use telemetry::{init_tracing, level_for_verbosity};

pub use workspace::{Workspace, WorkspaceManager};

//! In-memory fakes for the provider and transport traits (testing only)
//!
//! Provides `MemorySource`, `MemoryTarget` and `FakeTransport`, which record
//! every call, can be told to fail or panic for chosen repositories, and
//! measure how many transfers overlap.

use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::git::GitTransport;
use crate::model::RepositoryDescriptor;
use crate::process::CommandError;
use crate::provider::{
    MirrorMode, ProviderError, ProviderResult, RetentionPolicy, SourceProvider, TargetProvider,
};

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Source backed by a fixed list of descriptors.
#[derive(Debug, Default)]
pub struct MemorySource {
    repos: Vec<RepositoryDescriptor>,
    list_error: Option<ProviderError>,
    list_calls: AtomicUsize,
}

impl MemorySource {
    pub fn new(repos: Vec<RepositoryDescriptor>) -> Self {
        Self {
            repos,
            ..Default::default()
        }
    }

    /// Source whose repositories are named after `paths`, namespaced under `org/`.
    pub fn with_paths(paths: &[&str]) -> Self {
        let repos = paths
            .iter()
            .map(|p| {
                RepositoryDescriptor::new(*p, format!("org/{p}"), format!("{p} repo"), false)
                    .expect("fake repository paths are non-empty")
            })
            .collect();
        Self::new(repos)
    }

    /// Source whose listing always fails with `err`.
    pub fn failing(err: ProviderError) -> Self {
        Self {
            list_error: Some(err),
            ..Default::default()
        }
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceProvider for MemorySource {
    fn identifier(&self) -> &str {
        "memory"
    }

    async fn list_repos(&self) -> ProviderResult<Vec<RepositoryDescriptor>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        match &self.list_error {
            Some(err) => Err(err.clone()),
            None => Ok(self.repos.clone()),
        }
    }

    fn clone_address(&self, repo: &RepositoryDescriptor) -> String {
        format!("https://source.test/{}.git", repo.path_with_namespace())
    }
}

// ---------------------------------------------------------------------------
// MemoryTarget
// ---------------------------------------------------------------------------

/// Target that keeps the set of existing repositories in memory.
#[derive(Debug, Default)]
pub struct MemoryTarget {
    existing: Mutex<HashSet<String>>,
    exists_checks: Mutex<Vec<String>>,
    created: Mutex<Vec<String>>,
    exists_errors: HashSet<String>,
    create_errors: HashSet<String>,
    panic_on: HashSet<String>,
    call_delay: Duration,
    mode: MirrorMode,
    retention: RetentionPolicy,
    push: bool,
}

impl MemoryTarget {
    /// Bare-mirror target that deletes clones and accepts pushes.
    pub fn new() -> Self {
        Self {
            push: true,
            ..Default::default()
        }
    }

    /// Local-copy sink: working-copy clones, kept on disk, no push.
    pub fn local() -> Self {
        Self {
            mode: MirrorMode::WorkingCopy,
            retention: RetentionPolicy::Keep,
            push: false,
            ..Default::default()
        }
    }

    pub fn with_existing(self, names: &[&str]) -> Self {
        self.existing
            .lock()
            .unwrap()
            .extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn fail_exists_for(mut self, name: &str) -> Self {
        self.exists_errors.insert(name.to_string());
        self
    }

    pub fn fail_create_for(mut self, name: &str) -> Self {
        self.create_errors.insert(name.to_string());
        self
    }

    /// Delay every `repo_exists` and `create_repo` call by `delay`.
    pub fn with_call_delay(mut self, delay: Duration) -> Self {
        self.call_delay = delay;
        self
    }

    /// Panic inside `repo_exists` for `name`.
    pub fn panic_on(mut self, name: &str) -> Self {
        self.panic_on.insert(name.to_string());
        self
    }

    pub fn exists_checks(&self) -> Vec<String> {
        self.exists_checks.lock().unwrap().clone()
    }

    pub fn created(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

#[async_trait]
impl TargetProvider for MemoryTarget {
    fn identifier(&self) -> &str {
        "memory"
    }

    fn mirror_mode(&self) -> MirrorMode {
        self.mode
    }

    fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    async fn repo_exists(&self, name: &str) -> ProviderResult<bool> {
        self.exists_checks.lock().unwrap().push(name.to_string());
        tokio::time::sleep(self.call_delay).await;
        if self.panic_on.contains(name) {
            panic!("simulated fault checking {name}");
        }
        if self.exists_errors.contains(name) {
            return Err(ProviderError::Api {
                status: 500,
                message: "simulated exists failure".to_string(),
            });
        }
        Ok(self.existing.lock().unwrap().contains(name))
    }

    async fn create_repo(
        &self,
        name: &str,
        _description: &str,
        _private: bool,
    ) -> ProviderResult<()> {
        self.created.lock().unwrap().push(name.to_string());
        tokio::time::sleep(self.call_delay).await;
        if self.create_errors.contains(name) {
            return Err(ProviderError::Api {
                status: 403,
                message: "simulated create failure".to_string(),
            });
        }
        self.existing.lock().unwrap().insert(name.to_string());
        Ok(())
    }

    fn push_address(&self, name: &str) -> Option<String> {
        self.push.then(|| format!("https://target.test/{name}.git"))
    }
}

// ---------------------------------------------------------------------------
// FakeTransport
// ---------------------------------------------------------------------------

/// Transport that "clones" by writing a marker file and measures overlap.
#[derive(Debug, Default)]
pub struct FakeTransport {
    clone_delay: Duration,
    push_delay: Duration,
    failing_clones: HashSet<String>,
    failing_pushes: HashSet<String>,
    clones: Mutex<Vec<(String, PathBuf)>>,
    pushes: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

/// Name of the file a fake clone writes into its destination.
pub const CLONE_MARKER: &str = "CLONED";

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clone_delay(mut self, delay: Duration) -> Self {
        self.clone_delay = delay;
        self
    }

    pub fn with_push_delay(mut self, delay: Duration) -> Self {
        self.push_delay = delay;
        self
    }

    /// Fail clones whose URL contains `fragment`.
    pub fn fail_clone_of(mut self, fragment: &str) -> Self {
        self.failing_clones.insert(fragment.to_string());
        self
    }

    /// Fail pushes whose URL contains `fragment`.
    pub fn fail_push_of(mut self, fragment: &str) -> Self {
        self.failing_pushes.insert(fragment.to_string());
        self
    }

    /// `(url, destination)` of every clone, in call order.
    pub fn clones(&self) -> Vec<(String, PathBuf)> {
        self.clones.lock().unwrap().clone()
    }

    /// URLs of every push, in call order.
    pub fn pushes(&self) -> Vec<String> {
        self.pushes.lock().unwrap().clone()
    }

    /// Highest number of simultaneous transfers observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn transfer(&self, delay: Duration, deadline: Instant) -> Result<(), CommandError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let waited = tokio::time::timeout_at(deadline, tokio::time::sleep(delay)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        waited.map_err(|_| CommandError::DeadlineExceeded)
    }
}

fn simulated_failure(command: &str) -> CommandError {
    CommandError::Spawn {
        command: command.to_string(),
        source: io::Error::new(io::ErrorKind::Other, "simulated failure"),
    }
}

#[async_trait]
impl GitTransport for FakeTransport {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        _mode: MirrorMode,
        deadline: Instant,
    ) -> Result<(), CommandError> {
        self.clones
            .lock()
            .unwrap()
            .push((url.to_string(), dest.to_path_buf()));
        self.transfer(self.clone_delay, deadline).await?;
        if self.failing_clones.iter().any(|f| url.contains(f.as_str())) {
            return Err(simulated_failure("git clone"));
        }
        std::fs::write(dest.join(CLONE_MARKER), url).map_err(|source| CommandError::Wait {
            command: "git clone".to_string(),
            source,
        })
    }

    async fn push_mirror(
        &self,
        _repo_dir: &Path,
        url: &str,
        deadline: Instant,
    ) -> Result<(), CommandError> {
        self.pushes.lock().unwrap().push(url.to_string());
        self.transfer(self.push_delay, deadline).await?;
        if self.failing_pushes.iter().any(|f| url.contains(f.as_str())) {
            return Err(simulated_failure("git push"));
        }
        Ok(())
    }
}

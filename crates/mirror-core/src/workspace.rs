//! Scratch directories for mirror runs.
//!
//! A [`WorkspaceManager`] owns the run root (`repos_<timestamp>`) and hands out
//! one [`Workspace`] per task. A workspace removes its directory when released
//! or dropped, including while unwinding from a panic, unless the retention
//! policy is [`RetentionPolicy::Keep`].

use std::io;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, info, warn};

use crate::provider::RetentionPolicy;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Owner of the per-run root directory.
#[derive(Debug)]
pub struct WorkspaceManager {
    root: PathBuf,
    retention: RetentionPolicy,
}

impl WorkspaceManager {
    /// Create `<base>/repos_<timestamp>`.
    pub fn create(base: &Path, retention: RetentionPolicy) -> io::Result<Self> {
        let name = format!("repos_{}", Local::now().format(TIMESTAMP_FORMAT));
        Self::create_named(base, &name, retention)
    }

    /// Create `<base>/<name>` as the run root.
    pub fn create_named(base: &Path, name: &str, retention: RetentionPolicy) -> io::Result<Self> {
        let root = base.join(name);
        std::fs::create_dir_all(&root)?;
        info!(dir = %root.display(), "work dir created");
        Ok(Self { root, retention })
    }

    /// Replace the retention policy applied to the root and later workspaces.
    pub fn with_retention(mut self, retention: RetentionPolicy) -> Self {
        if retention != self.retention {
            debug!(
                dir = %self.root.display(),
                from = ?self.retention,
                to = ?retention,
                "retention policy overridden"
            );
        }
        self.retention = retention;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Allocate a fresh directory for the repository `repo_path`.
    ///
    /// The directory is named `<path>_<timestamp>`; a `-<n>` suffix is added
    /// when that name is already taken.
    pub fn allocate(&self, repo_path: &str) -> io::Result<Workspace> {
        let stem = format!(
            "{}_{}",
            sanitize(repo_path),
            Local::now().format(TIMESTAMP_FORMAT)
        );

        let mut attempt = 0u32;
        loop {
            let name = if attempt == 0 {
                stem.clone()
            } else {
                format!("{stem}-{attempt}")
            };
            let path = self.root.join(name);
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    debug!(dir = %path.display(), "workspace allocated");
                    return Ok(Workspace {
                        path,
                        retention: self.retention,
                        released: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e),
            }
        }
    }

    /// Remove the run root unless clones are retained. Safe to call twice.
    pub fn finish(&self) -> io::Result<()> {
        if self.retention == RetentionPolicy::Keep {
            info!(dir = %self.root.display(), "keeping clone directory");
            return Ok(());
        }
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {
                info!(dir = %self.root.display(), "cleaned up clone directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }
}

/// A task-owned scratch directory.
#[derive(Debug)]
pub struct Workspace {
    path: PathBuf,
    retention: RetentionPolicy,
    released: bool,
}

impl Workspace {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Release the workspace, deleting it unless retention is `Keep`.
    pub fn release(mut self) -> io::Result<()> {
        self.released = true;
        remove_unless_kept(&self.path, self.retention)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = remove_unless_kept(&self.path, self.retention) {
            warn!(dir = %self.path.display(), error = %e, "failed to remove workspace");
        }
    }
}

fn remove_unless_kept(path: &Path, retention: RetentionPolicy) -> io::Result<()> {
    if retention == RetentionPolicy::Keep {
        return Ok(());
    }
    match std::fs::remove_dir_all(path) {
        Ok(()) => {
            debug!(dir = %path.display(), "workspace removed");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Make a repository path safe to use as a single directory name.
fn sanitize(repo_path: &str) -> String {
    let cleaned: String = repo_path
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        cleaned.replace('.', "_")
    } else {
        cleaned
    }
}

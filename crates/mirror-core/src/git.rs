//! Git transfer: the two external commands each mirror task runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::time::Instant;

use crate::process::{self, CommandError};
use crate::provider::MirrorMode;

/// Clone and mirror-push operations used by mirror tasks.
///
/// Both calls must give up once `deadline` passes and report
/// [`CommandError::DeadlineExceeded`].
#[async_trait]
pub trait GitTransport: Send + Sync {
    /// Clone `url` into the (empty) directory `dest`.
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        mode: MirrorMode,
        deadline: Instant,
    ) -> Result<(), CommandError>;

    /// Push every ref of the repository at `repo_dir` to `url`.
    async fn push_mirror(
        &self,
        repo_dir: &Path,
        url: &str,
        deadline: Instant,
    ) -> Result<(), CommandError>;
}

/// [`GitTransport`] backed by the `git` command line.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific git executable.
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn program(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }
}

/// Arguments of the clone command for `mode`.
pub fn clone_args<'a>(url: &'a str, dest: &'a str, mode: MirrorMode) -> Vec<&'a str> {
    match mode {
        MirrorMode::Bare => vec!["clone", "--bare", url, dest],
        MirrorMode::WorkingCopy => vec!["clone", url, dest],
    }
}

#[async_trait]
impl GitTransport for GitCli {
    async fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        mode: MirrorMode,
        deadline: Instant,
    ) -> Result<(), CommandError> {
        let dest = dest.to_string_lossy();
        let args = clone_args(url, &dest, mode);
        process::run_until(&self.program(), &args, None, deadline).await
    }

    async fn push_mirror(
        &self,
        repo_dir: &Path,
        url: &str,
        deadline: Instant,
    ) -> Result<(), CommandError> {
        process::run_until(
            &self.program(),
            &["push", "--mirror", url],
            Some(repo_dir),
            deadline,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_clone_args() {
        assert_eq!(
            clone_args("https://h/a.git", "/tmp/a", MirrorMode::Bare),
            vec!["clone", "--bare", "https://h/a.git", "/tmp/a"]
        );
    }

    #[test]
    fn test_working_copy_clone_args() {
        assert_eq!(
            clone_args("https://h/a.git", "/tmp/a", MirrorMode::WorkingCopy),
            vec!["clone", "https://h/a.git", "/tmp/a"]
        );
    }

    #[test]
    fn test_default_program_is_git() {
        assert_eq!(GitCli::new().program(), "git");
        assert_eq!(GitCli::with_program("/usr/bin/git").program(), "/usr/bin/git");
    }
}

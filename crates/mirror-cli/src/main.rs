//! mirror-git - mirror every repository of one git hosting account to another
//!
//! Lists the repositories of `--source`, then clones each one and pushes it
//! to `--target` with at most `--workers` transfers in flight, stopping new
//! work once `--timeout` seconds have passed.
//!
//! Credentials come from the environment (or a `.env` file):
//!
//! - `github`: `GITHUB_USERNAME`, `GITHUB_ACCESS_TOKEN`, `GITHUB_IS_ORG`
//! - `gitlab`: `GITLAB_USERNAME`, `GITLAB_ACCESS_TOKEN`
//! - `gitee`: `GITEE_USERNAME`, `GITEE_ACCESS_TOKEN`
//! - `e_gitee_v8`: `E_GITEE_V8_ENTERPRISE_ID`, `E_GITEE_V8_USERNAME`,
//!   `E_GITEE_V8_ACCESS_TOKEN`

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use mirror_core::{
    init_tracing, level_for_verbosity, GitCli, MirrorError, MirrorOrchestrator, MirrorReport,
    OrchestratorConfig, WorkspaceManager, DEFAULT_MAX_WORKERS, DEFAULT_TIMEOUT_SECS,
};
use mirror_providers::{build_source, build_target, env_lookup, ProviderKind};
use serde::Serialize;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "mirror-git")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Mirror all repositories of a git hosting account", long_about = None)]
struct Cli {
    /// Source git service (github, e_gitee_v8)
    #[arg(long, default_value = "e_gitee_v8")]
    source: ProviderKind,

    /// Target git service (github, gitlab, gitee, local)
    #[arg(long, default_value = "github")]
    target: ProviderKind,

    /// Global timeout in seconds
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECS)]
    timeout: u64,

    /// Maximum number of repositories mirrored at once
    #[arg(long, default_value_t = DEFAULT_MAX_WORKERS)]
    workers: usize,

    /// Parent directory of the clone directory (default: system temp dir)
    #[arg(long)]
    work_dir: Option<PathBuf>,

    /// Write the run report as JSON to this file
    #[arg(long)]
    report: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_workers: self.workers,
            timeout: Duration::from_secs(self.timeout),
        }
    }
}

/// JSON document written by `--report`.
#[derive(Serialize)]
struct RunReport<'a> {
    source: ProviderKind,
    target: ProviderKind,
    succeeded: usize,
    failed: usize,
    #[serde(flatten)]
    report: &'a MirrorReport,
}

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.json, level_for_verbosity(cli.verbose));
    if let Ok(path) = dotenv {
        debug!(path = %path.display(), "loaded environment file");
    }

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = format!("{e:#}"), "mirror failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let source = build_source(cli.source, &env_lookup)
        .with_context(|| format!("invalid source `{}`", cli.source))?;
    let target = build_target(cli.target, &env_lookup)
        .with_context(|| format!("invalid target `{}`", cli.target))?;

    let base = cli.work_dir.clone().unwrap_or_else(std::env::temp_dir);
    let workspaces = WorkspaceManager::create(&base, target.retention())
        .map_err(|source| MirrorError::Workspace {
            path: base.clone(),
            source,
        })?;

    let orchestrator = MirrorOrchestrator::new(
        source,
        target,
        Arc::new(GitCli::new()),
        workspaces,
        cli.orchestrator_config(),
    );
    let report = orchestrator.run().await?;

    if let Some(path) = &cli.report {
        write_report(path, cli, &report)?;
        info!(path = %path.display(), "report written");
    }
    Ok(())
}

fn write_report(path: &Path, cli: &Cli, report: &MirrorReport) -> Result<()> {
    let doc = RunReport {
        source: cli.source,
        target: cli.target,
        succeeded: report.success_count(),
        failed: report.failure_count(),
        report,
    };
    let json = serde_json::to_string_pretty(&doc).context("serialize report")?;
    std::fs::write(path, json).with_context(|| format!("write report {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_core::{MirrorEntry, MirrorOutcome, RepositoryDescriptor};

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["mirror-git"]).unwrap();
        assert_eq!(cli.source, ProviderKind::EGiteeV8);
        assert_eq!(cli.target, ProviderKind::Github);
        assert_eq!(cli.timeout, 3600);
        assert_eq!(cli.workers, 5);
        assert_eq!(cli.verbose, 0);
        assert!(cli.report.is_none());
    }

    #[test]
    fn test_flags() {
        let cli = Cli::try_parse_from([
            "mirror-git",
            "--source",
            "github",
            "--target",
            "local",
            "--timeout",
            "60",
            "--workers",
            "2",
            "-vv",
            "--json",
        ])
        .unwrap();
        assert_eq!(cli.source, ProviderKind::Github);
        assert_eq!(cli.target, ProviderKind::Local);
        assert_eq!(cli.verbose, 2);
        assert!(cli.json);
        let cfg = cli.orchestrator_config();
        assert_eq!(cfg.max_workers, 2);
        assert_eq!(cfg.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        assert!(Cli::try_parse_from(["mirror-git", "--target", "bitbucket"]).is_err());
    }

    #[tokio::test]
    async fn test_wrong_role_fails_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let cli = Cli::try_parse_from([
            "mirror-git",
            "--source",
            "local",
            "--target",
            "local",
            "--work-dir",
            dir.path().to_str().unwrap(),
        ])
        .unwrap();
        let err = run(&cli).await.unwrap_err();
        assert!(format!("{err:#}").contains("cannot be used as a source"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let cli = Cli::try_parse_from(["mirror-git"]).unwrap();
        let report = MirrorReport::new(
            vec![MirrorEntry {
                repository: RepositoryDescriptor::new("api", "acme/api", "", true).unwrap(),
                outcome: MirrorOutcome::failure("push failed: exit status: 128"),
            }],
            vec![RepositoryDescriptor::new("web", "acme/web", "", true).unwrap()],
            chrono::Utc::now(),
        );

        write_report(&path, &cli, &report).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["source"], "e_gitee_v8");
        assert_eq!(json["target"], "github");
        assert_eq!(json["failed"], 1);
        assert_eq!(json["entries"][0]["outcome"]["status"], "failure");
        assert_eq!(json["not_attempted"][0]["path"], "web");
    }
}

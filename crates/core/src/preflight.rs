//! Pre-flight checks for the external tools a migration needs.
//!
//! Every repository migration shells out to `git` and `git filter-repo`.
//! Checking both up front turns a missing tool into one clear message
//! before any destination repository is created.

use std::fmt;

use tracing::{debug, warn};

use crate::errors::MirrorError;
use crate::mirror::{GitInvocation, GitRunner, ProcessGitRunner};

/// Availability of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolStatus {
    Available { version: String },
    Missing { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub name: &'static str,
    pub status: ToolStatus,
}

impl ToolCheck {
    pub fn is_available(&self) -> bool {
        matches!(self.status, ToolStatus::Available { .. })
    }
}

impl fmt::Display for ToolCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            ToolStatus::Available { version } => write!(f, "{}: {}", self.name, version),
            ToolStatus::Missing { reason } => write!(f, "{}: missing ({})", self.name, reason),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreflightReport {
    pub checks: Vec<ToolCheck>,
}

impl PreflightReport {
    pub fn all_available(&self) -> bool {
        self.checks.iter().all(ToolCheck::is_available)
    }

    pub fn missing(&self) -> impl Iterator<Item = &ToolCheck> {
        self.checks.iter().filter(|c| !c.is_available())
    }

    /// Error naming every missing tool, if any.
    pub fn ensure_ready(&self) -> Result<(), MirrorError> {
        let missing: Vec<&str> = self.missing().map(|c| c.name).collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(MirrorError::BinaryNotFound(missing.join(", ")))
        }
    }
}

/// Check `git` and `git filter-repo` using the given binary.
pub async fn check_tools(git_binary: &str) -> PreflightReport {
    check_tools_with(&ProcessGitRunner::new(git_binary)).await
}

/// Same as [`check_tools`] over any runner.
pub async fn check_tools_with<R: GitRunner>(runner: &R) -> PreflightReport {
    let checks = vec![
        probe(runner, "git", &["--version"]).await,
        probe(runner, "git filter-repo", &["filter-repo", "--version"]).await,
    ];
    PreflightReport { checks }
}

async fn probe<R: GitRunner>(runner: &R, name: &'static str, args: &[&str]) -> ToolCheck {
    let status = match runner.run(&GitInvocation::new(args.iter().copied())).await {
        Ok(out) if out.success() => {
            let version = out.stdout.trim().to_string();
            debug!(tool = name, version = %version, "preflight passed");
            ToolStatus::Available { version }
        }
        Ok(out) => {
            let reason = format!("exit code {}: {}", out.exit_code, out.stderr.trim());
            warn!(tool = name, %reason, "preflight failed");
            ToolStatus::Missing { reason }
        }
        Err(e) => {
            warn!(tool = name, error = %e, "preflight failed");
            ToolStatus::Missing {
                reason: e.to_string(),
            }
        }
    };
    ToolCheck { name, status }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::testing::RecordingRunner;

    #[tokio::test]
    async fn test_all_available() {
        let runner = RecordingRunner::new();
        let report = check_tools_with(&runner).await;
        assert!(report.all_available());
        report.ensure_ready().unwrap();
        assert_eq!(runner.calls()[1].args, ["filter-repo", "--version"]);
    }

    #[tokio::test]
    async fn test_missing_filter_repo_reported() {
        let runner = RecordingRunner::new().fail_on(
            "filter-repo",
            1,
            "git: 'filter-repo' is not a git command.",
        );
        let report = check_tools_with(&runner).await;
        assert!(!report.all_available());
        let missing: Vec<_> = report.missing().collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].name, "git filter-repo");
        assert!(missing[0].to_string().contains("not a git command"));
        assert!(matches!(
            report.ensure_ready(),
            Err(MirrorError::BinaryNotFound(ref names)) if names == "git filter-repo"
        ));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let report = check_tools("no-such-git-binary-for-preflight").await;
        assert_eq!(report.missing().count(), 2);
    }
}

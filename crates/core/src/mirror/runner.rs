//! The git subprocess seam.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::MirrorError;
use crate::remote_url::redact_args;

/// One git command: arguments (without the binary), working directory and
/// extra environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInvocation {
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
}

impl GitInvocation {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            args: args.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn in_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    /// The subcommand name, e.g. `clone`.
    pub fn subcommand(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    /// Loggable command line with credentials masked.
    pub fn display(&self) -> String {
        format!("git {}", redact_args(&self.args))
    }
}

/// Captured result of a git command. A non-zero `exit_code` is not an error
/// at this level; the caller decides what a failure means.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs git commands. Implemented over real subprocesses by
/// [`ProcessGitRunner`]; tests substitute a recording fake.
#[async_trait]
pub trait GitRunner: Send + Sync {
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, MirrorError>;
}

/// Spawns the configured git binary through `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessGitRunner {
    binary: String,
}

impl ProcessGitRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for ProcessGitRunner {
    fn default() -> Self {
        Self::new("git")
    }
}

#[async_trait]
impl GitRunner for ProcessGitRunner {
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, MirrorError> {
        let mut cmd = Command::new(&self.binary);
        cmd.args(&invocation.args)
            // Fail instead of prompting for credentials.
            .env("GIT_TERMINAL_PROMPT", "0")
            .envs(invocation.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        debug!(cmd = %invocation.display(), cwd = ?invocation.cwd, "running git command");
        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MirrorError::BinaryNotFound(self.binary.clone())
            } else {
                MirrorError::IoError(e)
            }
        })?;

        let exit_code = output.status.code().unwrap_or(-1);
        if exit_code != 0 {
            warn!(exit_code, cmd = %invocation.display(), "git command exited non-zero");
        }
        Ok(GitOutput {
            exit_code,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

//! In-memory [`GitRunner`] that records every invocation.

use std::sync::Mutex;

use async_trait::async_trait;

use super::runner::{GitInvocation, GitOutput, GitRunner};
use crate::errors::MirrorError;

#[derive(Debug, Default)]
pub(crate) struct RecordingRunner {
    calls: Mutex<Vec<GitInvocation>>,
    failure: Option<(String, i32, String)>,
    refs: Vec<String>,
    empty: bool,
}

impl RecordingRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the first argument `subcommand` exit with `exit_code`.
    pub(crate) fn fail_on(mut self, subcommand: &str, exit_code: i32, stderr: &str) -> Self {
        self.failure = Some((subcommand.into(), exit_code, stderr.into()));
        self
    }

    /// Refs reported to `for-each-ref <prefix>` listings.
    pub(crate) fn with_refs(mut self, refs: &[&str]) -> Self {
        self.refs = refs.iter().map(|r| r.to_string()).collect();
        self
    }

    /// Report no refs after clone.
    pub(crate) fn empty_repository(mut self) -> Self {
        self.empty = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<GitInvocation> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn subcommands(&self) -> Vec<String> {
        self.calls()
            .iter()
            .filter_map(|c| c.subcommand().map(str::to_string))
            .collect()
    }
}

#[async_trait]
impl GitRunner for RecordingRunner {
    async fn run(&self, invocation: &GitInvocation) -> Result<GitOutput, MirrorError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let sub = invocation.subcommand().unwrap_or_default();

        if let Some((fail_sub, exit_code, stderr)) = &self.failure {
            if fail_sub == sub {
                return Ok(GitOutput {
                    exit_code: *exit_code,
                    stdout: String::new(),
                    stderr: stderr.clone(),
                });
            }
        }

        let stdout = match sub {
            "for-each-ref" if prefix_listing(invocation).is_some() => {
                let prefix = prefix_listing(invocation).unwrap_or_default();
                self.refs
                    .iter()
                    .filter(|r| r.starts_with(prefix))
                    .cloned()
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            "for-each-ref" if self.empty => String::new(),
            "for-each-ref" => "refs/heads/main\n".to_string(),
            _ => String::new(),
        };
        Ok(GitOutput {
            exit_code: 0,
            stdout,
            stderr: String::new(),
        })
    }
}

/// The `refs/.../` pattern of a `for-each-ref` listing, if any.
fn prefix_listing(invocation: &GitInvocation) -> Option<&str> {
    invocation
        .args
        .last()
        .map(String::as_str)
        .filter(|a| a.starts_with("refs/") && a.ends_with('/'))
}

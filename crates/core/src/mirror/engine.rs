//! Clone, filter, rewrite and push one repository's full history.

use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::runner::{GitInvocation, GitOutput, GitRunner};
use crate::config::MirrorConfig;
use crate::errors::MirrorError;
use crate::identity::IdentityRemapper;
use crate::remote_url::{redact_text, redact_url};

const ORIGINAL_REFS: &str = "refs/original/";
const REPLACE_REFS: &str = "refs/replace/";

/// Drives git over an exclusively owned mirror clone. The operations are
/// meant to run in declaration order on the same directory.
#[derive(Debug)]
pub struct MirrorEngine<R> {
    runner: R,
    blob_size_limit_bytes: u64,
}

impl<R: GitRunner> MirrorEngine<R> {
    pub fn new(runner: R, blob_size_limit_bytes: u64) -> Self {
        Self {
            runner,
            blob_size_limit_bytes,
        }
    }

    pub fn from_config(runner: R, config: &MirrorConfig) -> Self {
        Self::new(runner, config.blob_size_limit_bytes)
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `git clone --mirror <url> <dir>`: every ref, no working tree.
    #[instrument(skip(self, clone_url), fields(dir = %dir.display()))]
    pub async fn clone_mirror(&self, clone_url: &str, dir: &Path) -> Result<(), MirrorError> {
        let target = path_arg(dir);
        let inv = GitInvocation::new(["clone", "--mirror", clone_url, target.as_str()]);
        self.run_step("clone --mirror", inv).await?;
        info!(url = %redact_url(clone_url), "mirror clone complete");
        Ok(())
    }

    /// Whether the clone has any refs at all. An empty source repository
    /// has nothing to filter or rewrite.
    pub async fn has_refs(&self, dir: &Path) -> Result<bool, MirrorError> {
        let inv = GitInvocation::new(["for-each-ref", "--count=1", "--format=%(refname)"]).in_dir(dir);
        let out = self.run_step("for-each-ref", inv).await?;
        Ok(!out.stdout.trim().is_empty())
    }

    /// Remove every blob larger than the configured limit from all history.
    #[instrument(skip(self), fields(dir = %dir.display(), limit = self.blob_size_limit_bytes))]
    pub async fn strip_large_blobs(&self, dir: &Path) -> Result<(), MirrorError> {
        let threshold = format!("{}B", self.blob_size_limit_bytes);
        let inv = GitInvocation::new([
            "filter-repo",
            "--force",
            "--strip-blobs-bigger-than",
            threshold.as_str(),
            "--replace-refs",
            "delete-no-add",
        ])
        .in_dir(dir);
        let out = self.run_step("filter-repo", inv).await?;
        info!(report = %step_report(&out), "large blobs stripped");
        Ok(())
    }

    /// Rewrite legacy author/committer identities on every branch and tag,
    /// then drop the backup refs filter-branch leaves behind.
    #[instrument(skip(self, remapper), fields(dir = %dir.display()))]
    pub async fn rewrite_identities(
        &self,
        dir: &Path,
        remapper: &IdentityRemapper,
    ) -> Result<(), MirrorError> {
        if remapper.is_noop() {
            info!("no legacy identities configured, history left as is");
            return Ok(());
        }

        let script = remapper.env_filter_script();
        let inv = GitInvocation::new([
            "filter-branch",
            "-f",
            "--env-filter",
            script.as_str(),
            "--tag-name-filter",
            "cat",
            "--",
            "--branches",
            "--tags",
        ])
        .in_dir(dir)
        .env("FILTER_BRANCH_SQUELCH_WARNING", "1");
        let out = self.run_step("filter-branch", inv).await?;

        let removed = self.prune_refs(dir, ORIGINAL_REFS).await?;
        info!(
            legacy_names = remapper.legacy_names().len(),
            backup_refs_removed = removed,
            report = %step_report(&out),
            "identities rewritten"
        );
        Ok(())
    }

    /// Delete every ref under `prefix`.
    async fn prune_refs(&self, dir: &Path, prefix: &str) -> Result<usize, MirrorError> {
        let list = GitInvocation::new(["for-each-ref", "--format=%(refname)", prefix]).in_dir(dir);
        let out = self.run_step("for-each-ref", list).await?;
        let refs: Vec<&str> = out
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        for r in &refs {
            let del = GitInvocation::new(["update-ref", "-d", r]).in_dir(dir);
            self.run_step("update-ref -d", del).await?;
        }
        Ok(refs.len())
    }

    /// Large-file storage conversion hook. Performs no transformation.
    pub async fn migrate_lfs(&self, dir: &Path) -> Result<(), MirrorError> {
        debug!(dir = %dir.display(), "LFS conversion not enabled, skipping");
        Ok(())
    }

    /// `git push --mirror <url>`: every ref, including deletions. Replace
    /// refs are dropped first; they point at pre-rewrite commits.
    #[instrument(skip(self, push_url), fields(dir = %dir.display()))]
    pub async fn push_mirror(&self, dir: &Path, push_url: &str) -> Result<(), MirrorError> {
        let replaced = self.prune_refs(dir, REPLACE_REFS).await?;
        if replaced > 0 {
            info!(replace_refs_removed = replaced, "dropped replace refs before push");
        }
        let inv = GitInvocation::new(["push", "--mirror", push_url]).in_dir(dir);
        self.run_step("push --mirror", inv).await?;
        info!(url = %redact_url(push_url), "mirror pushed");
        Ok(())
    }

    async fn run_step(
        &self,
        step: &'static str,
        inv: GitInvocation,
    ) -> Result<GitOutput, MirrorError> {
        debug!(step, cmd = %inv.display(), "git step starting");
        let out = self.runner.run(&inv).await?;
        if !out.success() {
            let stderr = redact_text(&out.stderr);
            warn!(step, exit_code = out.exit_code, stderr = %stderr.trim(), "git step failed");
            return Err(MirrorError::CommandFailed {
                step,
                exit_code: out.exit_code,
                stdout: redact_text(&out.stdout),
                stderr,
            });
        }
        debug!(
            step,
            stdout = %redact_text(out.stdout.trim()),
            stderr = %redact_text(out.stderr.trim()),
            "git step finished"
        );
        Ok(out)
    }
}

/// Last non-empty line of git's output, stderr first. filter-repo and
/// filter-branch both end with a one-line summary.
fn step_report(out: &GitOutput) -> String {
    let text = if out.stderr.trim().is_empty() {
        &out.stdout
    } else {
        &out.stderr
    };
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .map(redact_text)
        .unwrap_or_default()
}

fn path_arg(dir: &Path) -> String {
    dir.to_string_lossy().into_owned()
}

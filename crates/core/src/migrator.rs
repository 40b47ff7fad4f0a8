//! Per-repository migration pipeline and the batch run over a listing.
//!
//! Each repository moves through [`MigrationPhase`]s:
//!
//! 1. Translate the source name and check the destination.
//! 2. Create the destination when it is absent (rate limited).
//! 3. Mirror-clone into a freshly reset working directory.
//! 4. Strip oversized blobs, rewrite legacy identities, run the LFS hook.
//! 5. Unarchive if needed, push every ref, archive again.
//! 6. Delete the working directory.
//!
//! A failure aborts only the repository it happened in. Nothing is
//! persisted between runs; a re-run re-derives where to start from the
//! destination status, so an existing destination is never created twice.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use crate::config::AppConfig;
use crate::destination::GitHubClient;
use crate::errors::{MigrationError, MigrationErrorKind, WorkspaceError};
use crate::identity::IdentityRemapper;
use crate::mirror::{GitRunner, MirrorEngine};
use crate::models::{
    MigrationPhase, MigrationState, RepoOutcome, RepoReport, RepositoryRecord, RunSummary,
};
use crate::naming::NameTranslator;
use crate::rate_limit::RateLimiter;
use crate::source::SourceListing;
use crate::workspace::WorkspaceRoot;

/// Run-wide switches.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    /// Create destinations as private repositories.
    pub private: bool,
    /// Report populated destinations as skipped instead of re-pushing.
    pub skip_populated: bool,
    /// Translate and check destinations only.
    pub dry_run: bool,
    /// When non-empty, only these source names are migrated.
    pub only: Vec<String>,
}

impl MigrationOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            private: config.destination.private,
            skip_populated: config.migration.skip_populated,
            dry_run: false,
            only: Vec::new(),
        }
    }
}

/// Migrates repositories from the source catalog to the destination.
pub struct Migrator<R> {
    destination: GitHubClient,
    engine: MirrorEngine<R>,
    translator: NameTranslator,
    remapper: IdentityRemapper,
    limiter: Arc<RateLimiter>,
    workspace: WorkspaceRoot,
    options: MigrationOptions,
}

impl<R: GitRunner> Migrator<R> {
    pub fn new(
        config: &AppConfig,
        destination: GitHubClient,
        engine: MirrorEngine<R>,
    ) -> Result<Self, WorkspaceError> {
        let workspace = WorkspaceRoot::new(&config.migration.work_dir)?;
        info!(
            work_dir = %workspace.root().display(),
            owner = %destination.owner(),
            "initializing migrator"
        );
        Ok(Self {
            destination,
            engine,
            translator: NameTranslator::new(&config.destination.name_prefix),
            remapper: IdentityRemapper::from_config(&config.identity),
            limiter: Arc::new(RateLimiter::new(config.migration.min_create_interval())),
            workspace,
            options: MigrationOptions::from_config(config),
        })
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.options.dry_run = dry_run;
        self
    }

    pub fn with_only(mut self, only: Vec<String>) -> Self {
        self.options.only = only;
        self
    }

    /// Share a limiter with other migrators.
    pub fn with_rate_limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = limiter;
        self
    }

    /// The records this migrator will process, after the `only` filter.
    pub fn select<'a>(&self, records: &'a [RepositoryRecord]) -> Vec<&'a RepositoryRecord> {
        if self.options.only.is_empty() {
            return records.iter().collect();
        }
        let only: HashSet<&str> = self.options.only.iter().map(String::as_str).collect();
        records
            .iter()
            .filter(|r| only.contains(r.source_name.as_str()))
            .collect()
    }

    /// Migrate one repository end to end.
    #[instrument(skip(self, record), fields(repo = %record.source_name))]
    pub async fn migrate(&self, record: &RepositoryRecord) -> Result<RepoOutcome, MigrationError> {
        let mut state = MigrationState::new(record.source_name.as_str());

        let destination = self
            .translator
            .translate(&record.source_name)
            .map_err(|e| state.fail(e))?;
        let name = destination.as_str();
        debug!(destination = name, "translated name");

        let status = self
            .destination
            .repository_status(name)
            .await
            .map_err(|e| state.fail(MigrationErrorKind::DestinationQuery(e)))?;
        state.advance(MigrationPhase::DestinationChecked)?;
        info!(destination = name, status = %status, "destination checked");

        if self.options.dry_run {
            return Ok(RepoOutcome::Skipped {
                destination: name.to_string(),
                reason: format!("dry run, destination {}", status),
            });
        }
        if self.options.skip_populated && status.is_populated() {
            info!(destination = name, "destination already populated, skipping");
            return Ok(RepoOutcome::Skipped {
                destination: name.to_string(),
                reason: format!("destination {}", status),
            });
        }

        let created = if status.exists() {
            debug!(destination = name, "destination exists, creation skipped");
            false
        } else {
            self.limiter.acquire().await;
            let result = self
                .destination
                .create_repository(name, self.options.private)
                .await;
            self.limiter.mark().await;
            result.map_err(|e| state.fail(MigrationErrorKind::DestinationCreate(e)))?;
            state.advance(MigrationPhase::DestinationCreated)?;
            true
        };

        let workspace = self.workspace.claim(name).map_err(|e| state.fail(e))?;
        workspace.reset().await.map_err(|e| state.fail(e))?;
        state.working_dir = Some(workspace.path().to_path_buf());
        let dir = workspace.path();

        self.engine
            .clone_mirror(&record.clone_url, dir)
            .await
            .map_err(|e| state.fail(e))?;
        state.advance(MigrationPhase::Cloned)?;

        let has_history = self.engine.has_refs(dir).await.map_err(|e| state.fail(e))?;
        if has_history {
            self.engine
                .strip_large_blobs(dir)
                .await
                .map_err(|e| state.fail(e))?;
            state.advance(MigrationPhase::Filtered)?;

            self.engine
                .rewrite_identities(dir, &self.remapper)
                .await
                .map_err(|e| state.fail(e))?;
            state.advance(MigrationPhase::Rewritten)?;

            self.engine.migrate_lfs(dir).await.map_err(|e| state.fail(e))?;
        } else {
            info!(destination = name, "source repository has no refs, nothing to rewrite");
        }

        let mut warnings = Vec::new();
        if status.is_archived() {
            if let Err(e) = self.destination.set_archived(name, false).await {
                warn!(destination = name, error = %e, "unarchive failed");
                warnings.push(e.to_string());
            }
        }
        state.advance(MigrationPhase::Unarchived)?;

        if has_history {
            let push_url = self.destination.push_url(name);
            self.engine
                .push_mirror(dir, &push_url)
                .await
                .map_err(|e| state.fail(e))?;
            state.advance(MigrationPhase::Pushed)?;
        }

        if let Err(e) = self.destination.set_archived(name, true).await {
            warn!(destination = name, error = %e, "archive failed");
            warnings.push(e.to_string());
        }
        state.advance(MigrationPhase::Archived)?;

        if let Err(e) = workspace.remove().await {
            warn!(destination = name, error = %e, "working directory cleanup failed");
            warnings.push(e.to_string());
        }
        state.advance(MigrationPhase::CleanedUp)?;

        info!(
            destination = name,
            created,
            warnings = warnings.len(),
            "repository migrated"
        );
        Ok(RepoOutcome::Migrated {
            destination: name.to_string(),
            created,
            warnings,
        })
    }

    /// Migrate every selected record in order. Per-repository failures are
    /// logged, reported to `observer` and counted; they never stop the batch.
    pub async fn run<F>(&self, records: &[RepositoryRecord], mut observer: F) -> RunSummary
    where
        F: FnMut(&RepoReport),
    {
        let selected = self.select(records);
        info!(
            total = selected.len(),
            dry_run = self.options.dry_run,
            "starting migration run"
        );

        let mut summary = RunSummary::new(true);
        for record in selected {
            let result = self.migrate(record).await;
            if let Err(e) = &result {
                error!(
                    repo = %e.source_name,
                    phase = %e.phase,
                    error = %e.kind,
                    "repository migration failed"
                );
            }
            let report = RepoReport {
                source_name: record.source_name.clone(),
                result,
            };
            summary.record(&report);
            observer(&report);
        }
        summary.finish();

        info!(
            succeeded = summary.succeeded.len(),
            failed = summary.failed.len(),
            skipped = summary.skipped.len(),
            warnings = summary.warnings,
            "migration run complete"
        );
        summary
    }

    /// [`run`](Self::run) over a source listing, carrying its completeness
    /// into the summary.
    pub async fn run_listing<F>(&self, listing: &SourceListing, observer: F) -> RunSummary
    where
        F: FnMut(&RepoReport),
    {
        if let Some(e) = &listing.incomplete {
            warn!(error = %e, "source listing incomplete, migrating the repositories that were listed");
        }
        let mut summary = self.run(&listing.repositories, observer).await;
        summary.listing_complete = listing.is_complete();
        summary
    }
}

//! Domain model types used throughout repomigrate.
//!
//! These types bridge the source lister, the migrator and the CLI.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{MigrationError, MigrationErrorKind};
use crate::remote_url::redact_url;

// ---------------------------------------------------------------------------
// Repository record
// ---------------------------------------------------------------------------

/// One repository from the source catalog.
///
/// The clone URL carries source credentials, so `Debug` redacts it.
#[derive(Clone, PartialEq, Eq)]
pub struct RepositoryRecord {
    pub source_name: String,
    pub clone_url: String,
}

impl RepositoryRecord {
    pub fn new(source_name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            clone_url: clone_url.into(),
        }
    }
}

impl fmt::Debug for RepositoryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryRecord")
            .field("source_name", &self.source_name)
            .field("clone_url", &redact_url(&self.clone_url))
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// What the destination provider currently holds under a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationStatus {
    /// No repository under this name.
    Absent,
    /// The repository exists but has no content yet.
    Empty { archived: bool },
    /// The repository exists and already has content.
    Populated { size_kb: u64, archived: bool },
}

impl DestinationStatus {
    pub fn exists(&self) -> bool {
        !matches!(self, Self::Absent)
    }

    pub fn is_populated(&self) -> bool {
        matches!(self, Self::Populated { .. })
    }

    pub fn is_archived(&self) -> bool {
        matches!(
            self,
            Self::Empty { archived: true } | Self::Populated { archived: true, .. }
        )
    }
}

impl fmt::Display for DestinationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Empty { archived: false } => write!(f, "empty"),
            Self::Empty { archived: true } => write!(f, "empty (archived)"),
            Self::Populated {
                size_kb,
                archived: false,
            } => write!(f, "populated ({} KiB)", size_kb),
            Self::Populated {
                size_kb,
                archived: true,
            } => write!(f, "populated ({} KiB, archived)", size_kb),
        }
    }
}

// ---------------------------------------------------------------------------
// Migration state machine
// ---------------------------------------------------------------------------

/// Phases of a single repository migration, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationPhase {
    Listed,
    DestinationChecked,
    DestinationCreated,
    Cloned,
    Filtered,
    Rewritten,
    Unarchived,
    Pushed,
    Archived,
    CleanedUp,
}

impl fmt::Display for MigrationPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Listed => "listed",
            Self::DestinationChecked => "destination_checked",
            Self::DestinationCreated => "destination_created",
            Self::Cloned => "cloned",
            Self::Filtered => "filtered",
            Self::Rewritten => "rewritten",
            Self::Unarchived => "unarchived",
            Self::Pushed => "pushed",
            Self::Archived => "archived",
            Self::CleanedUp => "cleaned_up",
        };
        f.write_str(s)
    }
}

/// Transient per-attempt state. Never persisted: a re-run re-derives its
/// starting point from the destination status.
#[derive(Debug, Clone)]
pub struct MigrationState {
    pub source_name: String,
    pub phase: MigrationPhase,
    pub working_dir: Option<PathBuf>,
}

impl MigrationState {
    pub fn new(source_name: impl Into<String>) -> Self {
        Self {
            source_name: source_name.into(),
            phase: MigrationPhase::Listed,
            working_dir: None,
        }
    }

    /// Move to `next`. Phases may be skipped but never revisited.
    pub fn advance(&mut self, next: MigrationPhase) -> Result<(), MigrationError> {
        if next <= self.phase {
            return Err(self.fail(MigrationErrorKind::InvalidTransition {
                from: self.phase,
                to: next,
            }));
        }
        self.phase = next;
        Ok(())
    }

    /// Build a [`MigrationError`] stamped with the current phase.
    pub fn fail(&self, kind: impl Into<MigrationErrorKind>) -> MigrationError {
        MigrationError::new(self.source_name.clone(), self.phase, kind)
    }
}

// ---------------------------------------------------------------------------
// Outcomes & summary
// ---------------------------------------------------------------------------

/// How a repository migration ended when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoOutcome {
    /// History was pushed. `created` is false when the destination already
    /// existed. Non-fatal problems (archive toggles) are in `warnings`.
    Migrated {
        destination: String,
        created: bool,
        warnings: Vec<String>,
    },
    /// Nothing was mutated.
    Skipped { destination: String, reason: String },
}

/// The result of one repository, handed to the run observer.
#[derive(Debug)]
pub struct RepoReport {
    pub source_name: String,
    pub result: Result<RepoOutcome, MigrationError>,
}

/// A failed repository as recorded in the run summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedRepo {
    pub source_name: String,
    pub phase: MigrationPhase,
    pub error: String,
}

/// Aggregate result of a whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedRepo>,
    pub skipped: Vec<String>,
    pub warnings: usize,
    /// False when the source listing stopped early.
    pub listing_complete: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    pub fn new(listing_complete: bool) -> Self {
        Self {
            succeeded: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            warnings: 0,
            listing_complete,
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn record(&mut self, report: &RepoReport) {
        match &report.result {
            Ok(RepoOutcome::Migrated { warnings, .. }) => {
                self.succeeded.push(report.source_name.clone());
                self.warnings += warnings.len();
            }
            Ok(RepoOutcome::Skipped { .. }) => self.skipped.push(report.source_name.clone()),
            Err(e) => self.failed.push(FailedRepo {
                source_name: report.source_name.clone(),
                phase: e.phase,
                error: e.kind.to_string(),
            }),
        }
    }

    pub fn finish(&mut self) {
        self.completed_at = Some(Utc::now());
    }

    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len() + self.skipped.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// Process exit code for automation: 0 only when every repository
    /// succeeded (or was skipped) and the listing was complete.
    pub fn exit_code(&self) -> u8 {
        if self.has_failures() || !self.listing_complete {
            1
        } else {
            0
        }
    }
}

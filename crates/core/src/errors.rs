//! Error types for the repomigrate core library.
//!
//! Each subsystem has its own error type derived with `thiserror`. The
//! per-repository kinds are gathered into [`MigrationError`], which is what
//! the orchestrator reports for a failed repository.

use thiserror::Error;

use crate::models::MigrationPhase;

// ---------------------------------------------------------------------------
// Source listing errors
// ---------------------------------------------------------------------------

/// A source catalog page could not be fetched. Pages fetched before the
/// failure are kept by the caller.
#[derive(Debug, Error)]
pub enum ListingError {
    /// The catalog API answered a page with a non-success status.
    #[error("source catalog page {page} failed (HTTP {status}): {body}")]
    PageFailed {
        page: usize,
        status: u16,
        body: String,
    },

    /// Transport-level failure (DNS, TLS, connection reset, ...).
    #[error("source catalog page {page} could not be fetched: {source}")]
    Http {
        page: usize,
        #[source]
        source: reqwest::Error,
    },

    /// The page body was not the JSON shape we expect.
    #[error("source catalog page {page} could not be parsed: {detail}")]
    Parse { page: usize, detail: String },
}

// ---------------------------------------------------------------------------
// Name translation errors
// ---------------------------------------------------------------------------

/// The name translator could not produce a usable destination name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// Nothing was left of the source name after normalization.
    #[error("source name '{0}' normalizes to an empty destination name")]
    Degenerate(String),
}

// ---------------------------------------------------------------------------
// Destination API errors
// ---------------------------------------------------------------------------

/// Errors from the destination (GitHub) repository API.
#[derive(Debug, Error)]
pub enum DestinationError {
    /// HTTP-level transport error (network, TLS, etc.).
    #[error("GitHub HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The existence check returned something other than success or a clean
    /// "not found"; emptiness cannot be assumed.
    #[error("GitHub status check for '{repo}' failed (HTTP {status}): {body}")]
    Query {
        repo: String,
        status: u16,
        body: String,
    },

    /// Repository creation was refused.
    #[error("GitHub repository creation for '{repo}' failed (HTTP {status}): {body}")]
    Create {
        repo: String,
        status: u16,
        body: String,
    },

    /// Toggling the archived flag failed.
    #[error("GitHub archive toggle (archived={archived}) for '{repo}' failed (HTTP {status}): {body}")]
    Archive {
        repo: String,
        archived: bool,
        status: u16,
        body: String,
    },

    /// Authentication token is missing or invalid.
    #[error("GitHub authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limit exceeded.
    #[error("GitHub rate limit exceeded, resets at {reset_at}")]
    RateLimited { reset_at: String },

    /// JSON deserialization failure.
    #[error("GitHub response parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Mirror (git subprocess) errors
// ---------------------------------------------------------------------------

/// Errors from the git subprocesses driven by the mirror engine.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// The git binary (or a git subcommand such as `filter-repo`) is missing.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A git command exited with a non-zero status.
    #[error("git {step} failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        step: &'static str,
        exit_code: i32,
        stdout: String,
        stderr: String,
    },

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Working directory errors
// ---------------------------------------------------------------------------

/// Errors from working-directory ownership and housekeeping.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// Another in-flight migration already owns this directory.
    #[error("working directory '{0}' is already in use by another migration")]
    InUse(String),

    /// The name would escape the workspace root.
    #[error("'{0}' is not a valid working directory name")]
    InvalidName(String),

    /// Creating or deleting the directory failed.
    #[error("working directory I/O error at '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A required environment variable is not set.
    #[error("required environment variable '{var}' is not set (referenced by config field '{field}')")]
    EnvVarMissing { var: String, field: String },

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Per-repository migration errors
// ---------------------------------------------------------------------------

/// The cause of a failed repository migration.
#[derive(Debug, Error)]
pub enum MigrationErrorKind {
    #[error(transparent)]
    Translation(#[from] TranslationError),

    /// The destination could not be checked; creation must not be attempted.
    #[error("destination query failed: {0}")]
    DestinationQuery(#[source] DestinationError),

    /// The destination could not be created.
    #[error("destination creation failed: {0}")]
    DestinationCreate(#[source] DestinationError),

    #[error(transparent)]
    Mirror(#[from] MirrorError),

    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    /// A phase transition went backwards. Indicates a bug in the pipeline.
    #[error("invalid migration phase transition from {from} to {to}")]
    InvalidTransition {
        from: MigrationPhase,
        to: MigrationPhase,
    },
}

/// A repository migration that was aborted, with the last phase it reached.
#[derive(Debug, Error)]
#[error("migration of '{source_name}' failed after phase {phase}: {kind}")]
pub struct MigrationError {
    pub source_name: String,
    pub phase: MigrationPhase,
    #[source]
    pub kind: MigrationErrorKind,
}

impl MigrationError {
    pub fn new(
        source_name: impl Into<String>,
        phase: MigrationPhase,
        kind: impl Into<MigrationErrorKind>,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            phase,
            kind: kind.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = TranslationError::Degenerate("___".into());
        assert_eq!(
            err.to_string(),
            "source name '___' normalizes to an empty destination name"
        );

        let err = MirrorError::CommandFailed {
            step: "clone --mirror",
            exit_code: 128,
            stdout: String::new(),
            stderr: "repository not found".into(),
        };
        assert_eq!(
            err.to_string(),
            "git clone --mirror failed (exit 128): repository not found"
        );

        let err = ConfigError::EnvVarMissing {
            var: "GITHUB_ACCESS_TOKEN".into(),
            field: "destination.token_env".into(),
        };
        assert!(err.to_string().contains("GITHUB_ACCESS_TOKEN"));

        let err = DestinationError::RateLimited {
            reset_at: "1700000000".into(),
        };
        assert!(err.to_string().contains("rate limit"));
    }

    #[test]
    fn test_migration_error_carries_phase() {
        let err = MigrationError::new(
            "Payments API",
            MigrationPhase::Cloned,
            MirrorError::CommandFailed {
                step: "filter-repo",
                exit_code: 2,
                stdout: String::new(),
                stderr: "boom".into(),
            },
        );
        assert_eq!(err.phase, MigrationPhase::Cloned);
        assert!(matches!(err.kind, MigrationErrorKind::Mirror(_)));
        let msg = err.to_string();
        assert!(msg.contains("Payments API"));
        assert!(msg.contains("cloned"));
    }
}

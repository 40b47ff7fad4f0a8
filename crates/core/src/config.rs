//! TOML-based configuration for repomigrate.
//!
//! Sensitive values (the Bitbucket app password and the GitHub token) are
//! never written in the file: `_env` fields name environment variables that
//! are resolved at startup via [`AppConfig::resolve_env_vars`]. The resulting
//! struct is built once and passed by reference to every component.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Source provider (Bitbucket) settings.
    pub source: SourceConfig,

    /// Destination provider (GitHub) settings.
    pub destination: DestinationConfig,

    /// Identity remapping settings.
    #[serde(default)]
    pub identity: IdentityConfig,

    /// History filtering and git invocation settings.
    #[serde(default)]
    pub mirror: MirrorConfig,

    /// Orchestration settings.
    #[serde(default)]
    pub migration: MigrationConfig,
}

// ---------------------------------------------------------------------------
// Source
// ---------------------------------------------------------------------------

/// Bitbucket workspace and credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Bitbucket API base URL (default `https://api.bitbucket.org/2.0`).
    #[serde(default = "default_bitbucket_api_url")]
    pub api_url: String,

    /// Workspace (organization) whose repositories are migrated.
    pub workspace: String,

    /// Bitbucket username.
    pub username: String,

    /// Environment variable holding the Bitbucket app password.
    pub password_env: String,

    /// Resolved password (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub password: Option<String>,
}

fn default_bitbucket_api_url() -> String {
    "https://api.bitbucket.org/2.0".into()
}

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Whether the destination owner is a user account or an organization.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    /// Repositories are created with `POST /user/repos`.
    #[default]
    User,
    /// Repositories are created with `POST /orgs/{owner}/repos`.
    Org,
}

/// GitHub owner, token and naming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    /// GitHub API base URL (default `https://api.github.com`).
    #[serde(default = "default_github_api_url")]
    pub api_url: String,

    /// Explicit base for git remotes; derived from `api_url` when unset.
    #[serde(default)]
    pub git_base_url: Option<String>,

    /// User or organization that will own the migrated repositories.
    pub owner: String,

    /// Kind of `owner`.
    #[serde(default)]
    pub owner_kind: OwnerKind,

    /// Environment variable holding the GitHub access token.
    pub token_env: String,

    /// Create repositories as private (default true).
    #[serde(default = "default_true")]
    pub private: bool,

    /// Namespace marker prefixed to every destination name (default `bb`).
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Resolved token (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub token: Option<String>,
}

fn default_github_api_url() -> String {
    "https://api.github.com".into()
}
fn default_name_prefix() -> String {
    "bb".into()
}
fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Legacy identities to replace and the canonical identity replacing them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IdentityConfig {
    /// Author/committer names to rewrite (matched case-insensitively).
    #[serde(default)]
    pub legacy_names: Vec<String>,

    /// Canonical author name.
    #[serde(default)]
    pub author_name: String,

    /// Canonical author email.
    #[serde(default)]
    pub author_email: String,

    /// Canonical committer name; defaults to the author name.
    #[serde(default)]
    pub committer_name: Option<String>,

    /// Canonical committer email; defaults to the author email.
    #[serde(default)]
    pub committer_email: Option<String>,
}

// ---------------------------------------------------------------------------
// Mirror
// ---------------------------------------------------------------------------

/// Git invocation and history filtering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    /// Path or name of the git binary (default `git`).
    #[serde(default = "default_git_binary")]
    pub git_binary: String,

    /// Blobs larger than this many bytes are removed from history
    /// (default 100 MiB).
    #[serde(default = "default_blob_size_limit")]
    pub blob_size_limit_bytes: u64,
}

fn default_git_binary() -> String {
    "git".into()
}
fn default_blob_size_limit() -> u64 {
    100 * 1024 * 1024
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            git_binary: default_git_binary(),
            blob_size_limit_bytes: default_blob_size_limit(),
        }
    }
}

// ---------------------------------------------------------------------------
// Migration
// ---------------------------------------------------------------------------

/// Orchestration settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Root under which one working directory per repository is created
    /// (default `tmp_data`).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Minimum seconds between repository create calls (default 2).
    #[serde(default = "default_min_create_interval")]
    pub min_create_interval_secs: u64,

    /// Skip repositories whose destination already has content instead of
    /// re-pushing them.
    #[serde(default)]
    pub skip_populated: bool,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Also write logs to this file.
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("tmp_data")
}
fn default_min_create_interval() -> u64 {
    2
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            min_create_interval_secs: default_min_create_interval(),
            skip_populated: false,
            log_level: default_log_level(),
            log_file: None,
        }
    }
}

impl MigrationConfig {
    pub fn min_create_interval(&self) -> Duration {
        Duration::from_secs(self.min_create_interval_secs)
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse a configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve the `_env` fields from environment variables.
    ///
    /// Missing variables are logged but not fatal here; [`validate`]
    /// (Self::validate) rejects a config whose secrets did not resolve.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        info!("resolving environment variable references in config");

        self.source.password =
            resolve_optional_env(&self.source.password_env, "source.password_env");
        self.destination.token =
            resolve_optional_env(&self.destination.token_env, "destination.token_env");

        debug!("environment variable resolution complete");
        Ok(())
    }

    /// Validate everything except the resolved secrets.
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.source.workspace, "source.workspace")?;
        require_non_empty(&self.source.username, "source.username")?;
        require_non_empty(&self.destination.owner, "destination.owner")?;

        if self.mirror.blob_size_limit_bytes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "mirror.blob_size_limit_bytes".into(),
                detail: "blob size limit must be > 0".into(),
            });
        }

        if self
            .identity
            .legacy_names
            .iter()
            .any(|n| !n.trim().is_empty())
        {
            require_non_empty(&self.identity.author_name, "identity.author_name")?;
            require_non_empty(&self.identity.author_email, "identity.author_email")?;
        }

        Ok(())
    }

    /// Validate settings and check that the secrets were resolved.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_settings()?;

        if self.source.password.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.source.password_env.clone(),
                field: "source.password_env".into(),
            });
        }
        if self.destination.token.is_none() {
            return Err(ConfigError::EnvVarMissing {
                var: self.destination.token_env.clone(),
                field: "destination.token_env".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field: field.into(),
            detail: "must not be empty".into(),
        });
    }
    Ok(())
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; logs a warning and returns `None` if the variable is unset.
fn resolve_optional_env(env_name: &str, field: &str) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            Some(val)
        }
        Ok(_) => {
            warn!(field, env_name, "env var is set but empty");
            None
        }
        Err(_) => {
            warn!(field, env_name, "env var not set");
            None
        }
    }
}

/// A commented starting configuration, written by `repomigrate init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# repomigrate configuration
# Secrets are read from the environment variables named by the *_env fields.

[source]
api_url = "https://api.bitbucket.org/2.0"
workspace = "my-workspace"
username = "bitbucket_user"
password_env = "BITBUCKET_PASS"

[destination]
api_url = "https://api.github.com"
owner = "github_user"
owner_kind = "user"        # or "org"
token_env = "GITHUB_ACCESS_TOKEN"
private = true
name_prefix = "bb"

[identity]
# Up to as many legacy names as needed; matched case-insensitively.
legacy_names = []
author_name = ""
author_email = ""
# committer_name = ""
# committer_email = ""

[mirror]
git_binary = "git"
blob_size_limit_bytes = 104857600

[migration]
work_dir = "tmp_data"
min_create_interval_secs = 2
skip_populated = false
log_level = "info"
# log_file = "repomigrate.log"
"#;

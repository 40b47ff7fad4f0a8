//! repomigrate core library.
//!
//! Moves every repository of a Bitbucket workspace to GitHub with full
//! history: destination names are translated, oversized blobs are stripped,
//! legacy author/committer identities are rewritten, and each destination is
//! left archived. Components: configuration, the source catalog client, the
//! destination client, the git mirror engine and the migrator tying them
//! together.

pub mod config;
pub mod destination;
pub mod errors;
pub mod identity;
pub mod migrator;
pub mod mirror;
pub mod models;
pub mod naming;
pub mod preflight;
pub mod rate_limit;
pub mod remote_url;
pub mod source;
pub mod workspace;

// Re-exports for convenience.
pub use config::AppConfig;
pub use destination::GitHubClient;
pub use identity::IdentityRemapper;
pub use migrator::{MigrationOptions, Migrator};
pub use mirror::{MirrorEngine, ProcessGitRunner};
pub use naming::{DestinationName, NameTranslator};
pub use source::{BitbucketClient, SourceListing};

//! Identity remapping for rewritten history.
//!
//! Legacy author and committer names are matched case-insensitively and
//! replaced by one canonical identity across every commit of a repository.

pub mod remapper;

pub use remapper::{CommitIdentity, GitIdentity, IdentityRemapper};

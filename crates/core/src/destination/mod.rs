//! Destination repository management (GitHub).

pub mod github;

pub use github::{GitHubClient, GitHubRepository};

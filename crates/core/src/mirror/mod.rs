//! Full-history mirroring through the git CLI.

pub mod engine;
pub mod runner;

#[cfg(test)]
pub(crate) mod testing;

pub use engine::MirrorEngine;
pub use runner::{GitInvocation, GitOutput, GitRunner, ProcessGitRunner};

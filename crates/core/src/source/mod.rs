//! Source catalog access (Bitbucket Cloud).

pub mod bitbucket;

pub use bitbucket::{BitbucketClient, SourceListing};

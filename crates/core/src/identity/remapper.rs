//! Legacy author/committer identity remapping.
//!
//! [`IdentityRemapper`] decides, for a historical commit's author and
//! committer, whether the identity belongs to one of the configured legacy
//! names and should be replaced by the canonical identity. The same rule is
//! rendered as a `git filter-branch --env-filter` script so the rewrite that
//! actually runs over a repository's history and the pure function agree.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::IdentityConfig;

/// A Git author/committer identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitIdentity {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
}

impl GitIdentity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

/// The author and committer of one historical commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitIdentity {
    pub author: GitIdentity,
    pub committer: GitIdentity,
}

/// Maps legacy identities onto one canonical author and committer.
///
/// Matching is ASCII case-insensitive on the name only, mirroring
/// `tr '[:upper:]' '[:lower:]'` in the generated shell filter.
#[derive(Debug, Clone)]
pub struct IdentityRemapper {
    legacy_names: Vec<String>,
    author: GitIdentity,
    committer: GitIdentity,
}

impl IdentityRemapper {
    pub fn new<I, S>(legacy_names: I, author: GitIdentity, committer: GitIdentity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names: Vec<String> = legacy_names
            .into_iter()
            .map(|n| n.as_ref().trim().to_ascii_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort();
        names.dedup();
        debug!(legacy_names = names.len(), "built identity remapper");
        Self {
            legacy_names: names,
            author,
            committer,
        }
    }

    /// Build from the `[identity]` config section.
    pub fn from_config(config: &IdentityConfig) -> Self {
        let author = GitIdentity::new(&config.author_name, &config.author_email);
        let committer = GitIdentity::new(
            config
                .committer_name
                .as_deref()
                .unwrap_or(&config.author_name),
            config
                .committer_email
                .as_deref()
                .unwrap_or(&config.author_email),
        );
        Self::new(&config.legacy_names, author, committer)
    }

    /// True when there is nothing to rewrite.
    pub fn is_noop(&self) -> bool {
        self.legacy_names.is_empty()
    }

    pub fn legacy_names(&self) -> &[String] {
        &self.legacy_names
    }

    /// Whether `name` is one of the legacy names.
    pub fn matches(&self, name: &str) -> bool {
        let lowered = name.to_ascii_lowercase();
        self.legacy_names.iter().any(|n| *n == lowered)
    }

    /// Rewrite one commit's identities. Author and committer are decided
    /// independently; an unmatched side passes through unchanged.
    pub fn remap(&self, commit: &CommitIdentity) -> CommitIdentity {
        let author = if self.matches(&commit.author.name) {
            self.author.clone()
        } else {
            commit.author.clone()
        };
        let committer = if self.matches(&commit.committer.name) {
            self.committer.clone()
        } else {
            commit.committer.clone()
        };
        CommitIdentity { author, committer }
    }

    /// The `--env-filter` body for `git filter-branch` implementing
    /// [`remap`](Self::remap). Every configured value is single-quoted.
    pub fn env_filter_script(&self) -> String {
        let condition = |var: &str| -> String {
            if self.legacy_names.is_empty() {
                return "false".to_string();
            }
            self.legacy_names
                .iter()
                .map(|n| format!("[ \"${}\" = {} ]", var, shell_quote(n)))
                .collect::<Vec<_>>()
                .join(" || ")
        };

        format!(
            "AUTHOR_NAME_LOWER=$(printf '%s' \"$GIT_AUTHOR_NAME\" | tr '[:upper:]' '[:lower:]')\n\
             COMMITTER_NAME_LOWER=$(printf '%s' \"$GIT_COMMITTER_NAME\" | tr '[:upper:]' '[:lower:]')\n\
             if {author_cond}; then\n\
             \x20   GIT_AUTHOR_NAME={author_name}\n\
             \x20   GIT_AUTHOR_EMAIL={author_email}\n\
             \x20   export GIT_AUTHOR_NAME GIT_AUTHOR_EMAIL\n\
             fi\n\
             if {committer_cond}; then\n\
             \x20   GIT_COMMITTER_NAME={committer_name}\n\
             \x20   GIT_COMMITTER_EMAIL={committer_email}\n\
             \x20   export GIT_COMMITTER_NAME GIT_COMMITTER_EMAIL\n\
             fi\n",
            author_cond = condition("AUTHOR_NAME_LOWER"),
            committer_cond = condition("COMMITTER_NAME_LOWER"),
            author_name = shell_quote(&self.author.name),
            author_email = shell_quote(&self.author.email),
            committer_name = shell_quote(&self.committer.name),
            committer_email = shell_quote(&self.committer.email),
        )
    }
}

/// Quote `s` for POSIX sh as a single-quoted word.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remapper() -> IdentityRemapper {
        IdentityRemapper::new(
            ["alice", " A.Smith ", ""],
            GitIdentity::new("Alice Smith", "alice@acme.dev"),
            GitIdentity::new("Alice Smith (bot)", "alice+ci@acme.dev"),
        )
    }

    fn commit(author: &str, committer: &str) -> CommitIdentity {
        CommitIdentity {
            author: GitIdentity::new(author, format!("{}@old.example", author)),
            committer: GitIdentity::new(committer, format!("{}@old.example", committer)),
        }
    }

    #[test]
    fn test_legacy_names_normalized() {
        assert_eq!(remapper().legacy_names(), ["a.smith", "alice"]);
    }

    #[test]
    fn test_case_variants_rewritten_identically() {
        let r = remapper();
        let upper = r.remap(&commit("ALICE", "ALICE"));
        let mixed = r.remap(&commit("Alice", "Alice"));
        assert_eq!(upper, mixed);
        assert_eq!(upper.author, GitIdentity::new("Alice Smith", "alice@acme.dev"));
        assert_eq!(
            upper.committer,
            GitIdentity::new("Alice Smith (bot)", "alice+ci@acme.dev")
        );
    }

    #[test]
    fn test_unrelated_identity_untouched() {
        let r = remapper();
        let original = commit("Bob", "Bob");
        assert_eq!(r.remap(&original), original);
    }

    #[test]
    fn test_author_and_committer_decided_independently() {
        let r = remapper();
        let out = r.remap(&commit("Bob", "a.smith"));
        assert_eq!(out.author.name, "Bob");
        assert_eq!(out.committer.email, "alice+ci@acme.dev");
    }

    #[test]
    fn test_noop_without_names() {
        let r = IdentityRemapper::new(
            Vec::<String>::new(),
            GitIdentity::new("x", "x@x"),
            GitIdentity::new("x", "x@x"),
        );
        assert!(r.is_noop());
        assert!(r.env_filter_script().contains("if false; then"));
    }

    #[test]
    fn test_script_quotes_values() {
        let r = IdentityRemapper::new(
            ["o'brien"],
            GitIdentity::new("Pat O'Brien", "pat@acme.dev"),
            GitIdentity::new("Pat O'Brien", "pat@acme.dev"),
        );
        let script = r.env_filter_script();
        assert!(script.contains(r#"[ "$AUTHOR_NAME_LOWER" = 'o'\''brien' ]"#));
        assert!(script.contains(r"GIT_AUTHOR_NAME='Pat O'\''Brien'"));
        assert!(!script.contains("$(rm"));
    }

    #[test]
    fn test_script_lists_every_name() {
        let script = remapper().env_filter_script();
        assert!(script.contains(
            r#"if [ "$AUTHOR_NAME_LOWER" = 'a.smith' ] || [ "$AUTHOR_NAME_LOWER" = 'alice' ]; then"#
        ));
        assert!(script.contains("GIT_COMMITTER_EMAIL='alice+ci@acme.dev'"));
    }
}

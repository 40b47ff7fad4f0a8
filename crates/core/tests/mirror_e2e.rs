//! End-to-end tests for the mirror engine against real git repositories.
//!
//! Source and destination are local repositories (plain paths), so there is
//! no network I/O. History is built and inspected with `git2`.
//!
//! Tests skip gracefully if `git` (or `git filter-repo`) is not installed.

use std::path::Path;
use std::process::{Command, Stdio};

use git2::{Commit, Oid, Repository, Signature, Sort};
use tempfile::TempDir;

use repomigrate_core::errors::MirrorError;
use repomigrate_core::identity::{GitIdentity, IdentityRemapper};
use repomigrate_core::mirror::{MirrorEngine, ProcessGitRunner};

// ===========================================================================
// Helpers
// ===========================================================================

fn tool_ok(args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn git_available() -> bool {
    tool_ok(&["--version"])
}

fn filter_repo_available() -> bool {
    git_available() && tool_ok(&["filter-repo", "--version"])
}

fn engine(limit: u64) -> MirrorEngine<ProcessGitRunner> {
    MirrorEngine::new(ProcessGitRunner::default(), limit)
}

/// Commit `content` at `file` as `author` (also the committer).
fn commit_file(repo: &Repository, file: &str, content: &[u8], author: &str, message: &str) -> Oid {
    let workdir = repo.workdir().unwrap();
    std::fs::write(workdir.join(file), content).unwrap();

    let mut index = repo.index().unwrap();
    index.add_path(Path::new(file)).unwrap();
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();

    let email = format!("{}@old.example", author.to_lowercase());
    let sig = Signature::now(author, &email).unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap()
}

/// (author name, author email, committer name, message) for every commit
/// reachable from HEAD, oldest first.
fn history(repo_path: &Path) -> Vec<(String, String, String, String)> {
    let repo = Repository::open(repo_path).unwrap();
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    walk.set_sorting(Sort::TOPOLOGICAL | Sort::REVERSE).unwrap();
    let mut rows = Vec::new();
    for oid in walk {
        let c = repo.find_commit(oid.unwrap()).unwrap();
        let author = c.author();
        let committer = c.committer();
        rows.push((
            author.name().unwrap_or_default().to_string(),
            author.email().unwrap_or_default().to_string(),
            committer.name().unwrap_or_default().to_string(),
            c.summary().unwrap_or_default().to_string(),
        ));
    }
    rows
}

fn ref_names(repo_path: &Path) -> Vec<String> {
    let repo = Repository::open(repo_path).unwrap();
    let names = repo
        .references()
        .unwrap()
        .filter_map(|r| r.ok().and_then(|r| r.name().map(str::to_string)))
        .collect();
    names
}

/// Author names of every commit reachable from any ref.
fn authors_on_all_refs(repo_path: &Path) -> Vec<String> {
    let repo = Repository::open(repo_path).unwrap();
    let mut walk = repo.revwalk().unwrap();
    walk.push_glob("*").unwrap();
    let authors = walk
        .map(|oid| {
            let commit = repo.find_commit(oid.unwrap()).unwrap();
            let author = commit.author();
            let name = author.name().unwrap_or_default().to_string();
            name
        })
        .collect();
    authors
}

fn sorted_refs(repo_path: &Path) -> Vec<String> {
    let mut refs = ref_names(repo_path);
    refs.sort();
    refs
}

/// Source with two ALICE commits, one Bob commit and tag `v1`.
fn legacy_source(root: &Path) -> std::path::PathBuf {
    let source_path = root.join("source");
    let source = Repository::init(&source_path).unwrap();
    commit_file(&source, "readme.txt", b"hello", "ALICE", "first");
    let second = commit_file(&source, "b.txt", b"two", "alice", "second");
    commit_file(&source, "c.txt", b"three", "Bob", "third");
    source
        .tag_lightweight("v1", &source.find_object(second, None).unwrap(), false)
        .unwrap();
    source_path
}

fn remapper() -> IdentityRemapper {
    IdentityRemapper::new(
        ["alice"],
        GitIdentity::new("Alice Smith", "alice@acme.dev"),
        GitIdentity::new("Alice Smith", "alice@acme.dev"),
    )
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_identity_rewrite_end_to_end() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let source_path = tmp.path().join("source");
    let source = Repository::init(&source_path).unwrap();
    commit_file(&source, "a.txt", b"one", "ALICE", "first");
    let second = commit_file(&source, "b.txt", b"two", "Alice", "second");
    commit_file(&source, "c.txt", b"three", "Bob", "third");
    source
        .tag_lightweight("v1", &source.find_object(second, None).unwrap(), false)
        .unwrap();

    let mirror = tmp.path().join("work").join("bb_source");
    std::fs::create_dir_all(mirror.parent().unwrap()).unwrap();
    let dest_path = tmp.path().join("dest.git");
    Repository::init_bare(&dest_path).unwrap();

    let engine = engine(100 * 1024 * 1024);
    engine
        .clone_mirror(source_path.to_str().unwrap(), &mirror)
        .await
        .unwrap();
    assert!(engine.has_refs(&mirror).await.unwrap());
    engine.rewrite_identities(&mirror, &remapper()).await.unwrap();
    engine.migrate_lfs(&mirror).await.unwrap();
    engine
        .push_mirror(&mirror, dest_path.to_str().unwrap())
        .await
        .unwrap();

    let commits = history(&dest_path);
    assert_eq!(commits.len(), 3);

    // Both case variants become the same canonical identity.
    assert_eq!(commits[0].0, "Alice Smith");
    assert_eq!(commits[0].1, "alice@acme.dev");
    assert_eq!(commits[0].2, "Alice Smith");
    assert_eq!(commits[1].0, "Alice Smith");
    assert_eq!(commits[1].1, "alice@acme.dev");

    // Unrelated identity untouched.
    assert_eq!(commits[2].0, "Bob");
    assert_eq!(commits[2].1, "bob@old.example");
    assert_eq!(commits[2].3, "third");

    // The tag follows the rewritten commit; no backup refs were pushed.
    let refs = ref_names(&dest_path);
    assert!(refs.iter().any(|r| r == "refs/tags/v1"));
    assert!(!refs.iter().any(|r| r.starts_with("refs/original/")));
    let dest = Repository::open(&dest_path).unwrap();
    let tagged = dest
        .find_reference("refs/tags/v1")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    assert_eq!(tagged.author().name(), Some("Alice Smith"));
}

#[tokio::test]
async fn test_large_blobs_stripped_from_history() {
    if !filter_repo_available() {
        eprintln!("SKIPPED: git filter-repo not found");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let source_path = tmp.path().join("source");
    let source = Repository::init(&source_path).unwrap();
    commit_file(&source, "readme.txt", b"hello", "Bob", "add readme");
    commit_file(&source, "big.bin", &vec![b'x'; 150 * 1024], "Bob", "add big");
    commit_file(&source, "small.bin", &vec![b'y'; 50 * 1024], "Bob", "add small");

    let mirror = tmp.path().join("bb_source");
    let engine = engine(100 * 1024);
    engine
        .clone_mirror(source_path.to_str().unwrap(), &mirror)
        .await
        .unwrap();
    engine.strip_large_blobs(&mirror).await.unwrap();

    let repo = Repository::open(&mirror).unwrap();
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    let tree = head.tree().unwrap();
    assert!(tree.get_name("small.bin").is_some());
    assert!(tree.get_name("readme.txt").is_some());

    // Gone from every commit, not only the tip.
    let mut walk = repo.revwalk().unwrap();
    walk.push_head().unwrap();
    let mut seen = 0;
    for oid in walk {
        let commit = repo.find_commit(oid.unwrap()).unwrap();
        assert!(commit.tree().unwrap().get_name("big.bin").is_none());
        seen += 1;
    }
    assert!(seen >= 2);
}

#[tokio::test]
async fn test_clone_failure_reports_step() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("does-not-exist");
    let err = engine(1024)
        .clone_mirror(missing.to_str().unwrap(), &tmp.path().join("out"))
        .await
        .unwrap_err();
    match err {
        MirrorError::CommandFailed {
            step, exit_code, ..
        } => {
            assert_eq!(step, "clone --mirror");
            assert_ne!(exit_code, 0);
        }
        other => panic!("expected CommandFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_source_has_no_refs() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let source_path = tmp.path().join("empty.git");
    Repository::init_bare(&source_path).unwrap();

    let mirror = tmp.path().join("bb_empty");
    let engine = engine(1024);
    engine
        .clone_mirror(source_path.to_str().unwrap(), &mirror)
        .await
        .unwrap();
    assert!(!engine.has_refs(&mirror).await.unwrap());
}

#[tokio::test]
async fn test_replace_refs_never_reach_destination() {
    if !git_available() {
        eprintln!("SKIPPED: git not found in PATH");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let source_path = legacy_source(tmp.path());
    let mirror = tmp.path().join("bb_source");
    let dest_path = tmp.path().join("dest.git");
    Repository::init_bare(&dest_path).unwrap();

    let engine = engine(100 * 1024 * 1024);
    engine
        .clone_mirror(source_path.to_str().unwrap(), &mirror)
        .await
        .unwrap();

    // A replace ref left on the pre-rewrite tip, as history filters do.
    {
        let repo = Repository::open(&mirror).unwrap();
        let tip = repo.head().unwrap().peel_to_commit().unwrap().id();
        repo.reference(
            "refs/replace/1111111111111111111111111111111111111111",
            tip,
            true,
            "stale replace ref",
        )
        .unwrap();
    }

    engine.rewrite_identities(&mirror, &remapper()).await.unwrap();
    engine
        .push_mirror(&mirror, dest_path.to_str().unwrap())
        .await
        .unwrap();

    assert_eq!(sorted_refs(&dest_path), sorted_refs(&source_path));
    let authors = authors_on_all_refs(&dest_path);
    assert!(!authors.is_empty());
    assert!(authors.iter().all(|a| !a.eq_ignore_ascii_case("alice")));
}

#[tokio::test]
async fn test_full_pipeline_publishes_exact_filtered_refs() {
    if !filter_repo_available() {
        eprintln!("SKIPPED: git filter-repo not found");
        return;
    }

    let tmp = TempDir::new().unwrap();
    let source_path = legacy_source(tmp.path());
    let mirror = tmp.path().join("bb_source");
    let dest_path = tmp.path().join("dest.git");
    Repository::init_bare(&dest_path).unwrap();

    let engine = engine(100 * 1024 * 1024);
    engine
        .clone_mirror(source_path.to_str().unwrap(), &mirror)
        .await
        .unwrap();
    assert!(engine.has_refs(&mirror).await.unwrap());
    engine.strip_large_blobs(&mirror).await.unwrap();
    engine.rewrite_identities(&mirror, &remapper()).await.unwrap();
    engine.migrate_lfs(&mirror).await.unwrap();
    engine
        .push_mirror(&mirror, dest_path.to_str().unwrap())
        .await
        .unwrap();

    let refs = sorted_refs(&dest_path);
    assert_eq!(refs, sorted_refs(&source_path));
    assert!(refs.iter().any(|r| r == "refs/tags/v1"));
    assert!(!refs.iter().any(|r| r.starts_with("refs/replace/")));
    assert!(!refs.iter().any(|r| r.starts_with("refs/original/")));

    let authors = authors_on_all_refs(&dest_path);
    assert_eq!(authors.len(), 3);
    assert!(authors.iter().all(|a| !a.eq_ignore_ascii_case("alice")));
    assert!(authors.iter().any(|a| a == "Bob"));
}

use tempfile::TempDir;

use weave_git::{
    EntryMode, GitError, GitOid, GitStore, GixStore, Stage, CacheEntry, FlatTreeIter, TreeWalk,
    WalkIterator,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn git(dir: &std::path::Path, args: &[&str]) -> String {
    let out = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        out.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).unwrap().trim().to_owned()
}

fn setup_repo() -> (TempDir, GixStore) {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init"]);
    git(dir.path(), &["config", "user.email", "test@test.com"]);
    git(dir.path(), &["config", "user.name", "Test User"]);
    let store = GixStore::open(dir.path()).unwrap();
    (dir, store)
}

/// Commit the given files on the current branch and return the commit oid.
fn commit_files(dir: &std::path::Path, files: &[(&str, &str)], message: &str) -> GitOid {
    for (path, content) in files {
        let abs = dir.join(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(abs, content).unwrap();
    }
    git(dir, &["add", "-A"]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"]).parse().unwrap()
}

// ===========================================================================
// Object access
// ===========================================================================

#[test]
fn open_refuses_bare_repository() {
    let dir = TempDir::new().unwrap();
    git(dir.path(), &["init", "--bare"]);
    assert!(matches!(
        GixStore::open(dir.path()),
        Err(GitError::NoWorktree { .. })
    ));
}

#[test]
fn blob_round_trip() {
    let (_dir, store) = setup_repo();
    let oid = store.write_blob(b"hello world\n").unwrap();
    assert_eq!(store.read_blob(oid).unwrap(), b"hello world\n");
}

#[test]
fn read_blob_missing() {
    let (_dir, store) = setup_repo();
    let bogus = GitOid::from_bytes([0xab; 20]);
    assert!(matches!(
        store.read_blob(bogus),
        Err(GitError::NotFound { .. })
    ));
}

#[test]
fn read_commit_and_tree() {
    let (dir, store) = setup_repo();
    let commit = commit_files(dir.path(), &[("src/lib.rs", "lib\n"), ("README.md", "hi\n")], "init");

    let info = store.read_commit(commit).unwrap();
    assert!(info.parents.is_empty());
    assert_eq!(info.message.trim(), "init");

    let entries = store.read_tree(info.tree_oid).unwrap();
    let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["README.md", "src"]);
    assert_eq!(entries[1].mode, EntryMode::Tree);
}

#[test]
fn rev_parse_resolves_head() {
    let (dir, store) = setup_repo();
    let commit = commit_files(dir.path(), &[("a.txt", "a\n")], "init");
    assert_eq!(store.rev_parse("HEAD").unwrap(), commit);
    assert!(matches!(
        store.rev_parse("no-such-ref"),
        Err(GitError::NotFound { .. })
    ));
}

// ===========================================================================
// Index
// ===========================================================================

#[test]
fn merge_index_reports_stages() {
    let (dir, store) = setup_repo();
    commit_files(dir.path(), &[("shared.txt", "base\n")], "base");
    git(dir.path(), &["checkout", "-b", "side"]);
    commit_files(dir.path(), &[("shared.txt", "side\n")], "side");
    git(dir.path(), &["checkout", "-"]);
    commit_files(dir.path(), &[("shared.txt", "main\n")], "main");

    // Leaves conflict stages in the index.
    let _ = std::process::Command::new("git")
        .args(["merge", "side"])
        .current_dir(dir.path())
        .output()
        .unwrap();

    let entries = store.merge_index().unwrap();
    let stages: Vec<Stage> = entries
        .iter()
        .filter(|e| e.path == "shared.txt")
        .map(|e| e.stage)
        .collect();
    assert_eq!(stages, [Stage::Base, Stage::Ours, Stage::Theirs]);
}

#[test]
fn write_index_round_trips_entries() {
    let (dir, store) = setup_repo();
    commit_files(dir.path(), &[("a.txt", "a\n")], "init");

    let blob = store.write_blob(b"resolved\n").unwrap();
    let mut resolved = CacheEntry::resolved("a.txt", EntryMode::Blob, blob);
    resolved.size = 9;
    resolved.mtime = 1_700_000_000;
    store.write_index(&[resolved]).unwrap();

    let entries = store.merge_index().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path, "a.txt");
    assert_eq!(entries[0].oid, blob);
    assert_eq!(entries[0].stage, Stage::Unconflicted);
    assert_eq!(entries[0].size, 9);
    assert_eq!(entries[0].mtime, 1_700_000_000);
}

#[test]
fn write_index_preserves_conflict_stages() {
    let (dir, store) = setup_repo();
    commit_files(dir.path(), &[("a.txt", "a\n")], "init");

    let base = store.write_blob(b"base\n").unwrap();
    let ours = store.write_blob(b"ours\n").unwrap();
    let theirs = store.write_blob(b"theirs\n").unwrap();
    store
        .write_index(&[
            CacheEntry::conflicted("a.txt", EntryMode::Blob, base, Stage::Base),
            CacheEntry::conflicted("a.txt", EntryMode::Blob, ours, Stage::Ours),
            CacheEntry::conflicted("a.txt", EntryMode::Blob, theirs, Stage::Theirs),
        ])
        .unwrap();

    let listed = git(dir.path(), &["ls-files", "--stage", "a.txt"]);
    let stages: Vec<&str> = listed
        .lines()
        .map(|l| l.split_whitespace().nth(2).unwrap())
        .collect();
    assert_eq!(stages, ["1", "2", "3"]);
}

// ===========================================================================
// Working tree
// ===========================================================================

#[test]
fn worktree_file_reads_content_and_mode() {
    let (dir, store) = setup_repo();
    std::fs::write(dir.path().join("plain.txt"), "plain\n").unwrap();

    let file = store.worktree_file("plain.txt").unwrap().unwrap();
    assert_eq!(file.bytes, b"plain\n");
    assert_eq!(file.mode, EntryMode::Blob);
    assert_eq!(file.size, 6);

    assert!(store.worktree_file("missing.txt").unwrap().is_none());
}

#[test]
fn write_worktree_file_creates_parents() {
    let (dir, store) = setup_repo();
    store.write_worktree_file("deep/nested/file.txt", b"x\n").unwrap();
    let on_disk = std::fs::read(dir.path().join("deep/nested/file.txt")).unwrap();
    assert_eq!(on_disk, b"x\n");
}

#[test]
fn worktree_paths_include_ignored_files() {
    let (dir, store) = setup_repo();
    std::fs::write(dir.path().join(".gitignore"), "*.log\n").unwrap();
    std::fs::write(dir.path().join("kept.txt"), "k\n").unwrap();
    std::fs::write(dir.path().join("noise.log"), "n\n").unwrap();

    let paths = store.worktree_paths().unwrap();
    assert_eq!(paths, [".gitignore", "kept.txt", "noise.log"]);

    assert!(store.is_ignored("noise.log").unwrap());
    assert!(!store.is_ignored("kept.txt").unwrap());
}

#[test]
fn worktree_file_surfaces_submodule_head() {
    let (dir, store) = setup_repo();
    let sub = dir.path().join("sub");
    std::fs::create_dir(&sub).unwrap();
    git(&sub, &["init"]);
    git(&sub, &["config", "user.email", "test@test.com"]);
    git(&sub, &["config", "user.name", "Test User"]);
    std::fs::write(sub.join("inner.txt"), "x\n").unwrap();
    git(&sub, &["add", "-A"]);
    git(&sub, &["commit", "-m", "inner"]);
    let head: GitOid = git(&sub, &["rev-parse", "HEAD"]).parse().unwrap();

    let file = store.worktree_file("sub").unwrap().unwrap();
    assert_eq!(file.mode, EntryMode::Commit);
    assert!(file.bytes.is_empty());
    assert_eq!(file.link_oid, Some(head));
}

#[test]
fn store_is_usable_across_threads() {
    let (dir, store) = setup_repo();
    let commit = commit_files(dir.path(), &[("a.txt", "a\n")], "init");

    let store = std::sync::Arc::new(store);
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let store = std::sync::Arc::clone(&store);
            std::thread::spawn(move || store.rev_parse("HEAD").unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), commit);
    }
}

// ===========================================================================
// Walking real trees
// ===========================================================================

#[test]
fn tree_walk_over_three_commits() {
    let (dir, store) = setup_repo();
    let base = commit_files(dir.path(), &[("shared.txt", "base\n")], "base");
    git(dir.path(), &["checkout", "-b", "side"]);
    let theirs = commit_files(dir.path(), &[("theirs.txt", "t\n")], "theirs");
    git(dir.path(), &["checkout", "-"]);
    let ours = commit_files(dir.path(), &[("ours.txt", "o\n")], "ours");

    let sides: Vec<Box<dyn WalkIterator>> = [base, ours, theirs]
        .into_iter()
        .map(|commit| {
            let tree = store.read_commit(commit).unwrap().tree_oid;
            Box::new(FlatTreeIter::new(&store, tree).unwrap()) as Box<dyn WalkIterator>
        })
        .collect();
    let mut walk = TreeWalk::new(sides);

    let mut seen = Vec::new();
    while let Some(path) = walk.next_path() {
        seen.push(path);
    }
    assert_eq!(seen, ["ours.txt", "shared.txt", "theirs.txt"]);
}

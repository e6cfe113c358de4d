//! In-memory [`GitStore`] backend for tests.
//!
//! Object ids are the first 20 bytes of a SHA-256 over a kind tag and the
//! serialized object, so identical content gets identical ids without
//! reproducing git's on-disk object encoding.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Mutex;

use sha2::{Digest, Sha256};

use crate::error::GitError;
use crate::store::GitStore;
use crate::types::{CacheEntry, CommitInfo, EntryMode, GitOid, Stage, StageEntry, TreeEntry, WorktreeFile};

#[derive(Default)]
struct State {
    blobs: HashMap<GitOid, Vec<u8>>,
    trees: HashMap<GitOid, Vec<TreeEntry>>,
    commits: HashMap<GitOid, CommitInfo>,
    refs: HashMap<String, GitOid>,
    index: Vec<StageEntry>,
    worktree: BTreeMap<String, WorktreeFile>,
    ignored: HashSet<String>,
}

/// A fully in-memory repository.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn hash_object(kind: &str, payload: &[u8]) -> GitOid {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0]);
    hasher.update(payload);
    let digest = hasher.finalize();
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&digest[..20]);
    GitOid::from_bytes(bytes)
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a blob without going through the error-returning trait method.
    pub fn put_blob(&self, content: &[u8]) -> GitOid {
        let oid = hash_object("blob", content);
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .blobs
            .insert(oid, content.to_vec());
        oid
    }

    /// Store a tree object from already-sorted entries.
    pub fn put_tree(&self, entries: Vec<TreeEntry>) -> GitOid {
        let mut payload = Vec::new();
        for entry in &entries {
            payload.extend_from_slice(entry.name.as_bytes());
            payload.push(0);
            payload.extend_from_slice(&entry.mode.raw().to_be_bytes());
            payload.extend_from_slice(entry.oid.as_bytes());
        }
        let oid = hash_object("tree", &payload);
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .trees
            .insert(oid, entries);
        oid
    }

    /// Store a commit object pointing at `tree`.
    pub fn put_commit(&self, tree: GitOid, parents: Vec<GitOid>, message: &str) -> GitOid {
        let mut payload = Vec::new();
        payload.extend_from_slice(tree.as_bytes());
        for parent in &parents {
            payload.extend_from_slice(parent.as_bytes());
        }
        payload.extend_from_slice(message.as_bytes());
        let oid = hash_object("commit", &payload);
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .commits
            .insert(
                oid,
                CommitInfo {
                    tree_oid: tree,
                    parents,
                    message: message.to_owned(),
                },
            );
        oid
    }

    /// Build a (possibly nested) tree from flat `(path, content)` pairs and
    /// return the root tree oid. All files get the plain blob mode.
    pub fn tree_from_files(&self, files: &[(&str, &str)]) -> GitOid {
        let entries: Vec<(String, EntryMode, GitOid)> = files
            .iter()
            .map(|(path, content)| {
                ((*path).to_owned(), EntryMode::Blob, self.put_blob(content.as_bytes()))
            })
            .collect();
        self.build_tree(&entries)
    }

    /// Like [`tree_from_files`](Self::tree_from_files) with explicit modes
    /// and oids, for gitlink and symlink entries.
    pub fn build_tree(&self, files: &[(String, EntryMode, GitOid)]) -> GitOid {
        // Group the current level's direct children, recursing per subtree.
        let mut leaves: Vec<TreeEntry> = Vec::new();
        let mut subtrees: BTreeMap<String, Vec<(String, EntryMode, GitOid)>> = BTreeMap::new();
        for (path, mode, oid) in files {
            match path.split_once('/') {
                Some((dir, rest)) => subtrees
                    .entry(dir.to_owned())
                    .or_default()
                    .push((rest.to_owned(), *mode, *oid)),
                None => leaves.push(TreeEntry {
                    name: path.clone(),
                    mode: *mode,
                    oid: *oid,
                }),
            }
        }
        for (name, children) in subtrees {
            let oid = self.build_tree(&children);
            leaves.push(TreeEntry {
                name,
                mode: EntryMode::Tree,
                oid,
            });
        }
        leaves.sort_by(|a, b| a.name.cmp(&b.name));
        self.put_tree(leaves)
    }

    /// Bind a symbolic name for [`GitStore::rev_parse`].
    pub fn set_ref(&self, name: &str, oid: GitOid) {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .refs
            .insert(name.to_owned(), oid);
    }

    /// Replace the index with the given entries.
    pub fn set_index(&self, mut entries: Vec<StageEntry>) {
        entries.sort_by(|a, b| a.path.cmp(&b.path).then(a.stage.raw().cmp(&b.stage.raw())));
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .index = entries;
    }

    /// Place a file in the working tree.
    pub fn put_worktree(&self, path: &str, content: &[u8], mtime: i64) {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .worktree
            .insert(
                path.to_owned(),
                WorktreeFile {
                    bytes: content.to_vec(),
                    mode: EntryMode::Blob,
                    size: content.len() as u64,
                    mtime,
                    link_oid: None,
                },
            );
    }

    /// Surface a checked-out submodule at `path` whose HEAD points at `oid`.
    pub fn put_gitlink(&self, path: &str, oid: GitOid) {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .worktree
            .insert(
                path.to_owned(),
                WorktreeFile {
                    bytes: Vec::new(),
                    mode: EntryMode::Commit,
                    size: 0,
                    mtime: 0,
                    link_oid: Some(oid),
                },
            );
    }

    /// Mark a path as ignored.
    pub fn set_ignored(&self, path: &str) {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ignored
            .insert(path.to_owned());
    }

    /// Stage a simple stage-0 index entry for `path` with fresh stat data
    /// matching the current working-tree file, if present.
    pub fn stage_from_worktree(&self, path: &str) -> Option<GitOid> {
        let file = {
            let state = self
                .state
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            state.worktree.get(path).cloned()?
        };
        let oid = self.put_blob(&file.bytes);
        let entry = StageEntry {
            path: path.to_owned(),
            mode: file.mode,
            oid,
            stage: Stage::Unconflicted,
            size: file.size,
            mtime: file.mtime,
            assume_valid: false,
        };
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        state.index.retain(|e| e.path != path);
        state.index.push(entry);
        state
            .index
            .sort_by(|a, b| a.path.cmp(&b.path).then(a.stage.raw().cmp(&b.stage.raw())));
        Some(oid)
    }

    /// The current index entries, for assertions.
    #[must_use]
    pub fn index_entries(&self) -> Vec<StageEntry> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .index
            .clone()
    }
}

impl GitStore for MemoryStore {
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .blobs
            .get(&oid)
            .cloned()
            .ok_or_else(|| GitError::NotFound {
                message: format!("blob {oid}"),
            })
    }

    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .trees
            .get(&oid)
            .cloned()
            .ok_or_else(|| GitError::NotFound {
                message: format!("tree {oid}"),
            })
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .commits
            .get(&oid)
            .cloned()
            .ok_or_else(|| GitError::NotFound {
                message: format!("commit {oid}"),
            })
    }

    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        let state = self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(oid) = state.refs.get(spec) {
            return Ok(*oid);
        }
        spec.parse().map_err(|_| GitError::NotFound {
            message: format!("revision {spec}"),
        })
    }

    fn write_blob(&self, content: &[u8]) -> Result<GitOid, GitError> {
        Ok(self.put_blob(content))
    }

    fn merge_index(&self) -> Result<Vec<StageEntry>, GitError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .index
            .clone())
    }

    fn write_index(&self, entries: &[CacheEntry]) -> Result<(), GitError> {
        let entries: Vec<StageEntry> = entries
            .iter()
            .map(|e| StageEntry {
                path: e.path.clone(),
                mode: e.mode,
                oid: e.oid,
                stage: e.stage,
                size: e.size,
                mtime: e.mtime,
                assume_valid: e.assume_valid,
            })
            .collect();
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .index = entries;
        Ok(())
    }

    fn worktree_file(&self, path: &str) -> Result<Option<WorktreeFile>, GitError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .worktree
            .get(path)
            .cloned())
    }

    fn write_worktree_file(&self, path: &str, content: &[u8]) -> Result<(), GitError> {
        self.put_worktree(path, content, 1);
        Ok(())
    }

    fn remove_worktree_file(&self, path: &str) -> Result<(), GitError> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .worktree
            .remove(path);
        Ok(())
    }

    fn worktree_paths(&self) -> Result<Vec<String>, GitError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .worktree
            .keys()
            .cloned()
            .collect())
    }

    fn is_ignored(&self, path: &str) -> Result<bool, GitError> {
        Ok(self
            .state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .ignored
            .contains(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walk::FlatTreeIter;
    use crate::walk::WalkIterator;

    #[test]
    fn identical_content_gets_identical_oids() {
        let store = MemoryStore::new();
        let a = store.put_blob(b"hello");
        let b = store.put_blob(b"hello");
        let c = store.put_blob(b"world");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn nested_paths_become_subtrees() {
        let store = MemoryStore::new();
        let root = store.tree_from_files(&[("src/lib.rs", "lib"), ("README.md", "readme")]);
        let entries = store.read_tree(root).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "README.md");
        assert_eq!(entries[1].name, "src");
        assert_eq!(entries[1].mode, EntryMode::Tree);

        let src = store.read_tree(entries[1].oid).unwrap();
        assert_eq!(src.len(), 1);
        assert_eq!(src[0].name, "lib.rs");
    }

    #[test]
    fn flattened_tree_walks_in_path_order() {
        let store = MemoryStore::new();
        let root = store.tree_from_files(&[
            ("b/inner.txt", "x"),
            ("a.txt", "y"),
            ("b/deep/leaf.txt", "z"),
        ]);
        let mut iter = FlatTreeIter::new(&store, root).unwrap();
        let mut paths = Vec::new();
        while let Some(entry) = iter.peek() {
            paths.push(entry.path);
            iter.advance();
        }
        assert_eq!(paths, ["a.txt", "b/deep/leaf.txt", "b/inner.txt"]);
    }

    #[test]
    fn rev_parse_resolves_refs_then_raw_oids() {
        let store = MemoryStore::new();
        let tree = store.tree_from_files(&[]);
        let commit = store.put_commit(tree, vec![], "init");
        store.set_ref("HEAD", commit);
        assert_eq!(store.rev_parse("HEAD").unwrap(), commit);
        assert_eq!(store.rev_parse(&commit.to_string()).unwrap(), commit);
        assert!(matches!(
            store.rev_parse("no-such-ref"),
            Err(GitError::NotFound { .. })
        ));
    }
}

//! The [`GitStore`] trait — the abstraction boundary between the merge core
//! and git.
//!
//! The merge core interacts with git exclusively through this trait.
//! Implementations may be backed by gix ([`GixStore`](crate::GixStore), the
//! preferred backend) or kept entirely in memory
//! ([`MemoryStore`](crate::MemoryStore), the test double).
//!
//! # Object safety
//!
//! This trait is object-safe: no generic methods, no `Self` in return
//! position outside of `Result`. Callers use `&dyn GitStore` or
//! `Arc<dyn GitStore>`.

use crate::error::GitError;
use crate::types::{CacheEntry, CommitInfo, GitOid, StageEntry, TreeEntry, WorktreeFile};

/// The git abstraction trait used by the merge core.
pub trait GitStore: Send + Sync {
    // -----------------------------------------------------------------------
    // Object read
    // -----------------------------------------------------------------------

    /// Read the contents of a blob object.
    ///
    /// Replaces: `git cat-file blob <oid>`.
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError>;

    /// Read the entries of a tree object (one level deep, not recursive).
    ///
    /// Replaces: `git ls-tree <oid>`.
    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError>;

    /// Read a commit object's metadata.
    ///
    /// Replaces: `git cat-file commit <oid>`.
    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError>;

    /// Resolve a revision specification (`HEAD`, branch name, abbreviated
    /// OID, `<rev>^`, ...) to an OID.
    ///
    /// Replaces: `git rev-parse <spec>`.
    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Object write
    // -----------------------------------------------------------------------

    /// Write a blob to the object store and return its OID.
    ///
    /// Replaces: `git hash-object -w --stdin`.
    fn write_blob(&self, data: &[u8]) -> Result<GitOid, GitError>;

    // -----------------------------------------------------------------------
    // Index
    // -----------------------------------------------------------------------

    /// Read all index entries including conflict stages.
    ///
    /// # Errors
    ///
    /// Returns [`GitError::IndexCorrupt`] if any entry carries a stage
    /// outside 0–3. Construction of anything on top of such an index must
    /// abort.
    ///
    /// Replaces: `git ls-files --stage`.
    fn merge_index(&self) -> Result<Vec<StageEntry>, GitError>;

    /// Replace the index with the given entries.
    ///
    /// Entries must be sorted by (path, stage); [`crate::IndexBuilder`]
    /// produces them in that order.
    fn write_index(&self, entries: &[CacheEntry]) -> Result<(), GitError>;

    // -----------------------------------------------------------------------
    // Working tree
    // -----------------------------------------------------------------------

    /// Read a working-tree file, or `None` if it does not exist.
    fn worktree_file(&self, path: &str) -> Result<Option<WorktreeFile>, GitError>;

    /// Write (or overwrite) a working-tree file, creating parent directories
    /// as needed.
    fn write_worktree_file(&self, path: &str, bytes: &[u8]) -> Result<(), GitError>;

    /// Delete a working-tree file. Deleting a path that does not exist is
    /// not an error.
    fn remove_worktree_file(&self, path: &str) -> Result<(), GitError>;

    /// List all working-tree file paths, sorted lexicographically.
    ///
    /// Git-ignored files are included; callers filter via
    /// [`is_ignored`](Self::is_ignored).
    fn worktree_paths(&self) -> Result<Vec<String>, GitError>;

    /// Return `true` if the path is excluded by gitignore rules.
    fn is_ignored(&self, path: &str) -> Result<bool, GitError>;
}

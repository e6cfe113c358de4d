//! Multi-sided tree walking.
//!
//! A [`TreeWalk`] walks the union of paths across several "sides" in
//! lock-step: three tree objects (base / ours / theirs), the index, and the
//! working tree. Each side is a [`WalkIterator`] producing a sorted stream of
//! [`WalkEntry`] values; the walk repeatedly visits the smallest path any
//! side is positioned on and exposes, per side, the entry at that path (or
//! its absence as a raw mode of `0`).
//!
//! Trees are flattened to lexicographically sorted file lists up front, so
//! the walk sees file-level paths only — there is no subtree descent state.
//!
//! # Rewind semantics
//!
//! [`TreeWalk::rewind`] restores every side to its starting position so the
//! same walk object can be scanned more than once (the variant-tree provider
//! relies on this). The one exception is a side of
//! [`IterKind::IndexBuilder`]: such an iterator reads the *live* builder, and
//! entries staged into the builder during a first pass would be observed on a
//! second one, so builder-backed sides are left exhausted instead of rewound.

use std::sync::{Arc, Mutex};

use crate::error::GitError;
use crate::index::IndexBuilder;
use crate::store::GitStore;
use crate::types::{EntryMode, GitOid, Stage, StageEntry};

// ---------------------------------------------------------------------------
// WalkEntry / WalkIterator
// ---------------------------------------------------------------------------

/// One side's view of a path during a walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    /// Repository-relative, slash-separated path.
    pub path: String,
    /// The entry mode on this side.
    pub mode: EntryMode,
    /// Object id on this side. [`GitOid::ZERO`] for working-tree entries,
    /// whose content has not been hashed.
    pub oid: GitOid,
}

/// What kind of data a walk side iterates over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IterKind {
    /// A flattened tree object.
    Tree,
    /// A snapshot of index entries.
    Index,
    /// The working tree.
    Worktree,
    /// A live index builder. Excluded from [`TreeWalk::rewind`].
    IndexBuilder,
}

/// A sorted stream of walk entries for one side.
pub trait WalkIterator {
    /// The kind of this side.
    fn kind(&self) -> IterKind;
    /// The entry this side is currently positioned on, or `None` at the end.
    fn peek(&self) -> Option<WalkEntry>;
    /// Move to the next entry.
    fn advance(&mut self);
    /// Return to the first entry.
    fn rewind(&mut self);
}

// ---------------------------------------------------------------------------
// FlatTreeIter
// ---------------------------------------------------------------------------

/// Iterates a tree object flattened to sorted file-level paths.
///
/// Subtrees are resolved at construction time; gitlinks and symlinks appear
/// as leaf entries.
pub struct FlatTreeIter {
    entries: Vec<WalkEntry>,
    pos: usize,
}

impl FlatTreeIter {
    /// Flatten `tree` (recursively) into a sorted entry list.
    pub fn new(store: &dyn GitStore, tree: GitOid) -> Result<Self, GitError> {
        let mut entries = Vec::new();
        flatten_tree(store, tree, "", &mut entries)?;
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { entries, pos: 0 })
    }

    /// An iterator over no entries, standing in for an absent tree.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
            pos: 0,
        }
    }
}

fn flatten_tree(
    store: &dyn GitStore,
    tree: GitOid,
    prefix: &str,
    out: &mut Vec<WalkEntry>,
) -> Result<(), GitError> {
    for entry in store.read_tree(tree)? {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };
        match entry.mode {
            EntryMode::Tree => flatten_tree(store, entry.oid, &path, out)?,
            mode => out.push(WalkEntry {
                path,
                mode,
                oid: entry.oid,
            }),
        }
    }
    Ok(())
}

impl WalkIterator for FlatTreeIter {
    fn kind(&self) -> IterKind {
        IterKind::Tree
    }

    fn peek(&self) -> Option<WalkEntry> {
        self.entries.get(self.pos).cloned()
    }

    fn advance(&mut self) {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// IndexIter
// ---------------------------------------------------------------------------

enum IndexSource {
    Snapshot(Vec<WalkEntry>),
    Builder(Arc<Mutex<IndexBuilder>>),
}

/// Iterates index entries, one walk entry per path.
///
/// For a conflicted path (no stage-0 entry) the "ours" (stage 2) version is
/// surfaced, falling back to whichever stage is present.
pub struct IndexIter {
    source: IndexSource,
    pos: usize,
}

impl IndexIter {
    /// Snapshot the given index entries. Entries must be sorted by
    /// (path, stage), as [`GitStore::merge_index`] returns them.
    #[must_use]
    pub fn new(entries: &[StageEntry]) -> Self {
        let mut collapsed: Vec<WalkEntry> = Vec::new();
        for entry in entries {
            let walk = WalkEntry {
                path: entry.path.clone(),
                mode: entry.mode,
                oid: entry.oid,
            };
            match collapsed.last_mut() {
                Some(last) if last.path == entry.path => {
                    // Prefer stage 0, then stage 2.
                    if matches!(entry.stage, Stage::Unconflicted | Stage::Ours) {
                        *last = walk;
                    }
                }
                _ => collapsed.push(walk),
            }
        }
        collapsed.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            source: IndexSource::Snapshot(collapsed),
            pos: 0,
        }
    }

    /// Iterate the live contents of an index builder.
    ///
    /// The resulting side reports [`IterKind::IndexBuilder`] and is excluded
    /// from [`TreeWalk::rewind`]: entries added to the builder after this
    /// iterator passed them would otherwise surface on a second scan.
    #[must_use]
    pub fn from_builder(builder: Arc<Mutex<IndexBuilder>>) -> Self {
        Self {
            source: IndexSource::Builder(builder),
            pos: 0,
        }
    }

    fn get(&self, pos: usize) -> Option<WalkEntry> {
        match &self.source {
            IndexSource::Snapshot(entries) => entries.get(pos).cloned(),
            IndexSource::Builder(builder) => {
                let builder = builder.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
                builder.entry_at(pos).map(|e| WalkEntry {
                    path: e.path.clone(),
                    mode: e.mode,
                    oid: e.oid,
                })
            }
        }
    }
}

impl WalkIterator for IndexIter {
    fn kind(&self) -> IterKind {
        match self.source {
            IndexSource::Snapshot(_) => IterKind::Index,
            IndexSource::Builder(_) => IterKind::IndexBuilder,
        }
    }

    fn peek(&self) -> Option<WalkEntry> {
        self.get(self.pos)
    }

    fn advance(&mut self) {
        if self.get(self.pos).is_some() {
            self.pos += 1;
        }
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// WorktreeIter
// ---------------------------------------------------------------------------

/// Iterates working-tree files. Entry OIDs are [`GitOid::ZERO`]; content is
/// only hashed when an entry is actually staged.
pub struct WorktreeIter {
    entries: Vec<WalkEntry>,
    pos: usize,
}

impl WorktreeIter {
    /// Enumerate the store's working tree.
    pub fn new(store: &dyn GitStore) -> Result<Self, GitError> {
        let mut entries = Vec::new();
        for path in store.worktree_paths()? {
            let Some(file) = store.worktree_file(&path)? else {
                continue;
            };
            entries.push(WalkEntry {
                path,
                mode: file.mode,
                oid: GitOid::ZERO,
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Self { entries, pos: 0 })
    }
}

impl WalkIterator for WorktreeIter {
    fn kind(&self) -> IterKind {
        IterKind::Worktree
    }

    fn peek(&self) -> Option<WalkEntry> {
        self.entries.get(self.pos).cloned()
    }

    fn advance(&mut self) {
        if self.pos < self.entries.len() {
            self.pos += 1;
        }
    }

    fn rewind(&mut self) {
        self.pos = 0;
    }
}

// ---------------------------------------------------------------------------
// TreeWalk
// ---------------------------------------------------------------------------

/// A lock-step union walk over several [`WalkIterator`] sides.
///
/// Not thread-safe: a walk must only ever be driven by the thread that owns
/// it. Concurrent consumers need their own walk instance.
pub struct TreeWalk {
    sides: Vec<Box<dyn WalkIterator>>,
    current: Option<String>,
}

impl TreeWalk {
    /// Create a walk over the given sides. Side indices in later queries
    /// refer to positions in this vector.
    #[must_use]
    pub fn new(sides: Vec<Box<dyn WalkIterator>>) -> Self {
        Self {
            sides,
            current: None,
        }
    }

    /// Number of sides in this walk.
    #[must_use]
    pub fn side_count(&self) -> usize {
        self.sides.len()
    }

    /// Advance to the next path in the union and return it, or `None` when
    /// all sides are exhausted.
    pub fn next_path(&mut self) -> Option<String> {
        if let Some(current) = self.current.take() {
            for side in &mut self.sides {
                if side.peek().is_some_and(|e| e.path == current) {
                    side.advance();
                }
            }
        }
        let min = self
            .sides
            .iter()
            .filter_map(|s| s.peek())
            .map(|e| e.path)
            .min()?;
        self.current = Some(min.clone());
        Some(min)
    }

    /// The entry at the current path on `side`, or `None` if that side has
    /// no entry here.
    #[must_use]
    pub fn entry(&self, side: usize) -> Option<WalkEntry> {
        let current = self.current.as_deref()?;
        self.sides
            .get(side)
            .and_then(|s| s.peek())
            .filter(|e| e.path == current)
    }

    /// The raw mode bits at the current path on `side`; `0` when absent.
    #[must_use]
    pub fn raw_mode(&self, side: usize) -> u32 {
        self.entry(side).map_or(0, |e| e.mode.raw())
    }

    /// Restore every side to its starting position, except sides of
    /// [`IterKind::IndexBuilder`], which are deliberately left where they
    /// are (see module docs).
    pub fn rewind(&mut self) {
        for side in &mut self.sides {
            if side.kind() != IterKind::IndexBuilder {
                side.rewind();
            }
        }
        self.current = None;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

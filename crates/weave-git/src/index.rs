//! Incremental construction of a merge result index.

use crate::types::{CacheEntry, StageEntry};

/// Accumulates the entries of the post-merge index.
///
/// Entries are staged one path at a time as the merge walks the union of
/// inputs; [`IndexBuilder::finish`] produces the final, (path, stage)-sorted
/// entry list for [`crate::GitStore::write_index`]. A failed merge simply
/// drops the builder, leaving the on-disk index untouched.
#[derive(Default)]
pub struct IndexBuilder {
    entries: Vec<CacheEntry>,
}

impl IndexBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage an entry for the result index.
    pub fn add(&mut self, entry: CacheEntry) {
        self.entries.push(entry);
    }

    /// Carry an existing index entry into the result unchanged, preserving
    /// its stat data so the entry stays fresh against the working tree.
    pub fn keep(&mut self, entry: &StageEntry) {
        self.entries.push(CacheEntry::keep(entry));
    }

    /// Number of entries staged so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The entry at `pos` in insertion order, if any. Used by builder-backed
    /// walk iterators, which observe the builder live.
    #[must_use]
    pub fn entry_at(&self, pos: usize) -> Option<&CacheEntry> {
        self.entries.get(pos)
    }

    /// Consume the builder and return all entries sorted by (path, stage).
    #[must_use]
    pub fn finish(mut self) -> Vec<CacheEntry> {
        self.entries
            .sort_by(|a, b| a.path.cmp(&b.path).then(a.stage.raw().cmp(&b.stage.raw())));
        self.entries
    }
}

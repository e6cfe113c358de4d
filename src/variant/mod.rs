//! Content variants and the frozen base/ours/theirs views over them.
//!
//! A [`Variant`] is an immutable snapshot of one path's content and mode on
//! one merge side. Three [`VariantCache`]s (base, ours, theirs) populated by
//! one of the providers in [`provider`] compose into a
//! [`VariantTreeProvider`], the single consistent view the rest of the merge
//! reads from.

mod cache;
mod provider;
mod tree;

pub use cache::VariantCache;
pub use provider::{from_merge_index, from_tree_walk, WalkSides};
pub use tree::{VariantTree, VariantTreeProvider};

use weave_git::{EntryMode, GitOid, GitStore};

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Where a variant's oid/mode pair was observed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VariantOrigin {
    /// A conflicted merge-index entry (stage 1/2/3).
    Index,
    /// A tree parser positioned on the path during a three-way walk.
    TreeWalk,
}

/// An immutable snapshot of a path's content and mode on one merge side.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Variant {
    pub oid: GitOid,
    pub mode: EntryMode,
    pub origin: VariantOrigin,
}

impl Variant {
    #[must_use]
    pub const fn new(oid: GitOid, mode: EntryMode, origin: VariantOrigin) -> Self {
        Self { oid, mode, origin }
    }

    #[must_use]
    pub fn is_tree(&self) -> bool {
        self.mode == EntryMode::Tree
    }
}

/// Byte-equality comparison of two variants.
///
/// Equal iff the raw content is bit-identical, regardless of which origin
/// produced either variant. Content is only materialized when the object ids
/// differ, which in a content-addressed store implies inequality for blobs
/// but is re-checked here so non-blob and cross-store cases stay honest.
pub fn compare_variants(
    store: &dyn GitStore,
    a: &Variant,
    b: &Variant,
) -> Result<bool, MergeError> {
    if a.oid == b.oid {
        return Ok(true);
    }
    if a.is_tree() || b.is_tree() || a.mode.is_gitlink() || b.mode.is_gitlink() {
        return Ok(false);
    }
    let left = store.read_blob(a.oid)?;
    let right = store.read_blob(b.oid)?;
    Ok(left == right)
}

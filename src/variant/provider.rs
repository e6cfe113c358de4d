//! Builders populating the three variant caches.
//!
//! Two ways to build a [`VariantTreeProvider`]: from the repository's merge
//! index (a conflicted merge that already touched the index), or from one
//! pass over a three-way [`TreeWalk`] (a merge in progress that has not).

use weave_git::{GitStore, Stage, TreeWalk};

use crate::error::MergeError;
use crate::resource::{ResourceKind, ResourceResolver};

use super::{Variant, VariantCache, VariantOrigin, VariantTreeProvider};

/// Build the provider from the repository's merge index.
///
/// Stage-0 entries are skipped entirely; stages 1/2/3 land in the base,
/// source, and remote caches respectively. An entry at any other stage
/// surfaces from the store as index corruption and aborts construction.
pub fn from_merge_index(
    store: &dyn GitStore,
    resolver: &dyn ResourceResolver,
) -> Result<VariantTreeProvider, MergeError> {
    let mut base = VariantCache::new();
    let mut source = VariantCache::new();
    let mut remote = VariantCache::new();

    for entry in store.merge_index()? {
        let cache = match entry.stage {
            Stage::Unconflicted => continue,
            Stage::Base => &mut base,
            Stage::Ours => &mut source,
            Stage::Theirs => &mut remote,
        };
        let resource = resolver.resolve(&entry.path, ResourceKind::File);
        cache.set_variant(
            &resource,
            Variant::new(entry.oid, entry.mode, VariantOrigin::Index),
        );
    }

    Ok(VariantTreeProvider::new(base, source, remote))
}

/// Which walk sides hold the base, ours, and theirs trees.
#[derive(Clone, Copy, Debug)]
pub struct WalkSides {
    pub base: usize,
    pub ours: usize,
    pub theirs: usize,
}

/// Build the provider from one pass over an existing walk.
///
/// The walk is rewound before scanning and again afterwards, so the caller
/// can reuse the same walk object for the real merge pass immediately after
/// this returns. Sides backed by a live index builder are the documented
/// exception: [`TreeWalk::rewind`] leaves those exhausted.
///
/// Untracked triples (all three raw modes zero) are skipped.
pub fn from_tree_walk(
    walk: &mut TreeWalk,
    sides: WalkSides,
    resolver: &dyn ResourceResolver,
) -> Result<VariantTreeProvider, MergeError> {
    let mut base = VariantCache::new();
    let mut source = VariantCache::new();
    let mut remote = VariantCache::new();

    walk.rewind();
    while let Some(path) = walk.next_path() {
        let modes = [
            walk.raw_mode(sides.base),
            walk.raw_mode(sides.ours),
            walk.raw_mode(sides.theirs),
        ];
        if modes.iter().all(|&m| m == 0) {
            continue;
        }
        let resource = resolver.resolve(&path, ResourceKind::File);
        for (side, cache) in [
            (sides.base, &mut base),
            (sides.ours, &mut source),
            (sides.theirs, &mut remote),
        ] {
            if let Some(entry) = walk.entry(side) {
                cache.set_variant(
                    &resource,
                    Variant::new(entry.oid, entry.mode, VariantOrigin::TreeWalk),
                );
            }
        }
    }
    walk.rewind();

    Ok(VariantTreeProvider::new(base, source, remote))
}

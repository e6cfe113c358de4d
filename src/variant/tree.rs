//! Frozen tree views over variant caches.

use crate::resource::ResourceId;

use super::{Variant, VariantCache};

/// A read-only tree view over one [`VariantCache`].
///
/// Deliberately frozen: the merge walk must see a single consistent view of
/// base/ours/theirs even if the index or working tree changes mid-operation.
/// [`VariantTree::refresh`] always returns nothing and changes nothing;
/// callers needing fresher data re-construct the provider.
pub struct VariantTree {
    cache: VariantCache,
}

impl VariantTree {
    #[must_use]
    pub fn new(cache: VariantCache) -> Self {
        Self { cache }
    }

    #[must_use]
    pub fn roots(&self) -> &[ResourceId] {
        self.cache.roots()
    }

    #[must_use]
    pub fn members(&self, resource: &ResourceId) -> &[ResourceId] {
        self.cache.members(resource)
    }

    #[must_use]
    pub fn variant_for(&self, resource: &ResourceId) -> Option<&Variant> {
        self.cache.variant_for(resource)
    }

    #[must_use]
    pub fn has_variant(&self, resource: &ResourceId) -> bool {
        self.cache.variant_for(resource).is_some()
    }

    #[must_use]
    pub fn known_resources(&self) -> &[ResourceId] {
        self.cache.known_resources()
    }

    /// Frozen-snapshot contract: always empty, never alters later answers.
    #[must_use]
    pub fn refresh(&self) -> Vec<ResourceId> {
        Vec::new()
    }

    /// Frozen-snapshot contract: nothing buffered, nothing to flush.
    pub fn flush_variants(&self) {}
}

// ---------------------------------------------------------------------------
// VariantTreeProvider
// ---------------------------------------------------------------------------

/// The three frozen sides of a merge, built once at construction.
///
/// Exposes the union of roots and known resources across all three sides.
pub struct VariantTreeProvider {
    base: VariantTree,
    source: VariantTree,
    remote: VariantTree,
    roots: Vec<ResourceId>,
    known: Vec<ResourceId>,
}

impl VariantTreeProvider {
    #[must_use]
    pub fn new(base: VariantCache, source: VariantCache, remote: VariantCache) -> Self {
        let base = VariantTree::new(base);
        let source = VariantTree::new(source);
        let remote = VariantTree::new(remote);

        let mut roots = Vec::new();
        let mut known = Vec::new();
        for tree in [&base, &source, &remote] {
            for root in tree.roots() {
                if !roots.contains(root) {
                    roots.push(root.clone());
                }
            }
            for resource in tree.known_resources() {
                if !known.contains(resource) {
                    known.push(resource.clone());
                }
            }
        }

        Self {
            base,
            source,
            remote,
            roots,
            known,
        }
    }

    /// The common-ancestor side.
    #[must_use]
    pub fn base_tree(&self) -> &VariantTree {
        &self.base
    }

    /// The "ours" side. Named source because it overrides the default notion
    /// of local content: ours is not necessarily the literal working tree.
    #[must_use]
    pub fn source_tree(&self) -> &VariantTree {
        &self.source
    }

    /// The "theirs" side.
    #[must_use]
    pub fn remote_tree(&self) -> &VariantTree {
        &self.remote
    }

    /// Union of the three sides' roots, in first-seen order.
    #[must_use]
    pub fn roots(&self) -> &[ResourceId] {
        &self.roots
    }

    /// Union of the three sides' known resources, in first-seen order.
    #[must_use]
    pub fn known_resources(&self) -> &[ResourceId] {
        &self.known
    }

    #[must_use]
    pub fn is_known(&self, resource: &ResourceId) -> bool {
        self.known.contains(resource)
    }
}

//! Insertion-ordered variant storage for one merge side.

use std::collections::HashMap;

use crate::resource::ResourceId;

use super::Variant;

/// Owns the variants recorded for one side (base, ours, or theirs), plus the
/// parent adjacency and project roots derived from them.
///
/// Built once by a single thread, then read-only. Unowned resources (no
/// project) are dropped on insert with no other side effects; the adjacency
/// records each inserted resource under its direct parent only, so
/// intermediate ancestors never appear as nodes of their own.
#[derive(Default)]
pub struct VariantCache {
    variants: HashMap<ResourceId, Variant>,
    order: Vec<ResourceId>,
    members: HashMap<ResourceId, Vec<ResourceId>>,
    roots: Vec<ResourceId>,
}

impl VariantCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `variant` for `resource`. A no-op when the resource has no
    /// owning project. Idempotent for the same resource.
    pub fn set_variant(&mut self, resource: &ResourceId, variant: Variant) {
        let Some(root) = resource.project_root() else {
            return;
        };

        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
        if self.variants.insert(resource.clone(), variant).is_none() {
            self.order.push(resource.clone());
        }
        self.members.entry(resource.clone()).or_default();
        if let Some(parent) = resource.parent() {
            let children = self.members.entry(parent).or_default();
            if !children.contains(resource) {
                children.push(resource.clone());
            }
        }
    }

    #[must_use]
    pub fn variant_for(&self, resource: &ResourceId) -> Option<&Variant> {
        self.variants.get(resource)
    }

    /// Project roots of every recorded resource, in first-seen order.
    #[must_use]
    pub fn roots(&self) -> &[ResourceId] {
        &self.roots
    }

    /// Every resource with a recorded variant, in insertion order.
    #[must_use]
    pub fn known_resources(&self) -> &[ResourceId] {
        &self.order
    }

    /// The recorded children of `resource`. Empty for resources never seen
    /// as a parent; never an error.
    #[must_use]
    pub fn members(&self, resource: &ResourceId) -> &[ResourceId] {
        self.members.get(resource).map_or(&[], Vec::as_slice)
    }
}

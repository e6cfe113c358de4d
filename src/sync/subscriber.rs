//! Sync queries and diff conversion over a [`VariantTreeProvider`].

use weave_git::GitStore;

use crate::error::MergeError;
use crate::resource::ResourceId;
use crate::variant::{compare_variants, Variant, VariantTreeProvider};

use super::{FileRevision, SyncKind, ThreeWayDiff, TwoWayDiff};

/// Answers sync-state and diff queries against the three frozen variant
/// trees.
///
/// The "source" tree stands in for local content: the ours side of a merge is
/// not necessarily the literal working tree, so the provider's source tree
/// overrides it. Comparison is always three-way and always byte-equality.
pub struct Subscriber<'a> {
    store: &'a dyn GitStore,
    provider: &'a VariantTreeProvider,
}

impl<'a> Subscriber<'a> {
    #[must_use]
    pub fn new(store: &'a dyn GitStore, provider: &'a VariantTreeProvider) -> Self {
        Self { store, provider }
    }

    /// The provider's roots.
    #[must_use]
    pub fn roots(&self) -> &[ResourceId] {
        self.provider.roots()
    }

    /// A resource is supervised iff the provider knows it on any side.
    #[must_use]
    pub fn is_supervised(&self, resource: &ResourceId) -> bool {
        self.provider.is_known(resource)
    }

    /// Classify the resource's three-way sync state.
    pub fn sync_kind(&self, resource: &ResourceId) -> Result<SyncKind, MergeError> {
        let base = self.provider.base_tree().variant_for(resource);
        let ours = self.provider.source_tree().variant_for(resource);
        let theirs = self.provider.remote_tree().variant_for(resource);

        // A read failure on the source side must not escape the diff path;
        // treat the side as changed and let the revision fallback handle it.
        let local_changed = match self.sides_equal(base, ours) {
            Ok(equal) => !equal,
            Err(err) => {
                tracing::error!(path = %resource.path, %err, "failed to compare source variant");
                true
            }
        };
        let remote_changed = !self.sides_equal(base, theirs)?;
        Ok(match (local_changed, remote_changed) {
            (false, false) => SyncKind::InSync,
            (true, false) => SyncKind::Outgoing,
            (false, true) => SyncKind::Incoming,
            (true, true) => SyncKind::Conflicting,
        })
    }

    /// Build the three-way diff for a resource, or `None` when it is in
    /// sync. Composed from two independent two-way diffs: base→ours when the
    /// local side changed, base→theirs when the remote side did.
    pub fn delta_for(&self, resource: &ResourceId) -> Result<Option<ThreeWayDiff>, MergeError> {
        let kind = self.sync_kind(resource)?;
        if kind == SyncKind::InSync {
            return Ok(None);
        }

        let base = self.provider.base_tree().variant_for(resource);
        let local = if matches!(kind, SyncKind::Outgoing | SyncKind::Conflicting) {
            let ours = self.provider.source_tree().variant_for(resource);
            Some(TwoWayDiff::new(
                self.revision(resource, base)?,
                self.source_revision(resource, ours),
            ))
        } else {
            None
        };
        let remote = if matches!(kind, SyncKind::Incoming | SyncKind::Conflicting) {
            let theirs = self.provider.remote_tree().variant_for(resource);
            Some(TwoWayDiff::new(
                self.revision(resource, base)?,
                self.revision(resource, theirs)?,
            ))
        } else {
            None
        };

        Ok(Some(ThreeWayDiff { kind, local, remote }))
    }

    fn sides_equal(&self, a: Option<&Variant>, b: Option<&Variant>) -> Result<bool, MergeError> {
        match (a, b) {
            (None, None) => Ok(true),
            (Some(a), Some(b)) => compare_variants(self.store, a, b),
            _ => Ok(false),
        }
    }

    /// Materialize a variant as a file revision. Folders carry no revisions,
    /// and neither do gitlinks: their oid names a commit in the submodule's
    /// repository, not a blob in this one.
    fn revision(
        &self,
        resource: &ResourceId,
        variant: Option<&Variant>,
    ) -> Result<Option<FileRevision>, MergeError> {
        let Some(variant) = variant else {
            return Ok(None);
        };
        if !resource.is_file() || variant.is_tree() || variant.mode.is_gitlink() {
            return Ok(None);
        }
        let bytes = self.store.read_blob(variant.oid)?;
        Ok(Some(FileRevision {
            oid: Some(variant.oid),
            bytes,
        }))
    }

    /// Like [`Self::revision`], but a read failure on the source side falls
    /// back to the live working-tree content instead of failing the diff
    /// path.
    fn source_revision(
        &self,
        resource: &ResourceId,
        variant: Option<&Variant>,
    ) -> Option<FileRevision> {
        match self.revision(resource, variant) {
            Ok(rev) => rev,
            Err(err) => {
                tracing::error!(
                    path = %resource.path,
                    %err,
                    "failed to read source variant, falling back to working tree"
                );
                match self.store.worktree_file(&resource.path) {
                    Ok(Some(file)) => Some(FileRevision {
                        oid: None,
                        bytes: file.bytes,
                    }),
                    Ok(None) => None,
                    Err(err) => {
                        tracing::error!(path = %resource.path, %err, "working-tree fallback failed");
                        None
                    }
                }
            }
        }
    }
}

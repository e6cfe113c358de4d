//! The model-merge sub-protocol.
//!
//! One logical model, one resolved model merger: initialize the comparison
//! scope, hand a merge context to the merger, then translate per-resource
//! outcomes back into index-builder state. Failures here are fatal to the
//! whole merge; once model machinery has partially run, an inconsistent
//! continuation is worse than a hard abort.

use std::collections::{BTreeSet, HashMap};

use weave_git::{CacheEntry, GitStore, Stage};

use crate::error::MergeError;
use crate::models::LogicalModel;
use crate::resource::ResourceId;
use crate::sync::{Subscriber, ThreeWayDiff};
use crate::variant::{Variant, VariantTreeProvider};

use super::scope::{CancelToken, ScopeManager, ScopeOutcome};
use super::MergeState;

// ---------------------------------------------------------------------------
// ModelMerger / context
// ---------------------------------------------------------------------------

/// Overall status a model merger reports for its whole model.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelMergeStatus {
    /// Every resource merged.
    Ok,
    /// At least one resource did not merge; per-resource outcomes decide
    /// which (resources the merger marked merged are still clean).
    Conflicts,
}

/// A pluggable whole-model merge engine.
pub trait ModelMerger: Send + Sync {
    /// Name used in logs and error reports.
    fn name(&self) -> &str;

    /// Merge the model in `ctx`. An `Err` aborts the entire merge.
    fn merge(&self, ctx: &mut ModelMergeContext<'_>) -> Result<ModelMergeStatus, MergeError>;
}

/// Everything a model merger sees: the model's resources, their three-way
/// diffs, working-tree access, and the mark-merged callback.
pub struct ModelMergeContext<'a> {
    store: &'a dyn GitStore,
    members: Vec<ResourceId>,
    diffs: HashMap<ResourceId, ThreeWayDiff>,
    merged: BTreeSet<ResourceId>,
}

impl<'a> ModelMergeContext<'a> {
    pub(crate) fn new(
        store: &'a dyn GitStore,
        subscriber: &Subscriber<'_>,
        model: &LogicalModel,
    ) -> Result<Self, MergeError> {
        let members: Vec<ResourceId> = model.iter().cloned().collect();
        let mut diffs = HashMap::new();
        for member in &members {
            if let Some(diff) = subscriber.delta_for(member)? {
                diffs.insert(member.clone(), diff);
            }
        }
        Ok(Self {
            store,
            members,
            diffs,
            merged: BTreeSet::new(),
        })
    }

    /// The model's resources, in model order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceId] {
        &self.members
    }

    /// The three-way diff for one resource; `None` when it is in sync.
    #[must_use]
    pub fn diff_for(&self, resource: &ResourceId) -> Option<&ThreeWayDiff> {
        self.diffs.get(resource)
    }

    /// Read one resource's current working-tree content.
    pub fn read_working_tree(&self, resource: &ResourceId) -> Result<Option<Vec<u8>>, MergeError> {
        Ok(self
            .store
            .worktree_file(&resource.path)?
            .map(|file| file.bytes))
    }

    /// Write merged content for one resource into the working tree.
    pub fn write_working_tree(
        &self,
        resource: &ResourceId,
        content: &[u8],
    ) -> Result<(), MergeError> {
        self.store.write_worktree_file(&resource.path, content)?;
        Ok(())
    }

    /// Mark one resource as merged. Marked resources are reconciled from
    /// the working tree and never staged as conflicts, even under an
    /// overall [`ModelMergeStatus::Conflicts`].
    pub fn mark_merged(&mut self, resource: &ResourceId) {
        self.merged.insert(resource.clone());
    }

    #[must_use]
    pub fn is_marked_merged(&self, resource: &ResourceId) -> bool {
        self.merged.contains(resource)
    }
}

// ---------------------------------------------------------------------------
// Sub-protocol
// ---------------------------------------------------------------------------

/// Run one model through its merger and fold the outcome into `state`.
pub(crate) fn merge_model(
    store: &dyn GitStore,
    scope: &dyn ScopeManager,
    cancel: &CancelToken,
    subscriber: &Subscriber<'_>,
    provider: &VariantTreeProvider,
    model: &LogicalModel,
    merger: &dyn ModelMerger,
    state: &mut MergeState,
) -> Result<(), MergeError> {
    let members: Vec<ResourceId> = model.iter().cloned().collect();

    let future = scope.begin(&members)?;
    match future.wait(cancel) {
        ScopeOutcome::Ready => {}
        ScopeOutcome::Cancelled => {
            tracing::error!(merger = merger.name(), "scope initialization cancelled");
            return Err(MergeError::ScopeCancelled);
        }
        ScopeOutcome::Failed(detail) => {
            tracing::error!(merger = merger.name(), %detail, "scope initialization failed");
            return Err(MergeError::ScopeFailed { detail });
        }
    }

    let mut ctx = ModelMergeContext::new(store, subscriber, model)?;
    let status = merger.merge(&mut ctx).map_err(|err| {
        tracing::error!(merger = merger.name(), %err, "model merger failed");
        MergeError::ModelMerge {
            merger: merger.name().to_owned(),
            detail: err.to_string(),
        }
    })?;

    for member in &members {
        state.handled.insert(member.path.clone());

        if status != ModelMergeStatus::Ok && !ctx.is_marked_merged(member) {
            stage_conflict(provider, member, state);
            continue;
        }
        // Unchanged, or the merger resolved it on disk; either way the final
        // index must reflect current working-tree state.
        state.make_in_sync.insert(member.path.clone());
    }
    Ok(())
}

/// Stage a resource's three variants at conflict stages 1/2/3.
///
/// Absent and tree-typed variants are never staged; only real file blobs
/// occupy conflict stages. Staged entries carry the zero-length, zero-mtime
/// sentinels.
fn stage_conflict(provider: &VariantTreeProvider, resource: &ResourceId, state: &mut MergeState) {
    let sides: [(Option<&Variant>, Stage); 3] = [
        (provider.base_tree().variant_for(resource), Stage::Base),
        (provider.source_tree().variant_for(resource), Stage::Ours),
        (provider.remote_tree().variant_for(resource), Stage::Theirs),
    ];
    for (variant, stage) in sides {
        let Some(variant) = variant else { continue };
        if variant.is_tree() {
            continue;
        }
        state.builder.add(CacheEntry::conflicted(
            resource.path.clone(),
            variant.mode,
            variant.oid,
            stage,
        ));
    }
    state.record_conflict(&resource.path, "model merge left this file unmerged");
}

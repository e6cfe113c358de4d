//! The merge engine: orchestration, model delegation, and fallbacks.

mod driver;
mod model;
mod scope;
mod storage;
mod text;

pub use driver::{Collaborators, MergeOutcome, ModelMergeDriver};
pub use model::{ModelMergeContext, ModelMergeStatus, ModelMerger};
pub use scope::{
    CancelToken, ScopeFuture, ScopeHandle, ScopeManager, ScopeOutcome, ThreadedScopeManager,
};
pub use storage::{ContentMerger, StorageMerger};
pub use text::{merge_text, TextMergeOutcome};

use std::collections::BTreeSet;

use serde::Serialize;

use weave_git::IndexBuilder;

/// One conflicted path in a merge outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConflictEntry {
    /// Path relative to the repository root.
    pub path: String,
    /// Human-readable conflict classification.
    pub description: String,
}

/// Mutable bookkeeping for one merge invocation.
///
/// Created fresh per merge, discarded when the merge completes or fails.
/// Single-writer: only the orchestrator thread touches it.
#[derive(Default)]
pub(crate) struct MergeState {
    /// The index being accumulated.
    pub builder: IndexBuilder,
    /// Paths already processed as part of a model merge.
    pub handled: BTreeSet<String>,
    /// Cleanly-merged paths to reconcile from the working tree afterwards.
    pub make_in_sync: BTreeSet<String>,
    /// Paths left conflicted.
    pub unmerged: BTreeSet<String>,
    /// Paths merged without conflict.
    pub merged: BTreeSet<String>,
    /// Structured conflict records for reporting.
    pub conflicts: Vec<ConflictEntry>,
}

impl MergeState {
    pub(crate) fn record_conflict(&mut self, path: &str, description: &str) {
        self.unmerged.insert(path.to_owned());
        self.conflicts.push(ConflictEntry {
            path: path.to_owned(),
            description: description.to_owned(),
        });
    }
}

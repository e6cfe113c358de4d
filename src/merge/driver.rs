//! The model-aware recursive merge driver.
//!
//! Walks the union of (base, ours, theirs, index, working tree) and merges
//! entry by entry. Files belonging to a logical model are delegated to the
//! model's merger as one unit; everything else goes through the ordinary
//! per-file three-way merge with content-merger and text-merge fallbacks.
//!
//! The index is written only when the whole walk succeeds. Any error drops
//! the accumulated index builder, leaving the on-disk index untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use weave_git::{
    CacheEntry, EntryMode, FlatTreeIter, GitOid, GitStore, IndexIter, Stage, StageEntry, TreeWalk,
    WalkEntry, WalkIterator, WorktreeIter,
};

use crate::error::MergeError;
use crate::models::{LogicalModels, ModelRegistry};
use crate::resource::{ResourceKind, ResourceResolver};
use crate::sync::Subscriber;
use crate::variant::{from_tree_walk, WalkSides};

use super::model::merge_model;
use super::scope::{CancelToken, ScopeManager};
use super::storage::StorageMerger;
use super::text::{merge_text, TextMergeOutcome};
use super::{ConflictEntry, MergeState};

// Walk side layout.
const BASE: usize = 0;
const OURS: usize = 1;
const THEIRS: usize = 2;

// ---------------------------------------------------------------------------
// Collaborators / outcome
// ---------------------------------------------------------------------------

/// Everything the driver depends on, passed in explicitly so each piece can
/// be substituted in tests.
pub struct Collaborators<'a> {
    pub store: &'a dyn GitStore,
    pub resolver: &'a dyn ResourceResolver,
    pub registry: Arc<dyn ModelRegistry>,
    pub scope: &'a dyn ScopeManager,
    pub storage: &'a StorageMerger,
    pub cancel: CancelToken,
}

/// Result of one merge invocation.
#[derive(Clone, Debug, Serialize)]
pub struct MergeOutcome {
    /// `true` when no path was left conflicted.
    pub clean: bool,
    /// Whether logical-model machinery was active for this merge.
    pub model_aware: bool,
    /// Paths merged without conflict, sorted.
    pub merged: Vec<String>,
    /// Conflicted paths with a short classification each.
    pub conflicts: Vec<ConflictEntry>,
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Orchestrates one model-aware three-way merge.
pub struct ModelMergeDriver<'a> {
    collab: Collaborators<'a>,
    extra_denied: Vec<String>,
    model_aware: bool,
}

impl<'a> ModelMergeDriver<'a> {
    #[must_use]
    pub fn new(collab: Collaborators<'a>) -> Self {
        Self {
            collab,
            extra_denied: Vec::new(),
            model_aware: true,
        }
    }

    /// Disable model awareness entirely; every file merges individually.
    #[must_use]
    pub fn model_aware(mut self, enabled: bool) -> Self {
        self.model_aware = enabled;
        self
    }

    /// Deny additional model providers beyond the built-in denylist.
    #[must_use]
    pub fn denied_providers(mut self, ids: Vec<String>) -> Self {
        self.extra_denied = ids;
        self
    }

    /// Merge the three trees and write the resulting index.
    pub fn merge_trees(
        &self,
        base: GitOid,
        ours: GitOid,
        theirs: GitOid,
    ) -> Result<MergeOutcome, MergeError> {
        let store = self.collab.store;
        let resolver = self.collab.resolver;

        let index_snapshot = store.merge_index()?;
        let mut index_map: BTreeMap<String, Vec<StageEntry>> = BTreeMap::new();
        for entry in &index_snapshot {
            index_map.entry(entry.path.clone()).or_default().push(entry.clone());
        }

        let sides: Vec<Box<dyn WalkIterator>> = vec![
            Box::new(FlatTreeIter::new(store, base)?),
            Box::new(FlatTreeIter::new(store, ours)?),
            Box::new(FlatTreeIter::new(store, theirs)?),
            Box::new(IndexIter::new(&index_snapshot)),
            Box::new(WorktreeIter::new(store)?),
        ];
        let mut walk = TreeWalk::new(sides);

        let provider = from_tree_walk(
            &mut walk,
            WalkSides {
                base: BASE,
                ours: OURS,
                theirs: THEIRS,
            },
            resolver,
        )?;
        let subscriber = Subscriber::new(store, &provider);

        // Without a successful refresh, existence answers may be stale and
        // corrupt model discovery. Fall back to a plain recursive merge.
        let mut model_aware = self.model_aware;
        if model_aware {
            if let Err(err) = resolver.refresh(provider.roots()) {
                tracing::warn!(%err, "resource refresh failed, merging without model awareness");
                model_aware = false;
            }
        }

        // Models are discovered eagerly: the walk may visit a member that
        // does not exist locally before the sibling that does.
        let mut models = LogicalModels::new(Arc::clone(&self.collab.registry), &self.extra_denied);
        if model_aware {
            models.build(provider.known_resources(), resolver);
        }

        let mut state = MergeState::default();
        while let Some(path) = walk.next_path() {
            let tree_sides = [walk.entry(BASE), walk.entry(OURS), walk.entry(THEIRS)];
            if tree_sides.iter().all(Option::is_none) {
                // Untracked on all three trees. Staged additions survive
                // unchanged; everything else is left alone.
                if let Some(entries) = index_map.get(&path) {
                    for entry in entries {
                        state.builder.keep(entry);
                    }
                }
                continue;
            }

            if state.handled.contains(&path) {
                if !state.unmerged.contains(&path) {
                    state.make_in_sync.insert(path);
                }
                continue;
            }

            if model_aware {
                let resource = resolver.resolve(&path, ResourceKind::File);
                if let Some(model) = models.model_for(&resource) {
                    // A model merger may have materialized resources since
                    // the initial refresh.
                    if let Err(err) = resolver.refresh(provider.roots()) {
                        tracing::warn!(%err, "refresh before model merge failed");
                    }
                    match models.find_merger(&model, resolver) {
                        Ok(Some(merger)) => {
                            merge_model(
                                store,
                                self.collab.scope,
                                &self.collab.cancel,
                                &subscriber,
                                &provider,
                                &model,
                                merger.as_ref(),
                                &mut state,
                            )?;
                            continue;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            tracing::warn!(%path, %err, "model merger lookup failed, merging per file");
                        }
                    }
                }
            }

            self.merge_entry(&path, &tree_sides, &index_map, &mut state)?;
        }

        let resync: Vec<String> = state.make_in_sync.iter().cloned().collect();
        for path in &resync {
            self.reconcile(path, &index_map, &mut state)?;
        }

        let entries = std::mem::take(&mut state.builder).finish();
        store.write_index(&entries)?;

        Ok(MergeOutcome {
            clean: state.unmerged.is_empty(),
            model_aware,
            merged: state.merged.into_iter().collect(),
            conflicts: state.conflicts,
        })
    }

    // -----------------------------------------------------------------------
    // Per-file merge
    // -----------------------------------------------------------------------

    fn merge_entry(
        &self,
        path: &str,
        sides: &[Option<WalkEntry>; 3],
        index_map: &BTreeMap<String, Vec<StageEntry>>,
        state: &mut MergeState,
    ) -> Result<(), MergeError> {
        let store = self.collab.store;
        let base = sides[BASE].as_ref();
        let ours = sides[OURS].as_ref();
        let theirs = sides[THEIRS].as_ref();

        // Both sides agree, including agreeing on deletion: take ours.
        if same(ours, theirs) {
            if let Some(entry) = ours {
                keep_side(path, entry, index_map, state);
            }
            state.merged.insert(path.to_owned());
            return Ok(());
        }

        // Only theirs changed: take theirs into index and working tree.
        if same(base, ours) {
            match theirs {
                Some(entry) => {
                    state
                        .builder
                        .add(CacheEntry::resolved(path, entry.mode, entry.oid));
                    if !entry.mode.is_gitlink() {
                        let bytes = store.read_blob(entry.oid)?;
                        store.write_worktree_file(path, &bytes)?;
                    }
                }
                None => store.remove_worktree_file(path)?,
            }
            state.merged.insert(path.to_owned());
            return Ok(());
        }

        // Only ours changed: the index and working tree already hold it.
        if same(base, theirs) {
            if let Some(entry) = ours {
                keep_side(path, entry, index_map, state);
            }
            state.merged.insert(path.to_owned());
            return Ok(());
        }

        // Both sides changed.
        let (Some(our_entry), Some(their_entry)) = (ours, theirs) else {
            self.stage_sides(path, sides, state, "deleted on one side, modified on the other");
            return Ok(());
        };

        let unmergeable = |mode: EntryMode| mode.is_gitlink() || mode == EntryMode::Link;
        if unmergeable(our_entry.mode)
            || unmergeable(their_entry.mode)
            || base.is_some_and(|e| unmergeable(e.mode))
        {
            self.stage_sides(path, sides, state, "link changed on both sides");
            return Ok(());
        }

        // Same blob, different mode: the mode conflict resolves to ours.
        if our_entry.oid == their_entry.oid {
            state
                .builder
                .add(CacheEntry::resolved(path, our_entry.mode, our_entry.oid));
            state.merged.insert(path.to_owned());
            return Ok(());
        }

        if let Some(base_entry) = base {
            if let Some(bytes) = self.collab.storage.try_merge(
                store,
                path,
                base_entry.oid,
                our_entry.oid,
                their_entry.oid,
            ) {
                return self.accept_merged(path, our_entry.mode, &bytes, state);
            }
        }

        let base_bytes = match base {
            Some(entry) => store.read_blob(entry.oid)?,
            None => Vec::new(),
        };
        let our_bytes = store.read_blob(our_entry.oid)?;
        let their_bytes = store.read_blob(their_entry.oid)?;
        match merge_text(&base_bytes, &our_bytes, &their_bytes)? {
            TextMergeOutcome::Clean(bytes) => {
                self.accept_merged(path, our_entry.mode, &bytes, state)
            }
            TextMergeOutcome::Conflicted(bytes) => {
                // Leave the markers in the working tree for the user.
                store.write_worktree_file(path, &bytes)?;
                self.stage_sides(path, sides, state, "content changed on both sides");
                Ok(())
            }
        }
    }

    fn accept_merged(
        &self,
        path: &str,
        mode: EntryMode,
        bytes: &[u8],
        state: &mut MergeState,
    ) -> Result<(), MergeError> {
        let store = self.collab.store;
        let oid = store.write_blob(bytes)?;
        store.write_worktree_file(path, bytes)?;
        state.builder.add(CacheEntry::resolved(path, mode, oid));
        state.merged.insert(path.to_owned());
        Ok(())
    }

    fn stage_sides(
        &self,
        path: &str,
        sides: &[Option<WalkEntry>; 3],
        state: &mut MergeState,
        description: &str,
    ) {
        let staged = [
            (sides[BASE].as_ref(), Stage::Base),
            (sides[OURS].as_ref(), Stage::Ours),
            (sides[THEIRS].as_ref(), Stage::Theirs),
        ];
        for (entry, stage) in staged {
            if let Some(entry) = entry {
                state
                    .builder
                    .add(CacheEntry::conflicted(path, entry.mode, entry.oid, stage));
            }
        }
        state.record_conflict(path, description);
    }

    // -----------------------------------------------------------------------
    // Re-sync pass
    // -----------------------------------------------------------------------

    /// Fold one working-tree path that a model merger touched (or declined
    /// to touch) back into the index being built.
    fn reconcile(
        &self,
        path: &str,
        index_map: &BTreeMap<String, Vec<StageEntry>>,
        state: &mut MergeState,
    ) -> Result<(), MergeError> {
        let store = self.collab.store;
        let existing = index_map.get(path).and_then(|entries| {
            entries
                .iter()
                .find(|e| e.stage == Stage::Unconflicted)
                .or_else(|| entries.iter().find(|e| e.stage == Stage::Ours))
        });

        match (store.worktree_file(path)?, existing) {
            // Submodule links already in the index are always kept as-is.
            (_, Some(entry)) if entry.mode.is_gitlink() => {
                state.builder.keep(entry);
            }
            (Some(file), Some(entry)) => {
                if entry.assume_valid || entry.is_fresh(file.size, file.mtime) {
                    state.builder.keep(entry);
                } else {
                    self.fresh_entry(path, &file, state)?;
                }
            }
            (Some(file), None) => {
                // A worktree submodule carries no blob to hash; copy the
                // link's commit id instead. Links whose HEAD cannot be
                // resolved are left out.
                if file.mode.is_gitlink() {
                    let Some(oid) = file.link_oid else {
                        return Ok(());
                    };
                    state.builder.add(CacheEntry {
                        path: path.to_owned(),
                        mode: file.mode,
                        oid,
                        stage: Stage::Unconflicted,
                        size: 0,
                        mtime: 0,
                        assume_valid: false,
                    });
                } else if store.is_ignored(path)? {
                    // Ignored-and-unindexed files are not the merge's business.
                    return Ok(());
                } else {
                    self.fresh_entry(path, &file, state)?;
                }
            }
            // Gone from disk and not a submodule: nothing to record.
            (None, _) => return Ok(()),
        }
        state.merged.insert(path.to_owned());
        Ok(())
    }

    fn fresh_entry(
        &self,
        path: &str,
        file: &weave_git::WorktreeFile,
        state: &mut MergeState,
    ) -> Result<(), MergeError> {
        let oid = self.collab.store.write_blob(&file.bytes)?;
        state.builder.add(CacheEntry {
            path: path.to_owned(),
            mode: file.mode,
            oid,
            stage: Stage::Unconflicted,
            size: file.size,
            mtime: file.mtime,
            assume_valid: false,
        });
        Ok(())
    }
}

fn same(a: Option<&WalkEntry>, b: Option<&WalkEntry>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.oid == b.oid && a.mode == b.mode,
        (None, None) => true,
        _ => false,
    }
}

/// Carry the matching stage-0 index entry (preserving its stat data) when
/// the index already holds this exact blob; otherwise add a plain entry.
fn keep_side(
    path: &str,
    entry: &WalkEntry,
    index_map: &BTreeMap<String, Vec<StageEntry>>,
    state: &mut MergeState,
) {
    if let Some(stage0) = index_map
        .get(path)
        .and_then(|entries| entries.iter().find(|e| e.stage == Stage::Unconflicted))
    {
        if stage0.oid == entry.oid && stage0.mode == entry.mode {
            state.builder.keep(stage0);
            return;
        }
    }
    state
        .builder
        .add(CacheEntry::resolved(path, entry.mode, entry.oid));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::scope::ScopeFuture;
    use crate::models::{ModelProvider, StaticModelRegistry};
    use crate::resource::{ProjectMap, ResourceId};
    use weave_git::MemoryStore;

    struct ReadyScope;

    impl ScopeManager for ReadyScope {
        fn begin(&self, _model: &[ResourceId]) -> Result<ScopeFuture, MergeError> {
            Ok(ScopeFuture::ready())
        }
    }

    /// A store seeded so the index and working tree reflect the ours tree.
    fn checkout_ours(store: &MemoryStore, files: &[(&str, &str)]) {
        for (path, content) in files {
            store.put_worktree(path, content.as_bytes(), 10);
            store.stage_from_worktree(path);
        }
    }

    fn run_merge(
        store: &MemoryStore,
        registry: Arc<dyn ModelRegistry>,
        base: GitOid,
        ours: GitOid,
        theirs: GitOid,
    ) -> MergeOutcome {
        let resolver = ProjectMap::new(store, &[".".to_owned()]).unwrap();
        let scope = ReadyScope;
        let storage = StorageMerger::new();
        let driver = ModelMergeDriver::new(Collaborators {
            store,
            resolver: &resolver,
            registry,
            scope: &scope,
            storage: &storage,
            cancel: CancelToken::new(),
        });
        driver.merge_trees(base, ours, theirs).unwrap()
    }

    fn no_models() -> Arc<dyn ModelRegistry> {
        Arc::new(StaticModelRegistry::default())
    }

    fn stage0(entries: &[StageEntry], path: &str) -> StageEntry {
        entries
            .iter()
            .find(|e| e.path == path && e.stage == Stage::Unconflicted)
            .cloned()
            .unwrap_or_else(|| panic!("no stage-0 entry for {path}"))
    }

    #[test]
    fn disjoint_changes_merge_cleanly() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("a.txt", "a0"), ("b.txt", "b0")]);
        let ours = store.tree_from_files(&[("a.txt", "a1"), ("b.txt", "b0")]);
        let theirs = store.tree_from_files(&[("a.txt", "a0"), ("b.txt", "b1")]);
        checkout_ours(&store, &[("a.txt", "a1"), ("b.txt", "b0")]);

        let outcome = run_merge(&store, no_models(), base, ours, theirs);

        assert!(outcome.clean);
        assert_eq!(outcome.merged, ["a.txt", "b.txt"]);
        let entries = store.index_entries();
        assert_eq!(
            store.read_blob(stage0(&entries, "a.txt").oid).unwrap(),
            b"a1"
        );
        assert_eq!(
            store.read_blob(stage0(&entries, "b.txt").oid).unwrap(),
            b"b1"
        );
        // Theirs-side change landed in the working tree too.
        assert_eq!(store.worktree_file("b.txt").unwrap().unwrap().bytes, b"b1");
    }

    #[test]
    fn overlapping_edits_leave_three_stages_and_markers() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("f.txt", "line\n")]);
        let ours = store.tree_from_files(&[("f.txt", "ours\n")]);
        let theirs = store.tree_from_files(&[("f.txt", "theirs\n")]);
        checkout_ours(&store, &[("f.txt", "ours\n")]);

        let outcome = run_merge(&store, no_models(), base, ours, theirs);

        assert!(!outcome.clean);
        assert_eq!(outcome.conflicts.len(), 1);
        assert_eq!(outcome.conflicts[0].path, "f.txt");

        let entries = store.index_entries();
        let stages: Vec<Stage> = entries
            .iter()
            .filter(|e| e.path == "f.txt")
            .map(|e| e.stage)
            .collect();
        assert_eq!(stages, [Stage::Base, Stage::Ours, Stage::Theirs]);

        let text =
            String::from_utf8(store.worktree_file("f.txt").unwrap().unwrap().bytes).unwrap();
        assert!(text.contains("<<<<<<<"));
        assert!(text.contains(">>>>>>>"));
    }

    #[test]
    fn delete_versus_modify_conflicts() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("f.txt", "v0")]);
        let ours = store.tree_from_files(&[("f.txt", "v1")]);
        let theirs = store.tree_from_files(&[]);
        checkout_ours(&store, &[("f.txt", "v1")]);

        let outcome = run_merge(&store, no_models(), base, ours, theirs);

        assert!(!outcome.clean);
        let entries = store.index_entries();
        let stages: Vec<Stage> = entries
            .iter()
            .filter(|e| e.path == "f.txt")
            .map(|e| e.stage)
            .collect();
        // No theirs stage: the file is gone on that side.
        assert_eq!(stages, [Stage::Base, Stage::Ours]);
    }

    #[test]
    fn theirs_deletion_removes_the_working_tree_file() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("gone.txt", "v0"), ("keep.txt", "k")]);
        let ours = store.tree_from_files(&[("gone.txt", "v0"), ("keep.txt", "k")]);
        let theirs = store.tree_from_files(&[("keep.txt", "k")]);
        checkout_ours(&store, &[("gone.txt", "v0"), ("keep.txt", "k")]);

        let outcome = run_merge(&store, no_models(), base, ours, theirs);

        assert!(outcome.clean);
        assert!(store.worktree_file("gone.txt").unwrap().is_none());
        let entries = store.index_entries();
        assert!(entries.iter().all(|e| e.path != "gone.txt"));
        assert_eq!(store.read_blob(stage0(&entries, "keep.txt").oid).unwrap(), b"k");
    }

    #[test]
    fn untracked_files_and_staged_additions_survive() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("a.txt", "a")]);
        let ours = store.tree_from_files(&[("a.txt", "a")]);
        let theirs = store.tree_from_files(&[("a.txt", "a2")]);
        checkout_ours(&store, &[("a.txt", "a")]);
        // An untracked scratch file and a staged-but-uncommitted addition.
        store.put_worktree("scratch.txt", b"untracked", 10);
        store.put_worktree("staged.txt", b"staged", 10);
        store.stage_from_worktree("staged.txt");

        let outcome = run_merge(&store, no_models(), base, ours, theirs);

        assert!(outcome.clean);
        assert_eq!(
            store.worktree_file("scratch.txt").unwrap().unwrap().bytes,
            b"untracked"
        );
        let entries = store.index_entries();
        assert!(entries.iter().all(|e| e.path != "scratch.txt"));
        assert_eq!(
            store.read_blob(stage0(&entries, "staged.txt").oid).unwrap(),
            b"staged"
        );
    }

    #[test]
    fn registered_content_merger_preempts_text_merge() {
        struct OursPlusTheirs;
        impl crate::merge::ContentMerger for OursPlusTheirs {
            fn content_type(&self) -> &str {
                "bin"
            }
            fn merge(
                &self,
                _base: &[u8],
                ours: &[u8],
                theirs: &[u8],
            ) -> Result<Option<Vec<u8>>, MergeError> {
                let mut out = ours.to_vec();
                out.extend_from_slice(theirs);
                Ok(Some(out))
            }
        }

        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("d.bin", "0")]);
        let ours = store.tree_from_files(&[("d.bin", "A")]);
        let theirs = store.tree_from_files(&[("d.bin", "B")]);
        checkout_ours(&store, &[("d.bin", "A")]);

        let resolver = ProjectMap::new(&store, &[".".to_owned()]).unwrap();
        let scope = ReadyScope;
        let mut storage = StorageMerger::new();
        storage.register(Arc::new(OursPlusTheirs));
        let driver = ModelMergeDriver::new(Collaborators {
            store: &store,
            resolver: &resolver,
            registry: no_models(),
            scope: &scope,
            storage: &storage,
            cancel: CancelToken::new(),
        });
        let outcome = driver.merge_trees(base, ours, theirs).unwrap();

        assert!(outcome.clean);
        let entries = store.index_entries();
        assert_eq!(store.read_blob(stage0(&entries, "d.bin").oid).unwrap(), b"AB");
        assert_eq!(store.worktree_file("d.bin").unwrap().unwrap().bytes, b"AB");
    }

    // A provider grouping `.left`/`.right` pairs whose merger rewrites both
    // files on disk and marks them merged.
    struct PairProvider;

    impl ModelProvider for PairProvider {
        fn id(&self) -> &str {
            "pair"
        }
        fn mappings(
            &self,
            resources: &[ResourceId],
            resolver: &dyn ResourceResolver,
        ) -> Result<Vec<ResourceId>, MergeError> {
            let mut out = Vec::new();
            for r in resources {
                let Some((stem, ext)) = r.path.rsplit_once('.') else {
                    continue;
                };
                if ext != "left" && ext != "right" {
                    continue;
                }
                out.push(r.clone());
                let other = if ext == "left" { "right" } else { "left" };
                out.push(resolver.resolve(&format!("{stem}.{other}"), ResourceKind::File));
            }
            Ok(out)
        }
        fn merger(&self) -> Option<Arc<dyn crate::merge::ModelMerger>> {
            Some(Arc::new(PairMerger))
        }
    }

    struct PairMerger;

    impl crate::merge::ModelMerger for PairMerger {
        fn name(&self) -> &str {
            "pair"
        }
        fn merge(
            &self,
            ctx: &mut crate::merge::ModelMergeContext<'_>,
        ) -> Result<crate::merge::ModelMergeStatus, MergeError> {
            for resource in ctx.resources().to_vec() {
                ctx.write_working_tree(&resource, b"model merged\n")?;
                ctx.mark_merged(&resource);
            }
            Ok(crate::merge::ModelMergeStatus::Ok)
        }
    }

    #[test]
    fn model_members_are_merged_as_one_unit() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("m.left", "l0"), ("m.right", "r0")]);
        let ours = store.tree_from_files(&[("m.left", "l1"), ("m.right", "r0")]);
        let theirs = store.tree_from_files(&[("m.left", "l2"), ("m.right", "r2")]);
        checkout_ours(&store, &[("m.left", "l1"), ("m.right", "r0")]);

        let registry: Arc<dyn ModelRegistry> =
            Arc::new(StaticModelRegistry::new(vec![Arc::new(PairProvider)]));
        let outcome = run_merge(&store, registry, base, ours, theirs);

        assert!(outcome.clean);
        assert!(outcome.model_aware);
        let entries = store.index_entries();
        for path in ["m.left", "m.right"] {
            assert_eq!(
                store.read_blob(stage0(&entries, path).oid).unwrap(),
                b"model merged\n"
            );
            assert_eq!(
                store.worktree_file(path).unwrap().unwrap().bytes,
                b"model merged\n"
            );
        }
    }

    // Groups a submodule link with its config file. The merger only rewrites
    // the config file; the link itself has no blob content to write.
    struct LinkedConfigProvider;

    impl ModelProvider for LinkedConfigProvider {
        fn id(&self) -> &str {
            "linked-config"
        }
        fn mappings(
            &self,
            resources: &[ResourceId],
            resolver: &dyn ResourceResolver,
        ) -> Result<Vec<ResourceId>, MergeError> {
            let mut out = Vec::new();
            for r in resources {
                if r.path == "lib" || r.path == "lib.cfg" {
                    out.push(resolver.resolve("lib", ResourceKind::File));
                    out.push(resolver.resolve("lib.cfg", ResourceKind::File));
                }
            }
            Ok(out)
        }
        fn merger(&self) -> Option<Arc<dyn crate::merge::ModelMerger>> {
            Some(Arc::new(LinkedConfigMerger))
        }
    }

    struct LinkedConfigMerger;

    impl crate::merge::ModelMerger for LinkedConfigMerger {
        fn name(&self) -> &str {
            "linked-config"
        }
        fn merge(
            &self,
            ctx: &mut crate::merge::ModelMergeContext<'_>,
        ) -> Result<crate::merge::ModelMergeStatus, MergeError> {
            for resource in ctx.resources().to_vec() {
                if resource.path.ends_with(".cfg") {
                    ctx.write_working_tree(&resource, b"model merged\n")?;
                }
                ctx.mark_merged(&resource);
            }
            Ok(crate::merge::ModelMergeStatus::Ok)
        }
    }

    #[test]
    fn submodule_link_survives_model_resync_with_its_commit_id() {
        let store = MemoryStore::new();
        let sub_head = GitOid::from_bytes([7; 20]);
        let tree = |cfg: &str| {
            store.build_tree(&[
                ("lib".to_owned(), EntryMode::Commit, sub_head),
                ("lib.cfg".to_owned(), EntryMode::Blob, store.put_blob(cfg.as_bytes())),
            ])
        };
        let base = tree("c0");
        let ours = tree("c1");
        let theirs = tree("c2");
        checkout_ours(&store, &[("lib.cfg", "c1")]);
        store.put_gitlink("lib", sub_head);

        let registry: Arc<dyn ModelRegistry> =
            Arc::new(StaticModelRegistry::new(vec![Arc::new(LinkedConfigProvider)]));
        let outcome = run_merge(&store, registry, base, ours, theirs);

        assert!(outcome.clean);
        let entries = store.index_entries();
        assert_eq!(
            store.read_blob(stage0(&entries, "lib.cfg").oid).unwrap(),
            b"model merged\n"
        );
        // The link is recorded with the commit it points at; its oid is
        // never read as a blob from this store.
        let link = stage0(&entries, "lib");
        assert_eq!(link.mode, EntryMode::Commit);
        assert_eq!(link.oid, sub_head);
    }

    #[test]
    fn model_awareness_can_be_disabled() {
        let store = MemoryStore::new();
        let base = store.tree_from_files(&[("m.left", "line\n"), ("m.right", "r0")]);
        let ours = store.tree_from_files(&[("m.left", "ours\n"), ("m.right", "r0")]);
        let theirs = store.tree_from_files(&[("m.left", "theirs\n"), ("m.right", "r0")]);
        checkout_ours(&store, &[("m.left", "ours\n"), ("m.right", "r0")]);

        let resolver = ProjectMap::new(&store, &[".".to_owned()]).unwrap();
        let scope = ReadyScope;
        let storage = StorageMerger::new();
        let registry: Arc<dyn ModelRegistry> =
            Arc::new(StaticModelRegistry::new(vec![Arc::new(PairProvider)]));
        let driver = ModelMergeDriver::new(Collaborators {
            store: &store,
            resolver: &resolver,
            registry,
            scope: &scope,
            storage: &storage,
            cancel: CancelToken::new(),
        })
        .model_aware(false);
        let outcome = driver.merge_trees(base, ours, theirs).unwrap();

        // Without the model, the pair degrades to a per-file text conflict.
        assert!(!outcome.model_aware);
        assert!(!outcome.clean);
        assert_eq!(outcome.conflicts[0].path, "m.left");
    }
}

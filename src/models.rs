//! Logical model discovery.
//!
//! A logical model is the set of resources that must be merged as one unit
//! (a multi-file diagram, a generated pair, anything whose meaningful unit of
//! change spans several files). Models are discovered by breadth-first
//! transitive closure over pluggable [`ModelProvider`]s and cached so every
//! member maps to the same model set.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use crate::error::MergeError;
use crate::merge::ModelMerger;
use crate::resource::{ResourceId, ResourceResolver};

/// Provider ids that never contribute real cross-file semantics and are
/// excluded from closure and merger lookup.
pub const DEFAULT_DENYLIST: &[&str] = &["resources", "workspace-default", "changeset"];

// ---------------------------------------------------------------------------
// Provider traits
// ---------------------------------------------------------------------------

/// One source of cross-file grouping knowledge.
pub trait ModelProvider: Send + Sync {
    /// Stable identifier, matched against the denylist.
    fn id(&self) -> &str;

    /// All resources reachable from `resources` through this provider's
    /// mappings, including the matched inputs themselves.
    fn mappings(
        &self,
        resources: &[ResourceId],
        resolver: &dyn ResourceResolver,
    ) -> Result<Vec<ResourceId>, MergeError>;

    /// The model-capable merger this provider exposes, if any.
    fn merger(&self) -> Option<Arc<dyn ModelMerger>> {
        None
    }
}

/// Looks up providers for a set of resources.
pub trait ModelRegistry: Send + Sync {
    fn providers_for(
        &self,
        resources: &[ResourceId],
    ) -> Result<Vec<Arc<dyn ModelProvider>>, MergeError>;
}

/// A registry over a fixed provider list.
#[derive(Default)]
pub struct StaticModelRegistry {
    providers: Vec<Arc<dyn ModelProvider>>,
}

impl StaticModelRegistry {
    #[must_use]
    pub fn new(providers: Vec<Arc<dyn ModelProvider>>) -> Self {
        Self { providers }
    }
}

impl ModelRegistry for StaticModelRegistry {
    fn providers_for(
        &self,
        _resources: &[ResourceId],
    ) -> Result<Vec<Arc<dyn ModelProvider>>, MergeError> {
        Ok(self.providers.clone())
    }
}

// ---------------------------------------------------------------------------
// LogicalModels
// ---------------------------------------------------------------------------

/// A discovered model: the shared, ordered member set.
pub type LogicalModel = Arc<BTreeSet<ResourceId>>;

/// Discovers and caches logical models for one merge invocation.
pub struct LogicalModels {
    registry: Arc<dyn ModelRegistry>,
    denylist: HashSet<String>,
    cache: HashMap<ResourceId, LogicalModel>,
}

impl LogicalModels {
    /// `extra_denied` extends [`DEFAULT_DENYLIST`].
    #[must_use]
    pub fn new(registry: Arc<dyn ModelRegistry>, extra_denied: &[String]) -> Self {
        let denylist = DEFAULT_DENYLIST
            .iter()
            .map(|s| (*s).to_owned())
            .chain(extra_denied.iter().cloned())
            .collect();
        Self {
            registry,
            denylist,
            cache: HashMap::new(),
        }
    }

    /// Discover models for every candidate resource.
    ///
    /// Only resources that exist locally and are files seed a closure, so
    /// provider probes never run against content that is not there; a
    /// non-existent resource can still be pulled into a model discovered
    /// from an existing sibling. Provider failures are logged and skip the
    /// seed — the affected paths simply fall back to per-file merging.
    pub fn build(&mut self, resources: &[ResourceId], resolver: &dyn ResourceResolver) {
        for resource in resources {
            if !resource.is_file()
                || self.cache.contains_key(resource)
                || !resolver.exists(resource)
            {
                continue;
            }
            match self.closure(resource, resolver) {
                Ok(model) => {
                    // A one-element model is a resource with no cross-file
                    // semantics; caching it still short-circuits reprobes.
                    let shared: LogicalModel = Arc::new(model);
                    for member in shared.iter() {
                        self.cache.insert(member.clone(), Arc::clone(&shared));
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %resource.path, %err, "model discovery failed for seed");
                }
            }
        }
    }

    /// Pure cache lookup; `None` when `build` never covered this resource.
    #[must_use]
    pub fn model_for(&self, resource: &ResourceId) -> Option<LogicalModel> {
        self.cache.get(resource).cloned()
    }

    /// Find the first provider whose claimed set is *exactly* the model's
    /// members and that exposes a merger. A provider matching only a subset
    /// is rejected, and so is one reaching resources outside the model: its
    /// grouping disagrees with the closure the merge was planned against.
    pub fn find_merger(
        &self,
        model: &LogicalModel,
        resolver: &dyn ResourceResolver,
    ) -> Result<Option<Arc<dyn ModelMerger>>, MergeError> {
        let members: Vec<ResourceId> = model.iter().cloned().collect();
        for provider in self.allowed_providers(&members)? {
            let Some(merger) = provider.merger() else {
                continue;
            };
            let matched: BTreeSet<ResourceId> =
                provider.mappings(&members, resolver)?.into_iter().collect();
            if matched == **model {
                return Ok(Some(merger));
            }
        }
        Ok(None)
    }

    fn allowed_providers(
        &self,
        resources: &[ResourceId],
    ) -> Result<Vec<Arc<dyn ModelProvider>>, MergeError> {
        Ok(self
            .registry
            .providers_for(resources)?
            .into_iter()
            .filter(|p| !self.denylist.contains(p.id()))
            .collect())
    }

    /// Breadth-first closure: grow from the seed until an iteration adds no
    /// new resources.
    fn closure(
        &self,
        seed: &ResourceId,
        resolver: &dyn ResourceResolver,
    ) -> Result<BTreeSet<ResourceId>, MergeError> {
        let mut model: BTreeSet<ResourceId> = BTreeSet::from([seed.clone()]);
        let mut frontier: Vec<ResourceId> = vec![seed.clone()];

        while !frontier.is_empty() {
            let mut next: Vec<ResourceId> = Vec::new();
            for provider in self.allowed_providers(&frontier)? {
                for reached in provider.mappings(&frontier, resolver)? {
                    if model.insert(reached.clone()) {
                        next.push(reached);
                    }
                }
            }
            frontier = next;
        }
        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// PatternModelProvider
// ---------------------------------------------------------------------------

/// Built-in provider grouping same-stem files across configured glob
/// patterns.
///
/// A group like `["*.part1", "*.part2"]` makes `diagram.part1` and
/// `diagram.part2` one model. Only `*`-prefixed suffix patterns contribute
/// siblings; other patterns still match but reach nothing new.
pub struct PatternModelProvider {
    group_name: String,
    patterns: Vec<glob::Pattern>,
    raw: Vec<String>,
}

impl PatternModelProvider {
    pub fn new(group_name: &str, patterns: &[String]) -> Result<Self, MergeError> {
        let compiled = patterns
            .iter()
            .map(|p| {
                glob::Pattern::new(p).map_err(|e| MergeError::Config {
                    path: std::path::PathBuf::from(".weave.toml"),
                    detail: format!("invalid model pattern '{p}': {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            group_name: format!("pattern:{group_name}"),
            patterns: compiled,
            raw: patterns.to_vec(),
        })
    }

    fn siblings(&self, resource: &ResourceId) -> Vec<String> {
        let (dir, name) = match resource.path.rsplit_once('/') {
            Some((dir, name)) => (Some(dir), name),
            None => (None, resource.path.as_str()),
        };
        let mut out = Vec::new();
        for (pattern, raw) in self.patterns.iter().zip(&self.raw) {
            if !pattern.matches(name) {
                continue;
            }
            let Some(suffix) = raw.strip_prefix('*') else {
                continue;
            };
            let Some(stem) = name.strip_suffix(suffix) else {
                continue;
            };
            for other in &self.raw {
                let Some(other_suffix) = other.strip_prefix('*') else {
                    continue;
                };
                let sibling_name = format!("{stem}{other_suffix}");
                let sibling = match dir {
                    Some(dir) => format!("{dir}/{sibling_name}"),
                    None => sibling_name,
                };
                out.push(sibling);
            }
        }
        out
    }
}

impl ModelProvider for PatternModelProvider {
    fn id(&self) -> &str {
        &self.group_name
    }

    fn mappings(
        &self,
        resources: &[ResourceId],
        resolver: &dyn ResourceResolver,
    ) -> Result<Vec<ResourceId>, MergeError> {
        let mut out = Vec::new();
        for resource in resources {
            if !resource.is_file() {
                continue;
            }
            for sibling_path in self.siblings(resource) {
                let sibling = ResourceId {
                    project: resource.project.clone(),
                    path: sibling_path,
                    kind: crate::resource::ResourceKind::File,
                };
                // Pull in the original plus siblings that actually exist.
                if sibling == *resource || resolver.exists(&sibling) {
                    out.push(sibling);
                }
            }
        }
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceKind;

    struct StubResolver;

    impl ResourceResolver for StubResolver {
        fn resolve(&self, path: &str, kind: ResourceKind) -> ResourceId {
            ResourceId {
                project: Some(String::new()),
                path: path.to_owned(),
                kind,
            }
        }
        fn exists(&self, _resource: &ResourceId) -> bool {
            true
        }
        fn refresh(&self, _roots: &[ResourceId]) -> Result<(), MergeError> {
            Ok(())
        }
    }

    /// Groups a fixed pair; optionally claims only part of a model.
    struct PairProvider {
        id: String,
        a: ResourceId,
        b: ResourceId,
        claim_all: bool,
        merger: Option<Arc<dyn ModelMerger>>,
    }

    impl ModelProvider for PairProvider {
        fn id(&self) -> &str {
            &self.id
        }
        fn mappings(
            &self,
            resources: &[ResourceId],
            _resolver: &dyn ResourceResolver,
        ) -> Result<Vec<ResourceId>, MergeError> {
            let mut out = Vec::new();
            for r in resources {
                if *r == self.a || *r == self.b {
                    if self.claim_all {
                        out.push(self.a.clone());
                        out.push(self.b.clone());
                    } else if *r == self.a {
                        out.push(self.a.clone());
                    }
                }
            }
            Ok(out)
        }
        fn merger(&self) -> Option<Arc<dyn ModelMerger>> {
            self.merger.clone()
        }
    }

    /// Reaches a third file the pair's model never contained.
    struct SpillProvider {
        merger: Option<Arc<dyn ModelMerger>>,
    }

    impl ModelProvider for SpillProvider {
        fn id(&self) -> &str {
            "spill"
        }
        fn mappings(
            &self,
            resources: &[ResourceId],
            _resolver: &dyn ResourceResolver,
        ) -> Result<Vec<ResourceId>, MergeError> {
            if resources.iter().any(|r| r.path.starts_with("m.")) {
                Ok(vec![file("m.part1"), file("m.part2"), file("m.part3")])
            } else {
                Ok(Vec::new())
            }
        }
        fn merger(&self) -> Option<Arc<dyn ModelMerger>> {
            self.merger.clone()
        }
    }

    struct NullMerger;

    impl ModelMerger for NullMerger {
        fn name(&self) -> &str {
            "null"
        }
        fn merge(
            &self,
            _ctx: &mut crate::merge::ModelMergeContext<'_>,
        ) -> Result<crate::merge::ModelMergeStatus, MergeError> {
            Ok(crate::merge::ModelMergeStatus::Ok)
        }
    }

    fn file(path: &str) -> ResourceId {
        ResourceId::file("", path)
    }

    fn pair_registry(claim_all: bool, with_merger: bool) -> Arc<StaticModelRegistry> {
        Arc::new(StaticModelRegistry::new(vec![Arc::new(PairProvider {
            id: "pair".to_owned(),
            a: file("m.part1"),
            b: file("m.part2"),
            claim_all,
            merger: with_merger.then(|| Arc::new(NullMerger) as Arc<dyn ModelMerger>),
        })]))
    }

    #[test]
    fn closure_maps_every_member_to_the_same_model() {
        let mut models = LogicalModels::new(pair_registry(true, false), &[]);
        models.build(&[file("m.part1")], &StubResolver);

        let model_a = models.model_for(&file("m.part1")).unwrap();
        let model_b = models.model_for(&file("m.part2")).unwrap();
        assert!(Arc::ptr_eq(&model_a, &model_b));
        let expected: BTreeSet<ResourceId> = [file("m.part1"), file("m.part2")].into();
        assert_eq!(*model_a, expected);
    }

    #[test]
    fn model_for_is_a_pure_lookup() {
        let models = LogicalModels::new(pair_registry(true, false), &[]);
        assert!(models.model_for(&file("m.part1")).is_none());
    }

    #[test]
    fn denylisted_provider_contributes_nothing() {
        let registry = Arc::new(StaticModelRegistry::new(vec![Arc::new(PairProvider {
            id: "changeset".to_owned(),
            a: file("m.part1"),
            b: file("m.part2"),
            claim_all: true,
            merger: None,
        })]));
        let mut models = LogicalModels::new(registry, &[]);
        models.build(&[file("m.part1")], &StubResolver);

        let model = models.model_for(&file("m.part1")).unwrap();
        assert_eq!(model.len(), 1);
        assert!(models.model_for(&file("m.part2")).is_none());
    }

    #[test]
    fn partial_match_is_rejected_by_find_merger() {
        let mut models = LogicalModels::new(pair_registry(true, true), &[]);
        models.build(&[file("m.part1")], &StubResolver);
        let model = models.model_for(&file("m.part1")).unwrap();

        // Same model, but a provider that claims only one of two members.
        let partial = LogicalModels::new(pair_registry(false, true), &[]);
        assert!(partial.find_merger(&model, &StubResolver).unwrap().is_none());

        // The full-claim provider is accepted.
        assert!(models.find_merger(&model, &StubResolver).unwrap().is_some());
    }

    #[test]
    fn superset_claim_is_rejected_by_find_merger() {
        let mut models = LogicalModels::new(pair_registry(true, true), &[]);
        models.build(&[file("m.part1")], &StubResolver);
        let model = models.model_for(&file("m.part1")).unwrap();

        // A provider reaching a file outside the model groups differently
        // than the closure this merge was planned against.
        let registry = Arc::new(StaticModelRegistry::new(vec![Arc::new(SpillProvider {
            merger: Some(Arc::new(NullMerger) as Arc<dyn ModelMerger>),
        })]));
        let spilling = LogicalModels::new(registry, &[]);
        assert!(spilling
            .find_merger(&model, &StubResolver)
            .unwrap()
            .is_none());
    }

    #[test]
    fn pattern_provider_groups_same_stem_files() {
        let provider =
            PatternModelProvider::new("parts", &["*.part1".to_owned(), "*.part2".to_owned()])
                .unwrap();
        let reached = provider
            .mappings(&[file("dir/m.part1")], &StubResolver)
            .unwrap();
        assert!(reached.contains(&file("dir/m.part1")));
        assert!(reached.contains(&file("dir/m.part2")));
    }

    #[test]
    fn non_existent_seed_is_skipped_but_reachable() {
        struct OnlyPart2Exists;
        impl ResourceResolver for OnlyPart2Exists {
            fn resolve(&self, path: &str, kind: ResourceKind) -> ResourceId {
                ResourceId {
                    project: Some(String::new()),
                    path: path.to_owned(),
                    kind,
                }
            }
            fn exists(&self, resource: &ResourceId) -> bool {
                resource.path == "m.part2"
            }
            fn refresh(&self, _roots: &[ResourceId]) -> Result<(), MergeError> {
                Ok(())
            }
        }

        let mut models = LogicalModels::new(pair_registry(true, false), &[]);
        models.build(&[file("m.part1"), file("m.part2")], &OnlyPart2Exists);

        // part1 never seeded, but part2's closure pulled it in.
        let model = models.model_for(&file("m.part1")).unwrap();
        assert_eq!(model.len(), 2);
    }
}

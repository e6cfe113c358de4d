//! The workspace resource model.
//!
//! The merge engine does not reason about raw paths directly: every path is
//! resolved to a [`ResourceId`] scoped to an owning project. Paths that fall
//! outside every configured project carry no project and are silently dropped
//! by the variant caches.
//!
//! [`ResourceResolver`] is the seam to the surrounding resource model;
//! [`ProjectMap`] is the concrete resolver used by the CLI, mapping
//! configured project-root prefixes over a [`GitStore`] working tree.

use std::collections::HashSet;
use std::sync::Mutex;

use weave_git::GitStore;

use crate::error::MergeError;

// ---------------------------------------------------------------------------
// ResourceId
// ---------------------------------------------------------------------------

/// Whether a resource is a file or a folder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    File,
    Folder,
}

/// Identity of a workspace resource.
///
/// `project` is the root prefix of the owning project (the empty string for a
/// whole-repository project), or `None` when the path falls outside every
/// accessible project. `path` is repository-relative and slash-separated.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId {
    pub project: Option<String>,
    pub path: String,
    pub kind: ResourceKind,
}

impl ResourceId {
    /// A file resource owned by `project`.
    #[must_use]
    pub fn file(project: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            path: path.into(),
            kind: ResourceKind::File,
        }
    }

    /// A folder resource owned by `project`.
    #[must_use]
    pub fn folder(project: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            project: Some(project.into()),
            path: path.into(),
            kind: ResourceKind::Folder,
        }
    }

    /// A resource outside every accessible project.
    #[must_use]
    pub fn unowned(path: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            project: None,
            path: path.into(),
            kind,
        }
    }

    #[must_use]
    pub fn is_file(&self) -> bool {
        self.kind == ResourceKind::File
    }

    /// The root resource of the owning project, or `None` for an unowned
    /// resource.
    #[must_use]
    pub fn project_root(&self) -> Option<Self> {
        self.project.as_ref().map(|project| Self {
            project: Some(project.clone()),
            path: project.clone(),
            kind: ResourceKind::Folder,
        })
    }

    /// The parent folder, or `None` for a project root or an unowned
    /// resource.
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        let project = self.project.as_ref()?;
        if self.path == *project {
            return None;
        }
        let parent_path = match self.path.rsplit_once('/') {
            Some((dir, _)) => dir.to_owned(),
            // Top-level path inside a whole-repository project.
            None => String::new(),
        };
        Some(Self {
            project: Some(project.clone()),
            path: parent_path,
            kind: ResourceKind::Folder,
        })
    }
}

// ---------------------------------------------------------------------------
// ResourceResolver
// ---------------------------------------------------------------------------

/// Resolves repository paths into the resource model.
///
/// Supplied to the merge driver as an explicit collaborator so tests can
/// substitute deterministic stubs.
pub trait ResourceResolver: Send + Sync {
    /// Resolve a repository-relative path. The returned resource carries no
    /// project when the path falls outside every accessible project.
    fn resolve(&self, path: &str, kind: ResourceKind) -> ResourceId;

    /// Whether the resource currently exists in the local working tree.
    fn exists(&self, resource: &ResourceId) -> bool;

    /// Recursively refresh local state under the given roots, so that
    /// existence answers reflect the filesystem as it is now.
    fn refresh(&self, roots: &[ResourceId]) -> Result<(), MergeError>;
}

// ---------------------------------------------------------------------------
// ProjectMap
// ---------------------------------------------------------------------------

/// Resolver over configured project-root prefixes and a working tree.
///
/// A prefix of `""` maps the whole repository into one project. Existence
/// answers come from a snapshot of the working tree taken at construction and
/// rebuilt by [`ResourceResolver::refresh`].
pub struct ProjectMap<'a> {
    store: &'a dyn GitStore,
    prefixes: Vec<String>,
    worktree: Mutex<HashSet<String>>,
}

impl<'a> ProjectMap<'a> {
    /// Build a resolver for the given project roots. `"."` is normalized to
    /// the whole-repository prefix.
    pub fn new(store: &'a dyn GitStore, roots: &[String]) -> Result<Self, MergeError> {
        let prefixes = roots
            .iter()
            .map(|root| {
                let trimmed = root.trim_matches('/');
                if trimmed == "." { String::new() } else { trimmed.to_owned() }
            })
            .collect();
        let worktree = store.worktree_paths()?.into_iter().collect();
        Ok(Self {
            store,
            prefixes,
            worktree: Mutex::new(worktree),
        })
    }

    fn owning_project(&self, path: &str) -> Option<String> {
        // Longest matching prefix wins so nested projects resolve correctly.
        self.prefixes
            .iter()
            .filter(|prefix| {
                prefix.is_empty()
                    || path == prefix.as_str()
                    || path.starts_with(&format!("{prefix}/"))
            })
            .max_by_key(|prefix| prefix.len())
            .cloned()
    }
}

impl ResourceResolver for ProjectMap<'_> {
    fn resolve(&self, path: &str, kind: ResourceKind) -> ResourceId {
        ResourceId {
            project: self.owning_project(path),
            path: path.to_owned(),
            kind,
        }
    }

    fn exists(&self, resource: &ResourceId) -> bool {
        let worktree = self
            .worktree
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match resource.kind {
            ResourceKind::File => worktree.contains(&resource.path),
            ResourceKind::Folder => {
                resource.path.is_empty()
                    || worktree
                        .iter()
                        .any(|p| p.starts_with(&format!("{}/", resource.path)))
            }
        }
    }

    fn refresh(&self, _roots: &[ResourceId]) -> Result<(), MergeError> {
        let fresh: HashSet<String> = self.store.worktree_paths()?.into_iter().collect();
        let mut worktree = self
            .worktree
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *worktree = fresh;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

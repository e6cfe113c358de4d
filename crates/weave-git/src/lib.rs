//! Git abstraction layer for weave.
//!
//! This crate defines the [`GitStore`] trait — the single interface through
//! which the merge engine reads and writes repository data. The engine never
//! imports gix (or any other git library) directly; it depends on `weave-git`
//! and programs against the trait.
//!
//! # Crate layout
//!
//! - [`store`] — the [`GitStore`] trait definition.
//! - [`types`] — value types used in trait signatures ([`GitOid`],
//!   [`TreeEntry`], [`StageEntry`], [`CacheEntry`], etc.).
//! - [`error`] — the [`GitError`] enum returned by all trait methods.
//! - [`walk`] — the lock-step union [`TreeWalk`] over trees, index, and
//!   working tree.
//! - [`index`] — the [`IndexBuilder`] accumulating the post-merge index.
//! - [`mem`] — a fully in-memory [`GitStore`] for tests.

pub mod error;
pub mod index;
pub mod mem;
pub mod store;
pub mod types;
pub mod walk;

// gix-backed implementation
mod gix_store;

pub use gix_store::GixStore;

// Re-export the main trait and commonly used types at the crate root for
// ergonomic imports: `use weave_git::{GitStore, GitOid, GitError};`
pub use error::GitError;
pub use index::IndexBuilder;
pub use mem::MemoryStore;
pub use store::GitStore;
pub use types::{
    CacheEntry, CommitInfo, EntryMode, GitOid, OidParseError, Stage, StageEntry, TreeEntry,
    WorktreeFile,
};
pub use walk::{FlatTreeIter, IndexIter, IterKind, TreeWalk, WalkEntry, WalkIterator, WorktreeIter};

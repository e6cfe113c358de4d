//! Content-type-aware merging ahead of the generic text merge.

use std::collections::HashMap;
use std::sync::Arc;

use weave_git::{GitOid, GitStore};

use crate::error::MergeError;

/// A content-type-specific merge tool.
pub trait ContentMerger: Send + Sync {
    /// The file extension this merger handles (without the dot).
    fn content_type(&self) -> &str;

    /// Merge three versions. `Ok(None)` declines, deferring to the caller's
    /// fallback.
    fn merge(
        &self,
        base: &[u8],
        ours: &[u8],
        theirs: &[u8],
    ) -> Result<Option<Vec<u8>>, MergeError>;
}

/// Registry of content mergers, keyed by content type.
///
/// The content type is detected from the base version's path. Declines,
/// merger failures, and content-read failures all report `None` so the
/// caller falls back to the line-based text merge; nothing here is fatal.
#[derive(Default)]
pub struct StorageMerger {
    mergers: HashMap<String, Arc<dyn ContentMerger>>,
}

impl StorageMerger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, merger: Arc<dyn ContentMerger>) {
        self.mergers.insert(merger.content_type().to_owned(), merger);
    }

    /// Attempt a content-type-specific merge for one file.
    #[must_use]
    pub fn try_merge(
        &self,
        store: &dyn GitStore,
        path: &str,
        base: GitOid,
        ours: GitOid,
        theirs: GitOid,
    ) -> Option<Vec<u8>> {
        let extension = path.rsplit_once('.').map(|(_, ext)| ext)?;
        let merger = self.mergers.get(extension)?;

        let read = |oid: GitOid| -> Option<Vec<u8>> {
            match store.read_blob(oid) {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    tracing::error!(%path, %err, "failed to read content for merge tool");
                    None
                }
            }
        };
        let base = read(base)?;
        let ours = read(ours)?;
        let theirs = read(theirs)?;

        match merger.merge(&base, &ours, &theirs) {
            Ok(Some(bytes)) => Some(bytes),
            Ok(None) => None,
            Err(err) => {
                tracing::error!(%path, %err, "content merge tool failed, falling back");
                None
            }
        }
    }
}

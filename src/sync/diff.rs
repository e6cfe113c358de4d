//! Structured diff types produced by the subscriber.

use weave_git::GitOid;

use super::SyncKind;

/// How a two-way diff classifies a change.
///
/// Presence or absence alone decides [`DiffKind::Add`] and
/// [`DiffKind::Remove`]; everything else is a [`DiffKind::Change`], even when
/// the content happens to be identical — equality is not checked here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DiffKind {
    /// Absent on the earlier side.
    Add,
    /// Absent on the later side.
    Remove,
    /// Present on both sides.
    Change,
}

/// A materialized snapshot of one side of a file.
///
/// Folders carry no revisions at all; a diff for a folder has `before` and
/// `after` of `None` on both of its two-way halves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRevision {
    /// Blob id, or `None` when the content came from the live working tree.
    pub oid: Option<GitOid>,
    /// Raw content bytes.
    pub bytes: Vec<u8>,
}

/// One two-way half of a three-way diff.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TwoWayDiff {
    pub kind: DiffKind,
    pub before: Option<FileRevision>,
    pub after: Option<FileRevision>,
}

impl TwoWayDiff {
    /// Classify from presence alone, attaching the given revisions.
    #[must_use]
    pub fn new(before: Option<FileRevision>, after: Option<FileRevision>) -> Self {
        let kind = match (&before, &after) {
            (None, _) => DiffKind::Add,
            (_, None) => DiffKind::Remove,
            _ => DiffKind::Change,
        };
        Self { kind, before, after }
    }
}

/// A three-way diff combining the two independent two-way halves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ThreeWayDiff {
    pub kind: SyncKind,
    /// base → ours; present when the sync kind is outgoing or conflicting.
    pub local: Option<TwoWayDiff>,
    /// base → theirs; present when the sync kind is incoming or conflicting.
    pub remote: Option<TwoWayDiff>,
}

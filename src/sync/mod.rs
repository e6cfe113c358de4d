//! Synchronization state and three-way diffs over the variant trees.

mod diff;
mod subscriber;

pub use diff::{DiffKind, FileRevision, ThreeWayDiff, TwoWayDiff};
pub use subscriber::Subscriber;

/// Synchronization state of one resource across base/ours/theirs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncKind {
    /// Neither side changed relative to the base.
    InSync,
    /// Only the remote (theirs) side changed.
    Incoming,
    /// Only the local (ours) side changed.
    Outgoing,
    /// Both sides changed.
    Conflicting,
}

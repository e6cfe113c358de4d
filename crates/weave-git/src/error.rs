//! Error types for git operations.
//!
//! [`GitError`] is the single error type returned by all
//! [`GitStore`](crate::GitStore) trait methods. It uses rich enum variants so
//! callers can match on specific failure modes (missing object, index
//! corruption, I/O) without parsing error messages.

use thiserror::Error;

/// Errors returned by [`GitStore`](crate::GitStore) operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// A requested object, ref, or path was not found.
    #[error("not found: {message}")]
    NotFound {
        /// Human-readable description of what was missing.
        message: String,
    },

    /// An index entry carried a conflict stage outside 0–3.
    ///
    /// This indicates on-disk index corruption. It is fatal and never
    /// recovered: callers must abort whatever operation surfaced it.
    #[error("corrupt index: `{path}` has conflict stage {stage}")]
    IndexCorrupt {
        /// The path of the offending entry.
        path: String,
        /// The raw stage value found.
        stage: u8,
    },

    /// An OID string could not be parsed or was otherwise invalid.
    #[error("invalid OID `{value}`: {reason}")]
    InvalidOid {
        /// The raw value that failed validation.
        value: String,
        /// Why validation failed.
        reason: String,
    },

    /// The store has no working tree (bare repository) but a working-tree
    /// operation was requested.
    #[error("no working tree: {message}")]
    NoWorktree {
        /// What was attempted.
        message: String,
    },

    /// An I/O error occurred (file system access, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The underlying git backend returned an unclassified error.
    ///
    /// This is the catch-all for errors that don't fit other variants. The
    /// `message` should include enough context to diagnose the failure.
    #[error("git backend error: {message}")]
    Backend {
        /// Freeform error description from the backend.
        message: String,
    },
}

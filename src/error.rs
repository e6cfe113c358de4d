//! Merge error types for weave.
//!
//! Defines [`MergeError`], the unified error type for the merge engine. Only
//! genuinely fatal conditions surface here; recoverable failures (refresh
//! failure, provider-query failure, content-merge decline) are logged and
//! downgraded at their call sites, because model awareness is a best-effort
//! enhancement over a correctness-preserving plain three-way merge.

use std::fmt;

use weave_git::GitError;

// ---------------------------------------------------------------------------
// MergeError
// ---------------------------------------------------------------------------

/// Unified error type for merge operations.
///
/// An error returned from the driver means the merge was aborted as a whole;
/// the in-progress index builder has been discarded and the on-disk index is
/// untouched.
#[derive(Debug)]
pub enum MergeError {
    /// The git layer failed. Index corruption (an entry at an unrecognized
    /// conflict stage) arrives through this variant and is never recovered.
    Git(GitError),

    /// The resource model could not refresh local state.
    ///
    /// Fatal only when returned by a resolver directly; the driver downgrades
    /// a root-refresh failure to plain per-file merging instead.
    Refresh {
        /// What could not be refreshed.
        detail: String,
    },

    /// A model-provider query failed.
    Provider {
        /// The provider that failed.
        provider: String,
        /// Human-readable description of the failure.
        detail: String,
    },

    /// Scope initialization for a model merge was cancelled.
    ScopeCancelled,

    /// Scope initialization for a model merge failed.
    ScopeFailed {
        /// Human-readable description of the failure.
        detail: String,
    },

    /// A model merger reported a hard failure while running.
    ///
    /// By policy this aborts the entire merge, not just the failing model's
    /// paths.
    ModelMerge {
        /// The model merger that failed.
        merger: String,
        /// Human-readable description of the failure.
        detail: String,
    },

    /// `git merge-file` failed unexpectedly (any exit other than 0 or 1).
    TextMerge {
        /// Command line summary.
        command: String,
        /// Trimmed stderr.
        stderr: String,
        /// Exit code if available.
        exit_code: Option<i32>,
    },

    /// A configuration file could not be loaded or parsed.
    Config {
        /// Path to the configuration file.
        path: std::path::PathBuf,
        /// Human-readable description of the problem.
        detail: String,
    },

    /// An I/O error occurred during a merge operation.
    Io(std::io::Error),
}

// ---------------------------------------------------------------------------
// Display
// ---------------------------------------------------------------------------

impl fmt::Display for MergeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Git(err) => write!(f, "git layer error: {err}"),
            Self::Refresh { detail } => {
                write!(f, "failed to refresh local resources: {detail}")
            }
            Self::Provider { provider, detail } => {
                write!(f, "model provider '{provider}' failed: {detail}")
            }
            Self::ScopeCancelled => {
                write!(
                    f,
                    "model merge scope initialization was cancelled; the merge was aborted"
                )
            }
            Self::ScopeFailed { detail } => {
                write!(f, "model merge scope initialization failed: {detail}")
            }
            Self::ModelMerge { merger, detail } => {
                write!(
                    f,
                    "model merger '{merger}' failed: {detail}\n  The merge was aborted; the index was left unchanged."
                )
            }
            Self::TextMerge {
                command,
                stderr,
                exit_code,
            } => {
                write!(f, "`{command}` failed")?;
                if let Some(code) = exit_code {
                    write!(f, " (exit {code})")?;
                }
                if !stderr.is_empty() {
                    write!(f, ": {stderr}")?;
                }
                Ok(())
            }
            Self::Config { path, detail } => {
                write!(f, "configuration error in '{}': {detail}", path.display())
            }
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

// ---------------------------------------------------------------------------
// std::error::Error
// ---------------------------------------------------------------------------

impl std::error::Error for MergeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Git(err) => Some(err),
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// From impls
// ---------------------------------------------------------------------------

impl From<GitError> for MergeError {
    fn from(err: GitError) -> Self {
        Self::Git(err)
    }
}

impl From<std::io::Error> for MergeError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<crate::config::ConfigError> for MergeError {
    fn from(err: crate::config::ConfigError) -> Self {
        Self::Config {
            path: err.path.unwrap_or_default(),
            detail: err.message,
        }
    }
}

//! Core types for the weave git abstraction layer.
//!
//! These types form the vocabulary shared between the [`GitStore`](crate::GitStore)
//! trait and the merge core. They intentionally contain no gix types — the
//! backend is an implementation detail.

use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// GitOid
// ---------------------------------------------------------------------------

/// A git object identifier (SHA-1, 20 bytes).
///
/// Stored as raw bytes for efficient comparison, hashing, and Copy semantics.
/// Displays as 40 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GitOid([u8; 20]);

impl GitOid {
    /// The zero OID (`0000...0000`), used as the "no object" sentinel.
    pub const ZERO: Self = Self([0; 20]);

    /// Create a `GitOid` from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Return the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Return `true` if this is the zero OID.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl fmt::Display for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GitOid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GitOid({self})")
    }
}

impl FromStr for GitOid {
    type Err = OidParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 40 {
            return Err(OidParseError {
                value: s.to_owned(),
                reason: format!("expected 40 hex characters, got {}", s.len()),
            });
        }
        let mut bytes = [0u8; 20];
        for (i, chunk) in s.as_bytes().chunks(2).enumerate() {
            let hi = hex_digit(chunk[0]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[0] as char),
            })?;
            let lo = hex_digit(chunk[1]).ok_or_else(|| OidParseError {
                value: s.to_owned(),
                reason: format!("invalid hex digit '{}'", chunk[1] as char),
            })?;
            bytes[i] = (hi << 4) | lo;
        }
        Ok(Self(bytes))
    }
}

/// Error from parsing a hex string into a [`GitOid`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OidParseError {
    /// The raw value that failed.
    pub value: String,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for OidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid OID {:?}: {}", self.value, self.reason)
    }
}

impl std::error::Error for OidParseError {}

fn hex_digit(b: u8) -> Option<u8> {
    match b {
        b'0'..=b'9' => Some(b - b'0'),
        b'a'..=b'f' => Some(b - b'a' + 10),
        // Accept uppercase for leniency during parsing
        b'A'..=b'F' => Some(b - b'A' + 10),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// EntryMode
// ---------------------------------------------------------------------------

/// The file mode of a tree or index entry (analogous to `git ls-tree` mode).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntryMode {
    /// Regular file (`100644`).
    Blob,
    /// Executable file (`100755`).
    BlobExecutable,
    /// Subdirectory (`040000`).
    Tree,
    /// Symbolic link (`120000`).
    Link,
    /// Gitlink / submodule (`160000`).
    Commit,
}

impl EntryMode {
    /// The raw octal mode bits, as they appear in tree objects.
    ///
    /// A raw mode of `0` means "entry absent on this side" in walk contexts
    /// and is not representable as an `EntryMode`.
    #[must_use]
    pub const fn raw(self) -> u32 {
        match self {
            Self::Blob => 0o100644,
            Self::BlobExecutable => 0o100755,
            Self::Tree => 0o040000,
            Self::Link => 0o120000,
            Self::Commit => 0o160000,
        }
    }

    /// Parse raw octal mode bits. Returns `None` for `0` (absent) or
    /// unrecognized bit patterns.
    #[must_use]
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0o100644 | 0o100664 => Some(Self::Blob),
            0o100755 => Some(Self::BlobExecutable),
            0o040000 => Some(Self::Tree),
            0o120000 => Some(Self::Link),
            0o160000 => Some(Self::Commit),
            _ => None,
        }
    }

    /// Return `true` for gitlink / submodule entries.
    #[must_use]
    pub const fn is_gitlink(self) -> bool {
        matches!(self, Self::Commit)
    }
}

// ---------------------------------------------------------------------------
// TreeEntry
// ---------------------------------------------------------------------------

/// A single entry in a git tree object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeEntry {
    /// File or directory name (just the basename, not a full path).
    pub name: String,
    /// The entry mode.
    pub mode: EntryMode,
    /// The OID of the blob, tree, or commit this entry points to.
    pub oid: GitOid,
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// The conflict stage of an index entry.
///
/// Stage 0 is a normal (unconflicted) entry. Stages 1–3 hold the base, ours,
/// and theirs versions of a conflicted path. Any other raw value indicates a
/// corrupt index and is rejected at the trait boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// Normal entry, no conflict (stage 0).
    Unconflicted,
    /// The common-ancestor version of a conflicted path (stage 1).
    Base,
    /// "Our" side of a conflicted path (stage 2).
    Ours,
    /// "Their" side of a conflicted path (stage 3).
    Theirs,
}

impl Stage {
    /// The raw on-disk stage value (0–3).
    #[must_use]
    pub const fn raw(self) -> u8 {
        match self {
            Self::Unconflicted => 0,
            Self::Base => 1,
            Self::Ours => 2,
            Self::Theirs => 3,
        }
    }

    /// Parse a raw stage value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::GitError::IndexCorrupt`] for any value outside 0–3.
    /// Such a value cannot be produced by a well-formed index file; treating
    /// it as anything but corruption would silently misfile conflict data.
    pub fn from_raw(raw: u8, path: &str) -> Result<Self, crate::GitError> {
        match raw {
            0 => Ok(Self::Unconflicted),
            1 => Ok(Self::Base),
            2 => Ok(Self::Ours),
            3 => Ok(Self::Theirs),
            other => Err(crate::GitError::IndexCorrupt {
                path: path.to_owned(),
                stage: other,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Index entry types
// ---------------------------------------------------------------------------

/// A single entry read from the index, including its conflict stage.
///
/// During a merge, a conflicted path appears up to three times (stages 1–3)
/// and has no stage-0 entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StageEntry {
    /// Path relative to the repository root, slash-separated.
    pub path: String,
    /// The file mode.
    pub mode: EntryMode,
    /// OID of the blob (or gitlink commit) in the index.
    pub oid: GitOid,
    /// The conflict stage.
    pub stage: Stage,
    /// Cached file size from stat data (0 when unknown).
    pub size: u64,
    /// Cached modification time (seconds; 0 when unknown).
    pub mtime: i64,
    /// The `assume-valid` flag: the entry is trusted without re-statting.
    pub assume_valid: bool,
}

impl StageEntry {
    /// Return `true` if the cached stat data matches the given on-disk
    /// metadata. An entry with zeroed stat data is never fresh.
    #[must_use]
    pub fn is_fresh(&self, size: u64, mtime: i64) -> bool {
        self.size != 0 && self.size == size && self.mtime == mtime
    }
}

/// An entry accumulated by the [`IndexBuilder`](crate::IndexBuilder) for the
/// post-merge index.
///
/// Conflict-stage entries carry `size: 0` and `mtime: 0` as deliberate
/// "content not materialized" sentinels: at conflict time there is no unique
/// working-tree content to measure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    /// Path relative to the repository root, slash-separated.
    pub path: String,
    /// The file mode.
    pub mode: EntryMode,
    /// OID of the staged blob (or gitlink commit).
    pub oid: GitOid,
    /// The conflict stage of the entry.
    pub stage: Stage,
    /// File size, or 0 for the not-materialized sentinel.
    pub size: u64,
    /// Modification time in seconds, or 0 for the not-materialized sentinel.
    pub mtime: i64,
    /// Whether the entry carries the `assume-valid` flag.
    pub assume_valid: bool,
}

impl CacheEntry {
    /// A stage-0 entry with zeroed stat data.
    #[must_use]
    pub fn resolved(path: impl Into<String>, mode: EntryMode, oid: GitOid) -> Self {
        Self {
            path: path.into(),
            mode,
            oid,
            stage: Stage::Unconflicted,
            size: 0,
            mtime: 0,
            assume_valid: false,
        }
    }

    /// A conflict-stage entry with the sentinel stat data.
    #[must_use]
    pub fn conflicted(path: impl Into<String>, mode: EntryMode, oid: GitOid, stage: Stage) -> Self {
        Self {
            path: path.into(),
            mode,
            oid,
            stage,
            size: 0,
            mtime: 0,
            assume_valid: false,
        }
    }

    /// Carry over an existing index entry unchanged.
    #[must_use]
    pub fn keep(entry: &StageEntry) -> Self {
        Self {
            path: entry.path.clone(),
            mode: entry.mode,
            oid: entry.oid,
            stage: entry.stage,
            size: entry.size,
            mtime: entry.mtime,
            assume_valid: entry.assume_valid,
        }
    }
}

// ---------------------------------------------------------------------------
// Working-tree types
// ---------------------------------------------------------------------------

/// A file read from the working tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorktreeFile {
    /// Raw file content. For gitlinks this is empty.
    pub bytes: Vec<u8>,
    /// The entry mode the file would be recorded with.
    pub mode: EntryMode,
    /// File size in bytes.
    pub size: u64,
    /// Modification time in seconds since the epoch.
    pub mtime: i64,
    /// For gitlinks, the commit the nested repository's HEAD points at.
    /// `None` for regular files and for submodules whose HEAD cannot be
    /// resolved.
    pub link_oid: Option<GitOid>,
}

// ---------------------------------------------------------------------------
// Commit types
// ---------------------------------------------------------------------------

/// Metadata of a commit object, as needed by the merge driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitInfo {
    /// OID of the tree this commit points to.
    pub tree_oid: GitOid,
    /// OIDs of parent commits (empty for root commits).
    pub parents: Vec<GitOid>,
    /// The commit message.
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- GitOid --

    #[test]
    fn oid_roundtrip_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let oid: GitOid = hex.parse().unwrap();
        assert_eq!(oid.to_string(), hex);
    }

    #[test]
    fn oid_zero() {
        assert!(GitOid::ZERO.is_zero());
        assert_eq!(
            GitOid::ZERO.to_string(),
            "0000000000000000000000000000000000000000"
        );
    }

    #[test]
    fn oid_rejects_short() {
        assert!("abc".parse::<GitOid>().is_err());
    }

    #[test]
    fn oid_rejects_non_hex() {
        let bad = "g".repeat(40);
        assert!(bad.parse::<GitOid>().is_err());
    }

    // -- EntryMode --

    #[test]
    fn mode_raw_roundtrip() {
        for mode in [
            EntryMode::Blob,
            EntryMode::BlobExecutable,
            EntryMode::Tree,
            EntryMode::Link,
            EntryMode::Commit,
        ] {
            assert_eq!(EntryMode::from_raw(mode.raw()), Some(mode));
        }
    }

    #[test]
    fn mode_zero_is_absent() {
        assert_eq!(EntryMode::from_raw(0), None);
    }

    // -- Stage --

    #[test]
    fn stage_raw_roundtrip() {
        for raw in 0..=3u8 {
            let stage = Stage::from_raw(raw, "f.txt").unwrap();
            assert_eq!(stage.raw(), raw);
        }
    }

    #[test]
    fn stage_rejects_out_of_range() {
        let err = Stage::from_raw(4, "f.txt").unwrap_err();
        match err {
            crate::GitError::IndexCorrupt { path, stage } => {
                assert_eq!(path, "f.txt");
                assert_eq!(stage, 4);
            }
            other => panic!("expected IndexCorrupt, got {other:?}"),
        }
    }

    // -- StageEntry freshness --

    #[test]
    fn stage_entry_freshness() {
        let entry = StageEntry {
            path: "a.txt".into(),
            mode: EntryMode::Blob,
            oid: GitOid::ZERO,
            stage: Stage::Unconflicted,
            size: 12,
            mtime: 100,
            assume_valid: false,
        };
        assert!(entry.is_fresh(12, 100));
        assert!(!entry.is_fresh(12, 101));
        assert!(!entry.is_fresh(13, 100));
    }

    #[test]
    fn zeroed_stat_is_never_fresh() {
        let entry = StageEntry {
            path: "a.txt".into(),
            mode: EntryMode::Blob,
            oid: GitOid::ZERO,
            stage: Stage::Unconflicted,
            size: 0,
            mtime: 0,
            assume_valid: false,
        };
        assert!(!entry.is_fresh(0, 0));
    }
}

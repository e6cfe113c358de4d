//! Default line-based three-way text merge.
//!
//! Shells out to `git merge-file -p` over temp files instead of pulling in a
//! diff3 crate: the engine already requires a git repository, and this keeps
//! merge semantics aligned with git's own.

use std::process::Command;

use crate::error::MergeError;

/// Result of a three-way text merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TextMergeOutcome {
    /// The merge applied cleanly.
    Clean(Vec<u8>),
    /// Overlapping edits; the bytes carry conflict markers.
    Conflicted(Vec<u8>),
}

/// Run `git merge-file -p` for one 3-way merge.
///
/// # Errors
/// Fails on I/O problems or any `git merge-file` exit other than 0 (clean)
/// or 1 (conflict).
pub fn merge_text(base: &[u8], ours: &[u8], theirs: &[u8]) -> Result<TextMergeOutcome, MergeError> {
    let dir = tempfile::tempdir()?;
    let ours_path = dir.path().join("ours.tmp");
    let base_path = dir.path().join("base.tmp");
    let theirs_path = dir.path().join("theirs.tmp");

    std::fs::write(&ours_path, ours)?;
    std::fs::write(&base_path, base)?;
    std::fs::write(&theirs_path, theirs)?;

    let output = Command::new("git")
        .arg("merge-file")
        .arg("-p")
        .arg(&ours_path)
        .arg(&base_path)
        .arg(&theirs_path)
        .output()?;

    match output.status.code() {
        Some(0) => Ok(TextMergeOutcome::Clean(output.stdout)),
        Some(1) => Ok(TextMergeOutcome::Conflicted(output.stdout)),
        code => Err(MergeError::TextMerge {
            command: "git merge-file -p <ours> <base> <theirs>".to_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            exit_code: code,
        }),
    }
}

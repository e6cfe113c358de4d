//! The gix-backed implementation of [`GitStore`].

use std::path::{Path, PathBuf};

use gix::bstr::ByteSlice;

use crate::error::GitError;
use crate::store::GitStore;
use crate::types::{CacheEntry, CommitInfo, EntryMode, GitOid, Stage, StageEntry, TreeEntry, WorktreeFile};

/// A [`GitStore`] backed by [gix](https://github.com/GitoxideLabs/gitoxide).
///
/// Requires a non-bare repository: merge results are materialized into the
/// working tree, so [`GixStore::open`] refuses bare repositories.
///
/// `gix::Repository` is thread-local, so the store holds a
/// [`gix::ThreadSafeRepository`] and materializes a local handle per call.
pub struct GixStore {
    repo: gix::ThreadSafeRepository,
    workdir: PathBuf,
}

/// Convert our `GitOid` to a `gix::ObjectId`.
fn to_gix_oid(oid: GitOid) -> gix::ObjectId {
    gix::ObjectId::from_bytes_or_panic(oid.as_bytes())
}

/// Convert a `gix::ObjectId` to our `GitOid`.
fn from_gix_oid(oid: gix::ObjectId) -> Result<GitOid, GitError> {
    let bytes: [u8; 20] = oid.as_bytes().try_into().map_err(|_| GitError::Backend {
        message: format!("unsupported object hash length in {oid}"),
    })?;
    Ok(GitOid::from_bytes(bytes))
}

fn from_gix_entry_mode(mode: gix::objs::tree::EntryMode) -> EntryMode {
    match mode.kind() {
        gix::objs::tree::EntryKind::Tree => EntryMode::Tree,
        gix::objs::tree::EntryKind::Blob => EntryMode::Blob,
        gix::objs::tree::EntryKind::BlobExecutable => EntryMode::BlobExecutable,
        gix::objs::tree::EntryKind::Link => EntryMode::Link,
        gix::objs::tree::EntryKind::Commit => EntryMode::Commit,
    }
}

fn from_gix_index_mode(mode: gix::index::entry::Mode) -> Option<EntryMode> {
    Some(match mode {
        gix::index::entry::Mode::FILE => EntryMode::Blob,
        gix::index::entry::Mode::FILE_EXECUTABLE => EntryMode::BlobExecutable,
        gix::index::entry::Mode::SYMLINK => EntryMode::Link,
        gix::index::entry::Mode::DIR => EntryMode::Tree,
        gix::index::entry::Mode::COMMIT => EntryMode::Commit,
        _ => return None,
    })
}

fn to_gix_index_mode(mode: EntryMode) -> gix::index::entry::Mode {
    match mode {
        EntryMode::Blob => gix::index::entry::Mode::FILE,
        EntryMode::BlobExecutable => gix::index::entry::Mode::FILE_EXECUTABLE,
        EntryMode::Link => gix::index::entry::Mode::SYMLINK,
        EntryMode::Tree => gix::index::entry::Mode::DIR,
        EntryMode::Commit => gix::index::entry::Mode::COMMIT,
    }
}

fn from_gix_stage(stage: gix::index::entry::Stage) -> Stage {
    match stage {
        gix::index::entry::Stage::Unconflicted => Stage::Unconflicted,
        gix::index::entry::Stage::Base => Stage::Base,
        gix::index::entry::Stage::Ours => Stage::Ours,
        gix::index::entry::Stage::Theirs => Stage::Theirs,
    }
}

impl GixStore {
    /// Open the git repository at or above `path`.
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = gix::ThreadSafeRepository::open(path).map_err(|e| GitError::Backend {
            message: e.to_string(),
        })?;
        let workdir = repo
            .to_thread_local()
            .workdir()
            .map(Path::to_path_buf)
            .ok_or_else(|| GitError::NoWorktree {
                message: format!("{} is bare", path.display()),
            })?;
        tracing::debug!(workdir = %workdir.display(), "opened repository");
        Ok(Self { repo, workdir })
    }

    fn worktree_abs(&self, path: &str) -> PathBuf {
        self.workdir.join(path)
    }
}

impl GitStore for GixStore {
    fn read_blob(&self, oid: GitOid) -> Result<Vec<u8>, GitError> {
        let repo = self.repo.to_thread_local();
        let mut blob = repo
            .find_blob(to_gix_oid(oid))
            .map_err(|e| GitError::NotFound {
                message: format!("blob {oid}: {e}"),
            })?;
        Ok(blob.take_data())
    }

    fn read_tree(&self, oid: GitOid) -> Result<Vec<TreeEntry>, GitError> {
        let repo = self.repo.to_thread_local();
        let tree = repo
            .find_tree(to_gix_oid(oid))
            .map_err(|e| GitError::NotFound {
                message: format!("tree {oid}: {e}"),
            })?;

        let mut entries = Vec::new();
        for result in tree.iter() {
            let entry = result.map_err(|e| GitError::Backend {
                message: format!("failed to decode tree entry: {e}"),
            })?;
            entries.push(TreeEntry {
                name: entry.inner.filename.to_string(),
                mode: from_gix_entry_mode(entry.inner.mode),
                oid: from_gix_oid(entry.inner.oid.to_owned())?,
            });
        }
        Ok(entries)
    }

    fn read_commit(&self, oid: GitOid) -> Result<CommitInfo, GitError> {
        let repo = self.repo.to_thread_local();
        let commit = repo
            .find_commit(to_gix_oid(oid))
            .map_err(|e| GitError::NotFound {
                message: format!("commit {oid}: {e}"),
            })?;
        let decoded = commit.decode().map_err(|e| GitError::Backend {
            message: format!("failed to decode commit {oid}: {e}"),
        })?;
        Ok(CommitInfo {
            tree_oid: from_gix_oid(decoded.tree())?,
            parents: decoded
                .parents()
                .map(from_gix_oid)
                .collect::<Result<_, _>>()?,
            message: decoded.message.to_string(),
        })
    }

    fn rev_parse(&self, spec: &str) -> Result<GitOid, GitError> {
        let repo = self.repo.to_thread_local();
        let id = repo
            .rev_parse_single(spec)
            .map_err(|e| GitError::NotFound {
                message: format!("rev-parse '{spec}': {e}"),
            })?;
        from_gix_oid(id.detach())
    }

    fn write_blob(&self, content: &[u8]) -> Result<GitOid, GitError> {
        let repo = self.repo.to_thread_local();
        let id = repo.write_blob(content).map_err(|e| GitError::Backend {
            message: format!("failed to write blob: {e}"),
        })?;
        from_gix_oid(id.detach())
    }

    fn merge_index(&self) -> Result<Vec<StageEntry>, GitError> {
        let repo = self.repo.to_thread_local();
        let index = repo.open_index().map_err(|e| GitError::Backend {
            message: format!("failed to open index: {e}"),
        })?;

        let mut entries = Vec::new();
        for entry in index.entries() {
            let path = entry
                .path(&index)
                .to_str()
                .map_err(|e| GitError::Backend {
                    message: format!("non-UTF-8 index path: {e}"),
                })?
                .to_owned();
            // Non-file modes (sparse dir entries) do not take part in merges.
            let Some(mode) = from_gix_index_mode(entry.mode) else {
                continue;
            };
            entries.push(StageEntry {
                path,
                mode,
                oid: from_gix_oid(entry.id)?,
                stage: from_gix_stage(entry.stage()),
                size: u64::from(entry.stat.size),
                mtime: i64::from(entry.stat.mtime.secs),
                assume_valid: entry.flags.contains(gix::index::entry::Flags::ASSUME_VALID),
            });
        }
        Ok(entries)
    }

    fn write_index(&self, entries: &[CacheEntry]) -> Result<(), GitError> {
        let repo = self.repo.to_thread_local();
        let mut state = gix::index::State::new(repo.object_hash());

        for entry in entries {
            let mut stat: gix::index::entry::Stat = Default::default();
            stat.size = u32::try_from(entry.size).unwrap_or(u32::MAX);
            stat.mtime.secs = u32::try_from(entry.mtime).unwrap_or(0);

            let mut flags = gix::index::entry::Flags::from_bits_truncate(
                u32::from(entry.stage.raw()) << 12,
            );
            if entry.assume_valid {
                flags |= gix::index::entry::Flags::ASSUME_VALID;
            }

            state.dangerously_push_entry(
                stat,
                to_gix_oid(entry.oid),
                flags,
                to_gix_index_mode(entry.mode),
                entry.path.as_str().into(),
            );
        }

        state.sort_entries();
        tracing::debug!(entries = entries.len(), "writing index");

        let index_path = repo.index_path();
        let mut index_file = gix::index::File::from_state(state, index_path);
        index_file
            .write(Default::default())
            .map_err(|e| GitError::Backend {
                message: format!("failed to write index: {e}"),
            })?;
        Ok(())
    }

    fn worktree_file(&self, path: &str) -> Result<Option<WorktreeFile>, GitError> {
        let abs = self.worktree_abs(path);
        let meta = match std::fs::symlink_metadata(&abs) {
            Ok(meta) => meta,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(GitError::Io(e)),
        };

        if meta.is_dir() {
            // A checked-out submodule appears as a directory with its own
            // .git; its content is never read here, only its HEAD.
            if abs.join(".git").exists() {
                return Ok(Some(WorktreeFile {
                    bytes: Vec::new(),
                    mode: EntryMode::Commit,
                    size: 0,
                    mtime: 0,
                    link_oid: submodule_head(&abs),
                }));
            }
            return Ok(None);
        }

        let mtime = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map_or(0, |d| d.as_secs() as i64);

        if meta.is_symlink() {
            let target = std::fs::read_link(&abs)?;
            let bytes = target.to_string_lossy().into_owned().into_bytes();
            let size = bytes.len() as u64;
            return Ok(Some(WorktreeFile {
                bytes,
                mode: EntryMode::Link,
                size,
                mtime,
                link_oid: None,
            }));
        }

        let bytes = std::fs::read(&abs)?;
        let mode = if is_executable(&meta) {
            EntryMode::BlobExecutable
        } else {
            EntryMode::Blob
        };
        Ok(Some(WorktreeFile {
            bytes,
            mode,
            size: meta.len(),
            mtime,
            link_oid: None,
        }))
    }

    fn write_worktree_file(&self, path: &str, content: &[u8]) -> Result<(), GitError> {
        let abs = self.worktree_abs(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&abs, content)?;
        Ok(())
    }

    fn remove_worktree_file(&self, path: &str) -> Result<(), GitError> {
        match std::fs::remove_file(self.worktree_abs(path)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn worktree_paths(&self) -> Result<Vec<String>, GitError> {
        let mut paths = Vec::new();
        collect_worktree_paths(&self.workdir, &self.workdir, &mut paths)?;
        paths.sort();
        Ok(paths)
    }

    fn is_ignored(&self, path: &str) -> Result<bool, GitError> {
        let repo = self.repo.to_thread_local();
        let index = repo.index_or_empty().map_err(|e| GitError::Backend {
            message: format!("failed to open index: {e}"),
        })?;
        let mut stack = repo
            .excludes(
                &index,
                None,
                gix::worktree::stack::state::ignore::Source::WorktreeThenIdMappingIfNotSkipped,
            )
            .map_err(|e| GitError::Backend {
                message: format!("failed to load exclude patterns: {e}"),
            })?;
        let platform = stack
            .at_entry(path, Some(gix::index::entry::Mode::FILE))
            .map_err(|e| GitError::Backend {
                message: format!("exclude lookup for '{path}': {e}"),
            })?;
        Ok(platform.is_excluded())
    }
}

/// The commit a checked-out submodule's HEAD points at, if resolvable.
fn submodule_head(dir: &Path) -> Option<GitOid> {
    let repo = gix::open(dir).ok()?;
    let head = repo.head_id().ok()?.detach();
    from_gix_oid(head).ok()
}

#[cfg(unix)]
fn is_executable(meta: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_meta: &std::fs::Metadata) -> bool {
    false
}

/// Walk `dir` collecting file paths relative to `workdir`, slash-separated.
/// Skips `.git`; a nested repository surfaces as a single gitlink path.
fn collect_worktree_paths(
    workdir: &Path,
    dir: &Path,
    out: &mut Vec<String>,
) -> Result<(), GitError> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if entry.file_name() == ".git" {
            continue;
        }
        let rel = path
            .strip_prefix(workdir)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if rel.is_empty() {
            continue;
        }
        if path.is_dir() && !path.is_symlink() {
            if path.join(".git").exists() {
                out.push(rel);
            } else {
                collect_worktree_paths(workdir, &path, out)?;
            }
        } else {
            out.push(rel);
        }
    }
    Ok(())
}

//! Permanent per-node file areas.
//!
//! A [`Repository`] owns a root directory under which every durable node
//! has its own file area, sharded by UUID prefix (`ab/cd/rest`) to keep
//! directory fan-out bounded. Areas are written exactly once, by
//! [`Repository::commit_staging`], and read through [`FileTree`] afterwards.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use walkdir::WalkDir;

use lineage_types::NodeUuid;

use crate::error::{RepoError, RepoResult};
use crate::staging::StagingArea;

/// Configuration for a file repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Root directory under which all per-node areas live.
    pub root: PathBuf,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("lineage-repository"),
        }
    }
}

/// The permanent file store, keyed by node identity.
pub struct Repository {
    root: PathBuf,
    // Keeps an ephemeral repository's backing directory alive.
    _guard: Option<tempfile::TempDir>,
}

impl Repository {
    /// Open (creating if needed) a repository at the configured root.
    pub fn open(config: &RepositoryConfig) -> RepoResult<Self> {
        fs::create_dir_all(&config.root)?;
        Ok(Self {
            root: config.root.clone(),
            _guard: None,
        })
    }

    /// Create a throwaway repository in a temporary directory, for tests
    /// and demos. The backing directory is removed on drop.
    pub fn ephemeral() -> RepoResult<Self> {
        let guard = tempfile::tempdir()?;
        Ok(Self {
            root: guard.path().to_path_buf(),
            _guard: Some(guard),
        })
    }

    /// The repository root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The permanent area path for a node identity (it may not exist yet).
    pub fn area_for(&self, uuid: &NodeUuid) -> PathBuf {
        let canonical = uuid.to_canonical();
        self.root
            .join(&canonical[..2])
            .join(&canonical[2..4])
            .join(&canonical[4..])
    }

    /// Whether a permanent area exists for this identity.
    pub fn has_area(&self, uuid: &NodeUuid) -> bool {
        self.area_for(uuid).is_dir()
    }

    /// Move a staging payload into the permanent area for `uuid`.
    ///
    /// The move is a rename where possible, falling back to copy-then-remove
    /// across filesystems. On failure nothing is left behind at the
    /// destination and the staging tree is untouched, so the commit can be
    /// retried. On success the staging area is consumed.
    pub fn commit_staging(&self, staging: &StagingArea, uuid: &NodeUuid) -> RepoResult<FileTree> {
        let dest = self.area_for(uuid);
        if dest.exists() {
            return Err(RepoError::AreaExists(dest));
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let src = staging.payload();
        if fs::rename(&src, &dest).is_err() {
            move_tree(&src, &dest)?;
        }
        debug!(uuid = %uuid.short_id(), dest = %dest.display(), "committed staging area");
        Ok(FileTree { root: dest })
    }

    /// Open the read-only file tree of a durable node.
    pub fn file_tree(&self, uuid: &NodeUuid) -> RepoResult<FileTree> {
        let root = self.area_for(uuid);
        if !root.is_dir() {
            return Err(RepoError::PathNotFound(root));
        }
        Ok(FileTree { root })
    }
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository")
            .field("root", &self.root)
            .finish()
    }
}

/// Read-only view over a durable node's permanent file area.
#[derive(Clone, Debug)]
pub struct FileTree {
    root: PathBuf,
}

impl FileTree {
    /// The area's root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative paths of all files under `subdir`, sorted.
    pub fn list(&self, subdir: &Path) -> RepoResult<Vec<PathBuf>> {
        if subdir.is_absolute() {
            return Err(RepoError::invalid_path(subdir, "must be relative"));
        }
        list_tree(&self.root.join(subdir))
    }

    /// Absolute path of a file inside the area, checked for existence.
    pub fn abs_path(&self, rel: &Path) -> RepoResult<PathBuf> {
        if rel.is_absolute() {
            return Err(RepoError::invalid_path(rel, "must be relative"));
        }
        let abs = self.root.join(rel);
        if !abs.exists() {
            return Err(RepoError::PathNotFound(abs));
        }
        Ok(abs)
    }

    /// Read the contents of a file inside the area.
    pub fn read(&self, rel: &Path) -> RepoResult<Vec<u8>> {
        Ok(fs::read(self.abs_path(rel)?)?)
    }
}

/// Recursively copy the contents of `src` into `dst` (created fresh).
pub(crate) fn copy_tree(src: &Path, dst: &Path) -> RepoResult<()> {
    fs::create_dir_all(dst)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| RepoError::Io(e.into()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Move `src` into `dst` by copy-then-remove. A failed copy removes the
/// partial destination and leaves the source intact.
fn move_tree(src: &Path, dst: &Path) -> RepoResult<()> {
    if let Err(err) = copy_tree(src, dst) {
        let _ = fs::remove_dir_all(dst);
        return Err(err);
    }
    fs::remove_dir_all(src)?;
    Ok(())
}

/// Relative paths of all files under `root`, sorted.
pub(crate) fn list_tree(root: &Path) -> RepoResult<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(RepoError::PathNotFound(root.to_path_buf()));
    }
    let mut paths = Vec::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.map_err(|e| RepoError::Io(e.into()))?;
        if entry.file_type().is_file() {
            let rel = entry
                .path()
                .strip_prefix(root)
                .expect("walkdir yields paths under its root");
            paths.push(rel.to_path_buf());
        }
    }
    paths.sort();
    Ok(paths)
}

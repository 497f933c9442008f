//! Scoped temporary file areas for not-yet-durable nodes.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{RepoError, RepoResult};
use crate::repository::{copy_tree, list_tree};

/// Name of the payload subtree inside the staging directory. Only the
/// payload is moved into the permanent area on commit.
const PAYLOAD_DIR: &str = "tree";

/// A scoped temporary file area owned by one in-memory node.
///
/// Files inserted here are not durable; on commit the payload subtree is
/// moved into the repository's permanent area for the node and the staging
/// directory itself is released. Dropping the area removes everything.
pub struct StagingArea {
    dir: tempfile::TempDir,
}

impl StagingArea {
    /// Create a fresh, empty staging area.
    pub fn new() -> RepoResult<Self> {
        let dir = tempfile::tempdir()?;
        fs::create_dir(dir.path().join(PAYLOAD_DIR))?;
        debug!(path = %dir.path().display(), "created staging area");
        Ok(Self { dir })
    }

    /// Root of the payload subtree.
    pub fn payload(&self) -> PathBuf {
        self.dir.path().join(PAYLOAD_DIR)
    }

    /// Copy a file or directory from an absolute path into the payload at
    /// `rel_dst`, creating intermediate directories.
    pub fn insert(&self, abs_src: &Path, rel_dst: &Path) -> RepoResult<()> {
        if !abs_src.is_absolute() {
            return Err(RepoError::invalid_path(abs_src, "source must be absolute"));
        }
        if !abs_src.exists() {
            return Err(RepoError::PathNotFound(abs_src.to_path_buf()));
        }
        let dst = self.payload().join(checked_relative(rel_dst)?);
        if let Some(parent) = dst.parent() {
            fs::create_dir_all(parent)?;
        }
        if abs_src.is_dir() {
            copy_tree(abs_src, &dst)?;
        } else {
            fs::copy(abs_src, &dst)?;
        }
        Ok(())
    }

    /// Remove a file or directory from the payload. Errors if absent.
    pub fn remove(&self, rel: &Path) -> RepoResult<()> {
        let target = self.payload().join(checked_relative(rel)?);
        if target.is_dir() {
            fs::remove_dir_all(&target)?;
        } else if target.is_file() {
            fs::remove_file(&target)?;
        } else {
            return Err(RepoError::PathNotFound(target));
        }
        Ok(())
    }

    /// Whether the payload contains `rel`.
    pub fn contains(&self, rel: &Path) -> bool {
        checked_relative(rel)
            .map(|r| self.payload().join(r).exists())
            .unwrap_or(false)
    }

    /// Relative paths of all staged files, sorted.
    pub fn list(&self) -> RepoResult<Vec<PathBuf>> {
        list_tree(&self.payload())
    }

    /// Copy the contents of another tree (a staging payload or a permanent
    /// area) into this payload. Used when copying a node.
    pub fn import_tree(&self, src_root: &Path) -> RepoResult<()> {
        copy_tree(src_root, &self.payload())
    }
}

impl std::fmt::Debug for StagingArea {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingArea")
            .field("path", &self.dir.path())
            .finish()
    }
}

/// Reject absolute paths and parent-directory escapes.
fn checked_relative(rel: &Path) -> RepoResult<&Path> {
    if rel.is_absolute() {
        return Err(RepoError::invalid_path(rel, "must be relative"));
    }
    if rel
        .components()
        .any(|c| matches!(c, Component::ParentDir))
    {
        return Err(RepoError::invalid_path(rel, "must not escape the area"));
    }
    Ok(rel)
}

use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the file repository.
#[derive(Debug, Error)]
pub enum RepoError {
    /// The path does not satisfy the operation's shape requirement
    /// (absolute source, relative destination).
    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: PathBuf, reason: String },

    /// The referenced file or directory does not exist.
    #[error("path not found: {0}")]
    PathNotFound(PathBuf),

    /// A permanent area for this node already exists.
    #[error("permanent file area already exists: {0}")]
    AreaExists(PathBuf),

    /// Underlying filesystem failure.
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
}

impl RepoError {
    pub(crate) fn invalid_path(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for repository results.
pub type RepoResult<T> = Result<T, RepoError>;

//! Error taxonomy for the node entity model.

use lineage_repo::RepoError;
use lineage_store::StoreError;
use lineage_types::NodeUuid;
use thiserror::Error;

/// Errors that can occur during node operations.
///
/// Nothing here is retried internally; every collaborator failure is
/// surfaced to the caller. The only internally-recovered conditions are
/// idempotent no-ops (`store_all` on a fully committed node,
/// `remove_link_from` on an absent label).
#[derive(Debug, Error)]
pub enum NodeError {
    /// A key, label, or value is malformed, or a node-kind hook rejected
    /// the operation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A label or source-node collision, in the link cache or in durable
    /// storage.
    #[error("uniqueness violated: {0}")]
    Uniqueness(String),

    /// A mutation was attempted on durable or otherwise immutable state,
    /// or an anonymous link was asked to be cached.
    #[error("modification not allowed: {0}")]
    ModificationNotAllowed(String),

    /// A missing attribute, extra, edge, or record with no default given.
    #[error("not found: {0}")]
    NotFound(String),

    /// Storing would revisit a node that is still mid-store: the pending
    /// input graph is not a DAG.
    #[error("cyclic provenance graph involving node {0}")]
    CyclicGraph(NodeUuid),

    /// Durable-layer transaction failure, including an identity race lost
    /// to another process.
    #[error("storage failure: {0}")]
    Storage(String),

    /// A precondition on an argument was violated (e.g. a relative path
    /// where an absolute one is required).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Filesystem collaborator failure, surfaced verbatim.
    #[error("repository failure: {0}")]
    Repository(#[from] RepoError),
}

impl From<StoreError> for NodeError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateLabel { .. }
            | StoreError::DuplicateSource { .. }
            | StoreError::DuplicateExtra { .. } => Self::Uniqueness(err.to_string()),
            StoreError::RecordNotFound(_) => Self::NotFound(err.to_string()),
            // An identity collision means another writer won the store
            // race; surfaced, never merged.
            StoreError::DuplicateUuid(_) | StoreError::Backend(_) => {
                Self::Storage(err.to_string())
            }
        }
    }
}

/// Convenience alias for node results.
pub type NodeResult<T> = Result<T, NodeError>;

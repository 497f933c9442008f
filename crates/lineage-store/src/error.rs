use lineage_types::{NodeHandle, NodeUuid};
use thiserror::Error;

/// Errors produced by the record store.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("record not found: {0}")]
    RecordNotFound(String),

    /// A record with this identity already exists. Two processes racing to
    /// store the same node surface this on the loser, never a silent merge.
    #[error("a record with identity {0} already exists")]
    DuplicateUuid(NodeUuid),

    /// The destination already has an input edge with this label.
    #[error("input link labeled '{label}' already exists on node {destination}")]
    DuplicateLabel {
        destination: NodeHandle,
        label: String,
    },

    /// The destination already has an input edge from this source node.
    // The field cannot be called `source`: thiserror would treat it as the
    // error's cause and demand `std::error::Error` of a NodeHandle.
    #[error("an input link from node {src} to node {destination} already exists")]
    DuplicateSource {
        destination: NodeHandle,
        src: NodeHandle,
    },

    /// An extra with this key already exists and the write was exclusive.
    #[error("extra '{key}' already exists on node {handle}")]
    DuplicateExtra { handle: NodeHandle, key: String },

    /// Backend I/O or transaction failure.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Convenience alias for store results.
pub type StoreResult<T> = Result<T, StoreError>;

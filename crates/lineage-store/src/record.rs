//! Record and edge types exchanged across the storage boundary.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lineage_types::{AttrValue, LinkType, NodeHandle, NodeUuid};

/// Everything the store needs to create a durable record for a node.
///
/// The store assigns the handle, creation time, and initial version; the
/// draft carries only caller-owned state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RecordDraft {
    /// Process-independent identity, assigned at node construction.
    pub uuid: NodeUuid,
    /// Plugin-lookup key of the node kind.
    pub node_type: String,
    /// Human-readable label, mutable after store.
    pub label: String,
    /// Human-readable description, mutable after store.
    pub description: String,
    /// The node's attribute set at store time.
    pub attrs: BTreeMap<String, AttrValue>,
}

/// A durable node record, as read back from the store.
///
/// Attributes and extras are accessed through their own store operations
/// rather than carried on the record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Storage-assigned integer handle.
    pub handle: NodeHandle,
    /// Process-independent identity.
    pub uuid: NodeUuid,
    /// Plugin-lookup key of the node kind.
    pub node_type: String,
    /// Human-readable label.
    pub label: String,
    /// Human-readable description.
    pub description: String,
    /// Creation time, assigned by the store.
    pub ctime: DateTime<Utc>,
    /// Last mutation time.
    pub mtime: DateTime<Utc>,
    /// Monotonic version counter, starts at 1.
    pub version: u64,
}

/// Direction of an edge listing relative to the queried node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    /// Edges entering the node (the node is the destination).
    Incoming,
    /// Edges leaving the node (the node is the source).
    Outgoing,
}

/// A durable edge, as read back from the store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Source node of the link.
    pub source: NodeHandle,
    /// Destination node of the link.
    pub destination: NodeHandle,
    /// Label, unique among the destination's input edges.
    pub label: String,
    /// Semantic classification of the link.
    pub link_type: LinkType,
}

/// One edge in an all-or-nothing batch write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeSpec {
    /// Source node of the link.
    pub source: NodeHandle,
    /// Label under which to attach the link.
    pub label: String,
    /// Semantic classification of the link.
    pub link_type: LinkType,
}

/// A comment attached to a durable record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    /// Sequence number within the record, starting at 1.
    pub seq: u64,
    /// Creation time of the comment.
    pub ctime: DateTime<Utc>,
    /// Comment body.
    pub content: String,
}

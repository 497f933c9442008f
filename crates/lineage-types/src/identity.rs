use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// Process-independent identity for a node.
///
/// A `NodeUuid` is assigned exactly once when a node is constructed in
/// memory, before it is ever persisted. It never changes, is never assigned
/// by the caller, and is never reused. The storage collaborator enforces
/// uniqueness on it when the node becomes durable.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeUuid(Uuid);

impl NodeUuid {
    /// Generate a fresh identity. The only way to obtain a new `NodeUuid`.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Reconstruct an identity from its canonical string form.
    ///
    /// Intended for loading already-durable nodes, not for minting new
    /// identities.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidUuid(e.to_string()))
    }

    /// Short identifier (first 8 hex characters), for logs and summaries.
    pub fn short_id(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }

    /// The canonical hyphenated string form.
    pub fn to_canonical(&self) -> String {
        self.0.to_string()
    }
}

impl fmt::Debug for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeUuid({})", self.short_id())
    }
}

impl fmt::Display for NodeUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeUuid {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Storage-assigned integer handle for a durable node.
///
/// Handles are assigned by the storage collaborator on first successful
/// store and are monotonically increasing within one store. A node that is
/// not yet durable has no handle.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct NodeHandle(pub u64);

impl NodeHandle {
    /// The raw integer value.
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

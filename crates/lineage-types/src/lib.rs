//! Foundation types for the lineage provenance graph.
//!
//! This crate provides the identity and structural types used throughout
//! the lineage system. Every other lineage crate depends on `lineage-types`.
//!
//! # Key Types
//!
//! - [`NodeUuid`] — process-independent node identity, assigned once at
//!   construction and never reused
//! - [`NodeHandle`] — storage-assigned integer handle, present only once a
//!   node is durable
//! - [`LinkType`] — semantic classification of a provenance edge
//! - [`AttrValue`] — arbitrary structured attribute payload

pub mod error;
pub mod identity;
pub mod links;

pub use error::TypeError;
pub use identity::{NodeHandle, NodeUuid};
pub use links::LinkType;

/// Arbitrary structured value stored as a node attribute or extra.
pub type AttrValue = serde_json::Value;

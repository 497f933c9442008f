//! Write-once provenance node entity model.
//!
//! A [`Node`] is constructed in memory, accumulates attributes, staged files,
//! and cached input links, and is then committed to durable storage exactly
//! once by the commit protocol ([`Node::store_all`]). After that its identity
//! and most of its state are immutable; extras, comments, and further links
//! remain open.
//!
//! # Invariants
//!
//! - A node's identity never changes and is never assigned by the caller.
//! - Once durable, a node never becomes pending again.
//! - The input-link cache never holds two entries with the same label, nor
//!   two entries from the same source identity.
//! - A node is never committed while a cached link references a source that
//!   is not yet durable: `store_all` stores all such ancestors first (the
//!   pending subgraph must be a DAG) or fails without storing anything.
//!
//! # Collaborators
//!
//! Durable storage is consumed through the [`lineage_store::RecordStore`]
//! trait and files through [`lineage_repo::Repository`]; both are injected
//! via a [`Backend`]. Domain node subtypes plug in through the [`NodeKind`]
//! trait and [`KindRegistry`].

pub mod backend;
pub mod builder;
mod commit;
pub mod error;
pub mod kind;
mod link_cache;
mod links;
pub mod node;
pub mod views;

pub use backend::Backend;
pub use builder::NodeBuilder;
pub use error::{NodeError, NodeResult};
pub use kind::{BaseKind, KindRegistry, NodeKind};
pub use node::Node;
pub use views::{LinkFilter, LinkView, LinkedNode};

pub use lineage_store::{Comment, NodeRecord};
pub use lineage_types::{AttrValue, LinkType, NodeHandle, NodeUuid};

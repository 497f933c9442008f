//! The single-owner buffer for not-yet-durable input links.
//!
//! Every pending link of a node lives here until both of its endpoints are
//! durable and the commit protocol flushes it. The cache is the only path
//! through which pending links are created, so its insert/replace methods
//! are where the graph invariants are enforced:
//!
//! - no two entries share a label;
//! - no two entries share a source identity.

use std::collections::BTreeMap;

use lineage_types::{LinkType, NodeUuid};

use crate::error::{NodeError, NodeResult};
use crate::node::Node;

/// A pending input link: the source node handle and the link type, keyed by
/// label in the cache.
///
/// The source identity is kept alongside the node handle so that invariant
/// checks never need to take the source's lock.
#[derive(Clone)]
pub(crate) struct CachedLink {
    pub source: Node,
    pub source_uuid: NodeUuid,
    pub link_type: LinkType,
}

/// Pending input links of one node, keyed by label.
#[derive(Default)]
pub(crate) struct LinkCache {
    entries: BTreeMap<String, CachedLink>,
}

impl LinkCache {
    /// Insert a pending link, enforcing a non-empty label plus label and
    /// source uniqueness.
    pub fn insert(
        &mut self,
        label: &str,
        source: Node,
        source_uuid: NodeUuid,
        link_type: LinkType,
    ) -> NodeResult<()> {
        check_label(label)?;
        if self.entries.contains_key(label) {
            return Err(NodeError::Uniqueness(format!(
                "input link labeled '{label}' already present in the cache"
            )));
        }
        if self.contains_source(&source_uuid, None) {
            return Err(NodeError::Uniqueness(format!(
                "an input link from node {source_uuid} is already cached"
            )));
        }
        self.entries.insert(
            label.to_string(),
            CachedLink {
                source,
                source_uuid,
                link_type,
            },
        );
        Ok(())
    }

    /// Overwrite (or create) the entry under `label`.
    ///
    /// Source uniqueness is enforced excluding the slot being replaced, so
    /// re-labeling the same source in place is allowed while linking it a
    /// second time under another label is not.
    pub fn replace(
        &mut self,
        label: &str,
        source: Node,
        source_uuid: NodeUuid,
        link_type: LinkType,
    ) -> NodeResult<()> {
        check_label(label)?;
        if self.contains_source(&source_uuid, Some(label)) {
            return Err(NodeError::Uniqueness(format!(
                "an input link from node {source_uuid} is already cached"
            )));
        }
        self.entries.insert(
            label.to_string(),
            CachedLink {
                source,
                source_uuid,
                link_type,
            },
        );
        Ok(())
    }

    /// Remove the entry under `label`, if any.
    pub fn remove(&mut self, label: &str) -> Option<CachedLink> {
        self.entries.remove(label)
    }

    /// Whether a label is present.
    pub fn contains_label(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// Whether a source identity is present, optionally ignoring one slot.
    pub fn contains_source(&self, uuid: &NodeUuid, exclude_label: Option<&str>) -> bool {
        self.entries
            .iter()
            .filter(|(label, _)| exclude_label != Some(label.as_str()))
            .any(|(_, link)| link.source_uuid == *uuid)
    }

    /// Iterate entries in label order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &CachedLink)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Anonymous links never enter the cache; they exist only as durable edges
// with a store-assigned label.
fn check_label(label: &str) -> NodeResult<()> {
    if label.is_empty() {
        return Err(NodeError::ModificationNotAllowed(
            "cached input links require a non-empty label".to_string(),
        ));
    }
    Ok(())
}

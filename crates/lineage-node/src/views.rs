//! Read-only views over a node's neighborhood.

use std::collections::BTreeMap;

use lineage_types::LinkType;

use crate::error::{NodeError, NodeResult};
use crate::node::Node;

/// Selection criteria for incoming-link queries.
#[derive(Debug, Clone, Default)]
pub struct LinkFilter {
    /// Keep only links with exactly this label.
    pub label: Option<String>,
    /// Keep only links of this type.
    pub link_type: Option<LinkType>,
    /// Skip cached (not yet durable) links.
    pub only_stored: bool,
}

impl LinkFilter {
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn with_link_type(link_type: LinkType) -> Self {
        Self {
            link_type: Some(link_type),
            ..Self::default()
        }
    }

    pub(crate) fn matches_label(&self, label: &str) -> bool {
        self.label.as_deref().map_or(true, |l| l == label)
    }

    pub(crate) fn matches_type(&self, link_type: LinkType) -> bool {
        self.link_type.map_or(true, |lt| lt == link_type)
    }
}

/// A neighbor together with the label and type of the connecting link.
#[derive(Debug, Clone)]
pub struct LinkedNode {
    pub label: String,
    pub link_type: LinkType,
    pub node: Node,
}

/// A label-keyed snapshot of one side of a node's links.
///
/// Built by [`Node::inputs`] and [`Node::outputs`]; the snapshot does not
/// follow later graph changes.
#[derive(Debug, Clone, Default)]
pub struct LinkView {
    entries: BTreeMap<String, Node>,
}

impl LinkView {
    pub(crate) fn new(entries: BTreeMap<String, Node>) -> Self {
        Self { entries }
    }

    /// The neighbor behind `label`, or `NotFound`.
    pub fn get(&self, label: &str) -> NodeResult<Node> {
        self.entries
            .get(label)
            .cloned()
            .ok_or_else(|| NodeError::NotFound(format!("no link with label '{label}'")))
    }

    pub fn contains(&self, label: &str) -> bool {
        self.entries.contains_key(label)
    }

    /// All labels, sorted.
    pub fn labels(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries.iter().map(|(label, node)| (label.as_str(), node))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

//! Fluent construction of pending nodes.

use std::collections::BTreeMap;
use std::sync::Arc;

use lineage_types::AttrValue;

use crate::backend::Backend;
use crate::error::NodeResult;
use crate::kind::NodeKind;
use crate::node::Node;

/// Builds a pending [`Node`] with initial metadata and attributes.
///
/// Key validation happens in [`build`](NodeBuilder::build), so chained
/// calls stay infallible.
pub struct NodeBuilder {
    backend: Backend,
    kind: Arc<dyn NodeKind>,
    label: String,
    description: String,
    attrs: BTreeMap<String, AttrValue>,
}

impl NodeBuilder {
    pub(crate) fn new(backend: &Backend, kind: Arc<dyn NodeKind>) -> Self {
        Self {
            backend: backend.clone(),
            kind,
            label: String::new(),
            description: String::new(),
            attrs: BTreeMap::new(),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Construct the pending node, validating every attribute key.
    pub fn build(self) -> NodeResult<Node> {
        let node = Node::new(&self.backend, self.kind);
        node.set_label(&self.label)?;
        node.set_description(&self.description)?;
        for (key, value) in self.attrs {
            node.set_attr(&key, value)?;
        }
        Ok(node)
    }
}

//! The plugin seam for domain-specific node subtypes.
//!
//! A [`NodeKind`] gives a node its stable plugin-lookup key, its allow-list
//! of post-store-updatable attributes, and its edge-authorization and
//! validation hooks. Kinds are registered in a [`KindRegistry`] at startup
//! so that durable records can be re-hydrated into nodes of the right kind.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lineage_types::LinkType;

use crate::error::{NodeError, NodeResult};
use crate::node::Node;

/// Behavior contributed by a concrete node subtype.
///
/// The default implementations authorize every edge and validate every
/// node; subtypes override what they need. None of these hooks are invoked
/// by the commit protocol itself — `validate` is for callers to run before
/// storing, `authorize_output_to` runs during link creation.
pub trait NodeKind: Send + Sync {
    /// Stable plugin-lookup key, persisted in the record's type field.
    fn type_string(&self) -> &'static str;

    /// Attribute keys that may still be written after the node is durable.
    fn updatable_attrs(&self) -> &'static [&'static str] {
        &[]
    }

    /// Authorize an output edge from a node of this kind to `destination`.
    ///
    /// Invoked synchronously while the link is being added; returning an
    /// error aborts the link without touching any state.
    fn authorize_output_to(
        &self,
        source: &Node,
        destination: &Node,
        link_type: LinkType,
    ) -> NodeResult<()> {
        let _ = (source, destination, link_type);
        Ok(())
    }

    /// Check that the node's attributes and files are consistent.
    ///
    /// Works both before and after storing, since attribute reads fall
    /// through to the right place.
    fn validate(&self, node: &Node) -> NodeResult<()> {
        let _ = node;
        Ok(())
    }
}

/// The base kind: no updatable attributes, everything authorized.
#[derive(Clone, Copy, Debug, Default)]
pub struct BaseKind;

impl NodeKind for BaseKind {
    fn type_string(&self) -> &'static str {
        "node"
    }
}

/// Static registration table mapping type strings to kinds.
pub struct KindRegistry {
    kinds: RwLock<HashMap<&'static str, Arc<dyn NodeKind>>>,
}

impl KindRegistry {
    /// An empty registry, without even [`BaseKind`].
    pub fn empty() -> Self {
        Self {
            kinds: RwLock::new(HashMap::new()),
        }
    }

    /// Register a kind. Fails if its type string is already taken.
    pub fn register(&self, kind: Arc<dyn NodeKind>) -> NodeResult<()> {
        let mut kinds = self.kinds.write().expect("lock poisoned");
        let key = kind.type_string();
        if kinds.contains_key(key) {
            return Err(NodeError::Uniqueness(format!(
                "node kind '{key}' is already registered"
            )));
        }
        kinds.insert(key, kind);
        Ok(())
    }

    /// Look up a kind by its type string.
    pub fn resolve(&self, type_string: &str) -> Option<Arc<dyn NodeKind>> {
        self.kinds
            .read()
            .expect("lock poisoned")
            .get(type_string)
            .cloned()
    }

    /// Registered type strings, sorted.
    pub fn type_strings(&self) -> Vec<&'static str> {
        let mut keys: Vec<_> = self
            .kinds
            .read()
            .expect("lock poisoned")
            .keys()
            .copied()
            .collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for KindRegistry {
    /// A registry pre-populated with [`BaseKind`].
    fn default() -> Self {
        let registry = Self::empty();
        registry
            .register(Arc::new(BaseKind))
            .expect("empty registry cannot collide");
        registry
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("type_strings", &self.type_strings())
            .finish()
    }
}

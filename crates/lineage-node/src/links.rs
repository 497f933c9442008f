//! Link management: incoming-link mutation and graph traversal.
//!
//! Incoming links are owned by their destination. While either endpoint is
//! pending the link lives in the destination's cache; once both endpoints
//! are durable it is written straight to storage. Label and source
//! uniqueness hold across the union of the durable edge set and the cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use lineage_store::Direction;
use lineage_types::{LinkType, NodeHandle};

use crate::error::{NodeError, NodeResult};
use crate::node::Node;
use crate::views::{LinkFilter, LinkView, LinkedNode};

impl Node {
    /// Whether any input links are still waiting in the cache.
    pub fn has_cached_links(&self) -> bool {
        !self.read().links.is_empty()
    }

    /// Register an incoming link from `source`.
    ///
    /// With both endpoints durable the link is written immediately and may
    /// be anonymous (the store assigns a label). Otherwise a non-empty
    /// label is required and the link is cached until the commit protocol
    /// flushes it. Self-links are accepted here and only rejected at store
    /// time, like any other cycle.
    pub fn add_link_from(
        &self,
        source: &Node,
        label: Option<&str>,
        link_type: LinkType,
    ) -> NodeResult<()> {
        // An empty label is the anonymous case.
        let label = label.filter(|l| !l.is_empty());
        let source_uuid = source.uuid();
        {
            let inner = self.read();
            if let Some(label) = label {
                if inner.links.contains_label(label) {
                    return Err(NodeError::Uniqueness(format!(
                        "node {} already has a cached input link labeled '{label}'",
                        self.uuid()
                    )));
                }
            }
            if inner.links.contains_source(&source_uuid, None) {
                return Err(NodeError::Uniqueness(format!(
                    "node {} already has a cached input link from {source_uuid}",
                    self.uuid()
                )));
            }
        }

        source.kind().authorize_output_to(source, self, link_type)?;

        match (self.handle(), source.handle()) {
            (Some(destination), Some(src_handle)) => {
                // A durable self-edge would be an immediate cycle.
                if source_uuid == self.uuid() {
                    return Err(NodeError::CyclicGraph(source_uuid));
                }
                let assigned =
                    self.backend()
                        .store()
                        .write_edge(destination, src_handle, label, link_type)?;
                debug!(
                    destination = %self.uuid().short_id(),
                    source = %source_uuid.short_id(),
                    label = %assigned,
                    ?link_type,
                    "durable input link written"
                );
                Ok(())
            }
            (self_handle, _) => {
                let Some(label) = label else {
                    return Err(NodeError::ModificationNotAllowed(
                        "an explicit label is required unless both nodes are stored".to_string(),
                    ));
                };
                if let Some(destination) = self_handle {
                    let durable = self.backend().store().list_edges(
                        destination,
                        Direction::Incoming,
                        None,
                    )?;
                    if durable.iter().any(|edge| edge.label == label) {
                        return Err(NodeError::Uniqueness(format!(
                            "node {} already has a durable input link labeled '{label}'",
                            self.uuid()
                        )));
                    }
                }
                let mut inner = self.write();
                inner
                    .links
                    .insert(label, source.clone(), source_uuid, link_type)
            }
        }
    }

    /// Overwrite (or create) the incoming link under `label`.
    ///
    /// Source uniqueness is still enforced, excluding the link being
    /// replaced.
    pub fn replace_link_from(
        &self,
        source: &Node,
        label: &str,
        link_type: LinkType,
    ) -> NodeResult<()> {
        if label.is_empty() {
            return Err(NodeError::ModificationNotAllowed(
                "a non-empty label is required to replace a link".to_string(),
            ));
        }
        let source_uuid = source.uuid();
        source.kind().authorize_output_to(source, self, link_type)?;

        match (self.handle(), source.handle()) {
            (Some(destination), Some(src_handle)) => {
                self.backend()
                    .store()
                    .replace_edge(destination, src_handle, label, link_type)?;
                // A cached entry under the same label is now stale.
                self.write().links.remove(label);
                Ok(())
            }
            _ => {
                let mut inner = self.write();
                inner
                    .links
                    .replace(label, source.clone(), source_uuid, link_type)
            }
        }
    }

    /// Remove the incoming link under `label`, cached or durable. Removing
    /// a label that does not exist is not an error.
    pub fn remove_link_from(&self, label: &str) -> NodeResult<()> {
        self.write().links.remove(label);
        if let Some(destination) = self.handle() {
            self.backend().store().delete_edge(destination, label)?;
        }
        Ok(())
    }

    // -- traversal --------------------------------------------------------

    /// Incoming links matching `filter`, durable and cached merged, sorted
    /// by label. With equal labels the cached entry wins in dictionary
    /// views, so the order here keeps durable entries first.
    pub fn get_inputs(&self, filter: &LinkFilter) -> NodeResult<Vec<LinkedNode>> {
        let mut result = Vec::new();
        if let Some(handle) = self.handle() {
            let edges =
                self.backend()
                    .store()
                    .list_edges(handle, Direction::Incoming, filter.link_type)?;
            for edge in edges {
                if !filter.matches_label(&edge.label) {
                    continue;
                }
                result.push(LinkedNode {
                    node: Node::load_by_handle(self.backend(), edge.source)?,
                    label: edge.label,
                    link_type: edge.link_type,
                });
            }
        }
        if !filter.only_stored {
            let cached: Vec<LinkedNode> = {
                let inner = self.read();
                inner
                    .links
                    .iter()
                    .filter(|(label, link)| {
                        filter.matches_label(label) && filter.matches_type(link.link_type)
                    })
                    .map(|(label, link)| LinkedNode {
                        label: label.clone(),
                        link_type: link.link_type,
                        node: link.source.clone(),
                    })
                    .collect()
            };
            result.extend(cached);
        }
        result.sort_by(|a, b| a.label.cmp(&b.label));
        Ok(result)
    }

    /// Incoming links as a label-keyed map; with a durable and a cached
    /// link under the same label the cached one wins.
    pub fn get_inputs_dict(&self, filter: &LinkFilter) -> NodeResult<BTreeMap<String, Node>> {
        let mut map = BTreeMap::new();
        for linked in self.get_inputs(filter)? {
            map.insert(linked.label, linked.node);
        }
        Ok(map)
    }

    /// A label-keyed view of all incoming links.
    pub fn inputs(&self) -> NodeResult<LinkView> {
        Ok(LinkView::new(self.get_inputs_dict(&LinkFilter::default())?))
    }

    /// Outgoing links, durable only (a pending node has none), sorted by
    /// label.
    pub fn get_outputs(&self, link_type: Option<LinkType>) -> NodeResult<Vec<LinkedNode>> {
        let Some(handle) = self.handle() else {
            return Ok(Vec::new());
        };
        let edges = self
            .backend()
            .store()
            .list_edges(handle, Direction::Outgoing, link_type)?;
        edges
            .into_iter()
            .map(|edge| {
                Ok(LinkedNode {
                    node: Node::load_by_handle(self.backend(), edge.destination)?,
                    label: edge.label,
                    link_type: edge.link_type,
                })
            })
            .collect()
    }

    /// Outgoing links as a map with two kinds of keys: every destination
    /// appears under `<label>_<handle>`, and for each label the earliest
    /// destination (by creation time, then handle) also appears under the
    /// bare label.
    pub fn get_outputs_dict(
        &self,
        link_type: Option<LinkType>,
    ) -> NodeResult<BTreeMap<String, Node>> {
        let mut map = BTreeMap::new();
        let mut primary: BTreeMap<String, (DateTime<Utc>, NodeHandle)> = BTreeMap::new();
        for linked in self.get_outputs(link_type)? {
            let record = linked.node.record()?;
            map.insert(
                format!("{}_{}", linked.label, record.handle),
                linked.node.clone(),
            );
            let rank = (record.ctime, record.handle);
            if primary
                .get(&linked.label)
                .map_or(true, |current| rank < *current)
            {
                primary.insert(linked.label.clone(), rank);
                map.insert(linked.label, linked.node);
            }
        }
        Ok(map)
    }

    /// A label-keyed view of all outgoing links.
    pub fn outputs(&self) -> NodeResult<LinkView> {
        Ok(LinkView::new(self.get_outputs_dict(None)?))
    }

    /// Whether any incoming link exists, cached or durable.
    pub fn has_parents(&self) -> NodeResult<bool> {
        if self.has_cached_links() {
            return Ok(true);
        }
        match self.handle() {
            Some(handle) => Ok(!self
                .backend()
                .store()
                .list_edges(handle, Direction::Incoming, None)?
                .is_empty()),
            None => Ok(false),
        }
    }

    /// Whether any durable outgoing link exists.
    pub fn has_children(&self) -> NodeResult<bool> {
        match self.handle() {
            Some(handle) => Ok(!self
                .backend()
                .store()
                .list_edges(handle, Direction::Outgoing, None)?
                .is_empty()),
            None => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Backend;
    use crate::kind::{BaseKind, NodeKind};
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use std::sync::Arc;

    fn backend() -> Backend {
        Backend::ephemeral().unwrap()
    }

    fn node(backend: &Backend) -> Node {
        Node::new(backend, Arc::new(BaseKind))
    }

    struct SealedKind;

    impl NodeKind for SealedKind {
        fn type_string(&self) -> &'static str {
            "sealed"
        }

        fn authorize_output_to(
            &self,
            _source: &Node,
            _destination: &Node,
            _link_type: LinkType,
        ) -> NodeResult<()> {
            Err(NodeError::ModificationNotAllowed(
                "sealed nodes cannot emit links".to_string(),
            ))
        }
    }

    // ---- mutation -------------------------------------------------------

    #[test]
    fn link_between_pending_nodes_is_cached() {
        let backend = backend();
        let src = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&src, Some("input_a"), LinkType::Input)
            .unwrap();
        assert!(dst.has_cached_links());
        assert!(dst.has_parents().unwrap());
        assert!(!src.has_children().unwrap());
    }

    #[test]
    fn anonymous_link_needs_both_endpoints_stored() {
        let backend = backend();
        let src = node(&backend);
        let dst = node(&backend);
        let err = dst.add_link_from(&src, None, LinkType::Input).unwrap_err();
        assert!(matches!(err, NodeError::ModificationNotAllowed(_)));

        src.store_all().unwrap();
        dst.store_all().unwrap();
        dst.add_link_from(&src, None, LinkType::Input).unwrap();
        let inputs = dst.get_inputs(&LinkFilter::default()).unwrap();
        assert_eq!(inputs.len(), 1);
        assert!(inputs[0]
            .label
            .starts_with(&format!("link_{}", src.handle().unwrap())));
    }

    #[test]
    fn empty_label_is_treated_as_anonymous() {
        let backend = backend();
        let src = node(&backend);
        let dst = node(&backend);
        let err = dst.add_link_from(&src, Some(""), LinkType::Input).unwrap_err();
        assert!(matches!(err, NodeError::ModificationNotAllowed(_)));
        assert!(!dst.has_cached_links());

        let err = dst.replace_link_from(&src, "", LinkType::Input).unwrap_err();
        assert!(matches!(err, NodeError::ModificationNotAllowed(_)));
        assert!(!dst.has_cached_links());

        // With both endpoints durable it falls back to the synthetic label.
        src.store_all().unwrap();
        dst.store_all().unwrap();
        dst.add_link_from(&src, Some(""), LinkType::Input).unwrap();
        let inputs = dst.get_inputs(&LinkFilter::default()).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].label, format!("link_{}", src.handle().unwrap()));
    }

    #[test]
    fn duplicate_label_is_rejected() {
        let backend = backend();
        let a = node(&backend);
        let b = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&a, Some("x"), LinkType::Input).unwrap();
        let err = dst
            .add_link_from(&b, Some("x"), LinkType::Input)
            .unwrap_err();
        assert!(matches!(err, NodeError::Uniqueness(_)));
    }

    #[test]
    fn duplicate_source_is_rejected() {
        let backend = backend();
        let src = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&src, Some("first"), LinkType::Input)
            .unwrap();
        let err = dst
            .add_link_from(&src, Some("second"), LinkType::Input)
            .unwrap_err();
        assert!(matches!(err, NodeError::Uniqueness(_)));
    }

    #[test]
    fn cached_label_collides_with_durable_edge() {
        let backend = backend();
        let stored_src = node(&backend);
        stored_src.store_all().unwrap();
        let dst = node(&backend);
        dst.add_link_from(&stored_src, Some("x"), LinkType::Input)
            .unwrap();
        dst.store_all().unwrap();

        // The edge is durable now; caching the same label again must fail.
        let pending_src = node(&backend);
        let err = dst
            .add_link_from(&pending_src, Some("x"), LinkType::Input)
            .unwrap_err();
        assert!(matches!(err, NodeError::Uniqueness(_)));
    }

    #[test]
    fn replace_swaps_the_source_in_place() {
        let backend = backend();
        let a = node(&backend);
        let b = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&a, Some("slot"), LinkType::Input).unwrap();
        dst.replace_link_from(&b, "slot", LinkType::Create).unwrap();

        let inputs = dst.get_inputs(&LinkFilter::default()).unwrap();
        assert_eq!(inputs.len(), 1);
        assert_eq!(inputs[0].node, b);
        assert_eq!(inputs[0].link_type, LinkType::Create);

        // The replaced source may now be linked under another label.
        dst.add_link_from(&a, Some("other"), LinkType::Input).unwrap();
    }

    #[test]
    fn replace_still_enforces_source_uniqueness() {
        let backend = backend();
        let a = node(&backend);
        let b = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&a, Some("one"), LinkType::Input).unwrap();
        dst.add_link_from(&b, Some("two"), LinkType::Input).unwrap();
        let err = dst.replace_link_from(&a, "two", LinkType::Input).unwrap_err();
        assert!(matches!(err, NodeError::Uniqueness(_)));
    }

    #[test]
    fn remove_clears_cached_and_durable_links() {
        let backend = backend();
        let src = node(&backend);
        let dst = node(&backend);
        dst.add_link_from(&src, Some("gone"), LinkType::Input).unwrap();
        dst.remove_link_from("gone").unwrap();
        assert!(!dst.has_cached_links());

        src.store_all().unwrap();
        dst.store_all().unwrap();
        dst.add_link_from(&src, Some("gone"), LinkType::Input).unwrap();
        dst.remove_link_from("gone").unwrap();
        assert!(dst.get_inputs(&LinkFilter::default()).unwrap().is_empty());

        // Absent labels are not an error.
        dst.remove_link_from("never-existed").unwrap();
    }

    #[test]
    fn source_kind_can_refuse_the_link() {
        let backend = backend();
        backend.kinds().register(Arc::new(SealedKind)).unwrap();
        let src = Node::new(&backend, Arc::new(SealedKind));
        let dst = node(&backend);
        let err = dst
            .add_link_from(&src, Some("refused"), LinkType::Input)
            .unwrap_err();
        assert!(matches!(err, NodeError::ModificationNotAllowed(_)));
        assert!(!dst.has_cached_links());
    }

    // ---- traversal ------------------------------------------------------

    #[test]
    fn inputs_merge_durable_and_cached() {
        let backend = backend();
        let stored_src = node(&backend);
        stored_src.store_all().unwrap();
        let dst = node(&backend);
        dst.add_link_from(&stored_src, Some("durable"), LinkType::Input)
            .unwrap();
        dst.store_all().unwrap();

        let pending_src = node(&backend);
        dst.add_link_from(&pending_src, Some("cached"), LinkType::Call)
            .unwrap();

        let all = dst.get_inputs(&LinkFilter::default()).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].label, "cached");
        assert_eq!(all[1].label, "durable");

        let stored_only = dst
            .get_inputs(&LinkFilter {
                only_stored: true,
                ..LinkFilter::default()
            })
            .unwrap();
        assert_eq!(stored_only.len(), 1);
        assert_eq!(stored_only[0].node, stored_src);

        let by_type = dst
            .get_inputs(&LinkFilter::with_link_type(LinkType::Call))
            .unwrap();
        assert_eq!(by_type.len(), 1);
        assert_eq!(by_type[0].label, "cached");

        let by_label = dst.get_inputs(&LinkFilter::with_label("durable")).unwrap();
        assert_eq!(by_label.len(), 1);

        let view = dst.inputs().unwrap();
        assert_eq!(view.labels(), vec!["cached", "durable"]);
        assert_eq!(view.get("durable").unwrap(), stored_src);
    }

    #[test]
    fn outputs_are_empty_until_stored() {
        let backend = backend();
        let src = node(&backend);
        assert!(src.get_outputs(None).unwrap().is_empty());
        assert!(!src.has_children().unwrap());
    }

    #[test]
    fn outputs_reflect_durable_edges() {
        let backend = backend();
        let src = node(&backend);
        src.store_all().unwrap();

        let out_a = node(&backend);
        out_a.add_link_from(&src, Some("result"), LinkType::Create)
            .unwrap();
        out_a.store_all().unwrap();

        let out_b = node(&backend);
        out_b.add_link_from(&src, Some("retrieved"), LinkType::Return)
            .unwrap();
        out_b.store_all().unwrap();

        assert!(src.has_children().unwrap());
        let outputs = src.get_outputs(None).unwrap();
        assert_eq!(outputs.len(), 2);

        let created = src.get_outputs(Some(LinkType::Create)).unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].node, out_a);
    }

    #[test]
    fn outputs_dict_disambiguates_shared_labels() {
        let backend = backend();
        let src = node(&backend);
        src.store_all().unwrap();

        // Three destinations reached under the same label, created in order.
        let outs: Vec<Node> = (0..3)
            .map(|_| {
                let out = node(&backend);
                out.add_link_from(&src, Some("result"), LinkType::Create)
                    .unwrap();
                out.store_all().unwrap();
                out
            })
            .collect();

        let dict = src.get_outputs_dict(None).unwrap();
        // The earliest destination owns the bare label.
        assert_eq!(dict.get("result"), Some(&outs[0]));
        for out in &outs {
            let handle = out.handle().unwrap();
            assert_eq!(dict.get(&format!("result_{handle}")), Some(out));
        }

        let view = src.outputs().unwrap();
        assert!(view.contains("result"));
        assert_eq!(view.len(), 4);
    }

    proptest! {
        // Whatever sequence of link additions is attempted, each label is
        // accepted at most once and traversal sees exactly the accepted set.
        #[test]
        fn labels_stay_unique_under_arbitrary_insertions(
            labels in proptest::collection::vec("[a-c]{1,2}", 1..12)
        ) {
            let backend = Backend::ephemeral().unwrap();
            let dst = Node::new(&backend, Arc::new(BaseKind));
            let mut accepted = BTreeSet::new();
            for label in &labels {
                let src = Node::new(&backend, Arc::new(BaseKind));
                match dst.add_link_from(&src, Some(label), LinkType::Input) {
                    Ok(()) => prop_assert!(accepted.insert(label.clone())),
                    Err(NodeError::Uniqueness(_)) => {
                        prop_assert!(accepted.contains(label.as_str()))
                    }
                    Err(err) => prop_assert!(false, "unexpected error: {err}"),
                }
            }
            let inputs = dst.get_inputs(&LinkFilter::default()).unwrap();
            prop_assert_eq!(inputs.len(), accepted.len());
        }
    }
}

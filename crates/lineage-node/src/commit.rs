//! The commit protocol: making pending nodes durable exactly once.
//!
//! `store_all` walks unstored ancestors first, so by the time a node's own
//! record is written every cached input link has a durable source and the
//! whole cache can be flushed in one atomic batch. A cycle through the
//! cache is detected by the in-flight set before anything touches storage,
//! so a failed commit leaves no partial state behind.

use std::collections::HashSet;

use tracing::{debug, warn};

use lineage_repo::StagingArea;
use lineage_store::{EdgeSpec, RecordDraft};
use lineage_types::NodeUuid;

use crate::error::{NodeError, NodeResult};
use crate::node::Node;

impl Node {
    /// Store this node and, first, every unstored ancestor reachable
    /// through cached input links.
    ///
    /// On an already-durable node this only flushes cache entries whose
    /// sources have since become durable; with an empty cache it is a
    /// no-op.
    pub fn store_all(&self) -> NodeResult<()> {
        if self.is_stored() {
            if self.has_cached_links() {
                return self.store_cached_input_links();
            }
            return Ok(());
        }
        let mut in_flight = HashSet::new();
        self.store_all_recursive(&mut in_flight)
    }

    /// Store this node alone. Every cached input link must already have a
    /// durable source, otherwise nothing is written.
    pub fn store(&self) -> NodeResult<()> {
        if self.is_stored() {
            return Err(NodeError::ModificationNotAllowed(format!(
                "node {} is already stored",
                self.uuid()
            )));
        }
        self.check_parents_stored()?;
        self.store_record()?;
        self.store_cached_input_links()
    }

    fn store_all_recursive(&self, in_flight: &mut HashSet<NodeUuid>) -> NodeResult<()> {
        if !in_flight.insert(self.uuid()) {
            return Err(NodeError::CyclicGraph(self.uuid()));
        }
        self.store_input_nodes(in_flight)?;
        self.check_parents_stored()?;
        if !self.is_stored() {
            self.store_record()?;
        }
        let flushed = self.store_cached_input_links();
        in_flight.remove(&self.uuid());
        flushed
    }

    /// Recurse into cached sources that are still pending.
    ///
    /// The cache snapshot is taken before any recursion so no lock is held
    /// while walking; a self-link resolves to this node and trips the
    /// in-flight set.
    fn store_input_nodes(&self, in_flight: &mut HashSet<NodeUuid>) -> NodeResult<()> {
        let sources: Vec<Node> = {
            let inner = self.read();
            inner.links.iter().map(|(_, link)| link.source.clone()).collect()
        };
        for source in sources {
            if !source.is_stored() {
                source.store_all_recursive(in_flight)?;
            }
        }
        Ok(())
    }

    /// Fail with `ModificationNotAllowed` if any cached input link still
    /// has a pending source.
    pub(crate) fn check_parents_stored(&self) -> NodeResult<()> {
        let cached: Vec<(String, Node)> = {
            let inner = self.read();
            inner
                .links
                .iter()
                .map(|(label, link)| (label.clone(), link.source.clone()))
                .collect()
        };
        for (label, source) in cached {
            if !source.is_stored() {
                return Err(NodeError::ModificationNotAllowed(format!(
                    "cannot store node {}: input '{label}' comes from unstored node {}",
                    self.uuid(),
                    source.uuid()
                )));
            }
        }
        Ok(())
    }

    /// Write the record and move the staged files into the permanent area.
    ///
    /// The record goes first; if the file move then fails the record is
    /// deleted again and the staging tree is kept, so the commit can be
    /// retried.
    fn store_record(&self) -> NodeResult<()> {
        let mut inner = self.write();
        let draft = RecordDraft {
            uuid: self.uuid(),
            node_type: inner.kind.type_string().to_string(),
            label: inner.label.clone(),
            description: inner.description.clone(),
            attrs: inner.attrs.clone(),
        };
        let handle = self.backend().store().create_record(&draft)?;

        // Nodes without staged files still get a (empty) permanent area.
        let staging = match inner.staging.take() {
            Some(staging) => staging,
            None => StagingArea::new()?,
        };
        if let Err(err) = self.backend().repository().commit_staging(&staging, &self.uuid()) {
            inner.staging = Some(staging);
            if let Err(rollback) = self.backend().store().delete_record(handle) {
                warn!(
                    uuid = %self.uuid(),
                    %handle,
                    error = %rollback,
                    "failed to roll back record after file commit failure"
                );
            }
            return Err(err.into());
        }

        inner.handle = Some(handle);
        inner.attrs.clear();
        debug!(uuid = %self.uuid().short_id(), %handle, "node stored");
        Ok(())
    }

    /// Flush every cache entry whose source is durable as one atomic edge
    /// batch; on failure the cache is left untouched.
    fn store_cached_input_links(&self) -> NodeResult<()> {
        let destination = self.stored_handle()?;
        let entries: Vec<(String, Node, lineage_types::LinkType)> = {
            let inner = self.read();
            inner
                .links
                .iter()
                .map(|(label, link)| (label.clone(), link.source.clone(), link.link_type))
                .collect()
        };

        let mut specs = Vec::new();
        let mut flushed = Vec::new();
        for (label, source, link_type) in entries {
            if let Some(src_handle) = source.handle() {
                specs.push(EdgeSpec {
                    source: src_handle,
                    label: label.clone(),
                    link_type,
                });
                flushed.push(label);
            }
        }
        if specs.is_empty() {
            return Ok(());
        }

        self.backend().store().write_edge_batch(destination, &specs)?;

        let mut inner = self.write();
        for label in &flushed {
            inner.links.remove(label);
        }
        debug!(
            uuid = %self.uuid().short_id(),
            count = specs.len(),
            "flushed cached input links"
        );
        Ok(())
    }
}

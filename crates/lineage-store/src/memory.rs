use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use tracing::debug;

use lineage_types::{AttrValue, LinkType, NodeHandle, NodeUuid};

use crate::error::{StoreError, StoreResult};
use crate::record::{Comment, Direction, EdgeRecord, EdgeSpec, NodeRecord, RecordDraft};
use crate::traits::RecordStore;

/// In-memory, HashMap-based record store.
///
/// Intended for tests, local demos, and embedding. All state is held behind
/// a single `RwLock`, so every trait operation runs under one lock scope —
/// this is what makes each operation its own transaction.
pub struct InMemoryRecordStore {
    inner: RwLock<StoreState>,
}

#[derive(Default)]
struct StoreState {
    next_handle: u64,
    records: BTreeMap<NodeHandle, RecordRow>,
    by_uuid: HashMap<NodeUuid, NodeHandle>,
    edges: Vec<EdgeRecord>,
}

struct RecordRow {
    record: NodeRecord,
    attrs: BTreeMap<String, AttrValue>,
    extras: BTreeMap<String, AttrValue>,
    comments: Vec<Comment>,
}

impl RecordRow {
    /// Register a mutation: bump the version and refresh mtime.
    fn touch(&mut self, now: DateTime<Utc>) {
        self.record.version += 1;
        self.record.mtime = now;
    }
}

impl StoreState {
    fn row(&self, handle: NodeHandle) -> StoreResult<&RecordRow> {
        self.records
            .get(&handle)
            .ok_or_else(|| StoreError::RecordNotFound(handle.to_string()))
    }

    fn row_mut(&mut self, handle: NodeHandle) -> StoreResult<&mut RecordRow> {
        self.records
            .get_mut(&handle)
            .ok_or_else(|| StoreError::RecordNotFound(handle.to_string()))
    }

    /// Check one prospective edge against the destination's existing input
    /// edges plus any earlier entries of the same batch.
    fn check_edge(
        &self,
        destination: NodeHandle,
        source: NodeHandle,
        label: &str,
        pending: &[EdgeSpec],
    ) -> StoreResult<()> {
        let incoming = self
            .edges
            .iter()
            .filter(|e| e.destination == destination);
        for edge in incoming {
            if edge.label == label {
                return Err(StoreError::DuplicateLabel {
                    destination,
                    label: label.to_string(),
                });
            }
            if edge.source == source {
                return Err(StoreError::DuplicateSource {
                    destination,
                    src: source,
                });
            }
        }
        for spec in pending {
            if spec.label == label {
                return Err(StoreError::DuplicateLabel {
                    destination,
                    label: label.to_string(),
                });
            }
            if spec.source == source {
                return Err(StoreError::DuplicateSource {
                    destination,
                    src: source,
                });
            }
        }
        Ok(())
    }
}

impl InMemoryRecordStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreState::default()),
        }
    }

    /// Number of records currently stored.
    pub fn record_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").records.len()
    }

    /// Number of edges currently stored.
    pub fn edge_count(&self) -> usize {
        self.inner.read().expect("lock poisoned").edges.len()
    }
}

impl Default for InMemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordStore for InMemoryRecordStore {
    fn create_record(&self, draft: &RecordDraft) -> StoreResult<NodeHandle> {
        let mut state = self.inner.write().expect("lock poisoned");
        if state.by_uuid.contains_key(&draft.uuid) {
            return Err(StoreError::DuplicateUuid(draft.uuid));
        }
        state.next_handle += 1;
        let handle = NodeHandle(state.next_handle);
        let now = Utc::now();
        let row = RecordRow {
            record: NodeRecord {
                handle,
                uuid: draft.uuid,
                node_type: draft.node_type.clone(),
                label: draft.label.clone(),
                description: draft.description.clone(),
                ctime: now,
                mtime: now,
                version: 1,
            },
            attrs: draft.attrs.clone(),
            extras: BTreeMap::new(),
            comments: Vec::new(),
        };
        state.by_uuid.insert(draft.uuid, handle);
        state.records.insert(handle, row);
        debug!(uuid = %draft.uuid, handle = %handle, "created record");
        Ok(handle)
    }

    fn delete_record(&self, handle: NodeHandle) -> StoreResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        let Some(row) = state.records.remove(&handle) else {
            return Ok(false);
        };
        state.by_uuid.remove(&row.record.uuid);
        state
            .edges
            .retain(|e| e.destination != handle && e.source != handle);
        debug!(handle = %handle, "deleted record");
        Ok(true)
    }

    fn get_record(&self, handle: NodeHandle) -> StoreResult<Option<NodeRecord>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.records.get(&handle).map(|r| r.record.clone()))
    }

    fn get_record_by_uuid(&self, uuid: &NodeUuid) -> StoreResult<Option<NodeRecord>> {
        let state = self.inner.read().expect("lock poisoned");
        let handle = state.by_uuid.get(uuid).copied();
        Ok(handle.and_then(|h| state.records.get(&h).map(|r| r.record.clone())))
    }

    fn read_attr(&self, handle: NodeHandle, key: &str) -> StoreResult<Option<AttrValue>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.row(handle)?.attrs.get(key).cloned())
    }

    fn write_attr(&self, handle: NodeHandle, key: &str, value: AttrValue) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        row.attrs.insert(key.to_string(), value);
        row.touch(Utc::now());
        Ok(())
    }

    fn delete_attr(&self, handle: NodeHandle, key: &str) -> StoreResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        let existed = row.attrs.remove(key).is_some();
        if existed {
            row.touch(Utc::now());
        }
        Ok(existed)
    }

    fn attr_map(&self, handle: NodeHandle) -> StoreResult<BTreeMap<String, AttrValue>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.row(handle)?.attrs.clone())
    }

    fn read_extra(&self, handle: NodeHandle, key: &str) -> StoreResult<Option<AttrValue>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.row(handle)?.extras.get(key).cloned())
    }

    fn write_extra(
        &self,
        handle: NodeHandle,
        key: &str,
        value: AttrValue,
        exclusive: bool,
    ) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        if exclusive && row.extras.contains_key(key) {
            return Err(StoreError::DuplicateExtra {
                handle,
                key: key.to_string(),
            });
        }
        row.extras.insert(key.to_string(), value);
        row.touch(Utc::now());
        Ok(())
    }

    fn delete_extra(&self, handle: NodeHandle, key: &str) -> StoreResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        let existed = row.extras.remove(key).is_some();
        if existed {
            row.touch(Utc::now());
        }
        Ok(existed)
    }

    fn extra_map(&self, handle: NodeHandle) -> StoreResult<BTreeMap<String, AttrValue>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.row(handle)?.extras.clone())
    }

    fn write_label(&self, handle: NodeHandle, label: &str) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        row.record.label = label.to_string();
        row.touch(Utc::now());
        Ok(())
    }

    fn write_description(&self, handle: NodeHandle, description: &str) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        row.record.description = description.to_string();
        row.touch(Utc::now());
        Ok(())
    }

    fn increment_version(&self, handle: NodeHandle) -> StoreResult<u64> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        row.touch(Utc::now());
        Ok(row.record.version)
    }

    fn write_edge(
        &self,
        destination: NodeHandle,
        source: NodeHandle,
        label: Option<&str>,
        link_type: LinkType,
    ) -> StoreResult<String> {
        let mut state = self.inner.write().expect("lock poisoned");
        state.row(destination)?;
        state.row(source)?;
        let effective = match label {
            Some(l) => l.to_string(),
            // Source uniqueness makes this collision-free per destination.
            None => format!("link_{source}"),
        };
        state.check_edge(destination, source, &effective, &[])?;
        state.edges.push(EdgeRecord {
            source,
            destination,
            label: effective.clone(),
            link_type,
        });
        debug!(%source, %destination, label = %effective, %link_type, "wrote edge");
        Ok(effective)
    }

    fn write_edge_batch(&self, destination: NodeHandle, edges: &[EdgeSpec]) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        state.row(destination)?;
        // Validate the whole batch before applying anything.
        for (index, spec) in edges.iter().enumerate() {
            state.row(spec.source)?;
            state.check_edge(destination, spec.source, &spec.label, &edges[..index])?;
        }
        for spec in edges {
            state.edges.push(EdgeRecord {
                source: spec.source,
                destination,
                label: spec.label.clone(),
                link_type: spec.link_type,
            });
        }
        debug!(%destination, count = edges.len(), "wrote edge batch");
        Ok(())
    }

    fn replace_edge(
        &self,
        destination: NodeHandle,
        source: NodeHandle,
        label: &str,
        link_type: LinkType,
    ) -> StoreResult<()> {
        let mut state = self.inner.write().expect("lock poisoned");
        state.row(destination)?;
        state.row(source)?;
        let clash = state.edges.iter().any(|e| {
            e.destination == destination && e.source == source && e.label != label
        });
        if clash {
            return Err(StoreError::DuplicateSource {
                destination,
                src: source,
            });
        }
        state
            .edges
            .retain(|e| !(e.destination == destination && e.label == label));
        state.edges.push(EdgeRecord {
            source,
            destination,
            label: label.to_string(),
            link_type,
        });
        debug!(%source, %destination, %label, "replaced edge");
        Ok(())
    }

    fn delete_edge(&self, destination: NodeHandle, label: &str) -> StoreResult<bool> {
        let mut state = self.inner.write().expect("lock poisoned");
        let before = state.edges.len();
        state
            .edges
            .retain(|e| !(e.destination == destination && e.label == label));
        Ok(state.edges.len() != before)
    }

    fn list_edges(
        &self,
        handle: NodeHandle,
        direction: Direction,
        link_type: Option<LinkType>,
    ) -> StoreResult<Vec<EdgeRecord>> {
        let state = self.inner.read().expect("lock poisoned");
        state.row(handle)?;
        let mut edges: Vec<EdgeRecord> = state
            .edges
            .iter()
            .filter(|e| match direction {
                Direction::Incoming => e.destination == handle,
                Direction::Outgoing => e.source == handle,
            })
            .filter(|e| link_type.map_or(true, |lt| e.link_type == lt))
            .cloned()
            .collect();
        edges.sort_by(|a, b| {
            (&a.label, a.source, a.destination).cmp(&(&b.label, b.source, b.destination))
        });
        Ok(edges)
    }

    fn add_comment(&self, handle: NodeHandle, content: &str) -> StoreResult<Comment> {
        let mut state = self.inner.write().expect("lock poisoned");
        let row = state.row_mut(handle)?;
        let comment = Comment {
            seq: row.comments.len() as u64 + 1,
            ctime: Utc::now(),
            content: content.to_string(),
        };
        row.comments.push(comment.clone());
        Ok(comment)
    }

    fn list_comments(&self, handle: NodeHandle) -> StoreResult<Vec<Comment>> {
        let state = self.inner.read().expect("lock poisoned");
        Ok(state.row(handle)?.comments.clone())
    }
}

impl std::fmt::Debug for InMemoryRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRecordStore")
            .field("record_count", &self.record_count())
            .field("edge_count", &self.edge_count())
            .finish()
    }
}

use std::collections::BTreeMap;

use lineage_types::{AttrValue, LinkType, NodeHandle, NodeUuid};

use crate::error::StoreResult;
use crate::record::{Comment, Direction, EdgeRecord, EdgeSpec, NodeRecord, RecordDraft};

/// Transactional record store for provenance nodes.
///
/// All implementations must satisfy these invariants:
/// - Record identity (`NodeUuid`) is unique; a second `create_record` with
///   the same identity fails, it never merges.
/// - Handles are assigned by the store, monotonically, and never reused.
/// - Among the input edges of one destination, labels are unique and each
///   source appears at most once.
/// - Every operation is atomic: either all of its durable effects are
///   visible or none are. In particular [`write_edge_batch`] is
///   all-or-nothing across the whole batch.
/// - Mutating operations bump the record's version counter by exactly one
///   and refresh its mtime, within the same transaction as the payload
///   write, so concurrent writers never lose an increment.
/// - All backend failures are propagated, never silently ignored.
///
/// [`write_edge_batch`]: RecordStore::write_edge_batch
pub trait RecordStore: Send + Sync {
    // -- records ----------------------------------------------------------

    /// Create a durable record and return its store-assigned handle.
    ///
    /// Fails with [`StoreError::DuplicateUuid`] if a record with the same
    /// identity already exists.
    ///
    /// [`StoreError::DuplicateUuid`]: crate::StoreError::DuplicateUuid
    fn create_record(&self, draft: &RecordDraft) -> StoreResult<NodeHandle>;

    /// Delete a record and every edge touching it. Returns `true` if the
    /// record existed.
    ///
    /// Intended for commit-abort compensation and garbage collection only;
    /// deleting a referenced record corrupts the provenance graph.
    fn delete_record(&self, handle: NodeHandle) -> StoreResult<bool>;

    /// Read a record by handle. Returns `Ok(None)` if it does not exist.
    fn get_record(&self, handle: NodeHandle) -> StoreResult<Option<NodeRecord>>;

    /// Read a record by identity. Returns `Ok(None)` if it does not exist.
    fn get_record_by_uuid(&self, uuid: &NodeUuid) -> StoreResult<Option<NodeRecord>>;

    // -- attributes -------------------------------------------------------

    /// Read one attribute. `Ok(None)` if the key is absent.
    fn read_attr(&self, handle: NodeHandle, key: &str) -> StoreResult<Option<AttrValue>>;

    /// Write one attribute, bumping version and mtime.
    fn write_attr(&self, handle: NodeHandle, key: &str, value: AttrValue) -> StoreResult<()>;

    /// Delete one attribute. Returns `true` (and bumps the version) if the
    /// key existed.
    fn delete_attr(&self, handle: NodeHandle, key: &str) -> StoreResult<bool>;

    /// The full attribute map of a record.
    fn attr_map(&self, handle: NodeHandle) -> StoreResult<BTreeMap<String, AttrValue>>;

    // -- extras -----------------------------------------------------------

    /// Read one extra. `Ok(None)` if the key is absent.
    fn read_extra(&self, handle: NodeHandle, key: &str) -> StoreResult<Option<AttrValue>>;

    /// Write one extra, bumping version and mtime.
    ///
    /// With `exclusive` set, fails with [`StoreError::DuplicateExtra`] if
    /// the key already exists (useful to "lock" a node against repeated
    /// processing).
    ///
    /// [`StoreError::DuplicateExtra`]: crate::StoreError::DuplicateExtra
    fn write_extra(
        &self,
        handle: NodeHandle,
        key: &str,
        value: AttrValue,
        exclusive: bool,
    ) -> StoreResult<()>;

    /// Delete one extra. Returns `true` (and bumps the version) if the key
    /// existed.
    fn delete_extra(&self, handle: NodeHandle, key: &str) -> StoreResult<bool>;

    /// The full extra map of a record.
    fn extra_map(&self, handle: NodeHandle) -> StoreResult<BTreeMap<String, AttrValue>>;

    // -- metadata ---------------------------------------------------------

    /// Update the record's label, bumping version and mtime.
    fn write_label(&self, handle: NodeHandle, label: &str) -> StoreResult<()>;

    /// Update the record's description, bumping version and mtime.
    fn write_description(&self, handle: NodeHandle, description: &str) -> StoreResult<()>;

    /// Atomically bump the version counter, returning the new value.
    fn increment_version(&self, handle: NodeHandle) -> StoreResult<u64>;

    // -- edges ------------------------------------------------------------

    /// Write one durable edge and return its effective label.
    ///
    /// A `None` label is replaced by the synthetic label
    /// `link_<source handle>`; this is only meaningful when both endpoints
    /// are already durable. Label and source uniqueness are enforced
    /// against the destination's existing input edges.
    fn write_edge(
        &self,
        destination: NodeHandle,
        source: NodeHandle,
        label: Option<&str>,
        link_type: LinkType,
    ) -> StoreResult<String>;

    /// Write a batch of edges onto one destination, all-or-nothing.
    ///
    /// The whole batch is validated against the durable edge set and
    /// against itself before anything is applied; on any failure no edge
    /// from the batch is written.
    fn write_edge_batch(&self, destination: NodeHandle, edges: &[EdgeSpec]) -> StoreResult<()>;

    /// Overwrite (or create) the edge with the given label on the
    /// destination. Source uniqueness is enforced excluding the edge being
    /// replaced.
    fn replace_edge(
        &self,
        destination: NodeHandle,
        source: NodeHandle,
        label: &str,
        link_type: LinkType,
    ) -> StoreResult<()>;

    /// Delete the input edge with the given label. Returns `true` if it
    /// existed.
    fn delete_edge(&self, destination: NodeHandle, label: &str) -> StoreResult<bool>;

    /// List edges touching a record, optionally filtered by link type,
    /// sorted by label (then by the far endpoint's handle).
    fn list_edges(
        &self,
        handle: NodeHandle,
        direction: Direction,
        link_type: Option<LinkType>,
    ) -> StoreResult<Vec<EdgeRecord>>;

    // -- comments ---------------------------------------------------------

    /// Attach a comment to a record, returning it with its sequence number.
    fn add_comment(&self, handle: NodeHandle, content: &str) -> StoreResult<Comment>;

    /// All comments on a record, ordered by sequence number.
    fn list_comments(&self, handle: NodeHandle) -> StoreResult<Vec<Comment>>;
}

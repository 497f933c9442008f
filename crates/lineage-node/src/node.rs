//! The provenance node entity: identity, lifecycle, attributes, extras,
//! and staged files.
//!
//! A `Node` is a cheap, cloneable handle onto shared in-memory state. The
//! pre-store state (attribute cache, staging area, link cache) is owned by
//! that shared state and is not internally synchronized beyond the lock —
//! a pending node belongs to one owner. Durable state lives in the
//! storage collaborator and is reached through the node's handle.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use lineage_repo::StagingArea;
use lineage_store::{Comment, NodeRecord};
use lineage_types::{AttrValue, NodeHandle, NodeUuid};

use crate::backend::Backend;
use crate::builder::NodeBuilder;
use crate::error::{NodeError, NodeResult};
use crate::kind::NodeKind;
use crate::link_cache::LinkCache;

/// Separator reserved for structured attribute keys; plain keys may not
/// contain it.
pub const ATTR_KEY_SEPARATOR: char = '.';

/// Version counter value of a node that has never been mutated post-store.
pub const INITIAL_VERSION: u64 = 1;

/// A provenance-graph node.
///
/// Constructed pending (`to_be_stored`), made durable exactly once by
/// [`store_all`](Node::store_all) or [`store`](Node::store), then
/// read-mostly. Clones share the same underlying state and identity.
#[derive(Clone)]
pub struct Node {
    uuid: NodeUuid,
    backend: Backend,
    inner: Arc<RwLock<NodeInner>>,
}

pub(crate) struct NodeInner {
    pub(crate) kind: Arc<dyn NodeKind>,
    pub(crate) handle: Option<NodeHandle>,
    pub(crate) label: String,
    pub(crate) description: String,
    pub(crate) attrs: BTreeMap<String, AttrValue>,
    pub(crate) staging: Option<StagingArea>,
    pub(crate) links: LinkCache,
}

impl Node {
    /// Construct a new pending node with a freshly assigned identity.
    pub fn new(backend: &Backend, kind: Arc<dyn NodeKind>) -> Self {
        Self {
            uuid: NodeUuid::generate(),
            backend: backend.clone(),
            inner: Arc::new(RwLock::new(NodeInner {
                kind,
                handle: None,
                label: String::new(),
                description: String::new(),
                attrs: BTreeMap::new(),
                staging: None,
                links: LinkCache::default(),
            })),
        }
    }

    /// Start building a pending node with initial metadata and attributes.
    pub fn builder(backend: &Backend, kind: Arc<dyn NodeKind>) -> NodeBuilder {
        NodeBuilder::new(backend, kind)
    }

    /// Load a durable node by identity.
    pub fn load(backend: &Backend, uuid: &NodeUuid) -> NodeResult<Self> {
        let record = backend
            .store()
            .get_record_by_uuid(uuid)?
            .ok_or_else(|| NodeError::NotFound(format!("no record with identity {uuid}")))?;
        Self::from_record(backend, record)
    }

    /// Load a durable node by storage handle.
    pub fn load_by_handle(backend: &Backend, handle: NodeHandle) -> NodeResult<Self> {
        let record = backend
            .store()
            .get_record(handle)?
            .ok_or_else(|| NodeError::NotFound(format!("no record with handle {handle}")))?;
        Self::from_record(backend, record)
    }

    fn from_record(backend: &Backend, record: NodeRecord) -> NodeResult<Self> {
        let kind = backend.kinds().resolve(&record.node_type).ok_or_else(|| {
            NodeError::NotFound(format!(
                "node kind '{}' is not registered",
                record.node_type
            ))
        })?;
        Ok(Self {
            uuid: record.uuid,
            backend: backend.clone(),
            inner: Arc::new(RwLock::new(NodeInner {
                kind,
                handle: Some(record.handle),
                label: String::new(),
                description: String::new(),
                attrs: BTreeMap::new(),
                staging: None,
                links: LinkCache::default(),
            })),
        })
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, NodeInner> {
        self.inner.read().expect("lock poisoned")
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, NodeInner> {
        self.inner.write().expect("lock poisoned")
    }

    // -- identity ---------------------------------------------------------

    /// The process-independent identity, assigned at construction.
    pub fn uuid(&self) -> NodeUuid {
        self.uuid
    }

    /// The storage handle, present only once the node is durable.
    pub fn handle(&self) -> Option<NodeHandle> {
        self.read().handle
    }

    /// Whether the node has been committed to durable storage.
    pub fn is_stored(&self) -> bool {
        self.read().handle.is_some()
    }

    /// The node's kind.
    pub fn kind(&self) -> Arc<dyn NodeKind> {
        Arc::clone(&self.read().kind)
    }

    /// The collaborator bundle this node works against.
    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub(crate) fn stored_handle(&self) -> NodeResult<NodeHandle> {
        self.read().handle.ok_or_else(|| {
            NodeError::ModificationNotAllowed(format!("node {} is not stored yet", self.uuid))
        })
    }

    /// The durable record backing this node.
    pub fn record(&self) -> NodeResult<NodeRecord> {
        let handle = self.stored_handle()?;
        self.backend
            .store()
            .get_record(handle)?
            .ok_or_else(|| NodeError::NotFound(format!("no record with handle {handle}")))
    }

    /// Creation time. Only durable nodes have one.
    pub fn ctime(&self) -> NodeResult<DateTime<Utc>> {
        Ok(self.record()?.ctime)
    }

    /// Last durable mutation time.
    pub fn mtime(&self) -> NodeResult<DateTime<Utc>> {
        Ok(self.record()?.mtime)
    }

    /// The version counter: [`INITIAL_VERSION`] while pending, then bumped
    /// by each post-store mutation.
    pub fn version(&self) -> NodeResult<u64> {
        if self.is_stored() {
            Ok(self.record()?.version)
        } else {
            Ok(INITIAL_VERSION)
        }
    }

    // -- metadata ---------------------------------------------------------

    /// The human-readable label.
    pub fn label(&self) -> NodeResult<String> {
        if self.is_stored() {
            Ok(self.record()?.label)
        } else {
            Ok(self.read().label.clone())
        }
    }

    /// Set the label; writes straight to storage once durable.
    pub fn set_label(&self, label: &str) -> NodeResult<()> {
        match self.handle() {
            Some(handle) => Ok(self.backend.store().write_label(handle, label)?),
            None => {
                self.write().label = label.to_string();
                Ok(())
            }
        }
    }

    /// The human-readable description.
    pub fn description(&self) -> NodeResult<String> {
        if self.is_stored() {
            Ok(self.record()?.description)
        } else {
            Ok(self.read().description.clone())
        }
    }

    /// Set the description; writes straight to storage once durable.
    pub fn set_description(&self, description: &str) -> NodeResult<()> {
        match self.handle() {
            Some(handle) => Ok(self.backend.store().write_description(handle, description)?),
            None => {
                self.write().description = description.to_string();
                Ok(())
            }
        }
    }

    // -- attributes -------------------------------------------------------

    /// Read an attribute, from the cache while pending and from storage
    /// once durable.
    pub fn get_attr(&self, key: &str) -> NodeResult<AttrValue> {
        match self.handle() {
            Some(handle) => self
                .backend
                .store()
                .read_attr(handle, key)?
                .ok_or_else(|| NodeError::NotFound(format!("attribute '{key}' not found"))),
            None => self
                .read()
                .attrs
                .get(key)
                .cloned()
                .ok_or_else(|| NodeError::NotFound(format!("attribute '{key}' not found"))),
        }
    }

    /// Read an attribute, or `default` if absent.
    pub fn get_attr_or(&self, key: &str, default: AttrValue) -> NodeResult<AttrValue> {
        match self.get_attr(key) {
            Ok(value) => Ok(value),
            Err(NodeError::NotFound(_)) => Ok(default),
            Err(err) => Err(err),
        }
    }

    /// Write an attribute.
    ///
    /// Once durable only keys in the kind's allow-list may be written, and
    /// the write bumps the version in the same storage transaction.
    pub fn set_attr(&self, key: &str, value: AttrValue) -> NodeResult<()> {
        validate_key(key)?;
        match self.handle() {
            Some(handle) => {
                self.check_attr_updatable(key)?;
                Ok(self.backend.store().write_attr(handle, key, value)?)
            }
            None => {
                self.write().attrs.insert(key.to_string(), value);
                Ok(())
            }
        }
    }

    /// Delete an attribute; `NotFound` if absent, and the same allow-list
    /// rule as [`set_attr`](Node::set_attr) once durable.
    pub fn del_attr(&self, key: &str) -> NodeResult<()> {
        validate_key(key)?;
        match self.handle() {
            Some(handle) => {
                self.check_attr_updatable(key)?;
                if self.backend.store().delete_attr(handle, key)? {
                    Ok(())
                } else {
                    Err(NodeError::NotFound(format!("attribute '{key}' not found")))
                }
            }
            None => {
                if self.write().attrs.remove(key).is_some() {
                    Ok(())
                } else {
                    Err(NodeError::NotFound(format!("attribute '{key}' not found")))
                }
            }
        }
    }

    /// Delete every attribute. Allowed only while pending.
    pub fn del_all_attrs(&self) -> NodeResult<()> {
        if self.is_stored() {
            return Err(NodeError::ModificationNotAllowed(
                "cannot clear attributes of a stored node".to_string(),
            ));
        }
        self.write().attrs.clear();
        Ok(())
    }

    /// All attribute keys, sorted.
    pub fn attr_keys(&self) -> NodeResult<Vec<String>> {
        Ok(self.get_attrs()?.into_keys().collect())
    }

    /// The full attribute map.
    pub fn get_attrs(&self) -> NodeResult<BTreeMap<String, AttrValue>> {
        match self.handle() {
            Some(handle) => Ok(self.backend.store().attr_map(handle)?),
            None => Ok(self.read().attrs.clone()),
        }
    }

    fn check_attr_updatable(&self, key: &str) -> NodeResult<()> {
        if self.read().kind.updatable_attrs().iter().any(|k| *k == key) {
            Ok(())
        } else {
            Err(NodeError::ModificationNotAllowed(format!(
                "attribute '{key}' cannot be changed after the node is stored"
            )))
        }
    }

    // -- extras -----------------------------------------------------------

    /// Write an extra, straight to storage. Meaningful only once durable.
    pub fn set_extra(&self, key: &str, value: AttrValue) -> NodeResult<()> {
        validate_key(key)?;
        let handle = self.extras_handle()?;
        Ok(self.backend.store().write_extra(handle, key, value, false)?)
    }

    /// Write an extra, failing with `Uniqueness` if the key already exists.
    /// Useful to "lock" a node against repeated processing.
    pub fn set_extra_exclusive(&self, key: &str, value: AttrValue) -> NodeResult<()> {
        validate_key(key)?;
        let handle = self.extras_handle()?;
        Ok(self.backend.store().write_extra(handle, key, value, true)?)
    }

    /// Write several extras.
    pub fn set_extras(&self, extras: &BTreeMap<String, AttrValue>) -> NodeResult<()> {
        for (key, value) in extras {
            self.set_extra(key, value.clone())?;
        }
        Ok(())
    }

    /// Read an extra; `NotFound` if absent.
    pub fn get_extra(&self, key: &str) -> NodeResult<AttrValue> {
        let handle = self.extras_handle()?;
        self.backend
            .store()
            .read_extra(handle, key)?
            .ok_or_else(|| NodeError::NotFound(format!("extra '{key}' not found")))
    }

    /// Read an extra, or `default` if absent.
    pub fn get_extra_or(&self, key: &str, default: AttrValue) -> NodeResult<AttrValue> {
        match self.get_extra(key) {
            Ok(value) => Ok(value),
            Err(NodeError::NotFound(_)) => Ok(default),
            Err(err) => Err(err),
        }
    }

    /// Delete an extra; `NotFound` if absent.
    pub fn del_extra(&self, key: &str) -> NodeResult<()> {
        let handle = self.extras_handle()?;
        if self.backend.store().delete_extra(handle, key)? {
            Ok(())
        } else {
            Err(NodeError::NotFound(format!("extra '{key}' not found")))
        }
    }

    /// All extra keys, sorted.
    pub fn extra_keys(&self) -> NodeResult<Vec<String>> {
        Ok(self.get_extras()?.into_keys().collect())
    }

    /// The full extra map.
    pub fn get_extras(&self) -> NodeResult<BTreeMap<String, AttrValue>> {
        let handle = self.extras_handle()?;
        Ok(self.backend.store().extra_map(handle)?)
    }

    fn extras_handle(&self) -> NodeResult<NodeHandle> {
        self.read().handle.ok_or_else(|| {
            NodeError::ModificationNotAllowed(
                "extras can be used only after the node is stored".to_string(),
            )
        })
    }

    // -- files ------------------------------------------------------------

    /// Stage a file or directory from an absolute path at `rel_dst`,
    /// creating intermediate directories. Allowed only while pending.
    pub fn add_path(&self, abs_src: &Path, rel_dst: &Path) -> NodeResult<()> {
        if self.is_stored() {
            return Err(NodeError::ModificationNotAllowed(
                "cannot insert a path after storing the node".to_string(),
            ));
        }
        if !abs_src.is_absolute() {
            return Err(NodeError::InvalidArgument(format!(
                "source path '{}' must be absolute",
                abs_src.display()
            )));
        }
        if rel_dst.is_absolute() {
            return Err(NodeError::InvalidArgument(format!(
                "destination path '{}' must be relative",
                rel_dst.display()
            )));
        }
        let mut inner = self.write();
        if inner.staging.is_none() {
            inner.staging = Some(StagingArea::new()?);
        }
        if let Some(staging) = inner.staging.as_ref() {
            staging.insert(abs_src, rel_dst)?;
        }
        Ok(())
    }

    /// Remove a staged file or directory. Allowed only while pending.
    pub fn remove_path(&self, rel: &Path) -> NodeResult<()> {
        if self.is_stored() {
            return Err(NodeError::ModificationNotAllowed(
                "cannot delete a path after storing the node".to_string(),
            ));
        }
        if rel.is_absolute() {
            return Err(NodeError::InvalidArgument(format!(
                "path '{}' must be relative",
                rel.display()
            )));
        }
        let inner = self.read();
        match inner.staging.as_ref() {
            Some(staging) => Ok(staging.remove(rel)?),
            None => Err(NodeError::NotFound(format!(
                "path '{}' not found in the staging area",
                rel.display()
            ))),
        }
    }

    /// Relative paths of the node's files: the staging tree while pending,
    /// the permanent area once durable.
    pub fn list_files(&self) -> NodeResult<Vec<std::path::PathBuf>> {
        if self.is_stored() {
            let tree = self.backend.repository().file_tree(&self.uuid)?;
            Ok(tree.list(Path::new(""))?)
        } else {
            match self.read().staging.as_ref() {
                Some(staging) => Ok(staging.list()?),
                None => Ok(Vec::new()),
            }
        }
    }

    // -- comments ---------------------------------------------------------

    /// Attach a comment. Meaningful only once durable.
    pub fn add_comment(&self, content: &str) -> NodeResult<Comment> {
        let handle = self.stored_handle()?;
        Ok(self.backend.store().add_comment(handle, content)?)
    }

    /// All comments, in sequence order.
    pub fn get_comments(&self) -> NodeResult<Vec<Comment>> {
        let handle = self.stored_handle()?;
        Ok(self.backend.store().list_comments(handle)?)
    }

    // -- validation / copy ------------------------------------------------

    /// Run the kind's validation hook against the node's current state.
    ///
    /// Callers are expected to run this before storing; the commit protocol
    /// itself does not.
    pub fn validate(&self) -> NodeResult<()> {
        self.kind().validate(self)
    }

    /// A new pending node with a fresh identity and this node's kind,
    /// metadata, attributes, and files — but no extras and no links.
    pub fn copy(&self) -> NodeResult<Node> {
        let copy = Node::new(&self.backend, self.kind());
        {
            let mut inner = copy.write();
            inner.attrs = self.get_attrs()?;
            inner.label = self.label()?;
            inner.description = self.description()?;
        }
        let source_root = if self.is_stored() {
            Some(self.backend.repository().file_tree(&self.uuid)?.root().to_path_buf())
        } else {
            self.read().staging.as_ref().map(|s| s.payload())
        };
        if let Some(root) = source_root {
            let staging = StagingArea::new()?;
            staging.import_tree(&root)?;
            copy.write().staging = Some(staging);
        }
        debug!(from = %self.uuid.short_id(), to = %copy.uuid.short_id(), "copied node");
        Ok(copy)
    }
}

fn validate_key(key: &str) -> NodeResult<()> {
    if key.is_empty() {
        return Err(NodeError::Validation("key must not be empty".to_string()));
    }
    if key.contains(ATTR_KEY_SEPARATOR) {
        return Err(NodeError::Validation(format!(
            "key '{key}' contains the reserved separator '{ATTR_KEY_SEPARATOR}'"
        )));
    }
    Ok(())
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for Node {}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.handle() {
            Some(handle) => write!(f, "uuid: {} (pk: {handle})", self.uuid),
            None => write!(f, "uuid: {} (unstored)", self.uuid),
        }
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("uuid", &self.uuid)
            .field("handle", &self.handle())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::{BaseKind, NodeKind};
    use serde_json::json;
    use std::fs;

    struct UpdatableKind;

    impl NodeKind for UpdatableKind {
        fn type_string(&self) -> &'static str {
            "updatable"
        }

        fn updatable_attrs(&self) -> &'static [&'static str] {
            &["state"]
        }
    }

    fn pending_node() -> Node {
        let backend = Backend::ephemeral().unwrap();
        Node::new(&backend, Arc::new(BaseKind))
    }

    #[test]
    fn fresh_node_is_pending_with_identity() {
        let node = pending_node();
        assert!(!node.is_stored());
        assert!(node.handle().is_none());
        assert_eq!(node.version().unwrap(), INITIAL_VERSION);
    }

    #[test]
    fn clones_share_identity_and_state() {
        let node = pending_node();
        let other = node.clone();
        node.set_attr("shared", json!(true)).unwrap();
        assert_eq!(other.get_attr("shared").unwrap(), json!(true));
        assert_eq!(node, other);
    }

    #[test]
    fn attr_cache_round_trip_before_store() {
        let node = pending_node();
        node.set_attr("energy", json!(-13.6)).unwrap();
        assert_eq!(node.get_attr("energy").unwrap(), json!(-13.6));
        node.del_attr("energy").unwrap();
        assert!(matches!(
            node.get_attr("energy"),
            Err(NodeError::NotFound(_))
        ));
    }

    #[test]
    fn get_attr_or_falls_back_to_default() {
        let node = pending_node();
        assert_eq!(
            node.get_attr_or("missing", json!("fallback")).unwrap(),
            json!("fallback")
        );
    }

    #[test]
    fn separator_in_key_is_rejected() {
        let node = pending_node();
        let err = node.set_attr("nested.key", json!(1)).unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
        let err = node.set_attr("", json!(1)).unwrap_err();
        assert!(matches!(err, NodeError::Validation(_)));
    }

    #[test]
    fn stored_node_rejects_non_updatable_attrs() {
        let node = pending_node();
        node.set_attr("fixed", json!(1)).unwrap();
        node.store_all().unwrap();
        let err = node.set_attr("fixed", json!(2)).unwrap_err();
        assert!(matches!(err, NodeError::ModificationNotAllowed(_)));
        // Reads still come through, now from storage.
        assert_eq!(node.get_attr("fixed").unwrap(), json!(1));
    }

    #[test]
    fn allow_listed_attr_stays_writable_and_bumps_version() {
        let backend = Backend::ephemeral().unwrap();
        backend.kinds().register(Arc::new(UpdatableKind)).unwrap();
        let node = Node::new(&backend, Arc::new(UpdatableKind));
        node.store_all().unwrap();

        let before = node.version().unwrap();
        node.set_attr("state", json!("running")).unwrap();
        assert_eq!(node.get_attr("state").unwrap(), json!("running"));
        assert_eq!(node.version().unwrap(), before + 1);

        node.del_attr("state").unwrap();
        assert_eq!(node.version().unwrap(), before + 2);
    }

    #[test]
    fn del_all_attrs_only_while_pending() {
        let node = pending_node();
        node.set_attr("a", json!(1)).unwrap();
        node.set_attr("b", json!(2)).unwrap();
        node.del_all_attrs().unwrap();
        assert!(node.attr_keys().unwrap().is_empty());

        node.store_all().unwrap();
        assert!(matches!(
            node.del_all_attrs(),
            Err(NodeError::ModificationNotAllowed(_))
        ));
    }

    #[test]
    fn extras_are_post_store_only() {
        let node = pending_node();
        assert!(matches!(
            node.set_extra("tag", json!("x")),
            Err(NodeError::ModificationNotAllowed(_))
        ));

        node.store_all().unwrap();
        node.set_extra("tag", json!("x")).unwrap();
        assert_eq!(node.get_extra("tag").unwrap(), json!("x"));
        assert_eq!(node.extra_keys().unwrap(), vec!["tag"]);
        node.del_extra("tag").unwrap();
        assert!(matches!(node.get_extra("tag"), Err(NodeError::NotFound(_))));
    }

    #[test]
    fn exclusive_extra_locks_the_key() {
        let node = pending_node();
        node.store_all().unwrap();
        node.set_extra_exclusive("lock", json!(1)).unwrap();
        let err = node.set_extra_exclusive("lock", json!(2)).unwrap_err();
        assert!(matches!(err, NodeError::Uniqueness(_)));
    }

    #[test]
    fn extras_are_distinct_from_attributes() {
        let node = pending_node();
        node.set_attr("name", json!("attr")).unwrap();
        node.store_all().unwrap();
        node.set_extra("name", json!("extra")).unwrap();
        assert_eq!(node.get_attr("name").unwrap(), json!("attr"));
        assert_eq!(node.get_extra("name").unwrap(), json!("extra"));
    }

    #[test]
    fn add_path_validates_shapes() {
        let node = pending_node();
        let err = node
            .add_path(Path::new("relative/src"), Path::new("dst"))
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidArgument(_)));

        let src = tempfile::NamedTempFile::new().unwrap();
        let err = node
            .add_path(src.path(), Path::new("/absolute/dst"))
            .unwrap_err();
        assert!(matches!(err, NodeError::InvalidArgument(_)));
    }

    #[test]
    fn staged_files_are_listed_and_removable() {
        let node = pending_node();
        assert!(node.list_files().unwrap().is_empty());

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("data.txt");
        fs::write(&file, b"contents").unwrap();

        node.add_path(&file, Path::new("inputs/data.txt")).unwrap();
        assert_eq!(
            node.list_files().unwrap(),
            vec![std::path::PathBuf::from("inputs/data.txt")]
        );

        node.remove_path(Path::new("inputs")).unwrap();
        assert!(node.list_files().unwrap().is_empty());
    }

    #[test]
    fn path_mutation_is_rejected_after_store() {
        let node = pending_node();
        node.store_all().unwrap();
        let src = tempfile::NamedTempFile::new().unwrap();
        assert!(matches!(
            node.add_path(src.path(), Path::new("late.txt")),
            Err(NodeError::ModificationNotAllowed(_))
        ));
        assert!(matches!(
            node.remove_path(Path::new("anything")),
            Err(NodeError::ModificationNotAllowed(_))
        ));
    }

    #[test]
    fn metadata_is_mutable_before_and_after_store() {
        let node = pending_node();
        node.set_label("draft").unwrap();
        assert_eq!(node.label().unwrap(), "draft");

        node.store_all().unwrap();
        node.set_label("final").unwrap();
        node.set_description("relaxed structure").unwrap();
        assert_eq!(node.label().unwrap(), "final");
        assert_eq!(node.description().unwrap(), "relaxed structure");
    }

    #[test]
    fn comments_require_a_stored_node() {
        let node = pending_node();
        assert!(matches!(
            node.add_comment("too early"),
            Err(NodeError::ModificationNotAllowed(_))
        ));
        node.store_all().unwrap();
        node.add_comment("first").unwrap();
        node.add_comment("second").unwrap();
        let comments = node.get_comments().unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].content, "first");
    }

    #[test]
    fn copy_gets_fresh_identity_without_extras() {
        let backend = Backend::ephemeral().unwrap();
        let node = Node::new(&backend, Arc::new(BaseKind));
        node.set_attr("kept", json!(42)).unwrap();
        node.set_label("original").unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("f.txt");
        fs::write(&file, b"bytes").unwrap();
        node.add_path(&file, Path::new("f.txt")).unwrap();

        node.store_all().unwrap();
        node.set_extra("not-copied", json!(true)).unwrap();

        let copy = node.copy().unwrap();
        assert_ne!(copy.uuid(), node.uuid());
        assert!(!copy.is_stored());
        assert_eq!(copy.get_attr("kept").unwrap(), json!(42));
        assert_eq!(copy.label().unwrap(), "original");
        assert_eq!(
            copy.list_files().unwrap(),
            vec![std::path::PathBuf::from("f.txt")]
        );
        copy.store_all().unwrap();
        assert!(copy.get_extras().unwrap().is_empty());
    }

    #[test]
    fn display_shows_lifecycle() {
        let node = pending_node();
        assert!(format!("{node}").contains("(unstored)"));
        node.store_all().unwrap();
        assert!(format!("{node}").contains("(pk: "));
    }

    #[test]
    fn load_round_trips_through_the_registry() {
        let backend = Backend::ephemeral().unwrap();
        let node = Node::new(&backend, Arc::new(BaseKind));
        node.set_attr("a", json!(1)).unwrap();
        node.store_all().unwrap();

        let loaded = Node::load(&backend, &node.uuid()).unwrap();
        assert_eq!(loaded, node);
        assert_eq!(loaded.handle(), node.handle());
        assert_eq!(loaded.get_attr("a").unwrap(), json!(1));
        assert_eq!(loaded.kind().type_string(), "node");

        let by_handle =
            Node::load_by_handle(&backend, node.handle().unwrap()).unwrap();
        assert_eq!(by_handle, node);
    }

    #[test]
    fn load_unknown_identity_fails() {
        let backend = Backend::ephemeral().unwrap();
        assert!(matches!(
            Node::load(&backend, &NodeUuid::generate()),
            Err(NodeError::NotFound(_))
        ));
    }
}

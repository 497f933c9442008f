//! Record storage boundary for the lineage provenance graph.
//!
//! The node entity model consumes durable storage as an opaque transactional
//! record store, defined here by the [`RecordStore`] trait. Records hold a
//! node's identity, metadata, attributes, and extras; edges are typed,
//! labeled input links between records. [`InMemoryRecordStore`] is the
//! reference backend for tests, local demos, and embedding.

pub mod error;
pub mod memory;
pub mod record;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryRecordStore;
pub use record::{Comment, Direction, EdgeRecord, EdgeSpec, NodeRecord, RecordDraft};
pub use traits::RecordStore;

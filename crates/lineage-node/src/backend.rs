//! Collaborator bundle injected into every node.

use std::sync::Arc;

use lineage_repo::Repository;
use lineage_store::{InMemoryRecordStore, RecordStore};

use crate::error::NodeResult;
use crate::kind::KindRegistry;

/// The storage and filesystem collaborators a node works against, plus the
/// kind registry used to re-hydrate durable records.
///
/// Cloning a `Backend` is cheap and yields handles onto the same
/// collaborators.
#[derive(Clone)]
pub struct Backend {
    store: Arc<dyn RecordStore>,
    repository: Arc<Repository>,
    kinds: Arc<KindRegistry>,
}

impl Backend {
    /// Bundle explicit collaborators.
    pub fn new(
        store: Arc<dyn RecordStore>,
        repository: Arc<Repository>,
        kinds: Arc<KindRegistry>,
    ) -> Self {
        Self {
            store,
            repository,
            kinds,
        }
    }

    /// A fully in-memory / temp-dir backend with the default kind registry,
    /// for tests and demos.
    pub fn ephemeral() -> NodeResult<Self> {
        Ok(Self::new(
            Arc::new(InMemoryRecordStore::new()),
            Arc::new(Repository::ephemeral()?),
            Arc::new(KindRegistry::default()),
        ))
    }

    /// The record store.
    pub fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// The file repository.
    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    /// The kind registry.
    pub fn kinds(&self) -> &KindRegistry {
        &self.kinds
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Backend")
            .field("repository", &self.repository)
            .field("kinds", &self.kinds)
            .finish()
    }
}

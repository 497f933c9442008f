//! File repository boundary for the lineage provenance graph.
//!
//! Before a node is durable its files live in a [`StagingArea`], a scoped
//! temporary directory that is released when the node is dropped or stored.
//! On commit the staging payload is moved into the node's permanent area
//! inside a [`Repository`], after which the files are reachable read-only
//! through a [`FileTree`].

pub mod error;
pub mod repository;
pub mod staging;

pub use error::{RepoError, RepoResult};
pub use repository::{FileTree, Repository, RepositoryConfig};
pub use staging::StagingArea;

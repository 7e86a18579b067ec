pub mod memory;
pub mod model;

pub use memory::InMemoryGraph;
pub use model::{Edge, Link};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum GraphError {
    #[error("not found")]
    NotFound,

    #[error("unknown source or destination link")]
    UnknownEndpoints,

    #[error("graph store: {0}")]
    Store(String),
}

/// Stream of links yielded by a range query. Dropping the stream releases it.
pub type LinkStream = BoxStream<'static, Result<Link, GraphError>>;

/// Stream of edges yielded by a range query.
pub type EdgeStream = BoxStream<'static, Result<Edge, GraphError>>;

/// The link-graph storage contract.
///
/// Implementations must be safe under concurrent calls from pipeline
/// workers. Upserts take the record by value and return the stored snapshot
/// so callers observe the assigned identifier and timestamps.
#[async_trait]
pub trait Graph: Send + Sync {
    /// Create a link or update an existing one. On URL collision the
    /// existing identifier wins and the greater retrieved-at is kept.
    async fn upsert_link(&self, link: Link) -> Result<Link, GraphError>;

    /// Create the `(src, dst)` edge or refresh its updated-at timestamp.
    /// Fails with `UnknownEndpoints` if either endpoint link is absent.
    async fn upsert_edge(&self, edge: Edge) -> Result<Edge, GraphError>;

    /// Delete every edge originating from `from` whose updated-at predates
    /// `updated_before`.
    async fn remove_stale_edges(
        &self,
        from: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<(), GraphError>;

    async fn find_link(&self, id: Uuid) -> Result<Link, GraphError>;

    /// All links with `id ∈ [from, to]` retrieved before `retrieved_before`
    /// (never-retrieved links always qualify).
    async fn links(
        &self,
        from: Uuid,
        to: Uuid,
        retrieved_before: DateTime<Utc>,
    ) -> Result<LinkStream, GraphError>;

    /// All edges whose source link id is in `[from, to]` and whose
    /// updated-at predates `updated_before`.
    async fn edges(
        &self,
        from: Uuid,
        to: Uuid,
        updated_before: DateTime<Utc>,
    ) -> Result<EdgeStream, GraphError>;
}

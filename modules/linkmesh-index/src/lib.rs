pub mod memory;

pub use memory::InMemoryIndex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IndexError {
    #[error("document not found")]
    NotFound,

    #[error("index store: {0}")]
    Store(String),
}

/// A crawled page as submitted to the full-text index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub link_id: Uuid,
    pub url: String,
    pub title: String,
    pub content: String,
    pub indexed_at: DateTime<Utc>,
}

/// The text-index storage contract. Implementations must be safe under
/// concurrent calls from pipeline workers.
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Index a document. Idempotent on `link_id`: a later call overwrites
    /// the earlier document for the same link.
    async fn index(&self, doc: Document) -> Result<(), IndexError>;
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A URL node in the link graph.
///
/// Identity is the id; the URL is a secondary unique key enforced by the
/// store. A nil id on upsert asks the store to assign one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub id: Uuid,
    pub url: String,
    /// When the page was last fetched. `None` means never retrieved.
    pub retrieved_at: Option<DateTime<Utc>>,
}

impl Link {
    /// A not-yet-retrieved link awaiting id assignment by the store.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: Uuid::nil(),
            url: url.into(),
            retrieved_at: None,
        }
    }
}

/// A directed "page X links to page Y" record, unique by `(src, dst)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: Uuid,
    pub src: Uuid,
    pub dst: Uuid,
    pub updated_at: DateTime<Utc>,
}

impl Edge {
    /// A fresh edge awaiting id and timestamp assignment by the store.
    pub fn new(src: Uuid, dst: Uuid) -> Self {
        Self {
            id: Uuid::nil(),
            src,
            dst,
            updated_at: Utc::now(),
        }
    }
}

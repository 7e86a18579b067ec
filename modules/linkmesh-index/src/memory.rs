use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use uuid::Uuid;

use crate::{Document, IndexError, Indexer};

/// In-memory document index keyed by link id, with a naive all-terms text
/// search. Enough for tests and single-node deployments.
#[derive(Default)]
pub struct InMemoryIndex {
    docs: RwLock<HashMap<Uuid, Document>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find_by_id(&self, link_id: Uuid) -> Result<Document, IndexError> {
        let docs = self.docs.read().expect("index lock poisoned");
        docs.get(&link_id).cloned().ok_or(IndexError::NotFound)
    }

    /// Documents whose title or content contains every query term
    /// (case-insensitive), most recently indexed first.
    pub fn search(&self, query: &str) -> Vec<Document> {
        let terms: Vec<String> = query
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        if terms.is_empty() {
            return Vec::new();
        }

        let docs = self.docs.read().expect("index lock poisoned");
        let mut matches: Vec<Document> = docs
            .values()
            .filter(|doc| {
                let haystack = format!("{} {}", doc.title, doc.content).to_lowercase();
                terms.iter().all(|term| haystack.contains(term))
            })
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.indexed_at.cmp(&a.indexed_at));
        matches
    }

    pub fn len(&self) -> usize {
        self.docs.read().expect("index lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Indexer for InMemoryIndex {
    async fn index(&self, doc: Document) -> Result<(), IndexError> {
        let mut docs = self.docs.write().expect("index lock poisoned");
        docs.insert(doc.link_id, doc);
        Ok(())
    }
}

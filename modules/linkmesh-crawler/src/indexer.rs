use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use linkmesh_index::{Document, Indexer};
use linkmesh_pipeline::{Processor, Verdict};

use crate::payload::CrawlPayload;

/// Text-index stage: submits the extracted title and content for the
/// crawled page to the full-text index.
pub struct TextIndexer {
    indexer: Arc<dyn Indexer>,
}

impl TextIndexer {
    pub fn new(indexer: Arc<dyn Indexer>) -> Self {
        Self { indexer }
    }
}

#[async_trait]
impl Processor<CrawlPayload> for TextIndexer {
    async fn process(&self, payload: &mut CrawlPayload) -> Result<Verdict> {
        self.indexer
            .index(Document {
                link_id: payload.link_id,
                url: payload.url.clone(),
                title: payload.title.clone(),
                content: payload.text_content.clone(),
                indexed_at: Utc::now(),
            })
            .await?;

        Ok(Verdict::Forward)
    }
}

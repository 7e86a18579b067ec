use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use linkmesh_graph::{Edge, Graph, Link};
use linkmesh_pipeline::{Processor, Verdict};
use tracing::trace;

use crate::payload::CrawlPayload;

/// Graph-update stage. After a successful pass for source link `S`, the
/// edges originating at `S` are exactly the follow-links observed on this
/// crawl: fresh edges are upserted (bumping their updated-at), and a sweep
/// removes every edge older than the moment this crawl of `S` began.
pub struct GraphUpdater {
    graph: Arc<dyn Graph>,
}

impl GraphUpdater {
    pub fn new(graph: Arc<dyn Graph>) -> Self {
        Self { graph }
    }
}

#[async_trait]
impl Processor<CrawlPayload> for GraphUpdater {
    async fn process(&self, payload: &mut CrawlPayload) -> Result<Verdict> {
        // Captured before any write: everything upserted below carries a
        // timestamp at or after this instant and survives the sweep.
        let crawl_started = Utc::now();

        trace!(url = %payload.url, "upserting source link");
        let src = self
            .graph
            .upsert_link(Link {
                id: payload.link_id,
                url: payload.url.clone(),
                retrieved_at: Some(crawl_started),
            })
            .await?;

        // No-follow links become nodes but never edges.
        for url in &payload.no_follow_links {
            self.graph.upsert_link(Link::new(url.clone())).await?;
        }

        for url in &payload.links {
            trace!(url = %url, "upserting follow link");
            let dst = self.graph.upsert_link(Link::new(url.clone())).await?;
            self.graph.upsert_edge(Edge::new(src.id, dst.id)).await?;
        }

        // Edges not refreshed above are leftovers from an earlier crawl of
        // this page and no longer exist on it.
        self.graph.remove_stale_edges(src.id, crawl_started).await?;

        Ok(Verdict::Forward)
    }
}

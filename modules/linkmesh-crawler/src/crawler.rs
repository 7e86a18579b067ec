use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use futures::StreamExt;
use linkmesh_graph::{Graph, LinkStream};
use linkmesh_index::Indexer;
use linkmesh_pipeline::{
    Broadcast, Fifo, FixedWorkerPool, Pipeline, PipelineErrors, Processor, Sink, Source,
    StageRunner,
};
use tokio_util::sync::CancellationToken;

use crate::extractor::LinkExtractor;
use crate::fetcher::{LinkFetcher, UrlGetter};
use crate::indexer::TextIndexer;
use crate::payload::{CrawlPayload, PayloadPool};
use crate::privnet::PrivateNetworkDetector;
use crate::text::TextExtractor;
use crate::updater::GraphUpdater;

pub struct CrawlerConfig {
    pub url_getter: Arc<dyn UrlGetter>,
    pub private_network_detector: Arc<dyn PrivateNetworkDetector>,
    pub graph: Arc<dyn Graph>,
    pub indexer: Arc<dyn Indexer>,
    pub fetch_workers: usize,
}

/// The assembled crawl pipeline: fetch (worker pool) → link extract → text
/// extract → broadcast(graph update, text index).
pub struct Crawler {
    pipeline: Pipeline<CrawlPayload>,
    pool: Arc<PayloadPool>,
    branch_factor: usize,
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> Self {
        let pool = PayloadPool::new();

        // The updater and indexer run on independent clones of each
        // payload; both branches drain to the sink.
        let branches: Vec<Arc<dyn Processor<CrawlPayload>>> = vec![
            Arc::new(GraphUpdater::new(Arc::clone(&config.graph))),
            Arc::new(TextIndexer::new(Arc::clone(&config.indexer))),
        ];
        let branch_factor = branches.len();

        let stages: Vec<Arc<dyn StageRunner<CrawlPayload>>> = vec![
            Arc::new(FixedWorkerPool::new(
                LinkFetcher::new(
                    Arc::clone(&config.url_getter),
                    Arc::clone(&config.private_network_detector),
                ),
                config.fetch_workers,
            )),
            Arc::new(Fifo::new(LinkExtractor::new(Arc::clone(
                &config.private_network_detector,
            )))),
            Arc::new(Fifo::new(TextExtractor::new())),
            Arc::new(Broadcast::new(branches)),
        ];

        Self {
            pipeline: Pipeline::new(stages),
            pool,
            branch_factor,
        }
    }

    /// Crawl every link the stream yields. Returns how many links made it
    /// through the whole pipeline on this pass.
    pub async fn crawl(
        &self,
        cancel: &CancellationToken,
        links: LinkStream,
    ) -> Result<usize, PipelineErrors> {
        let consumed = Arc::new(AtomicUsize::new(0));

        let source = LinkSource {
            links,
            pool: Arc::clone(&self.pool),
        };
        let sink = CountingSink {
            consumed: Arc::clone(&consumed),
        };

        self.pipeline.process(cancel, source, sink).await?;

        // The broadcast lands every surviving payload in the sink once per
        // branch, so divide by the arity recorded at assembly time.
        Ok(consumed.load(Ordering::SeqCst) / self.branch_factor)
    }
}

/// Adapts a graph link stream into a pipeline source, drawing payloads from
/// the pool.
struct LinkSource {
    links: LinkStream,
    pool: Arc<PayloadPool>,
}

#[async_trait]
impl Source<CrawlPayload> for LinkSource {
    async fn next(&mut self) -> Option<Result<CrawlPayload>> {
        match self.links.next().await? {
            Err(error) => Some(Err(error.into())),
            Ok(link) => {
                let mut payload = self.pool.acquire();
                payload.link_id = link.id;
                payload.url = link.url;
                payload.retrieved_at = link.retrieved_at;
                Some(Ok(payload))
            }
        }
    }
}

/// Counts sink consumptions across both broadcast branches.
struct CountingSink {
    consumed: Arc<AtomicUsize>,
}

#[async_trait]
impl Sink<CrawlPayload> for CountingSink {
    async fn consume(&mut self, _payload: &CrawlPayload) -> Result<()> {
        self.consumed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

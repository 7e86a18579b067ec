use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use linkmesh_common::{Clock, WallClock};
use linkmesh_crawler::{
    Crawler, CrawlerConfig, DnsDetector, HttpGetter, PrivateNetworkDetector, UrlGetter,
};
use linkmesh_graph::Graph;
use linkmesh_index::Indexer;
use linkmesh_partition::{PartitionDetector, PartitionError, Range};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct CrawlServiceConfig {
    pub graph: Arc<dyn Graph>,
    pub indexer: Arc<dyn Indexer>,
    pub partition_detector: Arc<dyn PartitionDetector>,

    /// Defaults to the reqwest-backed getter when not provided.
    pub url_getter: Option<Arc<dyn UrlGetter>>,
    /// Defaults to the DNS-resolving detector when not provided.
    pub private_network_detector: Option<Arc<dyn PrivateNetworkDetector>>,
    /// Defaults to the wall clock when not provided.
    pub clock: Option<Arc<dyn Clock>>,

    pub fetch_workers: usize,
    /// How often a crawl pass runs.
    pub update_interval: Duration,
    /// Links retrieved within this window are not re-crawled.
    pub reindex_threshold: Duration,
}

impl CrawlServiceConfig {
    fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.fetch_workers == 0 {
            problems.push("fetch workers must be positive");
        }
        if self.update_interval.is_zero() {
            problems.push("update interval must be positive");
        }
        if self.reindex_threshold.is_zero() {
            problems.push("re-index threshold must be positive");
        }

        if problems.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("crawler service config: {}", problems.join("; "))
        }
    }
}

/// Partition-aware crawl scheduler. Each pass asks the partition detector
/// where this instance sits in the cluster, computes the UUID sub-range it
/// owns, and crawls the links in that shard that are due for a revisit.
pub struct CrawlService {
    graph: Arc<dyn Graph>,
    partition_detector: Arc<dyn PartitionDetector>,
    clock: Arc<dyn Clock>,
    crawler: Crawler,
    update_interval: Duration,
    reindex_threshold: Duration,
}

impl std::fmt::Debug for CrawlService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlService")
            .field("update_interval", &self.update_interval)
            .field("reindex_threshold", &self.reindex_threshold)
            .finish()
    }
}

impl CrawlService {
    pub fn new(config: CrawlServiceConfig) -> Result<Self> {
        config.validate()?;

        let crawler = Crawler::new(CrawlerConfig {
            url_getter: config
                .url_getter
                .clone()
                .unwrap_or_else(|| Arc::new(HttpGetter::new())),
            private_network_detector: config
                .private_network_detector
                .clone()
                .unwrap_or_else(|| Arc::new(DnsDetector)),
            graph: Arc::clone(&config.graph),
            indexer: Arc::clone(&config.indexer),
            fetch_workers: config.fetch_workers,
        });

        Ok(Self {
            graph: config.graph,
            partition_detector: config.partition_detector,
            clock: config.clock.unwrap_or_else(|| Arc::new(WallClock)),
            crawler,
            update_interval: config.update_interval,
            reindex_threshold: config.reindex_threshold,
        })
    }

    /// Run crawl passes until cancelled.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        info!(
            update_interval_secs = self.update_interval.as_secs(),
            "crawler service starting"
        );

        loop {
            if cancel.is_cancelled() {
                return Ok(());
            }
            self.run_pass(cancel).await?;

            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                _ = self.clock.sleep(self.update_interval) => {}
            }
        }
    }

    /// One partition-aware crawl pass. Pipeline errors are reported and
    /// swallowed; the next pass reconciles whatever partial state they
    /// left behind.
    pub async fn run_pass(&self, cancel: &CancellationToken) -> Result<()> {
        let (partition, total) = match self.partition_detector.partition_info() {
            Ok(info) => info,
            Err(PartitionError::NoPartitionData) => {
                warn!("no partition data available yet, skipping crawl pass");
                return Ok(());
            }
            Err(error) => return Err(error.into()),
        };

        let range = Range::full(total)?;
        let (from, to) = range.partition_extents(partition)?;

        // Links touched within the re-index threshold of the next pass get
        // left alone until it comes around.
        let now = self.clock.now();
        let retrieved_before = now
            + chrono::Duration::from_std(self.update_interval)
                .context("update interval out of range")?
            - chrono::Duration::from_std(self.reindex_threshold)
                .context("re-index threshold out of range")?;

        let links = self.graph.links(from, to, retrieved_before).await?;
        match self.crawler.crawl(cancel, links).await {
            Ok(count) => info!(count, partition, total, "crawl pass complete"),
            Err(errors) => {
                warn!(error = %errors, partition, total, "crawl pass finished with errors");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use linkmesh_common::ManualClock;
    use linkmesh_crawler::FetchedPage;
    use linkmesh_graph::{InMemoryGraph, Link};
    use linkmesh_index::InMemoryIndex;
    use linkmesh_partition::Fixed;

    struct OnePageWeb;

    #[async_trait]
    impl UrlGetter for OnePageWeb {
        async fn get(&self, url: &str) -> Result<FetchedPage> {
            if url != "http://seed.test" {
                anyhow::bail!("connection refused: {url}");
            }
            Ok(FetchedPage {
                status: 200,
                content_type: "text/html".to_string(),
                body: Bytes::from_static(
                    b"<html><head><title>Seed</title></head><body>seed page</body></html>",
                ),
            })
        }
    }

    struct AllPublic;

    #[async_trait]
    impl PrivateNetworkDetector for AllPublic {
        async fn is_private(&self, _host: &str) -> Result<bool> {
            Ok(false)
        }
    }

    struct NoData;

    impl PartitionDetector for NoData {
        fn partition_info(&self) -> std::result::Result<(usize, usize), PartitionError> {
            Err(PartitionError::NoPartitionData)
        }
    }

    struct Deps {
        graph: Arc<InMemoryGraph>,
        index: Arc<InMemoryIndex>,
    }

    fn service_with(detector: Arc<dyn PartitionDetector>) -> (CrawlService, Deps) {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());

        let service = CrawlService::new(CrawlServiceConfig {
            graph: Arc::clone(&graph) as Arc<dyn Graph>,
            indexer: Arc::clone(&index) as Arc<dyn Indexer>,
            partition_detector: detector,
            url_getter: Some(Arc::new(OnePageWeb)),
            private_network_detector: Some(Arc::new(AllPublic)),
            clock: Some(Arc::new(ManualClock::new(chrono::Utc::now()))),
            fetch_workers: 2,
            update_interval: Duration::from_secs(60),
            reindex_threshold: Duration::from_secs(30),
        })
        .expect("valid config");

        (service, Deps { graph, index })
    }

    #[tokio::test]
    async fn config_validation_collects_every_problem() {
        let graph = Arc::new(InMemoryGraph::new());
        let index = Arc::new(InMemoryIndex::new());

        let error = CrawlService::new(CrawlServiceConfig {
            graph: graph as Arc<dyn Graph>,
            indexer: index as Arc<dyn Indexer>,
            partition_detector: Arc::new(Fixed {
                partition: 0,
                num_partitions: 1,
            }),
            url_getter: Some(Arc::new(OnePageWeb)),
            private_network_detector: Some(Arc::new(AllPublic)),
            clock: None,
            fetch_workers: 0,
            update_interval: Duration::ZERO,
            reindex_threshold: Duration::ZERO,
        })
        .expect_err("invalid config must be rejected");

        let rendered = error.to_string();
        assert!(rendered.contains("fetch workers"));
        assert!(rendered.contains("update interval"));
        assert!(rendered.contains("re-index threshold"));
    }

    #[tokio::test]
    async fn a_pass_crawls_the_assigned_partition() {
        let (service, deps) = service_with(Arc::new(Fixed {
            partition: 0,
            num_partitions: 1,
        }));

        let seed = deps
            .graph
            .upsert_link(Link::new("http://seed.test"))
            .await
            .expect("seed");

        service
            .run_pass(&CancellationToken::new())
            .await
            .expect("pass");

        let doc = deps.index.find_by_id(seed.id).expect("seed page indexed");
        assert_eq!(doc.title, "Seed");

        let refreshed = deps.graph.find_link(seed.id).await.expect("seed link");
        assert!(refreshed.retrieved_at.is_some(), "seed was fetched this pass");
    }

    #[tokio::test]
    async fn missing_partition_data_skips_the_pass() {
        let (service, deps) = service_with(Arc::new(NoData));

        deps.graph
            .upsert_link(Link::new("http://seed.test"))
            .await
            .expect("seed");

        service
            .run_pass(&CancellationToken::new())
            .await
            .expect("skipped pass is not an error");
        assert!(deps.index.is_empty(), "nothing is crawled without partition data");
    }

    #[tokio::test]
    async fn run_stops_promptly_on_cancellation() {
        let (service, _deps) = service_with(Arc::new(Fixed {
            partition: 0,
            num_partitions: 1,
        }));

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let run = tokio::spawn(async move { service.run(&cancel).await });

        // Let the first pass complete, then cancel during the sleep.
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run must stop in bounded time")
            .expect("join")
            .expect("clean shutdown");
    }
}

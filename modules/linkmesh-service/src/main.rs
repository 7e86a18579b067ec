use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

use linkmesh_common::{Config, WallClock};
use linkmesh_crawler::{DnsDetector, HttpGetter};
use linkmesh_graph::{Graph, InMemoryGraph, Link};
use linkmesh_index::{InMemoryIndex, Indexer};
use linkmesh_partition::{Fixed, FromHostname, PartitionDetector};
use linkmesh_service::{CrawlService, CrawlServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("linkmesh=info".parse()?))
        .init();

    info!("linkmesh crawler starting");

    let config = Config::from_env();

    let graph: Arc<dyn Graph> = Arc::new(InMemoryGraph::new());
    let indexer: Arc<dyn Indexer> = Arc::new(InMemoryIndex::new());

    for url in &config.seed_urls {
        let link = graph.upsert_link(Link::new(url.clone())).await?;
        info!(url = %link.url, id = %link.id, "seeded link");
    }

    // An explicit assignment wins; otherwise fall back to the StatefulSet
    // hostname ordinal.
    let partition_detector: Arc<dyn PartitionDetector> =
        match (config.partition, config.num_partitions) {
            (Some(partition), Some(num_partitions)) => Arc::new(Fixed {
                partition,
                num_partitions,
            }),
            _ => Arc::new(FromHostname::new()),
        };

    let service = CrawlService::new(CrawlServiceConfig {
        graph,
        indexer,
        partition_detector,
        url_getter: Some(Arc::new(HttpGetter::new())),
        private_network_detector: Some(Arc::new(DnsDetector)),
        clock: Some(Arc::new(WallClock)),
        fetch_workers: config.fetch_workers,
        update_interval: config.update_interval,
        reindex_threshold: config.reindex_threshold,
    })?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            shutdown.cancel();
        }
    });

    service.run(&cancel).await
}

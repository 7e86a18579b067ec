pub mod crawler;
pub mod extractor;
pub mod fetcher;
pub mod indexer;
pub mod payload;
pub mod privnet;
pub mod text;
pub mod updater;

#[cfg(test)]
pub(crate) mod testutil;

pub use crawler::{Crawler, CrawlerConfig};
pub use extractor::LinkExtractor;
pub use fetcher::{FetchedPage, HttpGetter, LinkFetcher, UrlGetter};
pub use indexer::TextIndexer;
pub use payload::{CrawlPayload, PayloadPool};
pub use privnet::{DnsDetector, PrivateNetworkDetector};
pub use text::{ContentSanitizer, StrictSanitizer, TextExtractor};
pub use updater::GraphUpdater;

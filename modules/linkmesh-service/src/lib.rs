pub mod service;

pub use service::{CrawlService, CrawlServiceConfig};

use std::env;
use std::time::Duration;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Number of concurrent fetch workers in the crawl pipeline.
    pub fetch_workers: usize,

    /// How often a crawl pass is scheduled.
    pub update_interval: Duration,

    /// Links retrieved more recently than this are not re-crawled.
    pub reindex_threshold: Duration,

    /// URLs seeded into the link graph at startup.
    pub seed_urls: Vec<String>,

    /// Explicit partition assignment (overrides hostname detection).
    pub partition: Option<usize>,
    pub num_partitions: Option<usize>,
}

impl Config {
    /// Load configuration from environment variables.
    /// Panics with a clear message if a value cannot be parsed.
    pub fn from_env() -> Self {
        let seed_urls: Vec<String> = env::var("SEED_URLS")
            .unwrap_or_default()
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Self {
            fetch_workers: parsed_env("FETCH_WORKERS").unwrap_or(8),
            update_interval: Duration::from_secs(
                parsed_env("UPDATE_INTERVAL_SECS").unwrap_or(300),
            ),
            reindex_threshold: Duration::from_secs(
                parsed_env("REINDEX_THRESHOLD_SECS").unwrap_or(7 * 24 * 3600),
            ),
            seed_urls,
            partition: parsed_env("PARTITION"),
            num_partitions: parsed_env("NUM_PARTITIONS"),
        }
    }
}

fn parsed_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key)
        .ok()
        .map(|v| v.parse().unwrap_or_else(|_| panic!("{key} must be a number")))
}

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use linkmesh_pipeline::{Processor, Verdict};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::payload::CrawlPayload;
use crate::privnet::PrivateNetworkDetector;

/// Static-asset extensions the crawler never fetches or follows.
pub(crate) const EXCLUSION_PATTERN: &str = r"(?i)\.(?:jpg|jpeg|png|gif|ico|css|js)$";

/// A completed HTTP GET, reduced to what the pipeline needs.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub content_type: String,
    pub body: Bytes,
}

/// Performs HTTP GET requests for the fetch stage.
#[async_trait]
pub trait UrlGetter: Send + Sync {
    async fn get(&self, url: &str) -> Result<FetchedPage>;
}

/// Production getter backed by reqwest.
pub struct HttpGetter {
    client: reqwest::Client,
}

impl HttpGetter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("linkmesh-crawler/0.1")
            .build()
            .expect("Failed to build HTTP client");
        Self { client }
    }
}

impl Default for HttpGetter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlGetter for HttpGetter {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("GET request failed")?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response
            .bytes()
            .await
            .context("failed to read response body")?;

        Ok(FetchedPage {
            status,
            content_type,
            body,
        })
    }
}

/// Fetch stage: downloads the payload URL into `raw_content`.
///
/// Unfetchable pages are dropped, never errored: static assets, private
/// hosts, transport failures, non-2xx statuses, and non-HTML bodies all
/// just fall out of this crawl pass.
pub struct LinkFetcher {
    getter: Arc<dyn UrlGetter>,
    detector: Arc<dyn PrivateNetworkDetector>,
    exclusion: Regex,
}

impl LinkFetcher {
    pub fn new(getter: Arc<dyn UrlGetter>, detector: Arc<dyn PrivateNetworkDetector>) -> Self {
        Self {
            getter,
            detector,
            exclusion: Regex::new(EXCLUSION_PATTERN).expect("valid exclusion regex"),
        }
    }

    async fn host_is_private(&self, raw: &str) -> Result<bool> {
        let parsed = Url::parse(raw).context("invalid URL")?;
        let host = parsed.host_str().context("URL has no host")?;
        self.detector.is_private(host).await
    }
}

#[async_trait]
impl Processor<CrawlPayload> for LinkFetcher {
    async fn process(&self, payload: &mut CrawlPayload) -> Result<Verdict> {
        if self.exclusion.is_match(&payload.url) {
            return Ok(Verdict::Drop);
        }

        match self.host_is_private(&payload.url).await {
            Ok(false) => {}
            Ok(true) => {
                debug!(url = %payload.url, "skipping private-network URL");
                return Ok(Verdict::Drop);
            }
            Err(error) => {
                debug!(url = %payload.url, error = %error, "private-network check failed");
                return Ok(Verdict::Drop);
            }
        }

        let page = match self.getter.get(&payload.url).await {
            Ok(page) => page,
            Err(error) => {
                debug!(url = %payload.url, error = %error, "fetch failed");
                return Ok(Verdict::Drop);
            }
        };

        if !(200..300).contains(&page.status) {
            return Ok(Verdict::Drop);
        }
        if !page.content_type.contains("html") {
            return Ok(Verdict::Drop);
        }

        payload.raw_content.clear();
        payload.raw_content.extend_from_slice(&page.body);
        Ok(Verdict::Forward)
    }
}

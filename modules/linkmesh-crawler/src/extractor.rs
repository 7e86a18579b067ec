use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use linkmesh_pipeline::{Processor, Verdict};
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::fetcher::EXCLUSION_PATTERN;
use crate::payload::CrawlPayload;
use crate::privnet::PrivateNetworkDetector;

/// Link-extract stage: scans the fetched HTML for anchors, resolves each
/// target against the page's `<base>` (or the page URL), and classifies the
/// keepers as follow vs no-follow.
///
/// Targets are dropped when they are not http(s), match the static-asset
/// exclusion list, sit on a private network under a different host than the
/// page, or duplicate an earlier anchor once fragments are stripped.
pub struct LinkExtractor {
    detector: Arc<dyn PrivateNetworkDetector>,
    base_href: Regex,
    anchor: Regex,
    nofollow: Regex,
    exclusion: Regex,
}

impl LinkExtractor {
    pub fn new(detector: Arc<dyn PrivateNetworkDetector>) -> Self {
        Self {
            detector,
            base_href: Regex::new(r#"(?i)<base[^>]*?href\s*=\s*"([^"]*)""#)
                .expect("valid base regex"),
            anchor: Regex::new(r#"(?i)<a[^>]*?href\s*=\s*"\s*([^"]*?)\s*"[^>]*>"#)
                .expect("valid anchor regex"),
            nofollow: Regex::new(r#"(?i)rel\s*=\s*"?nofollow"?"#).expect("valid nofollow regex"),
            exclusion: Regex::new(EXCLUSION_PATTERN).expect("valid exclusion regex"),
        }
    }
}

#[async_trait]
impl Processor<CrawlPayload> for LinkExtractor {
    async fn process(&self, payload: &mut CrawlPayload) -> Result<Verdict> {
        let content = String::from_utf8_lossy(&payload.raw_content).into_owned();

        let Ok(page_url) = Url::parse(&payload.url) else {
            debug!(url = %payload.url, "unparseable page URL, dropping payload");
            return Ok(Verdict::Drop);
        };
        let page_host = page_url.host_str().unwrap_or_default().to_string();

        // Relative targets resolve against the <base> when the page has
        // one, otherwise against the page URL itself.
        let base_url = self
            .base_href
            .captures(&content)
            .and_then(|cap| page_url.join(cap[1].trim()).ok())
            .unwrap_or_else(|| page_url.clone());

        let mut seen: HashSet<String> = HashSet::new();
        let mut follow_links = Vec::new();
        let mut no_follow_links = Vec::new();

        for cap in self.anchor.captures_iter(&content) {
            let tag = cap.get(0).map(|m| m.as_str()).unwrap_or_default();
            let target = cap[1].trim();
            if target.is_empty() {
                continue;
            }

            let Ok(mut resolved) = base_url.join(target) else {
                continue;
            };
            if resolved.scheme() != "http" && resolved.scheme() != "https" {
                continue;
            }
            // Fragments never change the fetched document.
            resolved.set_fragment(None);

            let link = normalized(&resolved);
            if self.exclusion.is_match(&link) {
                continue;
            }

            let host = resolved.host_str().unwrap_or_default();
            if host != page_host {
                match self.detector.is_private(host).await {
                    Ok(false) => {}
                    Ok(true) => continue,
                    Err(error) => {
                        debug!(host, error = %error, "private-network check failed, skipping link");
                        continue;
                    }
                }
            }

            if !seen.insert(link.clone()) {
                continue;
            }

            if self.nofollow.is_match(tag) {
                no_follow_links.push(link);
            } else {
                follow_links.push(link);
            }
        }

        payload.links = follow_links;
        payload.no_follow_links = no_follow_links;
        Ok(Verdict::Forward)
    }
}

/// Render a URL without the synthetic trailing slash the parser adds to
/// host-only URLs, so `https://example.com` and `https://example.com/` land
/// on one graph node.
fn normalized(url: &Url) -> String {
    let rendered = url.to_string();
    if url.path() == "/" && url.query().is_none() {
        rendered.trim_end_matches('/').to_string()
    } else {
        rendered
    }
}

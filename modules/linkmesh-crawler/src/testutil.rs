//! Stub collaborators shared by the crawler unit tests.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

use crate::fetcher::{FetchedPage, UrlGetter};
use crate::privnet::PrivateNetworkDetector;

pub(crate) fn page(status: u16, content_type: &str, body: &str) -> FetchedPage {
    FetchedPage {
        status,
        content_type: content_type.to_string(),
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

/// Getter serving canned responses; unknown URLs fail like a dead host.
pub(crate) struct MapGetter {
    pages: HashMap<String, FetchedPage>,
}

impl MapGetter {
    pub(crate) fn empty() -> Self {
        Self {
            pages: HashMap::new(),
        }
    }

    pub(crate) fn serving(url: &str, page: FetchedPage) -> Self {
        let mut getter = Self::empty();
        getter.pages.insert(url.to_string(), page);
        getter
    }
}

#[async_trait]
impl UrlGetter for MapGetter {
    async fn get(&self, url: &str) -> Result<FetchedPage> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("connection refused: {url}"))
    }
}

/// Detector with a fixed private-host list.
pub(crate) struct StubDetector {
    private: HashSet<String>,
}

impl StubDetector {
    pub(crate) fn all_public() -> Self {
        Self {
            private: HashSet::new(),
        }
    }

    pub(crate) fn private_hosts(hosts: &[&str]) -> Self {
        Self {
            private: hosts.iter().map(|h| h.to_string()).collect(),
        }
    }
}

#[async_trait]
impl PrivateNetworkDetector for StubDetector {
    async fn is_private(&self, host: &str) -> Result<bool> {
        Ok(self.private.contains(host))
    }
}

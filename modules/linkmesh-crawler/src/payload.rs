use std::sync::{Arc, Mutex, Weak};

use chrono::{DateTime, Utc};
use linkmesh_pipeline::Payload;
use uuid::Uuid;

/// Free list recycling crawl payloads between pipeline runs, amortizing the
/// cost of their buffers. Safe under concurrent put/get from pool workers.
pub struct PayloadPool {
    free: Mutex<Vec<CrawlPayload>>,
}

impl PayloadPool {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            free: Mutex::new(Vec::new()),
        })
    }

    /// Take a recycled payload, or allocate a fresh one when the pool is
    /// empty. The payload remembers the pool and returns to it on
    /// `mark_processed`.
    pub fn acquire(self: &Arc<Self>) -> CrawlPayload {
        let recycled = self.free.lock().expect("payload pool lock poisoned").pop();
        let mut payload = recycled.unwrap_or_default();
        payload.pool = Arc::downgrade(self);
        payload
    }

    fn release(&self, payload: CrawlPayload) {
        self.free
            .lock()
            .expect("payload pool lock poisoned")
            .push(payload);
    }

    /// Number of payloads currently sitting in the free list.
    pub fn idle(&self) -> usize {
        self.free.lock().expect("payload pool lock poisoned").len()
    }
}

/// Per-URL crawl state, populated progressively by the pipeline stages.
#[derive(Default)]
pub struct CrawlPayload {
    pool: Weak<PayloadPool>,

    // Filled by the source.
    pub link_id: Uuid,
    pub url: String,
    pub retrieved_at: Option<DateTime<Utc>>,

    // Filled by the link fetcher.
    pub raw_content: Vec<u8>,

    // Filled by the link extractor.
    pub no_follow_links: Vec<String>,
    pub links: Vec<String>,

    // Filled by the text extractor.
    pub title: String,
    pub text_content: String,
}

impl Payload for CrawlPayload {
    fn deep_clone(&self) -> Self {
        let mut clone = match self.pool.upgrade() {
            Some(pool) => pool.acquire(),
            None => CrawlPayload::default(),
        };
        clone.link_id = self.link_id;
        clone.url.clone_from(&self.url);
        clone.retrieved_at = self.retrieved_at;
        clone.raw_content.clone_from(&self.raw_content);
        clone.no_follow_links.clone_from(&self.no_follow_links);
        clone.links.clone_from(&self.links);
        clone.title.clone_from(&self.title);
        clone.text_content.clone_from(&self.text_content);
        clone
    }

    fn mark_processed(mut self) {
        // Reset for reuse, keeping buffer capacity. The buffers stay owned
        // by this instance, so recycled payloads never share storage.
        self.link_id = Uuid::nil();
        self.url.clear();
        self.retrieved_at = None;
        self.raw_content.clear();
        self.no_follow_links.clear();
        self.links.clear();
        self.title.clear();
        self.text_content.clear();

        if let Some(pool) = self.pool.upgrade() {
            pool.release(self);
        }
    }
}

//! Shared payloads, processors, sources, and sinks for pipeline tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use linkmesh_pipeline::{Payload, Processor, Sink, Source, Verdict};
use tokio::sync::Barrier;

/// Tracks the processed flag of every payload minted in a test, so a test
/// can assert "each payload was marked processed exactly once".
#[derive(Clone, Default)]
pub struct Ledger {
    flags: Arc<Mutex<Vec<Arc<AtomicBool>>>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn payload(&self, value: &str) -> TestPayload {
        let processed = Arc::new(AtomicBool::new(false));
        self.flags
            .lock()
            .expect("ledger lock poisoned")
            .push(Arc::clone(&processed));
        TestPayload {
            value: value.to_string(),
            processed,
            ledger: self.clone(),
        }
    }

    pub fn payloads(&self, count: usize) -> Vec<TestPayload> {
        (0..count).map(|i| self.payload(&i.to_string())).collect()
    }

    pub fn minted(&self) -> usize {
        self.flags.lock().expect("ledger lock poisoned").len()
    }

    pub fn all_processed(&self) -> bool {
        self.flags
            .lock()
            .expect("ledger lock poisoned")
            .iter()
            .all(|flag| flag.load(Ordering::SeqCst))
    }
}

pub struct TestPayload {
    pub value: String,
    processed: Arc<AtomicBool>,
    ledger: Ledger,
}

impl Payload for TestPayload {
    fn deep_clone(&self) -> Self {
        // Clones register their own flag: a broadcast clone must be
        // recycled independently of the original.
        self.ledger.payload(&self.value)
    }

    fn mark_processed(self) {
        let already = self.processed.swap(true, Ordering::SeqCst);
        assert!(!already, "payload {:?} marked processed twice", self.value);
    }
}

/// Source yielding a fixed list of payloads, then an optional error.
pub struct ListSource {
    items: std::vec::IntoIter<TestPayload>,
    error: Option<anyhow::Error>,
}

impl ListSource {
    pub fn new(items: Vec<TestPayload>) -> Self {
        Self {
            items: items.into_iter(),
            error: None,
        }
    }

    pub fn failing_with(items: Vec<TestPayload>, error: anyhow::Error) -> Self {
        Self {
            items: items.into_iter(),
            error: Some(error),
        }
    }
}

#[async_trait]
impl Source<TestPayload> for ListSource {
    async fn next(&mut self) -> Option<anyhow::Result<TestPayload>> {
        match self.items.next() {
            Some(payload) => Some(Ok(payload)),
            None => self.error.take().map(Err),
        }
    }
}

/// Sink collecting consumed values behind a shared handle.
pub struct CollectingSink {
    values: Arc<Mutex<Vec<String>>>,
}

impl CollectingSink {
    pub fn new() -> (Self, Arc<Mutex<Vec<String>>>) {
        let values = Arc::new(Mutex::new(Vec::new()));
        (
            Self {
                values: Arc::clone(&values),
            },
            values,
        )
    }
}

#[async_trait]
impl Sink<TestPayload> for CollectingSink {
    async fn consume(&mut self, payload: &TestPayload) -> anyhow::Result<()> {
        self.values
            .lock()
            .expect("sink lock poisoned")
            .push(payload.value.clone());
        Ok(())
    }
}

/// Sink that fails every consume.
pub struct FailingSink;

#[async_trait]
impl Sink<TestPayload> for FailingSink {
    async fn consume(&mut self, _payload: &TestPayload) -> anyhow::Result<()> {
        anyhow::bail!("sink rejected payload")
    }
}

pub struct Passthrough;

#[async_trait]
impl Processor<TestPayload> for Passthrough {
    async fn process(&self, _payload: &mut TestPayload) -> anyhow::Result<Verdict> {
        Ok(Verdict::Forward)
    }
}

pub struct Dropper;

#[async_trait]
impl Processor<TestPayload> for Dropper {
    async fn process(&self, _payload: &mut TestPayload) -> anyhow::Result<Verdict> {
        Ok(Verdict::Drop)
    }
}

pub struct Failing(pub &'static str);

#[async_trait]
impl Processor<TestPayload> for Failing {
    async fn process(&self, _payload: &mut TestPayload) -> anyhow::Result<Verdict> {
        anyhow::bail!(self.0)
    }
}

/// Appends `_<tag>` to the payload value, to tell broadcast branches apart.
pub struct Tagging(pub usize);

#[async_trait]
impl Processor<TestPayload> for Tagging {
    async fn process(&self, payload: &mut TestPayload) -> anyhow::Result<Verdict> {
        payload.value = format!("{}_{}", payload.value, self.0);
        Ok(Verdict::Forward)
    }
}

/// Blocks until `parties` invocations are in flight at once, proving a pool
/// really runs its workers concurrently. Counts invocations as it goes.
pub struct Rendezvous {
    barrier: Arc<Barrier>,
    pub invocations: Arc<AtomicUsize>,
}

impl Rendezvous {
    pub fn new(parties: usize) -> Self {
        Self {
            barrier: Arc::new(Barrier::new(parties)),
            invocations: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl Processor<TestPayload> for Rendezvous {
    async fn process(&self, _payload: &mut TestPayload) -> anyhow::Result<Verdict> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.barrier.wait().await;
        Ok(Verdict::Drop)
    }
}

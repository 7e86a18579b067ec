mod harness;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use linkmesh_pipeline::{
    Fifo, Pipeline, Sink, StageParams, StageRunner,
};
use tokio_util::sync::CancellationToken;

use harness::{
    CollectingSink, Failing, FailingSink, Ledger, ListSource, Passthrough, TestPayload,
};

const TEST_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn payloads_flow_from_source_to_sink() {
    let ledger = Ledger::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(Fifo::new(Passthrough)) as Arc<dyn StageRunner<TestPayload>>,
        Arc::new(Fifo::new(Passthrough)),
        Arc::new(Fifo::new(Passthrough)),
    ]);

    let (sink, values) = CollectingSink::new();
    pipeline
        .process(
            &CancellationToken::new(),
            ListSource::new(ledger.payloads(4)),
            sink,
        )
        .await
        .expect("pipeline run");

    assert_eq!(*values.lock().unwrap(), vec!["0", "1", "2", "3"]);
    assert_eq!(ledger.minted(), 4);
    assert!(ledger.all_processed());
}

/// A hand-rolled stage runner, to pin down that `StageParams` is enough to
/// build runners outside this crate.
struct CountingForwarder {
    seen: Arc<AtomicUsize>,
}

#[async_trait]
impl StageRunner<TestPayload> for CountingForwarder {
    async fn run(&self, params: StageParams<TestPayload>) {
        loop {
            let payload = {
                let mut input = params.input.lock().await;
                tokio::select! {
                    _ = params.cancel.cancelled() => return,
                    received = input.recv() => match received {
                        Some(payload) => payload,
                        None => return,
                    },
                }
            };
            self.seen.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = params.cancel.cancelled() => return,
                sent = params.output.send(payload) => {
                    if sent.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

#[tokio::test]
async fn custom_stage_runners_compose() {
    let ledger = Ledger::new();
    let seen = Arc::new(AtomicUsize::new(0));
    let pipeline = Pipeline::new(vec![Arc::new(CountingForwarder {
        seen: Arc::clone(&seen),
    }) as Arc<dyn StageRunner<TestPayload>>]);

    let (sink, values) = CollectingSink::new();
    pipeline
        .process(
            &CancellationToken::new(),
            ListSource::new(ledger.payloads(6)),
            sink,
        )
        .await
        .expect("pipeline run");

    assert_eq!(seen.load(Ordering::SeqCst), 6);
    assert_eq!(values.lock().unwrap().len(), 6);
}

#[tokio::test]
async fn stage_errors_are_wrapped_with_the_stage_index() {
    let ledger = Ledger::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(Fifo::new(Passthrough)) as Arc<dyn StageRunner<TestPayload>>,
        Arc::new(Fifo::new(Failing("boom"))),
    ]);

    let (sink, _values) = CollectingSink::new();
    let errors = pipeline
        .process(
            &CancellationToken::new(),
            ListSource::new(ledger.payloads(2)),
            sink,
        )
        .await
        .expect_err("failing stage must surface");

    let rendered = errors.to_string();
    assert!(
        rendered.contains("pipeline stage 1: boom"),
        "unexpected error text: {rendered}"
    );
}

#[tokio::test]
async fn source_errors_are_wrapped() {
    let ledger = Ledger::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(Fifo::new(Passthrough)) as Arc<dyn StageRunner<TestPayload>>,
    ]);

    let (sink, _values) = CollectingSink::new();
    let errors = pipeline
        .process(
            &CancellationToken::new(),
            ListSource::failing_with(ledger.payloads(1), anyhow::anyhow!("iterator failed")),
            sink,
        )
        .await
        .expect_err("source failure must surface");

    assert!(errors.to_string().contains("pipeline source: iterator failed"));
}

#[tokio::test]
async fn sink_errors_are_wrapped() {
    let ledger = Ledger::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(Fifo::new(Passthrough)) as Arc<dyn StageRunner<TestPayload>>,
    ]);

    let errors = pipeline
        .process(
            &CancellationToken::new(),
            ListSource::new(ledger.payloads(1)),
            FailingSink,
        )
        .await
        .expect_err("sink failure must surface");

    assert!(errors.to_string().contains("pipeline sink: sink rejected payload"));
}

/// Sink that stays busy until the run is cancelled, wedging the stages
/// behind a full output channel.
struct BusySink {
    cancel: CancellationToken,
}

#[async_trait]
impl Sink<TestPayload> for BusySink {
    async fn consume(&mut self, _payload: &TestPayload) -> anyhow::Result<()> {
        self.cancel.cancelled().await;
        Ok(())
    }
}

#[tokio::test]
async fn cancellation_unblocks_a_wedged_pipeline() {
    let ledger = Ledger::new();
    let pipeline = Pipeline::new(vec![
        Arc::new(Fifo::new(Passthrough)) as Arc<dyn StageRunner<TestPayload>>,
    ]);

    let cancel = CancellationToken::new();
    let run = pipeline.process(
        &cancel,
        ListSource::new(ledger.payloads(5)),
        BusySink {
            cancel: cancel.clone(),
        },
    );

    let trigger = {
        let cancel = cancel.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            cancel.cancel();
        }
    };

    let (result, _) = tokio::time::timeout(TEST_TIMEOUT, async { tokio::join!(run, trigger) })
        .await
        .expect("cancelled pipeline must return in bounded time");
    result.expect("cancellation alone is not an error");
}

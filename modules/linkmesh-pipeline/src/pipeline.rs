use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{Payload, SharedReceiver, Sink, Source, StageParams, StageRunner};

/// An error raised during one pipeline run, tagged with where it happened.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("pipeline stage {stage}: {cause}")]
    Stage { stage: usize, cause: anyhow::Error },

    #[error("pipeline source: {0}")]
    Source(anyhow::Error),

    #[error("pipeline sink: {0}")]
    Sink(anyhow::Error),
}

/// Every error collected during one pipeline run.
#[derive(Debug, Default)]
pub struct PipelineErrors(pub Vec<PipelineError>);

impl fmt::Display for PipelineErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [] => write!(f, "no errors"),
            [single] => write!(f, "{single}"),
            many => {
                write!(f, "{} errors occurred: ", many.len())?;
                for (i, error) in many.iter().enumerate() {
                    if i > 0 {
                        write!(f, "; ")?;
                    }
                    write!(f, "{error}")?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for PipelineErrors {}

/// Emit an error without blocking. When the buffer is full the pipeline is
/// already cancelling and further errors would be redundant, so they are
/// dropped.
pub(crate) fn maybe_emit(error: PipelineError, errors: &mpsc::Sender<PipelineError>) {
    if let Err(mpsc::error::TrySendError::Full(dropped)) = errors.try_send(error) {
        tracing::debug!(error = %dropped, "error channel full, dropping error");
    }
}

/// Executes an ordered list of stage runners between a source and a sink.
pub struct Pipeline<P: Payload> {
    stages: Vec<Arc<dyn StageRunner<P>>>,
}

impl<P: Payload> Pipeline<P> {
    pub fn new(stages: Vec<Arc<dyn StageRunner<P>>>) -> Self {
        Self { stages }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Pump every payload the source yields through all stages into the
    /// sink. Returns once the source is exhausted and all stages have
    /// drained, or once an error or cancellation stops the run.
    ///
    /// All errors observed during the run are collected into the returned
    /// `PipelineErrors`; the first one also cancels the run so every stage
    /// unblocks promptly.
    pub async fn process<S, K>(
        &self,
        cancel: &CancellationToken,
        source: S,
        sink: K,
    ) -> Result<(), PipelineErrors>
    where
        S: Source<P> + 'static,
        K: Sink<P> + 'static,
    {
        let stage_count = self.stages.len();
        let cancel = cancel.child_token();
        let (err_tx, mut err_rx) = mpsc::channel::<PipelineError>(stage_count + 2);

        // One rendezvous channel per stage boundary: channel 0 feeds the
        // first stage, channel N feeds the sink.
        let mut payload_txs = Vec::with_capacity(stage_count + 1);
        let mut payload_rxs: Vec<SharedReceiver<P>> = Vec::with_capacity(stage_count + 1);
        for _ in 0..=stage_count {
            let (tx, rx) = mpsc::channel::<P>(1);
            payload_txs.push(tx);
            payload_rxs.push(Arc::new(Mutex::new(rx)));
        }
        let source_tx = payload_txs.remove(0);
        let sink_rx = payload_rxs.pop().expect("pipeline wiring out of sync");

        let mut tasks: Vec<JoinHandle<()>> = Vec::with_capacity(stage_count + 2);

        // Stage tasks. Each owns its output sender, so a stage exiting
        // closes its downstream channel and end-of-stream propagates.
        for (stage_index, ((runner, input), output)) in self
            .stages
            .iter()
            .cloned()
            .zip(payload_rxs)
            .zip(payload_txs)
            .enumerate()
        {
            let params = StageParams {
                stage_index,
                input,
                output,
                errors: err_tx.clone(),
                cancel: cancel.clone(),
            };
            tasks.push(tokio::spawn(async move {
                runner.run(params).await;
            }));
        }

        // Source task: pump payloads into channel 0; dropping the sender on
        // exit signals end-of-stream to the first stage.
        tasks.push(tokio::spawn(run_source(
            source,
            source_tx,
            err_tx.clone(),
            cancel.clone(),
        )));

        // Sink task: consume from channel N and recycle payloads.
        tasks.push(tokio::spawn(run_sink(
            sink,
            sink_rx,
            err_tx.clone(),
            cancel.clone(),
        )));

        // Only the tasks hold error senders now; the collector finishes
        // once they have all exited.
        drop(err_tx);
        let collector = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let mut collected = Vec::new();
                while let Some(error) = err_rx.recv().await {
                    // The first error stops the whole run.
                    cancel.cancel();
                    collected.push(error);
                }
                collected
            }
        });

        for task in tasks {
            let _ = task.await;
        }
        cancel.cancel();

        let collected = collector.await.unwrap_or_default();
        if collected.is_empty() {
            Ok(())
        } else {
            Err(PipelineErrors(collected))
        }
    }
}

async fn run_source<P: Payload>(
    mut source: impl Source<P>,
    output: mpsc::Sender<P>,
    errors: mpsc::Sender<PipelineError>,
    cancel: CancellationToken,
) {
    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => return,
            item = source.next() => item,
        };

        match item {
            None => return,
            Some(Err(error)) => {
                maybe_emit(PipelineError::Source(error), &errors);
                return;
            }
            Some(Ok(payload)) => {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    sent = output.send(payload) => {
                        if sent.is_err() {
                            return;
                        }
                    }
                }
            }
        }
    }
}

async fn run_sink<P: Payload>(
    mut sink: impl Sink<P>,
    input: SharedReceiver<P>,
    errors: mpsc::Sender<PipelineError>,
    cancel: CancellationToken,
) {
    loop {
        let payload = {
            let mut input = input.lock().await;
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = input.recv() => match received {
                    Some(payload) => payload,
                    None => return,
                },
            }
        };

        if let Err(error) = sink.consume(&payload).await {
            maybe_emit(PipelineError::Sink(error), &errors);
            return;
        }
        payload.mark_processed();
    }
}

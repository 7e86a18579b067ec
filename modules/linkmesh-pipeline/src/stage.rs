use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::pipeline::{maybe_emit, PipelineError};
use crate::{Payload, Processor, SharedReceiver, StageParams, StageRunner, Verdict};

/// Sequential stage: one payload at a time, input order preserved on the
/// output.
pub struct Fifo<P: Payload> {
    proc: Arc<dyn Processor<P>>,
}

impl<P: Payload> Fifo<P> {
    pub fn new(proc: impl Processor<P> + 'static) -> Self {
        Self {
            proc: Arc::new(proc),
        }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for Fifo<P> {
    async fn run(&self, params: StageParams<P>) {
        run_fifo(self.proc.as_ref(), &params).await;
    }
}

/// The loop shared by every runner: pull, process, route.
///
/// Exits on input close, cancellation, or the first processor error. Errors
/// are tagged with the stage index and emitted best-effort; the pipeline
/// cancels the run in response.
async fn run_fifo<P: Payload>(proc: &dyn Processor<P>, params: &StageParams<P>) {
    loop {
        let Some(mut payload) = recv_payload(&params.input, &params.cancel).await else {
            return;
        };

        match proc.process(&mut payload).await {
            Err(cause) => {
                maybe_emit(
                    PipelineError::Stage {
                        stage: params.stage_index,
                        cause,
                    },
                    &params.errors,
                );
                return;
            }
            Ok(Verdict::Drop) => {
                payload.mark_processed();
            }
            Ok(Verdict::Forward) => {
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
}

/// Next payload from the shared input, or `None` on close or cancellation.
async fn recv_payload<P>(input: &SharedReceiver<P>, cancel: &CancellationToken) -> Option<P> {
    let mut input = input.lock().await;
    tokio::select! {
        _ = cancel.cancelled() => None,
        received = input.recv() => received,
    }
}

/// Exactly `workers` concurrent FIFO loops competing for the shared input.
/// Output ordering is not preserved.
pub struct FixedWorkerPool<P: Payload> {
    proc: Arc<dyn Processor<P>>,
    workers: usize,
}

impl<P: Payload> FixedWorkerPool<P> {
    /// Panics if `workers` is zero; a sizeless pool is a programmer error.
    pub fn new(proc: impl Processor<P> + 'static, workers: usize) -> Self {
        assert!(workers > 0, "FixedWorkerPool requires at least one worker");
        Self {
            proc: Arc::new(proc),
            workers,
        }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for FixedWorkerPool<P> {
    async fn run(&self, params: StageParams<P>) {
        let workers: Vec<_> = (0..self.workers)
            .map(|_| {
                let proc = Arc::clone(&self.proc);
                let params = params.clone();
                tokio::spawn(async move { run_fifo(proc.as_ref(), &params).await })
            })
            .collect();

        for worker in workers {
            let _ = worker.await;
        }
    }
}

/// Spawns a fresh worker task per payload, with a semaphore capping the
/// number in flight. Output ordering is not preserved.
pub struct DynamicWorkerPool<P: Payload> {
    proc: Arc<dyn Processor<P>>,
    max_workers: usize,
}

impl<P: Payload> DynamicWorkerPool<P> {
    /// Panics if `max_workers` is zero.
    pub fn new(proc: impl Processor<P> + 'static, max_workers: usize) -> Self {
        assert!(max_workers > 0, "DynamicWorkerPool requires at least one worker");
        Self {
            proc: Arc::new(proc),
            max_workers,
        }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for DynamicWorkerPool<P> {
    async fn run(&self, params: StageParams<P>) {
        let semaphore = Arc::new(Semaphore::new(self.max_workers));

        loop {
            let Some(payload) = recv_payload(&params.input, &params.cancel).await else {
                break;
            };

            let permit = tokio::select! {
                _ = params.cancel.cancelled() => break,
                acquired = Arc::clone(&semaphore).acquire_owned() => {
                    acquired.expect("stage semaphore closed")
                }
            };

            let proc = Arc::clone(&self.proc);
            let output = params.output.clone();
            let errors = params.errors.clone();
            let cancel = params.cancel.clone();
            let stage = params.stage_index;
            tokio::spawn(async move {
                let _permit = permit;
                let mut payload = payload;
                match proc.process(&mut payload).await {
                    Err(cause) => {
                        maybe_emit(PipelineError::Stage { stage, cause }, &errors);
                    }
                    Ok(Verdict::Drop) => payload.mark_processed(),
                    Ok(Verdict::Forward) => {
                        tokio::select! {
                            _ = cancel.cancelled() => {}
                            sent = output.send(payload) => {
                                let _ = sent;
                            }
                        }
                    }
                }
            });
        }

        // Shutdown completes only once every in-flight worker has handed its
        // permit back.
        let _ = semaphore.acquire_many(self.max_workers as u32).await;
    }
}

/// Fan-out stage: each payload is delivered to every processor, which run as
/// independent FIFO branches sharing the stage output. The first branch gets
/// the original, the rest deep clones. All branches must accept a payload
/// before the next one is pulled, which bounds memory under a slow branch.
pub struct Broadcast<P: Payload> {
    procs: Vec<Arc<dyn Processor<P>>>,
}

impl<P: Payload> Broadcast<P> {
    /// Panics on an empty processor list.
    pub fn new(procs: Vec<Arc<dyn Processor<P>>>) -> Self {
        assert!(!procs.is_empty(), "Broadcast requires at least one processor");
        Self { procs }
    }
}

#[async_trait]
impl<P: Payload> StageRunner<P> for Broadcast<P> {
    async fn run(&self, params: StageParams<P>) {
        let mut branch_txs = Vec::with_capacity(self.procs.len());
        let mut branches = Vec::with_capacity(self.procs.len());
        for proc in &self.procs {
            let (tx, rx) = mpsc::channel::<P>(1);
            branch_txs.push(tx);

            let branch_params = StageParams {
                stage_index: params.stage_index,
                input: Arc::new(Mutex::new(rx)),
                output: params.output.clone(),
                errors: params.errors.clone(),
                cancel: params.cancel.clone(),
            };
            let proc = Arc::clone(proc);
            branches.push(tokio::spawn(async move {
                run_fifo(proc.as_ref(), &branch_params).await;
            }));
        }

        'fanout: loop {
            let Some(payload) = recv_payload(&params.input, &params.cancel).await else {
                break;
            };

            for tx in branch_txs.iter().skip(1) {
                let clone = payload.deep_clone();
                tokio::select! {
                    _ = params.cancel.cancelled() => break 'fanout,
                    sent = tx.send(clone) => {
                        if sent.is_err() {
                            break 'fanout;
                        }
                    }
                }
            }
            tokio::select! {
                _ = params.cancel.cancelled() => break,
                sent = branch_txs[0].send(payload) => {
                    if sent.is_err() {
                        break;
                    }
                }
            }
        }

        // Closing the branch inputs lets each FIFO drain out and exit.
        drop(branch_txs);
        for branch in branches {
            let _ = branch.await;
        }
    }
}

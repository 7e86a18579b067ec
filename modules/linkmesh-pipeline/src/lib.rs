pub mod pipeline;
pub mod stage;

pub use pipeline::{Pipeline, PipelineError, PipelineErrors};
pub use stage::{Broadcast, DynamicWorkerPool, Fifo, FixedWorkerPool};

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// A message carried through the pipeline.
///
/// `mark_processed` consumes the payload, so "must not be used afterward"
/// is enforced by the compiler. Both operations are infallible; a failing
/// clone is a programmer bug and may abort the process.
pub trait Payload: Sized + Send + 'static {
    /// A deep copy suitable for independent mutation by another branch.
    /// Cloned buffers must not share storage with the original.
    fn deep_clone(&self) -> Self;

    /// Release any pooled resources held by this payload.
    fn mark_processed(self);
}

/// What a stage should do with a payload after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Hand the payload to the next stage.
    Forward,
    /// Discard the payload; the stage marks it processed. This is how
    /// processors filter, and it is not an error.
    Drop,
}

/// A single processing step plugged into a stage runner. Processors mutate
/// the payload in place; the stage runner owns routing and recycling.
#[async_trait]
pub trait Processor<P: Payload>: Send + Sync {
    async fn process(&self, payload: &mut P) -> anyhow::Result<Verdict>;
}

/// Produces the payloads fed into the head of the pipeline.
/// `None` signals a clean end of input.
#[async_trait]
pub trait Source<P: Payload>: Send {
    async fn next(&mut self) -> Option<anyhow::Result<P>>;
}

/// Consumes the payloads emitted by the tail of the pipeline. The pipeline
/// marks each payload processed after a successful consume.
#[async_trait]
pub trait Sink<P: Payload>: Send {
    async fn consume(&mut self, payload: &P) -> anyhow::Result<()>;
}

/// Input end of an inter-stage channel. Shared so pool runners can compete
/// for payloads from the same upstream.
pub type SharedReceiver<P> = Arc<Mutex<mpsc::Receiver<P>>>;

/// Everything a stage runner needs to participate in a pipeline run.
pub struct StageParams<P> {
    pub stage_index: usize,
    pub input: SharedReceiver<P>,
    pub output: mpsc::Sender<P>,
    pub errors: mpsc::Sender<PipelineError>,
    pub cancel: CancellationToken,
}

impl<P> Clone for StageParams<P> {
    fn clone(&self) -> Self {
        Self {
            stage_index: self.stage_index,
            input: Arc::clone(&self.input),
            output: self.output.clone(),
            errors: self.errors.clone(),
            cancel: self.cancel.clone(),
        }
    }
}

/// A concurrency strategy driving one processor (or, for broadcast,
/// several). Runners must exit promptly when cancelled: never acknowledge
/// more input and never block indefinitely on output.
#[async_trait]
pub trait StageRunner<P: Payload>: Send + Sync {
    async fn run(&self, params: StageParams<P>);
}

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::Result;
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use shared::{
    error::CompileFailure,
    protocol::{CompileRequest, CompiledArtifact, ExecutionEvent, ExecutionRequest},
};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const DEFAULT_COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

pub type ExecutionEventStream = BoxStream<'static, ExecutionEvent>;

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<ExecutionEvent>>>>;

#[async_trait]
pub trait CompileService: Send + Sync {
    async fn compile(&self, request: CompileRequest) -> Result<CompiledArtifact>;
}

/// Sandboxed runtime for compiled artifacts.
///
/// The returned stream carries any number of `Stdout`/`Stderr` events and at most
/// one `TestResult`, and ends when the run is over.
#[async_trait]
pub trait ExecutionEnvironment: Send + Sync {
    async fn execute(&self, request: ExecutionRequest) -> Result<ExecutionEventStream>;
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    CompileFailed(#[from] CompileFailure),
}

impl PipelineError {
    pub fn compile_failure(&self) -> &CompileFailure {
        match self {
            PipelineError::CompileFailed(failure) => failure,
        }
    }
}

/// Tracks the relay of one run's execution events.
pub struct RunHandle {
    run_id: Uuid,
    relay: JoinHandle<usize>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Waits for the run's event stream to end and returns how many events were relayed.
    pub async fn finished(self) -> usize {
        match self.relay.await {
            Ok(relayed) => relayed,
            Err(err) => {
                warn!(run_id = %self.run_id, "pipeline: relay task ended abnormally: {err}");
                0
            }
        }
    }

    pub fn abort(&self) {
        self.relay.abort();
    }
}

/// Compile, then execute, then relay events to subscribers.
///
/// The pipeline keeps no per-run state: a failed run leaves it exactly as a fresh
/// one, and concurrent runs simply race. Every subscriber owns an unbounded
/// queue, so no event is ever dropped for a slow reader.
pub struct ExecutionPipeline {
    compiler: Arc<dyn CompileService>,
    environment: Arc<dyn ExecutionEnvironment>,
    compile_timeout: Duration,
    subscribers: Subscribers,
}

impl ExecutionPipeline {
    pub fn new(
        compiler: Arc<dyn CompileService>,
        environment: Arc<dyn ExecutionEnvironment>,
    ) -> Self {
        Self::with_compile_timeout(compiler, environment, DEFAULT_COMPILE_TIMEOUT)
    }

    pub fn with_compile_timeout(
        compiler: Arc<dyn CompileService>,
        environment: Arc<dyn ExecutionEnvironment>,
        compile_timeout: Duration,
    ) -> Self {
        Self {
            compiler,
            environment,
            compile_timeout,
            subscribers: Arc::default(),
        }
    }

    pub fn compile_timeout(&self) -> Duration {
        self.compile_timeout
    }

    /// Receives every event relayed after this call, in arrival order.
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<ExecutionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub async fn run(&self, full_source: &str) -> Result<RunHandle, PipelineError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, source_len = full_source.len(), "pipeline: compile requested");

        let artifact = self.compile(run_id, full_source).await?;
        info!(%run_id, artifact_len = artifact.as_str().len(), "pipeline: compiled");

        let stream = match self
            .environment
            .execute(ExecutionRequest::for_artifact(artifact))
            .await
        {
            Ok(stream) => stream,
            Err(err) => {
                warn!(%run_id, "pipeline: execution environment failed to start: {err:#}");
                futures::stream::once(async move { ExecutionEvent::Stderr(format!("{err:#}")) })
                    .boxed()
            }
        };

        let relay = tokio::spawn(relay_events(
            run_id,
            stream,
            Arc::clone(&self.subscribers),
        ));
        Ok(RunHandle { run_id, relay })
    }

    async fn compile(&self, run_id: Uuid, source: &str) -> Result<CompiledArtifact, CompileFailure> {
        let request = CompileRequest::new(source);
        match tokio::time::timeout(self.compile_timeout, self.compiler.compile(request)).await {
            Ok(Ok(artifact)) => Ok(artifact),
            Ok(Err(err)) => {
                warn!(%run_id, "pipeline: compile rejected: {err:#}");
                Err(CompileFailure::Rejected(format!("{err:#}")))
            }
            Err(_) => {
                warn!(
                    %run_id,
                    timeout_ms = self.compile_timeout.as_millis() as u64,
                    "pipeline: compile timed out"
                );
                Err(CompileFailure::Timeout {
                    after: self.compile_timeout,
                })
            }
        }
    }
}

async fn relay_events(
    run_id: Uuid,
    mut stream: ExecutionEventStream,
    subscribers: Subscribers,
) -> usize {
    let mut relayed = 0;
    while let Some(event) = stream.next().await {
        if let ExecutionEvent::TestResult { success, .. } = &event {
            info!(%run_id, success, "pipeline: test result");
        }
        subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
        relayed += 1;
    }
    debug!(%run_id, relayed, "pipeline: execution stream ended");
    relayed
}

#[cfg(test)]
#[path = "tests/pipeline_tests.rs"]
mod tests;

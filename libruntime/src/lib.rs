mod dispatcher;
mod executor;
mod metrics;
mod pacer;
mod runtime_error;
mod scale;

pub use crate::dispatcher::WorkerPool;
pub use crate::executor::{Executor, HttpExecutor, Outcome};
pub use crate::metrics::{MetricsEngine, SLICE_MILLIS, Snapshot, WINDOW_SECONDS};
pub use crate::pacer::Pacer;
pub use crate::runtime_error::RuntimeError;
pub use crate::scale::BucketScale;

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use libtargets::TargetSet;

/// Everything the core needs to know, consumed once at startup.
pub struct EngineConfig {
    pub workers: usize,
    pub rate: u64,
    pub timeout: Duration,
    pub min_y_ms: f64,
    pub max_y_ms: f64,
    pub buckets: usize,
    pub insecure_tls: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            rate: 50,
            timeout: Duration::from_secs(30),
            min_y_ms: 0.0,
            max_y_ms: 100.0,
            buckets: 21,
            insecure_tls: true,
        }
    }
}

/// The running core: pacer, worker pool, metrics, expiry — all bound to one
/// shutdown token. One instance per process, passed around by reference; no
/// global state, so tests run several side by side.
pub struct Engine {
    metrics: Arc<MetricsEngine>,
    pacer: Pacer,
    shutdown: CancellationToken,
    workers: WorkerPool,
    background: Vec<JoinHandle<()>>,
}

impl Engine {
    /// Validates the configuration and starts dispatching over HTTP. Must be
    /// called from within a tokio runtime.
    pub fn start(config: EngineConfig, targets: Arc<TargetSet>) -> Result<Self, RuntimeError> {
        let executor = HttpExecutor::new(config.timeout, config.insecure_tls, targets.headers())?;
        Self::start_with_executor(config, targets, Arc::new(executor))
    }

    /// Same wiring with a caller-supplied executor — the seam tests use to
    /// plug deterministic executors in.
    pub fn start_with_executor(
        config: EngineConfig,
        targets: Arc<TargetSet>,
        executor: Arc<dyn Executor>,
    ) -> Result<Self, RuntimeError> {
        let scale = BucketScale::new(config.min_y_ms, config.max_y_ms, config.buckets)?;
        let metrics = Arc::new(MetricsEngine::new(scale));
        let shutdown = CancellationToken::new();

        let (pacer, ticks, pacer_task) = pacer::start(config.rate, shutdown.clone());
        let workers = dispatcher::spawn(
            config.workers,
            targets,
            executor,
            Arc::clone(&metrics),
            ticks,
            shutdown.clone(),
        );
        let expiry_task = metrics::spawn_expiry(Arc::clone(&metrics), shutdown.clone());

        Ok(Self {
            metrics,
            pacer,
            shutdown,
            workers,
            background: vec![pacer_task, expiry_task],
        })
    }

    pub fn metrics(&self) -> &Arc<MetricsEngine> {
        &self.metrics
    }

    pub fn pacer(&self) -> &Pacer {
        &self.pacer
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Graceful stop: cancels the shared token, then waits for the workers
    /// to finish their in-flight requests and the background tasks to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.workers.join().await;
        for task in self.background {
            let _ = task.await;
        }
    }
}

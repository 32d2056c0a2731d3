use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use libtargets::TargetSet;

use crate::executor::Executor;
use crate::metrics::MetricsEngine;

pub struct WorkerPool {
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub async fn join(self) {
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

pub(crate) fn spawn(
    workers: usize,
    targets: Arc<TargetSet>,
    executor: Arc<dyn Executor>,
    metrics: Arc<MetricsEngine>,
    ticks: flume::Receiver<()>,
    shutdown: CancellationToken,
) -> WorkerPool {
    let handles = (0..workers)
        .map(|worker| {
            let targets = Arc::clone(&targets);
            let executor = Arc::clone(&executor);
            let metrics = Arc::clone(&metrics);
            let ticks = ticks.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(worker_loop(
                worker, targets, executor, metrics, ticks, shutdown,
            ))
        })
        .collect();
    WorkerPool { handles }
}

/// One admission tick buys exactly one attempt, no retries. Cancellation is
/// observed only between attempts, so an in-flight request drains — bounded
/// by the client timeout — before the worker exits.
async fn worker_loop(
    worker: usize,
    targets: Arc<TargetSet>,
    executor: Arc<dyn Executor>,
    metrics: Arc<MetricsEngine>,
    ticks: flume::Receiver<()>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            tick = ticks.recv_async() => {
                if tick.is_err() {
                    break;
                }
                let template = targets.next();
                metrics.record_sent();
                let outcome = executor.execute(template).await;
                metrics.ingest(&outcome);
            }
        }
    }
    debug!(worker, "worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use async_trait::async_trait;

    use libtargets::RequestTemplate;

    use crate::executor::Outcome;
    use crate::metrics::epoch_millis;
    use crate::pacer;
    use crate::scale::BucketScale;

    struct FixedLatency {
        latency_ms: u64,
        status: u16,
    }

    #[async_trait]
    impl Executor for FixedLatency {
        async fn execute(&self, _template: &RequestTemplate) -> Outcome {
            tokio::time::sleep(Duration::from_millis(self.latency_ms)).await;
            Outcome {
                at_epoch_ms: epoch_millis(),
                elapsed: Duration::from_millis(self.latency_ms),
                status: self.status,
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn it_drives_one_worker_at_rate_ten_for_a_second() {
        let targets = Arc::new(
            TargetSet::from_reader("GET http://stub.invalid/ping\n".as_bytes(), false).unwrap(),
        );
        let metrics = Arc::new(MetricsEngine::new(BucketScale::new(0.0, 100.0, 10).unwrap()));
        let shutdown = CancellationToken::new();
        let (_pacer, ticks, pacer_task) = pacer::start(10, shutdown.clone());
        let executor = Arc::new(FixedLatency {
            latency_ms: 5,
            status: 200,
        });

        let pool = spawn(
            1,
            Arc::clone(&targets),
            executor,
            Arc::clone(&metrics),
            ticks,
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(1050)).await;
        shutdown.cancel();
        pool.join().await;
        pacer_task.await.unwrap();

        let snapshot = metrics.snapshot();
        assert!(
            (9..=11).contains(&snapshot.sent),
            "sent {} requests in one second at rate 10",
            snapshot.sent
        );
        assert_eq!(snapshot.sent, snapshot.received);

        let bucket = metrics.scale().index_of(5.0);
        assert_eq!(snapshot.ok[bucket], snapshot.received);
        assert_eq!(snapshot.failed.iter().sum::<u64>(), 0);
        assert_eq!(snapshot.responses, vec![(200, snapshot.received)]);
    }

    #[tokio::test(start_paused = true)]
    async fn it_records_failures_without_stopping_the_pool() {
        let targets = Arc::new(
            TargetSet::from_reader("GET http://stub.invalid/ping\n".as_bytes(), false).unwrap(),
        );
        let metrics = Arc::new(MetricsEngine::new(BucketScale::new(0.0, 100.0, 10).unwrap()));
        let shutdown = CancellationToken::new();
        let (_pacer, ticks, pacer_task) = pacer::start(10, shutdown.clone());
        let executor = Arc::new(FixedLatency {
            latency_ms: 2,
            status: 0,
        });

        let pool = spawn(
            2,
            Arc::clone(&targets),
            executor,
            Arc::clone(&metrics),
            ticks,
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_millis(550)).await;
        shutdown.cancel();
        pool.join().await;
        pacer_task.await.unwrap();

        let snapshot = metrics.snapshot();
        assert!(snapshot.received >= 4, "received {}", snapshot.received);
        assert_eq!(snapshot.ok.iter().sum::<u64>(), 0);
        assert_eq!(snapshot.failed.iter().sum::<u64>(), snapshot.received);
        assert_eq!(snapshot.responses, vec![(0, snapshot.received)]);
    }
}

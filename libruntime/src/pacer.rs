use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Handle to the admission-rate controller. Cheap to clone: the renderer
/// reads the rate, the input loop adjusts it.
#[derive(Clone)]
pub struct Pacer {
    desired: Arc<AtomicU64>,
    commands: mpsc::Sender<i64>,
}

impl Pacer {
    /// Current admission rate, requests per second.
    pub fn rate(&self) -> u64 {
        self.desired.load(Ordering::Relaxed)
    }

    /// Queues a signed rate delta for the coordinating task. The result
    /// clamps at zero; emission pauses there until a positive delta arrives.
    pub async fn adjust(&self, delta: i64) {
        let _ = self.commands.send(delta).await;
    }

    /// Same as [`Pacer::adjust`], callable from a plain thread (the
    /// key-input loop).
    pub fn adjust_blocking(&self, delta: i64) {
        let _ = self.commands.blocking_send(delta);
    }
}

/// Starts the coordinating task. Returns the handle, the tick stream the
/// workers consume, and the task handle the engine joins on shutdown.
pub(crate) fn start(
    initial_rate: u64,
    shutdown: CancellationToken,
) -> (Pacer, flume::Receiver<()>, JoinHandle<()>) {
    let (tick_tx, tick_rx) = flume::bounded(1);
    let (cmd_tx, cmd_rx) = mpsc::channel(1);
    let desired = Arc::new(AtomicU64::new(initial_rate));

    let task = tokio::spawn(pace(Arc::clone(&desired), cmd_rx, tick_tx, shutdown));

    (
        Pacer {
            desired,
            commands: cmd_tx,
        },
        tick_rx,
        task,
    )
}

async fn pace(
    desired: Arc<AtomicU64>,
    mut commands: mpsc::Receiver<i64>,
    ticks: flume::Sender<()>,
    shutdown: CancellationToken,
) {
    let mut interval = interval_for(desired.load(Ordering::Relaxed));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            Some(delta) = commands.recv() => {
                let current = desired.load(Ordering::Relaxed) as i64;
                let next = current.saturating_add(delta).max(0) as u64;
                desired.store(next, Ordering::Relaxed);
                // stop-and-recreate: whatever the old period had scheduled is
                // dropped, and Skip below never replays missed ticks
                interval = interval_for(next);
                debug!(rate = next, "admission rate changed");
            }
            _ = next_tick(&mut interval) => {
                // parks while every worker is busy; the ticks that would
                // have fired meanwhile are skipped
                if ticks.send_async(()).await.is_err() {
                    break;
                }
            }
        }
    }
}

fn interval_for(rate: u64) -> Option<Interval> {
    if rate == 0 {
        return None;
    }
    let period = Duration::from_nanos(1_000_000_000 / rate);
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    Some(interval)
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

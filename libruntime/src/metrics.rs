use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::executor::Outcome;
use crate::scale::BucketScale;

/// One ring slot covers 100 ms.
pub const SLICE_MILLIS: u64 = 100;
/// The ring holds the trailing ten seconds.
pub const WINDOW_SECONDS: u64 = 10;
const SLICES: usize = (WINDOW_SECONDS * 1000 / SLICE_MILLIS) as usize;

/// Cumulative status slots; slot 0 is the transport-failure marker.
const STATUS_SLOTS: usize = 1024;

struct TimeSlice {
    ok: Box<[AtomicU64]>,
    failed: Box<[AtomicU64]>,
}

impl TimeSlice {
    fn new(buckets: usize) -> Self {
        Self {
            ok: zeroed(buckets),
            failed: zeroed(buckets),
        }
    }

    fn clear(&self) {
        for cell in self.ok.iter().chain(self.failed.iter()) {
            cell.store(0, Ordering::Relaxed);
        }
    }
}

fn zeroed(len: usize) -> Box<[AtomicU64]> {
    (0..len).map(|_| AtomicU64::new(0)).collect()
}

/// Owns every counter of a run: the sliding-window latency ring, the
/// cumulative status table, and the sent/received totals. Everything is
/// atomics and every method takes `&self`, so the workers, the expiry task,
/// and the renderer share one instance with no lock near the hot path.
pub struct MetricsEngine {
    scale: BucketScale,
    slices: Box<[TimeSlice]>,
    responses: Box<[AtomicU64]>,
    sent: AtomicU64,
    received: AtomicU64,
}

/// Aggregate over the window; summed without a transaction, which is fine for
/// a dashboard refreshed ten times a second.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub ok: Vec<u64>,
    pub failed: Vec<u64>,
    /// Largest ok+failed total across buckets, for bar scaling.
    pub max_bucket_total: u64,
    /// Non-zero cumulative status counts, ascending; status 0 is transport
    /// failure.
    pub responses: Vec<(u16, u64)>,
    pub sent: u64,
    pub received: u64,
}

impl MetricsEngine {
    /// Allocated once, sized by the scale's bucket count and the fixed ring
    /// size; reset reuses the allocation.
    pub fn new(scale: BucketScale) -> Self {
        let buckets = scale.buckets();
        Self {
            scale,
            slices: (0..SLICES).map(|_| TimeSlice::new(buckets)).collect(),
            responses: zeroed(STATUS_SLOTS),
            sent: AtomicU64::new(0),
            received: AtomicU64::new(0),
        }
    }

    pub fn scale(&self) -> &BucketScale {
        &self.scale
    }

    pub fn record_sent(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn sent(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    pub fn ingest(&self, outcome: &Outcome) {
        self.received.fetch_add(1, Ordering::Relaxed);

        let bucket = self.scale.index_of(outcome.elapsed_ms());
        let slice = &self.slices[self.slot_for(outcome.at_epoch_ms)];
        let lane = if outcome.is_success() {
            &slice.ok
        } else {
            &slice.failed
        };
        lane[bucket].fetch_add(1, Ordering::Relaxed);

        // statuses outside the table are dropped rather than clamped into a
        // wrong slot
        if let Some(counter) = self.responses.get(outcome.status as usize) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn slot_for(&self, epoch_ms: u64) -> usize {
        ((epoch_ms / SLICE_MILLIS) as usize) % self.slices.len()
    }

    /// Zeroes the slot one slice ahead of `epoch_ms` — the slot the ring
    /// reuses next, currently holding the oldest data of the window. Clearing
    /// ahead of the write cursor keeps the ring a rolling window without any
    /// subtract-on-expiry pass.
    pub fn clear_slot_after(&self, epoch_ms: u64) {
        self.slices[self.slot_for(epoch_ms + SLICE_MILLIS)].clear();
    }

    pub fn snapshot(&self) -> Snapshot {
        let buckets = self.scale.buckets();
        let mut ok = vec![0u64; buckets];
        let mut failed = vec![0u64; buckets];
        for slice in self.slices.iter() {
            for (total, cell) in ok.iter_mut().zip(slice.ok.iter()) {
                *total += cell.load(Ordering::Relaxed);
            }
            for (total, cell) in failed.iter_mut().zip(slice.failed.iter()) {
                *total += cell.load(Ordering::Relaxed);
            }
        }
        let max_bucket_total = ok
            .iter()
            .zip(failed.iter())
            .map(|(ok, failed)| ok + failed)
            .max()
            .unwrap_or(0);

        let responses = self
            .responses
            .iter()
            .enumerate()
            .filter_map(|(status, cell)| {
                let count = cell.load(Ordering::Relaxed);
                (count > 0).then_some((status as u16, count))
            })
            .collect();

        Snapshot {
            ok,
            failed,
            max_bucket_total,
            responses,
            sent: self.sent.load(Ordering::Relaxed),
            received: self.received.load(Ordering::Relaxed),
        }
    }

    /// Zeroes every counter in place. The admission rate is not ours to
    /// touch.
    pub fn reset(&self) {
        self.sent.store(0, Ordering::Relaxed);
        self.received.store(0, Ordering::Relaxed);
        for slice in self.slices.iter() {
            slice.clear();
        }
        for cell in self.responses.iter() {
            cell.store(0, Ordering::Relaxed);
        }
    }
}

/// Once per slice, pre-clears the slot about to be reused.
pub(crate) fn spawn_expiry(
    metrics: Arc<MetricsEngine>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(SLICE_MILLIS));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => metrics.clear_slot_after(epoch_millis()),
            }
        }
    })
}

/// Wall-clock milliseconds since the Unix epoch.
pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

use std::fmt::Write as _;
use std::io::{Write as _, stdout};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crossterm::{cursor, execute, terminal};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use libruntime::{BucketScale, MetricsEngine, Pacer, Snapshot};

/// Screen refreshes per second.
const REFRESH_PER_SECOND: u64 = 10;
/// Columns kept for labels and counters around the bars.
const RESERVED_WIDTH: usize = 40;

const RESET: &str = "\x1b[0m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[96m";

/// Green over yellow into red, top row to bottom.
const RAMP: [&str; 12] = [
    "\x1b[38;5;46m",
    "\x1b[38;5;47m",
    "\x1b[38;5;48m",
    "\x1b[38;5;49m",
    "\x1b[38;5;149m",
    "\x1b[38;5;148m",
    "\x1b[38;5;179m",
    "\x1b[38;5;176m",
    "\x1b[38;5;169m",
    "\x1b[38;5;168m",
    "\x1b[38;5;197m",
    "\x1b[38;5;196m",
];

/// Repaints the dashboard ten times a second until shutdown.
pub(crate) async fn run(metrics: Arc<MetricsEngine>, pacer: Pacer, shutdown: CancellationToken) {
    let gauge = Arc::new(AtomicU64::new(0));
    tokio::spawn(rate_gauge(
        Arc::clone(&metrics),
        Arc::clone(&gauge),
        shutdown.clone(),
    ));

    let (cols, _) = terminal::size().unwrap_or((80, 24));
    let bar_width = (cols as usize).saturating_sub(RESERVED_WIDTH).max(1);

    let mut interval =
        tokio::time::interval(Duration::from_millis(1000 / REFRESH_PER_SECOND));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let _ = execute!(stdout(), terminal::Clear(terminal::ClearType::All));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let frame = paint(
                    &metrics.snapshot(),
                    metrics.scale(),
                    gauge.load(Ordering::Relaxed),
                    pacer.rate(),
                    bar_width,
                );
                let mut out = stdout();
                let _ = execute!(out, cursor::MoveTo(0, 0));
                let _ = out.write_all(frame.as_bytes());
                let _ = out.flush();
            }
        }
    }
}

/// Once a second: how many requests actually left in the last second.
async fn rate_gauge(
    metrics: Arc<MetricsEngine>,
    gauge: Arc<AtomicU64>,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(1));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_sent = 0u64;
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = interval.tick() => {
                let sent = metrics.sent();
                gauge.store(sent.saturating_sub(last_sent), Ordering::Relaxed);
                last_sent = sent;
            }
        }
    }
}

fn paint(
    snapshot: &Snapshot,
    scale: &BucketScale,
    current_rate: u64,
    desired_rate: u64,
    bar_width: usize,
) -> String {
    let mut frame = String::new();

    let _ = write!(frame, "sent: {:<6} ", snapshot.sent);
    let _ = write!(
        frame,
        "in-flight: {:<2} ",
        snapshot.sent.saturating_sub(snapshot.received)
    );
    let _ = write!(frame, "{CYAN}rate: {current_rate:4}/{desired_rate} RPS{RESET} ");
    frame.push_str("responses: ");
    for (status, count) in &snapshot.responses {
        let color = if (200..300).contains(status) { GREEN } else { RED };
        let _ = write!(frame, "{color}[{status}]: {count:<6}{RESET} ");
    }
    frame.push_str("\r\n\r\n");

    let per_unit = bar_width as f64 / snapshot.max_bucket_total.max(1) as f64;
    let ramp_step = RAMP.len() as f64 / scale.buckets() as f64;

    for bucket in 0..scale.buckets() {
        let ok = snapshot.ok[bucket];
        let failed = snapshot.failed[bucket];
        let ok_width = (ok as f64 * per_unit) as usize;
        let failed_width = (failed as f64 * per_unit) as usize;
        let rest = bar_width.saturating_sub(ok_width + failed_width);
        let color = RAMP[((bucket as f64 * ramp_step) as usize).min(RAMP.len() - 1)];

        let _ = write!(
            frame,
            "{:>10} ms: [{GREEN}{ok:6}{RESET}/{RED}{failed:6}{RESET}] {color}{}{}{}{RESET} \r\n",
            bucket_label(scale, bucket),
            "E".repeat(failed_width),
            "*".repeat(ok_width),
            " ".repeat(rest),
        );
    }

    frame
}

/// Axis labels follow the bucket bounds, with one decimal below ten
/// milliseconds.
fn bucket_label(scale: &BucketScale, bucket: usize) -> String {
    if bucket == 0 {
        let start = scale.start_ms();
        if start >= 10.0 {
            format!("<{start:.0}")
        } else {
            format!("<{start:.1}")
        }
    } else if bucket == scale.buckets() - 1 {
        let max_y = scale.max_y();
        if max_y >= 10.0 {
            format!("{max_y:3.0}+")
        } else {
            format!("{max_y:.1}+")
        }
    } else {
        let (begin, end) = scale.bounds_of(bucket);
        if end >= 10.0 {
            format!("{begin:3.0}-{end:3.0}")
        } else {
            format!("{begin:.1}-{end:.1}")
        }
    }
}

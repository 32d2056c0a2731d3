mod input;
mod render;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;

use libruntime::{Engine, EngineConfig};
use libtargets::TargetSet;

/// Rows above the plot: the status line and two separators.
const STATS_LINES: u16 = 3;
/// Narrower than this and the labels eat the whole plot.
const MIN_WIDTH: u16 = 40;

#[derive(Debug, Parser)]
#[command(name = "rslap")]
#[command(
    about = "Point it at a service, watch the latency histogram, retune the rate live.",
    long_about = None
)]
struct Cli {
    /// Number of parallel workers
    #[arg(long, default_value_t = 8)]
    workers: usize,

    /// Per-request timeout, seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Targets file; stdin when omitted
    #[arg(long)]
    targets: Option<String>,

    /// Bodies in the targets file are base64-encoded
    #[arg(long)]
    base64_body: bool,

    /// Initial requests per second
    #[arg(long, default_value_t = 50)]
    rate: u64,

    /// Bottom of the latency axis, milliseconds
    #[arg(long, default_value_t = 0)]
    min_y: u64,

    /// Top of the latency axis, milliseconds
    #[arg(long, default_value_t = 100)]
    max_y: u64,

    /// Fixed header `Key: value` set on every request; repeat for more
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Verify TLS certificates (off by default: the traffic is synthetic)
    #[arg(long)]
    verify_tls: bool,
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let targets = Arc::new(load_targets(&cli)?);

    let (cols, rows) = crossterm::terminal::size().unwrap_or((80, 24));
    if cols < MIN_WIDTH {
        anyhow::bail!("not enough screen width, min {MIN_WIDTH} columns required");
    }

    let config = EngineConfig {
        workers: cli.workers,
        rate: cli.rate,
        timeout: Duration::from_secs(cli.timeout),
        min_y_ms: cli.min_y as f64,
        max_y_ms: cli.max_y as f64,
        buckets: rows.saturating_sub(STATS_LINES) as usize,
        insecure_tls: !cli.verify_tls,
    };

    let runtime = tokio::runtime::Runtime::new().context("failed to start the async runtime")?;
    let engine = {
        let _guard = runtime.enter();
        Engine::start(config, Arc::clone(&targets))?
    };

    runtime.spawn(render::run(
        Arc::clone(engine.metrics()),
        engine.pacer().clone(),
        engine.shutdown_token(),
    ));

    input::listen(engine.metrics(), engine.pacer())?;

    runtime.block_on(engine.shutdown());
    Ok(())
}

fn load_targets(cli: &Cli) -> anyhow::Result<TargetSet> {
    let headers = cli
        .headers
        .iter()
        .map(|raw| libtargets::parse_header(raw))
        .collect::<Result<Vec<_>, _>>()?;

    let targets = match cli.targets.as_deref() {
        Some(path) => TargetSet::from_path(path, cli.base64_body)
            .with_context(|| format!("reading targets from {path}"))?,
        None => TargetSet::from_reader(std::io::stdin().lock(), cli.base64_body)
            .context("reading targets from stdin")?,
    };
    Ok(targets.with_headers(headers))
}

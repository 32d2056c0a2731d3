use std::sync::Arc;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use libruntime::{MetricsEngine, Pacer};

/// One key press, one step.
const RATE_STEP: i64 = 100;

/// Blocks on the keyboard until `q` or Ctrl-C. `r` resets the counters,
/// `k`/`j` move the admission rate up and down.
pub(crate) fn listen(metrics: &Arc<MetricsEngine>, pacer: &Pacer) -> anyhow::Result<()> {
    terminal::enable_raw_mode()?;
    let result = listen_inner(metrics, pacer);
    terminal::disable_raw_mode()?;
    result
}

fn listen_inner(metrics: &Arc<MetricsEngine>, pacer: &Pacer) -> anyhow::Result<()> {
    loop {
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char('q') => break,
            KeyCode::Char('r') => metrics.reset(),
            KeyCode::Char('k') => pacer.adjust_blocking(RATE_STEP),
            KeyCode::Char('j') => pacer.adjust_blocking(-RATE_STEP),
            _ => {}
        }
    }
    Ok(())
}

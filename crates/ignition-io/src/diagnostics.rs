//! Human-readable diagnostic reporter.
//!
//! Lines are built from the latest published snapshot on a reporter thread,
//! so formatting and log output never run on the control thread.

use ignition_core::{EngineSnapshot, StateExchange, CYLINDER_COUNT};
use std::fmt::Write;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    pub interval: Duration,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
        }
    }
}

fn bits(values: &[bool; CYLINDER_COUNT]) -> String {
    values
        .iter()
        .map(|v| if *v { "1" } else { "0" })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Format a snapshot as one diagnostic line.
pub fn format_line(snapshot: &EngineSnapshot) -> String {
    let mut line = String::with_capacity(128);
    let _ = write!(
        line,
        "[{}] Position: {} | Coils: {} | Dwell: ",
        snapshot.mode,
        bits(&snapshot.inputs.position_active),
        bits(&snapshot.outputs.coils),
    );
    let dwell = snapshot
        .dwell_us
        .iter()
        .map(|us| format!("{:.1}ms", *us as f64 / 1000.0))
        .collect::<Vec<_>>()
        .join(", ");
    line.push_str(&dwell);
    let _ = write!(
        line,
        " | Trigger: {} | Tacho: {}",
        u8::from(snapshot.inputs.trigger_high),
        u8::from(snapshot.outputs.tacho),
    );
    line
}

/// Emit a diagnostic line every `config.interval` until `stop` is raised.
pub fn run_diagnostics(
    exchange: Arc<StateExchange>,
    config: DiagnosticsConfig,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while !stop.load(Ordering::Relaxed) {
            let snapshot = exchange.read_state();
            if snapshot.cycle_count > 0 {
                info!(
                    target: "ignition::diag",
                    cycle = snapshot.cycle_count,
                    safe_fail_trips = snapshot.stats.safe_fail_trips,
                    "{}",
                    format_line(&snapshot)
                );
            }
            thread::sleep(config.interval);
        }
    })
}

use crate::metrics::BENCH_COMMANDS;
use ignition_core::BenchSignals;
use std::io::{ErrorKind, Read};
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::thread;
use tracing::{info, warn};

/// Apply bench commands from `reader` until EOF or `stop`.
/// Returns the number of commands applied.
pub fn pump_commands<R: Read>(
    mut reader: R,
    signals: &BenchSignals,
    stop: &AtomicBool,
) -> std::io::Result<u64> {
    let mut buf = [0u8; 64];
    let mut applied = 0u64;
    while !stop.load(Ordering::Relaxed) {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let count = signals.apply_bytes(&buf[..n]) as u64;
                BENCH_COMMANDS.inc_by(count);
                applied += count;
            }
            Err(err) if err.kind() == ErrorKind::Interrupted => {}
            Err(err) => return Err(err),
        }
    }
    Ok(applied)
}

/// Read bench commands from stdin on a dedicated thread.
///
/// The thread blocks in `read`, so it is not joined on shutdown.
pub fn spawn_stdin_reader(
    signals: Arc<BenchSignals>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        info!("Reading bench commands from stdin (h/l trigger, 1-4 on, q-t off)");
        match pump_commands(std::io::stdin().lock(), &signals, &stop) {
            Ok(applied) => info!(applied, "stdin closed"),
            Err(err) => warn!(error = %err, "stdin read error"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn pump_applies_commands_until_eof() {
        let signals = BenchSignals::new();
        let stop = AtomicBool::new(false);
        let applied = pump_commands(Cursor::new(b"h12x\nq".to_vec()), &signals, &stop).unwrap();
        assert_eq!(applied, 4);
        let frame = signals.frame();
        assert!(frame.trigger_high);
        assert_eq!(frame.position_active, [false, true, false, false]);
    }

    #[test]
    fn pump_returns_immediately_when_stopped() {
        let signals = BenchSignals::new();
        let stop = AtomicBool::new(true);
        let applied = pump_commands(Cursor::new(b"h".to_vec()), &signals, &stop).unwrap();
        assert_eq!(applied, 0);
        assert!(!signals.frame().trigger_high);
    }
}

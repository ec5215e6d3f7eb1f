use ignition_core::StateExchange;
use ignition_io::metrics::{init_metrics, record_snapshot, serve_metrics, SnapshotCursor};
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::thread;
use std::time::Duration;
use tracing::info;

pub fn init() {
    init_metrics();
}

pub fn start_metrics_server(addr: &Option<String>) -> Option<thread::JoinHandle<()>> {
    addr.as_ref().map(|addr| {
        info!(addr = %addr, "Starting metrics server");
        serve_metrics(addr.clone())
    })
}

pub fn start_metrics_updater(
    exchange: Arc<StateExchange>,
    stop: Arc<AtomicBool>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut cursor = SnapshotCursor::default();
        while !stop.load(Ordering::Relaxed) {
            record_snapshot(&exchange.read_state(), &mut cursor);
            thread::sleep(Duration::from_millis(200));
        }
        record_snapshot(&exchange.read_state(), &mut cursor);
    })
}

//! Prometheus metrics for the ignition controller.
//!
//! The control thread never touches this registry. A reporter thread copies
//! counter deltas and gauges out of the latest engine snapshot.

use ignition_core::{EngineSnapshot, CYLINDER_COUNT};
use prometheus::{
    Encoder, Gauge, GaugeVec, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;
use std::thread;
use tiny_http::{Response, Server};

/// Global metrics registry
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

fn register_counter(name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).unwrap();
    REGISTRY.register(Box::new(counter.clone())).unwrap();
    counter
}

fn register_gauge(name: &str, help: &str) -> Gauge {
    let gauge = Gauge::new(name, help).unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
}

// ============================================================================
// Control Loop Metrics
// ============================================================================

/// Total control loop cycles executed
pub static CYCLES_EXECUTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_cycles_executed_total",
        "Total control loop cycles executed",
    )
});

/// Worst cycle time observed so far
pub static MAX_CYCLE_US: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge(
        "ignition_max_cycle_microseconds",
        "Longest control cycle observed in microseconds",
    )
});

/// Sampled cycle time distribution in microseconds
pub static CYCLE_TIME_US: LazyLock<Histogram> = LazyLock::new(|| {
    let histogram = Histogram::with_opts(
        HistogramOpts::new(
            "ignition_cycle_time_microseconds",
            "Sampled control cycle time in microseconds",
        )
        .buckets(vec![1.0, 2.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 1000.0]),
    )
    .unwrap();
    REGISTRY.register(Box::new(histogram.clone())).unwrap();
    histogram
});

/// Cycles that exceeded the cycle budget
pub static CYCLE_OVERRUNS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_cycle_overruns_total",
        "Control cycles that exceeded the cycle budget",
    )
});

/// Cycles skipped because the I/O adapter reported unhealthy
pub static IO_FAULTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_io_faults_total",
        "Control cycles run with unhealthy I/O (all coils held low)",
    )
});

pub static SKIPPED_PUBLISHES: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_snapshot_publishes_skipped_total",
        "Snapshot publishes dropped because a reader held the slot",
    )
});

// ============================================================================
// Coil Metrics
// ============================================================================

pub static DWELLS_STARTED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("ignition_dwells_started_total", "Coil dwell periods started")
});

pub static SPARKS_FIRED: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter("ignition_sparks_fired_total", "Coils released on command")
});

/// Coils forced off by the safe-fail timeout
pub static SAFE_FAIL_TRIPS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_safe_fail_trips_total",
        "Coils forced off after exceeding the safe-fail dwell limit",
    )
});

/// Dwell aborted because the position sensor went inactive
pub static SENSOR_ABORTS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_sensor_aborts_total",
        "Dwell periods aborted by position sensor loss",
    )
});

/// Coil driver state per cylinder (1 = energised)
pub static COIL_OUTPUT: LazyLock<GaugeVec> = LazyLock::new(|| {
    let gauge = GaugeVec::new(
        Opts::new("ignition_coil_output", "Coil driver state (1=energised)"),
        &["cylinder"],
    )
    .unwrap();
    REGISTRY.register(Box::new(gauge.clone())).unwrap();
    gauge
});

pub static TRIGGER_HIGH: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge("ignition_trigger_high", "Ignition trigger line state (1=high)")
});

/// Bench bridge client connection status (1 = connected, 0 = disconnected)
pub static BRIDGE_CONNECTED: LazyLock<Gauge> = LazyLock::new(|| {
    register_gauge(
        "ignition_bench_bridge_connected",
        "Bench bridge client connection status (1=connected, 0=disconnected)",
    )
});

pub static BENCH_COMMANDS: LazyLock<IntCounter> = LazyLock::new(|| {
    register_counter(
        "ignition_bench_commands_total",
        "Bench commands applied to the simulated sensors",
    )
});

/// Last snapshot counters seen, so the registry only receives deltas.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotCursor {
    cycles: u64,
    overruns: u64,
    io_faults: u64,
    skipped: u64,
    dwells: u64,
    sparks: u64,
    safe_fails: u64,
    aborts: u64,
}

fn delta(counter: &IntCounter, last: &mut u64, current: u64) {
    if current > *last {
        counter.inc_by(current - *last);
        *last = current;
    }
}

/// Copy one snapshot into the registry.
pub fn record_snapshot(snapshot: &EngineSnapshot, cursor: &mut SnapshotCursor) {
    delta(&CYCLES_EXECUTED, &mut cursor.cycles, snapshot.cycle_count);
    delta(&CYCLE_OVERRUNS, &mut cursor.overruns, snapshot.overruns);
    delta(&IO_FAULTS, &mut cursor.io_faults, snapshot.io_faults);
    delta(&SKIPPED_PUBLISHES, &mut cursor.skipped, snapshot.skipped_publishes);
    delta(&DWELLS_STARTED, &mut cursor.dwells, snapshot.stats.dwells_started);
    delta(&SPARKS_FIRED, &mut cursor.sparks, snapshot.stats.sparks_fired);
    delta(&SAFE_FAIL_TRIPS, &mut cursor.safe_fails, snapshot.stats.safe_fail_trips);
    delta(&SENSOR_ABORTS, &mut cursor.aborts, snapshot.stats.sensor_aborts);

    CYCLE_TIME_US.observe(snapshot.last_cycle_us as f64);
    MAX_CYCLE_US.set(snapshot.max_cycle_us as f64);
    TRIGGER_HIGH.set(if snapshot.inputs.trigger_high { 1.0 } else { 0.0 });
    for i in 0..CYLINDER_COUNT {
        let label = (i + 1).to_string();
        let value = if snapshot.outputs.coils[i] { 1.0 } else { 0.0 };
        COIL_OUTPUT.with_label_values(&[label.as_str()]).set(value);
    }
}

// ============================================================================
// Metrics HTTP Server
// ============================================================================

/// Start the metrics HTTP server on the given address.
/// Returns a join handle for the server thread.
pub fn serve_metrics(bind_addr: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let server = match Server::http(&bind_addr) {
            Ok(s) => s,
            Err(e) => {
                tracing::error!("Failed to start metrics server on {}: {}", bind_addr, e);
                return;
            }
        };

        tracing::info!("Metrics server listening on http://{}/metrics", bind_addr);

        for request in server.incoming_requests() {
            match request.url() {
                "/metrics" => {
                    let encoder = TextEncoder::new();
                    let mut buffer = Vec::new();

                    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
                        tracing::warn!("Failed to encode metrics: {}", e);
                        let _ = request.respond(
                            Response::from_string("Internal Server Error").with_status_code(500),
                        );
                        continue;
                    }

                    let mut response = Response::from_data(buffer);
                    if let Ok(header) = tiny_http::Header::from_bytes(
                        &b"Content-Type"[..],
                        &b"text/plain; version=0.0.4"[..],
                    ) {
                        response = response.with_header(header);
                    }
                    let _ = request.respond(response);
                }
                "/health" => {
                    let _ = request.respond(Response::from_string("OK"));
                }
                "/ready" => {
                    // Ready once the control loop has run at least one cycle
                    if CYCLES_EXECUTED.get() > 0 {
                        let _ = request.respond(Response::from_string("Ready"));
                    } else {
                        let _ = request
                            .respond(Response::from_string("Not Ready").with_status_code(503));
                    }
                }
                _ => {
                    let _ =
                        request.respond(Response::from_string("Not Found").with_status_code(404));
                }
            }
        }
    })
}

/// Initialize all metrics (forces lazy initialization)
pub fn init_metrics() {
    let _ = CYCLES_EXECUTED.get();
    let _ = CYCLE_OVERRUNS.get();
    let _ = IO_FAULTS.get();
    let _ = SKIPPED_PUBLISHES.get();
    let _ = MAX_CYCLE_US.get();
    let _ = CYCLE_TIME_US.get_sample_count();
    let _ = DWELLS_STARTED.get();
    let _ = SPARKS_FIRED.get();
    let _ = SAFE_FAIL_TRIPS.get();
    let _ = SENSOR_ABORTS.get();
    let _ = TRIGGER_HIGH.get();
    let _ = BRIDGE_CONNECTED.get();
    let _ = BENCH_COMMANDS.get();
    for i in 1..=CYLINDER_COUNT {
        let _ = COIL_OUTPUT.with_label_values(&[i.to_string().as_str()]).get();
    }
}

use crate::runtime::config::RuntimeConfig;
use crate::runtime::logging::init_tracing;
use crate::runtime::telemetry;
use ignition_core::{
    BenchSignals, CoilEngine, CoilOutputs, ExecutionStats, IgnitionIO, IgnitionLoop, LoopConfig,
    SensorFrame, SimulatedIgnition, StateExchange, TimeBase,
};
use ignition_io::bridge::{BenchBridge, BridgeConfig, BridgeError};
use ignition_io::diagnostics::{run_diagnostics, DiagnosticsConfig};
#[cfg(feature = "modbus")]
use ignition_io::hal_modbus::{ModbusConfig, ModbusError, ModbusIgnition};
use ignition_io::stdin::spawn_stdin_reader;
use std::process::ExitCode;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[cfg(feature = "modbus")]
    #[error(transparent)]
    Modbus(#[from] ModbusError),
    #[cfg(not(feature = "modbus"))]
    #[error("--modbus requires the `modbus` feature")]
    ModbusUnavailable,
    #[error("control thread panicked")]
    ControlThread,
}

enum IgnitionHardware {
    Simulated(SimulatedIgnition),
    #[cfg(feature = "modbus")]
    Modbus(ModbusIgnition),
}

impl IgnitionIO for IgnitionHardware {
    fn read_inputs(&mut self) -> SensorFrame {
        match self {
            Self::Simulated(io) => io.read_inputs(),
            #[cfg(feature = "modbus")]
            Self::Modbus(io) => io.read_inputs(),
        }
    }

    fn write_outputs(&mut self, outputs: &CoilOutputs) {
        match self {
            Self::Simulated(io) => io.write_outputs(outputs),
            #[cfg(feature = "modbus")]
            Self::Modbus(io) => io.write_outputs(outputs),
        }
    }

    fn is_healthy(&self) -> bool {
        match self {
            Self::Simulated(io) => io.is_healthy(),
            #[cfg(feature = "modbus")]
            Self::Modbus(io) => io.is_healthy(),
        }
    }
}

pub fn run_from_args() -> ExitCode {
    let config = match RuntimeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("ignition-ctl: {e}");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        RuntimeConfig::print_help();
        return ExitCode::SUCCESS;
    }

    let _log_guard = init_tracing(config.json_logs);
    match run(config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "ignition-ctl failed");
            ExitCode::FAILURE
        }
    }
}

fn build_hardware(
    config: &RuntimeConfig,
    signals: &Arc<BenchSignals>,
) -> Result<IgnitionHardware, AppError> {
    match &config.modbus_addr {
        #[cfg(feature = "modbus")]
        Some(addr) => {
            info!(
                addr = %addr,
                hall_active_low = config.hall_active_low,
                "Connecting to Modbus I/O"
            );
            let io = ModbusIgnition::new(ModbusConfig {
                addr: addr.clone(),
                hall_active_low: config.hall_active_low,
                ..Default::default()
            })?;
            Ok(IgnitionHardware::Modbus(io))
        }
        #[cfg(not(feature = "modbus"))]
        Some(_) => Err(AppError::ModbusUnavailable),
        None => Ok(IgnitionHardware::Simulated(SimulatedIgnition::new(
            Arc::clone(signals),
        ))),
    }
}

pub fn run(config: RuntimeConfig) -> Result<ExecutionStats, AppError> {
    telemetry::init();
    let _metrics_handle = telemetry::start_metrics_server(&config.metrics_addr);

    let exchange = Arc::new(StateExchange::new());
    let signals = Arc::new(BenchSignals::new());
    let timebase = TimeBase::new();
    let stop = Arc::new(AtomicBool::new(false));

    let io = build_hardware(&config, &signals)?;
    let simulated = matches!(io, IgnitionHardware::Simulated(_));

    // Bind before the control loop starts so a busy port fails the run.
    let bridge = if config.bench_enabled {
        let bridge = BenchBridge::bind(
            Arc::clone(&signals),
            Arc::clone(&exchange),
            timebase,
            BridgeConfig {
                bind_addr: config.bench_bind.clone(),
                ..Default::default()
            },
        )?;
        Some(bridge)
    } else {
        info!("Bench bridge disabled");
        None
    };
    if !simulated && (bridge.is_some() || config.stdin_commands) {
        warn!("Bench commands have no effect while driving Modbus hardware");
    }

    let loop_config = LoopConfig {
        poll_interval: config.poll_interval,
        ..Default::default()
    };
    info!(
        mode = %config.mode,
        simulated,
        poll_interval_us = config.poll_interval.map(|d| d.as_micros() as u64),
        "Starting coil control loop"
    );

    let exchange_ctl = Arc::clone(&exchange);
    let stop_ctl = Arc::clone(&stop);
    let mode = config.mode;
    let control_handle = thread::Builder::new()
        .name("coil-control".to_string())
        .spawn(move || {
            let engine = CoilEngine::new(mode);
            let mut control = IgnitionLoop::new(io, engine, exchange_ctl, timebase, loop_config);
            control.run(&stop_ctl);
            control.stats().clone()
        })
        .map_err(|_| AppError::ControlThread)?;

    let bridge_handle = bridge.map(|bridge| {
        let stop_bridge = Arc::clone(&stop);
        thread::spawn(move || bridge.run(stop_bridge))
    });

    if config.stdin_commands {
        // Blocks in read(); never joined.
        let _ = spawn_stdin_reader(Arc::clone(&signals), Arc::clone(&stop));
    }

    let diag_handle = config.diag_enabled.then(|| {
        run_diagnostics(
            Arc::clone(&exchange),
            DiagnosticsConfig {
                interval: config.diag_interval,
            },
            Arc::clone(&stop),
        )
    });

    let metrics_updater = config
        .metrics_addr
        .is_some()
        .then(|| telemetry::start_metrics_updater(Arc::clone(&exchange), Arc::clone(&stop)));

    info!("Ignition controller running");

    if let Some(seconds) = config.run_seconds {
        info!(seconds, "Running for limited duration");
        thread::sleep(Duration::from_secs(seconds));
        stop.store(true, Ordering::Relaxed);
    }

    let stats = control_handle.join().map_err(|_| AppError::ControlThread)?;
    for handle in [bridge_handle, diag_handle, metrics_updater]
        .into_iter()
        .flatten()
    {
        let _ = handle.join();
    }

    let final_state = exchange.read_state();
    info!(
        cycles_executed = stats.cycles_executed,
        overruns = stats.overruns,
        io_faults = stats.io_faults,
        max_cycle_us = stats.max_cycle_us,
        sparks_fired = final_state.stats.sparks_fired,
        safe_fail_trips = final_state.stats.safe_fail_trips,
        sensor_aborts = final_state.stats.sensor_aborts,
        "Run complete"
    );
    Ok(stats)
}

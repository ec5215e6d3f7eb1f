//! Modbus TCP hardware adapter.
//!
//! A background task polls a remote I/O module and mirrors its state into
//! memory; the control loop only touches the mirror. Sensor samples are
//! therefore up to one poll interval plus one network round trip old, and
//! coil edges reach the pins with the same delay. That jitter is inherent to
//! the transport and is not compensated.
//!
//! Dropping [`ModbusIgnition`] stops the task and writes every coil low on the
//! module before the runtime is torn down. It must not be dropped from inside
//! an async context.

use ignition_core::{CoilOutputs, IgnitionIO, SensorFrame, CYLINDER_COUNT};
use std::net::{AddrParseError, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Runtime;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;
use tracing::{error, info, warn};

/// Position sensors plus the trigger line.
const INPUT_COUNT: u16 = CYLINDER_COUNT as u16 + 1;

#[derive(Debug, Clone)]
pub struct ModbusConfig {
    pub addr: String,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    /// Upper bound on the final all-low write when the adapter is dropped.
    pub shutdown_timeout: Duration,
    /// Hall sensors pull the line low when active.
    pub hall_active_low: bool,
    /// First discrete input: positions 1-4 then the trigger.
    pub input_base: u16,
    /// First coil: drivers 1-4 then the tachometer.
    pub coil_base: u16,
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:502".to_string(),
            poll_interval: Duration::from_millis(2),
            reconnect_delay: Duration::from_millis(500),
            shutdown_timeout: Duration::from_millis(250),
            hall_active_low: true,
            input_base: 0,
            coil_base: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModbusError {
    #[error("invalid Modbus address {addr}: {source}")]
    InvalidAddr {
        addr: String,
        #[source]
        source: AddrParseError,
    },
    #[error("failed to create Modbus runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

#[derive(Clone, Debug, Default)]
struct SharedState {
    inputs: SensorFrame,
    outputs: CoilOutputs,
    connected: bool,
}

/// Map raw discrete inputs to a sensor frame.
pub fn decode_inputs(raw: &[bool], hall_active_low: bool) -> Option<SensorFrame> {
    if raw.len() < INPUT_COUNT as usize {
        return None;
    }
    Some(SensorFrame {
        position_active: std::array::from_fn(|i| raw[i] != hall_active_low),
        trigger_high: raw[CYLINDER_COUNT],
    })
}

/// Map outputs to the coil block written to the module.
pub fn encode_outputs(outputs: &CoilOutputs) -> [bool; CYLINDER_COUNT + 1] {
    let mut coils = [false; CYLINDER_COUNT + 1];
    coils[..CYLINDER_COUNT].copy_from_slice(&outputs.coils);
    coils[CYLINDER_COUNT] = outputs.tacho;
    coils
}

pub struct ModbusIgnition {
    state: Arc<Mutex<SharedState>>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
    shutdown_timeout: Duration,
    runtime: Runtime,
}

impl ModbusIgnition {
    pub fn new(config: ModbusConfig) -> Result<Self, ModbusError> {
        let socket_addr: SocketAddr =
            config.addr.parse().map_err(|source| ModbusError::InvalidAddr {
                addr: config.addr.clone(),
                source,
            })?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("modbus-io")
            .enable_all()
            .build()?;

        let state = Arc::new(Mutex::new(SharedState::default()));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let shutdown_timeout = config.shutdown_timeout;
        let task = runtime.spawn(poll_module(
            socket_addr,
            config,
            Arc::clone(&state),
            shutdown_rx,
        ));

        Ok(Self {
            state,
            shutdown: Some(shutdown_tx),
            task: Some(task),
            shutdown_timeout,
            runtime,
        })
    }

    /// Stop polling and drive every module coil low, waiting at most
    /// `shutdown_timeout` for the write to land.
    fn shutdown(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        match self.runtime.block_on(timeout(self.shutdown_timeout, task)) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(error = %e, "Modbus poll task failed"),
            Err(_) => warn!(
                timeout_ms = self.shutdown_timeout.as_millis() as u64,
                "Timed out releasing Modbus coils"
            ),
        }
        set_connected(&self.state, false);
    }
}

impl Drop for ModbusIgnition {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn set_connected(state: &Mutex<SharedState>, connected: bool) {
    if let Ok(mut s) = state.lock() {
        s.connected = connected;
        if !connected {
            s.inputs = SensorFrame::default();
        }
    }
}

enum SessionEnd {
    Shutdown,
    Lost,
}

async fn release_coils(ctx: &mut Context, config: &ModbusConfig) {
    let low = encode_outputs(&CoilOutputs::ALL_LOW);
    match ctx.write_multiple_coils(config.coil_base, &low).await {
        Ok(()) => info!("Modbus coils released"),
        Err(e) => warn!(error = %e, "Failed to release Modbus coils"),
    }
}

/// Connect once more just to drive the coils low.
async fn release_disconnected(addr: SocketAddr, config: &ModbusConfig) {
    match tcp::connect(addr).await {
        Ok(mut ctx) => release_coils(&mut ctx, config).await,
        Err(e) => warn!(%addr, error = %e, "Could not reach Modbus module to release coils"),
    }
}

async fn mirror_module(
    ctx: &mut Context,
    config: &ModbusConfig,
    state: &Mutex<SharedState>,
    shutdown: &mut oneshot::Receiver<()>,
) -> SessionEnd {
    let mut ticker = interval(config.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut written: Option<[bool; CYLINDER_COUNT + 1]> = None;

    loop {
        tokio::select! {
            biased;
            _ = &mut *shutdown => return SessionEnd::Shutdown,
            _ = ticker.tick() => {}
        }

        match ctx.read_discrete_inputs(config.input_base, INPUT_COUNT).await {
            Ok(raw) => match decode_inputs(&raw, config.hall_active_low) {
                Some(frame) => {
                    if let Ok(mut s) = state.lock() {
                        s.inputs = frame;
                        s.connected = true;
                    }
                }
                None => warn!(len = raw.len(), "Short Modbus discrete input response"),
            },
            Err(e) => {
                warn!(error = %e, "Modbus read failed");
                return SessionEnd::Lost;
            }
        }

        let desired = match state.lock() {
            Ok(s) => encode_outputs(&s.outputs),
            Err(_) => encode_outputs(&CoilOutputs::ALL_LOW),
        };
        if written != Some(desired) {
            if let Err(e) = ctx.write_multiple_coils(config.coil_base, &desired).await {
                warn!(error = %e, "Modbus write failed");
                return SessionEnd::Lost;
            }
            written = Some(desired);
        }
    }
}

async fn poll_module(
    addr: SocketAddr,
    config: ModbusConfig,
    state: Arc<Mutex<SharedState>>,
    mut shutdown: oneshot::Receiver<()>,
) {
    loop {
        let connected = tokio::select! {
            biased;
            _ = &mut shutdown => {
                release_disconnected(addr, &config).await;
                return;
            }
            res = tcp::connect(addr) => res,
        };

        match connected {
            Ok(mut ctx) => {
                info!(%addr, "Connected to Modbus TCP");
                match mirror_module(&mut ctx, &config, &state, &mut shutdown).await {
                    SessionEnd::Shutdown => {
                        release_coils(&mut ctx, &config).await;
                        return;
                    }
                    SessionEnd::Lost => set_connected(&state, false),
                }
            }
            Err(e) => error!(%addr, error = %e, "Failed to connect to Modbus TCP"),
        }

        tokio::select! {
            biased;
            _ = &mut shutdown => {
                release_disconnected(addr, &config).await;
                return;
            }
            _ = sleep(config.reconnect_delay) => {}
        }
    }
}

impl IgnitionIO for ModbusIgnition {
    fn read_inputs(&mut self) -> SensorFrame {
        self.state.lock().map(|s| s.inputs).unwrap_or_default()
    }

    fn write_outputs(&mut self, outputs: &CoilOutputs) {
        if let Ok(mut s) = self.state.lock() {
            s.outputs = *outputs;
        }
    }

    fn is_healthy(&self) -> bool {
        self.state.lock().map(|s| s.connected).unwrap_or(false)
    }
}

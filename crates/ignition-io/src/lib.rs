pub mod bridge;
pub mod diagnostics;
#[cfg(feature = "modbus")]
pub mod hal_modbus;
pub mod metrics;
pub mod protocol;
pub mod stdin;

pub use bridge::{run_bridge, BenchBridge, BridgeConfig, BridgeError};
pub use diagnostics::{format_line, run_diagnostics, DiagnosticsConfig};
#[cfg(feature = "modbus")]
pub use hal_modbus::{ModbusConfig, ModbusError, ModbusIgnition};
pub use metrics::{init_metrics, record_snapshot, serve_metrics, SnapshotCursor};
pub use protocol::{ProtocolVersion, StateMsg};
pub use stdin::{pump_commands, spawn_stdin_reader};

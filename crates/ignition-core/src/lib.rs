pub mod bench;
pub mod coil;
pub mod control_loop;
pub mod engine;
mod engine_proptest;
pub mod hal;
#[cfg(feature = "simulation")]
pub mod hal_sim;
pub mod sync;
pub mod timebase;

pub use bench::BenchCommand;
pub use coil::{CoilEvent, CoilMode, Cylinder, ModeParseError, DWELL_TIME_US, SAFE_FAIL_TIME_US};
pub use control_loop::{ExecutionStats, IgnitionLoop, LoopConfig};
pub use engine::{CoilEngine, CoilOutputs, EngineSnapshot, EngineStats, SensorFrame, CYLINDER_COUNT};
pub use hal::IgnitionIO;
#[cfg(feature = "simulation")]
pub use hal_sim::SimulatedIgnition;
pub use sync::{BenchSignals, StateExchange};
pub use timebase::{Micros, TimeBase};

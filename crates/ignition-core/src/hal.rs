use crate::engine::{CoilOutputs, SensorFrame};

/// Pin-level access to the ignition hardware (or a stand-in for it).
pub trait IgnitionIO: Send {
    /// Sample every position sensor and the trigger line.
    fn read_inputs(&mut self) -> SensorFrame;
    /// Drive the coil drivers and the tachometer line.
    fn write_outputs(&mut self, outputs: &CoilOutputs);
    fn is_healthy(&self) -> bool;
}

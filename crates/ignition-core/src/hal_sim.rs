use crate::engine::{CoilOutputs, SensorFrame};
use crate::hal::IgnitionIO;
use crate::sync::BenchSignals;
use std::sync::Arc;

/// Bench stand-in for the ignition hardware.
///
/// Inputs come from [`BenchSignals`], which the bench command stream updates
/// from another thread; outputs are latched for inspection.
#[derive(Debug, Clone)]
pub struct SimulatedIgnition {
    signals: Arc<BenchSignals>,
    outputs: CoilOutputs,
}

impl SimulatedIgnition {
    pub fn new(signals: Arc<BenchSignals>) -> Self {
        Self {
            signals,
            outputs: CoilOutputs::ALL_LOW,
        }
    }

    /// Last outputs written by the control loop.
    pub fn outputs(&self) -> CoilOutputs {
        self.outputs
    }
}

impl Default for SimulatedIgnition {
    fn default() -> Self {
        Self::new(Arc::new(BenchSignals::new()))
    }
}

impl IgnitionIO for SimulatedIgnition {
    fn read_inputs(&mut self) -> SensorFrame {
        self.signals.frame()
    }

    fn write_outputs(&mut self, outputs: &CoilOutputs) {
        self.outputs = *outputs;
    }

    fn is_healthy(&self) -> bool {
        true
    }
}

use crate::coil::{CoilEvent, CoilMode, Cylinder};
use crate::timebase::Micros;
use serde::{Deserialize, Serialize};

pub const CYLINDER_COUNT: usize = 4;

/// Inputs sampled once per control cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SensorFrame {
    pub position_active: [bool; CYLINDER_COUNT],
    pub trigger_high: bool,
}

/// Outputs driven once per control cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoilOutputs {
    pub coils: [bool; CYLINDER_COUNT],
    pub tacho: bool,
}

impl CoilOutputs {
    pub const ALL_LOW: CoilOutputs = CoilOutputs {
        coils: [false; CYLINDER_COUNT],
        tacho: false,
    };
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    pub cycles_evaluated: u64,
    pub dwells_started: u64,
    pub sparks_fired: u64,
    pub safe_fail_trips: u64,
    pub sensor_aborts: u64,
}

impl EngineStats {
    fn record(&mut self, event: CoilEvent) {
        match event {
            CoilEvent::None => {}
            CoilEvent::DwellStarted => self.dwells_started += 1,
            CoilEvent::Fired => self.sparks_fired += 1,
            CoilEvent::SafeFail => self.safe_fail_trips += 1,
            CoilEvent::SensorAbort => self.sensor_aborts += 1,
        }
    }
}

/// Point-in-time view of the engine for diagnostics and telemetry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    pub timestamp_us: u64,
    pub cycle_count: u64,
    pub mode: CoilMode,
    pub inputs: SensorFrame,
    pub outputs: CoilOutputs,
    pub dwell_us: [u32; CYLINDER_COUNT],
    pub stats: EngineStats,
    pub last_cycle_us: u32,
    pub max_cycle_us: u32,
    /// Loop-level counters, filled in by the control loop.
    pub overruns: u64,
    pub io_faults: u64,
    pub skipped_publishes: u64,
}

/// Coil timing engine for all cylinders.
///
/// Cylinders are evaluated in index order and share nothing but the trigger
/// sample, so a trigger drop fires every coil that is dwelling at that moment.
#[derive(Debug, Clone)]
pub struct CoilEngine {
    mode: CoilMode,
    cylinders: [Cylinder; CYLINDER_COUNT],
    last_inputs: SensorFrame,
    outputs: CoilOutputs,
    stats: EngineStats,
}

impl CoilEngine {
    pub fn new(mode: CoilMode) -> Self {
        Self {
            mode,
            cylinders: [Cylinder::new(); CYLINDER_COUNT],
            last_inputs: SensorFrame::default(),
            outputs: CoilOutputs::ALL_LOW,
            stats: EngineStats::default(),
        }
    }

    pub fn mode(&self) -> CoilMode {
        self.mode
    }

    /// Run one control cycle and return the outputs to drive.
    pub fn evaluate(&mut self, frame: &SensorFrame, now: Micros) -> CoilOutputs {
        for (i, cylinder) in self.cylinders.iter_mut().enumerate() {
            let active = frame.position_active[i];
            let event = match self.mode {
                CoilMode::TriggerGated => {
                    cylinder.step_trigger_gated(active, frame.trigger_high, now)
                }
                CoilMode::FixedDwell => cylinder.step_fixed_dwell(active, now),
            };
            self.stats.record(event);
            self.outputs.coils[i] = cylinder.coil_output();
        }

        self.outputs.tacho = frame.trigger_high;
        self.last_inputs = *frame;
        self.stats.cycles_evaluated += 1;
        self.outputs
    }

    /// Drop every coil and the tachometer.
    pub fn release_all(&mut self) -> CoilOutputs {
        for cylinder in self.cylinders.iter_mut() {
            cylinder.release();
        }
        self.outputs = CoilOutputs::ALL_LOW;
        self.outputs
    }

    pub fn outputs(&self) -> CoilOutputs {
        self.outputs
    }

    pub fn cylinders(&self) -> &[Cylinder; CYLINDER_COUNT] {
        &self.cylinders
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn snapshot(&self, now: Micros) -> EngineSnapshot {
        EngineSnapshot {
            timestamp_us: now.ticks() as u64,
            cycle_count: self.stats.cycles_evaluated,
            mode: self.mode,
            inputs: self.last_inputs,
            outputs: self.outputs,
            dwell_us: std::array::from_fn(|i| self.cylinders[i].dwell_elapsed(now)),
            stats: self.stats,
            last_cycle_us: 0,
            max_cycle_us: 0,
            overruns: 0,
            io_faults: 0,
            skipped_publishes: 0,
        }
    }
}

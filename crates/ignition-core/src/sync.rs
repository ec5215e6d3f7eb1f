use crate::bench::BenchCommand;
use crate::engine::{EngineSnapshot, SensorFrame, CYLINDER_COUNT};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, TryLockError};

/// Latest-value slot. The writer never waits: a publish that finds the slot
/// held by a reader is dropped and counted.
struct LatestSlot<T: Copy + Default> {
    value: Mutex<T>,
    skipped: AtomicU64,
}

impl<T: Copy + Default> LatestSlot<T> {
    fn new() -> Self {
        Self {
            value: Mutex::new(T::default()),
            skipped: AtomicU64::new(0),
        }
    }

    fn try_write(&self, value: T) -> bool {
        match self.value.try_lock() {
            Ok(mut slot) => {
                *slot = value;
                true
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                *poisoned.into_inner() = value;
                true
            }
            Err(TryLockError::WouldBlock) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    fn read(&self) -> T {
        match self.value.lock() {
            Ok(slot) => *slot,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Snapshot hand-off from the control thread to reporters.
pub struct StateExchange {
    snapshot: LatestSlot<EngineSnapshot>,
}

impl StateExchange {
    pub fn new() -> Self {
        Self {
            snapshot: LatestSlot::new(),
        }
    }

    /// Called by the control loop every cycle (non-blocking).
    pub fn publish_state(&self, state: EngineSnapshot) -> bool {
        self.snapshot.try_write(state)
    }

    /// Called by diagnostics, metrics and bridge threads.
    pub fn read_state(&self) -> EngineSnapshot {
        self.snapshot.read()
    }

    /// Publishes dropped because a reader held the slot.
    pub fn skipped_publishes(&self) -> u64 {
        self.snapshot.skipped.load(Ordering::Relaxed)
    }
}

impl Default for StateExchange {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulated sensor lines set by the bench command stream.
///
/// Power-up state is trigger low with every position sensor inactive.
#[derive(Debug, Default)]
pub struct BenchSignals {
    trigger: AtomicBool,
    position: [AtomicBool; CYLINDER_COUNT],
}

impl BenchSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&self, cmd: BenchCommand) {
        match cmd {
            BenchCommand::TriggerHigh => self.trigger.store(true, Ordering::Release),
            BenchCommand::TriggerLow => self.trigger.store(false, Ordering::Release),
            BenchCommand::PositionActive(i) => {
                if let Some(line) = self.position.get(i) {
                    line.store(true, Ordering::Release);
                }
            }
            BenchCommand::PositionInactive(i) => {
                if let Some(line) = self.position.get(i) {
                    line.store(false, Ordering::Release);
                }
            }
        }
    }

    /// Apply every recognised command in `bytes`; returns how many were applied.
    pub fn apply_bytes(&self, bytes: &[u8]) -> usize {
        BenchCommand::decode(bytes).fold(0, |n, cmd| {
            self.apply(cmd);
            n + 1
        })
    }

    pub fn frame(&self) -> SensorFrame {
        SensorFrame {
            position_active: std::array::from_fn(|i| self.position[i].load(Ordering::Acquire)),
            trigger_high: self.trigger.load(Ordering::Acquire),
        }
    }
}

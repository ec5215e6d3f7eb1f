use serde::{Deserialize, Serialize};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Free-running microsecond tick, wrapping at `u32::MAX` like an MCU timer.
///
/// Absolute ticks are never compared directly; elapsed time is always taken
/// with [`Micros::wrapping_since`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Micros(pub u32);

impl Micros {
    pub const fn new(ticks: u32) -> Self {
        Self(ticks)
    }

    /// Microseconds elapsed from `earlier` to `self`, modulo 2^32.
    pub const fn wrapping_since(self, earlier: Micros) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }

    pub const fn wrapping_add(self, us: u32) -> Self {
        Self(self.0.wrapping_add(us))
    }

    pub const fn ticks(self) -> u32 {
        self.0
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeBase {
    start: Instant,
}

impl TimeBase {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Monotonic microseconds since start.
    pub fn now_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Wall-clock microseconds since Unix epoch (for cross-process logs only).
    pub fn unix_us(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_micros() as u64
    }

    /// Wrapping tick used by the coil timing engine.
    pub fn now_ticks(&self) -> Micros {
        Micros(self.now_us() as u32)
    }
}

impl Default for TimeBase {
    fn default() -> Self {
        Self::new()
    }
}

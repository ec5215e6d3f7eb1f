use crate::timebase::Micros;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Fixed dwell duration used by [`CoilMode::FixedDwell`], in microseconds.
pub const DWELL_TIME_US: u32 = 2_500;

/// Longest a coil may stay energised before it is forced off, in microseconds.
pub const SAFE_FAIL_TIME_US: u32 = 5_000;

/// Coil release policy, chosen once at configuration time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CoilMode {
    /// Dwell while the position sensor and trigger are both high; fire on the
    /// trigger falling edge.
    #[default]
    TriggerGated,
    /// Dwell while the position sensor is active; once it drops, fire after
    /// [`DWELL_TIME_US`] has elapsed since dwell start.
    FixedDwell,
}

impl CoilMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoilMode::TriggerGated => "trigger-gated",
            CoilMode::FixedDwell => "fixed-dwell",
        }
    }
}

impl fmt::Display for CoilMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown coil mode `{0}` (expected trigger-gated or fixed-dwell)")]
pub struct ModeParseError(pub String);

impl FromStr for CoilMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trigger-gated" | "trigger" | "a" => Ok(CoilMode::TriggerGated),
            "fixed-dwell" | "fixed" | "b" => Ok(CoilMode::FixedDwell),
            other => Err(ModeParseError(other.to_string())),
        }
    }
}

/// Transition produced by one evaluation of a cylinder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoilEvent {
    None,
    DwellStarted,
    /// Normal release: the spark event.
    Fired,
    /// Forced release after [`SAFE_FAIL_TIME_US`].
    SafeFail,
    /// Dwell aborted because the position sensor went inactive.
    SensorAbort,
}

/// Dwell state of a single cylinder's coil.
///
/// The coil output is derived from `dwell_start`, so an energised coil always
/// has a start time and an idle coil never does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cylinder {
    dwell_start: Option<Micros>,
}

impl Cylinder {
    pub const fn new() -> Self {
        Self { dwell_start: None }
    }

    pub fn dwell_start(&self) -> Option<Micros> {
        self.dwell_start
    }

    pub fn is_dwelling(&self) -> bool {
        self.dwell_start.is_some()
    }

    pub fn coil_output(&self) -> bool {
        self.is_dwelling()
    }

    /// Elapsed dwell at `now`, or 0 when idle.
    pub fn dwell_elapsed(&self, now: Micros) -> u32 {
        self.dwell_start
            .map(|start| now.wrapping_since(start))
            .unwrap_or(0)
    }

    /// Force the coil off without classifying the release.
    pub fn release(&mut self) {
        self.dwell_start = None;
    }

    fn begin_if_idle(&mut self, now: Micros) -> CoilEvent {
        if self.dwell_start.is_none() {
            self.dwell_start = Some(now);
            CoilEvent::DwellStarted
        } else {
            CoilEvent::None
        }
    }

    fn safe_fail_due(&self, now: Micros) -> bool {
        self.dwell_start
            .is_some_and(|start| now.wrapping_since(start) > SAFE_FAIL_TIME_US)
    }

    /// Trigger-gated evaluation.
    pub fn step_trigger_gated(
        &mut self,
        position_active: bool,
        trigger_high: bool,
        now: Micros,
    ) -> CoilEvent {
        if !position_active {
            return match self.dwell_start.take() {
                Some(_) => CoilEvent::SensorAbort,
                None => CoilEvent::None,
            };
        }

        if trigger_high {
            let event = self.begin_if_idle(now);
            if self.safe_fail_due(now) {
                self.dwell_start = None;
                return CoilEvent::SafeFail;
            }
            event
        } else {
            match self.dwell_start.take() {
                Some(_) => CoilEvent::Fired,
                None => CoilEvent::None,
            }
        }
    }

    /// Fixed-duration evaluation; the trigger only feeds the tachometer.
    pub fn step_fixed_dwell(&mut self, sensor_active: bool, now: Micros) -> CoilEvent {
        if sensor_active {
            let event = self.begin_if_idle(now);
            if self.safe_fail_due(now) {
                self.dwell_start = None;
                return CoilEvent::SafeFail;
            }
            return event;
        }

        match self.dwell_start {
            Some(start) if now.wrapping_since(start) >= DWELL_TIME_US => {
                self.dwell_start = None;
                CoilEvent::Fired
            }
            _ => CoilEvent::None,
        }
    }
}

use ignition_core::{EngineSnapshot, CYLINDER_COUNT};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProtocolVersion {
    pub major: u8,
    pub minor: u8,
}

impl ProtocolVersion {
    pub const fn v1() -> Self {
        Self { major: 1, minor: 0 }
    }

    pub fn is_supported(&self) -> bool {
        self.major == 1
    }
}

/// JSON line published to bench bridge clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StateMsg {
    #[serde(rename = "type")]
    pub msg_type: String,
    pub protocol_version: ProtocolVersion,
    pub sequence: u64,
    pub timestamp_us: u64,
    pub unix_us: u64,
    pub cycle_count: u64,
    pub mode: String,
    pub trigger: bool,
    pub tacho: bool,
    pub position: [bool; CYLINDER_COUNT],
    pub coils: [bool; CYLINDER_COUNT],
    pub dwell_us: [u32; CYLINDER_COUNT],
    pub sparks_fired: u64,
    pub safe_fail_trips: u64,
    pub sensor_aborts: u64,
    pub max_cycle_us: u32,
}

impl StateMsg {
    pub fn from_snapshot(snapshot: &EngineSnapshot, sequence: u64, unix_us: u64) -> Self {
        Self {
            msg_type: "state".to_string(),
            protocol_version: ProtocolVersion::v1(),
            sequence,
            timestamp_us: snapshot.timestamp_us,
            unix_us,
            cycle_count: snapshot.cycle_count,
            mode: snapshot.mode.as_str().to_string(),
            trigger: snapshot.inputs.trigger_high,
            tacho: snapshot.outputs.tacho,
            position: snapshot.inputs.position_active,
            coils: snapshot.outputs.coils,
            dwell_us: snapshot.dwell_us,
            sparks_fired: snapshot.stats.sparks_fired,
            safe_fail_trips: snapshot.stats.safe_fail_trips,
            sensor_aborts: snapshot.stats.sensor_aborts,
            max_cycle_us: snapshot.max_cycle_us,
        }
    }

    /// Serialize as a newline-terminated JSON line.
    pub fn to_line(&self) -> serde_json::Result<Vec<u8>> {
        let mut line = serde_json::to_vec(self)?;
        line.push(b'\n');
        Ok(line)
    }

    pub fn parse(line: &str) -> Option<Self> {
        let msg: StateMsg = serde_json::from_str(line).ok()?;
        (msg.msg_type == "state" && msg.protocol_version.is_supported()).then_some(msg)
    }
}

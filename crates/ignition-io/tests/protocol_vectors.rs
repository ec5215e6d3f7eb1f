use ignition_core::{CoilEngine, CoilMode, Micros, SensorFrame};
use ignition_io::protocol::{ProtocolVersion, StateMsg};

#[test]
fn state_message_carries_coil_state() {
    let mut engine = CoilEngine::new(CoilMode::TriggerGated);
    engine.evaluate(
        &SensorFrame {
            position_active: [false, true, false, false],
            trigger_high: true,
        },
        Micros(0),
    );
    let snapshot = engine.snapshot(Micros(1_200));

    let msg = StateMsg::from_snapshot(&snapshot, 3, 1_700_000_000_000_000);
    let value: serde_json::Value = serde_json::from_slice(&msg.to_line().unwrap()).unwrap();

    assert_eq!(value["type"], "state");
    assert_eq!(value["sequence"], 3);
    assert_eq!(value["mode"], "trigger-gated");
    assert_eq!(value["trigger"], true);
    assert_eq!(value["tacho"], true);
    assert_eq!(value["coils"], serde_json::json!([false, true, false, false]));
    assert_eq!(value["dwell_us"], serde_json::json!([0, 1200, 0, 0]));
}

#[test]
fn parses_state_line() {
    let raw = r#"{
        "type":"state",
        "protocol_version":{"major":1,"minor":0},
        "sequence":9,
        "timestamp_us":5000,
        "unix_us":1700000000000000,
        "cycle_count":42,
        "mode":"fixed-dwell",
        "trigger":false,
        "tacho":false,
        "position":[true,false,false,false],
        "coils":[true,false,false,false],
        "dwell_us":[800,0,0,0],
        "sparks_fired":1,
        "safe_fail_trips":0,
        "sensor_aborts":0,
        "max_cycle_us":3
    }"#;

    let msg = StateMsg::parse(raw).expect("state should parse");
    assert_eq!(msg.protocol_version, ProtocolVersion::v1());
    assert!(msg.protocol_version.is_supported());
    assert_eq!(msg.cycle_count, 42);
    assert_eq!(msg.mode, "fixed-dwell");
}

#[test]
fn rejects_other_message_types() {
    let raw = r#"{"type":"hello","protocol_version":{"major":1,"minor":0}}"#;
    assert!(StateMsg::parse(raw).is_none());
}

#[test]
fn rejects_unsupported_major_version() {
    let mut engine = CoilEngine::new(CoilMode::FixedDwell);
    engine.evaluate(&SensorFrame::default(), Micros(0));
    let mut msg = StateMsg::from_snapshot(&engine.snapshot(Micros(10)), 1, 0);
    let line = String::from_utf8(msg.to_line().unwrap()).unwrap();
    assert!(StateMsg::parse(line.trim()).is_some());

    msg.protocol_version.major = 2;
    let line = String::from_utf8(msg.to_line().unwrap()).unwrap();
    assert!(StateMsg::parse(line.trim()).is_none());
}

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

fn binary() -> &'static str {
    env!("CARGO_BIN_EXE_ignition-ctl")
}

struct ControllerProcess {
    child: Child,
    addr: String,
}

impl ControllerProcess {
    fn start(extra: &[&str]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .expect("Failed to bind ephemeral port for integration test");
        let port = listener
            .local_addr()
            .expect("Failed to resolve bound address")
            .port();
        let bind_addr = format!("127.0.0.1:{}", port);
        drop(listener);

        let child = Command::new(binary())
            .args(["--bench-bind", &bind_addr, "--no-diag", "--run-seconds", "10"])
            .args(extra)
            .stdout(Stdio::null())
            .spawn()
            .expect("Failed to start ignition-ctl");

        // Loop until port is open (up to 5s)
        let start = Instant::now();
        while start.elapsed() < Duration::from_secs(5) {
            if TcpStream::connect(&bind_addr).is_ok() {
                break;
            }
            thread::sleep(Duration::from_millis(50));
        }

        Self {
            child,
            addr: bind_addr,
        }
    }

    fn connect(&self) -> (TcpStream, BufReader<TcpStream>) {
        let stream = TcpStream::connect(&self.addr).expect("Failed to connect to bench bridge");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let reader = BufReader::new(stream.try_clone().unwrap());
        (stream, reader)
    }
}

impl Drop for ControllerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Read state lines until `pred` holds or the deadline passes.
fn wait_for_state<F: Fn(&serde_json::Value) -> bool>(
    reader: &mut BufReader<TcpStream>,
    pred: F,
) -> Option<serde_json::Value> {
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut line = String::new();
    while Instant::now() < deadline {
        line.clear();
        if reader.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let state: serde_json::Value = serde_json::from_str(&line).ok()?;
        if pred(&state) {
            return Some(state);
        }
    }
    None
}

#[test]
fn bench_commands_drive_trigger_gated_coils() {
    let ctl = ControllerProcess::start(&["--mode", "trigger-gated"]);
    let (mut stream, mut reader) = ctl.connect();

    let first = wait_for_state(&mut reader, |s| s["type"] == "state").expect("state line");
    assert_eq!(first["mode"], "trigger-gated");

    writeln!(stream, "1h").unwrap();
    let dwelling = wait_for_state(&mut reader, |s| {
        s["trigger"] == true && s["position"][0] == true
    })
    .expect("bench command should reach the control loop");
    assert_eq!(dwelling["tacho"], true);

    // Hold long enough for the safe-fail limit to have elapsed at least once.
    thread::sleep(Duration::from_millis(50));
    write!(stream, "l").unwrap();
    let released = wait_for_state(&mut reader, |s| {
        s["trigger"] == false && s["coils"] == serde_json::json!([false, false, false, false])
    })
    .expect("trigger low should release every coil");
    assert_eq!(released["tacho"], false);
    let releases = released["sparks_fired"].as_u64().unwrap_or(0)
        + released["safe_fail_trips"].as_u64().unwrap_or(0);
    assert!(releases >= 1);
}

#[test]
fn fixed_dwell_mode_is_selectable() {
    let ctl = ControllerProcess::start(&["--mode", "fixed-dwell"]);
    let (mut stream, mut reader) = ctl.connect();

    write!(stream, "3").unwrap();
    let state = wait_for_state(&mut reader, |s| s["position"][2] == true).expect("state line");
    assert_eq!(state["mode"], "fixed-dwell");

    write!(stream, "s").unwrap();
    wait_for_state(&mut reader, |s| {
        s["position"][2] == false && s["coils"][2] == false
    })
    .expect("coil should release once the dwell time has passed");
}

#[test]
fn help_exits_cleanly() {
    let status = Command::new(binary())
        .arg("--help")
        .stdout(Stdio::null())
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn invalid_mode_is_rejected() {
    let status = Command::new(binary())
        .args(["--mode", "sequential"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .unwrap();
    assert_eq!(status.code(), Some(2));
}

use ignition_core::{CoilMode, ModeParseError};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("option {0} requires a value")]
    MissingValue(String),
    #[error("invalid value `{value}` for {flag}")]
    InvalidValue { flag: String, value: String },
    #[error(transparent)]
    Mode(#[from] ModeParseError),
    #[error("unknown option {0} (see --help)")]
    UnknownOption(String),
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub show_help: bool,
    pub mode: CoilMode,
    pub run_seconds: Option<u64>,
    pub bench_enabled: bool,
    pub bench_bind: String,
    pub stdin_commands: bool,
    pub modbus_addr: Option<String>,
    pub hall_active_low: bool,
    pub poll_interval: Option<Duration>,
    pub diag_enabled: bool,
    pub diag_interval: Duration,
    pub json_logs: bool,
    pub metrics_addr: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            show_help: false,
            mode: CoilMode::TriggerGated,
            run_seconds: None,
            bench_enabled: true,
            bench_bind: "127.0.0.1:7100".to_string(),
            stdin_commands: false,
            modbus_addr: None,
            hall_active_low: true,
            poll_interval: None,
            diag_enabled: true,
            diag_interval: Duration::from_millis(500),
            json_logs: false,
            metrics_addr: None,
        }
    }
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a str, ConfigError> {
    args.get(i + 1)
        .map(String::as_str)
        .ok_or_else(|| ConfigError::MissingValue(flag.to_string()))
}

fn number(args: &[String], i: usize, flag: &str) -> Result<u64, ConfigError> {
    let raw = value(args, i, flag)?;
    raw.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        flag: flag.to_string(),
        value: raw.to_string(),
    })
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let args: Vec<String> = std::env::args().collect();
        Self::from_args(&args)
    }

    pub fn from_args(args: &[String]) -> Result<Self, ConfigError> {
        let mut cfg = RuntimeConfig::default();
        let mut i = 1;
        while i < args.len() {
            let flag = args[i].as_str();
            match flag {
                "--mode" => {
                    cfg.mode = value(args, i, flag)?.parse()?;
                    i += 1;
                }
                "--run-seconds" => {
                    cfg.run_seconds = Some(number(args, i, flag)?);
                    i += 1;
                }
                "--bench-bind" => {
                    cfg.bench_bind = value(args, i, flag)?.to_string();
                    i += 1;
                }
                "--no-bench" => {
                    cfg.bench_enabled = false;
                }
                "--stdin-commands" => {
                    cfg.stdin_commands = true;
                }
                "--modbus" => {
                    cfg.modbus_addr = Some(value(args, i, flag)?.to_string());
                    i += 1;
                }
                "--hall-active-high" => {
                    cfg.hall_active_low = false;
                }
                "--poll-interval-us" => {
                    let us = number(args, i, flag)?;
                    cfg.poll_interval = (us > 0).then(|| Duration::from_micros(us));
                    i += 1;
                }
                "--diag-interval-ms" => {
                    let ms = number(args, i, flag)?;
                    if ms == 0 {
                        return Err(ConfigError::InvalidValue {
                            flag: flag.to_string(),
                            value: "0".to_string(),
                        });
                    }
                    cfg.diag_interval = Duration::from_millis(ms);
                    i += 1;
                }
                "--no-diag" => {
                    cfg.diag_enabled = false;
                }
                "--json-logs" => {
                    cfg.json_logs = true;
                }
                "--metrics-addr" => {
                    cfg.metrics_addr = Some(value(args, i, flag)?.to_string());
                    i += 1;
                }
                "--help" | "-h" => {
                    cfg.show_help = true;
                    break;
                }
                other => return Err(ConfigError::UnknownOption(other.to_string())),
            }
            i += 1;
        }
        Ok(cfg)
    }

    pub fn print_help() {
        println!(
            r#"ignition-ctl - four-cylinder ignition coil controller

USAGE:
    ignition-ctl [OPTIONS]

OPTIONS:
    --mode <MODE>             Coil policy: trigger-gated | fixed-dwell [default: trigger-gated]
    --bench-bind <ADDR>       Bench command bridge TCP address [default: 127.0.0.1:7100]
    --no-bench                Disable the bench command bridge
    --stdin-commands          Read bench commands from stdin
    --modbus <ADDR>           Drive real hardware through a Modbus TCP I/O module
                              (adds poll interval + network round trip of jitter)
    --hall-active-high        Treat Modbus position inputs as active-high
    --poll-interval-us <US>   Pace control cycles instead of spinning [default: spin]
    --diag-interval-ms <MS>   Diagnostic line interval [default: 500]
    --no-diag                 Disable the diagnostic reporter
    --json-logs               Output logs in JSON format
    --metrics-addr <ADDR>     Enable Prometheus metrics server on address (e.g., 0.0.0.0:9100)
    --run-seconds <SECS>      Run for a fixed duration then exit
    -h, --help                Print this help message

BENCH COMMANDS (bridge or stdin, one byte each):
    h / l                     Simulated trigger high / low
    1 2 3 4                   Position sensor of cylinder 1-4 active
    q r s t                   Position sensor of cylinder 1-4 inactive

ENVIRONMENT VARIABLES:
    RUST_LOG                  Set log filter (e.g., RUST_LOG=debug,ignition_io=trace)

EXAMPLES:
    # Bench test in fixed-dwell mode, commands from the terminal
    ignition-ctl --mode fixed-dwell --stdin-commands --no-bench

    # Hardware run with metrics
    ignition-ctl --modbus 192.168.1.20:502 --metrics-addr 0.0.0.0:9100
"#
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ignition-ctl")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn defaults_to_trigger_gated_bench() {
        let cfg = RuntimeConfig::from_args(&args(&[])).unwrap();
        assert_eq!(cfg.mode, CoilMode::TriggerGated);
        assert!(cfg.bench_enabled);
        assert!(cfg.diag_enabled);
        assert_eq!(cfg.poll_interval, None);
        assert!(cfg.modbus_addr.is_none());
    }

    #[test]
    fn parses_full_command_line() {
        let cfg = RuntimeConfig::from_args(&args(&[
            "--mode",
            "fixed-dwell",
            "--no-bench",
            "--stdin-commands",
            "--poll-interval-us",
            "50",
            "--diag-interval-ms",
            "250",
            "--run-seconds",
            "3",
            "--metrics-addr",
            "127.0.0.1:9100",
        ]))
        .unwrap();
        assert_eq!(cfg.mode, CoilMode::FixedDwell);
        assert!(!cfg.bench_enabled);
        assert!(cfg.stdin_commands);
        assert_eq!(cfg.poll_interval, Some(Duration::from_micros(50)));
        assert_eq!(cfg.diag_interval, Duration::from_millis(250));
        assert_eq!(cfg.run_seconds, Some(3));
        assert_eq!(cfg.metrics_addr.as_deref(), Some("127.0.0.1:9100"));
    }

    #[test]
    fn rejects_unknown_mode() {
        let err = RuntimeConfig::from_args(&args(&["--mode", "sequential"])).unwrap_err();
        assert!(matches!(err, ConfigError::Mode(_)));
    }

    #[test]
    fn rejects_missing_and_bad_values() {
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--bench-bind"])),
            Err(ConfigError::MissingValue(_))
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--run-seconds", "soon"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--diag-interval-ms", "0"])),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            RuntimeConfig::from_args(&args(&["--frobnicate"])),
            Err(ConfigError::UnknownOption(_))
        ));
    }

    #[test]
    fn help_stops_parsing() {
        let cfg = RuntimeConfig::from_args(&args(&["-h", "--frobnicate"])).unwrap();
        assert!(cfg.show_help);
    }
}

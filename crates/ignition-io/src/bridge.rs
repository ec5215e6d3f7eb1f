use crate::metrics::{BENCH_COMMANDS, BRIDGE_CONNECTED};
use crate::protocol::StateMsg;
use ignition_core::{BenchSignals, StateExchange, TimeBase};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub bind_addr: String,
    pub publish_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:7100".to_string(),
            publish_interval: Duration::from_millis(100),
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("failed to bind bench bridge on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to configure bench bridge socket: {0}")]
    Socket(#[from] std::io::Error),
}

/// Bench command bridge: accepts one TCP client at a time, applies every byte
/// it sends as a bench command and streams JSON state lines back.
pub struct BenchBridge {
    listener: TcpListener,
    signals: Arc<BenchSignals>,
    exchange: Arc<StateExchange>,
    timebase: TimeBase,
    config: BridgeConfig,
}

struct Client {
    stream: TcpStream,
    send_buf: Vec<u8>,
    send_offset: usize,
}

impl BenchBridge {
    pub fn bind(
        signals: Arc<BenchSignals>,
        exchange: Arc<StateExchange>,
        timebase: TimeBase,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let listener = TcpListener::bind(&config.bind_addr).map_err(|source| BridgeError::Bind {
            addr: config.bind_addr.clone(),
            source,
        })?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            signals,
            exchange,
            timebase,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn run(self, stop: Arc<AtomicBool>) {
        info!(
            addr = %self.config.bind_addr,
            publish_interval_ms = self.config.publish_interval.as_millis() as u64,
            "Bench bridge listening"
        );

        let mut client: Option<Client> = None;
        let mut last_publish = Instant::now();
        let mut state_sequence: u64 = 0;

        while !stop.load(Ordering::Relaxed) {
            if client.is_none() {
                match self.listener.accept() {
                    Ok((stream, addr)) => match stream.set_nonblocking(true) {
                        Ok(()) => {
                            info!(client_addr = %addr, "Bench client connected");
                            client = Some(Client {
                                stream,
                                send_buf: Vec::new(),
                                send_offset: 0,
                            });
                            BRIDGE_CONNECTED.set(1.0);
                        }
                        Err(err) => warn!(error = %err, "Failed to set client nonblocking"),
                    },
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => warn!(error = %err, "Bench bridge accept error"),
                }
            }

            let mut drop_client = false;
            if let Some(conn) = client.as_mut() {
                let mut temp = [0u8; 256];
                match conn.stream.read(&mut temp) {
                    Ok(0) => {
                        info!("Bench client disconnected");
                        drop_client = true;
                    }
                    Ok(n) => {
                        let applied = self.signals.apply_bytes(&temp[..n]);
                        BENCH_COMMANDS.inc_by(applied as u64);
                        debug!(bytes = n, applied, "Bench commands received");
                    }
                    Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                    Err(err) => {
                        warn!(error = %err, "Bench bridge read error");
                        drop_client = true;
                    }
                }

                if conn.send_buf.is_empty()
                    && last_publish.elapsed() >= self.config.publish_interval
                {
                    state_sequence = state_sequence.wrapping_add(1);
                    let snapshot = self.exchange.read_state();
                    let msg =
                        StateMsg::from_snapshot(&snapshot, state_sequence, self.timebase.unix_us());
                    match msg.to_line() {
                        Ok(line) => {
                            conn.send_buf = line;
                            conn.send_offset = 0;
                        }
                        Err(err) => warn!(error = %err, "Failed to encode state message"),
                    }
                    last_publish = Instant::now();
                }

                if !drop_client && !conn.send_buf.is_empty() {
                    match conn.stream.write(&conn.send_buf[conn.send_offset..]) {
                        Ok(0) => {
                            info!("Bench client disconnected");
                            drop_client = true;
                        }
                        Ok(n) => {
                            conn.send_offset += n;
                            if conn.send_offset >= conn.send_buf.len() {
                                conn.send_buf.clear();
                                conn.send_offset = 0;
                            }
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {}
                        Err(err) => {
                            warn!(error = %err, "Bench bridge write error");
                            drop_client = true;
                        }
                    }
                }
            }

            if drop_client {
                client = None;
                BRIDGE_CONNECTED.set(0.0);
            }

            std::thread::sleep(Duration::from_millis(2));
        }
    }
}

/// Bind and run the bench bridge on the current thread.
pub fn run_bridge(
    signals: Arc<BenchSignals>,
    exchange: Arc<StateExchange>,
    timebase: TimeBase,
    config: BridgeConfig,
    stop: Arc<AtomicBool>,
) -> Result<(), BridgeError> {
    BenchBridge::bind(signals, exchange, timebase, config)?.run(stop);
    Ok(())
}

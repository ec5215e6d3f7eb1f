use crate::engine::{CoilEngine, CoilOutputs};
use crate::hal::IgnitionIO;
use crate::sync::StateExchange;
use crate::timebase::{Micros, TimeBase};
use log::{info, warn};
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::{Duration, Instant};

#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// `None` polls back to back; `Some` paces cycles on a fixed period.
    pub poll_interval: Option<Duration>,
    /// Cycles slower than this are counted as overruns.
    pub cycle_budget: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            poll_interval: None,
            cycle_budget: Duration::from_micros(100),
        }
    }
}

#[derive(Clone, Default, Debug)]
pub struct ExecutionStats {
    pub cycles_executed: u64,
    pub overruns: u64,
    pub io_faults: u64,
    pub last_cycle_us: u64,
    pub max_cycle_us: u64,
}

/// Polling loop that ties the engine to an [`IgnitionIO`].
pub struct IgnitionLoop<IO: IgnitionIO> {
    io: IO,
    engine: CoilEngine,
    config: LoopConfig,
    exchange: Arc<StateExchange>,
    stats: ExecutionStats,
    timebase: TimeBase,
    io_was_healthy: bool,
}

impl<IO: IgnitionIO> IgnitionLoop<IO> {
    pub fn new(
        io: IO,
        engine: CoilEngine,
        exchange: Arc<StateExchange>,
        timebase: TimeBase,
        config: LoopConfig,
    ) -> Self {
        Self {
            io,
            engine,
            config,
            exchange,
            stats: ExecutionStats::default(),
            timebase,
            io_was_healthy: true,
        }
    }

    pub fn run(&mut self, stop: &AtomicBool) {
        info!(
            "coil loop starting: mode={} poll_interval={:?}",
            self.engine.mode(),
            self.config.poll_interval
        );
        let mut next_cycle = Instant::now();

        while !stop.load(Ordering::Relaxed) {
            if let Some(period) = self.config.poll_interval {
                let now = Instant::now();
                if now < next_cycle {
                    while Instant::now() < next_cycle {
                        std::hint::spin_loop();
                    }
                    next_cycle += period;
                } else {
                    next_cycle = now + period;
                }
            }
            self.step();
        }

        self.emergency_stop();
        info!(
            "coil loop stopped after {} cycles ({} overruns)",
            self.stats.cycles_executed, self.stats.overruns
        );
    }

    /// One iteration at the current clock tick.
    pub fn step(&mut self) -> CoilOutputs {
        let now = self.timebase.now_ticks();
        self.step_at(now)
    }

    /// One iteration: read inputs, evaluate every cylinder, write outputs,
    /// publish a snapshot.
    pub fn step_at(&mut self, now: Micros) -> CoilOutputs {
        let cycle_start = Instant::now();

        let outputs = if self.io.is_healthy() {
            if !self.io_was_healthy {
                info!("ignition I/O recovered");
                self.io_was_healthy = true;
            }
            let frame = self.io.read_inputs();
            self.engine.evaluate(&frame, now)
        } else {
            if self.io_was_healthy {
                warn!("ignition I/O unhealthy, holding all coils low");
                self.io_was_healthy = false;
            }
            self.stats.io_faults += 1;
            self.engine.release_all()
        };
        self.io.write_outputs(&outputs);

        let cycle_us = cycle_start.elapsed().as_micros() as u64;
        self.stats.last_cycle_us = cycle_us;
        self.stats.max_cycle_us = self.stats.max_cycle_us.max(cycle_us);
        if cycle_us > self.config.cycle_budget.as_micros() as u64 {
            self.stats.overruns += 1;
        }
        self.stats.cycles_executed += 1;

        self.publish(now);
        outputs
    }

    fn publish(&self, now: Micros) {
        let mut snapshot = self.engine.snapshot(now);
        snapshot.timestamp_us = self.timebase.now_us();
        snapshot.last_cycle_us = self.stats.last_cycle_us.min(u32::MAX as u64) as u32;
        snapshot.max_cycle_us = self.stats.max_cycle_us.min(u32::MAX as u64) as u32;
        snapshot.overruns = self.stats.overruns;
        snapshot.io_faults = self.stats.io_faults;
        snapshot.skipped_publishes = self.exchange.skipped_publishes();
        self.exchange.publish_state(snapshot);
    }

    fn emergency_stop(&mut self) {
        let low = self.engine.release_all();
        self.io.write_outputs(&low);
        self.publish(self.timebase.now_ticks());
    }

    pub fn stats(&self) -> &ExecutionStats {
        &self.stats
    }

    pub fn engine(&self) -> &CoilEngine {
        &self.engine
    }

    pub fn io(&self) -> &IO {
        &self.io
    }
}

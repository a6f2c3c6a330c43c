/*!
Rate-controlled simulation of a single miner

A [`Simulator`] makes simulated hash attempts at a fixed rate, using wall-clock
time as its only driver. The loop never sleeps: it polls the monotonic clock
and makes an attempt once enough time has passed since the previous one.

Timer granularity means attempts rarely land exactly on schedule. The lateness
or earliness of every attempt is added to a running `time_error`, and later
attempts are pulled forward (or pushed back) by that amount. `time_error` is
neither clamped nor decayed.

# Examples

```
use std::time::{Duration, Instant};

use hashrate_sim::prelude::*;

let config = AgentConfig {
    name: "majority".into(),
    hash_rate: 4.0,
    hash_threshold: HashThreshold::MAX,
};
let mut sim = Simulator::new(&config).unwrap();
let mut events: Vec<Event> = Vec::new();

let t0 = Instant::now();
sim.start(t0);
for ms in [250, 500, 750, 1000] {
    sim.tick(t0 + Duration::from_millis(ms), &mut events).unwrap();
}

assert_eq!(sim.hash_count(), 4);
```
*/

use std::{
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::{
    config::{AgentConfig, ConfigError},
    event::{Event, Statistics},
    hash,
    sink::EventSink,
    threshold::HashThreshold,
};

/// Minimum time between two statistics events.
pub const STATISTICS_INTERVAL: Duration = Duration::from_secs(1);

/// Shared flag used to stop a running [`Simulator`] from another thread.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SimulatorError {
    #[error("could not emit event")]
    Sink(#[from] io::Error),
}

/// Counters of a simulator at some point in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub hash_count: u64,
    pub block_count: u64,
    pub time_error: f64,
}

/// A simulated miner. See the [module documentation](self).
#[derive(Debug)]
pub struct Simulator<R = StdRng> {
    name: String,
    hash_threshold: HashThreshold,
    /// Target seconds between two attempts.
    hash_interval: f64,
    rng: R,
    program_start_time: Instant,
    /// Time of the last attempt.
    hash_interval_time: Instant,
    /// Time of the last statistics event.
    statistics_interval_time: Instant,
    /// `hash_count` when the last statistics event was emitted.
    statistics_hash_count: u64,
    time_error: f64,
    hash_count: u64,
    block_count: u64,
}

impl Simulator<StdRng> {
    /// Creates a simulator seeded from system entropy.
    pub fn new(config: &AgentConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_entropy())
    }
}

impl<R: Rng> Simulator<R> {
    /// Creates a simulator which draws hash preimages from `rng`.
    pub fn with_rng(config: &AgentConfig, rng: R) -> Result<Self, ConfigError> {
        config.validate()?;

        let now = Instant::now();
        Ok(Self {
            name: config.name.clone(),
            hash_threshold: config.hash_threshold,
            hash_interval: 1.0 / config.hash_rate,
            rng,
            program_start_time: now,
            hash_interval_time: now,
            statistics_interval_time: now,
            statistics_hash_count: 0,
            time_error: 0.0,
            hash_count: 0,
            block_count: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hash_threshold(&self) -> HashThreshold {
        self.hash_threshold
    }

    pub fn hash_count(&self) -> u64 {
        self.hash_count
    }

    pub fn block_count(&self) -> u64 {
        self.block_count
    }

    pub fn time_error(&self) -> f64 {
        self.time_error
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            hash_count: self.hash_count,
            block_count: self.block_count,
            time_error: self.time_error,
        }
    }

    /// Marks `now` as the start of the run. Elapsed-time statistics and the
    /// attempt schedule are measured from this instant.
    pub fn start(&mut self, now: Instant) {
        self.program_start_time = now;
        self.hash_interval_time = now;
        self.statistics_interval_time = now;
    }

    /// Performs one iteration of the simulation loop at time `now`: at most
    /// one hash attempt, followed by at most one statistics event.
    pub fn tick<S>(&mut self, now: Instant, sink: &mut S) -> io::Result<()>
    where
        S: EventSink + ?Sized,
    {
        let delta = now
            .saturating_duration_since(self.hash_interval_time)
            .as_secs_f64();

        if delta + self.time_error >= self.hash_interval {
            self.time_error += delta - self.hash_interval;
            self.hash_interval_time = now;

            let digest = hash::attempt(&mut self.rng);
            self.hash_count += 1;

            if self.hash_threshold.is_met_by(digest) {
                self.block_count += 1;
                sink.emit(Event::block_found(&self.name))?;
            }
        }

        if now.saturating_duration_since(self.statistics_interval_time)
            >= STATISTICS_INTERVAL
        {
            let interval_hashes = self.hash_count - self.statistics_hash_count;
            let elapsed = now
                .saturating_duration_since(self.program_start_time)
                .as_secs_f64();

            self.statistics_interval_time = now;
            self.statistics_hash_count = self.hash_count;

            let payload = Statistics {
                hashrate_s: interval_hashes as f64
                    / STATISTICS_INTERVAL.as_secs_f64(),
                blocks_s: self.block_count as f64 / elapsed,
                time_error: self.time_error,
                block_count: self.block_count,
            };
            sink.emit(Event::statistics(&self.name, payload))?;
        }

        Ok(())
    }

    /// Runs the simulation loop until `stop` is raised or `sink` fails.
    ///
    /// The run is timed from the moment [`Simulator::start`] was last called
    /// (or from construction).
    pub fn run<S: EventSink>(
        &mut self,
        stop: &StopSignal,
        mut sink: S,
    ) -> Result<RunSummary, SimulatorError> {
        while !stop.is_stopped() {
            self.tick(Instant::now(), &mut sink)?;
        }

        Ok(self.summary())
    }
}

//! The mining agent: a [`Simulator`] which waits for a start signal.

use std::{
    io::{self, Write},
    time::Instant,
};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::{
    config::{AgentConfig, ConfigError},
    controller::START_TOKEN,
    simulator::{RunSummary, Simulator, SimulatorError, StopSignal},
    sink::EventSink,
};

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error(transparent)]
    Simulator(#[from] SimulatorError),
    #[error("simulation thread failed")]
    Join(#[from] tokio::task::JoinError),
}

impl AgentError {
    /// True if the reader of the agent's output went away.
    pub fn is_broken_pipe(&self) -> bool {
        matches!(
            self,
            Self::Simulator(SimulatorError::Sink(err))
                if err.kind() == io::ErrorKind::BrokenPipe
        )
    }
}

/// Returns true if `line` carries the start signal.
pub fn is_start_signal(line: &str) -> bool {
    line.contains(START_TOKEN)
}

/// Reads `input` until a line containing [`START_TOKEN`]. Every line before
/// it is echoed to `echo`. Returns false if `input` ends first.
pub async fn wait_for_start<R, W>(
    mut input: R,
    mut echo: W,
) -> io::Result<bool>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut line = String::new();

    loop {
        line.clear();
        if input.read_line(&mut line).await? == 0 {
            return Ok(false);
        }

        if is_start_signal(&line) {
            return Ok(true);
        }

        echo.write_all(line.as_bytes())?;
        echo.flush()?;
    }
}

/// A simulator bound to the sink its events are written to.
#[derive(Debug)]
pub struct Agent<S> {
    simulator: Simulator,
    sink: S,
    stop: StopSignal,
    hash_rate: f64,
}

impl<S> Agent<S>
where
    S: EventSink + Send + 'static,
{
    pub fn new(config: &AgentConfig, sink: S) -> Result<Self, ConfigError> {
        Ok(Self {
            simulator: Simulator::new(config)?,
            sink,
            stop: StopSignal::new(),
            hash_rate: config.hash_rate,
        })
    }

    /// Signal which stops [`Agent::run`].
    pub fn stop_signal(&self) -> StopSignal {
        self.stop.clone()
    }

    /// Line printed before waiting for the start signal.
    pub fn banner(&self) -> String {
        format!(
            "Starting mining agent {} with hashrate {}/s and hash threshold \
             {}. Waiting for START signal...",
            self.simulator.name(),
            self.hash_rate,
            self.simulator.hash_threshold(),
        )
    }

    /// Starts the clock and runs the simulation on a blocking thread until
    /// the stop signal is raised.
    pub async fn run(self) -> Result<RunSummary, AgentError> {
        let Agent {
            mut simulator,
            sink,
            stop,
            ..
        } = self;

        info!(name = simulator.name(), "starting simulation");
        let summary = tokio::task::spawn_blocking(move || {
            simulator.start(Instant::now());
            simulator.run(&stop, sink)
        })
        .await??;
        debug!(?summary, "simulation stopped");

        Ok(summary)
    }
}

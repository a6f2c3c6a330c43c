/*!
Launching mining agents and aggregating their events

A [`Controller`] run goes through the phases of [`Phase`]:

1. One agent process is spawned per hashrate share (`"majority"` and
   `"minority"`).
2. After the warm-up delay, [`START_TOKEN`] is written to every agent's input
   so they all start mining at roughly the same moment.
3. Every agent's output is read by its own task. Decoded lines are forwarded
   over a channel to a single aggregator, which owns the [`Tally`] and redraws
   the [`Dashboard`] whenever a block is found.

The run ends once every agent's output has closed, or when the configured run
duration elapses (the agents are killed in that case). Dropping the run future
kills all agents as well.
*/

use std::{
    io::{self, Write},
    path::PathBuf,
    process::{ExitStatus, Stdio},
};

use tokio::{
    io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader},
    process::{Child, ChildStdin, Command},
    sync::{mpsc, watch},
    task::JoinSet,
};
use tracing::{debug, info, warn};

use crate::{
    config::{AgentConfig, ConfigError, ControllerConfig, HashrateSplit},
    dashboard::Dashboard,
    event::AgentLine,
    tally::Tally,
};

/// Token which starts an agent's mining loop.
pub const START_TOKEN: &str = "START";

/// Buffered updates between the agent readers and the aggregator.
const UPDATE_CHANNEL_CAPACITY: usize = 1024;

/// Lifecycle of a controller run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Spawning,
    WaitingForWarmup,
    Running,
    Done,
}

#[derive(Debug, thiserror::Error)]
pub enum ControllerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("could not spawn agent {name:?} from {}", .program.display())]
    Spawn {
        name: String,
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("agent {0:?} was spawned without a piped {1}")]
    MissingPipe(String, &'static str),
    #[error("could not write to the display")]
    Display(#[source] io::Error),
}

/// Message sent to the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// The start signal has been sent to every agent.
    Started,
    /// A line read from the output of agent `source`.
    Line { source: String, line: AgentLine },
    /// The output of agent `source` has closed.
    Closed { source: String },
}

/// How agent processes are launched.
#[derive(Debug, Clone)]
pub struct AgentCommand {
    program: PathBuf,
}

impl AgentCommand {
    pub fn new<P: Into<PathBuf>>(program: P) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Builds the command which runs the agent described by `config`. The
    /// agent's input and output are piped, and the process is killed when
    /// its handle is dropped.
    pub fn command(&self, config: &AgentConfig) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("--name")
            .arg(&config.name)
            .arg("--hashrate")
            .arg(config.hash_rate.to_string())
            .arg("--hash-threshold")
            .arg(config.hash_threshold.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        cmd
    }

    fn spawn(&self, config: &AgentConfig) -> Result<Child, ControllerError> {
        self.command(config)
            .spawn()
            .map_err(|source| ControllerError::Spawn {
                name: config.name.clone(),
                program: self.program.clone(),
                source,
            })
    }
}

/// A spawned agent whose output is being read by another task.
#[derive(Debug)]
struct RunningAgent {
    name: String,
    child: Child,
    stdin: ChildStdin,
}

/// Reads `reader` line by line and forwards every line to the aggregator,
/// followed by [`Update::Closed`] once the stream ends. Lines which are not
/// valid UTF-8 are decoded lossily.
pub async fn forward_lines<R>(
    source: String,
    reader: R,
    tx: mpsc::Sender<Update>,
) -> io::Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        if reader.read_until(b'\n', &mut buf).await? == 0 {
            break;
        }

        let line = AgentLine::parse_bytes(&buf);
        buf.clear();

        let update = Update::Line {
            source: source.clone(),
            line,
        };
        if tx.send(update).await.is_err() {
            // aggregator is gone
            return Ok(());
        }
    }

    debug!(%source, "agent output closed");
    let _ = tx.send(Update::Closed { source }).await;

    Ok(())
}

/// Applies every update to `tally` until all senders are dropped. The
/// dashboard is redrawn after each found block; non-event lines are passed
/// through as text.
pub async fn aggregate<W: Write>(
    mut rx: mpsc::Receiver<Update>,
    tally: &mut Tally,
    dashboard: &mut Dashboard<W>,
) -> io::Result<()> {
    while let Some(update) = rx.recv().await {
        match update {
            Update::Started => {
                dashboard.passthrough("Starting simulation now.")?;
            }
            Update::Line {
                line: AgentLine::Event(event),
                ..
            } => {
                if tally.record(&event) {
                    dashboard.draw(tally)?;
                }
            }
            Update::Line {
                line: AgentLine::Text(text),
                ..
            } => {
                if !text.trim().is_empty() {
                    dashboard.passthrough(&text)?;
                }
            }
            Update::Closed { source } => {
                info!(%source, "agent stopped producing output");
            }
        }
    }

    Ok(())
}

/// Orchestrates a majority/minority mining race.
#[derive(Debug)]
pub struct Controller {
    config: ControllerConfig,
    command: AgentCommand,
    phase: watch::Sender<Phase>,
}

impl Controller {
    pub fn new(
        config: ControllerConfig,
        command: AgentCommand,
    ) -> Result<Self, ControllerError> {
        config.validate()?;
        let (phase, _) = watch::channel(Phase::Idle);

        Ok(Self {
            config,
            command,
            phase,
        })
    }

    pub fn split(&self) -> HashrateSplit {
        self.config.split()
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver which observes every phase change.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn enter(&self, phase: Phase) {
        info!(?phase, "controller phase");
        self.phase.send_replace(phase);
    }

    /// Runs the simulation, drawing the live chart to `out`. Returns the
    /// final tally once the run ends.
    pub async fn run<W: Write>(
        &self,
        out: W,
    ) -> Result<Tally, ControllerError> {
        let agent_configs = self.config.agents();
        let names: Vec<String> =
            agent_configs.iter().map(|a| a.name.clone()).collect();

        self.enter(Phase::Spawning);
        let (tx, rx) = mpsc::channel(UPDATE_CHANNEL_CAPACITY);
        let mut readers = JoinSet::new();
        let mut agents = Vec::with_capacity(agent_configs.len());

        for config in &agent_configs {
            let mut child = self.command.spawn(config)?;
            info!(
                name = %config.name,
                hash_rate = config.hash_rate,
                pid = ?child.id(),
                "spawned agent"
            );

            let missing =
                |pipe| ControllerError::MissingPipe(config.name.clone(), pipe);
            let stdin = child.stdin.take().ok_or_else(|| missing("stdin"))?;
            let stdout = child.stdout.take().ok_or_else(|| missing("stdout"))?;

            let source = config.name.clone();
            readers.spawn(forward_lines(source, stdout, tx.clone()));
            agents.push(RunningAgent {
                name: config.name.clone(),
                child,
                stdin,
            });
        }

        self.enter(Phase::WaitingForWarmup);

        let mut tally = Tally::with_sources(names.iter().cloned());
        let mut dashboard = Dashboard::new(out, names);

        let (agents, aggregated) = tokio::join!(
            self.drive(agents, tx),
            aggregate(rx, &mut tally, &mut dashboard)
        );
        aggregated.map_err(ControllerError::Display)?;

        while let Some(res) = readers.join_next().await {
            match res {
                Ok(Ok(())) => (),
                Ok(Err(err)) => warn!(%err, "failed to read agent output"),
                Err(err) => warn!(%err, "agent reader task failed"),
            }
        }

        for mut agent in agents {
            match agent.child.wait().await {
                Ok(status) => log_exit(&agent.name, status),
                Err(err) => warn!(name = %agent.name, %err, "could not reap"),
            }
        }

        self.enter(Phase::Done);

        Ok(tally)
    }

    /// Sends the start signal after the warm-up delay and, if a run duration
    /// is configured, kills the agents once it has elapsed. Holds `tx` open
    /// until then.
    async fn drive(
        &self,
        mut agents: Vec<RunningAgent>,
        tx: mpsc::Sender<Update>,
    ) -> Vec<RunningAgent> {
        tokio::time::sleep(self.config.warmup).await;

        let start = format!("{}\n", START_TOKEN);
        for agent in agents.iter_mut() {
            let sent = async {
                agent.stdin.write_all(start.as_bytes()).await?;
                agent.stdin.flush().await
            };
            if let Err(err) = sent.await {
                warn!(name = %agent.name, %err, "could not send start signal");
            }
        }

        self.enter(Phase::Running);
        let _ = tx.send(Update::Started).await;

        if let Some(duration) = self.config.duration {
            tokio::time::sleep(duration).await;
            info!(?duration, "run duration elapsed, stopping agents");

            for agent in agents.iter_mut() {
                if let Err(err) = agent.child.start_kill() {
                    debug!(name = %agent.name, %err, "agent already exited");
                }
            }
        }

        agents
    }

    /// Final block count and share of every agent, next to its share of the
    /// total hashrate.
    pub fn summary(&self, tally: &Tally) -> String {
        let split = self.split();
        let total = split.total();

        [("majority", split.majority), ("minority", split.minority)]
            .iter()
            .map(|&(name, hash_rate)| {
                let hash_share = if total > 0.0 {
                    hash_rate / total
                } else {
                    0.0
                };
                let block_share = tally.block_share(name).unwrap_or(0.0);

                format!(
                    "{}: {} blocks ({:.1}% of blocks, {:.1}% of hashrate)\n",
                    name,
                    tally.block_count(name),
                    block_share * 100.0,
                    hash_share * 100.0,
                )
            })
            .collect()
    }
}

fn log_exit(name: &str, status: ExitStatus) {
    if status.success() {
        info!(%name, %status, "agent exited");
    } else {
        warn!(%name, %status, "agent exited");
    }
}

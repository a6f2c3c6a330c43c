use std::{io, path::PathBuf, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use hashrate_sim::{
    config::{DEFAULT_MAJORITY_FRACTION, DEFAULT_TOTAL_HASHRATE},
    prelude::*,
};
use tokio::signal;
use tracing::info;

/// CLI arguments for the mining controller.
#[derive(Parser, Debug)]
#[command(name = "mining-controller")]
#[command(
    about = "Races a majority and a minority mining agent and charts the \
             blocks they find"
)]
struct Cli {
    /// Fraction of the total hashrate given to the majority agent. The
    /// default 0.51 equates to 51 percent.
    #[arg(short = 'm', long, default_value_t = DEFAULT_MAJORITY_FRACTION)]
    majority_hashrate_percent: f64,

    /// Total hashrate per second, split between the agents.
    #[arg(short = 'r', long, default_value_t = DEFAULT_TOTAL_HASHRATE)]
    hashrate: u64,

    /// Max hash value in hex (4 bytes).
    #[arg(short = 't', long, default_value_t = HashThreshold::DEFAULT)]
    hash_threshold: HashThreshold,

    /// Seconds between spawning the agents and starting them.
    #[arg(long, default_value_t = 3.0)]
    warmup_secs: f64,

    /// Stop the agents after mining for this many seconds.
    #[arg(long)]
    duration_secs: Option<f64>,

    /// Mining agent executable. Defaults to `mining-agent` next to this
    /// executable.
    #[arg(long, value_name = "PATH")]
    agent: Option<PathBuf>,
}

impl Cli {
    fn config(&self) -> Result<ControllerConfig> {
        let warmup = Duration::try_from_secs_f64(self.warmup_secs)
            .context("invalid warm-up duration")?;
        let duration = self
            .duration_secs
            .map(Duration::try_from_secs_f64)
            .transpose()
            .context("invalid run duration")?;

        Ok(ControllerConfig {
            majority_fraction: self.majority_hashrate_percent,
            total_hashrate: self.hashrate,
            hash_threshold: self.hash_threshold,
            warmup,
            duration,
        })
    }

    async fn run(self) -> Result<()> {
        let config = self.config()?;
        let agent = match self.agent {
            Some(path) => path,
            None => hashrate_sim_cli::sibling_executable("mining-agent")?,
        };
        info!(agent = %agent.display(), ?config, "loaded configuration");

        let controller = Controller::new(config, AgentCommand::new(agent))?;
        let split = controller.split();

        println!("MiningController {}", env!("CARGO_PKG_VERSION"));
        println!(
            "Total Hashrate {}/s Majority {}/s Minority {}/s",
            self.hashrate, split.majority, split.minority
        );
        println!("Spinning up Mining Agents");

        tokio::select! {
            result = controller.run(io::stdout()) => {
                let tally = result.context("simulation failed")?;
                print!("{}", controller.summary(&tally));
            }
            _ = signal::ctrl_c() => {
                info!("interrupted, stopping agents");
            }
        }

        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    hashrate_sim_cli::init_tracing();

    Cli::parse().run().await
}

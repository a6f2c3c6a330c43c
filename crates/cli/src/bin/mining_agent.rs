use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Parser;
use hashrate_sim::{
    agent::wait_for_start, config::DEFAULT_AGENT_HASHRATE, prelude::*,
};
use tokio::{io::BufReader, signal};
use tracing::info;

/// CLI arguments for a mining agent.
#[derive(Parser, Debug)]
#[command(name = "mining-agent")]
#[command(about = "Simulated miner which reports found blocks as JSON lines")]
struct Cli {
    /// Agent name, attached to every event.
    #[arg(short, long, default_value = "")]
    name: String,

    /// Hash attempts per second.
    #[arg(short = 'r', long, default_value_t = DEFAULT_AGENT_HASHRATE)]
    hashrate: f64,

    /// A hash finds a block if its first 4 bytes are below this hex value.
    #[arg(short = 't', long, default_value_t = HashThreshold::DEFAULT)]
    hash_threshold: HashThreshold,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = AgentConfig {
            name: self.name,
            hash_rate: self.hashrate,
            hash_threshold: self.hash_threshold,
        };
        let agent = Agent::new(&config, JsonLines::new(io::stdout()))
            .context("invalid agent configuration")?;
        let stop = agent.stop_signal();

        if !print_line(&agent.banner())? {
            return Ok(());
        }

        let input = BufReader::new(tokio::io::stdin());
        tokio::select! {
            started = wait_for_start(input, io::stdout()) => match started {
                Ok(true) => (),
                Ok(false) => {
                    info!("input closed before the start signal");
                    return Ok(());
                }
                Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                    info!("output closed, stopping");
                    return Ok(());
                }
                Err(err) => {
                    return Err(err).context("could not read the start signal")
                }
            },
            _ = signal::ctrl_c() => {
                info!("interrupted before the start signal");
                return Ok(());
            }
        }
        if !print_line("")? {
            return Ok(());
        }

        let run = agent.run();
        tokio::pin!(run);
        let finished = tokio::select! {
            result = &mut run => Some(result),
            _ = signal::ctrl_c() => None,
        };
        let result = match finished {
            Some(result) => result,
            None => {
                info!("interrupted, stopping simulation");
                stop.stop();
                run.await
            }
        };

        match result {
            Ok(summary) => {
                info!(
                    hash_count = summary.hash_count,
                    block_count = summary.block_count,
                    time_error = summary.time_error,
                    "simulation finished"
                );
                Ok(())
            }
            Err(err) if err.is_broken_pipe() => {
                info!("output closed, stopping");
                Ok(())
            }
            Err(err) => Err(err).context("simulation failed"),
        }
    }
}

/// Writes `line` to stdout. Returns false if the reader has gone away.
fn print_line(line: &str) -> Result<bool> {
    match writeln!(io::stdout(), "{}", line) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
            info!("output closed, stopping");
            Ok(false)
        }
        Err(err) => Err(err).context("could not write to stdout"),
    }
}

fn main() -> Result<()> {
    hashrate_sim_cli::init_tracing();
    let cli = Cli::parse();

    let runtime =
        tokio::runtime::Runtime::new().context("could not start runtime")?;
    let result = runtime.block_on(cli.run());
    // a blocked read of stdin can't be cancelled, don't wait for it
    runtime.shutdown_background();

    result
}

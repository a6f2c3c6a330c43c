use std::time::Instant;

use anyhow::Result;
use clap::Parser;
use hashrate_sim::{
    config::{DEFAULT_MAJORITY_FRACTION, DEFAULT_TOTAL_HASHRATE},
    estimate::{expected_blocks_per_second, sample_block_counts},
    prelude::*,
};

/// Estimates the block share of a majority/minority split by sampling the
/// discovery condition, without the real-time simulation.
#[derive(Parser, Debug)]
#[command(name = "block-share")]
struct Cli {
    #[arg(short = 'm', long, default_value_t = DEFAULT_MAJORITY_FRACTION)]
    majority_hashrate_percent: f64,

    #[arg(short = 'r', long, default_value_t = DEFAULT_TOTAL_HASHRATE)]
    hashrate: u64,

    #[arg(short = 't', long, default_value_t = HashThreshold::DEFAULT)]
    hash_threshold: HashThreshold,

    /// Simulated mining time.
    #[arg(short, long, default_value_t = 3600.0)]
    seconds: f64,

    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    hashrate_sim_cli::init_tracing();
    let start = Instant::now();
    let cli = Cli::parse();

    let config = ControllerConfig {
        majority_fraction: cli.majority_hashrate_percent,
        total_hashrate: cli.hashrate,
        hash_threshold: cli.hash_threshold,
        ..Default::default()
    };
    config.validate()?;

    let split = config.split();
    let rates = [split.majority, split.minority];
    let counts =
        sample_block_counts(&rates, cli.hash_threshold, cli.seconds, cli.seed);
    let total: u64 = counts.iter().sum();

    println!(
        "{:<10} {:>12} {:>12} {:>10} {:>8}",
        "Miner", "Hashrate/s", "Expected/s", "Blocks", "Share"
    );
    for ((name, rate), count) in
        ["majority", "minority"].iter().zip(rates).zip(&counts)
    {
        let share = match total {
            0 => 0.0,
            total => *count as f64 / total as f64,
        };

        println!(
            "{:<10} {:>12.1} {:>12.4} {:>10} {:>7.1}%",
            name,
            rate,
            expected_blocks_per_second(rate, cli.hash_threshold),
            count,
            share * 100.0
        );
    }

    println!("elapsed time: {:.4} secs", start.elapsed().as_secs_f64());
    Ok(())
}

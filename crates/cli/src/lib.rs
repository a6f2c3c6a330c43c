//! Shared setup for the simulator's executables.

use std::path::PathBuf;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs a `tracing` subscriber which writes to stderr, filtered by
/// `RUST_LOG` (default `warn`). Standard output is left to the event stream
/// and the live chart.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Path of the executable `name` in the directory of the running executable.
pub fn sibling_executable(name: &str) -> anyhow::Result<PathBuf> {
    let exe = std::env::current_exe()
        .context("could not locate the current executable")?;
    let dir = exe
        .parent()
        .context("current executable has no parent directory")?;

    Ok(dir.join(format!("{}{}", name, std::env::consts::EXE_SUFFIX)))
}

//! Running per-agent totals kept by the controller.

use std::collections::BTreeMap;

use crate::event::{Event, Statistics};

/// What the controller knows about one agent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceTally {
    /// Number of [`Event::BlockFound`] events observed from this agent.
    pub block_count: u64,
    /// Payload of the most recent [`Event::Statistics`] event.
    pub statistics: Option<Statistics>,
}

/// Per-source aggregate of the events received from every agent.
///
/// Block counts are derived from the block events themselves, never from the
/// `block_count` field of a statistics payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tally {
    sources: BTreeMap<String, SourceTally>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a tally which already lists `sources` with zero blocks.
    pub fn with_sources<I, S>(sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            sources: sources
                .into_iter()
                .map(|s| (s.into(), SourceTally::default()))
                .collect(),
        }
    }

    /// Applies `event`. Returns true iff the event was a found block.
    pub fn record(&mut self, event: &Event) -> bool {
        let entry = self.sources.entry(event.source().to_string()).or_default();

        match event {
            Event::BlockFound { .. } => {
                entry.block_count += 1;
                true
            }
            Event::Statistics { payload, .. } => {
                entry.statistics = Some(payload.clone());
                false
            }
        }
    }

    pub fn get(&self, source: &str) -> Option<&SourceTally> {
        self.sources.get(source)
    }

    /// Blocks observed from `source`, `0` if it has never been seen.
    pub fn block_count(&self, source: &str) -> u64 {
        self.get(source).map_or(0, |s| s.block_count)
    }

    pub fn total_blocks(&self) -> u64 {
        self.sources.values().map(|s| s.block_count).sum()
    }

    /// Fraction of all observed blocks found by `source`, or `None` if no
    /// blocks have been observed.
    pub fn block_share(&self, source: &str) -> Option<f64> {
        match self.total_blocks() {
            0 => None,
            total => Some(self.block_count(source) as f64 / total as f64),
        }
    }
}

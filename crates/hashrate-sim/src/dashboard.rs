//! Live ASCII bar chart of the blocks found by each agent.

use std::io::{self, Write};

use crate::tally::Tally;

/// Widest bar drawn, in characters.
pub const MAX_BAR_WIDTH: usize = 80;

/// Moves the cursor up `n` lines and clears everything below it.
fn rewind(n: usize) -> String {
    format!("\x1b[{}A\x1b[J", n)
}

/// Returns the bar length of each count. Counts are drawn as-is while all of
/// them fit within `max_width`; otherwise every bar is scaled so the longest
/// one is exactly `max_width`.
pub fn bar_lengths(counts: &[u64], max_width: usize) -> Vec<usize> {
    let max = counts.iter().copied().max().unwrap_or(0);

    if max <= max_width as u64 {
        return counts.iter().map(|&c| c as usize).collect();
    }

    counts
        .iter()
        .map(|&c| (c as u128 * max_width as u128 / max as u128) as usize)
        .collect()
}

/// "majority" -> "Majority"
fn label(source: &str) -> String {
    let mut chars = source.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Renders one line per source, in the given order.
pub fn render(tally: &Tally, sources: &[String], max_width: usize) -> String {
    let counts: Vec<u64> =
        sources.iter().map(|s| tally.block_count(s)).collect();
    let lengths = bar_lengths(&counts, max_width);

    sources
        .iter()
        .zip(counts.iter().zip(lengths))
        .map(|(source, (count, len))| {
            format!("{} {:3}: {}\n", label(source), count, "#".repeat(len))
        })
        .collect()
}

/// Terminal display which redraws the chart in place.
///
/// Plain text written through [`Dashboard::passthrough`] scrolls the previous
/// chart away, and the next [`Dashboard::draw`] starts a fresh one below it.
#[derive(Debug)]
pub struct Dashboard<W> {
    out: W,
    sources: Vec<String>,
    max_width: usize,
    /// Lines of the chart currently at the bottom of the output.
    drawn_lines: usize,
}

impl<W: Write> Dashboard<W> {
    pub fn new<I, S>(out: W, sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            out,
            sources: sources.into_iter().map(Into::into).collect(),
            max_width: MAX_BAR_WIDTH,
            drawn_lines: 0,
        }
    }

    pub fn with_max_width(mut self, max_width: usize) -> Self {
        self.max_width = max_width;

        self
    }

    /// Draws the chart, replacing the previous one if it is still the last
    /// thing on screen.
    pub fn draw(&mut self, tally: &Tally) -> io::Result<()> {
        if self.drawn_lines > 0 {
            self.out.write_all(rewind(self.drawn_lines).as_bytes())?;
        }

        let chart = render(tally, &self.sources, self.max_width);
        self.out.write_all(chart.as_bytes())?;
        self.drawn_lines = self.sources.len();

        self.out.flush()
    }

    /// Writes a line of text below the chart.
    pub fn passthrough(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "{}", text)?;
        self.drawn_lines = 0;

        self.out.flush()
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

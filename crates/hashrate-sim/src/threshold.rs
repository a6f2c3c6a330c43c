//! The 32-bit discovery threshold shared by every simulated miner.

use std::{fmt::Display, str::FromStr};

/// A simulated hash finds a block iff its digest is strictly below this value.
///
/// Written and parsed as (up to) 8 hexadecimal digits, e.g. `00AFFFFF`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HashThreshold(u32);

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ThresholdParseError {
    #[error("hash threshold is empty")]
    Empty,
    #[error("hash threshold {0:?} has more than 8 hex digits")]
    TooLong(String),
    #[error("hash threshold {0:?} is not hexadecimal")]
    NotHex(String),
}

impl HashThreshold {
    /// Threshold used when none is configured.
    pub const DEFAULT: HashThreshold = HashThreshold(0x00AF_FFFF);

    /// Threshold which no digest can satisfy.
    pub const NEVER: HashThreshold = HashThreshold(0);

    /// Largest representable threshold. Every digest except `0xFFFFFFFF`
    /// satisfies it.
    pub const MAX: HashThreshold = HashThreshold(u32::MAX);

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Returns true if `digest` finds a block.
    #[inline]
    pub fn is_met_by(&self, digest: u32) -> bool {
        digest < self.0
    }

    /// Probability that a single uniformly random digest finds a block,
    /// `threshold / 2^32`.
    pub fn probability(&self) -> f64 {
        self.0 as f64 / 4_294_967_296.0
    }
}

impl Default for HashThreshold {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl From<u32> for HashThreshold {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Display for HashThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl FromStr for HashThreshold {
    type Err = ThresholdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ThresholdParseError::*;

        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(Empty);
        }
        if digits.len() > 8 {
            return Err(TooLong(s.to_string()));
        }
        // from_str_radix accepts a leading '+', which is not a hex digit
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(NotHex(s.to_string()));
        }

        u32::from_str_radix(digits, 16)
            .map(HashThreshold)
            .map_err(|_| NotHex(s.to_string()))
    }
}

/*!
Offline estimates of block production

These helpers answer "how many blocks should a miner find?" without running
the real-time loop of [`Simulator`](crate::simulator::Simulator). Sampling is
split into fixed-size chunks, each with its own seeded generator, so results
only depend on the seed. With the `rayon` feature (on by default) the chunks
are sampled in parallel.
*/

use rand::{rngs::StdRng, SeedableRng};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

use crate::{hash, threshold::HashThreshold};

/// Number of attempts sampled by a single generator.
const CHUNK_SIZE: u64 = 1 << 16;

/// Expected blocks per second for a miner making `hash_rate` attempts per
/// second against `threshold`.
pub fn expected_blocks_per_second(
    hash_rate: f64,
    threshold: HashThreshold,
) -> f64 {
    hash_rate * threshold.probability()
}

/// Counts how many of `attempts` simulated hashes satisfy `threshold`.
pub fn sample_blocks(
    threshold: HashThreshold,
    attempts: u64,
    seed: u64,
) -> u64 {
    let chunks = attempts.div_ceil(CHUNK_SIZE);
    let count_chunk = |chunk: u64| {
        let len = CHUNK_SIZE.min(attempts - chunk * CHUNK_SIZE);
        let mut rng = StdRng::seed_from_u64(seed ^ chunk);

        (0..len)
            .filter(|_| threshold.is_met_by(hash::attempt(&mut rng)))
            .count() as u64
    };

    #[cfg(feature = "rayon")]
    let total = (0..chunks).into_par_iter().map(count_chunk).sum();
    #[cfg(not(feature = "rayon"))]
    let total = (0..chunks).map(count_chunk).sum();

    total
}

/// Fraction of `attempts` simulated hashes which satisfy `threshold`.
/// Converges to [`HashThreshold::probability`].
pub fn sample_discovery_rate(
    threshold: HashThreshold,
    attempts: u64,
    seed: u64,
) -> f64 {
    if attempts == 0 {
        return 0.0;
    }

    sample_blocks(threshold, attempts, seed) as f64 / attempts as f64
}

/// Block counts a set of miners would produce over `seconds`, sampled from
/// their hashrates. Each miner is sampled with a seed derived from `seed`
/// and its position.
pub fn sample_block_counts(
    hash_rates: &[f64],
    threshold: HashThreshold,
    seconds: f64,
    seed: u64,
) -> Vec<u64> {
    hash_rates
        .iter()
        .enumerate()
        .map(|(i, rate)| {
            let attempts = (rate * seconds).max(0.0).round() as u64;
            let miner_seed = seed.wrapping_add((i as u64 + 1) << 32);

            sample_blocks(threshold, attempts, miner_seed)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        expected_blocks_per_second, sample_block_counts, sample_blocks,
        sample_discovery_rate,
    };
    use crate::threshold::HashThreshold;

    #[test]
    fn expected_rate_of_default_threshold() {
        let expected =
            expected_blocks_per_second(510.0, HashThreshold::DEFAULT);
        let exact = 510.0 * 0x00AF_FFFF as f64 / 2f64.powi(32);

        assert!((expected - exact).abs() < 1e-12);
    }

    #[test]
    fn discovery_rate_converges() {
        let attempts = 2_000_000;

        for threshold in [0x00AF_FFFF, 0x1000_0000, 0x8000_0000] {
            let threshold = HashThreshold::new(threshold);
            let p = threshold.probability();
            let observed = sample_discovery_rate(threshold, attempts, 1);

            // five standard deviations of a binomial proportion
            let tolerance = 5.0 * (p * (1.0 - p) / attempts as f64).sqrt();
            assert!(
                (observed - p).abs() < tolerance,
                "threshold {}: observed {}, expected {}",
                threshold,
                observed,
                p
            );
        }
    }

    #[test]
    fn extreme_thresholds() {
        assert_eq!(sample_blocks(HashThreshold::NEVER, 100_000, 3), 0);
        assert_eq!(sample_blocks(HashThreshold::MAX, 100_000, 3), 100_000);
        assert_eq!(sample_discovery_rate(HashThreshold::MAX, 0, 3), 0.0);
    }

    #[test]
    fn sampling_depends_only_on_seed() {
        let thr = HashThreshold::new(0x2000_0000);

        assert_eq!(
            sample_blocks(thr, 200_001, 9),
            sample_blocks(thr, 200_001, 9)
        );
    }

    #[test]
    fn majority_out_mines_minority() {
        let counts = sample_block_counts(
            &[900.0, 100.0],
            HashThreshold::new(0x1000_0000),
            1000.0,
            5,
        );

        assert_eq!(counts.len(), 2);
        assert!(counts[0] > counts[1]);
    }
}

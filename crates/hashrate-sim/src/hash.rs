//! Simulated proof-of-work digests.

use rand::Rng;
use sha2::{Digest, Sha256};

/// Returns the first 4 bytes of `SHA-256(preimage)` as a big-endian `u32`.
pub fn digest_prefix(preimage: &[u8]) -> u32 {
    let hash = Sha256::digest(preimage);

    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

/// Performs one simulated hash attempt: hashes 4 random bytes drawn from
/// `rng` and returns the digest prefix.
#[inline]
pub fn attempt<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    let preimage: [u8; 4] = rng.gen();

    digest_prefix(&preimage)
}

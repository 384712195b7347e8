//! Streaming cryptographic hashes.

mod sha256;
mod sha512;

pub use sha256::Sha256;
pub use sha512::Sha512;

use crate::bits::BitArray;
use crate::error::Result;

/// Cumulative input beyond this many bits is rejected. The padding scheme's
/// length field must stay exact in every environment the digests are
/// exchanged with, including ones whose numbers lose integer precision past
/// 2^53 − 1; the ceiling is part of the contract, not an algorithmic limit.
pub(crate) const MAX_HASH_BITS: u64 = (1 << 53) - 1;

/// The streaming-hash contract: `reset` → any number of `update`s →
/// `finalize`, which returns the digest and re-arms the initial state.
///
/// Implementations are `Clone` so a partially-fed state can be forked, which
/// HMAC relies on for its precomputed keyed states.
pub trait Digest: Clone {
    /// Input block size in bits.
    const BLOCK_BITS: usize;
    /// Digest size in bits.
    const OUTPUT_BITS: usize;

    fn new() -> Self;

    /// Returns the state to the initial constants, discarding buffered input.
    fn reset(&mut self);

    /// Feeds input of any bit length; complete blocks are compressed
    /// immediately and the remainder buffered.
    fn update(&mut self, data: &BitArray) -> Result<()>;

    /// Applies padding, compresses the final block(s), returns the digest,
    /// and resets the state.
    fn finalize(&mut self) -> BitArray;

    /// One-shot convenience.
    fn hash(data: &BitArray) -> Result<BitArray> {
        let mut h = Self::new();
        h.update(data)?;
        Ok(h.finalize())
    }
}

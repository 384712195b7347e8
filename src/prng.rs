//! Seed-accumulating pseudo-random generator (Fortuna-style).
//!
//! Entropy from caller-supplied environmental events is folded into rotating
//! SHA-256 pools; drawing output drains the pools into a 256-bit AES key and
//! generates through counter mode, rekeying on a fixed quota and after every
//! draw so a captured state cannot be extended backwards.
//!
//! The generator is an explicit value, not ambient state: the composition
//! root owns it and hands it (behind a `Mutex` when shared across threads)
//! to whatever needs randomness. Collecting environmental events is the
//! caller's job; [`Prng::add_entropy`] is the boundary.

use std::collections::HashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use zeroize::Zeroize;

use crate::aes::Aes;
use crate::bits::BitArray;
use crate::codec::utf8;
use crate::error::{Result, StrongboxError};
use crate::hash::{Digest, Sha256};

/// Minimum entropy (bits) a draw requires, indexed by paranoia level.
const PARANOIA_BITS: [u32; 11] = [0, 48, 64, 96, 128, 192, 256, 384, 512, 768, 1024];

/// Paranoia level used when a call does not pick its own.
pub const DEFAULT_PARANOIA: usize = 6;

/// Output words between forced rekeys within one draw.
const MAX_WORDS_PER_BURST: usize = 0x10000;

/// Once this much entropy sits in pool 0, a timed reseed becomes due.
const BITS_PER_RESEED: u32 = 80;

const RESEED_INTERVAL: Duration = Duration::from_millis(30_000);

/// An entropy event. The closed set of shapes keeps malformed samples out at
/// the type level.
pub enum EntropySample<'a> {
    Number(u32),
    Words(&'a [u32]),
    Text(&'a str),
}

/// Generator readiness for a given paranoia level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Not enough entropy collected; drawing fails.
    NotReady,
    /// Enough entropy collected but never folded into the key; the next draw
    /// performs a full reseed first.
    SeedPending,
    /// Seeded above the threshold.
    Ready,
    /// Seeded, and the timed/volume reseed window has elapsed; the next draw
    /// folds fresh pool entropy in first.
    ReseedDue,
}

pub struct Prng {
    pools: Vec<Sha256>,
    pool_entropy: Vec<u32>,
    reseed_count: u32,
    source_robins: HashMap<String, usize>,
    source_ids: HashMap<String, u32>,
    next_source_id: u32,
    event_count: u32,
    collected_bits: u32,
    strength: u32,
    key: [u32; 8],
    counter: [u32; 4],
    cipher: Option<Aes>,
    default_paranoia: usize,
    next_reseed: Option<Instant>,
}

impl Default for Prng {
    fn default() -> Self {
        Self::new(DEFAULT_PARANOIA)
    }
}

impl Prng {
    pub fn new(default_paranoia: usize) -> Prng {
        Prng {
            pools: vec![Sha256::new()],
            pool_entropy: vec![0],
            reseed_count: 0,
            source_robins: HashMap::new(),
            source_ids: HashMap::new(),
            next_source_id: 0,
            event_count: 0,
            collected_bits: 0,
            strength: 0,
            key: [0; 8],
            counter: [0; 4],
            cipher: None,
            default_paranoia: default_paranoia.min(PARANOIA_BITS.len() - 1),
            next_reseed: None,
        }
    }

    /// Changes the default paranoia level. Level 0 disables the seeding
    /// check entirely, so it can only be chosen per call, for tests.
    pub fn set_default_paranoia(&mut self, level: usize) -> Result<()> {
        if level == 0 || level >= PARANOIA_BITS.len() {
            return Err(StrongboxError::Invalid(
                "paranoia must be between 1 and 10".to_string(),
            ));
        }
        self.default_paranoia = level;
        Ok(())
    }

    /// Folds an entropy event into one of the rotating pools (chosen
    /// round-robin per source tag) together with a source id, a monotonic
    /// event counter, and a timestamp. `estimated_bits` defaults to a
    /// conservative per-shape estimate.
    pub fn add_entropy(
        &mut self,
        sample: EntropySample<'_>,
        estimated_bits: Option<u32>,
        source: &str,
    ) -> Result<()> {
        let pool_count = self.pools.len();
        let robin = {
            let slot = self.source_robins.entry(source.to_string()).or_insert(0);
            let robin = *slot % pool_count;
            *slot = (robin + 1) % pool_count;
            robin
        };
        let id = match self.source_ids.get(source) {
            Some(&id) => id,
            None => {
                let id = self.next_source_id;
                self.next_source_id += 1;
                self.source_ids.insert(source.to_string(), id);
                id
            }
        };
        let event = self.event_count;
        self.event_count = self.event_count.wrapping_add(1);
        let ts = timestamp_millis();

        let pool = &mut self.pools[robin];
        let bits = match sample {
            EntropySample::Number(value) => {
                let bits = estimated_bits.unwrap_or(1);
                pool.update(&BitArray::from_words(vec![id, event, 1, bits, ts, 1, value]))?;
                bits
            }
            EntropySample::Words(values) => {
                let bits = estimated_bits
                    .unwrap_or_else(|| values.iter().map(|v| 32 - v.leading_zeros()).sum());
                let mut record = vec![id, event, 2, bits, ts, values.len() as u32];
                record.extend_from_slice(values);
                pool.update(&BitArray::from_words(record))?;
                bits
            }
            EntropySample::Text(text) => {
                let bits = estimated_bits.unwrap_or(text.len() as u32);
                pool.update(&BitArray::from_words(vec![
                    id,
                    event,
                    3,
                    bits,
                    ts,
                    text.len() as u32,
                ]))?;
                pool.update(&utf8::to_bits(text))?;
                bits
            }
        };
        self.pool_entropy[robin] += bits;
        self.collected_bits += bits;
        Ok(())
    }

    /// Readiness at `paranoia`, or the default level when `None`.
    pub fn readiness(&self, paranoia: Option<usize>) -> Readiness {
        let level = paranoia
            .unwrap_or(self.default_paranoia)
            .min(PARANOIA_BITS.len() - 1);
        let required = PARANOIA_BITS[level];
        if self.strength > 0 && self.strength >= required {
            let window_elapsed = self.next_reseed.map_or(true, |t| Instant::now() > t);
            if self.pool_entropy[0] > BITS_PER_RESEED && window_elapsed {
                Readiness::ReseedDue
            } else {
                Readiness::Ready
            }
        } else if self.collected_bits >= required {
            Readiness::SeedPending
        } else {
            Readiness::NotReady
        }
    }

    /// Fraction of the entropy threshold collected so far, in `0.0..=1.0`.
    pub fn progress(&self, paranoia: Option<usize>) -> f64 {
        let level = paranoia
            .unwrap_or(self.default_paranoia)
            .min(PARANOIA_BITS.len() - 1);
        let required = PARANOIA_BITS[level];
        if required == 0 || self.strength >= required || self.collected_bits >= required {
            1.0
        } else {
            self.collected_bits as f64 / required as f64
        }
    }

    /// Draws `count` random words. Fails with [`StrongboxError::NotReady`]
    /// below the paranoia threshold; otherwise reseeds if due, generates in
    /// counter mode, and rekeys before returning.
    pub fn random_words(&mut self, count: usize, paranoia: Option<usize>) -> Result<Vec<u32>> {
        match self.readiness(paranoia) {
            Readiness::NotReady => {
                return Err(StrongboxError::NotReady(
                    "generator isn't seeded".to_string(),
                ))
            }
            Readiness::SeedPending => self.reseed(true)?,
            Readiness::ReseedDue => self.reseed(false)?,
            Readiness::Ready => {}
        }
        let mut out = Vec::with_capacity(count + 3);
        while out.len() < count {
            if !out.is_empty() && out.len() % MAX_WORDS_PER_BURST == 0 {
                self.rekey()?;
            }
            out.extend_from_slice(&self.next_block()?);
        }
        self.rekey()?;
        out.truncate(count);
        Ok(out)
    }

    /// Drains pool digests into a fresh key. A full reseed (first seeding)
    /// takes every pool; a scheduled one follows the Fortuna cadence, taking
    /// pool *i* only on every 2^i-th reseed.
    fn reseed(&mut self, full: bool) -> Result<()> {
        let mut seed: Vec<u32> = vec![timestamp_millis()];
        let mut drained = 0u32;
        for g in 0..self.pools.len() {
            seed.extend(self.pools[g].finalize().words());
            drained += self.pool_entropy[g];
            self.pool_entropy[g] = 0;
            let gate = 1u32.checked_shl(g as u32).unwrap_or(0);
            if !full && self.reseed_count & gate != 0 {
                break;
            }
        }
        if self.pools.len() < 32 && (self.reseed_count as u64) >= 1u64 << self.pools.len() {
            self.pools.push(Sha256::new());
            self.pool_entropy.push(0);
        }
        self.collected_bits = self.collected_bits.saturating_sub(drained);
        if drained > self.strength {
            self.strength = drained;
        }
        self.reseed_count = self.reseed_count.wrapping_add(1);

        let material = BitArray::from_words(self.key.to_vec()).concat(&BitArray::from_words(seed));
        let digest = Sha256::hash(&material)?;
        self.key.copy_from_slice(digest.words());
        self.cipher = Some(Aes::new(&self.key)?);
        self.increment_counter();
        self.next_reseed = Some(Instant::now() + RESEED_INTERVAL);
        Ok(())
    }

    /// Replaces the key with generator output, so past output cannot be
    /// reconstructed from a later state capture.
    fn rekey(&mut self) -> Result<()> {
        let a = self.next_block()?;
        let b = self.next_block()?;
        self.key[..4].copy_from_slice(&a);
        self.key[4..].copy_from_slice(&b);
        self.cipher = Some(Aes::new(&self.key)?);
        Ok(())
    }

    fn next_block(&mut self) -> Result<[u32; 4]> {
        self.increment_counter();
        match &self.cipher {
            Some(cipher) => Ok(cipher.encrypt_block(self.counter)),
            None => Err(StrongboxError::Bug(
                "random: generator used before reseed".to_string(),
            )),
        }
    }

    fn increment_counter(&mut self) {
        for word in self.counter.iter_mut() {
            *word = word.wrapping_add(1);
            if *word != 0 {
                break;
            }
        }
    }
}

impl Drop for Prng {
    fn drop(&mut self) {
        self.key.zeroize();
        self.counter.zeroize();
    }
}

fn timestamp_millis() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u32)
        .unwrap_or(0)
}

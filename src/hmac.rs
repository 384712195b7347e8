use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::hash::{Digest, Sha256};

/// HMAC (RFC 2104) over any streaming hash.
///
/// The inner and outer keyed states are computed once at construction; each
/// `digest` forks the outer state, so an instance can produce any number of
/// MACs. The one-shot [`mac`](Hmac::mac) refuses to run on an instance that
/// has already consumed input through [`update`](Hmac::update), so a stream
/// in progress cannot be silently folded into an unrelated MAC.
pub struct Hmac<H: Digest = Sha256> {
    inner_init: H,
    outer_init: H,
    active: H,
    updated: bool,
}

impl<H: Digest> Hmac<H> {
    /// Keys the MAC. A key longer than the hash's block size is hashed down
    /// first; shorter keys are zero-padded to the block.
    pub fn new(key: &BitArray) -> Result<Hmac<H>> {
        let key = if key.bit_length() > H::BLOCK_BITS {
            H::hash(key)?
        } else {
            key.clone()
        };
        let mut key_words = key.words().to_vec();
        key_words.resize(H::BLOCK_BITS / 32, 0);

        let ipad: Vec<u32> = key_words.iter().map(|w| w ^ 0x3636_3636).collect();
        let opad: Vec<u32> = key_words.iter().map(|w| w ^ 0x5c5c_5c5c).collect();

        let mut inner_init = H::new();
        inner_init.update(&BitArray::from_words(ipad))?;
        let mut outer_init = H::new();
        outer_init.update(&BitArray::from_words(opad))?;

        let active = inner_init.clone();
        Ok(Hmac {
            inner_init,
            outer_init,
            active,
            updated: false,
        })
    }

    /// Feeds message data, streaming.
    pub fn update(&mut self, data: &BitArray) -> Result<()> {
        self.updated = true;
        self.active.update(data)
    }

    /// Completes the MAC over everything fed so far and re-arms the instance.
    pub fn digest(&mut self) -> Result<BitArray> {
        let inner = self.active.finalize();
        let mut outer = self.outer_init.clone();
        outer.update(&inner)?;
        let out = outer.finalize();
        self.reset();
        Ok(out)
    }

    /// One-shot MAC of `data`. Fails if the instance already consumed input
    /// through the incremental interface.
    pub fn mac(&mut self, data: &BitArray) -> Result<BitArray> {
        if self.updated {
            return Err(StrongboxError::Invalid(
                "hmac: mac called on an already updated instance".to_string(),
            ));
        }
        self.update(data)?;
        self.digest()
    }

    /// Discards any partial stream and re-arms the keyed state.
    pub fn reset(&mut self) {
        self.active = self.inner_init.clone();
        self.updated = false;
    }
}

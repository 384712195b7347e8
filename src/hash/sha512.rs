use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::hash::{Digest, MAX_HASH_BITS};

const INIT: [u64; 8] = [
    0x6a09e667f3bcc908,
    0xbb67ae8584caa73b,
    0x3c6ef372fe94f82b,
    0xa54ff53a5f1d36f1,
    0x510e527fade682d1,
    0x9b05688c2b3e6c1f,
    0x1f83d9abfb41bd6b,
    0x5be0cd19137e2179,
];

const K: [u64; 80] = [
    0x428a2f98d728ae22,
    0x7137449123ef65cd,
    0xb5c0fbcfec4d3b2f,
    0xe9b5dba58189dbbc,
    0x3956c25bf348b538,
    0x59f111f1b605d019,
    0x923f82a4af194f9b,
    0xab1c5ed5da6d8118,
    0xd807aa98a3030242,
    0x12835b0145706fbe,
    0x243185be4ee4b28c,
    0x550c7dc3d5ffb4e2,
    0x72be5d74f27b896f,
    0x80deb1fe3b1696b1,
    0x9bdc06a725c71235,
    0xc19bf174cf692694,
    0xe49b69c19ef14ad2,
    0xefbe4786384f25e3,
    0x0fc19dc68b8cd5b5,
    0x240ca1cc77ac9c65,
    0x2de92c6f592b0275,
    0x4a7484aa6ea6e483,
    0x5cb0a9dcbd41fbd4,
    0x76f988da831153b5,
    0x983e5152ee66dfab,
    0xa831c66d2db43210,
    0xb00327c898fb213f,
    0xbf597fc7beef0ee4,
    0xc6e00bf33da88fc2,
    0xd5a79147930aa725,
    0x06ca6351e003826f,
    0x142929670a0e6e70,
    0x27b70a8546d22ffc,
    0x2e1b21385c26c926,
    0x4d2c6dfc5ac42aed,
    0x53380d139d95b3df,
    0x650a73548baf63de,
    0x766a0abb3c77b2a8,
    0x81c2c92e47edaee6,
    0x92722c851482353b,
    0xa2bfe8a14cf10364,
    0xa81a664bbc423001,
    0xc24b8b70d0f89791,
    0xc76c51a30654be30,
    0xd192e819d6ef5218,
    0xd69906245565a910,
    0xf40e35855771202a,
    0x106aa07032bbd1b8,
    0x19a4c116b8d2d0c8,
    0x1e376c085141ab53,
    0x2748774cdf8eeb99,
    0x34b0bcb5e19b48a8,
    0x391c0cb3c5c95a63,
    0x4ed8aa4ae3418acb,
    0x5b9cca4f7763e373,
    0x682e6ff3d6b2b8a3,
    0x748f82ee5defb2fc,
    0x78a5636f43172f60,
    0x84c87814a1f0ab72,
    0x8cc702081a6439ec,
    0x90befffa23631e28,
    0xa4506cebde82bde9,
    0xbef9a3f7b2c67915,
    0xc67178f2e372532b,
    0xca273eceea26619c,
    0xd186b8c721c0c207,
    0xeada7dd6cde0eb1e,
    0xf57d4f7fee6ed178,
    0x06f067aa72176fba,
    0x0a637dc5a2c898a6,
    0x113f9804bef90dae,
    0x1b710b35131c471b,
    0x28db77f523047d84,
    0x32caab7b40c72493,
    0x3c9ebe0a15c9bebc,
    0x431d67c49c100d4c,
    0x4cc5d4becb3e42b6,
    0x597f299cfc657e2a,
    0x5fcb6fab3ad6faec,
    0x6c44198c4a475817,
];

/// Streaming SHA-512. Lane arithmetic is native `u64`.
#[derive(Clone)]
pub struct Sha512 {
    state: [u64; 8],
    buffer: BitArray,
    length: u64,
}

impl Default for Sha512 {
    fn default() -> Self {
        Self::new()
    }
}

impl Sha512 {
    pub fn new() -> Self {
        Sha512 {
            state: INIT,
            buffer: BitArray::new(),
            length: 0,
        }
    }

    fn process_block(&mut self, block: &[u32]) {
        debug_assert_eq!(block.len(), 32);
        let mut w = [0u64; 16];
        for (i, lane) in w.iter_mut().enumerate() {
            *lane = (block[i * 2] as u64) << 32 | block[i * 2 + 1] as u64;
        }

        let [mut a, mut b, mut c, mut d, mut e, mut f, mut g, mut h] = self.state;

        for i in 0..80 {
            if i >= 16 {
                let s0 = w[(i + 1) & 15];
                let s0 = s0.rotate_right(1) ^ s0.rotate_right(8) ^ (s0 >> 7);
                let s1 = w[(i + 14) & 15];
                let s1 = s1.rotate_right(19) ^ s1.rotate_right(61) ^ (s1 >> 6);
                w[i & 15] = w[i & 15]
                    .wrapping_add(s0)
                    .wrapping_add(s1)
                    .wrapping_add(w[(i + 9) & 15]);
            }
            let big_s1 = e.rotate_right(14) ^ e.rotate_right(18) ^ e.rotate_right(41);
            let ch = (e & f) ^ (!e & g);
            let t1 = h
                .wrapping_add(big_s1)
                .wrapping_add(ch)
                .wrapping_add(K[i])
                .wrapping_add(w[i & 15]);
            let big_s0 = a.rotate_right(28) ^ a.rotate_right(34) ^ a.rotate_right(39);
            let maj = (a & b) ^ (a & c) ^ (b & c);
            let t2 = big_s0.wrapping_add(maj);
            h = g;
            g = f;
            f = e;
            e = d.wrapping_add(t1);
            d = c;
            c = b;
            b = a;
            a = t1.wrapping_add(t2);
        }

        for (s, v) in self.state.iter_mut().zip([a, b, c, d, e, f, g, h]) {
            *s = s.wrapping_add(v);
        }
    }
}

impl Digest for Sha512 {
    const BLOCK_BITS: usize = 1024;
    const OUTPUT_BITS: usize = 512;

    fn new() -> Self {
        Sha512::new()
    }

    fn reset(&mut self) {
        self.state = INIT;
        self.buffer = BitArray::new();
        self.length = 0;
    }

    fn update(&mut self, data: &BitArray) -> Result<()> {
        self.length += data.bit_length() as u64;
        if self.length > MAX_HASH_BITS {
            return Err(StrongboxError::Invalid(
                "cannot hash more than 2^53 - 1 bits".to_string(),
            ));
        }
        self.buffer = self.buffer.concat(data);
        while self.buffer.bit_length() >= Self::BLOCK_BITS {
            let block = self.buffer.drain_front_words(32);
            self.process_block(&block);
        }
        Ok(())
    }

    fn finalize(&mut self) -> BitArray {
        // one 1-bit, zero fill, then the 128-bit big-endian length (the high
        // 64 bits are zero under the input-size guard)
        let mut words = self
            .buffer
            .concat(&BitArray::partial(1, 1))
            .words()
            .to_vec();
        while (words.len() + 4) % 32 != 0 {
            words.push(0);
        }
        words.push(0);
        words.push(0);
        words.push((self.length >> 32) as u32);
        words.push(self.length as u32);
        for block in words.chunks(32) {
            self.process_block(block);
        }
        let mut out = Vec::with_capacity(16);
        for s in self.state {
            out.push((s >> 32) as u32);
            out.push(s as u32);
        }
        self.reset();
        BitArray::from_words(out)
    }
}

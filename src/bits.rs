use subtle::ConstantTimeEq;

/// An ordered sequence of bits packed big-endian into 32-bit words.
///
/// The logical length is tracked in bits and need not be word-aligned: the
/// final word is left-aligned, with every bit below the logical length zero.
/// That invariant makes equality a plain field comparison and lets the cipher
/// modes treat out-of-range words as zero.
///
/// Operations never mutate in place; they return new sequences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct BitArray {
    words: Vec<u32>,
    bits: usize,
}

impl BitArray {
    /// The empty bit sequence.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sequence from whole 32-bit words.
    pub fn from_words(words: Vec<u32>) -> Self {
        let bits = words.len() * 32;
        Self { words, bits }
    }

    /// Builds a sequence of `bits` bits (at most 32) from the low bits of
    /// `value`, stored left-aligned.
    pub fn partial(bits: usize, value: u32) -> Self {
        let bits = bits.min(32);
        if bits == 0 {
            return Self::new();
        }
        let word = if bits == 32 { value } else { value << (32 - bits) };
        Self {
            words: vec![word],
            bits,
        }
    }

    /// Normalizes raw words to the clamp invariant: exactly
    /// `ceil(bits / 32)` words, excess bits of the final word zeroed.
    pub fn from_parts(mut words: Vec<u32>, bits: usize) -> Self {
        words.resize(bits.div_ceil(32), 0);
        let rem = bits & 31;
        if rem != 0 {
            if let Some(last) = words.last_mut() {
                *last &= u32::MAX << (32 - rem);
            }
        }
        Self { words, bits }
    }

    /// Exact length in bits.
    pub fn bit_length(&self) -> usize {
        self.bits
    }

    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    /// The packed words. The final word is left-aligned and zero-clamped.
    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub(crate) fn words_mut(&mut self) -> &mut [u32] {
        &mut self.words
    }

    /// Word at `index`, or zero past the end.
    pub fn word(&self, index: usize) -> u32 {
        self.words.get(index).copied().unwrap_or(0)
    }

    /// Four consecutive words starting at `word_index`, zero-padded past the
    /// end. The cipher modes consume data one such block at a time.
    pub(crate) fn block4(&self, word_index: usize) -> [u32; 4] {
        [
            self.word(word_index),
            self.word(word_index + 1),
            self.word(word_index + 2),
            self.word(word_index + 3),
        ]
    }

    /// Bit-exact concatenation, regardless of partial-word boundaries.
    pub fn concat(&self, other: &BitArray) -> BitArray {
        if self.bits == 0 {
            return other.clone();
        }
        if other.bits == 0 {
            return self.clone();
        }
        let total = self.bits + other.bits;
        let mut words = self.words.clone();
        let used = self.bits & 31;
        if used == 0 {
            words.extend_from_slice(&other.words);
        } else {
            let mut carry = words.pop().unwrap_or(0);
            for &w in &other.words {
                words.push(carry | (w >> used));
                carry = w << (32 - used);
            }
            words.push(carry);
        }
        Self::from_parts(words, total)
    }

    /// The sub-sequence `[start, end)` in bits. `end` saturates at the
    /// sequence length.
    pub fn bit_slice(&self, start: usize, end: usize) -> BitArray {
        let end = end.min(self.bits);
        if start >= end {
            return BitArray::new();
        }
        self.shift_out(start).clamp(end - start)
    }

    /// The sub-sequence from bit `start` to the end.
    pub fn bit_slice_from(&self, start: usize) -> BitArray {
        if start >= self.bits {
            return BitArray::new();
        }
        self.shift_out(start)
    }

    /// Truncates to `bits` bits, zeroing the boundary word below the cut.
    /// A request longer than the sequence returns it unchanged.
    pub fn clamp(&self, bits: usize) -> BitArray {
        if bits >= self.bits {
            return self.clone();
        }
        Self::from_parts(self.words.clone(), bits)
    }

    /// Extracts a field of `length` bits (at most 32) starting at bit
    /// `start`, possibly spanning a word boundary, as a low-aligned integer.
    pub fn extract(&self, start: usize, length: usize) -> u32 {
        if length == 0 {
            return 0;
        }
        debug_assert!(length <= 32);
        let off = start & 31;
        let w0 = self.word(start / 32);
        let mask = ((1u64 << length) - 1) as u32;
        if off + length <= 32 {
            (w0 >> (32 - off - length)) & mask
        } else {
            let w1 = self.word(start / 32 + 1);
            ((w0 << (off + length - 32)) | (w1 >> (64 - off - length))) & mask
        }
    }

    /// Constant-structure equality over the full length: the word XOR is
    /// accumulated without early exit, so tag comparisons do not leak the
    /// position of the first difference. Bit lengths are not secret.
    pub fn ct_eq(&self, other: &BitArray) -> bool {
        if self.bits != other.bits {
            return false;
        }
        self.words.as_slice().ct_eq(other.words.as_slice()).into()
    }

    /// Packs big-endian bytes, eight bits per byte.
    pub fn from_bytes(bytes: &[u8]) -> BitArray {
        let mut words = Vec::with_capacity(bytes.len().div_ceil(4));
        let mut acc = 0u32;
        for (i, &b) in bytes.iter().enumerate() {
            acc = acc << 8 | b as u32;
            if i & 3 == 3 {
                words.push(acc);
                acc = 0;
            }
        }
        let rem = bytes.len() & 3;
        if rem != 0 {
            words.push(acc << (32 - 8 * rem));
        }
        Self {
            words,
            bits: bytes.len() * 8,
        }
    }

    /// Unpacks to big-endian bytes, `ceil(bits / 8)` of them; trailing bits
    /// of the last byte are zero.
    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.bits.div_ceil(8);
        let mut out = Vec::with_capacity(n);
        'outer: for &w in &self.words {
            for shift in [24, 16, 8, 0] {
                if out.len() == n {
                    break 'outer;
                }
                out.push((w >> shift) as u8);
            }
        }
        out.resize(n, 0);
        out
    }

    /// Removes and returns the first `n` whole words. The hash buffers drain
    /// complete blocks this way; any partial word stays at the tail, so the
    /// head is always word-aligned.
    pub(crate) fn drain_front_words(&mut self, n: usize) -> Vec<u32> {
        debug_assert!(self.bits >= n * 32);
        let head: Vec<u32> = self.words.drain(..n).collect();
        self.bits -= n * 32;
        head
    }

    fn shift_out(&self, start: usize) -> BitArray {
        let skip = start / 32;
        let off = start & 31;
        let mut words = Vec::with_capacity(self.words.len().saturating_sub(skip));
        if off == 0 {
            words.extend_from_slice(&self.words[skip.min(self.words.len())..]);
        } else {
            for i in skip..self.words.len() {
                let hi = self.words[i] << off;
                let lo = if i + 1 < self.words.len() {
                    self.words[i + 1] >> (32 - off)
                } else {
                    0
                };
                words.push(hi | lo);
            }
        }
        Self::from_parts(words, self.bits - start)
    }
}

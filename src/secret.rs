use std::fmt;
use std::hash::{Hash, Hasher};

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A secure wrapper around sensitive bytes (passwords) that:
/// - Zeroes memory on drop
/// - Prevents cloning to reduce copies
/// - Prevents debug printing to avoid logs
/// - Compares in constant time, so it can key the derivation cache
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Secret {
    data: Vec<u8>,
}

impl Secret {
    /// Takes ownership of `data`; it is zeroized when the Secret drops.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Copies `slice` into a new Secret.
    pub fn from_slice(slice: &[u8]) -> Self {
        Self {
            data: slice.to_vec(),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Access the bytes through a closure, keeping the exposure scoped.
    pub fn expose<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u8]) -> R,
    {
        f(&self.data)
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.data.ct_eq(&other.data).into()
    }
}

impl Eq for Secret {}

impl Hash for Secret {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write(&self.data);
    }
}

// Do NOT implement Clone, and keep Debug redacted: secrets must not leak
// into logs, panic messages, or accidental copies.
impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secret")
            .field("data", &"<redacted>")
            .finish()
    }
}

/// A zeroizing buffer of key words (derived keys held by the cache).
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecretWords {
    words: Vec<u32>,
}

impl SecretWords {
    pub fn new(words: Vec<u32>) -> Self {
        Self { words }
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Access the words through a closure.
    pub fn expose<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&[u32]) -> R,
    {
        f(&self.words)
    }
}

impl fmt::Debug for SecretWords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretWords")
            .field("words", &"<redacted>")
            .finish()
    }
}

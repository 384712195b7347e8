//! STRONGBOX - Self-Contained Cryptographic Toolkit
//!
//! A from-scratch toolkit with no cryptographic dependencies:
//! - AES-128/192/256 block cipher
//! - CCM, OCB2 and GCM authenticated-encryption modes
//! - Streaming SHA-256 and SHA-512, HMAC, PBKDF2
//! - A Fortuna-style entropy-pool random generator
//! - A compact password-envelope format tying it all together
//!
//! # Security Features
//! - Verify-then-release: no mode returns plaintext before its tag checks out
//! - Constant-structure tag comparison over the full tag length
//! - Key material (round keys, generator keys, cached derivations) zeroized
//!   on drop
//! - The random generator refuses to emit output before it is seeded
//!
//! # Architecture
//! - `bits`: bit-exact word sequences, the common currency of every layer
//! - `codec`: utf8 / hex / base32 / base64 conversions
//! - `aes` + `mode`: the block cipher and the authenticated modes over it
//! - `hash` + `hmac` + `kdf`: digests, keyed MACs, password stretching
//! - `prng`: the seeded generator
//! - `envelope`: the high-level `Strongbox` API
//!
//! # Example
//! ```rust,ignore
//! use strongbox::{EntropySample, Strongbox};
//!
//! let mut sb = Strongbox::new();
//! sb.prng_mut()
//!     .add_entropy(EntropySample::Words(&os_random_words), Some(1024), "os")?;
//!
//! let sealed = sb.encrypt("my password", "attack at dawn")?;
//! let plain = sb.decrypt("my password", &sealed)?;
//! assert_eq!(plain, "attack at dawn");
//! ```

pub mod aes;
pub mod bits;
pub mod codec;
pub mod envelope;
pub mod error;
pub mod hash;
pub mod hmac;
pub mod kdf;
pub mod mode;
pub mod prng;
pub mod secret;

// Re-export commonly used types
pub use aes::Aes;
pub use bits::BitArray;
pub use envelope::{CipherId, Envelope, SealOptions, Strongbox};
pub use error::{Result, StrongboxError};
pub use hash::{Digest, Sha256, Sha512};
pub use hmac::Hmac;
pub use kdf::pbkdf2;
pub use mode::Mode;
pub use prng::{EntropySample, Prng, Readiness, DEFAULT_PARANOIA};
pub use secret::{Secret, SecretWords};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_module_exports() {
        // Verify that key types are accessible
        let _bits = BitArray::from_words(vec![1, 2, 3]);
        let _secret = Secret::new(vec![1, 2, 3]);
        let _prng = Prng::default();
        let _options = SealOptions::default();

        // Verify error types
        let _err: Result<()> = Err(StrongboxError::Invalid("test".to_string()));

        // Verify the algorithm registries are closed enums
        assert_eq!(Mode::from_name("gcm").unwrap(), Mode::Gcm);
        assert_eq!(CipherId::from_name("aes").unwrap(), CipherId::Aes);
        assert_eq!(DEFAULT_PARANOIA, 6);
    }
}

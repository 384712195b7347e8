//! The password envelope: PBKDF2 key derivation, an authenticated cipher
//! mode, and a compact single-line textual serialization.
//!
//! [`Strongbox`] is the composition root: it owns the random generator the
//! envelope draws salts and IVs from, and the per-instance key-derivation
//! cache that spares repeated PBKDF2 runs for the same
//! (password, salt, iterations) triple.

use std::collections::hash_map::Entry;
use std::collections::HashMap;

use zeroize::Zeroize;

use crate::aes::Aes;
use crate::bits::BitArray;
use crate::codec::{base64, percent_escape, percent_unescape, utf8};
use crate::error::{Result, StrongboxError};
use crate::hash::Sha256;
use crate::kdf::pbkdf2;
use crate::mode::Mode;
use crate::prng::Prng;
use crate::secret::{Secret, SecretWords};

/// The closed set of supported block ciphers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    Aes,
}

impl CipherId {
    pub fn name(&self) -> &'static str {
        match self {
            CipherId::Aes => "aes",
        }
    }

    pub fn from_name(name: &str) -> Result<CipherId> {
        match name {
            "aes" => Ok(CipherId::Aes),
            other => Err(StrongboxError::Invalid(format!(
                "unknown cipher: {}",
                other
            ))),
        }
    }
}

/// Caller-tunable sealing parameters. The defaults are CCM over AES with a
/// 128-bit key, a 64-bit tag, and 10 000 PBKDF2 iterations; `salt` and `iv`
/// are drawn from the generator when not supplied.
#[derive(Debug, Clone)]
pub struct SealOptions {
    pub mode: Mode,
    pub cipher: CipherId,
    pub iterations: u32,
    pub key_bits: usize,
    pub tag_bits: usize,
    pub salt: Option<BitArray>,
    pub iv: Option<BitArray>,
    pub adata: Option<String>,
}

impl Default for SealOptions {
    fn default() -> Self {
        SealOptions {
            mode: Mode::Ccm,
            cipher: CipherId::Aes,
            iterations: 10_000,
            key_bits: 128,
            tag_bits: 64,
            salt: None,
            iv: None,
            adata: None,
        }
    }
}

/// A sealed message: every parameter needed to decrypt, plus the ciphertext.
/// Round-trips losslessly through [`encode`](Envelope::encode) /
/// [`decode`](Envelope::decode).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub version: u32,
    pub iterations: u32,
    pub key_bits: usize,
    pub tag_bits: usize,
    pub mode: Mode,
    pub cipher: CipherId,
    pub iv: BitArray,
    pub salt: BitArray,
    pub adata: BitArray,
    pub ct: BitArray,
}

impl Envelope {
    /// Serializes to the restricted single-line object syntax: quoted
    /// lowercase keys, unsigned integers, and quoted strings that are either
    /// Base64 (`iv`, `salt`, `adata`, `ct`) or percent-escaped.
    pub fn encode(&self) -> String {
        format!(
            "{{\"iv\":\"{}\",\"v\":{},\"iter\":{},\"ks\":{},\"ts\":{},\"mode\":\"{}\",\"adata\":\"{}\",\"cipher\":\"{}\",\"salt\":\"{}\",\"ct\":\"{}\"}}",
            base64::from_bits(&self.iv, true),
            self.version,
            self.iterations,
            self.key_bits,
            self.tag_bits,
            percent_escape(self.mode.name()),
            base64::from_bits(&self.adata, true),
            percent_escape(self.cipher.name()),
            base64::from_bits(&self.salt, true),
            base64::from_bits(&self.ct, true),
        )
    }

    /// Parses the envelope text. Unknown keys, grammar violations, and
    /// unsupported versions are rejected; absent parameters fall back to the
    /// sealing defaults.
    pub fn decode(text: &str) -> Result<Envelope> {
        let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let inner = compact
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .ok_or_else(malformed)?;

        let defaults = SealOptions::default();
        let mut version = 1u32;
        let mut iterations = defaults.iterations;
        let mut key_bits = defaults.key_bits;
        let mut tag_bits = defaults.tag_bits;
        let mut mode = defaults.mode;
        let mut cipher = defaults.cipher;
        let mut iv: Option<BitArray> = None;
        let mut salt = BitArray::new();
        let mut adata = BitArray::new();
        let mut ct: Option<BitArray> = None;

        for pair in inner.split(',') {
            let (raw_key, raw_value) = pair.split_once(':').ok_or_else(malformed)?;
            let key = parse_key(raw_key)?;
            let value = parse_value(raw_value)?;
            match (key.as_str(), value) {
                ("v", RawValue::Int(n)) => version = int_param(n, "v")?,
                ("iter", RawValue::Int(n)) => iterations = int_param(n, "iter")?,
                ("ks", RawValue::Int(n)) => key_bits = int_param(n, "ks")? as usize,
                ("ts", RawValue::Int(n)) => tag_bits = int_param(n, "ts")? as usize,
                ("mode", RawValue::Text(s)) => mode = Mode::from_name(&percent_unescape(&s)?)?,
                ("cipher", RawValue::Text(s)) => {
                    cipher = CipherId::from_name(&percent_unescape(&s)?)?
                }
                ("iv", RawValue::Text(s)) => iv = Some(base64::to_bits(&s)?),
                ("salt", RawValue::Text(s)) => salt = base64::to_bits(&s)?,
                ("adata", RawValue::Text(s)) => adata = base64::to_bits(&s)?,
                ("ct", RawValue::Text(s)) => ct = Some(base64::to_bits(&s)?),
                (k, _) => {
                    return Err(StrongboxError::Invalid(format!(
                        "envelope decode: unknown or mistyped parameter '{}'",
                        k
                    )))
                }
            }
        }

        if version != 1 {
            return Err(StrongboxError::Invalid(format!(
                "envelope decode: unsupported version {}",
                version
            )));
        }
        let iv = iv.ok_or_else(|| {
            StrongboxError::Invalid("envelope decode: missing iv".to_string())
        })?;
        let ct = ct.ok_or_else(|| {
            StrongboxError::Invalid("envelope decode: missing ct".to_string())
        })?;

        Ok(Envelope {
            version,
            iterations,
            key_bits,
            tag_bits,
            mode,
            cipher,
            iv,
            salt,
            adata,
            ct,
        })
    }
}

fn malformed() -> StrongboxError {
    StrongboxError::Invalid("envelope decode: this isn't an envelope".to_string())
}

enum RawValue {
    Int(u64),
    Text(String),
}

/// A key is `[a-z][a-z0-9]*`, optionally wrapped in matching quotes.
fn parse_key(raw: &str) -> Result<String> {
    let k = if raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')))
    {
        &raw[1..raw.len() - 1]
    } else {
        raw
    };
    let mut chars = k.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit());
    if !valid {
        return Err(malformed());
    }
    Ok(k.to_string())
}

/// A value is an unsigned integer, `true`/`false` (rejected later, no field
/// takes one), or a quoted string over the restricted alphabet.
fn parse_value(raw: &str) -> Result<RawValue> {
    if raw == "true" || raw == "false" {
        return Err(StrongboxError::Invalid(
            "envelope decode: no parameter takes a boolean".to_string(),
        ));
    }
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        let inner = &raw[1..raw.len() - 1];
        let valid = inner.chars().all(|c| {
            c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '%' | '*' | '_' | '.' | '@' | '=' | '-')
        });
        if !valid {
            return Err(malformed());
        }
        return Ok(RawValue::Text(inner.to_string()));
    }
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        return Ok(RawValue::Int(raw.parse().map_err(|_| malformed())?));
    }
    Err(malformed())
}

fn int_param(n: u64, name: &str) -> Result<u32> {
    u32::try_from(n).map_err(|_| {
        StrongboxError::Invalid(format!("envelope decode: '{}' is out of range", name))
    })
}

/// Shared parameter validation for sealing and opening.
fn validate_params(iterations: u32, key_bits: usize, tag_bits: usize, iv: &BitArray) -> Result<()> {
    if iterations <= 100 {
        return Err(StrongboxError::Invalid(
            "envelope: iteration count must exceed 100".to_string(),
        ));
    }
    if !matches!(tag_bits, 64 | 96 | 128) {
        return Err(StrongboxError::Invalid(
            "envelope: tag must be 64, 96 or 128 bits".to_string(),
        ));
    }
    if !matches!(key_bits, 128 | 192 | 256) {
        return Err(StrongboxError::Invalid(
            "envelope: key must be 128, 192 or 256 bits".to_string(),
        ));
    }
    if !(2..=4).contains(&iv.words().len()) {
        return Err(StrongboxError::Invalid(
            "envelope: iv must be 2 to 4 words".to_string(),
        ));
    }
    Ok(())
}

/// Cache key for one PBKDF2 derivation. Scoped to the full
/// (password, salt, iterations) triple so no salt is ever reused across
/// independent encryptions.
#[derive(PartialEq, Eq, Hash)]
struct KdfKey {
    password: Secret,
    salt: BitArray,
    iterations: u32,
}

/// Password-based encrypt/decrypt over the toolkit's primitives.
pub struct Strongbox {
    prng: Prng,
    kdf_cache: HashMap<KdfKey, SecretWords>,
}

impl Default for Strongbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Strongbox {
    pub fn new() -> Strongbox {
        Self::with_prng(Prng::default())
    }

    /// Builds around a caller-owned generator (a pre-seeded or test one).
    pub fn with_prng(prng: Prng) -> Strongbox {
        Strongbox {
            prng,
            kdf_cache: HashMap::new(),
        }
    }

    /// The owned generator, for seeding it with entropy.
    pub fn prng_mut(&mut self) -> &mut Prng {
        &mut self.prng
    }

    /// Seals `plaintext` under `password` with the default options.
    pub fn encrypt(&mut self, password: &str, plaintext: &str) -> Result<String> {
        self.encrypt_with(password, plaintext, &SealOptions::default())
    }

    /// Seals `plaintext` under `password`. Salt and IV come from `options`
    /// or, failing that, the generator — which must be seeded, so an
    /// entropy-starved process fails [`StrongboxError::NotReady`] instead of
    /// emitting weak randomness.
    pub fn encrypt_with(
        &mut self,
        password: &str,
        plaintext: &str,
        options: &SealOptions,
    ) -> Result<String> {
        let salt = match &options.salt {
            Some(salt) => salt.clone(),
            None => BitArray::from_words(self.prng.random_words(2, None)?),
        };
        let iv = match &options.iv {
            Some(iv) => iv.clone(),
            None => BitArray::from_words(self.prng.random_words(4, None)?),
        };
        validate_params(options.iterations, options.key_bits, options.tag_bits, &iv)?;

        let mut key_words = self.derive_key(password, &salt, options.iterations, options.key_bits)?;
        let cipher = match options.cipher {
            CipherId::Aes => Aes::new(&key_words)?,
        };
        key_words.zeroize();

        let adata = options.adata.as_deref().map(utf8::to_bits).unwrap_or_default();
        let ct = options.mode.encrypt(
            &cipher,
            &utf8::to_bits(plaintext),
            &iv,
            &adata,
            options.tag_bits,
        )?;

        let envelope = Envelope {
            version: 1,
            iterations: options.iterations,
            key_bits: options.key_bits,
            tag_bits: options.tag_bits,
            mode: options.mode,
            cipher: options.cipher,
            iv,
            salt,
            adata,
            ct,
        };
        Ok(envelope.encode())
    }

    /// Parses `sealed` and opens it under `password`. A tag mismatch
    /// surfaces as [`StrongboxError::Corrupt`], unmodified.
    pub fn decrypt(&mut self, password: &str, sealed: &str) -> Result<String> {
        let envelope = Envelope::decode(sealed)?;
        self.open(password, &envelope)
    }

    /// Opens an already-parsed envelope.
    pub fn open(&mut self, password: &str, envelope: &Envelope) -> Result<String> {
        validate_params(
            envelope.iterations,
            envelope.key_bits,
            envelope.tag_bits,
            &envelope.iv,
        )?;
        if envelope.salt.is_empty() {
            return Err(StrongboxError::Invalid(
                "envelope: missing salt".to_string(),
            ));
        }
        let mut key_words = self.derive_key(
            password,
            &envelope.salt,
            envelope.iterations,
            envelope.key_bits,
        )?;
        let cipher = match envelope.cipher {
            CipherId::Aes => Aes::new(&key_words)?,
        };
        key_words.zeroize();

        let plaintext = envelope.mode.decrypt(
            &cipher,
            &envelope.ct,
            &envelope.iv,
            &envelope.adata,
            envelope.tag_bits,
        )?;
        utf8::from_bits(&plaintext)
    }

    /// Cached PBKDF2-HMAC-SHA256. Always derives the full 256 bits and
    /// slices the requested key off the front, so one cache entry serves
    /// every key size.
    fn derive_key(
        &mut self,
        password: &str,
        salt: &BitArray,
        iterations: u32,
        key_bits: usize,
    ) -> Result<Vec<u32>> {
        let cache_key = KdfKey {
            password: Secret::from_slice(password.as_bytes()),
            salt: salt.clone(),
            iterations,
        };
        let derived = match self.kdf_cache.entry(cache_key) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(slot) => {
                let full = pbkdf2::<Sha256>(&utf8::to_bits(password), salt, iterations, 256)?;
                slot.insert(SecretWords::new(full.words().to_vec()))
            }
        };
        Ok(derived.expose(|words| words[..key_bits / 32].to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::hex;
    use crate::prng::EntropySample;

    fn seeded_box() -> Strongbox {
        let mut prng = Prng::default();
        let words: Vec<u32> = (0..32u32)
            .map(|i| i.wrapping_mul(0x9e37_79b9) ^ 0x5bf0_3635)
            .collect();
        prng.add_entropy(EntropySample::Words(&words), Some(1024), "seed")
            .unwrap();
        Strongbox::with_prng(prng)
    }

    fn fast_options() -> SealOptions {
        SealOptions {
            iterations: 101,
            ..SealOptions::default()
        }
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let mut sb = seeded_box();
        let sealed = sb
            .encrypt_with("correct horse", "hello world", &fast_options())
            .unwrap();
        assert_eq!(sb.decrypt("correct horse", &sealed).unwrap(), "hello world");
    }

    #[test]
    fn test_wrong_password_never_yields_plaintext() {
        let mut sb = seeded_box();
        let sealed = sb
            .encrypt_with("right password", "attack at dawn", &fast_options())
            .unwrap();
        match sb.decrypt("wrong password", &sealed) {
            Ok(recovered) => assert_ne!(recovered, "attack at dawn"),
            Err(_) => {}
        }
    }

    #[test]
    fn test_unseeded_generator_fails_not_ready() {
        let mut sb = Strongbox::new();
        assert!(matches!(
            sb.encrypt_with("pw", "data", &fast_options()),
            Err(StrongboxError::NotReady(_))
        ));
    }

    #[test]
    fn test_supplied_salt_and_iv_bypass_generator() {
        let mut sb = Strongbox::new(); // unseeded on purpose
        let options = SealOptions {
            salt: Some(hex::to_bits("0011223344556677").unwrap()),
            iv: Some(hex::to_bits("000102030405060708090a0b0c0d0e0f").unwrap()),
            ..fast_options()
        };
        let sealed = sb.encrypt_with("pw", "pinned randomness", &options).unwrap();
        assert_eq!(sb.decrypt("pw", &sealed).unwrap(), "pinned randomness");

        // fixed salt and iv make sealing deterministic
        let again = sb.encrypt_with("pw", "pinned randomness", &options).unwrap();
        assert_eq!(sealed, again);
    }

    #[test]
    fn test_mode_and_size_overrides() {
        let mut sb = seeded_box();
        for mode in [Mode::Ccm, Mode::Ocb2, Mode::Gcm] {
            for key_bits in [128, 192, 256] {
                let options = SealOptions {
                    mode,
                    key_bits,
                    tag_bits: 96,
                    adata: Some("context header".to_string()),
                    ..fast_options()
                };
                let sealed = sb.encrypt_with("pw", "payload", &options).unwrap();
                assert_eq!(
                    sb.decrypt("pw", &sealed).unwrap(),
                    "payload",
                    "mode {:?} ks {}",
                    mode,
                    key_bits
                );
            }
        }
    }

    #[test]
    fn test_invalid_parameters_rejected() {
        let mut sb = seeded_box();
        let cases = [
            SealOptions {
                iterations: 100,
                ..SealOptions::default()
            },
            SealOptions {
                tag_bits: 80,
                ..fast_options()
            },
            SealOptions {
                key_bits: 512,
                ..fast_options()
            },
            SealOptions {
                iv: Some(hex::to_bits("00112233").unwrap()), // 1 word
                ..fast_options()
            },
        ];
        for options in cases {
            assert!(matches!(
                sb.encrypt_with("pw", "data", &options),
                Err(StrongboxError::Invalid(_))
            ));
        }
    }

    #[test]
    fn test_tampered_envelope_surfaces_corrupt() {
        let mut sb = seeded_box();
        let sealed = sb
            .encrypt_with("pw", "integrity matters", &fast_options())
            .unwrap();
        let envelope = Envelope::decode(&sealed).unwrap();
        let mut words = envelope.ct.words().to_vec();
        words[0] ^= 0x8000_0000;
        let mangled = Envelope {
            ct: BitArray::from_parts(words, envelope.ct.bit_length()),
            ..envelope
        };
        assert!(matches!(
            sb.open("pw", &mangled),
            Err(StrongboxError::Corrupt(_))
        ));
    }

    #[test]
    fn test_envelope_encode_decode_roundtrip() {
        let envelope = Envelope {
            version: 1,
            iterations: 10_000,
            key_bits: 256,
            tag_bits: 128,
            mode: Mode::Gcm,
            cipher: CipherId::Aes,
            iv: hex::to_bits("000102030405060708090a0b0c0d0e0f").unwrap(),
            salt: hex::to_bits("0011223344556677").unwrap(),
            adata: utf8::to_bits("adata"),
            ct: hex::to_bits("deadbeefcafef00d0102").unwrap(),
        };
        let text = envelope.encode();
        assert_eq!(Envelope::decode(&text).unwrap(), envelope);
    }

    #[test]
    fn test_decode_accepts_whitespace_and_bare_keys() {
        let text = "{ iv:\"AAECAwQFBgcICQoLDA0ODw==\", v:1, iter:1000, ks:128,\n \
                    ts:64, mode:\"ccm\", cipher:\"aes\", salt:\"ABEiM0RVZnc=\", ct:\"3q0=\" }";
        let envelope = Envelope::decode(text).unwrap();
        assert_eq!(envelope.iterations, 1000);
        assert_eq!(envelope.mode, Mode::Ccm);
        assert_eq!(envelope.iv.bit_length(), 128);
    }

    #[test]
    fn test_decode_rejects_malformed_input() {
        let bad = [
            "not an envelope",
            "{unterminated",
            "{\"iv\":}",
            "{\"iv\" \"AAAA\"}",
            "{\"weird!\":1}",
            "{\"unknownkey\":1,\"ct\":\"AAAA\",\"iv\":\"AAECAwQFBgc=\"}",
            "{\"v\":true}",
            "{\"iter\":\"lots\"}",
        ];
        for text in bad {
            assert!(
                matches!(Envelope::decode(text), Err(StrongboxError::Invalid(_))),
                "{:?} must be rejected",
                text
            );
        }
    }

    #[test]
    fn test_decode_rejects_wrong_version() {
        let text = "{\"v\":2,\"iv\":\"AAECAwQFBgcICQoLDA0ODw==\",\"ct\":\"3q0=\"}";
        assert!(matches!(
            Envelope::decode(text),
            Err(StrongboxError::Invalid(_))
        ));
    }

    #[test]
    fn test_decode_requires_iv_and_ct() {
        assert!(matches!(
            Envelope::decode("{\"ct\":\"3q0=\"}"),
            Err(StrongboxError::Invalid(_))
        ));
        assert!(matches!(
            Envelope::decode("{\"iv\":\"AAECAwQFBgcICQoLDA0ODw==\"}"),
            Err(StrongboxError::Invalid(_))
        ));
    }

    #[test]
    fn test_unknown_mode_and_cipher_rejected() {
        let text = "{\"iv\":\"AAECAwQFBgcICQoLDA0ODw==\",\"ct\":\"3q0=\",\"mode\":\"cbc\"}";
        assert!(matches!(
            Envelope::decode(text),
            Err(StrongboxError::Invalid(_))
        ));
        let text = "{\"iv\":\"AAECAwQFBgcICQoLDA0ODw==\",\"ct\":\"3q0=\",\"cipher\":\"des\"}";
        assert!(matches!(
            Envelope::decode(text),
            Err(StrongboxError::Invalid(_))
        ));
    }

    #[test]
    fn test_interoperates_across_instances() {
        let mut alice = seeded_box();
        let sealed = alice
            .encrypt_with("shared secret", "between instances", &fast_options())
            .unwrap();
        let mut bob = Strongbox::new(); // decrypt needs no generator
        assert_eq!(
            bob.decrypt("shared secret", &sealed).unwrap(),
            "between instances"
        );
    }

    #[test]
    fn test_fresh_salt_per_encryption() {
        let mut sb = seeded_box();
        let a = sb.encrypt_with("pw", "same msg", &fast_options()).unwrap();
        let b = sb.encrypt_with("pw", "same msg", &fast_options()).unwrap();
        let env_a = Envelope::decode(&a).unwrap();
        let env_b = Envelope::decode(&b).unwrap();
        assert_ne!(env_a.salt, env_b.salt);
        assert_ne!(env_a.iv, env_b.iv);
    }
}

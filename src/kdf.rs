use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::hash::Digest;
use crate::hmac::Hmac;

/// PBKDF2 (RFC 2898) over HMAC-`H`.
///
/// Output is produced in hash-sized blocks: block *i* (1-based, the index
/// appended to the salt as one big-endian word) is the XOR of the iterated
/// HMAC chain `U_1 = PRF(salt ‖ i)`, `U_j = PRF(U_{j-1})`; blocks are
/// concatenated and the result clamped to exactly `out_bits`.
pub fn pbkdf2<H: Digest>(
    password: &BitArray,
    salt: &BitArray,
    iterations: u32,
    out_bits: usize,
) -> Result<BitArray> {
    if iterations == 0 || out_bits == 0 {
        return Err(StrongboxError::Invalid(
            "pbkdf2: iterations and output length must be positive".to_string(),
        ));
    }
    let mut prf = Hmac::<H>::new(password)?;
    let mut out = BitArray::new();
    let mut block_index: u32 = 1;
    while out.bit_length() < out_bits {
        let mut u = prf.mac(&salt.concat(&BitArray::from_words(vec![block_index])))?;
        let mut block: Vec<u32> = u.words().to_vec();
        for _ in 1..iterations {
            u = prf.mac(&u)?;
            for (b, w) in block.iter_mut().zip(u.words()) {
                *b ^= w;
            }
        }
        out = out.concat(&BitArray::from_words(block));
        block_index += 1;
    }
    Ok(out.clamp(out_bits))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{hex, utf8};
    use crate::hash::Sha256;

    fn derive_hex(password: &str, salt: &str, iterations: u32, out_bits: usize) -> String {
        let out = pbkdf2::<Sha256>(
            &utf8::to_bits(password),
            &utf8::to_bits(salt),
            iterations,
            out_bits,
        )
        .unwrap();
        hex::from_bits(&out)
    }

    // Published PBKDF2-HMAC-SHA256 vectors
    #[test]
    fn test_one_iteration() {
        assert_eq!(
            derive_hex("password", "salt", 1, 256),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
    }

    #[test]
    fn test_two_iterations() {
        assert_eq!(
            derive_hex("password", "salt", 2, 256),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
    }

    #[test]
    fn test_4096_iterations() {
        assert_eq!(
            derive_hex("password", "salt", 4096, 256),
            "c5e478d59288c841aa530db6845c4c8d962893a001ce4e11a4963873aa98134a"
        );
    }

    #[test]
    fn test_multi_block_output() {
        // 320 bits forces a second PRF block
        assert_eq!(
            derive_hex(
                "passwordPASSWORDpassword",
                "saltSALTsaltSALTsaltSALTsaltSALTsalt",
                4096,
                320
            ),
            "348c89dbcbd32b2f32d814b8116e84cf2b17347ebc1800181c4e2a1fb8dd53e1c635518c7dac47e9"
        );
    }

    #[test]
    fn test_truncation_is_exact() {
        let long = derive_hex("password", "salt", 2, 256);
        let short = derive_hex("password", "salt", 2, 64);
        assert_eq!(short, long[..16].to_string());
    }

    #[test]
    fn test_zero_parameters_rejected() {
        let p = utf8::to_bits("p");
        let s = utf8::to_bits("s");
        assert!(matches!(
            pbkdf2::<Sha256>(&p, &s, 0, 128),
            Err(StrongboxError::Invalid(_))
        ));
        assert!(matches!(
            pbkdf2::<Sha256>(&p, &s, 1, 0),
            Err(StrongboxError::Invalid(_))
        ));
    }
}

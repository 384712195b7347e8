//! OCB2: offset-codebook mode with Galois-field offset doubling
//! (Rogaway 2004).

use crate::aes::Aes;
use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::mode::xor4;

/// Encrypts `plaintext` under a 128-bit `iv`. When `adata_is_premac` is set,
/// `adata` is taken as a precomputed [`pmac`] value instead of raw associated
/// data. Returns `ciphertext ‖ tag`.
pub fn encrypt(
    cipher: &Aes,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
    adata_is_premac: bool,
) -> Result<BitArray> {
    if iv.bit_length() != 128 {
        return Err(StrongboxError::Invalid(
            "ocb iv must be 128 bits".to_string(),
        ));
    }
    let mut delta = times2(cipher.encrypt_block(iv.block4(0)));
    let mut checksum = [0u32; 4];
    let mut out_words: Vec<u32> = Vec::with_capacity(plaintext.words().len());

    let n = plaintext.words().len();
    let mut i = 0;
    while i + 4 < n {
        let block = plaintext.block4(i);
        checksum = xor4(checksum, block);
        out_words.extend(xor4(delta, cipher.encrypt_block(xor4(delta, block))));
        delta = times2(delta);
        i += 4;
    }

    // final (possibly short, possibly full) block via the length-keyed pad
    let tail = plaintext.bit_slice_from(i * 32);
    let tail_bits = tail.bit_length();
    let pad = cipher.encrypt_block(xor4(delta, [0, 0, 0, tail_bits as u32]));
    let tail_mix = xor4(tail.block4(0), pad);
    let tail_ct = BitArray::from_parts(tail_mix.to_vec(), tail_bits);
    checksum = xor4(checksum, tail_mix);

    let mut tag_block = cipher.encrypt_block(xor4(checksum, xor4(delta, times2(delta))));
    if !adata.is_empty() {
        let pm = if adata_is_premac {
            adata.block4(0)
        } else {
            pmac(cipher, adata)
        };
        tag_block = xor4(tag_block, pm);
    }
    let tag = BitArray::from_words(tag_block.to_vec()).clamp(tag_bits);

    Ok(BitArray::from_words(out_words).concat(&tail_ct.concat(&tag)))
}

/// Verifies and decrypts `ciphertext ‖ tag` under a 128-bit `iv`.
pub fn decrypt(
    cipher: &Aes,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
    adata_is_premac: bool,
) -> Result<BitArray> {
    if iv.bit_length() != 128 {
        return Err(StrongboxError::Invalid(
            "ocb iv must be 128 bits".to_string(),
        ));
    }
    let total_bits = ciphertext.bit_length();
    if total_bits < tag_bits {
        return Err(StrongboxError::Corrupt(
            "ocb: tag doesn't match".to_string(),
        ));
    }
    let body_bits = total_bits - tag_bits;

    let mut delta = times2(cipher.encrypt_block(iv.block4(0)));
    let mut checksum = [0u32; 4];
    let mut out_words: Vec<u32> = Vec::new();

    let mut i = 0;
    while (i + 4) * 32 < body_bits {
        let block = xor4(
            delta,
            cipher.decrypt_block(xor4(delta, ciphertext.block4(i))),
        );
        checksum = xor4(checksum, block);
        out_words.extend(block);
        delta = times2(delta);
        i += 4;
    }

    let tail_bits = body_bits - 32 * i;
    let pad = cipher.encrypt_block(xor4(delta, [0, 0, 0, tail_bits as u32]));
    let tail_ct = ciphertext.bit_slice(32 * i, 32 * i + tail_bits);
    let tail_mix = xor4(pad, tail_ct.block4(0));
    checksum = xor4(checksum, tail_mix);

    let mut tag_block = cipher.encrypt_block(xor4(checksum, xor4(delta, times2(delta))));
    if !adata.is_empty() {
        let pm = if adata_is_premac {
            adata.block4(0)
        } else {
            pmac(cipher, adata)
        };
        tag_block = xor4(tag_block, pm);
    }

    let expected = BitArray::from_words(tag_block.to_vec()).clamp(tag_bits);
    let supplied = ciphertext.bit_slice_from(body_bits);
    if !expected.ct_eq(&supplied) {
        return Err(StrongboxError::Corrupt(
            "ocb: tag doesn't match".to_string(),
        ));
    }

    Ok(BitArray::from_words(out_words)
        .concat(&BitArray::from_parts(tail_mix.to_vec(), tail_bits)))
}

/// PMAC over the associated data, with its own 3·L offset schedule and a
/// domain-separated short-tail padding.
pub fn pmac(cipher: &Aes, adata: &BitArray) -> [u32; 4] {
    let mut delta = cipher.encrypt_block([0, 0, 0, 0]);
    delta = xor4(delta, times2(times2(delta)));

    let mut sum = [0u32; 4];
    let n = adata.words().len();
    let mut i = 0;
    while i + 4 < n {
        delta = times2(delta);
        sum = xor4(sum, cipher.encrypt_block(xor4(delta, adata.block4(i))));
        i += 4;
    }

    let mut tail = adata.bit_slice_from(32 * i);
    if tail.bit_length() < 128 {
        delta = xor4(delta, times2(delta));
        tail = tail.concat(&BitArray::from_words(vec![0x8000_0000, 0, 0, 0]));
    }
    sum = xor4(sum, tail.block4(0));
    cipher.encrypt_block(xor4(times2(xor4(delta, times2(delta))), sum))
}

/// Doubling in GF(2^128) over x^128 + x^7 + x^2 + x + 1.
fn times2(b: [u32; 4]) -> [u32; 4] {
    [
        b[0] << 1 ^ b[1] >> 31,
        b[1] << 1 ^ b[2] >> 31,
        b[2] << 1 ^ b[3] >> 31,
        b[3] << 1 ^ 135 * (b[0] >> 31),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{hex, utf8};

    fn aes() -> Aes {
        Aes::new(&[0x0001_0203, 0x0405_0607, 0x0809_0a0b, 0x0c0d_0e0f]).unwrap()
    }

    fn iv() -> BitArray {
        hex::to_bits("000102030405060708090a0b0c0d0e0f").unwrap()
    }

    #[test]
    fn test_iv_must_be_128_bits() {
        let pt = utf8::to_bits("hi");
        let short = hex::to_bits("00010203").unwrap();
        assert!(matches!(
            encrypt(&aes(), &pt, &short, &BitArray::new(), 64, false),
            Err(StrongboxError::Invalid(_))
        ));
        assert!(matches!(
            decrypt(&aes(), &pt, &short, &BitArray::new(), 64, false),
            Err(StrongboxError::Invalid(_))
        ));
    }

    #[test]
    fn test_roundtrip_various_lengths() {
        for len in [0usize, 1, 4, 15, 16, 17, 32, 49] {
            let bytes: Vec<u8> = (0..len).map(|i| (i * 7 + 3) as u8).collect();
            let pt = BitArray::from_bytes(&bytes);
            let out = encrypt(&aes(), &pt, &iv(), &BitArray::new(), 64, false).unwrap();
            assert_eq!(out.bit_length(), pt.bit_length() + 64);
            let back = decrypt(&aes(), &out, &iv(), &BitArray::new(), 64, false).unwrap();
            assert_eq!(back, pt, "length {}", len);
        }
    }

    #[test]
    fn test_roundtrip_with_adata() {
        let pt = utf8::to_bits("the associated data is authenticated, not encrypted");
        let adata = utf8::to_bits("header v1");
        let out = encrypt(&aes(), &pt, &iv(), &adata, 128, false).unwrap();
        let back = decrypt(&aes(), &out, &iv(), &adata, 128, false).unwrap();
        assert_eq!(back, pt);

        assert!(matches!(
            decrypt(&aes(), &out, &iv(), &utf8::to_bits("header v2"), 128, false),
            Err(StrongboxError::Corrupt(_))
        ));
    }

    #[test]
    fn test_premac_matches_inline_adata() {
        let pt = utf8::to_bits("premac fast path");
        let adata = utf8::to_bits("some associated data");
        let pm = BitArray::from_words(pmac(&aes(), &adata).to_vec());

        let inline = encrypt(&aes(), &pt, &iv(), &adata, 64, false).unwrap();
        let premac = encrypt(&aes(), &pt, &iv(), &pm, 64, true).unwrap();
        assert_eq!(inline, premac);
        assert_eq!(
            decrypt(&aes(), &premac, &iv(), &pm, 64, true).unwrap(),
            pt
        );
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let pt = utf8::to_bits("bit flips must never survive");
        let out = encrypt(&aes(), &pt, &iv(), &BitArray::new(), 64, false).unwrap();
        for bit in 0..out.bit_length() {
            let mut words = out.words().to_vec();
            words[bit / 32] ^= 1 << (31 - bit % 32);
            let mangled = BitArray::from_parts(words, out.bit_length());
            assert!(
                matches!(
                    decrypt(&aes(), &mangled, &iv(), &BitArray::new(), 64, false),
                    Err(StrongboxError::Corrupt(_))
                ),
                "flipping bit {} must be detected",
                bit
            );
        }
    }

    #[test]
    fn test_different_ivs_differ() {
        let pt = utf8::to_bits("same plaintext");
        let iv2 = hex::to_bits("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff").unwrap();
        let a = encrypt(&aes(), &pt, &iv(), &BitArray::new(), 64, false).unwrap();
        let b = encrypt(&aes(), &pt, &iv2, &BitArray::new(), 64, false).unwrap();
        assert_ne!(a, b);
    }
}

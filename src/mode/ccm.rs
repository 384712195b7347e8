//! CCM: counter mode with a CBC-MAC over a length-prefixed header
//! (NIST SP 800-38C).

use crate::aes::Aes;
use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::mode::xor4;

/// Encrypts `plaintext` under `iv` (a nonce of at least 7 bytes, clamped to
/// the 15 − L bytes the length field leaves room for), authenticating
/// `adata` alongside. Returns `ciphertext ‖ tag`.
pub fn encrypt(
    cipher: &Aes,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
) -> Result<BitArray> {
    let iv_bytes = iv.bit_length() / 8;
    if iv_bytes < 7 {
        return Err(StrongboxError::Invalid(
            "ccm: iv must be at least 7 bytes".to_string(),
        ));
    }
    let msg_bytes = plaintext.bit_length() / 8;
    let l = length_field_bytes(msg_bytes, iv_bytes);
    let nonce = iv.clamp(8 * (15 - l));

    let tag = compute_tag(cipher, plaintext, &nonce, adata, tag_bits, l)?;
    let (data, tag) = ctr_transform(cipher, plaintext, &nonce, &tag, tag_bits, l);
    Ok(data.concat(&tag))
}

/// Verifies and decrypts `ciphertext ‖ tag`. The tag is recomputed over the
/// recovered plaintext and compared in constant structure before anything is
/// returned.
pub fn decrypt(
    cipher: &Aes,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
) -> Result<BitArray> {
    let iv_bytes = iv.bit_length() / 8;
    if iv_bytes < 7 {
        return Err(StrongboxError::Invalid(
            "ccm: iv must be at least 7 bytes".to_string(),
        ));
    }
    let total_bits = ciphertext.bit_length();
    if total_bits < tag_bits {
        return Err(StrongboxError::Corrupt(
            "ccm: tag doesn't match".to_string(),
        ));
    }
    let body = ciphertext.clamp(total_bits - tag_bits);
    let tag = ciphertext.bit_slice_from(total_bits - tag_bits);
    let msg_bytes = (total_bits - tag_bits) / 8;
    let l = length_field_bytes(msg_bytes, iv_bytes);
    let nonce = iv.clamp(8 * (15 - l));

    let (data, recovered_mac) = ctr_transform(cipher, &body, &nonce, &tag, tag_bits, l);
    let expected_mac = compute_tag(cipher, &data, &nonce, adata, tag_bits, l)?;
    if !recovered_mac.ct_eq(&expected_mac) {
        return Err(StrongboxError::Corrupt(
            "ccm: tag doesn't match".to_string(),
        ));
    }
    Ok(data)
}

/// Width in bytes of the message-length field: wide enough for the message,
/// at least what the nonce leaves free. Nonces of 13 bytes or more leave the
/// field at its message-driven width and get clamped to the remaining room.
fn length_field_bytes(msg_bytes: usize, iv_bytes: usize) -> usize {
    let mut l = 2;
    while l < 4 && (msg_bytes >> (8 * l)) > 0 {
        l += 1;
    }
    if l + iv_bytes < 15 {
        l = 15 - iv_bytes;
    }
    l
}

/// CBC-MAC over the flags/nonce/length header, the length-prefixed
/// associated data, then the message, clamped to the tag length.
fn compute_tag(
    cipher: &Aes,
    data: &BitArray,
    nonce: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
    l: usize,
) -> Result<BitArray> {
    if tag_bits % 16 != 0 || !(32..=128).contains(&tag_bits) {
        return Err(StrongboxError::Invalid(
            "ccm: invalid tag length".to_string(),
        ));
    }
    if adata.words().len() > 0xffff_ffff || data.words().len() > 0xffff_ffff {
        return Err(StrongboxError::Bug(
            "ccm: can't deal with 4GiB or more data".to_string(),
        ));
    }
    let tag_bytes = tag_bits / 8;

    let flags = (if adata.is_empty() { 0 } else { 64 }) | (tag_bytes - 2) << 2 | (l - 1);
    let mut block0 = BitArray::partial(8, flags as u32).concat(nonce).block4(0);
    block0[3] |= data.bit_length() as u32 / 8;
    let mut mac = cipher.encrypt_block(block0);

    if !adata.is_empty() {
        let a_bytes = adata.bit_length() / 8;
        let length_field = if a_bytes <= 0xfeff {
            BitArray::partial(16, a_bytes as u32)
        } else {
            BitArray::partial(16, 0xfffe).concat(&BitArray::from_words(vec![a_bytes as u32]))
        };
        let framed = length_field.concat(adata);
        let mut i = 0;
        while i < framed.words().len() {
            mac = cipher.encrypt_block(xor4(mac, framed.block4(i)));
            i += 4;
        }
    }

    let mut i = 0;
    while i < data.words().len() {
        mac = cipher.encrypt_block(xor4(mac, data.block4(i)));
        i += 4;
    }

    Ok(BitArray::from_words(mac.to_vec()).clamp(tag_bits))
}

/// Counter-mode pass, shared by both directions. Encrypts the tag with
/// counter 0, the data with counters 1..; returns the transformed data and
/// tag. Feeding an encrypted tag recovers the raw CBC-MAC and vice versa.
fn ctr_transform(
    cipher: &Aes,
    data: &BitArray,
    nonce: &BitArray,
    tag: &BitArray,
    tag_bits: usize,
    l: usize,
) -> (BitArray, BitArray) {
    let mut ctr = BitArray::partial(8, (l - 1) as u32).concat(nonce).block4(0);
    let enc0 = cipher.encrypt_block(ctr);
    let tag_out = BitArray::from_words(xor4(tag.block4(0), enc0).to_vec()).clamp(tag_bits);

    let bit_len = data.bit_length();
    if data.words().is_empty() {
        return (BitArray::new(), tag_out);
    }
    let mut words = data.words().to_vec();
    let n = words.len();
    let mut i = 0;
    while i < n {
        ctr[3] = ctr[3].wrapping_add(1);
        let keystream = cipher.encrypt_block(ctr);
        for (t, k) in keystream.iter().enumerate() {
            if i + t < n {
                words[i + t] ^= k;
            }
        }
        i += 4;
    }
    (BitArray::from_parts(words, bit_len), tag_out)
}

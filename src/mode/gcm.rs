//! GCM: counter mode with a GHASH tag (NIST SP 800-38D).

use crate::aes::Aes;
use crate::bits::BitArray;
use crate::error::{Result, StrongboxError};
use crate::mode::xor4;

/// Encrypts `plaintext` under `iv` (any length; 96 bits takes the direct
/// counter path), authenticating `adata`. Returns `ciphertext ‖ tag`.
pub fn encrypt(
    cipher: &Aes,
    plaintext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
) -> Result<BitArray> {
    let (data, tag) = core(true, cipher, plaintext, adata, iv, tag_bits);
    Ok(data.concat(&tag))
}

/// Verifies and decrypts `ciphertext ‖ tag`.
pub fn decrypt(
    cipher: &Aes,
    ciphertext: &BitArray,
    iv: &BitArray,
    adata: &BitArray,
    tag_bits: usize,
) -> Result<BitArray> {
    let total_bits = ciphertext.bit_length();
    let (body, tag) = if tag_bits <= total_bits {
        (
            ciphertext.bit_slice(0, total_bits - tag_bits),
            ciphertext.bit_slice_from(total_bits - tag_bits),
        )
    } else {
        (BitArray::new(), ciphertext.clone())
    };
    let (data, expected) = core(false, cipher, &body, adata, iv, tag_bits);
    if !expected.ct_eq(&tag) {
        return Err(StrongboxError::Corrupt(
            "gcm: tag doesn't match".to_string(),
        ));
    }
    Ok(data)
}

/// One GHASH multiplication: `x · h` in GF(2^128), bits of `x` scanned
/// most-significant first, reduction by the GCM polynomial.
fn ghash_block(x: [u32; 4], h: [u32; 4]) -> [u32; 4] {
    let mut z = [0u32; 4];
    let mut v = h;
    for bit in 0..128 {
        if x[bit / 32] & (1 << (31 - bit % 32)) != 0 {
            z = xor4(z, v);
        }
        let lsb = v[3] & 1 != 0;
        for d in (1..4).rev() {
            v[d] = v[d] >> 1 | (v[d - 1] & 1) << 31;
        }
        v[0] >>= 1;
        if lsb {
            v[0] ^= 0xe100_0000;
        }
    }
    z
}

/// GHASH accumulation of `data` (zero-padded to whole blocks) into `acc`.
fn ghash(h: [u32; 4], mut acc: [u32; 4], data: &BitArray) -> [u32; 4] {
    let n = data.words().len();
    let mut i = 0;
    while i < n {
        acc = xor4(acc, data.block4(i));
        acc = ghash_block(acc, h);
        i += 4;
    }
    acc
}

/// Shared encrypt/decrypt core. The tag is always computed over the
/// ciphertext: before the counter pass when decrypting, after it when
/// encrypting.
fn core(
    encrypting: bool,
    cipher: &Aes,
    data: &BitArray,
    adata: &BitArray,
    iv: &BitArray,
    tag_bits: usize,
) -> (BitArray, BitArray) {
    let data_bits = data.bit_length() as u64;
    let adata_bits = adata.bit_length() as u64;
    let iv_bits = iv.bit_length() as u64;

    let h = cipher.encrypt_block([0, 0, 0, 0]);
    let j0: [u32; 4] = if iv_bits == 96 {
        iv.concat(&BitArray::from_words(vec![1])).block4(0)
    } else {
        let x = ghash(h, [0, 0, 0, 0], iv);
        ghash(
            h,
            x,
            &BitArray::from_words(vec![0, 0, (iv_bits >> 32) as u32, iv_bits as u32]),
        )
    };

    let adata_hash = ghash(h, [0, 0, 0, 0], adata);
    let mut acc = adata_hash;
    if !encrypting {
        acc = ghash(h, adata_hash, data);
    }

    let mut words = data.words().to_vec();
    let n = words.len();
    let mut ctr = j0;
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
    let data = BitArray::from_parts(words, data_bits as usize);

    if encrypting {
        acc = ghash(h, adata_hash, &data);
    }

    let lengths = BitArray::from_words(vec![
        (adata_bits >> 32) as u32,
        adata_bits as u32,
        (data_bits >> 32) as u32,
        data_bits as u32,
    ]);
    acc = ghash(h, acc, &lengths);

    let tag = xor4(acc, cipher.encrypt_block(j0));
    (data, BitArray::from_words(tag.to_vec()).clamp(tag_bits))
}

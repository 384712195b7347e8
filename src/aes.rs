use std::sync::OnceLock;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, StrongboxError};

/// S-box, inverse S-box, and the fused SubBytes/MixColumns lookup tables for
/// both directions. Built once, lazily, and shared read-only by every cipher
/// instance.
struct Tables {
    sbox: [u32; 256],
    inv_sbox: [u32; 256],
    enc: [[u32; 256]; 4],
    dec: [[u32; 256]; 4],
}

static TABLES: OnceLock<Tables> = OnceLock::new();

fn tables() -> &'static Tables {
    TABLES.get_or_init(Tables::build)
}

impl Tables {
    /// Walks the GF(2^8) multiplicative group once, filling the S-box by the
    /// affine transform and deriving each round-table word from the doubling
    /// chain of the current element.
    fn build() -> Tables {
        let mut sbox = [0u32; 256];
        let mut inv_sbox = [0u32; 256];
        let mut enc = [[0u32; 256]; 4];
        let mut dec = [[0u32; 256]; 4];

        // double[x] = x*2 in GF(2^8); third[x*3] = x
        let mut double = [0usize; 256];
        let mut third = [0usize; 256];
        for x in 0..256usize {
            double[x] = (x << 1) ^ (283 * (x >> 7));
            third[double[x] ^ x] = x;
        }

        let mut x = 0usize;
        let mut xi = 0usize;
        loop {
            // affine transform of the inverse (tracked via xi)
            let mut s = xi ^ (xi << 1) ^ (xi << 2) ^ (xi << 3) ^ (xi << 4);
            s = (s >> 8) ^ (s & 255) ^ 99;
            sbox[x] = s as u32;
            inv_sbox[s] = x as u32;

            let x2 = double[x];
            let x4 = double[x2];
            let x8 = double[x4];
            let mut dec_word = (x8 as u32).wrapping_mul(0x0101_0101)
                ^ (x4 as u32).wrapping_mul(0x0001_0001)
                ^ (x2 as u32).wrapping_mul(0x0000_0101)
                ^ (x as u32).wrapping_mul(0x0101_0100);
            let mut enc_word = (double[s] as u32).wrapping_mul(0x0000_0101)
                ^ (s as u32).wrapping_mul(0x0101_0100);
            for t in 0..4 {
                enc_word = enc_word << 24 ^ enc_word >> 8;
                dec_word = dec_word << 24 ^ dec_word >> 8;
                enc[t][x] = enc_word;
                dec[t][s] = dec_word;
            }

            x ^= if x2 != 0 { x2 } else { 1 };
            xi = if third[xi] != 0 { third[xi] } else { 1 };
            if sbox[x] != 0 {
                break;
            }
        }

        Tables {
            sbox,
            inv_sbox,
            enc,
            dec,
        }
    }
}

/// AES with a 128-bit block and a 128-, 192- or 256-bit key.
///
/// The only state is the pair of expanded round-key schedules, computed once
/// at construction and zeroized on drop. Block operations are pure.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Aes {
    enc_keys: Vec<u32>,
    dec_keys: Vec<u32>,
}

impl Aes {
    /// Expands `key` (4, 6 or 8 words) into the round-key schedules.
    pub fn new(key: &[u32]) -> Result<Aes> {
        let kl = key.len();
        if kl != 4 && kl != 6 && kl != 8 {
            return Err(StrongboxError::Invalid(
                "aes key must be 4, 6 or 8 words".to_string(),
            ));
        }
        let t = tables();
        let sbox = &t.sbox;

        let mut enc_keys: Vec<u32> = key.to_vec();
        let mut rcon: u32 = 1;
        for i in kl..4 * kl + 28 {
            let mut tmp = enc_keys[i - 1];
            if i % kl == 0 || (kl == 8 && i % kl == 4) {
                tmp = sbox[(tmp >> 24) as usize] << 24
                    ^ sbox[(tmp >> 16 & 255) as usize] << 16
                    ^ sbox[(tmp >> 8 & 255) as usize] << 8
                    ^ sbox[(tmp & 255) as usize];
                if i % kl == 0 {
                    tmp = tmp << 8 ^ tmp >> 24 ^ rcon << 24;
                    rcon = rcon << 1 ^ 283 * (rcon >> 7);
                }
            }
            enc_keys.push(enc_keys[i - kl] ^ tmp);
        }

        // The decryption schedule is the encryption schedule reversed, with
        // InvMixColumns folded into every word except the outermost rounds.
        let total = enc_keys.len();
        let mut dec_keys = vec![0u32; total];
        let mut i = total;
        for (j, slot) in dec_keys.iter_mut().enumerate() {
            let tmp = enc_keys[if j & 3 != 0 { i } else { i - 4 }];
            *slot = if i <= 4 || j < 4 {
                tmp
            } else {
                t.dec[0][sbox[(tmp >> 24) as usize] as usize]
                    ^ t.dec[1][sbox[(tmp >> 16 & 255) as usize] as usize]
                    ^ t.dec[2][sbox[(tmp >> 8 & 255) as usize] as usize]
                    ^ t.dec[3][sbox[(tmp & 255) as usize] as usize]
            };
            i -= 1;
        }

        Ok(Aes { enc_keys, dec_keys })
    }

    /// Encrypts one 128-bit block.
    pub fn encrypt_block(&self, block: [u32; 4]) -> [u32; 4] {
        self.crypt(block, false)
    }

    /// Decrypts one 128-bit block.
    pub fn decrypt_block(&self, block: [u32; 4]) -> [u32; 4] {
        self.crypt(block, true)
    }

    fn crypt(&self, input: [u32; 4], inverse: bool) -> [u32; 4] {
        let key = if inverse {
            &self.dec_keys
        } else {
            &self.enc_keys
        };
        let t = tables();
        let (tbl, last_box) = if inverse {
            (&t.dec, &t.inv_sbox)
        } else {
            (&t.enc, &t.sbox)
        };

        // Decryption swaps the two middle state words; ShiftRows then runs
        // the same direction for both.
        let mut a = input[0] ^ key[0];
        let mut b = input[if inverse { 3 } else { 1 }] ^ key[1];
        let mut c = input[2] ^ key[2];
        let mut d = input[if inverse { 1 } else { 3 }] ^ key[3];

        let inner_rounds = key.len() / 4 - 2;
        let mut ki = 4;
        for _ in 0..inner_rounds {
            let a2 = tbl[0][(a >> 24) as usize]
                ^ tbl[1][(b >> 16 & 255) as usize]
                ^ tbl[2][(c >> 8 & 255) as usize]
                ^ tbl[3][(d & 255) as usize]
                ^ key[ki];
            let b2 = tbl[0][(b >> 24) as usize]
                ^ tbl[1][(c >> 16 & 255) as usize]
                ^ tbl[2][(d >> 8 & 255) as usize]
                ^ tbl[3][(a & 255) as usize]
                ^ key[ki + 1];
            let c2 = tbl[0][(c >> 24) as usize]
                ^ tbl[1][(d >> 16 & 255) as usize]
                ^ tbl[2][(a >> 8 & 255) as usize]
                ^ tbl[3][(b & 255) as usize]
                ^ key[ki + 2];
            let d2 = tbl[0][(d >> 24) as usize]
                ^ tbl[1][(a >> 16 & 255) as usize]
                ^ tbl[2][(b >> 8 & 255) as usize]
                ^ tbl[3][(c & 255) as usize]
                ^ key[ki + 3];
            ki += 4;
            a = a2;
            b = b2;
            c = c2;
            d = d2;
        }

        // Last round: plain substitution, no column mix.
        let mut out = [0u32; 4];
        for m in 0..4 {
            let slot = if inverse { [0, 3, 2, 1][m] } else { m };
            out[slot] = last_box[(a >> 24) as usize] << 24
                ^ last_box[(b >> 16 & 255) as usize] << 16
                ^ last_box[(c >> 8 & 255) as usize] << 8
                ^ last_box[(d & 255) as usize]
                ^ key[ki];
            ki += 1;
            let tmp = a;
            a = b;
            b = c;
            c = d;
            d = tmp;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // FIPS-197 appendix C known answers
    const PLAIN: [u32; 4] = [0x0011_2233, 0x4455_6677, 0x8899_aabb, 0xccdd_eeff];

    #[test]
    fn test_aes128_fips_vector() {
        let key = [0x0001_0203, 0x0405_0607, 0x0809_0a0b, 0x0c0d_0e0f];
        let aes = Aes::new(&key).unwrap();
        let ct = aes.encrypt_block(PLAIN);
        assert_eq!(ct, [0x69c4_e0d8, 0x6a7b_0430, 0xd8cd_b780, 0x70b4_c55a]);
        assert_eq!(aes.decrypt_block(ct), PLAIN);
    }

    #[test]
    fn test_aes192_fips_vector() {
        let key = [
            0x0001_0203, 0x0405_0607, 0x0809_0a0b, 0x0c0d_0e0f, 0x1011_1213, 0x1415_1617,
        ];
        let aes = Aes::new(&key).unwrap();
        let ct = aes.encrypt_block(PLAIN);
        assert_eq!(ct, [0xdda9_7ca4, 0x864c_dfe0, 0x6eaf_70a0, 0xec0d_7191]);
        assert_eq!(aes.decrypt_block(ct), PLAIN);
    }

    #[test]
    fn test_aes256_fips_vector() {
        let key = [
            0x0001_0203, 0x0405_0607, 0x0809_0a0b, 0x0c0d_0e0f, 0x1011_1213, 0x1415_1617,
            0x1819_1a1b, 0x1c1d_1e1f,
        ];
        let aes = Aes::new(&key).unwrap();
        let ct = aes.encrypt_block(PLAIN);
        assert_eq!(ct, [0x8ea2_b7ca, 0x5167_45bf, 0xeafc_4990, 0x4b49_6089]);
        assert_eq!(aes.decrypt_block(ct), PLAIN);
    }

    #[test]
    fn test_invalid_key_sizes_rejected() {
        for len in [0, 1, 3, 5, 7, 9, 16] {
            let key = vec![0u32; len];
            assert!(
                matches!(Aes::new(&key), Err(StrongboxError::Invalid(_))),
                "key of {} words must be rejected",
                len
            );
        }
    }

    #[test]
    fn test_roundtrip_random_blocks() {
        let aes = Aes::new(&[1, 2, 3, 4]).unwrap();
        let mut block = [0xdead_beef, 0x0badc0de_u32, 0x1234_5678, 0x9abc_def0];
        for _ in 0..100 {
            let ct = aes.encrypt_block(block);
            assert_eq!(aes.decrypt_block(ct), block);
            block = ct;
        }
    }
}

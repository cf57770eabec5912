//! Key schedule and block encryption for all three modes.

use crate::block::Block;
use crate::key::{CipherKey, RoundKeys};
use crate::round::{add_round_key, mix_columns, next_rcon, shift_rows, sub_bytes};
use crate::sbox::sub_word;

fn rot_word(word: u32) -> u32 {
    word.rotate_left(8)
}

/// Expands an origin key into `rounds + 1` round keys per FIPS-197 §5.2.
pub fn expand_key(key: &CipherKey) -> RoundKeys {
    let nk = key.mode().key_words();
    let count = key.mode().rounds() + 1;
    let total_words = count * 4;

    let mut w = [0u32; 60];
    for (i, word) in w.iter_mut().enumerate().take(nk) {
        *word = key.word(i);
    }

    let mut rcon = 0x01u8;
    for i in nk..total_words {
        let mut temp = w[i - 1];
        if i % nk == 0 {
            temp = sub_word(rot_word(temp)) ^ (u32::from(rcon) << 24);
            rcon = next_rcon(rcon);
        } else if nk > 6 && i % nk == 4 {
            temp = sub_word(temp);
        }
        w[i] = w[i - nk] ^ temp;
    }

    let mut keys = [[0u8; 16]; 15];
    for (round, key_block) in keys.iter_mut().enumerate().take(count) {
        for word_idx in 0..4 {
            let bytes = w[round * 4 + word_idx].to_be_bytes();
            key_block[word_idx * 4..word_idx * 4 + 4].copy_from_slice(&bytes);
        }
    }

    RoundKeys::new(keys, count)
}

/// Encrypts a single 16-byte block with pre-expanded round keys.
pub fn encrypt_block(block: &Block, round_keys: &RoundKeys) -> Block {
    let rounds = round_keys.count() - 1;
    let mut state = *block;

    add_round_key(&mut state, round_keys.get(0));

    for round in 1..rounds {
        sub_bytes(&mut state);
        shift_rows(&mut state);
        mix_columns(&mut state);
        add_round_key(&mut state, round_keys.get(round));
    }

    sub_bytes(&mut state);
    shift_rows(&mut state);
    add_round_key(&mut state, round_keys.get(rounds));

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::CipherMode;

    const NIST_PLAIN: Block = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];

    fn sequential_key(len: usize) -> CipherKey {
        let bytes: Vec<u8> = (0..len as u8).collect();
        CipherKey::from_slice(&bytes).expect("valid key length")
    }

    #[test]
    fn encrypt_matches_fips_c1() {
        let round_keys = expand_key(&sequential_key(16));
        let ct = encrypt_block(&NIST_PLAIN, &round_keys);
        assert_eq!(
            ct,
            [
                0x69, 0xc4, 0xe0, 0xd8, 0x6a, 0x7b, 0x04, 0x30, 0xd8, 0xcd, 0xb7, 0x80, 0x70,
                0xb4, 0xc5, 0x5a
            ]
        );
    }

    #[test]
    fn encrypt_matches_fips_c2() {
        let round_keys = expand_key(&sequential_key(24));
        let ct = encrypt_block(&NIST_PLAIN, &round_keys);
        assert_eq!(
            ct,
            [
                0xdd, 0xa9, 0x7c, 0xa4, 0x86, 0x4c, 0xdf, 0xe0, 0x6e, 0xaf, 0x70, 0xa0, 0xec,
                0x0d, 0x71, 0x91
            ]
        );
    }

    #[test]
    fn encrypt_matches_fips_c3() {
        let round_keys = expand_key(&sequential_key(32));
        let ct = encrypt_block(&NIST_PLAIN, &round_keys);
        assert_eq!(
            ct,
            [
                0x8e, 0xa2, 0xb7, 0xca, 0x51, 0x67, 0x45, 0xbf, 0xea, 0xfc, 0x49, 0x90, 0x4b,
                0x49, 0x60, 0x89
            ]
        );
    }

    #[test]
    fn expansion_matches_fips_a1_boundaries() {
        // FIPS-197 appendix A.1 key.
        let key = CipherKey::from([
            0x2b, 0x7e, 0x15, 0x16, 0x28, 0xae, 0xd2, 0xa6, 0xab, 0xf7, 0x15, 0x88, 0x09, 0xcf,
            0x4f, 0x3c,
        ]);
        let round_keys = expand_key(&key);
        assert_eq!(round_keys.count(), 11);
        assert_eq!(round_keys.get(0), &key.bytes()[..16]);
        assert_eq!(
            round_keys.get(1),
            &[
                0xa0, 0xfa, 0xfe, 0x17, 0x88, 0x54, 0x2c, 0xb1, 0x23, 0xa3, 0x39, 0x39, 0x2a,
                0x6c, 0x76, 0x05
            ]
        );
        assert_eq!(
            round_keys.get(10),
            &[
                0xd0, 0x14, 0xf9, 0xa8, 0xc9, 0xee, 0x25, 0x89, 0xe1, 0x3f, 0x0c, 0xc8, 0xb6,
                0x63, 0x0c, 0xa6
            ]
        );
    }

    #[test]
    fn expansion_counts_per_mode() {
        for mode in CipherMode::ALL {
            let key = sequential_key(mode.key_bytes());
            let round_keys = expand_key(&key);
            assert_eq!(round_keys.count(), mode.rounds() + 1);
            assert_eq!(round_keys.iter().count(), mode.rounds() + 1);
        }
    }
}

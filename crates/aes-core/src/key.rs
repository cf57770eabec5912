//! Key types shared across the workspace.

use crate::block::Block;
use crate::mode::CipherMode;

/// Origin cipher key for any of the three modes.
///
/// Only the first `mode.key_bytes()` bytes of the backing store are
/// meaningful; the rest stay zero, mirroring how the modeled core zeroes
/// unused key words for the shorter modes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CipherKey {
    mode: CipherMode,
    bytes: [u8; 32],
}

impl CipherKey {
    /// Builds a key from a byte slice whose length selects the mode.
    ///
    /// Returns `None` for lengths other than 16, 24, or 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        let mode = match bytes.len() {
            16 => CipherMode::Aes128,
            24 => CipherMode::Aes192,
            32 => CipherMode::Aes256,
            _ => return None,
        };
        let mut store = [0u8; 32];
        store[..bytes.len()].copy_from_slice(bytes);
        Some(Self { mode, bytes: store })
    }

    /// Mode implied by the key length.
    #[inline]
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Meaningful key bytes.
    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.mode.key_bytes()]
    }

    /// Key word `i` (big-endian), `i < mode.key_words()`.
    #[inline]
    pub fn word(&self, i: usize) -> u32 {
        let o = i * 4;
        u32::from_be_bytes([
            self.bytes[o],
            self.bytes[o + 1],
            self.bytes[o + 2],
            self.bytes[o + 3],
        ])
    }
}

impl From<[u8; 16]> for CipherKey {
    fn from(value: [u8; 16]) -> Self {
        Self::from_slice(&value).expect("16 bytes is a valid AES-128 key")
    }
}

impl From<[u8; 24]> for CipherKey {
    fn from(value: [u8; 24]) -> Self {
        Self::from_slice(&value).expect("24 bytes is a valid AES-192 key")
    }
}

impl From<[u8; 32]> for CipherKey {
    fn from(value: [u8; 32]) -> Self {
        Self::from_slice(&value).expect("32 bytes is a valid AES-256 key")
    }
}

/// Expanded round keys; `count() == rounds + 1` for the key's mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoundKeys {
    keys: [Block; 15],
    count: usize,
}

impl RoundKeys {
    pub(crate) fn new(keys: [Block; 15], count: usize) -> Self {
        Self { keys, count }
    }

    /// Returns the round key at the requested index (0..count).
    #[inline]
    pub fn get(&self, round: usize) -> &Block {
        &self.keys[round]
    }

    /// Number of round keys, including the terminal whitening key.
    #[inline]
    pub fn count(&self) -> usize {
        self.count
    }

    /// Iterates the meaningful round keys in order.
    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.keys[..self.count].iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_key_length() {
        assert_eq!(CipherKey::from_slice(&[0u8; 16]).unwrap().mode(), CipherMode::Aes128);
        assert_eq!(CipherKey::from_slice(&[0u8; 24]).unwrap().mode(), CipherMode::Aes192);
        assert_eq!(CipherKey::from_slice(&[0u8; 32]).unwrap().mode(), CipherMode::Aes256);
        assert!(CipherKey::from_slice(&[0u8; 20]).is_none());
    }

    #[test]
    fn words_are_big_endian() {
        let mut bytes = [0u8; 16];
        bytes[..4].copy_from_slice(&[0x01, 0x02, 0x03, 0x04]);
        let key = CipherKey::from(bytes);
        assert_eq!(key.word(0), 0x0102_0304);
        assert_eq!(key.word(1), 0);
    }
}

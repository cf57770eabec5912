//! AES key-size modes.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Key-size mode of the cipher, fixing round count and key-word count.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CipherMode {
    /// 128-bit key, 10 rounds.
    Aes128,
    /// 192-bit key, 12 rounds.
    Aes192,
    /// 256-bit key, 14 rounds.
    Aes256,
}

impl CipherMode {
    /// All modes, smallest key first.
    pub const ALL: [CipherMode; 3] = [CipherMode::Aes128, CipherMode::Aes192, CipherMode::Aes256];

    /// Number of cipher rounds for this mode.
    #[inline]
    pub fn rounds(self) -> usize {
        match self {
            CipherMode::Aes128 => 10,
            CipherMode::Aes192 => 12,
            CipherMode::Aes256 => 14,
        }
    }

    /// Number of 32-bit words in the origin key.
    #[inline]
    pub fn key_words(self) -> usize {
        match self {
            CipherMode::Aes128 => 4,
            CipherMode::Aes192 => 6,
            CipherMode::Aes256 => 8,
        }
    }

    /// Origin key length in bytes.
    #[inline]
    pub fn key_bytes(self) -> usize {
        self.key_words() * 4
    }
}

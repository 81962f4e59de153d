//! Synchronous stream cipher engines.
//!
//! Engines XOR a keystream over the buffer in place, so processing the
//! ciphertext with a fresh engine built from the same key and IV restores
//! the plaintext. Nothing is authenticated.

use chacha20::ChaCha20;
use salsa20::Salsa20;
use salsa20::cipher::{KeyIvInit, StreamCipher};

use crate::error::CoreError;

/// A keyed stream cipher whose keystream advances with every processed byte.
pub trait StreamEngine: Send {
    /// Transforms `buf` in place.
    fn process(&mut self, buf: &mut [u8]);

    /// Transforms `buf[offset..offset + len]` in place.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds.
    fn process_range(&mut self, buf: &mut [u8], offset: usize, len: usize) {
        self.process(&mut buf[offset..offset + len]);
    }
}

/// Salsa20/20 with a 32-byte key and an 8-byte IV.
pub struct Salsa20Engine(Salsa20);

impl Salsa20Engine {
    pub const KEY_LEN: usize = 32;
    pub const IV_LEN: usize = 8;

    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CoreError> {
        Salsa20::new_from_slices(key, iv)
            .map(Self)
            .map_err(|_| CoreError::InvalidKeyMaterial {
                cipher: "Salsa20",
                key_len: key.len(),
                iv_len: iv.len(),
            })
    }
}

impl StreamEngine for Salsa20Engine {
    fn process(&mut self, buf: &mut [u8]) {
        self.0.apply_keystream(buf);
    }
}

/// ChaCha20 (RFC 7539 variant) with a 32-byte key and a 12-byte IV.
pub struct ChaCha20Engine(ChaCha20);

impl ChaCha20Engine {
    pub const KEY_LEN: usize = 32;
    pub const IV_LEN: usize = 12;

    pub fn new(key: &[u8], iv: &[u8]) -> Result<Self, CoreError> {
        ChaCha20::new_from_slices(key, iv)
            .map(Self)
            .map_err(|_| CoreError::InvalidKeyMaterial {
                cipher: "ChaCha20",
                key_len: key.len(),
                iv_len: iv.len(),
            })
    }
}

impl StreamEngine for ChaCha20Engine {
    fn process(&mut self, buf: &mut [u8]) {
        self.0.apply_keystream(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PLAIN: &[u8] = b"the quick brown fox jumps over the lazy dog, twice over";

    #[test]
    fn salsa20_is_an_involution() {
        let key = [7u8; 32];
        let iv = [1u8; 8];

        let mut buf = PLAIN.to_vec();
        Salsa20Engine::new(&key, &iv).unwrap().process(&mut buf);
        assert_ne!(buf, PLAIN);

        Salsa20Engine::new(&key, &iv).unwrap().process(&mut buf);
        assert_eq!(buf, PLAIN);
    }

    #[test]
    fn chacha20_is_an_involution() {
        let key = [3u8; 32];
        let iv = [9u8; 12];

        let mut buf = PLAIN.to_vec();
        ChaCha20Engine::new(&key, &iv).unwrap().process(&mut buf);
        assert_ne!(buf, PLAIN);

        ChaCha20Engine::new(&key, &iv).unwrap().process(&mut buf);
        assert_eq!(buf, PLAIN);
    }

    #[test]
    fn sequential_chunks_match_single_pass() {
        let key = [5u8; 32];
        let iv = [2u8; 8];

        let mut whole = PLAIN.to_vec();
        Salsa20Engine::new(&key, &iv).unwrap().process(&mut whole);

        let mut chunked = PLAIN.to_vec();
        let mut engine = Salsa20Engine::new(&key, &iv).unwrap();
        engine.process_range(&mut chunked, 0, 5);
        engine.process_range(&mut chunked, 5, 30);
        engine.process_range(&mut chunked, 35, PLAIN.len() - 35);

        assert_eq!(whole, chunked);
    }

    #[test]
    fn process_range_leaves_rest_untouched() {
        let mut buf = PLAIN.to_vec();
        ChaCha20Engine::new(&[1u8; 32], &[0u8; 12])
            .unwrap()
            .process_range(&mut buf, 4, 10);

        assert_eq!(buf[..4], PLAIN[..4]);
        assert_eq!(buf[14..], PLAIN[14..]);
        assert_ne!(buf[4..14], PLAIN[4..14]);
    }

    #[test]
    fn salsa20_keystream_matches_reference() {
        // ECRYPT Salsa20/20 256-bit set 1, vector 0: key 0x80 00..00, iv 0.
        let mut key = [0u8; 32];
        key[0] = 0x80;
        let mut buf = [0u8; 16];
        Salsa20Engine::new(&key, &[0u8; 8]).unwrap().process(&mut buf);

        assert_eq!(hex::encode(buf), "e3be8fdd8beca2e3ea8ef9475b29a6e7");
    }

    #[test]
    fn bad_key_or_iv_sizes_fail() {
        assert!(matches!(
            Salsa20Engine::new(&[0u8; 16], &[0u8; 8]),
            Err(CoreError::InvalidKeyMaterial { key_len: 16, .. })
        ));
        assert!(matches!(
            Salsa20Engine::new(&[0u8; 32], &[0u8; 12]),
            Err(CoreError::InvalidKeyMaterial { iv_len: 12, .. })
        ));
        assert!(ChaCha20Engine::new(&[0u8; 32], &[0u8; 8]).is_err());
    }
}

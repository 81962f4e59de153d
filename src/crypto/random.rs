//! Keyed pseudo-random byte stream used to produce XOR pads.
//!
//! The same key always yields the same stream, which is what lets protected
//! vault fields be re-padded on write and un-padded on read.

use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use super::stream::{ChaCha20Engine, Salsa20Engine, StreamEngine};
use crate::error::CoreError;

const SALSA20_IV: [u8; 8] = [0xE8, 0x30, 0x09, 0x4B, 0x97, 0x20, 0x5D, 0x2A];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandomStreamAlgorithm {
    Salsa20,
    ChaCha20,
}

pub struct RandomStream {
    engine: Box<dyn StreamEngine>,
}

impl RandomStream {
    /// Creates a stream from arbitrary non-empty key bytes.
    pub fn new(algorithm: RandomStreamAlgorithm, key: &[u8]) -> Result<Self, CoreError> {
        if key.is_empty() {
            return Err(CoreError::InvalidArgument("random stream key must not be empty"));
        }

        let engine: Box<dyn StreamEngine> = match algorithm {
            RandomStreamAlgorithm::Salsa20 => {
                let mut key32 = Zeroizing::new([0u8; 32]);
                key32.copy_from_slice(&Sha256::digest(key));
                Box::new(Salsa20Engine::new(key32.as_slice(), &SALSA20_IV)?)
            }
            RandomStreamAlgorithm::ChaCha20 => {
                let mut hash = Zeroizing::new([0u8; 64]);
                hash.copy_from_slice(&Sha512::digest(key));
                Box::new(ChaCha20Engine::new(&hash[..32], &hash[32..44])?)
            }
        };

        Ok(Self { engine })
    }

    /// Returns the next `count` bytes of the stream.
    pub fn next_bytes(&mut self, count: usize) -> Vec<u8> {
        let mut out = vec![0u8; count];
        self.engine.process(&mut out);
        out
    }

    /// Returns the next eight bytes as a little-endian integer.
    pub fn next_u64(&mut self) -> u64 {
        let mut out = [0u8; 8];
        self.engine.process(&mut out);
        u64::from_le_bytes(out)
    }
}

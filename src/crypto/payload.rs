//! Payload transforms handed out by the cipher registry.
//!
//! A transform is fed the payload in arbitrary chunks through
//! [`update`](PayloadTransform::update) and closed with
//! [`finish`](PayloadTransform::finish). Stream ciphers map bytes one to one.
//! AES-CBC holds back partial blocks and pads with PKCS#7.

use aes::Aes256;
use cbc::cipher::generic_array::GenericArray;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use super::BLOCK_LEN;
use super::stream::StreamEngine;
use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

pub trait PayloadTransform: Send {
    /// Transforms `input`, appending whatever output is ready to `out`.
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>);

    /// Flushes buffered bytes into `out`.
    fn finish(self: Box<Self>, out: &mut Vec<u8>) -> Result<(), CoreError>;
}

/// Adapts a [`StreamEngine`]. Direction is irrelevant for a keystream.
pub struct StreamTransform(Box<dyn StreamEngine>);

impl StreamTransform {
    pub fn new(engine: impl StreamEngine + 'static) -> Self {
        Self(Box::new(engine))
    }
}

impl PayloadTransform for StreamTransform {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(input);
        self.0.process(&mut out[start..]);
    }

    fn finish(self: Box<Self>, _out: &mut Vec<u8>) -> Result<(), CoreError> {
        Ok(())
    }
}

enum CbcMode {
    Encrypt(cbc::Encryptor<Aes256>),
    Decrypt(cbc::Decryptor<Aes256>),
}

/// AES-256 in CBC mode with PKCS#7 padding, 32-byte key and 16-byte IV.
pub struct AesCbcTransform {
    mode: CbcMode,
    pending: Zeroizing<Vec<u8>>,
}

impl AesCbcTransform {
    pub const KEY_LEN: usize = 32;
    pub const IV_LEN: usize = 16;

    pub fn new(key: &[u8], iv: &[u8], direction: Direction) -> Result<Self, CoreError> {
        let bad = |_| CoreError::InvalidKeyMaterial {
            cipher: "AES",
            key_len: key.len(),
            iv_len: iv.len(),
        };
        let mode = match direction {
            Direction::Encrypt => {
                CbcMode::Encrypt(cbc::Encryptor::new_from_slices(key, iv).map_err(bad)?)
            }
            Direction::Decrypt => {
                CbcMode::Decrypt(cbc::Decryptor::new_from_slices(key, iv).map_err(bad)?)
            }
        };

        Ok(Self {
            mode,
            pending: Zeroizing::new(Vec::with_capacity(BLOCK_LEN)),
        })
    }

    fn run_blocks(&mut self, len: usize, out: &mut Vec<u8>) {
        for block in self.pending[..len].chunks_exact_mut(BLOCK_LEN) {
            let block = GenericArray::from_mut_slice(block);
            match &mut self.mode {
                CbcMode::Encrypt(c) => c.encrypt_block_mut(block),
                CbcMode::Decrypt(c) => c.decrypt_block_mut(block),
            }
        }
        out.extend_from_slice(&self.pending[..len]);
        self.pending.drain(..len);
    }
}

impl PayloadTransform for AesCbcTransform {
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) {
        self.pending.extend_from_slice(input);

        // Decryption keeps the last full block back until the padding is known.
        let held = match self.mode {
            CbcMode::Encrypt(_) => self.pending.len() % BLOCK_LEN,
            CbcMode::Decrypt(_) => match self.pending.len() % BLOCK_LEN {
                0 => BLOCK_LEN.min(self.pending.len()),
                rest => rest,
            },
        };
        let ready = self.pending.len() - held;
        self.run_blocks(ready, out);
    }

    fn finish(mut self: Box<Self>, out: &mut Vec<u8>) -> Result<(), CoreError> {
        match self.mode {
            CbcMode::Encrypt(_) => {
                let pad = BLOCK_LEN - self.pending.len();
                self.pending.resize(BLOCK_LEN, pad as u8);
                self.run_blocks(BLOCK_LEN, out);
                Ok(())
            }
            CbcMode::Decrypt(_) => {
                if self.pending.len() != BLOCK_LEN {
                    return Err(CoreError::InvalidPayload(
                        "ciphertext is not a whole number of blocks",
                    ));
                }

                let mut last = Vec::with_capacity(BLOCK_LEN);
                self.run_blocks(BLOCK_LEN, &mut last);
                let last = Zeroizing::new(last);

                let pad = usize::from(last[BLOCK_LEN - 1]);
                if pad == 0
                    || pad > BLOCK_LEN
                    || !last[BLOCK_LEN - pad..].iter().all(|&b| usize::from(b) == pad)
                {
                    return Err(CoreError::InvalidPayload("bad PKCS#7 padding"));
                }
                out.extend_from_slice(&last[..BLOCK_LEN - pad]);
                Ok(())
            }
        }
    }
}

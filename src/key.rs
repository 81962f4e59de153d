//! Composite master key.
//!
//! A master key is built from one or more user key parts. Each part is a
//! 32-byte hash kept in a [`SecretBuffer`]; the raw composite key is the
//! SHA-256 of all parts concatenated in insertion order.

use std::sync::atomic::AtomicBool;

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use crate::crypto::{KEY_LEN, KeyTransformer, PrimitiveFactory};
use crate::error::CoreError;
use crate::protected::SecretBuffer;

#[derive(Debug, Default, Clone)]
pub struct CompositeKey {
    parts: Vec<SecretBuffer>,
}

fn sha256(data: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut out = Zeroizing::new([0u8; KEY_LEN]);
    out.copy_from_slice(&Sha256::digest(data));
    out
}

impl CompositeKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// A key consisting of a single master password.
    pub fn from_password(password: &str) -> Result<Self, CoreError> {
        let mut key = Self::new();
        key.add_password(password)?;
        Ok(key)
    }

    /// Adds a password part: the SHA-256 of its UTF-8 bytes.
    pub fn add_password(&mut self, password: &str) -> Result<(), CoreError> {
        let hash = sha256(password.as_bytes());
        self.parts.push(SecretBuffer::protect(hash.as_slice())?);
        Ok(())
    }

    /// Adds 32 bytes of already derived key data (e.g. from a key file).
    pub fn add_key_data(&mut self, data: SecretBuffer) -> Result<(), CoreError> {
        if data.len() != KEY_LEN {
            return Err(CoreError::InvalidArgument("key data must be 32 bytes"));
        }
        self.parts.push(data);
        Ok(())
    }

    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// SHA-256 over the concatenated parts.
    pub fn raw_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        let mut hasher = Sha256::new();
        for part in &self.parts {
            part.reveal_with(|plain| hasher.update(plain));
        }
        let mut out = Zeroizing::new([0u8; KEY_LEN]);
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// Derives the 32-byte vault key: the raw key is run through the
    /// transformer and hashed once more with SHA-256.
    pub fn generate_key32<F: PrimitiveFactory>(
        &self,
        transformer: &KeyTransformer<F>,
    ) -> Result<SecretBuffer, CoreError> {
        let mut key = self.raw_key();
        transformer.transform(&mut key);
        SecretBuffer::protect(sha256(key.as_slice()).as_slice())
    }

    /// Like [`generate_key32`](Self::generate_key32), but gives up with
    /// [`CoreError::Cancelled`] once `cancel` is set.
    pub fn generate_key32_cancellable<F: PrimitiveFactory>(
        &self,
        transformer: &KeyTransformer<F>,
        cancel: &AtomicBool,
    ) -> Result<SecretBuffer, CoreError> {
        let mut key = self.raw_key();
        transformer.transform_cancellable(&mut key, cancel)?;
        SecretBuffer::protect(sha256(key.as_slice()).as_slice())
    }

    /// Compares the raw keys of two composite keys.
    pub fn eq_value(&self, other: &CompositeKey) -> bool {
        *self.raw_key() == *other.raw_key()
    }
}

//! XOR-obfuscated secret storage.
//!
//! A [`SecretBuffer`] keeps a secret as `ciphertext ^ pad` so the plain value
//! never sits in memory for longer than a caller actually needs it.

use std::fmt;

use zeroize::{Zeroize, Zeroizing};

use crate::crypto::{RandomStream, secure_random};
use crate::error::CoreError;

/// Immutable (ciphertext, pad) pair. Safe to share between threads.
#[derive(Clone)]
pub struct SecretBuffer {
    data: Vec<u8>,
    pad: Vec<u8>,
}

impl SecretBuffer {
    /// Takes ownership of an already padded secret and its pad.
    pub fn new(data: Vec<u8>, pad: Vec<u8>) -> Result<Self, CoreError> {
        if data.len() != pad.len() {
            return Err(CoreError::InvalidArgument(
                "protected data and xor pad differ in length",
            ));
        }
        Ok(Self { data, pad })
    }

    /// Protects `plain` with a fresh pad from the OS random generator.
    pub fn protect(plain: &[u8]) -> Result<Self, CoreError> {
        let mut pad = vec![0u8; plain.len()];
        secure_random(&mut pad)?;
        Ok(Self::xor_into(plain, pad))
    }

    /// Protects `plain` with the next `plain.len()` bytes of `stream`.
    pub fn from_stream(plain: &[u8], stream: &mut RandomStream) -> Self {
        Self::xor_into(plain, stream.next_bytes(plain.len()))
    }

    fn xor_into(plain: &[u8], pad: Vec<u8>) -> Self {
        let data = plain.iter().zip(&pad).map(|(p, k)| p ^ k).collect();
        Self { data, pad }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns a copy of the plain secret, wiped when dropped.
    pub fn reveal(&self) -> Zeroizing<Vec<u8>> {
        Zeroizing::new(self.data.iter().zip(&self.pad).map(|(d, k)| d ^ k).collect())
    }

    /// Runs `f` on the plain secret and wipes it afterwards, including when
    /// `f` unwinds.
    pub fn reveal_with<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let plain = self.reveal();
        f(&plain)
    }

    /// Returns the secret padded with the next bytes of `stream`, as written
    /// into protected vault fields.
    pub fn xorred_with(&self, stream: &mut RandomStream) -> Vec<u8> {
        let mut out = stream.next_bytes(self.len());
        for ((o, d), k) in out.iter_mut().zip(&self.data).zip(&self.pad) {
            *o ^= d ^ k;
        }
        out
    }

    /// Compares the plain values of two buffers.
    pub fn eq_value(&self, other: &SecretBuffer) -> bool {
        self.len() == other.len() && *self.reveal() == *other.reveal()
    }
}

impl Drop for SecretBuffer {
    fn drop(&mut self) {
        self.data.zeroize();
        self.pad.zeroize();
    }
}

impl fmt::Debug for SecretBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecretBuffer")
            .field("len", &self.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::RandomStreamAlgorithm;

    #[test]
    fn reveal_undoes_the_pad() {
        let mut pads = RandomStream::new(RandomStreamAlgorithm::ChaCha20, b"pads").unwrap();

        for len in [0usize, 1, 16, 33, 1000] {
            let plain: Vec<u8> = (0..len).map(|i| (i * 31 % 251) as u8).collect();
            let pad = pads.next_bytes(len);
            let data: Vec<u8> = plain.iter().zip(&pad).map(|(p, k)| p ^ k).collect();

            let buf = SecretBuffer::new(data, pad).unwrap();

            assert_eq!(buf.len(), len);
            assert_eq!(*buf.reveal(), plain, "length {len}");
            // reveal does not consume or alter the container
            assert_eq!(*buf.reveal(), plain, "length {len}");
        }
    }

    #[test]
    fn clone_reveals_same_value() {
        let buf = SecretBuffer::protect(b"copy me").unwrap();
        let copy = buf.clone();
        drop(buf);
        assert_eq!(*copy.reveal(), b"copy me");
    }

    #[test]
    fn mismatched_lengths_are_rejected() {
        match SecretBuffer::new(vec![1, 2, 3], vec![1, 2]) {
            Err(CoreError::InvalidArgument(_)) => {}
            other => panic!("expected InvalidArgument, got: {other:?}"),
        }
    }

    #[test]
    fn empty_buffer_is_allowed() {
        let buf = SecretBuffer::new(Vec::new(), Vec::new()).unwrap();
        assert!(buf.is_empty());
        assert!(buf.reveal().is_empty());
    }

    #[test]
    fn protect_hides_plaintext() {
        let plain = [0x41u8; 64];
        let buf = SecretBuffer::protect(&plain).unwrap();

        assert_ne!(buf.data, plain);
        assert_eq!(*buf.reveal(), plain);
    }

    #[test]
    fn stream_padding_roundtrip() {
        let key = b"inner stream key";
        let mut writer = RandomStream::new(RandomStreamAlgorithm::Salsa20, key).unwrap();
        let mut reader = RandomStream::new(RandomStreamAlgorithm::Salsa20, key).unwrap();

        let secret = SecretBuffer::protect(b"hunter2").unwrap();
        let on_disk = secret.xorred_with(&mut writer);
        assert_ne!(on_disk, b"hunter2");

        let pad = reader.next_bytes(on_disk.len());
        let loaded = SecretBuffer::new(on_disk, pad).unwrap();
        assert!(loaded.eq_value(&secret));
    }

    #[test]
    fn reveal_with_passes_plaintext() {
        let buf = SecretBuffer::protect(b"abc").unwrap();
        let len = buf.reveal_with(|p| {
            assert_eq!(p, b"abc");
            p.len()
        });
        assert_eq!(len, 3);
    }

    #[test]
    fn debug_does_not_leak() {
        let buf = SecretBuffer::protect(b"topsecret").unwrap();
        let shown = format!("{buf:?}");
        assert!(!shown.contains("topsecret"));
        assert!(shown.contains("len: 9"));
    }

    #[test]
    fn concurrent_readers() {
        use std::sync::Arc;

        let buf = Arc::new(SecretBuffer::protect(b"shared").unwrap());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let buf = Arc::clone(&buf);
                std::thread::spawn(move || buf.reveal().to_vec())
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap(), b"shared");
        }
    }
}

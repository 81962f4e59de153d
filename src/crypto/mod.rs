//! Cryptographic building blocks of the core.
//!
//! Provides the KDF block primitive, the AES-KDF key transformation,
//! stream cipher engines, payload transforms, the cipher registry and the
//! keyed random stream.

pub mod kdf;
pub mod payload;
pub mod primitive;
pub mod random;
pub mod registry;
pub mod stream;

pub use kdf::{KeyTransformer, TransformParams};
pub use payload::{AesCbcTransform, Direction, PayloadTransform, StreamTransform};
pub use primitive::{AesFactory, BlockPrimitive, PrimitiveFactory};
pub use random::{RandomStream, RandomStreamAlgorithm};
pub use registry::{CipherDescriptor, CipherRegistry, CipherUuid};
pub use stream::{ChaCha20Engine, Salsa20Engine, StreamEngine};

use crate::error::CoreError;

/// Length of the KDF seed and of every derived key (32 bytes / 256 bits).
pub const KEY_LEN: usize = 32;
/// Block size the KDF is defined for (128 bits).
pub const BLOCK_LEN: usize = 16;

/// Fill buffer with cryptographically secure random bytes
pub(crate) fn secure_random(buf: &mut [u8]) -> Result<(), CoreError> {
    getrandom::fill(buf).map_err(|e| {
        CoreError::io(
            "<os rng>",
            std::io::Error::other(format!("OS random generator unavailable: {e}")),
        )
    })
}

/// Generate a fresh KDF seed
pub fn generate_seed() -> Result<[u8; KEY_LEN], CoreError> {
    let mut seed = [0u8; KEY_LEN];
    secure_random(&mut seed)?;
    Ok(seed)
}

/// Generate a random IV of the requested length
pub fn generate_iv(len: usize) -> Result<Vec<u8>, CoreError> {
    let mut iv = vec![0u8; len];
    secure_random(&mut iv)?;
    Ok(iv)
}

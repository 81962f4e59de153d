//! Security core of a KeePass-compatible credential store.
//!
//! - [`crypto`]: AES-KDF key transformation, stream cipher engines, the
//!   cipher registry and the keyed random stream used for XOR pads.
//! - [`protected`]: [`SecretBuffer`], the XOR-obfuscated secret container.
//! - [`key`]: [`CompositeKey`], the master key supplier.
//! - [`otp`]: HOTP/TOTP code generation.
//! - [`storage`]: transactional file commits.

pub mod config;
pub mod crypto;
mod error;
pub mod key;
pub mod otp;
pub mod protected;
pub mod storage;

use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::debug;
use zeroize::Zeroizing;

pub use crate::crypto::{
    CipherDescriptor, CipherRegistry, CipherUuid, Direction, KeyTransformer, TransformParams,
};
pub use crate::error::CoreError;
pub use crate::key::CompositeKey;
pub use crate::protected::SecretBuffer;
pub use crate::storage::{Storage, TransactionalWriter, WriteOptions};

const CHUNK_LEN: usize = 64 * 1024;

/// Streams `input` through the payload cipher and commits the result to
/// `output`. A payload that fails to decrypt leaves `output` untouched
/// in transacted mode.
pub fn crypt_file(
    input: &Path,
    output: &Storage,
    cipher: &CipherDescriptor,
    key: &SecretBuffer,
    iv: &[u8],
    direction: Direction,
) -> Result<()> {
    if input == output.path().as_path() {
        bail!("input and output must be different files");
    }

    let mut transform = key.reveal_with(|k| cipher.transform(k, iv, direction))?;
    let mut reader = BufReader::new(
        File::open(input).with_context(|| format!("failed to open {}", input.display()))?,
    );

    let mut total = 0usize;
    output.save_with(|out| {
        let mut chunk = Zeroizing::new(vec![0u8; CHUNK_LEN]);
        let mut done = Zeroizing::new(Vec::with_capacity(CHUNK_LEN + crypto::BLOCK_LEN));
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            done.clear();
            transform.update(&chunk[..n], &mut done);
            out.write_all(&done)?;
            total += done.len();
        }

        done.clear();
        transform
            .finish(&mut done)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        total += done.len();
        out.write_all(&done)
    })?;

    debug!(bytes = total, cipher = cipher.name(), ?direction, "payload written");
    Ok(())
}

//! Registry of payload cipher engines, keyed by their 16-byte UUID.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use tracing::debug;

use super::payload::{AesCbcTransform, Direction, PayloadTransform, StreamTransform};
use super::stream::ChaCha20Engine;
use crate::error::CoreError;

/// 16-byte identifier of a cipher engine, as stored in vault headers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CipherUuid([u8; 16]);

impl CipherUuid {
    /// KeePass identifier of the AES-256-CBC payload cipher.
    pub const AES256: CipherUuid = CipherUuid([
        0x31, 0xC1, 0xF2, 0xE6, 0xBF, 0x71, 0x43, 0x50, 0xBE, 0x58, 0x05, 0x21, 0x6A, 0xFC, 0x5A,
        0xFF,
    ]);

    /// KeePass identifier of the ChaCha20 payload cipher.
    pub const CHACHA20: CipherUuid = CipherUuid([
        0xD6, 0x03, 0x8A, 0x2B, 0x8B, 0x6F, 0x4C, 0xB5, 0xA5, 0x24, 0x33, 0x9A, 0x31, 0xDB, 0xB5,
        0x9A,
    ]);

    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for CipherUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let h = hex::encode(self.0);
        write!(
            f,
            "{}-{}-{}-{}-{}",
            &h[..8],
            &h[8..12],
            &h[12..16],
            &h[16..20],
            &h[20..]
        )
    }
}

impl fmt::Debug for CipherUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CipherUuid({self})")
    }
}

impl FromStr for CipherUuid {
    type Err = CoreError;

    /// Accepts 32 hex digits, with or without hyphens.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|c| *c != '-').collect();
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(&compact, &mut bytes)
            .map_err(|_| CoreError::InvalidArgument("cipher uuid must be 16 hex-encoded bytes"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for CipherUuid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Constructs a keyed transform from raw key and IV bytes.
pub type EngineCtor =
    fn(&[u8], &[u8], Direction) -> Result<Box<dyn PayloadTransform>, CoreError>;

#[derive(Clone, Serialize)]
pub struct CipherDescriptor {
    uuid: CipherUuid,
    name: &'static str,
    key_len: usize,
    iv_len: usize,
    #[serde(skip)]
    ctor: EngineCtor,
}

impl CipherDescriptor {
    pub fn new(
        uuid: CipherUuid,
        name: &'static str,
        key_len: usize,
        iv_len: usize,
        ctor: EngineCtor,
    ) -> Self {
        Self {
            uuid,
            name,
            key_len,
            iv_len,
            ctor,
        }
    }

    pub fn uuid(&self) -> CipherUuid {
        self.uuid
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn key_len(&self) -> usize {
        self.key_len
    }

    pub fn iv_len(&self) -> usize {
        self.iv_len
    }

    /// Creates a transform keyed with `key` and `iv`.
    pub fn transform(
        &self,
        key: &[u8],
        iv: &[u8],
        direction: Direction,
    ) -> Result<Box<dyn PayloadTransform>, CoreError> {
        (self.ctor)(key, iv, direction)
    }
}

impl fmt::Debug for CipherDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherDescriptor")
            .field("uuid", &self.uuid)
            .field("name", &self.name)
            .finish()
    }
}

fn aes256_engine(
    key: &[u8],
    iv: &[u8],
    direction: Direction,
) -> Result<Box<dyn PayloadTransform>, CoreError> {
    Ok(Box::new(AesCbcTransform::new(key, iv, direction)?))
}

fn chacha20_engine(
    key: &[u8],
    iv: &[u8],
    _direction: Direction,
) -> Result<Box<dyn PayloadTransform>, CoreError> {
    Ok(Box::new(StreamTransform::new(ChaCha20Engine::new(key, iv)?)))
}

#[derive(Debug, Clone, Default)]
pub struct CipherRegistry {
    ciphers: HashMap<CipherUuid, CipherDescriptor>,
}

impl CipherRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the built-in engines.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CipherDescriptor::new(
            CipherUuid::AES256,
            "AES-256",
            AesCbcTransform::KEY_LEN,
            AesCbcTransform::IV_LEN,
            aes256_engine,
        ));
        registry.register(CipherDescriptor::new(
            CipherUuid::CHACHA20,
            "ChaCha20",
            ChaCha20Engine::KEY_LEN,
            ChaCha20Engine::IV_LEN,
            chacha20_engine,
        ));
        registry
    }

    /// Adds a descriptor. A UUID that is already registered keeps its
    /// original descriptor.
    pub fn register(&mut self, descriptor: CipherDescriptor) {
        let uuid = descriptor.uuid;
        if self.ciphers.contains_key(&uuid) {
            debug!(%uuid, "cipher already registered, ignoring");
            return;
        }
        debug!(%uuid, name = descriptor.name, "registered cipher");
        self.ciphers.insert(uuid, descriptor);
    }

    pub fn get(&self, uuid: &CipherUuid) -> Result<&CipherDescriptor, CoreError> {
        self.ciphers
            .get(uuid)
            .ok_or(CoreError::UnknownCipher(*uuid))
    }

    /// Finds a cipher by display name (case-insensitive) or by UUID string.
    pub fn find(&self, name_or_uuid: &str) -> Result<&CipherDescriptor, CoreError> {
        if let Some(d) = self
            .ciphers
            .values()
            .find(|d| d.name.eq_ignore_ascii_case(name_or_uuid))
        {
            return Ok(d);
        }
        self.get(&name_or_uuid.parse()?)
    }

    /// Descriptors ordered by display name.
    pub fn descriptors(&self) -> Vec<&CipherDescriptor> {
        let mut all: Vec<_> = self.ciphers.values().collect();
        all.sort_by_key(|d| d.name);
        all
    }

    pub fn len(&self) -> usize {
        self.ciphers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ciphers.is_empty()
    }
}

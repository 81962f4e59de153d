use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::crypto::CipherUuid;

/// Recoverable failures raised by the core.
///
/// Programmer errors (wrong primitive block size, unsupported OTP digit
/// counts, misuse of the transaction state machine) panic instead.
#[derive(Debug)]
pub enum CoreError {
    InvalidArgument(&'static str),
    InvalidKeyMaterial {
        cipher: &'static str,
        key_len: usize,
        iv_len: usize,
    },
    UnknownCipher(CipherUuid),
    InvalidPayload(&'static str),
    SaveVerificationFailed(PathBuf),
    Io {
        path: PathBuf,
        source: io::Error,
    },
    Cancelled,
}

impl CoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        CoreError::Io {
            path: path.into(),
            source,
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::InvalidArgument(what) => write!(f, "invalid argument: {what}"),
            CoreError::InvalidKeyMaterial {
                cipher,
                key_len,
                iv_len,
            } => write!(
                f,
                "invalid key material for {cipher}: {key_len}-byte key, {iv_len}-byte iv"
            ),
            CoreError::UnknownCipher(uuid) => write!(f, "unsupported cipher '{uuid}'"),
            CoreError::InvalidPayload(what) => write!(f, "invalid payload: {what}"),
            CoreError::SaveVerificationFailed(p) => {
                write!(f, "{}: file save failed", p.display())
            }
            CoreError::Io { path, source } => write!(f, "{}: {source}", path.display()),
            CoreError::Cancelled => write!(f, "operation cancelled"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CoreError::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

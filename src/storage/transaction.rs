//! Transactional file commits.
//!
//! New content is written to `<base>.tmp` and only renamed over the base
//! file once the caller commits. A writer that is dropped without a commit
//! leaves the temporary file behind for inspection.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::StorageConnector;
use crate::error::CoreError;

/// Suffix appended to the base path to form the staging path.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Per-writer commit behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Stage writes in a temporary file and rename on commit.
    pub transacted: bool,
    /// Refuse to commit unless the staged file exists.
    pub extra_safe: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            transacted: true,
            extra_safe: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Opened,
}

pub struct TransactionalWriter<C: StorageConnector> {
    connector: C,
    base: PathBuf,
    temp: PathBuf,
    options: WriteOptions,
    made_unhidden: bool,
    state: State,
}

/// Returns `base` with [`TEMP_SUFFIX`] appended.
pub fn temp_path(base: &Path) -> PathBuf {
    let mut s = OsString::from(base.as_os_str());
    s.push(TEMP_SUFFIX);
    PathBuf::from(s)
}

impl<C: StorageConnector> TransactionalWriter<C> {
    pub fn new(connector: C, base: impl Into<PathBuf>, options: WriteOptions) -> Self {
        let base = base.into();
        let temp = if options.transacted {
            temp_path(&base)
        } else {
            base.clone()
        };

        Self {
            connector,
            base,
            temp,
            options,
            made_unhidden: false,
            state: State::Created,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base
    }

    /// Path that receives the written bytes: the staging path when
    /// transacted, the base path otherwise.
    pub fn write_path(&self) -> &Path {
        &self.temp
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }

    /// Opens the write target.
    ///
    /// # Panics
    ///
    /// Panics if called more than once.
    pub fn open_write(&mut self) -> Result<C::Writer, CoreError> {
        assert_eq!(self.state, State::Created, "open_write called twice");

        if self.options.transacted {
            // Stale staging files are removed opportunistically.
            if let Err(e) = self.connector.delete(&self.temp) {
                debug!(path = %self.temp.display(), error = %e, "stale temp cleanup failed");
            }
        } else {
            self.made_unhidden = self
                .connector
                .unhide(&self.temp)
                .map_err(|e| CoreError::io(&self.temp, e))?;
        }

        let writer = self
            .connector
            .open_write(&self.temp)
            .map_err(|e| CoreError::io(&self.temp, e))?;
        self.state = State::Opened;
        debug!(path = %self.temp.display(), transacted = self.options.transacted, "opened for write");
        Ok(writer)
    }

    /// Promotes the written content to the base path.
    ///
    /// The writer returned by [`open_write`](Self::open_write) must be
    /// flushed and dropped before committing.
    ///
    /// # Panics
    ///
    /// Panics if [`open_write`](Self::open_write) was never called.
    pub fn commit(self) -> Result<(), CoreError> {
        assert_eq!(self.state, State::Opened, "commit called before open_write");

        if !self.options.transacted {
            if self.made_unhidden {
                self.connector
                    .hide(&self.temp)
                    .map_err(|e| CoreError::io(&self.temp, e))?;
            }
            return Ok(());
        }

        let base = &self.base;
        let io = |e: std::io::Error| CoreError::io(base, e);

        let made_unhidden = self.connector.unhide(base).map_err(io)?;

        if self.options.extra_safe && !self.connector.exists(&self.temp) {
            return Err(CoreError::SaveVerificationFailed(self.temp.clone()));
        }

        if self.connector.exists(base) {
            self.connector.delete(base).map_err(io)?;
        }

        self.connector
            .rename(&self.temp, base)
            .map_err(|e| CoreError::io(&self.temp, e))?;

        if made_unhidden {
            self.connector.hide(base).map_err(io)?;
        }

        info!(path = %base.display(), "committed transaction");
        Ok(())
    }
}

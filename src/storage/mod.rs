//! Storage backend for vault files.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub mod local;
#[cfg(test)]
pub(crate) mod memory;
pub mod transaction;

pub use local::FsConnector;
pub use transaction::{TEMP_SUFFIX, TransactionalWriter, WriteOptions, temp_path};

/// The narrow storage surface the transactional writer depends on.
pub trait StorageConnector {
    type Writer: Write;

    fn exists(&self, path: &Path) -> bool;

    fn delete(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Opens `path` for writing, creating or truncating it.
    fn open_write(&self, path: &Path) -> io::Result<Self::Writer>;

    /// Clears the hidden attribute. Returns whether the file was hidden.
    fn unhide(&self, path: &Path) -> io::Result<bool>;

    fn hide(&self, path: &Path) -> io::Result<()>;
}

/// A vault file on the local filesystem.
///
/// `Storage` reads whole files and saves them through a
/// [`TransactionalWriter`], so a crash during save leaves either the old
/// file or the new one, never a partial write.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
    options: WriteOptions,
}

impl Storage {
    /// Creates a new Storage instance with the given path.
    pub fn new(path: PathBuf) -> Self {
        Self::with_options(path, WriteOptions::default())
    }

    pub fn with_options(path: PathBuf, options: WriteOptions) -> Self {
        Self { path, options }
    }

    /// Returns `true` if the storage file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the entire storage file into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    pub fn load(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).with_context(|| format!("failed to read {}", self.path.display()))
    }

    /// Saves data to the storage file.
    ///
    /// The data is written and synced to the staging file, committed over the
    /// target, and the parent directory is synced so the rename is persisted.
    /// Creates parent directories if they don't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the write or commit fails.
    pub fn save(&self, data: &[u8]) -> Result<()> {
        self.save_with(|file| file.write_all(data))
    }

    /// Like [`save`](Self::save), but lets `fill` stream the content into
    /// the open file.
    pub fn save_with(&self, fill: impl FnOnce(&mut File) -> io::Result<()>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut tx = TransactionalWriter::new(FsConnector, self.path.clone(), self.options);
        let mut file = tx.open_write()?;
        fill(&mut file).context("failed to write vault data")?;
        file.sync_all()?;
        drop(file);

        tx.commit()?;

        #[cfg(unix)]
        if let Some(parent) = self.path.parent() {
            let dir = File::open(parent)?;
            dir.sync_all()?;
        }

        Ok(())
    }

    /// Returns the path to the storage file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub fn options(&self) -> WriteOptions {
        self.options
    }
}

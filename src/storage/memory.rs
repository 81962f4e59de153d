//! In-memory connector with fault injection, for tests.

use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use super::StorageConnector;

#[derive(Default)]
struct Inner {
    files: HashMap<PathBuf, Vec<u8>>,
    hidden: HashSet<PathBuf>,
    lose_writes: bool,
    fail_deletes: bool,
}

#[derive(Clone, Default)]
pub(crate) struct MemoryConnector {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryConnector {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn put(&self, path: &Path, data: &[u8]) {
        self.lock().files.insert(path.to_path_buf(), data.to_vec());
    }

    pub fn get(&self, path: &Path) -> Option<Vec<u8>> {
        self.lock().files.get(path).cloned()
    }

    pub fn set_hidden(&self, path: &Path, hidden: bool) {
        let mut inner = self.lock();
        if hidden {
            inner.hidden.insert(path.to_path_buf());
        } else {
            inner.hidden.remove(path);
        }
    }

    pub fn is_hidden(&self, path: &Path) -> bool {
        self.lock().hidden.contains(path)
    }

    /// Writers accept bytes but nothing ever reaches storage.
    pub fn lose_writes(&self, on: bool) {
        self.lock().lose_writes = on;
    }

    pub fn fail_deletes(&self, on: bool) {
        self.lock().fail_deletes = on;
    }
}

pub(crate) struct MemoryWriter {
    target: Option<(MemoryConnector, PathBuf)>,
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Some((conn, path)) = &self.target {
            conn.lock()
                .files
                .entry(path.clone())
                .or_default()
                .extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, path.display().to_string())
}

impl StorageConnector for MemoryConnector {
    type Writer = MemoryWriter;

    fn exists(&self, path: &Path) -> bool {
        self.lock().files.contains_key(path)
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        if inner.fail_deletes {
            return Err(io::Error::other("delete refused"));
        }
        inner.hidden.remove(path);
        inner.files.remove(path).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        let data = inner.files.remove(from).ok_or_else(|| not_found(from))?;
        inner.files.insert(to.to_path_buf(), data);
        if inner.hidden.remove(from) {
            inner.hidden.insert(to.to_path_buf());
        }
        Ok(())
    }

    fn open_write(&self, path: &Path) -> io::Result<MemoryWriter> {
        let mut inner = self.lock();
        if inner.lose_writes {
            return Ok(MemoryWriter { target: None });
        }
        inner.files.insert(path.to_path_buf(), Vec::new());
        Ok(MemoryWriter {
            target: Some((self.clone(), path.to_path_buf())),
        })
    }

    fn unhide(&self, path: &Path) -> io::Result<bool> {
        Ok(self.lock().hidden.remove(path))
    }

    fn hide(&self, path: &Path) -> io::Result<()> {
        let mut inner = self.lock();
        if !inner.files.contains_key(path) {
            return Err(not_found(path));
        }
        inner.hidden.insert(path.to_path_buf());
        Ok(())
    }
}

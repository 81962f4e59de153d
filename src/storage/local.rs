//! Local filesystem connector.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::Path;

use super::StorageConnector;

#[derive(Debug, Clone, Copy, Default)]
pub struct FsConnector;

impl StorageConnector for FsConnector {
    type Writer = File;

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn delete(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn open_write(&self, path: &Path) -> io::Result<File> {
        OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
    }

    fn unhide(&self, path: &Path) -> io::Result<bool> {
        hidden::unhide(path)
    }

    fn hide(&self, path: &Path) -> io::Result<()> {
        hidden::hide(path)
    }
}

#[cfg(target_os = "windows")]
mod hidden {
    use std::ffi::OsStr;
    use std::io;
    use std::os::windows::ffi::OsStrExt;
    use std::path::Path;

    use windows_sys::Win32::Storage::FileSystem::{
        FILE_ATTRIBUTE_HIDDEN, GetFileAttributesW, INVALID_FILE_ATTRIBUTES, SetFileAttributesW,
    };

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    fn attributes(wide: &[u16]) -> Option<u32> {
        // SAFETY: `wide` is a valid, null-terminated UTF-16 string that
        // outlives the call.
        let attrs = unsafe { GetFileAttributesW(wide.as_ptr()) };
        (attrs != INVALID_FILE_ATTRIBUTES).then_some(attrs)
    }

    fn set_attributes(wide: &[u16], attrs: u32) -> io::Result<()> {
        // SAFETY: as above; Windows does not retain the pointer.
        if unsafe { SetFileAttributesW(wide.as_ptr(), attrs) } == 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    pub(super) fn unhide(path: &Path) -> io::Result<bool> {
        let wide = to_wide(path.as_os_str());
        match attributes(&wide) {
            Some(attrs) if attrs & FILE_ATTRIBUTE_HIDDEN != 0 => {
                set_attributes(&wide, attrs & !FILE_ATTRIBUTE_HIDDEN)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    pub(super) fn hide(path: &Path) -> io::Result<()> {
        let wide = to_wide(path.as_os_str());
        match attributes(&wide) {
            Some(attrs) => set_attributes(&wide, attrs | FILE_ATTRIBUTE_HIDDEN),
            None => Err(io::Error::last_os_error()),
        }
    }
}

/// No hidden attribute outside Windows.
#[cfg(not(target_os = "windows"))]
mod hidden {
    use std::io;
    use std::path::Path;

    pub(super) fn unhide(_path: &Path) -> io::Result<bool> {
        Ok(false)
    }

    pub(super) fn hide(_path: &Path) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn open_write_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"longer old content").unwrap();

        let mut f = FsConnector.open_write(&path).unwrap();
        f.write_all(b"new").unwrap();
        drop(f);

        assert_eq!(fs::read(&path).unwrap(), b"new");
    }

    #[test]
    fn delete_missing_file_fails() {
        let dir = tempdir().unwrap();
        assert!(FsConnector.delete(&dir.path().join("missing")).is_err());
    }

    #[test]
    fn unhide_missing_file_reports_not_hidden() {
        let dir = tempdir().unwrap();
        assert!(!FsConnector.unhide(&dir.path().join("missing")).unwrap());
    }

    #[cfg(target_os = "windows")]
    #[test]
    fn hide_and_unhide_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("f");
        fs::write(&path, b"x").unwrap();

        FsConnector.hide(&path).unwrap();
        assert!(FsConnector.unhide(&path).unwrap());
        assert!(!FsConnector.unhide(&path).unwrap());
    }
}

//! Synchronous I/O backend using `std::fs`.
//!
//! This is the default backend. Positional transfers use `pread`/`pwrite`
//! on Unix and `seek_read`/`seek_write` elsewhere, and the advisory lock
//! is the OS file lock (`flock` on Linux).

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::IoError;
use crate::backend::{FileHandle, IoBackend, OpenFlags};

/// Synchronous I/O backend using `std::fs::File`.
#[derive(Debug)]
pub struct SyncBackend {
    /// Counter for generating unique file handle IDs.
    next_handle_id: AtomicU64,
}

impl SyncBackend {
    /// Creates a new synchronous I/O backend.
    pub fn new() -> Self {
        Self {
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Returns the next unique handle ID.
    fn next_id(&self) -> u64 {
        self.next_handle_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for SyncBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl IoBackend for SyncBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        let mut opts = OpenOptions::new();

        if flags.read {
            opts.read(true);
        }
        if flags.write {
            opts.write(true);
        }
        if flags.create {
            opts.create(true);
        }

        let file = opts.open(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                IoError::NotFound {
                    path: path.to_path_buf(),
                }
            } else {
                IoError::from(source)
            }
        })?;
        let id = self.next_id();
        tracing::trace!(path = %path.display(), handle = id, "opened device file");
        Ok(FileHandle::from_file(id, file))
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let n = handle.file()?.read_at(buf, offset)?;
            Ok(n)
        }

        #[cfg(not(unix))]
        {
            use std::os::windows::fs::FileExt;
            let n = handle.file()?.seek_read(buf, offset)?;
            Ok(n)
        }
    }

    fn write_at(&self, handle: &mut FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::FileExt;
            let n = handle.file()?.write_at(buf, offset)?;
            Ok(n)
        }

        #[cfg(not(unix))]
        {
            use std::os::windows::fs::FileExt;
            let n = handle.file()?.seek_write(buf, offset)?;
            Ok(n)
        }
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        handle.file()?.sync_all()?;
        Ok(())
    }

    fn lock_exclusive(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        loop {
            match handle.file()?.lock() {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        handle.locked = true;
        Ok(())
    }

    fn unlock(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        loop {
            match handle.file()?.unlock() {
                Ok(()) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        handle.locked = false;
        Ok(())
    }

    fn close(&self, mut handle: FileHandle) -> Result<(), IoError> {
        // Dropping the file closes the descriptor (and drops any lock still held)
        handle.file = None;
        handle.locked = false;
        Ok(())
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        let metadata = handle.file()?.metadata()?;
        Ok(metadata.len())
    }
}

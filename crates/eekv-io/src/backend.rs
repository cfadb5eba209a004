//! I/O backend trait.
//!
//! The [`IoBackend`] trait abstracts the handful of file operations the
//! replica engine needs:
//! - positional reads and writes (no shared seek cursor)
//! - `fsync` after every written chunk
//! - an exclusive advisory lock held for the lifetime of an open handle
//!
//! Keeping these behind a trait lets the storage engine be exercised with
//! fault-injecting backends (short transfers, stalled devices) without
//! touching real hardware.

use std::path::Path;

use crate::IoError;

/// Flags for opening device files.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFlags {
    /// Open for reading.
    pub read: bool,
    /// Open for writing.
    pub write: bool,
    /// Create the file if it doesn't exist.
    pub create: bool,
}

impl OpenFlags {
    /// Flags for reading an existing device.
    pub fn read_only() -> Self {
        Self {
            read: true,
            ..Self::default()
        }
    }

    /// Flags for reading and writing an existing device.
    ///
    /// Devices are never created implicitly: a missing EEPROM node is an error.
    pub fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            ..Self::default()
        }
    }

    /// Flags for reading and writing, creating the file if missing.
    pub fn read_write_create() -> Self {
        Self {
            read: true,
            write: true,
            create: true,
        }
    }
}

/// Opaque handle to an open device file.
///
/// The handle is backend-specific. For `SyncBackend`, it wraps a `std::fs::File`.
/// The handle must be closed via [`IoBackend::close`]; dropping it closes the
/// descriptor as well, which also releases any advisory lock.
#[derive(Debug)]
pub struct FileHandle {
    /// Internal identifier, unique per backend.
    pub(crate) id: u64,
    /// The open file (for sync backend).
    pub(crate) file: Option<std::fs::File>,
    /// Whether an exclusive advisory lock is currently held.
    pub(crate) locked: bool,
}

impl FileHandle {
    /// Creates a new file handle wrapping a `std::fs::File`.
    pub(crate) fn from_file(id: u64, file: std::fs::File) -> Self {
        Self {
            id,
            file: Some(file),
            locked: false,
        }
    }

    /// Returns the handle identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns true while the handle holds the exclusive advisory lock.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Returns the internal file reference.
    pub(crate) fn file(&self) -> Result<&std::fs::File, IoError> {
        self.file
            .as_ref()
            .ok_or(IoError::InvalidHandle { handle: self.id })
    }
}

/// Abstraction over device file operations.
///
/// All methods are synchronous and may transfer fewer bytes than requested;
/// callers that need exact transfers loop on the returned counts.
pub trait IoBackend: Send + Sync + std::fmt::Debug {
    /// Opens a device file with the given flags.
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError>;

    /// Reads data at the given byte offset.
    ///
    /// Returns the number of bytes read, which may be short (0 at end of file).
    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError>;

    /// Writes data at the given byte offset.
    ///
    /// Returns the number of bytes written, which may be short.
    fn write_at(&self, handle: &mut FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError>;

    /// Syncs file data and metadata to the device.
    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError>;

    /// Takes an exclusive advisory lock, blocking until it is available.
    fn lock_exclusive(&self, handle: &mut FileHandle) -> Result<(), IoError>;

    /// Releases the advisory lock taken by [`IoBackend::lock_exclusive`].
    fn unlock(&self, handle: &mut FileHandle) -> Result<(), IoError>;

    /// Closes a file handle.
    fn close(&self, handle: FileHandle) -> Result<(), IoError>;

    /// Returns the file size in bytes.
    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError>;
}

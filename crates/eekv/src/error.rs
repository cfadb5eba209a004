//! Error types for the replica engine and key-value facade.

use std::path::PathBuf;

use eekv_io::IoError;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Which part of the error taxonomy an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Open, lock, read or write failed in the storage layer. Fatal to the operation.
    System,
    /// On-device metadata disagrees with expectations. Recovered by skipping or repair.
    Protocol,
    /// The payload does not fit the smallest replica.
    Capacity,
    /// Caller-visible logical errors (missing key, wrong type, not initialized).
    Logical,
}

/// Errors surfaced by the store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend failure on a specific device.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: IoError,
    },

    /// The device has no open handle.
    #[error("device {path} is not open")]
    DeviceClosed { path: PathBuf },

    /// A transfer kept coming up short until the retry ceiling.
    #[error(
        "attempted {attempts} times to {direction} {requested} bytes on {path} but only \
         transferred {transferred}"
    )]
    IncompleteTransfer {
        path: PathBuf,
        direction: &'static str,
        attempts: u32,
        requested: usize,
        transferred: usize,
    },

    /// The trailer magic is missing: the device has never been written.
    #[error("device {path} is uninitialized (bad magic)")]
    Uninitialized { path: PathBuf },

    /// The magic matched but the checksum or counter field is malformed.
    #[error("corrupt trailer on {path}: {reason}")]
    CorruptTrailer { path: PathBuf, reason: String },

    /// The re-read payload does not hash to the stored checksum.
    #[error("checksum mismatch on {path}: stored {stored}, computed {computed}")]
    ChecksumMismatch {
        path: PathBuf,
        stored: String,
        computed: String,
    },

    /// The write counter cannot be incremented any further.
    #[error("write counter exhausted on {path}")]
    CounterOverflow { path: PathBuf },

    /// No replica at the top write-counter tier passed verification.
    #[error("no replica passed checksum verification")]
    NoGoodReplica,

    /// The serialized document does not fit the smallest replica.
    #[error("payload of {required} bytes exceeds pool capacity of {available} bytes")]
    CapacityExceeded { required: usize, available: usize },

    /// A device specification cannot be used.
    #[error("invalid device {path}: {reason}")]
    InvalidDevice { path: PathBuf, reason: String },

    /// The pool has no usable devices.
    #[error("no usable devices configured")]
    NoDevices,

    /// An operation that needs an elected replica ran before `initialize`.
    #[error("store is not initialized")]
    NotInitialized,

    /// The requested key does not exist in the document.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The key exists but does not hold a string.
    #[error("value for key {0} is not a string")]
    NotAString(String),

    /// The authoritative text did not parse as a JSON object.
    #[error("stored document is not a valid JSON object: {0}")]
    Document(#[from] serde_json::Error),
}

impl StoreError {
    /// Wraps a backend error with the device path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: IoError) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Io { .. } | Self::DeviceClosed { .. } | Self::IncompleteTransfer { .. } => {
                ErrorClass::System
            }
            Self::Uninitialized { .. }
            | Self::CorruptTrailer { .. }
            | Self::ChecksumMismatch { .. }
            | Self::CounterOverflow { .. }
            | Self::NoGoodReplica => ErrorClass::Protocol,
            Self::CapacityExceeded { .. } => ErrorClass::Capacity,
            Self::InvalidDevice { .. }
            | Self::NoDevices
            | Self::NotInitialized
            | Self::KeyNotFound(_)
            | Self::NotAString(_)
            | Self::Document(_) => ErrorClass::Logical,
        }
    }
}

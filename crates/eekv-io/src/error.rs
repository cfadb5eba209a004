//! I/O error types.

use std::path::PathBuf;

/// Errors from the I/O backend.
#[derive(Debug, thiserror::Error)]
pub enum IoError {
    /// Underlying OS I/O error.
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Device file not found.
    #[error("device not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid file handle.
    #[error("invalid file handle: {handle}")]
    InvalidHandle { handle: u64 },
}

impl IoError {
    /// Returns true if the operation was interrupted by a signal and may be retried.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Io { source } if source.kind() == std::io::ErrorKind::Interrupted)
    }
}

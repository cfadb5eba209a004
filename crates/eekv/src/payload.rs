//! Terminator-aware payload buffers.
//!
//! A payload is the document text followed by a NUL terminator and zero
//! padding, sized to the pool's `data_size`. The bytes after the first
//! terminator are never meaningful and are always cleared before they
//! reach a device.

use crate::checksum::Checksum;
use crate::error::{Result, StoreError};

/// Byte that ends the logical payload.
pub const TERMINATOR: u8 = 0;

/// Returns the offset of the first terminator, if any.
pub fn find_terminator(chunk: &[u8]) -> Option<usize> {
    chunk.iter().position(|&b| b == TERMINATOR)
}

/// Zeroes every byte at and after the first terminator.
///
/// Returns the offset of that terminator, or `None` if the chunk has none
/// (in which case it is left untouched).
pub fn clear_after_terminator(chunk: &mut [u8]) -> Option<usize> {
    let pos = find_terminator(chunk)?;
    chunk[pos..].fill(TERMINATOR);
    Some(pos)
}

/// An owned, zero-padded payload buffer.
#[derive(Clone, PartialEq, Eq)]
pub struct Payload {
    buf: Vec<u8>,
}

impl Payload {
    /// Encodes `text` into a buffer of `data_size` bytes.
    ///
    /// The text must leave room for the terminator, so at most
    /// `data_size - 1` bytes are accepted.
    pub fn from_text(text: &[u8], data_size: usize) -> Result<Self> {
        let available = data_size.saturating_sub(1);
        if text.len() > available {
            return Err(StoreError::CapacityExceeded {
                required: text.len(),
                available,
            });
        }
        let mut buf = vec![TERMINATOR; data_size];
        buf[..text.len()].copy_from_slice(text);
        clear_after_terminator(&mut buf);
        Ok(Self { buf })
    }

    /// Wraps a buffer read back from a device.
    pub(crate) fn from_buffer(mut buf: Vec<u8>) -> Self {
        clear_after_terminator(&mut buf);
        Self { buf }
    }

    /// The logical text: everything before the first terminator.
    pub fn text(&self) -> &[u8] {
        let end = find_terminator(&self.buf).unwrap_or(self.buf.len());
        &self.buf[..end]
    }

    /// The full padded buffer as written to devices.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Buffer size (the pool's `data_size`).
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Checksum of the logical text.
    pub fn checksum(&self) -> Checksum {
        Checksum::compute(self.text())
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Payload")
            .field("len", &self.text().len())
            .field("capacity", &self.buf.len())
            .finish()
    }
}

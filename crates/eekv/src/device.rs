//! In-memory model of one physical replica.
//!
//! A [`Device`] is pure state: where the replica lives, its geometry, the
//! open handle (if any), the last trailer fields read from or written to it,
//! and an optional payload buffer used while it is being verified.

use std::path::{Path, PathBuf};

use eekv_io::FileHandle;
use serde::{Deserialize, Serialize};

use crate::checksum::Checksum;
use crate::error::{Result, StoreError};
use crate::transfer::TRAILER_LEN;

/// Maximum length of a device path, in bytes.
pub const MAX_PATH_LEN: usize = 100;

/// One configured device: `(path, block_size, total_size)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSpec {
    /// Path of the device node or backing file.
    pub path: PathBuf,
    /// Block size in bytes.
    pub block_size: usize,
    /// Total device size in bytes.
    pub total_size: usize,
}

impl DeviceSpec {
    /// Creates a device specification.
    pub fn new(path: impl Into<PathBuf>, block_size: usize, total_size: usize) -> Self {
        Self {
            path: path.into(),
            block_size,
            total_size,
        }
    }

    /// Derives and validates the block geometry.
    ///
    /// The block size must hold a full trailer, and there must be at least
    /// one payload block in front of the trailer block.
    pub fn geometry(&self) -> Result<Geometry> {
        let invalid = |reason: String| StoreError::InvalidDevice {
            path: self.path.clone(),
            reason,
        };

        if self.path.as_os_str().len() > MAX_PATH_LEN {
            return Err(invalid(format!("path longer than {MAX_PATH_LEN} bytes")));
        }
        if self.block_size < TRAILER_LEN {
            return Err(invalid(format!(
                "block size {} cannot hold the {TRAILER_LEN}-byte trailer",
                self.block_size
            )));
        }
        let block_count = self.total_size / self.block_size;
        if block_count < 2 {
            return Err(invalid(format!(
                "{} bytes is fewer than two {}-byte blocks",
                self.total_size, self.block_size
            )));
        }
        Ok(Geometry {
            block_size: self.block_size,
            block_count,
        })
    }
}

/// Block layout of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Geometry {
    /// Block size in bytes.
    pub block_size: usize,
    /// Number of whole blocks.
    pub block_count: usize,
}

impl Geometry {
    /// Raw capacity: `block_size * block_count`.
    pub fn capacity(&self) -> usize {
        self.block_size * self.block_count
    }

    /// Number of blocks available to the payload (all but the trailer block).
    pub fn payload_blocks(&self) -> usize {
        self.block_count - 1
    }

    /// Bytes available to the payload, terminator included.
    pub fn payload_capacity(&self) -> usize {
        self.block_size * self.payload_blocks()
    }

    /// Byte offset of the trailer block.
    pub fn trailer_offset(&self) -> u64 {
        self.payload_capacity() as u64
    }
}

/// What is known about a device's trailer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrailerState {
    /// Not read since the pool was built.
    Unloaded,
    /// Magic missing: the device is blank.
    Uninitialized,
    /// Magic present but the fields are malformed.
    Corrupt,
    /// Checksum and write counter were read (or written) successfully.
    Loaded,
}

/// One physical replica.
#[derive(Debug)]
pub struct Device {
    path: PathBuf,
    geometry: Geometry,
    pub(crate) handle: Option<FileHandle>,
    pub(crate) trailer_state: TrailerState,
    /// Stored checksum; `None` when unknown or deliberately invalidated.
    pub(crate) checksum: Option<Checksum>,
    pub(crate) write_counter: u32,
    /// Payload bytes read from the device, kept only while being verified.
    pub(crate) data: Option<Vec<u8>>,
    /// Set when the device failed verification during the current cycle.
    pub(crate) suspect: bool,
}

impl Device {
    /// Builds a closed, unloaded device from a validated specification.
    pub fn new(spec: &DeviceSpec) -> Result<Self> {
        let geometry = spec.geometry()?;
        Ok(Self {
            path: spec.path.clone(),
            geometry,
            handle: None,
            trailer_state: TrailerState::Unloaded,
            checksum: None,
            write_counter: 0,
            data: None,
            suspect: false,
        })
    }

    /// Device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block geometry.
    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// True while a handle is open (and therefore locked).
    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Trailer knowledge for this device.
    pub fn trailer_state(&self) -> TrailerState {
        self.trailer_state
    }

    /// Stored checksum, if known.
    pub fn checksum(&self) -> Option<Checksum> {
        self.checksum
    }

    /// Stored write counter (0 for blank devices).
    pub fn write_counter(&self) -> u32 {
        self.write_counter
    }

    /// True if a payload buffer is currently allocated for this device.
    pub fn has_buffer(&self) -> bool {
        self.data.is_some()
    }

    /// Splits out the path and the open handle for a transfer.
    pub(crate) fn io_parts(&mut self) -> Result<(&Path, &mut FileHandle)> {
        match self.handle.as_mut() {
            Some(handle) => Ok((&self.path, handle)),
            None => Err(StoreError::DeviceClosed {
                path: self.path.clone(),
            }),
        }
    }

    /// Drops the payload buffer.
    pub(crate) fn release_buffer(&mut self) {
        self.data = None;
    }
}

//! Byte-exact device transfers and the on-device codec.
//!
//! # Device Layout
//!
//! ```text
//! [0 .. bs*(count-1))   payload text, block by block, zero-padded after the terminator
//! [bs*(count-1) .. end) trailer block:
//!                       [MAGIC:4B "EEKV"][CHECKSUM:64B lowercase hex][WRITE_COUNTER:10B decimal]
//! ```
//!
//! # Write Ordering
//!
//! A payload write first zeroes and syncs the trailer block, then writes the
//! payload blocks (syncing after every chunk), then writes the new trailer.
//! A crash at any point leaves either the old trailer over the old payload or
//! no trailer at all, never a valid trailer over a half-written payload.

use eekv_io::IoBackend;

use crate::checksum::{CHECKSUM_HEX_LEN, Checksum};
use crate::device::{Device, TrailerState};
use crate::error::{Result, StoreError};
use crate::payload::{Payload, TERMINATOR, clear_after_terminator};

/// Tag identifying an initialized device.
pub const MAGIC: &[u8; 4] = b"EEKV";

/// Width of the zero-padded decimal write counter.
pub const WRITE_COUNTER_LEN: usize = 10;

/// Total trailer size: magic + checksum + write counter.
pub const TRAILER_LEN: usize = MAGIC.len() + CHECKSUM_HEX_LEN + WRITE_COUNTER_LEN;

/// Default ceiling on attempts for a single exact transfer.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 100;

/// Metadata stored in a device's last block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    /// Checksum of the payload text.
    pub checksum: Checksum,
    /// Incremented on every content change.
    pub write_counter: u32,
}

/// Why a trailer could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrailerFault {
    /// Magic missing: the device is blank.
    BadMagic,
    /// Magic present, fields unreadable.
    Malformed(String),
}

impl Trailer {
    /// Encodes the trailer into its fixed on-device form.
    pub fn encode(&self) -> [u8; TRAILER_LEN] {
        let mut out = [0u8; TRAILER_LEN];
        let (magic, rest) = out.split_at_mut(MAGIC.len());
        let (checksum, counter) = rest.split_at_mut(CHECKSUM_HEX_LEN);
        magic.copy_from_slice(MAGIC);
        checksum.copy_from_slice(self.checksum.to_hex().as_bytes());
        counter.copy_from_slice(format!("{:010}", self.write_counter).as_bytes());
        out
    }

    /// Decodes the checksum and counter fields that follow the magic.
    pub fn decode_fields(fields: &[u8]) -> std::result::Result<Self, TrailerFault> {
        if fields.len() != CHECKSUM_HEX_LEN + WRITE_COUNTER_LEN {
            return Err(TrailerFault::Malformed(format!(
                "expected {} field bytes, got {}",
                CHECKSUM_HEX_LEN + WRITE_COUNTER_LEN,
                fields.len()
            )));
        }
        let (checksum, counter) = fields.split_at(CHECKSUM_HEX_LEN);

        let checksum = Checksum::from_hex(checksum)
            .ok_or_else(|| TrailerFault::Malformed("checksum field is not hex".to_string()))?;

        if !counter.iter().all(u8::is_ascii_digit) {
            return Err(TrailerFault::Malformed(
                "write counter is not decimal".to_string(),
            ));
        }
        // Ten ASCII digits always parse as u64; only the range can fail
        let write_counter = std::str::from_utf8(counter)
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .ok_or_else(|| TrailerFault::Malformed("write counter out of range".to_string()))?;

        Ok(Self {
            checksum,
            write_counter,
        })
    }

    /// Decodes a full trailer, magic included.
    pub fn decode(bytes: &[u8]) -> std::result::Result<Self, TrailerFault> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(TrailerFault::BadMagic);
        }
        Self::decode_fields(&bytes[MAGIC.len()..])
    }
}

/// Direction of an exact transfer, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    fn as_str(self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
        }
    }
}

/// Transfer protocol bound to a backend and a retry ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Transfer<'a> {
    backend: &'a dyn IoBackend,
    max_attempts: u32,
}

impl<'a> Transfer<'a> {
    /// Creates a transfer context.
    pub fn new(backend: &'a dyn IoBackend, max_attempts: u32) -> Self {
        Self {
            backend,
            max_attempts: max_attempts.max(1),
        }
    }

    fn incomplete(
        &self,
        device: &Device,
        direction: Direction,
        requested: usize,
        transferred: usize,
    ) -> StoreError {
        tracing::error!(
            path = %device.path().display(),
            direction = direction.as_str(),
            requested,
            transferred,
            attempts = self.max_attempts,
            "transfer retries exhausted"
        );
        StoreError::IncompleteTransfer {
            path: device.path().to_path_buf(),
            direction: direction.as_str(),
            attempts: self.max_attempts,
            requested,
            transferred,
        }
    }

    /// Reads exactly `buf.len()` bytes at `offset`, retrying short reads.
    pub fn read_exact(&self, device: &mut Device, offset: u64, buf: &mut [u8]) -> Result<()> {
        let mut done = 0;
        let mut attempts = 0;
        while done < buf.len() {
            if attempts == self.max_attempts {
                return Err(self.incomplete(device, Direction::Read, buf.len(), done));
            }
            attempts += 1;

            let (path, handle) = device.io_parts()?;
            match self.backend.read_at(handle, offset + done as u64, &mut buf[done..]) {
                Ok(n) => done += n,
                Err(e) if e.is_interrupted() => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(())
    }

    /// Writes exactly `buf.len()` bytes at `offset`, syncing after every
    /// chunk that lands and retrying short writes.
    pub fn write_synced(&self, device: &mut Device, offset: u64, buf: &[u8]) -> Result<()> {
        let mut done = 0;
        let mut attempts = 0;
        while done < buf.len() {
            if attempts == self.max_attempts {
                return Err(self.incomplete(device, Direction::Write, buf.len(), done));
            }
            attempts += 1;

            let (path, handle) = device.io_parts()?;
            match self.backend.write_at(handle, offset + done as u64, &buf[done..]) {
                Ok(0) => {}
                Ok(n) => {
                    done += n;
                    self.backend
                        .fsync(handle)
                        .map_err(|e| StoreError::io(path, e))?;
                }
                Err(e) if e.is_interrupted() => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }
        Ok(())
    }

    /// Reads the trailer and records the result on the device.
    ///
    /// Blank devices yield [`StoreError::Uninitialized`] and malformed
    /// trailers [`StoreError::CorruptTrailer`]; in both cases the device's
    /// checksum is cleared and its counter reset to zero.
    pub fn read_trailer(&self, device: &mut Device) -> Result<Trailer> {
        let offset = device.geometry().trailer_offset();

        let mut magic = [0u8; MAGIC.len()];
        self.read_exact(device, offset, &mut magic)?;

        let decoded = if &magic == MAGIC {
            let mut fields = [0u8; CHECKSUM_HEX_LEN + WRITE_COUNTER_LEN];
            self.read_exact(device, offset + MAGIC.len() as u64, &mut fields)?;
            Trailer::decode_fields(&fields)
        } else {
            Err(TrailerFault::BadMagic)
        };

        match decoded {
            Ok(trailer) => {
                device.trailer_state = TrailerState::Loaded;
                device.checksum = Some(trailer.checksum);
                device.write_counter = trailer.write_counter;
                Ok(trailer)
            }
            Err(fault) => {
                device.checksum = None;
                device.write_counter = 0;
                match fault {
                    TrailerFault::BadMagic => {
                        device.trailer_state = TrailerState::Uninitialized;
                        Err(StoreError::Uninitialized {
                            path: device.path().to_path_buf(),
                        })
                    }
                    TrailerFault::Malformed(reason) => {
                        device.trailer_state = TrailerState::Corrupt;
                        Err(StoreError::CorruptTrailer {
                            path: device.path().to_path_buf(),
                            reason,
                        })
                    }
                }
            }
        }
    }

    /// Writes the trailer block and records it on the device.
    pub fn write_trailer(&self, device: &mut Device, trailer: &Trailer) -> Result<()> {
        let offset = device.geometry().trailer_offset();
        self.write_synced(device, offset, &trailer.encode())?;
        device.trailer_state = TrailerState::Loaded;
        device.checksum = Some(trailer.checksum);
        device.write_counter = trailer.write_counter;
        Ok(())
    }

    /// Zeroes the trailer block so the device reads as blank.
    pub fn clear_trailer(&self, device: &mut Device) -> Result<()> {
        let geometry = device.geometry();
        let zeros = vec![0u8; geometry.block_size];
        self.write_synced(device, geometry.trailer_offset(), &zeros)
    }

    /// Zeroes every payload block.
    pub fn zero_payload(&self, device: &mut Device) -> Result<()> {
        let geometry = device.geometry();
        let zeros = vec![0u8; geometry.block_size];
        for block in 0..geometry.payload_blocks() {
            self.write_synced(device, (block * geometry.block_size) as u64, &zeros)?;
        }
        Ok(())
    }

    /// Loads the payload into the device's buffer.
    ///
    /// Blocks are read one at a time until the block holding the terminator
    /// or until `data_size` bytes have been collected. Returns the logical
    /// payload length.
    pub fn read_payload(&self, device: &mut Device, data_size: usize) -> Result<usize> {
        let geometry = device.geometry();
        let bs = geometry.block_size;

        let mut data = device.data.take().unwrap_or_default();
        data.clear();
        data.resize(data_size, TERMINATOR);

        let mut chunk = vec![0u8; bs];
        let mut length = data_size;
        for block in 0..geometry.payload_blocks() {
            let start = block * bs;
            if start >= data_size {
                break;
            }
            if let Err(e) = self.read_exact(device, start as u64, &mut chunk) {
                device.data = None;
                return Err(e);
            }

            let terminator = clear_after_terminator(&mut chunk);
            let take = bs.min(data_size - start);
            data[start..start + take].copy_from_slice(&chunk[..take]);

            if let Some(pos) = terminator.filter(|&pos| pos < take) {
                length = start + pos;
                break;
            }
        }

        tracing::trace!(path = %device.path().display(), length, "payload read");
        device.data = Some(data);
        Ok(length)
    }

    /// Persists `payload` followed by `trailer`.
    ///
    /// Returns the logical length written. With `zero_fill`, every payload
    /// block is cleared before the new content goes down.
    pub fn write_payload(
        &self,
        device: &mut Device,
        payload: &Payload,
        trailer: &Trailer,
        zero_fill: bool,
    ) -> Result<usize> {
        let geometry = device.geometry();
        let bs = geometry.block_size;
        let source = payload.as_bytes();

        self.clear_trailer(device)?;
        if zero_fill {
            self.zero_payload(device)?;
        }

        let mut chunk = vec![0u8; bs];
        let mut length = geometry.payload_capacity();
        for block in 0..geometry.payload_blocks() {
            let start = block * bs;
            chunk.fill(TERMINATOR);
            if start < source.len() {
                let take = bs.min(source.len() - start);
                chunk[..take].copy_from_slice(&source[start..start + take]);
            }

            let terminator = clear_after_terminator(&mut chunk);
            self.write_synced(device, start as u64, &chunk)?;

            if let Some(pos) = terminator {
                length = start + pos;
                break;
            }
        }

        self.write_trailer(device, trailer)?;
        tracing::debug!(
            path = %device.path().display(),
            length,
            write_counter = trailer.write_counter,
            "payload written"
        );
        Ok(length)
    }
}

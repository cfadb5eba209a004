//! Write and verify primitives for a single replica.

use crate::checksum::Checksum;
use crate::device::Device;
use crate::error::{Result, StoreError};
use crate::payload::{Payload, find_terminator};
use crate::transfer::{Trailer, Transfer};

/// Writes `payload` to `device` unless it already holds it.
///
/// When the payload's checksum equals the device's stored checksum nothing
/// is transferred and `Ok(0)` is returned. Otherwise the write counter is
/// incremented, payload and trailer are persisted, and the logical length
/// written is returned. The device's trailer fields change only once the
/// write has fully landed.
pub fn write_device(
    transfer: &Transfer<'_>,
    device: &mut Device,
    payload: &Payload,
    zero_fill: bool,
) -> Result<usize> {
    let checksum = payload.checksum();
    if device.checksum == Some(checksum) {
        tracing::trace!(path = %device.path().display(), "content unchanged, skipping write");
        return Ok(0);
    }

    let write_counter = device
        .write_counter
        .checked_add(1)
        .ok_or_else(|| StoreError::CounterOverflow {
            path: device.path().to_path_buf(),
        })?;
    write_device_at(transfer, device, payload, write_counter, zero_fill)
}

/// Writes `payload` to `device` unconditionally, stamping `write_counter`.
///
/// Used where the resulting counter is dictated by the pool rather than by
/// the device: repair lands a device exactly on the authority's counter and
/// clear lands every device on one shared counter.
pub fn write_device_at(
    transfer: &Transfer<'_>,
    device: &mut Device,
    payload: &Payload,
    write_counter: u32,
    zero_fill: bool,
) -> Result<usize> {
    let trailer = Trailer {
        checksum: payload.checksum(),
        write_counter,
    };
    transfer.write_payload(device, payload, &trailer, zero_fill)
}

/// Re-reads `device`'s payload and checks it against the stored checksum.
///
/// On success the re-read buffer stays on the device for the caller to
/// claim. On mismatch the buffer is discarded, the device is marked
/// suspect, and [`StoreError::ChecksumMismatch`] is returned.
pub fn verify_device(transfer: &Transfer<'_>, device: &mut Device, data_size: usize) -> Result<()> {
    transfer.read_payload(device, data_size)?;

    let computed = device.data.as_deref().map(|data| {
        let end = find_terminator(data).unwrap_or(data.len());
        Checksum::compute(&data[..end])
    });

    if computed.is_some() && computed == device.checksum {
        return Ok(());
    }

    device.release_buffer();
    device.suspect = true;
    Err(StoreError::ChecksumMismatch {
        path: device.path().to_path_buf(),
        stored: device
            .checksum
            .map_or_else(|| "none".to_string(), |c| c.to_hex()),
        computed: computed.map_or_else(|| "none".to_string(), |c| c.to_hex()),
    })
}

/// Takes the verified buffer off a device as a [`Payload`].
pub(crate) fn take_payload(device: &mut Device) -> Option<Payload> {
    device.data.take().map(Payload::from_buffer)
}

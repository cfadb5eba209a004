//! The ordered set of replicas and their shared lifecycle.
//!
//! A [`DevicePool`] is built once from configuration and never changes
//! membership. It opens and locks every device as one unit for the duration
//! of an operation, and tracks which device (if any) is authoritative along
//! with the single payload buffer that is kept in memory.

use std::sync::Arc;

use eekv_io::{IoBackend, OpenFlags};

use crate::device::{Device, DeviceSpec, Geometry, TrailerState};
use crate::error::{Result, StoreError};
use crate::payload::Payload;
use crate::replica;
use crate::transfer::{DEFAULT_MAX_ATTEMPTS, Transfer};

/// The elected replica and the one payload copy kept in memory.
#[derive(Debug, Clone)]
pub struct Authority {
    /// Index of the authoritative device in pool order.
    pub index: usize,
    /// Write counter the authoritative content was elected or written at.
    pub write_counter: u32,
    /// Its verified payload.
    pub payload: Payload,
}

/// Ordered, fixed-membership collection of replicas.
#[derive(Debug)]
pub struct DevicePool {
    devices: Vec<Device>,
    backend: Arc<dyn IoBackend>,
    max_attempts: u32,
    /// Minimum payload capacity across all devices.
    data_size: usize,
    /// True when not every device shares the first device's geometry.
    mixed_geometry: bool,
    pub(crate) authority: Option<Authority>,
}

/// Disjoint borrows of a pool, so devices can be mutated while the
/// transfer context and the authoritative payload are in use.
pub(crate) struct PoolParts<'a> {
    pub transfer: Transfer<'a>,
    pub devices: &'a mut [Device],
    pub authority: Option<&'a Authority>,
    pub data_size: usize,
}

impl DevicePool {
    /// Builds a pool from device specifications, in order.
    ///
    /// Specifications that cannot hold a trailer are rejected and skipped.
    /// Devices whose geometry differs from the first one are kept, with a
    /// warning; the pool's `data_size` is bounded by the smallest of them.
    pub fn new(specs: &[DeviceSpec], backend: Arc<dyn IoBackend>) -> Result<Self> {
        let mut devices = Vec::with_capacity(specs.len());
        let mut expected: Option<Geometry> = None;
        let mut mixed_geometry = false;

        for spec in specs {
            let device = match Device::new(spec) {
                Ok(device) => device,
                Err(e) => {
                    tracing::error!(error = %e, "rejecting device, skipping");
                    continue;
                }
            };

            let geometry = device.geometry();
            match expected {
                None => expected = Some(geometry),
                Some(first) if first != geometry => {
                    tracing::warn!(
                        path = %spec.path.display(),
                        block_size = geometry.block_size,
                        block_count = geometry.block_count,
                        expected_block_size = first.block_size,
                        expected_block_count = first.block_count,
                        "device geometry differs from the rest of the pool"
                    );
                    mixed_geometry = true;
                }
                Some(_) => {}
            }
            devices.push(device);
        }

        let data_size = devices
            .iter()
            .map(|d| d.geometry().payload_capacity())
            .min()
            .ok_or(StoreError::NoDevices)?;

        tracing::debug!(devices = devices.len(), data_size, "device pool built");
        Ok(Self {
            devices,
            backend,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            data_size,
            mixed_geometry,
            authority: None,
        })
    }

    /// Sets the retry ceiling for exact transfers.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Devices in pool order.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// Always false: a pool cannot be built without devices.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Usable payload size shared by every replica, terminator included.
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    /// True when the devices do not all share one geometry.
    pub fn has_mixed_geometry(&self) -> bool {
        self.mixed_geometry
    }

    /// The elected replica, if any.
    pub fn authority(&self) -> Option<&Authority> {
        self.authority.as_ref()
    }

    /// Retry ceiling for exact transfers.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub(crate) fn parts(&mut self) -> PoolParts<'_> {
        PoolParts {
            transfer: Transfer::new(self.backend.as_ref(), self.max_attempts),
            devices: &mut self.devices,
            authority: self.authority.as_ref(),
            data_size: self.data_size,
        }
    }

    /// Opens and exclusively locks every device.
    ///
    /// If any device fails, the devices already opened are closed again and
    /// the first error is returned: no operation ever runs on part of a pool.
    pub fn open_all(&mut self) -> Result<()> {
        for i in 0..self.devices.len() {
            if let Err(e) = self.open_one(i) {
                tracing::error!(
                    path = %self.devices[i].path().display(),
                    error = %e,
                    "failed to open device"
                );
                if let Err(close_err) = self.close_all() {
                    tracing::warn!(error = %close_err, "cleanup after failed open also failed");
                }
                return Err(e);
            }
        }
        Ok(())
    }

    fn open_one(&mut self, index: usize) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let device = &mut self.devices[index];
        if device.handle.is_some() {
            return Ok(());
        }
        let path = device.path().to_path_buf();

        let mut handle = backend
            .open(&path, OpenFlags::read_write())
            .map_err(|e| StoreError::io(&path, e))?;
        if let Err(e) = backend.lock_exclusive(&mut handle) {
            let _ = backend.close(handle);
            return Err(StoreError::io(&path, e));
        }

        match backend.file_size(&handle) {
            Ok(size) if size < device.geometry().capacity() as u64 => {
                tracing::warn!(
                    path = %path.display(),
                    size,
                    configured = device.geometry().capacity(),
                    "device is smaller than its configured size"
                );
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(path = %path.display(), error = %e, "could not stat device"),
        }

        device.handle = Some(handle);
        Ok(())
    }

    /// Unlocks and closes every open device.
    ///
    /// Keeps going after a failure so that no handle is left behind, and
    /// returns the first error seen.
    pub fn close_all(&mut self) -> Result<()> {
        let backend = Arc::clone(&self.backend);
        let mut first_error = None;

        for device in &mut self.devices {
            let Some(mut handle) = device.handle.take() else {
                continue;
            };
            let path = device.path();

            if handle.is_locked() {
                if let Err(e) = backend.unlock(&mut handle) {
                    tracing::warn!(path = %path.display(), error = %e, "failed to release device lock");
                    first_error.get_or_insert(StoreError::io(path, e));
                }
            }
            if let Err(e) = backend.close(handle) {
                tracing::warn!(path = %path.display(), error = %e, "failed to close device");
                first_error.get_or_insert(StoreError::io(path, e));
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    /// Runs `f` with the whole pool open and locked.
    ///
    /// The pool is closed on every exit path. An error from `f` takes
    /// precedence over an error from closing.
    pub fn with_open<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.open_all()?;
        let result = f(self);
        let closed = self.close_all();
        match (result, closed) {
            (Err(e), _) | (Ok(_), Err(e)) => Err(e),
            (Ok(value), Ok(())) => Ok(value),
        }
    }

    /// Reads every device's trailer.
    ///
    /// Blank and malformed trailers are recorded on the device and skipped;
    /// only I/O failures are returned.
    pub fn load_trailers(&mut self) -> Result<()> {
        let parts = self.parts();
        for device in parts.devices.iter_mut() {
            match parts.transfer.read_trailer(device) {
                Ok(_) => {}
                Err(StoreError::Uninitialized { path }) => {
                    tracing::info!(path = %path.display(), "device is uninitialized");
                }
                Err(StoreError::CorruptTrailer { path, reason }) => {
                    tracing::warn!(path = %path.display(), %reason, "device trailer is corrupt");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Writes `payload` to every device, best effort.
    ///
    /// Each device is written through [`replica::write_device`], so devices
    /// already holding this content are skipped. Every device is attempted
    /// even after a failure; the first error is returned once the sweep is
    /// done. The authority moves to the first device that ends up holding
    /// the new payload.
    pub fn write_all(&mut self, payload: Payload, zero_fill: bool) -> Result<usize> {
        self.fan_out(payload, |transfer, device, payload| {
            replica::write_device(transfer, device, payload, zero_fill)
        })
    }

    /// Writes `payload` to every device unconditionally, all stamped with
    /// `write_counter`. Best effort, like [`write_all`](Self::write_all).
    pub fn write_all_at(&mut self, payload: Payload, write_counter: u32) -> Result<usize> {
        self.fan_out(payload, |transfer, device, payload| {
            replica::write_device_at(transfer, device, payload, write_counter, false)
        })
    }

    fn fan_out(
        &mut self,
        payload: Payload,
        mut write: impl FnMut(&Transfer<'_>, &mut Device, &Payload) -> Result<usize>,
    ) -> Result<usize> {
        let current = self.authority.as_ref().map(|a| a.index);
        let parts = self.parts();
        let mut first_error = None;
        let mut written_to = Vec::with_capacity(parts.devices.len());
        let mut length = 0;

        for (index, device) in parts.devices.iter_mut().enumerate() {
            match write(&parts.transfer, device, &payload) {
                Ok(n) => {
                    length = length.max(n);
                    written_to.push(index);
                }
                Err(e) => {
                    tracing::error!(path = %device.path().display(), error = %e, "write failed");
                    first_error.get_or_insert(e);
                }
            }
        }

        let index = match current {
            Some(index) if written_to.contains(&index) => Some(index),
            _ => written_to.first().copied(),
        };
        if let Some(index) = index {
            let write_counter = self.devices[index].write_counter();
            self.authority = Some(Authority {
                index,
                write_counter,
                payload,
            });
        }

        first_error.map_or(Ok(length), Err)
    }

    /// True when an authority exists and, as last seen in memory, every
    /// other device matches its counter and checksum and none is suspect.
    pub fn is_converged(&self) -> bool {
        let Some(authority) = &self.authority else {
            return false;
        };
        let checksum = authority.payload.checksum();
        self.devices.iter().enumerate().all(|(index, device)| {
            index == authority.index
                || (!device.suspect
                    && device.write_counter() == authority.write_counter
                    && device.checksum() == Some(checksum))
        })
    }

    /// Clears per-cycle verification state on every device.
    pub(crate) fn reset_suspects(&mut self) {
        for device in &mut self.devices {
            device.suspect = false;
        }
    }

    /// Drops every payload buffer, including the authoritative copy.
    pub(crate) fn release_all(&mut self) {
        self.authority = None;
        for device in &mut self.devices {
            device.release_buffer();
            device.suspect = false;
            device.trailer_state = TrailerState::Unloaded;
        }
    }
}

impl Drop for DevicePool {
    fn drop(&mut self) {
        if let Err(e) = self.close_all() {
            tracing::warn!(error = %e, "failed to close devices on drop");
        }
    }
}

//! Propagation of the authoritative payload to disagreeing replicas.

use crate::error::{Result, StoreError};
use crate::pool::DevicePool;
use crate::replica;

/// What a repair sweep did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Devices rewritten with the authoritative payload.
    pub repaired: Vec<usize>,
    /// Devices whose repair failed.
    pub failed: Vec<usize>,
}

impl RepairReport {
    /// True when no device needed repair.
    pub fn is_clean(&self) -> bool {
        self.repaired.is_empty() && self.failed.is_empty()
    }
}

/// Clones the authoritative payload onto every device that disagrees.
///
/// A device disagrees when its write counter or checksum differs from the
/// authority's, or when it failed verification this cycle. Each is written
/// unconditionally and stamped with the authority's counter, so afterwards
/// it agrees with the authority on both counter and checksum.
///
/// Every disagreeing device is attempted; the first failure is returned
/// after the sweep completes.
pub fn repair(pool: &mut DevicePool) -> Result<RepairReport> {
    let parts = pool.parts();
    let authority = parts.authority.ok_or(StoreError::NotInitialized)?;
    let target_counter = authority.write_counter;
    let target_checksum = authority.payload.checksum();

    let mut report = RepairReport::default();
    let mut first_error = None;

    for (index, device) in parts.devices.iter_mut().enumerate() {
        if index == authority.index {
            continue;
        }
        let agrees = device.write_counter() == target_counter
            && device.checksum() == Some(target_checksum)
            && !device.suspect;
        if agrees {
            continue;
        }

        tracing::warn!(
            path = %device.path().display(),
            write_counter = device.write_counter(),
            target_counter,
            "repairing device: write counter or checksum disagrees"
        );
        match replica::write_device_at(
            &parts.transfer,
            device,
            &authority.payload,
            target_counter,
            false,
        ) {
            Ok(_) => {
                device.suspect = false;
                report.repaired.push(index);
            }
            Err(e) => {
                tracing::error!(path = %device.path().display(), error = %e, "repair failed");
                report.failed.push(index);
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

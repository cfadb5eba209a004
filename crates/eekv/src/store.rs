//! The key-value facade over a replicated device pool.
//!
//! Every public operation runs under one process-wide mutex and holds the
//! whole pool open and locked for its duration, so operations are fully
//! serialized within a process and, through the advisory device locks,
//! across processes.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use eekv_io::{IoBackend, SyncBackend};
use serde::Serialize;

use crate::device::{DeviceSpec, TrailerState};
use crate::document::Document;
use crate::error::{Result, StoreError};
use crate::payload::Payload;
use crate::pool::DevicePool;
use crate::transfer::DEFAULT_MAX_ATTEMPTS;
use crate::{quorum, repair, replica};

/// Text written by [`Store::clear`].
const EMPTY_DOCUMENT: &[u8] = b"{}";

/// Store construction options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreOptions {
    /// Ceiling on attempts for a single exact transfer.
    pub max_attempts: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Options for [`Store::set`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    /// Fail with [`StoreError::KeyNotFound`] instead of creating the key.
    pub no_create: bool,
    /// Zero every payload block before writing.
    pub zero_fill: bool,
}

/// Result of [`Store::verify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum VerifyOutcome {
    /// Every device verified and agreed with the authority.
    AllGood,
    /// At least one device failed or disagreed and has been repaired.
    SomeRepaired,
    /// No replica could be trusted; nothing was written.
    AllBad,
}

/// Snapshot of one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub path: PathBuf,
    pub block_size: usize,
    pub block_count: usize,
    /// Raw capacity, trailer block included.
    pub capacity: usize,
    /// Bytes available to the payload, terminator included.
    pub payload_capacity: usize,
    pub write_counter: u32,
    pub checksum: Option<String>,
    pub trailer_state: TrailerState,
    pub authoritative: bool,
}

/// Snapshot of the pool returned by [`Store::info`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolInfo {
    /// Usable payload size shared by every replica, terminator included.
    pub data_size: usize,
    pub initialized: bool,
    pub mixed_geometry: bool,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug)]
struct StoreInner {
    pool: DevicePool,
    initialized: bool,
}

impl StoreInner {
    fn require_initialized(&self) -> Result<()> {
        if self.initialized && self.pool.authority().is_some() {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    /// Runs `f` on the open pool, then syncs the initialized flag with
    /// whether an authority survived.
    fn run<T>(&mut self, f: impl FnOnce(&mut DevicePool) -> Result<T>) -> Result<T> {
        let result = self.pool.with_open(f);
        self.initialized = self.pool.authority().is_some();
        result
    }
}

/// Replicated key-value store.
///
/// # Example
///
/// ```no_run
/// use eekv::{DeviceSpec, SetOptions, Store};
///
/// let store = Store::open(&[
///     DeviceSpec::new("/dev/eeprom0", 128, 8192),
///     DeviceSpec::new("/dev/eeprom1", 128, 8192),
/// ])?;
/// store.initialize()?;
/// store.set("hostname", "probe-7", SetOptions::default())?;
/// assert_eq!(store.read("hostname")?, "probe-7");
/// # Ok::<(), eekv::StoreError>(())
/// ```
#[derive(Debug)]
pub struct Store {
    inner: Mutex<StoreInner>,
}

impl Store {
    /// Builds a store over the real filesystem.
    pub fn open(specs: &[DeviceSpec]) -> Result<Self> {
        Self::open_with(specs, StoreOptions::default())
    }

    /// Builds a store over the real filesystem with explicit options.
    pub fn open_with(specs: &[DeviceSpec], options: StoreOptions) -> Result<Self> {
        Self::with_backend(specs, Arc::new(SyncBackend::new()), options)
    }

    /// Builds a store over a custom backend.
    pub fn with_backend(
        specs: &[DeviceSpec],
        backend: Arc<dyn IoBackend>,
        options: StoreOptions,
    ) -> Result<Self> {
        let pool = DevicePool::new(specs, backend)?.with_max_attempts(options.max_attempts);
        Ok(Self {
            inner: Mutex::new(StoreInner {
                pool,
                initialized: false,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Elects the authoritative replica and repairs every laggard.
    ///
    /// Does nothing if the store is already initialized and every device
    /// agreed with the authority when last seen. Returns
    /// [`StoreError::NoGoodReplica`] when no device can be trusted; the
    /// caller may then [`clear`](Self::clear) to proceed with an empty store.
    ///
    /// A failed repair is returned as an error, but the store stays
    /// initialized on the elected replica. Calling `initialize` again
    /// retries the repair.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.initialized && inner.pool.is_converged() {
            return Ok(());
        }
        inner.run(|pool| {
            pool.reset_suspects();
            quorum::elect(pool)?;
            repair::repair(pool)?;
            Ok(())
        })?;
        tracing::info!(data_size = inner.pool.data_size(), "store initialized");
        Ok(())
    }

    /// True once an authoritative replica has been elected.
    pub fn is_initialized(&self) -> bool {
        self.lock().initialized
    }

    /// Usable payload size, terminator included.
    pub fn data_size(&self) -> usize {
        self.lock().pool.data_size()
    }

    /// Sets `key` to `value` on every replica.
    ///
    /// The new document is checked against the pool's capacity before any
    /// device is written. Returns the number of payload bytes written, which
    /// is zero when the content did not change.
    pub fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<usize> {
        let mut inner = self.lock();
        inner.require_initialized()?;
        inner.run(|pool| {
            let mut document = current_document(pool)?;
            document.set(key, value, options.no_create)?;
            let payload = Payload::from_text(document.to_text()?.as_bytes(), pool.data_size())?;
            pool.write_all(payload, options.zero_fill)
        })
    }

    /// Reads the string stored under `key`.
    pub fn read(&self, key: &str) -> Result<String> {
        let mut inner = self.lock();
        inner.require_initialized()?;
        inner.run(|pool| {
            let document = current_document(pool)?;
            document.get_str(key).map(str::to_owned)
        })
    }

    /// Removes `key` from every replica.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.lock();
        inner.require_initialized()?;
        inner.run(|pool| {
            let mut document = current_document(pool)?;
            document.remove(key)?;
            let payload = Payload::from_text(document.to_text()?.as_bytes(), pool.data_size())?;
            pool.write_all(payload, false).map(|_| ())
        })
    }

    /// Lists every key, sorted.
    pub fn list_keys(&self) -> Result<Vec<String>> {
        let mut inner = self.lock();
        inner.require_initialized()?;
        inner.run(|pool| Ok(current_document(pool)?.keys()))
    }

    /// Resets every replica to an empty document.
    ///
    /// Allowed on a store that failed to initialize. Every device is lifted
    /// to the highest write counter in the pool first, so all of them land
    /// on the same counter with the same checksum.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        inner.run(|pool| {
            pool.reset_suspects();
            pool.load_trailers()?;

            let newest = pool
                .devices()
                .iter()
                .max_by_key(|d| d.write_counter())
                .ok_or(StoreError::NoDevices)?;
            let target = newest
                .write_counter()
                .checked_add(1)
                .ok_or_else(|| StoreError::CounterOverflow {
                    path: newest.path().to_path_buf(),
                })?;

            let payload = Payload::from_text(EMPTY_DOCUMENT, pool.data_size())?;
            pool.authority = None;
            tracing::warn!(write_counter = target, "clearing all devices");
            pool.write_all_at(payload, target).map(|_| ())
        })
    }

    /// Re-reads and checks every device, then elects and repairs.
    pub fn verify(&self) -> Result<VerifyOutcome> {
        let mut inner = self.lock();
        inner.run(|pool| {
            pool.reset_suspects();
            pool.load_trailers()?;

            let mut all_verified = true;
            let parts = pool.parts();
            for device in parts.devices.iter_mut() {
                if device.trailer_state() != TrailerState::Loaded {
                    all_verified = false;
                    continue;
                }
                match replica::verify_device(&parts.transfer, device, parts.data_size) {
                    Ok(()) => device.release_buffer(),
                    Err(StoreError::ChecksumMismatch { path, .. }) => {
                        tracing::warn!(path = %path.display(), "device failed verification");
                        all_verified = false;
                    }
                    Err(e) => return Err(e),
                }
            }

            match quorum::elect(pool) {
                Ok(_) => {}
                Err(StoreError::NoGoodReplica) => return Ok(VerifyOutcome::AllBad),
                Err(e) => return Err(e),
            }
            let report = repair::repair(pool)?;

            if all_verified && report.is_clean() {
                Ok(VerifyOutcome::AllGood)
            } else {
                Ok(VerifyOutcome::SomeRepaired)
            }
        })
    }

    /// Reads every trailer and returns a snapshot of the pool.
    ///
    /// Read-only: nothing is elected or repaired.
    pub fn info(&self) -> Result<PoolInfo> {
        let mut inner = self.lock();
        let initialized = inner.initialized;
        inner.pool.with_open(DevicePool::load_trailers)?;

        let pool = &inner.pool;
        let authority = pool.authority().map(|a| a.index);
        let devices = pool
            .devices()
            .iter()
            .enumerate()
            .map(|(index, device)| {
                let geometry = device.geometry();
                DeviceInfo {
                    path: device.path().to_path_buf(),
                    block_size: geometry.block_size,
                    block_count: geometry.block_count,
                    capacity: geometry.capacity(),
                    payload_capacity: geometry.payload_capacity(),
                    write_counter: device.write_counter(),
                    checksum: device.checksum().map(|c| c.to_hex()),
                    trailer_state: device.trailer_state(),
                    authoritative: authority == Some(index),
                }
            })
            .collect();

        Ok(PoolInfo {
            data_size: pool.data_size(),
            initialized,
            mixed_geometry: pool.has_mixed_geometry(),
            devices,
        })
    }

    /// Drops the cached authoritative payload and returns the store to the
    /// not-initialized state.
    pub fn cleanup(&self) {
        let mut inner = self.lock();
        inner.pool.release_all();
        inner.initialized = false;
    }
}

/// Brings the cached authority up to date with the devices and parses it.
///
/// If every trailer still matches the authority's write counter and
/// checksum the cached payload is reused. Otherwise another writer has
/// been here, or a device was swapped, and election and repair run again.
fn current_document(pool: &mut DevicePool) -> Result<Document> {
    let (write_counter, checksum) = pool
        .authority()
        .map(|a| (a.write_counter, a.payload.checksum()))
        .ok_or(StoreError::NotInitialized)?;

    pool.load_trailers()?;
    let unchanged = pool.devices().iter().all(|d| {
        d.trailer_state() == TrailerState::Loaded
            && d.write_counter() == write_counter
            && d.checksum() == Some(checksum)
    });

    if !unchanged {
        tracing::info!(write_counter, "device trailers changed, re-electing");
        pool.reset_suspects();
        quorum::elect(pool)?;
        if let Err(e) = repair::repair(pool) {
            tracing::warn!(error = %e, "repair incomplete, continuing with elected replica");
        }
    }

    let authority = pool.authority().ok_or(StoreError::NotInitialized)?;
    Document::parse(authority.payload.text())
}

//! # eekv: Self-healing replicated key-value store for EEPROM devices
//!
//! A small JSON document is mirrored across a pool of unreliable EEPROM
//! devices. Every device carries a trailer recording a checksum of its
//! content and a monotonically increasing write counter. On startup the
//! store elects the newest replica that still verifies and repairs every
//! device that disagrees with it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    Store                     │
//! │  initialize · set · read · remove · clear    │
//! │  verify · info · cleanup                     │
//! └──────────────┬───────────────────────────────┘
//!                │ one process-wide mutex
//! ┌──────────────┴───────────────────────────────┐
//! │  quorum::elect ──► repair::repair            │
//! │         │                │                   │
//! │         └── replica::{verify,write}_device   │
//! ├──────────────────────────────────────────────┤
//! │  DevicePool: open_all/close_all, locking     │
//! ├──────────────────────────────────────────────┤
//! │  Transfer: exact reads/writes, trailer codec │
//! └──────────────┬───────────────────────────────┘
//!                │ IoBackend
//!           eekv-io (SyncBackend)
//! ```
//!
//! # Example
//!
//! ```no_run
//! use eekv::{DeviceSpec, SetOptions, Store, StoreError};
//!
//! let store = Store::open(&[
//!     DeviceSpec::new("/dev/eeprom0", 128, 8192),
//!     DeviceSpec::new("/dev/eeprom1", 128, 8192),
//!     DeviceSpec::new("/dev/eeprom2", 128, 8192),
//! ])?;
//!
//! match store.initialize() {
//!     Ok(()) => {}
//!     // Every replica failed verification: start over with an empty store.
//!     Err(StoreError::NoGoodReplica) => store.clear()?,
//!     Err(e) => return Err(e),
//! }
//!
//! store.set("serial", "A-1042", SetOptions::default())?;
//! assert_eq!(store.read("serial")?, "A-1042");
//! # Ok::<(), StoreError>(())
//! ```

pub mod checksum;
pub mod device;
pub mod document;
pub mod error;
pub mod payload;
pub mod pool;
pub mod quorum;
pub mod repair;
pub mod replica;
pub mod store;
pub mod transfer;

pub use checksum::Checksum;
pub use device::{Device, DeviceSpec, Geometry, TrailerState};
pub use document::Document;
pub use error::{ErrorClass, Result, StoreError};
pub use payload::Payload;
pub use pool::{Authority, DevicePool};
pub use repair::RepairReport;
pub use store::{DeviceInfo, PoolInfo, SetOptions, Store, StoreOptions, VerifyOutcome};
pub use transfer::{DEFAULT_MAX_ATTEMPTS, MAGIC, TRAILER_LEN, Trailer};

#[cfg(test)]
mod tests;

//! # eekv-io: I/O Backend Abstraction for eekv
//!
//! This crate provides a trait-based abstraction over the device file
//! operations the replica engine relies on:
//!
//! - **`SyncBackend`** (default): `std::fs` positional I/O, `fsync`, and the
//!   OS advisory file lock
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────┐
//! │           eekv           │
//! │   (uses IoBackend trait) │
//! └────────────┬─────────────┘
//!              │
//! ┌────────────┴─────────────┐
//! │         eekv-io          │
//! │  ┌─────────────────────┐ │
//! │  │     SyncBackend     │ │
//! │  │ pread/pwrite + lock │ │
//! │  └─────────────────────┘ │
//! └──────────────────────────┘
//! ```

mod backend;
mod error;
mod sync_backend;

pub use backend::{FileHandle, IoBackend, OpenFlags};
pub use error::IoError;
pub use sync_backend::SyncBackend;

//! Integration tests for the replica engine and the store facade.
//!
//! Devices are plain files in a temporary directory. Replica images with a
//! chosen write counter are laid down byte by byte so election and repair
//! can be exercised against known on-device states.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use eekv_io::{FileHandle, IoBackend, IoError, OpenFlags, SyncBackend};
use tempfile::TempDir;
use test_case::test_case;

use crate::{
    Checksum, DevicePool, DeviceSpec, ErrorClass, SetOptions, Store, StoreError, StoreOptions,
    TRAILER_LEN, Trailer, TrailerState, VerifyOutcome, quorum, repair,
};

const BLOCK_SIZE: usize = 128;
const TOTAL_SIZE: usize = 512;
/// Payload capacity of one `BLOCK_SIZE`/`TOTAL_SIZE` device.
const DATA_SIZE: usize = 384;

struct Fixture {
    dir: TempDir,
    specs: Vec<DeviceSpec>,
}

/// Creates `count` blank device files.
fn fixture(count: usize) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let specs = (0..count)
        .map(|i| {
            let path = dir.path().join(format!("eeprom{i}"));
            std::fs::write(&path, vec![0u8; TOTAL_SIZE]).unwrap();
            DeviceSpec::new(path, BLOCK_SIZE, TOTAL_SIZE)
        })
        .collect();
    Fixture { dir, specs }
}

fn trailer_offset(spec: &DeviceSpec) -> usize {
    spec.geometry().unwrap().payload_capacity()
}

/// Lays down a complete replica image holding `text` at `write_counter`.
fn write_replica(spec: &DeviceSpec, text: &[u8], write_counter: u32) {
    let mut image = vec![0u8; spec.total_size];
    image[..text.len()].copy_from_slice(text);
    let trailer = Trailer {
        checksum: Checksum::compute(text),
        write_counter,
    };
    let offset = trailer_offset(spec);
    image[offset..offset + TRAILER_LEN].copy_from_slice(&trailer.encode());
    std::fs::write(&spec.path, image).unwrap();
}

fn read_trailer(spec: &DeviceSpec) -> Trailer {
    let image = std::fs::read(&spec.path).unwrap();
    let offset = trailer_offset(spec);
    Trailer::decode(&image[offset..offset + TRAILER_LEN]).unwrap()
}

/// Flips a payload byte without touching the trailer.
fn corrupt_payload(spec: &DeviceSpec, offset: usize) {
    let mut image = std::fs::read(&spec.path).unwrap();
    image[offset] ^= 0x20;
    std::fs::write(&spec.path, image).unwrap();
}

fn snapshot(fx: &Fixture) -> Vec<Vec<u8>> {
    fx.specs
        .iter()
        .map(|spec| std::fs::read(&spec.path).unwrap())
        .collect()
}

fn ready_store(fx: &Fixture) -> Store {
    let store = Store::open(&fx.specs).unwrap();
    store.clear().unwrap();
    store
}

/// Backend that caps every transfer and can refuse to make write progress.
#[derive(Debug)]
struct FaultyBackend {
    inner: SyncBackend,
    max_chunk: usize,
    stall_writes: bool,
}

impl FaultyBackend {
    fn short(max_chunk: usize) -> Self {
        Self {
            inner: SyncBackend::new(),
            max_chunk,
            stall_writes: false,
        }
    }

    fn stalled() -> Self {
        Self {
            inner: SyncBackend::new(),
            max_chunk: usize::MAX,
            stall_writes: true,
        }
    }
}

impl IoBackend for FaultyBackend {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        self.inner.open(path, flags)
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        let len = buf.len().min(self.max_chunk);
        self.inner.read_at(handle, offset, &mut buf[..len])
    }

    fn write_at(&self, handle: &mut FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        if self.stall_writes {
            return Ok(0);
        }
        let len = buf.len().min(self.max_chunk);
        self.inner.write_at(handle, offset, &buf[..len])
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        self.inner.fsync(handle)
    }

    fn lock_exclusive(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        self.inner.lock_exclusive(handle)
    }

    fn unlock(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        self.inner.unlock(handle)
    }

    fn close(&self, handle: FileHandle) -> Result<(), IoError> {
        self.inner.close(handle)
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        self.inner.file_size(handle)
    }
}

/// Backend that fails writes to one device below a byte offset.
///
/// Handles are tracked by id so only the chosen path is affected. The fault
/// can be switched off to let a later operation succeed.
#[derive(Debug)]
struct BrokenDevice {
    inner: SyncBackend,
    path: PathBuf,
    fail_below: u64,
    handles: Mutex<Vec<u64>>,
    enabled: AtomicBool,
}

impl BrokenDevice {
    /// Every write to `path` fails.
    fn writes(path: &Path) -> Self {
        Self::below(path, u64::MAX)
    }

    /// Writes to `path` fail inside the payload region only; the trailer
    /// block can still be written.
    fn payload_writes(path: &Path) -> Self {
        Self::below(path, DATA_SIZE as u64)
    }

    fn below(path: &Path, fail_below: u64) -> Self {
        Self {
            inner: SyncBackend::new(),
            path: path.to_path_buf(),
            fail_below,
            handles: Mutex::new(Vec::new()),
            enabled: AtomicBool::new(true),
        }
    }

    fn heal(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    fn is_broken(&self, handle: &FileHandle, offset: u64) -> bool {
        self.enabled.load(Ordering::SeqCst)
            && offset < self.fail_below
            && self
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&handle.id())
    }
}

impl IoBackend for BrokenDevice {
    fn open(&self, path: &Path, flags: OpenFlags) -> Result<FileHandle, IoError> {
        let handle = self.inner.open(path, flags)?;
        if path == self.path {
            self.handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(handle.id());
        }
        Ok(handle)
    }

    fn read_at(&self, handle: &FileHandle, offset: u64, buf: &mut [u8]) -> Result<usize, IoError> {
        self.inner.read_at(handle, offset, buf)
    }

    fn write_at(&self, handle: &mut FileHandle, offset: u64, buf: &[u8]) -> Result<usize, IoError> {
        if self.is_broken(handle, offset) {
            return Err(std::io::Error::other("device write failed").into());
        }
        self.inner.write_at(handle, offset, buf)
    }

    fn fsync(&self, handle: &FileHandle) -> Result<(), IoError> {
        self.inner.fsync(handle)
    }

    fn lock_exclusive(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        self.inner.lock_exclusive(handle)
    }

    fn unlock(&self, handle: &mut FileHandle) -> Result<(), IoError> {
        self.inner.unlock(handle)
    }

    fn close(&self, handle: FileHandle) -> Result<(), IoError> {
        self.inner.close(handle)
    }

    fn file_size(&self, handle: &FileHandle) -> Result<u64, IoError> {
        self.inner.file_size(handle)
    }
}

// ============================================================================
// Pool construction
// ============================================================================

#[test]
fn data_size_is_smallest_payload_capacity() {
    let fx = fixture(1);
    let mut specs = fx.specs.clone();
    specs.push(DeviceSpec::new(fx.dir.path().join("big"), BLOCK_SIZE, 1024));

    let pool = DevicePool::new(&specs, Arc::new(SyncBackend::new())).unwrap();
    assert_eq!(pool.len(), 2);
    assert_eq!(pool.data_size(), DATA_SIZE);
    assert!(pool.has_mixed_geometry());
}

#[test]
fn invalid_specs_are_skipped() {
    let fx = fixture(2);
    let mut specs = fx.specs.clone();
    specs.insert(1, DeviceSpec::new(fx.dir.path().join("tiny"), 32, 1024));

    let pool = DevicePool::new(&specs, Arc::new(SyncBackend::new())).unwrap();
    assert_eq!(pool.len(), 2);
    assert!(!pool.has_mixed_geometry());
}

#[test]
fn pool_without_usable_devices_is_rejected() {
    let specs = [DeviceSpec::new("/dev/eeprom0", 32, 1024)];
    let result = DevicePool::new(&specs, Arc::new(SyncBackend::new()));
    assert!(matches!(result, Err(StoreError::NoDevices)));
}

#[test]
fn failed_open_leaves_no_handle_behind() {
    let fx = fixture(2);
    let mut specs = fx.specs.clone();
    specs.push(DeviceSpec::new(fx.dir.path().join("missing"), BLOCK_SIZE, TOTAL_SIZE));

    let mut pool = DevicePool::new(&specs, Arc::new(SyncBackend::new())).unwrap();
    let err = pool.open_all().unwrap_err();
    assert_eq!(err.class(), ErrorClass::System);
    assert!(pool.devices().iter().all(|d| !d.is_open()));

    // The lock on the first devices was released as well
    let store = Store::open(&fx.specs).unwrap();
    store.clear().unwrap();
}

// ============================================================================
// Initialization and recovery
// ============================================================================

#[test]
fn fresh_pool_has_no_good_replica_until_cleared() {
    let fx = fixture(3);
    let store = Store::open(&fx.specs).unwrap();

    assert!(matches!(store.initialize(), Err(StoreError::NoGoodReplica)));
    assert!(!store.is_initialized());
    assert!(matches!(store.read("k"), Err(StoreError::NotInitialized)));
    assert!(snapshot(&fx).iter().all(|image| image.iter().all(|&b| b == 0)));

    store.clear().unwrap();
    assert!(store.is_initialized());
    for spec in &fx.specs {
        let trailer = read_trailer(spec);
        assert_eq!(trailer.write_counter, 1);
        assert_eq!(trailer.checksum, Checksum::compute(b"{}"));
    }
}

#[test]
fn clear_lifts_every_device_past_the_newest() {
    let fx = fixture(3);
    write_replica(&fx.specs[0], br#"{"a":"1"}"#, 9);
    write_replica(&fx.specs[1], br#"{"a":"0"}"#, 4);

    let store = Store::open(&fx.specs).unwrap();
    store.clear().unwrap();

    for spec in &fx.specs {
        let trailer = read_trailer(spec);
        assert_eq!(trailer.write_counter, 10);
        assert_eq!(trailer.checksum, Checksum::compute(b"{}"));
    }
    assert!(store.list_keys().unwrap().is_empty());
}

#[test]
fn initialize_converges_every_device() {
    let fx = fixture(3);
    let store = ready_store(&fx);
    store.set("a", "1", SetOptions::default()).unwrap();
    let stale = std::fs::read(&fx.specs[2].path).unwrap();
    store.set("a", "2", SetOptions::default()).unwrap();
    drop(store);

    std::fs::write(&fx.specs[2].path, stale).unwrap();
    assert_eq!(read_trailer(&fx.specs[2]).write_counter, 2);

    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();

    let expected = read_trailer(&fx.specs[0]);
    assert_eq!(expected.write_counter, 3);
    for spec in &fx.specs {
        assert_eq!(read_trailer(spec), expected);
    }
    assert_eq!(store.read("a").unwrap(), "2");
}

#[test]
fn election_skips_corrupt_top_tier_candidate() {
    let fx = fixture(4);
    let five = br#"{"v":"five"}"#;
    for spec in &fx.specs[..3] {
        write_replica(spec, five, 5);
    }
    write_replica(&fx.specs[3], br#"{"v":"three"}"#, 3);
    corrupt_payload(&fx.specs[0], 2);
    corrupt_payload(&fx.specs[3], 2);

    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();

    let info = store.info().unwrap();
    let authoritative: Vec<_> = info
        .devices
        .iter()
        .map(|d| d.authoritative)
        .collect();
    assert_eq!(authoritative, vec![false, true, false, false]);

    for spec in &fx.specs {
        let trailer = read_trailer(spec);
        assert_eq!(trailer.write_counter, 5);
        assert_eq!(trailer.checksum, Checksum::compute(five));
    }
    let images = snapshot(&fx);
    assert!(images.iter().all(|image| image == &images[1]));
    assert_eq!(store.read("v").unwrap(), "five");
}

#[test]
fn no_quorum_frees_every_buffer() {
    let fx = fixture(4);
    for spec in &fx.specs[..3] {
        write_replica(spec, br#"{"v":"five"}"#, 5);
        corrupt_payload(spec, 3);
    }
    write_replica(&fx.specs[3], br#"{"v":"three"}"#, 3);
    let before = snapshot(&fx);

    let mut pool = DevicePool::new(&fx.specs, Arc::new(SyncBackend::new())).unwrap();
    let result = pool.with_open(quorum::elect);
    assert!(matches!(result, Err(StoreError::NoGoodReplica)));
    assert!(pool.authority().is_none());
    assert!(pool.devices().iter().all(|d| !d.has_buffer()));
    drop(pool);

    let store = Store::open(&fx.specs).unwrap();
    assert!(matches!(store.initialize(), Err(StoreError::NoGoodReplica)));
    assert_eq!(snapshot(&fx), before);
}

#[test]
fn repair_brings_laggard_to_authority() {
    let fx = fixture(2);
    let x = br#"{"x":"X"}"#;
    write_replica(&fx.specs[0], x, 7);
    write_replica(&fx.specs[1], br#"{"y":"Y"}"#, 5);

    let mut pool = DevicePool::new(&fx.specs, Arc::new(SyncBackend::new())).unwrap();
    let report = pool
        .with_open(|pool| {
            assert_eq!(quorum::elect(pool)?, 0);
            repair::repair(pool)
        })
        .unwrap();
    assert_eq!(report.repaired, vec![1]);
    assert!(report.failed.is_empty());

    let trailer = read_trailer(&fx.specs[1]);
    assert_eq!(trailer.write_counter, 7);
    assert_eq!(trailer.checksum, Checksum::compute(x));

    let text = pool
        .with_open(|pool| {
            quorum::elect(pool)?;
            let clean = repair::repair(pool)?.is_clean();
            assert!(clean);
            Ok(pool.authority().map(|a| a.payload.text().to_vec()))
        })
        .unwrap();
    assert_eq!(text.as_deref(), Some(&x[..]));
}

#[test]
fn repair_matches_counter_zero_authority() {
    let fx = fixture(2);
    write_replica(&fx.specs[0], b"{}", 0);

    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();

    let authority = read_trailer(&fx.specs[0]);
    assert_eq!(authority.write_counter, 0);
    assert_eq!(read_trailer(&fx.specs[1]), authority);

    let info = store.info().unwrap();
    assert!(info.devices[0].authoritative);
    drop(store);

    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();
    assert!(store.info().unwrap().devices[0].authoritative);
    assert_eq!(read_trailer(&fx.specs[0]).write_counter, 0);
}

#[test]
fn repair_continues_past_a_failing_device() {
    let fx = fixture(3);
    let x = br#"{"x":"X"}"#;
    write_replica(&fx.specs[0], x, 7);
    write_replica(&fx.specs[1], br#"{"y":"Y"}"#, 5);
    write_replica(&fx.specs[2], br#"{"y":"Y"}"#, 5);

    let backend = Arc::new(BrokenDevice::writes(&fx.specs[1].path));
    let mut pool = DevicePool::new(&fx.specs, backend).unwrap();
    let err = pool
        .with_open(|pool| {
            quorum::elect(pool)?;
            repair::repair(pool)
        })
        .unwrap_err();
    assert!(matches!(&err, StoreError::Io { path, .. } if path == &fx.specs[1].path));

    // The device after the failing one was still repaired
    let trailer = read_trailer(&fx.specs[2]);
    assert_eq!(trailer.write_counter, 7);
    assert_eq!(trailer.checksum, Checksum::compute(x));
    assert_eq!(read_trailer(&fx.specs[1]).write_counter, 5);
}

#[test]
fn initialize_retries_unfinished_repair() {
    let fx = fixture(3);
    write_replica(&fx.specs[0], br#"{"x":"X"}"#, 7);
    write_replica(&fx.specs[1], br#"{"y":"Y"}"#, 5);
    write_replica(&fx.specs[2], br#"{"y":"Y"}"#, 5);

    let backend = Arc::new(BrokenDevice::writes(&fx.specs[1].path));
    let store =
        Store::with_backend(&fx.specs, backend.clone(), StoreOptions::default()).unwrap();

    assert!(matches!(store.initialize(), Err(StoreError::Io { .. })));
    assert!(store.is_initialized());
    assert_eq!(read_trailer(&fx.specs[2]), read_trailer(&fx.specs[0]));
    assert_ne!(read_trailer(&fx.specs[1]), read_trailer(&fx.specs[0]));

    backend.heal();
    store.initialize().unwrap();
    for spec in &fx.specs {
        assert_eq!(read_trailer(spec), read_trailer(&fx.specs[0]));
    }
    assert_eq!(store.read("x").unwrap(), "X");
}

#[test]
fn torn_payload_write_leaves_no_trailer() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    store.set("k", "v", SetOptions::default()).unwrap();
    drop(store);

    let backend = Arc::new(BrokenDevice::payload_writes(&fx.specs[1].path));
    let store = Store::with_backend(&fx.specs, backend, StoreOptions::default()).unwrap();
    store.initialize().unwrap();
    let err = store.set("k", "w", SetOptions::default()).unwrap_err();
    assert!(matches!(&err, StoreError::Io { path, .. } if path == &fx.specs[1].path));
    drop(store);

    // The trailer was cleared before the first payload block failed
    let image = std::fs::read(&fx.specs[1].path).unwrap();
    assert!(image[DATA_SIZE..].iter().all(|&b| b == 0));

    let store = Store::open(&fx.specs).unwrap();
    let info = store.info().unwrap();
    assert_eq!(info.devices[1].trailer_state, TrailerState::Uninitialized);

    store.initialize().unwrap();
    assert_eq!(store.read("k").unwrap(), "w");
    assert_eq!(read_trailer(&fx.specs[1]), read_trailer(&fx.specs[0]));
}

#[test_case(b"" ; "blank trailer")]
#[test_case(b"EEKVzz" ; "corrupt trailer")]
fn unusable_trailer_is_repaired(trailer: &[u8]) {
    let fx = fixture(3);
    let text = br#"{"a":"1"}"#;
    write_replica(&fx.specs[0], text, 4);
    write_replica(&fx.specs[1], text, 4);

    let mut image = vec![0u8; TOTAL_SIZE];
    let offset = trailer_offset(&fx.specs[2]);
    image[offset..offset + trailer.len()].copy_from_slice(trailer);
    std::fs::write(&fx.specs[2].path, image).unwrap();

    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();
    assert_eq!(read_trailer(&fx.specs[2]), read_trailer(&fx.specs[0]));
}

#[test]
fn info_reports_trailer_states() {
    let fx = fixture(3);
    write_replica(&fx.specs[0], b"{}", 2);
    let mut image = vec![0u8; TOTAL_SIZE];
    image[DATA_SIZE..DATA_SIZE + 4].copy_from_slice(b"EEKV");
    std::fs::write(&fx.specs[2].path, image).unwrap();

    let store = Store::open(&fx.specs).unwrap();
    let info = store.info().unwrap();
    assert_eq!(info.data_size, DATA_SIZE);
    assert!(!info.initialized);

    let states: Vec<_> = info.devices.iter().map(|d| d.trailer_state).collect();
    assert_eq!(
        states,
        vec![
            TrailerState::Loaded,
            TrailerState::Uninitialized,
            TrailerState::Corrupt
        ]
    );
    assert_eq!(info.devices[0].write_counter, 2);
    assert_eq!(info.devices[0].capacity, TOTAL_SIZE);
    assert_eq!(info.devices[0].payload_capacity, DATA_SIZE);
    assert_eq!(
        info.devices[0].checksum.as_deref(),
        Some(Checksum::compute(b"{}").to_hex().as_str())
    );
    assert!(info.devices.iter().all(|d| !d.authoritative));
}

// ============================================================================
// Key-value operations
// ============================================================================

#[test]
fn set_read_clear_round_trip() {
    let fx = fixture(2);
    let store = ready_store(&fx);

    store.set("k", "v", SetOptions::default()).unwrap();
    assert_eq!(store.read("k").unwrap(), "v");

    store.clear().unwrap();
    assert!(matches!(store.read("k"), Err(StoreError::KeyNotFound(key)) if key == "k"));
}

#[test]
fn operations_require_initialization() {
    let fx = fixture(2);
    let store = Store::open(&fx.specs).unwrap();

    assert!(matches!(
        store.set("k", "v", SetOptions::default()),
        Err(StoreError::NotInitialized)
    ));
    assert!(matches!(store.list_keys(), Err(StoreError::NotInitialized)));
    assert!(matches!(store.remove("k"), Err(StoreError::NotInitialized)));
}

#[test]
fn identical_write_changes_nothing() {
    let fx = fixture(3);
    let store = ready_store(&fx);

    assert!(store.set("k", "v", SetOptions::default()).unwrap() > 0);
    let before = snapshot(&fx);
    let counter = read_trailer(&fx.specs[0]).write_counter;

    assert_eq!(store.set("k", "v", SetOptions::default()).unwrap(), 0);
    assert_eq!(snapshot(&fx), before);
    assert_eq!(read_trailer(&fx.specs[0]).write_counter, counter);
}

#[test]
fn capacity_boundary() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    assert_eq!(store.data_size(), DATA_SIZE);
    let before = snapshot(&fx);

    // {"k":""} is 8 bytes; one byte is reserved for the terminator
    let err = store
        .set("k", &"x".repeat(376), SetOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::CapacityExceeded {
            required: 384,
            available: 383
        }
    ));
    assert_eq!(err.class(), ErrorClass::Capacity);
    assert_eq!(snapshot(&fx), before);

    let value = "x".repeat(375);
    store.set("k", &value, SetOptions::default()).unwrap();
    assert_eq!(store.read("k").unwrap(), value);
}

#[test]
fn remove_and_list_keys() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    store.set("b", "2", SetOptions::default()).unwrap();
    store.set("a", "1", SetOptions::default()).unwrap();
    assert_eq!(store.list_keys().unwrap(), vec!["a", "b"]);

    store.remove("a").unwrap();
    assert_eq!(store.list_keys().unwrap(), vec!["b"]);
    assert!(matches!(store.remove("a"), Err(StoreError::KeyNotFound(_))));
}

#[test]
fn no_create_leaves_devices_untouched() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    let before = snapshot(&fx);
    let no_create = SetOptions {
        no_create: true,
        ..SetOptions::default()
    };

    assert!(matches!(
        store.set("missing", "v", no_create),
        Err(StoreError::KeyNotFound(_))
    ));
    assert_eq!(snapshot(&fx), before);

    store.set("present", "1", SetOptions::default()).unwrap();
    store.set("present", "2", no_create).unwrap();
    assert_eq!(store.read("present").unwrap(), "2");
}

#[test]
fn non_string_value_is_reported() {
    let fx = fixture(2);
    for spec in &fx.specs {
        write_replica(spec, br#"{"count":3}"#, 1);
    }
    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();
    assert!(matches!(store.read("count"), Err(StoreError::NotAString(_))));
}

#[test]
fn stale_bytes_after_terminator_are_cleared() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    store.set("k", &"y".repeat(60), SetOptions::default()).unwrap();
    store.set("k", "x", SetOptions::default()).unwrap();

    let text = br#"{"k":"x"}"#;
    for image in snapshot(&fx) {
        assert_eq!(&image[..text.len()], text);
        assert!(image[text.len()..BLOCK_SIZE].iter().all(|&b| b == 0));
    }
}

#[test]
fn zero_fill_scrubs_every_payload_block() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    store.set("k", &"y".repeat(300), SetOptions::default()).unwrap();
    let zero_fill = SetOptions {
        zero_fill: true,
        ..SetOptions::default()
    };
    store.set("k", "x", zero_fill).unwrap();

    let text = br#"{"k":"x"}"#;
    for image in snapshot(&fx) {
        assert!(image[text.len()..DATA_SIZE].iter().all(|&b| b == 0));
    }
    assert_eq!(store.read("k").unwrap(), "x");
}

#[test]
fn counter_overflow_is_a_protocol_error() {
    let fx = fixture(2);
    for spec in &fx.specs {
        write_replica(spec, b"{}", u32::MAX);
    }
    let store = Store::open(&fx.specs).unwrap();
    store.initialize().unwrap();

    let err = store.set("k", "v", SetOptions::default()).unwrap_err();
    assert!(matches!(err, StoreError::CounterOverflow { .. }));
    assert_eq!(err.class(), ErrorClass::Protocol);
    assert!(matches!(store.clear(), Err(StoreError::CounterOverflow { .. })));
}

#[test]
fn cleanup_returns_to_uninitialized() {
    let fx = fixture(2);
    let store = ready_store(&fx);
    store.set("k", "v", SetOptions::default()).unwrap();

    store.cleanup();
    assert!(!store.is_initialized());
    assert!(matches!(store.read("k"), Err(StoreError::NotInitialized)));

    store.initialize().unwrap();
    assert_eq!(store.read("k").unwrap(), "v");
}

#[test]
fn second_store_sees_other_writers() {
    let fx = fixture(3);
    let writer = ready_store(&fx);
    writer.set("k", "1", SetOptions::default()).unwrap();

    let reader = Store::open(&fx.specs).unwrap();
    reader.initialize().unwrap();
    assert_eq!(reader.read("k").unwrap(), "1");

    writer.set("k", "2", SetOptions::default()).unwrap();
    assert_eq!(reader.read("k").unwrap(), "2");

    reader.set("other", "3", SetOptions::default()).unwrap();
    assert_eq!(writer.list_keys().unwrap(), vec!["k", "other"]);
}

// ============================================================================
// Verify
// ============================================================================

#[test]
fn verify_reports_each_outcome() {
    let fx = fixture(3);
    let store = ready_store(&fx);
    store.set("a", "1", SetOptions::default()).unwrap();
    assert_eq!(store.verify().unwrap(), VerifyOutcome::AllGood);

    corrupt_payload(&fx.specs[1], 2);
    assert_eq!(store.verify().unwrap(), VerifyOutcome::SomeRepaired);
    assert_eq!(store.verify().unwrap(), VerifyOutcome::AllGood);
    assert_eq!(store.read("a").unwrap(), "1");

    for spec in &fx.specs {
        corrupt_payload(spec, 2);
    }
    let before = snapshot(&fx);
    assert_eq!(store.verify().unwrap(), VerifyOutcome::AllBad);
    assert!(!store.is_initialized());
    assert_eq!(snapshot(&fx), before);
}

#[test]
fn verify_repairs_blank_device() {
    let fx = fixture(2);
    write_replica(&fx.specs[0], br#"{"a":"1"}"#, 3);

    let store = Store::open(&fx.specs).unwrap();
    assert_eq!(store.verify().unwrap(), VerifyOutcome::SomeRepaired);
    assert_eq!(read_trailer(&fx.specs[1]), read_trailer(&fx.specs[0]));
    assert!(store.is_initialized());
}

// ============================================================================
// Transfer retries
// ============================================================================

#[test]
fn short_transfers_are_retried() {
    let fx = fixture(2);
    let store = Store::with_backend(
        &fx.specs,
        Arc::new(FaultyBackend::short(7)),
        StoreOptions::default(),
    )
    .unwrap();
    store.clear().unwrap();
    store.set("k", &"z".repeat(200), SetOptions::default()).unwrap();

    let reader = Store::open(&fx.specs).unwrap();
    reader.initialize().unwrap();
    assert_eq!(reader.read("k").unwrap(), "z".repeat(200));
}

#[test]
fn stalled_device_exhausts_retries() {
    let fx = fixture(2);
    let store = Store::with_backend(
        &fx.specs,
        Arc::new(FaultyBackend::stalled()),
        StoreOptions { max_attempts: 5 },
    )
    .unwrap();

    let err = store.clear().unwrap_err();
    assert!(matches!(
        err,
        StoreError::IncompleteTransfer {
            direction: "write",
            attempts: 5,
            transferred: 0,
            ..
        }
    ));
    assert_eq!(err.class(), ErrorClass::System);
    assert!(!store.is_initialized());
    assert!(snapshot(&fx).iter().all(|image| image.iter().all(|&b| b == 0)));
}

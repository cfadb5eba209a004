//! Election of the authoritative replica.
//!
//! # Algorithm
//!
//! 1. Read every trailer. Blank and malformed trailers are skipped.
//! 2. Keep the devices sharing the highest write counter, in pool order.
//! 3. Verify their payloads in order; the first one whose content hashes to
//!    its stored checksum wins. Rejected buffers are dropped immediately.
//!
//! # Tie-break
//!
//! Among devices with equal write counters the first in pool order that
//! verifies is elected. Identical replicas make this choice irrelevant; it
//! only matters when equal counters hold different content, which means a
//! write was torn somewhere, and no stronger guarantee is implied.

use crate::device::TrailerState;
use crate::error::{Result, StoreError};
use crate::pool::{Authority, DevicePool};
use crate::replica;

/// Devices holding the highest write counter seen, in pool order.
fn top_tier(pool: &DevicePool) -> Option<(u32, Vec<usize>)> {
    let mut best: Option<(u32, Vec<usize>)> = None;
    for (index, device) in pool.devices().iter().enumerate() {
        if device.trailer_state() != TrailerState::Loaded {
            continue;
        }
        let counter = device.write_counter();
        match &mut best {
            Some((max, tier)) if counter == *max => tier.push(index),
            Some((max, _)) if counter < *max => {}
            _ => best = Some((counter, vec![index])),
        }
    }
    best
}

/// Elects the authoritative replica and stores it on the pool.
///
/// The pool must be open. Returns the elected index, or
/// [`StoreError::NoGoodReplica`] when no top-tier device verifies; in that
/// case no payload buffer is left allocated.
pub fn elect(pool: &mut DevicePool) -> Result<usize> {
    pool.authority = None;
    pool.load_trailers()?;

    let Some((write_counter, candidates)) = top_tier(pool) else {
        tracing::error!("no initialized device in the pool");
        return Err(StoreError::NoGoodReplica);
    };
    tracing::debug!(write_counter, candidates = ?candidates, "verifying top write-counter tier");

    let parts = pool.parts();
    let mut elected = None;
    for index in candidates {
        let device = &mut parts.devices[index];
        match replica::verify_device(&parts.transfer, device, parts.data_size) {
            Ok(()) => {
                elected = replica::take_payload(device).map(|payload| Authority {
                    index,
                    write_counter,
                    payload,
                });
                break;
            }
            Err(StoreError::ChecksumMismatch {
                path,
                stored,
                computed,
            }) => {
                tracing::warn!(
                    path = %path.display(),
                    %stored,
                    %computed,
                    "candidate failed checksum verification"
                );
            }
            Err(e) => return Err(e),
        }
    }

    match elected {
        Some(authority) => {
            let index = authority.index;
            tracing::debug!(
                path = %pool.devices()[index].path().display(),
                write_counter,
                "elected authoritative replica"
            );
            pool.authority = Some(authority);
            Ok(index)
        }
        None => {
            tracing::error!(write_counter, "no replica passed checksum verification");
            Err(StoreError::NoGoodReplica)
        }
    }
}

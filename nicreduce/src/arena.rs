//! Scratch memory of the processing clusters.
//!
//! Each cluster owns one [`Scratchpad`], partitioned in order into
//!
//! ```text
//! +----------------------------------------------+
//! | slot locks     ring_size x ReassemblyTracker |
//! +----------------------------------------------+
//! | core staging   cores x (fragment + wire)     |
//! +----------------------------------------------+
//! | slots          ring_size x Slot (buffers)    |
//! +----------------------------------------------+
//! ```
//!
//! Regions are typed and indexed by ring position or core id. Everything is
//! allocated once at construction.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::config::ReduceConfig;
use crate::error::{NicReduceError, Result};
use crate::protocol::FragmentBuf;
use crate::reassembly::ReassemblyTracker;
use crate::reduce::Element;
use crate::storage::{Storage, StorageParams};
use crate::sync::SpinMutex;
use crate::types::BlockId;

/// Outbound staging of one core: the fragment being assembled during a
/// dense flush and the wire buffer every outbound packet is encoded into.
#[derive(Debug)]
pub struct CoreStaging<T> {
    pub assembly: FragmentBuf<T>,
    pub wire: Vec<u8>,
}

/// Aggregation state of one ring position.
///
/// The buffers carry their own locks; `sent` counts outbound fragments of
/// the current block and may be bumped from any buffer's critical section.
pub struct Slot<S> {
    buffers: Vec<SpinMutex<S>>,
    sent: AtomicU32,
}

impl<S> Slot<S> {
    pub fn buffers(&self) -> &[SpinMutex<S>] {
        &self.buffers
    }

    pub fn sent(&self) -> &AtomicU32 {
        &self.sent
    }
}

/// Scratch region of one cluster.
pub struct Scratchpad<T, S> {
    slot_locks: Vec<SpinMutex<ReassemblyTracker>>,
    staging: Vec<SpinMutex<CoreStaging<T>>>,
    slots: Vec<Slot<S>>,
}

impl<T: Element, S: Storage<T>> Scratchpad<T, S> {
    pub fn new(cfg: &ReduceConfig) -> Self {
        let layout = cfg.wire_layout();
        let params = StorageParams::from_config(cfg);

        let slot_locks = (0..cfg.ring_size)
            .map(|_| SpinMutex::new(ReassemblyTracker::new(cfg.num_children)))
            .collect();
        let staging = (0..cfg.cores_per_cluster)
            .map(|_| {
                SpinMutex::new(CoreStaging {
                    assembly: FragmentBuf::for_layout(&layout),
                    wire: vec![0u8; cfg.packet_size],
                })
            })
            .collect();
        let slots = (0..cfg.ring_size)
            .map(|_| Slot {
                buffers: (0..cfg.buffers_per_slot())
                    .map(|_| SpinMutex::new(S::new(&params)))
                    .collect(),
                sent: AtomicU32::new(0),
            })
            .collect();

        Self {
            slot_locks,
            staging,
            slots,
        }
    }

    pub fn slot_lock(&self, ring: usize) -> Result<&SpinMutex<ReassemblyTracker>> {
        self.slot_locks
            .get(ring)
            .ok_or(out_of_range("slot lock", ring, self.slot_locks.len()))
    }

    pub fn staging(&self, core: usize) -> Result<&SpinMutex<CoreStaging<T>>> {
        self.staging
            .get(core)
            .ok_or(out_of_range("core staging", core, self.staging.len()))
    }

    pub fn slot(&self, ring: usize) -> Result<&Slot<S>> {
        self.slots
            .get(ring)
            .ok_or(out_of_range("slot", ring, self.slots.len()))
    }

    /// True if the slot at `ring` holds no state of an unfinished block.
    pub fn slot_is_idle(&self, ring: usize) -> Result<bool> {
        let tracker_idle = self.slot_lock(ring)?.lock().is_idle();
        let slot = self.slot(ring)?;
        let buffers_empty = slot.buffers.iter().all(|b| b.lock().is_empty());
        Ok(tracker_idle && buffers_empty && slot.sent.load(Ordering::Acquire) == 0)
    }
}

/// Every cluster's scratchpad plus the block-to-slot mapping.
pub struct Arena<T, S> {
    clusters: Vec<Scratchpad<T, S>>,
    ring_size: usize,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Element, S: Storage<T>> Arena<T, S> {
    pub fn new(cfg: &ReduceConfig) -> Self {
        Self {
            clusters: (0..cfg.num_clusters).map(|_| Scratchpad::new(cfg)).collect(),
            ring_size: cfg.ring_size,
            _marker: PhantomData,
        }
    }

    /// Ring position of a block: `(block_id / num_clusters) % ring_size`.
    pub fn slot_index(&self, block_id: BlockId) -> usize {
        (block_id as usize / self.clusters.len()) % self.ring_size
    }

    pub fn cluster(&self, cluster: usize) -> Result<&Scratchpad<T, S>> {
        self.clusters
            .get(cluster)
            .ok_or(out_of_range("cluster", cluster, self.clusters.len()))
    }
}

fn out_of_range(region: &'static str, index: usize, capacity: usize) -> NicReduceError {
    NicReduceError::ArenaOutOfRange {
        region,
        index,
        capacity,
    }
}

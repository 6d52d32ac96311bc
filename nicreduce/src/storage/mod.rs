//! Aggregation buffers of a slot.
//!
//! A storage strategy folds fragments into partial sums, collapses parallel
//! buffers into one, and serializes the result through an [`Emitter`].

mod dense;
mod hash;

use std::sync::atomic::{AtomicU32, Ordering};

pub use dense::DenseStorage;
pub use hash::HashStorage;

use crate::config::ReduceConfig;
use crate::error::Result;
use crate::protocol::{FragmentBuf, FragmentHeader, FragmentView, WireLayout};
use crate::reduce::{Element, Values};
use crate::transport::Forwarder;
use crate::types::{BlockId, Coordinate, MergeMode, PortId};

/// Most fragments one flush can announce in the split index.
pub const MAX_FRAGMENTS_PER_BLOCK: u32 = u8::MAX as u32;

/// Capacities and switches a storage buffer is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageParams {
    pub arity: usize,
    pub block_range: usize,
    pub hash_size: usize,
    pub neighbor_slot: bool,
    pub merge_mode: MergeMode,
    pub use_simd: bool,
    /// Entries per outbound fragment; sizes the hash stash.
    pub max_entries: usize,
}

impl StorageParams {
    pub fn from_config(cfg: &ReduceConfig) -> Self {
        Self {
            arity: cfg.values_per_element,
            block_range: cfg.block_range(),
            hash_size: cfg.hash_size(),
            neighbor_slot: cfg.neighbor_slot,
            merge_mode: cfg.merge_mode,
            use_simd: cfg.use_simd,
            max_entries: cfg.max_entries_per_fragment(),
        }
    }
}

/// Identity of the block whose fragments an [`Emitter`] writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockMeta {
    pub block_id: BlockId,
    pub root_address: u32,
    /// Port stamped on outbound fragments.
    pub port: PortId,
}

/// Seals and forwards outbound fragments for one block.
///
/// Writes into the calling core's staging buffer and counts every fragment
/// in the slot's shared `sent` counter. A full fragment is held until the
/// next entry arrives, so the last fragment of a flush always carries the
/// total count.
///
/// The count travels in the 8-bit split index. A block that emits more than
/// [`MAX_FRAGMENTS_PER_BLOCK`] fragments gets a saturated count, which its
/// parent cannot complete on; this is logged as an error.
pub struct Emitter<'a> {
    layout: &'a WireLayout,
    wire: &'a mut [u8],
    forwarder: &'a dyn Forwarder,
    block: BlockMeta,
    sent: &'a AtomicU32,
}

impl<'a> Emitter<'a> {
    pub fn new(
        layout: &'a WireLayout,
        wire: &'a mut [u8],
        forwarder: &'a dyn Forwarder,
        block: BlockMeta,
        sent: &'a AtomicU32,
    ) -> Self {
        Self {
            layout,
            wire,
            forwarder,
            block,
            sent,
        }
    }

    /// Append an entry, first forwarding `buf` if it is already full.
    #[inline]
    pub fn push<T: Element>(&mut self, buf: &mut FragmentBuf<T>, coord: Coordinate, values: Values<T>) {
        if buf.is_full() {
            self.forward_full(buf);
        }
        buf.push(coord, values);
    }

    /// Forward `buf` as a non-terminal fragment and clear it.
    pub fn forward_full<T: Element>(&mut self, buf: &mut FragmentBuf<T>) {
        self.sent.fetch_add(1, Ordering::AcqRel);
        self.forward(buf, 0);
    }

    /// Forward `buf` as the terminal fragment, stamped with the total number
    /// of fragments emitted for this block, and reset the count. Returns the
    /// total.
    pub fn finish<T: Element>(&mut self, buf: &mut FragmentBuf<T>) -> u32 {
        let total = self.sent.fetch_add(1, Ordering::AcqRel) + 1;
        if total > MAX_FRAGMENTS_PER_BLOCK {
            tracing::error!(
                block_id = self.block.block_id,
                total,
                "fragment count exceeds the split index, parent cannot complete this block"
            );
        }
        self.forward(buf, total.min(MAX_FRAGMENTS_PER_BLOCK) as u8);
        self.sent.store(0, Ordering::Release);
        total
    }

    fn forward<T: Element>(&mut self, buf: &mut FragmentBuf<T>, split_index: u8) {
        let header = FragmentHeader {
            block_id: self.block.block_id,
            root_address: self.block.root_address,
            num_values: 0,
            split_index,
            port: self.block.port,
        };
        let len = buf.encode_into(self.layout, &header, self.wire);
        tracing::trace!(
            block_id = self.block.block_id,
            entries = buf.len(),
            split_index,
            "forwarding fragment"
        );
        self.forwarder.send(&self.wire[..len]);
        buf.clear();
    }
}

/// A slot's aggregation buffer.
pub trait Storage<T: Element>: Send + 'static {
    fn new(params: &StorageParams) -> Self;

    /// Reject fragments a buffer built from `params` cannot hold. Called
    /// before any lock is taken.
    fn validate(_params: &StorageParams, _fragment: &FragmentView<'_, T>) -> Result<()> {
        Ok(())
    }

    /// Fold every entry of `fragment` into the buffer.
    fn accumulate(&mut self, fragment: &FragmentView<'_, T>, emitter: &mut Emitter<'_>);

    /// Move the contents of `other` into `self`, leaving `other` empty.
    fn absorb(&mut self, other: &mut Self, emitter: &mut Emitter<'_>);

    /// Serialize every non-zero entry, ending with a terminal fragment, and
    /// reset the buffer. `assembly` is the calling core's outbound fragment.
    /// Returns the number of fragments emitted for the block.
    fn flush(&mut self, emitter: &mut Emitter<'_>, assembly: &mut FragmentBuf<T>) -> u32;

    /// True if no partial sum or pending entry is held.
    fn is_empty(&self) -> bool;
}

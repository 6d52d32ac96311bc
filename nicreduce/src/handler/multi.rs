use super::{HandleOutcome, HandlerContext, NodeState, PacketHandler};
use crate::arena::CoreStaging;
use crate::config::ReduceConfig;
use crate::error::Result;
use crate::protocol::FragmentHeader;
use crate::reduce::Element;
use crate::storage::{Emitter, Storage};
use crate::sync::{SpinGuard, SpinMutex};
use crate::transport::Forwarder;
use crate::types::BlockId;

/// N aggregation buffers per slot, each behind its own lock.
///
/// Fragments of the same block accumulate in parallel on different buffers.
/// The slot lock covers only the reassembly counters and the flush, which
/// first folds buffers `1..N` into buffer 0.
pub struct MultiBufferHandler<T, S> {
    node: NodeState<T, S>,
}

impl<T: Element, S: Storage<T>> MultiBufferHandler<T, S> {
    pub fn new(cfg: ReduceConfig) -> Result<Self> {
        Ok(Self {
            node: NodeState::new(cfg)?,
        })
    }
}

/// Claim the first free buffer; if all are busy, wait on the one picked by
/// the fragment header.
fn acquire<'s, B>(buffers: &'s [SpinMutex<B>], header: &FragmentHeader) -> SpinGuard<'s, B> {
    for buffer in buffers {
        if let Some(guard) = buffer.try_lock() {
            return guard;
        }
    }
    let pick = fallback_buffer(header, buffers.len());
    tracing::debug!(block_id = header.block_id, buffer = pick, "all buffers busy, waiting");
    buffers[pick].lock()
}

/// Pseudo-random buffer choice derived from the header, so that blocked
/// cores spread over the buffers instead of queueing on the first.
fn fallback_buffer(header: &FragmentHeader, buffers: usize) -> usize {
    let mix = header.block_id.wrapping_mul(0x9E37_79B9)
        ^ ((header.port as u32) << 8)
        ^ header.num_values as u32
        ^ ((header.split_index as u32) << 24);
    (mix >> 16) as usize % buffers
}

impl<T: Element, S: Storage<T>> PacketHandler for MultiBufferHandler<T, S> {
    fn handle(
        &self,
        ctx: HandlerContext,
        packet: &[u8],
        forwarder: &dyn Forwarder,
    ) -> Result<HandleOutcome> {
        let fragment = self.node.decode(packet)?;
        let header = *fragment.header();
        let pad = self.node.arena.cluster(ctx.cluster)?;
        let ring = self.node.arena.slot_index(header.block_id);
        let staging = pad.staging(ctx.core)?;
        let slot_lock = pad.slot_lock(ring)?;
        let slot = pad.slot(ring)?;
        let buffers = slot.buffers();

        let mut staging = staging.lock();
        let CoreStaging { assembly, wire } = &mut *staging;
        let mut emitter = Emitter::new(
            &self.node.layout,
            wire,
            forwarder,
            self.node.block_meta(&header),
            slot.sent(),
        );

        {
            let mut buffer = acquire(buffers, &header);
            buffer.accumulate(&fragment, &mut emitter);
        }
        tracing::trace!(
            block_id = header.block_id,
            port = header.port,
            entries = fragment.len(),
            "accumulated fragment"
        );

        let mut tracker = slot_lock.lock();
        let progress = tracker.record(header.port, header.split_index);
        Ok(HandleOutcome::from_progress(progress, || {
            // Every recorded fragment finished accumulating before it was
            // recorded, so the buffer locks taken here are uncontended.
            let mut first = buffers[0].lock();
            for other in &buffers[1..] {
                first.absorb(&mut other.lock(), &mut emitter);
            }
            let fragments = first.flush(&mut emitter, assembly);
            tracing::debug!(
                block_id = header.block_id,
                buffers = buffers.len(),
                fragments,
                "block flushed"
            );
            fragments
        }))
    }

    fn config(&self) -> &ReduceConfig {
        &self.node.cfg
    }

    fn slot_is_idle(&self, cluster: usize, block_id: BlockId) -> Result<bool> {
        self.node.slot_is_idle(cluster, block_id)
    }
}

use super::{HandleOutcome, HandlerContext, NodeState, PacketHandler};
use crate::arena::CoreStaging;
use crate::config::ReduceConfig;
use crate::error::Result;
use crate::reduce::Element;
use crate::storage::{Emitter, Storage};
use crate::transport::Forwarder;
use crate::types::BlockId;

/// One aggregation buffer per slot. The slot lock is held from accumulation
/// through the completion check and flush, so every fragment of a block is
/// handled strictly one at a time.
pub struct SingleBufferHandler<T, S> {
    node: NodeState<T, S>,
}

impl<T: Element, S: Storage<T>> SingleBufferHandler<T, S> {
    pub fn new(cfg: ReduceConfig) -> Result<Self> {
        Ok(Self {
            node: NodeState::new(cfg)?,
        })
    }
}

impl<T: Element, S: Storage<T>> PacketHandler for SingleBufferHandler<T, S> {
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

        let mut staging = staging.lock();
        let CoreStaging { assembly, wire } = &mut *staging;
        let mut emitter = Emitter::new(
            &self.node.layout,
            wire,
            forwarder,
            self.node.block_meta(&header),
            slot.sent(),
        );

        let mut tracker = slot_lock.lock();
        let mut buffer = slot.buffers()[0].lock();
        buffer.accumulate(&fragment, &mut emitter);
        tracing::trace!(
            block_id = header.block_id,
            port = header.port,
            entries = fragment.len(),
            "accumulated fragment"
        );

        let progress = tracker.record(header.port, header.split_index);
        Ok(HandleOutcome::from_progress(progress, || {
            let fragments = buffer.flush(&mut emitter, assembly);
            tracing::debug!(block_id = header.block_id, fragments, "block flushed");
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

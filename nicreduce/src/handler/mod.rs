//! Packet handler entry points.
//!
//! Per fragment: locate the slot of its block, fold the entries into an
//! aggregation buffer, record the fragment in the slot's reassembly counters
//! and, on the last fragment of the last child, flush the slot.
//!
//! Two locking disciplines are provided. [`SingleBufferHandler`] holds the
//! slot lock for the whole invocation. [`MultiBufferHandler`] accumulates
//! under one of N buffer locks and takes the slot lock only for accounting
//! and the flush.

mod multi;
mod single;

pub use multi::MultiBufferHandler;
pub use single::SingleBufferHandler;

use crate::arena::Arena;
use crate::config::ReduceConfig;
use crate::error::{NicReduceError, Result};
use crate::protocol::{FragmentHeader, FragmentView, WireLayout};
use crate::reassembly::Progress;
use crate::reduce::Element;
use crate::storage::{BlockMeta, DenseStorage, HashStorage, Storage, StorageParams};
use crate::transport::Forwarder;
use crate::types::{BlockId, DataType, HandlerVariant, StorageKind};

/// Where a handler invocation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HandlerContext {
    pub cluster: usize,
    pub core: usize,
}

/// Effect of one handled fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    /// Folded in; the sending child has more to deliver.
    Accumulated,
    /// The sending child is done with this block.
    ChildCompleted { completed: usize },
    /// Every child is done; the slot was flushed and reset.
    Flushed { fragments: u32 },
}

impl HandleOutcome {
    fn from_progress(progress: Progress, flush: impl FnOnce() -> u32) -> Self {
        match progress {
            Progress::Pending => HandleOutcome::Accumulated,
            Progress::ChildComplete { completed } => HandleOutcome::ChildCompleted { completed },
            Progress::BlockComplete => HandleOutcome::Flushed {
                fragments: flush(),
            },
        }
    }
}

/// A tree node's per-packet entry point. Invoked concurrently from any
/// number of cores.
pub trait PacketHandler: Send + Sync {
    /// Handle one arriving packet on `ctx.core` of `ctx.cluster`. Outbound
    /// fragments go to `forwarder`.
    fn handle(
        &self,
        ctx: HandlerContext,
        packet: &[u8],
        forwarder: &dyn Forwarder,
    ) -> Result<HandleOutcome>;

    fn config(&self) -> &ReduceConfig;

    /// True if the slot `block_id` maps to in `cluster` holds no state.
    fn slot_is_idle(&self, cluster: usize, block_id: BlockId) -> Result<bool>;
}

/// Build the handler selected by `cfg`.
pub fn build_handler(cfg: &ReduceConfig) -> Result<Box<dyn PacketHandler>> {
    cfg.validate()?;
    match cfg.dtype {
        DataType::I32 => build_typed::<i32>(cfg),
        DataType::I16 => build_typed::<i16>(cfg),
        DataType::I8 => build_typed::<i8>(cfg),
        DataType::F32 => build_typed::<f32>(cfg),
    }
}

fn build_typed<T: Element>(cfg: &ReduceConfig) -> Result<Box<dyn PacketHandler>> {
    let cfg = cfg.clone();
    Ok(match (cfg.variant, cfg.storage) {
        (HandlerVariant::SingleBuffer, StorageKind::Dense) => {
            Box::new(SingleBufferHandler::<T, DenseStorage<T>>::new(cfg)?)
        }
        (HandlerVariant::SingleBuffer, StorageKind::Hash) => {
            Box::new(SingleBufferHandler::<T, HashStorage<T>>::new(cfg)?)
        }
        (HandlerVariant::MultiBuffer, StorageKind::Dense) => {
            Box::new(MultiBufferHandler::<T, DenseStorage<T>>::new(cfg)?)
        }
        (HandlerVariant::MultiBuffer, StorageKind::Hash) => {
            Box::new(MultiBufferHandler::<T, HashStorage<T>>::new(cfg)?)
        }
    })
}

/// State shared by both handler variants.
struct NodeState<T, S> {
    cfg: ReduceConfig,
    layout: WireLayout,
    params: StorageParams,
    arena: Arena<T, S>,
}

impl<T: Element, S: Storage<T>> NodeState<T, S> {
    fn new(cfg: ReduceConfig) -> Result<Self> {
        cfg.validate()?;
        if T::DTYPE != cfg.dtype {
            return Err(NicReduceError::DataTypeMismatch {
                configured: cfg.dtype,
                requested: T::DTYPE,
            });
        }
        Ok(Self {
            layout: cfg.wire_layout(),
            params: StorageParams::from_config(&cfg),
            arena: Arena::new(&cfg),
            cfg,
        })
    }

    /// Parse and bounds-check a fragment before any lock is taken.
    fn decode<'p>(&self, packet: &'p [u8]) -> Result<FragmentView<'p, T>> {
        let fragment = FragmentView::decode(self.layout, packet).and_then(|f| {
            let port = f.header().port as usize;
            if port >= self.cfg.num_children {
                return Err(NicReduceError::decode(format!(
                    "block {}: port {port} outside fan-in {}",
                    f.header().block_id,
                    self.cfg.num_children
                )));
            }
            S::validate(&self.params, &f)?;
            Ok(f)
        });
        fragment.inspect_err(|e| tracing::warn!(error = %e, "dropping malformed fragment"))
    }

    fn block_meta(&self, header: &FragmentHeader) -> BlockMeta {
        BlockMeta {
            block_id: header.block_id,
            root_address: header.root_address,
            port: self.cfg.uplink_port,
        }
    }

    fn slot_is_idle(&self, cluster: usize, block_id: BlockId) -> Result<bool> {
        self.arena
            .cluster(cluster)?
            .slot_is_idle(self.arena.slot_index(block_id))
    }
}

//! Packet delivery onto cluster cores.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{NicReduceError, Result};
use crate::handler::{HandleOutcome, HandlerContext, PacketHandler};
use crate::protocol::FragmentHeader;
use crate::transport::{CorePool, Forwarder};
use crate::types::BlockId;

/// Counts of handler outcomes over a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    pub delivered: usize,
    pub accumulated: usize,
    pub children_completed: usize,
    pub flushes: usize,
    /// Outbound fragments reported by the flushes.
    pub fragments_flushed: u64,
}

impl ReplayStats {
    fn record(&mut self, outcome: HandleOutcome) {
        self.delivered += 1;
        match outcome {
            HandleOutcome::Accumulated => self.accumulated += 1,
            HandleOutcome::ChildCompleted { .. } => self.children_completed += 1,
            HandleOutcome::Flushed { fragments } => {
                self.children_completed += 1;
                self.flushes += 1;
                self.fragments_flushed += fragments as u64;
            }
        }
    }

    fn merge(&mut self, other: ReplayStats) {
        self.delivered += other.delivered;
        self.accumulated += other.accumulated;
        self.children_completed += other.children_completed;
        self.flushes += other.flushes;
        self.fragments_flushed += other.fragments_flushed;
    }
}

/// Routes each packet to the cluster owning its block and runs the handler
/// on a free core of that cluster.
#[derive(Clone)]
pub struct Engine {
    handler: Arc<dyn PacketHandler>,
    pools: Vec<Arc<CorePool>>,
}

impl Engine {
    pub fn new(handler: Arc<dyn PacketHandler>) -> Self {
        let cfg = handler.config();
        let pools = (0..cfg.num_clusters)
            .map(|_| CorePool::new(cfg.cores_per_cluster))
            .collect();
        Self { handler, pools }
    }

    pub fn handler(&self) -> &Arc<dyn PacketHandler> {
        &self.handler
    }

    /// Cluster that owns `block_id`.
    pub fn cluster_of(&self, block_id: BlockId) -> usize {
        block_id as usize % self.pools.len()
    }

    /// Deliver one packet, blocking until a core of its cluster is free.
    pub fn deliver(&self, packet: &[u8], forwarder: &dyn Forwarder) -> Result<HandleOutcome> {
        let header = FragmentHeader::from_packet(packet)?;
        let cluster = self.cluster_of(header.block_id);
        let lease = self.pools[cluster].checkout();
        let ctx = HandlerContext {
            cluster,
            core: lease.core(),
        };
        self.handler.handle(ctx, packet, forwarder)
    }

    /// Deliver `packets` in order on one thread, or pulled concurrently by
    /// `workers` threads. Stops at the first error.
    pub fn replay<P>(&self, packets: &[P], workers: usize, forwarder: &dyn Forwarder) -> Result<ReplayStats>
    where
        P: AsRef<[u8]> + Sync,
    {
        if workers <= 1 {
            let mut stats = ReplayStats::default();
            for packet in packets {
                stats.record(self.deliver(packet.as_ref(), forwarder)?);
            }
            return Ok(stats);
        }

        let cursor = &AtomicUsize::new(0);
        let results: Vec<Result<ReplayStats>> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    scope.spawn(move || {
                        let mut stats = ReplayStats::default();
                        loop {
                            let i = cursor.fetch_add(1, Ordering::Relaxed);
                            let Some(packet) = packets.get(i) else {
                                return Ok(stats);
                            };
                            match self.deliver(packet.as_ref(), forwarder) {
                                Ok(outcome) => stats.record(outcome),
                                Err(e) => {
                                    cursor.store(packets.len(), Ordering::Relaxed);
                                    return Err(e);
                                }
                            }
                        }
                    })
                })
                .collect();
            handles
                .into_iter()
                .map(|h| {
                    h.join()
                        .unwrap_or_else(|_| Err(NicReduceError::TaskFailed("replay worker panicked".into())))
                })
                .collect()
        });

        let mut total = ReplayStats::default();
        for result in results {
            total.merge(result?);
        }
        tracing::debug!(
            workers,
            delivered = total.delivered,
            flushes = total.flushes,
            "replay finished"
        );
        Ok(total)
    }
}

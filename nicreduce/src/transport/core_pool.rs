use crossbeam_queue::ArrayQueue;
use std::sync::Arc;

/// Lock-free pool of the core ids of one processing cluster.
///
/// A packet is handled on a checked-out core; the core's staging buffer is
/// therefore never shared. Checkout spins while every core is busy, like a
/// packet waiting in the cluster's ingress queue.
pub struct CorePool {
    free: ArrayQueue<usize>,
}

impl CorePool {
    pub fn new(cores: usize) -> Arc<Self> {
        let free = ArrayQueue::new(cores.max(1));
        for core in 0..cores {
            let _ = free.push(core);
        }
        Arc::new(Self { free })
    }

    /// Cores not currently checked out.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Take a free core, returning `None` if all are busy.
    pub fn try_checkout(self: &Arc<Self>) -> Option<CoreLease> {
        let core = self.free.pop()?;
        Some(CoreLease {
            core,
            pool: Arc::clone(self),
        })
    }

    /// Take a free core, spinning until one is returned.
    pub fn checkout(self: &Arc<Self>) -> CoreLease {
        loop {
            if let Some(lease) = self.try_checkout() {
                return lease;
            }
            std::hint::spin_loop();
        }
    }
}

/// A core checked out from a [`CorePool`]. Returned on drop.
pub struct CoreLease {
    core: usize,
    pool: Arc<CorePool>,
}

impl CoreLease {
    pub fn core(&self) -> usize {
        self.core
    }
}

impl Drop for CoreLease {
    fn drop(&mut self) {
        let _ = self.pool.free.push(self.core);
    }
}

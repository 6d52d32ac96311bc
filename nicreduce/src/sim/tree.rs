//! Two-level reduction tree: leaf nodes forward into one root node.

use std::sync::Arc;

use tokio::task::JoinError;

use super::Engine;
use crate::config::ReduceConfig;
use crate::error::{NicReduceError, Result};
use crate::handler::build_handler;
use crate::transport::{CaptureForwarder, ChannelForwarder};

/// Leaves and root of a two-level tree, all built from one configuration.
///
/// Leaf `i` stamps its forwarded fragments with port `i`, so the root sees
/// every leaf as one child edge.
pub struct ReductionTree {
    leaves: Vec<Engine>,
    root: Engine,
}

fn task_failed(e: JoinError) -> NicReduceError {
    NicReduceError::TaskFailed(e.to_string())
}

impl ReductionTree {
    /// `cfg` describes a leaf; the root differs only in its fan-in.
    pub fn new(cfg: &ReduceConfig, num_leaves: usize) -> Result<Self> {
        let root_cfg = ReduceConfig {
            num_children: num_leaves,
            ..cfg.clone()
        };
        let root = Engine::new(Arc::from(build_handler(&root_cfg)?));

        let leaves = (0..num_leaves)
            .map(|i| {
                let leaf_cfg = ReduceConfig {
                    uplink_port: i as u8,
                    ..cfg.clone()
                };
                Ok(Engine::new(Arc::from(build_handler(&leaf_cfg)?)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { leaves, root })
    }

    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    /// Replay `leaf_traffic[i]` into leaf `i` while the root ingests
    /// whatever the leaves forward. Returns the packets the root emitted.
    pub async fn run(self, leaf_traffic: Vec<Vec<Vec<u8>>>) -> Result<Vec<Vec<u8>>> {
        if leaf_traffic.len() != self.leaves.len() {
            return Err(NicReduceError::config(format!(
                "traffic for {} leaves, tree has {}",
                leaf_traffic.len(),
                self.leaves.len()
            )));
        }

        let (uplink, mut rx) = ChannelForwarder::channel();
        let captured = Arc::new(CaptureForwarder::new());

        let root = self.root.clone();
        let sink = Arc::clone(&captured);
        let root_task = tokio::task::spawn_blocking(move || -> Result<usize> {
            let mut delivered = 0;
            while let Some(packet) = rx.blocking_recv() {
                root.deliver(&packet, &*sink)?;
                delivered += 1;
            }
            Ok(delivered)
        });

        let num_leaves = self.leaves.len();
        let mut leaf_tasks = Vec::with_capacity(num_leaves);
        for (engine, packets) in self.leaves.into_iter().zip(leaf_traffic) {
            let uplink = uplink.clone();
            leaf_tasks.push(tokio::task::spawn_blocking(move || {
                engine.replay(&packets, 1, &uplink)
            }));
        }
        drop(uplink);

        for task in leaf_tasks {
            task.await.map_err(task_failed)??;
        }
        let delivered = root_task.await.map_err(task_failed)??;
        tracing::debug!(
            leaves = num_leaves,
            delivered,
            emitted = captured.len(),
            "reduction tree drained"
        );
        Ok(captured.take())
    }
}

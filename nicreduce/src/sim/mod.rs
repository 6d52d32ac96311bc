//! Simulated substrate around the packet handlers.
//!
//! [`TrafficGenerator`] synthesizes per-port sparse fragments with known
//! sums, [`Engine`] delivers packets to a handler on cluster cores, and
//! [`ReductionTree`] chains nodes so one node's output feeds its parent.

mod engine;
mod traffic;
mod tree;

use std::collections::BTreeMap;

pub use engine::{Engine, ReplayStats};
pub use traffic::{Arrival, Traffic, TrafficConfig, TrafficGenerator};
pub use tree::ReductionTree;

use crate::error::Result;
use crate::protocol::{FragmentView, WireLayout};
use crate::reduce::{self, Element, Values};
use crate::types::{BlockId, Coordinate};

/// Per `(block, coordinate)` sums, the form expected results are kept in.
pub type BlockSums<T> = BTreeMap<(BlockId, Coordinate), Values<T>>;

/// Sum every entry of `packets` per block and coordinate. Duplicate
/// coordinates, e.g. from stash fragments, are added together.
pub fn collect_sums<T, P>(layout: WireLayout, packets: impl IntoIterator<Item = P>) -> Result<BlockSums<T>>
where
    T: Element,
    P: AsRef<[u8]>,
{
    let mut sums = BlockSums::new();
    for packet in packets {
        let view = FragmentView::<T>::decode(layout, packet.as_ref())?;
        let block_id = view.header().block_id;
        for (coord, values) in view.entries() {
            let cell = sums.entry((block_id, coord)).or_insert_with(Default::default);
            reduce::add_into(cell, &values);
        }
    }
    sums.retain(|_, v| !reduce::is_absent(v));
    Ok(sums)
}

//! Per-port fragment accounting that decides when a block is complete.

use crate::types::PortId;

/// What one recorded fragment did to its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More fragments are due from this port.
    Pending,
    /// This port delivered everything; `completed` children are done so far.
    ChildComplete { completed: usize },
    /// The last fragment of the last child. The tracker has been reset and
    /// the caller must flush.
    BlockComplete,
}

/// Fragment counters of one slot. Mutated only under the slot lock.
///
/// A port's expected count is unknown (zero) until its terminal fragment
/// arrives, so the terminal fragment may be recorded before the others.
#[derive(Debug, Clone)]
pub struct ReassemblyTracker {
    expected: Vec<u16>,
    received: Vec<u16>,
    completed: usize,
    fan_in: usize,
}

impl ReassemblyTracker {
    pub fn new(fan_in: usize) -> Self {
        Self {
            expected: vec![0; fan_in],
            received: vec![0; fan_in],
            completed: 0,
            fan_in,
        }
    }

    /// Children that have fully delivered the current block.
    pub fn completed(&self) -> usize {
        self.completed
    }

    /// Record one fragment from `port`. `split_index` is non-zero only on
    /// the terminal fragment, where it carries that port's fragment count.
    pub fn record(&mut self, port: PortId, split_index: u8) -> Progress {
        let p = port as usize;
        self.received[p] += 1;
        if split_index != 0 {
            self.expected[p] = split_index as u16;
        }
        if self.expected[p] == 0 || self.received[p] != self.expected[p] {
            return Progress::Pending;
        }

        self.expected[p] = 0;
        self.received[p] = 0;
        self.completed += 1;
        if self.completed == self.fan_in {
            self.completed = 0;
            Progress::BlockComplete
        } else {
            Progress::ChildComplete {
                completed: self.completed,
            }
        }
    }

    /// True when no fragment of an unfinished block has been recorded.
    pub fn is_idle(&self) -> bool {
        self.completed == 0
            && self.expected.iter().all(|&e| e == 0)
            && self.received.iter().all(|&r| r == 0)
    }
}

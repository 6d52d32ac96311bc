//! Synthetic sparse traffic for one tree node.

use rand::SeedableRng;
use rand::distributions::{Bernoulli, Distribution};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand_distr::Exp;

use super::BlockSums;
use crate::config::ReduceConfig;
use crate::error::{NicReduceError, Result};
use crate::protocol::{FragmentBuf, FragmentHeader, WireLayout};
use crate::reduce::{self, Element, MAX_ARITY, Values};
use crate::types::{BlockId, Coordinate, PortId};

/// Shape of the generated traffic.
#[derive(Debug, Clone, PartialEq)]
pub struct TrafficConfig {
    /// Independent streams; stream `s` owns block ids
    /// `s * num_blocks .. (s + 1) * num_blocks`.
    pub num_streams: usize,
    /// Blocks per stream.
    pub num_blocks: usize,
    /// Sending children, one per port `0..num_ports`.
    pub num_ports: usize,
    /// Expected coordinates per non-zero.
    pub nonzero_ratio: usize,
    /// Value of every generated non-zero component.
    pub value: i8,
    /// Start port `p` at block `p * num_blocks / num_ports` instead of 0.
    pub staggered: bool,
    /// Aggregate ingress bandwidth shared by all ports and streams.
    pub link_gbps: f64,
    pub root_address: u32,
    pub seed: u64,
}

impl Default for TrafficConfig {
    fn default() -> Self {
        Self {
            num_streams: 1,
            num_blocks: 32,
            num_ports: 16,
            nonzero_ratio: 100,
            value: 1,
            staggered: false,
            link_gbps: 400.0,
            root_address: 0,
            seed: 0x5EED,
        }
    }
}

impl TrafficConfig {
    /// Traffic matching a node's fan-in and density.
    pub fn for_node(cfg: &ReduceConfig) -> Self {
        Self {
            num_ports: cfg.num_children,
            nonzero_ratio: cfg.nonzero_ratio,
            ..Self::default()
        }
    }
}

/// One packet and when it reaches the node.
#[derive(Debug, Clone)]
pub struct Arrival {
    pub time_ns: f64,
    pub port: PortId,
    pub block_id: BlockId,
    pub packet: Vec<u8>,
}

/// Generated packets in arrival order, with the sums a correct tree must
/// produce.
#[derive(Debug, Clone)]
pub struct Traffic<T> {
    pub arrivals: Vec<Arrival>,
    pub expected: BlockSums<T>,
}

impl<T: Element> Traffic<T> {
    pub fn packets(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.arrivals.iter().map(|a| a.packet.as_slice())
    }

    /// Permute the arrival order. Sums are unaffected.
    pub fn shuffle(&mut self, seed: u64) {
        self.arrivals.shuffle(&mut StdRng::seed_from_u64(seed));
    }

    /// Reverse the arrival order, so terminal fragments arrive first.
    pub fn reverse(&mut self) {
        self.arrivals.reverse();
    }

    /// Blocks in the traffic.
    pub fn blocks(&self) -> Vec<BlockId> {
        let mut ids: Vec<BlockId> = self.arrivals.iter().map(|a| a.block_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Builds [`Traffic`] for a node configuration.
#[derive(Debug, Clone)]
pub struct TrafficGenerator {
    traffic: TrafficConfig,
    layout: WireLayout,
    block_range: usize,
}

impl TrafficGenerator {
    /// Rejects traffic the node cannot hold: more ports than its fan-in, or
    /// more blocks in flight than it has slots, which would recycle a slot
    /// before its block completed.
    pub fn new(node: &ReduceConfig, traffic: TrafficConfig) -> Result<Self> {
        node.validate()?;
        if traffic.num_ports == 0 || traffic.num_ports > node.num_children {
            return Err(NicReduceError::config(format!(
                "traffic uses {} ports, node fan-in is {}",
                traffic.num_ports, node.num_children
            )));
        }
        if traffic.num_ports != node.num_children {
            tracing::warn!(
                ports = traffic.num_ports,
                fan_in = node.num_children,
                "fewer ports than fan-in, blocks will never complete"
            );
        }
        let blocks = traffic.num_streams * traffic.num_blocks;
        if blocks == 0 || blocks > node.in_flight_capacity() {
            return Err(NicReduceError::config(format!(
                "{blocks} blocks in flight, node has {} slots",
                node.in_flight_capacity()
            )));
        }
        if traffic.nonzero_ratio == 0 || traffic.link_gbps.is_nan() || traffic.link_gbps <= 0.0 {
            return Err(NicReduceError::config(
                "nonzero_ratio and link_gbps must be positive",
            ));
        }
        if traffic.value == 0 {
            return Err(NicReduceError::config("a zero value would be read as absent"));
        }
        Ok(Self {
            layout: node.wire_layout(),
            block_range: node.block_range(),
            traffic,
        })
    }

    /// Mean gap between two packets of one port, in nanoseconds.
    pub fn mean_interdeparture_ns(&self) -> f64 {
        let port_gbps =
            self.traffic.link_gbps / self.traffic.num_ports as f64 / self.traffic.num_streams as f64;
        (self.layout.packet_size() * 8) as f64 / port_gbps
    }

    pub fn generate<T: Element>(&self) -> Result<Traffic<T>> {
        if T::DTYPE != self.layout.dtype() {
            return Err(NicReduceError::DataTypeMismatch {
                configured: self.layout.dtype(),
                requested: T::DTYPE,
            });
        }
        let cfg = &self.traffic;
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let gap = Exp::new(1.0 / self.mean_interdeparture_ns())
            .map_err(|e| NicReduceError::config(format!("inter-departure distribution: {e}")))?;
        let nonzero = Bernoulli::new(1.0 / cfg.nonzero_ratio as f64)
            .map_err(|e| NicReduceError::config(format!("non-zero distribution: {e}")))?;

        let mut values = [T::default(); MAX_ARITY];
        for v in values.iter_mut().take(self.layout.arity()) {
            *v = T::from_i8(cfg.value);
        }

        let mut arrivals = Vec::new();
        let mut expected = BlockSums::new();
        let mut coords: Vec<Coordinate> = Vec::with_capacity(self.block_range);
        for stream in 0..cfg.num_streams {
            for port in 0..cfg.num_ports {
                let start = if cfg.staggered {
                    port * (cfg.num_blocks / cfg.num_ports)
                } else {
                    0
                };
                let mut time_ns = 0.0;
                for k in 0..cfg.num_blocks {
                    time_ns += gap.sample(&mut rng);
                    let block_id = (stream * cfg.num_blocks + (start + k) % cfg.num_blocks) as BlockId;

                    coords.clear();
                    coords.extend(
                        (0..self.block_range)
                            .filter(|_| nonzero.sample(&mut rng))
                            .map(|c| c as Coordinate),
                    );
                    if coords.is_empty() {
                        coords.push(0);
                    }
                    for &c in &coords {
                        let cell = expected.entry((block_id, c)).or_insert_with(Default::default);
                        reduce::add_into(cell, &values);
                    }

                    let header = FragmentHeader {
                        block_id,
                        root_address: cfg.root_address,
                        port: port as PortId,
                        ..Default::default()
                    };
                    for packet in self.split(&coords, values, header) {
                        arrivals.push(Arrival {
                            time_ns,
                            port: port as PortId,
                            block_id,
                            packet,
                        });
                    }
                }
            }
        }
        // Stable: fragments of one transmission keep their order.
        arrivals.sort_by(|a, b| a.time_ns.total_cmp(&b.time_ns));
        expected.retain(|_, v| !reduce::is_absent(v));

        tracing::debug!(
            packets = arrivals.len(),
            blocks = cfg.num_streams * cfg.num_blocks,
            nonzeros = expected.len(),
            "generated traffic"
        );
        Ok(Traffic { arrivals, expected })
    }

    /// Split one child's non-zeros into full fragments plus a terminal one
    /// carrying the fragment count.
    fn split<T: Element>(
        &self,
        coords: &[Coordinate],
        values: Values<T>,
        header: FragmentHeader,
    ) -> Vec<Vec<u8>> {
        let chunks: Vec<&[Coordinate]> = coords.chunks(self.layout.max_entries()).collect();
        let total = chunks.len();
        let mut buf = FragmentBuf::for_layout(&self.layout);
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                buf.clear();
                for &c in chunk {
                    buf.push(c, values);
                }
                let split_index = if i + 1 == total { total as u8 } else { 0 };
                buf.to_packet(
                    &self.layout,
                    &FragmentHeader {
                        split_index,
                        ..header
                    },
                )
            })
            .collect()
    }
}

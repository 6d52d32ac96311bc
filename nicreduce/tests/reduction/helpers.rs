use std::collections::BTreeMap;
use std::sync::Arc;

use nicreduce::sim::{BlockSums, ReplayStats, Traffic, collect_sums};
use nicreduce::{
    BlockId, CaptureForwarder, Coordinate, Element, Engine, FragmentBuf, FragmentHeader,
    FragmentView, HandlerVariant, PortId, ReduceConfig, StorageKind, TrafficConfig,
    TrafficGenerator, Values, build_handler,
};

/// A node small enough to keep tests fast: fan-in 4, 2 clusters of 4 cores,
/// 8 slots each.
pub fn small_node(storage: StorageKind, variant: HandlerVariant) -> ReduceConfig {
    ReduceConfig {
        num_children: 4,
        num_clusters: 2,
        cores_per_cluster: 4,
        ring_size: 8,
        storage,
        variant,
        ..ReduceConfig::default()
    }
}

pub fn engine(cfg: &ReduceConfig) -> Engine {
    Engine::new(Arc::from(build_handler(cfg).unwrap()))
}

/// Traffic from every port of `cfg` over `num_blocks` blocks.
pub fn traffic<T: Element>(cfg: &ReduceConfig, num_blocks: usize, nonzero_ratio: usize, seed: u64) -> Traffic<T> {
    TrafficGenerator::new(
        cfg,
        TrafficConfig {
            num_blocks,
            num_ports: cfg.num_children,
            nonzero_ratio,
            seed,
            ..TrafficConfig::default()
        },
    )
    .unwrap()
    .generate::<T>()
    .unwrap()
}

/// Replay `packets` on a fresh node and return its stats and output.
pub fn reduce<P>(cfg: &ReduceConfig, packets: &[P], workers: usize) -> (ReplayStats, Vec<Vec<u8>>)
where
    P: AsRef<[u8]> + Sync,
{
    let engine = engine(cfg);
    let forwarder = CaptureForwarder::new();
    let stats = engine.replay(packets, workers, &forwarder).unwrap();
    (stats, forwarder.take())
}

/// Replay `traffic` and check that the output sums to the expected values.
pub fn assert_reduces<T: Element>(cfg: &ReduceConfig, traffic: &Traffic<T>, workers: usize) -> Vec<Vec<u8>> {
    let packets: Vec<&[u8]> = traffic.packets().collect();
    let (stats, output) = reduce(cfg, &packets, workers);
    assert_eq!(stats.delivered, packets.len());
    assert_eq!(stats.flushes, traffic.blocks().len());
    assert_eq!(sums::<T>(cfg, &output), traffic.expected);
    output
}

pub fn sums<T: Element>(cfg: &ReduceConfig, packets: &[Vec<u8>]) -> BlockSums<T> {
    collect_sums::<T, _>(cfg.wire_layout(), packets).unwrap()
}

/// Headers of `packets`, grouped by block in emission order.
pub fn headers_by_block(packets: &[Vec<u8>]) -> BTreeMap<BlockId, Vec<FragmentHeader>> {
    let mut blocks: BTreeMap<BlockId, Vec<FragmentHeader>> = BTreeMap::new();
    for packet in packets {
        let header = FragmentHeader::from_packet(packet).unwrap();
        blocks.entry(header.block_id).or_default().push(header);
    }
    blocks
}

/// Entries of one decoded packet.
pub fn entries<T: Element>(cfg: &ReduceConfig, packet: &[u8]) -> Vec<(Coordinate, Values<T>)> {
    FragmentView::<T>::decode(cfg.wire_layout(), packet)
        .unwrap()
        .entries()
        .collect()
}

/// Every entry of `packets` tagged with its block, sorted.
pub fn sorted_entries<T: Element + Ord>(cfg: &ReduceConfig, packets: &[Vec<u8>]) -> Vec<(BlockId, Coordinate, Values<T>)> {
    let mut all: Vec<_> = packets
        .iter()
        .flat_map(|packet| {
            let block_id = FragmentHeader::from_packet(packet).unwrap().block_id;
            entries::<T>(cfg, packet).into_iter().map(move |(c, v)| (block_id, c, v))
        })
        .collect();
    all.sort();
    all
}

/// What one child sends for a block: full fragments, then a terminal one
/// carrying the fragment count. No entries still yields a terminal fragment.
pub fn child_fragments<T: Element>(
    cfg: &ReduceConfig,
    block_id: BlockId,
    port: PortId,
    entries: &[(Coordinate, Values<T>)],
) -> Vec<Vec<u8>> {
    let layout = cfg.wire_layout();
    let mut chunks: Vec<&[(Coordinate, Values<T>)]> = entries.chunks(layout.max_entries()).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }
    let total = chunks.len();
    let mut buf = FragmentBuf::for_layout(&layout);
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, chunk)| {
            buf.clear();
            for &(c, v) in chunk {
                buf.push(c, v);
            }
            let header = FragmentHeader {
                block_id,
                split_index: if i + 1 == total { total as u8 } else { 0 },
                port,
                ..Default::default()
            };
            buf.to_packet(&layout, &header)
        })
        .collect()
}

use super::helpers::*;
use nicreduce::sim::Traffic;
use nicreduce::{CaptureForwarder, HandlerVariant, ReduceConfig, StorageKind};

/// Every block flushed exactly once, its terminal fragment last and
/// carrying the number of fragments emitted for it.
fn assert_complete(cfg: &ReduceConfig, traffic: &Traffic<i32>, workers: usize) {
    let engine = engine(cfg);
    let forwarder = CaptureForwarder::new();
    let packets: Vec<&[u8]> = traffic.packets().collect();
    let stats = engine.replay(&packets, workers, &forwarder).unwrap();
    assert_eq!(stats.flushes, traffic.blocks().len());

    let output = forwarder.take();
    assert_eq!(sums::<i32>(cfg, &output), traffic.expected);
    let blocks = headers_by_block(&output);
    assert_eq!(blocks.keys().copied().collect::<Vec<_>>(), traffic.blocks());
    for (block_id, headers) in blocks {
        let (last, rest) = headers.split_last().unwrap();
        assert_eq!(last.split_index as usize, headers.len(), "block {block_id}");
        assert!(rest.iter().all(|h| h.split_index == 0), "block {block_id}");
    }

    for block_id in traffic.blocks() {
        assert!(engine.handler().slot_is_idle(engine.cluster_of(block_id), block_id).unwrap());
    }
}

fn all_nodes() -> Vec<ReduceConfig> {
    let mut nodes = Vec::new();
    for storage in [StorageKind::Dense, StorageKind::Hash] {
        for variant in [HandlerVariant::SingleBuffer, HandlerVariant::MultiBuffer] {
            nodes.push(small_node(storage, variant));
        }
    }
    nodes
}

#[test]
fn test_in_order_arrival() {
    for cfg in all_nodes() {
        assert_complete(&cfg, &traffic::<i32>(&cfg, 16, 20, 31), 1);
    }
}

#[test]
fn test_terminal_fragments_first() {
    for cfg in all_nodes() {
        let mut traffic = traffic::<i32>(&cfg, 16, 20, 32);
        traffic.reverse();
        assert_complete(&cfg, &traffic, 1);
    }
}

#[test]
fn test_shuffled_arrival() {
    for cfg in all_nodes() {
        let mut traffic = traffic::<i32>(&cfg, 16, 20, 33);
        traffic.shuffle(7);
        assert_complete(&cfg, &traffic, 4);
    }
}

#[test]
fn test_incomplete_block_not_flushed() {
    let cfg = small_node(StorageKind::Dense, HandlerVariant::SingleBuffer);
    let engine = engine(&cfg);
    let forwarder = CaptureForwarder::new();

    // Ports 0 to 2 deliver everything, port 3 only its first fragment.
    let entries: Vec<_> = (0..=cfg.max_entries_per_fragment()).map(|c| (c as u16, [1, 0])).collect();
    for port in 0..3 {
        for packet in child_fragments::<i32>(&cfg, 2, port, &entries) {
            engine.deliver(&packet, &forwarder).unwrap();
        }
    }
    let last = child_fragments::<i32>(&cfg, 2, 3, &entries);
    assert_eq!(last.len(), 2);
    engine.deliver(&last[0], &forwarder).unwrap();
    assert!(forwarder.is_empty());
    assert!(!engine.handler().slot_is_idle(0, 2).unwrap());

    engine.deliver(&last[1], &forwarder).unwrap();
    assert!(engine.handler().slot_is_idle(0, 2).unwrap());
    let sums = sums::<i32>(&cfg, &forwarder.take());
    assert_eq!(sums.len(), entries.len());
    assert!(sums.values().all(|v| *v == [4, 0]));
}

use super::helpers::*;
use nicreduce::{Coordinate, DataType, HandlerVariant, ReduceConfig, StorageKind, Values};

fn node() -> ReduceConfig {
    small_node(StorageKind::Dense, HandlerVariant::SingleBuffer)
}

#[test]
fn test_dense_sums_four_ports() {
    let cfg = node();
    assert_reduces(&cfg, &traffic::<i32>(&cfg, 12, 10, 1), 1);
}

#[test]
fn test_dense_sums_parallel_cores() {
    let cfg = node();
    assert_reduces(&cfg, &traffic::<i32>(&cfg, 16, 10, 2), 8);
}

#[test]
fn test_dense_pairs_i16() {
    let cfg = ReduceConfig {
        dtype: DataType::I16,
        values_per_element: 2,
        ..node()
    };
    assert_reduces(&cfg, &traffic::<i16>(&cfg, 8, 20, 3), 4);
}

#[test]
fn test_dense_f32_without_simd() {
    let cfg = ReduceConfig {
        dtype: DataType::F32,
        use_simd: false,
        ..node()
    };
    assert_reduces(&cfg, &traffic::<f32>(&cfg, 8, 20, 4), 1);
}

/// Output of a single child forwarding `count` non-zeros of block 0.
fn forwarded(count: usize) -> Vec<Vec<u8>> {
    let cfg = ReduceConfig {
        num_children: 1,
        ..node()
    };
    let entries: Vec<(Coordinate, Values<i32>)> = (0..count).map(|c| (c as Coordinate, [1, 0])).collect();
    let packets = child_fragments(&cfg, 0, 0, &entries);
    let (stats, output) = reduce(&cfg, &packets, 1);
    assert_eq!(stats.flushes, 1);
    output
}

#[test]
fn test_output_fragment_count() {
    let cap = node().max_entries_per_fragment();

    for (count, fragments) in [(1, 1), (cap, 1), (cap + 1, 2), (2 * cap, 2), (2 * cap + 5, 3)] {
        let output = forwarded(count);
        assert_eq!(output.len(), fragments, "{count} non-zeros");

        let headers = headers_by_block(&output).remove(&0).unwrap();
        let (last, rest) = headers.split_last().unwrap();
        assert_eq!(last.split_index as usize, fragments);
        assert!(rest.iter().all(|h| h.split_index == 0));
        // Every fragment but the last is full.
        assert!(rest.iter().all(|h| h.num_values as usize == cap));
        assert_eq!(headers.iter().map(|h| h.num_values as usize).sum::<usize>(), count);
    }
}

#[test]
fn test_empty_block_still_terminates() {
    let output = forwarded(0);
    assert_eq!(output.len(), 1);
    let header = headers_by_block(&output).remove(&0).unwrap()[0];
    assert_eq!(header.num_values, 0);
    assert_eq!(header.split_index, 1);
}

#[test]
fn test_flush_emits_coordinates_in_order() {
    let cfg = ReduceConfig {
        num_children: 2,
        ..node()
    };
    let mut packets = child_fragments::<i32>(&cfg, 3, 0, &[(40, [2, 0]), (7, [1, 0])]);
    packets.extend(child_fragments::<i32>(&cfg, 3, 1, &[(7, [-1, 0]), (9, [5, 0])]));
    let (_, output) = reduce(&cfg, &packets, 1);

    assert_eq!(output.len(), 1);
    // Coordinate 7 cancelled to zero and is absent.
    assert_eq!(entries::<i32>(&cfg, &output[0]), vec![(9, [5, 0]), (40, [2, 0])]);
}

#[test]
fn test_slot_reused_after_flush() {
    let cfg = ReduceConfig {
        num_children: 2,
        ..node()
    };
    let engine = engine(&cfg);
    let forwarder = nicreduce::CaptureForwarder::new();
    // Both blocks land on ring slot 0 of cluster 0.
    let reuse = cfg.in_flight_capacity() as u32;
    assert_eq!(engine.cluster_of(reuse), engine.cluster_of(0));

    for block_id in [0, reuse] {
        let value = if block_id == 0 { 3 } else { 4 };
        for port in 0..2 {
            for packet in child_fragments::<i32>(&cfg, block_id, port, &[(11, [value, 0])]) {
                engine.deliver(&packet, &forwarder).unwrap();
            }
        }
        assert!(engine.handler().slot_is_idle(0, block_id).unwrap());
    }

    let output = forwarder.take();
    assert_eq!(output.len(), 2);
    assert_eq!(entries::<i32>(&cfg, &output[0]), vec![(11, [6, 0])]);
    assert_eq!(entries::<i32>(&cfg, &output[1]), vec![(11, [8, 0])]);
}

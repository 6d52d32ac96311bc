use super::helpers::*;
use nicreduce::sim::BlockSums;
use nicreduce::{DataType, HandlerVariant, ReduceConfig, StorageKind};

fn node() -> ReduceConfig {
    small_node(StorageKind::Hash, HandlerVariant::SingleBuffer)
}

#[test]
fn test_hash_sums_with_collisions() {
    let cfg = node();
    // ~1500 non-zeros per child against 256 entries: most go through the stash.
    assert_reduces(&cfg, &traffic::<i32>(&cfg, 8, 10, 11), 1);
}

#[test]
fn test_hash_sums_sparse() {
    let cfg = node();
    assert_reduces(&cfg, &traffic::<i32>(&cfg, 16, 200, 12), 8);
}

#[test]
fn test_hash_neighbor_slot() {
    let cfg = ReduceConfig {
        neighbor_slot: true,
        ..node()
    };
    assert_reduces(&cfg, &traffic::<i32>(&cfg, 8, 50, 13), 4);
}

#[test]
fn test_hash_i8_pairs() {
    let cfg = ReduceConfig {
        dtype: DataType::I8,
        values_per_element: 2,
        ..node()
    };
    assert_reduces(&cfg, &traffic::<i8>(&cfg, 8, 100, 14), 4);
}

#[test]
fn test_collisions_independent_of_arrival_order() {
    let cfg = ReduceConfig {
        num_children: 2,
        hash_size: Some(16),
        ..node()
    };
    // 3, 19 and 35 share entry 3.
    let a = child_fragments::<i32>(&cfg, 0, 0, &[(3, [1, 0]), (19, [2, 0]), (35, [4, 0])]);
    let b = child_fragments::<i32>(&cfg, 0, 1, &[(35, [8, 0]), (3, [16, 0]), (19, [32, 0])]);

    let mut results = Vec::new();
    for packets in [[&a[0], &b[0]], [&b[0], &a[0]]] {
        let (stats, output) = reduce(&cfg, &packets, 1);
        assert_eq!(stats.flushes, 1);
        results.push(sums::<i32>(&cfg, &output));
    }
    assert_eq!(results[0], results[1]);
    assert_eq!(
        results[0],
        BlockSums::from([((0, 3), [17, 0]), ((0, 19), [34, 0]), ((0, 35), [12, 0])])
    );
}

#[test]
fn test_stash_forwarded_when_full() {
    let cfg = ReduceConfig {
        num_children: 1,
        hash_size: Some(1),
        ..node()
    };
    let cap = cfg.max_entries_per_fragment();
    // Everything but the first coordinate collides on the single entry.
    let entries: Vec<_> = (0..=cap + 1).map(|c| (c as u16, [1, 0])).collect();
    let packets = child_fragments::<i32>(&cfg, 0, 0, &entries);
    let (_, output) = reduce(&cfg, &packets, 1);

    let headers = headers_by_block(&output).remove(&0).unwrap();
    let splits: Vec<u8> = headers.iter().map(|h| h.split_index).collect();
    assert_eq!(splits, vec![0, 2]);
    assert_eq!(headers[0].num_values as usize, cap);
    assert_eq!(headers[1].num_values, 2);
    assert_eq!(sums::<i32>(&cfg, &output).len(), cap + 2);
}

#[test]
fn test_fragment_count_saturates_split_index() {
    let cfg = ReduceConfig {
        num_children: 2,
        hash_size: Some(1),
        ..node()
    };
    // 200 full fragments per child; all but coordinate 0 go through the stash.
    let count = 200 * cfg.max_entries_per_fragment();
    let entries: Vec<_> = (0..count).map(|c| (c as u16, [1, 0])).collect();
    let mut packets = child_fragments::<i32>(&cfg, 0, 0, &entries);
    packets.extend(child_fragments::<i32>(&cfg, 0, 1, &entries));
    let (stats, output) = reduce(&cfg, &packets, 1);

    assert_eq!(stats.flushes, 1);
    assert!(output.len() > u8::MAX as usize);
    let headers = headers_by_block(&output).remove(&0).unwrap();
    assert_eq!(headers.last().unwrap().split_index, u8::MAX);
    let sums = sums::<i32>(&cfg, &output);
    assert_eq!(sums.len(), count);
    assert!(sums.values().all(|v| *v == [2, 0]));
}

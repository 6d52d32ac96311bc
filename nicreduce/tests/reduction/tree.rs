use super::helpers::*;
use nicreduce::reduce;
use nicreduce::sim::BlockSums;
use nicreduce::{
    DataType, Element, HandlerVariant, MergeMode, ReduceConfig, ReductionTree, StorageKind,
};

async fn run_tree<T: Element>(cfg: ReduceConfig, num_leaves: usize) {
    let tree = ReductionTree::new(&cfg, num_leaves).unwrap();
    let mut expected = BlockSums::<T>::new();
    let mut leaf_traffic: Vec<Vec<Vec<u8>>> = Vec::new();
    for leaf in 0..num_leaves {
        let traffic = traffic::<T>(&cfg, 8, 50, 40 + leaf as u64);
        for (key, values) in &traffic.expected {
            reduce::add_into(expected.entry(*key).or_default(), values);
        }
        leaf_traffic.push(traffic.packets().map(<[u8]>::to_vec).collect());
    }

    let output = tree.run(leaf_traffic).await.unwrap();
    assert_eq!(sums::<T>(&cfg, &output), expected);
    for headers in headers_by_block(&output).values() {
        assert_eq!(headers.last().unwrap().split_index as usize, headers.len());
    }
}

#[tokio::test]
async fn test_tree_dense_pairs() {
    let cfg = ReduceConfig {
        dtype: DataType::I16,
        values_per_element: 2,
        ..small_node(StorageKind::Dense, HandlerVariant::MultiBuffer)
    };
    run_tree::<i16>(cfg, 4).await;
}

#[tokio::test]
async fn test_tree_hash_compressed() {
    let cfg = ReduceConfig {
        merge_mode: MergeMode::Compressed,
        ..small_node(StorageKind::Hash, HandlerVariant::MultiBuffer)
    };
    run_tree::<i32>(cfg, 3).await;
}

#[tokio::test]
async fn test_tree_f32_single_leaf() {
    let cfg = ReduceConfig {
        dtype: DataType::F32,
        ..small_node(StorageKind::Hash, HandlerVariant::SingleBuffer)
    };
    run_tree::<f32>(cfg, 1).await;
}

//! Replay synthetic sparse traffic through one node and check the sums.
//!
//! The node is configured from `NICREDUCE_*` environment variables, e.g.
//!
//! ```bash
//! NICREDUCE_STORAGE=hash NICREDUCE_VARIANT=multi cargo run --example simulate
//! ```

use std::sync::Arc;
use std::time::Instant;

use nicreduce::sim::collect_sums;
use nicreduce::{
    CaptureForwarder, DataType, Element, Engine, ReduceConfig, TrafficConfig, TrafficGenerator,
    build_handler,
};

fn run<T: Element>(cfg: &ReduceConfig, traffic: TrafficConfig) -> nicreduce::Result<()> {
    let generator = TrafficGenerator::new(cfg, traffic)?;
    let generated = generator.generate::<T>()?;
    let packets: Vec<&[u8]> = generated.packets().collect();

    let engine = Engine::new(Arc::from(build_handler(cfg)?));
    let forwarder = CaptureForwarder::new();
    let workers = std::thread::available_parallelism().map_or(1, |n| n.get());

    let start = Instant::now();
    let stats = engine.replay(&packets, workers, &forwarder)?;
    let elapsed = start.elapsed();

    let sums = collect_sums::<T, _>(cfg.wire_layout(), forwarder.take())?;
    println!(
        "{:?}/{:?} {:?}: {} packets on {workers} workers in {elapsed:?}",
        cfg.variant, cfg.storage, cfg.dtype, stats.delivered
    );
    println!(
        "  blocks flushed: {}, fragments forwarded: {}, mean inter-departure {:.1} ns",
        stats.flushes,
        stats.fragments_flushed,
        generator.mean_interdeparture_ns()
    );
    println!(
        "  coordinates: {} expected, {} reduced, match: {}",
        generated.expected.len(),
        sums.len(),
        sums == generated.expected
    );
    Ok(())
}

fn main() -> nicreduce::Result<()> {
    let cfg = ReduceConfig::from_env();
    let traffic = TrafficConfig::for_node(&cfg);
    match cfg.dtype {
        DataType::I32 => run::<i32>(&cfg, traffic),
        DataType::I16 => run::<i16>(&cfg, traffic),
        DataType::I8 => run::<i8>(&cfg, traffic),
        DataType::F32 => run::<f32>(&cfg, traffic),
    }
}

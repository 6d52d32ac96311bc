//! Runtime configuration of a reduction-tree node.
//!
//! Every knob that selects a storage strategy, element type or capacity is
//! plain constructor state here. All values have defaults matching a 16-port
//! switch with 1 KiB packets; override via environment variables (prefixed
//! `NICREDUCE_`) or by constructing a custom `ReduceConfig`.

use std::str::FromStr;

use crate::error::{NicReduceError, Result};
use crate::protocol::{FRAGMENT_HEADER_BYTES, IP_UDP_HEADER_BYTES, WireLayout};
use crate::storage::MAX_FRAGMENTS_PER_BLOCK;
use crate::types::{DataType, HandlerVariant, MergeMode, StorageKind};

/// Largest coordinate range a block can span (coordinates are `u16`).
pub const MAX_BLOCK_RANGE: usize = u16::MAX as usize + 1;

/// Largest fan-in: ports are `u8`.
pub const MAX_CHILDREN: usize = u8::MAX as usize + 1;

/// Tuning parameters and capacities of one reduction-tree node.
#[derive(Debug, Clone, PartialEq)]
pub struct ReduceConfig {
    /// Fan-in: child edges that must complete before a block is flushed.
    pub num_children: usize,

    /// Slots per cluster. Block ids map to slots by
    /// `(block_id / num_clusters) % ring_size`.
    pub ring_size: usize,

    /// Processing clusters, each with its own scratchpad.
    pub num_clusters: usize,

    /// Cores per cluster; each owns one outbound staging buffer.
    pub cores_per_cluster: usize,

    /// Maximum packet size in bytes, including the reserved IP/UDP headers.
    pub packet_size: usize,

    /// Element type of the reduced values.
    pub dtype: DataType,

    /// Values per coordinate (1 or 2).
    pub values_per_element: usize,

    /// Storage strategy of the aggregation buffers.
    pub storage: StorageKind,

    /// Hash table entries. `None` picks the default for `dtype` and arity.
    pub hash_size: Option<usize>,

    /// Entries reserved below the fragment capacity when sizing the block
    /// range. `None` picks the default for `dtype` and arity.
    pub slack: Option<usize>,

    /// Try slot `h + 1` before evicting a colliding entry to the stash.
    pub neighbor_slot: bool,

    /// Single- or multi-buffer locking discipline.
    pub variant: HandlerVariant,

    /// Aggregation buffers per slot for the multi-buffer variant.
    pub num_buffers: usize,

    /// How multi-buffer hash tables are collapsed before a flush.
    pub merge_mode: MergeMode,

    /// Use the vectorized dense merge when the CPU supports it.
    pub use_simd: bool,

    /// Expected coordinates per non-zero; sizes the dense block range.
    pub nonzero_ratio: usize,

    /// Port id stamped on forwarded fragments (this node's edge at its parent).
    pub uplink_port: u8,
}

impl Default for ReduceConfig {
    fn default() -> Self {
        Self {
            num_children: 16,
            ring_size: 32,
            num_clusters: 4,
            cores_per_cluster: 8,
            packet_size: 1024,
            dtype: DataType::I32,
            values_per_element: 1,
            storage: StorageKind::Dense,
            hash_size: None,
            slack: None,
            neighbor_slot: false,
            variant: HandlerVariant::SingleBuffer,
            num_buffers: 2,
            merge_mode: MergeMode::Standard,
            use_simd: true,
            nonzero_ratio: 100,
            uplink_port: 0,
        }
    }
}

/// Default `(hash_size, slack)` for an element type and arity.
///
/// Hash sizes are powers of two close to one fragment's worth of entries.
pub const fn default_hash_geometry(dtype: DataType, values_per_element: usize) -> (usize, usize) {
    match (values_per_element, dtype) {
        (2, DataType::I32) | (2, DataType::F32) => (128, 8),
        (2, DataType::I16) => (256, 16),
        (2, DataType::I8) => (512, 32),
        (_, DataType::I32) | (_, DataType::F32) => (256, 16),
        (_, DataType::I16) => (512, 32),
        (_, DataType::I8) => (1024, 64),
    }
}

impl ReduceConfig {
    /// Load config from environment variables, falling back to defaults.
    ///
    /// Recognized variables:
    /// - `NICREDUCE_NUM_CHILDREN`
    /// - `NICREDUCE_RING_SIZE`
    /// - `NICREDUCE_NUM_CLUSTERS`
    /// - `NICREDUCE_CORES_PER_CLUSTER`
    /// - `NICREDUCE_PACKET_SIZE`
    /// - `NICREDUCE_DTYPE` (`i32`, `i16`, `i8`, `f32`)
    /// - `NICREDUCE_VALUES_PER_ELEMENT`
    /// - `NICREDUCE_STORAGE` (`dense`, `hash`)
    /// - `NICREDUCE_HASH_SIZE`
    /// - `NICREDUCE_SLACK`
    /// - `NICREDUCE_NEIGHBOR_SLOT`
    /// - `NICREDUCE_VARIANT` (`single`, `multi`)
    /// - `NICREDUCE_NUM_BUFFERS`
    /// - `NICREDUCE_MERGE_MODE` (`standard`, `compressed`)
    /// - `NICREDUCE_USE_SIMD`
    /// - `NICREDUCE_NONZERO_RATIO`
    /// - `NICREDUCE_UPLINK_PORT`
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Some(n) = env_parse("NICREDUCE_NUM_CHILDREN") {
            cfg.num_children = n;
        }
        if let Some(n) = env_parse("NICREDUCE_RING_SIZE") {
            cfg.ring_size = n;
        }
        if let Some(n) = env_parse("NICREDUCE_NUM_CLUSTERS") {
            cfg.num_clusters = n;
        }
        if let Some(n) = env_parse("NICREDUCE_CORES_PER_CLUSTER") {
            cfg.cores_per_cluster = n;
        }
        if let Some(n) = env_parse("NICREDUCE_PACKET_SIZE") {
            cfg.packet_size = n;
        }
        if let Ok(v) = std::env::var("NICREDUCE_DTYPE") {
            match DataType::from_name(&v) {
                Some(dt) => cfg.dtype = dt,
                None => tracing::warn!(value = %v, "ignoring unknown NICREDUCE_DTYPE"),
            }
        }
        if let Some(n) = env_parse("NICREDUCE_VALUES_PER_ELEMENT") {
            cfg.values_per_element = n;
        }
        if let Ok(v) = std::env::var("NICREDUCE_STORAGE") {
            match v.as_str() {
                "dense" => cfg.storage = StorageKind::Dense,
                "hash" => cfg.storage = StorageKind::Hash,
                _ => tracing::warn!(value = %v, "ignoring unknown NICREDUCE_STORAGE"),
            }
        }
        if let Some(n) = env_parse("NICREDUCE_HASH_SIZE") {
            cfg.hash_size = Some(n);
        }
        if let Some(n) = env_parse("NICREDUCE_SLACK") {
            cfg.slack = Some(n);
        }
        if let Some(b) = env_flag("NICREDUCE_NEIGHBOR_SLOT") {
            cfg.neighbor_slot = b;
        }
        if let Ok(v) = std::env::var("NICREDUCE_VARIANT") {
            match v.as_str() {
                "single" => cfg.variant = HandlerVariant::SingleBuffer,
                "multi" => cfg.variant = HandlerVariant::MultiBuffer,
                _ => tracing::warn!(value = %v, "ignoring unknown NICREDUCE_VARIANT"),
            }
        }
        if let Some(n) = env_parse("NICREDUCE_NUM_BUFFERS") {
            cfg.num_buffers = n;
        }
        if let Ok(v) = std::env::var("NICREDUCE_MERGE_MODE") {
            match v.as_str() {
                "standard" => cfg.merge_mode = MergeMode::Standard,
                "compressed" => cfg.merge_mode = MergeMode::Compressed,
                _ => tracing::warn!(value = %v, "ignoring unknown NICREDUCE_MERGE_MODE"),
            }
        }
        if let Some(b) = env_flag("NICREDUCE_USE_SIMD") {
            cfg.use_simd = b;
        }
        if let Some(n) = env_parse("NICREDUCE_NONZERO_RATIO") {
            cfg.nonzero_ratio = n;
        }
        if let Some(n) = env_parse("NICREDUCE_UPLINK_PORT") {
            cfg.uplink_port = n;
        }

        cfg
    }

    /// Wire layout of the fragments this node receives and emits.
    pub fn wire_layout(&self) -> WireLayout {
        WireLayout::new(self.dtype, self.values_per_element, self.packet_size)
    }

    /// Maximum `(coordinate, values)` entries in one fragment.
    pub fn max_entries_per_fragment(&self) -> usize {
        self.wire_layout().max_entries()
    }

    /// Resolved hash table size.
    pub fn hash_size(&self) -> usize {
        self.hash_size
            .unwrap_or_else(|| default_hash_geometry(self.dtype, self.values_per_element).0)
    }

    /// Resolved slack.
    pub fn slack(&self) -> usize {
        self.slack
            .unwrap_or_else(|| default_hash_geometry(self.dtype, self.values_per_element).1)
    }

    /// Coordinate range of one block: `(max_entries - slack) * nonzero_ratio * arity`.
    pub fn block_range(&self) -> usize {
        self.max_entries_per_fragment().saturating_sub(self.slack())
            * self.nonzero_ratio
            * self.values_per_element
    }

    /// Buffers per slot for the configured variant.
    pub fn buffers_per_slot(&self) -> usize {
        match self.variant {
            HandlerVariant::SingleBuffer => 1,
            HandlerVariant::MultiBuffer => self.num_buffers,
        }
    }

    /// Blocks that can be in flight on this node before a slot is reused.
    pub fn in_flight_capacity(&self) -> usize {
        self.ring_size * self.num_clusters
    }

    /// Check every capacity once, so the packet path can trust them.
    pub fn validate(&self) -> Result<()> {
        if self.num_children == 0 || self.num_children > MAX_CHILDREN {
            return Err(NicReduceError::config(format!(
                "num_children must be in 1..={MAX_CHILDREN}, got {}",
                self.num_children
            )));
        }
        if self.ring_size == 0 {
            return Err(NicReduceError::config("ring_size must be non-zero"));
        }
        if self.num_clusters == 0 {
            return Err(NicReduceError::config("num_clusters must be non-zero"));
        }
        if self.cores_per_cluster == 0 {
            return Err(NicReduceError::config("cores_per_cluster must be non-zero"));
        }
        if !(1..=2).contains(&self.values_per_element) {
            return Err(NicReduceError::config(format!(
                "values_per_element must be 1 or 2, got {}",
                self.values_per_element
            )));
        }
        let layout = self.wire_layout();
        let min_packet = IP_UDP_HEADER_BYTES + FRAGMENT_HEADER_BYTES + layout.entry_bytes();
        if self.packet_size < min_packet {
            return Err(NicReduceError::config(format!(
                "packet_size {} cannot hold a single entry (need {min_packet})",
                self.packet_size
            )));
        }
        if layout.max_entries() > u16::MAX as usize {
            return Err(NicReduceError::config(format!(
                "packet_size {} allows {} entries, more than a u16 value count",
                self.packet_size,
                layout.max_entries()
            )));
        }
        if self.slack() >= layout.max_entries() {
            return Err(NicReduceError::config(format!(
                "slack {} must be below the fragment capacity {}",
                self.slack(),
                layout.max_entries()
            )));
        }
        if self.nonzero_ratio == 0 {
            return Err(NicReduceError::config("nonzero_ratio must be non-zero"));
        }
        if self.storage == StorageKind::Dense && self.block_range() > MAX_BLOCK_RANGE {
            return Err(NicReduceError::config(format!(
                "dense block range {} exceeds the u16 coordinate space",
                self.block_range()
            )));
        }
        if self.storage == StorageKind::Dense
            && self.block_range().div_ceil(layout.max_entries()) > MAX_FRAGMENTS_PER_BLOCK as usize
        {
            return Err(NicReduceError::config(format!(
                "a full dense block of {} coordinates needs more than {MAX_FRAGMENTS_PER_BLOCK} fragments",
                self.block_range()
            )));
        }
        if self.storage == StorageKind::Hash
            && (self.hash_size() == 0 || self.hash_size() > MAX_BLOCK_RANGE)
        {
            return Err(NicReduceError::config(format!(
                "hash_size must be in 1..={MAX_BLOCK_RANGE}, got {}",
                self.hash_size()
            )));
        }
        if self.variant == HandlerVariant::MultiBuffer && self.num_buffers == 0 {
            return Err(NicReduceError::config("num_buffers must be non-zero"));
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let v = std::env::var(name).ok()?;
    match v.parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(var = name, value = %v, "ignoring unparsable value");
            None
        }
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let v = std::env::var(name).ok()?;
    match v.as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            tracing::warn!(var = name, value = %v, "ignoring unparsable flag");
            None
        }
    }
}

/// Identifier of a logical vector block being reduced.
pub type BlockId = u32;

/// Child edge a fragment arrived on.
pub type PortId = u8;

/// Intra-block coordinate carried in a fragment's index array.
pub type Coordinate = u16;

/// Element types a reduction tree can be configured for.
///
/// Discriminants match the element-type codes used by the packet generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DataType {
    I32 = 0,
    I16 = 1,
    I8 = 2,
    F32 = 3,
}

impl DataType {
    /// Size of one element in bytes.
    pub const fn size_in_bytes(self) -> usize {
        match self {
            DataType::I32 | DataType::F32 => 4,
            DataType::I16 => 2,
            DataType::I8 => 1,
        }
    }

    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            DataType::I32 => "i32",
            DataType::I16 => "i16",
            DataType::I8 => "i8",
            DataType::F32 => "f32",
        }
    }

    /// Parse a name as produced by [`DataType::name`].
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "i32" => Some(DataType::I32),
            "i16" => Some(DataType::I16),
            "i8" => Some(DataType::I8),
            "f32" => Some(DataType::F32),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a slot stores its partial sums.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StorageKind {
    /// One cell per coordinate of the block range.
    #[default]
    Dense,
    /// Fixed-size hash table with an overflow stash.
    Hash,
}

/// Locking discipline of the packet handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HandlerVariant {
    /// One buffer per slot, slot lock held for the whole invocation.
    #[default]
    SingleBuffer,
    /// N buffers per slot with their own try-locks; slot lock only for
    /// completion accounting.
    MultiBuffer,
}

/// How the hash tables of a multi-buffer slot are collapsed before a flush.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MergeMode {
    /// Other tables are re-hashed into the first; their stashes are appended
    /// verbatim.
    #[default]
    Standard,
    /// Stash entries are re-hashed too, trading flush time for fewer
    /// outbound entries.
    Compressed,
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Dense => f.write_str("dense"),
            StorageKind::Hash => f.write_str("hash"),
        }
    }
}

impl std::fmt::Display for HandlerVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HandlerVariant::SingleBuffer => f.write_str("single"),
            HandlerVariant::MultiBuffer => f.write_str("multi"),
        }
    }
}

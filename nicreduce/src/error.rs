use crate::types::DataType;

pub type Result<T> = std::result::Result<T, NicReduceError>;

#[derive(Debug, thiserror::Error)]
pub enum NicReduceError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("element type mismatch: config selects {configured}, handler built for {requested}")]
    DataTypeMismatch {
        configured: DataType,
        requested: DataType,
    },

    #[error("fragment decode failed: {0}")]
    DecodeFailed(String),

    #[error("truncated packet: expected {expected} bytes, got {actual}")]
    TruncatedPacket { expected: usize, actual: usize },

    #[error("{region} index {index} out of range (capacity {capacity})")]
    ArenaOutOfRange {
        region: &'static str,
        index: usize,
        capacity: usize,
    },

    #[error("simulation task failed: {0}")]
    TaskFailed(String),
}

impl NicReduceError {
    /// Create an `InvalidConfig` error from anything printable.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a `DecodeFailed` error from anything printable.
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::DecodeFailed(msg.into())
    }
}

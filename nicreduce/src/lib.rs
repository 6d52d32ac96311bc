pub mod arena;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod reassembly;
pub mod reduce;
mod reduce_simd;
pub mod sim;
pub mod storage;
pub mod sync;
pub mod transport;
pub mod types;

pub use config::ReduceConfig;
pub use error::{NicReduceError, Result};
pub use handler::{
    HandleOutcome, HandlerContext, MultiBufferHandler, PacketHandler, SingleBufferHandler,
    build_handler,
};
pub use protocol::{FragmentBuf, FragmentHeader, FragmentView, WireLayout};
pub use reduce::{Element, Values};
pub use sim::{Engine, ReductionTree, TrafficConfig, TrafficGenerator};
pub use storage::{DenseStorage, HashStorage, Storage};
pub use transport::{CaptureForwarder, ChannelForwarder, Forwarder};
pub use types::{BlockId, Coordinate, DataType, HandlerVariant, MergeMode, PortId, StorageKind};

mod fragment;
mod header;

pub use fragment::{FragmentBuf, FragmentView, WireLayout};
pub use header::{
    FRAGMENT_HEADER_BYTES, FragmentHeader, IP_UDP_HEADER_BYTES, PAYLOAD_OFFSET,
};

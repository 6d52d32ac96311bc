use crate::error::{NicReduceError, Result};
use crate::types::{BlockId, PortId};

/// Bytes reserved ahead of the fragment header for the IP and UDP headers.
pub const IP_UDP_HEADER_BYTES: usize = 28;

/// Size of the fragment header in bytes.
pub const FRAGMENT_HEADER_BYTES: usize = 12;

/// Offset of the first payload byte (`index[0]`) within a packet.
pub const PAYLOAD_OFFSET: usize = IP_UDP_HEADER_BYTES + FRAGMENT_HEADER_BYTES;

/// 12-byte fragment header following the reserved IP/UDP bytes.
///
/// ```text
/// [0..4]   block_id: u32 LE
/// [4..8]   root_address: u32 LE
/// [8..10]  num_values: u16 LE
/// [10]     split_index: u8
/// [11]     port: u8
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FragmentHeader {
    /// Logical block being reduced.
    pub block_id: BlockId,
    /// Address of the tree root, carried through unchanged.
    pub root_address: u32,
    /// Number of `(index, data)` entries in the payload.
    pub num_values: u16,
    /// Zero on every fragment but the last, which carries the total count.
    pub split_index: u8,
    /// Child edge the fragment arrived on.
    pub port: PortId,
}

impl FragmentHeader {
    /// Encode the header into the first 12 bytes of `buf`.
    pub fn encode(&self, buf: &mut [u8]) {
        buf[0..4].copy_from_slice(&self.block_id.to_le_bytes());
        buf[4..8].copy_from_slice(&self.root_address.to_le_bytes());
        buf[8..10].copy_from_slice(&self.num_values.to_le_bytes());
        buf[10] = self.split_index;
        buf[11] = self.port;
    }

    /// Decode a header from 12 bytes.
    pub fn decode(buf: &[u8; FRAGMENT_HEADER_BYTES]) -> Self {
        Self {
            block_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
            root_address: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
            num_values: u16::from_le_bytes([buf[8], buf[9]]),
            split_index: buf[10],
            port: buf[11],
        }
    }

    /// Decode the header of a full packet (reserved bytes included).
    pub fn from_packet(packet: &[u8]) -> Result<Self> {
        let bytes = packet
            .get(IP_UDP_HEADER_BYTES..PAYLOAD_OFFSET)
            .ok_or(NicReduceError::TruncatedPacket {
                expected: PAYLOAD_OFFSET,
                actual: packet.len(),
            })?;
        let mut buf = [0u8; FRAGMENT_HEADER_BYTES];
        buf.copy_from_slice(bytes);
        Ok(Self::decode(&buf))
    }

    /// True on the last fragment of a transmission.
    pub fn is_terminal(&self) -> bool {
        self.split_index != 0
    }
}

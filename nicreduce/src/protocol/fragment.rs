//! Fragment payload layout: `index[n]` (u16) followed by `data[n * arity]`.

use std::marker::PhantomData;

use super::header::{FragmentHeader, IP_UDP_HEADER_BYTES, PAYLOAD_OFFSET};
use crate::error::{NicReduceError, Result};
use crate::reduce::{Element, MAX_ARITY, Values};
use crate::types::{Coordinate, DataType};

/// Byte geometry of fragments for one element type, arity and packet size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireLayout {
    dtype: DataType,
    arity: usize,
    packet_size: usize,
}

impl WireLayout {
    pub fn new(dtype: DataType, arity: usize, packet_size: usize) -> Self {
        Self {
            dtype,
            arity,
            packet_size,
        }
    }

    pub fn dtype(&self) -> DataType {
        self.dtype
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Bytes per entry: one u16 index plus `arity` values.
    pub fn entry_bytes(&self) -> usize {
        2 + self.arity * self.dtype.size_in_bytes()
    }

    /// Maximum entries one fragment can carry.
    pub fn max_entries(&self) -> usize {
        self.packet_size.saturating_sub(PAYLOAD_OFFSET) / self.entry_bytes()
    }

    /// Length of a packet carrying `n` entries, reserved bytes included.
    pub fn packet_len(&self, n: usize) -> usize {
        PAYLOAD_OFFSET + n * self.entry_bytes()
    }

    fn data_offset(&self, n: usize, entry: usize, component: usize) -> usize {
        PAYLOAD_OFFSET + 2 * n + (entry * self.arity + component) * self.dtype.size_in_bytes()
    }
}

/// Zero-copy view over a received fragment.
#[derive(Debug)]
pub struct FragmentView<'a, T> {
    layout: WireLayout,
    header: FragmentHeader,
    packet: &'a [u8],
    _marker: PhantomData<T>,
}

impl<'a, T: Element> FragmentView<'a, T> {
    /// Parse the header and check that the payload fits the packet.
    pub fn decode(layout: WireLayout, packet: &'a [u8]) -> Result<Self> {
        let header = FragmentHeader::from_packet(packet)?;
        let n = header.num_values as usize;
        if n > layout.max_entries() {
            return Err(NicReduceError::decode(format!(
                "block {}: {n} values exceed the fragment capacity {}",
                header.block_id,
                layout.max_entries()
            )));
        }
        let expected = layout.packet_len(n);
        if packet.len() < expected {
            return Err(NicReduceError::TruncatedPacket {
                expected,
                actual: packet.len(),
            });
        }
        Ok(Self {
            layout,
            header,
            packet,
            _marker: PhantomData,
        })
    }

    pub fn header(&self) -> &FragmentHeader {
        &self.header
    }

    pub fn len(&self) -> usize {
        self.header.num_values as usize
    }

    pub fn is_empty(&self) -> bool {
        self.header.num_values == 0
    }

    /// Coordinate and values of entry `i`. Components beyond the arity are zero.
    pub fn entry(&self, i: usize) -> (Coordinate, Values<T>) {
        let n = self.len();
        let at = PAYLOAD_OFFSET + 2 * i;
        let coord = u16::from_le_bytes([self.packet[at], self.packet[at + 1]]);
        let size = self.layout.dtype.size_in_bytes();
        let mut values = [T::default(); MAX_ARITY];
        for (k, v) in values.iter_mut().take(self.layout.arity).enumerate() {
            let off = self.layout.data_offset(n, i, k);
            *v = T::read_le(&self.packet[off..off + size]);
        }
        (coord, values)
    }

    pub fn entries(&self) -> impl Iterator<Item = (Coordinate, Values<T>)> + '_ {
        (0..self.len()).map(|i| self.entry(i))
    }
}

/// Fixed-capacity outbound fragment under assembly.
///
/// Used for per-core staging and for the hash stash. Storage is reserved up
/// front; pushes never reallocate.
#[derive(Debug, Clone)]
pub struct FragmentBuf<T> {
    index: Vec<Coordinate>,
    data: Vec<Values<T>>,
    capacity: usize,
}

impl<T: Element> FragmentBuf<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn for_layout(layout: &WireLayout) -> Self {
        Self::with_capacity(layout.max_entries())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.index.len() >= self.capacity
    }

    pub fn push(&mut self, coord: Coordinate, values: Values<T>) {
        debug_assert!(!self.is_full(), "fragment buffer overrun");
        self.index.push(coord);
        self.data.push(values);
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.data.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, Values<T>)> + '_ {
        self.index.iter().copied().zip(self.data.iter().copied())
    }

    /// Serialize into `out` with `header.num_values` set to the entry count.
    /// Returns the packet length. The reserved IP/UDP bytes are left untouched.
    pub fn encode_into(&self, layout: &WireLayout, header: &FragmentHeader, out: &mut [u8]) -> usize {
        let n = self.len();
        let header = FragmentHeader {
            num_values: n as u16,
            ..*header
        };
        header.encode(&mut out[IP_UDP_HEADER_BYTES..PAYLOAD_OFFSET]);

        for (i, &coord) in self.index.iter().enumerate() {
            let at = PAYLOAD_OFFSET + 2 * i;
            out[at..at + 2].copy_from_slice(&coord.to_le_bytes());
        }
        let size = layout.dtype.size_in_bytes();
        for (i, values) in self.data.iter().enumerate() {
            for (k, v) in values.iter().take(layout.arity).enumerate() {
                let off = layout.data_offset(n, i, k);
                v.write_le(&mut out[off..off + size]);
            }
        }
        layout.packet_len(n)
    }

    /// Serialize into a freshly allocated packet.
    pub fn to_packet(&self, layout: &WireLayout, header: &FragmentHeader) -> Vec<u8> {
        let mut out = vec![0u8; layout.packet_len(self.len())];
        self.encode_into(layout, header, &mut out);
        out
    }
}

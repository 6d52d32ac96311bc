use super::{Emitter, Storage, StorageParams};
use crate::protocol::{FragmentBuf, FragmentView};
use crate::reduce::{self, Element, MAX_ARITY, Values};
use crate::types::{Coordinate, MergeMode};

/// Fixed-size hash table of partial sums with an overflow stash.
///
/// Entry `h` holds coordinate `index[h]`; it is empty while all of its
/// values are zero. A coordinate lives at `coord % size`, or at the next
/// entry when the neighbor slot is enabled. Anything else goes to the
/// stash. A full stash is forwarded one entry late, when the next collision
/// needs room or at the flush, so the flush's terminal fragment always
/// carries the count.
#[derive(Debug)]
pub struct HashStorage<T> {
    index: Vec<Coordinate>,
    data: Vec<Values<T>>,
    stash: FragmentBuf<T>,
    neighbor_slot: bool,
    merge_mode: MergeMode,
}

impl<T: Element> HashStorage<T> {
    pub fn size(&self) -> usize {
        self.index.len()
    }

    /// Entries waiting in the stash.
    pub fn stashed(&self) -> usize {
        self.stash.len()
    }

    /// Occupy an empty entry or add into a matching one.
    #[inline]
    fn try_entry(&mut self, h: usize, coord: Coordinate, values: &Values<T>) -> bool {
        let cell = &mut self.data[h];
        if reduce::is_absent(cell) {
            self.index[h] = coord;
            *cell = *values;
            true
        } else if self.index[h] == coord {
            reduce::add_into(cell, values);
            true
        } else {
            false
        }
    }

    /// Place into the table without touching the stash.
    fn insert_table(&mut self, coord: Coordinate, values: &Values<T>) -> bool {
        let size = self.size();
        let h = coord as usize % size;
        if self.try_entry(h, coord, values) {
            return true;
        }
        self.neighbor_slot && self.try_entry((h + 1) % size, coord, values)
    }

    fn insert(&mut self, coord: Coordinate, values: Values<T>, emitter: &mut Emitter<'_>) {
        if reduce::is_absent(&values) || self.insert_table(coord, &values) {
            return;
        }
        tracing::trace!(coord, "hash collision, stashing");
        emitter.push(&mut self.stash, coord, values);
    }

    /// Take the value at `h`, leaving the entry empty.
    #[inline]
    fn take(&mut self, h: usize) -> Option<(Coordinate, Values<T>)> {
        let cell = &mut self.data[h];
        if reduce::is_absent(cell) {
            return None;
        }
        let values = std::mem::replace(cell, [T::default(); MAX_ARITY]);
        Some((std::mem::take(&mut self.index[h]), values))
    }
}

impl<T: Element> Storage<T> for HashStorage<T> {
    fn new(params: &StorageParams) -> Self {
        let size = params.hash_size.max(1);
        Self {
            index: vec![0; size],
            data: vec![[T::default(); MAX_ARITY]; size],
            stash: FragmentBuf::with_capacity(params.max_entries),
            neighbor_slot: params.neighbor_slot,
            merge_mode: params.merge_mode,
        }
    }

    fn accumulate(&mut self, fragment: &FragmentView<'_, T>, emitter: &mut Emitter<'_>) {
        for (coord, values) in fragment.entries() {
            self.insert(coord, values, emitter);
        }
    }

    fn absorb(&mut self, other: &mut Self, emitter: &mut Emitter<'_>) {
        for h in 0..other.size() {
            if let Some((coord, values)) = other.take(h) {
                self.insert(coord, values, emitter);
            }
        }
        match self.merge_mode {
            MergeMode::Standard => {
                for (coord, values) in other.stash.iter() {
                    emitter.push(&mut self.stash, coord, values);
                }
            }
            MergeMode::Compressed => {
                for (coord, values) in other.stash.iter() {
                    self.insert(coord, values, emitter);
                }
            }
        }
        other.stash.clear();
    }

    fn flush(&mut self, emitter: &mut Emitter<'_>, _assembly: &mut FragmentBuf<T>) -> u32 {
        for h in 0..self.size() {
            if let Some((coord, values)) = self.take(h) {
                emitter.push(&mut self.stash, coord, values);
            }
        }
        emitter.finish(&mut self.stash)
    }

    fn is_empty(&self) -> bool {
        self.stash.is_empty() && self.data.iter().all(|v| reduce::is_absent(v))
    }
}

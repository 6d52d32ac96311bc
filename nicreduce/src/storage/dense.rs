use super::{Emitter, Storage, StorageParams};
use crate::error::{NicReduceError, Result};
use crate::protocol::{FragmentBuf, FragmentView};
use crate::reduce::{self, Element, MAX_ARITY};

/// One cell per coordinate of the block range, `arity` values each.
#[derive(Debug)]
pub struct DenseStorage<T> {
    data: Vec<T>,
    arity: usize,
    block_range: usize,
    use_simd: bool,
}

impl<T: Element> DenseStorage<T> {
    pub fn block_range(&self) -> usize {
        self.block_range
    }

    #[inline]
    fn cell(&mut self, coord: usize) -> &mut [T] {
        let at = coord * self.arity;
        &mut self.data[at..at + self.arity]
    }
}

impl<T: Element> Storage<T> for DenseStorage<T> {
    fn new(params: &StorageParams) -> Self {
        Self {
            data: vec![T::default(); params.block_range * params.arity],
            arity: params.arity,
            block_range: params.block_range,
            use_simd: params.use_simd,
        }
    }

    fn validate(params: &StorageParams, fragment: &FragmentView<'_, T>) -> Result<()> {
        if let Some((coord, _)) = fragment
            .entries()
            .find(|&(c, _)| c as usize >= params.block_range)
        {
            return Err(NicReduceError::decode(format!(
                "block {}: coordinate {coord} outside the dense range {}",
                fragment.header().block_id,
                params.block_range
            )));
        }
        Ok(())
    }

    fn accumulate(&mut self, fragment: &FragmentView<'_, T>, _emitter: &mut Emitter<'_>) {
        let arity = self.arity;
        for (coord, values) in fragment.entries() {
            reduce::add_into(self.cell(coord as usize), &values[..arity]);
        }
    }

    fn absorb(&mut self, other: &mut Self, _emitter: &mut Emitter<'_>) {
        reduce::merge_dense(&mut self.data, &mut other.data, self.use_simd);
    }

    fn flush(&mut self, emitter: &mut Emitter<'_>, assembly: &mut FragmentBuf<T>) -> u32 {
        for coord in 0..self.block_range {
            let cell = self.cell(coord);
            if reduce::is_absent(cell) {
                continue;
            }
            let mut values = [T::default(); MAX_ARITY];
            values[..cell.len()].copy_from_slice(cell);
            cell.fill(T::default());
            emitter.push(assembly, coord as u16, values);
        }
        emitter.finish(assembly)
    }

    fn is_empty(&self) -> bool {
        reduce::is_absent(&self.data)
    }
}

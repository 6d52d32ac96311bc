//! Element types and the sum primitives shared by both storage strategies.
//!
//! A stored value of exactly zero means "absent". With two values per
//! coordinate, a coordinate is absent only if both components are zero.

use crate::types::DataType;

/// Largest number of values carried per coordinate.
pub const MAX_ARITY: usize = 2;

/// Values of one coordinate, zero-padded beyond the configured arity.
pub type Values<T> = [T; MAX_ARITY];

/// A value type that can be summed in-network.
///
/// Integers add with wrapping semantics, floats with IEEE addition.
pub trait Element: Copy + Default + PartialEq + Send + Sync + std::fmt::Debug + 'static {
    /// Wire element type this Rust type encodes.
    const DTYPE: DataType;

    fn add(a: Self, b: Self) -> Self;

    fn is_zero(self) -> bool;

    /// Small integer constant, used by traffic generators and tests.
    fn from_i8(v: i8) -> Self;

    /// Read a value from a little-endian byte slice (alignment-safe).
    fn read_le(bytes: &[u8]) -> Self;

    fn write_le(self, bytes: &mut [u8]);

    /// Vectorized `dst += src; src = 0`. Returns `false` if no fast path
    /// exists for this type on the running CPU.
    #[inline]
    fn merge_simd(_dst: &mut [Self], _src: &mut [Self]) -> bool {
        false
    }
}

macro_rules! impl_element {
    (int: $($ty:ty => $dt:ident),*) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dt;

                #[inline]
                fn add(a: Self, b: Self) -> Self {
                    a.wrapping_add(b)
                }

                #[inline]
                fn is_zero(self) -> bool {
                    self == 0
                }

                #[inline]
                fn from_i8(v: i8) -> Self {
                    v as $ty
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    Self::from_le_bytes(
                        bytes.try_into().expect("slice length matches type size"),
                    )
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn merge_simd(dst: &mut [Self], src: &mut [Self]) -> bool {
                    crate::reduce_simd::merge_simd(dst, src)
                }
            }
        )*
    };
    (float: $($ty:ty => $dt:ident),*) => {
        $(
            impl Element for $ty {
                const DTYPE: DataType = DataType::$dt;

                #[inline]
                fn add(a: Self, b: Self) -> Self {
                    a + b
                }

                #[inline]
                fn is_zero(self) -> bool {
                    self == 0.0
                }

                #[inline]
                fn from_i8(v: i8) -> Self {
                    v as $ty
                }

                #[inline]
                fn read_le(bytes: &[u8]) -> Self {
                    Self::from_le_bytes(
                        bytes.try_into().expect("slice length matches type size"),
                    )
                }

                #[inline]
                fn write_le(self, bytes: &mut [u8]) {
                    bytes.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn merge_simd(dst: &mut [Self], src: &mut [Self]) -> bool {
                    crate::reduce_simd::merge_simd(dst, src)
                }
            }
        )*
    };
}

impl_element!(int: i32 => I32, i16 => I16, i8 => I8);
impl_element!(float: f32 => F32);

/// True if every component is the zero sentinel.
#[inline]
pub fn is_absent<T: Element>(values: &[T]) -> bool {
    values.iter().all(|v| v.is_zero())
}

/// `dst[k] += src[k]` for every component.
#[inline]
pub fn add_into<T: Element>(dst: &mut [T], src: &[T]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = T::add(*d, s);
    }
}

/// Scalar reference for the pairwise dense merge: `dst += src; src = 0`.
///
/// Cells of `src` that are already zero are skipped.
pub fn merge_dense_scalar<T: Element>(dst: &mut [T], src: &mut [T]) {
    for (d, s) in dst.iter_mut().zip(src.iter_mut()) {
        if !s.is_zero() {
            *d = T::add(*d, *s);
            *s = T::default();
        }
    }
}

/// Pairwise dense merge, vectorized when `use_simd` is set and the CPU has
/// a kernel for `T`.
pub fn merge_dense<T: Element>(dst: &mut [T], src: &mut [T], use_simd: bool) {
    debug_assert_eq!(dst.len(), src.len());
    if use_simd && T::merge_simd(dst, src) {
        return;
    }
    merge_dense_scalar(dst, src);
}

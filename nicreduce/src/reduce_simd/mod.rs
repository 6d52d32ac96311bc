//! SIMD-accelerated dense merge dispatch for multiple architectures.
//!
//! Each kernel computes `dst += src; src = 0` lane-wise and finishes the
//! tail with the scalar reference, so results are bit-identical to
//! [`crate::reduce::merge_dense_scalar`] for integers.

#[cfg(target_arch = "x86_64")]
mod x86_64;

#[cfg(target_arch = "aarch64")]
mod aarch64;

/// Element types with a vectorized merge kernel.
pub(crate) trait SimdMerge: Sized {
    /// Returns `true` if handled.
    fn merge(dst: &mut [Self], src: &mut [Self]) -> bool;
}

macro_rules! impl_simd_merge {
    ($($ty:ty => $avx2:ident, $neon:ident);* $(;)?) => {
        $(
            impl SimdMerge for $ty {
                #[cfg(target_arch = "x86_64")]
                #[inline]
                fn merge(dst: &mut [Self], src: &mut [Self]) -> bool {
                    if !is_x86_feature_detected!("avx2") {
                        return false;
                    }
                    let n = dst.len().min(src.len());
                    unsafe { x86_64::$avx2(&mut dst[..n], &mut src[..n]) };
                    true
                }

                #[cfg(target_arch = "aarch64")]
                #[inline]
                fn merge(dst: &mut [Self], src: &mut [Self]) -> bool {
                    let n = dst.len().min(src.len());
                    unsafe { aarch64::$neon(&mut dst[..n], &mut src[..n]) };
                    true
                }

                #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
                #[inline]
                fn merge(_dst: &mut [Self], _src: &mut [Self]) -> bool {
                    false
                }
            }
        )*
    };
}

impl_simd_merge! {
    i32 => merge_i32_avx2, merge_i32_neon;
    i16 => merge_i16_avx2, merge_i16_neon;
    i8 => merge_i8_avx2, merge_i8_neon;
    f32 => merge_f32_avx2, merge_f32_neon;
}

/// Try the vectorized merge for `T`. Returns `true` if handled.
#[inline]
pub(crate) fn merge_simd<T: SimdMerge>(dst: &mut [T], src: &mut [T]) -> bool {
    T::merge(dst, src)
}

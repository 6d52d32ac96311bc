//! AVX2 dense merge kernels for x86_64.

use std::arch::x86_64::*;

use crate::reduce::merge_dense_scalar;

macro_rules! avx2_int_merge {
    ($name:ident, $ty:ty, $lanes:expr, $add:ident) => {
        #[target_feature(enable = "avx2")]
        pub(crate) unsafe fn $name(dst: &mut [$ty], src: &mut [$ty]) {
            let count = dst.len().min(src.len());
            let dp = dst.as_mut_ptr();
            let sp = src.as_mut_ptr();
            let chunks = count / $lanes;

            for i in 0..chunks {
                let off = i * $lanes;
                unsafe {
                    let a = _mm256_loadu_si256(dp.add(off) as *const __m256i);
                    let b = _mm256_loadu_si256(sp.add(off) as *const __m256i);
                    _mm256_storeu_si256(dp.add(off) as *mut __m256i, $add(a, b));
                    _mm256_storeu_si256(sp.add(off) as *mut __m256i, _mm256_setzero_si256());
                }
            }

            let tail = chunks * $lanes;
            merge_dense_scalar(&mut dst[tail..count], &mut src[tail..count]);
        }
    };
}

avx2_int_merge!(merge_i32_avx2, i32, 8, _mm256_add_epi32);
avx2_int_merge!(merge_i16_avx2, i16, 16, _mm256_add_epi16);
avx2_int_merge!(merge_i8_avx2, i8, 32, _mm256_add_epi8);

#[target_feature(enable = "avx2")]
pub(crate) unsafe fn merge_f32_avx2(dst: &mut [f32], src: &mut [f32]) {
    let count = dst.len().min(src.len());
    let dp = dst.as_mut_ptr();
    let sp = src.as_mut_ptr();
    let chunks = count / 8;

    for i in 0..chunks {
        let off = i * 8;
        unsafe {
            let a = _mm256_loadu_ps(dp.add(off));
            let b = _mm256_loadu_ps(sp.add(off));
            _mm256_storeu_ps(dp.add(off), _mm256_add_ps(a, b));
            _mm256_storeu_ps(sp.add(off), _mm256_setzero_ps());
        }
    }

    let tail = chunks * 8;
    merge_dense_scalar(&mut dst[tail..count], &mut src[tail..count]);
}

//! NEON dense merge kernels for aarch64.

use std::arch::aarch64::*;

use crate::reduce::merge_dense_scalar;

macro_rules! neon_merge {
    ($name:ident, $ty:ty, $lanes:expr, $ld:ident, $add:ident, $st:ident, $dup:ident, $zero:expr) => {
        pub(crate) unsafe fn $name(dst: &mut [$ty], src: &mut [$ty]) {
            let count = dst.len().min(src.len());
            let dp = dst.as_mut_ptr();
            let sp = src.as_mut_ptr();
            let chunks = count / $lanes;

            unsafe {
                let zero = $dup($zero);
                for i in 0..chunks {
                    let off = i * $lanes;
                    let a = $ld(dp.add(off));
                    let b = $ld(sp.add(off));
                    $st(dp.add(off), $add(a, b));
                    $st(sp.add(off), zero);
                }
            }

            let tail = chunks * $lanes;
            merge_dense_scalar(&mut dst[tail..count], &mut src[tail..count]);
        }
    };
}

neon_merge!(merge_i32_neon, i32, 4, vld1q_s32, vaddq_s32, vst1q_s32, vdupq_n_s32, 0);
neon_merge!(merge_i16_neon, i16, 8, vld1q_s16, vaddq_s16, vst1q_s16, vdupq_n_s16, 0);
neon_merge!(merge_i8_neon, i8, 16, vld1q_s8, vaddq_s8, vst1q_s8, vdupq_n_s8, 0);
neon_merge!(merge_f32_neon, f32, 4, vld1q_f32, vaddq_f32, vst1q_f32, vdupq_n_f32, 0.0);

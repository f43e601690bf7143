//! Shared AVX-512 helpers for the eltwise and NTT kernels: unsigned 64-bit
//! high/low products at both bit-shift tiers, the one-subtraction lazy
//! reduction, full Barrett reduction and comparison masks.
//!
//! Every function is `unsafe` and gated on the features named in its
//! `target_feature` attribute; callers hold the matching capability proof
//! from [`crate::arch::CpuFeatures`].

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use crate::eltwise::CmpInt;

/// High 64 bits of the unsigned 64x64 product, from four 32-bit partial
/// products.
#[inline]
#[target_feature(enable = "avx512f")]
pub(crate) unsafe fn mul_hi_64(x: __m512i, y: __m512i) -> __m512i {
    let lo_mask = _mm512_set1_epi64(0xffff_ffff);
    let x_hi = _mm512_srli_epi64::<32>(x);
    let y_hi = _mm512_srli_epi64::<32>(y);

    // mul_epu32 multiplies the low 32 bits of each lane
    let w0 = _mm512_mul_epu32(x, y);
    let w1 = _mm512_mul_epu32(x, y_hi);
    let w2 = _mm512_mul_epu32(x_hi, y);
    let w3 = _mm512_mul_epu32(x_hi, y_hi);

    let w0_hi = _mm512_srli_epi64::<32>(w0);
    let s1 = _mm512_add_epi64(w1, w0_hi);
    let s1_lo = _mm512_and_epi64(s1, lo_mask);
    let s1_hi = _mm512_srli_epi64::<32>(s1);
    let s2 = _mm512_add_epi64(w2, s1_lo);
    let s2_hi = _mm512_srli_epi64::<32>(s2);

    _mm512_add_epi64(_mm512_add_epi64(w3, s1_hi), s2_hi)
}

/// Low 64 bits of the unsigned 64x64 product.
#[inline]
#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn mul_lo_64(x: __m512i, y: __m512i) -> __m512i {
    _mm512_mullo_epi64(x, y)
}

/// High 52 bits of the 52x52 product; operands must be < 2^52.
#[inline]
#[target_feature(enable = "avx512f,avx512ifma")]
pub(crate) unsafe fn mul_hi_52(x: __m512i, y: __m512i) -> __m512i {
    _mm512_madd52hi_epu64(_mm512_setzero_si512(), x, y)
}

/// Low 52 bits of the 52x52 product; operands must be < 2^52.
#[inline]
#[target_feature(enable = "avx512f,avx512ifma")]
pub(crate) unsafe fn mul_lo_52(x: __m512i, y: __m512i) -> __m512i {
    _mm512_madd52lo_epu64(_mm512_setzero_si512(), x, y)
}

/// Lane-wise reduce_once: x - q where x >= q, for x < 2q < 2^64.
#[inline]
#[target_feature(enable = "avx512f")]
pub(crate) unsafe fn small_mod(x: __m512i, q: __m512i) -> __m512i {
    _mm512_min_epu64(x, _mm512_sub_epi64(x, q))
}

/// Lane-wise x mod q for arbitrary x, given barr = floor(2^64 / q).
#[inline]
#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn barrett_reduce_64(x: __m512i, q: __m512i, barr: __m512i) -> __m512i {
    let q_hat = mul_hi_64(x, barr);
    let reduced = _mm512_sub_epi64(x, mul_lo_64(q_hat, q));
    small_mod(reduced, q)
}

/// Lane mask of `a OP b` over unsigned 64-bit lanes.
#[inline]
#[target_feature(enable = "avx512f")]
pub(crate) unsafe fn cmp_mask(a: __m512i, b: __m512i, cmp: CmpInt) -> __mmask8 {
    match cmp {
        CmpInt::Eq => _mm512_cmpeq_epu64_mask(a, b),
        CmpInt::Lt => _mm512_cmplt_epu64_mask(a, b),
        CmpInt::Le => _mm512_cmple_epu64_mask(a, b),
        CmpInt::False => 0,
        CmpInt::Ne => _mm512_cmpneq_epu64_mask(a, b),
        CmpInt::Nlt => _mm512_cmpge_epu64_mask(a, b),
        CmpInt::Nle => _mm512_cmpgt_epu64_mask(a, b),
        CmpInt::True => 0xff,
    }
}

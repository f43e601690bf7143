//! AVX-512 Harvey butterflies, one bit-shift tier per function pair.
//!
//! Stages with fewer than 8 butterflies per block run the scalar butterfly;
//! blocks of 8 or more lanes broadcast the block twiddle and run vectorized.
//! Callers guarantee degree >= 16 and the capability flags named in each
//! `target_feature` attribute; the 52-bit tier additionally relies on
//! modulus < 2^50 so every intermediate stays under 2^52.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use crate::avx512::{mul_hi_52, mul_hi_64, mul_lo_64, small_mod};
use crate::modulus::barrett::Barrett;
use crate::modulus::ReduceOnce;
use crate::ntheory::multiply_mod_lazy;
use crate::ntt::NttTables;

const LANES: usize = 8;

/// w*x mod q in [0, 2q) with the quotient word at the 64-bit tier.
#[inline]
#[target_feature(enable = "avx512f,avx512dq")]
unsafe fn mul_mod_lazy_64(x: __m512i, w: __m512i, w_quot: __m512i, q: __m512i) -> __m512i {
    let q_hat = mul_hi_64(w_quot, x);
    _mm512_sub_epi64(mul_lo_64(x, w), mul_lo_64(q_hat, q))
}

/// w*x mod q in [0, 2q) with the quotient word at the 52-bit tier; x and the
/// quotient must be < 2^52.
#[inline]
#[target_feature(enable = "avx512f,avx512dq,avx512ifma")]
unsafe fn mul_mod_lazy_52(x: __m512i, w: __m512i, w_quot: __m512i, q: __m512i) -> __m512i {
    let q_hat = mul_hi_52(w_quot, x);
    _mm512_sub_epi64(mul_lo_64(x, w), mul_lo_64(q_hat, q))
}

#[inline(always)]
fn scalar_forward_butterfly<const BIT_SHIFT: u32>(
    xs: &mut [u64],
    ys: &mut [u64],
    w: Barrett,
    q: u64,
    two_q: u64,
) {
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        let tx = (*x).reduce_once(two_q);
        let wy = multiply_mod_lazy::<BIT_SHIFT>(*y, w, q);
        *x = tx + wy;
        *y = tx + two_q - wy;
    }
}

#[inline(always)]
fn scalar_inverse_butterfly<const BIT_SHIFT: u32>(
    xs: &mut [u64],
    ys: &mut [u64],
    w: Barrett,
    q: u64,
    two_q: u64,
) {
    for (x, y) in xs.iter_mut().zip(ys.iter_mut()) {
        let tx = *x + *y;
        let ty = *x + two_q - *y;
        *x = tx.reduce_once(two_q);
        *y = multiply_mod_lazy::<BIT_SHIFT>(ty, w, q);
    }
}

#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn forward_64<const LAZY: bool>(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let n = tables.degree;
    let v_q = _mm512_set1_epi64(q as i64);
    let v_two_q = _mm512_set1_epi64(two_q as i64);
    let roots = &tables.root_powers;

    let mut t = n >> 1;
    let mut m = 1;
    while m < n {
        let mut j1 = 0;
        for i in 0..m {
            let w = roots[m + i];
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            if t < LANES {
                scalar_forward_butterfly::<64>(xs, ys, w, q, two_q);
            } else {
                let v_w = _mm512_set1_epi64(w.value() as i64);
                let v_w_quot = _mm512_set1_epi64(w.quotient() as i64);
                for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
                    let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
                    let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
                    let v_tx = small_mod(v_x, v_two_q);
                    let v_wy = mul_mod_lazy_64(v_y, v_w, v_w_quot, v_q);
                    let out_x = _mm512_add_epi64(v_tx, v_wy);
                    let out_y = _mm512_add_epi64(v_tx, _mm512_sub_epi64(v_two_q, v_wy));
                    _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, out_x);
                    _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
                }
            }
            j1 += 2 * t;
        }
        t >>= 1;
        m <<= 1;
    }

    if !LAZY {
        // n >= 16, so n is divisible by the lane count
        for chunk in elements.chunks_exact_mut(LANES) {
            let v_x = _mm512_loadu_epi64(chunk.as_ptr() as *const i64);
            let out = small_mod(small_mod(v_x, v_two_q), v_q);
            _mm512_storeu_epi64(chunk.as_mut_ptr() as *mut i64, out);
        }
    }
}

#[target_feature(enable = "avx512f,avx512dq,avx512ifma")]
pub(crate) unsafe fn forward_52<const LAZY: bool>(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let n = tables.degree;
    let v_q = _mm512_set1_epi64(q as i64);
    let v_two_q = _mm512_set1_epi64(two_q as i64);
    let roots = tables
        .root_powers_52
        .as_ref()
        .expect("52-bit twiddle tables missing");

    let mut t = n >> 1;
    let mut m = 1;
    while m < n {
        let mut j1 = 0;
        for i in 0..m {
            let w = roots[m + i];
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            if t < LANES {
                scalar_forward_butterfly::<52>(xs, ys, w, q, two_q);
            } else {
                let v_w = _mm512_set1_epi64(w.value() as i64);
                let v_w_quot = _mm512_set1_epi64(w.quotient() as i64);
                for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
                    let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
                    let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
                    let v_tx = small_mod(v_x, v_two_q);
                    let v_wy = mul_mod_lazy_52(v_y, v_w, v_w_quot, v_q);
                    let out_x = _mm512_add_epi64(v_tx, v_wy);
                    let out_y = _mm512_add_epi64(v_tx, _mm512_sub_epi64(v_two_q, v_wy));
                    _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, out_x);
                    _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
                }
            }
            j1 += 2 * t;
        }
        t >>= 1;
        m <<= 1;
    }

    if !LAZY {
        for chunk in elements.chunks_exact_mut(LANES) {
            let v_x = _mm512_loadu_epi64(chunk.as_ptr() as *const i64);
            let out = small_mod(small_mod(v_x, v_two_q), v_q);
            _mm512_storeu_epi64(chunk.as_mut_ptr() as *mut i64, out);
        }
    }
}

#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn inverse_64(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let n = tables.degree;
    let v_q = _mm512_set1_epi64(q as i64);
    let v_two_q = _mm512_set1_epi64(two_q as i64);
    let roots = &tables.inv_root_powers;

    let mut t = 1;
    let mut m = n >> 1;
    let mut root_index = 1;
    while m > 1 {
        let mut j1 = 0;
        for _ in 0..m {
            let w = roots[root_index];
            root_index += 1;
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            if t < LANES {
                scalar_inverse_butterfly::<64>(xs, ys, w, q, two_q);
            } else {
                let v_w = _mm512_set1_epi64(w.value() as i64);
                let v_w_quot = _mm512_set1_epi64(w.quotient() as i64);
                for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
                    let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
                    let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
                    let v_tx = small_mod(_mm512_add_epi64(v_x, v_y), v_two_q);
                    let v_ty = _mm512_add_epi64(v_x, _mm512_sub_epi64(v_two_q, v_y));
                    let out_y = mul_mod_lazy_64(v_ty, v_w, v_w_quot, v_q);
                    _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, v_tx);
                    _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
                }
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m >>= 1;
    }

    // Final stage fused with the n^-1 scaling and the fold into [0, q).
    let inv_n = tables.inv_degree;
    let inv_n_w = tables.inv_degree_w;
    let v_inv_n = _mm512_set1_epi64(inv_n.value() as i64);
    let v_inv_n_quot = _mm512_set1_epi64(inv_n.quotient() as i64);
    let v_inv_n_w = _mm512_set1_epi64(inv_n_w.value() as i64);
    let v_inv_n_w_quot = _mm512_set1_epi64(inv_n_w.quotient() as i64);

    let (xs, ys) = elements.split_at_mut(n >> 1);
    for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
        let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
        let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
        let v_tx = small_mod(_mm512_add_epi64(v_x, v_y), v_two_q);
        let v_ty = _mm512_add_epi64(v_x, _mm512_sub_epi64(v_two_q, v_y));
        let out_x = small_mod(mul_mod_lazy_64(v_tx, v_inv_n, v_inv_n_quot, v_q), v_q);
        let out_y = small_mod(mul_mod_lazy_64(v_ty, v_inv_n_w, v_inv_n_w_quot, v_q), v_q);
        _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, out_x);
        _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
    }
}

#[target_feature(enable = "avx512f,avx512dq,avx512ifma")]
pub(crate) unsafe fn inverse_52(tables: &NttTables, elements: &mut [u64]) {
    let q = tables.modulus;
    let two_q = q << 1;
    let n = tables.degree;
    let v_q = _mm512_set1_epi64(q as i64);
    let v_two_q = _mm512_set1_epi64(two_q as i64);
    let roots = tables
        .inv_root_powers_52
        .as_ref()
        .expect("52-bit twiddle tables missing");

    let mut t = 1;
    let mut m = n >> 1;
    let mut root_index = 1;
    while m > 1 {
        let mut j1 = 0;
        for _ in 0..m {
            let w = roots[root_index];
            root_index += 1;
            let (xs, ys) = elements[j1..j1 + 2 * t].split_at_mut(t);
            if t < LANES {
                scalar_inverse_butterfly::<52>(xs, ys, w, q, two_q);
            } else {
                let v_w = _mm512_set1_epi64(w.value() as i64);
                let v_w_quot = _mm512_set1_epi64(w.quotient() as i64);
                for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
                    let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
                    let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
                    let v_tx = small_mod(_mm512_add_epi64(v_x, v_y), v_two_q);
                    let v_ty = _mm512_add_epi64(v_x, _mm512_sub_epi64(v_two_q, v_y));
                    let out_y = mul_mod_lazy_52(v_ty, v_w, v_w_quot, v_q);
                    _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, v_tx);
                    _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
                }
            }
            j1 += 2 * t;
        }
        t <<= 1;
        m >>= 1;
    }

    let inv_n = tables
        .inv_degree_52
        .expect("52-bit scaling factor missing");
    let inv_n_w = tables
        .inv_degree_w_52
        .expect("52-bit scaling factor missing");
    let v_inv_n = _mm512_set1_epi64(inv_n.value() as i64);
    let v_inv_n_quot = _mm512_set1_epi64(inv_n.quotient() as i64);
    let v_inv_n_w = _mm512_set1_epi64(inv_n_w.value() as i64);
    let v_inv_n_w_quot = _mm512_set1_epi64(inv_n_w.quotient() as i64);

    let (xs, ys) = elements.split_at_mut(n >> 1);
    for (xc, yc) in xs.chunks_exact_mut(LANES).zip(ys.chunks_exact_mut(LANES)) {
        let v_x = _mm512_loadu_epi64(xc.as_ptr() as *const i64);
        let v_y = _mm512_loadu_epi64(yc.as_ptr() as *const i64);
        let v_tx = small_mod(_mm512_add_epi64(v_x, v_y), v_two_q);
        let v_ty = _mm512_add_epi64(v_x, _mm512_sub_epi64(v_two_q, v_y));
        let out_x = small_mod(mul_mod_lazy_52(v_tx, v_inv_n, v_inv_n_quot, v_q), v_q);
        let out_y = small_mod(mul_mod_lazy_52(v_ty, v_inv_n_w, v_inv_n_w_quot, v_q), v_q);
        _mm512_storeu_epi64(xc.as_mut_ptr() as *mut i64, out_x);
        _mm512_storeu_epi64(yc.as_mut_ptr() as *mut i64, out_y);
    }
}

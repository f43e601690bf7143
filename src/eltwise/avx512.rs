//! AVX-512 eltwise kernels, eight lanes per iteration with a scalar tail.
//!
//! Callers hold the capability proof from [`crate::arch::CpuFeatures`] before
//! entering any function here; the `target_feature` attributes state exactly
//! which flags each path needs.

#![allow(unsafe_op_in_unsafe_fn)]

use std::arch::x86_64::*;

use crate::avx512::{barrett_reduce_64, cmp_mask, mul_hi_52, mul_hi_64, mul_lo_64, small_mod};
use crate::eltwise::{native, CmpInt};
use crate::modulus::barrett::BarrettPrecomp;

const LANES: usize = 8;

/// Folds lanes from [0, IMF*q) into [0, q).
#[inline]
#[target_feature(enable = "avx512f")]
unsafe fn reduce_input<const IMF: u64>(x: __m512i, q: __m512i, two_q: __m512i) -> __m512i {
    match IMF {
        1 => x,
        2 => small_mod(x, q),
        4 => small_mod(small_mod(x, two_q), q),
        _ => unreachable!(),
    }
}

#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn mult_mod_int(
    operand1: &mut [u64],
    operand2: &[u64],
    modulus: u64,
    input_mod_factor: u64,
) {
    match input_mod_factor {
        1 => mult_mod_int_imf::<1>(operand1, operand2, modulus),
        2 => mult_mod_int_imf::<2>(operand1, operand2, modulus),
        4 => mult_mod_int_imf::<4>(operand1, operand2, modulus),
        _ => unreachable!(),
    }
}

// Vector rendition of the scalar Barrett multiply; same constants, the
// cross-word shifts done with srlv/sllv since the counts are runtime values.
#[target_feature(enable = "avx512f,avx512dq")]
unsafe fn mult_mod_int_imf<const IMF: u64>(operand1: &mut [u64], operand2: &[u64], modulus: u64) {
    let n_bits = modulus.ilog2() + 1;
    let l = 2 * n_bits;
    let barr_lo = ((1u128 << l) / modulus as u128) as u64;

    let v_q = _mm512_set1_epi64(modulus as i64);
    let v_two_q = _mm512_set1_epi64((modulus << 1) as i64);
    let v_barr = _mm512_set1_epi64(barr_lo as i64);
    let shift1 = _mm512_set1_epi64((n_bits - 1) as i64);
    let shift1c = _mm512_set1_epi64((64 - (n_bits - 1)) as i64);
    let shift2 = _mm512_set1_epi64((l - n_bits + 1) as i64);
    let shift2c = _mm512_set1_epi64((64 - (l - n_bits + 1)) as i64);

    let split = operand1.len() - operand1.len() % LANES;
    let (head1, tail1) = operand1.split_at_mut(split);
    let (head2, tail2) = operand2.split_at(split);

    for (x_chunk, y_chunk) in head1.chunks_exact_mut(LANES).zip(head2.chunks_exact(LANES)) {
        let x = _mm512_loadu_epi64(x_chunk.as_ptr() as *const i64);
        let y = _mm512_loadu_epi64(y_chunk.as_ptr() as *const i64);
        let x = reduce_input::<IMF>(x, v_q, v_two_q);
        let y = reduce_input::<IMF>(y, v_q, v_two_q);

        let prod_hi = mul_hi_64(x, y);
        let prod_lo = mul_lo_64(x, y);

        // c1 = prod >> (n - 1)
        let c1 = _mm512_add_epi64(
            _mm512_srlv_epi64(prod_lo, shift1),
            _mm512_sllv_epi64(prod_hi, shift1c),
        );
        let c2_hi = mul_hi_64(c1, v_barr);
        let c2_lo = mul_lo_64(c1, v_barr);
        // c3 = c1 * barr_lo >> (l - n + 1)
        let c3 = _mm512_add_epi64(
            _mm512_srlv_epi64(c2_lo, shift2),
            _mm512_sllv_epi64(c2_hi, shift2c),
        );

        let reduced = _mm512_sub_epi64(prod_lo, mul_lo_64(c3, v_q));
        let out = small_mod(reduced, v_q);
        _mm512_storeu_epi64(x_chunk.as_mut_ptr() as *mut i64, out);
    }

    native::mult_mod(tail1, tail2, modulus, IMF);
}

// Double-precision path; exact because the dispatcher guarantees
// input_mod_factor * modulus < 2^50, so inputs need no reduction and the
// two-product h + l captures x*y without loss.
#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn mult_mod_float(
    operand1: &mut [u64],
    operand2: &[u64],
    modulus: u64,
    input_mod_factor: u64,
) {
    let p = _mm512_set1_pd(modulus as f64);
    let u = _mm512_set1_pd(1.0 / modulus as f64);
    let zero = _mm512_setzero_pd();

    let split = operand1.len() - operand1.len() % LANES;
    let (head1, tail1) = operand1.split_at_mut(split);
    let (head2, tail2) = operand2.split_at(split);

    for (x_chunk, y_chunk) in head1.chunks_exact_mut(LANES).zip(head2.chunks_exact(LANES)) {
        let x = _mm512_cvtepu64_pd(_mm512_loadu_epi64(x_chunk.as_ptr() as *const i64));
        let y = _mm512_cvtepu64_pd(_mm512_loadu_epi64(y_chunk.as_ptr() as *const i64));

        let h = _mm512_mul_pd(x, y);
        let l = _mm512_fmsub_pd(x, y, h);
        let b = _mm512_mul_pd(h, u);
        // floor, suppressing exceptions
        let c = _mm512_roundscale_pd::<0x09>(b);
        let d = _mm512_fnmadd_pd(c, p, h);
        let g = _mm512_add_pd(d, l);
        let negative = _mm512_cmp_pd_mask::<_CMP_LT_OQ>(g, zero);
        let g = _mm512_mask_add_pd(g, negative, g, p);

        let out = _mm512_cvtpd_epu64(g);
        _mm512_storeu_epi64(x_chunk.as_mut_ptr() as *mut i64, out);
    }

    native::mult_mod(tail1, tail2, modulus, input_mod_factor);
}

#[target_feature(enable = "avx512f,avx512dq,avx512ifma")]
pub(crate) unsafe fn fma_mod_52(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
    input_mod_factor: u64,
) {
    match input_mod_factor {
        1 => fma_mod_52_imf::<1>(operand1, scalar, addend, modulus),
        2 => fma_mod_52_imf::<2>(operand1, scalar, addend, modulus),
        4 => fma_mod_52_imf::<4>(operand1, scalar, addend, modulus),
        _ => unreachable!(),
    }
}

#[target_feature(enable = "avx512f,avx512dq,avx512ifma")]
unsafe fn fma_mod_52_imf<const IMF: u64>(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
) {
    let quotient = (((scalar as u128) << 52) / modulus as u128) as u64;
    let v_q = _mm512_set1_epi64(modulus as i64);
    let v_two_q = _mm512_set1_epi64((modulus << 1) as i64);
    let v_scalar = _mm512_set1_epi64(scalar as i64);
    let v_quot = _mm512_set1_epi64(quotient as i64);

    let split = operand1.len() - operand1.len() % LANES;
    let (head, tail) = operand1.split_at_mut(split);
    let (addend_head, addend_tail) = match addend {
        Some(a) => {
            let (h, t) = a.split_at(split);
            (Some(h), Some(t))
        }
        None => (None, None),
    };

    for (i, x_chunk) in head.chunks_exact_mut(LANES).enumerate() {
        let x = _mm512_loadu_epi64(x_chunk.as_ptr() as *const i64);
        // after reduction x < q < 2^51, so the 52-bit mulhi is exact
        let x = reduce_input::<IMF>(x, v_q, v_two_q);
        let q_hat = mul_hi_52(x, v_quot);
        let reduced = _mm512_sub_epi64(mul_lo_64(x, v_scalar), mul_lo_64(q_hat, v_q));
        let mut out = small_mod(reduced, v_q);

        if let Some(a) = addend_head {
            let a = _mm512_loadu_epi64(a[i * LANES..].as_ptr() as *const i64);
            out = small_mod(_mm512_add_epi64(out, a), v_q);
        }
        _mm512_storeu_epi64(x_chunk.as_mut_ptr() as *mut i64, out);
    }

    native::fma_mod(tail, scalar, addend_tail, modulus, IMF);
}

#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn fma_mod_64(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
    input_mod_factor: u64,
) {
    match input_mod_factor {
        1 => fma_mod_64_imf::<1>(operand1, scalar, addend, modulus),
        2 => fma_mod_64_imf::<2>(operand1, scalar, addend, modulus),
        4 => fma_mod_64_imf::<4>(operand1, scalar, addend, modulus),
        _ => unreachable!(),
    }
}

#[target_feature(enable = "avx512f,avx512dq")]
unsafe fn fma_mod_64_imf<const IMF: u64>(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
) {
    let quotient = (((scalar as u128) << 64) / modulus as u128) as u64;
    let v_q = _mm512_set1_epi64(modulus as i64);
    let v_two_q = _mm512_set1_epi64((modulus << 1) as i64);
    let v_scalar = _mm512_set1_epi64(scalar as i64);
    let v_quot = _mm512_set1_epi64(quotient as i64);

    let split = operand1.len() - operand1.len() % LANES;
    let (head, tail) = operand1.split_at_mut(split);
    let (addend_head, addend_tail) = match addend {
        Some(a) => {
            let (h, t) = a.split_at(split);
            (Some(h), Some(t))
        }
        None => (None, None),
    };

    for (i, x_chunk) in head.chunks_exact_mut(LANES).enumerate() {
        let x = _mm512_loadu_epi64(x_chunk.as_ptr() as *const i64);
        let x = reduce_input::<IMF>(x, v_q, v_two_q);
        let q_hat = mul_hi_64(x, v_quot);
        let reduced = _mm512_sub_epi64(mul_lo_64(x, v_scalar), mul_lo_64(q_hat, v_q));
        let mut out = small_mod(reduced, v_q);

        if let Some(a) = addend_head {
            let a = _mm512_loadu_epi64(a[i * LANES..].as_ptr() as *const i64);
            out = small_mod(_mm512_add_epi64(out, a), v_q);
        }
        _mm512_storeu_epi64(x_chunk.as_mut_ptr() as *mut i64, out);
    }

    native::fma_mod(tail, scalar, addend_tail, modulus, IMF);
}

#[target_feature(enable = "avx512f")]
pub(crate) unsafe fn cmp_add(operand: &mut [u64], cmp: CmpInt, bound: u64, diff: u64) {
    let v_bound = _mm512_set1_epi64(bound as i64);
    let v_diff = _mm512_set1_epi64(diff as i64);

    let split = operand.len() - operand.len() % LANES;
    let (head, tail) = operand.split_at_mut(split);

    for chunk in head.chunks_exact_mut(LANES) {
        let x = _mm512_loadu_epi64(chunk.as_ptr() as *const i64);
        let mask = cmp_mask(x, v_bound, cmp);
        let out = _mm512_mask_add_epi64(x, mask, x, v_diff);
        _mm512_storeu_epi64(chunk.as_mut_ptr() as *mut i64, out);
    }

    native::cmp_add(tail, cmp, bound, diff);
}

#[target_feature(enable = "avx512f,avx512dq")]
pub(crate) unsafe fn cmp_sub_mod(
    operand: &mut [u64],
    modulus: u64,
    cmp: CmpInt,
    bound: u64,
    diff: u64,
) {
    // the high word of floor(2^128/q) is floor(2^64/q)
    let barr = BarrettPrecomp::new(modulus).value_hi();
    let v_q = _mm512_set1_epi64(modulus as i64);
    let v_barr = _mm512_set1_epi64(barr as i64);
    let v_bound = _mm512_set1_epi64(bound as i64);
    let v_q_minus_diff = _mm512_set1_epi64((modulus - diff) as i64);

    let split = operand.len() - operand.len() % LANES;
    let (head, tail) = operand.split_at_mut(split);

    for chunk in head.chunks_exact_mut(LANES) {
        let x = _mm512_loadu_epi64(chunk.as_ptr() as *const i64);
        // compare the raw lanes, subtract on the residues
        let mask = cmp_mask(x, v_bound, cmp);
        let residue = barrett_reduce_64(x, v_q, v_barr);
        let adjusted = small_mod(_mm512_add_epi64(residue, v_q_minus_diff), v_q);
        let out = _mm512_mask_blend_epi64(mask, x, adjusted);
        _mm512_storeu_epi64(chunk.as_mut_ptr() as *mut i64, out);
    }

    native::cmp_sub_mod(tail, modulus, cmp, bound, diff);
}

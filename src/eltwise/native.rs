//! Portable scalar kernels. These are the reference implementations the wide
//! paths are tested against, and the fallback on every other CPU.

use itertools::izip;

use crate::eltwise::CmpInt;
use crate::modulus::barrett::BarrettPrecomp;
use crate::modulus::ReduceOnce;
use crate::ntheory::{add_mod, sub_mod};

/// Folds x from [0, IMF*q) into [0, q) with at most two conditional
/// subtractions.
#[inline(always)]
pub(crate) fn reduce_input<const IMF: u64>(x: u64, modulus: u64, twice_modulus: u64) -> u64 {
    match IMF {
        1 => x,
        2 => x.reduce_once(modulus),
        4 => x.reduce_once(twice_modulus).reduce_once(modulus),
        _ => unreachable!("input_mod_factor {} not in {{1, 2, 4}}", IMF),
    }
}

pub(crate) fn mult_mod(operand1: &mut [u64], operand2: &[u64], modulus: u64, input_mod_factor: u64) {
    match input_mod_factor {
        1 => mult_mod_imf::<1>(operand1, operand2, modulus),
        2 => mult_mod_imf::<2>(operand1, operand2, modulus),
        4 => mult_mod_imf::<4>(operand1, operand2, modulus),
        _ => unreachable!(),
    }
}

// Algorithm 1 of https://hal.archives-ouvertes.fr/hal-01215845/document
fn mult_mod_imf<const IMF: u64>(operand1: &mut [u64], operand2: &[u64], modulus: u64) {
    let twice_modulus = modulus << 1;

    // modulus < 2^n
    let n = modulus.ilog2() + 1;
    let l = 2 * n;
    let barr_lo = ((1u128 << l) / modulus as u128) as u64;

    for (x, &y) in izip!(operand1.iter_mut(), operand2.iter()) {
        let a = reduce_input::<IMF>(*x, modulus, twice_modulus);
        let b = reduce_input::<IMF>(y, modulus, twice_modulus);

        let prod = a as u128 * b as u128;
        let c1 = (prod >> (n - 1)) as u64;
        let c3 = ((c1 as u128 * barr_lo as u128) >> (l - n + 1)) as u64;
        let reduced = (prod as u64).wrapping_sub(c3.wrapping_mul(modulus));
        *x = reduced.reduce_once(modulus);
    }
}

pub(crate) fn fma_mod(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
    input_mod_factor: u64,
) {
    match input_mod_factor {
        1 => fma_mod_imf::<1>(operand1, scalar, addend, modulus),
        2 => fma_mod_imf::<2>(operand1, scalar, addend, modulus),
        4 => fma_mod_imf::<4>(operand1, scalar, addend, modulus),
        _ => unreachable!(),
    }
}

fn fma_mod_imf<const IMF: u64>(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
) {
    let precomp = BarrettPrecomp::new(modulus);
    let twice_modulus = precomp.two_q();
    let factor = precomp.prepare::<64>(scalar);

    match addend {
        Some(addend) => {
            for (x, &a) in izip!(operand1.iter_mut(), addend.iter()) {
                let v = reduce_input::<IMF>(*x, modulus, twice_modulus);
                *x = add_mod(precomp.mul(factor, v), a, modulus);
            }
        }
        None => {
            for x in operand1.iter_mut() {
                let v = reduce_input::<IMF>(*x, modulus, twice_modulus);
                *x = precomp.mul(factor, v);
            }
        }
    }
}

pub(crate) fn cmp_add(operand: &mut [u64], cmp: CmpInt, bound: u64, diff: u64) {
    for x in operand.iter_mut() {
        if cmp.matches(*x, bound) {
            *x = x.wrapping_add(diff);
        }
    }
}

pub(crate) fn cmp_sub_mod(operand: &mut [u64], modulus: u64, cmp: CmpInt, bound: u64, diff: u64) {
    let precomp = BarrettPrecomp::new(modulus);
    for x in operand.iter_mut() {
        if cmp.matches(*x, bound) {
            // The comparison sees the raw value, the subtraction its residue.
            *x = sub_mod(precomp.reduce(*x), diff, modulus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ntheory::multiply_mod;

    #[test]
    fn mult_mod_matches_widening_oracle() {
        let q: u64 = (1u64 << 60) + 33; // larger than the float-path bound
        let mut a: Vec<u64> = vec![0, 1, q - 1, q / 2, 123456789, q - 2];
        let b: Vec<u64> = vec![q - 1, q - 1, q - 1, 3, 987654321, q - 2];
        let expected: Vec<u64> = izip!(a.iter(), b.iter())
            .map(|(&x, &y)| multiply_mod(x, y, q))
            .collect();
        mult_mod(&mut a, &b, q, 1);
        assert_eq!(a, expected);
    }

    #[test]
    fn mult_mod_reduces_lazy_inputs() {
        let q: u64 = 769;
        for imf in [2u64, 4] {
            let bound = imf * q;
            let mut a: Vec<u64> = vec![bound - 1, q, 2 * q - 1, 0, bound / 2];
            let b: Vec<u64> = vec![bound - 1, bound - 1, q + 1, 5, 3];
            let expected: Vec<u64> = izip!(a.iter(), b.iter())
                .map(|(&x, &y)| multiply_mod(x % q, y % q, q))
                .collect();
            mult_mod(&mut a, &b, q, imf);
            assert_eq!(a, expected, "imf={}", imf);
        }
    }

    #[test]
    fn fma_mod_with_and_without_addend() {
        let q: u64 = 65537;
        let scalar = 12345;
        let addend: Vec<u64> = vec![0, 1, q - 1, 42];
        let mut a: Vec<u64> = vec![q - 1, 2, 3, q / 2];
        let expected: Vec<u64> = izip!(a.iter(), addend.iter())
            .map(|(&x, &c)| (multiply_mod(x, scalar, q) + c) % q)
            .collect();
        let mut b = a.clone();
        fma_mod(&mut a, scalar, Some(addend.as_slice()), q, 1);
        assert_eq!(a, expected);

        fma_mod(&mut b, scalar, None, q, 1);
        let expected: Vec<u64> = expected
            .iter()
            .zip(addend.iter())
            .map(|(&r, &c)| (r + q - c) % q)
            .collect();
        assert_eq!(b, expected);
    }

    #[test]
    fn cmp_add_only_touches_matching_lanes() {
        let mut a: Vec<u64> = vec![1, 50, 99, 50];
        cmp_add(&mut a, CmpInt::Nlt, 50, 7);
        assert_eq!(a, vec![1, 57, 106, 57]);

        let mut a: Vec<u64> = vec![1, 50, 99];
        cmp_add(&mut a, CmpInt::False, 50, 7);
        assert_eq!(a, vec![1, 50, 99]);
    }

    #[test]
    fn cmp_sub_mod_wraps_through_modulus() {
        let q: u64 = 100;
        let mut a: Vec<u64> = vec![0, 10, 77, 99];
        cmp_sub_mod(&mut a, q, CmpInt::Le, 77, 20);
        assert_eq!(a, vec![80, 90, 57, 99]);
    }

    #[test]
    fn cmp_sub_mod_reduces_arbitrary_raw_values() {
        let q: u64 = 1125891450734593;
        let diff = 12345;
        let mut a: Vec<u64> = vec![0, q - 1, q, 2 * q + 7, u64::MAX, u64::MAX / 3, 1 << 62];
        let expected: Vec<u64> = a
            .iter()
            .map(|&x| if x >= q { (x % q + q - diff) % q } else { x })
            .collect();
        cmp_sub_mod(&mut a, q, CmpInt::Nlt, q, diff);
        assert_eq!(a, expected);
    }
}

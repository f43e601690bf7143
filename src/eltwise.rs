//! Element-wise kernels over `&[u64]` buffers: multiply mod q, fused
//! multiply-add mod q, and the compare-and-adjust pair.
//!
//! Every entry point exists in an out-of-place form (`result` first, inputs
//! untouched) and an `_inplace` form mutating the first operand. Length and
//! modulus preconditions are `assert!`ed; per-element range preconditions are
//! `debug_assert!`ed inside the kernels. The scalar implementations in
//! [`native`] are the reference; the AVX-512 implementations are selected per
//! call from the CPU capability set and are value-identical to scalar.

pub(crate) mod native;

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx512;

use crate::arch::CpuFeatures;

/// Comparison selector for [`eltwise_cmp_add`] and [`eltwise_cmp_sub_mod`].
///
/// `Nlt` is >=, `Nle` is >; `True`/`False` select every/no lane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpInt {
    Eq,
    Lt,
    Le,
    False,
    Ne,
    Nlt,
    Nle,
    True,
}

impl CmpInt {
    /// Evaluates `lhs OP rhs`.
    #[inline(always)]
    pub fn matches(self, lhs: u64, rhs: u64) -> bool {
        match self {
            CmpInt::Eq => lhs == rhs,
            CmpInt::Lt => lhs < rhs,
            CmpInt::Le => lhs <= rhs,
            CmpInt::False => false,
            CmpInt::Ne => lhs != rhs,
            CmpInt::Nlt => lhs >= rhs,
            CmpInt::Nle => lhs > rhs,
            CmpInt::True => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MultModStrategy {
    Scalar,
    Avx512Float,
    Avx512Int,
}

/// Strategy for the multiply kernel. Pure in its arguments; consulted on
/// every call. The float path is exact only while products stay under 2^52,
/// which the `input_mod_factor * modulus < 2^50` bound guarantees with slack
/// for the lazy intermediate.
pub(crate) fn mult_mod_strategy(
    features: &CpuFeatures,
    modulus: u64,
    input_mod_factor: u64,
) -> MultModStrategy {
    if !features.avx512dq {
        return MultModStrategy::Scalar;
    }
    if (input_mod_factor as u128) * (modulus as u128) < (1 << 50) {
        MultModStrategy::Avx512Float
    } else {
        MultModStrategy::Avx512Int
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FmaModStrategy {
    Scalar,
    Avx512Ifma,
    Avx512Dq,
}

/// Strategy for the fused multiply-add kernel. The IFMA tier needs the
/// 52-bit quotient estimate to be exact, hence the modulus bound.
pub(crate) fn fma_mod_strategy(features: &CpuFeatures, modulus: u64) -> FmaModStrategy {
    if features.avx512ifma && modulus < (1 << 51) {
        FmaModStrategy::Avx512Ifma
    } else if features.avx512dq {
        FmaModStrategy::Avx512Dq
    } else {
        FmaModStrategy::Scalar
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CmpStrategy {
    Scalar,
    Avx512,
}

pub(crate) fn cmp_strategy(features: &CpuFeatures) -> CmpStrategy {
    if features.avx512dq {
        CmpStrategy::Avx512
    } else {
        CmpStrategy::Scalar
    }
}

fn check_mult_mod_args(len1: usize, len2: usize, modulus: u64, input_mod_factor: u64) {
    assert_eq!(len1, len2, "operand lengths differ: {} vs {}", len1, len2);
    assert!(
        modulus > 1 && modulus < (1u64 << 62) && modulus & 1 == 1,
        "modulus {} out of range (odd, 1 < q < 2^62 required)",
        modulus
    );
    assert!(
        matches!(input_mod_factor, 1 | 2 | 4),
        "input_mod_factor {} not in {{1, 2, 4}}",
        input_mod_factor
    );
}

#[cfg(debug_assertions)]
fn debug_check_bounds(values: &[u64], bound: u64) {
    debug_assert!(
        values.iter().all(|&v| v < bound),
        "element exceeds bound {}",
        bound
    );
}

#[cfg(not(debug_assertions))]
fn debug_check_bounds(_values: &[u64], _bound: u64) {}

/// result[i] = op1[i]*op2[i] mod modulus.
///
/// Inputs must be < input_mod_factor*modulus; outputs are < modulus.
pub fn eltwise_mult_mod(
    result: &mut [u64],
    operand1: &[u64],
    operand2: &[u64],
    modulus: u64,
    input_mod_factor: u64,
) {
    assert_eq!(
        result.len(),
        operand1.len(),
        "result length {} differs from operand length {}",
        result.len(),
        operand1.len()
    );
    result.copy_from_slice(operand1);
    eltwise_mult_mod_inplace(result, operand2, modulus, input_mod_factor);
}

/// In-place form of [`eltwise_mult_mod`]: operand1[i] *= operand2[i] mod q.
pub fn eltwise_mult_mod_inplace(
    operand1: &mut [u64],
    operand2: &[u64],
    modulus: u64,
    input_mod_factor: u64,
) {
    check_mult_mod_args(operand1.len(), operand2.len(), modulus, input_mod_factor);
    debug_check_bounds(operand1, input_mod_factor * modulus);
    debug_check_bounds(operand2, input_mod_factor * modulus);

    match mult_mod_strategy(CpuFeatures::get(), modulus, input_mod_factor) {
        #[cfg(target_arch = "x86_64")]
        MultModStrategy::Avx512Float => {
            log::trace!("eltwise_mult_mod: avx512 float path, q={}", modulus);
            unsafe { avx512::mult_mod_float(operand1, operand2, modulus, input_mod_factor) }
        }
        #[cfg(target_arch = "x86_64")]
        MultModStrategy::Avx512Int => {
            log::trace!("eltwise_mult_mod: avx512 int path, q={}", modulus);
            unsafe { avx512::mult_mod_int(operand1, operand2, modulus, input_mod_factor) }
        }
        _ => {
            log::trace!("eltwise_mult_mod: scalar path, q={}", modulus);
            native::mult_mod(operand1, operand2, modulus, input_mod_factor)
        }
    }
}

/// result[i] = op1[i]*scalar + addend[i] mod modulus (the addition is skipped
/// when `addend` is `None`).
///
/// op1 elements must be < input_mod_factor*modulus, addend elements and
/// scalar < modulus; outputs are < modulus.
pub fn eltwise_fma_mod(
    result: &mut [u64],
    operand1: &[u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
    input_mod_factor: u64,
) {
    assert_eq!(
        result.len(),
        operand1.len(),
        "result length {} differs from operand length {}",
        result.len(),
        operand1.len()
    );
    result.copy_from_slice(operand1);
    eltwise_fma_mod_inplace(result, scalar, addend, modulus, input_mod_factor);
}

/// In-place form of [`eltwise_fma_mod`].
pub fn eltwise_fma_mod_inplace(
    operand1: &mut [u64],
    scalar: u64,
    addend: Option<&[u64]>,
    modulus: u64,
    input_mod_factor: u64,
) {
    if let Some(addend) = addend {
        assert_eq!(
            operand1.len(),
            addend.len(),
            "addend length {} differs from operand length {}",
            addend.len(),
            operand1.len()
        );
        debug_check_bounds(addend, modulus);
    }
    check_mult_mod_args(operand1.len(), operand1.len(), modulus, input_mod_factor);
    assert!(scalar < modulus, "scalar {} exceeds modulus {}", scalar, modulus);
    debug_check_bounds(operand1, input_mod_factor * modulus);

    match fma_mod_strategy(CpuFeatures::get(), modulus) {
        #[cfg(target_arch = "x86_64")]
        FmaModStrategy::Avx512Ifma => {
            log::trace!("eltwise_fma_mod: avx512 ifma path, q={}", modulus);
            unsafe { avx512::fma_mod_52(operand1, scalar, addend, modulus, input_mod_factor) }
        }
        #[cfg(target_arch = "x86_64")]
        FmaModStrategy::Avx512Dq => {
            log::trace!("eltwise_fma_mod: avx512 dq path, q={}", modulus);
            unsafe { avx512::fma_mod_64(operand1, scalar, addend, modulus, input_mod_factor) }
        }
        _ => {
            log::trace!("eltwise_fma_mod: scalar path, q={}", modulus);
            native::fma_mod(operand1, scalar, addend, modulus, input_mod_factor)
        }
    }
}

/// result[i] = operand[i] + diff where `operand[i] OP bound` holds, else
/// operand[i]. Plain u64 addition, no modulus.
pub fn eltwise_cmp_add(
    result: &mut [u64],
    operand: &[u64],
    cmp: CmpInt,
    bound: u64,
    diff: u64,
) {
    assert_eq!(
        result.len(),
        operand.len(),
        "result length {} differs from operand length {}",
        result.len(),
        operand.len()
    );
    result.copy_from_slice(operand);
    eltwise_cmp_add_inplace(result, cmp, bound, diff);
}

/// In-place form of [`eltwise_cmp_add`].
pub fn eltwise_cmp_add_inplace(operand: &mut [u64], cmp: CmpInt, bound: u64, diff: u64) {
    assert!(diff != 0, "diff must be non-zero");

    match cmp_strategy(CpuFeatures::get()) {
        #[cfg(target_arch = "x86_64")]
        CmpStrategy::Avx512 => {
            log::trace!("eltwise_cmp_add: avx512 path");
            unsafe { avx512::cmp_add(operand, cmp, bound, diff) }
        }
        _ => {
            log::trace!("eltwise_cmp_add: scalar path");
            native::cmp_add(operand, cmp, bound, diff)
        }
    }
}

/// result[i] = operand[i] - diff mod modulus where `operand[i] OP bound`
/// holds, else operand[i].
///
/// The comparison sees the raw element; the subtraction reduces it mod
/// modulus first, so adjusted outputs are always < modulus.
pub fn eltwise_cmp_sub_mod(
    result: &mut [u64],
    operand: &[u64],
    modulus: u64,
    cmp: CmpInt,
    bound: u64,
    diff: u64,
) {
    assert_eq!(
        result.len(),
        operand.len(),
        "result length {} differs from operand length {}",
        result.len(),
        operand.len()
    );
    result.copy_from_slice(operand);
    eltwise_cmp_sub_mod_inplace(result, modulus, cmp, bound, diff);
}

/// In-place form of [`eltwise_cmp_sub_mod`].
pub fn eltwise_cmp_sub_mod_inplace(
    operand: &mut [u64],
    modulus: u64,
    cmp: CmpInt,
    bound: u64,
    diff: u64,
) {
    assert!(
        modulus > 1 && modulus < (1u64 << 62),
        "modulus {} out of range",
        modulus
    );
    assert!(diff != 0 && diff < modulus, "diff {} not in (0, modulus)", diff);

    match cmp_strategy(CpuFeatures::get()) {
        #[cfg(target_arch = "x86_64")]
        CmpStrategy::Avx512 => {
            log::trace!("eltwise_cmp_sub_mod: avx512 path");
            unsafe { avx512::cmp_sub_mod(operand, modulus, cmp, bound, diff) }
        }
        _ => {
            log::trace!("eltwise_cmp_sub_mod: scalar path");
            native::cmp_sub_mod(operand, modulus, cmp, bound, diff)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_simd() -> CpuFeatures {
        CpuFeatures::default()
    }

    fn full_simd() -> CpuFeatures {
        CpuFeatures { avx512dq: true, avx512ifma: true }
    }

    #[test]
    fn mult_mod_dispatch_is_pure_in_features_and_modulus() {
        assert_eq!(mult_mod_strategy(&no_simd(), 769, 1), MultModStrategy::Scalar);
        assert_eq!(
            mult_mod_strategy(&full_simd(), 769, 1),
            MultModStrategy::Avx512Float
        );
        // 2^49 <= q < 2^50: factor 1 still fits the float bound, factor 2 not.
        let q = (1u64 << 49) + 21;
        assert_eq!(mult_mod_strategy(&full_simd(), q, 1), MultModStrategy::Avx512Float);
        assert_eq!(mult_mod_strategy(&full_simd(), q, 2), MultModStrategy::Avx512Int);
        let big = (1u64 << 60) + 33;
        assert_eq!(mult_mod_strategy(&full_simd(), big, 4), MultModStrategy::Avx512Int);
    }

    #[test]
    fn fma_dispatch_prefers_ifma_for_small_moduli() {
        assert_eq!(fma_mod_strategy(&no_simd(), 769), FmaModStrategy::Scalar);
        assert_eq!(fma_mod_strategy(&full_simd(), 769), FmaModStrategy::Avx512Ifma);
        let big = (1u64 << 60) + 33;
        assert_eq!(fma_mod_strategy(&full_simd(), big), FmaModStrategy::Avx512Dq);
        let dq_only = CpuFeatures { avx512dq: true, avx512ifma: false };
        assert_eq!(fma_mod_strategy(&dq_only, 769), FmaModStrategy::Avx512Dq);
    }

    #[test]
    fn cmp_matches_all_eight_ops() {
        let cases = [(1u64, 2u64), (2, 2), (3, 2)];
        let expect = |op: CmpInt| -> [bool; 3] {
            match op {
                CmpInt::Eq => [false, true, false],
                CmpInt::Lt => [true, false, false],
                CmpInt::Le => [true, true, false],
                CmpInt::False => [false, false, false],
                CmpInt::Ne => [true, false, true],
                CmpInt::Nlt => [false, true, true],
                CmpInt::Nle => [false, false, true],
                CmpInt::True => [true, true, true],
            }
        };
        for op in [
            CmpInt::Eq,
            CmpInt::Lt,
            CmpInt::Le,
            CmpInt::False,
            CmpInt::Ne,
            CmpInt::Nlt,
            CmpInt::Nle,
            CmpInt::True,
        ] {
            for (case, want) in cases.iter().zip(expect(op)) {
                assert_eq!(op.matches(case.0, case.1), want, "{:?} {:?}", op, case);
            }
        }
    }

    #[test]
    #[should_panic(expected = "input_mod_factor")]
    fn mult_mod_rejects_bad_factor() {
        let mut a = [1u64; 4];
        let b = [1u64; 4];
        eltwise_mult_mod_inplace(&mut a, &b, 769, 3);
    }

    #[test]
    #[should_panic(expected = "lengths differ")]
    fn mult_mod_rejects_length_mismatch() {
        let mut a = [1u64; 4];
        let b = [1u64; 5];
        eltwise_mult_mod_inplace(&mut a, &b, 769, 1);
    }
}

use num_bigint::BigUint;
use num_traits::cast::ToPrimitive;

use crate::modulus::ReduceOnce;

/// Multiply factor: an operand paired with floor(operand << BIT_SHIFT / q).
///
/// The quotient turns a multiplication mod q into one low multiply, one high
/// multiply and one wrapping subtraction. `BIT_SHIFT` is 64 on the scalar and
/// wide 64-bit tiers and 52 on the IFMA tier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Barrett(u64, u64);

impl Barrett {
    #[inline(always)]
    pub fn value(&self) -> u64 {
        self.0
    }

    #[inline(always)]
    pub fn quotient(&self) -> u64 {
        self.1
    }
}

/// Per-modulus precomputation: q, its small multiples, and the two words of
/// floor(2^128 / q) used by the full reduction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BarrettPrecomp {
    q: u64,
    two_q: u64,
    four_q: u64,
    lo: u64,
    hi: u64,
}

impl BarrettPrecomp {
    pub fn new(q: u64) -> BarrettPrecomp {
        assert!(q > 1 && q < (1u64 << 62), "modulus q={} out of range", q);
        let big_r = (BigUint::from(1u8) << 128u32) / BigUint::from(q);
        let lo = (&big_r & BigUint::from(u64::MAX)).to_u64().unwrap();
        let hi = (big_r >> 64u32).to_u64().unwrap();
        Self {
            q,
            two_q: q << 1,
            four_q: q << 2,
            lo,
            hi,
        }
    }

    #[inline(always)]
    pub fn modulus(&self) -> u64 {
        self.q
    }

    #[inline(always)]
    pub fn two_q(&self) -> u64 {
        self.two_q
    }

    #[inline(always)]
    pub fn four_q(&self) -> u64 {
        self.four_q
    }

    #[inline(always)]
    pub fn value_hi(&self) -> u64 {
        self.hi
    }

    #[inline(always)]
    pub fn value_lo(&self) -> u64 {
        self.lo
    }

    /// Builds the multiply factor for `v` at the given bit-shift tier.
    #[inline(always)]
    pub fn prepare<const BIT_SHIFT: u32>(&self, v: u64) -> Barrett {
        assert!(v <= self.q, "operand {} exceeds modulus {}", v, self.q);
        let quotient = (((v as u128) << BIT_SHIFT) / self.q as u128) as u64;
        Barrett(v, quotient)
    }

    /// w*x mod q in [0, 2q), Shoup-style (BIT_SHIFT = 64).
    #[inline(always)]
    pub fn mul_lazy(&self, w: Barrett, x: u64) -> u64 {
        let q_hat = ((w.quotient() as u128 * x as u128) >> 64) as u64;
        w.value()
            .wrapping_mul(x)
            .wrapping_sub(q_hat.wrapping_mul(self.q))
    }

    /// w*x mod q in [0, q).
    #[inline(always)]
    pub fn mul(&self, w: Barrett, x: u64) -> u64 {
        self.mul_lazy(w, x).reduce_once(self.q)
    }

    /// Maps any u64 into [0, q) using the high word of floor(2^128/q).
    #[inline(always)]
    pub fn reduce(&self, x: u64) -> u64 {
        let q_hat = ((x as u128 * self.hi as u128) >> 64) as u64;
        x.wrapping_sub(q_hat.wrapping_mul(self.q)).reduce_once(self.q)
    }
}

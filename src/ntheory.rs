//! Number-theory utilities: prime generation, primitive roots and the scalar
//! modular operations every batched kernel is measured against.
//!
//! All moduli are odd primes below 2^62 unless a function documents otherwise.

use prime_factorization::Factorization;

use crate::modulus::barrett::Barrett;
use crate::modulus::{ReduceOnce, WordOps};
use crate::{Error, Result};

/// Miller-Rabin primality check.
#[inline]
pub fn is_prime(n: u64) -> bool {
    primality_test::is_prime(n)
}

/// Returns `count` primes p in [2^bit_size, 2^(bit_size+1)) with
/// p = 1 mod 2*ntt_size, smallest first.
///
/// Candidates are scanned upstream in steps of 2*ntt_size so every hit is
/// NTT-friendly by construction. Fails with [`Error::PrimesExhausted`] when
/// the range runs out before `count` primes are found.
pub fn generate_primes(count: usize, bit_size: u64, ntt_size: u64) -> Result<Vec<u64>> {
    assert!(ntt_size.is_power_of_two(), "ntt_size {} is not a power of two", ntt_size);
    assert!(bit_size < 62, "bit_size {} out of range", bit_size);

    let residue = 2 * ntt_size;
    // The scan starts at 2^bit_size + 1 and steps by the residue, so the
    // residue must divide 2^bit_size for every candidate to be = 1 mod it.
    assert!(
        (1u64 << bit_size) % residue == 0,
        "2*ntt_size = {} does not divide 2^{}",
        residue,
        bit_size
    );
    let upper = 1u64 << (bit_size + 1);

    let mut primes = Vec::with_capacity(count);
    let mut candidate = (1u64 << bit_size) + 1;
    while candidate < upper && primes.len() < count {
        if is_prime(candidate) {
            primes.push(candidate);
        }
        candidate += residue;
    }

    if primes.len() < count {
        log::debug!(
            "prime scan exhausted: {}/{} primes at {} bits, residue {}",
            primes.len(),
            count,
            bit_size,
            residue
        );
        return Err(Error::PrimesExhausted {
            requested: count,
            found: primes.len(),
            bit_size,
            residue,
        });
    }

    Ok(primes)
}

/// Returns base^exp mod modulus by square-and-multiply over u128.
pub fn pow_mod(base: u64, mut exp: u64, modulus: u64) -> u64 {
    assert!(modulus > 1, "modulus {} out of range", modulus);
    let q = modulus as u128;
    let mut base = base as u128 % q;
    let mut acc = 1u128;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc * base % q;
        }
        base = base * base % q;
        exp >>= 1;
    }
    acc as u64
}

/// Returns a^-1 mod modulus for prime modulus (Fermat).
/// Panics if a = 0 mod modulus.
pub fn inverse_mod(a: u64, modulus: u64) -> u64 {
    assert!(a % modulus != 0, "{} has no inverse mod {}", a, modulus);
    pow_mod(a, modulus - 2, modulus)
}

/// x*y mod modulus over u128, the reference for every multiply kernel.
#[inline(always)]
pub fn multiply_mod(x: u64, y: u64, modulus: u64) -> u64 {
    ((x as u128 * y as u128) % modulus as u128) as u64
}

/// x+y mod modulus for x, y < modulus < 2^63.
#[inline(always)]
pub fn add_mod(x: u64, y: u64, modulus: u64) -> u64 {
    debug_assert!(x < modulus && y < modulus);
    (x + y).reduce_once(modulus)
}

/// x-y mod modulus for x, y < modulus < 2^63.
#[inline(always)]
pub fn sub_mod(x: u64, y: u64, modulus: u64) -> u64 {
    debug_assert!(x < modulus && y < modulus);
    (x + modulus - y).reduce_once(modulus)
}

/// x*y mod modulus in [0, 2*modulus), y carried as a prepared factor at the
/// given bit-shift tier.
///
/// On the 64-bit tier any x is accepted; on the 52-bit tier the caller keeps
/// x < 4*modulus and modulus < 2^51 so the quotient estimate stays exact.
#[inline(always)]
pub fn multiply_mod_lazy<const BIT_SHIFT: u32>(x: u64, y: Barrett, modulus: u64) -> u64 {
    debug_assert!(BIT_SHIFT == 52 || BIT_SHIFT == 64);
    let q_hat = ((x as u128 * y.quotient() as u128) >> BIT_SHIFT) as u64;
    y.value()
        .wrapping_mul(x)
        .wrapping_sub(q_hat.wrapping_mul(modulus))
}

/// Checks whether root generates the cyclic group of the degree-th roots of
/// unity mod modulus, for degree a power of two.
pub fn is_primitive_root(root: u64, degree: u64, modulus: u64) -> bool {
    assert!(degree.is_power_of_two(), "degree {} is not a power of two", degree);
    if root == 0 {
        return false;
    }
    if degree == 1 {
        return root % modulus == 1;
    }
    // root^(degree/2) = -1 implies root^degree = 1 with no smaller period.
    pow_mod(root, degree / 2, modulus) == modulus - 1
}

/// Returns a primitive degree-th root of unity mod modulus, derived from the
/// smallest generator of Z_modulus^* via the prime factors of modulus-1.
pub fn generate_primitive_root(degree: u64, modulus: u64) -> Result<u64> {
    assert!(degree.is_power_of_two(), "degree {} is not a power of two", degree);
    if (modulus - 1) % degree != 0 {
        return Err(Error::NoPrimitiveRoot { degree, modulus });
    }

    let factors = Factorization::run(modulus - 1).prime_factor_repr();
    'candidate: for generator in 2..modulus {
        for &(factor, _) in factors.iter() {
            if pow_mod(generator, (modulus - 1) / factor, modulus) == 1 {
                continue 'candidate;
            }
        }
        let root = pow_mod(generator, (modulus - 1) / degree, modulus);
        debug_assert!(is_primitive_root(root, degree, modulus));
        return Ok(root);
    }

    Err(Error::NoPrimitiveRoot { degree, modulus })
}

/// Returns the smallest primitive degree-th root of unity mod modulus.
///
/// The primitive degree-th roots are exactly the odd powers of any one of
/// them, so the minimum is found by walking root*(root^2)^i.
pub fn minimal_primitive_root(degree: u64, modulus: u64) -> Result<u64> {
    let root = generate_primitive_root(degree, modulus)?;
    let generator_sq = multiply_mod(root, root, modulus);
    let mut candidate = root;
    let mut min = candidate;
    for _ in 0..degree / 2 {
        candidate = multiply_mod(candidate, generator_sq, modulus);
        min = min.min(candidate);
    }
    Ok(min)
}

/// Reverses the lowest `bit_count` bits of x.
#[inline(always)]
pub fn reverse_bits(x: u64, bit_count: u32) -> u64 {
    if bit_count == 0 {
        return 0;
    }
    x.reverse_bits_msb(bit_count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modulus::barrett::BarrettPrecomp;

    #[test]
    fn pow_mod_known_values() {
        assert_eq!(pow_mod(2, 10, 1000), 24);
        assert_eq!(pow_mod(7, 0, 769), 1);
        assert_eq!(pow_mod(768, 2, 769), 1);
        let q: u64 = 0x1fffffffffe00001;
        assert_eq!(pow_mod(q - 1, 2, q), 1);
        // Fermat: a^(q-1) = 1 for prime q.
        assert_eq!(pow_mod(123456789, q - 1, q), 1);
    }

    #[test]
    fn inverse_mod_round_trips() {
        let q: u64 = 769;
        for a in 1..q {
            assert_eq!(multiply_mod(a, inverse_mod(a, q), q), 1);
        }
    }

    #[test]
    fn add_sub_mod_wrap() {
        let q: u64 = 769;
        assert_eq!(add_mod(q - 1, 1, q), 0);
        assert_eq!(add_mod(q - 1, q - 1, q), q - 2);
        assert_eq!(sub_mod(0, 1, q), q - 1);
        assert_eq!(sub_mod(5, 5, q), 0);
    }

    #[test]
    fn generated_primes_are_ntt_friendly() {
        let ntt_size: u64 = 1 << 12;
        let primes = generate_primes(4, 45, ntt_size).unwrap();
        assert_eq!(primes.len(), 4);
        for window in primes.windows(2) {
            assert!(window[0] < window[1]);
        }
        for &p in primes.iter() {
            assert!(is_prime(p));
            assert!(p >= 1 << 45 && p < 1 << 46);
            assert_eq!(p % (2 * ntt_size), 1);
        }
    }

    #[test]
    fn prime_scan_reports_exhaustion() {
        // [2^16, 2^17) stepped by 512 holds only 128 candidates, so 200
        // primes can never be found.
        match generate_primes(200, 16, 256) {
            Err(Error::PrimesExhausted { requested: 200, bit_size: 16, residue: 512, found }) => {
                assert!(found < 128);
            }
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn primitive_root_has_exact_order() {
        for degree in [2u64, 4, 16, 256] {
            let root = generate_primitive_root(degree, 769).unwrap();
            assert_eq!(pow_mod(root, degree, 769), 1);
            assert_eq!(pow_mod(root, degree / 2, 769), 768);
        }
    }

    #[test]
    fn no_root_when_degree_does_not_divide_group_order() {
        // 769 - 1 = 2^8 * 3, so degree 512 has no root.
        assert_eq!(
            generate_primitive_root(512, 769),
            Err(Error::NoPrimitiveRoot { degree: 512, modulus: 769 })
        );
    }

    #[test]
    fn minimal_root_is_smallest() {
        let degree: u64 = 16;
        let q: u64 = 769;
        let min = minimal_primitive_root(degree, q).unwrap();
        for candidate in 1..min {
            assert!(!is_primitive_root(candidate, degree, q));
        }
        assert!(is_primitive_root(min, degree, q));
    }

    #[test]
    fn lazy_multiply_stays_under_two_q() {
        let q: u64 = 1125891450734593;
        let precomp = BarrettPrecomp::new(q);
        for y in [1u64, 2, q / 3, q - 2, q - 1] {
            let factor = precomp.prepare::<64>(y);
            for x in [0u64, 1, q - 1, 2 * q - 1, 4 * q - 1, u64::MAX] {
                let r = multiply_mod_lazy::<64>(x, factor, q);
                assert!(r < 2 * q);
                assert_eq!(r % q, multiply_mod(x, y, q));
            }
        }
    }

    #[test]
    fn lazy_multiply_52_tier() {
        let q: u64 = 769;
        let precomp = BarrettPrecomp::new(q);
        for y in [1u64, 2, 700, q - 1] {
            let factor = precomp.prepare::<52>(y);
            for x in [0u64, 1, q - 1, 2 * q - 1, 4 * q - 1] {
                let r = multiply_mod_lazy::<52>(x, factor, q);
                assert!(r < 2 * q);
                assert_eq!(r % q, multiply_mod(x, y, q));
            }
        }
    }

    #[test]
    fn reverse_bits_orders_tables() {
        assert_eq!(reverse_bits(0, 0), 0);
        assert_eq!(reverse_bits(1, 3), 4);
        assert_eq!(reverse_bits(6, 3), 3);
        for x in 0..16 {
            assert_eq!(reverse_bits(reverse_bits(x, 4), 4), x);
        }
    }
}

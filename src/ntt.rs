//! Negacyclic number-theoretic transform over Z_q[x]/(x^n + 1).
//!
//! [`NttTables`] holds the per-(degree, modulus) twiddle tables: powers of the
//! minimal primitive 2n-th root of unity in bit-reversed order for the
//! forward direction, the matching inverses ordered for the inverse
//! traversal, and the n^-1 scaling factors fused into the inverse's final
//! stage. Each twiddle is stored as a prepared [`Barrett`] factor; when the
//! modulus fits the 52-bit tier a second table of 52-bit quotients is built
//! for the IFMA path.
//!
//! The forward transform maps natural order to bit-reversed order, the
//! inverse maps bit-reversed back to natural, so a forward/inverse pair is
//! the identity without any explicit reordering pass.

pub(crate) mod native;

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx512;

#[cfg(target_arch = "x86_64")]
use crate::arch::CpuFeatures;
use crate::modulus::barrett::{Barrett, BarrettPrecomp};
use crate::modulus::WordOps;
use crate::ntheory::{inverse_mod, minimal_primitive_root, multiply_mod, reverse_bits};
use crate::{Error, Result};

/// Largest modulus the 52-bit tier accepts: intermediates reach 4q and must
/// stay under 2^52.
const MAX_MODULUS_52: u64 = 1 << 50;

/// Smallest degree worth vectorizing; below this every stage falls back to
/// the scalar butterflies anyway.
#[cfg(target_arch = "x86_64")]
const MIN_AVX512_DEGREE: usize = 16;

#[derive(Debug)]
pub struct NttTables {
    modulus: u64,
    degree: usize,
    root_powers: Vec<Barrett>,
    inv_root_powers: Vec<Barrett>,
    root_powers_52: Option<Vec<Barrett>>,
    inv_root_powers_52: Option<Vec<Barrett>>,
    inv_degree: Barrett,
    inv_degree_w: Barrett,
    inv_degree_52: Option<Barrett>,
    inv_degree_w_52: Option<Barrett>,
}

impl NttTables {
    /// Builds the twiddle tables for a degree-n negacyclic NTT mod q.
    ///
    /// Requires n a power of two >= 2, q an odd prime with 3 < q < 2^62 and
    /// q = 1 mod 2n.
    pub fn new(degree: usize, modulus: u64) -> Result<NttTables> {
        if !degree.is_power_of_two() || degree < 2 {
            return Err(Error::InvalidDegree { degree: degree as u64 });
        }
        if modulus <= 3 || modulus >= (1u64 << 62) || modulus & 1 == 0 {
            return Err(Error::InvalidModulus { modulus });
        }
        let two_n = 2 * degree as u64;
        if (modulus - 1) % two_n != 0 {
            return Err(Error::PrimeNotNttFriendly { modulus, degree: degree as u64 });
        }

        let log_degree = degree.log2() as u32;
        let psi = minimal_primitive_root(two_n, modulus)?;
        log::debug!(
            "ntt tables: n={} q={} psi={}",
            degree,
            modulus,
            psi
        );

        // Forward table: psi^i lands at the bit-reversed index, so each
        // stage consumes twiddles in linear order.
        let mut forward = vec![0u64; degree];
        let mut power = 1u64;
        for i in 0..degree {
            forward[reverse_bits(i as u64, log_degree) as usize] = power;
            power = multiply_mod(power, psi, modulus);
        }

        // Inverse table: per stage (m = n/2 down to 1) the inverses of that
        // stage's forward twiddles, in the order the inverse traversal reads
        // them. Index 0 pairs with the unused forward constant 1.
        let mut inverse = vec![0u64; degree];
        inverse[0] = 1;
        let mut idx = 1;
        let mut m = degree / 2;
        while m >= 1 {
            for i in 0..m {
                inverse[idx] = inverse_mod(forward[m + i], modulus);
                idx += 1;
            }
            m /= 2;
        }

        let precomp = BarrettPrecomp::new(modulus);

        let inv_n = inverse_mod(degree as u64, modulus);
        // The final inverse stage multiplies Y by W = inv_root_powers[n-1],
        // folded here into a single factor with the n^-1 scaling.
        let inv_n_w = multiply_mod(inv_n, inverse[degree - 1], modulus);

        let tier_52 = modulus < MAX_MODULUS_52;
        let prepare_64 =
            |v: &[u64]| -> Vec<Barrett> { v.iter().map(|&w| precomp.prepare::<64>(w)).collect() };
        let prepare_52 = |v: &[u64]| -> Option<Vec<Barrett>> {
            tier_52.then(|| v.iter().map(|&w| precomp.prepare::<52>(w)).collect())
        };

        let root_powers = prepare_64(&forward);
        let inv_root_powers = prepare_64(&inverse);
        let root_powers_52 = prepare_52(&forward);
        let inv_root_powers_52 = prepare_52(&inverse);
        let inv_degree = precomp.prepare::<64>(inv_n);
        let inv_degree_w = precomp.prepare::<64>(inv_n_w);
        let inv_degree_52 = tier_52.then(|| precomp.prepare::<52>(inv_n));
        let inv_degree_w_52 = tier_52.then(|| precomp.prepare::<52>(inv_n_w));

        Ok(NttTables {
            modulus,
            degree,
            root_powers,
            inv_root_powers,
            root_powers_52,
            inv_root_powers_52,
            inv_degree,
            inv_degree_w,
            inv_degree_52,
            inv_degree_w_52,
        })
    }

    #[inline(always)]
    pub fn modulus(&self) -> u64 {
        self.modulus
    }

    #[inline(always)]
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// Natural-order input, bit-reversed output in [0, q).
    ///
    /// Inputs may be lazy, anything below 4q is accepted.
    pub fn forward_transform_to_bit_reverse(&self, elements: &mut [u64]) {
        self.forward_dispatch::<false>(elements);
    }

    /// [`Self::forward_transform_to_bit_reverse`] without the final
    /// normalization pass; outputs stay in [0, 4q).
    pub fn forward_transform_to_bit_reverse_lazy(&self, elements: &mut [u64]) {
        self.forward_dispatch::<true>(elements);
    }

    fn forward_dispatch<const LAZY: bool>(&self, elements: &mut [u64]) {
        assert_eq!(
            elements.len(),
            self.degree,
            "element count {} differs from degree {}",
            elements.len(),
            self.degree
        );

        #[cfg(target_arch = "x86_64")]
        {
            let features = CpuFeatures::get();
            if self.degree >= MIN_AVX512_DEGREE {
                if features.avx512ifma && self.root_powers_52.is_some() {
                    log::trace!("ntt forward: avx512 ifma tier, n={}", self.degree);
                    unsafe { avx512::forward_52::<LAZY>(self, elements) };
                    return;
                }
                if features.avx512dq {
                    log::trace!("ntt forward: avx512 dq tier, n={}", self.degree);
                    unsafe { avx512::forward_64::<LAZY>(self, elements) };
                    return;
                }
            }
        }

        log::trace!("ntt forward: scalar, n={}", self.degree);
        native::forward_transform::<LAZY>(self, elements);
    }

    /// Bit-reversed input in [0, q), natural-order output in [0, q).
    ///
    /// The n^-1 (and n^-1 psi^-1) scaling is fused into the final stage.
    pub fn inverse_transform_from_bit_reverse(&self, elements: &mut [u64]) {
        assert_eq!(
            elements.len(),
            self.degree,
            "element count {} differs from degree {}",
            elements.len(),
            self.degree
        );
        debug_assert!(
            elements.iter().all(|&x| x < self.modulus),
            "inverse transform input exceeds modulus"
        );

        #[cfg(target_arch = "x86_64")]
        {
            let features = CpuFeatures::get();
            if self.degree >= MIN_AVX512_DEGREE {
                if features.avx512ifma && self.inv_root_powers_52.is_some() {
                    log::trace!("ntt inverse: avx512 ifma tier, n={}", self.degree);
                    unsafe { avx512::inverse_52(self, elements) };
                    return;
                }
                if features.avx512dq {
                    log::trace!("ntt inverse: avx512 dq tier, n={}", self.degree);
                    unsafe { avx512::inverse_64(self, elements) };
                    return;
                }
            }
        }

        log::trace!("ntt inverse: scalar, n={}", self.degree);
        native::inverse_transform(self, elements);
    }
}

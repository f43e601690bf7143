use thiserror::Error;

/// Failures surfaced as values rather than panics.
///
/// Precondition violations on kernel entry points (mismatched lengths,
/// out-of-range operands, malformed moduli) abort with a descriptive panic
/// instead; see the module documentation of [`crate::eltwise`] and
/// [`crate::ntt`]. Only search failures, which depend on the arithmetic
/// structure of the inputs rather than on caller discipline, are reported
/// through this enum.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    #[error("no primitive {degree}-th root of unity exists modulo {modulus}")]
    NoPrimitiveRoot { degree: u64, modulus: u64 },

    #[error(
        "found only {found} of {requested} {bit_size}-bit primes p = 1 mod {residue}"
    )]
    PrimesExhausted {
        requested: usize,
        found: usize,
        bit_size: u64,
        residue: u64,
    },

    #[error("degree {degree} is not a power of two")]
    InvalidDegree { degree: u64 },

    #[error("modulus {modulus} is not 1 mod 2*{degree}, no NTT of that degree exists")]
    PrimeNotNttFriendly { modulus: u64, degree: u64 },

    #[error("modulus {modulus} is out of range (odd, 3 < q < 2^62 required)")]
    InvalidModulus { modulus: u64 },
}

pub type Result<T> = core::result::Result<T, Error>;

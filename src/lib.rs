//! Accelerated 64-bit modular arithmetic and negacyclic NTT for lattice
//! cryptography.
//!
//! The crate provides three layers:
//! - [`ntheory`]: prime generation, primitive roots, modular inverses and the
//!   scalar reference operations every batched kernel is tested against.
//! - [`eltwise`]: element-wise multiply / fused-multiply-add / compare kernels
//!   over `&[u64]` buffers, with a portable scalar implementation and AVX-512
//!   implementations selected at runtime.
//! - [`ntt`]: forward and inverse number-theoretic transforms over
//!   `Z_q[x]/(x^n + 1)` using the Harvey butterfly with lazy reduction.
//!
//! All moduli are odd primes below 2^62 so that `4q` fits in a 64-bit lane,
//! which is the headroom lazy reduction relies on. Buffers are always owned by
//! the caller and mutated in place; nothing is retained across calls. The only
//! process-wide state is the read-once CPU capability set in [`arch`].

pub mod arch;
pub mod eltwise;
pub mod error;
pub mod modulus;
pub mod ntheory;
pub mod ntt;

#[cfg(target_arch = "x86_64")]
pub(crate) mod avx512;

pub use error::{Error, Result};

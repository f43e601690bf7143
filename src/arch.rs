//! Process-wide CPU capability set.
//!
//! The probe runs at most once per process and the result is immutable
//! afterwards, so kernels may query it on every call without synchronization
//! cost. A missing capability is never an error: dispatchers fall back to the
//! scalar implementation.

use std::sync::OnceLock;

/// Boolean capability flags consumed by the eltwise and NTT dispatchers.
///
/// `avx512dq` stands in for "wide 64-bit integer multiply available" and
/// `avx512ifma` for "fused 52-bit low/high multiply available". Both are
/// always `false` off x86_64.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuFeatures {
    pub avx512dq: bool,
    pub avx512ifma: bool,
}

static CPU_FEATURES: OnceLock<CpuFeatures> = OnceLock::new();

impl CpuFeatures {
    /// Returns the cached capability set, probing the CPU on first use.
    pub fn get() -> &'static CpuFeatures {
        CPU_FEATURES.get_or_init(|| {
            let features = Self::detect();
            log::debug!(
                "cpu features: avx512dq={} avx512ifma={}",
                features.avx512dq,
                features.avx512ifma
            );
            features
        })
    }

    #[cfg(target_arch = "x86_64")]
    fn detect() -> CpuFeatures {
        CpuFeatures {
            avx512dq: std::is_x86_feature_detected!("avx512f")
                && std::is_x86_feature_detected!("avx512dq"),
            avx512ifma: std::is_x86_feature_detected!("avx512f")
                && std::is_x86_feature_detected!("avx512ifma"),
        }
    }

    #[cfg(not(target_arch = "x86_64"))]
    fn detect() -> CpuFeatures {
        CpuFeatures::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_idempotent() {
        let a = *CpuFeatures::get();
        let b = *CpuFeatures::get();
        assert_eq!(a, b);
        assert!(std::ptr::eq(CpuFeatures::get(), CpuFeatures::get()));
    }

    #[test]
    fn ifma_implies_wide_multiply_platform() {
        // IFMA-capable parts all carry DQ; the dispatchers rely on this only
        // loosely, but it is worth noticing if a probe ever disagrees.
        let features = CpuFeatures::get();
        if features.avx512ifma {
            assert!(features.avx512dq);
        }
    }
}

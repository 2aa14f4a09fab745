use crate::simd;
use brisk_core::{BriskError, BriskResult};

/// Descriptors are compared in whole 128-bit words.
pub const BLOCK_BYTES: usize = 16;

/// Popcount implementation used for distances.
///
/// Vector backends are only reachable through [`Backend::detect`], which
/// checks the CPU first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backend {
    kind: Kind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    Scalar,
    #[cfg(all(target_arch = "x86_64", feature = "simd"))]
    Ssse3,
    #[cfg(all(target_arch = "aarch64", feature = "simd"))]
    Neon,
}

impl Backend {
    /// Byte-wise reference backend.
    pub fn scalar() -> Self {
        Self { kind: Kind::Scalar }
    }

    /// Fastest backend this build and CPU support.
    pub fn detect() -> Self {
        #[cfg(all(target_arch = "x86_64", feature = "simd"))]
        {
            if is_x86_feature_detected!("ssse3") {
                return Self { kind: Kind::Ssse3 };
            }
        }
        #[cfg(all(target_arch = "aarch64", feature = "simd"))]
        {
            if std::arch::is_aarch64_feature_detected!("neon") {
                return Self { kind: Kind::Neon };
            }
        }
        Self::scalar()
    }

    pub fn name(&self) -> &'static str {
        match self.kind {
            Kind::Scalar => "scalar",
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            Kind::Ssse3 => "ssse3",
            #[cfg(all(target_arch = "aarch64", feature = "simd"))]
            Kind::Neon => "neon",
        }
    }

    /// Distance of two equally long, block-aligned slices.
    #[inline]
    pub(crate) fn distance_unchecked(&self, a: &[u8], b: &[u8]) -> u32 {
        match self.kind {
            Kind::Scalar => simd::popcount_scalar(a, b),
            #[cfg(all(target_arch = "x86_64", feature = "simd"))]
            Kind::Ssse3 => unsafe { simd::popcount_ssse3(a, b) },
            #[cfg(all(target_arch = "aarch64", feature = "simd"))]
            Kind::Neon => unsafe { simd::popcount_neon(a, b) },
        }
    }

    /// Number of differing bits between `a` and `b`.
    pub fn distance(&self, a: &[u8], b: &[u8]) -> BriskResult<u32> {
        check_lengths(a, b)?;
        Ok(self.distance_unchecked(a, b))
    }
}

impl Default for Backend {
    fn default() -> Self {
        Self::detect()
    }
}

/// Checks that `len` is a positive whole number of 128-bit words.
pub fn check_width(len: usize) -> BriskResult<()> {
    if len == 0 || len % BLOCK_BYTES != 0 {
        return Err(BriskError::InvalidDescriptorLength(len));
    }
    Ok(())
}

fn check_lengths(a: &[u8], b: &[u8]) -> BriskResult<()> {
    check_width(a.len())?;
    if a.len() != b.len() {
        return Err(BriskError::DescriptorLengthMismatch(a.len(), b.len()));
    }
    Ok(())
}

/// Hamming distance with the detected backend.
pub fn distance(a: &[u8], b: &[u8]) -> BriskResult<u32> {
    Backend::detect().distance(a, b)
}

/// Distance over the first `blocks` 128-bit words of `a` and `b`.
pub fn distance_blocks(a: &[u8], b: &[u8], blocks: usize) -> BriskResult<u32> {
    let shortest = a.len().min(b.len());
    let len = blocks
        .checked_mul(BLOCK_BYTES)
        .ok_or(BriskError::DescriptorLengthMismatch(shortest, usize::MAX))?;
    if shortest < len {
        return Err(BriskError::DescriptorLengthMismatch(shortest, len));
    }
    Ok(Backend::detect().distance_unchecked(&a[..len], &b[..len]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn descriptor() -> impl Strategy<Value = Vec<u8>> {
        (1usize..6).prop_flat_map(|blocks| proptest::collection::vec(any::<u8>(), blocks * BLOCK_BYTES))
    }

    fn descriptor_pair() -> impl Strategy<Value = (Vec<u8>, Vec<u8>)> {
        (1usize..6).prop_flat_map(|blocks| {
            let len = blocks * BLOCK_BYTES;
            (
                proptest::collection::vec(any::<u8>(), len),
                proptest::collection::vec(any::<u8>(), len),
            )
        })
    }

    #[test]
    fn test_known_distances() {
        let a = [0u8; 32];
        let mut b = [0u8; 32];
        assert_eq!(distance(&a, &b).unwrap(), 0);
        b[0] = 0b1011;
        b[31] = 0x80;
        assert_eq!(distance(&a, &b).unwrap(), 4);
        assert_eq!(distance(&[0xff; 64], &[0; 64]).unwrap(), 512);
    }

    #[test]
    fn test_length_preconditions() {
        assert!(matches!(distance(&[], &[]), Err(BriskError::InvalidDescriptorLength(0))));
        assert!(matches!(distance(&[0; 15], &[0; 15]), Err(BriskError::InvalidDescriptorLength(15))));
        assert!(matches!(
            distance(&[0; 16], &[0; 32]),
            Err(BriskError::DescriptorLengthMismatch(16, 32))
        ));
    }

    #[test]
    fn test_distance_blocks_prefix() {
        let a = [0xffu8; 48];
        let mut b = [0xffu8; 48];
        b[40] = 0;
        assert_eq!(distance_blocks(&a, &b, 2).unwrap(), 0);
        assert_eq!(distance_blocks(&a, &b, 3).unwrap(), 8);
        assert_eq!(distance_blocks(&a, &b, 0).unwrap(), 0);
        assert!(distance_blocks(&a, &b[..32], 3).is_err());
    }

    #[test]
    fn test_distance_blocks_overflowing_count() {
        let a = [0u8; 16];
        let result = distance_blocks(&a, &a, usize::MAX);
        assert!(matches!(result, Err(BriskError::DescriptorLengthMismatch(16, _))));
    }

    #[test]
    fn test_backend_name() {
        let backend = Backend::detect();
        #[cfg(not(feature = "simd"))]
        assert_eq!(backend, Backend::scalar());
        assert!(!backend.name().is_empty());
    }

    proptest! {
        #[test]
        fn prop_symmetric((a, b) in descriptor_pair()) {
            prop_assert_eq!(distance(&a, &b).unwrap(), distance(&b, &a).unwrap());
        }

        #[test]
        fn prop_identity(a in descriptor()) {
            prop_assert_eq!(distance(&a, &a).unwrap(), 0);
        }

        #[test]
        fn prop_bounded((a, b) in descriptor_pair()) {
            prop_assert!(distance(&a, &b).unwrap() as usize <= a.len() * 8);
        }

        #[test]
        fn prop_backends_agree((a, b) in descriptor_pair()) {
            let expected = simd::popcount_scalar(&a, &b);
            prop_assert_eq!(Backend::detect().distance(&a, &b).unwrap(), expected);
            prop_assert_eq!(Backend::scalar().distance(&a, &b).unwrap(), expected);
        }
    }
}

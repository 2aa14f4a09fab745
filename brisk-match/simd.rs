//! Vectorized popcount of `a XOR b` over whole 16-byte blocks.
//!
//! Callers guarantee `a.len() == b.len()` and a length that is a multiple
//! of 16; each backend must agree bit-for-bit with [`popcount_scalar`].

/// Byte-wise reference implementation.
pub fn popcount_scalar(a: &[u8], b: &[u8]) -> u32 {
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Nibble-table popcount with `pshufb`.
///
/// Byte lanes count at most 8 per block, so the u8 accumulator is folded
/// into u64 lanes with `psadbw` every 31 blocks before it can overflow.
///
/// # Safety
/// The CPU must support SSSE3.
#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
pub unsafe fn popcount_ssse3(a: &[u8], b: &[u8]) -> u32 {
    use std::arch::x86_64::*;

    let lut = _mm_setr_epi8(0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 4);
    let low_nibbles = _mm_set1_epi8(0x0f);
    let zero = _mm_setzero_si128();

    let mut total = zero;
    let mut bytes = zero;
    let mut pending = 0;
    for (ca, cb) in a.chunks_exact(16).zip(b.chunks_exact(16)) {
        let va = _mm_loadu_si128(ca.as_ptr() as *const __m128i);
        let vb = _mm_loadu_si128(cb.as_ptr() as *const __m128i);
        let x = _mm_xor_si128(va, vb);
        let lo = _mm_and_si128(x, low_nibbles);
        let hi = _mm_and_si128(_mm_srli_epi16(x, 4), low_nibbles);
        let counts = _mm_add_epi8(_mm_shuffle_epi8(lut, lo), _mm_shuffle_epi8(lut, hi));
        bytes = _mm_add_epi8(bytes, counts);

        pending += 1;
        if pending == 31 {
            total = _mm_add_epi64(total, _mm_sad_epu8(bytes, zero));
            bytes = zero;
            pending = 0;
        }
    }
    total = _mm_add_epi64(total, _mm_sad_epu8(bytes, zero));
    let folded = _mm_add_epi64(total, _mm_unpackhi_epi64(total, total));
    _mm_cvtsi128_si64(folded) as u32
}

/// Native `vcnt` popcount with a horizontal add per block.
///
/// # Safety
/// The CPU must support NEON.
#[cfg(target_arch = "aarch64")]
#[target_feature(enable = "neon")]
pub unsafe fn popcount_neon(a: &[u8], b: &[u8]) -> u32 {
    use std::arch::aarch64::*;

    let mut total = 0u32;
    for (ca, cb) in a.chunks_exact(16).zip(b.chunks_exact(16)) {
        let x = veorq_u8(vld1q_u8(ca.as_ptr()), vld1q_u8(cb.as_ptr()));
        // At most 128 set bits per block, fits the u8 sum.
        total += vaddvq_u8(vcntq_u8(x)) as u32;
    }
    total
}

//! SSE2 bit-matrix transpose
//!
//! Treats the rows of one 8-column group as a vector of bytes and
//! peels the columns off with `movemask`: each `movemask` gathers the
//! current top bit of all 32 rows at once, the per-byte doubling
//! (`paddb`) exposes the next column. Column words are then the same
//! "top `bits` of a 32-bit row word" arithmetic shift the ground
//! truth is defined with.
use core::arch::x86_64::{__m128i, _mm_add_epi8, _mm_loadu_si128, _mm_movemask_epi8};

pub fn transpose(src: &[u8], count: usize, bits: usize, out: &mut [i64]) {
    debug_assert!(matches!(count, 8 | 16 | 32));
    debug_assert!((1..=32).contains(&bits));
    let stride = count / 8;
    for group in 0..stride {
        // strided gather of this group's row bytes; rows past `bits`
        // stay zero and fall below the sign-extending shift
        let mut rows = [0u8; 32];
        for (row, slot) in rows.iter_mut().take(bits).enumerate() {
            *slot = src[row * stride + group];
        }
        // SAFETY: sse2 is part of the x86_64 baseline; both loads
        // read 16 in-bounds bytes of `rows`
        unsafe {
            let mut lo = _mm_loadu_si128(rows.as_ptr() as *const __m128i);
            let mut hi = _mm_loadu_si128(rows.as_ptr().add(16) as *const __m128i);
            for j in 0..8 {
                let mlo = _mm_movemask_epi8(lo) as u16;
                let mhi = _mm_movemask_epi8(hi) as u16;
                // movemask bit r carries row r: bit-reverse so row 0
                // lands in the word's MSB
                let word = ((mlo.reverse_bits() as u32) << 16) | mhi.reverse_bits() as u32;
                out[group * 8 + j] = (word as i32 >> (32 - bits)) as i64;
                lo = _mm_add_epi8(lo, lo);
                hi = _mm_add_epi8(hi, hi);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::super::generic;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    #[test]
    fn matches_generic() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for bits in 1..=32usize {
            for count in [8usize, 16, 32] {
                let src: Vec<u8> = (0..bits * count / 8).map(|_| rng.gen()).collect();
                let mut expected = vec![0i64; count];
                let mut got = vec![0i64; count];
                generic::transpose(&src, count, bits, &mut expected);
                super::transpose(&src, count, bits, &mut got);
                assert_eq!(got, expected, "bits={} count={}", bits, count);
            }
        }
    }
}

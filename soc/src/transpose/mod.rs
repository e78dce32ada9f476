//! Bit-matrix transpose kernel
//!
//! The residual decoder stores blocks of 8, 16 or 32 column values
//! as a transposed bit matrix: `bits` rows of `count / 8` bytes,
//! MSB first within each byte. This module recovers the signed
//! column values, and packs them back for the writer.
//!
//! The kernel is dispatched once per process: the `TRANSPOSE_FORCE`
//! environment variable selects an implementation by name
//! (`"generic"`, `"sse2"`), anything else and absence both mean
//! auto-detection. The generic implementation is the correctness
//! reference; specialized variants must decode identically.
mod generic;

#[cfg(target_arch = "x86_64")]
mod sse2;

/// Transpose entry points share this shape: `(src, count, bits, out)`
pub type TransposeFn = fn(&[u8], usize, usize, &mut [i64]);

/// A named transpose implementation
#[derive(Copy, Clone)]
pub struct Kernel {
    /// Tag, also accepted by `TRANSPOSE_FORCE`
    pub name: &'static str,
    func: TransposeFn,
}

const GENERIC: Kernel = Kernel {
    name: "generic",
    func: generic::transpose,
};

#[cfg(target_arch = "x86_64")]
const SSE2: Kernel = Kernel {
    name: "sse2",
    func: sse2::transpose,
};

fn select() -> Kernel {
    if let Ok(forced) = std::env::var("TRANSPOSE_FORCE") {
        if forced == GENERIC.name {
            return GENERIC;
        }
        #[cfg(target_arch = "x86_64")]
        if forced == SSE2.name {
            return SSE2;
        }
        // unknown tag: fall through to auto-detection
        #[cfg(feature = "log")]
        log::error!("TRANSPOSE_FORCE: unknown implementation \"{}\"", forced);
    }
    #[cfg(target_arch = "x86_64")]
    return SSE2;
    #[cfg(not(target_arch = "x86_64"))]
    GENERIC
}

lazy_static! {
    static ref SELECTED: Kernel = select();
}

/// Name of the implementation in use
pub fn selected() -> &'static str {
    SELECTED.name
}

/// Transposes `bits` rows of `count / 8` bytes (MSB first) into
/// `count` sign-extended column values. `count` must be 8, 16 or 32
/// and `bits` in `1..=32`; `src` must hold `bits * count / 8` bytes
/// and `out` must hold `count` slots.
pub fn transpose(src: &[u8], count: usize, bits: usize, out: &mut [i64]) {
    (SELECTED.func)(src, count, bits, out)
}

/// Packs `count` signed values of `bits` significant bits each back
/// into the row-major bit matrix, appended to `out`. Only the writer
/// runs this, there is no specialized variant.
pub fn pack(values: &[i64], count: usize, bits: usize, out: &mut Vec<u8>) {
    generic::pack(values, count, bits, out)
}

#[cfg(test)]
mod test {
    use super::*;

    // ground truth: 32 well-known row constants; at `bits` rows the
    // column values are the sign-extended top bits of these words
    const TRUTH: [u32; 32] = [
        0x55555555, 0x33333333, 0x0f0f0f0f, 0x00ff00ff, 0x0000ffff, 0xaaaaaaaa, 0xcccccccc,
        0xf0f0f0f0, 0xff00ff00, 0xffff0000, 0x0000ffff, 0x00ffff00, 0x0ff00ff0, 0x3c3c3c3c,
        0x66666666, 0xffffffff, 0x12345678, 0x31415927, 0xcafebabe, 0xcafed00d, 0x47494638,
        0x89504e47, 0x4d546864, 0x2321202f, 0x7f454c46, 0x25504446, 0x19540119, 0x4a6f7921,
        0x49492a00, 0x4d4d002a, 0x57414433, 0xd0cf11e0,
    ];

    // the transposed form: row r of the 32-column input holds bit
    // (31 - r) of every truth word
    fn rows(bits: usize) -> Vec<u8> {
        let mut src = vec![0u8; bits * 4];
        for (j, &word) in TRUTH.iter().enumerate() {
            for row in 0..bits {
                if word >> (31 - row) & 1 != 0 {
                    src[row * 4 + j / 8] |= 0x80 >> (j & 7);
                }
            }
        }
        src
    }

    #[test]
    fn ground_truth() {
        for bits in 1..=32usize {
            let src = rows(bits);
            let mut out = [0i64; 32];
            transpose(&src, 32, bits, &mut out);
            for (j, &word) in TRUTH.iter().enumerate() {
                let expected = (word as i32 >> (32 - bits)) as i64;
                assert_eq!(
                    out[j], expected,
                    "bits={} column={} selected={}",
                    bits,
                    j,
                    selected()
                );
            }
        }
    }

    #[test]
    fn pack_inverts_transpose() {
        for bits in 1..=32usize {
            let src = rows(bits);
            let mut out = [0i64; 32];
            transpose(&src, 32, bits, &mut out);
            let mut packed = Vec::new();
            pack(&out, 32, bits, &mut packed);
            assert_eq!(packed, src, "bits={}", bits);
        }
    }

    #[test]
    fn selected_is_named() {
        assert!(matches!(selected(), "generic" | "sse2"));
    }
}

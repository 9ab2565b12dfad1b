//! Separable 8x8 type-II inverse DCT, matching the fixed-point-free
//! floating point form the format's encoder uses.

use std::sync::OnceLock;

struct CosineTable {
    cosine: [[f64; 8]; 8],
    alpha: [f64; 8],
}

fn cosine_table() -> &'static CosineTable {
    static TABLE: OnceLock<CosineTable> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut cosine = [[0.0f64; 8]; 8];
        for (y, row) in cosine.iter_mut().enumerate() {
            for (x, v) in row.iter_mut().enumerate() {
                *v = (std::f64::consts::PI / 16.0 * (2 * y + 1) as f64 * x as f64).cos();
            }
        }
        let mut alpha = [1.0f64; 8];
        alpha[0] = 1.0 / std::f64::consts::SQRT_2;
        CosineTable { cosine, alpha }
    })
}

/// Runs the column pass then the row pass over a natural-order (row-major)
/// 8x8 block of dequantized coefficients, producing spatial-domain samples
/// scaled by the standard 1/4 IDCT factor.
pub(super) fn idct8x8(input: &[f64; 64]) -> [f64; 64] {
    let t = cosine_table();
    let mut columns = [0.0f64; 64];

    for u in 0..8 {
        for y in 0..8 {
            let mut s = 0.0;
            for v in 0..8 {
                s += input[v * 8 + u] * t.alpha[v] * t.cosine[y][v];
            }
            columns[y * 8 + u] = s;
        }
    }

    let mut out = [0.0f64; 64];
    for y in 0..8 {
        for x in 0..8 {
            let mut s = 0.0;
            for u in 0..8 {
                s += columns[y * 8 + u] * t.alpha[u] * t.cosine[x][u];
            }
            out[y * 8 + x] = s / 4.0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dc_only_block_is_flat() {
        let mut coeffs = [0.0f64; 64];
        coeffs[0] = 8.0;
        let out = idct8x8(&coeffs);
        for v in out.iter() {
            assert!((*v - 1.0).abs() < 1e-9, "{v}");
        }
    }

    #[test]
    fn zero_block_is_zero() {
        let coeffs = [0.0f64; 64];
        let out = idct8x8(&coeffs);
        assert!(out.iter().all(|v| *v == 0.0));
    }
}

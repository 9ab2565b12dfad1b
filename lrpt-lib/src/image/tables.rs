//! Fixed constants for the MSU-MR entropy-coded image format: the zigzag
//! scan order, the baseline luminance quantization table, and per-segment
//! dequantization.

/// Natural (row-major) position -> zigzag scan index.
#[rustfmt::skip]
pub(super) const ZIGZAG: [usize; 64] = [
    0,  1,  5,  6, 14, 15, 27, 28,
    2,  4,  7, 13, 16, 26, 29, 42,
    3,  8, 12, 17, 25, 30, 41, 43,
    9, 11, 18, 24, 31, 40, 44, 53,
   10, 19, 23, 32, 39, 45, 52, 54,
   20, 22, 33, 38, 46, 51, 55, 60,
   21, 34, 37, 47, 50, 56, 59, 61,
   35, 36, 48, 49, 57, 58, 62, 63,
];

/// Baseline luminance quantization table, natural (row-major) order.
#[rustfmt::skip]
const STANDARD_QUANTIZATION_TABLE: [i32; 64] = [
    16, 11, 10, 16, 24, 40, 51, 61,
    12, 12, 14, 19, 26, 58, 60, 55,
    14, 13, 16, 24, 40, 57, 69, 56,
    14, 17, 22, 29, 51, 87, 80, 62,
    18, 22, 37, 56, 68,109,103, 77,
    24, 35, 55, 64, 81,104,113, 92,
    49, 64, 78, 87,103,121,120,101,
    72, 92, 95, 98,112,100,103, 99,
];

/// Builds the per-segment dequantization table from the quality factor
/// scaling used throughout the JPEG baseline standard.
pub(super) fn dequantization_table(qf: f64) -> [i32; 64] {
    let f = if qf > 20.0 && qf < 50.0 {
        5000.0 / qf
    } else {
        200.0 - 2.0 * qf
    };

    let mut dqt = [0i32; 64];
    for (i, q) in STANDARD_QUANTIZATION_TABLE.iter().enumerate() {
        let v = ((f / 100.0) * (*q as f64) + 0.5).floor() as i32;
        dqt[i] = v.max(1);
    }
    dqt
}

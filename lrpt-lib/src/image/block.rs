//! Per-block entropy decode: DC/AC coefficient extraction, dequantization,
//! and the inverse DCT, producing one 8x8 tile of pixel samples.

use super::bitreader::BitReader;
use super::huffman::tables;
use super::idct::idct8x8;
use super::tables::ZIGZAG;

#[derive(Debug)]
pub(super) enum BlockError {
    BadDcCode,
    BadAcCode,
}

/// Undoes the sign-magnitude range mapping used for both DC and AC values:
/// a category-`cat` code encodes either a value in `[2^(cat-1), 2^cat - 1]`
/// directly (positive) or its one's-complement (negative).
fn map_range(cat: u8, raw: u16) -> i32 {
    if cat == 0 {
        return 0;
    }
    let maxval = (1i32 << cat) - 1;
    let raw = raw as i32;
    if (raw >> (cat - 1)) != 0 {
        raw
    } else {
        raw - maxval
    }
}

/// Decodes one entropy-coded 8x8 block, returning its dequantized,
/// zigzag-reordered-then-spatial pixel samples and the DC value to carry
/// into the next block in the segment.
pub(super) fn decode_block(
    bits: &mut BitReader<'_>,
    dqt: &[i32; 64],
    prev_dc: i32,
) -> Result<([u8; 64], i32), BlockError> {
    let t = tables();

    let dc_idx = t.dc_lookup[bits.peek_bits(16) as usize];
    if dc_idx < 0 {
        return Err(BlockError::BadDcCode);
    }
    let dc_cat = t.dc_categories[dc_idx as usize];
    bits.advance(super::huffman::dc_code_length(dc_cat) as u32);
    let raw = bits.fetch_bits(dc_cat as u32);

    let mut zdct = [0i32; 64];
    zdct[0] = map_range(dc_cat, raw) + prev_dc;
    let dc = zdct[0];

    let mut k = 1usize;
    while k < 64 {
        let ac_idx = t.ac_lookup[bits.peek_bits(16) as usize];
        if ac_idx < 0 {
            return Err(BlockError::BadAcCode);
        }
        let sym = t.ac_symbols[ac_idx as usize];
        bits.advance(sym.length as u32);

        if sym.run == 0 && sym.size == 0 {
            // EOB: remaining coefficients are zero.
            break;
        }

        for _ in 0..sym.run {
            if k >= 64 {
                break;
            }
            zdct[k] = 0;
            k += 1;
        }

        if sym.size != 0 {
            if k >= 64 {
                break;
            }
            let raw = bits.fetch_bits(sym.size as u32);
            zdct[k] = map_range(sym.size, raw);
            k += 1;
        } else if sym.run == 15 {
            // ZRL: 16 zero coefficients, no value bits.
            if k < 64 {
                zdct[k] = 0;
                k += 1;
            }
        }
    }

    let mut dct = [0.0f64; 64];
    for i in 0..64 {
        dct[i] = (zdct[ZIGZAG[i]] * dqt[i]) as f64;
    }

    let spatial = idct8x8(&dct);
    let mut pixels = [0u8; 64];
    for (px, v) in pixels.iter_mut().zip(spatial.iter()) {
        let t = (v + 128.0).round();
        *px = t.clamp(0.0, 255.0) as u8;
    }

    Ok((pixels, dc))
}

//! MSU-MR segment header parsing and one-segment entropy decode.

use super::bitreader::BitReader;
use super::block::{decode_block, BlockError};
use super::tables::dequantization_table;
use super::{BLOCKS_PER_LINE, BLOCK_H, BLOCK_W};

/// Fixed size of an MSU-MR segment header, in bytes.
pub const HEADER_LEN: usize = 14;

/// Parsed MSU-MR segment header (the first 14 bytes of the segment's space
/// packet payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentHeader {
    /// Raw CCSDS day-segmented time bytes; decode with
    /// [`crate::timecode::decode_meteor`].
    pub time: [u8; 8],
    /// Minimum Coded Unit number within the scan.
    pub mcun: u8,
    pub qt: u8,
    pub dc_table: u8,
    pub ac_table: u8,
    pub qfm: u16,
    /// Quality factor, `0..=100`.
    pub qf: u8,
}

impl SegmentHeader {
    /// Parses a 14-byte header. Returns `None` if `buf` is shorter than
    /// [`HEADER_LEN`].
    #[must_use]
    pub fn decode(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        let mut time = [0u8; 8];
        time.copy_from_slice(&buf[0..8]);
        Some(SegmentHeader {
            time,
            mcun: buf[8],
            qt: buf[9],
            dc_table: buf[10] >> 4,
            ac_table: buf[10] & 0xf,
            qfm: u16::from_be_bytes([buf[11], buf[12]]),
            qf: buf[13],
        })
    }

    /// Index, within the 14-segment line, that this segment's strip occupies.
    #[must_use]
    pub fn line_index(&self) -> usize {
        self.mcun as usize / BLOCKS_PER_LINE
    }
}

/// One decoded segment: its header and the `BLOCK_H x BLOCK_W` pixel strip
/// produced by entropy-decoding its 14 blocks.
pub struct DecodedSegment {
    pub header: SegmentHeader,
    pub strip: [[u8; BLOCK_W]; BLOCK_H],
}

/// Parses the header and entropy-decodes the 14 blocks making up one MSU-MR
/// segment's payload.
///
/// Returns `None` if the payload is too short for a header, or if the
/// entropy stream hits a Huffman miss or runs out of bits partway through a
/// block -- both are drop-the-whole-segment conditions; per-channel
/// reassembly state is untouched by a dropped segment.
#[must_use]
pub fn decode_segment(payload: &[u8]) -> Option<DecodedSegment> {
    let header = SegmentHeader::decode(payload)?;
    let dqt = dequantization_table(f64::from(header.qf));

    let mut bits = BitReader::new(&payload[HEADER_LEN..]);
    let mut strip = [[0u8; BLOCK_W]; BLOCK_H];
    let mut prev_dc = 0i32;

    for block_idx in 0..BLOCKS_PER_LINE {
        let (pixels, dc) = match decode_block(&mut bits, &dqt, prev_dc) {
            Ok(result) => result,
            Err(BlockError::BadDcCode | BlockError::BadAcCode) => return None,
        };
        prev_dc = dc;

        let x0 = block_idx * 8;
        for row in 0..8 {
            strip[row][x0..x0 + 8].copy_from_slice(&pixels[row * 8..row * 8 + 8]);
        }
    }

    Some(DecodedSegment { header, strip })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_decode_rejects_short_payload() {
        assert!(SegmentHeader::decode(&[0u8; 13]).is_none());
    }

    #[test]
    fn header_decode_parses_fields() {
        let mut buf = [0u8; 14];
        buf[8] = 28; // mcun
        buf[9] = 5; // qt
        buf[10] = 0x12; // dc=1, ac=2
        buf[11] = 0x01;
        buf[12] = 0x02; // qfm = 0x0102
        buf[13] = 80; // qf
        let header = SegmentHeader::decode(&buf).unwrap();
        assert_eq!(header.mcun, 28);
        assert_eq!(header.qt, 5);
        assert_eq!(header.dc_table, 1);
        assert_eq!(header.ac_table, 2);
        assert_eq!(header.qfm, 0x0102);
        assert_eq!(header.qf, 80);
        assert_eq!(header.line_index(), 2);
    }

    #[test]
    fn decode_segment_rejects_short_payload() {
        assert!(decode_segment(&[0u8; 10]).is_none());
    }

    #[test]
    fn decode_segment_drops_on_bad_entropy_data() {
        let mut payload = vec![0u8; HEADER_LEN];
        payload[13] = 50; // qf
        payload.extend(std::iter::repeat(0xffu8).take(32));
        assert!(decode_segment(&payload).is_none());
    }
}

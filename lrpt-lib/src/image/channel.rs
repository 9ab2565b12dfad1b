//! Per-APID line reassembly: stitches consecutive segment strips into full
//! 1568-pixel-wide image rows.

use super::segment::SegmentHeader;
use super::{BLOCKS_PER_LINE, BLOCK_H, BLOCK_W, IMAGE_WIDTH};
use crate::spacepacket::Apid;

/// Reassembly state for one MSU-MR virtual channel (one image APID).
///
/// Holds only the in-progress line; completed rows are handed to the caller
/// as soon as they're flushed rather than accumulated here, so memory use is
/// bounded by one partial line regardless of pass length.
pub struct Channel {
    apid: Apid,
    current_line: Option<Box<[[u8; IMAGE_WIDTH]; BLOCK_H]>>,
}

impl Channel {
    #[must_use]
    pub fn new(apid: Apid) -> Self {
        Self {
            apid,
            current_line: None,
        }
    }

    #[must_use]
    pub fn apid(&self) -> Apid {
        self.apid
    }

    /// Ingests one decoded segment's strip, appending any rows it completes
    /// or flushes (via the resync-on-new-line rule) to `out`, in top-to-bottom
    /// order.
    ///
    /// A strip whose line index would blit past the image width is treated
    /// as corrupt and dropped; current_line is left untouched.
    pub fn ingest(
        &mut self,
        header: &SegmentHeader,
        strip: &[[u8; BLOCK_W]; BLOCK_H],
        out: &mut Vec<Vec<u8>>,
    ) {
        let idx = header.line_index();
        let x0 = idx * BLOCK_W;
        if x0 + BLOCK_W > IMAGE_WIDTH {
            return;
        }

        if idx == 0 {
            self.flush(out);
        }

        let line = self
            .current_line
            .get_or_insert_with(|| Box::new([[0u8; IMAGE_WIDTH]; BLOCK_H]));
        for (row, src) in line.iter_mut().zip(strip.iter()) {
            row[x0..x0 + BLOCK_W].copy_from_slice(src);
        }

        if idx == BLOCKS_PER_LINE - 1 {
            self.flush(out);
        }
    }

    /// Flushes any in-progress line, e.g. at end of input. A no-op if no
    /// line is in progress.
    pub fn flush(&mut self, out: &mut Vec<Vec<u8>>) {
        if let Some(line) = self.current_line.take() {
            out.extend(line.iter().map(|row| row.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(fill: u8) -> [[u8; BLOCK_W]; BLOCK_H] {
        [[fill; BLOCK_W]; BLOCK_H]
    }

    fn header_at(mcun: u8) -> SegmentHeader {
        SegmentHeader {
            time: [0; 8],
            mcun,
            qt: 0,
            dc_table: 0,
            ac_table: 0,
            qfm: 0,
            qf: 50,
        }
    }

    #[test]
    fn full_line_flushes_after_last_block() {
        let mut channel = Channel::new(65);
        let mut out = Vec::new();
        for idx in 0..BLOCKS_PER_LINE {
            channel.ingest(&header_at((idx * BLOCKS_PER_LINE) as u8), &strip(idx as u8 + 1), &mut out);
        }
        assert_eq!(out.len(), BLOCK_H);
        for row in &out {
            assert_eq!(row.len(), IMAGE_WIDTH);
            for (idx, chunk) in row.chunks(BLOCK_W).enumerate() {
                assert!(chunk.iter().all(|&b| b == idx as u8 + 1));
            }
        }
    }

    #[test]
    fn resync_flushes_partial_line() {
        let mut channel = Channel::new(65);
        let mut out = Vec::new();
        // Only the first 3 of 14 blocks arrive...
        for idx in 0..3 {
            channel.ingest(&header_at((idx * BLOCKS_PER_LINE) as u8), &strip(9), &mut out);
        }
        assert!(out.is_empty());

        // ...then a new line begins, forcing a resync flush of the partial one.
        channel.ingest(&header_at(0), &strip(1), &mut out);
        assert_eq!(out.len(), BLOCK_H);
        for row in &out {
            assert_eq!(&row[0..BLOCK_W * 3], vec![9u8; BLOCK_W * 3].as_slice());
            assert!(row[BLOCK_W * 3..].iter().all(|&b| b == 0));
        }
    }

    #[test]
    fn out_of_range_index_is_dropped() {
        let mut channel = Channel::new(65);
        let mut out = Vec::new();
        channel.ingest(&header_at(255), &strip(1), &mut out);
        assert!(out.is_empty());
        assert!(channel.current_line.is_none());
    }

    #[test]
    fn explicit_flush_emits_partial_line() {
        let mut channel = Channel::new(65);
        let mut out = Vec::new();
        channel.ingest(&header_at(0), &strip(3), &mut out);
        assert!(out.is_empty());
        channel.flush(&mut out);
        assert_eq!(out.len(), BLOCK_H);
    }
}

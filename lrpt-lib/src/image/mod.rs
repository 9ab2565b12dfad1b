//! MSU-MR image segment decoding.
//!
//! Ties together segment entropy-decode ([`segment`]) and per-APID line
//! reassembly ([`channel`]) into a single [`ImageDecoder`] that can be fed a
//! stream of space packets and emits completed image rows.

mod bitreader;
mod block;
mod channel;
mod huffman;
mod idct;
mod segment;
mod tables;

#[cfg(feature = "image-sink")]
pub mod sink;

use std::collections::HashMap;
use std::ops::Range;

pub use channel::Channel;
pub use segment::{decode_segment, DecodedSegment, SegmentHeader, HEADER_LEN};

use crate::spacepacket::{Apid, Packet, PrimaryHeader};

/// Number of 8x8 blocks composing one MSU-MR segment strip.
pub const BLOCKS_PER_LINE: usize = 14;
/// Width, in pixels, of one segment's decoded strip (`14 * 8`).
pub const BLOCK_W: usize = 112;
/// Height, in pixels, of one segment's decoded strip and of one image row batch.
pub const BLOCK_H: usize = 8;
/// Width, in pixels, of a full MSU-MR image row (`14 * BLOCK_W`).
pub const IMAGE_WIDTH: usize = 1568;

/// APIDs carrying MSU-MR imagery. APID 70 carries MSU-MR telemetry, not
/// imagery, and is deliberately excluded from this range.
pub const IMAGE_APIDS: Range<Apid> = 60..70;

/// One completed (or resync-flushed) image row tagged with the channel
/// (APID) it belongs to.
#[derive(Debug, Clone)]
pub struct ImageRow {
    pub apid: Apid,
    pub row: Vec<u8>,
}

/// Decodes MSU-MR segments from one or more imagery APIDs into per-channel
/// image rows.
///
/// A [`Channel`] is created lazily for each APID seen. A segment that fails
/// to parse or entropy-decode is silently dropped; the channel it would
/// have fed is left untouched, matching the drop-forward error policy used
/// throughout this crate.
#[derive(Default)]
pub struct ImageDecoder {
    channels: HashMap<Apid, Channel>,
}

impl ImageDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            channels: HashMap::new(),
        }
    }

    /// Feeds one MSU-MR segment payload (a space packet's user data, header
    /// included) known to belong to `apid`, returning any image rows it
    /// completed or flushed, top-to-bottom.
    pub fn ingest(&mut self, apid: Apid, payload: &[u8]) -> Vec<ImageRow> {
        let Some(decoded) = decode_segment(payload) else {
            return Vec::new();
        };

        let channel = self.channels.entry(apid).or_insert_with(|| Channel::new(apid));
        let mut rows = Vec::new();
        channel.ingest(&decoded.header, &decoded.strip, &mut rows);
        rows.into_iter().map(|row| ImageRow { apid, row }).collect()
    }

    /// Feeds a decoded [`Packet`], routing it by its APID. Packets whose
    /// APID is not in [`IMAGE_APIDS`] are ignored.
    pub fn ingest_packet(&mut self, packet: &Packet) -> Vec<ImageRow> {
        let apid = packet.header.apid;
        if !IMAGE_APIDS.contains(&apid) {
            return Vec::new();
        }
        self.ingest(apid, &packet.data[PrimaryHeader::LEN..])
    }

    /// Flushes any in-progress lines for every channel, in APID order. Call
    /// at end of input to avoid losing a trailing partial line.
    pub fn flush(&mut self) -> Vec<ImageRow> {
        let mut apids: Vec<Apid> = self.channels.keys().copied().collect();
        apids.sort_unstable();

        let mut out = Vec::new();
        for apid in apids {
            let channel = self.channels.get_mut(&apid).expect("apid came from channels keys");
            let mut rows = Vec::new();
            channel.flush(&mut rows);
            out.extend(rows.into_iter().map(|row| ImageRow { apid, row }));
        }
        out
    }
}

//! `packets` subcommand: a frame file produced by the `frame` subcommand
//! reassembled into CCSDS space packets, optionally filtered by APID.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use anyhow::{Context, Result};
use lrpt::framing::{decode_framed_packets, missing_frames, DecodedFrame, Frame, Vcid};
use lrpt::spacepacket::Apid;
use tracing::debug;

/// VCDU length, in bytes, written by the `frame` subcommand: 6-byte primary
/// header + 886-byte MPDU, with Reed-Solomon check symbols already removed.
const VCDU_LEN: usize = 892;

/// Reads fixed-length VCDU records from a frame file, re-deriving per-VCID
/// missing-frame counts the same way [`lrpt::framing::Decoder`] does.
struct FrameFileIter<R> {
    reader: R,
    last: HashMap<Vcid, u32>,
}

impl<R: Read> Iterator for FrameFileIter<R> {
    type Item = DecodedFrame;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = vec![0u8; VCDU_LEN];
        match self.reader.read_exact(&mut buf) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return None,
            Err(err) => {
                debug!("error reading frame file: {err}");
                return None;
            }
        }
        let frame = Frame::decode(buf)?;
        let missing = self
            .last
            .get(&frame.header.vcid)
            .map_or(0, |last| missing_frames(frame.header.counter, *last));
        self.last.insert(frame.header.vcid, frame.header.counter);

        Some(DecodedFrame {
            frame,
            missing,
            integrity: None,
        })
    }
}

/// Decodes space packets out of the VCDUs in `srcpath`, writing the
/// (APID-filtered) packet byte stream to `writer`.
///
/// If `include` is non-empty, only those APIDs are assembled at all; bytes
/// belonging to any other APID are dropped at the reassembly stage. If
/// `exclude` is non-empty, assembled packets with those APIDs are dropped
/// afterward. Applying `include` then `exclude` mirrors the CCSDS tooling
/// convention used elsewhere in this crate.
pub fn packets<W: Write>(
    srcpath: &Path,
    mut writer: W,
    include: &[Apid],
    exclude: &[Apid],
) -> Result<()> {
    let reader = BufReader::new(File::open(srcpath).context("opening source")?);
    let frames = FrameFileIter {
        reader,
        last: HashMap::new(),
    };

    let mut count = 0usize;
    for decoded in decode_framed_packets(frames, 0, 0, include) {
        let apid = decoded.packet.header.apid;
        if !exclude.is_empty() && exclude.contains(&apid) {
            continue;
        }
        writer.write_all(&decoded.packet.data)?;
        count += 1;
    }
    debug!(count, "wrote packets");

    Ok(())
}

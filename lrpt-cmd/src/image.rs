//! `image` subcommand: a space packet file decoded into per-channel MSU-MR
//! PNGs and an optional RGB composite.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use lrpt::image::sink::{composite_rgb, write_greyscale_png, write_rgb_png};
use lrpt::image::ImageDecoder;
use lrpt::spacepacket::{read_packets, Apid};
use tracing::{debug, warn};

/// APID assigned red in the corrected RGB composite mapping.
const RED_APID: Apid = 65;
/// APID assigned green in the corrected RGB composite mapping.
const GREEN_APID: Apid = 66;
/// APID assigned blue in the corrected RGB composite mapping.
const BLUE_APID: Apid = 64;

/// Decodes MSU-MR imagery from the space packets in `srcpath`, writing one
/// greyscale PNG per imaged APID to `out_dir`, and, if `composite` is set,
/// an `composite.png` built from APIDs 64/65/66 (blue/red/green).
///
/// `include`, if non-empty, restricts decoding to the given APIDs.
pub fn image(srcpath: &Path, out_dir: &Path, include: &[Apid], composite: bool) -> Result<()> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("creating output directory {out_dir:?}"))?;

    let reader = std::fs::File::open(srcpath).context("opening source")?;
    let mut decoder = ImageDecoder::new();
    let mut rows: HashMap<Apid, Vec<Vec<u8>>> = HashMap::new();

    for packet in read_packets(reader).filter_map(std::result::Result::ok) {
        if !include.is_empty() && !include.contains(&packet.header.apid) {
            continue;
        }
        for row in decoder.ingest_packet(&packet) {
            rows.entry(row.apid).or_default().push(row.row);
        }
    }
    for row in decoder.flush() {
        rows.entry(row.apid).or_default().push(row.row);
    }

    if rows.is_empty() {
        bail!("no imagery decoded from {srcpath:?}");
    }

    let mut apids: Vec<Apid> = rows.keys().copied().collect();
    apids.sort_unstable();
    for apid in &apids {
        let path = out_dir.join(format!("apid-{apid}.png"));
        write_greyscale_png(&rows[apid], &path)
            .with_context(|| format!("writing {path:?}"))?;
        debug!(apid, rows = rows[apid].len(), "wrote channel png");
    }

    if composite {
        match (
            rows.get(&RED_APID),
            rows.get(&GREEN_APID),
            rows.get(&BLUE_APID),
        ) {
            (Some(r), Some(g), Some(b)) => {
                let img = composite_rgb(r, g, b).context("building rgb composite")?;
                let path = out_dir.join("composite.png");
                write_rgb_png(&img, &path).with_context(|| format!("writing {path:?}"))?;
                debug!(path = ?path, "wrote rgb composite");
            }
            _ => warn!(
                "composite requested but apids {RED_APID}, {GREEN_APID}, and {BLUE_APID} were not all decoded"
            ),
        }
    }

    Ok(())
}

//! PNG sinks for decoded MSU-MR image rows.
//!
//! Gated behind the `image-sink` feature so that callers who only need the
//! protocol/decoding stack are not forced to pull in the `image` crate.

use std::cmp::min;
use std::path::Path;

use image::{GrayImage, RgbImage};

use super::IMAGE_WIDTH;
use crate::{Error, Result};

/// Writes `rows` (each `IMAGE_WIDTH` bytes) as a single-channel greyscale
/// PNG at `path`.
///
/// # Errors
/// [`Error::NotEnoughData`] if any row is not exactly [`IMAGE_WIDTH`] bytes
/// wide. Any error constructing or saving the image is wrapped as
/// [`Error::Io`].
pub fn write_greyscale_png<P: AsRef<Path>>(rows: &[Vec<u8>], path: P) -> Result<()> {
    let height = rows.len();
    let mut buf = Vec::with_capacity(height * IMAGE_WIDTH);
    for row in rows {
        if row.len() != IMAGE_WIDTH {
            return Err(Error::NotEnoughData {
                actual: row.len(),
                minimum: IMAGE_WIDTH,
            });
        }
        buf.extend_from_slice(row);
    }

    let img = GrayImage::from_raw(IMAGE_WIDTH as u32, height as u32, buf)
        .expect("buffer length matches width * height by construction");
    img.save(path)
        .map_err(|err| Error::Io(std::io::Error::other(err)))
}

/// Builds an RGB composite from three per-channel row sets, cropped to the
/// shortest of the three heights.
///
/// Per the reference mapping for Meteor-M N2 MSU-MR: R and G both come from
/// the two visible/near-IR channels (APID 65 for red, APID 66 for green)
/// and B from the other visible channel (APID 64). Callers are responsible
/// for handing in the row sets for the APIDs they intend those colors to
/// represent; this function only does the interleaving and cropping.
///
/// # Errors
/// [`Error::NotEnoughData`] if any row across the three inputs is not
/// exactly [`IMAGE_WIDTH`] bytes wide.
pub fn composite_rgb(red: &[Vec<u8>], green: &[Vec<u8>], blue: &[Vec<u8>]) -> Result<RgbImage> {
    let height = min(red.len(), min(green.len(), blue.len()));

    let mut buf = Vec::with_capacity(height * IMAGE_WIDTH * 3);
    for y in 0..height {
        let (r, g, b) = (&red[y], &green[y], &blue[y]);
        for row in [r, g, b] {
            if row.len() != IMAGE_WIDTH {
                return Err(Error::NotEnoughData {
                    actual: row.len(),
                    minimum: IMAGE_WIDTH,
                });
            }
        }
        for x in 0..IMAGE_WIDTH {
            buf.push(r[x]);
            buf.push(g[x]);
            buf.push(b[x]);
        }
    }

    Ok(RgbImage::from_raw(IMAGE_WIDTH as u32, height as u32, buf)
        .expect("buffer length matches width * height * 3 by construction"))
}

/// Saves an RGB composite PNG built by [`composite_rgb`] to `path`.
///
/// # Errors
/// Any error saving the image is wrapped as [`Error::Io`].
pub fn write_rgb_png<P: AsRef<Path>>(img: &RgbImage, path: P) -> Result<()> {
    img.save(path)
        .map_err(|err| Error::Io(std::io::Error::other(err)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(height: usize, fill: u8) -> Vec<Vec<u8>> {
        (0..height).map(|_| vec![fill; IMAGE_WIDTH]).collect()
    }

    #[test]
    fn write_greyscale_png_rejects_bad_width() {
        let bad = vec![vec![0u8; IMAGE_WIDTH - 1]];
        let dir = std::env::temp_dir().join("lrpt-sink-test-bad-width.png");
        assert!(write_greyscale_png(&bad, &dir).is_err());
    }

    #[test]
    fn composite_rgb_crops_to_shortest_input() {
        let r = rows(10, 1);
        let g = rows(8, 2);
        let b = rows(12, 3);
        let img = composite_rgb(&r, &g, &b).unwrap();
        assert_eq!(img.height(), 8);
        assert_eq!(img.width(), IMAGE_WIDTH as u32);
        let px = img.get_pixel(0, 0);
        assert_eq!(px.0, [1, 2, 3]);
    }
}

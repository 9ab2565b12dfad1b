use rs2::{correct_message, has_errors, RSState, N, PARITY_LEN};
use serde::{Deserialize, Serialize};

use super::VCDUHeader;
use crate::{Error, Result};

/// Outcome of a Reed-Solomon correction attempt on a single CADU.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Integrity {
    /// No errors were detected.
    Ok,
    /// Errors were detected and corrected.
    Corrected,
    /// Errors were detected but could not be corrected.
    Uncorrectable,
    /// Not performed, e.g., for fill frames or when disabled.
    Skipped,
}

impl Integrity {
    /// Returns `true` if the frame's data can be trusted, i.e., it was either free of
    /// errors or successfully corrected.
    #[must_use]
    pub fn ok(&self) -> bool {
        matches!(self, Integrity::Ok | Integrity::Corrected)
    }
}

/// A pluggable error-detection/correction algorithm operating on raw CADU bytes
/// (ASM stripped).
pub trait ReedSolomon: Send + Sync {
    /// Checks, and possibly corrects, `cadu_dat` returning the resulting [Integrity]
    /// and the corrected data with parity and any virtual fill removed.
    ///
    /// # Errors
    /// Any error encountered running the algorithm.
    fn perform(&self, header: &VCDUHeader, cadu_dat: &[u8]) -> Result<(Integrity, Vec<u8>)>;
}

/// Splits `data` into `interleave` lanes of 255 bytes each, distributing bytes
/// round-robin across lanes, i.e., `lane[j % interleave][j / interleave] = data[j]`.
///
/// Ref: CCSDS 130.1-G-2, Section 5.3
fn deinterleave(data: &[u8], interleave: u8) -> Vec<[u8; N as usize]> {
    let interleave = interleave as usize;
    let mut lanes = vec![[0u8; N as usize]; interleave];
    for (j, b) in data.iter().enumerate() {
        lanes[j % interleave][j / interleave] = *b;
    }
    lanes
}

/// CCSDS-standard Reed-Solomon(255,223) decoder with 4-way (or configurable) symbol
/// interleaving, delegating the actual correction (including the dual-basis mapping
/// at the codec boundary) to `rs2`.
///
/// # References
/// * [TM Synchronization and Channel Coding](https://ccsds.org/Pubs/131x0b5.pdf), Section 4
#[derive(Clone, Debug)]
pub struct DefaultReedSolomon {
    interleave: u8,
    virtual_fill: usize,
    parity_len: usize,
    detect: bool,
    correct: bool,
}

impl DefaultReedSolomon {
    /// Create a new instance using the given symbol interleave, e.g., 4 for a 1020
    /// byte CADU payload. Defaults to no virtual fill with both detection and
    /// correction enabled.
    #[must_use]
    pub fn new(interleave: u8) -> Self {
        DefaultReedSolomon {
            interleave,
            virtual_fill: 0,
            parity_len: PARITY_LEN,
            detect: true,
            correct: true,
        }
    }

    /// Sets the number of virtual-fill bytes prepended to each lane to pad it out
    /// to 255 bytes when the source used a shortened code.
    #[must_use]
    pub fn with_virtual_fill(mut self, num: usize) -> Self {
        self.virtual_fill = num;
        self
    }

    /// If `false`, `perform` will always return [`Integrity::Skipped`] without
    /// inspecting the data.
    #[must_use]
    pub fn with_detection(mut self, enabled: bool) -> Self {
        self.detect = enabled;
        self
    }

    /// If `false`, detected errors are reported as [`Integrity::Uncorrectable`]
    /// without attempting correction.
    #[must_use]
    pub fn with_correction(mut self, enabled: bool) -> Self {
        self.correct = enabled;
        self
    }

    fn can_correct(&self, cadu_dat: &[u8]) -> bool {
        cadu_dat.len() + self.virtual_fill * self.interleave as usize
            == N as usize * self.interleave as usize
    }

    fn remove_parity(&self, cadu_dat: &[u8]) -> Vec<u8> {
        let parity_len = self.interleave as usize * self.parity_len;
        cadu_dat[..cadu_dat.len() - parity_len].to_vec()
    }
}

impl ReedSolomon for DefaultReedSolomon {
    fn perform(&self, header: &VCDUHeader, cadu_dat: &[u8]) -> Result<(Integrity, Vec<u8>)> {
        if !self.can_correct(cadu_dat) {
            return Err(Error::IntegrityAlgorithm(format!(
                "codeblock len={} cannot be corrected by this algorithm with interleave={}",
                cadu_dat.len(),
                self.interleave,
            )));
        }

        if header.vcid == VCDUHeader::FILL || !self.detect {
            return Ok((Integrity::Skipped, self.remove_parity(cadu_dat)));
        }

        // Virtual fill bytes are prepended so every lane lines up on a 255 byte
        // boundary before deinterleaving.
        let padded;
        let cadu_dat = if self.virtual_fill == 0 {
            cadu_dat
        } else {
            padded = [&vec![0u8; self.virtual_fill][..], cadu_dat].concat();
            &padded[..]
        };

        let lanes = deinterleave(cadu_dat, self.interleave);
        let mut corrected = vec![0u8; cadu_dat.len()];
        let mut num_corrected = 0i32;

        for (idx, lane) in lanes.iter().enumerate() {
            if !self.correct && has_errors(lane) {
                return Ok((Integrity::Uncorrectable, cadu_dat.to_vec()));
            }

            let block = correct_message(lane);
            match block.state {
                RSState::Uncorrectable(_) => {
                    return Ok((Integrity::Uncorrectable, self.remove_parity(cadu_dat)));
                }
                RSState::Corrected(n) => num_corrected += n,
                _ => {}
            }
            let message = block
                .message
                .expect("rs2 returned no message for a non-uncorrectable state");
            for (j, b) in message.iter().enumerate() {
                corrected[idx + j * self.interleave as usize] = *b;
            }
        }

        let out = self.remove_parity(&corrected);
        let out = if self.virtual_fill == 0 {
            out
        } else {
            out[self.virtual_fill..].to_vec()
        };

        let integrity = if num_corrected > 0 {
            Integrity::Corrected
        } else {
            Integrity::Ok
        };

        Ok((integrity, out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    // RS message, no pn (taken from a known-good CCSDS RS(255,223) codeword).
    const FIXTURE_MSG: &[u8; 255] = &[
        0x67, 0xc4, 0x6b, 0xa7, 0x3e, 0xbe, 0x4c, 0x33, 0x6c, 0xb2, 0x23, 0x3a, 0x74, 0x06, 0x2b,
        0x18, 0xab, 0xb8, 0x09, 0xe6, 0x7d, 0xaf, 0x5d, 0xe5, 0xdf, 0x76, 0x25, 0x3f, 0xb9, 0x14,
        0xee, 0xec, 0xd1, 0xa3, 0x39, 0x5f, 0x38, 0x68, 0xf0, 0x26, 0xa6, 0x8a, 0xcb, 0x09, 0xaf,
        0x4e, 0xf8, 0x93, 0xf7, 0x45, 0x4b, 0x0d, 0xa9, 0xb8, 0x74, 0x0e, 0xf3, 0xc7, 0xed, 0x6e,
        0xa3, 0x0f, 0xf6, 0x79, 0x94, 0x16, 0xe2, 0x7f, 0xad, 0x91, 0x91, 0x04, 0xac, 0xa4, 0xae,
        0xb4, 0x51, 0x76, 0x2f, 0x62, 0x03, 0x5e, 0xa1, 0xe5, 0x5c, 0x45, 0xf8, 0x1f, 0x7a, 0x7b,
        0xe8, 0x35, 0xd8, 0xcc, 0x51, 0x0e, 0xae, 0x3a, 0x2a, 0x64, 0x1d, 0x03, 0x10, 0xcd, 0x18,
        0xe6, 0x7f, 0xef, 0xba, 0xd9, 0xe8, 0x98, 0x47, 0x82, 0x9c, 0xa1, 0x58, 0x47, 0x25, 0xdf,
        0x41, 0xd2, 0x01, 0x62, 0x3c, 0x24, 0x88, 0x90, 0xe9, 0xd7, 0x38, 0x1b, 0xa0, 0xa2, 0xb4,
        0x23, 0xea, 0x7e, 0x58, 0x0d, 0xf4, 0x61, 0x24, 0x14, 0xb0, 0x41, 0x90, 0x0c, 0xb7, 0xbb,
        0x5c, 0x59, 0x1b, 0xc6, 0x69, 0x24, 0x0f, 0xb6, 0x0e, 0x14, 0xa1, 0xb1, 0x8e, 0x48, 0x0f,
        0x17, 0x1d, 0xfb, 0x0f, 0x38, 0x42, 0xe3, 0x24, 0x58, 0xab, 0x82, 0xa8, 0xfd, 0xdf, 0xac,
        0x68, 0x93, 0x3d, 0x0d, 0x8f, 0x50, 0x52, 0x44, 0x6c, 0xba, 0xd3, 0x51, 0x99, 0x9c, 0x3e,
        0xad, 0xd5, 0xa8, 0xd7, 0x9d, 0xc7, 0x7f, 0x9f, 0xc9, 0x2a, 0xac, 0xe5, 0xc2, 0xcd, 0x9a,
        0x9b, 0xfa, 0x2d, 0x72, 0xab, 0x6b, 0xa4, 0x6b, 0x8b, 0x7d, 0xfa, 0x6c, 0x83, 0x63, 0x77,
        0x9f, 0x4e, 0x9a, 0x20, 0x35, 0xd2, 0x91, 0xce, 0xf4, 0x21, 0x1a, 0x97, 0x3c, 0x1a, 0x15,
        0x9d, 0xfc, 0x98, 0xba, 0x72, 0x1b, 0x9a, 0xa2, 0xe9, 0xc9, 0x46, 0x68, 0xce, 0xad, 0x27,
    ];

    fn header() -> VCDUHeader {
        VCDUHeader {
            version: 0,
            scid: 1,
            vcid: 1,
            counter: 0,
            replay: false,
            cycle: false,
            counter_cycle: 0,
        }
    }

    #[test]
    fn test_deinterleave() {
        let dat: Vec<u8> = vec![0, 1, 2, 3, 0, 1, 2, 3];
        let lanes = deinterleave(&dat, 4);
        for (i, lane) in lanes.iter().enumerate().take(4) {
            assert_eq!(lane[0], u8::try_from(i).unwrap());
            assert_eq!(lane[1], u8::try_from(i).unwrap());
        }
    }

    #[test_case(4, 1020, 892; "interleave 4")]
    #[test_case(5, 1275, 1115; "interleave 5")]
    fn test_correct_codeblock(interleave: u8, blocksize: usize, expected_len: usize) {
        let mut cadu = vec![0u8; FIXTURE_MSG.len() * interleave as usize];
        for j in 0..FIXTURE_MSG.len() {
            for i in 0..interleave {
                cadu[interleave as usize * j + i as usize] = FIXTURE_MSG[j];
            }
        }
        assert_eq!(cadu.len(), blocksize);

        let rs = DefaultReedSolomon::new(interleave);
        let hdr = header();

        let (integrity, decoded) = rs.perform(&hdr, &cadu).unwrap();
        assert_eq!(integrity, Integrity::Ok);
        assert_eq!(decoded.len(), expected_len);

        // Introduce a single-byte error and confirm it is corrected.
        cadu[100] = cadu[100].wrapping_add(1);
        let (integrity, decoded) = rs.perform(&hdr, &cadu).unwrap();
        assert_eq!(integrity, Integrity::Corrected);
        assert_eq!(decoded.len(), expected_len);
    }

    #[test]
    fn skips_fill_frames() {
        let mut hdr = header();
        hdr.vcid = VCDUHeader::FILL;
        let data = vec![0u8; 1020];
        let rs = DefaultReedSolomon::new(4);
        let (integrity, out) = rs.perform(&hdr, &data).unwrap();
        assert_eq!(integrity, Integrity::Skipped);
        assert_eq!(out.len(), 892);
    }

    #[test]
    fn rejects_mismatched_length() {
        let rs = DefaultReedSolomon::new(4);
        let hdr = header();
        assert!(rs.perform(&hdr, &[0u8; 100]).is_err());
    }
}

//! Bit-level CADU framer.
//!
//! Searches a raw bitstream for the CCSDS attached sync marker a single bit at a
//! time, automatically detecting whether the stream carries the marker inverted
//! (a common artifact of differentially-decoded demodulator output). This is the
//! canonical framer for soft/bit-oriented sources; [`super::Synchronizer`] provides
//! a faster byte-aligned path for sources that are already byte-synchronized and
//! produces bit-identical output.

use crate::framing::ASM;

const CADU_ASM: u32 = u32::from_be_bytes(ASM);
const CADU_ASM_INV: u32 = CADU_ASM ^ 0xFFFF_FFFF;

/// A single bit-synchronized CADU: the 4-byte ASM and the coded block that follows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cadu {
    pub asm: [u8; 4],
    pub data: Vec<u8>,
}

/// Scans a stream of bits (one bit per `u8`, value 0 or 1) for CADU frames using a
/// 32-bit rolling shift register, automatically detecting marker inversion.
///
/// `cadu_len_bytes` is the full frame length including the 4-byte ASM.
pub struct BitFramer<I> {
    bits: I,
    cadu_len_bytes: usize,
}

impl<I> BitFramer<I>
where
    I: Iterator<Item = u8>,
{
    #[must_use]
    pub fn new(bits: I, cadu_len_bytes: usize) -> Self {
        BitFramer {
            bits,
            cadu_len_bytes,
        }
    }
}

impl<I> Iterator for BitFramer<I>
where
    I: Iterator<Item = u8>,
{
    type Item = Cadu;

    fn next(&mut self) -> Option<Self::Item> {
        let cadu_size_bits = self.cadu_len_bytes * 8;
        let mut shifter: u32 = 0;

        loop {
            let bit = self.bits.next()? & 1;
            shifter = (shifter << 1) | u32::from(bit);

            let inverted = if shifter == CADU_ASM {
                false
            } else if shifter == CADU_ASM_INV {
                true
            } else {
                continue;
            };

            let mut frame_buf = vec![0u8; self.cadu_len_bytes];
            frame_buf[..4].copy_from_slice(&ASM);
            let mut bit_of_frame = 32usize;

            while bit_of_frame < cadu_size_bits {
                let Some(b) = self.bits.next() else {
                    return None;
                };
                let b = (b & 1) ^ u8::from(inverted);
                let byte_i = bit_of_frame / 8;
                frame_buf[byte_i] = (frame_buf[byte_i] << 1) | b;
                bit_of_frame += 1;
            }

            let mut asm = [0u8; 4];
            asm.copy_from_slice(&frame_buf[..4]);
            return Some(Cadu {
                asm,
                data: frame_buf[4..].to_vec(),
            });
        }
    }
}

/// Unpacks a byte stream into a bit stream, MSB first.
pub fn bits_from_bytes<'a>(bytes: impl Iterator<Item = u8> + 'a) -> impl Iterator<Item = u8> + 'a {
    bytes.flat_map(|byte| (0..8).rev().map(move |i| (byte >> i) & 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes_to_bits(bytes: &[u8]) -> Vec<u8> {
        bits_from_bytes(bytes.iter().copied()).collect()
    }

    #[test]
    fn finds_frame_with_no_inversion() {
        let mut raw = ASM.to_vec();
        raw.extend(vec![0xAAu8; 6]);
        let bits = bytes_to_bits(&raw);

        let mut framer = BitFramer::new(bits.into_iter(), 10);
        let cadu = framer.next().expect("expected a frame");
        assert_eq!(cadu.asm, ASM);
        assert_eq!(cadu.data, vec![0xAAu8; 6]);
    }

    #[test]
    fn finds_frame_with_inverted_asm() {
        let inverted_asm: [u8; 4] = [!ASM[0], !ASM[1], !ASM[2], !ASM[3]];
        let mut raw = inverted_asm.to_vec();
        // Inverted stream: payload bits are also inverted on the wire and must come
        // back out un-inverted.
        raw.extend(vec![!0xAAu8; 6]);
        let bits = bytes_to_bits(&raw);

        let mut framer = BitFramer::new(bits.into_iter(), 10);
        let cadu = framer.next().expect("expected a frame");
        assert_eq!(cadu.asm, ASM);
        assert_eq!(cadu.data, vec![0xAAu8; 6]);
    }

    #[test]
    fn no_marker_yields_nothing() {
        let bits = bytes_to_bits(&[0u8; 20]);
        let mut framer = BitFramer::new(bits.into_iter(), 10);
        assert!(framer.next().is_none());
    }

    #[test]
    fn agrees_with_byte_oriented_synchronizer() {
        use crate::framing::Synchronizer;

        let mut raw = ASM.to_vec();
        let payload = [1u8, 2, 3, 4, 5, 6];
        raw.extend_from_slice(&payload);

        let bits = bytes_to_bits(&raw);
        let mut framer = BitFramer::new(bits.into_iter(), raw.len());
        let cadu = framer.next().unwrap();

        let mut synchronizer = Synchronizer::new(&raw[..], &ASM, payload.len());
        let loc = synchronizer.scan().unwrap().unwrap();
        assert_eq!(loc.bit, 0);
        let block = synchronizer.block().unwrap();

        assert_eq!(cadu.data, block);
    }
}

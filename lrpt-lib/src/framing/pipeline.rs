//! High level composition of framing stages: synchronization, derandomization, and
//! Reed-Solomon correction.

use std::io::Read;

use super::{
    DecodedFrame, Decoder, DefaultDerandomizer, DefaultReedSolomon, Derandomizer, FramingConfig,
    ReedSolomon, Synchronizer, ASM,
};
use crate::Result;

/// Builds an iterator of [`DecodedFrame`]s from a raw byte stream.
///
/// By default the pipeline synchronizes on the standard CCSDS ASM, derandomizes
/// using the standard CCSDS PN sequence, and performs no Reed-Solomon correction;
/// call [`Pipeline::with_default_rs`] to enable it.
pub struct Pipeline {
    derandomize: bool,
    integrity: Option<Box<dyn ReedSolomon>>,
    num_threads: Option<u32>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline {
            derandomize: true,
            integrity: None,
            num_threads: None,
        }
    }
}

impl Pipeline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a pipeline from a [`FramingConfig`], e.g.
    /// [`FramingConfig::meteor_m_n2`].
    #[must_use]
    pub fn from_config(config: &FramingConfig) -> Self {
        let mut pipeline = Self::new();
        if !config.derandomize {
            pipeline = pipeline.without_pn();
        }
        pipeline.with_default_rs(config.rs_interleave, config.rs_virtual_fill)
    }

    /// Disables PN derandomization. Use when the source is already derandomized.
    #[must_use]
    pub fn without_pn(mut self) -> Self {
        self.derandomize = false;
        self
    }

    /// Enables the standard CCSDS Reed-Solomon(255,223) decoder with the given
    /// symbol interleave and virtual-fill length.
    #[must_use]
    pub fn with_default_rs(mut self, interleave: u8, virtual_fill: usize) -> Self {
        self.integrity = Some(Box::new(
            DefaultReedSolomon::new(interleave).with_virtual_fill(virtual_fill),
        ));
        self
    }

    /// Sets a custom integrity algorithm, e.g. a [`DefaultReedSolomon`] with
    /// detection or correction disabled.
    #[must_use]
    pub fn with_integrity(mut self, integrity: Box<dyn ReedSolomon>) -> Self {
        self.integrity = Some(integrity);
        self
    }

    /// Sets the number of threads used to run the Reed-Solomon stage concurrently.
    #[must_use]
    pub fn with_integrity_threads(mut self, num: u32) -> Self {
        self.num_threads = Some(num);
        self
    }

    /// Starts the pipeline reading CADUs (w/o ASM) of `block_length` bytes from
    /// `reader`, synchronized on the standard CCSDS ASM.
    pub fn start<R>(self, reader: R, block_length: usize) -> impl Iterator<Item = DecodedFrame>
    where
        R: Read + Send + 'static,
    {
        let blocks = Synchronizer::new(reader, &ASM, block_length)
            .into_iter()
            .filter_map(std::result::Result::ok);

        let mut decoder = Decoder::new();
        if self.derandomize {
            decoder = decoder.with_derandomization(Box::new(DefaultDerandomizer));
        }
        if let Some(integrity) = self.integrity {
            decoder = decoder.with_integrity(integrity);
        }
        if let Some(num) = self.num_threads {
            decoder = decoder.with_integrity_threads(num);
        }

        decoder.decode(blocks).filter_map(Result::ok)
    }
}

/// Derandomizes a stream of raw CADU blocks using the standard CCSDS PN sequence.
pub fn derandomize<I>(cadus: I) -> impl Iterator<Item = Vec<u8>>
where
    I: Iterator<Item = Vec<u8>>,
{
    let pn = DefaultDerandomizer;
    cadus.map(move |block| pn.derandomize(&block))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_defaults_to_derandomize_and_no_rs() {
        let p = Pipeline::new();
        assert!(p.derandomize);
        assert!(p.integrity.is_none());
    }

    #[test]
    fn without_pn_disables_derandomization() {
        let p = Pipeline::new().without_pn();
        assert!(!p.derandomize);
    }
}

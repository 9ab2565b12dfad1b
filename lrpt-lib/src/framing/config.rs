//! Framing configuration: the handful of per-mission constants the rest of
//! this module is parameterized by, bundled with the Meteor-M N2 defaults.

use typed_builder::TypedBuilder;

use super::ASM;

/// Parameters needed to synchronize, derandomize, and Reed-Solomon-correct a
/// raw CADU stream.
///
/// [`FramingConfig::meteor_m_n2`] (equivalently `FramingConfig::default()`)
/// provides the values specified for the Meteor-M N2 LRPT downlink: a
/// 1024-byte CADU (4-byte ASM + 1020-byte coded VCDU), CCSDS PN
/// derandomization, and 4-way-interleaved RS(255,223) with no virtual fill.
#[derive(Debug, Clone, TypedBuilder)]
pub struct FramingConfig {
    /// Full CADU length in bytes, including the 4-byte ASM.
    #[builder(default = 1024)]
    pub cadu_len: usize,
    /// Attached sync marker to search for.
    #[builder(default = ASM)]
    pub asm: [u8; 4],
    /// Whether to remove CCSDS PN derandomization before RS correction.
    #[builder(default = true)]
    pub derandomize: bool,
    /// Reed-Solomon symbol interleave factor, e.g. 4 for a 1020-byte
    /// codeblock (4 x 255-byte lanes).
    #[builder(default = 4)]
    pub rs_interleave: u8,
    /// Number of virtual-fill bytes the RS stage should prepend to each
    /// lane before correction; 0 for an unshortened code.
    #[builder(default = 0)]
    pub rs_virtual_fill: usize,
}

impl FramingConfig {
    /// Configuration for the Meteor-M N2 LRPT downlink.
    #[must_use]
    pub fn meteor_m_n2() -> Self {
        Self::builder().build()
    }

    /// Length, in bytes, of the coded VCDU following the ASM (`cadu_len - 4`).
    #[must_use]
    pub fn codeblock_len(&self) -> usize {
        self.cadu_len - 4
    }
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self::meteor_m_n2()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn meteor_defaults() {
        let config = FramingConfig::meteor_m_n2();
        assert_eq!(config.cadu_len, 1024);
        assert_eq!(config.codeblock_len(), 1020);
        assert_eq!(config.asm, ASM);
        assert!(config.derandomize);
        assert_eq!(config.rs_interleave, 4);
        assert_eq!(config.rs_virtual_fill, 0);
    }

    #[test]
    fn builder_overrides() {
        let config = FramingConfig::builder().rs_interleave(5).build();
        assert_eq!(config.rs_interleave, 5);
        assert_eq!(config.cadu_len, 1024);
    }
}

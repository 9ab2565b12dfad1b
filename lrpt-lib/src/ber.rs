//! Bit-error-rate estimation from a Viterbi decoder's soft/hard outputs.
//!
//! This is purely observational: a K=7 convolutional re-encoder is run over
//! the already hard-decided bit stream, and its two parity outputs are
//! compared against the sign of the corresponding soft samples. Disagreement
//! counts over a rolling window produce a periodic error-rate metric. Nothing
//! here feeds back into framing, derandomization, or RS correction.

/// Constraint length of the re-encoding shift register.
const CONSTRAINT_LEN: u32 = 7;
/// Mask covering the `CONSTRAINT_LEN` most recently shifted-in bits.
const REG_MASK: u8 = (1 << CONSTRAINT_LEN) - 1;

/// Configuration for a [`BerEstimator`].
#[derive(Debug, Clone, Copy)]
pub struct BerEstimatorConfig {
    /// Number of soft samples accumulated before an estimate is emitted.
    pub window: u32,
    /// First re-encoder polynomial, K=7 taps in the low 7 bits. A negative
    /// value signals the corresponding parity output should be inverted.
    pub g0: i16,
    /// Second re-encoder polynomial, same convention as `g0`.
    pub g1: i16,
    /// Multiplier applied to the raw error ratio, e.g. `100.0` for a percentage.
    pub scale: f64,
    /// Soft samples with `|s| <= erasure_eps` are excluded from both the
    /// numerator and denominator of the error ratio.
    pub erasure_eps: Option<f32>,
    /// Value reported by [`BerEstimator::current`] before the first window
    /// has completed.
    pub sentinel: f64,
}

impl Default for BerEstimatorConfig {
    /// NASA standard K=7 rate-1/2 polynomials (0o171, 0o133), a 100x
    /// percentage scale, no erasure handling, and a sentinel of `10.0`.
    fn default() -> Self {
        Self {
            window: 8192,
            g0: 0o171,
            g1: 0o133,
            scale: 100.0,
            erasure_eps: None,
            sentinel: 10.0,
        }
    }
}

/// Windowed convolutional-code bit error rate estimator.
///
/// Feed it one decoded hard bit and its two associated soft samples (the
/// samples the Viterbi decoder consumed to produce that bit) at a time via
/// [`update`](Self::update). [`current`](Self::current) returns the most
/// recently completed window's estimate, or the configured sentinel if no
/// window has completed yet.
pub struct BerEstimator {
    config: BerEstimatorConfig,
    shift_reg: u8,
    errors: u32,
    total: u32,
    current: f64,
}

impl BerEstimator {
    #[must_use]
    pub fn new(config: BerEstimatorConfig) -> Self {
        let current = config.sentinel;
        Self {
            config,
            shift_reg: 0,
            errors: 0,
            total: 0,
            current,
        }
    }

    /// Most recently completed window's `(errors/total) * scale`, or the
    /// configured sentinel if no window has completed yet.
    #[must_use]
    pub fn current(&self) -> f64 {
        self.current
    }

    /// Feed one decoded bit and its two associated soft samples.
    ///
    /// Returns `Some(ber)` when this sample completes a window (the same
    /// value subsequently returned by [`current`](Self::current)), `None`
    /// otherwise.
    pub fn update(&mut self, hard_bit: u8, soft0: f32, soft1: f32) -> Option<f64> {
        self.shift_reg = ((self.shift_reg << 1) | (hard_bit & 1)) & REG_MASK;

        let reencoded0 = self.parity(self.config.g0);
        let reencoded1 = self.parity(self.config.g1);

        self.tally(reencoded0, soft0);
        self.tally(reencoded1, soft1);

        if self.total < self.config.window {
            return None;
        }

        self.current = (f64::from(self.errors) / f64::from(self.total)) * self.config.scale;
        self.errors = 0;
        self.total = 0;
        Some(self.current)
    }

    fn parity(&self, g: i16) -> u8 {
        let taps = g.unsigned_abs() as u8 & REG_MASK;
        let bit = (self.shift_reg & taps).count_ones() % 2 == 1;
        let bit = bit ^ (g < 0);
        u8::from(bit)
    }

    fn tally(&mut self, reencoded: u8, soft: f32) {
        if let Some(eps) = self.config.erasure_eps {
            if soft.abs() <= eps {
                return;
            }
        }
        let decided = u8::from(soft >= 0.0);
        if decided != reencoded {
            self.errors += 1;
        }
        self.total += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_before_first_window() {
        let est = BerEstimator::new(BerEstimatorConfig {
            window: 4,
            ..Default::default()
        });
        assert_eq!(est.current(), 10.0);
    }

    #[test]
    fn perfect_agreement_yields_zero_ber() {
        let mut est = BerEstimator::new(BerEstimatorConfig {
            window: 4,
            ..Default::default()
        });
        let mut last = None;
        for _ in 0..2 {
            let p0 = est.parity(est.config.g0);
            let p1 = est.parity(est.config.g1);
            let soft0 = if p0 == 1 { 1.0 } else { -1.0 };
            let soft1 = if p1 == 1 { 1.0 } else { -1.0 };
            last = est.update(0, soft0, soft1);
        }
        assert_eq!(last, Some(0.0));
    }

    #[test]
    fn total_disagreement_yields_full_scale_ber() {
        let mut est = BerEstimator::new(BerEstimatorConfig {
            window: 4,
            ..Default::default()
        });
        let mut last = None;
        for _ in 0..2 {
            let p0 = est.parity(est.config.g0);
            let p1 = est.parity(est.config.g1);
            let soft0 = if p0 == 1 { -1.0 } else { 1.0 };
            let soft1 = if p1 == 1 { -1.0 } else { 1.0 };
            last = est.update(0, soft0, soft1);
        }
        assert_eq!(last, Some(100.0));
    }

    #[test]
    fn erased_samples_are_excluded() {
        let mut est = BerEstimator::new(BerEstimatorConfig {
            window: 2,
            erasure_eps: Some(0.1),
            ..Default::default()
        });
        // Both samples near zero: erased, window never completes despite
        // many updates.
        for _ in 0..10 {
            assert_eq!(est.update(0, 0.01, -0.01), None);
        }
    }
}

//! Peaking (bell) filter and gain stage used by prime tones.
//!
//! Coefficients follow the RBJ audio-EQ cookbook bell filter; processing is
//! transposed direct form II.

use num_complex::Complex;
use std::f32::consts::PI;

/// Highest usable centre frequency as a fraction of the sample rate
const NYQUIST_GUARD: f32 = 0.45;

/// Identifier of a filter inserted into the signal graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FilterId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq)]
struct BiquadCoeffs {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl BiquadCoeffs {
    fn bell(freq: f32, q: f32, gain_db: f32, sample_rate: f32) -> Self {
        let a = 10f32.powf(gain_db / 40.0);
        let w0 = 2.0 * PI * freq / sample_rate;
        let (sin_w0, cos_w0) = w0.sin_cos();
        let alpha = sin_w0 / (2.0 * q);

        let a0 = 1.0 + alpha / a;
        Self {
            b0: (1.0 + alpha * a) / a0,
            b1: (-2.0 * cos_w0) / a0,
            b2: (1.0 - alpha * a) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha / a) / a0,
        }
    }
}

/// A narrow boost (or cut) around a centre frequency
#[derive(Debug, Clone)]
pub struct PeakingFilter {
    center_hz: f32,
    effective_hz: f32,
    q: f32,
    gain_db: f32,
    sample_rate: u32,
    coeffs: BiquadCoeffs,
    z1: f32,
    z2: f32,
}

impl PeakingFilter {
    /// Create a bell filter. Centre frequencies above the usable band are
    /// pulled down below Nyquist; [`center_hz`](Self::center_hz) still
    /// reports the requested value.
    pub fn new(center_hz: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        let sr = sample_rate.max(1) as f32;
        let ceiling = (sr * NYQUIST_GUARD).max(1.0);
        let effective_hz = if center_hz.is_finite() {
            center_hz.clamp(1.0, ceiling)
        } else {
            ceiling
        };
        let q = q.max(0.01);
        Self {
            center_hz,
            effective_hz,
            q,
            gain_db,
            sample_rate,
            coeffs: BiquadCoeffs::bell(effective_hz, q, gain_db, sr),
            z1: 0.0,
            z2: 0.0,
        }
    }

    /// Requested centre frequency
    pub fn center_hz(&self) -> f32 {
        self.center_hz
    }

    /// Centre frequency the coefficients were computed for
    pub fn effective_hz(&self) -> f32 {
        self.effective_hz
    }

    /// Quality factor
    pub fn q(&self) -> f32 {
        self.q
    }

    /// Gain at the centre frequency in dB
    pub fn gain_db(&self) -> f32 {
        self.gain_db
    }

    /// Process one sample
    #[inline]
    pub fn process(&mut self, x: f32) -> f32 {
        let c = &self.coeffs;
        let y = c.b0 * x + self.z1;
        self.z1 = c.b1 * x - c.a1 * y + self.z2;
        self.z2 = c.b2 * x - c.a2 * y;
        y
    }

    /// Process a block in place
    pub fn process_block(&mut self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample = self.process(*sample);
        }
    }

    /// Clear the filter memory
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Linear magnitude response at `freq_hz`
    pub fn magnitude_at(&self, freq_hz: f32) -> f32 {
        let c = &self.coeffs;
        let w = 2.0 * PI * freq_hz / self.sample_rate.max(1) as f32;
        let z1 = Complex::from_polar(1.0, -w);
        let z2 = Complex::from_polar(1.0, -2.0 * w);
        let num = Complex::new(c.b0, 0.0) + z1 * c.b1 + z2 * c.b2;
        let den = Complex::new(1.0, 0.0) + z1 * c.a1 + z2 * c.a2;
        (num / den).norm()
    }
}

/// Shared output gain applied after the filter chain
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GainStage {
    gain: f32,
}

impl Default for GainStage {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl GainStage {
    /// Create a gain stage with a linear gain
    pub fn new(gain: f32) -> Self {
        Self {
            gain: sanitize_gain(gain),
        }
    }

    /// Current linear gain
    pub fn gain(&self) -> f32 {
        self.gain
    }

    /// Set the linear gain
    pub fn set_gain(&mut self, gain: f32) {
        self.gain = sanitize_gain(gain);
    }

    /// Apply to a block in place
    pub fn process_block(&self, block: &mut [f32]) {
        for sample in block.iter_mut() {
            *sample *= self.gain;
        }
    }
}

fn sanitize_gain(gain: f32) -> f32 {
    if gain.is_finite() {
        gain.max(0.0)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bell_boosts_at_center() {
        let filter = PeakingFilter::new(1100.0, 30.0, 12.0, 48000);
        let at_center = filter.magnitude_at(1100.0);
        // +12 dB is ~3.98x
        assert!((at_center - 3.98).abs() < 0.1, "gain was {}", at_center);
    }

    #[test]
    fn test_bell_is_narrow() {
        let filter = PeakingFilter::new(1100.0, 30.0, 12.0, 48000);
        let far = filter.magnitude_at(2200.0);
        assert!((far - 1.0).abs() < 0.05, "off-centre gain was {}", far);
    }

    #[test]
    fn test_center_above_nyquist_is_clamped() {
        let filter = PeakingFilter::new(49_900.0, 30.0, 12.0, 44100);
        assert_eq!(filter.center_hz(), 49_900.0);
        assert!(filter.effective_hz() < 22_050.0);
        assert!(filter.magnitude_at(1000.0).is_finite());
    }

    #[test]
    fn test_tiny_sample_rates_do_not_panic() {
        for sample_rate in [0, 1, 2, 3] {
            let mut filter = PeakingFilter::new(200.0, 30.0, 12.0, sample_rate);
            assert!(filter.effective_hz() >= 1.0);
            assert!(filter.process(0.5).is_finite());
        }
    }

    #[test]
    fn test_process_is_stable() {
        let mut filter = PeakingFilter::new(500.0, 30.0, 12.0, 44100);
        let mut block: Vec<f32> = (0..4096)
            .map(|i| (2.0 * PI * 500.0 * i as f32 / 44100.0).sin())
            .collect();
        filter.process_block(&mut block);
        assert!(block.iter().all(|s| s.is_finite() && s.abs() < 10.0));
    }

    #[test]
    fn test_gain_stage_sanitizes() {
        let mut gain = GainStage::new(f32::NAN);
        assert_eq!(gain.gain(), 1.0);
        gain.set_gain(-2.0);
        assert_eq!(gain.gain(), 0.0);
    }
}

//! Frequency band reduction.
//!
//! Pure functions from raw analyser bytes to normalised values in `[0, 1]`.

use serde::{Deserialize, Serialize};

use super::sample::AudioSample;

/// Split `sample` into `band_count` equal-width bands and average each one.
///
/// The band width is `len / band_count` (integer division); bins past
/// `band_count * width` do not contribute to any band. Every value is the
/// mean byte divided by 255.
pub fn reduce_to_bands(sample: &[u8], band_count: usize) -> Vec<f32> {
    if band_count == 0 {
        return Vec::new();
    }
    let width = sample.len() / band_count;
    if width == 0 {
        return vec![0.0; band_count];
    }

    sample
        .chunks_exact(width)
        .take(band_count)
        .map(mean_normalised)
        .collect()
}

/// Mean of `sample[start..end]` divided by 255.
///
/// `end` is exclusive and clamped to the sample length; an empty range
/// yields 0.
pub fn average_volume(sample: &[u8], start: usize, end: usize) -> f32 {
    let end = end.min(sample.len());
    if start >= end {
        return 0.0;
    }
    mean_normalised(&sample[start..end])
}

/// Overall loudness across every bin
pub fn overall_level(sample: &[u8]) -> f32 {
    average_volume(sample, 0, sample.len())
}

/// Whether no bin carries any energy
pub fn is_silent(sample: &[u8]) -> bool {
    sample.iter().all(|&b| b == 0)
}

fn mean_normalised(bins: &[u8]) -> f32 {
    if bins.is_empty() {
        return 0.0;
    }
    let sum: u32 = bins.iter().map(|&b| b as u32).sum();
    sum as f32 / bins.len() as f32 / 255.0
}

/// A named bin range and its latest averaged magnitude
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    /// Display name (e.g. "low")
    pub name: String,
    /// First bin (inclusive)
    pub start_bin: usize,
    /// Last bin (exclusive)
    pub end_bin: usize,
    /// Normalised magnitude from the most recent [`measure`](Self::measure)
    pub average_magnitude: f32,
}

impl FrequencyBand {
    /// Create a band over `start_bin..end_bin`
    pub fn new(name: impl Into<String>, start_bin: usize, end_bin: usize) -> Self {
        Self {
            name: name.into(),
            start_bin,
            end_bin,
            average_magnitude: 0.0,
        }
    }

    /// Low/mid/high thirds of a spectrum with `bin_count` bins
    pub fn low_mid_high(bin_count: usize) -> [FrequencyBand; 3] {
        let third = bin_count / 3;
        [
            FrequencyBand::new("low", 0, third),
            FrequencyBand::new("mid", third, third * 2),
            FrequencyBand::new("high", third * 2, bin_count),
        ]
    }

    /// Recompute the magnitude from `sample`
    pub fn measure(&mut self, sample: &AudioSample) -> f32 {
        self.average_magnitude = average_volume(sample, self.start_bin, self.end_bin);
        self.average_magnitude
    }
}

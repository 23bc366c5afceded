//! Analyser - FFT-based frequency snapshots
//!
//! Keeps the most recent `fft_size` time-domain samples that flowed through
//! the graph and produces frequency-domain snapshots on demand, quantised to
//! bytes the same way a browser analyser node does: Blackman window, temporal
//! smoothing, decibel conversion, then a linear map of
//! `[min_decibels, max_decibels]` onto `0..=255`.

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, trace};

use super::sample::AudioSample;

/// Smallest FFT size accepted by the analyser
pub const MIN_FFT_SIZE: usize = 32;
/// Largest FFT size accepted by the analyser
pub const MAX_FFT_SIZE: usize = 32768;

/// Configuration for an [`Analyser`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyserConfig {
    /// FFT size (power of 2). The bin count is half of this.
    pub fft_size: usize,
    /// Blend factor with the previous snapshot (0.0 = none, 1.0 = frozen)
    pub smoothing_time_constant: f32,
    /// Magnitude mapped to byte 0
    pub min_decibels: f32,
    /// Magnitude mapped to byte 255
    pub max_decibels: f32,
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl AnalyserConfig {
    /// Number of frequency bins this configuration produces
    pub fn frequency_bin_count(&self) -> usize {
        self.fft_size / 2
    }

    /// Check the values a real analyser would reject
    pub fn validate(&self) -> Result<(), String> {
        if !self.fft_size.is_power_of_two()
            || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&self.fft_size)
        {
            return Err(format!(
                "fft_size must be a power of two in {}..={}, got {}",
                MIN_FFT_SIZE, MAX_FFT_SIZE, self.fft_size
            ));
        }
        if !(0.0..=1.0).contains(&self.smoothing_time_constant) {
            return Err(format!(
                "smoothing_time_constant must be within 0.0..=1.0, got {}",
                self.smoothing_time_constant
            ));
        }
        if self.min_decibels >= self.max_decibels {
            return Err(format!(
                "min_decibels ({}) must be below max_decibels ({})",
                self.min_decibels, self.max_decibels
            ));
        }
        Ok(())
    }
}

/// Frequency analyser over the signal that passes through the graph
pub struct Analyser {
    /// FFT instance
    fft: Arc<dyn Fft<f32>>,

    /// Configuration
    config: AnalyserConfig,

    /// Time-domain ring buffer
    time_buffer: Vec<f32>,

    /// Next write position in the ring buffer
    write_pos: usize,

    /// FFT complex buffer
    fft_buffer: Vec<Complex<f32>>,

    /// FFT scratch buffer
    scratch_buffer: Vec<Complex<f32>>,

    /// Blackman window coefficients
    window: Vec<f32>,

    /// Smoothed linear magnitudes, one per bin
    smoothed: Vec<f32>,

    /// Debug: snapshots taken
    snapshot_count: u64,
}

impl Analyser {
    /// Create a new analyser. An out-of-range FFT size is coerced to the
    /// nearest accepted power of two.
    pub fn new(config: AnalyserConfig) -> Self {
        let fft_size = config
            .fft_size
            .clamp(MIN_FFT_SIZE, MAX_FFT_SIZE)
            .next_power_of_two();
        let config = AnalyserConfig { fft_size, ..config };

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);
        let scratch_len = fft.get_inplace_scratch_len();

        debug!(
            "Analyser created: fft_size={}, bins={}, smoothing={}",
            fft_size,
            fft_size / 2,
            config.smoothing_time_constant
        );

        Self {
            fft,
            time_buffer: vec![0.0; fft_size],
            write_pos: 0,
            fft_buffer: vec![Complex::new(0.0, 0.0); fft_size],
            scratch_buffer: vec![Complex::new(0.0, 0.0); scratch_len],
            window: blackman_window(fft_size),
            smoothed: vec![0.0; fft_size / 2],
            snapshot_count: 0,
            config,
        }
    }

    /// Configuration in effect
    pub fn config(&self) -> &AnalyserConfig {
        &self.config
    }

    /// FFT size
    pub fn fft_size(&self) -> usize {
        self.config.fft_size
    }

    /// Number of bins in every snapshot
    pub fn frequency_bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Feed time-domain samples. Non-finite values are treated as silence.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let size = self.time_buffer.len();
        for &sample in samples {
            self.time_buffer[self.write_pos] = if sample.is_finite() { sample } else { 0.0 };
            self.write_pos = (self.write_pos + 1) % size;
        }
    }

    /// Write the current byte-quantised spectrum into `out`.
    ///
    /// Only `min(out.len(), bin_count)` bins are written.
    pub fn get_byte_frequency_data(&mut self, out: &mut AudioSample) {
        self.update_spectrum();

        let min_db = self.config.min_decibels;
        let range = self.config.max_decibels - min_db;
        for (byte, &magnitude) in out.bins_mut().iter_mut().zip(self.smoothed.iter()) {
            let db = linear_to_db(magnitude);
            let scaled = 255.0 * (db - min_db) / range;
            *byte = scaled.floor().clamp(0.0, 255.0) as u8;
        }
    }

    /// Write the current spectrum in decibels into `out`
    pub fn get_float_frequency_data(&mut self, out: &mut [f32]) {
        self.update_spectrum();
        for (value, &magnitude) in out.iter_mut().zip(self.smoothed.iter()) {
            *value = linear_to_db(magnitude);
        }
    }

    /// Forget all buffered signal and smoothing history
    pub fn reset(&mut self) {
        self.time_buffer.fill(0.0);
        self.write_pos = 0;
        self.smoothed.fill(0.0);
        self.snapshot_count = 0;
        debug!("Analyser reset");
    }

    /// Window the ring buffer, run the FFT and blend into the smoothed magnitudes
    fn update_spectrum(&mut self) {
        self.snapshot_count += 1;
        let size = self.config.fft_size;

        // Oldest sample sits at the write position
        for i in 0..size {
            let src = (self.write_pos + i) % size;
            self.fft_buffer[i] = Complex::new(self.time_buffer[src] * self.window[i], 0.0);
        }

        self.fft
            .process_with_scratch(&mut self.fft_buffer, &mut self.scratch_buffer);

        let tau = self.config.smoothing_time_constant;
        let norm = 1.0 / size as f32;
        for (k, smoothed) in self.smoothed.iter_mut().enumerate() {
            let magnitude = self.fft_buffer[k].norm() * norm;
            let blended = tau * *smoothed + (1.0 - tau) * magnitude;
            *smoothed = if blended.is_finite() { blended } else { 0.0 };
        }

        if self.snapshot_count % 600 == 0 {
            trace!(
                "Analyser snapshot #{}: first bins={:?}",
                self.snapshot_count,
                &self.smoothed[..self.smoothed.len().min(4)]
            );
        }
    }
}

fn linear_to_db(magnitude: f32) -> f32 {
    20.0 * magnitude.max(1e-12).log10()
}

fn blackman_window(size: usize) -> Vec<f32> {
    const ALPHA: f32 = 0.16;
    let a0 = 0.5 * (1.0 - ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * ALPHA;
    (0..size)
        .map(|i| {
            let t = 2.0 * std::f32::consts::PI * i as f32 / size as f32;
            a0 - a1 * t.cos() + a2 * (2.0 * t).cos()
        })
        .collect()
}

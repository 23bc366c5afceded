//! Byte-quantised frequency snapshot read from the analyser each frame.

use std::ops::Deref;

/// One frame of analyser output: a magnitude byte (0-255) per frequency bin.
///
/// The length is fixed when the sample is created for an analyser and never
/// changes afterwards; reads overwrite the bins in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioSample {
    bins: Vec<u8>,
}

impl AudioSample {
    /// Create an all-silent sample with `bin_count` bins
    pub fn silent(bin_count: usize) -> Self {
        Self {
            bins: vec![0; bin_count],
        }
    }

    /// Wrap existing bin data
    pub fn from_bins(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    /// Number of frequency bins
    pub fn len(&self) -> usize {
        self.bins.len()
    }

    /// Whether the sample has no bins at all
    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    /// Read-only view of the bins
    pub fn bins(&self) -> &[u8] {
        &self.bins
    }

    /// Mutable view for the analyser to overwrite in place
    pub(crate) fn bins_mut(&mut self) -> &mut [u8] {
        &mut self.bins
    }

    /// Zero every bin without changing the length
    pub fn clear(&mut self) {
        self.bins.fill(0);
    }
}

impl Deref for AudioSample {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_sample_length() {
        let sample = AudioSample::silent(128);
        assert_eq!(sample.len(), 128);
        assert!(sample.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_clear_keeps_length() {
        let mut sample = AudioSample::from_bins(vec![255, 10, 3]);
        sample.clear();
        assert_eq!(sample.bins(), &[0, 0, 0]);
    }
}

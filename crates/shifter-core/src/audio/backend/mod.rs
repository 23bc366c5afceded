//! Output platforms that drive the signal graph.
//!
//! A platform supplies the output sample rate and opens a stream that pulls
//! from the [`AudioGraph`]. Streams are created suspended; the graph manager
//! resumes them after the first user gesture.

use tracing::{debug, info};

use super::graph::AudioGraph;
use super::AudioError;

#[cfg(feature = "audio")]
mod cpal_backend;

#[cfg(feature = "audio")]
pub use cpal_backend::CpalPlatform;

/// An open output stream
pub trait OutputStream {
    /// Start (or continue) pulling audio from the graph
    fn resume(&mut self) -> Result<(), AudioError>;

    /// Stop pulling audio without tearing the stream down
    fn suspend(&mut self) -> Result<(), AudioError>;

    /// Whether audio is currently flowing
    fn is_running(&self) -> bool;
}

/// Source of audio contexts
pub trait AudioPlatform {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Sample rate the output will run at
    fn output_sample_rate(&self) -> Result<u32, AudioError>;

    /// Open a suspended output stream that renders `graph`
    fn open_output(&mut self, graph: AudioGraph) -> Result<Box<dyn OutputStream>, AudioError>;
}

/// Platform without audio support; every context creation fails
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPlatform;

impl AudioPlatform for NullPlatform {
    fn name(&self) -> &str {
        "null"
    }

    fn output_sample_rate(&self) -> Result<u32, AudioError> {
        Err(AudioError::PlatformUnavailable(
            "no audio backend compiled in".to_string(),
        ))
    }

    fn open_output(&mut self, _graph: AudioGraph) -> Result<Box<dyn OutputStream>, AudioError> {
        Err(AudioError::PlatformUnavailable(
            "no audio backend compiled in".to_string(),
        ))
    }
}

/// Platform with no device. The graph is advanced explicitly through
/// [`AudioGraph::pump`], which makes it suitable for headless runs and tests.
#[derive(Debug, Clone)]
pub struct OfflinePlatform {
    sample_rate: u32,
}

impl OfflinePlatform {
    /// Create an offline platform running at `sample_rate`
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate: sample_rate.max(1),
        }
    }
}

impl AudioPlatform for OfflinePlatform {
    fn name(&self) -> &str {
        "offline"
    }

    fn output_sample_rate(&self) -> Result<u32, AudioError> {
        Ok(self.sample_rate)
    }

    fn open_output(&mut self, _graph: AudioGraph) -> Result<Box<dyn OutputStream>, AudioError> {
        info!("Offline output opened @ {}Hz", self.sample_rate);
        Ok(Box::new(OfflineStream { running: false }))
    }
}

struct OfflineStream {
    running: bool,
}

impl OutputStream for OfflineStream {
    fn resume(&mut self) -> Result<(), AudioError> {
        self.running = true;
        debug!("Offline stream resumed");
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

/// Default platform for this build: the system output device when the
/// `audio` feature is enabled, otherwise [`NullPlatform`].
pub fn default_platform() -> Box<dyn AudioPlatform> {
    #[cfg(feature = "audio")]
    {
        Box::new(CpalPlatform::new())
    }
    #[cfg(not(feature = "audio"))]
    {
        Box::new(NullPlatform)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AnalyserConfig;

    #[test]
    fn test_null_platform_fails() {
        let mut platform = NullPlatform;
        let graph = AudioGraph::new(44100, AnalyserConfig::default());
        assert!(platform.output_sample_rate().is_err());
        assert!(matches!(
            platform.open_output(graph),
            Err(AudioError::PlatformUnavailable(_))
        ));
    }

    #[test]
    fn test_offline_stream_starts_suspended() {
        let mut platform = OfflinePlatform::new(22050);
        assert_eq!(platform.output_sample_rate().unwrap(), 22050);

        let graph = AudioGraph::new(22050, AnalyserConfig::default());
        let mut stream = platform.open_output(graph).unwrap();
        assert!(!stream.is_running());
        stream.resume().unwrap();
        assert!(stream.is_running());
        stream.suspend().unwrap();
        assert!(!stream.is_running());
    }
}

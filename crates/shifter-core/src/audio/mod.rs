//! Audio analysis.
//!
//! One signal graph per session carries the media source through the prime
//! filters and the gain stage into the analyser that every visualization
//! reads. Band reduction turns raw analyser bytes into the normalised values
//! the render loop consumes.

pub mod analyser;
pub mod backend;
pub mod bands;
pub mod filter;
pub mod graph;
pub mod media;
pub mod sample;

pub use analyser::{Analyser, AnalyserConfig};
pub use backend::{default_platform, AudioPlatform, NullPlatform, OfflinePlatform, OutputStream};
pub use bands::{average_volume, is_silent, overall_level, reduce_to_bands, FrequencyBand};
pub use filter::{FilterId, GainStage, PeakingFilter};
pub use graph::{AudioGraph, AudioGraphManager, AudioHandles, ContextState, UserGesture};
pub use media::{MediaElement, MediaId};
pub use sample::AudioSample;

#[cfg(feature = "audio")]
pub use backend::CpalPlatform;

/// Errors raised while creating or running the audio pipeline.
///
/// These never escape the graph manager: it logs them and reports the
/// analyser as unavailable instead.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// The platform has no audio capability
    #[error("Audio platform unavailable: {0}")]
    PlatformUnavailable(String),

    /// The audio context could not be constructed
    #[error("Failed to create audio context: {0}")]
    ContextCreation(String),

    /// The context refused to start without a user gesture
    #[error("Audio playback blocked until a user gesture")]
    AutoplayBlocked,

    /// The output stream failed
    #[error("Audio stream error: {0}")]
    StreamFailed(String),

    /// The media source could not be opened or decoded
    #[error("Media error: {0}")]
    Media(String),

    /// Generic I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

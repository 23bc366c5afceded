//! Sacred Shifter Core - Audio analysis and reactive rendering
//!
//! This crate contains the audio-reactive pipeline behind the meditation
//! visualizers:
//! - Shared signal graph (source, prime filters, gain, analyser)
//! - Frequency band reduction
//! - Prime tone mapping
//! - Per-frame reactive scene stepping with idle fallback
//! - Deterministic per-journey visual parameters

#![warn(missing_docs)]

pub mod audio;
pub mod config;
pub mod logging;
pub mod primes;
pub mod render;
pub mod session;
pub mod timers;
pub mod visual_params;

// --- Re-exports grouped by category ---

// Audio System
pub use audio::{
    average_volume, default_platform, is_silent, overall_level, reduce_to_bands, Analyser,
    AnalyserConfig, AudioError, AudioGraph, AudioGraphManager, AudioHandles, AudioPlatform,
    AudioSample, ContextState, FilterId, FrequencyBand, MediaElement, MediaId, NullPlatform,
    OfflinePlatform, OutputStream, PeakingFilter, UserGesture,
};

#[cfg(feature = "audio")]
pub use audio::CpalPlatform;

// Primes
pub use primes::{
    first_primes, sieve_primes, PrimeConfig, PrimeFrequencyMapper, PrimeTone, ToggleOutcome,
};

// Rendering
pub use render::{
    step, AudioFrame, FrameClock, FrameInput, LoopHandle, RenderLoop, RenderSettings, SceneKind,
    SceneState,
};

// Sessions & Timers
pub use session::VisualizationSession;
pub use timers::{BreathPhase, BreathingCycle, BreathingPattern, SleepTimer};

// Visual Parameters
pub use visual_params::{
    checksum, derive_params, JsonFileParamStore, MemoryParamStore, ParamOverrides, ParamSource,
    ParamStore, ResolvedParams, StoreError, VisualParamGenerator, VisualParams,
};

// Configuration & Logging
pub use config::{ConfigError, ParamsConfig, ShifterConfig};
pub use logging::LogConfig;

//! Command-line argument parsing.

use clap::Parser;
use shifter_core::{BreathingPattern, SceneKind};
use std::path::PathBuf;

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "shifter")]
#[command(about = "Headless audio-reactive meditation visualizer", long_about = None)]
pub struct Args {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// WAV file to analyse; without it the scene runs its idle animation
    #[arg(long, value_name = "WAV")]
    pub media: Option<PathBuf>,

    /// Loop the media file
    #[arg(long = "loop")]
    pub looping: bool,

    /// Journey key whose visual parameters are resolved
    #[arg(long, value_name = "KEY", default_value = "default-journey")]
    pub journey: String,

    /// Scene: orb, pulse-bars, particles or spiral
    #[arg(long, value_name = "SCENE")]
    pub scene: Option<SceneKind>,

    /// Frames to run before exiting
    #[arg(long, value_name = "N", default_value_t = 600)]
    pub frames: u64,

    /// Prime tones to select (repeatable)
    #[arg(long = "prime", value_name = "P")]
    pub primes: Vec<u32>,

    /// Breathing guide: box, relaxing or coherent
    #[arg(long, value_name = "PATTERN")]
    pub breathing: Option<String>,

    /// End the session after this many seconds
    #[arg(long, value_name = "SECONDS")]
    pub sleep: Option<f32>,

    /// Drive the audio graph from the frame loop instead of a sound device
    #[arg(long)]
    pub offline: bool,

    /// Print output devices and exit
    #[arg(long)]
    pub list_devices: bool,
}

impl Args {
    /// Breathing pattern named on the command line
    pub fn breathing_pattern(&self) -> Option<BreathingPattern> {
        let name = self.breathing.as_deref()?;
        match name.to_lowercase().as_str() {
            "box" => Some(BreathingPattern::BOX),
            "relaxing" | "4-7-8" => Some(BreathingPattern::RELAXING),
            "coherent" => Some(BreathingPattern::COHERENT),
            other => {
                tracing::warn!("Unknown breathing pattern '{}', ignoring", other);
                None
            }
        }
    }
}

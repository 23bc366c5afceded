//! Scene states and the pure per-frame step

use serde::{Deserialize, Serialize};
use std::f32::consts::TAU;
use std::fmt;

use super::{unit, RenderSettings};
use crate::audio::{is_silent, overall_level, reduce_to_bands, AudioSample};

/// Golden angle in radians, used to spread particles evenly
const GOLDEN_ANGLE: f32 = 2.399_963;

/// Phase offset (in cycles) between neighbouring bands while idle
const IDLE_BAND_PHASE: f32 = 0.15;

/// Available visualization modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SceneKind {
    /// A single pulsing, rotating sphere
    Orb,
    /// One vertical bar per band
    PulseBars,
    /// Particles orbiting the centre
    ParticleField,
    /// Rotating spiral tunnel
    Spiral,
}

impl SceneKind {
    /// All scene kinds
    pub const ALL: [SceneKind; 4] = [
        SceneKind::Orb,
        SceneKind::PulseBars,
        SceneKind::ParticleField,
        SceneKind::Spiral,
    ];

    /// Stable name used in config and on the command line
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneKind::Orb => "orb",
            SceneKind::PulseBars => "pulse-bars",
            SceneKind::ParticleField => "particles",
            SceneKind::Spiral => "spiral",
        }
    }
}

impl std::str::FromStr for SceneKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orb" => Ok(SceneKind::Orb),
            "pulse-bars" | "bars" => Ok(SceneKind::PulseBars),
            "particles" | "particle-field" => Ok(SceneKind::ParticleField),
            "spiral" => Ok(SceneKind::Spiral),
            other => Err(format!("unknown scene '{}'", other)),
        }
    }
}

/// This frame's audio, already reduced
#[derive(Debug, Clone, PartialEq)]
pub enum AudioFrame {
    /// Audio energy is present
    Live {
        /// Normalised band values
        bands: Vec<f32>,
        /// Overall loudness
        level: f32,
    },
    /// No analyser, or the analyser reads silence
    Idle,
}

impl AudioFrame {
    /// Reduce a raw analyser sample; silence becomes [`AudioFrame::Idle`]
    pub fn from_sample(sample: &AudioSample, band_count: usize) -> Self {
        if is_silent(sample) {
            return AudioFrame::Idle;
        }
        AudioFrame::Live {
            bands: reduce_to_bands(sample, band_count),
            level: overall_level(sample),
        }
    }

    /// Whether the frame carries audio
    pub fn is_live(&self) -> bool {
        matches!(self, AudioFrame::Live { .. })
    }
}

/// Everything one step needs besides the previous state and `dt`
#[derive(Debug, Clone, Copy)]
pub struct FrameInput<'a> {
    /// Reduced audio for this frame
    pub audio: &'a AudioFrame,
    /// Mapping constants
    pub settings: &'a RenderSettings,
}

/// Orb scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrbState {
    /// Seconds since the scene started
    pub elapsed: f32,
    /// Displayed (smoothed) level
    pub level: f32,
    /// Sphere scale
    pub scale: f32,
    /// Colour hue in degrees
    pub hue: f32,
    /// Rotation in radians, wrapped to one turn
    pub rotation: f32,
    /// Glow intensity (0-1)
    pub emissive: f32,
}

/// A single bar
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Height as a fraction of the available space
    pub height: f32,
    /// Colour hue in degrees
    pub hue: f32,
}

/// Pulse-bar scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulseBarsState {
    /// Seconds since the scene started
    pub elapsed: f32,
    /// One bar per band
    pub bars: Vec<Bar>,
}

/// One particle, in polar coordinates around the centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    /// Angle in radians
    pub angle: f32,
    /// Distance from the centre (scaled)
    pub radius: f32,
    /// Resting distance before scaling
    pub home_radius: f32,
    /// Colour hue in degrees
    pub hue: f32,
}

/// Particle-field scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleFieldState {
    /// Seconds since the scene started
    pub elapsed: f32,
    /// Displayed (smoothed) level
    pub level: f32,
    /// Field scale
    pub scale: f32,
    /// Particles
    pub particles: Vec<Particle>,
}

/// Spiral scene
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpiralState {
    /// Seconds since the scene started
    pub elapsed: f32,
    /// Displayed (smoothed) level
    pub level: f32,
    /// Arm rotation in radians
    pub rotation: f32,
    /// Tunnel depth offset in `[0, 1)`
    pub depth: f32,
    /// Spiral scale
    pub scale: f32,
    /// Colour hue in degrees
    pub hue: f32,
}

/// State of whichever scene is showing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SceneState {
    /// See [`OrbState`]
    Orb(OrbState),
    /// See [`PulseBarsState`]
    PulseBars(PulseBarsState),
    /// See [`ParticleFieldState`]
    ParticleField(ParticleFieldState),
    /// See [`SpiralState`]
    Spiral(SpiralState),
}

impl SceneState {
    /// Resting state for a scene
    pub fn new(kind: SceneKind, settings: &RenderSettings) -> Self {
        let scale = settings.scale_for(0.0);
        let hue = settings.hue_for(0.0);
        match kind {
            SceneKind::Orb => SceneState::Orb(OrbState {
                elapsed: 0.0,
                level: 0.0,
                scale,
                hue,
                rotation: 0.0,
                emissive: 0.0,
            }),
            SceneKind::PulseBars => SceneState::PulseBars(PulseBarsState {
                elapsed: 0.0,
                bars: vec![Bar { height: 0.0, hue }; settings.band_count.max(1)],
            }),
            SceneKind::ParticleField => {
                let count = settings.particle_count.max(1);
                let particles = (0..count)
                    .map(|i| {
                        let home_radius = 0.2 + 0.8 * (i as f32 + 0.5) / count as f32;
                        Particle {
                            angle: (i as f32 * GOLDEN_ANGLE).rem_euclid(TAU),
                            radius: home_radius * scale,
                            home_radius,
                            hue,
                        }
                    })
                    .collect();
                SceneState::ParticleField(ParticleFieldState {
                    elapsed: 0.0,
                    level: 0.0,
                    scale,
                    particles,
                })
            }
            SceneKind::Spiral => SceneState::Spiral(SpiralState {
                elapsed: 0.0,
                level: 0.0,
                rotation: 0.0,
                depth: 0.0,
                scale,
                hue,
            }),
        }
    }

    /// Which scene this is
    pub fn kind(&self) -> SceneKind {
        match self {
            SceneState::Orb(_) => SceneKind::Orb,
            SceneState::PulseBars(_) => SceneKind::PulseBars,
            SceneState::ParticleField(_) => SceneKind::ParticleField,
            SceneState::Spiral(_) => SceneKind::Spiral,
        }
    }

    /// Seconds the scene has been running
    pub fn elapsed(&self) -> f32 {
        match self {
            SceneState::Orb(s) => s.elapsed,
            SceneState::PulseBars(s) => s.elapsed,
            SceneState::ParticleField(s) => s.elapsed,
            SceneState::Spiral(s) => s.elapsed,
        }
    }

    /// The scene's headline size value. For bars this is the mean height.
    pub fn primary_scale(&self) -> f32 {
        match self {
            SceneState::Orb(s) => s.scale,
            SceneState::PulseBars(s) => {
                if s.bars.is_empty() {
                    0.0
                } else {
                    s.bars.iter().map(|b| b.height).sum::<f32>() / s.bars.len() as f32
                }
            }
            SceneState::ParticleField(s) => s.scale,
            SceneState::Spiral(s) => s.scale,
        }
    }

    /// The scene's headline hue. For bars this is the first bar's hue.
    pub fn primary_hue(&self) -> f32 {
        match self {
            SceneState::Orb(s) => s.hue,
            SceneState::PulseBars(s) => s.bars.first().map(|b| b.hue).unwrap_or(0.0),
            SceneState::ParticleField(s) => s.particles.first().map(|p| p.hue).unwrap_or(0.0),
            SceneState::Spiral(s) => s.hue,
        }
    }
}

impl fmt::Display for SceneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} t={:.2}s scale={:.3} hue={:.1}",
            self.kind().as_str(),
            self.elapsed(),
            self.primary_scale(),
            self.primary_hue()
        )
    }
}

/// Advance a scene by `dt` seconds.
///
/// Pure: the previous state is not modified. Silent or missing audio drives
/// the scene from a time-based idle pulse so it never freezes. Every output
/// stays within the bounds set by `settings`.
pub fn step(state: &SceneState, input: &FrameInput<'_>, dt: f32) -> SceneState {
    let settings = input.settings;
    let dt = if dt.is_finite() {
        dt.clamp(0.0, settings.max_frame_dt_secs.max(0.0))
    } else {
        0.0
    };
    let elapsed = state.elapsed() + dt;
    let follow = 1.0 - (-dt * settings.response_rate.max(0.0)).exp();

    let (level_target, bands) = targets(input.audio, settings, elapsed);
    let band_at = |i: usize| bands.get(i).copied().unwrap_or(level_target);

    match state {
        SceneState::Orb(prev) => {
            let level = approach(prev.level, level_target, follow);
            SceneState::Orb(OrbState {
                elapsed,
                level,
                scale: settings.scale_for(level),
                hue: settings.hue_for(level),
                rotation: (prev.rotation + dt * (0.4 + level * 1.6)).rem_euclid(TAU),
                emissive: (0.2 + 0.8 * level).clamp(0.0, 1.0),
            })
        }
        SceneState::PulseBars(prev) => {
            let bars = prev
                .bars
                .iter()
                .enumerate()
                .map(|(i, bar)| {
                    let v = band_at(i);
                    Bar {
                        height: approach(bar.height, v, follow).clamp(0.0, 1.0),
                        hue: settings.hue_for(v),
                    }
                })
                .collect();
            SceneState::PulseBars(PulseBarsState { elapsed, bars })
        }
        SceneState::ParticleField(prev) => {
            let level = approach(prev.level, level_target, follow);
            let scale = settings.scale_for(level);
            let particles = prev
                .particles
                .iter()
                .enumerate()
                .map(|(i, p)| {
                    let v = band_at(i % bands.len().max(1));
                    let speed = 0.3 * (1.0 + (i % 3) as f32 * 0.2) + v * 1.5;
                    Particle {
                        angle: (p.angle + dt * speed).rem_euclid(TAU),
                        radius: p.home_radius * scale,
                        home_radius: p.home_radius,
                        hue: settings.hue_for(v),
                    }
                })
                .collect();
            SceneState::ParticleField(ParticleFieldState {
                elapsed,
                level,
                scale,
                particles,
            })
        }
        SceneState::Spiral(prev) => {
            let level = approach(prev.level, level_target, follow);
            let bass = band_at(0);
            SceneState::Spiral(SpiralState {
                elapsed,
                level,
                rotation: (prev.rotation + dt * (0.9 + level * 2.4)).rem_euclid(TAU),
                depth: (prev.depth + dt * (1.2 + bass * 4.8)).rem_euclid(1.0),
                scale: settings.scale_for(level),
                hue: (settings.hue_for(level) + elapsed * 20.0).rem_euclid(360.0),
            })
        }
    }
}

/// Overall level and per-band values to steer towards this frame
fn targets(audio: &AudioFrame, settings: &RenderSettings, elapsed: f32) -> (f32, Vec<f32>) {
    match audio {
        AudioFrame::Live { bands, level } => {
            (unit(*level), bands.iter().map(|&v| unit(v)).collect())
        }
        AudioFrame::Idle => {
            let count = settings.band_count.max(1);
            let bands = (0..count)
                .map(|i| settings.idle_level(elapsed, i as f32 * IDLE_BAND_PHASE))
                .collect();
            (settings.idle_level(elapsed, 0.0), bands)
        }
    }
}

fn approach(current: f32, target: f32, follow: f32) -> f32 {
    let current = if current.is_finite() { current } else { 0.0 };
    unit(current + (target - current) * follow.clamp(0.0, 1.0))
}

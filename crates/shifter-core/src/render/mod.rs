//! Audio-reactive rendering.
//!
//! The scene transformation is a pure function ([`step`]) from the previous
//! scene state, this frame's audio and the elapsed time to the next state.
//! [`RenderLoop`] is the thin scheduling shim that feeds it once per frame.

mod render_loop;
mod scene;

pub use render_loop::{FrameClock, LoopHandle, RenderLoop};
pub use scene::{
    step, AudioFrame, Bar, FrameInput, OrbState, Particle, ParticleFieldState, PulseBarsState,
    SceneKind, SceneState, SpiralState,
};

use serde::{Deserialize, Serialize};

/// Visual mapping and pacing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Scene shown at start
    pub scene: SceneKind,
    /// Bands the analyser output is reduced to each frame
    pub band_count: usize,
    /// Scale with no audio energy
    pub base_scale: f32,
    /// Extra scale at full energy
    pub amplitude: f32,
    /// Lower scale bound
    pub min_scale: f32,
    /// Upper scale bound
    pub max_scale: f32,
    /// Hue (degrees) with no audio energy
    pub base_hue: f32,
    /// Hue shift (degrees) at full energy
    pub hue_range: f32,
    /// Period of the idle pulse in seconds
    pub idle_period_secs: f32,
    /// Peak level of the idle pulse (0-1)
    pub idle_amplitude: f32,
    /// How fast displayed levels follow the audio, per second
    pub response_rate: f32,
    /// Frame deltas longer than this are clamped (seconds)
    pub max_frame_dt_secs: f32,
    /// Particles in the particle field
    pub particle_count: usize,
    /// Frame rate the driver aims for
    pub target_fps: f32,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            scene: SceneKind::Orb,
            band_count: 4,
            base_scale: 1.0,
            amplitude: 0.8,
            min_scale: 0.5,
            max_scale: 2.5,
            base_hue: 260.0,
            hue_range: 120.0,
            idle_period_secs: 4.0,
            idle_amplitude: 0.35,
            response_rate: 12.0,
            max_frame_dt_secs: 0.1,
            particle_count: 64,
            target_fps: 60.0,
        }
    }
}

impl RenderSettings {
    /// `base_scale + v * amplitude`, bounded
    pub fn scale_for(&self, value: f32) -> f32 {
        (self.base_scale + unit(value) * self.amplitude).clamp(self.min_scale, self.max_scale)
    }

    /// `base_hue + v * hue_range`, wrapped into `[0, 360)`
    pub fn hue_for(&self, value: f32) -> f32 {
        (self.base_hue + unit(value) * self.hue_range).rem_euclid(360.0)
    }

    /// Idle pulse level at `elapsed` seconds; `phase` offsets it in cycles
    pub fn idle_level(&self, elapsed: f32, phase: f32) -> f32 {
        let period = self.idle_period_secs.max(0.01);
        let angle = std::f32::consts::TAU * (elapsed / period + phase);
        unit(self.idle_amplitude) * (0.5 + 0.5 * angle.sin())
    }

    /// Check for values that would produce runaway visuals
    pub fn validate(&self) -> Result<(), String> {
        if self.band_count == 0 {
            return Err("render.band_count must be at least 1".to_string());
        }
        if !(self.min_scale.is_finite() && self.max_scale.is_finite())
            || self.min_scale > self.max_scale
        {
            return Err(format!(
                "render.min_scale ({}) must not exceed render.max_scale ({})",
                self.min_scale, self.max_scale
            ));
        }
        if !(self.idle_period_secs.is_finite() && self.idle_period_secs > 0.0) {
            return Err("render.idle_period_secs must be positive".to_string());
        }
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err("render.target_fps must be positive".to_string());
        }
        if !(self.max_frame_dt_secs.is_finite() && self.max_frame_dt_secs > 0.0) {
            return Err("render.max_frame_dt_secs must be positive".to_string());
        }
        Ok(())
    }
}

/// Clamp into `[0, 1]`, mapping non-finite input to 0
pub(crate) fn unit(value: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

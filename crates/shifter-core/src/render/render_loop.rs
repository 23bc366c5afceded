//! Frame scheduling around the pure scene step.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use super::scene::{step, AudioFrame, FrameInput, SceneKind, SceneState};
use super::RenderSettings;
use crate::audio::{AudioGraph, AudioSample};

/// Cancels a [`RenderLoop`]. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle {
    cancelled: Arc<AtomicBool>,
}

impl LoopHandle {
    /// Stop the loop; later ticks do nothing
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Whether [`cancel`](Self::cancel) has been called
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Per-frame driver for one scene.
///
/// Each [`tick`](Self::tick) reads the analyser, reduces the sample to bands
/// and replaces the scene with the next state. While hidden no time
/// accumulates, so resuming does not jump ahead.
pub struct RenderLoop {
    settings: RenderSettings,
    scene: SceneState,
    audio: Option<AudioGraph>,
    sample: AudioSample,
    handle: LoopHandle,
    visible: bool,
    last_tick: Option<Duration>,
    frame_count: u64,
}

impl RenderLoop {
    /// Create a loop showing `settings.scene`, reading from `audio` if present
    pub fn new(settings: RenderSettings, audio: Option<AudioGraph>) -> Self {
        let scene = SceneState::new(settings.scene, &settings);
        let sample = audio
            .as_ref()
            .map(|g| g.new_sample())
            .unwrap_or_else(|| AudioSample::silent(0));
        debug!(
            "Render loop created: scene={}, audio={}",
            settings.scene.as_str(),
            audio.is_some()
        );
        Self {
            settings,
            scene,
            audio,
            sample,
            handle: LoopHandle::default(),
            visible: true,
            last_tick: None,
            frame_count: 0,
        }
    }

    /// Handle that cancels this loop
    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    /// Whether the loop has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_cancelled()
    }

    /// Current scene state
    pub fn scene(&self) -> &SceneState {
        &self.scene
    }

    /// Settings in use
    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    /// Frames stepped so far
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Attach or detach the analyser source
    pub fn set_audio(&mut self, audio: Option<AudioGraph>) {
        self.sample = audio
            .as_ref()
            .map(|g| g.new_sample())
            .unwrap_or_else(|| AudioSample::silent(0));
        self.audio = audio;
    }

    /// Switch to another scene, starting from its resting state
    pub fn set_scene(&mut self, kind: SceneKind) {
        if self.is_cancelled() || self.scene.kind() == kind {
            return;
        }
        debug!("Scene switched {} -> {}", self.scene.kind().as_str(), kind.as_str());
        self.settings.scene = kind;
        self.scene = SceneState::new(kind, &self.settings);
    }

    /// Show or hide the view. Hidden loops skip frames and forget the last
    /// tick time so the first visible frame steps by zero.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            trace!("Render loop visibility -> {}", visible);
        }
        self.visible = visible;
        if !visible {
            self.last_tick = None;
        }
    }

    /// Whether the view is visible
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Run one frame at time `now` (monotonic, any origin).
    ///
    /// Returns the new scene state, or `None` if the loop is cancelled or
    /// hidden; in that case nothing is modified.
    pub fn tick(&mut self, now: Duration) -> Option<&SceneState> {
        if self.is_cancelled() || !self.visible {
            return None;
        }

        let dt = match self.last_tick {
            Some(previous) => now.saturating_sub(previous).as_secs_f32(),
            None => 0.0,
        };
        self.last_tick = Some(now);

        let audio = self.read_audio();
        let input = FrameInput {
            audio: &audio,
            settings: &self.settings,
        };
        self.scene = step(&self.scene, &input, dt);
        self.frame_count += 1;

        if self.frame_count % 300 == 0 {
            trace!(
                "Frame {}: {} ({})",
                self.frame_count,
                self.scene,
                if audio.is_live() { "live" } else { "idle" }
            );
        }

        Some(&self.scene)
    }

    fn read_audio(&mut self) -> AudioFrame {
        match &self.audio {
            Some(graph) => {
                graph.read_frequency_data(&mut self.sample);
                AudioFrame::from_sample(&self.sample, self.settings.band_count)
            }
            None => AudioFrame::Idle,
        }
    }
}

/// Paces a loop at a target frame rate
#[derive(Debug, Clone)]
pub struct FrameClock {
    start: Instant,
    frame_target: Duration,
    next_frame: Instant,
}

impl FrameClock {
    /// Clock for `target_fps`; non-positive values fall back to 60
    pub fn new(target_fps: f32) -> Self {
        let fps = if target_fps.is_finite() && target_fps > 0.0 {
            target_fps
        } else {
            60.0
        };
        let start = Instant::now();
        Self {
            start,
            frame_target: Duration::from_secs_f64(1.0 / fps as f64),
            next_frame: start,
        }
    }

    /// Time per frame
    pub fn frame_target(&self) -> Duration {
        self.frame_target
    }

    /// Time since the clock was created
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Block until the next frame is due and return its timestamp.
    /// If the caller fell behind, frames are dropped rather than bunched.
    pub fn wait_next(&mut self) -> Duration {
        let now = Instant::now();
        if now < self.next_frame {
            std::thread::sleep(self.next_frame - now);
        }
        let due = Instant::now();
        self.next_frame += self.frame_target;
        if self.next_frame < due {
            self.next_frame = due + self.frame_target;
        }
        due.duration_since(self.start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AnalyserConfig, MediaElement};

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    #[test]
    fn test_cancelled_loop_never_mutates() {
        let mut render = RenderLoop::new(RenderSettings::default(), None);
        render.tick(ms(0));
        render.tick(ms(16));
        let before = render.scene().clone();

        render.handle().cancel();
        assert!(render.tick(ms(32)).is_none());
        assert!(render.tick(ms(1000)).is_none());
        assert_eq!(render.scene(), &before);
        assert_eq!(render.frame_count(), 2);
    }

    #[test]
    fn test_hidden_loop_does_not_drift() {
        let mut render = RenderLoop::new(RenderSettings::default(), None);
        render.tick(ms(0));
        render.tick(ms(16));
        let elapsed_before = render.scene().elapsed();

        render.set_visible(false);
        assert!(render.tick(ms(5_000)).is_none());

        render.set_visible(true);
        let resumed = render.tick(ms(10_000)).unwrap().elapsed();
        assert!((resumed - elapsed_before).abs() < 1e-6);

        let next = render.tick(ms(10_016)).unwrap().elapsed();
        assert!((next - elapsed_before - 0.016).abs() < 1e-4);
    }

    #[test]
    fn test_idle_without_analyser_varies_over_time() {
        let mut render = RenderLoop::new(RenderSettings::default(), None);
        let at_zero = render.tick(ms(0)).unwrap().primary_scale();
        let mut at_one = at_zero;
        for i in 1..=60 {
            at_one = render.tick(ms(i * 1000 / 60)).unwrap().primary_scale();
        }
        assert!((at_zero - at_one).abs() > 1e-3);
    }

    #[test]
    fn test_live_audio_drives_scene() {
        let graph = crate::audio::AudioGraph::new(8000, AnalyserConfig::default());
        let tone: Vec<f32> = (0..8000)
            .map(|i| (2.0 * std::f32::consts::PI * 500.0 * i as f32 / 8000.0).sin())
            .collect();
        graph.connect_source(MediaElement::from_samples("tone", tone, 8000));

        let mut render = RenderLoop::new(RenderSettings::default(), Some(graph.clone()));
        for i in 0..30 {
            graph.pump(133);
            render.tick(ms(i * 16));
        }
        let SceneState::Orb(orb) = render.scene() else {
            panic!("expected orb");
        };
        assert!(orb.level > 0.0);
    }

    #[test]
    fn test_set_scene_resets_state() {
        let mut render = RenderLoop::new(RenderSettings::default(), None);
        render.tick(ms(0));
        render.tick(ms(50));
        render.set_scene(SceneKind::Spiral);
        assert_eq!(render.scene().kind(), SceneKind::Spiral);
        assert_eq!(render.scene().elapsed(), 0.0);
    }

    #[test]
    fn test_frame_clock_paces() {
        let mut clock = FrameClock::new(200.0);
        assert_eq!(clock.frame_target(), Duration::from_millis(5));
        let first = clock.wait_next();
        let second = clock.wait_next();
        assert!(second >= first);
        assert!(FrameClock::new(-1.0).frame_target() > Duration::ZERO);
    }
}

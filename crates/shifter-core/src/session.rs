//! One mounted visualization: its frame loop, its prime tones and its timers.
//!
//! Stopping a session cancels the frame loop, removes every filter it
//! inserted and clears its timers. The shared audio graph is left running for
//! the next session.

use std::time::Duration;
use tracing::{debug, info};

use crate::audio::AudioHandles;
use crate::config::ShifterConfig;
use crate::primes::{PrimeFrequencyMapper, ToggleOutcome};
use crate::render::{LoopHandle, RenderLoop, SceneKind, SceneState};
use crate::timers::{BreathPhase, BreathingCycle, BreathingPattern, SleepTimer};

/// A running visualization
pub struct VisualizationSession {
    render: RenderLoop,
    primes: PrimeFrequencyMapper,
    breathing: Option<BreathingCycle>,
    sleep: SleepTimer,
    last_tick: Option<Duration>,
    stopped: bool,
}

impl VisualizationSession {
    /// Start a session. Without `audio` the scene runs its idle animation
    /// and prime selections stay silent until [`attach_audio`](Self::attach_audio).
    pub fn start(config: &ShifterConfig, audio: Option<&AudioHandles>) -> Self {
        let graph = audio.map(|h| h.graph.clone());
        let render = RenderLoop::new(config.render.clone(), graph.clone());
        let primes = match graph {
            Some(graph) => PrimeFrequencyMapper::with_graph(config.primes.clone(), graph),
            None => PrimeFrequencyMapper::new(config.primes.clone()),
        };
        info!(
            "Visualization session started (scene={}, audio={})",
            config.render.scene.as_str(),
            audio.is_some()
        );
        Self {
            render,
            primes,
            breathing: None,
            sleep: SleepTimer::new(),
            last_tick: None,
            stopped: false,
        }
    }

    /// Connect audio that became available after the session started
    pub fn attach_audio(&mut self, audio: &AudioHandles) {
        if self.stopped {
            return;
        }
        self.render.set_audio(Some(audio.graph.clone()));
        self.primes.attach_graph(audio.graph.clone());
    }

    /// Run one frame at `now`. Returns `None` once stopped or while hidden.
    /// An expiring sleep timer stops the session.
    pub fn tick(&mut self, now: Duration) -> Option<&SceneState> {
        if self.stopped {
            return None;
        }

        let dt = self
            .last_tick
            .map(|previous| now.saturating_sub(previous))
            .unwrap_or(Duration::ZERO);
        self.last_tick = Some(now);

        if let Some(cycle) = self.breathing.as_mut() {
            for phase in cycle.advance(dt) {
                debug!("Breath phase -> {:?}", phase);
            }
        }
        if self.sleep.advance(dt) {
            info!("Sleep timer ended the session");
            self.stop();
            return None;
        }

        self.render.tick(now)
    }

    /// Flip a prime tone
    pub fn toggle_prime(&mut self, prime: u32) -> ToggleOutcome {
        if self.stopped {
            return ToggleOutcome::SessionStopped;
        }
        self.primes.toggle(prime)
    }

    /// Select a prime tone
    pub fn activate_prime(&mut self, prime: u32) -> ToggleOutcome {
        if self.stopped {
            return ToggleOutcome::SessionStopped;
        }
        self.primes.activate(prime)
    }

    /// Deselect a prime tone
    pub fn deactivate_prime(&mut self, prime: u32) -> ToggleOutcome {
        self.primes.deactivate(prime)
    }

    /// Switch scene
    pub fn set_scene(&mut self, kind: SceneKind) {
        self.render.set_scene(kind);
    }

    /// Show or hide the view
    pub fn set_visible(&mut self, visible: bool) {
        self.render.set_visible(visible);
    }

    /// Begin (or restart) a breathing guide
    pub fn start_breathing(&mut self, pattern: BreathingPattern) {
        if self.stopped {
            return;
        }
        self.breathing = Some(BreathingCycle::new(pattern));
    }

    /// Current breathing phase, if a guide is running
    pub fn breathing_phase(&self) -> Option<BreathPhase> {
        self.breathing
            .as_ref()
            .filter(|c| c.is_running())
            .map(|c| c.phase())
    }

    /// End the session after `duration`
    pub fn start_sleep_timer(&mut self, duration: Duration) {
        if self.stopped {
            return;
        }
        self.sleep.start(duration);
    }

    /// Sleep timer state
    pub fn sleep_timer(&self) -> &SleepTimer {
        &self.sleep
    }

    /// Prime tones
    pub fn primes(&self) -> &PrimeFrequencyMapper {
        &self.primes
    }

    /// Frame loop
    pub fn render_loop(&self) -> &RenderLoop {
        &self.render
    }

    /// Handle that cancels just the frame loop
    pub fn loop_handle(&self) -> LoopHandle {
        self.render.handle()
    }

    /// Whether [`stop`](Self::stop) has run
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Cancel the frame loop, remove this session's filters and clear its
    /// timers. Idempotent.
    pub fn stop(&mut self) {
        if self.stopped {
            return;
        }
        self.stopped = true;
        self.render.handle().cancel();
        self.primes.teardown();
        if let Some(cycle) = self.breathing.as_mut() {
            cycle.clear();
        }
        self.sleep.clear();
        debug!("Visualization session stopped");
    }
}

impl Drop for VisualizationSession {
    fn drop(&mut self) {
        self.stop();
    }
}

//! Fixed-delay timers driven by the frame loop: breathing-cycle phases and
//! the sleep timer.
//!
//! Both are advanced explicitly with the elapsed time and must be cleared
//! when their view goes away.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// Phase changes walked in one `advance` after whole breaths are skipped
const MAX_PHASE_STEPS: usize = 12;

/// Phases of one breath
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BreathPhase {
    /// Breathing in
    Inhale,
    /// Holding with full lungs
    HoldIn,
    /// Breathing out
    Exhale,
    /// Holding with empty lungs
    HoldOut,
}

impl BreathPhase {
    fn next(self) -> Self {
        match self {
            BreathPhase::Inhale => BreathPhase::HoldIn,
            BreathPhase::HoldIn => BreathPhase::Exhale,
            BreathPhase::Exhale => BreathPhase::HoldOut,
            BreathPhase::HoldOut => BreathPhase::Inhale,
        }
    }
}

/// Phase lengths in seconds. Zero-length phases are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathingPattern {
    /// Inhale length
    pub inhale_secs: f32,
    /// Hold after inhaling
    pub hold_in_secs: f32,
    /// Exhale length
    pub exhale_secs: f32,
    /// Hold after exhaling
    pub hold_out_secs: f32,
}

impl BreathingPattern {
    /// Equal four-second sides
    pub const BOX: BreathingPattern = BreathingPattern {
        inhale_secs: 4.0,
        hold_in_secs: 4.0,
        exhale_secs: 4.0,
        hold_out_secs: 4.0,
    };

    /// 4-7-8 relaxation breath
    pub const RELAXING: BreathingPattern = BreathingPattern {
        inhale_secs: 4.0,
        hold_in_secs: 7.0,
        exhale_secs: 8.0,
        hold_out_secs: 0.0,
    };

    /// Five seconds in, five out
    pub const COHERENT: BreathingPattern = BreathingPattern {
        inhale_secs: 5.0,
        hold_in_secs: 0.0,
        exhale_secs: 5.0,
        hold_out_secs: 0.0,
    };

    /// Length of a phase
    pub fn duration_of(&self, phase: BreathPhase) -> f32 {
        let secs = match phase {
            BreathPhase::Inhale => self.inhale_secs,
            BreathPhase::HoldIn => self.hold_in_secs,
            BreathPhase::Exhale => self.exhale_secs,
            BreathPhase::HoldOut => self.hold_out_secs,
        };
        if secs.is_finite() {
            secs.max(0.0)
        } else {
            0.0
        }
    }

    /// Length of a full breath
    pub fn cycle_secs(&self) -> f32 {
        self.duration_of(BreathPhase::Inhale)
            + self.duration_of(BreathPhase::HoldIn)
            + self.duration_of(BreathPhase::Exhale)
            + self.duration_of(BreathPhase::HoldOut)
    }
}

impl Default for BreathingPattern {
    fn default() -> Self {
        Self::BOX
    }
}

/// Steps through a breathing pattern
#[derive(Debug, Clone)]
pub struct BreathingCycle {
    pattern: BreathingPattern,
    phase: BreathPhase,
    phase_elapsed: f32,
    cycles_completed: u32,
    running: bool,
}

impl BreathingCycle {
    /// Start at the beginning of an inhale
    pub fn new(pattern: BreathingPattern) -> Self {
        Self {
            pattern,
            phase: BreathPhase::Inhale,
            phase_elapsed: 0.0,
            cycles_completed: 0,
            running: pattern.cycle_secs() > 0.0,
        }
    }

    /// Current phase
    pub fn phase(&self) -> BreathPhase {
        self.phase
    }

    /// Fraction of the current phase that has passed (0-1)
    pub fn progress(&self) -> f32 {
        let length = self.pattern.duration_of(self.phase);
        if length <= 0.0 {
            return 1.0;
        }
        (self.phase_elapsed / length).clamp(0.0, 1.0)
    }

    /// Completed breaths
    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    /// Whether the cycle is still ticking
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Advance by `dt`, returning the phases entered along the way.
    ///
    /// A step spanning several breaths counts them all but only reports the
    /// phases of the last one.
    pub fn advance(&mut self, dt: Duration) -> Vec<BreathPhase> {
        let mut entered = Vec::new();
        if !self.running {
            return entered;
        }

        self.phase_elapsed += dt.as_secs_f32();
        let cycle = self.pattern.cycle_secs();
        if self.phase_elapsed >= 2.0 * cycle {
            let skipped = (self.phase_elapsed / cycle).floor() - 1.0;
            self.cycles_completed = self.cycles_completed.saturating_add(skipped as u32);
            self.phase_elapsed = self.phase_elapsed % cycle + cycle;
        }

        for _ in 0..MAX_PHASE_STEPS {
            let length = self.pattern.duration_of(self.phase);
            if self.phase_elapsed < length {
                return entered;
            }
            self.phase_elapsed -= length;
            if self.phase == BreathPhase::HoldOut {
                self.cycles_completed += 1;
            }
            self.phase = self.phase.next();
            if self.pattern.duration_of(self.phase) > 0.0 {
                entered.push(self.phase);
            }
        }
        // Rounding left more than a breath over; drop it
        self.phase_elapsed = 0.0;
        entered
    }

    /// Stop the cycle; further advances do nothing
    pub fn clear(&mut self) {
        if self.running {
            debug!(
                "Breathing cycle cleared after {} breath(s)",
                self.cycles_completed
            );
        }
        self.running = false;
    }
}

/// Counts down once and fires
#[derive(Debug, Clone, Default)]
pub struct SleepTimer {
    remaining: Option<Duration>,
    fired: bool,
}

impl SleepTimer {
    /// An unarmed timer
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) for `duration`
    pub fn start(&mut self, duration: Duration) {
        info!("Sleep timer set for {:?}", duration);
        self.remaining = Some(duration);
        self.fired = false;
    }

    /// Time left, if armed
    pub fn remaining(&self) -> Option<Duration> {
        self.remaining
    }

    /// Whether the timer is counting down
    pub fn is_armed(&self) -> bool {
        self.remaining.is_some()
    }

    /// Whether the timer has fired since it was last started
    pub fn has_fired(&self) -> bool {
        self.fired
    }

    /// Advance by `dt`. Returns `true` exactly once, on the tick that expires.
    pub fn advance(&mut self, dt: Duration) -> bool {
        let Some(remaining) = self.remaining else {
            return false;
        };
        match remaining.checked_sub(dt) {
            Some(left) if !left.is_zero() => {
                self.remaining = Some(left);
                false
            }
            _ => {
                self.remaining = None;
                self.fired = true;
                info!("Sleep timer expired");
                true
            }
        }
    }

    /// Disarm without firing
    pub fn clear(&mut self) {
        if self.remaining.take().is_some() {
            debug!("Sleep timer cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(v: f32) -> Duration {
        Duration::from_secs_f32(v)
    }

    #[test]
    fn test_box_breathing_transitions() {
        let mut cycle = BreathingCycle::new(BreathingPattern::BOX);
        assert_eq!(cycle.phase(), BreathPhase::Inhale);

        assert!(cycle.advance(secs(3.0)).is_empty());
        assert_eq!(cycle.advance(secs(1.5)), vec![BreathPhase::HoldIn]);
        assert!((cycle.progress() - 0.125).abs() < 1e-4);

        let entered = cycle.advance(secs(12.0));
        assert_eq!(
            entered,
            vec![BreathPhase::Exhale, BreathPhase::HoldOut, BreathPhase::Inhale]
        );
        assert_eq!(cycle.cycles_completed(), 1);
    }

    #[test]
    fn test_zero_length_phases_are_skipped() {
        let mut cycle = BreathingCycle::new(BreathingPattern::COHERENT);
        assert_eq!(cycle.advance(secs(5.0)), vec![BreathPhase::Exhale]);
        assert_eq!(cycle.advance(secs(5.0)), vec![BreathPhase::Inhale]);
        assert_eq!(cycle.cycles_completed(), 1);
    }

    #[test]
    fn test_cleared_cycle_stops() {
        let mut cycle = BreathingCycle::new(BreathingPattern::RELAXING);
        cycle.clear();
        assert!(!cycle.is_running());
        assert!(cycle.advance(secs(100.0)).is_empty());
        assert_eq!(cycle.phase(), BreathPhase::Inhale);
    }

    #[test]
    fn test_all_zero_pattern_never_spins() {
        let pattern = BreathingPattern {
            inhale_secs: 0.0,
            hold_in_secs: 0.0,
            exhale_secs: 0.0,
            hold_out_secs: 0.0,
        };
        let mut cycle = BreathingCycle::new(pattern);
        assert!(!cycle.is_running());
        assert!(cycle.advance(secs(1.0)).is_empty());
    }

    #[test]
    fn test_long_step_skips_whole_breaths() {
        let mut cycle = BreathingCycle::new(BreathingPattern::BOX);
        let entered = cycle.advance(secs(16.0 * 1000.0 + 5.0));
        assert_eq!(cycle.cycles_completed(), 1000);
        assert_eq!(cycle.phase(), BreathPhase::HoldIn);
        assert_eq!(entered.last(), Some(&BreathPhase::HoldIn));
        assert!(entered.len() <= MAX_PHASE_STEPS);

        let entered = cycle.advance(Duration::MAX);
        assert!(entered.len() <= MAX_PHASE_STEPS);
        assert!(cycle.progress() < 1.0);
    }

    #[test]
    fn test_tiny_phases_return_promptly() {
        let pattern = BreathingPattern {
            inhale_secs: 1e-9,
            hold_in_secs: 1e-9,
            exhale_secs: 1e-9,
            hold_out_secs: 1e-9,
        };
        let mut cycle = BreathingCycle::new(pattern);
        assert!(cycle.is_running());
        for _ in 0..100 {
            let entered = cycle.advance(secs(0.016));
            assert!(entered.len() <= MAX_PHASE_STEPS);
        }
        assert!(cycle.cycles_completed() > 1_000_000);
    }

    #[test]
    fn test_sleep_timer_fires_once() {
        let mut timer = SleepTimer::new();
        assert!(!timer.advance(secs(1.0)));

        timer.start(secs(2.0));
        assert!(!timer.advance(secs(1.0)));
        assert!(timer.advance(secs(1.5)));
        assert!(timer.has_fired());
        assert!(!timer.advance(secs(1.0)));
        assert!(!timer.is_armed());
    }

    #[test]
    fn test_sleep_timer_clear() {
        let mut timer = SleepTimer::new();
        timer.start(secs(10.0));
        timer.clear();
        assert!(!timer.advance(secs(20.0)));
        assert!(!timer.has_fired());
    }
}

//! Prime tones - sieve-generated primes mapped to audible peaking filters.
//!
//! Each prime `p` in the displayed list maps to a bell filter at `p * 100` Hz
//! inserted in-line before the shared gain stage. Toggling is idempotent and
//! every filter this mapper inserts is removed exactly once: on deactivation,
//! on [`PrimeFrequencyMapper::teardown`], or when the mapper is dropped.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::audio::{AudioGraph, FilterId, PeakingFilter};

/// Hz per unit of prime
pub const HZ_PER_PRIME: u32 = 100;

/// All primes `<= upper_bound`, ascending, via the sieve of Eratosthenes
pub fn sieve_primes(upper_bound: u32) -> Vec<u32> {
    if upper_bound < 2 {
        return Vec::new();
    }
    let n = upper_bound as usize;
    let mut composite = vec![false; n + 1];
    let mut i = 2;
    while i * i <= n {
        if !composite[i] {
            let mut multiple = i * i;
            while multiple <= n {
                composite[multiple] = true;
                multiple += i;
            }
        }
        i += 1;
    }
    (2..=n)
        .filter(|&k| !composite[k])
        .map(|k| k as u32)
        .collect()
}

/// The first `count` primes `<= upper_bound`
pub fn first_primes(upper_bound: u32, count: usize) -> Vec<u32> {
    let mut primes = sieve_primes(upper_bound);
    primes.truncate(count);
    primes
}

/// Prime list and filter shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimeConfig {
    /// Sieve bound
    pub upper_bound: u32,
    /// How many primes are offered
    pub count: usize,
    /// Filter Q
    pub q: f32,
    /// Boost at the centre frequency
    pub gain_db: f32,
}

impl Default for PrimeConfig {
    fn default() -> Self {
        Self {
            upper_bound: 500,
            count: 50,
            q: 30.0,
            gain_db: 12.0,
        }
    }
}

impl PrimeConfig {
    /// Check the values a filter would reject
    pub fn validate(&self) -> Result<(), String> {
        if self.count == 0 {
            return Err("primes.count must be at least 1".to_string());
        }
        if !(self.q.is_finite() && self.q > 0.0) {
            return Err(format!("primes.q must be positive, got {}", self.q));
        }
        if !(self.gain_db.is_finite() && self.gain_db > 0.0) {
            return Err(format!("primes.gain_db must be positive, got {}", self.gain_db));
        }
        Ok(())
    }
}

/// One selected prime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimeTone {
    /// The prime itself
    pub prime: u32,
    /// `prime * 100`
    pub frequency_hz: u32,
    /// Whether the user has it selected
    pub active: bool,
    /// Filter in the graph; `None` while selected but silent
    pub filter: Option<FilterId>,
}

impl PrimeTone {
    /// Whether the tone actually reaches the output
    pub fn is_audible(&self) -> bool {
        self.active && self.filter.is_some()
    }
}

/// Result of a toggle request. Redundant requests are reported, not failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleOutcome {
    /// Filter created and connected
    Activated,
    /// Selected, but no graph is available to make it audible
    ActivatedSilent,
    /// Already selected; nothing changed
    AlreadyActive,
    /// Filter removed
    Deactivated,
    /// Was not selected; nothing changed
    AlreadyInactive,
    /// Not one of the offered primes; nothing changed
    UnknownPrime,
    /// The owning session has stopped; nothing changed
    SessionStopped,
}

/// Tracks selected primes and the filters realising them
pub struct PrimeFrequencyMapper {
    config: PrimeConfig,
    primes: Vec<u32>,
    tones: BTreeMap<u32, PrimeTone>,
    graph: Option<AudioGraph>,
}

impl PrimeFrequencyMapper {
    /// Generate the prime list; no graph attached yet
    pub fn new(config: PrimeConfig) -> Self {
        let primes = first_primes(config.upper_bound, config.count);
        debug!(
            "Prime mapper: {} primes up to {} (largest {:?})",
            primes.len(),
            config.upper_bound,
            primes.last()
        );
        Self {
            config,
            primes,
            tones: BTreeMap::new(),
            graph: None,
        }
    }

    /// Create a mapper already attached to `graph`
    pub fn with_graph(config: PrimeConfig, graph: AudioGraph) -> Self {
        let mut mapper = Self::new(config);
        mapper.attach_graph(graph);
        mapper
    }

    /// The offered primes, ascending
    pub fn primes(&self) -> &[u32] {
        &self.primes
    }

    /// Attach (or replace) the graph. Silent selections become audible.
    pub fn attach_graph(&mut self, graph: AudioGraph) {
        if let Some(current) = &self.graph {
            if current.ptr_eq(&graph) {
                return;
            }
            self.disconnect_all();
        }

        for tone in self.tones.values_mut() {
            let filter = PeakingFilter::new(
                tone.frequency_hz as f32,
                self.config.q,
                self.config.gain_db,
                graph.sample_rate(),
            );
            tone.filter = Some(graph.insert_filter(filter));
        }
        if !self.tones.is_empty() {
            info!("Realised {} silent prime tone(s)", self.tones.len());
        }
        self.graph = Some(graph);
    }

    /// Select a prime
    pub fn activate(&mut self, prime: u32) -> ToggleOutcome {
        if !self.is_offered(prime) {
            debug!("Ignoring activation of unlisted value {}", prime);
            return ToggleOutcome::UnknownPrime;
        }
        if self.tones.contains_key(&prime) {
            return ToggleOutcome::AlreadyActive;
        }

        let frequency_hz = prime * HZ_PER_PRIME;
        let filter = self.graph.as_ref().map(|graph| {
            graph.insert_filter(PeakingFilter::new(
                frequency_hz as f32,
                self.config.q,
                self.config.gain_db,
                graph.sample_rate(),
            ))
        });

        let outcome = if filter.is_some() {
            debug!("Prime {} active at {}Hz", prime, frequency_hz);
            ToggleOutcome::Activated
        } else {
            debug!("Prime {} selected but silent (no audio graph)", prime);
            ToggleOutcome::ActivatedSilent
        };

        self.tones.insert(
            prime,
            PrimeTone {
                prime,
                frequency_hz,
                active: true,
                filter,
            },
        );
        outcome
    }

    /// Deselect a prime, removing its filter
    pub fn deactivate(&mut self, prime: u32) -> ToggleOutcome {
        if !self.is_offered(prime) {
            return ToggleOutcome::UnknownPrime;
        }
        let Some(tone) = self.tones.remove(&prime) else {
            return ToggleOutcome::AlreadyInactive;
        };
        self.remove_filter(&tone);
        debug!("Prime {} deactivated", prime);
        ToggleOutcome::Deactivated
    }

    /// Flip a prime's selection
    pub fn toggle(&mut self, prime: u32) -> ToggleOutcome {
        if self.is_active(prime) {
            self.deactivate(prime)
        } else {
            self.activate(prime)
        }
    }

    /// Whether a prime is selected
    pub fn is_active(&self, prime: u32) -> bool {
        self.tones.contains_key(&prime)
    }

    /// The tone for a selected prime
    pub fn tone(&self, prime: u32) -> Option<&PrimeTone> {
        self.tones.get(&prime)
    }

    /// Selected primes, ascending
    pub fn active_primes(&self) -> Vec<u32> {
        self.tones.keys().copied().collect()
    }

    /// Remove every filter and clear the selection. The graph stays alive.
    pub fn teardown(&mut self) {
        if self.tones.is_empty() {
            return;
        }
        self.disconnect_all();
        let count = self.tones.len();
        self.tones.clear();
        debug!("Prime mapper torn down ({} tone(s) released)", count);
    }

    fn is_offered(&self, prime: u32) -> bool {
        self.primes.binary_search(&prime).is_ok()
    }

    fn disconnect_all(&mut self) {
        let Some(graph) = &self.graph else {
            return;
        };
        for tone in self.tones.values_mut() {
            if let Some(id) = tone.filter.take() {
                if !graph.remove_filter(id) {
                    warn!("Filter for prime {} was already gone", tone.prime);
                }
            }
        }
    }

    fn remove_filter(&self, tone: &PrimeTone) {
        if let (Some(graph), Some(id)) = (&self.graph, tone.filter) {
            if !graph.remove_filter(id) {
                warn!("Filter for prime {} was already gone", tone.prime);
            }
        }
    }
}

impl Drop for PrimeFrequencyMapper {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::AnalyserConfig;

    fn graph() -> AudioGraph {
        AudioGraph::new(44100, AnalyserConfig::default())
    }

    #[test]
    fn test_sieve_up_to_30() {
        assert_eq!(sieve_primes(30), vec![2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
    }

    #[test]
    fn test_sieve_small_bounds() {
        assert!(sieve_primes(0).is_empty());
        assert!(sieve_primes(1).is_empty());
        assert_eq!(sieve_primes(2), vec![2]);
    }

    #[test]
    fn test_default_list() {
        let primes = first_primes(500, 50);
        assert_eq!(primes.len(), 50);
        assert_eq!(&primes[..10], &[2, 3, 5, 7, 11, 13, 17, 19, 23, 29]);
        assert_eq!(primes[49], 229);
        // Only 95 primes exist below 500
        assert_eq!(first_primes(500, 200).len(), 95);
    }

    #[test]
    fn test_activate_is_idempotent() {
        let g = graph();
        let mut mapper = PrimeFrequencyMapper::with_graph(PrimeConfig::default(), g.clone());

        assert_eq!(mapper.activate(7), ToggleOutcome::Activated);
        assert_eq!(mapper.activate(7), ToggleOutcome::AlreadyActive);
        assert_eq!(g.filter_count(), 1);
        assert_eq!(mapper.tone(7).unwrap().frequency_hz, 700);
    }

    #[test]
    fn test_deactivate_releases_filter() {
        let g = graph();
        let mut mapper = PrimeFrequencyMapper::with_graph(PrimeConfig::default(), g.clone());

        mapper.activate(11);
        let id = mapper.tone(11).unwrap().filter.unwrap();
        assert_eq!(mapper.deactivate(11), ToggleOutcome::Deactivated);
        assert!(!mapper.is_active(11));
        assert!(!g.has_filter(id));
        assert_eq!(mapper.deactivate(11), ToggleOutcome::AlreadyInactive);
    }

    #[test]
    fn test_unknown_prime_is_noop() {
        let mut mapper = PrimeFrequencyMapper::new(PrimeConfig::default());
        assert_eq!(mapper.toggle(4), ToggleOutcome::UnknownPrime);
        assert_eq!(mapper.toggle(499), ToggleOutcome::UnknownPrime); // beyond first 50
        assert!(mapper.active_primes().is_empty());
    }

    #[test]
    fn test_selected_but_silent_then_attached() {
        let mut mapper = PrimeFrequencyMapper::new(PrimeConfig::default());
        assert_eq!(mapper.activate(3), ToggleOutcome::ActivatedSilent);
        assert!(mapper.is_active(3));
        assert!(!mapper.tone(3).unwrap().is_audible());

        let g = graph();
        mapper.attach_graph(g.clone());
        assert!(mapper.tone(3).unwrap().is_audible());
        assert_eq!(g.filter_count(), 1);
    }

    #[test]
    fn test_activation_at_tiny_sample_rate() {
        let g = AudioGraph::new(2, AnalyserConfig::default());
        let mut mapper = PrimeFrequencyMapper::with_graph(PrimeConfig::default(), g.clone());
        assert_eq!(mapper.activate(2), ToggleOutcome::Activated);
        g.pump(16);
        assert_eq!(g.filter_count(), 1);
    }

    #[test]
    fn test_drop_disconnects_everything() {
        let g = graph();
        {
            let mut mapper = PrimeFrequencyMapper::with_graph(PrimeConfig::default(), g.clone());
            mapper.activate(2);
            mapper.activate(3);
            mapper.activate(5);
            assert_eq!(g.filter_count(), 3);
        }
        assert_eq!(g.filter_count(), 0);
    }

    #[test]
    fn test_toggle_round_trip() {
        let g = graph();
        let mut mapper = PrimeFrequencyMapper::with_graph(PrimeConfig::default(), g.clone());
        assert_eq!(mapper.toggle(13), ToggleOutcome::Activated);
        assert_eq!(mapper.toggle(13), ToggleOutcome::Deactivated);
        assert_eq!(g.filter_count(), 0);
    }
}

//! Shared signal graph and the service that owns it.
//!
//! The graph is a fixed chain: media source -> prime filters -> gain stage ->
//! analyser -> output. Exactly one graph exists per [`AudioGraphManager`];
//! every visualization reads the same analyser through an [`AudioHandles`].

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::analyser::{Analyser, AnalyserConfig};
use super::backend::{AudioPlatform, OutputStream};
use super::filter::{FilterId, GainStage, PeakingFilter};
use super::media::{MediaElement, MediaId};
use super::sample::AudioSample;

/// Scratch block size used when pulling from the source
const RENDER_BLOCK: usize = 512;

/// Lifecycle of the audio context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    /// No acquisition has happened yet
    NotCreated,
    /// Created but waiting for a user gesture before audio flows
    Suspended,
    /// Audio is flowing
    Running,
    /// Creation failed; analysis is unavailable for this session
    Unavailable,
}

/// User interactions that unlock a suspended context
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserGesture {
    /// Pointer click
    Click,
    /// Touch start
    Touch,
    /// Key press
    KeyDown,
}

/// The processing chain itself
pub struct SignalGraph {
    sample_rate: u32,
    state: ContextState,
    source: Option<MediaElement>,
    filters: Vec<(FilterId, PeakingFilter)>,
    next_filter_id: u64,
    gain: GainStage,
    analyser: Analyser,
    scratch: Vec<f32>,
}

impl SignalGraph {
    fn new(sample_rate: u32, analyser_config: AnalyserConfig) -> Self {
        Self {
            sample_rate,
            state: ContextState::Suspended,
            source: None,
            filters: Vec::new(),
            next_filter_id: 1,
            gain: GainStage::default(),
            analyser: Analyser::new(analyser_config),
            scratch: vec![0.0; RENDER_BLOCK],
        }
    }

    /// Pull `out.len()` mono samples through the chain
    pub fn render_mono(&mut self, out: &mut [f32]) {
        match &self.source {
            Some(source) => {
                source.fill(out, self.sample_rate);
            }
            None => out.fill(0.0),
        }
        for (_, filter) in self.filters.iter_mut() {
            filter.process_block(out);
        }
        self.gain.process_block(out);
        self.analyser.push_samples(out);
    }

    /// Fill an interleaved output buffer, duplicating the mono signal
    pub fn render_interleaved(&mut self, out: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        let mut scratch = std::mem::take(&mut self.scratch);
        for frame_block in out.chunks_mut(RENDER_BLOCK * channels) {
            let frames = frame_block.len() / channels;
            let mono = &mut scratch[..frames];
            self.render_mono(mono);
            for (frame, &value) in frame_block.chunks_mut(channels).zip(mono.iter()) {
                frame.fill(value);
            }
        }
        self.scratch = scratch;
    }
}

/// Cloneable handle to the shared signal graph
#[derive(Clone)]
pub struct AudioGraph {
    inner: Arc<Mutex<SignalGraph>>,
}

impl AudioGraph {
    /// Build a standalone graph (normally done by [`AudioGraphManager`])
    pub fn new(sample_rate: u32, analyser_config: AnalyserConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalGraph::new(sample_rate, analyser_config))),
        }
    }

    /// Whether two handles refer to the same graph
    pub fn ptr_eq(&self, other: &AudioGraph) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Output sample rate
    pub fn sample_rate(&self) -> u32 {
        self.inner.lock().sample_rate
    }

    /// Current context state
    pub fn context_state(&self) -> ContextState {
        self.inner.lock().state
    }

    pub(crate) fn set_context_state(&self, state: ContextState) {
        self.inner.lock().state = state;
    }

    /// Bins produced by the analyser
    pub fn frequency_bin_count(&self) -> usize {
        self.inner.lock().analyser.frequency_bin_count()
    }

    /// A silent sample sized for this graph's analyser
    pub fn new_sample(&self) -> AudioSample {
        AudioSample::silent(self.frequency_bin_count())
    }

    /// Overwrite `sample` with the latest analyser snapshot
    pub fn read_frequency_data(&self, sample: &mut AudioSample) {
        self.inner.lock().analyser.get_byte_frequency_data(sample);
    }

    /// Connect a source, returning the id of the one it replaced
    pub fn connect_source(&self, media: MediaElement) -> Option<MediaId> {
        let mut graph = self.inner.lock();
        let previous = graph.source.replace(media).map(|m| m.id());
        graph.analyser.reset();
        previous
    }

    /// Disconnect the current source
    pub fn disconnect_source(&self) -> Option<MediaElement> {
        self.inner.lock().source.take()
    }

    /// Id of the connected source
    pub fn source_id(&self) -> Option<MediaId> {
        self.inner.lock().source.as_ref().map(|m| m.id())
    }

    /// Insert a filter in-line before the gain stage
    pub fn insert_filter(&self, filter: PeakingFilter) -> FilterId {
        let mut graph = self.inner.lock();
        let id = FilterId(graph.next_filter_id);
        graph.next_filter_id += 1;
        graph.filters.push((id, filter));
        id
    }

    /// Remove a filter; `false` if it was not connected
    pub fn remove_filter(&self, id: FilterId) -> bool {
        let mut graph = self.inner.lock();
        let before = graph.filters.len();
        graph.filters.retain(|(fid, _)| *fid != id);
        graph.filters.len() != before
    }

    /// Whether a filter is connected
    pub fn has_filter(&self, id: FilterId) -> bool {
        self.inner.lock().filters.iter().any(|(fid, _)| *fid == id)
    }

    /// Number of connected filters
    pub fn filter_count(&self) -> usize {
        self.inner.lock().filters.len()
    }

    /// Set the shared gain stage
    pub fn set_gain(&self, gain: f32) {
        self.inner.lock().gain.set_gain(gain);
    }

    /// Render `frames` mono frames and discard them. Used when no device
    /// pulls from the graph (offline processing, tests).
    pub fn pump(&self, frames: usize) {
        let mut graph = self.inner.lock();
        let mut scratch = std::mem::take(&mut graph.scratch);
        let mut remaining = frames;
        while remaining > 0 {
            let n = remaining.min(scratch.len());
            graph.render_mono(&mut scratch[..n]);
            remaining -= n;
        }
        graph.scratch = scratch;
    }

    /// Fill an interleaved device buffer
    pub fn render_interleaved(&self, out: &mut [f32], channels: usize) {
        self.inner.lock().render_interleaved(out, channels);
    }
}

/// What consumers get back from [`AudioGraphManager::acquire`]
#[derive(Clone)]
pub struct AudioHandles {
    /// The shared graph (context + analyser)
    pub graph: AudioGraph,
}

impl AudioHandles {
    /// Current context state
    pub fn context_state(&self) -> ContextState {
        self.graph.context_state()
    }
}

struct GraphSession {
    graph: AudioGraph,
    output: Box<dyn OutputStream>,
}

/// Owns the single signal graph for a session.
///
/// Construct once at startup with the platform to use and pass it by
/// reference to anything that needs audio analysis.
pub struct AudioGraphManager {
    platform: Box<dyn AudioPlatform>,
    analyser_config: AnalyserConfig,
    session: Option<GraphSession>,
    unavailable: bool,
    gesture_listener_armed: bool,
}

impl AudioGraphManager {
    /// Create a manager; nothing is allocated until the first acquisition
    pub fn new(platform: Box<dyn AudioPlatform>, analyser_config: AnalyserConfig) -> Self {
        Self {
            platform,
            analyser_config,
            session: None,
            unavailable: false,
            gesture_listener_armed: false,
        }
    }

    /// Connect `media` to the shared analyser, creating the graph on first use.
    ///
    /// Returns `None` when the platform cannot provide audio; callers should
    /// fall back to idle visuals. Acquiring the already-connected element is a
    /// no-op; a different element replaces the previous source.
    pub fn acquire(&mut self, media: &MediaElement) -> Option<AudioHandles> {
        if self.unavailable {
            return None;
        }

        if self.session.is_none() {
            match self.create_session() {
                Ok(session) => {
                    self.session = Some(session);
                    self.gesture_listener_armed = true;
                    debug!("Gesture listener registered for suspended audio context");
                }
                Err(e) => {
                    warn!(
                        "Audio analysis unavailable on '{}': {}",
                        self.platform.name(),
                        e
                    );
                    self.unavailable = true;
                    return None;
                }
            }
        }

        let graph = self.session.as_ref()?.graph.clone();
        match graph.source_id() {
            Some(id) if id == media.id() => {
                debug!("Media {:?} already connected", id);
            }
            Some(previous) => {
                graph.connect_source(media.clone());
                info!(
                    "Reconnected analyser source {:?} -> {:?} ('{}')",
                    previous,
                    media.id(),
                    media.name()
                );
            }
            None => {
                graph.connect_source(media.clone());
                info!("Connected analyser source {:?} ('{}')", media.id(), media.name());
            }
        }

        Some(AudioHandles { graph })
    }

    fn create_session(&mut self) -> Result<GraphSession, super::AudioError> {
        let sample_rate = self.platform.output_sample_rate()?;
        let graph = AudioGraph::new(sample_rate, self.analyser_config.clone());
        let output = self.platform.open_output(graph.clone())?;
        let state = if output.is_running() {
            ContextState::Running
        } else {
            ContextState::Suspended
        };
        graph.set_context_state(state);
        info!(
            "Audio context created on '{}' @ {}Hz ({:?})",
            self.platform.name(),
            sample_rate,
            state
        );
        Ok(GraphSession { graph, output })
    }

    /// Deliver a user gesture. The first gesture after creation resumes a
    /// suspended context; the listener is then removed. Returns `true` if
    /// this call resumed the context.
    pub fn notify_gesture(&mut self, gesture: UserGesture) -> bool {
        if !self.gesture_listener_armed {
            return false;
        }
        self.gesture_listener_armed = false;

        let Some(session) = self.session.as_mut() else {
            return false;
        };
        if session.output.is_running() {
            session.graph.set_context_state(ContextState::Running);
            return false;
        }

        match session.output.resume() {
            Ok(()) => {
                session.graph.set_context_state(ContextState::Running);
                debug!("Audio context resumed by {:?}", gesture);
                true
            }
            Err(e) => {
                warn!("Failed to resume audio context after {:?}: {}", gesture, e);
                false
            }
        }
    }

    /// Whether a gesture listener is still waiting
    pub fn is_gesture_listener_armed(&self) -> bool {
        self.gesture_listener_armed
    }

    /// Current handles, if a graph exists
    pub fn handles(&self) -> Option<AudioHandles> {
        self.session.as_ref().map(|s| AudioHandles {
            graph: s.graph.clone(),
        })
    }

    /// State of the shared context
    pub fn context_state(&self) -> ContextState {
        if self.unavailable {
            return ContextState::Unavailable;
        }
        match &self.session {
            Some(session) => session.graph.context_state(),
            None => ContextState::NotCreated,
        }
    }

    /// Disconnect the current media source while keeping the graph alive
    pub fn disconnect_source(&mut self) {
        if let Some(session) = &self.session {
            if let Some(media) = session.graph.disconnect_source() {
                debug!("Disconnected media {:?}", media.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::{NullPlatform, OfflinePlatform};

    fn tone(sample_rate: u32) -> MediaElement {
        let samples = (0..sample_rate as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 1000.0 * i as f32 / sample_rate as f32).sin())
            .collect();
        MediaElement::from_samples("tone", samples, sample_rate)
    }

    #[test]
    fn test_unavailable_platform_degrades() {
        let mut manager =
            AudioGraphManager::new(Box::new(NullPlatform), AnalyserConfig::default());
        let media = tone(8000);
        assert!(manager.acquire(&media).is_none());
        assert_eq!(manager.context_state(), ContextState::Unavailable);
        // Failure is permanent for the session
        assert!(manager.acquire(&media).is_none());
        assert!(manager.handles().is_none());
    }

    #[test]
    fn test_acquire_is_idempotent() {
        let mut manager =
            AudioGraphManager::new(Box::new(OfflinePlatform::new(8000)), AnalyserConfig::default());
        let media = tone(8000);

        let first = manager.acquire(&media).unwrap();
        let second = manager.acquire(&media).unwrap();
        assert!(first.graph.ptr_eq(&second.graph));
        assert_eq!(first.graph.source_id(), Some(media.id()));
    }

    #[test]
    fn test_new_media_replaces_source() {
        let mut manager =
            AudioGraphManager::new(Box::new(OfflinePlatform::new(8000)), AnalyserConfig::default());
        let a = tone(8000);
        let b = tone(8000);

        let handles_a = manager.acquire(&a).unwrap();
        let handles_b = manager.acquire(&b).unwrap();
        assert!(handles_a.graph.ptr_eq(&handles_b.graph));
        assert_eq!(handles_a.graph.source_id(), Some(b.id()));
    }

    #[test]
    fn test_context_starts_suspended_and_resumes_once() {
        let mut manager =
            AudioGraphManager::new(Box::new(OfflinePlatform::new(8000)), AnalyserConfig::default());
        assert_eq!(manager.context_state(), ContextState::NotCreated);
        assert!(!manager.is_gesture_listener_armed());

        manager.acquire(&tone(8000)).unwrap();
        assert_eq!(manager.context_state(), ContextState::Suspended);
        assert!(manager.is_gesture_listener_armed());

        assert!(manager.notify_gesture(UserGesture::Click));
        assert_eq!(manager.context_state(), ContextState::Running);
        assert!(!manager.is_gesture_listener_armed());
        assert!(!manager.notify_gesture(UserGesture::KeyDown));
    }

    #[test]
    fn test_pumped_signal_reaches_analyser() {
        let graph = AudioGraph::new(8000, AnalyserConfig::default());
        graph.connect_source(tone(8000));
        graph.pump(1024);

        let mut sample = graph.new_sample();
        graph.read_frequency_data(&mut sample);
        assert_eq!(sample.len(), 128);
        assert!(sample.iter().any(|&b| b > 0));
    }

    #[test]
    fn test_filters_insert_and_remove() {
        let graph = AudioGraph::new(8000, AnalyserConfig::default());
        let id = graph.insert_filter(PeakingFilter::new(200.0, 30.0, 12.0, 8000));
        assert!(graph.has_filter(id));
        assert_eq!(graph.filter_count(), 1);
        assert!(graph.remove_filter(id));
        assert!(!graph.remove_filter(id));
        assert_eq!(graph.filter_count(), 0);
    }

    #[test]
    fn test_render_interleaved_duplicates_channels() {
        let graph = AudioGraph::new(100, AnalyserConfig::default());
        graph.connect_source(MediaElement::from_samples("dc", vec![0.25; 16], 100));
        let mut out = [0.0f32; 8];
        graph.render_interleaved(&mut out, 2);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }
}

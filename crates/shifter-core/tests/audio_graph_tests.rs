use parking_lot::Mutex;
use shifter_core::audio::backend::OutputStream;
use shifter_core::{
    AnalyserConfig, AudioError, AudioGraph, AudioGraphManager, AudioPlatform, ContextState,
    MediaElement, PrimeConfig, ShifterConfig, ToggleOutcome, UserGesture, VisualizationSession,
};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Default)]
struct MockCalls {
    rate_queries: usize,
    opens: usize,
    resumes: usize,
}

/// Platform double that records calls and can be told to fail
struct MockPlatform {
    calls: Arc<Mutex<MockCalls>>,
    fail_open: bool,
    starts_running: bool,
}

impl MockPlatform {
    fn new() -> (Self, Arc<Mutex<MockCalls>>) {
        let calls = Arc::new(Mutex::new(MockCalls::default()));
        (
            Self {
                calls: calls.clone(),
                fail_open: false,
                starts_running: false,
            },
            calls,
        )
    }
}

struct MockStream {
    calls: Arc<Mutex<MockCalls>>,
    running: bool,
}

impl OutputStream for MockStream {
    fn resume(&mut self) -> Result<(), AudioError> {
        self.calls.lock().resumes += 1;
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

impl AudioPlatform for MockPlatform {
    fn name(&self) -> &str {
        "mock"
    }

    fn output_sample_rate(&self) -> Result<u32, AudioError> {
        self.calls.lock().rate_queries += 1;
        Ok(8000)
    }

    fn open_output(&mut self, _graph: AudioGraph) -> Result<Box<dyn OutputStream>, AudioError> {
        self.calls.lock().opens += 1;
        if self.fail_open {
            return Err(AudioError::ContextCreation("mock refused".to_string()));
        }
        Ok(Box::new(MockStream {
            calls: self.calls.clone(),
            running: self.starts_running,
        }))
    }
}

fn tone(freq: f32, sample_rate: u32, seconds: f32) -> MediaElement {
    let count = (sample_rate as f32 * seconds) as usize;
    let samples = (0..count)
        .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
        .collect();
    MediaElement::from_samples("tone", samples, sample_rate)
}

#[test]
fn test_graph_is_created_once() {
    let (platform, calls) = MockPlatform::new();
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    let a = tone(440.0, 8000, 1.0);
    let b = tone(880.0, 8000, 1.0);

    let first = manager.acquire(&a).unwrap();
    let again = manager.acquire(&a).unwrap();
    let other = manager.acquire(&b).unwrap();

    assert!(first.graph.ptr_eq(&again.graph));
    assert!(first.graph.ptr_eq(&other.graph));
    assert_eq!(calls.lock().opens, 1);
    // Last writer wins
    assert_eq!(first.graph.source_id(), Some(b.id()));
}

#[test]
fn test_creation_failure_is_permanent() {
    let (mut platform, calls) = MockPlatform::new();
    platform.fail_open = true;
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    let media = tone(440.0, 8000, 0.1);

    assert!(manager.acquire(&media).is_none());
    assert!(manager.acquire(&media).is_none());
    assert_eq!(manager.context_state(), ContextState::Unavailable);
    assert_eq!(calls.lock().opens, 1, "no retry after failure");
    assert_eq!(calls.lock().rate_queries, 1);
    assert!(!manager.notify_gesture(UserGesture::Click));
}

#[test]
fn test_gesture_resumes_exactly_once() {
    let (platform, calls) = MockPlatform::new();
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    manager.acquire(&tone(440.0, 8000, 0.1)).unwrap();
    assert_eq!(manager.context_state(), ContextState::Suspended);

    assert!(manager.notify_gesture(UserGesture::Touch));
    assert!(!manager.notify_gesture(UserGesture::Click));
    assert!(!manager.notify_gesture(UserGesture::KeyDown));
    assert_eq!(calls.lock().resumes, 1);
    assert_eq!(manager.context_state(), ContextState::Running);
}

#[test]
fn test_already_running_context_needs_no_gesture() {
    let (mut platform, calls) = MockPlatform::new();
    platform.starts_running = true;
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    manager.acquire(&tone(440.0, 8000, 0.1)).unwrap();

    assert_eq!(manager.context_state(), ContextState::Running);
    assert!(!manager.notify_gesture(UserGesture::Click));
    assert_eq!(calls.lock().resumes, 0);
}

#[test]
fn test_disconnect_keeps_graph() {
    let (platform, _calls) = MockPlatform::new();
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    let handles = manager.acquire(&tone(440.0, 8000, 0.1)).unwrap();

    manager.disconnect_source();
    assert_eq!(handles.graph.source_id(), None);
    assert!(manager.handles().is_some());
}

#[test]
fn test_sample_length_matches_bin_count() {
    for fft_size in [64, 256, 2048] {
        let graph = AudioGraph::new(
            8000,
            AnalyserConfig {
                fft_size,
                ..Default::default()
            },
        );
        let mut sample = graph.new_sample();
        assert_eq!(sample.len(), fft_size / 2);
        graph.read_frequency_data(&mut sample);
        assert_eq!(sample.len(), fft_size / 2);
    }
}

#[test]
fn test_active_prime_boosts_its_band() {
    // 8000 Hz output, 256-point FFT: bins are 31.25 Hz wide
    let sample_rate = 8000;
    let noise: Vec<f32> = (0..sample_rate as usize)
        .map(|i| {
            // Deterministic broadband signal
            let x = (i as u32).wrapping_mul(2_654_435_761) >> 16;
            (x as f32 / 65535.0 - 0.5) * 0.2
        })
        .collect();

    let measure = |activate: bool| {
        let graph = AudioGraph::new(
            sample_rate,
            AnalyserConfig {
                smoothing_time_constant: 0.0,
                ..Default::default()
            },
        );
        graph.connect_source(MediaElement::from_samples("noise", noise.clone(), sample_rate));
        let mut mapper =
            shifter_core::PrimeFrequencyMapper::with_graph(PrimeConfig::default(), graph.clone());
        if activate {
            // 11 * 100 = 1100 Hz -> bin ~35
            assert_eq!(mapper.activate(11), ToggleOutcome::Activated);
        }
        graph.pump(4096);
        let mut sample = graph.new_sample();
        graph.read_frequency_data(&mut sample);
        mapper.teardown();
        sample[33..38].iter().map(|&b| b as u32).sum::<u32>()
    };

    let plain = measure(false);
    let boosted = measure(true);
    assert!(boosted > plain, "boosted {} vs plain {}", boosted, plain);
}

#[test]
fn test_session_over_live_graph() {
    let (platform, _calls) = MockPlatform::new();
    let mut manager = AudioGraphManager::new(Box::new(platform), AnalyserConfig::default());
    let media = tone(500.0, 8000, 2.0);
    let handles = manager.acquire(&media).unwrap();
    manager.notify_gesture(UserGesture::Click);

    let config = ShifterConfig::default();
    let mut session = VisualizationSession::start(&config, Some(&handles));
    session.activate_prime(2);

    let mut live_frames = 0;
    for frame in 0..60u64 {
        handles.graph.pump(133);
        if let Some(scene) = session.tick(Duration::from_millis(frame * 16)) {
            if scene.primary_scale() > config.render.base_scale {
                live_frames += 1;
            }
        }
    }
    assert!(live_frames > 0);

    session.stop();
    assert_eq!(handles.graph.filter_count(), 0);
    assert_eq!(manager.context_state(), ContextState::Running);
}

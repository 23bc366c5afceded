//! Media elements - playable sample sources with identity.
//!
//! A [`MediaElement`] is a cheap handle (clones share playback state), so the
//! signal graph can hold the same element the caller holds and both observe
//! the same play position.

use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::AudioError;

static NEXT_MEDIA_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a media element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaId(pub u64);

impl MediaId {
    fn next() -> Self {
        Self(NEXT_MEDIA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug)]
struct Playback {
    /// Mono samples
    samples: Arc<[f32]>,
    sample_rate: u32,
    /// Fractional read position, in source samples
    cursor: f64,
    looping: bool,
    paused: bool,
}

/// A playable mono sample source
#[derive(Debug, Clone)]
pub struct MediaElement {
    id: MediaId,
    name: String,
    playback: Arc<Mutex<Playback>>,
}

impl MediaElement {
    /// Create an element from mono samples
    pub fn from_samples(name: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        let name = name.into();
        let id = MediaId::next();
        debug!(
            "Media element {:?} '{}' created: {} samples @ {}Hz",
            id,
            name,
            samples.len(),
            sample_rate
        );
        Self {
            id,
            name,
            playback: Arc::new(Mutex::new(Playback {
                samples: samples.into(),
                sample_rate: sample_rate.max(1),
                cursor: 0.0,
                looping: false,
                paused: false,
            })),
        }
    }

    /// Decode a WAV file, downmixing to mono
    pub fn open_wav(path: &Path) -> Result<Self, AudioError> {
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| AudioError::Media(format!("{}: {}", path.display(), e)))?;
        let spec = reader.spec();
        let channels = spec.channels.max(1) as usize;

        let interleaved: Vec<f32> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::Media(e.to_string()))?,
            hound::SampleFormat::Int => {
                let scale = 1.0 / (1u64 << (spec.bits_per_sample.max(1) - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 * scale))
                    .collect::<Result<_, _>>()
                    .map_err(|e| AudioError::Media(e.to_string()))?
            }
        };

        let mono: Vec<f32> = interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self::from_samples(name, mono, spec.sample_rate))
    }

    /// Identity of this element
    pub fn id(&self) -> MediaId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Native sample rate
    pub fn sample_rate(&self) -> u32 {
        self.playback.lock().sample_rate
    }

    /// Total length
    pub fn duration(&self) -> Duration {
        let playback = self.playback.lock();
        Duration::from_secs_f64(playback.samples.len() as f64 / playback.sample_rate as f64)
    }

    /// Current play position
    pub fn position(&self) -> Duration {
        let playback = self.playback.lock();
        Duration::from_secs_f64(playback.cursor / playback.sample_rate as f64)
    }

    /// Restart from the beginning when the end is reached
    pub fn set_looping(&self, looping: bool) {
        self.playback.lock().looping = looping;
    }

    /// Pause playback; the graph then reads silence
    pub fn pause(&self) {
        self.playback.lock().paused = true;
    }

    /// Resume playback
    pub fn play(&self) {
        self.playback.lock().paused = false;
    }

    /// Whether playback is paused
    pub fn is_paused(&self) -> bool {
        self.playback.lock().paused
    }

    /// Whether a non-looping element has played to its end
    pub fn is_finished(&self) -> bool {
        let playback = self.playback.lock();
        !playback.looping && playback.cursor >= playback.samples.len() as f64
    }

    /// Fill `out` with mono samples resampled to `output_rate`.
    ///
    /// Positions past the end (or while paused) are written as silence.
    /// Returns the number of samples taken from the source.
    pub(crate) fn fill(&self, out: &mut [f32], output_rate: u32) -> usize {
        let mut playback = self.playback.lock();
        let len = playback.samples.len();
        if playback.paused || len == 0 {
            out.fill(0.0);
            return 0;
        }

        let step = playback.sample_rate as f64 / output_rate.max(1) as f64;
        let mut produced = 0;
        for slot in out.iter_mut() {
            if playback.cursor >= len as f64 {
                if playback.looping {
                    playback.cursor -= len as f64;
                } else {
                    *slot = 0.0;
                    continue;
                }
            }
            let index = playback.cursor as usize;
            let frac = (playback.cursor - index as f64) as f32;
            let current = playback.samples[index];
            let next = if index + 1 < len {
                playback.samples[index + 1]
            } else if playback.looping {
                playback.samples[0]
            } else {
                current
            };
            *slot = current + (next - current) * frac;
            playback.cursor += step;
            produced += 1;
        }
        produced
    }
}

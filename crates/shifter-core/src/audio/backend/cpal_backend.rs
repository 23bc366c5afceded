//! System output via cpal

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info, warn};

use super::{AudioPlatform, OutputStream};
use crate::audio::graph::AudioGraph;
use crate::audio::AudioError;

/// Output on the host's audio device
pub struct CpalPlatform {
    device_name: Option<String>,
}

impl Default for CpalPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl CpalPlatform {
    /// Use the default output device
    pub fn new() -> Self {
        Self { device_name: None }
    }

    /// Use the output device with the given name, falling back to the default
    pub fn with_device_name(name: impl Into<String>) -> Self {
        Self {
            device_name: Some(name.into()),
        }
    }

    /// Names of the available output devices
    pub fn list_devices() -> Vec<String> {
        let host = cpal::default_host();
        match host.output_devices() {
            Ok(devices) => devices.filter_map(|d| d.name().ok()).collect(),
            Err(e) => {
                warn!("Failed to enumerate output devices: {}", e);
                Vec::new()
            }
        }
    }

    fn device(&self) -> Result<cpal::Device, AudioError> {
        let host = cpal::default_host();

        if let Some(wanted) = &self.device_name {
            let found = host
                .output_devices()
                .map_err(|e| AudioError::PlatformUnavailable(e.to_string()))?
                .find(|d| d.name().map(|n| &n == wanted).unwrap_or(false));
            match found {
                Some(device) => return Ok(device),
                None => warn!("Output device '{}' not found, using default", wanted),
            }
        }

        host.default_output_device().ok_or_else(|| {
            AudioError::PlatformUnavailable("no default output device available".to_string())
        })
    }
}

impl AudioPlatform for CpalPlatform {
    fn name(&self) -> &str {
        "cpal"
    }

    fn output_sample_rate(&self) -> Result<u32, AudioError> {
        let config = self
            .device()?
            .default_output_config()
            .map_err(|e| AudioError::ContextCreation(e.to_string()))?;
        Ok(config.sample_rate().0)
    }

    fn open_output(&mut self, graph: AudioGraph) -> Result<Box<dyn OutputStream>, AudioError> {
        let device = self.device()?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::ContextCreation(e.to_string()))?;

        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(AudioError::ContextCreation(format!(
                "unsupported sample format: {:?}",
                supported.sample_format()
            )));
        }

        let config: cpal::StreamConfig = supported.into();
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    graph.render_interleaved(data, channels);
                },
                |err| error!("Audio output stream error: {}", err),
                None,
            )
            .map_err(|e| AudioError::StreamFailed(e.to_string()))?;

        // Some hosts start streams immediately; hold it until a gesture
        if let Err(e) = stream.pause() {
            warn!("Could not pause new output stream: {}", e);
        }

        info!(
            "Output stream opened on '{}': {}ch @ {}Hz",
            device.name().unwrap_or_else(|_| "unknown".to_string()),
            channels,
            config.sample_rate.0
        );

        Ok(Box::new(CpalStream {
            stream,
            running: false,
        }))
    }
}

struct CpalStream {
    stream: cpal::Stream,
    running: bool,
}

impl OutputStream for CpalStream {
    fn resume(&mut self) -> Result<(), AudioError> {
        self.stream
            .play()
            .map_err(|e| AudioError::StreamFailed(e.to_string()))?;
        self.running = true;
        Ok(())
    }

    fn suspend(&mut self) -> Result<(), AudioError> {
        self.stream
            .pause()
            .map_err(|e| AudioError::StreamFailed(e.to_string()))?;
        self.running = false;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }
}

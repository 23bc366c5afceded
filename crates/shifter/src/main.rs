//! Sacred Shifter - headless runner for the audio-reactive visualizations.
//!
//! Loads configuration, wires a media file into the shared analyser, and runs
//! one visualization session for a fixed number of frames while logging the
//! scene state.

mod cli;
mod logging_setup;

use anyhow::{Context, Result};
use clap::Parser;
use shifter_core::primes::HZ_PER_PRIME;
use shifter_core::{
    default_platform, AudioGraphManager, AudioHandles, AudioPlatform, JsonFileParamStore,
    MediaElement, OfflinePlatform, ParamsConfig, ShifterConfig, ToggleOutcome, UserGesture,
    VisualParamGenerator, VisualizationSession,
};
use std::time::Duration;
use tracing::{debug, info, warn};

use cli::Args;

/// Log a scene summary every this many frames
const SUMMARY_INTERVAL: u64 = 60;

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_devices {
        list_devices();
        return Ok(());
    }

    let (mut config, config_error) = match &args.config {
        Some(path) => {
            let config = ShifterConfig::load(path)
                .with_context(|| format!("Failed to load configuration from {:?}", path))?;
            (config, None)
        }
        None => ShifterConfig::load_or_default(),
    };
    if let Some(scene) = args.scene {
        config.render.scene = scene;
    }

    let _log_guard = logging_setup::init(&config.logging)?;

    info!("==========================================");
    info!("===   Sacred Shifter Session Started   ===");
    info!("==========================================");
    if let Some(e) = config_error {
        warn!("Ignoring configuration file, using defaults: {}", e);
    }

    run(&args, &config)
}

fn run(args: &Args, config: &ShifterConfig) -> Result<()> {
    let media = args
        .media
        .as_deref()
        .map(|path| {
            MediaElement::open_wav(path).with_context(|| format!("Failed to open {:?}", path))
        })
        .transpose()?;

    let offline = args.offline || media.is_none();
    let mut manager = AudioGraphManager::new(
        select_platform(offline, config, media.as_ref()),
        config.analyser.clone(),
    );

    let handles = media.as_ref().and_then(|media| {
        media.set_looping(args.looping);
        manager.acquire(media)
    });
    if media.is_some() && handles.is_none() {
        warn!("Audio analysis unavailable; running idle animation");
    }

    let mut session = VisualizationSession::start(config, handles.as_ref());

    // No input devices here, so startup stands in for the first gesture
    if manager.notify_gesture(UserGesture::KeyDown) {
        debug!("Audio context resumed at startup");
    }

    for &prime in &args.primes {
        match session.activate_prime(prime) {
            ToggleOutcome::Activated | ToggleOutcome::ActivatedSilent => {
                info!("Prime {} selected ({} Hz)", prime, prime * HZ_PER_PRIME)
            }
            ToggleOutcome::UnknownPrime => warn!("{} is not in the prime list", prime),
            other => debug!("Prime {}: {:?}", prime, other),
        }
    }
    if let Some(pattern) = args.breathing_pattern() {
        session.start_breathing(pattern);
    }
    if let Some(secs) = args.sleep.filter(|s| s.is_finite() && *s > 0.0) {
        session.start_sleep_timer(Duration::from_secs_f32(secs));
    }

    log_journey_params(&args.journey, &config.params);

    run_frames(&mut session, handles.as_ref(), offline, config, args.frames);

    session.stop();
    info!("Session finished");
    Ok(())
}

fn select_platform(
    offline: bool,
    config: &ShifterConfig,
    media: Option<&MediaElement>,
) -> Box<dyn AudioPlatform> {
    if offline {
        let rate = media.map(|m| m.sample_rate()).unwrap_or(44_100);
        return Box::new(OfflinePlatform::new(rate));
    }
    #[cfg(feature = "audio")]
    if let Some(name) = &config.output_device {
        return Box::new(shifter_core::CpalPlatform::with_device_name(name.clone()));
    }
    #[cfg(not(feature = "audio"))]
    let _ = config;
    default_platform()
}

fn log_journey_params(journey: &str, params: &ParamsConfig) {
    let mut generator = match params.persist.then(|| params.resolved_store_path()).flatten() {
        Some(path) => match JsonFileParamStore::open(&path) {
            Ok(store) => {
                VisualParamGenerator::with_store(params.overrides.clone(), Box::new(store))
            }
            Err(e) => {
                warn!("Param store {:?} unavailable: {}", path, e);
                VisualParamGenerator::new(params.overrides.clone())
            }
        },
        None => VisualParamGenerator::new(params.overrides.clone()),
    };

    let resolved = generator.resolve(journey);
    let p = &resolved.params;
    info!(
        "Journey '{}' ({:?}): coeffs=({:.1}, {:.1}, {:.1}) freqs=({:.2}, {:.2}, {:.2})",
        journey,
        resolved.source,
        p.coeff_a,
        p.coeff_b,
        p.coeff_c,
        p.freq_a,
        p.freq_b,
        p.freq_c
    );
    info!(
        "Journey '{}': color={} opacity={:.2} cycles={}",
        journey,
        p.color,
        p.opacity,
        p.max_cycles
    );
}

fn run_frames(
    session: &mut VisualizationSession,
    handles: Option<&AudioHandles>,
    offline: bool,
    config: &ShifterConfig,
    frames: u64,
) {
    let mut clock = shifter_core::FrameClock::new(config.render.target_fps);
    let pumped = handles.filter(|_| offline).map(|h| {
        let per_frame = h.graph.sample_rate() as f32 * clock.frame_target().as_secs_f32();
        (h, per_frame.round().max(1.0) as usize)
    });

    for frame in 0..frames {
        let now = clock.wait_next();
        if let Some((handles, per_frame)) = pumped {
            handles.graph.pump(per_frame);
        }

        let summary = session
            .tick(now)
            .map(|scene| (frame % SUMMARY_INTERVAL == 0).then(|| scene.to_string()));
        match summary {
            Some(Some(text)) => {
                info!("Frame {}: {}", frame, text);
                if let Some(phase) = session.breathing_phase() {
                    info!("Breathing: {:?}", phase);
                }
            }
            Some(None) => {}
            None if session.is_stopped() => {
                info!("Session ended after {} frames", frame);
                break;
            }
            None => {}
        }
    }
}

fn list_devices() {
    #[cfg(feature = "audio")]
    for name in shifter_core::CpalPlatform::list_devices() {
        println!("{}", name);
    }
    #[cfg(not(feature = "audio"))]
    println!("Built without audio output support");
}

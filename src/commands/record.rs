//! Live recording with a bar waveform.
//!
//! Drives a capture session and the live visualizer from one cooperative
//! loop, then writes the recording as WAV. Supports external triggers via
//! SIGUSR1 signal.

use crate::config::WavebarsConfig;
use crate::tui::{error, RecorderStatus, RecorderTui, RecordingCommand};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use wavebars::capture::CaptureDevice;
use wavebars::render::BarStyleOverrides;
use wavebars::{AudioBlob, CaptureSession, CpalCaptureDevice, LiveVisualizer, SessionState, WavebarsError, WidthPolicy};

const INPUT_POLL: Duration = Duration::from_millis(16);
const START_ATTEMPTS: u32 = 3;
const START_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How a recording loop ended.
#[derive(Debug)]
enum Outcome {
    Saved(AudioBlob),
    Cancelled,
    Faulted(WavebarsError),
}

/// Opens the device, retrying while the failure leaves the session idle
/// (a busy or briefly missing device).
async fn start_with_retry<D: CaptureDevice>(
    session: &mut CaptureSession<D>,
    attempts: u32,
    delay: Duration,
) -> wavebars::Result<()> {
    let mut attempt = 1;
    loop {
        match session.start(Instant::now()) {
            Ok(()) => return Ok(()),
            Err(e) if e.is_retryable_start_failure() && attempt < attempts => {
                tracing::warn!("Start attempt {attempt}/{attempts} failed: {e}");
                attempt += 1;
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Stops the session when saving and reads the result.
///
/// The fault check runs after `stop`, which can itself fault while
/// finalizing the recording.
fn finish<D: CaptureDevice>(session: &mut CaptureSession<D>, save: bool, now: Instant) -> Outcome {
    if save {
        session.stop(now);
    }
    if session.state() == SessionState::Faulted {
        let fault = session
            .error()
            .cloned()
            .unwrap_or_else(|| WavebarsError::RecorderFault("recording faulted".to_string()));
        return Outcome::Faulted(fault);
    }
    if !save {
        return Outcome::Cancelled;
    }
    match session.blob() {
        Some(blob) => Outcome::Saved(blob.clone()),
        None => Outcome::Faulted(WavebarsError::RecorderFault("recording produced no audio".to_string())),
    }
}

/// Records from the configured input device until the user saves or cancels.
///
/// On save the WAV file goes to `output`, or to the temp directory, and its
/// path is printed.
///
/// # Errors
/// - If the configuration cannot be loaded or is invalid
/// - If the device cannot be opened
/// - If the recording faults or cannot be written
pub async fn handle_record(output: Option<PathBuf>, policy: Option<WidthPolicy>) -> Result<(), anyhow::Error> {
    tracing::info!("=== wavebars recorder started ===");

    let config_data = match WavebarsConfig::load() {
        Ok(config) => config,
        Err(err) => {
            tracing::error!("Failed to load configuration: {err}");
            error::report(
                "Configuration Error",
                &anyhow::anyhow!("{err}\n\nPlease check your ~/.config/wavebars/wavebars.toml file and try again."),
            )?;
            return Err(err);
        }
    };

    tracing::info!(
        "Configuration loaded: device={}, sample_rate={}Hz, fft_size={}, interval={}ms",
        config_data.audio.device,
        config_data.audio.sample_rate,
        config_data.analyser.fft_size,
        config_data.sampler.interval_ms
    );

    let mut renderer_options = config_data.renderer_options(&BarStyleOverrides::default());
    if let Some(policy) = policy {
        renderer_options.width_policy = policy;
    }

    let mut visualizer = match LiveVisualizer::new(
        config_data.analyser_options(),
        config_data.sampler_options(),
        renderer_options,
    ) {
        Ok(visualizer) => visualizer,
        Err(e) => {
            let e = anyhow::Error::from(e);
            error::report("Configuration Error", &e)?;
            return Err(e);
        }
    };

    let device = CpalCaptureDevice::new(config_data.audio.device.clone(), config_data.audio.sample_rate);
    let mut session = CaptureSession::new(device);
    session.on_complete(|blob| tracing::info!("Recording complete: {} bytes of {}", blob.len(), blob.mime_type()));
    session.on_error(|e| tracing::error!("Recording error: {e}"));

    if let Err(e) = start_with_retry(&mut session, START_ATTEMPTS, START_RETRY_DELAY).await {
        let e = anyhow::Error::from(e);
        error::report("Recording Error", &e)?;
        return Err(e);
    }

    let mut tui = RecorderTui::new().map_err(|e| anyhow::anyhow!("Failed to initialize UI: {e}"))?;

    let term = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&term))
        .map_err(|e| anyhow::anyhow!("Failed to register signal handler: {e}"))?;

    tracing::debug!("Entering recording loop. Press 'Enter' to save or 'Escape'/'q' to cancel.");
    let mut should_save = false;

    loop {
        if term.load(Ordering::Relaxed) {
            tracing::info!("Received SIGUSR1: saving via external trigger");
            should_save = true;
            break;
        }

        let now = Instant::now();
        session.poll(now);
        if session.state() == SessionState::Faulted {
            break;
        }

        visualizer.set_viewport(tui.waveform_viewport()?);
        if let Some(report) = visualizer.tick(now, Some(&session), tui.surface_mut()) {
            tui.set_report(report);
        }

        let spectrum = visualizer.analyser_mut().refresh_frequency().map(<[u8]>::to_vec);
        let status = RecorderStatus {
            state: session.state(),
            elapsed_secs: session.elapsed_secs(),
            samples: visualizer.timeline().len(),
            level: visualizer.timeline().read().last().copied().unwrap_or(0.0),
        };
        tui.draw(&status, spectrum.as_deref())?;

        match tui.handle_input(INPUT_POLL)? {
            RecordingCommand::Continue => {}
            RecordingCommand::Save => {
                should_save = true;
                break;
            }
            RecordingCommand::Cancel => break,
            RecordingCommand::TogglePause => session.toggle_pause(Instant::now()),
        }
    }

    let outcome = finish(&mut session, should_save, Instant::now());
    visualizer.dispose();
    tui.cleanup().map_err(|e| anyhow::anyhow!("Cleanup failed: {e}"))?;

    let blob = match outcome {
        Outcome::Saved(blob) => blob,
        Outcome::Cancelled => {
            tracing::info!("Recording cancelled after {}s", session.elapsed_secs());
            return Ok(());
        }
        Outcome::Faulted(fault) => {
            let e = anyhow::Error::from(fault);
            error::report("Recording Error", &e)?;
            return Err(e);
        }
    };

    let path = output.unwrap_or_else(|| std::env::temp_dir().join("wavebars-recording.wav"));
    fs::write(&path, blob.bytes()).map_err(|e| {
        tracing::error!("Failed to save recording: {}", e);
        anyhow::anyhow!("Failed to write '{}': {e}", path.display())
    })?;

    tracing::info!("Saved {} ({}s)", path.display(), session.elapsed_secs());
    println!("{}", path.display());

    tracing::info!("=== wavebars recorder exited successfully ===");
    Ok(())
}

//! Static waveform viewer with a seekable playhead.

use crate::config::WavebarsConfig;
use crate::tui::{error, ViewerCommand, ViewerTui};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use wavebars::render::{BarStyleOverrides, SeekOptions};
use wavebars::{PeakCache, StaticWaveform};

const INPUT_POLL: Duration = Duration::from_millis(16);

/// Shows the waveform of `file` and lets the user move a playhead.
///
/// No audio is played; the playhead follows seek input only.
///
/// # Errors
/// - If the configuration or file cannot be loaded
/// - If the file cannot be decoded
/// - If the terminal cannot be driven
pub async fn handle_view(file: PathBuf, drag: bool) -> Result<(), anyhow::Error> {
    let config_data = WavebarsConfig::load()?;
    let blob = super::load_blob(&file)?;
    let cache = PeakCache::new();

    let seek = SeekOptions {
        drag,
        ..SeekOptions::default()
    };
    let mut waveform = StaticWaveform::new(config_data.renderer_options(&BarStyleOverrides::default()), seek)?;
    waveform
        .seek_mut()
        .on_seek(|t| tracing::debug!("Seek to {t:.2}s"));
    waveform
        .seek_mut()
        .on_drag_end(|t| tracing::debug!("Drag ended at {t:.2}s"));

    let title = file
        .file_name()
        .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().to_string());
    let mut tui = ViewerTui::new(title)?;
    let mut viewport = tui.waveform_viewport()?;
    waveform.set_viewport(viewport);

    if let Err(e) = waveform.load(&cache, &blob, config_data.render.sample_count).await {
        tui.cleanup()?;
        let e = anyhow::Error::from(e);
        error::report("Decode Error", &e)?;
        return Err(e);
    }
    waveform.start(Instant::now());

    loop {
        waveform.tick(Instant::now(), tui.surface_mut());
        tui.draw(
            waveform.current_time(),
            waveform.duration(),
            waveform.seek_mut().is_dragging(),
        )?;

        match tui.handle_input(INPUT_POLL)? {
            ViewerCommand::Continue => {}
            ViewerCommand::Quit => break,
            ViewerCommand::Key(key) => {
                if let Some(t) = waveform.handle_key(key) {
                    waveform.set_current_time(t);
                }
            }
            ViewerCommand::Pointer(event) => {
                if let Some(t) = waveform.handle_pointer(event) {
                    waveform.set_current_time(t);
                }
            }
            ViewerCommand::Resize => {
                let resized = tui.waveform_viewport()?;
                if resized != viewport {
                    viewport = resized;
                    waveform.set_viewport(viewport);
                    // Peaks derived from the view width are re-extracted from the cached decode.
                    if config_data.render.sample_count == 0 {
                        if let Err(e) = waveform.load(&cache, &blob, 0).await {
                            tracing::warn!("Reload after resize failed: {e}");
                        }
                    }
                }
            }
        }
    }

    waveform.dispose();
    tui.cleanup()?;
    Ok(())
}

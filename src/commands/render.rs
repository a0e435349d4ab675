//! SVG export of a file's waveform.

use crate::config::WavebarsConfig;
use std::fs;
use std::path::PathBuf;
use wavebars::render::geometry::bar_count;
use wavebars::render::svg::to_svg;
use wavebars::render::{BarStyleOverrides, DisplayList, FrameData, Playhead};
use wavebars::{PeakCache, Renderer, Viewport};

pub struct RenderArgs {
    pub file: PathBuf,
    pub output: PathBuf,
    pub width: f32,
    pub height: f32,
    /// Peaks to extract; 0 fills the width.
    pub bars: usize,
    /// Playhead position in seconds.
    pub position: Option<f64>,
    /// Style values given for this render only.
    pub style: BarStyleOverrides,
}

/// Decodes a file, renders one static frame and writes it as SVG.
///
/// # Errors
/// - If the configuration or file cannot be loaded
/// - If the style or size is invalid
/// - If the file cannot be decoded
/// - If the SVG cannot be written
pub async fn handle_render(args: RenderArgs) -> Result<(), anyhow::Error> {
    if !(args.width > 0.0 && args.height > 0.0) {
        return Err(anyhow::anyhow!(
            "Image size must be positive, got {}x{}",
            args.width,
            args.height
        ));
    }

    let config_data = WavebarsConfig::load()?;
    let mut renderer = Renderer::new(config_data.renderer_options(&args.style))?;
    renderer.set_viewport(Viewport::new(args.width, args.height));

    let count = match args.bars {
        0 => bar_count(args.width, &renderer.options().style).max(1),
        n => n,
    };

    let blob = super::load_blob(&args.file)?;
    let peaks = PeakCache::new().get_or_compute(&blob, count).await?;

    let playhead = args.position.map(|current_time| Playhead {
        current_time,
        duration: peaks.duration_secs,
    });
    let mut list = DisplayList::new();
    let report = renderer.render_frame(
        &mut list,
        FrameData::Static {
            peaks: peaks.peaks.as_slice(),
            playhead,
        },
    );

    let svg = to_svg(&list, args.width, args.height, None);
    fs::write(&args.output, svg).map_err(|e| anyhow::anyhow!("Failed to write '{}': {e}", args.output.display()))?;

    tracing::info!(
        "Rendered {} bars of {:.2}s to {}",
        report.bars_drawn,
        peaks.duration_secs,
        args.output.display()
    );
    eprintln!(
        "Wrote {} ({} bars, {:.2}s)",
        args.output.display(),
        report.bars_drawn,
        peaks.duration_secs
    );
    Ok(())
}

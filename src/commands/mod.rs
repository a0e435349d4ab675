//! Application command handlers for wavebars.
//!
//! # Commands
//! - `record`: Live recording with a scrolling bar waveform (default)
//! - `view`: Static waveform of an audio file with a seekable playhead
//! - `render`: Export a file's waveform as SVG
//! - `peaks`: Print a file's normalized peak series
//! - `config`: Open configuration file in user's preferred editor
//! - `list_devices`: List available audio input devices
//! - `logs`: Display recent log entries

pub mod config;
pub mod list_devices;
pub mod logs;
pub mod peaks;
pub mod record;
pub mod render;
pub mod view;

pub use config::handle_config;
pub use list_devices::handle_list_devices;
pub use logs::handle_logs;
pub use peaks::handle_peaks;
pub use record::handle_record;
pub use render::handle_render;
pub use view::handle_view;

use std::path::Path;
use wavebars::AudioBlob;

fn print_banner() {
    println!();
    println!(" ╻ ╻┏━┓╻ ╻┏━╸┏┓ ┏━┓┏━┓┏━┓");
    println!(" ┃╻┃┣━┫┃┏┛┣╸ ┣┻┓┣━┫┣┳┛┗━┓");
    println!(" ┗┻┛╹ ╹┗┛ ┗━╸┗━┛╹ ╹╹┗╸┗━┛");
    println!();
}

/// Reads an audio file into a blob, typing it from its extension.
///
/// # Errors
/// - If the file cannot be read
fn load_blob(path: &Path) -> anyhow::Result<AudioBlob> {
    let blob =
        AudioBlob::from_path(path).map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))?;
    tracing::info!(
        "Loaded {} ({} bytes, {})",
        path.display(),
        blob.len(),
        blob.mime_type()
    );
    Ok(blob)
}

//! Print a file's normalized peak series.

use std::path::PathBuf;
use std::sync::Arc;
use wavebars::{extract, AudioDecoder};

/// Decodes `file` and prints `count` peaks, one per line.
///
/// The clip duration and sample rate go to stderr so stdout stays pipeable.
///
/// # Errors
/// - If the file cannot be read or decoded
pub async fn handle_peaks(file: PathBuf, count: usize) -> Result<(), anyhow::Error> {
    let blob = super::load_blob(&file)?;
    let decoder = Arc::new(AudioDecoder::new());
    let decoded = decoder.decode_async(blob).await?;
    let peaks = extract(&decoded.samples, count);

    eprintln!(
        "{}: {:.2}s, {}Hz, {} channel(s), {} peaks",
        file.display(),
        decoded.duration_secs(),
        decoded.sample_rate,
        decoded.channels,
        peaks.as_slice().len()
    );
    for peak in peaks.as_slice() {
        println!("{peak:.4}");
    }
    Ok(())
}

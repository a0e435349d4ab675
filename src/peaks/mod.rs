//! Downsampling PCM into normalized per-bar amplitudes.

mod cache;

pub use cache::{PeakCache, SourceKey, SourcePeaks};

use std::ops::Deref;

/// Normalized average absolute amplitude per time bucket, each in `[0, 1]`.
///
/// Whenever any value is nonzero the largest value is exactly `1.0`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeakSeries(Vec<f32>);

impl PeakSeries {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0
    }

    /// Largest value in the series, `0.0` when empty.
    pub fn max(&self) -> f32 {
        self.0.iter().copied().fold(0.0, f32::max)
    }
}

impl Deref for PeakSeries {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl AsRef<[f32]> for PeakSeries {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// Averages `|sample|` over equal-sized blocks, then rescales by the global maximum.
///
/// A `sample_count` larger than the number of samples is clamped to
/// `samples.len()`, so the block size is never zero.
pub fn extract(samples: &[f32], sample_count: usize) -> PeakSeries {
    let n = sample_count.min(samples.len());
    if n == 0 {
        return PeakSeries::default();
    }

    let block_size = (samples.len() / n).max(1);

    let mut peaks: Vec<f32> = samples
        .chunks_exact(block_size)
        .take(n)
        .map(|block| block.iter().map(|s| s.abs()).sum::<f32>() / block_size as f32)
        .collect();

    // Normalize against the whole clip so bars are comparable in scale.
    let max_peak = peaks.iter().copied().fold(0.0f32, f32::max);
    if max_peak > 0.0 {
        for peak in &mut peaks {
            *peak /= max_peak;
        }
    }

    PeakSeries(peaks)
}

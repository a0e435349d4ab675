//! Audio waveform toolkit: decode clips into normalized peaks, capture live
//! audio into an amplitude timeline, and draw both as bar charts.
//!
//! Static path: [`decode`] -> [`peaks`] -> [`render`].
//! Live path: [`capture`] -> [`analyser`] -> [`sampler`] -> [`render`].
//! [`visualizer`] wires each path into a single object with a `tick`.

pub mod analyser;
pub mod capture;
pub mod decode;
pub mod error;
pub mod peaks;
pub mod render;
pub mod sampler;
pub mod visualizer;

pub use analyser::{AnalyserBridge, AnalyserOptions};
pub use capture::{CaptureSession, CpalCaptureDevice, SessionState};
pub use decode::{AudioBlob, AudioDecoder, DecodedAudio};
pub use error::{Result, WavebarsError};
pub use peaks::{extract, PeakCache, PeakSeries};
pub use render::{BarStyle, Renderer, RendererOptions, Viewport, WidthPolicy};
pub use sampler::{AmplitudeSampler, AmplitudeTimeline, SamplerOptions};
pub use visualizer::{LiveVisualizer, StaticWaveform};

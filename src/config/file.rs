//! Configuration file management for wavebars.
//!
//! This module handles loading and saving application configuration from TOML files
//! and converting the loaded values into the option structs of the core pipeline.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use wavebars::render::{BarStyleOverrides, Color, PlayheadStyle};
use wavebars::{AnalyserOptions, BarStyle, RendererOptions, SamplerOptions, WidthPolicy};

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `wavebars list-devices`
    /// - device name from `wavebars list-devices`
    #[serde(default = "default_device")]
    pub device: String,
    /// Requested sample rate in Hz; the device's native rate wins when they differ
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_device() -> String {
    "default".to_string()
}

fn default_sample_rate() -> u32 {
    44100
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// Live analyser configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalyserConfig {
    /// Samples per analysis frame, a power of two between 32 and 32768
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    /// Spectrum smoothing between frames, 0.0 (none) to 1.0 (frozen)
    #[serde(default = "default_smoothing")]
    pub smoothing: f32,
}

fn default_fft_size() -> usize {
    AnalyserOptions::default().fft_size
}

fn default_smoothing() -> f32 {
    AnalyserOptions::default().smoothing
}

impl Default for AnalyserConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            smoothing: default_smoothing(),
        }
    }
}

/// Amplitude sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SamplerConfig {
    /// Milliseconds between amplitude samples while recording
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    /// Gain applied to the RMS of each sample before clamping to 1.0
    #[serde(default = "default_amplitude_scale")]
    pub amplitude_scale: f32,
}

fn default_interval_ms() -> u64 {
    50
}

fn default_amplitude_scale() -> f32 {
    SamplerOptions::default().amplitude_scale
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            amplitude_scale: default_amplitude_scale(),
        }
    }
}

/// Bar appearance. Unset keys fall back to the built-in style.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StyleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bar_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gap: Option<f32>,
    /// Corner radius; 0 draws square bars
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub radius: Option<f32>,
    /// Fraction of the drawing height a full-scale bar may take, in (0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_scale: Option<f32>,
    /// Bar color as #rgb, #rrggbb or #rrggbbaa
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl From<&StyleConfig> for BarStyleOverrides {
    fn from(style: &StyleConfig) -> Self {
        Self {
            bar_width: style.bar_width,
            gap: style.gap,
            radius: style.radius,
            height_scale: style.height_scale,
            color: style.color,
        }
    }
}

/// Renderer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// "fixed" squeezes the whole recording into the view, "grow" scrolls with it
    #[serde(default)]
    pub width_policy: WidthPolicy,
    /// Draw placeholder bars before any audio arrives
    #[serde(default = "default_true")]
    pub show_idle: bool,
    #[serde(default = "default_device_pixel_ratio")]
    pub device_pixel_ratio: f32,
    #[serde(default = "default_playhead_color")]
    pub playhead_color: Color,
    #[serde(default = "default_playhead_width")]
    pub playhead_width: f32,
    /// Peaks extracted per clip; 0 derives the count from the view width
    #[serde(default)]
    pub sample_count: usize,
}

fn default_true() -> bool {
    true
}

fn default_device_pixel_ratio() -> f32 {
    1.0
}

fn default_playhead_color() -> Color {
    PlayheadStyle::default().color
}

fn default_playhead_width() -> f32 {
    PlayheadStyle::default().width
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width_policy: WidthPolicy::default(),
            show_idle: true,
            device_pixel_ratio: default_device_pixel_ratio(),
            playhead_color: default_playhead_color(),
            playhead_width: default_playhead_width(),
            sample_count: 0,
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WavebarsConfig {
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub analyser: AnalyserConfig,
    #[serde(default)]
    pub sampler: SamplerConfig,
    #[serde(default)]
    pub style: StyleConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl WavebarsConfig {
    /// Loads configuration from the user's config directory, writing the
    /// defaults first if no file exists yet.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the config file cannot be read or written
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        if !config_path.exists() {
            tracing::info!("No config file found, writing defaults to {}", config_path.display());
            let config = Self::default();
            config.save()?;
            return Ok(config);
        }
        let config_content = fs::read_to_string(&config_path)?;
        Self::from_toml(&config_content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    /// - If the TOML is malformed or a value has the wrong type
    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        toml::from_str(content).map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }

    pub fn analyser_options(&self) -> AnalyserOptions {
        AnalyserOptions {
            fft_size: self.analyser.fft_size,
            smoothing: self.analyser.smoothing,
        }
    }

    pub fn sampler_options(&self) -> SamplerOptions {
        SamplerOptions {
            interval: Duration::from_millis(self.sampler.interval_ms),
            amplitude_scale: self.sampler.amplitude_scale,
        }
    }

    /// Resolves the bar style: `per_call` wins over the `[style]` section,
    /// which wins over the built-in default.
    pub fn bar_style(&self, per_call: &BarStyleOverrides) -> BarStyle {
        BarStyleOverrides::resolve(per_call, &BarStyleOverrides::from(&self.style))
    }

    pub fn renderer_options(&self, per_call: &BarStyleOverrides) -> RendererOptions {
        RendererOptions {
            style: self.bar_style(per_call),
            width_policy: self.render.width_policy,
            show_idle: self.render.show_idle,
            device_pixel_ratio: self.render.device_pixel_ratio,
            playhead: PlayheadStyle {
                color: self.render.playhead_color,
                width: self.render.playhead_width,
            },
        }
    }
}

/// Retrieves the path to the config file, creating its directory if needed.
///
/// # Errors
/// - If the home directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let home_dir = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    let config_dir = home_dir.join(".config").join("wavebars");
    fs::create_dir_all(&config_dir)?;
    Ok(config_dir.join("wavebars.toml"))
}

//! Configuration management for wavebars.
//!
//! Settings live in a single TOML file in the user's config directory. Every
//! field has a default so partial files load; the file is written with
//! defaults the first time it is needed.

pub mod file;

pub use file::{
    get_config_path, AnalyserConfig, AudioConfig, RenderConfig, SamplerConfig, StyleConfig, WavebarsConfig,
};

//! Configuration file editor command.
//!
//! Opens the wavebars configuration file in the user's preferred editor.

use crate::config::{self, WavebarsConfig};
use std::process::Command;

/// Opens the configuration file in the user's preferred editor.
///
/// The file is written with defaults first if it does not exist. Tries
/// `$EDITOR`, then nano, then vi.
///
/// # Errors
/// - If the config file cannot be created
/// - If no editor can be found or executed
pub fn handle_config() -> anyhow::Result<()> {
    let config_path = config::get_config_path()?;
    if !config_path.exists() {
        WavebarsConfig::default().save()?;
    }

    tracing::info!("Opening config file: {}", config_path.display());

    let editor = find_editor()?;
    tracing::debug!("Using editor: {}", editor);

    let status = Command::new(&editor).arg(&config_path).status().map_err(|e| {
        anyhow::anyhow!("Failed to open editor '{editor}': {e}. Make sure the editor is installed and accessible.")
    })?;

    if !status.success() {
        return Err(anyhow::anyhow!(
            "Editor exited with error code: {}",
            status.code().unwrap_or(-1)
        ));
    }

    // Catch mistakes now rather than on the next recording.
    if let Err(e) = WavebarsConfig::load() {
        eprintln!("Warning: {e}");
    }

    tracing::info!("Config file edited successfully");
    Ok(())
}

fn find_editor() -> anyhow::Result<String> {
    if let Ok(editor) = std::env::var("EDITOR") {
        if !editor.is_empty() {
            return Ok(editor);
        }
    }

    for editor in &["nano", "vi"] {
        if is_editor_available(editor) {
            return Ok(editor.to_string());
        }
    }

    Err(anyhow::anyhow!("No editor found. Please set the $EDITOR environment variable."))
}

fn is_editor_available(editor: &str) -> bool {
    Command::new("which")
        .arg(editor)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

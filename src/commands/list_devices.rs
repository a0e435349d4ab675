//! List available audio input devices.

use wavebars::capture::list_input_devices;

/// Lists all available audio input devices on the system.
///
/// # Errors
/// - If the audio host cannot enumerate devices
pub fn handle_list_devices() -> Result<(), anyhow::Error> {
    let devices = list_input_devices()?;

    if devices.is_empty() {
        println!("No audio input devices found on this system.");
        return Ok(());
    }

    super::print_banner();
    println!("Available audio input devices:");
    println!();

    for device in &devices {
        let default_indicator = if device.is_default { " [DEFAULT]" } else { "" };
        let config_info = match device.native_config {
            Some((sample_rate, channels)) => format!(" ({sample_rate}Hz, {channels} channels)"),
            None => " (configuration unavailable)".to_string(),
        };

        println!("  ID: {}", device.index);
        println!("    Name: {}{}", device.name, default_indicator);
        println!("    Config:{config_info}");
        println!();
    }

    println!("Set [audio] device in the config file to an ID or name above.");
    Ok(())
}

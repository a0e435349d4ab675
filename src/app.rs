//! Application orchestration and command routing.
//!
//! Handles command-line argument parsing and delegates to appropriate command handlers.

use crate::commands;
use crate::logging;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::io;
use std::path::PathBuf;
use std::process;
use wavebars::render::{BarStyleOverrides, Color};
use wavebars::WidthPolicy;

/// Audio waveforms as bar charts, live from the microphone or from files
#[derive(Parser)]
#[command(name = "wavebars")]
#[command(version)]
#[command(about = "Audio waveforms as bar charts, live from the microphone or from files")]
#[command(long_about = "Audio waveforms as bar charts, live from the microphone or from files.\n\nDEFAULT COMMAND:\n    If no command is specified, 'record' is used by default.\n    Record options (-o, --policy) can be used without explicitly saying 'record'.\n\nEXAMPLES:\n    # Record from the configured microphone and save a WAV file\n    $ wavebars -o memo.wav\n\n    # Record with a scrolling waveform instead of a squeezed one\n    $ wavebars record --policy grow\n\n    # Browse a file's waveform and move the playhead\n    $ wavebars view song.mp3\n\n    # Export a waveform image\n    $ wavebars render song.mp3 -o song.svg --width 800 --height 120\n\n    # Print 32 normalized peaks\n    $ wavebars peaks song.mp3 --count 32")]
#[command(
    after_help = "CONFIGURATION:\n    Config file:        ~/.config/wavebars/wavebars.toml\n    Logs:               ~/.local/state/wavebars/wavebars.log.*"
)]
struct Cli {
    /// Write the recording to FILE (record default command)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Canvas width policy for the live waveform (record default command)
    #[arg(long, value_name = "POLICY")]
    policy: Option<WidthPolicy>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Record audio with a live bar waveform (default)
    ///
    /// Press Enter to stop and save, Space to pause/resume, Escape/q to cancel.
    /// Sending SIGUSR1 stops and saves as if Enter was pressed.
    #[command(visible_alias = "r")]
    Record {
        /// Write the recording to FILE instead of the temp directory
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// "grow" scrolls with the recording, "fixed" squeezes it into the view
        #[arg(long, value_name = "POLICY")]
        policy: Option<WidthPolicy>,
    },

    /// Show the waveform of an audio file with a seekable playhead
    ///
    /// Left/Right step 5 seconds, Home/End jump to the edges, clicking or
    /// dragging moves the playhead. No audio is played.
    #[command(visible_alias = "v")]
    View {
        /// Path to the audio file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Report continuous drag positions instead of single clicks
        #[arg(long)]
        drag: bool,
    },

    /// Export the waveform of an audio file as SVG
    Render {
        /// Path to the audio file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Where to write the SVG
        #[arg(short, long, value_name = "OUT")]
        output: PathBuf,

        /// Image width in pixels
        #[arg(long, default_value_t = 600.0)]
        width: f32,

        /// Image height in pixels
        #[arg(long, default_value_t = 80.0)]
        height: f32,

        /// Number of peaks to extract; 0 fills the width
        #[arg(long, default_value_t = 0)]
        bars: usize,

        /// Draw a playhead at this many seconds
        #[arg(long, value_name = "SECONDS")]
        position: Option<f64>,

        /// Bar width in pixels, overriding the config file
        #[arg(long, value_name = "PX")]
        bar_width: Option<f32>,

        /// Gap between bars in pixels, overriding the config file
        #[arg(long, value_name = "PX")]
        gap: Option<f32>,

        /// Bar color as #rrggbb, overriding the config file
        #[arg(long, value_name = "HEX")]
        color: Option<Color>,
    },

    /// Print the normalized peak series of an audio file
    Peaks {
        /// Path to the audio file
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Number of peaks
        #[arg(short = 'n', long, default_value_t = 100)]
        count: usize,
    },

    /// Open configuration file in your preferred editor
    ///
    /// Uses $EDITOR environment variable or falls back to nano/vi.
    #[command(visible_alias = "c")]
    Config,

    /// List available audio input devices
    ///
    /// Shows device IDs, names, and configurations to help configure
    /// the correct input device in wavebars.toml.
    #[command(name = "list-devices")]
    ListDevices,

    /// Show recent log entries from the application
    ///
    /// Display the last 50 lines of the most recent log file.
    Logs,

    /// Generate shell completion script
    ///
    /// Examples:
    ///   wavebars completions bash > wavebars.bash
    ///   wavebars completions zsh > _wavebars
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Runs the main application based on command-line arguments.
///
/// # Errors
/// - If logging initialization fails
/// - If command execution fails (configuration, device, decoding, terminal)
pub async fn run() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    // Commands that don't need logging
    match &cli.command {
        Some(Commands::Completions { shell }) => {
            generate(*shell, &mut Cli::command(), "wavebars", &mut io::stdout());
            return Ok(());
        }
        Some(Commands::ListDevices) => {
            return match commands::handle_list_devices() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        Some(Commands::Logs) => {
            return match commands::handle_logs() {
                Ok(()) => Ok(()),
                Err(e) => {
                    eprintln!("Error: {e}");
                    process::exit(1);
                }
            };
        }
        _ => {}
    }

    logging::init_logging()?;
    tracing::debug!("wavebars {}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        None => commands::handle_record(cli.output, cli.policy).await?,
        Some(Commands::Record { output, policy }) => {
            // Explicit record options win over the top-level ones.
            commands::handle_record(output.or(cli.output), policy.or(cli.policy)).await?;
        }
        Some(Commands::View { file, drag }) => commands::handle_view(file, drag).await?,
        Some(Commands::Render {
            file,
            output,
            width,
            height,
            bars,
            position,
            bar_width,
            gap,
            color,
        }) => {
            commands::handle_render(commands::render::RenderArgs {
                file,
                output,
                width,
                height,
                bars,
                position,
                style: BarStyleOverrides {
                    bar_width,
                    gap,
                    color,
                    ..Default::default()
                },
            })
            .await?;
        }
        Some(Commands::Peaks { file, count }) => commands::handle_peaks(file, count).await?,
        Some(Commands::Config) => commands::handle_config()?,
        Some(Commands::Completions { .. }) | Some(Commands::ListDevices) | Some(Commands::Logs) => {
            unreachable!("These commands are handled earlier")
        }
    }

    Ok(())
}

//! Full-screen error display.
//!
//! Shows a failure on a red screen with a hint derived from the error kind,
//! and waits for a key press before returning.

use crossterm::{
    event::{self, Event},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, widgets::Paragraph, widgets::Wrap};
use std::io::{self, Stdout};
use wavebars::WavebarsError;

pub struct ErrorScreen {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl ErrorScreen {
    /// Creates a new error screen and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        Ok(ErrorScreen { terminal })
    }

    /// Shows `title` and `error`, plus a hint when the error is a known kind.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show(&mut self, title: &str, error: &anyhow::Error) -> anyhow::Result<()> {
        let mut message = format!("{title}\n\n{error}");
        if let Some(hint) = hint_for(error) {
            message.push_str("\n\n");
            message.push_str(hint);
        }
        self.show_message(&message)
    }

    /// Displays a message on a full red screen until a key is pressed.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn show_message(&mut self, message: &str) -> anyhow::Result<()> {
        let background = Style::default().bg(Color::Rgb(255, 0, 0));
        loop {
            self.terminal.draw(|frame| {
                let area = frame.area();
                frame.buffer_mut().set_style(area, background);

                let text = Text::styled(message, background.fg(Color::Rgb(255, 255, 255)));
                let lines = u16::try_from(text.height()).unwrap_or(u16::MAX);
                let padding_x = area.width / 10;
                let centered = Rect {
                    x: area.x + padding_x,
                    y: area.y + area.height.saturating_sub(lines) / 2,
                    width: area.width.saturating_sub(padding_x * 2),
                    height: area.height.min(lines.saturating_add(2)),
                };

                let paragraph = Paragraph::new(text)
                    .alignment(Alignment::Center)
                    .wrap(Wrap { trim: true });
                frame.render_widget(paragraph, centered);
            })?;

            if event::poll(std::time::Duration::from_millis(100))? {
                if let Event::Key(_) = event::read()? {
                    break;
                }
            }
        }
        Ok(())
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

impl Drop for ErrorScreen {
    fn drop(&mut self) {
        let _ = self.cleanup();
    }
}

/// Shows `error` full screen, then restores the terminal.
///
/// # Errors
/// - If the terminal cannot be driven
pub fn report(title: &str, error: &anyhow::Error) -> anyhow::Result<()> {
    let mut screen = ErrorScreen::new()?;
    screen.show(title, error)?;
    screen.cleanup()
}

fn hint_for(error: &anyhow::Error) -> Option<&'static str> {
    match error.downcast_ref::<WavebarsError>()? {
        WavebarsError::PermissionDenied(_) => Some("Allow microphone access for this terminal and try again."),
        WavebarsError::DeviceUnavailable(_) => {
            Some("Run 'wavebars list-devices' and set [audio] device in the config file.")
        }
        WavebarsError::InvalidConfig(_) => Some("Run 'wavebars config' to fix the configuration file."),
        WavebarsError::EmptySource => Some("The file is empty."),
        WavebarsError::DecodeFailed { .. } => Some("The file is not in a supported audio format."),
        WavebarsError::RecorderFault(_) => Some("The recording was discarded."),
    }
}

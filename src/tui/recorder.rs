//! Terminal screen for a live recording.
//!
//! The top area shows the bar waveform painted by the live visualizer, the
//! bottom area a spectrum of the analyser's frequency bytes, and a one-line
//! footer the session state.

use super::painter::{viewport_for, DisplayListView};
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    text::{Line, Span},
    widgets::{Paragraph, Sparkline},
};
use std::io::{stdout, Stdout};
use std::time::Duration;
use wavebars::render::geometry::compress_max_pool;
use wavebars::render::{DisplayList, FrameReport};
use wavebars::{SessionState, Viewport};

const FOOTER_HEIGHT: u16 = 1;

/// User input command during recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingCommand {
    /// Continue recording (no key pressed)
    Continue,
    /// Stop and save (Enter key)
    Save,
    /// Exit without saving (Escape, 'q' or Ctrl+C)
    Cancel,
    /// Pause/resume recording (Space key)
    TogglePause,
}

/// What the footer shows.
#[derive(Debug, Clone, Copy)]
pub struct RecorderStatus {
    pub state: SessionState,
    pub elapsed_secs: u64,
    pub samples: usize,
    /// Most recent amplitude in `[0, 1]`.
    pub level: f32,
}

pub struct RecorderTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    surface: DisplayList,
    report: Option<FrameReport>,
}

impl RecorderTui {
    /// Creates a new TUI instance and enters alternate screen mode.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    /// - If raw mode cannot be enabled
    /// - If alternate screen cannot be entered
    pub fn new() -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            surface: DisplayList::new(),
            report: None,
        })
    }

    /// Waveform and spectrum areas for the current terminal size.
    fn layout(area: Rect) -> (Rect, Rect, Rect) {
        let content_height = area.height.saturating_sub(FOOTER_HEIGHT);
        let waveform_height = content_height / 3 * 2;
        let waveform = Rect::new(area.x, area.y, area.width, waveform_height);
        let spectrum = Rect::new(
            area.x,
            area.y + waveform_height,
            area.width,
            content_height - waveform_height,
        );
        let footer = Rect::new(area.x, area.y + content_height, area.width, FOOTER_HEIGHT.min(area.height));
        (waveform, spectrum, footer)
    }

    /// CSS-pixel size of the waveform area.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn waveform_viewport(&self) -> anyhow::Result<Viewport> {
        let size = self.terminal.size()?;
        let (waveform, _, _) = Self::layout(Rect::new(0, 0, size.width, size.height));
        Ok(viewport_for(waveform))
    }

    /// Surface the live visualizer paints into.
    pub fn surface_mut(&mut self) -> &mut DisplayList {
        &mut self.surface
    }

    /// Remembers the last painted frame's report for scrolling.
    pub fn set_report(&mut self, report: FrameReport) {
        self.report = Some(report);
    }

    /// Draws the last painted waveform frame, the spectrum and the footer.
    ///
    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self, status: &RecorderStatus, spectrum: Option<&[u8]>) -> anyhow::Result<()> {
        let scroll_x = self.report.map_or(0.0, |r| r.scroll_x);
        let surface = &self.surface;

        self.terminal.draw(|frame| {
            let (waveform_area, spectrum_area, footer_area) = Self::layout(frame.area());

            frame.render_widget(
                DisplayListView::new(surface)
                    .scroll_x(scroll_x)
                    .background(Color::Rgb(0, 0, 0)),
                waveform_area,
            );

            let levels: Vec<u64> = match spectrum {
                Some(bytes) if status.state == SessionState::Recording => {
                    let values: Vec<f32> = bytes.iter().map(|&b| f32::from(b)).collect();
                    compress_max_pool(&values, usize::from(spectrum_area.width))
                        .into_iter()
                        .map(|v| v as u64)
                        .collect()
                }
                _ => Vec::new(),
            };
            let spectrum_widget = Sparkline::default().data(&levels).max(255).style(
                Style::default()
                    .bg(Color::Rgb(185, 207, 212))
                    .fg(Color::Rgb(0, 0, 0)),
            );
            frame.render_widget(spectrum_widget, spectrum_area);

            frame.render_widget(footer(status), footer_area);
        })?;

        Ok(())
    }

    /// Processes user input and returns the appropriate recording command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<RecordingCommand> {
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                return Ok(match key.code {
                    KeyCode::Enter => {
                        tracing::debug!("Enter pressed: stopping and saving");
                        RecordingCommand::Save
                    }
                    KeyCode::Char('q') | KeyCode::Esc => {
                        tracing::debug!("Escape or 'q' pressed: canceling recording");
                        RecordingCommand::Cancel
                    }
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        tracing::debug!("Ctrl+C pressed: canceling recording");
                        RecordingCommand::Cancel
                    }
                    KeyCode::Char(' ') => {
                        tracing::debug!("Space pressed: toggling pause");
                        RecordingCommand::TogglePause
                    }
                    _ => RecordingCommand::Continue,
                });
            }
        }
        Ok(RecordingCommand::Continue)
    }

    /// Cleans up terminal state and exits alternate screen mode.
    ///
    /// # Errors
    /// - If terminal mode cannot be disabled
    /// - If cursor cannot be shown
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn footer(status: &RecorderStatus) -> Paragraph<'static> {
    let indicator = match status.state {
        SessionState::Paused => Span::styled("⏸ ", Style::default().fg(Color::Yellow)),
        SessionState::Recording => Span::styled("● ", Style::default().fg(Color::Red)),
        _ => Span::styled("■ ", Style::default().fg(Color::Gray)),
    };

    let minutes = status.elapsed_secs / 60;
    let secs = status.elapsed_secs % 60;
    let level = if status.state == SessionState::Recording {
        (status.level * 100.0).round() as u8
    } else {
        0
    };

    let line = Line::from(vec![
        indicator,
        Span::raw(format!("{minutes}:{secs:02}")),
        Span::raw(" / "),
        Span::raw(format!("{level}%")),
        Span::raw(" / "),
        Span::raw(format!("{} bars", status.samples)),
        Span::styled(
            "   enter save · space pause · q cancel",
            Style::default().fg(Color::DarkGray),
        ),
    ]);

    Paragraph::new(line).style(
        Style::default()
            .fg(Color::Rgb(185, 207, 212))
            .bg(Color::Rgb(0, 0, 0)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_splits_two_thirds_and_footer() {
        let (waveform, spectrum, footer) = RecorderTui::layout(Rect::new(0, 0, 80, 25));
        assert_eq!(waveform.height, 16);
        assert_eq!(spectrum.y, 16);
        assert_eq!(spectrum.height, 8);
        assert_eq!(footer.y, 24);
        assert_eq!(footer.height, 1);
    }

    #[test]
    fn test_footer_shows_elapsed_time() {
        let status = RecorderStatus {
            state: SessionState::Paused,
            elapsed_secs: 75,
            samples: 12,
            level: 0.5,
        };
        let area = Rect::new(0, 0, 60, 1);
        let mut buf = Buffer::empty(area);
        footer(&status).render(area, &mut buf);

        let text: String = (0..area.width).map(|x| buf[(x, 0)].symbol().to_string()).collect();
        assert!(text.contains("1:15 / 0% / 12 bars"));
    }
}

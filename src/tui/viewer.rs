//! Terminal screen for browsing a clip's waveform with a playhead.

use super::painter::{column_to_x, viewport_for, DisplayListView};
use crossterm::{
    event::{
        self, DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event, KeyCode,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    prelude::*,
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
};
use std::io::{stdout, Stdout};
use std::time::Duration;
use wavebars::render::{DisplayList, PointerEvent, SeekKey};
use wavebars::Viewport;

const FOOTER_HEIGHT: u16 = 1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerCommand {
    Continue,
    Quit,
    Key(SeekKey),
    Pointer(PointerEvent),
    /// The terminal changed size.
    Resize,
}

pub struct ViewerTui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    surface: DisplayList,
    title: String,
}

impl ViewerTui {
    /// Enters alternate screen mode with mouse capture.
    ///
    /// # Errors
    /// - If terminal cannot be initialized
    pub fn new(title: impl Into<String>) -> anyhow::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture, EnableFocusChange)?;
        let terminal = Terminal::new(CrosstermBackend::new(stdout))?;

        Ok(Self {
            terminal,
            surface: DisplayList::new(),
            title: title.into(),
        })
    }

    fn waveform_area(area: Rect) -> Rect {
        Rect::new(area.x, area.y, area.width, area.height.saturating_sub(FOOTER_HEIGHT))
    }

    /// CSS-pixel size of the waveform area.
    ///
    /// # Errors
    /// - If the terminal size cannot be queried
    pub fn waveform_viewport(&self) -> anyhow::Result<Viewport> {
        let size = self.terminal.size()?;
        Ok(viewport_for(Self::waveform_area(Rect::new(0, 0, size.width, size.height))))
    }

    pub fn surface_mut(&mut self) -> &mut DisplayList {
        &mut self.surface
    }

    /// # Errors
    /// - If terminal rendering fails
    pub fn draw(&mut self, current_time: f64, duration: f64, dragging: bool) -> anyhow::Result<()> {
        let surface = &self.surface;
        let title = self.title.as_str();

        self.terminal.draw(|frame| {
            let area = frame.area();
            let waveform = Self::waveform_area(area);
            frame.render_widget(DisplayListView::new(surface), waveform);

            let footer_area = Rect::new(area.x, area.y + waveform.height, area.width, FOOTER_HEIGHT.min(area.height));
            let marker = if dragging { "◆ " } else { "▶ " };
            let line = Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Rgb(255, 59, 48))),
                Span::raw(format!("{} / {}", format_time(current_time), format_time(duration))),
                Span::raw(format!("  {title}")),
                Span::styled(
                    "   ←/→ seek · home/end · click/drag · q quit",
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            frame.render_widget(
                Paragraph::new(line).style(
                    Style::default()
                        .fg(Color::Rgb(185, 207, 212))
                        .bg(Color::Rgb(0, 0, 0)),
                ),
                footer_area,
            );
        })?;
        Ok(())
    }

    /// Maps one terminal event to a viewer command.
    ///
    /// # Errors
    /// - If event polling fails
    pub fn handle_input(&mut self, timeout: Duration) -> anyhow::Result<ViewerCommand> {
        if !event::poll(timeout)? {
            return Ok(ViewerCommand::Continue);
        }
        let size = self.terminal.size()?;
        let waveform = Self::waveform_area(Rect::new(0, 0, size.width, size.height));
        Ok(map_event(event::read()?, waveform))
    }

    /// # Errors
    /// - If terminal mode cannot be restored
    pub fn cleanup(&mut self) -> anyhow::Result<()> {
        disable_raw_mode()?;
        execute!(
            self.terminal.backend_mut(),
            DisableFocusChange,
            DisableMouseCapture,
            LeaveAlternateScreen
        )?;
        self.terminal.show_cursor()?;
        Ok(())
    }
}

fn map_event(event: Event, waveform: Rect) -> ViewerCommand {
    match event {
        Event::Key(key) => match key.code {
            KeyCode::Char('q') | KeyCode::Esc => ViewerCommand::Quit,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => ViewerCommand::Quit,
            KeyCode::Left => ViewerCommand::Key(SeekKey::Left),
            KeyCode::Right => ViewerCommand::Key(SeekKey::Right),
            KeyCode::Home => ViewerCommand::Key(SeekKey::Home),
            KeyCode::End => ViewerCommand::Key(SeekKey::End),
            _ => ViewerCommand::Continue,
        },
        Event::Mouse(MouseEvent { kind, column, .. }) => {
            let x = column_to_x(waveform, column);
            match kind {
                MouseEventKind::Down(MouseButton::Left) => ViewerCommand::Pointer(PointerEvent::Down(x)),
                MouseEventKind::Drag(MouseButton::Left) => ViewerCommand::Pointer(PointerEvent::Move(x)),
                MouseEventKind::Up(MouseButton::Left) => ViewerCommand::Pointer(PointerEvent::Up(x)),
                _ => ViewerCommand::Continue,
            }
        }
        Event::FocusLost => ViewerCommand::Pointer(PointerEvent::Cancel),
        Event::Resize(..) => ViewerCommand::Resize,
        _ => ViewerCommand::Continue,
    }
}

fn format_time(secs: f64) -> String {
    let total = secs.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState};

    fn key(code: KeyCode) -> Event {
        Event::Key(KeyEvent {
            code,
            modifiers: KeyModifiers::NONE,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        })
    }

    fn mouse(kind: MouseEventKind, column: u16) -> Event {
        Event::Mouse(MouseEvent {
            kind,
            column,
            row: 0,
            modifiers: KeyModifiers::NONE,
        })
    }

    #[test]
    fn test_keys_map_to_seek_keys() {
        let area = Rect::new(0, 0, 10, 5);
        assert_eq!(map_event(key(KeyCode::Left), area), ViewerCommand::Key(SeekKey::Left));
        assert_eq!(map_event(key(KeyCode::End), area), ViewerCommand::Key(SeekKey::End));
        assert_eq!(map_event(key(KeyCode::Char('q')), area), ViewerCommand::Quit);
        assert_eq!(map_event(key(KeyCode::Char('x')), area), ViewerCommand::Continue);
    }

    #[test]
    fn test_mouse_maps_to_pointer_positions() {
        let area = Rect::new(0, 0, 10, 5);
        assert_eq!(
            map_event(mouse(MouseEventKind::Down(MouseButton::Left), 2), area),
            ViewerCommand::Pointer(PointerEvent::Down(7.5))
        );
        assert_eq!(
            map_event(mouse(MouseEventKind::Up(MouseButton::Left), 0), area),
            ViewerCommand::Pointer(PointerEvent::Up(1.5))
        );
        assert_eq!(
            map_event(mouse(MouseEventKind::Down(MouseButton::Right), 2), area),
            ViewerCommand::Continue
        );
    }

    #[test]
    fn test_time_format() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(61.9), "1:01");
        assert_eq!(format_time(-3.0), "0:00");
    }
}

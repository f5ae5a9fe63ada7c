//! Terminal UI rendering.

pub mod chat_panel;
pub mod selector;
pub mod status_bar;
pub mod theme;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
};

use crate::app::{App, Screen};

/// Main draw function for the entire UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    match app.screen {
        Screen::SelectUser | Screen::SelectRoom => selector::render(frame, main_chunks[0], app),
        Screen::Room => chat_panel::render(frame, main_chunks[0], app),
    }

    status_bar::render(frame, main_chunks[1], app);
}

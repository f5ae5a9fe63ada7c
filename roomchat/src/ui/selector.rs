//! User and room selection screens.

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
};

use super::theme;
use crate::app::{App, Screen, SelectorMode};

/// Render the selection screen for the current [`Screen`].
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let (title, create_label, names): (&str, &str, Vec<&str>) = match app.screen {
        Screen::SelectUser => (
            "Select or Create a User",
            "New User Name",
            app.users.iter().map(|u| u.name.as_str()).collect(),
        ),
        Screen::SelectRoom => (
            "Join or Create a Room",
            "New Room Name",
            app.rooms.iter().map(|r| r.name.as_str()).collect(),
        ),
        Screen::Room => return,
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(3)])
        .split(area);

    let items: Vec<ListItem> = if names.is_empty() {
        vec![ListItem::new(Line::from(Span::styled(
            "Nothing here yet. Press n to create one.",
            theme::dimmed(),
        )))]
    } else {
        names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let style = if app.selected == Some(idx) {
                    theme::selected()
                } else {
                    theme::normal()
                };
                ListItem::new(Line::from(Span::raw(name.to_string()))).style(style)
            })
            .collect()
    };

    let browsing = app.selector_mode == SelectorMode::Browse;
    let list_block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(if browsing {
            theme::highlighted()
        } else {
            theme::normal()
        });
    frame.render_widget(List::new(items).block(list_block), chunks[0]);

    let input_line = if browsing {
        Line::from(Span::styled("Press n to create", theme::dimmed()))
    } else {
        Line::from(Span::styled(format!("{}\u{2588}", app.input), theme::normal()))
    };
    let input_block = Block::default()
        .title(create_label)
        .borders(Borders::ALL)
        .border_style(if browsing {
            theme::normal()
        } else {
            theme::highlighted()
        });
    frame.render_widget(Paragraph::new(input_line).block(input_block), chunks[1]);
}

//! Room screen rendering (header, message list, input box).

use std::fmt::{self, Write as _};

use chrono::{DateTime, Local, TimeZone};
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use roomchat_proto::model::Message;

use super::theme;
use crate::app::{App, RoomView};

/// Lines one message takes in the list (header, body, spacer).
const LINES_PER_MESSAGE: usize = 3;

/// Render the room screen into `area`.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let Some(room) = app.room.as_ref() else {
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(3),
        ])
        .split(area);

    render_header(frame, chunks[0], room);
    render_messages(frame, chunks[1], app, room);
    render_input(frame, chunks[2], app);
}

/// Format a message timestamp, falling back to RFC 3339 when `format` is
/// not a valid chrono format string.
pub fn format_timestamp<Tz: TimeZone>(at: &DateTime<Tz>, format: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    let mut out = String::new();
    if write!(out, "{}", at.format(format)).is_err() {
        return at.to_rfc3339();
    }
    out
}

fn render_header(frame: &mut Frame, area: Rect, room: &RoomView) {
    let name = room
        .name
        .clone()
        .unwrap_or_else(|| format!("Room {}", room.id));
    let header = Paragraph::new(Line::from(vec![
        Span::styled(format!(" {name} "), theme::highlighted()),
        Span::styled("Esc: leave | Ctrl-R: reconnect | \u{2191}\u{2193}: scroll", theme::dimmed()),
    ]));
    frame.render_widget(header, area);
}

fn render_messages(frame: &mut Frame, area: Rect, app: &App, room: &RoomView) {
    let block = Block::default().borders(Borders::ALL).border_style(theme::normal());

    if room.messages.is_empty() {
        let placeholder = if room.loaded {
            "No messages yet"
        } else {
            "Loading messages..."
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(placeholder, theme::dimmed()))).block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let lines: Vec<Line> = room
        .messages
        .iter()
        .flat_map(|message| message_lines(message, app.is_own(message), &app.timestamp_format))
        .collect();

    let visible = usize::from(area.height.saturating_sub(2));
    let bottom = lines.len().saturating_sub(visible);
    let top = bottom.saturating_sub(app.viewport.offset() * LINES_PER_MESSAGE);
    let scroll = u16::try_from(top).unwrap_or(u16::MAX);

    let paragraph = Paragraph::new(lines).block(block).scroll((scroll, 0));
    frame.render_widget(paragraph, area);
}

/// The lines for one message. Own messages are right-aligned.
fn message_lines(message: &Message, own: bool, timestamp_format: &str) -> [Line<'static>; LINES_PER_MESSAGE] {
    let initials = format!(" {} ", message.user.initials());
    let timestamp = format_timestamp(&message.created_at.with_timezone(&Local), timestamp_format);

    let mut header = vec![
        Span::styled(initials, theme::avatar(&message.user.name)),
        Span::raw(" "),
        Span::styled(message.user.name.clone(), theme::bold()),
        Span::raw("  "),
        Span::styled(timestamp, theme::dimmed()),
    ];
    let body_style = if own {
        theme::own_message()
    } else {
        theme::other_message()
    };
    let body = Line::from(Span::styled(format!(" {} ", message.body), body_style));

    if own {
        header.reverse();
        [
            Line::from(header).alignment(Alignment::Right),
            body.alignment(Alignment::Right),
            Line::default(),
        ]
    } else {
        [Line::from(header), body, Line::default()]
    }
}

fn render_input(frame: &mut Frame, area: Rect, app: &App) {
    let line = if app.input.is_empty() {
        Line::from(Span::styled("Type your message...", theme::dimmed()))
    } else {
        let mut display_text = app.input.clone();
        let index = display_text
            .char_indices()
            .nth(app.cursor_position)
            .map_or(display_text.len(), |(i, _)| i);
        display_text.insert(index, '\u{2588}');
        Line::from(Span::styled(display_text, theme::normal()))
    };

    let block = Block::default()
        .title("Message")
        .borders(Borders::ALL)
        .border_style(theme::highlighted());
    frame.render_widget(Paragraph::new(line).block(block), area);
}

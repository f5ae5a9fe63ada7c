//! Status bar rendering.

use ratatui::{
    Frame,
    layout::Rect,
    text::{Line, Span},
    widgets::Paragraph,
};

use super::theme;
use crate::app::{App, NoticeLevel, Screen, SelectorMode};
use crate::connection::ConnectionStatus;

/// Render the status bar at the bottom of the screen.
pub fn render(frame: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::styled("RoomChat", theme::bold())];

    if let Some(room) = &app.room {
        let (dot_color, text) = status_indicator(room.status);
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("\u{25cf}", theme::normal().fg(dot_color)));
        spans.push(Span::raw(format!(" {text}")));
    }

    if let Some(participant) = &app.participant {
        spans.push(Span::raw(" | "));
        spans.push(Span::raw(participant.name.clone()));
    }

    spans.push(Span::raw(" | "));
    match &app.notification {
        Some(notice) => {
            let style = match notice.level {
                NoticeLevel::Info => theme::normal(),
                NoticeLevel::Error => theme::normal().fg(theme::ERROR),
            };
            spans.push(Span::styled(notice.text.clone(), style));
        }
        None => spans.push(Span::styled(help_text(app), theme::dimmed())),
    }

    let paragraph = Paragraph::new(Line::from(spans)).style(theme::status_bar_bg());
    frame.render_widget(paragraph, area);
}

/// Indicator color and label for a connection status.
#[must_use]
pub const fn status_indicator(status: ConnectionStatus) -> (ratatui::style::Color, &'static str) {
    match status {
        ConnectionStatus::Connected => (theme::ONLINE, "Online"),
        ConnectionStatus::Idle | ConnectionStatus::Connecting => (theme::CONNECTING, "Connecting..."),
        ConnectionStatus::Disconnected | ConnectionStatus::Closed => (theme::OFFLINE, "Offline"),
    }
}

const fn help_text(app: &App) -> &'static str {
    match (app.screen, app.selector_mode) {
        (Screen::SelectUser | Screen::SelectRoom, SelectorMode::Create) => "Enter: create | Esc: back",
        (Screen::SelectUser, SelectorMode::Browse) => {
            "\u{2191}\u{2193}/jk: choose | Enter: select | n: new user | r: refresh | q: quit"
        }
        (Screen::SelectRoom, SelectorMode::Browse) => {
            "\u{2191}\u{2193}/jk: choose | Enter: join | n: new room | r: refresh | Esc: sign out"
        }
        (Screen::Room, _) => "Enter: send | Esc: leave | Ctrl-R: reconnect | Ctrl-C: quit",
    }
}

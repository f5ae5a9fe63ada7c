//! Theme and styling constants for the TUI.

use ratatui::style::{Color, Modifier, Style};

/// Primary foreground color.
pub const FG_PRIMARY: Color = Color::White;

/// Secondary foreground color (dimmed text).
pub const FG_SECONDARY: Color = Color::Gray;

/// Highlight color for focused elements.
pub const HIGHLIGHT: Color = Color::Cyan;

/// Online indicator color.
pub const ONLINE: Color = Color::Green;

/// Connecting indicator color.
pub const CONNECTING: Color = Color::Yellow;

/// Offline indicator color.
pub const OFFLINE: Color = Color::Red;

/// Error notification color.
pub const ERROR: Color = Color::LightRed;

/// Colors for sender avatars.
pub const SENDER_COLORS: [Color; 8] = [
    Color::Cyan,
    Color::Green,
    Color::Yellow,
    Color::Magenta,
    Color::Blue,
    Color::LightCyan,
    Color::LightGreen,
    Color::Rgb(255, 165, 0),
];

/// Normal text style.
#[must_use]
pub fn normal() -> Style {
    Style::default().fg(FG_PRIMARY)
}

/// Dimmed text style (timestamps, placeholders).
#[must_use]
pub fn dimmed() -> Style {
    Style::default().fg(FG_SECONDARY)
}

/// Bold text style.
#[must_use]
pub fn bold() -> Style {
    Style::default().fg(FG_PRIMARY).add_modifier(Modifier::BOLD)
}

/// Highlighted text style (focused borders, room header).
#[must_use]
pub fn highlighted() -> Style {
    Style::default().fg(HIGHLIGHT).add_modifier(Modifier::BOLD)
}

/// Selected item style (in lists).
#[must_use]
pub fn selected() -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(HIGHLIGHT)
        .add_modifier(Modifier::BOLD)
}

/// Avatar badge style for a sender, derived from their name.
#[must_use]
pub fn avatar(name: &str) -> Style {
    Style::default()
        .fg(Color::Black)
        .bg(sender_color(name))
        .add_modifier(Modifier::BOLD)
}

/// Get a color for a sender based on their name.
#[must_use]
pub fn sender_color(name: &str) -> Color {
    let hash = name.bytes().fold(0u32, |acc, b| {
        acc.wrapping_mul(31).wrapping_add(u32::from(b))
    });
    SENDER_COLORS[(hash as usize) % SENDER_COLORS.len()]
}

/// Style for the local participant's message bodies.
#[must_use]
pub fn own_message() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(40, 40, 60))
}

/// Style for other participants' message bodies.
#[must_use]
pub fn other_message() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 30))
}

/// Style for the status bar background.
#[must_use]
pub fn status_bar_bg() -> Style {
    Style::default().fg(Color::White).bg(Color::Rgb(30, 30, 50))
}

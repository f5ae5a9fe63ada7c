//! Application state and event handling.
//!
//! The app moves through three screens:
//!
//! ```text
//! SelectUser --Enter--> SelectRoom --Enter--> Room
//!      ^                    |  ^                |
//!      +-----Esc------------+  +------Esc-------+
//! ```
//!
//! Key handling never performs I/O. Anything that needs the backend or the
//! room session is returned as an [`AppCommand`] for the event loop to run.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use roomchat_proto::model::{Message, NewParticipant, NewRoom, Participant, Room, RoomId};

use crate::chat::scroll::{ScrollAction, ScrollMode, Viewport};
use crate::connection::ConnectionStatus;

/// Which screen is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// Pick or create the local participant.
    SelectUser,
    /// Pick or create a room.
    SelectRoom,
    /// Inside a room.
    Room,
}

/// Whether a selection screen is browsing the list or naming a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorMode {
    /// Moving through the list.
    Browse,
    /// Typing the name of a new entry.
    Create,
}

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// Informational.
    Info,
    /// Something failed.
    Error,
}

/// A short message shown in the status bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Severity.
    pub level: NoticeLevel,
    /// Text to show.
    pub text: String,
}

/// Work the event loop must perform on behalf of the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Reload the participant list.
    RefreshUsers,
    /// Forget the local identity and go back to user selection.
    SignOut,
    /// Create a participant, then reload the list.
    CreateUser(NewParticipant),
    /// Record the participant as the local identity.
    SelectUser(Participant),
    /// Reload the room list.
    RefreshRooms,
    /// Create a room, then reload the list.
    CreateRoom(NewRoom),
    /// Activate a session for the room.
    JoinRoom(RoomId),
    /// Post a message in the current room.
    SendMessage(String),
    /// Re-open the broker socket of the current room.
    Reconnect,
    /// Deactivate the current room session.
    LeaveRoom,
}

/// Terminal viewport over the message list.
///
/// `offset` counts messages scrolled up from the newest one. Snapping
/// zeroes it at once; animating shrinks it over a number of render ticks.
#[derive(Debug, Clone)]
pub struct ChatViewport {
    offset: usize,
    animation_ticks: u16,
    remaining: u16,
    last_action: Option<ScrollAction>,
}

impl ChatViewport {
    /// A viewport at the bottom, animating over `animation_ticks` ticks.
    #[must_use]
    pub const fn new(animation_ticks: u16) -> Self {
        Self {
            offset: 0,
            animation_ticks,
            remaining: 0,
            last_action: None,
        }
    }

    /// Messages scrolled up from the newest one.
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Whether an animation is in progress.
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.remaining > 0
    }

    /// The last follow action applied.
    #[must_use]
    pub const fn last_action(&self) -> Option<ScrollAction> {
        self.last_action
    }

    /// Scroll up by one message, up to `max`.
    pub fn scroll_up(&mut self, max: usize) {
        self.remaining = 0;
        self.offset = (self.offset + 1).min(max);
    }

    /// Scroll down by one message.
    pub const fn scroll_down(&mut self) {
        self.remaining = 0;
        self.offset = self.offset.saturating_sub(1);
    }

    /// Advance an animation by one render tick.
    pub fn tick(&mut self) {
        if self.remaining == 0 {
            return;
        }
        let step = self.offset.div_ceil(usize::from(self.remaining));
        self.offset -= step.min(self.offset);
        self.remaining -= 1;
        if self.offset == 0 {
            self.remaining = 0;
        }
    }
}

impl Viewport for ChatViewport {
    fn snap_to_bottom(&mut self) {
        self.offset = 0;
        self.remaining = 0;
        self.last_action = Some(ScrollAction::Snap);
    }

    fn animate_to_bottom(&mut self) {
        self.last_action = Some(ScrollAction::Animate);
        if self.offset == 0 || self.animation_ticks == 0 {
            self.offset = 0;
            self.remaining = 0;
            return;
        }
        self.remaining = self.animation_ticks;
    }
}

/// What the room screen shows.
#[derive(Debug, Clone)]
pub struct RoomView {
    /// Room identifier.
    pub id: RoomId,
    /// Display name, once loaded.
    pub name: Option<String>,
    /// Visible messages.
    pub messages: Vec<Message>,
    /// Whether history has been installed.
    pub loaded: bool,
    /// Broker connectivity.
    pub status: ConnectionStatus,
    /// Follow mode.
    pub mode: ScrollMode,
}

/// Main application state.
pub struct App {
    /// Current screen.
    pub screen: Screen,
    /// Known participants.
    pub users: Vec<Participant>,
    /// Known rooms.
    pub rooms: Vec<Room>,
    /// Highlighted row in the current selection list.
    pub selected: Option<usize>,
    /// Selection screen mode.
    pub selector_mode: SelectorMode,
    /// The local participant, once chosen.
    pub participant: Option<Participant>,
    /// The open room, on the room screen.
    pub room: Option<RoomView>,
    /// Message list viewport.
    pub viewport: ChatViewport,
    /// Current text input.
    pub input: String,
    /// Cursor position in input (character index).
    pub cursor_position: usize,
    /// Latest notification.
    pub notification: Option<Notification>,
    /// chrono format for message timestamps.
    pub timestamp_format: String,
    /// Whether the app should quit.
    pub should_quit: bool,
}

impl App {
    /// Create the app on the user selection screen.
    #[must_use]
    pub fn new(timestamp_format: impl Into<String>, animation_ticks: u16) -> Self {
        Self {
            screen: Screen::SelectUser,
            users: Vec::new(),
            rooms: Vec::new(),
            selected: None,
            selector_mode: SelectorMode::Browse,
            participant: None,
            room: None,
            viewport: ChatViewport::new(animation_ticks),
            input: String::new(),
            cursor_position: 0,
            notification: None,
            timestamp_format: timestamp_format.into(),
            should_quit: false,
        }
    }

    /// Show an informational notification.
    pub fn notify(&mut self, text: impl Into<String>) {
        self.notification = Some(Notification {
            level: NoticeLevel::Info,
            text: text.into(),
        });
    }

    /// Show an error notification.
    pub fn notify_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        tracing::debug!(notice = %text, "error shown to user");
        self.notification = Some(Notification {
            level: NoticeLevel::Error,
            text,
        });
    }

    /// Replace the participant list.
    pub fn set_users(&mut self, users: Vec<Participant>) {
        self.selected = clamp_selection(self.selected, users.len());
        self.users = users;
    }

    /// Replace the room list.
    pub fn set_rooms(&mut self, rooms: Vec<Room>) {
        self.selected = clamp_selection(self.selected, rooms.len());
        self.rooms = rooms;
    }

    /// Highlight the participant with `name`, if listed.
    pub fn select_user_named(&mut self, name: &str) -> Option<Participant> {
        let index = self.users.iter().position(|u| u.name == name)?;
        self.selected = Some(index);
        Some(self.users[index].clone())
    }

    /// Move to the room selection screen as `participant`.
    pub fn enter_room_selection(&mut self, participant: Participant) {
        self.participant = Some(participant);
        self.screen = Screen::SelectRoom;
        self.reset_selector();
    }

    /// Move back to the user selection screen.
    pub fn enter_user_selection(&mut self) {
        self.participant = None;
        self.room = None;
        self.screen = Screen::SelectUser;
        self.reset_selector();
    }

    /// Move to the room screen for `room`.
    pub fn enter_room(&mut self, room: RoomId) {
        self.room = Some(RoomView {
            id: room,
            name: None,
            messages: Vec::new(),
            loaded: false,
            status: ConnectionStatus::Connecting,
            mode: ScrollMode::InitialLoad,
        });
        self.viewport = ChatViewport::new(self.viewport.animation_ticks);
        self.screen = Screen::Room;
        self.clear_input();
    }

    /// Leave the room screen for the room list.
    pub fn leave_room(&mut self) {
        self.room = None;
        self.screen = Screen::SelectRoom;
        self.reset_selector();
    }

    /// Record the room's display name.
    pub fn set_room_name(&mut self, name: impl Into<String>) {
        if let Some(room) = self.room.as_mut() {
            room.name = Some(name.into());
        }
    }

    /// Refresh the room screen from its session. `messages` is `None` when
    /// the list did not change.
    pub fn refresh_room(
        &mut self,
        status: ConnectionStatus,
        mode: ScrollMode,
        loaded: bool,
        messages: Option<Vec<Message>>,
    ) {
        let Some(room) = self.room.as_mut() else {
            return;
        };
        room.status = status;
        room.mode = mode;
        room.loaded = loaded;
        if let Some(messages) = messages {
            room.messages = messages;
        }
    }

    /// Whether `message` was written by the local participant.
    #[must_use]
    pub fn is_own(&self, message: &Message) -> bool {
        self.participant
            .as_ref()
            .is_some_and(|p| p.id == message.user.id)
    }


    /// Advance per-frame animations.
    pub fn tick(&mut self) {
        self.viewport.tick();
    }

    /// Handle a key event, returning work for the event loop.
    pub fn handle_key_event(&mut self, key: KeyEvent) -> Option<AppCommand> {
        if let (KeyCode::Char('c'), KeyModifiers::CONTROL) = (key.code, key.modifiers) {
            self.should_quit = true;
            return None;
        }

        match self.screen {
            Screen::SelectUser => self.handle_user_key(key),
            Screen::SelectRoom => self.handle_room_list_key(key),
            Screen::Room => self.handle_room_key(key),
        }
    }

    fn handle_user_key(&mut self, key: KeyEvent) -> Option<AppCommand> {
        match self.selector_mode {
            SelectorMode::Create => match key.code {
                KeyCode::Enter => match NewParticipant::new(&self.input) {
                    Ok(user) => {
                        self.selector_mode = SelectorMode::Browse;
                        self.clear_input();
                        Some(AppCommand::CreateUser(user))
                    }
                    Err(e) => {
                        self.notify_error(capitalize(&e.to_string()));
                        None
                    }
                },
                KeyCode::Esc => {
                    self.selector_mode = SelectorMode::Browse;
                    self.clear_input();
                    None
                }
                _ => {
                    self.handle_text_key(key);
                    None
                }
            },
            SelectorMode::Browse => match key.code {
                KeyCode::Esc | KeyCode::Char('q') => {
                    self.should_quit = true;
                    None
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = step_selection(self.selected, self.users.len(), false);
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.selected = step_selection(self.selected, self.users.len(), true);
                    None
                }
                KeyCode::Char('n') => {
                    self.selector_mode = SelectorMode::Create;
                    None
                }
                KeyCode::Char('r') => Some(AppCommand::RefreshUsers),
                KeyCode::Enter => {
                    let user = self.selected.and_then(|i| self.users.get(i)).cloned();
                    if user.is_none() {
                        self.notify_error("Please select a user to join");
                    }
                    user.map(AppCommand::SelectUser)
                }
                _ => None,
            },
        }
    }

    fn handle_room_list_key(&mut self, key: KeyEvent) -> Option<AppCommand> {
        match self.selector_mode {
            SelectorMode::Create => match key.code {
                KeyCode::Enter => match NewRoom::new(&self.input) {
                    Ok(room) => {
                        self.selector_mode = SelectorMode::Browse;
                        self.clear_input();
                        Some(AppCommand::CreateRoom(room))
                    }
                    Err(e) => {
                        self.notify_error(capitalize(&e.to_string()));
                        None
                    }
                },
                KeyCode::Esc => {
                    self.selector_mode = SelectorMode::Browse;
                    self.clear_input();
                    None
                }
                _ => {
                    self.handle_text_key(key);
                    None
                }
            },
            SelectorMode::Browse => match key.code {
                KeyCode::Esc => {
                    self.enter_user_selection();
                    Some(AppCommand::SignOut)
                }
                KeyCode::Up | KeyCode::Char('k') => {
                    self.selected = step_selection(self.selected, self.rooms.len(), false);
                    None
                }
                KeyCode::Down | KeyCode::Char('j') => {
                    self.selected = step_selection(self.selected, self.rooms.len(), true);
                    None
                }
                KeyCode::Char('n') => {
                    self.selector_mode = SelectorMode::Create;
                    None
                }
                KeyCode::Char('r') => Some(AppCommand::RefreshRooms),
                KeyCode::Enter => {
                    let room = self.selected.and_then(|i| self.rooms.get(i)).map(|r| r.id);
                    if room.is_none() {
                        self.notify_error("Please select a room to join");
                    }
                    room.map(AppCommand::JoinRoom)
                }
                _ => None,
            },
        }
    }

    fn handle_room_key(&mut self, key: KeyEvent) -> Option<AppCommand> {
        match (key.code, key.modifiers) {
            (KeyCode::Char('r'), KeyModifiers::CONTROL) => Some(AppCommand::Reconnect),
            (KeyCode::Esc, _) => Some(AppCommand::LeaveRoom),
            (KeyCode::Up, _) => {
                let max = self
                    .room
                    .as_ref()
                    .map_or(0, |r| r.messages.len().saturating_sub(1));
                self.viewport.scroll_up(max);
                None
            }
            (KeyCode::Down, _) => {
                self.viewport.scroll_down();
                None
            }
            (KeyCode::Enter, _) => {
                if self.input.trim().is_empty() {
                    return None;
                }
                let body = std::mem::take(&mut self.input);
                self.cursor_position = 0;
                Some(AppCommand::SendMessage(body))
            }
            _ => {
                self.handle_text_key(key);
                None
            }
        }
    }

    /// Line editing shared by every text input.
    fn handle_text_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char(c) => self.enter_char(c),
            KeyCode::Backspace => self.delete_char(),
            KeyCode::Left => self.move_cursor_left(),
            KeyCode::Right => self.move_cursor_right(),
            KeyCode::Home => self.cursor_position = 0,
            KeyCode::End => self.cursor_position = self.input.chars().count(),
            _ => {}
        }
    }

    fn reset_selector(&mut self) {
        self.selected = None;
        self.selector_mode = SelectorMode::Browse;
        self.clear_input();
    }

    fn clear_input(&mut self) {
        self.input.clear();
        self.cursor_position = 0;
    }

    /// Byte offset of the cursor in `input`.
    fn cursor_byte_index(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.cursor_position)
            .map_or(self.input.len(), |(i, _)| i)
    }

    fn enter_char(&mut self, c: char) {
        let index = self.cursor_byte_index();
        self.input.insert(index, c);
        self.cursor_position += 1;
    }

    fn delete_char(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
            let index = self.cursor_byte_index();
            self.input.remove(index);
        }
    }

    const fn move_cursor_left(&mut self) {
        if self.cursor_position > 0 {
            self.cursor_position -= 1;
        }
    }

    fn move_cursor_right(&mut self) {
        if self.cursor_position < self.input.chars().count() {
            self.cursor_position += 1;
        }
    }
}

fn clamp_selection(selected: Option<usize>, len: usize) -> Option<usize> {
    match (selected, len) {
        (_, 0) => None,
        (None, _) => Some(0),
        (Some(i), len) => Some(i.min(len - 1)),
    }
}

fn step_selection(selected: Option<usize>, len: usize, forward: bool) -> Option<usize> {
    if len == 0 {
        return None;
    }
    Some(match (selected, forward) {
        (None, _) => 0,
        (Some(i), true) => (i + 1).min(len - 1),
        (Some(i), false) => i.saturating_sub(1),
    })
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

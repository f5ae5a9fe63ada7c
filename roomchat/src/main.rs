//! `roomchat`: terminal client for real-time chat rooms.
//!
//! Configuration via CLI flags, environment variables, or config file
//! (`~/.config/roomchat/config.toml`).
//!
//! ```bash
//! # Pick user and room interactively
//! cargo run --bin roomchat -- --api-url http://localhost:3000 \
//!     --ws-url ws://localhost:3000/cable
//!
//! # Straight into room 4 as "ada"
//! ROOMCHAT_API_URL=http://localhost:3000 cargo run -- --user ada --room 4
//! ```

use std::io;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use tracing_appender::non_blocking::WorkerGuard;

use roomchat::api::{ChatApi, HttpChatApi};
use roomchat::app::{App, AppCommand};
use roomchat::config::{CliArgs, ClientConfig};
use roomchat::identity::SessionScope;
use roomchat::session::{RoomSession, SessionError, SessionEvent};
use roomchat::transport::websocket::WebSocketConnector;
use roomchat::ui;
use roomchat_proto::model::RoomId;

type Session = RoomSession<HttpChatApi, WebSocketConnector>;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("roomchat: {e}");
            return ExitCode::from(2);
        }
    };

    // Logs go to a file; the terminal belongs to the TUI.
    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let api = match HttpChatApi::new(&config.api_url, config.request_timeout) {
        Ok(api) => Arc::new(api),
        Err(e) => {
            eprintln!("roomchat: {e}");
            return ExitCode::from(2);
        }
    };

    tracing::info!(api_url = %api.base_url(), ws_url = %config.ws_url, "roomchat starting");

    match run(api, &config).await {
        Ok(()) => {
            tracing::info!("roomchat exiting");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("roomchat: terminal error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize file-based logging.
///
/// Returns a [`WorkerGuard`] that must be held until shutdown so buffered
/// log entries are flushed.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let default_path = std::env::temp_dir().join("roomchat.log");
    let log_path = file_path.unwrap_or(&default_path);

    let log_dir = log_path.parent()?;
    let file_name = log_path.file_name()?.to_str()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

/// Set up the terminal, run the event loop, restore the terminal.
async fn run(api: Arc<HttpChatApi>, config: &ClientConfig) -> io::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut client = Client {
        api,
        connector: WebSocketConnector::new(config.connect_timeout).with_frame_buffer(config.channel_capacity),
        scope: SessionScope::new(),
        session: None,
        config: config.clone(),
    };
    let result = client.event_loop(&mut terminal).await;
    client.shutdown().await;

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

/// Everything the event loop drives besides the [`App`].
struct Client {
    api: Arc<HttpChatApi>,
    connector: WebSocketConnector,
    scope: SessionScope,
    session: Option<Session>,
    config: ClientConfig,
}

impl Client {
    async fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> io::Result<()> {
        let mut app = App::new(
            self.config.timestamp_format.clone(),
            self.config.scroll_animation_ticks,
        );
        self.startup(&mut app).await;

        loop {
            // Step 1: Pull session state into the app.
            if let Some(session) = self.session.as_mut() {
                sync_session(&mut app, session);
            }
            app.tick();

            // Step 2: Draw the UI frame.
            terminal.draw(|frame| ui::draw(frame, &app))?;

            // Step 3: Poll for terminal input and run the resulting command.
            if event::poll(self.config.poll_timeout)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                app.notification = None;
                if let Some(command) = app.handle_key_event(key) {
                    self.execute(&mut app, command).await;
                }
            }

            if app.should_quit {
                return Ok(());
            }
        }
    }

    /// Apply `--user` / `--room` and load the first list.
    async fn startup(&mut self, app: &mut App) {
        self.refresh_users(app).await;

        let Some(name) = self.config.user.clone() else {
            return;
        };
        let Some(participant) = app.select_user_named(&name) else {
            app.notify_error(format!("No user named {name:?}"));
            return;
        };
        self.execute(app, AppCommand::SelectUser(participant)).await;

        if let Some(room) = self.config.room {
            self.execute(app, AppCommand::JoinRoom(room)).await;
        }
    }

    async fn execute(&mut self, app: &mut App, command: AppCommand) {
        tracing::debug!(?command, "executing command");
        match command {
            AppCommand::RefreshUsers => self.refresh_users(app).await,
            AppCommand::SignOut => {
                self.scope.clear_participant();
                self.refresh_users(app).await;
            }
            AppCommand::CreateUser(user) => match self.api.create_user(&user).await {
                Ok(()) => {
                    self.refresh_users(app).await;
                    app.select_user_named(&user.name);
                    app.notify(format!("User \"{}\" created successfully!", user.name));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "create user failed");
                    app.notify_error("There was an issue creating the user. Please try again.");
                }
            },
            AppCommand::SelectUser(participant) => {
                self.scope.set_participant(&participant);
                app.enter_room_selection(participant);
                self.refresh_rooms(app).await;
            }
            AppCommand::RefreshRooms => self.refresh_rooms(app).await,
            AppCommand::CreateRoom(room) => match self.api.create_room(&room).await {
                Ok(()) => {
                    self.refresh_rooms(app).await;
                    if let Some(index) = app.rooms.iter().position(|r| r.name == room.name) {
                        app.selected = Some(index);
                    }
                    app.notify(format!("Room \"{}\" created successfully!", room.name));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "create room failed");
                    app.notify_error("There was an issue creating the room. Please try again.");
                }
            },
            AppCommand::JoinRoom(room) => self.join_room(app, room).await,
            AppCommand::SendMessage(body) => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if let Err(e) = session.send_message(&body).await {
                    app.notify_error(format!("Message not sent: {e}"));
                }
            }
            AppCommand::Reconnect => {
                let Some(session) = self.session.as_mut() else {
                    return;
                };
                if session.reconnect().await.is_ok() {
                    app.notify("Reconnected");
                }
            }
            AppCommand::LeaveRoom => {
                if let Some(session) = self.session.take() {
                    session.deactivate().await;
                }
                app.leave_room();
                self.refresh_rooms(app).await;
            }
        }
    }

    async fn join_room(&mut self, app: &mut App, room: RoomId) {
        if let Some(previous) = self.session.take() {
            previous.deactivate().await;
        }

        let session_config = self.config.session_config();
        match RoomSession::activate(
            &self.scope,
            room,
            Arc::clone(&self.api),
            self.connector.clone(),
            &session_config,
        )
        .await
        {
            Ok(session) => {
                app.enter_room(room);
                self.session = Some(session);
            }
            Err(SessionError::NoIdentity) => {
                self.scope.clear_participant();
                app.enter_user_selection();
                app.notify_error("Please select a user to join");
                self.refresh_users(app).await;
            }
            Err(e) => app.notify_error(format!("Could not open room: {e}")),
        }
    }

    async fn refresh_users(&self, app: &mut App) {
        match self.api.list_users().await {
            Ok(users) => app.set_users(users),
            Err(e) => {
                tracing::warn!(error = %e, "list users failed");
                app.notify_error(format!("Could not load users: {e}"));
            }
        }
    }

    async fn refresh_rooms(&self, app: &mut App) {
        match self.api.list_rooms().await {
            Ok(rooms) => app.set_rooms(rooms),
            Err(e) => {
                tracing::warn!(error = %e, "list rooms failed");
                app.notify_error(format!("Could not load rooms: {e}"));
            }
        }
    }

    async fn shutdown(&mut self) {
        if let Some(session) = self.session.take() {
            session.deactivate().await;
        }
    }
}

/// Drain session events and store changes into the app.
fn sync_session(app: &mut App, session: &mut Session) {
    while let Some(event) = session.next_event() {
        match event {
            SessionEvent::RoomLoaded { name, .. } => app.set_room_name(name),
            SessionEvent::Notice(text) => app.notify_error(text),
        }
    }

    let actions = session.follow_changes(Some(&mut app.viewport));
    let messages = (!actions.is_empty()).then(|| session.messages());
    app.refresh_room(
        session.status(),
        session.scroll_mode(),
        session.is_loaded(),
        messages,
    );
}

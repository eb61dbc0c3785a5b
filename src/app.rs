use std::future::Future;
use std::sync::Arc;

use chrono::Local;
use color_eyre::eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::layout::Rect;
use tokio::sync::mpsc;

use crate::{
    backend::{Backend, BackendError},
    domain::SenderKey,
    error::Error,
    infrastructure::tui::{Event, TuiLike},
    model::{
        command::{self, Command},
        composer, settings, PendingSend, Settings,
    },
    presentation::{widgets::status_bar::ViewContext, ChatView},
    session::{handshake, ChatSession, Handshake},
};

/// Result of a backend call made off the main loop
#[derive(Debug)]
pub enum Outcome {
    Connected(Result<Handshake, BackendError>),
    Sent {
        pending: PendingSend,
        result: Result<String, BackendError>,
    },
    Muted(Result<SenderKey, BackendError>),
    Unmuted(Result<SenderKey, BackendError>),
    Settings {
        message: settings::Message,
        notice: Option<String>,
    },
    Failed {
        message: Option<settings::Message>,
        error: Error,
    },
}

fn settings_outcome<T>(
    result: Result<T, BackendError>,
    on_ok: impl FnOnce(T) -> (settings::Message, Option<String>),
) -> Outcome {
    match result {
        Ok(value) => {
            let (message, notice) = on_ok(value);
            Outcome::Settings { message, notice }
        }
        Err(e) => Outcome::Failed {
            message: None,
            error: Error::Settings(e),
        },
    }
}

/// Drives one chat session from terminal input and backend results
///
/// Backend calls run in spawned tasks and come back as [`Outcome`]s, so the session itself
/// is only ever touched from the loop in [`App::run`].
pub struct App<B: Backend + ?Sized> {
    session: ChatSession<B>,
    settings: Settings,
    outcome_tx: mpsc::UnboundedSender<Outcome>,
    outcome_rx: mpsc::UnboundedReceiver<Outcome>,
    in_flight: usize,
    should_quit: bool,
}

impl<B: Backend + ?Sized> App<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();
        Self {
            session: ChatSession::mount(backend),
            settings: Settings::new(),
            outcome_tx,
            outcome_rx,
            in_flight: 0,
            should_quit: false,
        }
    }

    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    fn backend(&self) -> Arc<B> {
        Arc::clone(self.session.backend())
    }

    fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = Outcome> + Send + 'static,
    {
        self.in_flight += 1;
        let outcome_tx = self.outcome_tx.clone();
        tokio::spawn(async move {
            if outcome_tx.send(task.await).is_err() {
                log::debug!("App closed before a backend call finished");
            }
        });
    }

    /// Starts the handshake and loads the settings surface
    pub fn start(&mut self) {
        let backend = self.backend();
        self.spawn(async move { Outcome::Connected(handshake(&*backend).await) });

        let backend = self.backend();
        self.spawn(async move {
            settings_outcome(backend.get_public_key().await, |npub| {
                (settings::Message::PublicKeyLoaded(npub), None)
            })
        });

        let backend = self.backend();
        self.spawn(async move {
            settings_outcome(backend.get_my_profile().await, |profile| {
                (settings::Message::ProfileLoaded(profile), None)
            })
        });

        let backend = self.backend();
        self.spawn(async move {
            settings_outcome(backend.get_relays().await, |relays| {
                (settings::Message::RelaysLoaded(relays), None)
            })
        });
    }

    pub fn handle_outcome(&mut self, outcome: Outcome) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match outcome {
            Outcome::Connected(result) => {
                if let Err(e) = self.session.finish_connect(result) {
                    log::error!("{e}");
                }
            }
            Outcome::Sent { pending, result } => match result {
                Ok(id) => self.session.commit_send(pending, id),
                Err(e) => {
                    let error = self.session.rollback_send(pending, e);
                    log::warn!("{error}");
                }
            },
            Outcome::Muted(result) => {
                if let Err(e) = self.session.apply_mute(result) {
                    log::warn!("{e}");
                }
            }
            Outcome::Unmuted(result) => {
                if let Err(e) = self.session.apply_unmute(result) {
                    log::warn!("{e}");
                }
            }
            Outcome::Settings { message, notice } => {
                self.settings.update(message);
                if let Some(notice) = notice {
                    self.session.notify("Settings", notice);
                }
            }
            Outcome::Failed { message, error } => {
                log::warn!("{error}");
                if let Some(message) = message {
                    self.settings.update(message);
                }
                self.session.notify_error("Settings", error.to_string());
            }
        }
    }

    /// Waits for every backend call started so far
    pub async fn settle(&mut self) {
        while self.in_flight > 0 {
            match self.outcome_rx.recv().await {
                Some(outcome) => self.handle_outcome(outcome),
                None => break,
            }
        }
        self.session.drain_events();
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.kind != KeyEventKind::Press {
            return;
        }

        match key.code {
            KeyCode::Esc => self.should_quit = true,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.should_quit = true;
            }
            KeyCode::Enter => self.submit(),
            KeyCode::Backspace => self.session.update_composer(composer::Message::CharDeleted),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.session
                    .update_composer(composer::Message::CharInserted(c));
            }
            _ => {}
        }
    }

    /// Enter: a slash command runs, anything else is sent
    fn submit(&mut self) {
        let draft = self.session.composer().draft().to_string();
        match Command::parse(&draft) {
            Ok(None) => self.send(),
            Ok(Some(command)) => {
                self.session.update_composer(composer::Message::Cleared);
                self.execute(command);
            }
            Err(e) => self.session.notify_error("Command", e.to_string()),
        }
    }

    fn send(&mut self) {
        let pending = match self.session.begin_send() {
            Ok(pending) => {
                self.session.clear_notice();
                pending
            }
            Err(Error::EmptyDraft) => return,
            Err(e) => {
                log::debug!("{e}");
                return;
            }
        };

        let backend = self.backend();
        self.spawn(async move {
            let result = backend.send_message(pending.content().to_string()).await;
            Outcome::Sent { pending, result }
        });
    }

    fn execute(&mut self, command: Command) {
        log::debug!("Executing {command:?}");

        match command {
            Command::Mute(target) => {
                let key = match self.session.resolve_mute_target(target) {
                    Ok(key) => key,
                    Err(e) => {
                        self.session.notify_error("Mute", e.to_string());
                        return;
                    }
                };
                if self.session.check_mute(&key).is_some() {
                    return;
                }
                let backend = self.backend();
                self.spawn(async move { Outcome::Muted(backend.mute_user(key).await) });
            }
            Command::Unmute(key) => {
                let backend = self.backend();
                self.spawn(async move { Outcome::Unmuted(backend.unmute_user(key).await) });
            }
            Command::ListMuted => {
                let muted = self.session.mutes().sorted();
                let text = if muted.is_empty() {
                    String::from("nobody is muted")
                } else {
                    muted
                        .iter()
                        .map(|key| key.as_str())
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                self.session.notify("Muted", text);
            }
            Command::ListRelays => {
                let text = if self.settings.relays().is_empty() {
                    String::from("no relays")
                } else {
                    self.settings.relays().join(", ")
                };
                self.session.notify("Relays", text);
            }
            Command::AddRelay(url) => {
                if self.settings.has_relay(&url) {
                    self.session.notify("Relays", format!("{url} is already in the list"));
                    return;
                }
                let backend = self.backend();
                self.spawn(async move {
                    let result = backend.add_relay(url.clone()).await;
                    settings_outcome(result, |()| {
                        let notice = format!("Added {url}");
                        (settings::Message::RelayAdded(url), Some(notice))
                    })
                });
            }
            Command::RemoveRelay(url) => {
                let backend = self.backend();
                self.spawn(async move {
                    let result = backend.remove_relay(url.clone()).await;
                    settings_outcome(result, |()| {
                        let notice = format!("Removed {url}");
                        (settings::Message::RelayRemoved(url), Some(notice))
                    })
                });
            }
            Command::ShowPublicKey => {
                let text = self.settings.public_key().unwrap_or("not loaded yet").to_string();
                self.session.notify("Key", text);
            }
            Command::ExportSecretKey => {
                let backend = self.backend();
                self.spawn(async move {
                    settings_outcome(backend.export_secret_key().await, |secret| {
                        (
                            settings::Message::SecretKeyRevealed(secret),
                            Some(String::from("Secret key shown, /hide to hide it")),
                        )
                    })
                });
            }
            Command::HideSecretKey => self.settings.update(settings::Message::SecretKeyHidden),
            Command::ImportSecretKey(secret) => {
                let backend = self.backend();
                self.spawn(async move {
                    match backend.import_secret_key(secret).await {
                        Ok(public_key) => Outcome::Settings {
                            notice: Some(format!("Imported {public_key}, used from the next start")),
                            message: settings::Message::KeyImported { public_key },
                        },
                        Err(e) => Outcome::Failed {
                            message: Some(settings::Message::KeyImportFailed {
                                reason: e.to_string(),
                            }),
                            error: Error::Settings(e),
                        },
                    }
                });
            }
            Command::SetProfile { field, value } => {
                self.settings
                    .update(settings::Message::ProfileFieldChanged { field, value });
                self.session
                    .notify("Profile", format!("{field} updated, /save to publish"));
            }
            Command::SaveProfile => {
                self.settings.update(settings::Message::ProfileSaveStarted);
                let profile = self.settings.profile().clone();
                let backend = self.backend();
                self.spawn(async move {
                    match backend.update_profile(profile).await {
                        Ok(()) => Outcome::Settings {
                            message: settings::Message::ProfileSaved,
                            notice: Some(String::from("Profile saved")),
                        },
                        Err(e) => Outcome::Failed {
                            message: Some(settings::Message::ProfileSaveFailed),
                            error: Error::Settings(e),
                        },
                    }
                });
            }
            Command::Help => self.session.notify("Help", command::help()),
            Command::Quit => self.should_quit = true,
        }
    }

    pub fn view(&self) -> ChatView<'_> {
        ChatView {
            messages: self.session.visible(),
            draft: self.session.composer().draft(),
            status_bar: self.session.status_bar(),
            ctx: ViewContext {
                connection: self.session.connection().status(),
                public_key: self.settings.public_key(),
            },
            secret_key: self.settings.revealed_secret_key(),
            now: Local::now(),
        }
    }

    pub fn draw<T: TuiLike + ?Sized>(&self, tui: &mut T) -> Result<()> {
        tui.draw(&mut |frame| {
            let area = frame.area();
            let view = self.view();
            let cursor = view.cursor_position(area);
            frame.render_widget(view, area);
            frame.set_cursor_position(cursor);
        })
    }

    fn handle_tui_event<T: TuiLike + ?Sized>(&mut self, tui: &mut T, event: Event) -> Result<()> {
        match event {
            Event::Render => self.draw(tui)?,
            Event::Resize(width, height) => {
                tui.resize(Rect::new(0, 0, width, height))?;
                self.draw(tui)?;
            }
            Event::Key(key) => self.handle_key(key),
            Event::Paste(text) => self.session.update_composer(composer::Message::Pasted(text)),
            Event::Error(e) => {
                log::error!("Terminal error: {e}");
                self.session.notify_error("Terminal", e);
            }
            Event::Tick | Event::FocusGained | Event::FocusLost => {}
        }
        Ok(())
    }

    /// Runs until quit or until the terminal stops producing events
    pub async fn run<T: TuiLike + ?Sized>(&mut self, tui: &mut T) -> Result<()> {
        tui.enter()?;
        self.start();

        loop {
            tokio::select! {
                event = tui.next() => match event {
                    Some(event) => self.handle_tui_event(tui, event)?,
                    None => break,
                },
                Some(event) = self.session.next_event() => self.session.handle_event(event),
                Some(outcome) = self.outcome_rx.recv() => self.handle_outcome(outcome),
            }

            if self.should_quit {
                break;
            }
        }

        self.session.teardown();
        tui.exit()?;
        Ok(())
    }
}

use std::sync::Arc;

use chrono::Utc;

use crate::backend::{Backend, BackendError, BackendEvent, Subscription};
use crate::domain::{Message, RawMessage, SenderKey};
use crate::error::Error;
use crate::model::{
    composer, connection, status_bar, Composer, Connection, MessageStream, MuteList, MuteOutcome,
    MuteTarget, PendingSend, StatusBar,
};

/// What a successful handshake brings back
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Handshake {
    pub muted: Vec<SenderKey>,
    pub backlog: Vec<RawMessage>,
}

/// Connects and loads the initial state
///
/// Only a failed connect is fatal. The mute list and backlog are best effort.
pub async fn handshake<B: Backend + ?Sized>(backend: &B) -> Result<Handshake, BackendError> {
    backend.connect().await?;

    let muted = backend.get_muted_users().await.unwrap_or_else(|e| {
        log::warn!("Failed to load muted users: {e}");
        Vec::new()
    });
    let backlog = backend.get_messages().await.unwrap_or_else(|e| {
        log::warn!("Failed to load backlog: {e}");
        Vec::new()
    });

    Ok(Handshake { muted, backlog })
}

fn now_secs() -> u64 {
    u64::try_from(Utc::now().timestamp()).unwrap_or_default()
}

/// One mounted chat view and everything it owns
///
/// All state changes happen in the synchronous methods. The async helpers only await the
/// backend and then call one of them, so no change is ever half applied.
pub struct ChatSession<B: Backend + ?Sized> {
    backend: Arc<B>,
    stream: MessageStream,
    connection: Connection,
    mutes: MuteList,
    composer: Composer,
    status_bar: StatusBar,
    subscription: Option<Subscription>,
}

impl<B: Backend + ?Sized> ChatSession<B> {
    /// Subscribes to the backend right away, so nothing delivered during connect is missed
    pub fn mount(backend: Arc<B>) -> Self {
        Self::mount_with_stream(backend, MessageStream::new())
    }

    pub fn mount_with_stream(backend: Arc<B>, stream: MessageStream) -> Self {
        let subscription = backend.subscribe();
        log::debug!("Chat session mounted");

        Self {
            backend,
            stream,
            connection: Connection::new(),
            mutes: MuteList::new(),
            composer: Composer::new(),
            status_bar: StatusBar::default(),
            subscription: Some(subscription),
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn stream(&self) -> &MessageStream {
        &self.stream
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn mutes(&self) -> &MuteList {
        &self.mutes
    }

    pub fn composer(&self) -> &Composer {
        &self.composer
    }

    pub fn status_bar(&self) -> &StatusBar {
        &self.status_bar
    }

    pub fn is_mounted(&self) -> bool {
        self.subscription.is_some()
    }

    /// Messages to render, oldest first
    pub fn visible(&self) -> Vec<&Message> {
        self.stream.visible(self.mutes.keys())
    }

    pub fn update_composer(&mut self, message: composer::Message) {
        self.composer.update(message);
    }

    pub fn notify(&mut self, label: &str, message: impl Into<String>) {
        self.status_bar.update(status_bar::Message::MessageChanged {
            label: label.to_string(),
            message: message.into(),
        });
    }

    pub fn notify_error(&mut self, label: &str, message: impl Into<String>) {
        self.status_bar.update(status_bar::Message::ErrorMessageChanged {
            label: label.to_string(),
            message: message.into(),
        });
    }

    pub fn clear_notice(&mut self) {
        self.status_bar.update(status_bar::Message::MessageCleared);
    }

    /// Applies the result of [`handshake`]
    pub fn finish_connect(&mut self, result: Result<Handshake, BackendError>) -> Result<(), Error> {
        match result {
            Ok(Handshake { muted, backlog }) => {
                self.connection
                    .update(connection::Message::HandshakeSucceeded);
                for key in muted {
                    self.mutes.mute(key.clone());
                    self.stream.remove_by_sender(&key);
                }

                let total = backlog.len();
                let mut inserted = 0;
                for raw in backlog {
                    if self.ingest_raw(raw) {
                        inserted += 1;
                    }
                }
                log::info!("Connected, loaded {inserted} of {total} backlog messages");
                Ok(())
            }
            Err(e) => {
                self.connection.update(connection::Message::HandshakeFailed {
                    reason: e.to_string(),
                });
                self.notify_error("Connection", e.to_string());
                Err(Error::ConnectionFailure(e))
            }
        }
    }

    /// Applies one pushed backend event
    pub fn handle_event(&mut self, event: BackendEvent) {
        match event {
            BackendEvent::Message(raw) => {
                self.ingest_raw(raw);
            }
            BackendEvent::StreamFailed { reason } => {
                self.connection
                    .update(connection::Message::StreamFailed {
                        reason: reason.clone(),
                    });
                self.notify_error("Connection", reason);
            }
        }
    }

    /// Applies every queued event without waiting and returns how many there were
    pub fn drain_events(&mut self) -> usize {
        let mut handled = 0;
        while let Some(event) = self.subscription.as_mut().and_then(Subscription::try_recv) {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Waits for the next pushed event; `None` once unmounted or the backend is gone
    pub async fn next_event(&mut self) -> Option<BackendEvent> {
        match self.subscription.as_mut() {
            Some(subscription) => subscription.recv().await,
            None => None,
        }
    }

    fn ingest_raw(&mut self, raw: RawMessage) -> bool {
        let message = match Message::try_from(raw) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("Dropping invalid message: {e}");
                return false;
            }
        };
        if self.mutes.is_muted(&message.sender) {
            return false;
        }
        self.stream.ingest(message)
    }

    /// First half of a send: checks the connection, then takes the draft
    ///
    /// On error the draft is left untouched.
    pub fn begin_send(&mut self) -> Result<PendingSend, Error> {
        if let Err(e) = self.connection.check_send() {
            self.notify_error("Send", e.to_string());
            return Err(e);
        }
        self.composer.capture().ok_or(Error::EmptyDraft)
    }

    /// The publish succeeded: the message joins the stream under the returned id
    pub fn commit_send(&mut self, pending: PendingSend, id: String) {
        self.commit_send_at(pending, id, now_secs());
    }

    pub fn commit_send_at(&mut self, pending: PendingSend, id: String, timestamp: u64) {
        let message = pending.into_message(id, timestamp);
        self.stream.append_optimistic(message);
    }

    /// The publish failed: the text goes back to the draft and nothing is inserted
    pub fn rollback_send(&mut self, pending: PendingSend, error: BackendError) -> Error {
        self.composer.restore(pending);
        let error = Error::SendFailure(error);
        self.notify_error("Send", error.to_string());
        error
    }

    /// Resolves a `/mute` target to a sender key
    pub fn resolve_mute_target(&self, target: MuteTarget) -> Result<SenderKey, Error> {
        match target {
            MuteTarget::Key(key) => Ok(key),
            MuteTarget::Author(name) => self
                .stream
                .as_slice()
                .iter()
                .rev()
                .find(|message| message.display_name == name)
                .map(|message| message.sender.clone())
                .ok_or_else(|| Error::InvalidCommand(format!("no author named '{name}' in view"))),
        }
    }

    /// Returns `Some` with the outcome when no backend call is needed
    pub fn check_mute(&mut self, key: &SenderKey) -> Option<MuteOutcome> {
        if key.is_local() {
            self.notify("Mute", "You cannot mute yourself");
            return Some(MuteOutcome::RejectedSelf);
        }
        None
    }

    /// Applies a backend mute result. Nothing changes locally on error.
    pub fn apply_mute(&mut self, result: Result<SenderKey, BackendError>) -> Result<MuteOutcome, Error> {
        let key = match result {
            Ok(key) => key,
            Err(e) => {
                let error = Error::MuteFailure(e);
                self.notify_error("Mute", error.to_string());
                return Err(error);
            }
        };

        // Backends resolve the local user's own npub or hex to the sentinel
        let outcome = self.mutes.mute(key.clone());
        if outcome == MuteOutcome::RejectedSelf {
            self.notify("Mute", "You cannot mute yourself");
        } else {
            let removed = self.stream.remove_by_sender(&key);
            log::info!("Muted {key}, removed {removed} messages");
            self.notify("Mute", format!("Muted {key}"));
        }
        Ok(outcome)
    }

    /// Unmuting does not bring back messages that were already purged
    pub fn apply_unmute(&mut self, result: Result<SenderKey, BackendError>) -> Result<bool, Error> {
        match result {
            Ok(key) => {
                let removed = self.mutes.unmute(&key);
                self.notify("Mute", format!("Unmuted {key}"));
                Ok(removed)
            }
            Err(e) => {
                let error = Error::MuteFailure(e);
                self.notify_error("Mute", error.to_string());
                Err(error)
            }
        }
    }

    pub async fn connect(&mut self) -> Result<(), Error> {
        let result = handshake(&*self.backend).await;
        self.finish_connect(result)
    }

    pub async fn send(&mut self) -> Result<(), Error> {
        let pending = self.begin_send()?;
        let backend = Arc::clone(&self.backend);

        match backend.send_message(pending.content().to_string()).await {
            Ok(id) => {
                self.commit_send(pending, id);
                Ok(())
            }
            Err(e) => Err(self.rollback_send(pending, e)),
        }
    }

    pub async fn mute(&mut self, key: SenderKey) -> Result<MuteOutcome, Error> {
        if let Some(outcome) = self.check_mute(&key) {
            return Ok(outcome);
        }
        let backend = Arc::clone(&self.backend);
        let result = backend.mute_user(key).await;
        self.apply_mute(result)
    }

    pub async fn unmute(&mut self, key: SenderKey) -> Result<bool, Error> {
        let backend = Arc::clone(&self.backend);
        let result = backend.unmute_user(key).await;
        self.apply_unmute(result)
    }

    /// Stops event delivery. Safe to call more than once.
    pub fn teardown(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
            log::debug!("Chat session unmounted");
        }
    }

    pub fn unmount(mut self) {
        self.teardown();
    }
}

impl<B: Backend + ?Sized> Drop for ChatSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

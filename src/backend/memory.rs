use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use nostr_sdk::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::Notify;

use crate::backend::{Backend, BackendError, BackendEvent, EventSender, Subscription};
use crate::domain::{message::LOCAL_DISPLAY_NAME, Profile, RawMessage, SenderKey};

#[derive(Debug, Default)]
struct State {
    connected: bool,
    connect_held: bool,
    connect_failure: Option<String>,
    send_failure: Option<String>,
    mute_failure: Option<String>,
    echo: bool,
    listeners: Vec<EventSender>,
    backlog: Vec<RawMessage>,
    sent: Vec<String>,
    muted: BTreeSet<SenderKey>,
    relays: Vec<String>,
    profile: Option<Profile>,
}

/// A backend that never leaves the process
///
/// Used for `--offline` and as the test double of the session. Failures and slow handshakes
/// can be scripted; messages are injected with [`MemoryBackend::push`].
#[derive(Debug)]
pub struct MemoryBackend {
    keys: Mutex<Keys>,
    state: Mutex<State>,
    connect_released: Notify,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            keys: Mutex::new(Keys::generate()),
            state: Mutex::new(State::default()),
            connect_released: Notify::new(),
        }
    }

    /// Messages returned by `get_messages`
    pub fn with_backlog(self, backlog: Vec<RawMessage>) -> Self {
        self.state().backlog = backlog;
        self
    }

    pub fn with_muted<I>(self, muted: I) -> Self
    where
        I: IntoIterator<Item = SenderKey>,
    {
        self.state().muted.extend(muted);
        self
    }

    pub fn with_relays(self, relays: Vec<String>) -> Self {
        self.state().relays = relays;
        self
    }

    /// Deliver every published message back to the subscribers
    pub fn with_echo(self) -> Self {
        self.state().echo = true;
        self
    }

    pub fn set_connect_failure(&self, reason: Option<&str>) {
        self.state().connect_failure = reason.map(String::from);
    }

    pub fn set_send_failure(&self, reason: Option<&str>) {
        self.state().send_failure = reason.map(String::from);
    }

    pub fn set_mute_failure(&self, reason: Option<&str>) {
        self.state().mute_failure = reason.map(String::from);
    }

    /// Makes the next `connect` wait until [`MemoryBackend::release_connect`]
    pub fn hold_connect(&self) {
        self.state().connect_held = true;
    }

    pub fn release_connect(&self) {
        self.state().connect_held = false;
        self.connect_released.notify_one();
    }

    /// Delivers a message to every live subscription
    pub fn push(&self, message: RawMessage) {
        self.broadcast(BackendEvent::Message(message));
    }

    pub fn push_failure(&self, reason: &str) {
        self.broadcast(BackendEvent::StreamFailed {
            reason: reason.to_string(),
        });
    }

    /// Number of subscriptions that have not been torn down
    pub fn listener_count(&self) -> usize {
        let mut state = self.state();
        state.listeners.retain(|listener| !listener.is_closed());
        state.listeners.len()
    }

    /// Contents published so far, oldest first
    pub fn sent(&self) -> Vec<String> {
        self.state().sent.clone()
    }

    pub fn muted(&self) -> Vec<SenderKey> {
        self.state().muted.iter().cloned().collect()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn keys(&self) -> Keys {
        self.keys
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn broadcast(&self, event: BackendEvent) {
        let mut state = self.state();
        state
            .listeners
            .retain(|listener| listener.send(event.clone()));
    }

    fn ensure_connected(&self) -> Result<(), BackendError> {
        if self.state().connected {
            Ok(())
        } else {
            Err(BackendError::NotInitialized)
        }
    }

    /// Accepts npub or hex for real keys and leaves anything else untouched.
    /// The local user's own key becomes the `"self"` sentinel.
    fn canonical(&self, key: SenderKey) -> SenderKey {
        match PublicKey::parse(key.as_str()) {
            Ok(public_key) if public_key == self.keys().public_key() => SenderKey::local(),
            Ok(public_key) => SenderKey::new(public_key.to_hex()),
            Err(_) => key,
        }
    }

    fn publish(&self, content: String) -> Result<String, BackendError> {
        if let Some(reason) = self.state().send_failure.clone() {
            return Err(BackendError::Rejected(reason));
        }

        let event = EventBuilder::text_note(&content)
            .sign_with_keys(&self.keys())
            .map_err(|e| BackendError::Key(e.to_string()))?;
        let id = event.id.to_hex();
        let timestamp = i64::try_from(event.created_at.as_secs())
            .map_err(|e| BackendError::Rejected(e.to_string()))?;

        let echo = {
            let mut state = self.state();
            state.sent.push(content.clone());
            state.echo
        };
        if echo {
            self.push(RawMessage {
                id: id.clone(),
                pubkey: String::from(SenderKey::LOCAL),
                author: String::from(LOCAL_DISPLAY_NAME),
                content,
                timestamp,
                is_post: true,
            });
        }

        Ok(id)
    }
}

impl Backend for MemoryBackend {
    fn connect(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            let held = self.state().connect_held;
            if held {
                self.connect_released.notified().await;
            }

            let mut state = self.state();
            if let Some(reason) = state.connect_failure.clone() {
                return Err(BackendError::Relay(reason));
            }
            state.connected = true;
            log::info!("Memory backend connected");
            Ok(())
        })
    }

    fn subscribe(&self) -> Subscription {
        let (sender, subscription) = Subscription::channel();
        self.state().listeners.push(sender);
        subscription
    }

    fn get_messages(&self) -> BoxFuture<'_, Result<Vec<RawMessage>, BackendError>> {
        Box::pin(async move {
            self.ensure_connected()?;
            Ok(self.state().backlog.clone())
        })
    }

    fn send_message(&self, content: String) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.publish(content)
        })
    }

    fn mute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>> {
        Box::pin(async move {
            let mut state = self.state();
            if let Some(reason) = state.mute_failure.clone() {
                return Err(BackendError::Rejected(reason));
            }

            let key = self.canonical(key);
            if !key.is_local() {
                state.muted.insert(key.clone());
            }
            Ok(key)
        })
    }

    fn unmute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>> {
        Box::pin(async move {
            let key = self.canonical(key);
            self.state().muted.remove(&key);
            Ok(key)
        })
    }

    fn get_muted_users(&self) -> BoxFuture<'_, Result<Vec<SenderKey>, BackendError>> {
        Box::pin(async move { Ok(self.muted()) })
    }

    fn get_public_key(&self) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let Ok(npub) = self.keys().public_key().to_bech32();
            Ok(npub)
        })
    }

    fn export_secret_key(&self) -> BoxFuture<'_, Result<SecretString, BackendError>> {
        Box::pin(async move {
            let nsec = self
                .keys()
                .secret_key()
                .to_bech32()
                .map_err(|e| BackendError::Key(e.to_string()))?;
            Ok(SecretString::from(nsec))
        })
    }

    fn import_secret_key(&self, key: SecretString) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let keys =
                Keys::parse(key.expose_secret()).map_err(|e| BackendError::Key(e.to_string()))?;
            let Ok(npub) = keys.public_key().to_bech32();
            *self.keys.lock().unwrap_or_else(PoisonError::into_inner) = keys;
            Ok(npub)
        })
    }

    fn get_my_profile(&self) -> BoxFuture<'_, Result<Option<Profile>, BackendError>> {
        Box::pin(async move { Ok(self.state().profile.clone()) })
    }

    fn update_profile(&self, profile: Profile) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            self.ensure_connected()?;
            self.state().profile = Some(profile);
            Ok(())
        })
    }

    fn get_relays(&self) -> BoxFuture<'_, Result<Vec<String>, BackendError>> {
        Box::pin(async move { Ok(self.state().relays.clone()) })
    }

    fn add_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            let mut state = self.state();
            if !state.relays.contains(&url) {
                state.relays.push(url);
            }
            Ok(())
        })
    }

    fn remove_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            self.state().relays.retain(|relay| relay != &url);
            Ok(())
        })
    }
}

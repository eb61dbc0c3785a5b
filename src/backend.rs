//! The boundary to the messaging network
//!
//! A [`Backend`] owns keys, relays and persisted lists. The session only talks to it through
//! this trait, so the terminal app can run against [`nostr::NostrBackend`] or the offline
//! [`memory::MemoryBackend`].

use futures::future::BoxFuture;
use secrecy::SecretString;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::{Profile, RawMessage, SenderKey};

pub mod memory;
pub mod nostr;
pub mod storage;

pub use storage::{Storage, StorageError};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend is not connected")]
    NotInitialized,
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("invalid key: {0}")]
    Key(String),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
    #[error("relay: {0}")]
    Relay(String),
}

/// Pushed from the backend to every live subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Message(RawMessage),
    StreamFailed { reason: String },
}

/// Receiving half of a backend event feed
///
/// Dropping it cancels the feed. Cancellation is idempotent, so the feed is deregistered
/// exactly once no matter how many times teardown runs.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<BackendEvent>,
    cancel_token: CancellationToken,
}

/// Sending half handed to the backend
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::UnboundedSender<BackendEvent>,
    cancel_token: CancellationToken,
}

impl Subscription {
    pub fn channel() -> (EventSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();

        (
            EventSender {
                tx,
                cancel_token: cancel_token.clone(),
            },
            Self { rx, cancel_token },
        )
    }

    pub async fn recv(&mut self) -> Option<BackendEvent> {
        if self.cancel_token.is_cancelled() {
            return None;
        }
        self.rx.recv().await
    }

    /// Next queued event without waiting
    pub fn try_recv(&mut self) -> Option<BackendEvent> {
        if self.cancel_token.is_cancelled() {
            return None;
        }
        self.rx.try_recv().ok()
    }

    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

impl EventSender {
    /// Delivers an event; returns false once the subscription is gone
    pub fn send(&self, event: BackendEvent) -> bool {
        if self.cancel_token.is_cancelled() {
            return false;
        }
        self.tx.send(event).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.cancel_token.is_cancelled() || self.tx.is_closed()
    }

    /// Resolves when the subscription is cancelled or dropped
    pub async fn closed(&self) {
        self.cancel_token.cancelled().await;
    }
}

/// Asynchronous operations offered by the messaging network
///
/// Every call may suspend. Implementations must be shareable across tasks.
pub trait Backend: Send + Sync + 'static {
    /// Completes once the handshake with the network succeeded
    fn connect(&self) -> BoxFuture<'_, Result<(), BackendError>>;

    /// Registers a new event feed. Valid before `connect` resolves.
    fn subscribe(&self) -> Subscription;

    fn get_messages(&self) -> BoxFuture<'_, Result<Vec<RawMessage>, BackendError>>;

    /// Publishes a message and returns its event id
    fn send_message(&self, content: String) -> BoxFuture<'_, Result<String, BackendError>>;

    /// Persists a mute and returns the key the sender is known by in the stream
    ///
    /// The local user's own key comes back as [`SenderKey::local`] and is not recorded.
    fn mute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>>;

    fn unmute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>>;

    fn get_muted_users(&self) -> BoxFuture<'_, Result<Vec<SenderKey>, BackendError>>;

    /// Public key of the local identity (npub)
    fn get_public_key(&self) -> BoxFuture<'_, Result<String, BackendError>>;

    /// Secret key of the local identity (nsec)
    fn export_secret_key(&self) -> BoxFuture<'_, Result<SecretString, BackendError>>;

    /// Replaces the local identity and returns its public key (npub)
    fn import_secret_key(&self, key: SecretString) -> BoxFuture<'_, Result<String, BackendError>>;

    fn get_my_profile(&self) -> BoxFuture<'_, Result<Option<Profile>, BackendError>>;

    fn update_profile(&self, profile: Profile) -> BoxFuture<'_, Result<(), BackendError>>;

    fn get_relays(&self) -> BoxFuture<'_, Result<Vec<String>, BackendError>>;

    fn add_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>>;

    fn remove_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>>;
}

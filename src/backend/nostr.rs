use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures::future::BoxFuture;
use nostr_sdk::prelude::*;
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::{broadcast::error::RecvError, RwLock};
use tokio_util::sync::CancellationToken;

use crate::backend::{Backend, BackendError, BackendEvent, EventSender, Storage, Subscription};
use crate::domain::{
    message::LOCAL_DISPLAY_NAME, profile::author_label, spam::is_spam, Profile, RawMessage,
    SenderKey,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NostrOptions {
    /// Used until the user saves a relay list of their own
    pub default_relays: Vec<String>,
    pub spam_filter: bool,
    pub backlog_limit: usize,
    pub backlog_timeout: Duration,
}

impl Default for NostrOptions {
    fn default() -> Self {
        Self {
            default_relays: vec![
                String::from("wss://relay.damus.io"),
                String::from("wss://nos.lol"),
            ],
            spam_filter: true,
            backlog_limit: 100,
            backlog_timeout: Duration::from_secs(10),
        }
    }
}

type Profiles = Arc<RwLock<HashMap<PublicKey, Profile>>>;
type Muted = Arc<RwLock<HashSet<SenderKey>>>;
type Listeners = Arc<Mutex<Vec<EventSender>>>;

/// Turns relay events into chat messages
///
/// Metadata events only feed the profile cache. Muted senders and spam are dropped here,
/// before anything reaches a subscriber.
#[derive(Debug, Clone)]
struct EventFilter {
    own_pubkey: PublicKey,
    spam_filter: bool,
    profiles: Profiles,
    muted: Muted,
}

impl EventFilter {
    async fn to_message(&self, event: &Event) -> Option<RawMessage> {
        if event.kind == Kind::Metadata {
            self.remember_profile(event).await;
            return None;
        }
        if event.kind != Kind::TextNote && event.kind != Kind::ChannelMessage {
            return None;
        }

        let is_own = event.pubkey == self.own_pubkey;
        let pubkey = if is_own {
            String::from(SenderKey::LOCAL)
        } else {
            event.pubkey.to_hex()
        };
        if self.muted.read().await.contains(&SenderKey::new(pubkey.as_str())) {
            return None;
        }
        if self.spam_filter && !is_own && is_spam(&event.content) {
            log::debug!("Dropping spam event {}", event.id);
            return None;
        }

        let Ok(timestamp) = i64::try_from(event.created_at.as_secs()) else {
            log::debug!("Dropping event {} with an out of range timestamp", event.id);
            return None;
        };

        let author = if is_own {
            String::from(LOCAL_DISPLAY_NAME)
        } else {
            let profiles = self.profiles.read().await;
            author_label(&event.pubkey, profiles.get(&event.pubkey))
        };

        Some(RawMessage {
            id: event.id.to_hex(),
            pubkey,
            author,
            content: event.content.clone(),
            timestamp,
            is_post: event.kind == Kind::TextNote,
        })
    }

    async fn remember_profile(&self, event: &Event) {
        match Metadata::from_json(&event.content) {
            Ok(metadata) => {
                self.profiles
                    .write()
                    .await
                    .insert(event.pubkey, Profile::from(&metadata));
            }
            Err(e) => log::debug!("Ignoring malformed metadata {}: {e}", event.id),
        }
    }
}

fn broadcast(listeners: &Listeners, event: BackendEvent) {
    listeners
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .retain(|listener| listener.send(event.clone()));
}

fn relay_error(e: impl fmt::Display) -> BackendError {
    BackendError::Relay(e.to_string())
}

fn key_error(e: impl fmt::Display) -> BackendError {
    BackendError::Key(e.to_string())
}

/// Backend talking to Nostr relays through `nostr-sdk`
pub struct NostrBackend {
    storage: Storage,
    options: NostrOptions,
    keys: RwLock<Keys>,
    client: RwLock<Option<Client>>,
    relays: RwLock<Vec<String>>,
    profiles: Profiles,
    muted: Muted,
    listeners: Listeners,
    cancel_token: CancellationToken,
}

impl NostrBackend {
    /// Loads persisted keys, relays and mutes. Keys are generated and saved on first run.
    pub fn new(storage: Storage, options: NostrOptions) -> Result<Self, BackendError> {
        let keys = match storage.load_secret_key()? {
            Some(secret_hex) => Keys::parse(&secret_hex).map_err(key_error)?,
            None => {
                let keys = Keys::generate();
                storage.save_secret_key(&keys.secret_key().to_secret_hex())?;
                log::info!("Generated a new identity in {}", storage.dir().display());
                keys
            }
        };
        let relays = storage
            .load_relays()?
            .unwrap_or_else(|| options.default_relays.clone());
        let muted = storage.load_muted()?.into_iter().collect();

        Ok(Self {
            storage,
            options,
            keys: RwLock::new(keys),
            client: RwLock::new(None),
            relays: RwLock::new(relays),
            profiles: Arc::new(RwLock::new(HashMap::new())),
            muted: Arc::new(RwLock::new(muted)),
            listeners: Arc::new(Mutex::new(Vec::new())),
            cancel_token: CancellationToken::new(),
        })
    }

    /// Stops delivering events and closes every relay connection
    pub async fn shutdown(&self) {
        self.cancel_token.cancel();
        if let Some(client) = self.client.write().await.take() {
            log::info!("Closing Nostr connection");
            client.disconnect().await;
        }
    }

    async fn client(&self) -> Result<Client, BackendError> {
        self.client
            .read()
            .await
            .clone()
            .ok_or(BackendError::NotInitialized)
    }

    async fn event_filter(&self) -> EventFilter {
        EventFilter {
            own_pubkey: self.keys.read().await.public_key(),
            spam_filter: self.options.spam_filter,
            profiles: Arc::clone(&self.profiles),
            muted: Arc::clone(&self.muted),
        }
    }

    /// Parses npub or hex. The local user's own key becomes the `"self"` sentinel.
    async fn canonical(&self, key: &SenderKey) -> Result<SenderKey, BackendError> {
        let public_key = PublicKey::parse(key.as_str()).map_err(key_error)?;
        if public_key == self.keys.read().await.public_key() {
            return Ok(SenderKey::local());
        }
        Ok(SenderKey::new(public_key.to_hex()))
    }

    /// Persists an edited copy of the mute list and only then makes it live
    async fn edit_muted<F>(&self, edit: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut HashSet<SenderKey>),
    {
        let mut muted = self.muted.write().await;
        let mut next = muted.clone();
        edit(&mut next);
        if next != *muted {
            self.storage.save_muted(next.iter())?;
            *muted = next;
        }
        Ok(())
    }

    /// Same as [`NostrBackend::edit_muted`], for the relay list
    async fn edit_relays<F>(&self, edit: F) -> Result<(), BackendError>
    where
        F: FnOnce(&mut Vec<String>),
    {
        let mut relays = self.relays.write().await;
        let mut next = relays.clone();
        edit(&mut next);
        if next != *relays {
            self.storage.save_relays(&next)?;
            *relays = next;
        }
        Ok(())
    }

    fn spawn_event_loop(&self, client: &Client, filter: EventFilter) {
        let mut notifications = client.notifications();
        let listeners = Arc::clone(&self.listeners);
        let cancel_token = self.cancel_token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = notifications.recv() => {
                        match result {
                            Ok(RelayPoolNotification::Event { event, .. }) => {
                                if let Some(message) = filter.to_message(&event).await {
                                    broadcast(&listeners, BackendEvent::Message(message));
                                }
                            }
                            Ok(RelayPoolNotification::Shutdown) => {
                                broadcast(&listeners, BackendEvent::StreamFailed {
                                    reason: String::from("relay pool shut down"),
                                });
                                break;
                            }
                            Ok(_) => {}
                            Err(RecvError::Lagged(n)) => {
                                log::warn!("Missed {n} notifications from relays");
                            }
                            Err(RecvError::Closed) => {
                                log::error!("Notification channel closed");
                                broadcast(&listeners, BackendEvent::StreamFailed {
                                    reason: String::from("notification channel closed"),
                                });
                                break;
                            }
                        }
                    }

                    _ = cancel_token.cancelled() => {
                        log::info!("Event loop received cancellation signal");
                        break;
                    }
                }
            }
        });
    }
}

impl Backend for NostrBackend {
    fn connect(&self) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            let keys = self.keys.read().await.clone();
            let client = Client::new(keys);

            let relays = self.relays.read().await.clone();
            let mut added = 0;
            for relay in &relays {
                match client.add_relay(relay.as_str()).await {
                    Ok(_) => added += 1,
                    Err(e) => log::warn!("Skipping relay {relay}: {e}"),
                }
            }
            if added == 0 {
                return Err(BackendError::Relay(String::from("no usable relay configured")));
            }

            client.connect().await;

            // Listen before subscribing so nothing sent in between is lost
            self.spawn_event_loop(&client, self.event_filter().await);

            let filter = Filter::new()
                .kinds([Kind::ChannelMessage, Kind::TextNote, Kind::Metadata])
                .since(Timestamp::now());
            client.subscribe(filter, None).await.map_err(relay_error)?;

            log::info!("Connected to {added} relays");
            *self.client.write().await = Some(client);
            Ok(())
        })
    }

    fn subscribe(&self) -> Subscription {
        let (sender, subscription) = Subscription::channel();
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(sender);
        subscription
    }

    fn get_messages(&self) -> BoxFuture<'_, Result<Vec<RawMessage>, BackendError>> {
        Box::pin(async move {
            let client = self.client().await?;
            let timeout = self.options.backlog_timeout;

            let filter = Filter::new()
                .kinds([Kind::ChannelMessage, Kind::TextNote])
                .limit(self.options.backlog_limit);
            let events: Vec<Event> = client
                .fetch_events(filter, timeout)
                .await
                .map_err(relay_error)?
                .into_iter()
                .collect();

            let authors: HashSet<PublicKey> = events.iter().map(|event| event.pubkey).collect();
            let filter = self.event_filter().await;
            if !authors.is_empty() {
                let metadata = Filter::new().kind(Kind::Metadata).authors(authors);
                match client.fetch_events(metadata, timeout).await {
                    Ok(profiles) => {
                        for event in profiles.into_iter() {
                            filter.remember_profile(&event).await;
                        }
                    }
                    Err(e) => log::warn!("Failed to fetch author profiles: {e}"),
                }
            }

            let mut messages = Vec::with_capacity(events.len());
            for event in &events {
                if let Some(message) = filter.to_message(event).await {
                    messages.push(message);
                }
            }
            log::debug!("Fetched {} backlog messages", messages.len());
            Ok(messages)
        })
    }

    fn send_message(&self, content: String) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let client = self.client().await?;
            let output = client
                .send_event_builder(EventBuilder::text_note(content))
                .await
                .map_err(relay_error)?;

            if output.success.is_empty() {
                let reason = output
                    .failed
                    .values()
                    .next()
                    .cloned()
                    .unwrap_or_else(|| String::from("no relay accepted the event"));
                return Err(BackendError::Rejected(reason));
            }

            Ok(output.val.to_hex())
        })
    }

    fn mute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>> {
        Box::pin(async move {
            let key = self.canonical(&key).await?;
            if key.is_local() {
                return Ok(key);
            }

            self.edit_muted(|muted| {
                muted.insert(key.clone());
            })
            .await?;
            Ok(key)
        })
    }

    fn unmute_user(&self, key: SenderKey) -> BoxFuture<'_, Result<SenderKey, BackendError>> {
        Box::pin(async move {
            let key = self.canonical(&key).await?;
            self.edit_muted(|muted| {
                muted.remove(&key);
            })
            .await?;
            Ok(key)
        })
    }

    fn get_muted_users(&self) -> BoxFuture<'_, Result<Vec<SenderKey>, BackendError>> {
        Box::pin(async move {
            let mut muted: Vec<SenderKey> = self.muted.read().await.iter().cloned().collect();
            muted.sort();
            Ok(muted)
        })
    }

    fn get_public_key(&self) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let Ok(npub) = self.keys.read().await.public_key().to_bech32();
            Ok(npub)
        })
    }

    fn export_secret_key(&self) -> BoxFuture<'_, Result<SecretString, BackendError>> {
        Box::pin(async move {
            let nsec = self
                .keys
                .read()
                .await
                .secret_key()
                .to_bech32()
                .map_err(key_error)?;
            Ok(SecretString::from(nsec))
        })
    }

    fn import_secret_key(&self, key: SecretString) -> BoxFuture<'_, Result<String, BackendError>> {
        Box::pin(async move {
            let keys = Keys::parse(key.expose_secret().trim()).map_err(key_error)?;
            self.storage
                .save_secret_key(&keys.secret_key().to_secret_hex())?;

            let Ok(npub) = keys.public_key().to_bech32();
            log::info!("Imported identity {npub}, active from the next connect");
            *self.keys.write().await = keys;
            Ok(npub)
        })
    }

    fn get_my_profile(&self) -> BoxFuture<'_, Result<Option<Profile>, BackendError>> {
        Box::pin(async move {
            let public_key = self.keys.read().await.public_key();
            Ok(self.profiles.read().await.get(&public_key).cloned())
        })
    }

    fn update_profile(&self, profile: Profile) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            let client = self.client().await?;
            let metadata = Metadata::from(&profile);
            client
                .send_event_builder(EventBuilder::metadata(&metadata))
                .await
                .map_err(relay_error)?;

            let public_key = self.keys.read().await.public_key();
            self.profiles.write().await.insert(public_key, profile);
            Ok(())
        })
    }

    fn get_relays(&self) -> BoxFuture<'_, Result<Vec<String>, BackendError>> {
        Box::pin(async move { Ok(self.relays.read().await.clone()) })
    }

    fn add_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            self.edit_relays(|relays| {
                if !relays.contains(&url) {
                    relays.push(url.clone());
                }
            })
            .await?;

            if let Some(client) = self.client.read().await.clone() {
                if let Err(e) = client.add_relay(url.as_str()).await {
                    log::warn!("Failed to add relay {url}: {e}");
                }
                client.connect().await;
            }
            Ok(())
        })
    }

    fn remove_relay(&self, url: String) -> BoxFuture<'_, Result<(), BackendError>> {
        Box::pin(async move {
            self.edit_relays(|relays| relays.retain(|relay| relay != &url))
                .await?;

            if let Some(client) = self.client.read().await.clone() {
                if let Err(e) = client.remove_relay(url.as_str()).await {
                    log::warn!("Failed to remove relay {url}: {e}");
                }
            }
            Ok(())
        })
    }
}

impl Drop for NostrBackend {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use pretty_assertions::assert_eq;
    use rstest::*;
    use tempfile::TempDir;

    use super::*;

    #[fixture]
    fn dir() -> TempDir {
        tempfile::tempdir().expect("temp dir")
    }

    fn backend(dir: &TempDir) -> NostrBackend {
        NostrBackend::new(Storage::new(dir.path()), NostrOptions::default()).expect("backend")
    }

    fn event_filter(own: &Keys) -> EventFilter {
        EventFilter {
            own_pubkey: own.public_key(),
            spam_filter: true,
            profiles: Arc::new(RwLock::new(HashMap::new())),
            muted: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    fn note(keys: &Keys, content: &str) -> Event {
        EventBuilder::text_note(content)
            .sign_with_keys(keys)
            .expect("signed event")
    }

    #[rstest]
    fn test_identity_is_generated_once(dir: TempDir) {
        let first = backend(&dir);
        let second = backend(&dir);
        assert_eq!(
            first.keys.blocking_read().public_key(),
            second.keys.blocking_read().public_key()
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_requires_connect(dir: TempDir) {
        let backend = backend(&dir);
        assert!(matches!(
            backend.send_message(String::from("gm")).await,
            Err(BackendError::NotInitialized)
        ));
        assert!(matches!(
            backend.get_messages().await,
            Err(BackendError::NotInitialized)
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_mute_is_persisted(dir: TempDir) {
        let alice = Keys::generate();
        let Ok(npub) = alice.public_key().to_bech32();

        let key = backend(&dir)
            .mute_user(SenderKey::new(npub))
            .await
            .expect("mute");
        assert_eq!(key.as_str(), alice.public_key().to_hex());

        let reloaded = backend(&dir);
        assert_eq!(reloaded.get_muted_users().await.ok(), Some(vec![key]));
        assert!(matches!(
            reloaded.mute_user(SenderKey::from("not a key")).await,
            Err(BackendError::Key(_))
        ));
    }

    #[rstest]
    #[tokio::test]
    async fn test_mute_own_key_resolves_to_self(dir: TempDir) {
        let backend = backend(&dir);
        let public_key = backend.keys.read().await.public_key();
        let Ok(npub) = public_key.to_bech32();

        for key in [npub, public_key.to_hex()] {
            let resolved = backend
                .mute_user(SenderKey::new(key))
                .await
                .expect("mute");
            assert_eq!(resolved, SenderKey::local());
        }
        assert_eq!(backend.get_muted_users().await.ok(), Some(vec![]));
        assert!(Storage::new(dir.path())
            .load_muted()
            .expect("load muted")
            .is_empty());
    }

    #[rstest]
    #[tokio::test]
    async fn test_failed_save_leaves_lists_untouched(dir: TempDir) {
        let mut backend = backend(&dir);
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "").expect("write");
        backend.storage = Storage::new(blocker.join("nested"));

        let alice = Keys::generate();
        assert!(matches!(
            backend
                .mute_user(SenderKey::new(alice.public_key().to_hex()))
                .await,
            Err(BackendError::Storage(_))
        ));
        assert_eq!(backend.get_muted_users().await.ok(), Some(vec![]));

        let relays = backend.get_relays().await.ok();
        assert!(backend
            .add_relay(String::from("wss://nostr.wine"))
            .await
            .is_err());
        assert!(backend
            .remove_relay(String::from("wss://relay.damus.io"))
            .await
            .is_err());
        assert_eq!(backend.get_relays().await.ok(), relays);
    }

    #[rstest]
    #[tokio::test]
    async fn test_relays_are_persisted(dir: TempDir) {
        let backend = backend(&dir);
        backend
            .add_relay(String::from("wss://nostr.wine"))
            .await
            .expect("add");
        backend
            .remove_relay(String::from("wss://relay.damus.io"))
            .await
            .expect("remove");

        let expected = vec![String::from("wss://nos.lol"), String::from("wss://nostr.wine")];
        assert_eq!(backend.get_relays().await.ok(), Some(expected.clone()));
        assert_eq!(
            Storage::new(dir.path()).load_relays().ok(),
            Some(Some(expected))
        );
    }

    #[rstest]
    #[tokio::test]
    async fn test_import_is_persisted(dir: TempDir) {
        let keys = Keys::generate();
        let nsec = keys.secret_key().to_bech32().expect("nsec");

        let npub = backend(&dir)
            .import_secret_key(SecretString::from(nsec))
            .await
            .expect("import");
        assert_eq!(backend(&dir).get_public_key().await.ok(), Some(npub));
    }

    #[tokio::test]
    async fn test_event_filter_labels_authors() {
        let own = Keys::generate();
        let alice = Keys::generate();
        let filter = event_filter(&own);

        let message = filter
            .to_message(&note(&alice, "gm"))
            .await
            .expect("message");
        assert_eq!(message.pubkey, alice.public_key().to_hex());
        assert!(message.is_post);

        let mut metadata = Metadata::new();
        metadata.display_name = Some(String::from("Alice"));
        let profile = EventBuilder::metadata(&metadata)
            .sign_with_keys(&alice)
            .expect("signed metadata");
        assert_eq!(filter.to_message(&profile).await, None);

        let message = filter
            .to_message(&note(&alice, "gm again"))
            .await
            .expect("message");
        assert_eq!(message.author, "Alice");
    }

    #[tokio::test]
    async fn test_event_filter_marks_own_events() {
        let own = Keys::generate();
        let message = event_filter(&own)
            .to_message(&note(&own, "hello"))
            .await
            .expect("message");
        assert_eq!(message.pubkey, SenderKey::LOCAL);
        assert_eq!(message.author, LOCAL_DISPLAY_NAME);
    }

    #[tokio::test]
    async fn test_event_filter_drops_out_of_range_timestamps() {
        let own = Keys::generate();
        let event = EventBuilder::text_note("from the far future")
            .custom_created_at(Timestamp::from_secs(u64::MAX))
            .sign_with_keys(&Keys::generate())
            .expect("signed event");
        assert_eq!(event_filter(&own).to_message(&event).await, None);
    }

    #[tokio::test]
    async fn test_event_filter_drops_muted_and_spam() {
        let own = Keys::generate();
        let alice = Keys::generate();
        let filter = event_filter(&own);
        filter
            .muted
            .write()
            .await
            .insert(SenderKey::new(alice.public_key().to_hex()));

        assert_eq!(filter.to_message(&note(&alice, "gm")).await, None);
        assert_eq!(
            filter
                .to_message(&note(&Keys::generate(), "FREE BTC claim now"))
                .await,
            None
        );
    }
}

use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::domain::{Profile, ProfileField};
use crate::error::Error;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ImportStatus {
    #[default]
    Idle,
    /// The new key is used from the next connect on
    Imported { public_key: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProfileStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed,
}

#[derive(Debug)]
pub enum Message {
    PublicKeyLoaded(String),
    SecretKeyRevealed(SecretString),
    SecretKeyHidden,
    KeyImported { public_key: String },
    KeyImportFailed { reason: String },
    ProfileLoaded(Option<Profile>),
    ProfileFieldChanged { field: ProfileField, value: String },
    ProfileSaveStarted,
    ProfileSaved,
    ProfileSaveFailed,
    RelaysLoaded(Vec<String>),
    RelayAdded(String),
    RelayRemoved(String),
}

/// Identity, profile and relay settings as last reported by the backend
#[derive(Debug, Default)]
pub struct Settings {
    public_key: Option<String>,
    secret_key: Option<SecretString>,
    import_status: ImportStatus,
    profile: Profile,
    profile_status: ProfileStatus,
    relays: Vec<String>,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn public_key(&self) -> Option<&str> {
        self.public_key.as_deref()
    }

    pub fn is_secret_key_revealed(&self) -> bool {
        self.secret_key.is_some()
    }

    /// The exported secret key while it is revealed
    pub fn revealed_secret_key(&self) -> Option<&str> {
        self.secret_key.as_ref().map(|secret| secret.expose_secret())
    }

    pub fn import_status(&self) -> &ImportStatus {
        &self.import_status
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn profile_status(&self) -> ProfileStatus {
        self.profile_status
    }

    pub fn relays(&self) -> &[String] {
        &self.relays
    }

    pub fn has_relay(&self, url: &str) -> bool {
        self.relays.iter().any(|relay| relay == url)
    }

    pub fn update(&mut self, message: Message) {
        match message {
            Message::PublicKeyLoaded(public_key) => self.public_key = Some(public_key),
            Message::SecretKeyRevealed(secret) => self.secret_key = Some(secret),
            Message::SecretKeyHidden => self.secret_key = None,
            Message::KeyImported { public_key } => {
                self.public_key = Some(public_key.clone());
                // A revealed key belongs to the old identity
                self.secret_key = None;
                self.import_status = ImportStatus::Imported { public_key };
            }
            Message::KeyImportFailed { reason } => {
                self.import_status = ImportStatus::Failed { reason };
            }
            Message::ProfileLoaded(profile) => self.profile = profile.unwrap_or_default(),
            Message::ProfileFieldChanged { field, value } => self.profile.set(field, &value),
            Message::ProfileSaveStarted => self.profile_status = ProfileStatus::Saving,
            Message::ProfileSaved => self.profile_status = ProfileStatus::Saved,
            Message::ProfileSaveFailed => self.profile_status = ProfileStatus::Failed,
            Message::RelaysLoaded(relays) => {
                self.relays.clear();
                for relay in relays {
                    self.push_relay(relay);
                }
            }
            Message::RelayAdded(url) => self.push_relay(url),
            Message::RelayRemoved(url) => self.relays.retain(|relay| relay != &url),
        }
    }

    fn push_relay(&mut self, url: String) {
        if !self.has_relay(&url) {
            self.relays.push(url);
        }
    }
}

/// Normalizes user input into a relay url, assuming `wss://` when no scheme is given
pub fn normalize_relay_url(input: &str) -> Result<String, Error> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::InvalidRelayUrl(String::new()));
    }

    let url = if input.starts_with("wss://") || input.starts_with("ws://") {
        input.to_string()
    } else if input.contains("://") {
        return Err(Error::InvalidRelayUrl(input.to_string()));
    } else {
        format!("wss://{input}")
    };

    match Url::parse(&url) {
        Ok(parsed) if matches!(parsed.scheme(), "ws" | "wss") && parsed.host_str().is_some() => {
            Ok(url)
        }
        _ => Err(Error::InvalidRelayUrl(input.to_string())),
    }
}

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;

use crate::domain::SenderKey;

const KEYS_FILE: &str = "keys.json";
const RELAYS_FILE: &str = "relays.json";
const MUTED_FILE: &str = "muted.json";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredKeys {
    /// Hex encoded
    secret_key: String,
}

/// JSON files kept in the config directory
#[derive(Debug, Clone)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn load_secret_key(&self) -> Result<Option<String>, StorageError> {
        Ok(self
            .read::<StoredKeys>(KEYS_FILE)?
            .map(|stored| stored.secret_key))
    }

    pub fn save_secret_key(&self, secret_hex: &str) -> Result<(), StorageError> {
        self.write(
            KEYS_FILE,
            &StoredKeys {
                secret_key: secret_hex.to_string(),
            },
        )
    }

    /// `None` when no relay list was saved yet
    pub fn load_relays(&self) -> Result<Option<Vec<String>>, StorageError> {
        self.read(RELAYS_FILE)
    }

    pub fn save_relays(&self, relays: &[String]) -> Result<(), StorageError> {
        self.write(RELAYS_FILE, &relays)
    }

    pub fn load_muted(&self) -> Result<BTreeSet<SenderKey>, StorageError> {
        Ok(self.read(MUTED_FILE)?.unwrap_or_default())
    }

    pub fn save_muted<'a, I>(&self, muted: I) -> Result<(), StorageError>
    where
        I: IntoIterator<Item = &'a SenderKey>,
    {
        let muted: BTreeSet<&SenderKey> = muted.into_iter().collect();
        self.write(MUTED_FILE, &muted)
    }

    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, StorageError> {
        let path = self.dir.join(name);
        let data = match fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StorageError::Io { path, source }),
        };

        serde_json::from_str(&data)
            .map(Some)
            .map_err(|source| StorageError::Json { path, source })
    }

    fn write<T: Serialize + ?Sized>(&self, name: &str, value: &T) -> Result<(), StorageError> {
        let path = self.dir.join(name);
        fs::create_dir_all(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let data = serde_json::to_string_pretty(value).map_err(|source| StorageError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, data).map_err(|source| StorageError::Io { path, source })
    }
}

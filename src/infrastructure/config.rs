use std::path::Path;
use std::time::Duration;

use config::{ConfigError, File, FileFormat};
use serde::Deserialize;

use crate::backend::nostr::NostrOptions;

const CONFIG: &str = include_str!("../../.config/config.json5");

fn default_spam_filter() -> bool {
    true
}

fn default_backlog_limit() -> usize {
    100
}

fn default_backlog_timeout_secs() -> u64 {
    10
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Config {
    /// Relays used until the user saves a list of their own
    #[serde(default)]
    pub relays: Vec<String>,
    #[serde(default = "default_spam_filter")]
    pub spam_filter: bool,
    #[serde(default = "default_backlog_limit")]
    pub backlog_limit: usize,
    #[serde(default = "default_backlog_timeout_secs")]
    pub backlog_timeout_secs: u64,
}

impl Config {
    /// Embedded defaults, overlaid by any `config.*` file found in `config_dir`
    pub fn load(config_dir: &Path) -> Result<Self, ConfigError> {
        let default_config: Config = json5::from_str(CONFIG)
            .map_err(|e| ConfigError::Message(format!("Failed to load default config: {e}")))?;
        let mut builder =
            config::Config::builder().add_source(File::from_str(CONFIG, FileFormat::Json5));

        let config_files = [
            ("config.json5", FileFormat::Json5),
            ("config.json", FileFormat::Json),
            ("config.yaml", FileFormat::Yaml),
            ("config.toml", FileFormat::Toml),
            ("config.ini", FileFormat::Ini),
        ];
        for (file, format) in &config_files {
            let path = config_dir.join(file);
            if path.exists() {
                log::info!("Loading configuration from {}", path.display());
            }
            builder = builder.add_source(File::from(path).format(*format).required(false));
        }

        let mut cfg: Self = builder.build()?.try_deserialize()?;
        if cfg.relays.is_empty() {
            cfg.relays.clone_from(&default_config.relays);
        }
        if cfg.backlog_limit == 0 {
            return Err(ConfigError::Message(String::from(
                "backlog_limit must be at least 1",
            )));
        }

        Ok(cfg)
    }

    pub fn nostr_options(&self) -> NostrOptions {
        NostrOptions {
            default_relays: self.relays.clone(),
            spam_filter: self.spam_filter,
            backlog_limit: self.backlog_limit,
            backlog_timeout: Duration::from_secs(self.backlog_timeout_secs),
        }
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

    #[rstest]
    fn test_defaults_without_user_file(dir: TempDir) {
        let config = Config::load(dir.path()).expect("config");
        assert_eq!(config.relays.len(), 6);
        assert_eq!(config.relays[0], "wss://relay.damus.io");
        assert!(config.spam_filter);
        assert_eq!(config.backlog_limit, 100);
        assert_eq!(config.backlog_timeout_secs, 10);
    }

    #[rstest]
    fn test_user_file_overrides(dir: TempDir) {
        fs::write(
            dir.path().join("config.toml"),
            "relays = [\"wss://nos.lol\"]\nspam_filter = false\nbacklog_limit = 20\n",
        )
        .expect("write config");

        let config = Config::load(dir.path()).expect("config");
        assert_eq!(config.relays, vec![String::from("wss://nos.lol")]);
        assert!(!config.spam_filter);
        assert_eq!(config.backlog_limit, 20);
        assert_eq!(config.backlog_timeout_secs, 10);
    }

    #[rstest]
    fn test_zero_backlog_is_rejected(dir: TempDir) {
        fs::write(dir.path().join("config.json"), r#"{ "backlog_limit": 0 }"#)
            .expect("write config");
        assert!(Config::load(dir.path()).is_err());
    }

    #[rstest]
    fn test_nostr_options(dir: TempDir) {
        let options = Config::load(dir.path()).expect("config").nostr_options();
        assert_eq!(options.backlog_timeout, Duration::from_secs(10));
        assert_eq!(options.default_relays.len(), 6);
    }
}

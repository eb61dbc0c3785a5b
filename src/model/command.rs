use secrecy::SecretString;
use strum::{Display, EnumIter, IntoEnumIterator};

use crate::domain::{ProfileField, SenderKey};
use crate::error::Error;
use crate::model::settings::normalize_relay_url;

/// Who a `/mute` refers to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuteTarget {
    Key(SenderKey),
    /// Display name of an author currently in the stream
    Author(String),
}

/// Slash commands typed into the input line
#[derive(Debug)]
pub enum Command {
    Mute(MuteTarget),
    Unmute(SenderKey),
    ListMuted,
    ListRelays,
    AddRelay(String),
    RemoveRelay(String),
    ShowPublicKey,
    ExportSecretKey,
    HideSecretKey,
    ImportSecretKey(SecretString),
    SetProfile { field: ProfileField, value: String },
    SaveProfile,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumIter)]
enum Usage {
    #[strum(to_string = "/mute <npub|hex|@author>")]
    Mute,
    #[strum(to_string = "/unmute <npub|hex>")]
    Unmute,
    #[strum(to_string = "/muted")]
    Muted,
    #[strum(to_string = "/relays")]
    Relays,
    #[strum(to_string = "/relay add|remove <url>")]
    Relay,
    #[strum(to_string = "/pubkey")]
    PublicKey,
    #[strum(to_string = "/export")]
    Export,
    #[strum(to_string = "/hide")]
    Hide,
    #[strum(to_string = "/import <nsec|hex>")]
    Import,
    #[strum(to_string = "/profile <field> <value>")]
    Profile,
    #[strum(to_string = "/save")]
    Save,
    #[strum(to_string = "/help")]
    Help,
    #[strum(to_string = "/quit")]
    Quit,
}

/// One-line summary of every command
pub fn help() -> String {
    Usage::iter()
        .map(|usage| usage.to_string())
        .collect::<Vec<_>>()
        .join("  ")
}

impl Command {
    /// Parses an input line. Lines not starting with `/` are chat text and yield `Ok(None)`.
    pub fn parse(input: &str) -> Result<Option<Self>, Error> {
        let input = input.trim();
        let Some(body) = input.strip_prefix('/') else {
            return Ok(None);
        };

        let (name, rest) = match body.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (body, ""),
        };

        let command = match name {
            "mute" => Self::Mute(Self::mute_target(rest)?),
            "unmute" => Self::Unmute(SenderKey::new(Self::required(rest, Usage::Unmute)?)),
            "muted" => Self::ListMuted,
            "relays" => Self::ListRelays,
            "relay" => Self::relay(rest)?,
            "pubkey" => Self::ShowPublicKey,
            "export" => Self::ExportSecretKey,
            "hide" => Self::HideSecretKey,
            "import" => Self::ImportSecretKey(SecretString::from(
                Self::required(rest, Usage::Import)?.to_string(),
            )),
            "profile" => Self::profile(rest)?,
            "save" => Self::SaveProfile,
            "help" => Self::Help,
            "quit" | "q" => Self::Quit,
            _ => return Err(Error::InvalidCommand(format!("unknown command /{name}"))),
        };

        Ok(Some(command))
    }

    fn required(rest: &str, usage: Usage) -> Result<&str, Error> {
        if rest.is_empty() {
            Err(Error::InvalidCommand(format!("usage: {usage}")))
        } else {
            Ok(rest)
        }
    }

    fn mute_target(rest: &str) -> Result<MuteTarget, Error> {
        let target = Self::required(rest, Usage::Mute)?;
        match target.strip_prefix('@') {
            Some("") => Err(Error::InvalidCommand(format!("usage: {}", Usage::Mute))),
            Some(author) => Ok(MuteTarget::Author(author.to_string())),
            None => Ok(MuteTarget::Key(SenderKey::new(target))),
        }
    }

    fn relay(rest: &str) -> Result<Self, Error> {
        let usage = || Error::InvalidCommand(format!("usage: {}", Usage::Relay));
        let (action, url) = rest.split_once(char::is_whitespace).ok_or_else(usage)?;
        let url = normalize_relay_url(url)?;
        match action {
            "add" => Ok(Self::AddRelay(url)),
            "remove" | "rm" => Ok(Self::RemoveRelay(url)),
            _ => Err(usage()),
        }
    }

    fn profile(rest: &str) -> Result<Self, Error> {
        let (field, value) = match rest.split_once(char::is_whitespace) {
            Some((field, value)) => (field, value.trim()),
            None => (rest, ""),
        };
        let field = field.parse::<ProfileField>().map_err(|_| {
            Error::InvalidCommand(format!(
                "unknown profile field '{field}', usage: {}",
                Usage::Profile
            ))
        })?;

        Ok(Self::SetProfile {
            field,
            value: value.to_string(),
        })
    }
}

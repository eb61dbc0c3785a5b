use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Label shown for messages authored by the local user
pub const LOCAL_DISPLAY_NAME: &str = "You";

/// Identity of a message author
///
/// Network identities are hex public keys. The reserved value `"self"` stands for the
/// local user and never refers to a network identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SenderKey(String);

impl SenderKey {
    pub const LOCAL: &'static str = "self";

    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The sentinel identity of the local user
    pub fn local() -> Self {
        Self(String::from(Self::LOCAL))
    }

    pub fn is_local(&self) -> bool {
        self.0 == Self::LOCAL
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SenderKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for SenderKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// One chat line or network post. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender: SenderKey,
    pub display_name: String,
    pub content: String,
    /// Seconds since epoch, as reported by the event source
    pub timestamp: u64,
    pub is_post: bool,
}

impl Message {
    /// Build a message authored by the local user
    pub fn local(id: impl Into<String>, content: impl Into<String>, timestamp: u64) -> Self {
        Self {
            id: id.into(),
            sender: SenderKey::local(),
            display_name: String::from(LOCAL_DISPLAY_NAME),
            content: content.into(),
            timestamp,
            is_post: false,
        }
    }

    pub fn is_local(&self) -> bool {
        self.sender.is_local()
    }
}

/// Message payload as it crosses the backend boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    pub id: String,
    pub pubkey: String,
    pub author: String,
    pub content: String,
    pub timestamp: i64,
    pub is_post: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidMessage {
    #[error("message id is empty")]
    EmptyId,
    #[error("sender of message {id} is empty")]
    EmptySender { id: String },
    #[error("message {id} has a negative timestamp ({timestamp})")]
    NegativeTimestamp { id: String, timestamp: i64 },
}

impl TryFrom<RawMessage> for Message {
    type Error = InvalidMessage;

    fn try_from(raw: RawMessage) -> Result<Self, Self::Error> {
        if raw.id.trim().is_empty() {
            return Err(InvalidMessage::EmptyId);
        }
        if raw.pubkey.trim().is_empty() {
            return Err(InvalidMessage::EmptySender { id: raw.id });
        }
        let timestamp =
            u64::try_from(raw.timestamp).map_err(|_| InvalidMessage::NegativeTimestamp {
                id: raw.id.clone(),
                timestamp: raw.timestamp,
            })?;

        Ok(Self {
            id: raw.id,
            sender: SenderKey::from(raw.pubkey),
            display_name: raw.author,
            content: raw.content,
            timestamp,
            is_post: raw.is_post,
        })
    }
}

impl From<&Message> for RawMessage {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            pubkey: message.sender.to_string(),
            author: message.display_name.clone(),
            content: message.content.clone(),
            timestamp: i64::try_from(message.timestamp).unwrap_or(i64::MAX),
            is_post: message.is_post,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::*;

    use super::*;

    #[fixture]
    fn raw() -> RawMessage {
        RawMessage {
            id: String::from("fcd6707cf1943d6f"),
            pubkey: String::from("4d39c23b3b03bf99"),
            author: String::from("Alice"),
            content: String::from("hello"),
            timestamp: 1704091367,
            is_post: true,
        }
    }

    #[test]
    fn test_sender_key_local_sentinel() {
        assert_eq!(SenderKey::local().as_str(), "self");
        assert!(SenderKey::local().is_local());
        assert!(!SenderKey::from("4d39c23b").is_local());
    }

    #[test]
    fn test_message_local() {
        let message = Message::local("abc", "hi there", 42);
        assert!(message.is_local());
        assert_eq!(message.display_name, LOCAL_DISPLAY_NAME);
        assert_eq!(message.timestamp, 42);
        assert!(!message.is_post);
    }

    #[rstest]
    fn test_try_from_raw(raw: RawMessage) -> Result<(), InvalidMessage> {
        let message = Message::try_from(raw)?;
        assert_eq!(message.id, "fcd6707cf1943d6f");
        assert_eq!(message.sender, SenderKey::from("4d39c23b3b03bf99"));
        assert_eq!(message.display_name, "Alice");
        assert_eq!(message.timestamp, 1704091367);
        assert!(message.is_post);
        Ok(())
    }

    #[rstest]
    fn test_try_from_raw_rejects_empty_id(mut raw: RawMessage) {
        raw.id = String::from("  ");
        assert_eq!(Message::try_from(raw), Err(InvalidMessage::EmptyId));
    }

    #[rstest]
    fn test_try_from_raw_rejects_empty_sender(mut raw: RawMessage) {
        raw.pubkey = String::new();
        assert_eq!(
            Message::try_from(raw),
            Err(InvalidMessage::EmptySender {
                id: String::from("fcd6707cf1943d6f")
            })
        );
    }

    #[rstest]
    fn test_try_from_raw_rejects_negative_timestamp(mut raw: RawMessage) {
        raw.timestamp = -1;
        assert_eq!(
            Message::try_from(raw),
            Err(InvalidMessage::NegativeTimestamp {
                id: String::from("fcd6707cf1943d6f"),
                timestamp: -1
            })
        );
    }

    #[test]
    fn test_raw_message_wire_shape() -> Result<(), serde_json::Error> {
        let raw: RawMessage = serde_json::from_str(
            r#"{"id":"e1","pubkey":"self","author":"You","content":"gm","timestamp":10,"is_post":false}"#,
        )?;
        assert_eq!(raw.pubkey, "self");
        assert_eq!(raw.timestamp, 10);

        let json = serde_json::to_value(&raw)?;
        assert_eq!(json["is_post"], serde_json::Value::Bool(false));
        Ok(())
    }

    #[rstest]
    fn test_raw_from_message(raw: RawMessage) -> Result<(), InvalidMessage> {
        let message = Message::try_from(raw.clone())?;
        assert_eq!(RawMessage::from(&message), raw);
        Ok(())
    }
}

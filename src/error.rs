use thiserror::Error;

use crate::backend::BackendError;
use crate::model::connection::ConnectionStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced to the user by a chat session
#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    ConnectionFailure(#[source] BackendError),
    #[error("failed to send message: {0}")]
    SendFailure(#[source] BackendError),
    #[error("failed to mute user: {0}")]
    MuteFailure(#[source] BackendError),
    #[error("cannot send while {0}")]
    NotConnected(ConnectionStatus),
    #[error("nothing to send")]
    EmptyDraft,
    #[error("settings update failed: {0}")]
    Settings(#[source] BackendError),
    #[error("invalid relay url: {0}")]
    InvalidRelayUrl(String),
    #[error("invalid command: {0}")]
    InvalidCommand(String),
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(
            Error::NotConnected(ConnectionStatus::Connecting).to_string(),
            "cannot send while connecting"
        );
        assert_eq!(
            Error::InvalidRelayUrl(String::from("ftp://x")).to_string(),
            "invalid relay url: ftp://x"
        );
    }

    #[test]
    fn test_source_is_backend_error() {
        let error = Error::SendFailure(BackendError::Rejected(String::from("blocked")));
        assert_eq!(error.to_string(), "failed to send message: rejected: blocked");
        assert!(error.source().is_some());
    }
}

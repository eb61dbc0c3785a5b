use strum::Display;

use crate::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Display)]
#[strum(serialize_all = "lowercase")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    HandshakeSucceeded,
    HandshakeFailed { reason: String },
    StreamFailed { reason: String },
}

/// Connection lifecycle of one session: `connecting -> connected | error`
///
/// `error` is terminal; reconnecting means building a new session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connection {
    status: ConnectionStatus,
    failure: Option<String>,
}

impl Connection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Reason for entering the error state, if any
    pub fn failure(&self) -> Option<&str> {
        self.failure.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }

    /// Outbound sends are only accepted while connected
    pub fn check_send(&self) -> Result<(), Error> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(Error::NotConnected(self.status))
        }
    }

    pub fn update(&mut self, message: Message) {
        match (self.status, message) {
            (ConnectionStatus::Connecting, Message::HandshakeSucceeded) => {
                self.status = ConnectionStatus::Connected;
            }
            (ConnectionStatus::Error, Message::HandshakeSucceeded) => {
                log::warn!("Ignoring handshake completion after connection failure");
            }
            (ConnectionStatus::Connected, Message::HandshakeSucceeded) => {}
            (ConnectionStatus::Error, Message::HandshakeFailed { reason })
            | (ConnectionStatus::Error, Message::StreamFailed { reason }) => {
                log::debug!("Connection already failed, dropping: {reason}");
            }
            (_, Message::HandshakeFailed { reason }) | (_, Message::StreamFailed { reason }) => {
                log::error!("Connection failed: {reason}");
                self.status = ConnectionStatus::Error;
                self.failure = Some(reason);
            }
        }
    }
}

//! Session state
//!
//! Each model owns its data and changes only through `update` (or a few explicit
//! operations for the stream). None of them perform I/O.

pub mod command;
pub mod composer;
pub mod connection;
pub mod mute;
pub mod settings;
pub mod status_bar;
pub mod stream;

pub use command::{Command, MuteTarget};
pub use composer::{Composer, PendingSend};
pub use connection::{Connection, ConnectionStatus};
pub use mute::{MuteList, MuteOutcome};
pub use settings::Settings;
pub use status_bar::StatusBar;
pub use stream::MessageStream;

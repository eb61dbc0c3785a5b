//! Domain types shared by the model and the backend

pub mod message;
pub mod profile;
pub mod spam;
pub mod text;

pub use message::{InvalidMessage, Message, RawMessage, SenderKey};
pub use profile::{Profile, ProfileField};

//! Reusable widgets for the chat view

pub mod message_line;
pub mod status_bar;

//! Presentation layer
//!
//! This module contains the chat view and its widgets.

pub mod view;
pub mod widgets;

pub use view::ChatView;

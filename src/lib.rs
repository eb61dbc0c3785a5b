//! # Gilga - a chat overlay for Nostr
//!
//! A terminal chat view over Nostr channel messages and text notes, built with Rust and
//! Ratatui.
//!
//! ## Architecture Overview
//!
//! - **Domain** (`domain`): messages, profiles and text helpers
//! - **Model** (`model`): the message stream, connection state, mutes, composer and settings,
//!   each updated through a `Message` enum
//! - **Session** (`session`): one mounted chat view owning the models and its event
//!   subscription, with the two-phase send and mute protocols
//! - **Backend** (`backend`): the `Backend` trait with a Nostr relay implementation and an
//!   in-memory one for offline use and tests
//! - **View** (`presentation`): rendering of the current state
//!
//! ## Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use gilga::{backend::memory::MemoryBackend, session::{ChatSession, Handshake}};
//!
//! let mut session = ChatSession::mount(Arc::new(MemoryBackend::new()));
//! session.finish_connect(Ok(Handshake::default())).unwrap();
//!
//! assert!(session.connection().is_connected());
//! assert!(session.visible().is_empty());
//! ```
//!
//! ## Modules
//!
//! - [`session`] - Chat session lifecycle
//! - [`model`] - State and update functions
//! - [`backend`] - Event source and identity services
//! - [`app`] - Terminal event loop
//! - [`infrastructure`] - CLI, configuration and terminal access

pub mod app;
pub mod backend;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod model;
pub mod presentation;
pub mod session;
pub mod utils;

pub use app::App;
pub use backend::{Backend, BackendError, BackendEvent, Subscription};
pub use error::{Error, Result};
pub use session::ChatSession;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

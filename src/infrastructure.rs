//! Infrastructure layer
//!
//! This module handles external integrations:
//! - CLI argument processing
//! - Configuration files
//! - The terminal

pub mod cli;
pub mod config;
pub mod tui;

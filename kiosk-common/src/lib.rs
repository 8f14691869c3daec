//! # Kiosk Common Library
//!
//! Shared code for the kiosk display services:
//! - Display event types (the `play` wire contract seen by display clients)
//! - Common error type
//! - Configuration file discovery and TOML loading

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{DisplayEvent, MediaKind, PlayPayload};

//! # Kiosk Player Library (kiosk-player)
//!
//! Playback scheduler for an unattended display.
//!
//! **Purpose:** Accept image and video items from producers, show exactly one
//! at a time in FIFO order, work out how long each stays on screen (probing
//! videos with ffprobe when needed), and push a `play` event to every
//! connected display client.
//!
//! **Architecture:** one scheduler driver task per process (tokio), axum HTTP
//! ingestion (links and file uploads), SSE for display clients.

pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod sse;
pub mod uploads;

pub use error::{Error, Result};
pub use playback::Scheduler;

//! Error types for kiosk-player
//!
//! Crate error type and Result alias.

use thiserror::Error;

/// Main error type for kiosk-player
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading or validation errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors bubbled up from the shared library
    #[error(transparent)]
    Common(#[from] kiosk_common::Error),

    /// Scheduler no longer accepts items
    #[error("Scheduler is shutting down")]
    ShuttingDown,
}

/// Convenience Result type using kiosk-player Error
pub type Result<T> = std::result::Result<T, Error>;

//! Common error types for the kiosk services

use thiserror::Error;

/// Common result type for kiosk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across kiosk services
#[derive(Error, Debug)]
pub enum Error {
    /// TOML document could not be parsed into the expected shape
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

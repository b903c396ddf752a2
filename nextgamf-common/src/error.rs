//! Error types shared by nextgamf crates

use thiserror::Error;

/// Error types for the nextgamf library.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed identifier or value (PLMN, SUPI, hex key, ...).
    #[error("Invalid value: {0}")]
    InvalidValue(String),

    /// Network I/O errors.
    #[error("Network error: {0}")]
    Network(#[from] std::io::Error),

    /// YAML parsing errors.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),
}

/// Result alias for common operations.
pub type Result<T> = std::result::Result<T, Error>;

use thiserror::Error;

/// NAS decoding errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NasError {
    #[error("Buffer too short: expected at least {expected} bytes, got {actual}")]
    BufferTooShort { expected: usize, actual: usize },

    #[error("Invalid extended protocol discriminator: 0x{0:02X}")]
    InvalidEpd(u8),

    #[error("Invalid security header type: 0x{0:02X}")]
    InvalidSecurityHeaderType(u8),

    #[error("Security protected NAS messages are not accepted")]
    ProtectedMessage,

    #[error("Unknown message type: 0x{0:02X}")]
    UnknownMessageType(u8),

    #[error("Invalid {ie}: {reason}")]
    InvalidIe { ie: &'static str, reason: String },

    #[error("Missing mandatory {0}")]
    MissingIe(&'static str),

    #[error("Value too long for {0}")]
    ValueTooLong(&'static str),
}

impl NasError {
    pub(crate) fn invalid(ie: &'static str, reason: impl Into<String>) -> Self {
        NasError::InvalidIe {
            ie,
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, NasError>;

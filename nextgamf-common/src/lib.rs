//! Common types and utilities for nextgamf
//!
//! Shared 5G identifiers, the AMF configuration model, the common error type
//! and logging setup used by every crate in the workspace.

pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use config::{
    decode_hex_key, AmfConfig, NfConfig, NgapConfig, PlmnSupport, RetryConfig, SecurityConfig,
    SubscriberProfile, TimerConfig, DEFAULT_NGAP_PORT,
};
pub use error::{Error, Result};
pub use logging::{
    init_logging, init_logging_with_filter, log_nas_message, log_ngap_message, log_pdu, Direction,
    HexDump, LogLevel, Protocol,
};
pub use types::*;

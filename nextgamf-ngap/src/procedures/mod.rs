//! NGAP Procedures
//!
//! Typed views over [`SignalingMessage`]: each procedure has `*Params`
//! structs with a `build_*` function producing the generic message and a
//! `parse_*` function validating one.

use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};
use crate::ies::IeId;
use crate::message::{MessageType, SignalingMessage};

/// Errors raised by the typed procedure layer
#[derive(Debug, Error)]
pub enum NgapError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Invalid message type: expected {expected}, got {actual}")]
    InvalidMessageType {
        expected: MessageType,
        actual: MessageType,
    },

    #[error("Missing mandatory IE: {0}")]
    MissingMandatoryIe(IeId),

    #[error("Invalid IE value: {0}")]
    InvalidIeValue(String),
}

pub type Result<T> = std::result::Result<T, NgapError>;

pub(crate) fn expect_type(message: &SignalingMessage, expected: MessageType) -> Result<()> {
    if message.message_type != expected {
        return Err(NgapError::InvalidMessageType {
            expected,
            actual: message.message_type,
        });
    }
    Ok(())
}

/// Pulls a mandatory IE out of a message as its typed payload.
macro_rules! required_ie {
    ($msg:expr, $id:expr, $variant:ident) => {
        match $msg.get($id) {
            Some($crate::ies::IeValue::$variant(v)) => v.clone(),
            Some(other) => {
                return Err($crate::procedures::NgapError::InvalidIeValue(format!(
                    "{} holds {:?}",
                    $id, other
                )))
            }
            None => return Err($crate::procedures::NgapError::MissingMandatoryIe($id)),
        }
    };
}

macro_rules! optional_ie {
    ($msg:expr, $id:expr, $variant:ident) => {
        match $msg.get($id) {
            Some($crate::ies::IeValue::$variant(v)) => Some(v.clone()),
            Some(other) => {
                return Err($crate::procedures::NgapError::InvalidIeValue(format!(
                    "{} holds {:?}",
                    $id, other
                )))
            }
            None => None,
        }
    };
}

pub mod error_indication;
pub mod initial_context_setup;
pub mod initial_ue_message;
pub mod nas_transport;
pub mod ng_setup;
pub mod pdu_session_resource;
pub mod ue_context_release;

pub use error_indication::*;
pub use initial_context_setup::*;
pub use initial_ue_message::*;
pub use nas_transport::*;
pub use ng_setup::*;
pub use pdu_session_resource::*;
pub use ue_context_release::*;

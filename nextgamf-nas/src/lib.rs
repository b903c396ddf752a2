//! NAS (Non-Access Stratum) protocol library
//!
//! Plain 5GMM and 5GSM message encoding/decoding for the subset of TS 24.501
//! an AMF needs for registration, authentication, security mode control,
//! deregistration and PDU session establishment.
//!
//! # Example
//!
//! ```rust
//! use nextgamf_nas::{decode_nas, encode_nas, NasMessage, RegistrationReject, MmCause};
//!
//! let msg = NasMessage::RegistrationReject(RegistrationReject {
//!     cause: MmCause::UeSecurityCapabilitiesMismatch,
//! });
//! let bytes = encode_nas(&msg).unwrap();
//! assert_eq!(decode_nas(&bytes).unwrap(), msg);
//! ```

pub mod codec;
pub mod enums;
pub mod error;
pub mod header;
pub mod ies;
pub mod messages;

pub use codec::{decode_nas, encode_nas, NasMessage, SmHeaderFields, SmMessage};
pub use enums::{
    ExtendedProtocolDiscriminator, MmCause, MmMessageType, PayloadContainerType, PduSessionType,
    RegistrationType, SecurityHeaderType, SmCause, SmMessageType, SscMode,
};
pub use error::{NasError, Result};
pub use header::{NasHeader, PlainMmHeader, PlainSmHeader};
pub use ies::{MobileIdentity, SessionAmbr, Suci, UeSecurityCapability};
pub use messages::*;

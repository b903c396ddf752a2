//! NGAP (NG Application Protocol) library
//!
//! Aligned PER encoding of the NGAP messages exchanged between gNB and AMF,
//! built on the `asn1-codecs` PER primitives.
//!
//! # Modules
//!
//! - `aper` - PER building blocks shared by the IE and PDU codecs
//! - `ies` - Information elements and their value encodings
//! - `message` - Procedure codes, message types and the generic message
//! - `codec` - NGAP-PDU encoding/decoding with ordered validation
//! - `procedures` - Typed builders and parsers per procedure

mod aper;
pub mod codec;
pub mod ies;
pub mod message;
pub mod procedures;

pub use codec::{decode, encode, DecodeError, EncodeError};
pub use ies::{Cause, IeId, IeValue};
pub use message::{Criticality, MessageType, PduType, ProcedureCode, SignalingMessage};
pub use procedures::{NgapError, Result};

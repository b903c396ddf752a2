//! NGAP wire codec (aligned PER)
//!
//! ```text
//! NGAP-PDU ::= CHOICE { initiatingMessage, successfulOutcome, unsuccessfulOutcome, ... }
//! message  ::= SEQUENCE { procedureCode INTEGER (0..255), criticality, value OPEN TYPE }
//! value    ::= SEQUENCE { protocolIEs SEQUENCE (SIZE(0..65535)) OF field, ... }
//! field    ::= SEQUENCE { id INTEGER (0..65535), criticality, value OPEN TYPE }
//! ```
//!
//! Decoding checks the transfer syntax first, then the procedure, then IE
//! uniqueness, then each IE value, and finally mandatory IE presence. The
//! first violation is reported and no partial message is returned. IE values
//! stay open-type octets until step 4, so unknown IEs survive untouched.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, BTreeSet};

use asn1_codecs::PerCodecData;
use bytes::Bytes;
use thiserror::Error;

use crate::aper::{self, PerResult};
use crate::ies::{IeId, IeValue};
use crate::message::{
    Criticality, InformationElement, MessageType, PduType, ProcedureCode, SignalingMessage,
};

/// maxProtocolIEs
const MAX_PROTOCOL_IES: i128 = 65535;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Transfer syntax error in {at}: {reason}")]
    Syntax { at: &'static str, reason: String },

    #[error("Unknown procedure code: {0}")]
    UnknownProcedure(u8),

    #[error("Procedure {procedure:?} has no {pdu_type:?}")]
    UndefinedMessage {
        procedure: ProcedureCode,
        pdu_type: PduType,
    },

    #[error("Duplicate IE {0}")]
    DuplicateIe(IeId),

    #[error("Invalid IE {ie}: {reason}")]
    InvalidIe { ie: IeId, reason: String },

    #[error("{message} is missing mandatory IE {ie}")]
    MissingMandatoryIe { message: MessageType, ie: IeId },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("{message} is missing mandatory IE {ie}")]
    MissingMandatoryIe { message: MessageType, ie: IeId },

    #[error("Invalid IE {ie}: {reason}")]
    InvalidIe { ie: IeId, reason: String },

    #[error("PER encoding failed: {0}")]
    Syntax(String),
}

fn syntax(at: &'static str) -> impl Fn(String) -> DecodeError {
    move |reason| DecodeError::Syntax { at, reason }
}

/// Reads the PDU type without decoding the rest, used to decide whether a
/// malformed message deserves an ErrorIndication.
pub fn peek_pdu_type(bytes: &[u8]) -> Option<PduType> {
    // extension bit, then the root alternative in two bits
    let first = *bytes.first()?;
    if first & 0x80 != 0 {
        return None;
    }
    PduType::try_from((first >> 5) & 0x03).ok()
}

/// Reads the procedure code without decoding the rest.
pub fn peek_procedure(bytes: &[u8]) -> Option<ProcedureCode> {
    bytes.get(1).and_then(|b| ProcedureCode::try_from(*b).ok())
}

fn get_criticality(data: &mut PerCodecData) -> PerResult<Criticality> {
    let raw = aper::get_enumerated(data, 3, false)?;
    Criticality::try_from(raw as u8).map_err(|_| format!("criticality {raw}"))
}

pub fn decode(bytes: &[u8]) -> Result<SignalingMessage, DecodeError> {
    // 1. transfer syntax
    let data = &mut PerCodecData::from_slice_aper(bytes);
    let raw_pdu_type = aper::get_choice(data, 3, true).map_err(syntax("NGAP-PDU"))?;
    let pdu_type = PduType::try_from(raw_pdu_type as u8)
        .map_err(|_| DecodeError::Syntax {
            at: "NGAP-PDU",
            reason: format!("alternative {raw_pdu_type}"),
        })?;
    let raw_procedure = aper::get_integer(data, 0, 255).map_err(syntax("procedureCode"))? as u8;
    let criticality = get_criticality(data).map_err(syntax("criticality"))?;
    let body = aper::get_open(data).map_err(syntax("message value"))?;

    let body = &mut PerCodecData::from_slice_aper(&body);
    aper::get_body_header(body).map_err(syntax("message value"))?;
    let ie_count = aper::get_count(body, 0, MAX_PROTOCOL_IES).map_err(syntax("protocolIEs"))?;
    let mut raw_ies = Vec::with_capacity(ie_count);
    for _ in 0..ie_count {
        let id = aper::get_integer(body, 0, 65535).map_err(syntax("IE id"))?;
        let crit = get_criticality(body).map_err(syntax("IE criticality"))?;
        let value = aper::get_open(body).map_err(syntax("IE value"))?;
        raw_ies.push((IeId(id as u16), crit, value));
    }

    // 2. procedure
    let procedure = ProcedureCode::try_from(raw_procedure)
        .map_err(|_| DecodeError::UnknownProcedure(raw_procedure))?;
    let message_type = MessageType::of(procedure, pdu_type)
        .ok_or(DecodeError::UndefinedMessage { procedure, pdu_type })?;

    // 3. duplicates
    let mut seen = BTreeSet::new();
    for (id, _, _) in &raw_ies {
        if !seen.insert(*id) {
            return Err(DecodeError::DuplicateIe(*id));
        }
    }

    // 4. values
    let mut ies = BTreeMap::new();
    for (id, criticality, data) in raw_ies {
        let value =
            IeValue::decode(id, &data).map_err(|reason| DecodeError::InvalidIe { ie: id, reason })?;
        ies.insert(id, InformationElement { criticality, value });
    }

    // 5. mandatory presence
    let message = SignalingMessage {
        message_type,
        criticality,
        ies,
    };
    if let Some(ie) = message.missing_mandatory() {
        return Err(DecodeError::MissingMandatoryIe {
            message: message_type,
            ie,
        });
    }
    Ok(message)
}

pub fn encode(message: &SignalingMessage) -> Result<Bytes, EncodeError> {
    if let Some(ie) = message.missing_mandatory() {
        return Err(EncodeError::MissingMandatoryIe {
            message: message.message_type,
            ie,
        });
    }

    let mut fields = Vec::with_capacity(message.ies.len());
    for (id, ie) in &message.ies {
        if ie.value.id() != *id {
            return Err(EncodeError::InvalidIe {
                ie: *id,
                reason: format!("keyed under {} but holds {}", id, ie.value.id()),
            });
        }
        let value = ie
            .value
            .encode_value()
            .map_err(|reason| EncodeError::InvalidIe { ie: *id, reason })?;
        fields.push((*id, ie.criticality, value));
    }

    let pdu = encode_pdu(
        message.message_type.pdu_type(),
        message.message_type.procedure().into(),
        message.criticality,
        &fields,
    )
    .map_err(EncodeError::Syntax)?;
    Ok(Bytes::from(pdu))
}

/// Frames already encoded IE values, in the order given.
fn encode_pdu(
    pdu_type: PduType,
    procedure: u8,
    criticality: Criticality,
    fields: &[(IeId, Criticality, Vec<u8>)],
) -> PerResult<Vec<u8>> {
    let mut body = PerCodecData::new_aper();
    aper::put_body_header(&mut body)?;
    aper::put_count(&mut body, 0, MAX_PROTOCOL_IES, fields.len())?;
    for (id, crit, value) in fields {
        aper::put_integer(&mut body, 0, 65535, i128::from(id.0))?;
        aper::put_enumerated(&mut body, 3, false, i128::from(u8::from(*crit)))?;
        aper::put_open(&mut body, value)?;
    }

    let mut data = PerCodecData::new_aper();
    aper::put_choice(&mut data, 3, true, i128::from(u8::from(pdu_type)))?;
    aper::put_integer(&mut data, 0, 255, i128::from(procedure))?;
    aper::put_enumerated(&mut data, 3, false, i128::from(u8::from(criticality)))?;
    aper::put_open(&mut data, &body.into_bytes())?;
    Ok(data.into_bytes())
}

/// Inserts an IE, reporting a duplicate instead of replacing it.
pub fn insert_unique(
    message: &mut SignalingMessage,
    value: IeValue,
    criticality: Criticality,
) -> Result<(), DecodeError> {
    match message.ies.entry(value.id()) {
        Entry::Occupied(e) => Err(DecodeError::DuplicateIe(*e.key())),
        Entry::Vacant(e) => {
            e.insert(InformationElement { criticality, value });
            Ok(())
        }
    }
}

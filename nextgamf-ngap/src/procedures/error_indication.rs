//! Error Indication Procedure
//!
//! Reports a detected error in an incoming message (TS 38.413 Section 8.7.4).
//! Sent by the AMF whenever an initiating message cannot be decoded or is
//! not valid for the current association state.

use super::{expect_type, Result};
use crate::codec::DecodeError;
use crate::ies::{Cause, IeId, IeValue, ProtocolCause, RadioNetworkCause};
use crate::message::{Criticality, MessageType, SignalingMessage};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ErrorIndicationParams {
    pub amf_ue_ngap_id: Option<u64>,
    pub ran_ue_ngap_id: Option<u32>,
    pub cause: Option<Cause>,
}

pub fn build_error_indication(params: &ErrorIndicationParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::ErrorIndication);
    if let Some(id) = params.amf_ue_ngap_id {
        msg.set_with_criticality(IeValue::AmfUeNgapId(id), Criticality::Ignore);
    }
    if let Some(id) = params.ran_ue_ngap_id {
        msg.set_with_criticality(IeValue::RanUeNgapId(id), Criticality::Ignore);
    }
    if let Some(cause) = params.cause {
        msg.set_with_criticality(IeValue::Cause(cause), Criticality::Ignore);
    }
    msg
}

pub fn parse_error_indication(msg: &SignalingMessage) -> Result<ErrorIndicationParams> {
    expect_type(msg, MessageType::ErrorIndication)?;
    Ok(ErrorIndicationParams {
        amf_ue_ngap_id: optional_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: optional_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        cause: optional_ie!(msg, IeId::CAUSE, Cause),
    })
}

/// Protocol cause matching a decode failure.
pub fn cause_for_decode_error(err: &DecodeError) -> Cause {
    let cause = match err {
        DecodeError::Syntax { .. } => ProtocolCause::TransferSyntaxError,
        DecodeError::UnknownProcedure(_) | DecodeError::UndefinedMessage { .. } => {
            ProtocolCause::AbstractSyntaxErrorReject
        }
        DecodeError::DuplicateIe(_)
        | DecodeError::InvalidIe { .. }
        | DecodeError::MissingMandatoryIe { .. } => {
            ProtocolCause::AbstractSyntaxErrorFalselyConstructedMessage
        }
    };
    Cause::Protocol(cause)
}

/// Error Indication for a message referring to an AMF UE NGAP ID that is not
/// (or no longer) known.
pub fn error_indication_unknown_ue(
    amf_ue_ngap_id: Option<u64>,
    ran_ue_ngap_id: Option<u32>,
) -> SignalingMessage {
    build_error_indication(&ErrorIndicationParams {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        cause: Some(Cause::RadioNetwork(RadioNetworkCause::UnknownLocalUeNgapId)),
    })
}

/// Error Indication for a message that arrived in the wrong state.
pub fn error_indication_wrong_state(
    amf_ue_ngap_id: Option<u64>,
    ran_ue_ngap_id: Option<u32>,
) -> SignalingMessage {
    build_error_indication(&ErrorIndicationParams {
        amf_ue_ngap_id,
        ran_ue_ngap_id,
        cause: Some(Cause::Protocol(
            ProtocolCause::MessageNotCompatibleWithReceiverState,
        )),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;

    #[test]
    fn test_empty_error_indication_is_valid() {
        let msg = build_error_indication(&ErrorIndicationParams::default());
        let bytes = codec::encode(&msg).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        assert_eq!(parse_error_indication(&decoded).unwrap(), ErrorIndicationParams::default());
    }

    #[test]
    fn test_decode_error_causes() {
        let err = codec::decode(&[0, 4]).unwrap_err();
        assert_eq!(
            cause_for_decode_error(&err),
            Cause::Protocol(ProtocolCause::TransferSyntaxError)
        );
        let err = DecodeError::MissingMandatoryIe {
            message: MessageType::InitialUeMessage,
            ie: IeId::NAS_PDU,
        };
        assert_eq!(
            cause_for_decode_error(&err),
            Cause::Protocol(ProtocolCause::AbstractSyntaxErrorFalselyConstructedMessage)
        );
    }

    #[test]
    fn test_unknown_ue() {
        let msg = error_indication_unknown_ue(Some(7), None);
        let parsed = parse_error_indication(&msg).unwrap();
        assert_eq!(parsed.amf_ue_ngap_id, Some(7));
        assert_eq!(
            parsed.cause,
            Some(Cause::RadioNetwork(RadioNetworkCause::UnknownLocalUeNgapId))
        );
    }
}

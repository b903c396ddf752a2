//! UE Context Release Procedures
//!
//! - UE Context Release Request: gNB asks the AMF to release a UE context
//! - UE Context Release Command / Complete: AMF orders the release and the
//!   gNB confirms it (TS 38.413 Section 8.3.2 and 8.3.3)

use super::{expect_type, Result};
use crate::ies::{Cause, IeId, IeValue, UeNgapIds};
use crate::message::{Criticality, MessageType, SignalingMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseRequestParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseCommandParams {
    pub ue_ngap_ids: UeNgapIds,
    pub cause: Cause,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UeContextReleaseCompleteParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
}

pub fn build_ue_context_release_request(params: &UeContextReleaseRequestParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::UeContextReleaseRequest)
        .with(IeValue::AmfUeNgapId(params.amf_ue_ngap_id))
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id));
    msg.set_with_criticality(IeValue::Cause(params.cause), Criticality::Ignore);
    msg
}

pub fn parse_ue_context_release_request(
    msg: &SignalingMessage,
) -> Result<UeContextReleaseRequestParams> {
    expect_type(msg, MessageType::UeContextReleaseRequest)?;
    Ok(UeContextReleaseRequestParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        cause: required_ie!(msg, IeId::CAUSE, Cause),
    })
}

pub fn build_ue_context_release_command(params: &UeContextReleaseCommandParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::UeContextReleaseCommand)
        .with(IeValue::UeNgapIds(params.ue_ngap_ids));
    msg.set_with_criticality(IeValue::Cause(params.cause), Criticality::Ignore);
    msg
}

pub fn parse_ue_context_release_command(
    msg: &SignalingMessage,
) -> Result<UeContextReleaseCommandParams> {
    expect_type(msg, MessageType::UeContextReleaseCommand)?;
    Ok(UeContextReleaseCommandParams {
        ue_ngap_ids: required_ie!(msg, IeId::UE_NGAP_IDS, UeNgapIds),
        cause: required_ie!(msg, IeId::CAUSE, Cause),
    })
}

pub fn build_ue_context_release_complete(
    params: &UeContextReleaseCompleteParams,
) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::UeContextReleaseComplete);
    msg.set_with_criticality(IeValue::AmfUeNgapId(params.amf_ue_ngap_id), Criticality::Ignore);
    msg.set_with_criticality(IeValue::RanUeNgapId(params.ran_ue_ngap_id), Criticality::Ignore);
    msg
}

pub fn parse_ue_context_release_complete(
    msg: &SignalingMessage,
) -> Result<UeContextReleaseCompleteParams> {
    expect_type(msg, MessageType::UeContextReleaseComplete)?;
    Ok(UeContextReleaseCompleteParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
    })
}

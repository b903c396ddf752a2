//! PDU Session Resource Setup Procedure
//!
//! Asks the gNB to set up radio and NG-U resources for one or more PDU
//! sessions, each optionally carrying a NAS PDU for the UE (TS 38.413
//! Section 8.2.1).

use super::{expect_type, Result};
use crate::ies::{
    IeId, IeValue, PduSessionResourceFailedToSetupItem, PduSessionResourceSetupItemSuReq,
    PduSessionResourceSetupItemSuRes,
};
use crate::message::{Criticality, MessageType, SignalingMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupRequestParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub sessions: Vec<PduSessionResourceSetupItemSuReq>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PduSessionResourceSetupResponseParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub setup: Vec<PduSessionResourceSetupItemSuRes>,
    pub failed: Vec<PduSessionResourceFailedToSetupItem>,
}

pub fn build_pdu_session_resource_setup_request(
    params: &PduSessionResourceSetupRequestParams,
) -> SignalingMessage {
    SignalingMessage::new(MessageType::PduSessionResourceSetupRequest)
        .with(IeValue::AmfUeNgapId(params.amf_ue_ngap_id))
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id))
        .with(IeValue::PduSessionResourceSetupListSuReq(params.sessions.clone()))
}

pub fn parse_pdu_session_resource_setup_request(
    msg: &SignalingMessage,
) -> Result<PduSessionResourceSetupRequestParams> {
    expect_type(msg, MessageType::PduSessionResourceSetupRequest)?;
    Ok(PduSessionResourceSetupRequestParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        sessions: required_ie!(
            msg,
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ,
            PduSessionResourceSetupListSuReq
        ),
    })
}

/// Empty lists are left out of the message.
pub fn build_pdu_session_resource_setup_response(
    params: &PduSessionResourceSetupResponseParams,
) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::PduSessionResourceSetupResponse);
    msg.set_with_criticality(IeValue::AmfUeNgapId(params.amf_ue_ngap_id), Criticality::Ignore);
    msg.set_with_criticality(IeValue::RanUeNgapId(params.ran_ue_ngap_id), Criticality::Ignore);
    if !params.setup.is_empty() {
        msg.set_with_criticality(
            IeValue::PduSessionResourceSetupListSuRes(params.setup.clone()),
            Criticality::Ignore,
        );
    }
    if !params.failed.is_empty() {
        msg.set_with_criticality(
            IeValue::PduSessionResourceFailedToSetupListSuRes(params.failed.clone()),
            Criticality::Ignore,
        );
    }
    msg
}

pub fn parse_pdu_session_resource_setup_response(
    msg: &SignalingMessage,
) -> Result<PduSessionResourceSetupResponseParams> {
    expect_type(msg, MessageType::PduSessionResourceSetupResponse)?;
    Ok(PduSessionResourceSetupResponseParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        setup: optional_ie!(
            msg,
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_RES,
            PduSessionResourceSetupListSuRes
        )
        .unwrap_or_default(),
        failed: optional_ie!(
            msg,
            IeId::PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_SU_RES,
            PduSessionResourceFailedToSetupListSuRes
        )
        .unwrap_or_default(),
    })
}

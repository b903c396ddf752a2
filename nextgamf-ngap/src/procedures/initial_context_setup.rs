//! Initial Context Setup Procedure
//!
//! Establishes the UE context at the gNB: security key, UE security
//! capabilities, allowed NSSAI and optionally a piggy-backed NAS PDU such as
//! Registration Accept (TS 38.413 Section 8.3.1).

use bytes::Bytes;
use nextgamf_common::{Guami, SNssai};

use super::{expect_type, Result};
use crate::ies::{Cause, IeId, IeValue, UeSecurityCapabilities};
use crate::message::{Criticality, MessageType, SignalingMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupRequestParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub guami: Guami,
    pub allowed_nssai: Vec<SNssai>,
    pub ue_security_capabilities: UeSecurityCapabilities,
    /// KgNB
    pub security_key: [u8; 32],
    pub nas_pdu: Option<Bytes>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupResponseParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialContextSetupFailureParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub cause: Cause,
}

pub fn build_initial_context_setup_request(
    params: &InitialContextSetupRequestParams,
) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::InitialContextSetupRequest)
        .with(IeValue::AmfUeNgapId(params.amf_ue_ngap_id))
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id))
        .with(IeValue::Guami(params.guami))
        .with(IeValue::AllowedNssai(params.allowed_nssai.clone()))
        .with(IeValue::UeSecurityCapabilities(params.ue_security_capabilities))
        .with(IeValue::SecurityKey(params.security_key));
    if let Some(nas) = &params.nas_pdu {
        msg.set_with_criticality(IeValue::NasPdu(nas.clone()), Criticality::Ignore);
    }
    msg
}

pub fn parse_initial_context_setup_request(
    msg: &SignalingMessage,
) -> Result<InitialContextSetupRequestParams> {
    expect_type(msg, MessageType::InitialContextSetupRequest)?;
    Ok(InitialContextSetupRequestParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        guami: required_ie!(msg, IeId::GUAMI, Guami),
        allowed_nssai: required_ie!(msg, IeId::ALLOWED_NSSAI, AllowedNssai),
        ue_security_capabilities: required_ie!(
            msg,
            IeId::UE_SECURITY_CAPABILITIES,
            UeSecurityCapabilities
        ),
        security_key: required_ie!(msg, IeId::SECURITY_KEY, SecurityKey),
        nas_pdu: optional_ie!(msg, IeId::NAS_PDU, NasPdu),
    })
}

pub fn build_initial_context_setup_response(
    params: &InitialContextSetupResponseParams,
) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::InitialContextSetupResponse);
    msg.set_with_criticality(IeValue::AmfUeNgapId(params.amf_ue_ngap_id), Criticality::Ignore);
    msg.set_with_criticality(IeValue::RanUeNgapId(params.ran_ue_ngap_id), Criticality::Ignore);
    msg
}

pub fn parse_initial_context_setup_response(
    msg: &SignalingMessage,
) -> Result<InitialContextSetupResponseParams> {
    expect_type(msg, MessageType::InitialContextSetupResponse)?;
    Ok(InitialContextSetupResponseParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
    })
}

pub fn build_initial_context_setup_failure(
    params: &InitialContextSetupFailureParams,
) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::InitialContextSetupFailure);
    msg.set_with_criticality(IeValue::AmfUeNgapId(params.amf_ue_ngap_id), Criticality::Ignore);
    msg.set_with_criticality(IeValue::RanUeNgapId(params.ran_ue_ngap_id), Criticality::Ignore);
    msg.set_with_criticality(IeValue::Cause(params.cause), Criticality::Ignore);
    msg
}

pub fn parse_initial_context_setup_failure(
    msg: &SignalingMessage,
) -> Result<InitialContextSetupFailureParams> {
    expect_type(msg, MessageType::InitialContextSetupFailure)?;
    Ok(InitialContextSetupFailureParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        cause: required_ie!(msg, IeId::CAUSE, Cause),
    })
}

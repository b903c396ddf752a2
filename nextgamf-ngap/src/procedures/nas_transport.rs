//! NAS Transport Procedures
//!
//! Downlink and Uplink NAS Transport carry NAS PDUs over an existing
//! UE-associated NG connection (TS 38.413 Section 8.6.2 and 8.6.3).

use bytes::Bytes;

use super::{expect_type, Result};
use crate::ies::{IeId, IeValue, UserLocationInformation};
use crate::message::{MessageType, SignalingMessage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownlinkNasTransportParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub nas_pdu: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UplinkNasTransportParams {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub nas_pdu: Bytes,
    pub user_location_info: UserLocationInformation,
}

pub fn build_downlink_nas_transport(params: &DownlinkNasTransportParams) -> SignalingMessage {
    SignalingMessage::new(MessageType::DownlinkNasTransport)
        .with(IeValue::AmfUeNgapId(params.amf_ue_ngap_id))
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id))
        .with(IeValue::NasPdu(params.nas_pdu.clone()))
}

pub fn parse_downlink_nas_transport(msg: &SignalingMessage) -> Result<DownlinkNasTransportParams> {
    expect_type(msg, MessageType::DownlinkNasTransport)?;
    Ok(DownlinkNasTransportParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        nas_pdu: required_ie!(msg, IeId::NAS_PDU, NasPdu),
    })
}

pub fn build_uplink_nas_transport(params: &UplinkNasTransportParams) -> SignalingMessage {
    SignalingMessage::new(MessageType::UplinkNasTransport)
        .with(IeValue::AmfUeNgapId(params.amf_ue_ngap_id))
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id))
        .with(IeValue::NasPdu(params.nas_pdu.clone()))
        .with(IeValue::UserLocationInformation(params.user_location_info))
}

pub fn parse_uplink_nas_transport(msg: &SignalingMessage) -> Result<UplinkNasTransportParams> {
    expect_type(msg, MessageType::UplinkNasTransport)?;
    Ok(UplinkNasTransportParams {
        amf_ue_ngap_id: required_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        nas_pdu: required_ie!(msg, IeId::NAS_PDU, NasPdu),
        user_location_info: required_ie!(msg, IeId::USER_LOCATION_INFORMATION, UserLocationInformation),
    })
}

//! NG Setup Procedure
//!
//! Exchanges the application-level data the gNB and the AMF need to
//! interoperate on NG-C (TS 38.413 Section 8.7.1). The gNB sends its identity
//! and supported tracking areas; the AMF answers with its name, served GUAMIs
//! and PLMN support, or with a failure cause.

use bytes::Bytes;
use nextgamf_common::{Guami, Plmn};

use super::{expect_type, Result};
use crate::codec;
use crate::ies::{
    Cause, GlobalRanNodeId, IeId, IeValue, PagingDrx, PlmnSupportItem, SupportedTaItem,
    TimeToWait,
};
use crate::message::{Criticality, MessageType, SignalingMessage};

/// NG Setup Request contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupRequestParams {
    pub global_ran_node_id: GlobalRanNodeId,
    pub ran_node_name: Option<String>,
    pub supported_ta_list: Vec<SupportedTaItem>,
    pub default_paging_drx: PagingDrx,
}

impl NgSetupRequestParams {
    /// Every PLMN broadcast in any supported tracking area.
    pub fn broadcast_plmns(&self) -> impl Iterator<Item = Plmn> + '_ {
        self.supported_ta_list
            .iter()
            .flat_map(|ta| ta.broadcast_plmn_list.iter().map(|b| b.plmn))
    }
}

/// NG Setup Response contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupResponseParams {
    pub amf_name: String,
    pub served_guami_list: Vec<Guami>,
    pub relative_amf_capacity: u8,
    pub plmn_support_list: Vec<PlmnSupportItem>,
}

/// NG Setup Failure contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NgSetupFailureParams {
    pub cause: Cause,
    pub time_to_wait: Option<TimeToWait>,
}

pub fn build_ng_setup_request(params: &NgSetupRequestParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::NgSetupRequest);
    msg.set(IeValue::GlobalRanNodeId(params.global_ran_node_id));
    if let Some(name) = &params.ran_node_name {
        msg.set_with_criticality(IeValue::RanNodeName(name.clone()), Criticality::Ignore);
    }
    msg.set(IeValue::SupportedTaList(params.supported_ta_list.clone()));
    msg.set_with_criticality(
        IeValue::DefaultPagingDrx(params.default_paging_drx),
        Criticality::Ignore,
    );
    msg
}

pub fn parse_ng_setup_request(msg: &SignalingMessage) -> Result<NgSetupRequestParams> {
    expect_type(msg, MessageType::NgSetupRequest)?;
    Ok(NgSetupRequestParams {
        global_ran_node_id: required_ie!(msg, IeId::GLOBAL_RAN_NODE_ID, GlobalRanNodeId),
        ran_node_name: optional_ie!(msg, IeId::RAN_NODE_NAME, RanNodeName),
        supported_ta_list: required_ie!(msg, IeId::SUPPORTED_TA_LIST, SupportedTaList),
        default_paging_drx: required_ie!(msg, IeId::DEFAULT_PAGING_DRX, DefaultPagingDrx),
    })
}

pub fn build_ng_setup_response(params: &NgSetupResponseParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::NgSetupResponse);
    msg.set(IeValue::AmfName(params.amf_name.clone()));
    msg.set(IeValue::ServedGuamiList(params.served_guami_list.clone()));
    msg.set_with_criticality(
        IeValue::RelativeAmfCapacity(params.relative_amf_capacity),
        Criticality::Ignore,
    );
    msg.set(IeValue::PlmnSupportList(params.plmn_support_list.clone()));
    msg
}

pub fn parse_ng_setup_response(msg: &SignalingMessage) -> Result<NgSetupResponseParams> {
    expect_type(msg, MessageType::NgSetupResponse)?;
    Ok(NgSetupResponseParams {
        amf_name: required_ie!(msg, IeId::AMF_NAME, AmfName),
        served_guami_list: required_ie!(msg, IeId::SERVED_GUAMI_LIST, ServedGuamiList),
        relative_amf_capacity: required_ie!(msg, IeId::RELATIVE_AMF_CAPACITY, RelativeAmfCapacity),
        plmn_support_list: required_ie!(msg, IeId::PLMN_SUPPORT_LIST, PlmnSupportList),
    })
}

pub fn build_ng_setup_failure(params: &NgSetupFailureParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::NgSetupFailure);
    msg.set_with_criticality(IeValue::Cause(params.cause), Criticality::Ignore);
    if let Some(ttw) = params.time_to_wait {
        msg.set_with_criticality(IeValue::TimeToWait(ttw), Criticality::Ignore);
    }
    msg
}

pub fn parse_ng_setup_failure(msg: &SignalingMessage) -> Result<NgSetupFailureParams> {
    expect_type(msg, MessageType::NgSetupFailure)?;
    Ok(NgSetupFailureParams {
        cause: required_ie!(msg, IeId::CAUSE, Cause),
        time_to_wait: optional_ie!(msg, IeId::TIME_TO_WAIT, TimeToWait),
    })
}

/// Builds and encodes an NG Setup Request.
pub fn encode_ng_setup_request(params: &NgSetupRequestParams) -> Result<Bytes> {
    Ok(codec::encode(&build_ng_setup_request(params))?)
}

/// Decodes bytes expected to hold an NG Setup Response.
pub fn decode_ng_setup_response(bytes: &[u8]) -> Result<NgSetupResponseParams> {
    parse_ng_setup_response(&codec::decode(bytes)?)
}

/// Decodes bytes expected to hold an NG Setup Failure.
pub fn decode_ng_setup_failure(bytes: &[u8]) -> Result<NgSetupFailureParams> {
    parse_ng_setup_failure(&codec::decode(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ies::{BroadcastPlmnItem, MiscCause};
    use crate::procedures::NgapError;
    use nextgamf_common::SNssai;

    fn request() -> NgSetupRequestParams {
        let plmn = Plmn::new(208, 93, false);
        NgSetupRequestParams {
            global_ran_node_id: GlobalRanNodeId {
                plmn,
                gnb_id: 0x000102,
                gnb_id_length: 24,
            },
            ran_node_name: Some("free5gc".to_string()),
            supported_ta_list: vec![SupportedTaItem {
                tac: 1,
                broadcast_plmn_list: vec![BroadcastPlmnItem {
                    plmn,
                    slice_support_list: vec![SNssai::with_sd(1, [1, 2, 3])],
                }],
            }],
            default_paging_drx: PagingDrx::V128,
        }
    }

    #[test]
    fn test_ng_setup_request_over_the_wire() {
        let bytes = encode_ng_setup_request(&request()).unwrap();
        let decoded = codec::decode(&bytes).unwrap();
        assert_eq!(decoded.message_type, MessageType::NgSetupRequest);
        let parsed = parse_ng_setup_request(&decoded).unwrap();
        assert_eq!(parsed, request());
        assert_eq!(
            parsed.broadcast_plmns().collect::<Vec<_>>(),
            vec![Plmn::new(208, 93, false)]
        );
    }

    #[test]
    fn test_ng_setup_response() {
        let params = NgSetupResponseParams {
            amf_name: "AMF".to_string(),
            served_guami_list: vec![Guami {
                plmn: Plmn::new(208, 93, false),
                amf_region_id: 0xCA,
                amf_set_id: 0x3F8,
                amf_pointer: 0,
            }],
            relative_amf_capacity: 255,
            plmn_support_list: vec![PlmnSupportItem {
                plmn: Plmn::new(208, 93, false),
                slice_support_list: vec![SNssai::with_sd(1, [1, 2, 3])],
            }],
        };
        let bytes = codec::encode(&build_ng_setup_response(&params)).unwrap();
        assert_eq!(decode_ng_setup_response(&bytes).unwrap(), params);
        assert!(matches!(
            decode_ng_setup_failure(&bytes),
            Err(NgapError::InvalidMessageType {
                expected: MessageType::NgSetupFailure,
                actual: MessageType::NgSetupResponse
            })
        ));
    }

    #[test]
    fn test_ng_setup_failure_unknown_plmn() {
        let params = NgSetupFailureParams {
            cause: Cause::Misc(MiscCause::UnknownPlmnOrSnpn),
            time_to_wait: Some(TimeToWait::V5s),
        };
        let bytes = codec::encode(&build_ng_setup_failure(&params)).unwrap();
        assert_eq!(decode_ng_setup_failure(&bytes).unwrap(), params);
    }
}

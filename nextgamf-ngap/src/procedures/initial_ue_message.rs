//! Initial UE Message Procedure
//!
//! Carries the first NAS message of a UE from the gNB to the AMF when no
//! UE-associated logical NG connection exists yet (TS 38.413 Section 8.6.1).

use bytes::Bytes;

use super::{expect_type, Result};
use crate::ies::{IeId, IeValue, RrcEstablishmentCause, UserLocationInformation};
use crate::message::{Criticality, MessageType, SignalingMessage};

/// Initial UE Message contents
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialUeMessageParams {
    /// RAN UE NGAP ID allocated by the gNB
    pub ran_ue_ngap_id: u32,
    pub nas_pdu: Bytes,
    /// Carries the serving TAI
    pub user_location_info: UserLocationInformation,
    pub rrc_establishment_cause: RrcEstablishmentCause,
    /// Core identifier the UE was previously given, if any
    pub amf_ue_ngap_id: Option<u64>,
}

pub fn build_initial_ue_message(params: &InitialUeMessageParams) -> SignalingMessage {
    let mut msg = SignalingMessage::new(MessageType::InitialUeMessage)
        .with(IeValue::RanUeNgapId(params.ran_ue_ngap_id))
        .with(IeValue::NasPdu(params.nas_pdu.clone()))
        .with(IeValue::UserLocationInformation(params.user_location_info));
    msg.set_with_criticality(
        IeValue::RrcEstablishmentCause(params.rrc_establishment_cause),
        Criticality::Ignore,
    );
    if let Some(id) = params.amf_ue_ngap_id {
        msg.set_with_criticality(IeValue::AmfUeNgapId(id), Criticality::Ignore);
    }
    msg
}

pub fn parse_initial_ue_message(msg: &SignalingMessage) -> Result<InitialUeMessageParams> {
    expect_type(msg, MessageType::InitialUeMessage)?;
    Ok(InitialUeMessageParams {
        ran_ue_ngap_id: required_ie!(msg, IeId::RAN_UE_NGAP_ID, RanUeNgapId),
        nas_pdu: required_ie!(msg, IeId::NAS_PDU, NasPdu),
        user_location_info: required_ie!(msg, IeId::USER_LOCATION_INFORMATION, UserLocationInformation),
        rrc_establishment_cause: required_ie!(msg, IeId::RRC_ESTABLISHMENT_CAUSE, RrcEstablishmentCause),
        amf_ue_ngap_id: optional_ie!(msg, IeId::AMF_UE_NGAP_ID, AmfUeNgapId),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::ies::NrCgi;
    use nextgamf_common::{Plmn, Tai};

    fn params(amf_ue_ngap_id: Option<u64>) -> InitialUeMessageParams {
        let plmn = Plmn::new(208, 93, false);
        InitialUeMessageParams {
            ran_ue_ngap_id: 1,
            nas_pdu: Bytes::from_static(&[0x7E, 0x00, 0x41, 0x79]),
            user_location_info: UserLocationInformation {
                nr_cgi: NrCgi {
                    plmn,
                    nr_cell_identity: 0x10,
                },
                tai: Tai::new(plmn, 1),
            },
            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
            amf_ue_ngap_id,
        }
    }

    #[test]
    fn test_initial_ue_message() {
        for p in [params(None), params(Some(42))] {
            let bytes = codec::encode(&build_initial_ue_message(&p)).unwrap();
            let msg = codec::decode(&bytes).unwrap();
            assert_eq!(parse_initial_ue_message(&msg).unwrap(), p);
        }
    }

    #[test]
    fn test_serving_tai_is_available() {
        let msg = build_initial_ue_message(&params(None));
        let parsed = parse_initial_ue_message(&msg).unwrap();
        assert_eq!(parsed.user_location_info.tai.tac, 1);
    }
}

//! Simulated radio node for integration testing
//!
//! Connects to the AMF over SCTP and plays both the gNB and the UEs behind
//! it: NG Setup, registration with 5G-AKA, PDU session setup and release.
//! Received NGAP is decoded and handed back to the test for assertions.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tracing::debug;

use nextgamf_common::{decode_hex_key, Guti, Plmn, SNssai};
use nextgamf_crypto::{ue_authenticate, CryptoError, Milenage};
use nextgamf_nas::{
    decode_nas, encode_nas, AuthenticationResponse, DeregistrationRequestUeOriginating,
    MobileIdentity, NasError, NasMessage, PayloadContainerType, PduSessionEstablishmentAccept,
    PduSessionEstablishmentRequest, RegistrationComplete, RegistrationRequest, RegistrationType,
    SecurityModeComplete, SmMessage, Suci, UlNasTransport, NGKSI_NOT_AVAILABLE,
};
use nextgamf_ngap::ies::{
    BroadcastPlmnItem, GlobalRanNodeId, NrCgi, PagingDrx, PduSessionResourceFailedToSetupItem,
    PduSessionResourceSetupItemSuRes, RrcEstablishmentCause, SupportedTaItem,
    UserLocationInformation,
};
use nextgamf_ngap::procedures::{
    build_initial_context_setup_response, build_initial_ue_message, build_ng_setup_request,
    build_pdu_session_resource_setup_response, build_ue_context_release_complete,
    build_uplink_nas_transport, parse_downlink_nas_transport,
    parse_initial_context_setup_request, parse_pdu_session_resource_setup_request,
    InitialContextSetupResponseParams, InitialUeMessageParams, NgSetupRequestParams,
    PduSessionResourceSetupResponseParams, UeContextReleaseCompleteParams,
    UplinkNasTransportParams,
};
use nextgamf_ngap::{DecodeError, EncodeError, MessageType, NgapError, SignalingMessage};
use nextgamf_sctp::{SctpAssociation, SctpConfig, SctpError};

use crate::test_fixtures::{TestGnbConfig, TestUeConfig};
use crate::test_utils::DEFAULT_TEST_TIMEOUT;

/// Stream for non-UE-associated signalling
const NON_UE_STREAM: u16 = 0;
/// Stream for UE-associated signalling
const UE_STREAM: u16 = 1;

/// Simulator errors
#[derive(Debug, Error)]
pub enum SimError {
    #[error("SCTP error: {0}")]
    Sctp(#[from] SctpError),
    #[error("NGAP decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("NGAP encode error: {0}")]
    Encode(#[from] EncodeError),
    #[error("NGAP error: {0}")]
    Ngap(#[from] NgapError),
    #[error("NAS error: {0}")]
    Nas(#[from] NasError),
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
    #[error("invalid test key: {0}")]
    Key(#[from] nextgamf_common::Error),
    #[error("nothing received within {0:?}")]
    Timeout(Duration),
    #[error("association closed by the AMF")]
    Closed,
    #[error("expected {expected}, got {actual}")]
    Unexpected {
        expected: &'static str,
        actual: String,
    },
}

pub type SimResult<T> = Result<T, SimError>;

/// One simulated UE behind the radio node.
#[derive(Debug, Clone)]
pub struct SimUe {
    pub config: TestUeConfig,
    pub ran_ue_ngap_id: u32,
    /// Learned from the first downlink message
    pub amf_ue_ngap_id: Option<u64>,
    /// Assigned in the Registration Accept
    pub guti: Option<Guti>,
    pub allowed_nssai: Vec<SNssai>,
}

impl SimUe {
    pub fn new(config: TestUeConfig, ran_ue_ngap_id: u32) -> Self {
        Self {
            config,
            ran_ue_ngap_id,
            amf_ue_ngap_id: None,
            guti: None,
            allowed_nssai: Vec::new(),
        }
    }

    fn amf_id(&self) -> SimResult<u64> {
        self.amf_ue_ngap_id.ok_or(SimError::Unexpected {
            expected: "an AMF UE NGAP ID",
            actual: "none assigned yet".to_string(),
        })
    }

    /// Initial registration with a null-scheme SUCI.
    pub fn registration_request(&self) -> NasMessage {
        NasMessage::RegistrationRequest(RegistrationRequest {
            registration_type: RegistrationType::InitialRegistration,
            follow_on_request: false,
            ngksi: NGKSI_NOT_AVAILABLE,
            mobile_identity: MobileIdentity::Suci(Suci::from_imsi(
                self.config.hplmn,
                self.config.msin.clone(),
            )),
            ue_security_capability: Some(self.config.security_capability),
            requested_nssai: Some(self.config.nssai.clone()),
        })
    }

    /// UL NAS Transport carrying a PDU Session Establishment Request.
    pub fn session_request(&self, psi: u8, dnn: Option<&str>) -> SimResult<NasMessage> {
        let inner = NasMessage::sm(
            psi,
            1,
            SmMessage::PduSessionEstablishmentRequest(PduSessionEstablishmentRequest {
                integrity_max_data_rate: [0xFF, 0xFF],
                pdu_session_type: None,
                ssc_mode: None,
            }),
        );
        Ok(NasMessage::UlNasTransport(UlNasTransport {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload: encode_nas(&inner)?,
            pdu_session_id: Some(psi),
            s_nssai: self.config.nssai.first().copied(),
            dnn: dnn.map(str::to_string),
        }))
    }
}

/// Simulated gNB holding one SCTP association to the AMF.
pub struct GnbSimulator {
    config: TestGnbConfig,
    association: SctpAssociation,
    recv_timeout: Duration,
}

impl GnbSimulator {
    pub async fn connect(addr: SocketAddr, config: TestGnbConfig) -> SimResult<Self> {
        let association = SctpAssociation::connect(addr, SctpConfig::default()).await?;
        Ok(Self {
            config,
            association,
            recv_timeout: DEFAULT_TEST_TIMEOUT,
        })
    }

    pub fn config(&self) -> &TestGnbConfig {
        &self.config
    }

    pub fn set_recv_timeout(&mut self, timeout: Duration) {
        self.recv_timeout = timeout;
    }

    fn plmn(&self) -> Plmn {
        self.config.tai.plmn
    }

    fn location(&self) -> UserLocationInformation {
        UserLocationInformation {
            nr_cgi: NrCgi {
                plmn: self.plmn(),
                nr_cell_identity: self.config.nci,
            },
            tai: self.config.tai,
        }
    }

    /// Sends an NGAP message on the stream matching its kind.
    pub async fn send(&mut self, msg: &SignalingMessage) -> SimResult<()> {
        let data = nextgamf_ngap::encode(msg)?;
        let stream = if msg.is_ue_associated() {
            UE_STREAM
        } else {
            NON_UE_STREAM
        };
        debug!("gNB sending {}", msg.message_type.name());
        self.send_raw(stream, &data).await
    }

    pub async fn send_raw(&mut self, stream: u16, data: &[u8]) -> SimResult<()> {
        self.association.send(stream, data).await?;
        Ok(())
    }

    /// Next NGAP message from the AMF.
    pub async fn recv(&mut self) -> SimResult<SignalingMessage> {
        match self.association.recv_timeout(self.recv_timeout).await? {
            Some(received) => {
                let msg = nextgamf_ngap::decode(&received.data)?;
                debug!(
                    "gNB received {} on stream {}",
                    msg.message_type.name(),
                    received.stream_id
                );
                Ok(msg)
            }
            None if self.association.is_closed() => Err(SimError::Closed),
            None => Err(SimError::Timeout(self.recv_timeout)),
        }
    }

    /// Waits up to `limit` and returns whatever arrived, if anything.
    pub async fn try_recv_within(&mut self, limit: Duration) -> SimResult<Option<SignalingMessage>> {
        match self.association.recv_timeout(limit).await? {
            Some(received) => Ok(Some(nextgamf_ngap::decode(&received.data)?)),
            None => Ok(None),
        }
    }

    /// Next message, which must be of `expected` type.
    pub async fn expect(&mut self, expected: MessageType) -> SimResult<SignalingMessage> {
        let msg = self.recv().await?;
        if msg.message_type != expected {
            return Err(SimError::Unexpected {
                expected: expected.name(),
                actual: msg.message_type.name().to_string(),
            });
        }
        Ok(msg)
    }

    /// Sends NG Setup Request and returns the response or failure.
    pub async fn ng_setup(&mut self) -> SimResult<SignalingMessage> {
        let request = build_ng_setup_request(&NgSetupRequestParams {
            global_ran_node_id: GlobalRanNodeId {
                plmn: self.plmn(),
                gnb_id: self.config.gnb_id,
                gnb_id_length: self.config.gnb_id_length,
            },
            ran_node_name: self.config.ran_node_name.clone(),
            supported_ta_list: vec![SupportedTaItem {
                tac: self.config.tai.tac,
                broadcast_plmn_list: vec![BroadcastPlmnItem {
                    plmn: self.plmn(),
                    slice_support_list: self.config.nssai.clone(),
                }],
            }],
            default_paging_drx: PagingDrx::V128,
        });
        self.send(&request).await?;
        self.recv().await
    }

    /// Sends the UE's first NAS message in an Initial UE Message.
    pub async fn initial_ue_message(&mut self, ue: &SimUe, nas: &NasMessage) -> SimResult<()> {
        let msg = build_initial_ue_message(&InitialUeMessageParams {
            ran_ue_ngap_id: ue.ran_ue_ngap_id,
            nas_pdu: encode_nas(nas)?,
            user_location_info: self.location(),
            rrc_establishment_cause: RrcEstablishmentCause::MoSignalling,
            amf_ue_ngap_id: None,
        });
        self.send(&msg).await
    }

    pub async fn uplink_nas(&mut self, ue: &SimUe, nas: &NasMessage) -> SimResult<()> {
        let msg = build_uplink_nas_transport(&UplinkNasTransportParams {
            amf_ue_ngap_id: ue.amf_id()?,
            ran_ue_ngap_id: ue.ran_ue_ngap_id,
            nas_pdu: encode_nas(nas)?,
            user_location_info: self.location(),
        });
        self.send(&msg).await
    }

    /// Next Downlink NAS Transport for `ue`, decoded. Records the AMF UE
    /// NGAP ID on first contact.
    pub async fn downlink_nas(&mut self, ue: &mut SimUe) -> SimResult<NasMessage> {
        let msg = self.expect(MessageType::DownlinkNasTransport).await?;
        let params = parse_downlink_nas_transport(&msg)?;
        if params.ran_ue_ngap_id != ue.ran_ue_ngap_id {
            return Err(SimError::Unexpected {
                expected: "a message for this UE",
                actual: format!("RAN UE NGAP ID {}", params.ran_ue_ngap_id),
            });
        }
        ue.amf_ue_ngap_id.get_or_insert(params.amf_ue_ngap_id);
        Ok(decode_nas(&params.nas_pdu)?)
    }

    /// Runs registration until the Authentication Request arrives and
    /// answers it with RES* computed from the UE's credentials.
    pub async fn authenticate(&mut self, ue: &mut SimUe) -> SimResult<()> {
        self.initial_ue_message(ue, &ue.registration_request()).await?;
        let nas = self.downlink_nas(ue).await?;
        let NasMessage::AuthenticationRequest(request) = nas else {
            return Err(SimError::Unexpected {
                expected: "AuthenticationRequest",
                actual: nas.name(),
            });
        };
        let (Some(rand), Some(autn)) = (request.rand, request.autn) else {
            return Err(SimError::Unexpected {
                expected: "RAND and AUTN",
                actual: "missing".to_string(),
            });
        };

        let milenage = Milenage::new(
            &decode_hex_key::<16>(&ue.config.k)?,
            &decode_hex_key::<16>(&ue.config.opc)?,
        );
        let result = ue_authenticate(
            &milenage,
            &rand,
            &autn,
            &ue.config.hplmn.serving_network_name(),
        )?;
        let response = NasMessage::AuthenticationResponse(AuthenticationResponse {
            res_star: Some(result.res_star),
        });
        self.uplink_nas(ue, &response).await
    }

    /// Full initial registration: authentication, security mode, context
    /// setup and Registration Complete.
    pub async fn register(&mut self, ue: &mut SimUe) -> SimResult<()> {
        self.authenticate(ue).await?;

        let nas = self.downlink_nas(ue).await?;
        if !matches!(nas, NasMessage::SecurityModeCommand(_)) {
            return Err(SimError::Unexpected {
                expected: "SecurityModeCommand",
                actual: nas.name(),
            });
        }
        self.uplink_nas(ue, &NasMessage::SecurityModeComplete(SecurityModeComplete))
            .await?;

        let msg = self.expect(MessageType::InitialContextSetupRequest).await?;
        let request = parse_initial_context_setup_request(&msg)?;
        let accept = request
            .nas_pdu
            .as_deref()
            .map(decode_nas)
            .transpose()?;
        let Some(NasMessage::RegistrationAccept(accept)) = accept else {
            return Err(SimError::Unexpected {
                expected: "RegistrationAccept in the context setup",
                actual: format!("{accept:?}"),
            });
        };
        ue.guti = accept.guti;
        ue.allowed_nssai = request.allowed_nssai;

        let response = build_initial_context_setup_response(&InitialContextSetupResponseParams {
            amf_ue_ngap_id: request.amf_ue_ngap_id,
            ran_ue_ngap_id: request.ran_ue_ngap_id,
        });
        self.send(&response).await?;
        self.uplink_nas(ue, &NasMessage::RegistrationComplete(RegistrationComplete))
            .await
    }

    /// Requests a PDU session and confirms (or fails) its radio resources.
    /// Returns the accept carried in the resource setup request.
    pub async fn establish_session(
        &mut self,
        ue: &SimUe,
        psi: u8,
        dnn: Option<&str>,
        radio_ok: bool,
    ) -> SimResult<PduSessionEstablishmentAccept> {
        self.uplink_nas(ue, &ue.session_request(psi, dnn)?).await?;

        let msg = self
            .expect(MessageType::PduSessionResourceSetupRequest)
            .await?;
        let request = parse_pdu_session_resource_setup_request(&msg)?;
        let accept = request
            .sessions
            .iter()
            .find(|item| item.pdu_session_id == psi)
            .and_then(|item| item.nas_pdu.as_deref())
            .map(sm_accept)
            .transpose()?
            .flatten();
        let Some(accept) = accept else {
            return Err(SimError::Unexpected {
                expected: "PduSessionEstablishmentAccept",
                actual: format!("{:?}", request.sessions),
            });
        };

        let mut response = PduSessionResourceSetupResponseParams {
            amf_ue_ngap_id: request.amf_ue_ngap_id,
            ran_ue_ngap_id: request.ran_ue_ngap_id,
            ..Default::default()
        };
        if radio_ok {
            response.setup.push(PduSessionResourceSetupItemSuRes {
                pdu_session_id: psi,
                transfer: Bytes::new(),
            });
        } else {
            response.failed.push(PduSessionResourceFailedToSetupItem {
                pdu_session_id: psi,
                transfer: Bytes::new(),
            });
        }
        self.send(&build_pdu_session_resource_setup_response(&response))
            .await?;
        Ok(accept)
    }

    /// UE-originating deregistration, through to the release complete.
    pub async fn deregister(&mut self, ue: &mut SimUe, switch_off: bool) -> SimResult<()> {
        let request =
            NasMessage::DeregistrationRequestUeOriginating(DeregistrationRequestUeOriginating {
                switch_off,
                ngksi: 0,
                mobile_identity: MobileIdentity::Suci(Suci::from_imsi(
                    ue.config.hplmn,
                    ue.config.msin.clone(),
                )),
            });
        self.uplink_nas(ue, &request).await?;
        if !switch_off {
            let nas = self.downlink_nas(ue).await?;
            if !matches!(nas, NasMessage::DeregistrationAcceptUeOriginating(_)) {
                return Err(SimError::Unexpected {
                    expected: "DeregistrationAccept",
                    actual: nas.name(),
                });
            }
        }
        self.expect(MessageType::UeContextReleaseCommand).await?;
        self.release_complete(ue).await
    }

    pub async fn release_complete(&mut self, ue: &SimUe) -> SimResult<()> {
        let complete = build_ue_context_release_complete(&UeContextReleaseCompleteParams {
            amf_ue_ngap_id: ue.amf_id()?,
            ran_ue_ngap_id: ue.ran_ue_ngap_id,
        });
        self.send(&complete).await
    }

    /// Gracefully shuts the association down.
    pub async fn disconnect(mut self) -> SimResult<()> {
        self.association.shutdown().await?;
        Ok(())
    }
}

/// Decodes the SM message inside a resource setup item's NAS PDU.
fn sm_accept(pdu: &[u8]) -> SimResult<Option<PduSessionEstablishmentAccept>> {
    let nas = decode_nas(pdu)?;
    let NasMessage::DlNasTransport(transport) = nas else {
        return Ok(None);
    };
    match decode_nas(&transport.payload)? {
        NasMessage::Sm {
            body: SmMessage::PduSessionEstablishmentAccept(accept),
            ..
        } => Ok(Some(accept)),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_request_wraps_sm_message() {
        let ue = SimUe::new(TestUeConfig::default(), 1);
        let NasMessage::UlNasTransport(transport) = ue.session_request(5, Some("internet")).unwrap()
        else {
            panic!("expected UL NAS Transport");
        };
        assert_eq!(transport.pdu_session_id, Some(5));
        assert_eq!(transport.dnn.as_deref(), Some("internet"));
        assert!(matches!(
            decode_nas(&transport.payload).unwrap(),
            NasMessage::Sm {
                body: SmMessage::PduSessionEstablishmentRequest(_),
                ..
            }
        ));
    }

    #[test]
    fn test_amf_id_required_before_uplink() {
        let ue = SimUe::new(TestUeConfig::default(), 1);
        assert!(matches!(ue.amf_id(), Err(SimError::Unexpected { .. })));
    }
}

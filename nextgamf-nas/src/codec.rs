//! Whole-message NAS codec

use bytes::Bytes;

use crate::enums::{MmMessageType, SmMessageType};
use crate::error::{NasError, Result};
use crate::header::{NasHeader, PlainMmHeader, PlainSmHeader};
use crate::ies::IeReader;
use crate::messages::*;
use crate::messages::MessageBody;

/// A decoded plain NAS message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NasMessage {
    RegistrationRequest(RegistrationRequest),
    RegistrationAccept(RegistrationAccept),
    RegistrationComplete(RegistrationComplete),
    RegistrationReject(RegistrationReject),
    DeregistrationRequestUeOriginating(DeregistrationRequestUeOriginating),
    DeregistrationAcceptUeOriginating(DeregistrationAcceptUeOriginating),
    AuthenticationRequest(AuthenticationRequest),
    AuthenticationResponse(AuthenticationResponse),
    AuthenticationReject(AuthenticationReject),
    AuthenticationFailure(AuthenticationFailure),
    SecurityModeCommand(SecurityModeCommand),
    SecurityModeComplete(SecurityModeComplete),
    SecurityModeReject(SecurityModeReject),
    /// 5GMM STATUS, reporting an error in a received message
    MmStatus(MmStatus),
    UlNasTransport(UlNasTransport),
    DlNasTransport(DlNasTransport),
    /// 5GSM messages carry their session header fields.
    Sm { header: SmHeaderFields, body: SmMessage },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmHeaderFields {
    pub pdu_session_id: u8,
    pub pti: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SmMessage {
    PduSessionEstablishmentRequest(PduSessionEstablishmentRequest),
    PduSessionEstablishmentAccept(PduSessionEstablishmentAccept),
    PduSessionEstablishmentReject(PduSessionEstablishmentReject),
}

impl SmMessage {
    fn message_type(&self) -> SmMessageType {
        match self {
            SmMessage::PduSessionEstablishmentRequest(_) => SmMessageType::PduSessionEstablishmentRequest,
            SmMessage::PduSessionEstablishmentAccept(_) => SmMessageType::PduSessionEstablishmentAccept,
            SmMessage::PduSessionEstablishmentReject(_) => SmMessageType::PduSessionEstablishmentReject,
        }
    }
}

macro_rules! mm_dispatch {
    ($($variant:ident),+ $(,)?) => {
        impl NasMessage {
            fn mm_message_type(&self) -> Option<MmMessageType> {
                match self {
                    $(NasMessage::$variant(_) => Some(MmMessageType::$variant),)+
                    NasMessage::Sm { .. } => None,
                }
            }

            fn encode_mm_body(&self, out: &mut Vec<u8>) -> Result<()> {
                match self {
                    $(NasMessage::$variant(m) => m.encode_body(out),)+
                    NasMessage::Sm { .. } => Ok(()),
                }
            }

            fn decode_mm_body(message_type: MmMessageType, r: &mut IeReader<'_>) -> Result<Self> {
                Ok(match message_type {
                    $(MmMessageType::$variant => NasMessage::$variant(MessageBody::decode_body(r)?),)+
                })
            }
        }
    };
}

mm_dispatch!(
    RegistrationRequest,
    RegistrationAccept,
    RegistrationComplete,
    RegistrationReject,
    DeregistrationRequestUeOriginating,
    DeregistrationAcceptUeOriginating,
    AuthenticationRequest,
    AuthenticationResponse,
    AuthenticationReject,
    AuthenticationFailure,
    SecurityModeCommand,
    SecurityModeComplete,
    SecurityModeReject,
    MmStatus,
    UlNasTransport,
    DlNasTransport,
);

impl NasMessage {
    /// Message name for logging.
    pub fn name(&self) -> String {
        match self {
            NasMessage::Sm { body, .. } => format!("{:?}", body.message_type()),
            other => other
                .mm_message_type()
                .map(|t| format!("{t:?}"))
                .unwrap_or_default(),
        }
    }

    pub fn sm(pdu_session_id: u8, pti: u8, body: SmMessage) -> Self {
        NasMessage::Sm {
            header: SmHeaderFields {
                pdu_session_id,
                pti,
            },
            body,
        }
    }
}

/// Decodes a plain 5GMM or 5GSM message.
pub fn decode_nas(bytes: &[u8]) -> Result<NasMessage> {
    let mut buf = bytes;
    let header = NasHeader::decode(&mut buf)?;
    let mut r = IeReader::new(buf);
    let message = match header {
        NasHeader::Mm(h) => NasMessage::decode_mm_body(h.message_type, &mut r)?,
        NasHeader::Sm(h) => {
            let body = match h.message_type {
                SmMessageType::PduSessionEstablishmentRequest => {
                    SmMessage::PduSessionEstablishmentRequest(MessageBody::decode_body(&mut r)?)
                }
                SmMessageType::PduSessionEstablishmentAccept => {
                    SmMessage::PduSessionEstablishmentAccept(MessageBody::decode_body(&mut r)?)
                }
                SmMessageType::PduSessionEstablishmentReject => {
                    SmMessage::PduSessionEstablishmentReject(MessageBody::decode_body(&mut r)?)
                }
            };
            NasMessage::sm(h.pdu_session_id, h.pti, body)
        }
    };
    if !r.is_empty() {
        return Err(NasError::invalid("message", "trailing octets after mandatory IEs"));
    }
    Ok(message)
}

pub fn encode_nas(message: &NasMessage) -> Result<Bytes> {
    let mut out = Vec::with_capacity(64);
    match message {
        NasMessage::Sm { header, body } => {
            PlainSmHeader::new(header.pdu_session_id, header.pti, body.message_type())
                .encode(&mut out);
            match body {
                SmMessage::PduSessionEstablishmentRequest(m) => m.encode_body(&mut out)?,
                SmMessage::PduSessionEstablishmentAccept(m) => m.encode_body(&mut out)?,
                SmMessage::PduSessionEstablishmentReject(m) => m.encode_body(&mut out)?,
            }
        }
        mm => {
            let message_type = mm
                .mm_message_type()
                .ok_or(NasError::MissingIe("5GMM message type"))?;
            PlainMmHeader::new(message_type).encode(&mut out);
            mm.encode_mm_body(&mut out)?;
        }
    }
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{MmCause, PayloadContainerType, PduSessionType, RegistrationType, SscMode};
    use crate::ies::{MobileIdentity, SessionAmbr, Suci, UeSecurityCapability};
    use nextgamf_common::{CipheringAlgorithm, IntegrityAlgorithm, Plmn, SNssai};

    fn registration_request() -> NasMessage {
        NasMessage::RegistrationRequest(RegistrationRequest {
            registration_type: RegistrationType::InitialRegistration,
            follow_on_request: true,
            ngksi: NGKSI_NOT_AVAILABLE,
            mobile_identity: MobileIdentity::Suci(Suci::from_imsi(
                Plmn::new(208, 93, false),
                "0000000003",
            )),
            ue_security_capability: Some(UeSecurityCapability { ea: 0xE0, ia: 0x60 }),
            requested_nssai: Some(vec![SNssai::with_sd(1, [1, 2, 3])]),
        })
    }

    #[test]
    fn test_registration_request_layout() {
        let bytes = encode_nas(&registration_request()).unwrap();
        assert_eq!(&bytes[..4], &[0x7E, 0x00, 0x41, 0x79]);
        assert_eq!(&bytes[4..6], &[0x00, 13]);
        assert_eq!(decode_nas(&bytes).unwrap(), registration_request());
    }

    #[test]
    fn test_unknown_optional_ies_are_skipped() {
        let mut bytes = encode_nas(&registration_request()).unwrap().to_vec();
        // 5GMM capability (TLV 0x10) and a type-1 IE
        bytes.extend_from_slice(&[0x10, 0x01, 0x00, 0xB1]);
        assert_eq!(decode_nas(&bytes).unwrap(), registration_request());
    }

    #[test]
    fn test_authentication_request() {
        let msg = NasMessage::AuthenticationRequest(AuthenticationRequest {
            ngksi: 0,
            abba: vec![0, 0],
            rand: Some([0x11; 16]),
            autn: Some([0x22; 16]),
        });
        let bytes = encode_nas(&msg).unwrap();
        assert_eq!(bytes.len(), 3 + 1 + 3 + 17 + 18);
        assert_eq!(decode_nas(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_security_mode_command() {
        let msg = NasMessage::SecurityModeCommand(SecurityModeCommand {
            ciphering: CipheringAlgorithm::Nea0,
            integrity: IntegrityAlgorithm::Nia2,
            ngksi: 0,
            replayed_ue_security_capability: UeSecurityCapability { ea: 0xE0, ia: 0x60 },
        });
        let bytes = encode_nas(&msg).unwrap();
        assert_eq!(&bytes[3..5], &[0x02, 0x00]);
        assert_eq!(decode_nas(&bytes).unwrap(), msg);
    }

    #[test]
    fn test_ul_nas_transport_with_session_request() {
        let inner = encode_nas(&NasMessage::sm(
            10,
            1,
            SmMessage::PduSessionEstablishmentRequest(PduSessionEstablishmentRequest {
                integrity_max_data_rate: [0xFF, 0xFF],
                pdu_session_type: Some(PduSessionType::Ipv4),
                ssc_mode: Some(SscMode::Mode1),
            }),
        ))
        .unwrap();
        let msg = NasMessage::UlNasTransport(UlNasTransport {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload: inner.clone(),
            pdu_session_id: Some(10),
            s_nssai: Some(SNssai::with_sd(1, [1, 2, 3])),
            dnn: Some("internet".to_string()),
        });
        let decoded = decode_nas(&encode_nas(&msg).unwrap()).unwrap();
        assert_eq!(decoded, msg);
        match decode_nas(&inner).unwrap() {
            NasMessage::Sm { header, body: SmMessage::PduSessionEstablishmentRequest(req) } => {
                assert_eq!(header.pdu_session_id, 10);
                assert_eq!(req.ssc_mode, Some(SscMode::Mode1));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_session_accept() {
        let msg = NasMessage::sm(
            10,
            1,
            SmMessage::PduSessionEstablishmentAccept(PduSessionEstablishmentAccept {
                pdu_session_type: PduSessionType::Ipv4,
                ssc_mode: SscMode::Mode1,
                qos_rules: Bytes::from_static(&[0x01, 0x00, 0x06, 0x31, 0x31, 0x01, 0x01, 0xFF, 0x09]),
                session_ambr: SessionAmbr::from_mbps(1000, 1000),
                s_nssai: Some(SNssai::with_sd(1, [1, 2, 3])),
                dnn: Some("internet".to_string()),
            }),
        );
        assert_eq!(decode_nas(&encode_nas(&msg).unwrap()).unwrap(), msg);
        assert_eq!(msg.name(), "PduSessionEstablishmentAccept");
    }

    #[test]
    fn test_reject_causes() {
        let msg = NasMessage::RegistrationReject(RegistrationReject {
            cause: MmCause::UeSecurityCapabilitiesMismatch,
        });
        let bytes = encode_nas(&msg).unwrap();
        assert_eq!(bytes.as_ref(), &[0x7E, 0x00, 0x44, 23]);
        assert_eq!(decode_nas(&bytes).unwrap(), msg);
        assert_eq!(msg.name(), "RegistrationReject");
    }

    #[test]
    fn test_mm_status() {
        let msg = NasMessage::MmStatus(MmStatus {
            cause: MmCause::InvalidMandatoryInformation,
        });
        let bytes = encode_nas(&msg).unwrap();
        assert_eq!(bytes.as_ref(), &[0x7E, 0x00, 0x64, 96]);
        assert_eq!(decode_nas(&bytes).unwrap(), msg);
        assert_eq!(msg.name(), "MmStatus");
    }

    #[test]
    fn test_truncated_body() {
        let bytes = encode_nas(&registration_request()).unwrap();
        assert!(matches!(
            decode_nas(&bytes[..8]),
            Err(NasError::BufferTooShort { .. })
        ));
    }
}

//! 5GSM messages (TS 24.501 Section 8.3)

use bytes::{BufMut, Bytes};
use nextgamf_common::SNssai;

use super::MessageBody;
use crate::enums::{PduSessionType, SmCause, SscMode};
use crate::error::{NasError, Result};
use crate::ies::{
    bytes_of, decode_dnn, decode_snssai, encode_dnn, iei, put_lv, put_lv_e, put_tlv, IeReader,
    SessionAmbr,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentRequest {
    /// Integrity protection maximum data rate (uplink, downlink)
    pub integrity_max_data_rate: [u8; 2],
    pub pdu_session_type: Option<PduSessionType>,
    pub ssc_mode: Option<SscMode>,
}

impl MessageBody for PduSessionEstablishmentRequest {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_slice(&self.integrity_max_data_rate);
        if let Some(t) = self.pdu_session_type {
            out.put_u8(iei::PDU_SESSION_TYPE | u8::from(t));
        }
        if let Some(m) = self.ssc_mode {
            out.put_u8(iei::SSC_MODE | u8::from(m));
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let integrity_max_data_rate = r.array()?;
        let mut msg = Self {
            integrity_max_data_rate,
            pdu_session_type: None,
            ssc_mode: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag & 0xF0 {
                iei::PDU_SESSION_TYPE => {
                    msg.pdu_session_type = Some(
                        PduSessionType::try_from(tag & 0x07)
                            .map_err(|_| NasError::invalid("PDU session type", format!("{tag:#x}")))?,
                    )
                }
                iei::SSC_MODE => {
                    msg.ssc_mode = Some(
                        SscMode::try_from(tag & 0x07)
                            .map_err(|_| NasError::invalid("SSC mode", format!("{tag:#x}")))?,
                    )
                }
                _ => r.skip_unknown(tag)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionEstablishmentAccept {
    pub pdu_session_type: PduSessionType,
    pub ssc_mode: SscMode,
    /// Authorized QoS rules, carried opaquely
    pub qos_rules: Bytes,
    pub session_ambr: SessionAmbr,
    pub s_nssai: Option<SNssai>,
    pub dnn: Option<String>,
}

impl MessageBody for PduSessionEstablishmentAccept {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8((u8::from(self.ssc_mode) << 4) | u8::from(self.pdu_session_type));
        put_lv_e(out, &self.qos_rules, "authorized QoS rules")?;
        put_lv(out, &self.session_ambr.encode(), "session AMBR")?;
        if let Some(s) = &self.s_nssai {
            put_tlv(out, iei::S_NSSAI, &s.encode(), "S-NSSAI")?;
        }
        if let Some(dnn) = &self.dnn {
            put_tlv(out, iei::DNN, &encode_dnn(dnn)?, "DNN")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let octet = r.u8()?;
        let pdu_session_type = PduSessionType::try_from(octet & 0x07)
            .map_err(|_| NasError::invalid("PDU session type", format!("{octet:#x}")))?;
        let ssc_mode = SscMode::try_from((octet >> 4) & 0x07)
            .map_err(|_| NasError::invalid("SSC mode", format!("{octet:#x}")))?;
        let qos_rules = bytes_of(r.lv_e()?);
        let session_ambr = SessionAmbr::decode(r.lv()?)?;
        let mut msg = Self {
            pdu_session_type,
            ssc_mode,
            qos_rules,
            session_ambr,
            s_nssai: None,
            dnn: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::S_NSSAI => msg.s_nssai = Some(decode_snssai(r.lv()?)?),
                iei::DNN => msg.dnn = Some(decode_dnn(r.lv()?)?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduSessionEstablishmentReject {
    pub cause: SmCause,
}

impl MessageBody for PduSessionEstablishmentReject {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(self.cause.into());
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let cause = SmCause::from(r.u8()?);
        while let Some(tag) = r.peek() {
            r.u8()?;
            r.skip_unknown(tag)?;
        }
        Ok(Self { cause })
    }
}

//! 5GMM messages (TS 24.501 Section 8.2)

use bytes::{BufMut, Bytes};
use nextgamf_common::{CipheringAlgorithm, Guti, IntegrityAlgorithm, SNssai};

use super::MessageBody;
use crate::enums::{MmCause, PayloadContainerType, RegistrationType};
use crate::error::{NasError, Result};
use crate::ies::{
    bytes_of, decode_dnn, decode_nssai, decode_snssai, encode_dnn, encode_nssai, iei, put_lv,
    put_lv_e, put_tlv, put_tlv_e, IeReader, MobileIdentity, UeSecurityCapability,
};

/// ngKSI value meaning "no key is available"
pub const NGKSI_NOT_AVAILABLE: u8 = 0x07;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationRequest {
    pub registration_type: RegistrationType,
    pub follow_on_request: bool,
    pub ngksi: u8,
    pub mobile_identity: MobileIdentity,
    pub ue_security_capability: Option<UeSecurityCapability>,
    pub requested_nssai: Option<Vec<SNssai>>,
}

impl MessageBody for RegistrationRequest {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(
            ((self.ngksi & 0x0F) << 4)
                | (u8::from(self.follow_on_request) << 3)
                | u8::from(self.registration_type),
        );
        put_lv_e(out, &self.mobile_identity.encode()?, "5GS mobile identity")?;
        if let Some(cap) = &self.ue_security_capability {
            put_tlv(out, iei::UE_SECURITY_CAPABILITY, &cap.encode(), "UE security capability")?;
        }
        if let Some(nssai) = &self.requested_nssai {
            put_tlv(out, iei::REQUESTED_NSSAI, &encode_nssai(nssai), "requested NSSAI")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let octet = r.u8()?;
        let registration_type = RegistrationType::try_from(octet & 0x07)
            .map_err(|_| NasError::invalid("5GS registration type", format!("{}", octet & 0x07)))?;
        let mobile_identity = MobileIdentity::decode(r.lv_e()?)?;
        let mut msg = Self {
            registration_type,
            follow_on_request: octet & 0x08 != 0,
            ngksi: octet >> 4,
            mobile_identity,
            ue_security_capability: None,
            requested_nssai: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::UE_SECURITY_CAPABILITY => {
                    msg.ue_security_capability = Some(UeSecurityCapability::decode(r.lv()?)?)
                }
                iei::REQUESTED_NSSAI => msg.requested_nssai = Some(decode_nssai(r.lv()?)?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

/// 5GS registration result value for 3GPP access
pub const REGISTRATION_RESULT_3GPP: u8 = 0x01;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationAccept {
    pub registration_result: u8,
    pub guti: Option<Guti>,
    pub allowed_nssai: Option<Vec<SNssai>>,
}

impl MessageBody for RegistrationAccept {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        put_lv(out, &[self.registration_result], "5GS registration result")?;
        if let Some(guti) = self.guti {
            put_tlv_e(out, iei::GUTI, &MobileIdentity::Guti(guti).encode()?, "5G-GUTI")?;
        }
        if let Some(nssai) = &self.allowed_nssai {
            put_tlv(out, iei::ALLOWED_NSSAI, &encode_nssai(nssai), "allowed NSSAI")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let [registration_result] = r.lv_array::<1>("5GS registration result")?;
        let mut msg = Self {
            registration_result,
            guti: None,
            allowed_nssai: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::GUTI => match MobileIdentity::decode(r.lv_e()?)? {
                    MobileIdentity::Guti(guti) => msg.guti = Some(guti),
                    MobileIdentity::Suci(_) => {
                        return Err(NasError::invalid("5G-GUTI", "holds a SUCI"))
                    }
                },
                iei::ALLOWED_NSSAI => msg.allowed_nssai = Some(decode_nssai(r.lv()?)?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

macro_rules! empty_body {
    ($($name:ident),+) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
            pub struct $name;

            impl MessageBody for $name {
                fn encode_body(&self, _out: &mut Vec<u8>) -> Result<()> {
                    Ok(())
                }

                fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
                    while let Some(tag) = r.peek() {
                        r.u8()?;
                        r.skip_unknown(tag)?;
                    }
                    Ok($name)
                }
            }
        )+
    };
}

empty_body!(
    RegistrationComplete,
    DeregistrationAcceptUeOriginating,
    AuthenticationReject,
    SecurityModeComplete
);

macro_rules! cause_body {
    ($($name:ident),+) => {
        $(
            #[derive(Debug, Clone, Copy, PartialEq, Eq)]
            pub struct $name {
                pub cause: MmCause,
            }

            impl MessageBody for $name {
                fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
                    out.put_u8(self.cause.into());
                    Ok(())
                }

                fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
                    let cause = MmCause::from(r.u8()?);
                    while let Some(tag) = r.peek() {
                        r.u8()?;
                        r.skip_unknown(tag)?;
                    }
                    Ok(Self { cause })
                }
            }
        )+
    };
}

cause_body!(RegistrationReject, SecurityModeReject, MmStatus);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeregistrationRequestUeOriginating {
    pub switch_off: bool,
    pub ngksi: u8,
    pub mobile_identity: MobileIdentity,
}

impl MessageBody for DeregistrationRequestUeOriginating {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        // access type 3GPP
        out.put_u8(((self.ngksi & 0x0F) << 4) | (u8::from(self.switch_off) << 3) | 0x01);
        put_lv_e(out, &self.mobile_identity.encode()?, "5GS mobile identity")
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let octet = r.u8()?;
        let mobile_identity = MobileIdentity::decode(r.lv_e()?)?;
        Ok(Self {
            switch_off: octet & 0x08 != 0,
            ngksi: octet >> 4,
            mobile_identity,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationRequest {
    pub ngksi: u8,
    pub abba: Vec<u8>,
    pub rand: Option<[u8; 16]>,
    pub autn: Option<[u8; 16]>,
}

impl MessageBody for AuthenticationRequest {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(self.ngksi & 0x0F);
        put_lv(out, &self.abba, "ABBA")?;
        if let Some(rand) = &self.rand {
            out.put_u8(iei::RAND);
            out.put_slice(rand);
        }
        if let Some(autn) = &self.autn {
            put_tlv(out, iei::AUTN, autn, "AUTN")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let ngksi = r.u8()? & 0x0F;
        let abba = r.lv()?.to_vec();
        let mut msg = Self {
            ngksi,
            abba,
            rand: None,
            autn: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::RAND => msg.rand = Some(r.array()?),
                iei::AUTN => msg.autn = Some(r.lv_array("AUTN")?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationResponse {
    pub res_star: Option<[u8; 16]>,
}

impl MessageBody for AuthenticationResponse {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        if let Some(res) = &self.res_star {
            put_tlv(out, iei::RES_STAR, res, "RES*")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let mut msg = Self { res_star: None };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::RES_STAR => msg.res_star = Some(r.lv_array("RES*")?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationFailure {
    pub cause: MmCause,
    pub auts: Option<[u8; 14]>,
}

impl MessageBody for AuthenticationFailure {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(self.cause.into());
        if let Some(auts) = &self.auts {
            put_tlv(out, iei::AUTS, auts, "AUTS")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let cause = MmCause::from(r.u8()?);
        let mut auts = None;
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::AUTS => auts = Some(r.lv_array("AUTS")?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(Self { cause, auts })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityModeCommand {
    pub ciphering: CipheringAlgorithm,
    pub integrity: IntegrityAlgorithm,
    pub ngksi: u8,
    pub replayed_ue_security_capability: UeSecurityCapability,
}

impl MessageBody for SecurityModeCommand {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8((self.ciphering.id() << 4) | self.integrity.id());
        out.put_u8(self.ngksi & 0x0F);
        put_lv(
            out,
            &self.replayed_ue_security_capability.encode(),
            "replayed UE security capability",
        )
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let algs = r.u8()?;
        let ciphering = CipheringAlgorithm::from_id(algs >> 4)
            .ok_or_else(|| NasError::invalid("NAS security algorithms", format!("NEA{}", algs >> 4)))?;
        let integrity = IntegrityAlgorithm::from_id(algs & 0x0F).ok_or_else(|| {
            NasError::invalid("NAS security algorithms", format!("NIA{}", algs & 0x0F))
        })?;
        let ngksi = r.u8()? & 0x0F;
        let replayed_ue_security_capability = UeSecurityCapability::decode(r.lv()?)?;
        while let Some(tag) = r.peek() {
            r.u8()?;
            r.skip_unknown(tag)?;
        }
        Ok(Self {
            ciphering,
            integrity,
            ngksi,
            replayed_ue_security_capability,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload: Bytes,
    pub pdu_session_id: Option<u8>,
    pub s_nssai: Option<SNssai>,
    pub dnn: Option<String>,
}

impl MessageBody for UlNasTransport {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(u8::from(self.payload_container_type) & 0x0F);
        put_lv_e(out, &self.payload, "payload container")?;
        if let Some(id) = self.pdu_session_id {
            out.put_u8(iei::PDU_SESSION_ID);
            out.put_u8(id);
        }
        if let Some(s) = &self.s_nssai {
            put_tlv(out, iei::S_NSSAI, &s.encode(), "S-NSSAI")?;
        }
        if let Some(dnn) = &self.dnn {
            put_tlv(out, iei::DNN, &encode_dnn(dnn)?, "DNN")?;
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let raw = r.u8()? & 0x0F;
        let payload_container_type = PayloadContainerType::try_from(raw)
            .map_err(|_| NasError::invalid("payload container type", raw.to_string()))?;
        let payload = bytes_of(r.lv_e()?);
        let mut msg = Self {
            payload_container_type,
            payload,
            pdu_session_id: None,
            s_nssai: None,
            dnn: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::PDU_SESSION_ID => msg.pdu_session_id = Some(r.u8()?),
                iei::S_NSSAI => msg.s_nssai = Some(decode_snssai(r.lv()?)?),
                iei::DNN => msg.dnn = Some(decode_dnn(r.lv()?)?),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DlNasTransport {
    pub payload_container_type: PayloadContainerType,
    pub payload: Bytes,
    pub pdu_session_id: Option<u8>,
    pub cause: Option<MmCause>,
}

impl MessageBody for DlNasTransport {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()> {
        out.put_u8(u8::from(self.payload_container_type) & 0x0F);
        put_lv_e(out, &self.payload, "payload container")?;
        if let Some(id) = self.pdu_session_id {
            out.put_u8(iei::PDU_SESSION_ID);
            out.put_u8(id);
        }
        if let Some(cause) = self.cause {
            out.put_u8(iei::MM_CAUSE);
            out.put_u8(cause.into());
        }
        Ok(())
    }

    fn decode_body(r: &mut IeReader<'_>) -> Result<Self> {
        let raw = r.u8()? & 0x0F;
        let payload_container_type = PayloadContainerType::try_from(raw)
            .map_err(|_| NasError::invalid("payload container type", raw.to_string()))?;
        let payload = bytes_of(r.lv_e()?);
        let mut msg = Self {
            payload_container_type,
            payload,
            pdu_session_id: None,
            cause: None,
        };
        while let Some(tag) = r.peek() {
            r.u8()?;
            match tag {
                iei::PDU_SESSION_ID => msg.pdu_session_id = Some(r.u8()?),
                iei::MM_CAUSE => msg.cause = Some(MmCause::from(r.u8()?)),
                other => r.skip_unknown(other)?,
            }
        }
        Ok(msg)
    }
}

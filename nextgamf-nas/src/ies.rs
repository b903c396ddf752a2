//! NAS information elements used by the AMF message subset
//!
//! - 5GS mobile identity (SUCI with the null protection scheme, 5G-GUTI)
//! - UE security capability
//! - NSSAI / S-NSSAI, DNN, session AMBR

use bytes::{Buf, BufMut, Bytes};
use nextgamf_common::{CipheringAlgorithm, Guami, Guti, IntegrityAlgorithm, Plmn, SNssai, Supi};

use crate::error::{NasError, Result};

/// Optional IE identifiers
pub mod iei {
    pub const AUTN: u8 = 0x20;
    pub const RAND: u8 = 0x21;
    pub const S_NSSAI: u8 = 0x22;
    pub const DNN: u8 = 0x25;
    pub const RES_STAR: u8 = 0x2D;
    pub const UE_SECURITY_CAPABILITY: u8 = 0x2E;
    pub const REQUESTED_NSSAI: u8 = 0x2F;
    pub const AUTS: u8 = 0x30;
    pub const ALLOWED_NSSAI: u8 = 0x15;
    pub const PDU_SESSION_ID: u8 = 0x12;
    pub const MM_CAUSE: u8 = 0x58;
    pub const GUTI: u8 = 0x77;
    /// Half-octet IEIs, upper nibble
    pub const PDU_SESSION_TYPE: u8 = 0x90;
    pub const SSC_MODE: u8 = 0xA0;
}

/// SUCI with the null protection scheme: the scheme output is the MSIN.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Suci {
    pub plmn: Plmn,
    /// 1 to 4 digits
    pub routing_indicator: String,
    pub protection_scheme_id: u8,
    pub home_network_public_key_id: u8,
    /// Scheme output; the MSIN digits under the null scheme
    pub msin: String,
}

impl Suci {
    pub const NULL_SCHEME: u8 = 0;

    /// SUCI for an IMSI-based SUPI under the null scheme.
    pub fn from_imsi(plmn: Plmn, msin: impl Into<String>) -> Self {
        Self {
            plmn,
            routing_indicator: "0".to_string(),
            protection_scheme_id: Self::NULL_SCHEME,
            home_network_public_key_id: 0,
            msin: msin.into(),
        }
    }

    /// Deconceals the SUPI; only the null scheme can be resolved.
    pub fn to_supi(&self) -> Option<Supi> {
        if self.protection_scheme_id != Self::NULL_SCHEME {
            return None;
        }
        let mnc = if self.plmn.long_mnc {
            format!("{:03}", self.plmn.mnc)
        } else {
            format!("{:02}", self.plmn.mnc)
        };
        Some(Supi::imsi(format!("{:03}{}{}", self.plmn.mcc, mnc, self.msin)))
    }
}

/// 5GS mobile identity, TS 24.501 Section 9.11.3.4
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MobileIdentity {
    Suci(Suci),
    Guti(Guti),
}

const IDENTITY_SUCI: u8 = 0x01;
const IDENTITY_GUTI: u8 = 0x02;

fn put_bcd(out: &mut Vec<u8>, digits: &str, what: &'static str) -> Result<()> {
    let nibbles: Vec<u8> = digits
        .chars()
        .map(|c| c.to_digit(10).map(|d| d as u8))
        .collect::<Option<_>>()
        .ok_or_else(|| NasError::invalid(what, format!("non-digit in '{digits}'")))?;
    for pair in nibbles.chunks(2) {
        let low = pair[0];
        let high = pair.get(1).copied().unwrap_or(0x0F);
        out.push((high << 4) | low);
    }
    Ok(())
}

fn read_bcd(bytes: &[u8], what: &'static str) -> Result<String> {
    let mut digits = String::with_capacity(bytes.len() * 2);
    let mut filler = false;
    for nibble in bytes.iter().flat_map(|b| [b & 0x0F, b >> 4]) {
        match nibble {
            0..=9 if !filler => digits.push(char::from(b'0' + nibble)),
            0x0F => filler = true,
            _ => return Err(NasError::invalid(what, format!("bad BCD nibble {nibble:#x}"))),
        }
    }
    Ok(digits)
}

impl MobileIdentity {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(16);
        match self {
            MobileIdentity::Suci(suci) => {
                // SUPI format IMSI (0) in bits 5-7
                out.push(IDENTITY_SUCI);
                out.extend_from_slice(&suci.plmn.encode());
                if suci.routing_indicator.is_empty() || suci.routing_indicator.len() > 4 {
                    return Err(NasError::invalid("routing indicator", "needs 1 to 4 digits"));
                }
                let mut ri = Vec::with_capacity(2);
                put_bcd(&mut ri, &suci.routing_indicator, "routing indicator")?;
                ri.resize(2, 0xFF);
                out.extend_from_slice(&ri);
                out.push(suci.protection_scheme_id & 0x0F);
                out.push(suci.home_network_public_key_id);
                put_bcd(&mut out, &suci.msin, "MSIN")?;
            }
            MobileIdentity::Guti(guti) => {
                out.push(0xF0 | IDENTITY_GUTI);
                out.extend_from_slice(&guti.guami.encode());
                out.extend_from_slice(&guti.tmsi.to_be_bytes());
            }
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        const IE: &str = "5GS mobile identity";
        let first = *bytes.first().ok_or(NasError::invalid(IE, "empty"))?;
        match first & 0x07 {
            IDENTITY_SUCI => {
                if (first >> 4) & 0x07 != 0 {
                    return Err(NasError::invalid(IE, "only IMSI-based SUCI is supported"));
                }
                if bytes.len() < 8 {
                    return Err(NasError::invalid(IE, "SUCI too short"));
                }
                let plmn = Plmn::decode([bytes[1], bytes[2], bytes[3]]);
                let routing_indicator = read_bcd(&bytes[4..6], "routing indicator")?;
                let protection_scheme_id = bytes[6] & 0x0F;
                let home_network_public_key_id = bytes[7];
                let msin = read_bcd(&bytes[8..], "MSIN")?;
                Ok(MobileIdentity::Suci(Suci {
                    plmn,
                    routing_indicator,
                    protection_scheme_id,
                    home_network_public_key_id,
                    msin,
                }))
            }
            IDENTITY_GUTI => {
                if bytes.len() != 11 {
                    return Err(NasError::invalid(IE, format!("GUTI of {} octets", bytes.len())));
                }
                let mut guami = [0u8; 6];
                guami.copy_from_slice(&bytes[1..7]);
                let tmsi = u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
                Ok(MobileIdentity::Guti(Guti {
                    guami: Guami::decode(guami),
                    tmsi,
                }))
            }
            other => Err(NasError::invalid(IE, format!("identity type {other}"))),
        }
    }
}

/// UE security capability, TS 24.501 Section 9.11.3.54
///
/// `ea` bit 8 is 5G-EA0, bit 7 128-5G-EA1 and so on; `ia` likewise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UeSecurityCapability {
    pub ea: u8,
    pub ia: u8,
}

impl UeSecurityCapability {
    pub fn from_algorithms(ciphering: &[CipheringAlgorithm], integrity: &[IntegrityAlgorithm]) -> Self {
        Self {
            ea: ciphering.iter().fold(0, |acc, a| acc | (0x80 >> a.id())),
            ia: integrity.iter().fold(0, |acc, a| acc | (0x80 >> a.id())),
        }
    }

    pub fn supports_ciphering(&self, alg: CipheringAlgorithm) -> bool {
        self.ea & (0x80 >> alg.id()) != 0
    }

    pub fn supports_integrity(&self, alg: IntegrityAlgorithm) -> bool {
        self.ia & (0x80 >> alg.id()) != 0
    }

    pub fn ciphering_algorithms(&self) -> Vec<CipheringAlgorithm> {
        CipheringAlgorithm::ALL
            .into_iter()
            .filter(|a| self.supports_ciphering(*a))
            .collect()
    }

    pub fn integrity_algorithms(&self) -> Vec<IntegrityAlgorithm> {
        IntegrityAlgorithm::ALL
            .into_iter()
            .filter(|a| self.supports_integrity(*a))
            .collect()
    }

    pub fn encode(&self) -> [u8; 2] {
        [self.ea, self.ia]
    }

    /// Accepts the 5GS octets plus any trailing EPS octets, which are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match bytes {
            [ea, ia, ..] if bytes.len() <= 8 => Ok(Self { ea: *ea, ia: *ia }),
            _ => Err(NasError::invalid(
                "UE security capability",
                format!("{} octets", bytes.len()),
            )),
        }
    }
}

/// Session AMBR, TS 24.501 Section 9.11.4.14
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionAmbr {
    pub downlink_unit: u8,
    pub downlink: u16,
    pub uplink_unit: u8,
    pub uplink: u16,
}

impl SessionAmbr {
    /// Unit value for 1 Mbps
    pub const UNIT_MBPS: u8 = 0x06;

    pub fn from_mbps(downlink: u16, uplink: u16) -> Self {
        Self {
            downlink_unit: Self::UNIT_MBPS,
            downlink,
            uplink_unit: Self::UNIT_MBPS,
            uplink,
        }
    }

    pub fn encode(&self) -> [u8; 6] {
        let [dh, dl] = self.downlink.to_be_bytes();
        let [uh, ul] = self.uplink.to_be_bytes();
        [self.downlink_unit, dh, dl, self.uplink_unit, uh, ul]
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        match *bytes {
            [du, dh, dl, uu, uh, ul] => Ok(Self {
                downlink_unit: du,
                downlink: u16::from_be_bytes([dh, dl]),
                uplink_unit: uu,
                uplink: u16::from_be_bytes([uh, ul]),
            }),
            _ => Err(NasError::invalid("session AMBR", format!("{} octets", bytes.len()))),
        }
    }
}

/// NSSAI value: a sequence of length-prefixed S-NSSAIs.
pub fn encode_nssai(list: &[SNssai]) -> Vec<u8> {
    let mut out = Vec::with_capacity(list.len() * 5);
    for s in list {
        let encoded = s.encode();
        out.push(encoded.len() as u8);
        out.extend_from_slice(&encoded);
    }
    out
}

pub fn decode_nssai(mut bytes: &[u8]) -> Result<Vec<SNssai>> {
    let mut list = Vec::new();
    while bytes.has_remaining() {
        let len = bytes.get_u8() as usize;
        if bytes.remaining() < len {
            return Err(NasError::invalid("NSSAI", "truncated S-NSSAI"));
        }
        let s = SNssai::decode(&bytes[..len])
            .ok_or_else(|| NasError::invalid("NSSAI", format!("S-NSSAI of {len} octets")))?;
        list.push(s);
        bytes.advance(len);
    }
    Ok(list)
}

pub fn decode_snssai(bytes: &[u8]) -> Result<SNssai> {
    SNssai::decode(bytes)
        .ok_or_else(|| NasError::invalid("S-NSSAI", format!("{} octets", bytes.len())))
}

/// DNN in APN label format, e.g. `internet` as `08 'internet'`.
pub fn encode_dnn(dnn: &str) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(dnn.len() + 1);
    for label in dnn.split('.') {
        if label.is_empty() || label.len() > 63 {
            return Err(NasError::invalid("DNN", format!("label '{label}'")));
        }
        out.push(label.len() as u8);
        out.extend_from_slice(label.as_bytes());
    }
    Ok(out)
}

pub fn decode_dnn(mut bytes: &[u8]) -> Result<String> {
    let mut labels = Vec::new();
    while bytes.has_remaining() {
        let len = bytes.get_u8() as usize;
        if len == 0 || bytes.remaining() < len {
            return Err(NasError::invalid("DNN", "bad label length"));
        }
        let label = std::str::from_utf8(&bytes[..len])
            .map_err(|e| NasError::invalid("DNN", e.to_string()))?;
        labels.push(label.to_string());
        bytes.advance(len);
    }
    if labels.is_empty() {
        return Err(NasError::invalid("DNN", "empty"));
    }
    Ok(labels.join("."))
}

/// Cursor over a NAS message body.
pub(crate) struct IeReader<'a> {
    buf: &'a [u8],
}

impl<'a> IeReader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize) -> Result<()> {
        if self.buf.remaining() < n {
            return Err(NasError::BufferTooShort {
                expected: n,
                actual: self.buf.remaining(),
            });
        }
        Ok(())
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub(crate) fn u8(&mut self) -> Result<u8> {
        self.need(1)?;
        Ok(self.buf.get_u8())
    }

    pub(crate) fn peek(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    pub(crate) fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        self.need(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    pub(crate) fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        self.need(n)?;
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    /// Length-value with a one-octet length.
    pub(crate) fn lv(&mut self) -> Result<&'a [u8]> {
        let len = self.u8()? as usize;
        self.take(len)
    }

    /// Length-value with a two-octet length.
    pub(crate) fn lv_e(&mut self) -> Result<&'a [u8]> {
        self.need(2)?;
        let len = self.buf.get_u16() as usize;
        self.take(len)
    }

    /// Fixed-size LV value.
    pub(crate) fn lv_array<const N: usize>(&mut self, ie: &'static str) -> Result<[u8; N]> {
        let value = self.lv()?;
        value
            .try_into()
            .map_err(|_| NasError::invalid(ie, format!("{} octets, expected {}", value.len(), N)))
    }

    /// Skips an optional IE this codec does not interpret. Type 1 IEs occupy
    /// one octet, IEIs 0x7X are TLV-E, everything else is TLV.
    pub(crate) fn skip_unknown(&mut self, iei: u8) -> Result<()> {
        if iei >= 0x80 {
            return Ok(());
        }
        if iei & 0xF0 == 0x70 {
            self.lv_e()?;
        } else {
            self.lv()?;
        }
        Ok(())
    }
}

/// Optional IE writers.
pub(crate) fn put_lv(out: &mut Vec<u8>, value: &[u8], ie: &'static str) -> Result<()> {
    let len = u8::try_from(value.len()).map_err(|_| NasError::ValueTooLong(ie))?;
    out.put_u8(len);
    out.put_slice(value);
    Ok(())
}

pub(crate) fn put_lv_e(out: &mut Vec<u8>, value: &[u8], ie: &'static str) -> Result<()> {
    let len = u16::try_from(value.len()).map_err(|_| NasError::ValueTooLong(ie))?;
    out.put_u16(len);
    out.put_slice(value);
    Ok(())
}

pub(crate) fn put_tlv(out: &mut Vec<u8>, iei: u8, value: &[u8], ie: &'static str) -> Result<()> {
    out.put_u8(iei);
    put_lv(out, value, ie)
}

pub(crate) fn put_tlv_e(out: &mut Vec<u8>, iei: u8, value: &[u8], ie: &'static str) -> Result<()> {
    out.put_u8(iei);
    put_lv_e(out, value, ie)
}

pub(crate) fn bytes_of(value: &[u8]) -> Bytes {
    Bytes::copy_from_slice(value)
}

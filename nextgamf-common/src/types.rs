//! Core 5G identifiers: PLMN, TAI, S-NSSAI, SUPI, GUAMI, 5G-GUTI and the NAS
//! security algorithm identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Public Land Mobile Network identifier.
///
/// MCC is always 3 digits; MNC is 2 or 3 digits (`long_mnc`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Plmn {
    /// Mobile Country Code (3 digits, range 0-999)
    pub mcc: u16,
    /// Mobile Network Code (2-3 digits, range 0-999)
    pub mnc: u16,
    /// True if MNC is 3 digits, false if 2 digits
    #[serde(default)]
    pub long_mnc: bool,
}

impl Plmn {
    /// Creates a new PLMN.
    pub const fn new(mcc: u16, mnc: u16, long_mnc: bool) -> Self {
        Self { mcc, mnc, long_mnc }
    }

    /// Returns true if this PLMN has valid values set.
    pub fn has_value(&self) -> bool {
        self.mcc > 0 || self.mnc > 0
    }

    /// Encodes the PLMN in the 3-octet BCD layout of TS 24.008:
    /// `mcc2|mcc1`, `mnc3|mcc3`, `mnc2|mnc1` (mnc3 = 0xF for 2-digit MNCs).
    pub fn encode(&self) -> [u8; 3] {
        let mcc1 = ((self.mcc / 100) % 10) as u8;
        let mcc2 = ((self.mcc / 10) % 10) as u8;
        let mcc3 = (self.mcc % 10) as u8;

        let (mnc1, mnc2, mnc3) = if self.long_mnc {
            (
                ((self.mnc / 100) % 10) as u8,
                ((self.mnc / 10) % 10) as u8,
                (self.mnc % 10) as u8,
            )
        } else {
            (((self.mnc / 10) % 10) as u8, (self.mnc % 10) as u8, 0x0F)
        };

        [(mcc2 << 4) | mcc1, (mnc3 << 4) | mcc3, (mnc2 << 4) | mnc1]
    }

    /// Decodes a PLMN from the 3-octet BCD layout.
    pub fn decode(bytes: [u8; 3]) -> Self {
        let mcc1 = (bytes[0] & 0x0F) as u16;
        let mcc2 = (bytes[0] >> 4) as u16;
        let mcc3 = (bytes[1] & 0x0F) as u16;
        let mnc3 = bytes[1] >> 4;
        let mnc1 = (bytes[2] & 0x0F) as u16;
        let mnc2 = (bytes[2] >> 4) as u16;

        let mcc = 100 * mcc1 + 10 * mcc2 + mcc3;
        if mnc3 == 0x0F {
            Self::new(mcc, 10 * mnc1 + mnc2, false)
        } else {
            Self::new(mcc, 100 * mnc1 + 10 * mnc2 + mnc3 as u16, true)
        }
    }

    /// Serving network name used as KDF input, e.g.
    /// `5G:mnc093.mcc208.3gppnetwork.org`.
    pub fn serving_network_name(&self) -> String {
        format!("5G:mnc{:03}.mcc{:03}.3gppnetwork.org", self.mnc, self.mcc)
    }
}

impl fmt::Debug for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "Plmn({:03}-{:03})", self.mcc, self.mnc)
        } else {
            write!(f, "Plmn({:03}-{:02})", self.mcc, self.mnc)
        }
    }
}

impl fmt::Display for Plmn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.long_mnc {
            write!(f, "{:03}{:03}", self.mcc, self.mnc)
        } else {
            write!(f, "{:03}{:02}", self.mcc, self.mnc)
        }
    }
}

impl FromStr for Plmn {
    type Err = Error;

    /// Parses the compact digit form used by subscriber data, e.g. `"20893"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits: String = s.chars().filter(|c| *c != '-').collect();
        if !(5..=6).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(Error::InvalidValue(format!("PLMN '{s}'")));
        }
        let mcc = digits[..3]
            .parse()
            .map_err(|_| Error::InvalidValue(format!("MCC in '{s}'")))?;
        let mnc = digits[3..]
            .parse()
            .map_err(|_| Error::InvalidValue(format!("MNC in '{s}'")))?;
        Ok(Self::new(mcc, mnc, digits.len() == 6))
    }
}

/// Tracking Area Identity: PLMN plus 24-bit tracking area code.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Tai {
    pub plmn: Plmn,
    /// Tracking Area Code (24-bit)
    pub tac: u32,
}

impl Tai {
    pub const fn new(plmn: Plmn, tac: u32) -> Self {
        Self { plmn, tac }
    }

    /// PLMN octets followed by the TAC as 3 big-endian octets.
    pub fn encode(&self) -> [u8; 6] {
        let p = self.plmn.encode();
        let t = self.tac.to_be_bytes();
        [p[0], p[1], p[2], t[1], t[2], t[3]]
    }

    pub fn decode(bytes: [u8; 6]) -> Self {
        let plmn = Plmn::decode([bytes[0], bytes[1], bytes[2]]);
        let tac = u32::from_be_bytes([0, bytes[3], bytes[4], bytes[5]]);
        Self { plmn, tac }
    }
}

impl fmt::Debug for Tai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tai({:?}, tac={})", self.plmn, self.tac)
    }
}

impl fmt::Display for Tai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.plmn, self.tac)
    }
}

/// Single Network Slice Selection Assistance Information.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SNssai {
    /// Slice/Service Type
    pub sst: u8,
    /// Slice Differentiator (24-bit)
    #[serde(default)]
    pub sd: Option<[u8; 3]>,
}

impl SNssai {
    pub const fn new(sst: u8) -> Self {
        Self { sst, sd: None }
    }

    pub const fn with_sd(sst: u8, sd: [u8; 3]) -> Self {
        Self { sst, sd: Some(sd) }
    }

    /// SST, followed by SD when present (1 or 4 octets).
    pub fn encode(&self) -> Vec<u8> {
        match self.sd {
            Some(sd) => vec![self.sst, sd[0], sd[1], sd[2]],
            None => vec![self.sst],
        }
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        match *bytes {
            [sst] => Some(Self::new(sst)),
            [sst, a, b, c] => Some(Self::with_sd(sst, [a, b, c])),
            _ => None,
        }
    }
}

impl fmt::Debug for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SNssai({self})")
    }
}

impl fmt::Display for SNssai {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sd {
            Some(sd) => write!(f, "{}-{}", self.sst, hex::encode(sd)),
            None => write!(f, "{}", self.sst),
        }
    }
}

/// SUPI type per TS 23.003.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SupiType {
    Imsi,
    Nai,
}

impl SupiType {
    pub fn prefix(&self) -> &'static str {
        match self {
            SupiType::Imsi => "imsi",
            SupiType::Nai => "nai",
        }
    }
}

/// Subscription Permanent Identifier, written `imsi-<digits>` or `nai-<value>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Supi {
    pub supi_type: SupiType,
    pub value: String,
}

impl Supi {
    pub fn new(supi_type: SupiType, value: impl Into<String>) -> Self {
        Self {
            supi_type,
            value: value.into(),
        }
    }

    pub fn imsi(value: impl Into<String>) -> Self {
        Self::new(SupiType::Imsi, value)
    }

    /// Parses `"imsi-208930000007487"`.
    pub fn parse(s: &str) -> Option<Self> {
        let (type_str, value) = s.split_once('-')?;
        let supi_type = match type_str.to_lowercase().as_str() {
            "imsi" => SupiType::Imsi,
            "nai" => SupiType::Nai,
            _ => return None,
        };
        if value.is_empty() {
            return None;
        }
        if supi_type == SupiType::Imsi && !value.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        Some(Self::new(supi_type, value))
    }
}

impl fmt::Debug for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Supi({self})")
    }
}

impl fmt::Display for Supi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.supi_type.prefix(), self.value)
    }
}

impl TryFrom<String> for Supi {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Supi::parse(&s).ok_or_else(|| Error::InvalidValue(format!("SUPI '{s}'")))
    }
}

impl From<Supi> for String {
    fn from(supi: Supi) -> Self {
        supi.to_string()
    }
}

/// Globally Unique AMF Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Guami {
    pub plmn: Plmn,
    pub amf_region_id: u8,
    /// 10 bits
    pub amf_set_id: u16,
    /// 6 bits
    pub amf_pointer: u8,
}

impl Guami {
    /// PLMN, region, then set id (10 bits) and pointer (6 bits) packed in two octets.
    pub fn encode(&self) -> [u8; 6] {
        let p = self.plmn.encode();
        let packed = ((self.amf_set_id & 0x03FF) << 6) | (self.amf_pointer & 0x3F) as u16;
        let [hi, lo] = packed.to_be_bytes();
        [p[0], p[1], p[2], self.amf_region_id, hi, lo]
    }

    pub fn decode(bytes: [u8; 6]) -> Self {
        let packed = u16::from_be_bytes([bytes[4], bytes[5]]);
        Self {
            plmn: Plmn::decode([bytes[0], bytes[1], bytes[2]]),
            amf_region_id: bytes[3],
            amf_set_id: packed >> 6,
            amf_pointer: (packed & 0x3F) as u8,
        }
    }
}

impl fmt::Display for Guami {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{:02x}-{:03x}-{:02x}",
            self.plmn, self.amf_region_id, self.amf_set_id, self.amf_pointer
        )
    }
}

/// 5G Globally Unique Temporary Identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Guti {
    pub guami: Guami,
    pub tmsi: u32,
}

impl fmt::Display for Guti {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:08x}", self.guami, self.tmsi)
    }
}

/// 5G NAS ciphering algorithm (NEA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CipheringAlgorithm {
    #[serde(rename = "NEA0")]
    Nea0,
    #[serde(rename = "NEA1")]
    Nea1,
    #[serde(rename = "NEA2")]
    Nea2,
    #[serde(rename = "NEA3")]
    Nea3,
}

/// 5G NAS integrity algorithm (NIA).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IntegrityAlgorithm {
    #[serde(rename = "NIA0")]
    Nia0,
    #[serde(rename = "NIA1")]
    Nia1,
    #[serde(rename = "NIA2")]
    Nia2,
    #[serde(rename = "NIA3")]
    Nia3,
}

macro_rules! algorithm_ids {
    ($ty:ident, $prefix:literal, [$($variant:ident = $id:literal),+]) => {
        impl $ty {
            pub const ALL: [$ty; 4] = [$($ty::$variant),+];

            /// Algorithm type identifier (TS 33.501 Annex A.8).
            pub fn id(self) -> u8 {
                match self {
                    $($ty::$variant => $id),+
                }
            }

            pub fn from_id(id: u8) -> Option<Self> {
                match id {
                    $($id => Some($ty::$variant),)+
                    _ => None,
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $prefix, self.id())
            }
        }
    };
}

algorithm_ids!(CipheringAlgorithm, "NEA", [Nea0 = 0, Nea1 = 1, Nea2 = 2, Nea3 = 3]);
algorithm_ids!(IntegrityAlgorithm, "NIA", [Nia0 = 0, Nia1 = 1, Nia2 = 2, Nia3 = 3]);

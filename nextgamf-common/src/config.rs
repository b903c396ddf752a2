//! AMF configuration
//!
//! Loaded from YAML. Every section except the served-area identity has a
//! default, so a minimal file only lists `served_guami`, `tai_list` and
//! `plmn_support`.
//!
//! ```yaml
//! amf_name: nextgamf
//! ngap:
//!   address: 127.0.0.1
//!   port: 38412
//! served_guami:
//!   - plmn: { mcc: 208, mnc: 93 }
//!     amf_region_id: 202
//!     amf_set_id: 1016
//!     amf_pointer: 0
//! tai_list:
//!   - plmn: { mcc: 208, mnc: 93 }
//!     tac: 1
//! plmn_support:
//!   - plmn: { mcc: 208, mnc: 93 }
//!     s_nssai: [{ sst: 1, sd: [1, 2, 3] }]
//! security:
//!   integrity_order: [NIA2, NIA1]
//!   ciphering_order: [NEA0, NEA2, NEA1]
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::{CipheringAlgorithm, Guami, IntegrityAlgorithm, Plmn, SNssai, Supi, Tai};

/// Well-known NGAP SCTP port.
pub const DEFAULT_NGAP_PORT: u16 = 38412;

fn default_amf_name() -> String {
    "nextgamf".to_string()
}

fn default_relative_capacity() -> u8 {
    255
}

fn default_ngap_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

fn default_ngap_port() -> u16 {
    DEFAULT_NGAP_PORT
}

/// Top-level AMF configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmfConfig {
    #[serde(default = "default_amf_name")]
    pub amf_name: String,
    #[serde(default)]
    pub ngap: NgapConfig,
    #[serde(default = "default_relative_capacity")]
    pub relative_capacity: u8,
    /// The first entry is the GUAMI used for 5G-GUTI allocation.
    pub served_guami: Vec<Guami>,
    pub tai_list: Vec<Tai>,
    pub plmn_support: Vec<PlmnSupport>,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub timers: TimerConfig,
    #[serde(default)]
    pub nf: NfConfig,
    /// Subscribers provisioned into the subscriber store at startup.
    #[serde(default)]
    pub subscribers: Vec<SubscriberProfile>,
}

/// NGAP listen endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgapConfig {
    #[serde(default = "default_ngap_address")]
    pub address: IpAddr,
    #[serde(default = "default_ngap_port")]
    pub port: u16,
}

impl Default for NgapConfig {
    fn default() -> Self {
        Self {
            address: default_ngap_address(),
            port: default_ngap_port(),
        }
    }
}

impl NgapConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }
}

/// One served PLMN and the slices offered in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlmnSupport {
    pub plmn: Plmn,
    #[serde(default)]
    pub s_nssai: Vec<SNssai>,
}

/// NAS security algorithm preference, most preferred first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default = "SecurityConfig::default_integrity_order")]
    pub integrity_order: Vec<IntegrityAlgorithm>,
    #[serde(default = "SecurityConfig::default_ciphering_order")]
    pub ciphering_order: Vec<CipheringAlgorithm>,
}

impl SecurityConfig {
    fn default_integrity_order() -> Vec<IntegrityAlgorithm> {
        vec![IntegrityAlgorithm::Nia2, IntegrityAlgorithm::Nia1]
    }

    fn default_ciphering_order() -> Vec<CipheringAlgorithm> {
        vec![
            CipheringAlgorithm::Nea0,
            CipheringAlgorithm::Nea2,
            CipheringAlgorithm::Nea1,
        ]
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            integrity_order: Self::default_integrity_order(),
            ciphering_order: Self::default_ciphering_order(),
        }
    }
}

/// Procedure supervision timers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Upper bound for every wait on the UE, the radio node or a peer NF.
    #[serde(default = "TimerConfig::default_procedure_timeout_ms")]
    pub procedure_timeout_ms: u64,
}

impl TimerConfig {
    fn default_procedure_timeout_ms() -> u64 {
        5000
    }

    pub fn procedure_timeout(&self) -> Duration {
        Duration::from_millis(self.procedure_timeout_ms)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            procedure_timeout_ms: Self::default_procedure_timeout_ms(),
        }
    }
}

/// Peer network function access.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NfConfig {
    #[serde(default)]
    pub retry: RetryConfig,
}

/// Bounded exponential backoff for unavailable peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "RetryConfig::default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "RetryConfig::default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "RetryConfig::default_multiplier")]
    pub multiplier: f64,
}

impl RetryConfig {
    fn default_max_attempts() -> u32 {
        3
    }
    fn default_initial_backoff_ms() -> u64 {
        100
    }
    fn default_max_backoff_ms() -> u64 {
        2000
    }
    fn default_multiplier() -> f64 {
        2.0
    }
}

impl RetryConfig {
    /// Upper bound on `max_attempts`.
    pub const MAX_ATTEMPTS: u32 = 10;
    /// Upper bound on `multiplier`.
    pub const MAX_MULTIPLIER: f64 = 10.0;

    pub fn validate(&self) -> Result<()> {
        if !(1..=Self::MAX_ATTEMPTS).contains(&self.max_attempts) {
            return Err(Error::Config(format!(
                "nf.retry.max_attempts must be within 1..={}",
                Self::MAX_ATTEMPTS
            )));
        }
        if !(1.0..=Self::MAX_MULTIPLIER).contains(&self.multiplier) {
            return Err(Error::Config(format!(
                "nf.retry.multiplier must be within 1.0..={}",
                Self::MAX_MULTIPLIER
            )));
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(Error::Config(
                "nf.retry.initial_backoff_ms exceeds max_backoff_ms".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            initial_backoff_ms: Self::default_initial_backoff_ms(),
            max_backoff_ms: Self::default_max_backoff_ms(),
            multiplier: Self::default_multiplier(),
        }
    }
}

fn default_auth_amf() -> String {
    "8000".to_string()
}

fn default_sqn() -> String {
    "000000000020".to_string()
}

fn default_dnn() -> String {
    "internet".to_string()
}

fn default_nssai() -> Vec<SNssai> {
    vec![SNssai::with_sd(1, [0x01, 0x02, 0x03])]
}

/// A subscriber provisioned at startup. Keys are hex strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberProfile {
    pub supi: Supi,
    /// Permanent key K (16 octets)
    pub k: String,
    /// OPc (16 octets); takes precedence over `op`
    #[serde(default)]
    pub opc: Option<String>,
    /// OP (16 octets), converted to OPc at provisioning
    #[serde(default)]
    pub op: Option<String>,
    /// Authentication management field (2 octets)
    #[serde(default = "default_auth_amf")]
    pub amf: String,
    /// Initial sequence number (6 octets)
    #[serde(default = "default_sqn")]
    pub sqn: String,
    /// Serving PLMN the subscription data is stored under; defaults to the
    /// first supported PLMN.
    #[serde(default)]
    pub serving_plmn: Option<Plmn>,
    #[serde(default = "default_nssai")]
    pub nssai: Vec<SNssai>,
    #[serde(default = "default_dnn")]
    pub dnn: String,
}

impl SubscriberProfile {
    pub fn k(&self) -> Result<[u8; 16]> {
        decode_hex_key(&self.k)
    }

    pub fn amf_field(&self) -> Result<[u8; 2]> {
        decode_hex_key(&self.amf)
    }

    pub fn sqn(&self) -> Result<[u8; 6]> {
        decode_hex_key(&self.sqn)
    }
}

/// Decodes a fixed-size hex string into a byte array.
pub fn decode_hex_key<const N: usize>(s: &str) -> Result<[u8; N]> {
    let bytes = hex::decode(s.trim()).map_err(|e| Error::InvalidValue(format!("hex '{s}': {e}")))?;
    bytes
        .try_into()
        .map_err(|v: Vec<u8>| Error::InvalidValue(format!("expected {N} octets, got {}", v.len())))
}

impl AmfConfig {
    /// Parses and validates a YAML configuration.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Checks the served-area identity, algorithm lists and subscriber keys.
    pub fn validate(&self) -> Result<()> {
        if self.served_guami.is_empty() {
            return Err(Error::Config("served_guami must not be empty".into()));
        }
        if self.tai_list.is_empty() {
            return Err(Error::Config("tai_list must not be empty".into()));
        }
        if self.plmn_support.is_empty() {
            return Err(Error::Config("plmn_support must not be empty".into()));
        }
        if self.security.integrity_order.is_empty() || self.security.ciphering_order.is_empty() {
            return Err(Error::Config(
                "security algorithm orders must not be empty".into(),
            ));
        }
        self.nf.retry.validate()?;
        if !is_printable_name(&self.amf_name) {
            return Err(Error::Config(format!(
                "amf_name '{}' must be 1 to 150 PrintableString characters",
                self.amf_name
            )));
        }
        for guami in &self.served_guami {
            if guami.amf_set_id > 0x3FF || guami.amf_pointer > 0x3F {
                return Err(Error::Config(format!("GUAMI {guami} out of range")));
            }
        }
        for sub in &self.subscribers {
            let checked = sub
                .k()
                .and_then(|_| sub.amf_field())
                .and_then(|_| sub.sqn())
                .and_then(|_| match (&sub.opc, &sub.op) {
                    (Some(opc), _) => decode_hex_key::<16>(opc).map(|_| ()),
                    (None, Some(op)) => decode_hex_key::<16>(op).map(|_| ()),
                    (None, None) => Err(Error::InvalidValue("one of opc/op is required".into())),
                });
            if let Err(e) = checked {
                return Err(Error::Config(format!("subscriber {}: {e}", sub.supi)));
            }
        }
        Ok(())
    }

    /// First supported PLMN; default serving network for provisioned subscribers.
    pub fn primary_plmn(&self) -> Plmn {
        self.plmn_support
            .first()
            .map(|p| p.plmn)
            .unwrap_or_default()
    }

    /// True if `plmn` is listed in `plmn_support`.
    pub fn supports_plmn(&self, plmn: &Plmn) -> bool {
        self.plmn_support.iter().any(|p| p.plmn == *plmn)
    }
}

impl Default for AmfConfig {
    fn default() -> Self {
        let plmn = Plmn::new(208, 93, false);
        Self {
            amf_name: default_amf_name(),
            ngap: NgapConfig::default(),
            relative_capacity: default_relative_capacity(),
            served_guami: vec![Guami {
                plmn,
                amf_region_id: 0xCA,
                amf_set_id: 0x3F8,
                amf_pointer: 0,
            }],
            tai_list: vec![Tai::new(plmn, 1)],
            plmn_support: vec![PlmnSupport {
                plmn,
                s_nssai: default_nssai(),
            }],
            security: SecurityConfig::default(),
            timers: TimerConfig::default(),
            nf: NfConfig::default(),
            subscribers: Vec::new(),
        }
    }
}

/// Fits the NGAP AMFName: ASN.1 PrintableString of 1 to 150 characters.
fn is_printable_name(name: &str) -> bool {
    (1..=150).contains(&name.len())
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || " '()+,-./:=?".contains(c))
}

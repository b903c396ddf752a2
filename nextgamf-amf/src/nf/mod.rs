//! Network Function Façade
//!
//! The AMF's view of its peers: credential, subscription and policy data are
//! fetched through [`NfFacade`]. Each call yields the record or a typed
//! [`NfError`]; retries and timeouts are the caller's concern
//! (see [`RetryPolicy`]).
//!
//! [`SubscriberDb`] is the in-memory implementation provisioned from the
//! configuration file and by tests.

mod retry;
mod subscriber_db;

pub use retry::RetryPolicy;
pub use subscriber_db::{
    AuthenticationSubscription, RecordKind, SmfSelectionData, SnssaiInfo, SubscriberDb,
    SubscriberRecord,
};

use nextgamf_common::{Plmn, SNssai, Supi};
use nextgamf_nas::{PduSessionType, SscMode};
use thiserror::Error;

/// Façade call failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NfError {
    /// The record does not exist; never retried
    #[error("{0} not found")]
    NotFound(String),
    /// The peer could not be reached or timed out
    #[error("{0} unavailable")]
    Unavailable(String),
}

pub type NfResult<T> = std::result::Result<T, NfError>;

/// 5G-AKA vector as handed to the serving network.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthVector {
    pub rand: [u8; 16],
    pub autn: [u8; 16],
    pub hxres_star: [u8; 16],
    pub xres_star: [u8; 16],
    pub kseaf: [u8; 32],
}

impl std::fmt::Debug for AuthVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthVector")
            .field("rand", &nextgamf_common::HexDump::new(&self.rand).to_string())
            .finish_non_exhaustive()
    }
}

/// Aggregate maximum bit rate in Mbps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ambr {
    pub uplink_mbps: u16,
    pub downlink_mbps: u16,
}

impl Default for Ambr {
    fn default() -> Self {
        Self {
            uplink_mbps: 1000,
            downlink_mbps: 1000,
        }
    }
}

/// Access and mobility subscription data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MobilitySubscription {
    /// Default S-NSSAIs, the allowed NSSAI when the UE requests none
    pub nssai: Vec<SNssai>,
    pub ue_ambr: Ambr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnnConfiguration {
    pub dnn: String,
    pub pdu_session_type: PduSessionType,
    pub ssc_mode: SscMode,
    pub session_ambr: Ambr,
}

/// Session management subscription for one slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SliceSubscription {
    pub s_nssai: SNssai,
    pub dnn_configurations: Vec<DnnConfiguration>,
}

impl SliceSubscription {
    pub fn dnn(&self, dnn: &str) -> Option<&DnnConfiguration> {
        self.dnn_configurations.iter().find(|c| c.dnn == dnn)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AmPolicyData {
    /// RAT/frequency selection priority index
    pub rfsp_index: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmPolicyData {
    pub s_nssai: SNssai,
    pub dnn: String,
    pub max_session_ambr: Ambr,
}

/// Access/mobility and session policy for one subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PolicyData {
    pub am: Option<AmPolicyData>,
    pub sm: Vec<SmPolicyData>,
}

/// Peer network functions, keyed by subscriber identity.
#[async_trait::async_trait]
pub trait NfFacade: Send + Sync {
    async fn fetch_authentication_vector(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<AuthVector>;

    async fn fetch_mobility_subscription(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<MobilitySubscription>;

    async fn fetch_session_management_subscription(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<Vec<SliceSubscription>>;

    async fn fetch_policy_data(&self, supi: &Supi) -> NfResult<PolicyData>;
}

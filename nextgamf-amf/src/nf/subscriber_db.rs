//! In-memory subscriber data store
//!
//! Holds the provisioning records of every subscriber and serves them
//! through [`NfFacade`]. Authentication vectors are generated on demand
//! with Milenage; each fetch advances the stored SQN.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use nextgamf_common::{decode_hex_key, Error as CommonError, Plmn, SNssai, SubscriberProfile, Supi};
use nextgamf_crypto::{compute_opc, generate_5g_aka_vector, Milenage};
use nextgamf_nas::{PduSessionType, SscMode};
use rand::RngCore;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    AmPolicyData, Ambr, AuthVector, DnnConfiguration, MobilitySubscription, NfError, NfFacade,
    NfResult, PolicyData, SliceSubscription, SmPolicyData,
};

const SQN_MAX: u64 = (1 << 48) - 1;

/// Long-term credentials of one subscriber.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthenticationSubscription {
    pub k: [u8; 16],
    pub opc: [u8; 16],
    /// Authentication management field
    pub amf: [u8; 2],
    pub sqn: [u8; 6],
}

impl std::fmt::Debug for AuthenticationSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationSubscription")
            .field("amf", &self.amf)
            .field("sqn", &self.sqn)
            .finish_non_exhaustive()
    }
}

impl AuthenticationSubscription {
    fn sqn_value(&self) -> u64 {
        self.sqn.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b))
    }

    fn advance_sqn(&mut self) {
        let next = (self.sqn_value() + 1) & SQN_MAX;
        self.sqn.copy_from_slice(&next.to_be_bytes()[2..]);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnssaiInfo {
    pub s_nssai: SNssai,
    pub dnns: Vec<String>,
}

/// Slices and DNNs the subscriber may establish sessions on.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SmfSelectionData {
    pub subscribed: Vec<SnssaiInfo>,
}

impl SmfSelectionData {
    fn allows(&self, s_nssai: &SNssai, dnn: &str) -> bool {
        self.subscribed
            .iter()
            .any(|info| info.s_nssai == *s_nssai && info.dnns.iter().any(|d| d == dnn))
    }
}

/// One provisioning record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriberRecord {
    Authentication(AuthenticationSubscription),
    AccessAndMobility(MobilitySubscription),
    SmfSelection(SmfSelectionData),
    SessionManagement(Vec<SliceSubscription>),
    AmPolicy(AmPolicyData),
    SmPolicy(Vec<SmPolicyData>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Authentication,
    AccessAndMobility,
    SmfSelection,
    SessionManagement,
    AmPolicy,
    SmPolicy,
}

impl RecordKind {
    /// Subscription data is stored per serving PLMN; credentials and
    /// policies per subscriber only.
    fn per_plmn(self) -> bool {
        matches!(
            self,
            RecordKind::AccessAndMobility | RecordKind::SmfSelection | RecordKind::SessionManagement
        )
    }
}

impl SubscriberRecord {
    pub fn kind(&self) -> RecordKind {
        match self {
            SubscriberRecord::Authentication(_) => RecordKind::Authentication,
            SubscriberRecord::AccessAndMobility(_) => RecordKind::AccessAndMobility,
            SubscriberRecord::SmfSelection(_) => RecordKind::SmfSelection,
            SubscriberRecord::SessionManagement(_) => RecordKind::SessionManagement,
            SubscriberRecord::AmPolicy(_) => RecordKind::AmPolicy,
            SubscriberRecord::SmPolicy(_) => RecordKind::SmPolicy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct RecordKey {
    supi: Supi,
    plmn: Option<Plmn>,
    kind: RecordKind,
}

/// In-memory credential, subscription and policy store.
#[derive(Debug)]
pub struct SubscriberDb {
    default_plmn: Plmn,
    records: RwLock<HashMap<RecordKey, SubscriberRecord>>,
    unavailable: AtomicBool,
}

impl SubscriberDb {
    /// `default_plmn` is used for subscription records inserted without a
    /// serving PLMN.
    pub fn new(default_plmn: Plmn) -> Self {
        Self {
            default_plmn,
            records: RwLock::new(HashMap::new()),
            unavailable: AtomicBool::new(false),
        }
    }

    fn key(&self, supi: &Supi, plmn: Option<Plmn>, kind: RecordKind) -> RecordKey {
        let plmn = kind.per_plmn().then(|| plmn.unwrap_or(self.default_plmn));
        RecordKey {
            supi: supi.clone(),
            plmn,
            kind,
        }
    }

    /// Stores a record, replacing any existing one of the same kind.
    /// Returns true if a record was replaced.
    pub async fn insert(&self, supi: &Supi, plmn: Option<Plmn>, record: SubscriberRecord) -> bool {
        let key = self.key(supi, plmn, record.kind());
        debug!("Provisioning {:?} for {}", key.kind, supi);
        self.records.write().await.insert(key, record).is_some()
    }

    pub async fn get(
        &self,
        supi: &Supi,
        plmn: Option<Plmn>,
        kind: RecordKind,
    ) -> Option<SubscriberRecord> {
        let key = self.key(supi, plmn, kind);
        self.records.read().await.get(&key).cloned()
    }

    /// Removes a record. Returns true if it existed.
    pub async fn delete(&self, supi: &Supi, plmn: Option<Plmn>, kind: RecordKind) -> bool {
        let key = self.key(supi, plmn, kind);
        self.records.write().await.remove(&key).is_some()
    }

    /// Removes every record of a subscriber.
    pub async fn delete_subscriber(&self, supi: &Supi) -> usize {
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|key, _| key.supi != *supi);
        before - records.len()
    }

    /// Simulates the data store being unreachable: every fetch fails with
    /// `Unavailable` while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self, operation: &str) -> NfResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(NfError::Unavailable(operation.to_string()));
        }
        Ok(())
    }

    /// Inserts the full record set for a configured subscriber: credentials,
    /// mobility data, SMF selection, session data and both policies.
    pub async fn provision(&self, profile: &SubscriberProfile) -> Result<(), CommonError> {
        let k = profile.k()?;
        let opc = match (&profile.opc, &profile.op) {
            (Some(opc), _) => decode_hex_key::<16>(opc)?,
            (None, Some(op)) => compute_opc(&k, &decode_hex_key::<16>(op)?),
            (None, None) => {
                return Err(CommonError::Config(format!(
                    "subscriber {} has neither opc nor op",
                    profile.supi
                )))
            }
        };
        let supi = &profile.supi;
        let plmn = profile.serving_plmn;

        self.insert(
            supi,
            None,
            SubscriberRecord::Authentication(AuthenticationSubscription {
                k,
                opc,
                amf: profile.amf_field()?,
                sqn: profile.sqn()?,
            }),
        )
        .await;
        self.insert(
            supi,
            plmn,
            SubscriberRecord::AccessAndMobility(MobilitySubscription {
                nssai: profile.nssai.clone(),
                ue_ambr: Ambr::default(),
            }),
        )
        .await;
        self.insert(
            supi,
            plmn,
            SubscriberRecord::SmfSelection(SmfSelectionData {
                subscribed: profile
                    .nssai
                    .iter()
                    .map(|s_nssai| SnssaiInfo {
                        s_nssai: *s_nssai,
                        dnns: vec![profile.dnn.clone()],
                    })
                    .collect(),
            }),
        )
        .await;
        self.insert(
            supi,
            plmn,
            SubscriberRecord::SessionManagement(
                profile
                    .nssai
                    .iter()
                    .map(|s_nssai| SliceSubscription {
                        s_nssai: *s_nssai,
                        dnn_configurations: vec![DnnConfiguration {
                            dnn: profile.dnn.clone(),
                            pdu_session_type: PduSessionType::Ipv4,
                            ssc_mode: SscMode::Mode1,
                            session_ambr: Ambr::default(),
                        }],
                    })
                    .collect(),
            ),
        )
        .await;
        self.insert(
            supi,
            None,
            SubscriberRecord::AmPolicy(AmPolicyData { rfsp_index: 1 }),
        )
        .await;
        self.insert(
            supi,
            None,
            SubscriberRecord::SmPolicy(
                profile
                    .nssai
                    .iter()
                    .map(|s_nssai| SmPolicyData {
                        s_nssai: *s_nssai,
                        dnn: profile.dnn.clone(),
                        max_session_ambr: Ambr::default(),
                    })
                    .collect(),
            ),
        )
        .await;

        info!("Provisioned subscriber {}", supi);
        Ok(())
    }
}

#[async_trait::async_trait]
impl NfFacade for SubscriberDb {
    async fn fetch_authentication_vector(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<AuthVector> {
        self.check_available("authentication subscription")?;
        let key = self.key(supi, None, RecordKind::Authentication);
        let mut records = self.records.write().await;
        let Some(SubscriberRecord::Authentication(subscription)) = records.get_mut(&key) else {
            return Err(NfError::NotFound(format!(
                "authentication subscription for {supi}"
            )));
        };

        subscription.advance_sqn();
        let mut rand = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut rand);

        let milenage = Milenage::new(&subscription.k, &subscription.opc);
        let vector = generate_5g_aka_vector(
            &milenage,
            &rand,
            &subscription.sqn,
            &subscription.amf,
            &serving_network.serving_network_name(),
        );
        debug!(
            "Generated 5G-AKA vector for {} (SQN {:012x})",
            supi,
            subscription.sqn_value()
        );

        Ok(AuthVector {
            rand: vector.rand,
            autn: vector.autn,
            hxres_star: vector.hxres_star,
            xres_star: vector.xres_star,
            kseaf: vector.kseaf,
        })
    }

    async fn fetch_mobility_subscription(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<MobilitySubscription> {
        self.check_available("access and mobility subscription")?;
        match self
            .get(supi, Some(*serving_network), RecordKind::AccessAndMobility)
            .await
        {
            Some(SubscriberRecord::AccessAndMobility(data)) => Ok(data),
            _ => Err(NfError::NotFound(format!(
                "access and mobility data for {supi} in {serving_network}"
            ))),
        }
    }

    async fn fetch_session_management_subscription(
        &self,
        supi: &Supi,
        serving_network: &Plmn,
    ) -> NfResult<Vec<SliceSubscription>> {
        self.check_available("session management subscription")?;
        let plmn = Some(*serving_network);
        let Some(SubscriberRecord::SessionManagement(slices)) =
            self.get(supi, plmn, RecordKind::SessionManagement).await
        else {
            return Err(NfError::NotFound(format!(
                "session management data for {supi} in {serving_network}"
            )));
        };

        // Restrict to what SMF selection data allows, when provisioned
        let selection = match self.get(supi, plmn, RecordKind::SmfSelection).await {
            Some(SubscriberRecord::SmfSelection(selection)) => Some(selection),
            _ => None,
        };
        Ok(match selection {
            None => slices,
            Some(selection) => slices
                .into_iter()
                .map(|mut slice| {
                    let s_nssai = slice.s_nssai;
                    slice
                        .dnn_configurations
                        .retain(|c| selection.allows(&s_nssai, &c.dnn));
                    slice
                })
                .filter(|slice| !slice.dnn_configurations.is_empty())
                .collect(),
        })
    }

    async fn fetch_policy_data(&self, supi: &Supi) -> NfResult<PolicyData> {
        self.check_available("policy data")?;
        let am = match self.get(supi, None, RecordKind::AmPolicy).await {
            Some(SubscriberRecord::AmPolicy(data)) => Some(data),
            _ => None,
        };
        let sm = match self.get(supi, None, RecordKind::SmPolicy).await {
            Some(SubscriberRecord::SmPolicy(data)) => data,
            _ => Vec::new(),
        };
        if am.is_none() && sm.is_empty() {
            return Err(NfError::NotFound(format!("policy data for {supi}")));
        }
        Ok(PolicyData { am, sm })
    }
}

//! Test fixtures and configuration helpers
//!
//! Pre-configured subscribers, radio node identity and AMF configuration
//! shared by the scenario tests.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use nextgamf_amf::{AmfApp, StartError, SubscriberDb, UeState};
use nextgamf_common::{
    AmfConfig, Guami, NgapConfig, Plmn, PlmnSupport, SNssai, SubscriberProfile, Supi, Tai,
};
use nextgamf_nas::UeSecurityCapability;

use crate::test_utils::{wait_for_condition, TestResult, DEFAULT_POLL_INTERVAL, DEFAULT_TEST_TIMEOUT};

/// Test network PLMN (208/93)
pub const TEST_PLMN: Plmn = Plmn::new(208, 93, false);

/// Slice offered by the test AMF and subscribed by the test UEs
pub const TEST_SLICE: SNssai = SNssai::with_sd(1, [0x01, 0x02, 0x03]);

/// Permanent key shared by the test subscribers
pub const TEST_K: &str = "8baf473f2f8fd09487cccbd7097c6862";

/// OPc shared by the test subscribers
pub const TEST_OPC: &str = "8e27b6af0e692e750f32667a3b14605d";

/// Test configuration container
#[derive(Debug, Clone, Default)]
pub struct TestConfig {
    pub ues: Vec<TestUeConfig>,
    pub gnb: TestGnbConfig,
    pub amf: TestAmfConfig,
}

impl TestConfig {
    /// One provisioned UE per MSIN.
    pub fn with_ues(msins: &[&str]) -> Self {
        Self {
            ues: msins.iter().map(|msin| TestUeConfig::default().with_msin(msin)).collect(),
            ..Default::default()
        }
    }

    /// AMF configuration with every test UE provisioned.
    pub fn amf_config(&self) -> AmfConfig {
        let mut config = self.amf.to_amf_config();
        config.subscribers = self.ues.iter().map(TestUeConfig::profile).collect();
        config
    }
}

/// Test UE configuration
#[derive(Debug, Clone)]
pub struct TestUeConfig {
    /// Home PLMN
    pub hplmn: Plmn,
    /// Subscription identifier digits after MCC/MNC
    pub msin: String,
    /// Permanent key (K), hex
    pub k: String,
    /// OPc, hex
    pub opc: String,
    /// Subscribed slices
    pub nssai: Vec<SNssai>,
    /// Subscribed DNN
    pub dnn: String,
    /// Algorithms the UE announces
    pub security_capability: UeSecurityCapability,
}

impl Default for TestUeConfig {
    fn default() -> Self {
        Self {
            hplmn: TEST_PLMN,
            msin: "0000000003".to_string(),
            k: TEST_K.to_string(),
            opc: TEST_OPC.to_string(),
            nssai: vec![TEST_SLICE],
            dnn: "internet".to_string(),
            // EA0-EA2, IA1-IA2
            security_capability: UeSecurityCapability { ea: 0xE0, ia: 0x60 },
        }
    }
}

impl TestUeConfig {
    pub fn with_msin(mut self, msin: &str) -> Self {
        self.msin = msin.to_string();
        self
    }

    pub fn with_security_capability(mut self, ea: u8, ia: u8) -> Self {
        self.security_capability = UeSecurityCapability { ea, ia };
        self
    }

    pub fn supi(&self) -> Supi {
        let plmn = if self.hplmn.long_mnc {
            format!("{:03}{:03}", self.hplmn.mcc, self.hplmn.mnc)
        } else {
            format!("{:03}{:02}", self.hplmn.mcc, self.hplmn.mnc)
        };
        Supi::imsi(format!("{plmn}{}", self.msin))
    }

    pub fn profile(&self) -> SubscriberProfile {
        SubscriberProfile {
            supi: self.supi(),
            k: self.k.clone(),
            opc: Some(self.opc.clone()),
            op: None,
            amf: "8000".to_string(),
            sqn: "000000000020".to_string(),
            serving_plmn: None,
            nssai: self.nssai.clone(),
            dnn: self.dnn.clone(),
        }
    }
}

/// Test radio node configuration
#[derive(Debug, Clone)]
pub struct TestGnbConfig {
    /// gNB ID
    pub gnb_id: u32,
    /// gNB ID length in bits
    pub gnb_id_length: u8,
    /// NR Cell Identity
    pub nci: u64,
    /// Served tracking area
    pub tai: Tai,
    /// Broadcast slices
    pub nssai: Vec<SNssai>,
    pub ran_node_name: Option<String>,
}

impl Default for TestGnbConfig {
    fn default() -> Self {
        Self {
            gnb_id: 1,
            gnb_id_length: 22,
            nci: 0x000000010,
            tai: Tai::new(TEST_PLMN, 1),
            nssai: vec![TEST_SLICE],
            ran_node_name: Some("test-gnb".to_string()),
        }
    }
}

impl TestGnbConfig {
    /// Broadcast a different PLMN
    pub fn with_plmn(mut self, plmn: Plmn) -> Self {
        self.tai.plmn = plmn;
        self
    }

    pub fn with_gnb_id(mut self, gnb_id: u32) -> Self {
        self.gnb_id = gnb_id;
        self
    }
}

/// Test AMF configuration
#[derive(Debug, Clone)]
pub struct TestAmfConfig {
    pub amf_name: String,
    /// NGAP listen address; port 0 picks a free one
    pub ngap_addr: SocketAddr,
    pub procedure_timeout_ms: u64,
}

impl Default for TestAmfConfig {
    fn default() -> Self {
        Self {
            amf_name: "test-amf".to_string(),
            ngap_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            procedure_timeout_ms: 2000,
        }
    }
}

impl TestAmfConfig {
    pub fn to_amf_config(&self) -> AmfConfig {
        let mut config = AmfConfig {
            amf_name: self.amf_name.clone(),
            ngap: NgapConfig {
                address: self.ngap_addr.ip(),
                port: self.ngap_addr.port(),
            },
            served_guami: vec![Guami {
                plmn: TEST_PLMN,
                amf_region_id: 0xCA,
                amf_set_id: 0x3F8,
                amf_pointer: 0,
            }],
            tai_list: vec![Tai::new(TEST_PLMN, 1)],
            plmn_support: vec![PlmnSupport {
                plmn: TEST_PLMN,
                s_nssai: vec![TEST_SLICE],
            }],
            ..AmfConfig::default()
        };
        config.timers.procedure_timeout_ms = self.procedure_timeout_ms;
        config.nf.retry.initial_backoff_ms = 10;
        config
    }
}

/// A started AMF with direct access to its subscriber store.
pub struct TestAmf {
    pub app: AmfApp,
    pub db: Arc<SubscriberDb>,
}

impl TestAmf {
    /// Starts an AMF with every subscriber in `config` provisioned.
    pub async fn start(config: AmfConfig) -> Result<Self, StartError> {
        let db = Arc::new(SubscriberDb::new(config.primary_plmn()));
        for profile in &config.subscribers {
            db.provision(profile).await?;
        }
        let app = AmfApp::start(config, db.clone()).await?;
        Ok(Self { app, db })
    }

    pub fn addr(&self) -> SocketAddr {
        self.app.local_addr()
    }

    /// State of a stored context, `None` once it is gone.
    pub async fn ue_state(&self, amf_ue_ngap_id: u64) -> Option<UeState> {
        let slot = self.app.store().get(amf_ue_ngap_id).await.ok()?;
        let state = slot.context.lock().await.state();
        Some(state)
    }

    /// Waits until the context reaches `state` (`None`: removed).
    pub async fn wait_for_ue_state(&self, amf_ue_ngap_id: u64, state: Option<UeState>) -> TestResult {
        wait_for_condition(
            || async move { self.ue_state(amf_ue_ngap_id).await == state },
            DEFAULT_TEST_TIMEOUT,
            DEFAULT_POLL_INTERVAL,
        )
        .await
    }

    pub async fn stop(self) {
        self.app.shutdown().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ue_supi_from_plmn_and_msin() {
        let ue = TestUeConfig::default().with_msin("0000000042");
        assert_eq!(ue.supi(), Supi::imsi("208930000000042"));
        assert_eq!(ue.profile().supi, ue.supi());
    }

    #[test]
    fn test_amf_config_is_valid() {
        let config = TestConfig::with_ues(&["0000000001", "0000000002"]).amf_config();
        config.validate().unwrap();
        assert_eq!(config.subscribers.len(), 2);
        assert_eq!(config.ngap.port, 0);
        assert!(config.supports_plmn(&TEST_PLMN));
    }
}

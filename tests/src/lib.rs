//! Integration test framework for nextgamf
//!
//! Drives a real [`AmfApp`](nextgamf_amf::AmfApp) over SCTP with a
//! simulated radio node.
//!
//! # Components
//!
//! - [`gnb_simulator`] - Simulated gNB and UEs speaking NGAP/NAS to the AMF
//! - [`test_fixtures`] - Subscribers, radio node identity and AMF configuration
//! - [`test_utils`] - Logging, polling and event helpers
//!
//! # Test Categories
//!
//! 1. **NG Setup Tests** - Radio node acceptance and rejection
//! 2. **UE Registration Tests** - 5G-AKA, security mode and rejections
//! 3. **PDU Session Tests** - Session establishment and radio failures
//! 4. **Multi-UE Tests** - Concurrent UEs and association loss
//! 5. **End-to-end Scenarios** - Full attach/detach lifecycles

#![allow(missing_docs)]

pub mod gnb_simulator;
pub mod test_fixtures;
pub mod test_utils;

pub use gnb_simulator::{GnbSimulator, SimError, SimResult, SimUe};
pub use test_fixtures::{
    TestAmf, TestAmfConfig, TestConfig, TestGnbConfig, TestUeConfig, TEST_PLMN, TEST_SLICE,
};
pub use test_utils::{
    init_test_logging, wait_for_condition, wait_for_event, TestResult, DEFAULT_POLL_INTERVAL,
    DEFAULT_TEST_TIMEOUT,
};

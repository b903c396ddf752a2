//! End-to-End Scenario Tests for nextgamf
//!
//! Walks a radio node and its UEs through a whole lifecycle against a
//! running AMF and checks the event stream it publishes along the way:
//! - association and NG Setup
//! - registration with 5G-AKA and NAS security
//! - PDU session establishment
//! - deregistration and context removal

use integration_tests::{
    init_test_logging, wait_for_event, GnbSimulator, SimUe, TestAmf, TestConfig, TestGnbConfig,
    DEFAULT_TEST_TIMEOUT,
};
use nextgamf_amf::{AmfEvent, UeState};
use tokio::sync::broadcast;

/// Collects the states one UE settles in between messages until its
/// context is removed.
async fn ue_history(
    events: &mut broadcast::Receiver<AmfEvent>,
    amf_ue_ngap_id: u64,
) -> Vec<UeState> {
    let mut states = Vec::new();
    loop {
        let event = wait_for_event(
            events,
            |e| e.amf_ue_ngap_id() == Some(amf_ue_ngap_id),
            DEFAULT_TEST_TIMEOUT,
        )
        .await
        .expect("UE event stream stalled");
        match event {
            AmfEvent::UeStateChanged { state, .. } => states.push(state),
            AmfEvent::UeContextRemoved { .. } => return states,
            _ => unreachable!(),
        }
    }
}

/// E2E Test: attach, session, detach
///
/// 1. gNB opens the association and completes NG Setup
/// 2. UE registers (authentication, security mode, context setup)
/// 3. UE establishes a PDU session
/// 4. UE deregisters and the AMF forgets it
#[tokio::test]
async fn test_e2e_full_lifecycle() {
    init_test_logging();
    tracing::info!("========================================");
    tracing::info!("E2E Test: UE Lifecycle");
    tracing::info!("========================================");

    let config = TestConfig::with_ues(&["0000000003"]);
    let amf = TestAmf::start(config.amf_config())
        .await
        .expect("Failed to start AMF");
    let mut events = amf.app.subscribe();
    tracing::info!("[CORE] AMF listening on {}", amf.addr());

    // Phase 1: association and NG Setup
    tracing::info!("[RAN] Phase 1: NG Setup");
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .expect("Failed to connect gNB");
    let up = wait_for_event(
        &mut events,
        |e| matches!(e, AmfEvent::AssociationUp { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    let AmfEvent::AssociationUp { association_id, .. } = up else {
        unreachable!()
    };

    gnb.ng_setup().await.expect("NG Setup failed");
    let setup = wait_for_event(
        &mut events,
        |e| matches!(e, AmfEvent::NgSetup { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    assert_eq!(
        setup,
        AmfEvent::NgSetup {
            association_id,
            accepted: true,
            ran_node_name: Some("test-gnb".to_string()),
        }
    );
    tracing::info!("[CORE] association {} ready", association_id);

    // Phase 2: registration
    tracing::info!("[UE] Phase 2: Registration");
    let mut ue = SimUe::new(config.ues[0].clone(), 1);
    gnb.register(&mut ue).await.expect("Registration failed");
    let id = ue.amf_ue_ngap_id.unwrap();
    tracing::info!("[UE] registered as AMF UE {} with {:?}", id, ue.guti);

    // Phase 3: PDU session
    tracing::info!("[UE] Phase 3: PDU Session");
    amf.wait_for_ue_state(id, Some(UeState::Registered))
        .await
        .unwrap();
    let accept = gnb
        .establish_session(&ue, 5, None, true)
        .await
        .expect("Session establishment failed");
    assert_eq!(accept.dnn.as_deref(), Some("internet"));
    amf.wait_for_ue_state(id, Some(UeState::Active)).await.unwrap();

    // Phase 4: deregistration
    tracing::info!("[UE] Phase 4: Deregistration");
    gnb.deregister(&mut ue, false)
        .await
        .expect("Deregistration failed");

    let history = ue_history(&mut events, id).await;
    tracing::info!("[CORE] UE {} went through {:?}", id, history);
    assert_eq!(
        history,
        vec![
            UeState::AuthenticationPending,
            UeState::SecurityActivated,
            UeState::Registered,
            UeState::SessionEstablishing,
            UeState::Active,
            UeState::Released,
        ]
    );
    assert!(amf.app.store().is_empty().await);

    // Phase 5: teardown
    gnb.disconnect().await.unwrap();
    wait_for_event(
        &mut events,
        |e| *e == AmfEvent::AssociationDown { association_id },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    amf.stop().await;
    tracing::info!("E2E lifecycle complete");
}

/// E2E Test: the same subscriber attaches again after detaching
#[tokio::test]
async fn test_e2e_reattach_after_deregistration() {
    init_test_logging();
    let config = TestConfig::with_ues(&["0000000003"]);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();

    let mut first = SimUe::new(config.ues[0].clone(), 1);
    gnb.register(&mut first).await.unwrap();
    let first_id = first.amf_ue_ngap_id.unwrap();
    gnb.deregister(&mut first, false).await.unwrap();
    amf.wait_for_ue_state(first_id, None).await.unwrap();

    let mut second = SimUe::new(config.ues[0].clone(), 2);
    gnb.register(&mut second).await.unwrap();
    let second_id = second.amf_ue_ngap_id.unwrap();
    amf.wait_for_ue_state(second_id, Some(UeState::Registered))
        .await
        .unwrap();
    assert_eq!(amf.app.store().len().await, 1);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

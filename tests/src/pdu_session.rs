//! PDU Session integration tests
//!
//! Session establishment for a registered UE: accepted sessions, unknown
//! DNNs and radio resource failures.

use std::time::Duration;

use integration_tests::{
    init_test_logging, GnbSimulator, SimUe, TestAmf, TestConfig, TestGnbConfig, TestUeConfig,
    TEST_SLICE,
};
use nextgamf_amf::UeState;
use nextgamf_nas::{NasMessage, PduSessionType, SmCause, SmMessage, SscMode};

async fn registered_ue(ran_ue_ngap_id: u32) -> (TestAmf, GnbSimulator, SimUe) {
    let amf = TestAmf::start(TestConfig::with_ues(&["0000000003"]).amf_config())
        .await
        .expect("Failed to start AMF");
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .expect("Failed to connect gNB");
    gnb.ng_setup().await.expect("NG Setup failed");

    let mut ue = SimUe::new(TestUeConfig::default(), ran_ue_ngap_id);
    gnb.register(&mut ue).await.expect("Registration failed");
    amf.wait_for_ue_state(ue.amf_ue_ngap_id.unwrap(), Some(UeState::Registered))
        .await
        .unwrap();
    (amf, gnb, ue)
}

/// Test PDU session establishment on the subscribed DNN
#[tokio::test]
async fn test_pdu_session_establishment() {
    init_test_logging();
    let (amf, mut gnb, ue) = registered_ue(1).await;
    let id = ue.amf_ue_ngap_id.unwrap();

    let accept = gnb
        .establish_session(&ue, 1, Some("internet"), true)
        .await
        .expect("Session establishment failed");
    assert_eq!(accept.pdu_session_type, PduSessionType::Ipv4);
    assert_eq!(accept.ssc_mode, SscMode::Mode1);
    assert_eq!(accept.dnn.as_deref(), Some("internet"));
    assert_eq!(accept.s_nssai, Some(TEST_SLICE));

    amf.wait_for_ue_state(id, Some(UeState::Active)).await.unwrap();
    let slot = amf.app.store().get(id).await.unwrap();
    let ctx = slot.context.lock().await;
    assert!(ctx.sessions.contains_key(&1));
    assert!(ctx.pending_session.is_none());
    drop(ctx);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a session on an unsubscribed DNN is rejected without
/// touching the registration
#[tokio::test]
async fn test_pdu_session_unknown_dnn() {
    init_test_logging();
    let (amf, mut gnb, mut ue) = registered_ue(2).await;
    let id = ue.amf_ue_ngap_id.unwrap();

    gnb.uplink_nas(&ue, &ue.session_request(1, Some("ims")).unwrap())
        .await
        .unwrap();
    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    let NasMessage::DlNasTransport(transport) = nas else {
        panic!("expected DL NAS Transport, got {}", nas.name());
    };
    assert_eq!(transport.pdu_session_id, Some(1));
    let inner = nextgamf_nas::decode_nas(&transport.payload).unwrap();
    assert!(matches!(
        inner,
        NasMessage::Sm {
            body: SmMessage::PduSessionEstablishmentReject(ref reject),
            ..
        } if reject.cause == SmCause::MissingOrUnknownDnn
    ));

    amf.wait_for_ue_state(id, Some(UeState::Registered))
        .await
        .unwrap();

    // the default DNN still works afterwards
    gnb.establish_session(&ue, 2, None, true).await.unwrap();
    amf.wait_for_ue_state(id, Some(UeState::Active)).await.unwrap();

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a radio resource failure leaves the UE registered
#[tokio::test]
async fn test_pdu_session_radio_failure() {
    init_test_logging();
    let (amf, mut gnb, ue) = registered_ue(3).await;
    let id = ue.amf_ue_ngap_id.unwrap();

    gnb.establish_session(&ue, 1, Some("internet"), false)
        .await
        .unwrap();
    amf.wait_for_ue_state(id, Some(UeState::Registered))
        .await
        .unwrap();
    let slot = amf.app.store().get(id).await.unwrap();
    assert!(slot.context.lock().await.sessions.is_empty());

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a session request before registration is refused
#[tokio::test]
async fn test_pdu_session_before_registration() {
    init_test_logging();
    let amf = TestAmf::start(TestConfig::with_ues(&["0000000003"]).amf_config())
        .await
        .unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();

    let mut ue = SimUe::new(TestUeConfig::default(), 4);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    gnb.downlink_nas(&mut ue).await.unwrap();
    let id = ue.amf_ue_ngap_id.unwrap();

    // dropped by the state machine; the authentication is still pending
    gnb.uplink_nas(&ue, &ue.session_request(1, None).unwrap())
        .await
        .unwrap();
    gnb.set_recv_timeout(Duration::from_millis(300));
    assert!(gnb.recv().await.is_err());
    assert_eq!(
        amf.ue_state(id).await,
        Some(UeState::AuthenticationPending)
    );

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

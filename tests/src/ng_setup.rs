//! NG Setup integration tests
//!
//! Radio node acceptance, rejection and non-UE error handling over SCTP.

use integration_tests::{
    init_test_logging, wait_for_event, GnbSimulator, SimUe, TestAmf, TestConfig, TestGnbConfig,
    TestUeConfig, DEFAULT_TEST_TIMEOUT, TEST_PLMN, TEST_SLICE,
};
use nextgamf_amf::AmfEvent;
use nextgamf_common::Plmn;
use nextgamf_ngap::ies::{MiscCause, ProtocolCause, TimeToWait};
use nextgamf_ngap::procedures::{
    parse_error_indication, parse_ng_setup_failure, parse_ng_setup_response,
};
use nextgamf_ngap::{Cause, MessageType};

/// Test NG Setup from a radio node broadcasting a served PLMN
#[tokio::test]
async fn test_ng_setup_accepted() {
    init_test_logging();

    let amf = TestAmf::start(TestConfig::default().amf_config())
        .await
        .expect("Failed to start AMF");
    let mut events = amf.app.subscribe();

    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .expect("Failed to connect gNB");
    let reply = gnb.ng_setup().await.expect("No NG Setup reply");
    assert_eq!(reply.message_type, MessageType::NgSetupResponse);

    let response = parse_ng_setup_response(&reply).unwrap();
    assert_eq!(response.amf_name, "test-amf");
    assert_eq!(response.served_guami_list, amf.app.config().served_guami);
    assert_eq!(response.relative_amf_capacity, 255);
    assert_eq!(response.plmn_support_list[0].plmn, TEST_PLMN);
    assert_eq!(response.plmn_support_list[0].slice_support_list, vec![TEST_SLICE]);

    let event = wait_for_event(
        &mut events,
        |e| matches!(e, AmfEvent::NgSetup { .. }),
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    assert!(matches!(
        event,
        AmfEvent::NgSetup { accepted: true, ran_node_name: Some(ref name), .. } if name == "test-gnb"
    ));

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test NG Setup from a radio node broadcasting only an unserved PLMN
#[tokio::test]
async fn test_ng_setup_unknown_plmn_rejected() {
    init_test_logging();

    let amf = TestAmf::start(TestConfig::with_ues(&["0000000003"]).amf_config())
        .await
        .unwrap();
    let foreign = TestGnbConfig::default().with_plmn(Plmn::new(1, 1, false));
    let mut gnb = GnbSimulator::connect(amf.addr(), foreign).await.unwrap();

    let reply = gnb.ng_setup().await.unwrap();
    assert_eq!(reply.message_type, MessageType::NgSetupFailure);
    let failure = parse_ng_setup_failure(&reply).unwrap();
    assert_eq!(failure.cause, Cause::Misc(MiscCause::UnknownPlmnOrSnpn));
    assert_eq!(failure.time_to_wait, Some(TimeToWait::V5s));

    // UE signalling is refused until a setup succeeds
    let ue = SimUe::new(TestUeConfig::default(), 1);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    let indication = gnb.expect(MessageType::ErrorIndication).await.unwrap();
    assert_eq!(
        parse_error_indication(&indication).unwrap().cause,
        Some(Cause::Protocol(
            ProtocolCause::MessageNotCompatibleWithReceiverState
        ))
    );
    assert!(amf.app.store().is_empty().await);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that an undecodable initiating message draws an Error Indication
/// and leaves the association usable
#[tokio::test]
async fn test_malformed_pdu_answered_with_error_indication() {
    init_test_logging();

    let amf = TestAmf::start(TestConfig::default().amf_config())
        .await
        .unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();

    // NGSetup initiating message with an empty message value
    gnb.send_raw(0, &[0x00, 0x15, 0x00, 0x00, 0x09, 0x00, 0x00])
        .await
        .unwrap();
    let indication = gnb.expect(MessageType::ErrorIndication).await.unwrap();
    assert_eq!(
        parse_error_indication(&indication).unwrap().cause,
        Some(Cause::Protocol(ProtocolCause::TransferSyntaxError))
    );

    let reply = gnb.ng_setup().await.unwrap();
    assert_eq!(reply.message_type, MessageType::NgSetupResponse);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a repeated NG Setup on a ready association is answered again
#[tokio::test]
async fn test_repeated_ng_setup() {
    init_test_logging();

    let amf = TestAmf::start(TestConfig::default().amf_config())
        .await
        .unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();

    for _ in 0..2 {
        let reply = gnb.ng_setup().await.unwrap();
        assert_eq!(reply.message_type, MessageType::NgSetupResponse);
    }

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

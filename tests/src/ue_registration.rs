//! UE Registration integration tests
//!
//! Registration over a real NGAP association: 5G-AKA, NAS security mode,
//! initial context setup, rejections and deregistration.

use integration_tests::{
    init_test_logging, wait_for_event, GnbSimulator, SimUe, TestAmf, TestConfig, TestGnbConfig,
    TestUeConfig, DEFAULT_TEST_TIMEOUT, TEST_PLMN, TEST_SLICE,
};
use nextgamf_amf::{AmfEvent, RejectCause, UeState};
use nextgamf_nas::{AuthenticationResponse, MmCause, NasMessage};
use nextgamf_ngap::ies::NasCause;
use nextgamf_ngap::procedures::parse_ue_context_release_command;
use nextgamf_ngap::{Cause, MessageType};

async fn setup(msins: &[&str]) -> (TestAmf, GnbSimulator) {
    let amf = TestAmf::start(TestConfig::with_ues(msins).amf_config())
        .await
        .expect("Failed to start AMF");
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .expect("Failed to connect gNB");
    let reply = gnb.ng_setup().await.expect("NG Setup failed");
    assert_eq!(reply.message_type, MessageType::NgSetupResponse);
    (amf, gnb)
}

/// Test registration of a provisioned UE through to the context setup
#[tokio::test]
async fn test_ue_registration_basic() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;
    let mut events = amf.app.subscribe();

    let mut ue = SimUe::new(TestUeConfig::default(), 1);
    gnb.register(&mut ue).await.expect("Registration failed");

    let id = ue.amf_ue_ngap_id.unwrap();
    let guti = ue.guti.expect("no 5G-GUTI assigned");
    assert_eq!(guti.guami, amf.app.config().served_guami[0]);
    assert_eq!(ue.allowed_nssai, vec![TEST_SLICE]);

    wait_for_event(
        &mut events,
        |e| {
            matches!(
                e,
                AmfEvent::UeStateChanged { state: UeState::Registered, amf_ue_ngap_id, .. }
                    if *amf_ue_ngap_id == id
            )
        },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();

    let slot = amf.app.store().get(id).await.unwrap();
    let ctx = slot.context.lock().await;
    assert_eq!(ctx.supi, Some(ue.config.supi()));
    assert_eq!(ctx.guti, Some(guti));
    assert_eq!(ctx.tai.map(|tai| tai.plmn), Some(TEST_PLMN));
    drop(ctx);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a wrong RES* is answered with Authentication Reject
#[tokio::test]
async fn test_authentication_failure() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;

    let mut ue = SimUe::new(TestUeConfig::default(), 2);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    assert!(matches!(nas, NasMessage::AuthenticationRequest(_)));

    let forged = NasMessage::AuthenticationResponse(AuthenticationResponse {
        res_star: Some([0x5A; 16]),
    });
    gnb.uplink_nas(&ue, &forged).await.unwrap();

    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    assert!(matches!(nas, NasMessage::AuthenticationReject(_)));
    let command = gnb
        .expect(MessageType::UeContextReleaseCommand)
        .await
        .unwrap();
    assert_eq!(
        parse_ue_context_release_command(&command).unwrap().cause,
        Cause::Nas(NasCause::AuthenticationFailure)
    );

    let id = ue.amf_ue_ngap_id.unwrap();
    assert_eq!(
        amf.ue_state(id).await,
        Some(UeState::Rejected(RejectCause::AuthenticationFailure))
    );
    gnb.release_complete(&ue).await.unwrap();
    amf.wait_for_ue_state(id, None).await.unwrap();

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that an unprovisioned SUPI is rejected
#[tokio::test]
async fn test_unknown_subscriber_rejected() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;

    let mut ue = SimUe::new(TestUeConfig::default().with_msin("0000000099"), 3);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    let NasMessage::RegistrationReject(reject) = nas else {
        panic!("expected Registration Reject, got {}", nas.name());
    };
    assert_eq!(reject.cause, MmCause::FiveGsServicesNotAllowed);
    gnb.expect(MessageType::UeContextReleaseCommand)
        .await
        .unwrap();

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that a UE sharing no algorithm with the AMF is rejected
#[tokio::test]
async fn test_no_common_algorithm_rejected() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;

    // EA2 only, IA3 only; IA3 is not in the AMF's preference list
    let mut ue = SimUe::new(TestUeConfig::default().with_security_capability(0x20, 0x10), 4);
    gnb.authenticate(&mut ue).await.unwrap();

    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    let NasMessage::RegistrationReject(reject) = nas else {
        panic!("expected Registration Reject, got {}", nas.name());
    };
    assert_eq!(reject.cause, MmCause::UeSecurityCapabilitiesMismatch);
    gnb.expect(MessageType::UeContextReleaseCommand)
        .await
        .unwrap();
    assert_eq!(
        amf.ue_state(ue.amf_ue_ngap_id.unwrap()).await,
        Some(UeState::Rejected(RejectCause::NoCommonAlgorithm))
    );

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that an unreachable subscriber store rejects the UE after retries
#[tokio::test]
async fn test_subscriber_store_unavailable() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;
    amf.db.set_unavailable(true);

    let mut ue = SimUe::new(TestUeConfig::default(), 5);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    let nas = gnb.downlink_nas(&mut ue).await.unwrap();
    assert!(matches!(
        nas,
        NasMessage::RegistrationReject(ref reject)
            if reject.cause == MmCause::FiveGsServicesNotAllowed
    ));
    assert_eq!(
        amf.ue_state(ue.amf_ue_ngap_id.unwrap()).await,
        Some(UeState::Rejected(RejectCause::SubscriberDataUnavailable))
    );

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test UE-originating deregistration removes the context
#[tokio::test]
async fn test_ue_deregistration() {
    init_test_logging();
    let (amf, mut gnb) = setup(&["0000000003"]).await;

    let mut ue = SimUe::new(TestUeConfig::default(), 6);
    gnb.register(&mut ue).await.unwrap();
    let id = ue.amf_ue_ngap_id.unwrap();
    amf.wait_for_ue_state(id, Some(UeState::Registered))
        .await
        .unwrap();

    gnb.deregister(&mut ue, false).await.unwrap();
    amf.wait_for_ue_state(id, None).await.unwrap();
    assert!(amf.app.store().is_empty().await);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that an unanswered Authentication Request times out and releases
#[tokio::test]
async fn test_authentication_timeout() {
    init_test_logging();
    let mut config = TestConfig::with_ues(&["0000000003"]);
    config.amf.procedure_timeout_ms = 200;
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();
    let mut events = amf.app.subscribe();

    let mut ue = SimUe::new(TestUeConfig::default(), 7);
    gnb.initial_ue_message(&ue, &ue.registration_request())
        .await
        .unwrap();
    assert!(matches!(
        gnb.downlink_nas(&mut ue).await.unwrap(),
        NasMessage::AuthenticationRequest(_)
    ));

    // no answer from the UE
    gnb.expect(MessageType::UeContextReleaseCommand)
        .await
        .unwrap();
    let id = ue.amf_ue_ngap_id.unwrap();
    wait_for_event(
        &mut events,
        |e| {
            matches!(
                e,
                AmfEvent::UeStateChanged {
                    amf_ue_ngap_id,
                    state: UeState::Released,
                    cause: Some(RejectCause::ProcedureTimeout),
                    ..
                } if *amf_ue_ngap_id == id
            )
        },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    gnb.release_complete(&ue).await.unwrap();
    amf.wait_for_ue_state(id, None).await.unwrap();

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

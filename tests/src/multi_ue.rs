//! Multi-UE integration tests
//!
//! Several UEs and radio nodes against one AMF, association loss and
//! re-registration of a SUPI that already has a context.

use std::collections::HashSet;
use std::time::Duration;

use integration_tests::{
    init_test_logging, wait_for_event, GnbSimulator, SimUe, TestAmf, TestConfig, TestGnbConfig,
    DEFAULT_TEST_TIMEOUT,
};
use nextgamf_amf::{AmfEvent, UeState};
use nextgamf_nas::NasMessage;
use nextgamf_ngap::ies::RadioNetworkCause;
use nextgamf_ngap::procedures::{
    parse_downlink_nas_transport, parse_error_indication, parse_ue_context_release_command,
};
use nextgamf_ngap::{Cause, MessageType};

const MSINS: [&str; 3] = ["0000000001", "0000000002", "0000000003"];

/// Test several UEs registering through one radio node
#[tokio::test]
async fn test_multiple_ue_registration() {
    init_test_logging();
    let config = TestConfig::with_ues(&MSINS);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();

    let mut ues: Vec<SimUe> = config
        .ues
        .iter()
        .enumerate()
        .map(|(i, ue)| SimUe::new(ue.clone(), i as u32 + 1))
        .collect();
    for ue in &mut ues {
        gnb.register(ue).await.expect("Registration failed");
    }

    let ids: HashSet<u64> = ues.iter().filter_map(|ue| ue.amf_ue_ngap_id).collect();
    assert_eq!(ids.len(), 3);
    let tmsis: HashSet<u32> = ues.iter().filter_map(|ue| ue.guti).map(|g| g.tmsi).collect();
    assert_eq!(tmsis.len(), 3);

    for id in &ids {
        amf.wait_for_ue_state(*id, Some(UeState::Registered))
            .await
            .unwrap();
    }
    assert_eq!(amf.app.store().len().await, 3);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test UEs behind two radio nodes are kept apart
#[tokio::test]
async fn test_multiple_gnbs() {
    init_test_logging();
    let config = TestConfig::with_ues(&MSINS[..2]);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();

    let mut gnb1 = GnbSimulator::connect(amf.addr(), TestGnbConfig::default().with_gnb_id(1))
        .await
        .unwrap();
    let mut gnb2 = GnbSimulator::connect(amf.addr(), TestGnbConfig::default().with_gnb_id(2))
        .await
        .unwrap();
    gnb1.ng_setup().await.unwrap();
    gnb2.ng_setup().await.unwrap();

    // same RAN UE NGAP ID on both radio nodes
    let mut ue1 = SimUe::new(config.ues[0].clone(), 1);
    let mut ue2 = SimUe::new(config.ues[1].clone(), 1);
    gnb1.register(&mut ue1).await.unwrap();
    gnb2.register(&mut ue2).await.unwrap();
    assert_ne!(ue1.amf_ue_ngap_id, ue2.amf_ue_ngap_id);

    // a radio node cannot address another node's UE
    let mut stray = ue2.clone();
    stray.ran_ue_ngap_id = 1;
    gnb1.uplink_nas(
        &stray,
        &NasMessage::RegistrationComplete(nextgamf_nas::RegistrationComplete),
    )
    .await
    .unwrap();
    let indication = gnb1.expect(MessageType::ErrorIndication).await.unwrap();
    assert_eq!(
        parse_error_indication(&indication).unwrap().cause,
        Some(Cause::RadioNetwork(RadioNetworkCause::UnknownLocalUeNgapId))
    );

    gnb1.disconnect().await.unwrap();
    gnb2.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that losing the association releases its UEs, and that their old
/// identifiers are unknown afterwards
#[tokio::test]
async fn test_association_loss_during_session_setup() {
    init_test_logging();
    let config = TestConfig::with_ues(&MSINS[..1]);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut events = amf.app.subscribe();

    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();
    let mut ue = SimUe::new(config.ues[0].clone(), 1);
    gnb.register(&mut ue).await.unwrap();
    let id = ue.amf_ue_ngap_id.unwrap();
    amf.wait_for_ue_state(id, Some(UeState::Registered))
        .await
        .unwrap();

    // request a session, never confirm its radio resources
    gnb.uplink_nas(&ue, &ue.session_request(1, None).unwrap())
        .await
        .unwrap();
    gnb.expect(MessageType::PduSessionResourceSetupRequest)
        .await
        .unwrap();
    assert_eq!(amf.ue_state(id).await, Some(UeState::SessionEstablishing));

    gnb.disconnect().await.unwrap();
    let event = wait_for_event(
        &mut events,
        |e| {
            matches!(
                e,
                AmfEvent::UeStateChanged { amf_ue_ngap_id, state: UeState::Released, .. }
                    if *amf_ue_ngap_id == id
            )
        },
        DEFAULT_TEST_TIMEOUT,
    )
    .await
    .unwrap();
    assert!(matches!(event, AmfEvent::UeStateChanged { cause: None, .. }));
    amf.wait_for_ue_state(id, None).await.unwrap();

    // a new association referring to the old context
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();
    gnb.uplink_nas(
        &ue,
        &NasMessage::RegistrationComplete(nextgamf_nas::RegistrationComplete),
    )
    .await
    .unwrap();
    let indication = gnb.expect(MessageType::ErrorIndication).await.unwrap();
    let params = parse_error_indication(&indication).unwrap();
    assert_eq!(params.amf_ue_ngap_id, Some(id));
    assert_eq!(
        params.cause,
        Some(Cause::RadioNetwork(RadioNetworkCause::UnknownLocalUeNgapId))
    );

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that registering a SUPI again releases the older context
#[tokio::test]
async fn test_reregistration_supersedes_old_context() {
    init_test_logging();
    let config = TestConfig::with_ues(&MSINS[..1]);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();

    let mut old = SimUe::new(config.ues[0].clone(), 1);
    gnb.register(&mut old).await.unwrap();
    let old_id = old.amf_ue_ngap_id.unwrap();
    amf.wait_for_ue_state(old_id, Some(UeState::Registered))
        .await
        .unwrap();

    // nothing happens to the old context until the new one authenticates
    let mut new = SimUe::new(config.ues[0].clone(), 2);
    gnb.authenticate(&mut new).await.unwrap();
    assert_ne!(new.amf_ue_ngap_id, Some(old_id));

    // the old context's release and the security mode command may interleave
    let mut release_seen = false;
    let mut command_seen = false;
    for _ in 0..2 {
        let msg = gnb.recv().await.unwrap();
        match msg.message_type {
            MessageType::UeContextReleaseCommand => {
                let command = parse_ue_context_release_command(&msg).unwrap();
                assert_eq!(command.ue_ngap_ids.amf_ue_ngap_id(), old_id);
                assert_eq!(
                    command.cause,
                    Cause::RadioNetwork(RadioNetworkCause::ReleaseDueTo5gcGeneratedReason)
                );
                release_seen = true;
            }
            MessageType::DownlinkNasTransport => {
                let params = parse_downlink_nas_transport(&msg).unwrap();
                assert_eq!(params.ran_ue_ngap_id, 2);
                assert_ne!(params.amf_ue_ngap_id, old_id);
                command_seen = true;
            }
            other => panic!("unexpected {}", other.name()),
        }
    }
    assert!(release_seen && command_seen);

    gnb.release_complete(&old).await.unwrap();
    amf.wait_for_ue_state(old_id, None).await.unwrap();
    assert_eq!(amf.app.store().len().await, 1);

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

/// Test that an unauthenticated registration cannot take over a SUPI
#[tokio::test]
async fn test_unauthenticated_registration_keeps_owner() {
    init_test_logging();
    let config = TestConfig::with_ues(&MSINS[..1]);
    let amf = TestAmf::start(config.amf_config()).await.unwrap();
    let mut gnb = GnbSimulator::connect(amf.addr(), TestGnbConfig::default())
        .await
        .unwrap();
    gnb.ng_setup().await.unwrap();

    let mut victim = SimUe::new(config.ues[0].clone(), 1);
    gnb.register(&mut victim).await.unwrap();
    let victim_id = victim.amf_ue_ngap_id.unwrap();
    amf.wait_for_ue_state(victim_id, Some(UeState::Registered))
        .await
        .unwrap();

    // same SUCI, but the Authentication Request is never answered
    let mut attacker = SimUe::new(config.ues[0].clone(), 2);
    gnb.initial_ue_message(&attacker, &attacker.registration_request())
        .await
        .unwrap();
    let nas = gnb.downlink_nas(&mut attacker).await.unwrap();
    assert!(matches!(nas, NasMessage::AuthenticationRequest(_)));
    assert!(gnb
        .try_recv_within(Duration::from_millis(200))
        .await
        .unwrap()
        .is_none());

    let owner = amf
        .app
        .store()
        .find_by_supi(&config.ues[0].supi())
        .await
        .unwrap();
    assert_eq!(owner.amf_ue_ngap_id, victim_id);
    assert_eq!(amf.ue_state(victim_id).await, Some(UeState::Registered));

    gnb.disconnect().await.unwrap();
    amf.stop().await;
}

//! PDU session establishment relayed over UL/DL NAS Transport

use bytes::{BufMut, Bytes, BytesMut};
use nextgamf_common::{log_nas_message, Direction, SNssai};
use nextgamf_nas::{
    decode_nas, encode_nas, DlNasTransport, NasMessage, PayloadContainerType,
    PduSessionEstablishmentAccept, PduSessionEstablishmentReject, SessionAmbr, SmCause,
    SmMessage, UlNasTransport,
};
use nextgamf_ngap::ies::PduSessionResourceSetupItemSuReq;
use nextgamf_ngap::procedures::{
    build_pdu_session_resource_setup_request, parse_pdu_session_resource_setup_response,
    PduSessionResourceSetupRequestParams,
};
use nextgamf_ngap::SignalingMessage;
use tracing::{info, warn};

use super::{downlink_nas, Gmm, GmmError, GmmEvent, RejectCause, Result, Step};
use crate::context::{PduSession, UeContext};
use crate::nf::{Ambr, DnnConfiguration, PolicyData, SliceSubscription};
use crate::store::UeSlot;

/// Match-all packet filter on the default QoS flow (QFI 9)
const DEFAULT_QOS_RULE: [u8; 9] = [0x01, 0x00, 0x06, 0x31, 0x31, 0x01, 0x01, 0xFF, 0x09];

impl Gmm {
    pub(super) async fn ul_nas_transport(
        &self,
        slot: &UeSlot,
        transport: UlNasTransport,
    ) -> Result<Step> {
        if transport.payload_container_type != PayloadContainerType::N1SmInformation {
            return Err(GmmError::Unexpected(format!(
                "payload container {:?}",
                transport.payload_container_type
            )));
        }
        let (header, request) = match decode_nas(&transport.payload)? {
            NasMessage::Sm {
                header,
                body: SmMessage::PduSessionEstablishmentRequest(request),
            } => (header, request),
            other => return Err(GmmError::Unexpected(other.name())),
        };
        log_nas_message(
            Direction::Rx,
            "PduSessionEstablishmentRequest",
            &transport.payload,
        );
        let psi = transport.pdu_session_id.unwrap_or(header.pdu_session_id);
        let pti = header.pti;

        let (supi, serving) = {
            let mut ctx = slot.context.lock().await;
            ctx.check(GmmEvent::SessionRequest)?;
            if ctx.sessions.contains_key(&psi) {
                warn!("UE {}: PDU session {} already active", slot.amf_ue_ngap_id, psi);
                return Ok(Step::send(session_reject(
                    &ctx,
                    psi,
                    pti,
                    SmCause::RequestRejectedUnspecified,
                )?));
            }
            let (Some(supi), Some(tai)) = (ctx.supi.clone(), ctx.tai) else {
                return Err(GmmError::Unexpected("context without identity".to_string()));
            };
            ctx.apply(GmmEvent::SessionRequest)?;
            (supi, tai.plmn)
        };

        let nf = &self.nf;
        let (supi_ref, serving_ref) = (&supi, &serving);
        let result = self
            .retry
            .call("session management subscription", move || {
                nf.fetch_session_management_subscription(supi_ref, serving_ref)
            })
            .await;
        if slot.is_released() {
            return Err(GmmError::Discarded("session management subscription"));
        }

        let mut ctx = slot.context.lock().await;
        let slices = match result {
            Ok(slices) => slices,
            Err(e) => {
                warn!("UE {}: {}", slot.amf_ue_ngap_id, e);
                return self.reject(&mut ctx, RejectCause::SubscriberDataUnavailable);
            }
        };

        let Some((s_nssai, config)) =
            select_dnn(&slices, transport.s_nssai, transport.dnn.as_deref())
        else {
            warn!(
                "UE {}: no subscribed DNN for {:?}/{:?}",
                slot.amf_ue_ngap_id, transport.s_nssai, transport.dnn
            );
            let has_active_sessions = !ctx.sessions.is_empty();
            ctx.apply(GmmEvent::SessionSetupFailed {
                has_active_sessions,
            })?;
            return Ok(Step::send(session_reject(
                &ctx,
                psi,
                pti,
                SmCause::MissingOrUnknownDnn,
            )?));
        };

        let ambr = session_ambr(config, ctx.policy.as_ref(), s_nssai);
        let session = PduSession {
            id: psi,
            pti,
            s_nssai,
            dnn: config.dnn.clone(),
            session_type: request.pdu_session_type.unwrap_or(config.pdu_session_type),
            ssc_mode: request.ssc_mode.unwrap_or(config.ssc_mode),
            ambr: SessionAmbr::from_mbps(ambr.downlink_mbps, ambr.uplink_mbps),
        };

        let accept = NasMessage::sm(
            psi,
            pti,
            SmMessage::PduSessionEstablishmentAccept(PduSessionEstablishmentAccept {
                pdu_session_type: session.session_type,
                ssc_mode: session.ssc_mode,
                qos_rules: Bytes::from_static(&DEFAULT_QOS_RULE),
                session_ambr: session.ambr,
                s_nssai: Some(s_nssai),
                dnn: Some(session.dnn.clone()),
            }),
        );
        let payload = encode_nas(&accept)?;
        log_nas_message(Direction::Tx, "PduSessionEstablishmentAccept", &payload);
        let dl = NasMessage::DlNasTransport(DlNasTransport {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload,
            pdu_session_id: Some(psi),
            cause: None,
        });
        let nas_pdu = encode_nas(&dl)?;

        let request = build_pdu_session_resource_setup_request(&PduSessionResourceSetupRequestParams {
            amf_ue_ngap_id: ctx.amf_ue_ngap_id,
            ran_ue_ngap_id: ctx.ran_ue_ngap_id,
            sessions: vec![PduSessionResourceSetupItemSuReq {
                pdu_session_id: psi,
                nas_pdu: Some(nas_pdu),
                s_nssai,
                transfer: setup_transfer(&session),
            }],
        });
        info!(
            "UE {} PDU session {} on {} {} pending radio resources",
            slot.amf_ue_ngap_id, psi, s_nssai, session.dnn
        );
        ctx.pending_session = Some(session);
        Ok(Step::send(request))
    }

    pub(super) async fn pdu_session_resource_setup_response(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        let response = parse_pdu_session_resource_setup_response(msg)?;
        let mut ctx = slot.context.lock().await;
        ctx.check(GmmEvent::SessionResourcesConfirmed)?;
        let Some(pending) = ctx.pending_session.take() else {
            return Err(GmmError::Unexpected(
                "PduSessionResourceSetupResponse without request".to_string(),
            ));
        };

        if response
            .setup
            .iter()
            .any(|item| item.pdu_session_id == pending.id)
        {
            ctx.apply(GmmEvent::SessionResourcesConfirmed)?;
            info!(
                "UE {} PDU session {} active",
                slot.amf_ue_ngap_id, pending.id
            );
            ctx.sessions.insert(pending.id, pending);
        } else {
            warn!(
                "UE {}: radio node failed PDU session {}",
                slot.amf_ue_ngap_id, pending.id
            );
            let has_active_sessions = !ctx.sessions.is_empty();
            ctx.apply(GmmEvent::SessionSetupFailed {
                has_active_sessions,
            })?;
        }
        Ok(Step::default())
    }
}

/// Requested slice and DNN when subscribed, otherwise the first subscribed
/// match for whatever the UE left out.
fn select_dnn<'a>(
    slices: &'a [SliceSubscription],
    s_nssai: Option<SNssai>,
    dnn: Option<&str>,
) -> Option<(SNssai, &'a DnnConfiguration)> {
    slices
        .iter()
        .filter(|slice| s_nssai.map_or(true, |requested| requested == slice.s_nssai))
        .find_map(|slice| {
            let config = match dnn {
                Some(dnn) => slice.dnn(dnn),
                None => slice.dnn_configurations.first(),
            };
            config.map(|config| (slice.s_nssai, config))
        })
}

/// Subscribed session AMBR capped by the SM policy for the slice and DNN.
fn session_ambr(config: &DnnConfiguration, policy: Option<&PolicyData>, s_nssai: SNssai) -> Ambr {
    let cap = policy.and_then(|p| {
        p.sm
            .iter()
            .find(|sm| sm.s_nssai == s_nssai && sm.dnn == config.dnn)
    });
    match cap {
        Some(sm) => Ambr {
            uplink_mbps: config.session_ambr.uplink_mbps.min(sm.max_session_ambr.uplink_mbps),
            downlink_mbps: config
                .session_ambr
                .downlink_mbps
                .min(sm.max_session_ambr.downlink_mbps),
        },
        None => config.session_ambr,
    }
}

/// Session resource transfer handed to the radio node: PDU session type
/// followed by the session AMBR.
fn setup_transfer(session: &PduSession) -> Bytes {
    let mut out = BytesMut::with_capacity(7);
    out.put_u8(session.session_type.into());
    out.put_slice(&session.ambr.encode());
    out.freeze()
}

fn session_reject(ctx: &UeContext, psi: u8, pti: u8, cause: SmCause) -> Result<SignalingMessage> {
    let reject = NasMessage::sm(
        psi,
        pti,
        SmMessage::PduSessionEstablishmentReject(PduSessionEstablishmentReject { cause }),
    );
    let payload = encode_nas(&reject)?;
    log_nas_message(Direction::Tx, "PduSessionEstablishmentReject", &payload);
    downlink_nas(
        ctx,
        &NasMessage::DlNasTransport(DlNasTransport {
            payload_container_type: PayloadContainerType::N1SmInformation,
            payload,
            pdu_session_id: Some(psi),
            cause: None,
        }),
    )
}

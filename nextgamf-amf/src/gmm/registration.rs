//! Registration: identity, 5G-AKA, security mode control and the
//! registration accept carried by Initial Context Setup.

use nextgamf_common::{log_nas_message, Direction, SNssai, Supi};
use nextgamf_nas::{
    decode_nas, encode_nas, AuthenticationFailure, AuthenticationRequest, AuthenticationResponse,
    MmCause, MobileIdentity, NasMessage, RegistrationAccept, SecurityModeCommand,
    SecurityModeReject, REGISTRATION_RESULT_3GPP,
};
use nextgamf_ngap::ies::UeSecurityCapabilities;
use nextgamf_ngap::procedures::{
    build_initial_context_setup_request, parse_initial_context_setup_failure,
    parse_initial_context_setup_response, parse_initial_ue_message,
    InitialContextSetupRequestParams,
};
use nextgamf_ngap::SignalingMessage;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, info, warn};

use super::security::{
    derive_amf_key, derive_gnb_key, derive_nas_keys, select_algorithms, verify_authentication,
    ABBA,
};
use super::{
    downlink_nas, Gmm, GmmError, GmmEvent, ProtocolViolation, RejectCause, Result, Step, UeState,
};
use crate::store::UeSlot;
use crate::tasks::UeMessage;

impl Gmm {
    pub(super) async fn initial_ue_message(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        let params = parse_initial_ue_message(msg)?;
        let mut ctx = slot.context.lock().await;
        ctx.check(GmmEvent::InitialRequest)?;

        let request = match decode_nas(&params.nas_pdu) {
            Ok(NasMessage::RegistrationRequest(request)) => {
                log_nas_message(Direction::Rx, "RegistrationRequest", &params.nas_pdu);
                request
            }
            Ok(other) => {
                warn!("UE {}: initial NAS is {}", slot.amf_ue_ngap_id, other.name());
                ctx.apply(GmmEvent::InitialRequest)?;
                return self.reject(&mut ctx, RejectCause::ProtocolError);
            }
            Err(e) => {
                warn!("UE {}: undecodable initial NAS: {}", slot.amf_ue_ngap_id, e);
                ctx.apply(GmmEvent::InitialRequest)?;
                return self.reject(&mut ctx, RejectCause::ProtocolError);
            }
        };

        ctx.apply(GmmEvent::InitialRequest)?;
        let tai = params.user_location_info.tai;
        ctx.tai = Some(tai);
        ctx.ue_security_capability = request.ue_security_capability;
        ctx.requested_nssai = request.requested_nssai.unwrap_or_default();

        let supi = match &request.mobile_identity {
            MobileIdentity::Suci(suci) => suci.to_supi(),
            MobileIdentity::Guti(guti) => {
                debug!("UE {} identified by unknown GUTI {}", slot.amf_ue_ngap_id, guti);
                None
            }
        };
        let Some(supi) = supi else {
            return self.reject(&mut ctx, RejectCause::IdentityUnknown);
        };
        info!(
            "UE {} registration request from {} in {}",
            slot.amf_ue_ngap_id, supi, tai
        );
        ctx.supi = Some(supi.clone());
        drop(ctx);

        let nf = &self.nf;
        let (supi_ref, serving) = (&supi, &tai.plmn);
        let result = self
            .retry
            .call("authentication vector", move || {
                nf.fetch_authentication_vector(supi_ref, serving)
            })
            .await;
        if slot.is_released() {
            return Err(GmmError::Discarded("authentication vector"));
        }

        let mut ctx = slot.context.lock().await;
        let vector = match result {
            Ok(vector) => vector,
            Err(e) => {
                warn!("UE {}: {}", slot.amf_ue_ngap_id, e);
                return self.reject(&mut ctx, RejectCause::SubscriberDataUnavailable);
            }
        };
        ctx.apply(GmmEvent::AuthVectorRetrieved)?;
        ctx.security.ngksi = 0;
        let request = NasMessage::AuthenticationRequest(AuthenticationRequest {
            ngksi: ctx.security.ngksi,
            abba: ABBA.to_vec(),
            rand: Some(vector.rand),
            autn: Some(vector.autn),
        });
        ctx.bind_auth_vector(vector);
        Ok(Step::send(downlink_nas(&ctx, &request)?))
    }

    pub(super) async fn authentication_response(
        &self,
        slot: &UeSlot,
        response: AuthenticationResponse,
    ) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        ctx.check(GmmEvent::AuthVerified)?;

        let Some(res_star) = response.res_star else {
            warn!("UE {}: Authentication Response without RES*", slot.amf_ue_ngap_id);
            ctx.take_auth_vector();
            return self.reject(&mut ctx, RejectCause::AuthenticationFailure);
        };
        if let Err(e) = verify_authentication(&mut ctx, &res_star) {
            warn!("UE {}: {}", slot.amf_ue_ngap_id, e);
            return self.reject(&mut ctx, RejectCause::AuthenticationFailure);
        }
        ctx.apply(GmmEvent::AuthVerified)?;
        if derive_amf_key(&mut ctx).is_none() {
            return self.reject(&mut ctx, RejectCause::ProtocolError);
        }

        let capability = ctx.ue_security_capability.unwrap_or_default();
        let Some((ciphering, integrity)) = select_algorithms(&capability, &self.config.security)
        else {
            return self.reject(&mut ctx, RejectCause::NoCommonAlgorithm);
        };
        ctx.security
            .set_algorithms(ciphering, integrity)
            .map_err(|e| GmmError::Unexpected(e.to_string()))?;
        if derive_nas_keys(&mut ctx).is_none() {
            warn!("UE {}: NAS keys not derivable", slot.amf_ue_ngap_id);
            return self.reject(&mut ctx, RejectCause::ProtocolError);
        }
        info!(
            "UE {} authenticated, selected {}/{}",
            slot.amf_ue_ngap_id, ciphering, integrity
        );

        let command = NasMessage::SecurityModeCommand(SecurityModeCommand {
            ciphering,
            integrity,
            ngksi: ctx.security.ngksi,
            replayed_ue_security_capability: capability,
        });
        let step = Step::send(downlink_nas(&ctx, &command)?);
        let supi = ctx.supi.clone();
        drop(ctx);

        if let Some(supi) = supi {
            self.take_over_supi(slot, &supi).await;
        }
        Ok(step)
    }

    /// Binds a SUPI proven by 5G-AKA to this context and tells the context
    /// that held it before to release itself.
    async fn take_over_supi(&self, slot: &UeSlot, supi: &Supi) {
        let previous = match self.store.bind_supi(slot.amf_ue_ngap_id, supi).await {
            Ok(Some(previous)) => previous,
            Ok(None) => return,
            Err(e) => {
                warn!("UE {}: cannot bind {}: {}", slot.amf_ue_ngap_id, supi, e);
                return;
            }
        };
        info!(
            "UE {} replaces context {} of {}",
            slot.amf_ue_ngap_id, previous.amf_ue_ngap_id, supi
        );
        match previous.mailbox().try_send(UeMessage::Superseded) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    "UE {}: queue full, superseding in the background",
                    previous.amf_ue_ngap_id
                );
                let (id, mailbox) = (previous.amf_ue_ngap_id, previous.mailbox().clone());
                tokio::spawn(async move {
                    if mailbox.send(UeMessage::Superseded).await.is_err() {
                        debug!("UE {} stopped before it was superseded", id);
                    }
                });
            }
            Err(TrySendError::Closed(_)) => {
                warn!(
                    "UE {}: worker gone, dropping superseded context",
                    previous.amf_ue_ngap_id
                );
                if let Err(e) = self.store.release(previous.amf_ue_ngap_id).await {
                    debug!("UE {}: {}", previous.amf_ue_ngap_id, e);
                }
            }
        }
    }

    pub(super) async fn authentication_failure(
        &self,
        slot: &UeSlot,
        failure: AuthenticationFailure,
    ) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        if ctx.state() != UeState::AuthenticationPending {
            return Err(ProtocolViolation {
                state: ctx.state(),
                event: GmmEvent::AuthVerified,
            }
            .into());
        }
        warn!(
            "UE {} rejected the network: {:?}",
            slot.amf_ue_ngap_id, failure.cause
        );
        ctx.take_auth_vector();
        self.reject(&mut ctx, RejectCause::AuthenticationFailure)
    }

    pub(super) async fn security_mode_complete(&self, slot: &UeSlot) -> Result<Step> {
        let (supi, serving) = {
            let mut ctx = slot.context.lock().await;
            ctx.check(GmmEvent::SecurityModeComplete)?;
            let (Some(supi), Some(tai)) = (ctx.supi.clone(), ctx.tai) else {
                return Err(GmmError::Unexpected("context without identity".to_string()));
            };
            ctx.apply(GmmEvent::SecurityModeComplete)?;
            ctx.awaiting_context_setup = true;
            (supi, tai.plmn)
        };

        let nf = &self.nf;
        let (supi_ref, serving_ref) = (&supi, &serving);
        let mobility = self
            .retry
            .call("mobility subscription", move || {
                nf.fetch_mobility_subscription(supi_ref, serving_ref)
            })
            .await;
        let policy = match &mobility {
            Ok(_) => {
                self.retry
                    .call("policy data", move || nf.fetch_policy_data(supi_ref))
                    .await
            }
            Err(e) => Err(e.clone()),
        };
        if slot.is_released() {
            return Err(GmmError::Discarded("subscription data"));
        }

        let mut ctx = slot.context.lock().await;
        let (mobility, policy) = match (mobility, policy) {
            (Ok(mobility), Ok(policy)) => (mobility, policy),
            (Err(e), _) | (_, Err(e)) => {
                warn!("UE {}: {}", slot.amf_ue_ngap_id, e);
                ctx.awaiting_context_setup = false;
                return self.reject(&mut ctx, RejectCause::SubscriberDataUnavailable);
            }
        };

        let allowed_nssai = allowed_nssai(&ctx.requested_nssai, &mobility.nssai);
        let guti = self.allocate_guti();
        let kgnb = derive_gnb_key(&mut ctx)
            .ok_or_else(|| GmmError::Unexpected("security context without KAMF".to_string()))?;

        let accept = NasMessage::RegistrationAccept(RegistrationAccept {
            registration_result: REGISTRATION_RESULT_3GPP,
            guti,
            allowed_nssai: Some(allowed_nssai.clone()),
        });
        let nas_pdu = encode_nas(&accept)?;
        log_nas_message(Direction::Tx, "RegistrationAccept", &nas_pdu);

        let capability = ctx.ue_security_capability.unwrap_or_default();
        let request = build_initial_context_setup_request(&InitialContextSetupRequestParams {
            amf_ue_ngap_id: ctx.amf_ue_ngap_id,
            ran_ue_ngap_id: ctx.ran_ue_ngap_id,
            guami: guti.map(|g| g.guami).unwrap_or_default(),
            allowed_nssai: allowed_nssai.clone(),
            ue_security_capabilities: UeSecurityCapabilities::from_algorithms(
                &capability.ciphering_algorithms(),
                &capability.integrity_algorithms(),
            ),
            security_key: kgnb,
            nas_pdu: Some(nas_pdu),
        });

        debug!(
            "UE {} policy: {:?}",
            slot.amf_ue_ngap_id,
            policy.am.as_ref().map(|am| am.rfsp_index)
        );
        ctx.guti = guti;
        ctx.allowed_nssai = allowed_nssai;
        ctx.mobility = Some(mobility);
        ctx.policy = Some(policy);
        Ok(Step::send(request))
    }

    pub(super) async fn security_mode_reject(
        &self,
        slot: &UeSlot,
        reject: SecurityModeReject,
    ) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        ctx.check(GmmEvent::SecurityModeComplete)?;
        warn!(
            "UE {} rejected security mode: {:?}",
            slot.amf_ue_ngap_id, reject.cause
        );
        let cause = match reject.cause {
            MmCause::UeSecurityCapabilitiesMismatch => RejectCause::NoCommonAlgorithm,
            _ => RejectCause::ProtocolError,
        };
        self.reject(&mut ctx, cause)
    }

    pub(super) async fn registration_complete(&self, slot: &UeSlot) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        ctx.apply(GmmEvent::RegistrationComplete)?;
        match &ctx.guti {
            Some(guti) => info!("UE {} registered as {}", slot.amf_ue_ngap_id, guti),
            None => info!("UE {} registered", slot.amf_ue_ngap_id),
        }
        Ok(Step::default())
    }

    pub(super) async fn initial_context_setup_response(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        parse_initial_context_setup_response(msg)?;
        let mut ctx = slot.context.lock().await;
        if !ctx.awaiting_context_setup {
            return Err(GmmError::Unexpected(
                "InitialContextSetupResponse without request".to_string(),
            ));
        }
        ctx.apply(GmmEvent::ContextSetupComplete)?;
        ctx.awaiting_context_setup = false;
        debug!("UE {} context set up at the radio node", slot.amf_ue_ngap_id);
        Ok(Step::default())
    }

    pub(super) async fn initial_context_setup_failure(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        let params = parse_initial_context_setup_failure(msg)?;
        let mut ctx = slot.context.lock().await;
        if !ctx.awaiting_context_setup {
            return Err(GmmError::Unexpected(
                "InitialContextSetupFailure without request".to_string(),
            ));
        }
        warn!(
            "UE {} initial context setup failed: {}",
            slot.amf_ue_ngap_id, params.cause
        );
        ctx.awaiting_context_setup = false;
        self.reject(&mut ctx, RejectCause::ProtocolError)
    }
}

/// Requested slices that are subscribed; all subscribed defaults when the
/// UE asked for none of them.
fn allowed_nssai(requested: &[SNssai], subscribed: &[SNssai]) -> Vec<SNssai> {
    let allowed: Vec<SNssai> = requested
        .iter()
        .filter(|s| subscribed.contains(s))
        .copied()
        .collect();
    if allowed.is_empty() {
        subscribed.to_vec()
    } else {
        allowed
    }
}

//! Deregistration and UE context release

use nextgamf_nas::{DeregistrationAcceptUeOriginating, DeregistrationRequestUeOriginating, NasMessage};
use nextgamf_ngap::ies::{NasCause, RadioNetworkCause};
use nextgamf_ngap::procedures::{parse_ue_context_release_complete, parse_ue_context_release_request};
use nextgamf_ngap::{Cause, SignalingMessage};
use tracing::{debug, info, warn};

use super::{downlink_nas, release_command, Gmm, GmmEvent, RejectCause, Result, Step};
use crate::store::UeSlot;

impl Gmm {
    pub(super) async fn deregistration_request(
        &self,
        slot: &UeSlot,
        request: DeregistrationRequestUeOriginating,
    ) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        ctx.apply(GmmEvent::Release)?;
        info!(
            "UE {} deregistering{}",
            slot.amf_ue_ngap_id,
            if request.switch_off { " (switch off)" } else { "" }
        );

        let mut step = Step::default();
        if !request.switch_off {
            step.downlink.push(downlink_nas(
                &ctx,
                &NasMessage::DeregistrationAcceptUeOriginating(DeregistrationAcceptUeOriginating),
            )?);
        }
        step.downlink
            .push(release_command(&ctx, Cause::Nas(NasCause::Deregister)));
        Ok(step)
    }

    pub(super) async fn release_request(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        let request = parse_ue_context_release_request(msg)?;
        let mut ctx = slot.context.lock().await;
        ctx.apply(GmmEvent::Release)?;
        info!(
            "UE {} release requested by radio node: {}",
            slot.amf_ue_ngap_id, request.cause
        );
        Ok(Step::send(release_command(&ctx, request.cause)))
    }

    pub(super) async fn release_complete(
        &self,
        slot: &UeSlot,
        msg: &SignalingMessage,
    ) -> Result<Step> {
        parse_ue_context_release_complete(msg)?;
        let mut ctx = slot.context.lock().await;
        if !ctx.state().is_terminal() {
            ctx.apply(GmmEvent::Release)?;
        }
        debug!("UE {} release complete", slot.amf_ue_ngap_id);
        Ok(Step::finished())
    }

    pub(super) async fn association_lost(&self, slot: &UeSlot) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        if !ctx.state().is_terminal() {
            ctx.apply(GmmEvent::TransportLost)?;
            info!("UE {} lost with its association", slot.amf_ue_ngap_id);
        }
        Ok(Step::finished())
    }

    /// A newer registration took over this UE's SUPI.
    pub(super) async fn superseded(&self, slot: &UeSlot) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        if ctx.state().is_terminal() {
            return Ok(Step::default());
        }
        ctx.apply(GmmEvent::Release)?;
        info!("UE {} superseded by a newer context", slot.amf_ue_ngap_id);
        Ok(Step::send(release_command(
            &ctx,
            Cause::RadioNetwork(RadioNetworkCause::ReleaseDueTo5gcGeneratedReason),
        )))
    }

    /// Fired by the UE worker when the awaited response did not arrive in
    /// time. A context already terminal is cleaned up without further
    /// signalling.
    pub async fn procedure_timeout(&self, slot: &UeSlot) -> Result<Step> {
        let mut ctx = slot.context.lock().await;
        if ctx.state().is_terminal() {
            debug!("UE {} release not confirmed, dropping context", slot.amf_ue_ngap_id);
            return Ok(Step::finished());
        }
        let state = ctx.state();
        ctx.apply(GmmEvent::ProcedureTimeout)?;
        ctx.release_cause = Some(RejectCause::ProcedureTimeout);
        ctx.pending_session = None;
        ctx.awaiting_context_setup = false;
        warn!("UE {} timed out in {}", slot.amf_ue_ngap_id, state);
        Ok(Step::send(release_command(
            &ctx,
            RejectCause::ProcedureTimeout.ngap_cause(),
        )))
    }
}

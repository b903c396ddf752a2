//! 5G Mobility Management
//!
//! Drives one UE context through registration, authentication, security
//! mode control, initial context setup and PDU session establishment.
//!
//! # Architecture
//!
//! - `state` - the explicit `(UeState, GmmEvent)` transition table
//! - `cause` - rejection causes and their NAS/NGAP encodings
//! - `security` - RES* verification, algorithm selection, key derivation
//! - `registration`, `session`, `release` - one handler per inbound message
//!
//! Handlers run on the UE's own worker, so everything for one context is
//! serialized. Network function calls are made without holding the context
//! lock; once a call returns the handler checks whether the context was
//! released meanwhile and drops the result if so.

mod cause;
mod registration;
mod release;
pub mod security;
mod session;
mod state;

pub use cause::{NasReject, RejectCause};
pub use state::{transition, GmmEvent, ProtocolViolation, UeState};

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use nextgamf_common::{log_nas_message, AmfConfig, Direction, Guti};
use nextgamf_nas::{
    decode_nas, encode_nas, AuthenticationReject, MmCause, MmStatus, NasError, NasMessage,
    RegistrationReject,
};
use nextgamf_ngap::ies::UeNgapIds;
use nextgamf_ngap::procedures::{
    build_downlink_nas_transport, build_ue_context_release_command, DownlinkNasTransportParams,
    UeContextReleaseCommandParams,
};
use nextgamf_ngap::{Cause, MessageType, NgapError, SignalingMessage};
use thiserror::Error;
use tracing::warn;

use crate::context::UeContext;
use crate::nf::{NfFacade, RetryPolicy};
use crate::store::{UeContextStore, UeSlot};
use crate::tasks::UeMessage;

/// Errors from handling one message. The message is dropped and the
/// context state is left as it was.
#[derive(Debug, Error)]
pub enum GmmError {
    #[error(transparent)]
    Violation(#[from] ProtocolViolation),
    #[error("NGAP: {0}")]
    Ngap(#[from] NgapError),
    #[error("NAS: {0}")]
    Nas(#[from] NasError),
    #[error("unexpected {0}")]
    Unexpected(String),
    #[error("context released while waiting for {0}")]
    Discarded(&'static str),
}

pub type Result<T> = std::result::Result<T, GmmError>;

/// What handling one message produced.
#[derive(Debug, Default)]
pub struct Step {
    /// NGAP messages for the radio node, in order
    pub downlink: Vec<SignalingMessage>,
    /// The context is gone and its worker should stop
    pub finished: bool,
}

impl Step {
    fn send(message: SignalingMessage) -> Self {
        Self {
            downlink: vec![message],
            finished: false,
        }
    }

    fn finished() -> Self {
        Self {
            downlink: Vec::new(),
            finished: true,
        }
    }
}

/// Mobility management procedures shared by every UE worker.
pub struct Gmm {
    config: Arc<AmfConfig>,
    nf: Arc<dyn NfFacade>,
    store: Arc<UeContextStore>,
    retry: RetryPolicy,
    next_tmsi: AtomicU32,
}

impl Gmm {
    pub fn new(config: Arc<AmfConfig>, nf: Arc<dyn NfFacade>, store: Arc<UeContextStore>) -> Self {
        let retry = RetryPolicy::new(&config.nf.retry, config.timers.procedure_timeout());
        Self {
            config,
            nf,
            store,
            retry,
            next_tmsi: AtomicU32::new(1),
        }
    }

    pub fn config(&self) -> &AmfConfig {
        &self.config
    }

    /// Handles one message for the context in `slot`.
    ///
    /// NGAP still queued for a context that already left the store is
    /// dropped; only the release notifications are handled then.
    pub async fn handle(&self, slot: &UeSlot, message: UeMessage) -> Result<Step> {
        match message {
            UeMessage::Ngap(msg) if slot.is_released() => {
                Err(GmmError::Discarded(msg.message_type.name()))
            }
            UeMessage::Ngap(msg) => self.handle_ngap(slot, msg).await,
            UeMessage::AssociationLost => self.association_lost(slot).await,
            UeMessage::Superseded => self.superseded(slot).await,
        }
    }

    async fn handle_ngap(&self, slot: &UeSlot, msg: SignalingMessage) -> Result<Step> {
        match msg.message_type {
            MessageType::InitialUeMessage => self.initial_ue_message(slot, &msg).await,
            MessageType::UplinkNasTransport => self.uplink_nas_transport(slot, &msg).await,
            MessageType::InitialContextSetupResponse => {
                self.initial_context_setup_response(slot, &msg).await
            }
            MessageType::InitialContextSetupFailure => {
                self.initial_context_setup_failure(slot, &msg).await
            }
            MessageType::PduSessionResourceSetupResponse => {
                self.pdu_session_resource_setup_response(slot, &msg).await
            }
            MessageType::UeContextReleaseRequest => self.release_request(slot, &msg).await,
            MessageType::UeContextReleaseComplete => self.release_complete(slot, &msg).await,
            other => Err(GmmError::Unexpected(other.name().to_string())),
        }
    }

    async fn uplink_nas_transport(&self, slot: &UeSlot, msg: &SignalingMessage) -> Result<Step> {
        let params = nextgamf_ngap::procedures::parse_uplink_nas_transport(msg)?;
        let nas = match decode_nas(&params.nas_pdu) {
            Ok(nas) => nas,
            Err(e) => {
                warn!("UE {}: undecodable uplink NAS: {}", slot.amf_ue_ngap_id, e);
                let status = NasMessage::MmStatus(MmStatus {
                    cause: status_cause(&e),
                });
                let ctx = slot.context.lock().await;
                return Ok(Step::send(downlink_nas(&ctx, &status)?));
            }
        };
        log_nas_message(Direction::Rx, &nas.name(), &params.nas_pdu);
        match nas {
            NasMessage::AuthenticationResponse(m) => self.authentication_response(slot, m).await,
            NasMessage::AuthenticationFailure(m) => self.authentication_failure(slot, m).await,
            NasMessage::SecurityModeComplete(_) => self.security_mode_complete(slot).await,
            NasMessage::SecurityModeReject(m) => self.security_mode_reject(slot, m).await,
            NasMessage::RegistrationComplete(_) => self.registration_complete(slot).await,
            NasMessage::UlNasTransport(m) => self.ul_nas_transport(slot, m).await,
            NasMessage::DeregistrationRequestUeOriginating(m) => {
                self.deregistration_request(slot, m).await
            }
            other => Err(GmmError::Unexpected(other.name())),
        }
    }

    fn allocate_guti(&self) -> Option<Guti> {
        let guami = *self.config.served_guami.first()?;
        let tmsi = self.next_tmsi.fetch_add(1, Ordering::Relaxed);
        Some(Guti { guami, tmsi })
    }

    /// Moves the context to `Rejected`, then tells the UE (when it is
    /// listening) and asks the radio node to release it.
    fn reject(&self, ctx: &mut UeContext, cause: RejectCause) -> Result<Step> {
        ctx.apply(GmmEvent::Reject(cause))?;
        warn!("UE {} rejected: {}", ctx.amf_ue_ngap_id, cause);

        let mut step = Step::default();
        match cause.nas_reject() {
            Some(NasReject::Registration(mm_cause)) => {
                step.downlink.push(downlink_nas(
                    ctx,
                    &NasMessage::RegistrationReject(RegistrationReject { cause: mm_cause }),
                )?);
            }
            Some(NasReject::Authentication) => {
                step.downlink.push(downlink_nas(
                    ctx,
                    &NasMessage::AuthenticationReject(AuthenticationReject),
                )?);
            }
            None => {}
        }
        step.downlink.push(release_command(ctx, cause.ngap_cause()));
        Ok(step)
    }
}

/// 5GMM cause reported back for an uplink NAS message that failed to decode.
fn status_cause(err: &NasError) -> MmCause {
    match err {
        NasError::UnknownMessageType(_) => MmCause::MessageTypeNonExistent,
        _ => MmCause::InvalidMandatoryInformation,
    }
}

/// Wraps a NAS message into a Downlink NAS Transport for the context.
fn downlink_nas(ctx: &UeContext, nas: &NasMessage) -> Result<SignalingMessage> {
    let nas_pdu = encode_nas(nas)?;
    log_nas_message(Direction::Tx, &nas.name(), &nas_pdu);
    Ok(build_downlink_nas_transport(&DownlinkNasTransportParams {
        amf_ue_ngap_id: ctx.amf_ue_ngap_id,
        ran_ue_ngap_id: ctx.ran_ue_ngap_id,
        nas_pdu,
    }))
}

fn release_command(ctx: &UeContext, cause: Cause) -> SignalingMessage {
    build_ue_context_release_command(&UeContextReleaseCommandParams {
        ue_ngap_ids: UeNgapIds::Pair {
            amf_ue_ngap_id: ctx.amf_ue_ngap_id,
            ran_ue_ngap_id: ctx.ran_ue_ngap_id,
        },
        cause,
    })
}

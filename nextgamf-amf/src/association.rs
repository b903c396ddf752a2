//! Association task
//!
//! One task per radio node association. It decodes inbound NGAP, answers NG
//! Setup, and hands UE-associated messages to the owning UE worker,
//! spawning the worker on the first Initial UE Message of a context.
//!
//! # Message Flow
//!
//! ```text
//! SCTP Task --Pdu/Down--> Association Task --UeMessage--> UE Task
//!     ^                         |                            |
//!     +-------- SctpMessage ----+----------------------------+
//! ```
//!
//! Only the SctpMessage edges wait for queue space. Inbound hops use
//! `try_send`, so no cycle of full queues can stall the tasks.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, error, info, warn};

use nextgamf_common::{log_ngap_message, Direction};
use nextgamf_ngap::codec::{peek_pdu_type, peek_procedure};
use nextgamf_ngap::ies::{MiscCause, PlmnSupportItem, ProtocolCause, TimeToWait};
use nextgamf_ngap::procedures::{
    build_error_indication, build_ng_setup_failure, build_ng_setup_response,
    cause_for_decode_error, error_indication_unknown_ue, error_indication_wrong_state,
    parse_ng_setup_request, ErrorIndicationParams, NgSetupFailureParams, NgSetupResponseParams,
};
use nextgamf_ngap::{
    Cause, DecodeError, MessageType, PduType, ProcedureCode, SignalingMessage,
};

use crate::event::AmfEvent;
use crate::store::{Lookup, StoreError, UeSlot};
use crate::tasks::{
    AmfTaskBase, AssociationInfo, AssociationMessage, SctpMessage, Task, TaskMessage, UeMessage,
    NON_UE_STREAM, UE_STREAM,
};
use crate::ue_task::UeTask;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    /// Association up, NG Setup not yet accepted
    WaitingSetup,
    Ready,
}

/// Task serving one radio node association.
pub struct AssociationTask {
    base: AmfTaskBase,
    info: AssociationInfo,
    state: AssociationState,
    ran_node_name: Option<String>,
}

impl AssociationTask {
    pub fn new(base: AmfTaskBase, info: AssociationInfo) -> Self {
        Self {
            base,
            info,
            state: AssociationState::WaitingSetup,
            ran_node_name: None,
        }
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    async fn handle_pdu(&mut self, stream: u16, data: Bytes) {
        let msg = match nextgamf_ngap::decode(&data) {
            Ok(msg) => msg,
            Err(e) => {
                self.handle_decode_error(&data, &e).await;
                return;
            }
        };
        log_ngap_message(Direction::Rx, msg.message_type.name(), &data);
        debug!(
            "Association {}: {} on stream {}",
            self.info.association_id,
            msg.message_type.name(),
            stream
        );

        match msg.message_type {
            MessageType::NgSetupRequest => self.handle_ng_setup(&msg).await,
            MessageType::ErrorIndication => {
                warn!(
                    "Association {}: Error Indication from radio node, cause {:?}",
                    self.info.association_id,
                    msg.cause()
                );
            }
            _ if self.state != AssociationState::Ready => {
                warn!(
                    "Association {}: {} before NG Setup",
                    self.info.association_id,
                    msg.message_type.name()
                );
                if msg.message_type.pdu_type() == PduType::InitiatingMessage {
                    self.send(&error_indication_wrong_state(
                        msg.amf_ue_ngap_id(),
                        msg.ran_ue_ngap_id(),
                    ))
                    .await;
                }
            }
            MessageType::InitialUeMessage => self.handle_initial_ue_message(msg).await,
            _ if msg.is_ue_associated() => self.route_to_ue(msg).await,
            other => {
                warn!(
                    "Association {}: unhandled {}",
                    self.info.association_id,
                    other.name()
                );
            }
        }
    }

    /// Malformed initiating messages are answered with an Error Indication,
    /// except Error Indications themselves.
    async fn handle_decode_error(&self, data: &[u8], err: &DecodeError) {
        warn!(
            "Association {}: undecodable NGAP PDU ({} bytes): {}",
            self.info.association_id,
            data.len(),
            err
        );
        let initiating = peek_pdu_type(data) == Some(PduType::InitiatingMessage);
        if initiating && peek_procedure(data) != Some(ProcedureCode::ErrorIndication) {
            self.send(&build_error_indication(&ErrorIndicationParams {
                cause: Some(cause_for_decode_error(err)),
                ..Default::default()
            }))
            .await;
        }
    }

    async fn handle_ng_setup(&mut self, msg: &SignalingMessage) {
        let config = &self.base.config;
        let request = match parse_ng_setup_request(msg) {
            Ok(request) => request,
            Err(e) => {
                warn!("Association {}: bad NG Setup Request: {}", self.info.association_id, e);
                self.send(&build_ng_setup_failure(&NgSetupFailureParams {
                    cause: Cause::Protocol(ProtocolCause::SemanticError),
                    time_to_wait: None,
                }))
                .await;
                return;
            }
        };

        let served = request
            .broadcast_plmns()
            .any(|plmn| config.supports_plmn(&plmn));
        if served {
            let response = build_ng_setup_response(&NgSetupResponseParams {
                amf_name: config.amf_name.clone(),
                served_guami_list: config.served_guami.clone(),
                relative_amf_capacity: config.relative_capacity,
                plmn_support_list: config
                    .plmn_support
                    .iter()
                    .map(|p| PlmnSupportItem {
                        plmn: p.plmn,
                        slice_support_list: p.s_nssai.clone(),
                    })
                    .collect(),
            });
            self.state = AssociationState::Ready;
            self.ran_node_name = request.ran_node_name.clone();
            info!(
                "NG Setup accepted for {} (gNB {:#x}) on association {}",
                request.ran_node_name.as_deref().unwrap_or("unnamed radio node"),
                request.global_ran_node_id.gnb_id,
                self.info.association_id
            );
            self.send(&response).await;
        } else {
            warn!(
                "NG Setup rejected on association {}: no served PLMN among {:?}",
                self.info.association_id,
                request.broadcast_plmns().collect::<Vec<_>>()
            );
            self.send(&build_ng_setup_failure(&NgSetupFailureParams {
                cause: Cause::Misc(MiscCause::UnknownPlmnOrSnpn),
                time_to_wait: Some(TimeToWait::V5s),
            }))
            .await;
        }

        self.base.publish(AmfEvent::NgSetup {
            association_id: self.info.association_id,
            accepted: served,
            ran_node_name: request.ran_node_name,
        });
    }

    async fn handle_initial_ue_message(&mut self, msg: SignalingMessage) {
        let Some(ran_ue_ngap_id) = msg.ran_ue_ngap_id() else {
            return;
        };
        let lookup = self
            .base
            .store
            .get_or_create(self.info.association_id, ran_ue_ngap_id, msg.amf_ue_ngap_id())
            .await;
        let slot = match lookup {
            Ok(Lookup::Created(slot, rx)) => {
                let mut task = UeTask::new(self.base.clone(), slot.clone());
                tokio::spawn(async move { task.run(rx).await });
                slot
            }
            Ok(Lookup::Existing(slot)) => slot,
            Err(StoreError::Exhausted) => {
                error!("No free AMF UE NGAP ID for RAN UE {}", ran_ue_ngap_id);
                self.send(&build_error_indication(&ErrorIndicationParams {
                    amf_ue_ngap_id: None,
                    ran_ue_ngap_id: Some(ran_ue_ngap_id),
                    cause: Some(Cause::Misc(MiscCause::ControlProcessingOverload)),
                }))
                .await;
                return;
            }
            Err(e) => {
                warn!("Initial UE Message for RAN UE {}: {}", ran_ue_ngap_id, e);
                return;
            }
        };
        self.deliver(&slot, msg).await;
    }

    async fn route_to_ue(&mut self, msg: SignalingMessage) {
        let amf_ue_ngap_id = msg.amf_ue_ngap_id();
        let ran_ue_ngap_id = msg.ran_ue_ngap_id();
        let slot = match amf_ue_ngap_id {
            Some(id) => self.base.store.get(id).await.ok(),
            None => None,
        };
        let slot = slot.filter(|slot| {
            slot.association_id == self.info.association_id
                && ran_ue_ngap_id.map_or(true, |id| id == slot.ran_ue_ngap_id)
        });

        match slot {
            Some(slot) => self.deliver(&slot, msg).await,
            None => {
                warn!(
                    "Association {}: {} for unknown UE (AMF {:?}, RAN {:?})",
                    self.info.association_id,
                    msg.message_type.name(),
                    amf_ue_ngap_id,
                    ran_ue_ngap_id
                );
                self.send(&error_indication_unknown_ue(amf_ue_ngap_id, ran_ue_ngap_id))
                    .await;
            }
        }
    }

    /// Queues `msg` for the UE worker without waiting on it. A full queue
    /// drops the message and reports overload to the radio node.
    async fn deliver(&self, slot: &UeSlot, msg: SignalingMessage) {
        let message_type = msg.message_type;
        match slot.mailbox().try_send(UeMessage::Ngap(msg)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                warn!(
                    "UE {}: queue full, dropping {}",
                    slot.amf_ue_ngap_id,
                    message_type.name()
                );
                self.send(&build_error_indication(&ErrorIndicationParams {
                    amf_ue_ngap_id: Some(slot.amf_ue_ngap_id),
                    ran_ue_ngap_id: Some(slot.ran_ue_ngap_id),
                    cause: Some(Cause::Misc(MiscCause::ControlProcessingOverload)),
                }))
                .await;
            }
            Err(TrySendError::Closed(_)) => {
                warn!("UE {} worker is gone", slot.amf_ue_ngap_id);
            }
        }
    }

    async fn handle_down(&mut self, reason: &str) {
        info!(
            "Association {} from {} down: {}",
            self.info.association_id, self.info.remote_addr, reason
        );
        let slots = self
            .base
            .store
            .release_association(self.info.association_id)
            .await;
        if !slots.is_empty() {
            info!("Releasing {} UE context(s)", slots.len());
        }
        for slot in slots {
            if slot.mailbox().send(UeMessage::AssociationLost).await.is_err() {
                debug!("UE {} worker already stopped", slot.amf_ue_ngap_id);
            }
        }
        self.base.publish(AmfEvent::AssociationDown {
            association_id: self.info.association_id,
        });
    }

    async fn send(&self, msg: &SignalingMessage) {
        let data = match nextgamf_ngap::encode(msg) {
            Ok(data) => data,
            Err(e) => {
                error!("Failed to encode {}: {}", msg.message_type.name(), e);
                return;
            }
        };
        log_ngap_message(Direction::Tx, msg.message_type.name(), &data);
        let stream = if msg.is_ue_associated() {
            UE_STREAM
        } else {
            NON_UE_STREAM
        };
        let send = SctpMessage::Send {
            association_id: self.info.association_id,
            stream,
            data,
        };
        if self.base.sctp_tx.send(send).await.is_err() {
            warn!("SCTP task gone");
        }
    }
}

#[async_trait::async_trait]
impl Task for AssociationTask {
    type Message = AssociationMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!(
            "Association {} task started for {}",
            self.info.association_id, self.info.remote_addr
        );

        while let Some(msg) = rx.recv().await {
            match msg {
                TaskMessage::Message(AssociationMessage::Pdu { stream, data }) => {
                    self.handle_pdu(stream, data).await;
                }
                TaskMessage::Message(AssociationMessage::Down { reason }) => {
                    self.handle_down(&reason).await;
                    break;
                }
                TaskMessage::Shutdown => break,
            }
        }

        debug!(
            "Association {} task stopped ({:?}, {})",
            self.info.association_id,
            self.state,
            self.ran_node_name.as_deref().unwrap_or("-")
        );
    }
}

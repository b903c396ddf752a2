//! Per-UE worker
//!
//! One task per UE context. It feeds the context's messages to the mobility
//! management handlers one at a time, ships the resulting downlink NGAP to
//! the SCTP task, publishes state changes and supervises every wait on the
//! UE or radio node with the procedure timer.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use nextgamf_common::{log_ngap_message, Direction};
use nextgamf_ngap::SignalingMessage;

use crate::context::UeContext;
use crate::event::AmfEvent;
use crate::gmm::{self, GmmError, Step, UeState};
use crate::store::{StoreError, UeSlot};
use crate::tasks::{AmfTaskBase, SctpMessage, Task, TaskMessage, UeMessage, UE_STREAM};

/// Worker driving one UE context.
pub struct UeTask {
    base: AmfTaskBase,
    slot: Arc<UeSlot>,
    last_state: UeState,
    /// When the current wait expires
    deadline: Option<Instant>,
    /// Wait the deadline was armed for
    armed_for: Option<(UeState, bool)>,
}

impl UeTask {
    pub fn new(base: AmfTaskBase, slot: Arc<UeSlot>) -> Self {
        Self {
            base,
            slot,
            last_state: UeState::Idle,
            deadline: None,
            armed_for: None,
        }
    }

    /// Applies the outcome of one handler call. Returns true when the
    /// context is gone.
    async fn process(&mut self, result: gmm::Result<Step>) -> bool {
        match result {
            Ok(step) => {
                for msg in &step.downlink {
                    self.send_downlink(msg).await;
                }
                self.observe().await;
                if step.finished {
                    self.finish().await;
                    return true;
                }
            }
            Err(GmmError::Discarded(what)) => {
                debug!("UE {}: dropped late {}", self.slot.amf_ue_ngap_id, what);
            }
            Err(e) => {
                warn!("UE {}: message dropped: {}", self.slot.amf_ue_ngap_id, e);
            }
        }
        false
    }

    async fn send_downlink(&self, msg: &SignalingMessage) {
        let data = match nextgamf_ngap::encode(msg) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    "UE {}: failed to encode {}: {}",
                    self.slot.amf_ue_ngap_id,
                    msg.message_type.name(),
                    e
                );
                return;
            }
        };
        log_ngap_message(Direction::Tx, msg.message_type.name(), &data);
        let send = SctpMessage::Send {
            association_id: self.slot.association_id,
            stream: UE_STREAM,
            data,
        };
        if self.base.sctp_tx.send(send).await.is_err() {
            warn!("UE {}: SCTP task gone", self.slot.amf_ue_ngap_id);
        }
    }

    /// Publishes state changes and re-arms the procedure timer when the
    /// context starts waiting on something new.
    async fn observe(&mut self) {
        let ctx = self.slot.context.lock().await;
        let state = ctx.state();
        if state != self.last_state {
            self.last_state = state;
            self.base.publish(AmfEvent::UeStateChanged {
                amf_ue_ngap_id: ctx.amf_ue_ngap_id,
                association_id: ctx.association_id,
                state,
                cause: ctx.terminal_cause(),
            });
        }

        let wait = (state, ctx.awaiting_context_setup);
        if self.armed_for != Some(wait) {
            self.armed_for = Some(wait);
            self.deadline = is_waiting(&ctx)
                .then(|| Instant::now() + self.base.config.timers.procedure_timeout());
        }
    }

    async fn finish(&mut self) {
        let id = self.slot.amf_ue_ngap_id;
        match self.base.store.release(id).await {
            Ok(_) | Err(StoreError::NotFound(_)) => {}
            Err(e) => warn!("UE {}: {}", id, e),
        }
        self.deadline = None;
        self.base.publish(AmfEvent::UeContextRemoved { amf_ue_ngap_id: id });
        info!("UE {} context removed", id);
    }
}

/// Whether the context is blocked on the UE or the radio node.
fn is_waiting(ctx: &UeContext) -> bool {
    match ctx.state() {
        UeState::AuthenticationPending | UeState::SecurityActivated | UeState::SessionEstablishing => {
            true
        }
        UeState::Registered => ctx.awaiting_context_setup,
        // release complete outstanding
        state => state.is_terminal(),
    }
}

#[async_trait::async_trait]
impl Task for UeTask {
    type Message = UeMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        debug!("UE {} worker started", self.slot.amf_ue_ngap_id);

        loop {
            let deadline = self.deadline;
            tokio::select! {
                msg = rx.recv() => {
                    match msg {
                        Some(TaskMessage::Message(msg)) => {
                            let result = self.base.gmm.handle(&self.slot, msg).await;
                            if self.process(result).await {
                                break;
                            }
                        }
                        Some(TaskMessage::Shutdown) | None => break,
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.deadline = None;
                    let result = self.base.gmm.procedure_timeout(&self.slot).await;
                    if self.process(result).await {
                        break;
                    }
                }
            }
        }

        debug!("UE {} worker stopped", self.slot.amf_ue_ngap_id);
    }
}

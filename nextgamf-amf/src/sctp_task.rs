//! SCTP Task Implementation
//!
//! Owns the listening [`SctpServer`]. Each new association gets its own
//! [`AssociationTask`]; received NGAP PDUs are routed to it, and
//! [`SctpMessage`]s from the other tasks are written to the wire.
//!
//! # Message Flow
//!
//! ```text
//! gNB <--SCTP--> SCTP Task <--Channel--> Association Task(s)
//! ```
//!
//! The task never waits on an association queue: it is the only consumer
//! of the outbound queue the associations and UE workers wait on.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tracing::{debug, error, info, warn};

use nextgamf_sctp::{SctpConfig, SctpServer, ServerError, ServerEvent, NGAP_PPID};

use crate::association::AssociationTask;
use crate::event::AmfEvent;
use crate::tasks::{
    channel, AmfTaskBase, AssociationInfo, AssociationMessage, SctpMessage, Task, TaskHandle,
    TaskMessage, DEFAULT_CHANNEL_CAPACITY,
};

/// How long one server poll waits for a datagram before commands are
/// checked again.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// SCTP task serving all radio node associations.
pub struct SctpTask {
    base: AmfTaskBase,
    server: SctpServer,
    server_events: mpsc::UnboundedReceiver<ServerEvent>,
    associations: HashMap<u64, TaskHandle<AssociationMessage>>,
}

impl SctpTask {
    /// Binds the listener on `addr`.
    pub async fn bind(base: AmfTaskBase, addr: SocketAddr) -> Result<Self, ServerError> {
        let mut server = SctpServer::bind(addr, SctpConfig::default()).await?;
        let (event_tx, server_events) = mpsc::unbounded_channel();
        server.set_event_sender(event_tx);
        Ok(Self {
            base,
            server,
            server_events,
            associations: HashMap::new(),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    async fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::NewAssociation {
                association_id,
                remote_addr,
            } => {
                info!(
                    "New association {} from {}",
                    association_id, remote_addr
                );
                let info = AssociationInfo {
                    association_id,
                    remote_addr,
                };
                let (handle, rx) = channel(DEFAULT_CHANNEL_CAPACITY);
                let mut task = AssociationTask::new(self.base.clone(), info);
                tokio::spawn(async move { task.run(rx).await });
                self.associations.insert(association_id, handle);
                self.base.publish(AmfEvent::AssociationUp {
                    association_id,
                    remote_addr,
                });
            }
            ServerEvent::AssociationClosed {
                association_id,
                reason,
            } => {
                self.route_down(association_id, reason).await;
            }
            ServerEvent::DataReceived {
                association_id,
                message,
            } => {
                // PPID 0 is unspecified; anything else must be NGAP
                if message.ppid != NGAP_PPID && message.ppid != 0 {
                    warn!(
                        "Association {}: discarding {} bytes with PPID {}",
                        association_id,
                        message.data.len(),
                        message.ppid
                    );
                    return;
                }
                let Some(handle) = self.associations.get(&association_id) else {
                    warn!("Data for unknown association {}", association_id);
                    return;
                };
                let pdu = AssociationMessage::Pdu {
                    stream: message.stream_id,
                    data: message.data,
                };
                match handle.try_send(pdu) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        warn!("Association {} queue full, PDU dropped", association_id);
                    }
                    Err(TrySendError::Closed(_)) => {
                        warn!("Association {} task is gone", association_id);
                    }
                }
            }
        }
    }

    async fn handle_command(&mut self, msg: SctpMessage) {
        match msg {
            SctpMessage::Send {
                association_id,
                stream,
                data,
            } => {
                if let Err(e) = self.server.send(association_id, stream, &data).await {
                    warn!(
                        "Failed to send {} bytes on association {}: {}",
                        data.len(),
                        association_id,
                        e
                    );
                }
            }
            SctpMessage::Close { association_id } => {
                if let Err(e) = self.server.close_association(association_id).await {
                    warn!("Failed to close association {}: {}", association_id, e);
                }
                self.route_down(association_id, "closed by AMF".to_string())
                    .await;
            }
        }
    }

    async fn route_down(&mut self, association_id: u64, reason: String) {
        let Some(handle) = self.associations.remove(&association_id) else {
            debug!("Association {} already down", association_id);
            return;
        };
        match handle.try_send(AssociationMessage::Down { reason }) {
            Ok(()) => {}
            Err(TrySendError::Full(TaskMessage::Message(down))) => {
                // must not be lost; wait for room off this task
                tokio::spawn(async move {
                    if handle.send(down).await.is_err() {
                        debug!("Association {} task is gone", association_id);
                    }
                });
            }
            Err(_) => warn!("Association {} task is gone", association_id),
        }
    }

    /// Drains pending commands. Returns false once the task should stop.
    async fn drain_commands(&mut self, rx: &mut mpsc::Receiver<TaskMessage<SctpMessage>>) -> bool {
        loop {
            match rx.try_recv() {
                Ok(TaskMessage::Message(msg)) => self.handle_command(msg).await,
                Ok(TaskMessage::Shutdown) => {
                    info!("SCTP task received shutdown signal");
                    return false;
                }
                Err(TryRecvError::Empty) => return true,
                Err(TryRecvError::Disconnected) => {
                    info!("SCTP task channel closed");
                    return false;
                }
            }
        }
    }
}

#[async_trait::async_trait]
impl Task for SctpTask {
    type Message = SctpMessage;

    async fn run(&mut self, mut rx: mpsc::Receiver<TaskMessage<Self::Message>>) {
        info!("SCTP task started on {}", self.local_addr());

        while self.drain_commands(&mut rx).await {
            if let Err(e) = self.server.recv(POLL_INTERVAL).await {
                error!("SCTP listener failed: {}", e);
                break;
            }
            while let Ok(event) = self.server_events.try_recv() {
                self.handle_server_event(event).await;
            }
        }

        info!(
            "SCTP task shutting down, closing {} associations",
            self.associations.len()
        );
        self.server.stop();
        let ids: Vec<u64> = self.associations.keys().copied().collect();
        for id in ids {
            self.route_down(id, "AMF shutting down".to_string()).await;
        }
        info!("SCTP task stopped");
    }
}

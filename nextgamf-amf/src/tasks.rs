//! AMF Task Framework
//!
//! Actor-style tasks connected by typed channels:
//!
//! - **SCTP task**: owns the listener, turns transport events into
//!   association messages and sends outbound PDUs
//! - **Association task**: one per radio node; NG Setup, decoding, and
//!   dispatch of UE-associated messages
//! - **UE task**: one per UE context; runs the registration state machine
//!   over its own ordered queue
//!
//! Every task processes its queue until it receives `TaskMessage::Shutdown`
//! or every sender is dropped.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};

use nextgamf_common::AmfConfig;
use nextgamf_ngap::SignalingMessage;

use crate::event::AmfEvent;
use crate::gmm::Gmm;
use crate::nf::NfFacade;
use crate::store::UeContextStore;

/// Default capacity of task queues
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Capacity of the event broadcast channel
pub const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// SCTP stream for non-UE-associated signalling
pub const NON_UE_STREAM: u16 = 0;

/// SCTP stream for UE-associated signalling
pub const UE_STREAM: u16 = 1;

/// Task message envelope: a payload or a shutdown signal.
#[derive(Debug)]
pub enum TaskMessage<T> {
    Message(T),
    Shutdown,
}

impl<T> TaskMessage<T> {
    pub fn is_shutdown(&self) -> bool {
        matches!(self, TaskMessage::Shutdown)
    }

    pub fn into_message(self) -> Option<T> {
        match self {
            TaskMessage::Message(msg) => Some(msg),
            TaskMessage::Shutdown => None,
        }
    }
}

/// Sending side of a task queue.
#[derive(Debug)]
pub struct TaskHandle<T> {
    tx: mpsc::Sender<TaskMessage<T>>,
}

impl<T> Clone for TaskHandle<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> TaskHandle<T> {
    pub fn new(tx: mpsc::Sender<TaskMessage<T>>) -> Self {
        Self { tx }
    }

    pub async fn send(&self, msg: T) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Message(msg)).await
    }

    /// Sends without waiting; fails if the queue is full or closed.
    pub fn try_send(&self, msg: T) -> Result<(), mpsc::error::TrySendError<TaskMessage<T>>> {
        self.tx.try_send(TaskMessage::Message(msg))
    }

    pub async fn shutdown(&self) -> Result<(), mpsc::error::SendError<TaskMessage<T>>> {
        self.tx.send(TaskMessage::Shutdown).await
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Creates a task queue.
pub fn channel<T>(capacity: usize) -> (TaskHandle<T>, mpsc::Receiver<TaskMessage<T>>) {
    let (tx, rx) = mpsc::channel(capacity);
    (TaskHandle::new(tx), rx)
}

/// Base trait for all AMF tasks.
#[async_trait::async_trait]
pub trait Task: Send + 'static {
    type Message: Send;

    /// Processes messages until shutdown.
    async fn run(&mut self, rx: mpsc::Receiver<TaskMessage<Self::Message>>);
}

/// Messages for the SCTP task.
#[derive(Debug)]
pub enum SctpMessage {
    /// Send one encoded NGAP PDU
    Send {
        association_id: u64,
        stream: u16,
        data: Bytes,
    },
    /// Abort an association
    Close { association_id: u64 },
}

/// Messages for an association task.
#[derive(Debug)]
pub enum AssociationMessage {
    /// One received NGAP PDU
    Pdu { stream: u16, data: Bytes },
    /// The transport association is gone
    Down { reason: String },
}

/// Messages for a UE task.
#[derive(Debug)]
pub enum UeMessage {
    /// A decoded UE-associated NGAP message from the radio node
    Ngap(SignalingMessage),
    /// The owning association went down
    AssociationLost,
    /// A newer registration for the same SUPI replaces this context
    Superseded,
}

/// Remote radio node of an association task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociationInfo {
    pub association_id: u64,
    pub remote_addr: SocketAddr,
}

/// State shared by every task.
#[derive(Clone)]
pub struct AmfTaskBase {
    pub config: Arc<AmfConfig>,
    pub store: Arc<UeContextStore>,
    pub gmm: Arc<Gmm>,
    pub sctp_tx: TaskHandle<SctpMessage>,
    pub events: broadcast::Sender<AmfEvent>,
}

impl AmfTaskBase {
    pub fn new(
        config: Arc<AmfConfig>,
        nf: Arc<dyn NfFacade>,
        sctp_tx: TaskHandle<SctpMessage>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let store = Arc::new(UeContextStore::new());
        Self {
            gmm: Arc::new(Gmm::new(config.clone(), nf, store.clone())),
            store,
            config,
            sctp_tx,
            events,
        }
    }

    /// Publishes an event; having no subscriber is not an error.
    pub fn publish(&self, event: AmfEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AmfEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_task_handle_delivers_in_order() {
        let (handle, mut rx) = channel::<u32>(4);
        handle.send(1).await.unwrap();
        handle.try_send(2).unwrap();
        handle.shutdown().await.unwrap();

        assert_eq!(rx.recv().await.unwrap().into_message(), Some(1));
        assert_eq!(rx.recv().await.unwrap().into_message(), Some(2));
        assert!(rx.recv().await.unwrap().is_shutdown());
    }

    #[tokio::test]
    async fn test_handle_reports_closed_queue() {
        let (handle, rx) = channel::<u32>(1);
        drop(rx);
        assert!(handle.is_closed());
        assert!(handle.send(1).await.is_err());
    }
}

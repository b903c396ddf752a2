//! SCTP listener accepting associations from radio nodes.
//!
//! One UDP socket carries every association; `sctp-proto` demultiplexes
//! datagrams to per-association state machines. Events are reported through
//! an unbounded channel so the owning task can keep a single `select!` loop.

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, DatagramEvent, Endpoint, EndpointConfig, Event, Payload,
    ServerConfig, StreamEvent, Transmit,
};
use std::{
    collections::{HashMap, VecDeque},
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{net::UdpSocket, sync::mpsc, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::association::{ReceivedMessage, SctpConfig};
use crate::stream::{collect_readable, write_message};

/// Server errors
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Server not running")]
    NotRunning,
    #[error("Association not found: {0}")]
    AssociationNotFound(u64),
    #[error("Send error: {0}")]
    SendError(String),
}

pub type Result<T> = std::result::Result<T, ServerError>;

/// Events from the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// Handshake completed with a new radio node
    NewAssociation {
        association_id: u64,
        remote_addr: SocketAddr,
    },
    /// Association aborted, shut down or lost
    AssociationClosed { association_id: u64, reason: String },
    /// One complete message
    DataReceived {
        association_id: u64,
        message: ReceivedMessage,
    },
}

struct ManagedAssociation {
    id: u64,
    association: Association,
    remote_addr: SocketAddr,
    connected: bool,
    readable: VecDeque<u16>,
    inbox: VecDeque<ReceivedMessage>,
    pending_transmits: VecDeque<Transmit>,
}

/// SCTP server over `sctp-proto`.
pub struct SctpServer {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    associations: HashMap<AssociationHandle, ManagedAssociation>,
    id_to_handle: HashMap<u64, AssociationHandle>,
    next_association_id: u64,
    config: SctpConfig,
    event_tx: Option<mpsc::UnboundedSender<ServerEvent>>,
    recv_buf: Vec<u8>,
    running: bool,
}

impl SctpServer {
    /// Binds the listener. Failure here is the one fatal transport error.
    pub async fn bind(addr: SocketAddr, config: SctpConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        let local_addr = socket.local_addr()?;

        info!("SCTP server listening on {} (sctp-proto over UDP)", local_addr);

        let mut server_config = ServerConfig::new();
        server_config.transport = Arc::new(config.transport_config());
        let endpoint = Endpoint::new(
            Arc::new(EndpointConfig::new()),
            Some(Arc::new(server_config)),
        );

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
            endpoint,
            associations: HashMap::new(),
            id_to_handle: HashMap::new(),
            next_association_id: 1,
            config,
            event_tx: None,
            recv_buf: vec![0u8; 65536],
            running: true,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn num_associations(&self) -> usize {
        self.associations.len()
    }

    /// Set event sender for receiving server events
    pub fn set_event_sender(&mut self, tx: mpsc::UnboundedSender<ServerEvent>) {
        self.event_tx = Some(tx);
    }

    /// Waits up to `recv_timeout` for one datagram, then services timers.
    ///
    /// Returns whether a datagram was processed.
    pub async fn recv(&mut self, recv_timeout: Duration) -> Result<bool> {
        if !self.running {
            return Err(ServerError::NotRunning);
        }

        let received = match timeout(recv_timeout, self.socket.recv_from(&mut self.recv_buf)).await
        {
            Ok(Ok((len, from))) => Some((Bytes::copy_from_slice(&self.recv_buf[..len]), from)),
            Ok(Err(e)) if e.kind() == io::ErrorKind::ConnectionReset => {
                // ICMP from a vanished peer; the association timers will notice.
                debug!("Ignoring connection reset on listener socket");
                None
            }
            Ok(Err(e)) => return Err(ServerError::Io(e)),
            Err(_) => None,
        };

        let got_datagram = received.is_some();
        if let Some((data, from)) = received {
            trace!("Received {} bytes from {}", data.len(), from);
            self.handle_datagram(from, data);
        }

        self.service_associations();
        self.flush_all_transmits().await?;
        Ok(got_datagram)
    }

    fn handle_datagram(&mut self, from: SocketAddr, data: Bytes) {
        let Some((handle, event)) = self.endpoint.handle(Instant::now(), from, None, None, data)
        else {
            return;
        };

        match event {
            DatagramEvent::NewAssociation(association) => {
                let id = self.next_association_id;
                self.next_association_id += 1;
                debug!("Association handshake from {} (id: {})", from, id);
                self.associations.insert(
                    handle,
                    ManagedAssociation {
                        id,
                        association,
                        remote_addr: from,
                        connected: false,
                        readable: VecDeque::new(),
                        inbox: VecDeque::new(),
                        pending_transmits: VecDeque::new(),
                    },
                );
                self.id_to_handle.insert(id, handle);
            }
            DatagramEvent::AssociationEvent(assoc_event) => {
                if let Some(managed) = self.associations.get_mut(&handle) {
                    managed.association.handle_event(assoc_event);
                }
            }
        }
    }

    /// Drives timers and events of every association and emits server events.
    fn service_associations(&mut self) {
        let now = Instant::now();
        let accept_ppid = self.config.ppid;
        let mut events = Vec::new();
        let mut lost = Vec::new();

        for (handle, managed) in self.associations.iter_mut() {
            if let Some(deadline) = managed.association.poll_timeout() {
                if now >= deadline {
                    managed.association.handle_timeout(now);
                }
            }

            while let Some(event) = managed.association.poll() {
                match event {
                    Event::Connected => {
                        managed.connected = true;
                        info!(
                            "New SCTP association from {} (id: {})",
                            managed.remote_addr, managed.id
                        );
                        events.push(ServerEvent::NewAssociation {
                            association_id: managed.id,
                            remote_addr: managed.remote_addr,
                        });
                    }
                    Event::AssociationLost { reason } => {
                        warn!("Association {} lost: {}", managed.id, reason);
                        lost.push((*handle, reason.to_string()));
                    }
                    Event::Stream(StreamEvent::Readable { id }) => managed.readable.push_back(id),
                    Event::Stream(_) | Event::DatagramReceived => {}
                }
            }

            collect_readable(
                &mut managed.association,
                &mut managed.readable,
                accept_ppid,
                &mut managed.inbox,
            );
            while let Some(message) = managed.inbox.pop_front() {
                debug!(
                    "Received {} bytes on stream {} from association {}",
                    message.data.len(),
                    message.stream_id,
                    managed.id
                );
                events.push(ServerEvent::DataReceived {
                    association_id: managed.id,
                    message,
                });
            }

            while let Some(transmit) = managed.association.poll_transmit(now) {
                managed.pending_transmits.push_back(transmit);
            }
        }

        for (handle, reason) in lost {
            if let Some(managed) = self.associations.remove(&handle) {
                self.id_to_handle.remove(&managed.id);
                events.push(ServerEvent::AssociationClosed {
                    association_id: managed.id,
                    reason,
                });
            }
        }

        if let Some(tx) = &self.event_tx {
            for event in events {
                let _ = tx.send(event);
            }
        }
    }

    async fn flush_all_transmits(&mut self) -> Result<()> {
        let mut all: Vec<Transmit> = Vec::new();
        while let Some(transmit) = self.endpoint.poll_transmit() {
            all.push(transmit);
        }
        for managed in self.associations.values_mut() {
            all.extend(managed.pending_transmits.drain(..));
        }

        for transmit in all {
            if let Payload::RawEncode(chunks) = &transmit.payload {
                for chunk in chunks {
                    if let Err(e) = self.socket.send_to(chunk, transmit.remote).await {
                        // One unreachable peer must not stall the others.
                        warn!("Send to {} failed: {}", transmit.remote, e);
                        break;
                    }
                    trace!("Sent {} bytes to {}", chunk.len(), transmit.remote);
                }
            }
        }
        Ok(())
    }

    /// Sends one message on `stream_id` of association `association_id`.
    pub async fn send(&mut self, association_id: u64, stream_id: u16, data: &[u8]) -> Result<()> {
        let handle = *self
            .id_to_handle
            .get(&association_id)
            .ok_or(ServerError::AssociationNotFound(association_id))?;
        let managed = self
            .associations
            .get_mut(&handle)
            .ok_or(ServerError::AssociationNotFound(association_id))?;

        write_message(&mut managed.association, stream_id, data, self.config.ppid)
            .map_err(|e| ServerError::SendError(e.to_string()))?;
        debug!(
            "Queued {} bytes to association {} on stream {}",
            data.len(),
            association_id,
            stream_id
        );

        while let Some(transmit) = managed.association.poll_transmit(Instant::now()) {
            managed.pending_transmits.push_back(transmit);
        }
        self.flush_all_transmits().await
    }

    /// Aborts one association. Unknown ids are ignored.
    pub async fn close_association(&mut self, association_id: u64) -> Result<()> {
        let Some(handle) = self.id_to_handle.remove(&association_id) else {
            return Ok(());
        };
        if let Some(mut managed) = self.associations.remove(&handle) {
            let _ = managed.association.close();
            while let Some(transmit) = managed.association.poll_transmit(Instant::now()) {
                managed.pending_transmits.push_back(transmit);
            }
            let abort: Vec<Transmit> = managed.pending_transmits.drain(..).collect();
            for transmit in abort {
                if let Payload::RawEncode(chunks) = &transmit.payload {
                    for chunk in chunks {
                        let _ = self.socket.send_to(chunk, transmit.remote).await;
                    }
                }
            }
            info!("Closed association {}", association_id);
        }
        Ok(())
    }

    /// Remote address of an association
    pub fn remote_addr(&self, association_id: u64) -> Option<SocketAddr> {
        let handle = self.id_to_handle.get(&association_id)?;
        self.associations.get(handle).map(|m| m.remote_addr)
    }

    /// Aborts every association and stops accepting datagrams.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        info!("Stopping SCTP server on {}", self.local_addr);
        self.running = false;
        for (_, mut managed) in self.associations.drain() {
            let _ = managed.association.close();
        }
        self.id_to_handle.clear();
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Drop for SctpServer {
    fn drop(&mut self) {
        self.stop();
    }
}

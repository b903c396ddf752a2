//! Client-side SCTP association carrying NGAP.
//!
//! The association drives a `sctp-proto` state machine over a tokio UDP
//! socket. `send` and `recv` preserve SCTP message boundaries: one `send`
//! produces exactly one `ReceivedMessage` on the peer.

use bytes::Bytes;
use sctp_proto::{
    Association, AssociationHandle, ClientConfig, DatagramEvent, Endpoint, EndpointConfig, Event,
    Payload, StreamEvent, TransportConfig, Transmit,
};
use std::{
    collections::VecDeque,
    io,
    net::SocketAddr,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::{net::UdpSocket, time::timeout};
use tracing::{debug, info, trace, warn};

use crate::stream::{collect_readable, write_message};

/// NGAP Payload Protocol Identifier (TS 38.412)
pub const NGAP_PPID: u32 = 60;
/// Default number of SCTP streams for NGAP
pub const DEFAULT_NUM_STREAMS: u16 = 2;
/// Default maximum message size (64KB)
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65536;
/// Default receive buffer size (256KB)
pub const DEFAULT_RECEIVE_BUFFER_SIZE: u32 = 262144;

const MAX_DATAGRAM_SIZE: usize = 65536;

/// SCTP association errors
///
/// The variants keep the failure classes apart so callers can decide on
/// their own retry policy; nothing here is retried internally.
#[derive(Debug, Error)]
pub enum SctpError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("Connection refused by {0}")]
    ConnectionRefused(SocketAddr),
    #[error("Address resolution failed: {0}")]
    AddressResolution(String),
    #[error("Peer reset: {0}")]
    PeerReset(String),
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Association closed")]
    AssociationClosed,
    #[error("Stream error: {0}")]
    StreamError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl SctpError {
    /// Classifies a socket error against the peer address.
    pub(crate) fn from_io(err: io::Error, peer: SocketAddr) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => SctpError::ConnectionRefused(peer),
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                SctpError::PeerReset(err.to_string())
            }
            _ => SctpError::Io(err),
        }
    }
}

/// Result type for SCTP operations
pub type Result<T> = std::result::Result<T, SctpError>;

/// SCTP association state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssociationState {
    Closed,
    Connecting,
    Established,
    ShuttingDown,
}

/// Configuration for SCTP association
#[derive(Debug, Clone)]
pub struct SctpConfig {
    pub max_outbound_streams: u16,
    pub max_inbound_streams: u16,
    pub max_message_size: u32,
    pub max_receive_buffer_size: u32,
    pub connect_timeout: Duration,
    pub rto_initial_ms: u64,
    pub rto_min_ms: u64,
    pub rto_max_ms: u64,
    /// PPID stamped on every outbound message and required on inbound ones
    pub ppid: u32,
}

impl Default for SctpConfig {
    fn default() -> Self {
        Self {
            max_outbound_streams: DEFAULT_NUM_STREAMS,
            max_inbound_streams: DEFAULT_NUM_STREAMS,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_receive_buffer_size: DEFAULT_RECEIVE_BUFFER_SIZE,
            connect_timeout: Duration::from_secs(30),
            rto_initial_ms: 3000,
            rto_min_ms: 1000,
            rto_max_ms: 60000,
            ppid: NGAP_PPID,
        }
    }
}

impl SctpConfig {
    pub(crate) fn transport_config(&self) -> TransportConfig {
        TransportConfig::default()
            .with_max_num_outbound_streams(self.max_outbound_streams)
            .with_max_num_inbound_streams(self.max_inbound_streams)
            .with_max_message_size(self.max_message_size)
            .with_max_receive_buffer_size(self.max_receive_buffer_size)
            .with_rto_initial_ms(self.rto_initial_ms)
            .with_rto_min_ms(self.rto_min_ms)
            .with_rto_max_ms(self.rto_max_ms)
    }
}

/// One SCTP user message as delivered by the peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub stream_id: u16,
    pub data: Bytes,
    pub ppid: u32,
}

/// Resolves `host:port` to the first socket address.
pub async fn resolve(host: &str, port: u16) -> Result<SocketAddr> {
    let mut addrs = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| SctpError::AddressResolution(format!("{host}:{port}: {e}")))?;
    addrs
        .next()
        .ok_or_else(|| SctpError::AddressResolution(format!("{host}:{port}: no addresses")))
}

/// SCTP association towards one remote endpoint.
pub struct SctpAssociation {
    socket: Arc<UdpSocket>,
    remote_addr: SocketAddr,
    local_addr: SocketAddr,
    endpoint: Endpoint,
    handle: AssociationHandle,
    association: Association,
    state: AssociationState,
    pending_transmits: VecDeque<Transmit>,
    readable: VecDeque<u16>,
    inbox: VecDeque<ReceivedMessage>,
    lost_reason: Option<String>,
    recv_buf: Vec<u8>,
    config: SctpConfig,
}

impl SctpAssociation {
    /// Connects from an ephemeral local port.
    pub async fn connect(remote_addr: SocketAddr, config: SctpConfig) -> Result<Self> {
        let local_addr = if remote_addr.is_ipv6() {
            SocketAddr::from(([0u16; 8], 0))
        } else {
            SocketAddr::from(([0u8; 4], 0))
        };
        Self::connect_with_local(local_addr, remote_addr, config).await
    }

    /// Resolves `host` and connects to it.
    pub async fn connect_host(host: &str, port: u16, config: SctpConfig) -> Result<Self> {
        let remote = resolve(host, port).await?;
        Self::connect(remote, config).await
    }

    /// Connects from a specific local address and completes the handshake
    /// within `config.connect_timeout`.
    pub async fn connect_with_local(
        local_addr: SocketAddr,
        remote_addr: SocketAddr,
        config: SctpConfig,
    ) -> Result<Self> {
        info!("Connecting to SCTP endpoint at {}", remote_addr);

        let socket = UdpSocket::bind(local_addr).await?;
        let actual_local = socket.local_addr()?;
        debug!("Bound to local address: {}", actual_local);

        let mut endpoint = Endpoint::new(Arc::new(EndpointConfig::new()), None);

        let mut client_config = ClientConfig::new();
        client_config.transport = Arc::new(config.transport_config());

        let (handle, association) = endpoint
            .connect(client_config, remote_addr)
            .map_err(|e| SctpError::ConnectionFailed(e.to_string()))?;

        let mut assoc = Self {
            socket: Arc::new(socket),
            remote_addr,
            local_addr: actual_local,
            endpoint,
            handle,
            association,
            state: AssociationState::Connecting,
            pending_transmits: VecDeque::new(),
            readable: VecDeque::new(),
            inbox: VecDeque::new(),
            lost_reason: None,
            recv_buf: vec![0u8; MAX_DATAGRAM_SIZE],
            config,
        };

        assoc.perform_handshake().await?;
        Ok(assoc)
    }

    async fn perform_handshake(&mut self) -> Result<()> {
        let deadline = Instant::now() + self.config.connect_timeout;

        while self.state == AssociationState::Connecting {
            if Instant::now() > deadline {
                self.state = AssociationState::Closed;
                return Err(SctpError::Timeout("connection handshake timed out".into()));
            }

            self.poll_events();
            self.flush_transmits().await?;

            if let Some(reason) = self.lost_reason.take() {
                self.state = AssociationState::Closed;
                return Err(SctpError::ConnectionFailed(reason));
            }

            if !self.association.is_handshaking() {
                self.state = AssociationState::Established;
                info!("SCTP association established with {}", self.remote_addr);
                return Ok(());
            }

            match timeout(Duration::from_millis(100), self.handle_incoming()).await {
                Ok(Ok(())) => {}
                Ok(Err(e @ SctpError::ConnectionRefused(_))) => {
                    self.state = AssociationState::Closed;
                    return Err(e);
                }
                Ok(Err(e)) => warn!("Error handling incoming packet: {}", e),
                Err(_) => trace!("Receive timeout, continuing handshake"),
            }
        }

        Ok(())
    }

    async fn handle_incoming(&mut self) -> Result<()> {
        let (len, from) = self
            .socket
            .recv_from(&mut self.recv_buf)
            .await
            .map_err(|e| SctpError::from_io(e, self.remote_addr))?;
        let data = Bytes::copy_from_slice(&self.recv_buf[..len]);
        trace!("Received {} bytes from {}", len, from);

        if let Some((handle, event)) = self.endpoint.handle(Instant::now(), from, None, None, data) {
            if handle != self.handle {
                return Ok(());
            }
            match event {
                DatagramEvent::AssociationEvent(assoc_event) => {
                    self.association.handle_event(assoc_event);
                }
                DatagramEvent::NewAssociation(_) => {
                    debug!("Ignoring new association event (client mode)");
                }
            }
        }

        Ok(())
    }

    fn poll_events(&mut self) {
        let now = Instant::now();
        if let Some(deadline) = self.association.poll_timeout() {
            if now >= deadline {
                self.association.handle_timeout(now);
            }
        }

        while let Some(event) = self.association.poll() {
            match event {
                Event::Connected => {
                    debug!("Association connected event");
                }
                Event::AssociationLost { reason } => {
                    warn!("Association with {} lost: {}", self.remote_addr, reason);
                    self.lost_reason = Some(reason.to_string());
                }
                Event::Stream(StreamEvent::Readable { id }) => {
                    self.readable.push_back(id);
                }
                Event::Stream(other) => {
                    trace!("Stream event: {:?}", other);
                }
                Event::DatagramReceived => {}
            }
        }

        collect_readable(
            &mut self.association,
            &mut self.readable,
            self.config.ppid,
            &mut self.inbox,
        );

        while let Some(transmit) = self.association.poll_transmit(now) {
            self.pending_transmits.push_back(transmit);
        }
        while let Some(transmit) = self.endpoint.poll_transmit() {
            self.pending_transmits.push_back(transmit);
        }
    }

    async fn flush_transmits(&mut self) -> Result<()> {
        while let Some(transmit) = self.pending_transmits.pop_front() {
            if let Payload::RawEncode(chunks) = &transmit.payload {
                for chunk in chunks {
                    self.socket
                        .send_to(chunk, transmit.remote)
                        .await
                        .map_err(|e| SctpError::from_io(e, transmit.remote))?;
                    trace!("Sent {} bytes to {}", chunk.len(), transmit.remote);
                }
            }
        }
        Ok(())
    }

    /// Sends one message on `stream_id` with the configured PPID.
    pub async fn send(&mut self, stream_id: u16, data: &[u8]) -> Result<()> {
        let ppid = self.config.ppid;
        self.send_with_ppid(stream_id, data, ppid).await
    }

    /// Sends one message on `stream_id` with an explicit PPID.
    pub async fn send_with_ppid(&mut self, stream_id: u16, data: &[u8], ppid: u32) -> Result<()> {
        if let Some(reason) = self.lost_reason.take() {
            self.state = AssociationState::Closed;
            return Err(SctpError::PeerReset(reason));
        }
        if self.state != AssociationState::Established {
            return Err(SctpError::InvalidState(
                "cannot send: association not established".into(),
            ));
        }

        write_message(&mut self.association, stream_id, data, ppid)
            .map_err(|e| SctpError::StreamError(e.to_string()))?;
        debug!("Queued {} bytes on stream {} with PPID {}", data.len(), stream_id, ppid);

        self.poll_events();
        self.flush_transmits().await
    }

    /// Waits for the next message.
    ///
    /// Returns `Ok(None)` once the association is closed locally, and
    /// `PeerReset` if the peer aborted it.
    pub async fn recv(&mut self) -> Result<Option<ReceivedMessage>> {
        loop {
            if let Some(msg) = self.inbox.pop_front() {
                return Ok(Some(msg));
            }
            if let Some(reason) = self.lost_reason.take() {
                self.state = AssociationState::Closed;
                return Err(SctpError::PeerReset(reason));
            }
            if self.state == AssociationState::Closed {
                return Ok(None);
            }

            // Wake up at least for the next retransmission timer.
            let wait = self
                .association
                .poll_timeout()
                .map(|t| t.saturating_duration_since(Instant::now()))
                .unwrap_or(Duration::from_millis(200))
                .max(Duration::from_millis(1));
            match timeout(wait, self.handle_incoming()).await {
                Ok(result) => result?,
                Err(_) => trace!("recv idle tick"),
            }
            self.poll_events();
            self.flush_transmits().await?;
        }
    }

    /// Waits for the next message for at most `limit`.
    pub async fn recv_timeout(&mut self, limit: Duration) -> Result<Option<ReceivedMessage>> {
        match timeout(limit, self.recv()).await {
            Ok(result) => result,
            Err(_) => Err(SctpError::Timeout(format!("no message within {limit:?}"))),
        }
    }

    /// Returns a buffered message without waiting.
    pub fn try_recv(&mut self) -> Option<ReceivedMessage> {
        self.inbox.pop_front()
    }

    /// Graceful SHUTDOWN; waits up to five seconds for the peer.
    pub async fn shutdown(&mut self) -> Result<()> {
        if self.state == AssociationState::Closed {
            return Ok(());
        }

        info!("Initiating SCTP shutdown with {}", self.remote_addr);
        self.state = AssociationState::ShuttingDown;

        let _ = self.association.shutdown();
        self.poll_events();
        self.flush_transmits().await?;

        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.association.is_closed() && Instant::now() < deadline {
            let _ = timeout(Duration::from_millis(100), self.handle_incoming()).await;
            self.poll_events();
            self.flush_transmits().await?;
        }

        self.state = AssociationState::Closed;
        self.lost_reason = None;
        info!("SCTP shutdown complete");
        Ok(())
    }

    /// Aborts the association. Calling it again is a no-op.
    pub fn close(&mut self) {
        if self.state == AssociationState::Closed {
            return;
        }
        let _ = self.association.close();
        self.state = AssociationState::Closed;
        self.lost_reason = None;
        debug!("Association with {} closed", self.remote_addr);
    }

    pub fn is_established(&self) -> bool {
        self.state == AssociationState::Established
    }

    pub fn is_closed(&self) -> bool {
        self.state == AssociationState::Closed
    }

    pub fn state(&self) -> AssociationState {
        self.state
    }

    pub fn remote_addr(&self) -> SocketAddr {
        self.remote_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// PPID attached to every outbound message.
    pub fn ppid(&self) -> u32 {
        self.config.ppid
    }
}

impl Drop for SctpAssociation {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SctpConfig::default();
        assert_eq!(config.max_outbound_streams, DEFAULT_NUM_STREAMS);
        assert_eq!(config.max_inbound_streams, DEFAULT_NUM_STREAMS);
        assert_eq!(config.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
        assert_eq!(config.ppid, NGAP_PPID);
        assert_eq!(NGAP_PPID, 60);
    }

    #[test]
    fn test_io_error_classification() {
        let peer: SocketAddr = "127.0.0.1:38412".parse().unwrap();
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(
            SctpError::from_io(refused, peer),
            SctpError::ConnectionRefused(addr) if addr == peer
        ));
        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(SctpError::from_io(reset, peer), SctpError::PeerReset(_)));
        let other = io::Error::from(io::ErrorKind::Other);
        assert!(matches!(SctpError::from_io(other, peer), SctpError::Io(_)));
    }

    #[tokio::test]
    async fn test_resolve_failure_is_distinct() {
        let err = resolve("no-such-host.invalid", 38412).await.unwrap_err();
        assert!(matches!(err, SctpError::AddressResolution(_)));
    }

    #[tokio::test]
    async fn test_resolve_literal() {
        let addr = resolve("127.0.0.1", 38412).await.unwrap();
        assert_eq!(addr, "127.0.0.1:38412".parse::<SocketAddr>().unwrap());
    }

    #[tokio::test]
    async fn test_connect_times_out_without_peer() {
        // Bind a silent UDP socket so the INIT is swallowed.
        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let config = SctpConfig {
            connect_timeout: Duration::from_millis(300),
            ..SctpConfig::default()
        };
        let result = SctpAssociation::connect(silent.local_addr().unwrap(), config).await;
        assert!(matches!(result, Err(SctpError::Timeout(_))));
    }

    #[test]
    fn test_sctp_error_display() {
        assert!(SctpError::AssociationClosed.to_string().contains("closed"));
        assert!(SctpError::ConnectionFailed("x".into())
            .to_string()
            .contains("Connection failed"));
    }
}

//! SCTP transport binding for NGAP
//!
//! Reliable, ordered, message-oriented associations between radio nodes and
//! the AMF, built on the sans-IO `sctp-proto` state machine carried over UDP.
//!
//! - [`SctpAssociation`]: client side (`connect`, `send`, `recv`, `close`)
//! - [`SctpServer`]: listener side, one socket for all associations
//!
//! Every outbound message is tagged with the NGAP PPID; message boundaries
//! are preserved exactly. Transport failures are reported as distinct
//! [`SctpError`] variants and never retried here.

pub mod association;
pub mod server;
mod stream;

pub use association::{
    resolve, AssociationState, ReceivedMessage, Result, SctpAssociation, SctpConfig, SctpError,
    DEFAULT_MAX_MESSAGE_SIZE, DEFAULT_NUM_STREAMS, DEFAULT_RECEIVE_BUFFER_SIZE, NGAP_PPID,
};
pub use server::{SctpServer, ServerError, ServerEvent};

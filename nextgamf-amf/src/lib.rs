//! nextgamf-amf - 5G Access and Mobility Management Function
#![allow(missing_docs)]
//!
//! Terminates NG-C signaling from radio nodes and drives each UE through
//! registration, authentication, NAS security activation and PDU session
//! establishment:
//!
//! - NGAP over SCTP (PPID 60), one task per radio node association
//! - UE context store keyed by AMF UE NGAP ID, with SUPI and per-association
//!   indexes
//! - Mobility management state machine with procedure supervision
//! - Subscriber, authentication and policy data through [`NfFacade`]
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          AMF                              │
//! │  ┌──────────┐     ┌──────────────┐     ┌──────────┐      │
//! │  │   SCTP   │────▶│ Association  │────▶│    UE    │──┐   │
//! │  │   Task   │◀─┐  │   Task(s)    │     │ Task(s)  │  │   │
//! │  └────┬─────┘  │  └──────────────┘     └────┬─────┘  │   │
//! │       │        └────────────────────────────┘        │   │
//! │       │                                   ┌──────────▼┐  │
//! │       │                                   │ NF façade │  │
//! │       │                                   └───────────┘  │
//! └───────┼──────────────────────────────────────────────────┘
//!         ▼
//!      gNB(s)
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use nextgamf_amf::{AmfApp, SubscriberDb};
//! use nextgamf_common::AmfConfig;
//!
//! let config = AmfConfig::from_yaml_file("config/amf.yaml")?;
//! let db = Arc::new(SubscriberDb::new(config.primary_plmn()));
//! let app = AmfApp::start(config, db).await?;
//! // ...
//! app.shutdown().await;
//! ```

pub mod app;
pub mod association;
pub mod context;
pub mod event;
pub mod gmm;
pub mod nf;
pub mod sctp_task;
pub mod store;
pub mod tasks;
pub mod ue_task;

pub use app::{AmfApp, StartError};
pub use association::{AssociationState, AssociationTask};
pub use context::UeContext;
pub use event::AmfEvent;
pub use gmm::{Gmm, GmmError, GmmEvent, RejectCause, Step, UeState};
pub use nf::{NfError, NfFacade, NfResult, RetryPolicy, SubscriberDb};
pub use sctp_task::SctpTask;
pub use store::{Lookup, StoreError, UeContextStore, UeSlot};
pub use tasks::{
    channel, AmfTaskBase, AssociationMessage, SctpMessage, Task, TaskHandle, TaskMessage,
    UeMessage, DEFAULT_CHANNEL_CAPACITY,
};

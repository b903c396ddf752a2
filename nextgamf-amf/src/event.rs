//! Observable AMF events
//!
//! Published on a broadcast channel held by [`AmfTaskBase`](crate::tasks::AmfTaskBase).
//! Nothing in the AMF depends on anyone listening.

use std::net::SocketAddr;

use crate::gmm::{RejectCause, UeState};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmfEvent {
    AssociationUp {
        association_id: u64,
        remote_addr: SocketAddr,
    },
    AssociationDown {
        association_id: u64,
    },
    NgSetup {
        association_id: u64,
        accepted: bool,
        ran_node_name: Option<String>,
    },
    UeStateChanged {
        amf_ue_ngap_id: u64,
        association_id: u64,
        state: UeState,
        /// Why the context left the active path, for `Released`/`Rejected`
        cause: Option<RejectCause>,
    },
    UeContextRemoved {
        amf_ue_ngap_id: u64,
    },
}

impl AmfEvent {
    /// AMF UE NGAP ID for UE-scoped events.
    pub fn amf_ue_ngap_id(&self) -> Option<u64> {
        match self {
            AmfEvent::UeStateChanged { amf_ue_ngap_id, .. }
            | AmfEvent::UeContextRemoved { amf_ue_ngap_id } => Some(*amf_ue_ngap_id),
            _ => None,
        }
    }
}

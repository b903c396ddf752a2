//! Registration state machine
//!
//! The per-UE state is a tagged enum and every change goes through
//! [`transition`], a pure function over `(state, event)`. Pairs missing from
//! its table are protocol violations and leave the state untouched.

use std::fmt;

use thiserror::Error;

use super::cause::RejectCause;

/// 5GMM state of one UE context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeState {
    Idle,
    InitialAccessed,
    AuthenticationPending,
    SecurityActivated,
    Registered,
    SessionEstablishing,
    Active,
    Released,
    Rejected(RejectCause),
}

impl UeState {
    /// `Released` and `Rejected` accept no further events.
    pub fn is_terminal(&self) -> bool {
        matches!(self, UeState::Released | UeState::Rejected(_))
    }
}

impl fmt::Display for UeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UeState::Idle => write!(f, "IDLE"),
            UeState::InitialAccessed => write!(f, "INITIAL_ACCESSED"),
            UeState::AuthenticationPending => write!(f, "AUTHENTICATION_PENDING"),
            UeState::SecurityActivated => write!(f, "SECURITY_ACTIVATED"),
            UeState::Registered => write!(f, "REGISTERED"),
            UeState::SessionEstablishing => write!(f, "SESSION_ESTABLISHING"),
            UeState::Active => write!(f, "ACTIVE"),
            UeState::Released => write!(f, "RELEASED"),
            UeState::Rejected(cause) => write!(f, "REJECTED({cause})"),
        }
    }
}

/// Inputs to the state machine: one per inbound message or completed
/// network function call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GmmEvent {
    InitialRequest,
    AuthVectorRetrieved,
    AuthVerified,
    SecurityModeComplete,
    ContextSetupComplete,
    RegistrationComplete,
    SessionRequest,
    SessionResourcesConfirmed,
    /// The radio node could not set up the pending session
    SessionSetupFailed { has_active_sessions: bool },
    Reject(RejectCause),
    Release,
    TransportLost,
    ProcedureTimeout,
}

/// An event that is not valid in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{event:?} is not valid in state {state}")]
pub struct ProtocolViolation {
    pub state: UeState,
    pub event: GmmEvent,
}

/// Computes the next state, or a violation if the pair is not in the table.
pub fn transition(state: UeState, event: GmmEvent) -> Result<UeState, ProtocolViolation> {
    use GmmEvent as E;
    use UeState as S;

    let next = match (state, event) {
        (s, _) if s.is_terminal() => None,

        (S::Idle, E::InitialRequest) => Some(S::InitialAccessed),
        (S::InitialAccessed, E::AuthVectorRetrieved) => Some(S::AuthenticationPending),
        (S::AuthenticationPending, E::AuthVerified) => Some(S::SecurityActivated),
        (S::SecurityActivated, E::SecurityModeComplete) => Some(S::Registered),
        (S::Registered, E::ContextSetupComplete) => Some(S::Registered),
        (S::Registered | S::SessionEstablishing | S::Active, E::RegistrationComplete) => {
            Some(state)
        }
        (S::Registered | S::Active, E::SessionRequest) => Some(S::SessionEstablishing),
        (S::SessionEstablishing, E::SessionResourcesConfirmed) => Some(S::Active),
        (S::SessionEstablishing, E::SessionSetupFailed { has_active_sessions }) => {
            Some(if has_active_sessions {
                S::Active
            } else {
                S::Registered
            })
        }

        (_, E::Reject(cause)) => Some(S::Rejected(cause)),
        (_, E::Release | E::TransportLost | E::ProcedureTimeout) => Some(S::Released),

        _ => None,
    };

    next.ok_or(ProtocolViolation { state, event })
}

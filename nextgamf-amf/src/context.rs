//! UE context
//!
//! Everything the AMF knows about one UE: NGAP identifiers, registration
//! state, identity, security context and PDU sessions.

use std::collections::BTreeMap;

use nextgamf_common::{CipheringAlgorithm, Guti, IntegrityAlgorithm, SNssai, Supi, Tai};
use nextgamf_nas::{PduSessionType, SessionAmbr, SscMode, UeSecurityCapability};
use thiserror::Error;

use crate::gmm::{transition, GmmEvent, ProtocolViolation, RejectCause, UeState};
use crate::nf::{AuthVector, MobilitySubscription, PolicyData};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SecurityError {
    #[error("NAS security algorithms already selected")]
    AlgorithmsAlreadySelected,
}

/// 5G NAS security context.
///
/// Algorithms are fixed on first selection; renegotiation needs a new
/// context.
#[derive(Clone, Default)]
pub struct SecurityContext {
    pub ngksi: u8,
    pub kseaf: Option<[u8; 32]>,
    pub kamf: Option<[u8; 32]>,
    pub knas_enc: Option<[u8; 16]>,
    pub knas_int: Option<[u8; 16]>,
    pub kgnb: Option<[u8; 32]>,
    algorithms: Option<(CipheringAlgorithm, IntegrityAlgorithm)>,
}

impl std::fmt::Debug for SecurityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecurityContext")
            .field("ngksi", &self.ngksi)
            .field("algorithms", &self.algorithms)
            .field("has_kamf", &self.kamf.is_some())
            .finish_non_exhaustive()
    }
}

impl SecurityContext {
    pub fn algorithms(&self) -> Option<(CipheringAlgorithm, IntegrityAlgorithm)> {
        self.algorithms
    }

    pub fn set_algorithms(
        &mut self,
        ciphering: CipheringAlgorithm,
        integrity: IntegrityAlgorithm,
    ) -> Result<(), SecurityError> {
        if self.algorithms.is_some() {
            return Err(SecurityError::AlgorithmsAlreadySelected);
        }
        self.algorithms = Some((ciphering, integrity));
        Ok(())
    }
}

/// An established or pending PDU session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSession {
    pub id: u8,
    pub pti: u8,
    pub s_nssai: SNssai,
    pub dnn: String,
    pub session_type: PduSessionType,
    pub ssc_mode: SscMode,
    pub ambr: SessionAmbr,
}

/// Per-UE state held by the AMF.
#[derive(Debug)]
pub struct UeContext {
    pub amf_ue_ngap_id: u64,
    pub ran_ue_ngap_id: u32,
    pub association_id: u64,
    state: UeState,
    /// Why the context was released, when the AMF initiated it
    pub release_cause: Option<RejectCause>,
    pub supi: Option<Supi>,
    pub guti: Option<Guti>,
    pub tai: Option<Tai>,
    pub ue_security_capability: Option<UeSecurityCapability>,
    pub requested_nssai: Vec<SNssai>,
    pub allowed_nssai: Vec<SNssai>,
    pub security: SecurityContext,
    auth_vector: Option<AuthVector>,
    pub mobility: Option<MobilitySubscription>,
    pub policy: Option<PolicyData>,
    pub sessions: BTreeMap<u8, PduSession>,
    pub pending_session: Option<PduSession>,
    /// Initial Context Setup sent, response outstanding
    pub awaiting_context_setup: bool,
}

impl UeContext {
    pub fn new(amf_ue_ngap_id: u64, association_id: u64, ran_ue_ngap_id: u32) -> Self {
        Self {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
            association_id,
            state: UeState::Idle,
            release_cause: None,
            supi: None,
            guti: None,
            tai: None,
            ue_security_capability: None,
            requested_nssai: Vec::new(),
            allowed_nssai: Vec::new(),
            security: SecurityContext::default(),
            auth_vector: None,
            mobility: None,
            policy: None,
            sessions: BTreeMap::new(),
            pending_session: None,
            awaiting_context_setup: false,
        }
    }

    pub fn state(&self) -> UeState {
        self.state
    }

    /// Applies `event`; on violation the state is unchanged.
    pub fn apply(&mut self, event: GmmEvent) -> Result<UeState, ProtocolViolation> {
        self.state = transition(self.state, event)?;
        Ok(self.state)
    }

    /// Checks `event` without applying it.
    pub fn check(&self, event: GmmEvent) -> Result<(), ProtocolViolation> {
        transition(self.state, event).map(|_| ())
    }

    /// Binds a freshly fetched vector, replacing any unused one.
    pub fn bind_auth_vector(&mut self, vector: AuthVector) {
        self.auth_vector = Some(vector);
    }

    /// Consumes the bound vector; a vector is never handed out twice.
    pub fn take_auth_vector(&mut self) -> Option<AuthVector> {
        self.auth_vector.take()
    }

    pub fn has_auth_vector(&self) -> bool {
        self.auth_vector.is_some()
    }

    /// Why the context is terminal, if it is.
    pub fn terminal_cause(&self) -> Option<RejectCause> {
        match self.state {
            UeState::Rejected(cause) => Some(cause),
            UeState::Released => self.release_cause,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_idle() {
        let ctx = UeContext::new(1, 7, 42);
        assert_eq!(ctx.state(), UeState::Idle);
        assert_eq!(ctx.ran_ue_ngap_id, 42);
        assert!(ctx.sessions.is_empty());
        assert!(!ctx.has_auth_vector());
    }

    #[test]
    fn test_violation_leaves_state_unchanged() {
        let mut ctx = UeContext::new(1, 7, 42);
        assert!(ctx.apply(GmmEvent::AuthVerified).is_err());
        assert_eq!(ctx.state(), UeState::Idle);
        assert_eq!(ctx.apply(GmmEvent::InitialRequest), Ok(UeState::InitialAccessed));
    }

    #[test]
    fn test_algorithms_selected_once() {
        let mut security = SecurityContext::default();
        security
            .set_algorithms(CipheringAlgorithm::Nea0, IntegrityAlgorithm::Nia2)
            .unwrap();
        assert_eq!(
            security.set_algorithms(CipheringAlgorithm::Nea2, IntegrityAlgorithm::Nia1),
            Err(SecurityError::AlgorithmsAlreadySelected)
        );
        assert_eq!(
            security.algorithms(),
            Some((CipheringAlgorithm::Nea0, IntegrityAlgorithm::Nia2))
        );
    }

    #[test]
    fn test_auth_vector_is_single_use() {
        let mut ctx = UeContext::new(1, 7, 42);
        ctx.bind_auth_vector(AuthVector {
            rand: [1; 16],
            autn: [2; 16],
            hxres_star: [3; 16],
            xres_star: [4; 16],
            kseaf: [5; 32],
        });
        assert!(ctx.take_auth_vector().is_some());
        assert!(ctx.take_auth_vector().is_none());
    }

    #[test]
    fn test_terminal_cause() {
        let mut ctx = UeContext::new(1, 7, 42);
        ctx.apply(GmmEvent::Reject(RejectCause::IdentityUnknown)).unwrap();
        assert_eq!(ctx.terminal_cause(), Some(RejectCause::IdentityUnknown));
    }
}

//! Rejection causes and their NAS/NGAP encodings

use std::fmt;

use nextgamf_nas::MmCause;
use nextgamf_ngap::ies::{MiscCause, NasCause, ProtocolCause, RadioNetworkCause};
use nextgamf_ngap::Cause;

/// Why a UE context was rejected or released by the AMF.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectCause {
    /// No algorithm in the configured preference lists is supported by the UE
    NoCommonAlgorithm,
    /// Subscriber data is missing or the data store could not be reached
    SubscriberDataUnavailable,
    AuthenticationFailure,
    ProcedureTimeout,
    /// Malformed or unexpected NAS from the UE
    ProtocolError,
    /// The UE identity could not be resolved to a SUPI
    IdentityUnknown,
}

/// NAS message sent to the UE on rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasReject {
    Registration(MmCause),
    Authentication,
}

impl RejectCause {
    /// NAS reject sent before the release command; `None` when the UE is
    /// not expected to be listening.
    pub fn nas_reject(self) -> Option<NasReject> {
        match self {
            RejectCause::NoCommonAlgorithm => Some(NasReject::Registration(
                MmCause::UeSecurityCapabilitiesMismatch,
            )),
            RejectCause::SubscriberDataUnavailable => Some(NasReject::Registration(
                MmCause::FiveGsServicesNotAllowed,
            )),
            RejectCause::AuthenticationFailure => Some(NasReject::Authentication),
            RejectCause::ProcedureTimeout => None,
            RejectCause::ProtocolError => {
                Some(NasReject::Registration(MmCause::ProtocolErrorUnspecified))
            }
            RejectCause::IdentityUnknown => Some(NasReject::Registration(
                MmCause::UeIdentityCannotBeDerived,
            )),
        }
    }

    /// NGAP cause carried in the UE Context Release Command.
    pub fn ngap_cause(self) -> Cause {
        match self {
            RejectCause::NoCommonAlgorithm
            | RejectCause::IdentityUnknown => Cause::Nas(NasCause::Unspecified),
            RejectCause::SubscriberDataUnavailable => Cause::Misc(MiscCause::Unspecified),
            RejectCause::AuthenticationFailure => Cause::Nas(NasCause::AuthenticationFailure),
            RejectCause::ProcedureTimeout => {
                Cause::RadioNetwork(RadioNetworkCause::ReleaseDueTo5gcGeneratedReason)
            }
            RejectCause::ProtocolError => Cause::Protocol(ProtocolCause::Unspecified),
        }
    }
}

impl fmt::Display for RejectCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RejectCause::NoCommonAlgorithm => "no common algorithm",
            RejectCause::SubscriberDataUnavailable => "subscriber data unavailable",
            RejectCause::AuthenticationFailure => "authentication failure",
            RejectCause::ProcedureTimeout => "procedure timeout",
            RejectCause::ProtocolError => "protocol error",
            RejectCause::IdentityUnknown => "identity unknown",
        };
        f.write_str(text)
    }
}

//! Generic NGAP message: procedure, outcome and an ordered IE container.

use std::collections::BTreeMap;
use std::fmt;

use bytes::Bytes;
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::ies::{Cause, IeId, IeValue};

/// NGAP procedure codes handled by this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum ProcedureCode {
    DownlinkNasTransport = 4,
    ErrorIndication = 9,
    InitialContextSetup = 14,
    InitialUeMessage = 15,
    NgSetup = 21,
    PduSessionResourceSetup = 29,
    UeContextRelease = 41,
    UeContextReleaseRequest = 42,
    UplinkNasTransport = 46,
}

/// NGAP-PDU choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PduType {
    InitiatingMessage = 0,
    SuccessfulOutcome = 1,
    UnsuccessfulOutcome = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum Criticality {
    #[default]
    Reject = 0,
    Ignore = 1,
    Notify = 2,
}

/// Every (procedure, outcome) pair this codec defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    NgSetupRequest,
    NgSetupResponse,
    NgSetupFailure,
    InitialUeMessage,
    DownlinkNasTransport,
    UplinkNasTransport,
    InitialContextSetupRequest,
    InitialContextSetupResponse,
    InitialContextSetupFailure,
    PduSessionResourceSetupRequest,
    PduSessionResourceSetupResponse,
    UeContextReleaseRequest,
    UeContextReleaseCommand,
    UeContextReleaseComplete,
    ErrorIndication,
}

impl MessageType {
    /// Resolves a procedure and outcome, `None` when the pair is undefined.
    pub fn of(procedure: ProcedureCode, pdu_type: PduType) -> Option<Self> {
        use PduType::*;
        use ProcedureCode as P;
        Some(match (procedure, pdu_type) {
            (P::NgSetup, InitiatingMessage) => MessageType::NgSetupRequest,
            (P::NgSetup, SuccessfulOutcome) => MessageType::NgSetupResponse,
            (P::NgSetup, UnsuccessfulOutcome) => MessageType::NgSetupFailure,
            (P::InitialUeMessage, InitiatingMessage) => MessageType::InitialUeMessage,
            (P::DownlinkNasTransport, InitiatingMessage) => MessageType::DownlinkNasTransport,
            (P::UplinkNasTransport, InitiatingMessage) => MessageType::UplinkNasTransport,
            (P::InitialContextSetup, InitiatingMessage) => MessageType::InitialContextSetupRequest,
            (P::InitialContextSetup, SuccessfulOutcome) => MessageType::InitialContextSetupResponse,
            (P::InitialContextSetup, UnsuccessfulOutcome) => MessageType::InitialContextSetupFailure,
            (P::PduSessionResourceSetup, InitiatingMessage) => {
                MessageType::PduSessionResourceSetupRequest
            }
            (P::PduSessionResourceSetup, SuccessfulOutcome) => {
                MessageType::PduSessionResourceSetupResponse
            }
            (P::UeContextReleaseRequest, InitiatingMessage) => MessageType::UeContextReleaseRequest,
            (P::UeContextRelease, InitiatingMessage) => MessageType::UeContextReleaseCommand,
            (P::UeContextRelease, SuccessfulOutcome) => MessageType::UeContextReleaseComplete,
            (P::ErrorIndication, InitiatingMessage) => MessageType::ErrorIndication,
            _ => return None,
        })
    }

    pub fn procedure(self) -> ProcedureCode {
        use ProcedureCode as P;
        match self {
            MessageType::NgSetupRequest | MessageType::NgSetupResponse | MessageType::NgSetupFailure => {
                P::NgSetup
            }
            MessageType::InitialUeMessage => P::InitialUeMessage,
            MessageType::DownlinkNasTransport => P::DownlinkNasTransport,
            MessageType::UplinkNasTransport => P::UplinkNasTransport,
            MessageType::InitialContextSetupRequest
            | MessageType::InitialContextSetupResponse
            | MessageType::InitialContextSetupFailure => P::InitialContextSetup,
            MessageType::PduSessionResourceSetupRequest
            | MessageType::PduSessionResourceSetupResponse => P::PduSessionResourceSetup,
            MessageType::UeContextReleaseRequest => P::UeContextReleaseRequest,
            MessageType::UeContextReleaseCommand | MessageType::UeContextReleaseComplete => {
                P::UeContextRelease
            }
            MessageType::ErrorIndication => P::ErrorIndication,
        }
    }

    pub fn pdu_type(self) -> PduType {
        match self {
            MessageType::NgSetupResponse
            | MessageType::InitialContextSetupResponse
            | MessageType::PduSessionResourceSetupResponse
            | MessageType::UeContextReleaseComplete => PduType::SuccessfulOutcome,
            MessageType::NgSetupFailure | MessageType::InitialContextSetupFailure => {
                PduType::UnsuccessfulOutcome
            }
            _ => PduType::InitiatingMessage,
        }
    }

    /// Initiating messages expect an answer or an ErrorIndication on failure.
    pub fn is_request(self) -> bool {
        self.pdu_type() == PduType::InitiatingMessage
    }

    pub fn mandatory_ies(self) -> &'static [IeId] {
        const AMF: IeId = IeId::AMF_UE_NGAP_ID;
        const RAN: IeId = IeId::RAN_UE_NGAP_ID;
        match self {
            MessageType::NgSetupRequest => &[
                IeId::GLOBAL_RAN_NODE_ID,
                IeId::SUPPORTED_TA_LIST,
                IeId::DEFAULT_PAGING_DRX,
            ],
            MessageType::NgSetupResponse => &[
                IeId::AMF_NAME,
                IeId::SERVED_GUAMI_LIST,
                IeId::RELATIVE_AMF_CAPACITY,
                IeId::PLMN_SUPPORT_LIST,
            ],
            MessageType::NgSetupFailure => &[IeId::CAUSE],
            MessageType::InitialUeMessage => &[
                RAN,
                IeId::NAS_PDU,
                IeId::USER_LOCATION_INFORMATION,
                IeId::RRC_ESTABLISHMENT_CAUSE,
            ],
            MessageType::DownlinkNasTransport => &[AMF, RAN, IeId::NAS_PDU],
            MessageType::UplinkNasTransport => {
                &[AMF, RAN, IeId::NAS_PDU, IeId::USER_LOCATION_INFORMATION]
            }
            MessageType::InitialContextSetupRequest => &[
                AMF,
                RAN,
                IeId::GUAMI,
                IeId::ALLOWED_NSSAI,
                IeId::UE_SECURITY_CAPABILITIES,
                IeId::SECURITY_KEY,
            ],
            MessageType::InitialContextSetupResponse => &[AMF, RAN],
            MessageType::InitialContextSetupFailure => &[AMF, RAN, IeId::CAUSE],
            MessageType::PduSessionResourceSetupRequest => {
                &[AMF, RAN, IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ]
            }
            MessageType::PduSessionResourceSetupResponse => &[AMF, RAN],
            MessageType::UeContextReleaseRequest => &[AMF, RAN, IeId::CAUSE],
            MessageType::UeContextReleaseCommand => &[IeId::UE_NGAP_IDS, IeId::CAUSE],
            MessageType::UeContextReleaseComplete => &[AMF, RAN],
            MessageType::ErrorIndication => &[],
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MessageType::NgSetupRequest => "NGSetupRequest",
            MessageType::NgSetupResponse => "NGSetupResponse",
            MessageType::NgSetupFailure => "NGSetupFailure",
            MessageType::InitialUeMessage => "InitialUEMessage",
            MessageType::DownlinkNasTransport => "DownlinkNASTransport",
            MessageType::UplinkNasTransport => "UplinkNASTransport",
            MessageType::InitialContextSetupRequest => "InitialContextSetupRequest",
            MessageType::InitialContextSetupResponse => "InitialContextSetupResponse",
            MessageType::InitialContextSetupFailure => "InitialContextSetupFailure",
            MessageType::PduSessionResourceSetupRequest => "PDUSessionResourceSetupRequest",
            MessageType::PduSessionResourceSetupResponse => "PDUSessionResourceSetupResponse",
            MessageType::UeContextReleaseRequest => "UEContextReleaseRequest",
            MessageType::UeContextReleaseCommand => "UEContextReleaseCommand",
            MessageType::UeContextReleaseComplete => "UEContextReleaseComplete",
            MessageType::ErrorIndication => "ErrorIndication",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One protocol IE: criticality plus typed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InformationElement {
    pub criticality: Criticality,
    pub value: IeValue,
}

/// A decoded or to-be-encoded NGAP message.
///
/// IEs are keyed by id so encoding order is always ascending and duplicates
/// cannot be represented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingMessage {
    pub message_type: MessageType,
    pub criticality: Criticality,
    pub ies: BTreeMap<IeId, InformationElement>,
}

impl SignalingMessage {
    pub fn new(message_type: MessageType) -> Self {
        let criticality = if message_type == MessageType::ErrorIndication {
            Criticality::Ignore
        } else {
            Criticality::Reject
        };
        Self {
            message_type,
            criticality,
            ies: BTreeMap::new(),
        }
    }

    /// Inserts or replaces an IE with reject criticality.
    pub fn set(&mut self, value: IeValue) {
        self.set_with_criticality(value, Criticality::Reject);
    }

    pub fn set_with_criticality(&mut self, value: IeValue, criticality: Criticality) {
        self.ies
            .insert(value.id(), InformationElement { criticality, value });
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, value: IeValue) -> Self {
        self.set(value);
        self
    }

    pub fn get(&self, id: IeId) -> Option<&IeValue> {
        self.ies.get(&id).map(|ie| &ie.value)
    }

    pub fn contains(&self, id: IeId) -> bool {
        self.ies.contains_key(&id)
    }

    pub fn amf_ue_ngap_id(&self) -> Option<u64> {
        match self.get(IeId::AMF_UE_NGAP_ID)? {
            IeValue::AmfUeNgapId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn ran_ue_ngap_id(&self) -> Option<u32> {
        match self.get(IeId::RAN_UE_NGAP_ID)? {
            IeValue::RanUeNgapId(id) => Some(*id),
            _ => None,
        }
    }

    pub fn nas_pdu(&self) -> Option<&Bytes> {
        match self.get(IeId::NAS_PDU)? {
            IeValue::NasPdu(pdu) => Some(pdu),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<Cause> {
        match self.get(IeId::CAUSE)? {
            IeValue::Cause(cause) => Some(*cause),
            _ => None,
        }
    }

    /// First mandatory IE that is absent, if any.
    pub fn missing_mandatory(&self) -> Option<IeId> {
        self.message_type
            .mandatory_ies()
            .iter()
            .copied()
            .find(|id| !self.contains(*id))
    }

    /// True for messages addressed to a single UE context.
    pub fn is_ue_associated(&self) -> bool {
        !matches!(
            self.message_type,
            MessageType::NgSetupRequest
                | MessageType::NgSetupResponse
                | MessageType::NgSetupFailure
                | MessageType::ErrorIndication
        )
    }
}

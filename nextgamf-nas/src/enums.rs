//! NAS protocol enumerations (TS 24.501)

use num_enum::{FromPrimitive, IntoPrimitive, TryFromPrimitive};

/// Extended Protocol Discriminator (EPD), TS 24.501 Section 9.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum ExtendedProtocolDiscriminator {
    /// 5GS Mobility Management messages
    MobilityManagement = 0x7E,
    /// 5GS Session Management messages
    SessionManagement = 0x2E,
}

/// Security Header Type, TS 24.501 Section 9.3
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum SecurityHeaderType {
    #[default]
    NotProtected = 0x00,
    IntegrityProtected = 0x01,
    IntegrityProtectedAndCiphered = 0x02,
    IntegrityProtectedWithNewSecurityContext = 0x03,
    IntegrityProtectedAndCipheredWithNewSecurityContext = 0x04,
}

impl SecurityHeaderType {
    pub fn is_protected(&self) -> bool {
        !matches!(self, SecurityHeaderType::NotProtected)
    }
}

/// 5GMM message types handled by the AMF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum MmMessageType {
    RegistrationRequest = 0x41,
    RegistrationAccept = 0x42,
    RegistrationComplete = 0x43,
    RegistrationReject = 0x44,
    DeregistrationRequestUeOriginating = 0x45,
    DeregistrationAcceptUeOriginating = 0x46,
    AuthenticationRequest = 0x56,
    AuthenticationResponse = 0x57,
    AuthenticationReject = 0x58,
    AuthenticationFailure = 0x59,
    SecurityModeCommand = 0x5D,
    SecurityModeComplete = 0x5E,
    SecurityModeReject = 0x5F,
    MmStatus = 0x64,
    UlNasTransport = 0x67,
    DlNasTransport = 0x68,
}

/// 5GSM message types handled by the AMF
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum SmMessageType {
    PduSessionEstablishmentRequest = 0xC1,
    PduSessionEstablishmentAccept = 0xC2,
    PduSessionEstablishmentReject = 0xC3,
}

/// 5GMM cause, TS 24.501 Section 9.11.3.2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum MmCause {
    IllegalUe = 3,
    PeiNotAccepted = 5,
    IllegalMe = 6,
    FiveGsServicesNotAllowed = 7,
    UeIdentityCannotBeDerived = 9,
    ImplicitlyDeregistered = 10,
    PlmnNotAllowed = 11,
    TrackingAreaNotAllowed = 12,
    MacFailure = 20,
    SynchFailure = 21,
    Congestion = 22,
    UeSecurityCapabilitiesMismatch = 23,
    SecurityModeRejectedUnspecified = 24,
    Non5gAuthenticationUnacceptable = 26,
    NgksiAlreadyInUse = 71,
    SemanticallyIncorrectMessage = 95,
    InvalidMandatoryInformation = 96,
    MessageTypeNonExistent = 97,
    ProtocolErrorUnspecified = 111,
    #[num_enum(catch_all)]
    Other(u8),
}

/// 5GSM cause, TS 24.501 Section 9.11.4.2 (subset)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum SmCause {
    InsufficientResources = 26,
    MissingOrUnknownDnn = 27,
    UnknownPduSessionType = 28,
    UserAuthenticationFailed = 29,
    RequestRejectedUnspecified = 31,
    ServiceOptionNotSupported = 32,
    MissingOrUnknownDnnInSlice = 91,
    ProtocolErrorUnspecified = 111,
    #[num_enum(catch_all)]
    Other(u8),
}

/// Payload container type, TS 24.501 Section 9.11.3.40
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PayloadContainerType {
    N1SmInformation = 0x01,
    Sms = 0x02,
    LppMessage = 0x03,
    SorTransparentContainer = 0x04,
    UePolicyContainer = 0x05,
    UeParametersUpdate = 0x06,
    LocationServicesMessage = 0x07,
    Cireq = 0x08,
    MultiplePayloads = 0x0F,
}

/// 5GS registration type value, TS 24.501 Section 9.11.3.7
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum RegistrationType {
    InitialRegistration = 0x01,
    MobilityRegistrationUpdating = 0x02,
    PeriodicRegistrationUpdating = 0x03,
    EmergencyRegistration = 0x04,
}

/// PDU session type, TS 24.501 Section 9.11.4.11
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum PduSessionType {
    #[default]
    Ipv4 = 0x01,
    Ipv6 = 0x02,
    Ipv4v6 = 0x03,
    Unstructured = 0x04,
    Ethernet = 0x05,
}

/// SSC mode, TS 24.501 Section 9.11.4.16
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive, Default)]
#[repr(u8)]
pub enum SscMode {
    #[default]
    Mode1 = 0x01,
    Mode2 = 0x02,
    Mode3 = 0x03,
}

//! Information elements
//!
//! Each IE is identified by its NGAP protocol IE id. Known ids decode into a
//! typed [`IeValue`]; anything else is kept as [`IeValue::Opaque`] holding the
//! open-type octets, so it can be re-emitted byte for byte.
//!
//! Values are encoded in aligned PER following the NGAP ASN.1 definitions of
//! TS 38.413. Only the alternatives an AMF exchanges are interpreted:
//! `globalGNB-ID` for GlobalRANNodeID and `userLocationInformationNR` for
//! UserLocationInformation. `iE-Extensions` sent by a peer are skipped.

use std::fmt;

use asn1_codecs::PerCodecData;
use bytes::Bytes;
use nextgamf_common::{CipheringAlgorithm, Guami, IntegrityAlgorithm, Plmn, SNssai, Tai};
use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::aper::{self, PerResult};

/// Largest AMF UE NGAP ID (40 bits).
pub const MAX_AMF_UE_NGAP_ID: u64 = (1 << 40) - 1;

const MAX_NO_OF_ALLOWED_S_NSSAIS: i128 = 8;
const MAX_NO_OF_BPLMNS: i128 = 12;
const MAX_NO_OF_PDU_SESSIONS: i128 = 256;
const MAX_NO_OF_PLMNS: i128 = 12;
const MAX_NO_OF_SERVED_GUAMIS: i128 = 256;
const MAX_NO_OF_SLICE_ITEMS: i128 = 1024;
const MAX_NO_OF_TACS: i128 = 256;

/// Protocol IE identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IeId(pub u16);

impl IeId {
    pub const ALLOWED_NSSAI: IeId = IeId(0);
    pub const AMF_NAME: IeId = IeId(1);
    pub const AMF_UE_NGAP_ID: IeId = IeId(10);
    pub const CAUSE: IeId = IeId(15);
    pub const DEFAULT_PAGING_DRX: IeId = IeId(21);
    pub const GLOBAL_RAN_NODE_ID: IeId = IeId(27);
    pub const GUAMI: IeId = IeId(28);
    pub const NAS_PDU: IeId = IeId(38);
    pub const PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_SU_RES: IeId = IeId(58);
    pub const PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ: IeId = IeId(74);
    pub const PDU_SESSION_RESOURCE_SETUP_LIST_SU_RES: IeId = IeId(75);
    pub const PLMN_SUPPORT_LIST: IeId = IeId(80);
    pub const RAN_NODE_NAME: IeId = IeId(82);
    pub const RAN_UE_NGAP_ID: IeId = IeId(85);
    pub const RELATIVE_AMF_CAPACITY: IeId = IeId(86);
    pub const RRC_ESTABLISHMENT_CAUSE: IeId = IeId(90);
    pub const SECURITY_KEY: IeId = IeId(94);
    pub const SERVED_GUAMI_LIST: IeId = IeId(96);
    pub const SUPPORTED_TA_LIST: IeId = IeId(102);
    pub const TIME_TO_WAIT: IeId = IeId(107);
    pub const UE_NGAP_IDS: IeId = IeId(114);
    pub const UE_SECURITY_CAPABILITIES: IeId = IeId(119);
    pub const USER_LOCATION_INFORMATION: IeId = IeId(121);

    /// NGAP name of the IE, or `None` for ids this codec does not interpret.
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            IeId::ALLOWED_NSSAI => "AllowedNSSAI",
            IeId::AMF_NAME => "AMFName",
            IeId::AMF_UE_NGAP_ID => "AMF-UE-NGAP-ID",
            IeId::CAUSE => "Cause",
            IeId::DEFAULT_PAGING_DRX => "DefaultPagingDRX",
            IeId::GLOBAL_RAN_NODE_ID => "GlobalRANNodeID",
            IeId::GUAMI => "GUAMI",
            IeId::NAS_PDU => "NAS-PDU",
            IeId::PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_SU_RES => {
                "PDUSessionResourceFailedToSetupListSURes"
            }
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ => "PDUSessionResourceSetupListSUReq",
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_RES => "PDUSessionResourceSetupListSURes",
            IeId::PLMN_SUPPORT_LIST => "PLMNSupportList",
            IeId::RAN_NODE_NAME => "RANNodeName",
            IeId::RAN_UE_NGAP_ID => "RAN-UE-NGAP-ID",
            IeId::RELATIVE_AMF_CAPACITY => "RelativeAMFCapacity",
            IeId::RRC_ESTABLISHMENT_CAUSE => "RRCEstablishmentCause",
            IeId::SECURITY_KEY => "SecurityKey",
            IeId::SERVED_GUAMI_LIST => "ServedGUAMIList",
            IeId::SUPPORTED_TA_LIST => "SupportedTAList",
            IeId::TIME_TO_WAIT => "TimeToWait",
            IeId::UE_NGAP_IDS => "UE-NGAP-IDs",
            IeId::UE_SECURITY_CAPABILITIES => "UESecurityCapabilities",
            IeId::USER_LOCATION_INFORMATION => "UserLocationInformation",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for IeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for IeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}({})", name, self.0),
            None => write!(f, "id-{}", self.0),
        }
    }
}

/// gNB identity with its PLMN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GlobalRanNodeId {
    pub plmn: Plmn,
    /// gNB ID value, `gnb_id_length` bits wide
    pub gnb_id: u32,
    /// 22..=32
    pub gnb_id_length: u8,
}

/// Default paging DRX in radio frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum PagingDrx {
    V32 = 0,
    V64 = 1,
    V128 = 2,
    V256 = 3,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastPlmnItem {
    pub plmn: Plmn,
    pub slice_support_list: Vec<SNssai>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupportedTaItem {
    /// 24-bit tracking area code
    pub tac: u32,
    pub broadcast_plmn_list: Vec<BroadcastPlmnItem>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlmnSupportItem {
    pub plmn: Plmn,
    pub slice_support_list: Vec<SNssai>,
}

macro_rules! cause_enum {
    ($(#[$meta:meta])* $name:ident($root:literal) { $($variant:ident = $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant,)+
            Other(u8),
        }

        impl $name {
            /// Values before the extension marker.
            pub const ROOT: u8 = $root;

            pub fn value(self) -> u8 {
                match self {
                    $($name::$variant => $value,)+
                    $name::Other(v) => v,
                }
            }

            pub fn from_value(value: u8) -> Self {
                match value {
                    $($value => $name::$variant,)+
                    v => $name::Other(v),
                }
            }
        }
    };
}

cause_enum!(
    /// CauseRadioNetwork (subset)
    RadioNetworkCause(45) {
        Unspecified = 0,
        ReleaseDueToNgranGeneratedReason = 3,
        ReleaseDueTo5gcGeneratedReason = 4,
        UnknownLocalUeNgapId = 14,
        InconsistentRemoteUeNgapId = 15,
        UserInactivity = 20,
        RadioConnectionWithUeLost = 21,
    }
);

cause_enum!(
    /// CauseTransport
    TransportCause(2) {
        TransportResourceUnavailable = 0,
        Unspecified = 1,
    }
);

cause_enum!(
    /// CauseNas
    NasCause(4) {
        NormalRelease = 0,
        AuthenticationFailure = 1,
        Deregister = 2,
        Unspecified = 3,
    }
);

cause_enum!(
    /// CauseProtocol
    ProtocolCause(7) {
        TransferSyntaxError = 0,
        AbstractSyntaxErrorReject = 1,
        AbstractSyntaxErrorIgnoreAndNotify = 2,
        MessageNotCompatibleWithReceiverState = 3,
        SemanticError = 4,
        AbstractSyntaxErrorFalselyConstructedMessage = 5,
        Unspecified = 6,
    }
);

cause_enum!(
    /// CauseMisc
    MiscCause(6) {
        ControlProcessingOverload = 0,
        NotEnoughUserPlaneProcessingResources = 1,
        HardwareFailure = 2,
        OmIntervention = 3,
        UnknownPlmnOrSnpn = 4,
        Unspecified = 5,
    }
);

/// NGAP Cause choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cause {
    RadioNetwork(RadioNetworkCause),
    Transport(TransportCause),
    Nas(NasCause),
    Protocol(ProtocolCause),
    Misc(MiscCause),
}

impl Cause {
    fn group_and_value(self) -> (u8, u8) {
        match self {
            Cause::RadioNetwork(c) => (0, c.value()),
            Cause::Transport(c) => (1, c.value()),
            Cause::Nas(c) => (2, c.value()),
            Cause::Protocol(c) => (3, c.value()),
            Cause::Misc(c) => (4, c.value()),
        }
    }

    fn root(group: u8) -> u8 {
        match group {
            0 => RadioNetworkCause::ROOT,
            1 => TransportCause::ROOT,
            2 => NasCause::ROOT,
            3 => ProtocolCause::ROOT,
            _ => MiscCause::ROOT,
        }
    }

    fn from_group_and_value(group: u8, value: u8) -> Option<Self> {
        Some(match group {
            0 => Cause::RadioNetwork(RadioNetworkCause::from_value(value)),
            1 => Cause::Transport(TransportCause::from_value(value)),
            2 => Cause::Nas(NasCause::from_value(value)),
            3 => Cause::Protocol(ProtocolCause::from_value(value)),
            4 => Cause::Misc(MiscCause::from_value(value)),
            _ => return None,
        })
    }
}

impl fmt::Display for Cause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cause::RadioNetwork(c) => write!(f, "radioNetwork/{c:?}"),
            Cause::Transport(c) => write!(f, "transport/{c:?}"),
            Cause::Nas(c) => write!(f, "nas/{c:?}"),
            Cause::Protocol(c) => write!(f, "protocol/{c:?}"),
            Cause::Misc(c) => write!(f, "misc/{c:?}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum TimeToWait {
    V1s = 0,
    V2s = 1,
    V5s = 2,
    V10s = 3,
    V20s = 4,
    V60s = 5,
}

/// NR cell global identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NrCgi {
    pub plmn: Plmn,
    /// 36 bits
    pub nr_cell_identity: u64,
}

/// UserLocationInformationNR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserLocationInformation {
    pub nr_cgi: NrCgi,
    pub tai: Tai,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive, IntoPrimitive)]
#[repr(u8)]
pub enum RrcEstablishmentCause {
    Emergency = 0,
    HighPriorityAccess = 1,
    MtAccess = 2,
    MoSignalling = 3,
    MoData = 4,
    MoVoiceCall = 5,
    MoVideoCall = 6,
    MoSms = 7,
    MpsPriorityAccess = 8,
    McsPriorityAccess = 9,
}

/// UE security capabilities as 16-bit algorithm bitmaps.
///
/// Bit 15 is 128-NEA1/NIA1, bit 14 NEA2/NIA2, bit 13 NEA3/NIA3. The null
/// algorithms are implicitly supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct UeSecurityCapabilities {
    pub nr_encryption_algorithms: u16,
    pub nr_integrity_protection_algorithms: u16,
    pub eutra_encryption_algorithms: u16,
    pub eutra_integrity_protection_algorithms: u16,
}

fn algorithm_bit(id: u8) -> u16 {
    match id {
        1..=3 => 0x8000 >> (id - 1),
        _ => 0,
    }
}

impl UeSecurityCapabilities {
    /// Builds NR bitmaps from algorithm lists (E-UTRA mirrors NR).
    pub fn from_algorithms(ciphering: &[CipheringAlgorithm], integrity: &[IntegrityAlgorithm]) -> Self {
        let enc = ciphering.iter().fold(0, |acc, a| acc | algorithm_bit(a.id()));
        let int = integrity.iter().fold(0, |acc, a| acc | algorithm_bit(a.id()));
        Self {
            nr_encryption_algorithms: enc,
            nr_integrity_protection_algorithms: int,
            eutra_encryption_algorithms: enc,
            eutra_integrity_protection_algorithms: int,
        }
    }

    /// NR ciphering algorithms, NEA0 included.
    pub fn ciphering_algorithms(&self) -> Vec<CipheringAlgorithm> {
        CipheringAlgorithm::ALL
            .into_iter()
            .filter(|a| a.id() == 0 || self.nr_encryption_algorithms & algorithm_bit(a.id()) != 0)
            .collect()
    }

    /// NR integrity algorithms, NIA0 included.
    pub fn integrity_algorithms(&self) -> Vec<IntegrityAlgorithm> {
        IntegrityAlgorithm::ALL
            .into_iter()
            .filter(|a| {
                a.id() == 0 || self.nr_integrity_protection_algorithms & algorithm_bit(a.id()) != 0
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupItemSuReq {
    pub pdu_session_id: u8,
    pub nas_pdu: Option<Bytes>,
    pub s_nssai: SNssai,
    /// PDUSessionResourceSetupRequestTransfer, carried opaquely
    pub transfer: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceSetupItemSuRes {
    pub pdu_session_id: u8,
    pub transfer: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PduSessionResourceFailedToSetupItem {
    pub pdu_session_id: u8,
    pub transfer: Bytes,
}

/// UE-NGAP-IDs choice of the UE Context Release Command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UeNgapIds {
    Pair { amf_ue_ngap_id: u64, ran_ue_ngap_id: u32 },
    AmfOnly(u64),
}

impl UeNgapIds {
    pub fn amf_ue_ngap_id(&self) -> u64 {
        match *self {
            UeNgapIds::Pair { amf_ue_ngap_id, .. } | UeNgapIds::AmfOnly(amf_ue_ngap_id) => {
                amf_ue_ngap_id
            }
        }
    }
}

/// Typed IE value. The IE id is implied by the variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IeValue {
    AllowedNssai(Vec<SNssai>),
    AmfName(String),
    AmfUeNgapId(u64),
    Cause(Cause),
    DefaultPagingDrx(PagingDrx),
    GlobalRanNodeId(GlobalRanNodeId),
    Guami(Guami),
    NasPdu(Bytes),
    PduSessionResourceFailedToSetupListSuRes(Vec<PduSessionResourceFailedToSetupItem>),
    PduSessionResourceSetupListSuReq(Vec<PduSessionResourceSetupItemSuReq>),
    PduSessionResourceSetupListSuRes(Vec<PduSessionResourceSetupItemSuRes>),
    PlmnSupportList(Vec<PlmnSupportItem>),
    RanNodeName(String),
    RanUeNgapId(u32),
    RelativeAmfCapacity(u8),
    RrcEstablishmentCause(RrcEstablishmentCause),
    SecurityKey([u8; 32]),
    ServedGuamiList(Vec<Guami>),
    SupportedTaList(Vec<SupportedTaItem>),
    TimeToWait(TimeToWait),
    UeNgapIds(UeNgapIds),
    UeSecurityCapabilities(UeSecurityCapabilities),
    UserLocationInformation(UserLocationInformation),
    /// IE this codec does not interpret, kept verbatim.
    Opaque { id: IeId, data: Bytes },
}

impl IeValue {
    pub fn id(&self) -> IeId {
        match self {
            IeValue::AllowedNssai(_) => IeId::ALLOWED_NSSAI,
            IeValue::AmfName(_) => IeId::AMF_NAME,
            IeValue::AmfUeNgapId(_) => IeId::AMF_UE_NGAP_ID,
            IeValue::Cause(_) => IeId::CAUSE,
            IeValue::DefaultPagingDrx(_) => IeId::DEFAULT_PAGING_DRX,
            IeValue::GlobalRanNodeId(_) => IeId::GLOBAL_RAN_NODE_ID,
            IeValue::Guami(_) => IeId::GUAMI,
            IeValue::NasPdu(_) => IeId::NAS_PDU,
            IeValue::PduSessionResourceFailedToSetupListSuRes(_) => {
                IeId::PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_SU_RES
            }
            IeValue::PduSessionResourceSetupListSuReq(_) => IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ,
            IeValue::PduSessionResourceSetupListSuRes(_) => IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_RES,
            IeValue::PlmnSupportList(_) => IeId::PLMN_SUPPORT_LIST,
            IeValue::RanNodeName(_) => IeId::RAN_NODE_NAME,
            IeValue::RanUeNgapId(_) => IeId::RAN_UE_NGAP_ID,
            IeValue::RelativeAmfCapacity(_) => IeId::RELATIVE_AMF_CAPACITY,
            IeValue::RrcEstablishmentCause(_) => IeId::RRC_ESTABLISHMENT_CAUSE,
            IeValue::SecurityKey(_) => IeId::SECURITY_KEY,
            IeValue::ServedGuamiList(_) => IeId::SERVED_GUAMI_LIST,
            IeValue::SupportedTaList(_) => IeId::SUPPORTED_TA_LIST,
            IeValue::TimeToWait(_) => IeId::TIME_TO_WAIT,
            IeValue::UeNgapIds(_) => IeId::UE_NGAP_IDS,
            IeValue::UeSecurityCapabilities(_) => IeId::UE_SECURITY_CAPABILITIES,
            IeValue::UserLocationInformation(_) => IeId::USER_LOCATION_INFORMATION,
            IeValue::Opaque { id, .. } => *id,
        }
    }

    /// Decodes the open-type contents of IE `id`.
    pub fn decode(id: IeId, data: &[u8]) -> PerResult<Self> {
        let d = &mut PerCodecData::from_slice_aper(data);
        let value = match id {
            IeId::ALLOWED_NSSAI => {
                // AllowedNSSAI-Item ::= SEQUENCE { s-NSSAI, iE-Extensions, ... }
                IeValue::AllowedNssai(get_list(d, MAX_NO_OF_ALLOWED_S_NSSAIS, get_snssai_item)?)
            }
            IeId::AMF_NAME => IeValue::AmfName(get_name(d)?),
            IeId::AMF_UE_NGAP_ID => IeValue::AmfUeNgapId(get_amf_ue_ngap_id(d)?),
            IeId::CAUSE => IeValue::Cause(get_cause(d)?),
            IeId::DEFAULT_PAGING_DRX => IeValue::DefaultPagingDrx(get_enum(d, 4)?),
            IeId::GLOBAL_RAN_NODE_ID => IeValue::GlobalRanNodeId(get_global_ran_node_id(d)?),
            IeId::GUAMI => IeValue::Guami(get_guami(d)?),
            IeId::NAS_PDU => IeValue::NasPdu(get_nas_pdu(d)?),
            IeId::PDU_SESSION_RESOURCE_FAILED_TO_SETUP_LIST_SU_RES => {
                IeValue::PduSessionResourceFailedToSetupListSuRes(get_list(
                    d,
                    MAX_NO_OF_PDU_SESSIONS,
                    |d| {
                        let seq = aper::get_sequence(d, 0)?;
                        let item = PduSessionResourceFailedToSetupItem {
                            pdu_session_id: get_pdu_session_id(d)?,
                            transfer: Bytes::from(aper::get_octets(d)?),
                        };
                        seq.finish(d)?;
                        Ok(item)
                    },
                )?)
            }
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_REQ => {
                IeValue::PduSessionResourceSetupListSuReq(get_list(
                    d,
                    MAX_NO_OF_PDU_SESSIONS,
                    |d| {
                        let seq = aper::get_sequence(d, 1)?;
                        let pdu_session_id = get_pdu_session_id(d)?;
                        let nas_pdu = if seq.has(0) {
                            Some(get_nas_pdu(d)?)
                        } else {
                            None
                        };
                        let item = PduSessionResourceSetupItemSuReq {
                            pdu_session_id,
                            nas_pdu,
                            s_nssai: get_snssai(d)?,
                            transfer: Bytes::from(aper::get_octets(d)?),
                        };
                        seq.finish(d)?;
                        Ok(item)
                    },
                )?)
            }
            IeId::PDU_SESSION_RESOURCE_SETUP_LIST_SU_RES => {
                IeValue::PduSessionResourceSetupListSuRes(get_list(
                    d,
                    MAX_NO_OF_PDU_SESSIONS,
                    |d| {
                        let seq = aper::get_sequence(d, 0)?;
                        let item = PduSessionResourceSetupItemSuRes {
                            pdu_session_id: get_pdu_session_id(d)?,
                            transfer: Bytes::from(aper::get_octets(d)?),
                        };
                        seq.finish(d)?;
                        Ok(item)
                    },
                )?)
            }
            IeId::PLMN_SUPPORT_LIST => IeValue::PlmnSupportList(get_list(d, MAX_NO_OF_PLMNS, |d| {
                let seq = aper::get_sequence(d, 0)?;
                let item = PlmnSupportItem {
                    plmn: get_plmn(d)?,
                    slice_support_list: get_list(d, MAX_NO_OF_SLICE_ITEMS, get_snssai_item)?,
                };
                seq.finish(d)?;
                Ok(item)
            })?),
            IeId::RAN_NODE_NAME => IeValue::RanNodeName(get_name(d)?),
            IeId::RAN_UE_NGAP_ID => IeValue::RanUeNgapId(get_ran_ue_ngap_id(d)?),
            IeId::RELATIVE_AMF_CAPACITY => {
                IeValue::RelativeAmfCapacity(aper::get_integer(d, 0, 255)? as u8)
            }
            IeId::RRC_ESTABLISHMENT_CAUSE => IeValue::RrcEstablishmentCause(get_enum(d, 10)?),
            IeId::SECURITY_KEY => {
                let bits = aper::get_bit_string(d, 256, 256, false)?;
                let mut key = [0u8; 32];
                for (octet, chunk) in key.iter_mut().zip(bits.chunks(8)) {
                    *octet = aper::from_bits(chunk) as u8;
                }
                IeValue::SecurityKey(key)
            }
            IeId::SERVED_GUAMI_LIST => {
                IeValue::ServedGuamiList(get_list(d, MAX_NO_OF_SERVED_GUAMIS, |d| {
                    // ServedGUAMIItem ::= SEQUENCE { gUAMI, backupAMFName OPTIONAL, ... }
                    let seq = aper::get_sequence(d, 1)?;
                    let guami = get_guami(d)?;
                    if seq.has(0) {
                        get_name(d)?;
                    }
                    seq.finish(d)?;
                    Ok(guami)
                })?)
            }
            IeId::SUPPORTED_TA_LIST => IeValue::SupportedTaList(get_list(d, MAX_NO_OF_TACS, |d| {
                let seq = aper::get_sequence(d, 0)?;
                let tac = get_tac(d)?;
                let broadcast_plmn_list = get_list(d, MAX_NO_OF_BPLMNS, |d| {
                    let seq = aper::get_sequence(d, 0)?;
                    let item = BroadcastPlmnItem {
                        plmn: get_plmn(d)?,
                        slice_support_list: get_list(d, MAX_NO_OF_SLICE_ITEMS, get_snssai_item)?,
                    };
                    seq.finish(d)?;
                    Ok(item)
                })?;
                seq.finish(d)?;
                Ok(SupportedTaItem {
                    tac,
                    broadcast_plmn_list,
                })
            })?),
            IeId::TIME_TO_WAIT => IeValue::TimeToWait(get_enum(d, 6)?),
            IeId::UE_NGAP_IDS => IeValue::UeNgapIds(get_ue_ngap_ids(d)?),
            IeId::UE_SECURITY_CAPABILITIES => {
                let seq = aper::get_sequence(d, 0)?;
                let caps = UeSecurityCapabilities {
                    nr_encryption_algorithms: get_algorithm_bitmap(d)?,
                    nr_integrity_protection_algorithms: get_algorithm_bitmap(d)?,
                    eutra_encryption_algorithms: get_algorithm_bitmap(d)?,
                    eutra_integrity_protection_algorithms: get_algorithm_bitmap(d)?,
                };
                seq.finish(d)?;
                IeValue::UeSecurityCapabilities(caps)
            }
            IeId::USER_LOCATION_INFORMATION => {
                IeValue::UserLocationInformation(get_user_location_information(d)?)
            }
            _ => {
                return Ok(IeValue::Opaque {
                    id,
                    data: Bytes::copy_from_slice(data),
                })
            }
        };
        Ok(value)
    }

    /// Encodes the value as the contents of its IE open type.
    pub fn encode_value(&self) -> PerResult<Vec<u8>> {
        let mut out = PerCodecData::new_aper();
        let d = &mut out;
        match self {
            IeValue::AllowedNssai(list) => {
                put_list(d, MAX_NO_OF_ALLOWED_S_NSSAIS, list, put_snssai_item)?
            }
            IeValue::AmfName(name) | IeValue::RanNodeName(name) => put_name(d, name)?,
            IeValue::AmfUeNgapId(id) => put_amf_ue_ngap_id(d, *id)?,
            IeValue::Cause(cause) => put_cause(d, *cause)?,
            IeValue::DefaultPagingDrx(drx) => put_enum(d, 4, *drx)?,
            IeValue::GlobalRanNodeId(node) => put_global_ran_node_id(d, node)?,
            IeValue::Guami(guami) => put_guami(d, guami)?,
            IeValue::NasPdu(pdu) => put_nas_pdu(d, pdu)?,
            IeValue::PduSessionResourceFailedToSetupListSuRes(list) => {
                put_list(d, MAX_NO_OF_PDU_SESSIONS, list, |d, item| {
                    aper::put_sequence(d, &[])?;
                    put_pdu_session_id(d, item.pdu_session_id)?;
                    aper::put_octets(d, &item.transfer)
                })?
            }
            IeValue::PduSessionResourceSetupListSuReq(list) => {
                put_list(d, MAX_NO_OF_PDU_SESSIONS, list, |d, item| {
                    aper::put_sequence(d, &[item.nas_pdu.is_some()])?;
                    put_pdu_session_id(d, item.pdu_session_id)?;
                    if let Some(nas) = &item.nas_pdu {
                        put_nas_pdu(d, nas)?;
                    }
                    put_snssai(d, &item.s_nssai)?;
                    aper::put_octets(d, &item.transfer)
                })?
            }
            IeValue::PduSessionResourceSetupListSuRes(list) => {
                put_list(d, MAX_NO_OF_PDU_SESSIONS, list, |d, item| {
                    aper::put_sequence(d, &[])?;
                    put_pdu_session_id(d, item.pdu_session_id)?;
                    aper::put_octets(d, &item.transfer)
                })?
            }
            IeValue::PlmnSupportList(list) => put_list(d, MAX_NO_OF_PLMNS, list, |d, item| {
                aper::put_sequence(d, &[])?;
                put_plmn(d, &item.plmn)?;
                put_list(d, MAX_NO_OF_SLICE_ITEMS, &item.slice_support_list, put_snssai_item)
            })?,
            IeValue::RanUeNgapId(id) => aper::put_integer(d, 0, i128::from(u32::MAX), i128::from(*id))?,
            IeValue::RelativeAmfCapacity(c) => aper::put_integer(d, 0, 255, i128::from(*c))?,
            IeValue::RrcEstablishmentCause(c) => put_enum(d, 10, *c)?,
            IeValue::SecurityKey(key) => {
                let bits: aper::Bits = key
                    .iter()
                    .flat_map(|octet| aper::to_bits(u64::from(*octet), 8))
                    .collect();
                aper::put_bit_string(d, 256, 256, false, &bits)?
            }
            IeValue::ServedGuamiList(list) => {
                put_list(d, MAX_NO_OF_SERVED_GUAMIS, list, |d, guami| {
                    aper::put_sequence(d, &[false])?;
                    put_guami(d, guami)
                })?
            }
            IeValue::SupportedTaList(list) => put_list(d, MAX_NO_OF_TACS, list, |d, item| {
                aper::put_sequence(d, &[])?;
                put_tac(d, item.tac)?;
                put_list(d, MAX_NO_OF_BPLMNS, &item.broadcast_plmn_list, |d, plmn| {
                    aper::put_sequence(d, &[])?;
                    put_plmn(d, &plmn.plmn)?;
                    put_list(d, MAX_NO_OF_SLICE_ITEMS, &plmn.slice_support_list, put_snssai_item)
                })
            })?,
            IeValue::TimeToWait(t) => put_enum(d, 6, *t)?,
            IeValue::UeNgapIds(ids) => put_ue_ngap_ids(d, ids)?,
            IeValue::UeSecurityCapabilities(caps) => {
                aper::put_sequence(d, &[])?;
                for bitmap in [
                    caps.nr_encryption_algorithms,
                    caps.nr_integrity_protection_algorithms,
                    caps.eutra_encryption_algorithms,
                    caps.eutra_integrity_protection_algorithms,
                ] {
                    aper::put_bit_string(d, 16, 16, true, &aper::to_bits(u64::from(bitmap), 16))?;
                }
            }
            IeValue::UserLocationInformation(uli) => put_user_location_information(d, uli)?,
            IeValue::Opaque { data, .. } => return Ok(data.to_vec()),
        }
        Ok(out.into_bytes())
    }
}

fn put_list<T>(
    d: &mut PerCodecData,
    max: i128,
    items: &[T],
    mut put: impl FnMut(&mut PerCodecData, &T) -> PerResult<()>,
) -> PerResult<()> {
    if items.is_empty() || items.len() as i128 > max {
        return Err(format!("list of {} items outside 1..={max}", items.len()));
    }
    aper::put_count(d, 1, max, items.len())?;
    items.iter().try_for_each(|item| put(d, item))
}

fn get_list<T>(
    d: &mut PerCodecData,
    max: i128,
    mut get: impl FnMut(&mut PerCodecData) -> PerResult<T>,
) -> PerResult<Vec<T>> {
    let count = aper::get_count(d, 1, max)?;
    (0..count).map(|_| get(d)).collect()
}

fn put_enum<T: Into<u8>>(d: &mut PerCodecData, root: i128, value: T) -> PerResult<()> {
    let raw: u8 = value.into();
    aper::put_enumerated(d, root, true, i128::from(raw))
}

fn get_enum<T: TryFromPrimitive<Primitive = u8>>(d: &mut PerCodecData, root: i128) -> PerResult<T> {
    let raw = aper::get_enumerated(d, root, true)?;
    u8::try_from(raw)
        .ok()
        .and_then(|v| T::try_from_primitive(v).ok())
        .ok_or_else(|| format!("enumerated value {raw} not supported"))
}

fn put_amf_ue_ngap_id(d: &mut PerCodecData, id: u64) -> PerResult<()> {
    if id > MAX_AMF_UE_NGAP_ID {
        return Err(format!("AMF-UE-NGAP-ID {id} exceeds 40 bits"));
    }
    aper::put_integer(d, 0, i128::from(MAX_AMF_UE_NGAP_ID), i128::from(id))
}

fn get_amf_ue_ngap_id(d: &mut PerCodecData) -> PerResult<u64> {
    Ok(aper::get_integer(d, 0, i128::from(MAX_AMF_UE_NGAP_ID))? as u64)
}

fn get_ran_ue_ngap_id(d: &mut PerCodecData) -> PerResult<u32> {
    Ok(aper::get_integer(d, 0, i128::from(u32::MAX))? as u32)
}

fn put_pdu_session_id(d: &mut PerCodecData, id: u8) -> PerResult<()> {
    aper::put_integer(d, 0, 255, i128::from(id))
}

fn get_pdu_session_id(d: &mut PerCodecData) -> PerResult<u8> {
    Ok(aper::get_integer(d, 0, 255)? as u8)
}

fn put_nas_pdu(d: &mut PerCodecData, pdu: &[u8]) -> PerResult<()> {
    if pdu.is_empty() {
        return Err("empty NAS-PDU".into());
    }
    aper::put_octets(d, pdu)
}

fn get_nas_pdu(d: &mut PerCodecData) -> PerResult<Bytes> {
    let pdu = aper::get_octets(d)?;
    if pdu.is_empty() {
        return Err("empty NAS-PDU".into());
    }
    Ok(Bytes::from(pdu))
}

/// AMFName and RANNodeName
fn put_name(d: &mut PerCodecData, name: &str) -> PerResult<()> {
    if name.is_empty() || name.len() > 150 {
        return Err(format!("name length {} outside 1..=150", name.len()));
    }
    aper::put_printable(d, 1, 150, name)
}

fn get_name(d: &mut PerCodecData) -> PerResult<String> {
    aper::get_printable(d, 1, 150)
}

fn put_plmn(d: &mut PerCodecData, plmn: &Plmn) -> PerResult<()> {
    aper::put_fixed_octets(d, &plmn.encode())
}

fn get_plmn(d: &mut PerCodecData) -> PerResult<Plmn> {
    Ok(Plmn::decode(aper::get_fixed_octets(d)?))
}

fn put_tac(d: &mut PerCodecData, tac: u32) -> PerResult<()> {
    if tac > 0x00FF_FFFF {
        return Err(format!("TAC {tac:#x} exceeds 24 bits"));
    }
    aper::put_fixed_octets(d, &tac.to_be_bytes()[1..])
}

fn get_tac(d: &mut PerCodecData) -> PerResult<u32> {
    let [a, b, c] = aper::get_fixed_octets::<3>(d)?;
    Ok(u32::from_be_bytes([0, a, b, c]))
}

// S-NSSAI ::= SEQUENCE { sST, sD OPTIONAL, iE-Extensions OPTIONAL, ... }
fn put_snssai(d: &mut PerCodecData, s_nssai: &SNssai) -> PerResult<()> {
    aper::put_sequence(d, &[s_nssai.sd.is_some()])?;
    aper::put_fixed_octets(d, &[s_nssai.sst])?;
    if let Some(sd) = &s_nssai.sd {
        aper::put_fixed_octets(d, sd)?;
    }
    Ok(())
}

fn get_snssai(d: &mut PerCodecData) -> PerResult<SNssai> {
    let seq = aper::get_sequence(d, 1)?;
    let [sst] = aper::get_fixed_octets::<1>(d)?;
    let sd = if seq.has(0) {
        Some(aper::get_fixed_octets::<3>(d)?)
    } else {
        None
    };
    seq.finish(d)?;
    Ok(SNssai { sst, sd })
}

/// SliceSupportItem and AllowedNSSAI-Item wrap a single S-NSSAI.
fn put_snssai_item(d: &mut PerCodecData, s_nssai: &SNssai) -> PerResult<()> {
    aper::put_sequence(d, &[])?;
    put_snssai(d, s_nssai)
}

fn get_snssai_item(d: &mut PerCodecData) -> PerResult<SNssai> {
    let seq = aper::get_sequence(d, 0)?;
    let s_nssai = get_snssai(d)?;
    seq.finish(d)?;
    Ok(s_nssai)
}

// GUAMI ::= SEQUENCE { pLMNIdentity, aMFRegionID, aMFSetID, aMFPointer, iE-Extensions, ... }
fn put_guami(d: &mut PerCodecData, guami: &Guami) -> PerResult<()> {
    aper::put_sequence(d, &[])?;
    put_plmn(d, &guami.plmn)?;
    aper::put_bits(d, u64::from(guami.amf_region_id), 8)?;
    aper::put_bits(d, u64::from(guami.amf_set_id), 10)?;
    aper::put_bits(d, u64::from(guami.amf_pointer), 6)
}

fn get_guami(d: &mut PerCodecData) -> PerResult<Guami> {
    let seq = aper::get_sequence(d, 0)?;
    let guami = Guami {
        plmn: get_plmn(d)?,
        amf_region_id: aper::get_bits(d, 8)? as u8,
        amf_set_id: aper::get_bits(d, 10)? as u16,
        amf_pointer: aper::get_bits(d, 6)? as u8,
    };
    seq.finish(d)?;
    Ok(guami)
}

// GlobalRANNodeID ::= CHOICE { globalGNB-ID, globalNgENB-ID, globalN3IWF-ID, choice-Extensions }
// GNB-ID ::= CHOICE { gNB-ID BIT STRING (SIZE(22..32)), choice-Extensions }
fn put_global_ran_node_id(d: &mut PerCodecData, node: &GlobalRanNodeId) -> PerResult<()> {
    if !(22..=32).contains(&node.gnb_id_length) {
        return Err(format!("gNB ID length {} outside 22..=32", node.gnb_id_length));
    }
    let width = usize::from(node.gnb_id_length);
    if width < 32 && node.gnb_id >> width != 0 {
        return Err(format!("gNB ID {:#x} wider than {width} bits", node.gnb_id));
    }
    aper::put_choice(d, 4, false, 0)?;
    aper::put_sequence(d, &[])?;
    put_plmn(d, &node.plmn)?;
    aper::put_choice(d, 2, false, 0)?;
    aper::put_bit_string(d, 22, 32, false, &aper::to_bits(u64::from(node.gnb_id), width))
}

fn get_global_ran_node_id(d: &mut PerCodecData) -> PerResult<GlobalRanNodeId> {
    let choice = aper::get_choice(d, 4, false)?;
    if choice != 0 {
        return Err(format!("unsupported GlobalRANNodeID alternative {choice}"));
    }
    let seq = aper::get_sequence(d, 0)?;
    let plmn = get_plmn(d)?;
    let choice = aper::get_choice(d, 2, false)?;
    if choice != 0 {
        return Err(format!("unsupported GNB-ID alternative {choice}"));
    }
    let bits = aper::get_bit_string(d, 22, 32, false)?;
    seq.finish(d)?;
    if !(22..=32).contains(&bits.len()) {
        return Err(format!("gNB ID length {} outside 22..=32", bits.len()));
    }
    Ok(GlobalRanNodeId {
        plmn,
        gnb_id: aper::from_bits(&bits) as u32,
        gnb_id_length: bits.len() as u8,
    })
}

// Cause ::= CHOICE { radioNetwork, transport, nas, protocol, misc, choice-Extensions }
fn put_cause(d: &mut PerCodecData, cause: Cause) -> PerResult<()> {
    let (group, value) = cause.group_and_value();
    let root = Cause::root(group);
    if value >= root {
        return Err(format!("cause {cause} is not a root value"));
    }
    aper::put_choice(d, 6, false, i128::from(group))?;
    aper::put_enumerated(d, i128::from(root), true, i128::from(value))
}

fn get_cause(d: &mut PerCodecData) -> PerResult<Cause> {
    let group = aper::get_choice(d, 6, false)? as u8;
    if group > 4 {
        return Err("cause extensions are not supported".into());
    }
    let value = aper::get_enumerated(d, i128::from(Cause::root(group)), true)?;
    let value = u8::try_from(value).map_err(|_| format!("cause value {value} out of range"))?;
    Cause::from_group_and_value(group, value).ok_or_else(|| format!("unknown cause group {group}"))
}

// UE-NGAP-IDs ::= CHOICE { uE-NGAP-ID-pair, aMF-UE-NGAP-ID, choice-Extensions }
fn put_ue_ngap_ids(d: &mut PerCodecData, ids: &UeNgapIds) -> PerResult<()> {
    match *ids {
        UeNgapIds::Pair {
            amf_ue_ngap_id,
            ran_ue_ngap_id,
        } => {
            aper::put_choice(d, 3, false, 0)?;
            aper::put_sequence(d, &[])?;
            put_amf_ue_ngap_id(d, amf_ue_ngap_id)?;
            aper::put_integer(d, 0, i128::from(u32::MAX), i128::from(ran_ue_ngap_id))
        }
        UeNgapIds::AmfOnly(amf_ue_ngap_id) => {
            aper::put_choice(d, 3, false, 1)?;
            put_amf_ue_ngap_id(d, amf_ue_ngap_id)
        }
    }
}

fn get_ue_ngap_ids(d: &mut PerCodecData) -> PerResult<UeNgapIds> {
    match aper::get_choice(d, 3, false)? {
        0 => {
            let seq = aper::get_sequence(d, 0)?;
            let ids = UeNgapIds::Pair {
                amf_ue_ngap_id: get_amf_ue_ngap_id(d)?,
                ran_ue_ngap_id: get_ran_ue_ngap_id(d)?,
            };
            seq.finish(d)?;
            Ok(ids)
        }
        1 => Ok(UeNgapIds::AmfOnly(get_amf_ue_ngap_id(d)?)),
        other => Err(format!("unsupported UE-NGAP-IDs alternative {other}")),
    }
}

/// BIT STRING (SIZE(16, ...)); bits past the first 16 are ignored.
fn get_algorithm_bitmap(d: &mut PerCodecData) -> PerResult<u16> {
    let bits = aper::get_bit_string(d, 16, 16, true)?;
    if bits.len() < 16 {
        return Err(format!("algorithm bitmap of {} bits", bits.len()));
    }
    Ok(aper::from_bits(&bits[..16]) as u16)
}

// UserLocationInformation ::= CHOICE { EUTRA, NR, N3IWF, choice-Extensions }
// UserLocationInformationNR ::= SEQUENCE { nR-CGI, tAI, timeStamp OPTIONAL, iE-Extensions, ... }
fn put_user_location_information(
    d: &mut PerCodecData,
    uli: &UserLocationInformation,
) -> PerResult<()> {
    aper::put_choice(d, 4, false, 1)?;
    aper::put_sequence(d, &[false])?;
    aper::put_sequence(d, &[])?;
    put_plmn(d, &uli.nr_cgi.plmn)?;
    aper::put_bits(d, uli.nr_cgi.nr_cell_identity, 36)?;
    aper::put_sequence(d, &[])?;
    put_plmn(d, &uli.tai.plmn)?;
    put_tac(d, uli.tai.tac)
}

fn get_user_location_information(d: &mut PerCodecData) -> PerResult<UserLocationInformation> {
    let choice = aper::get_choice(d, 4, false)?;
    if choice != 1 {
        return Err(format!("unsupported user location alternative {choice}"));
    }
    let seq = aper::get_sequence(d, 1)?;

    let cgi = aper::get_sequence(d, 0)?;
    let nr_cgi = NrCgi {
        plmn: get_plmn(d)?,
        nr_cell_identity: aper::get_bits(d, 36)?,
    };
    cgi.finish(d)?;

    let tai_seq = aper::get_sequence(d, 0)?;
    let tai = Tai::new(get_plmn(d)?, get_tac(d)?);
    tai_seq.finish(d)?;

    if seq.has(0) {
        // TimeStamp ::= OCTET STRING (SIZE(4))
        aper::get_fixed_octets::<4>(d)?;
    }
    seq.finish(d)?;
    Ok(UserLocationInformation { nr_cgi, tai })
}

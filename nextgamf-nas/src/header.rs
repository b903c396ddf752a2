//! NAS message headers
//!
//! ## Plain 5GMM Header (3 bytes)
//! ```text
//! +------------------+------------------+------------------+
//! |       EPD        |  Security Header |   Message Type   |
//! |     (1 byte)     |  Type (4 bits)   |    (1 byte)      |
//! +------------------+------------------+------------------+
//! ```
//!
//! ## Plain 5GSM Header (4 bytes)
//! ```text
//! +------------------+------------------+------------------+------------------+
//! |       EPD        | PDU Session ID   |       PTI        |   Message Type   |
//! +------------------+------------------+------------------+------------------+
//! ```

use bytes::{Buf, BufMut};

use crate::enums::{ExtendedProtocolDiscriminator, MmMessageType, SecurityHeaderType, SmMessageType};
use crate::error::{NasError, Result};

fn need<B: Buf>(buf: &B, expected: usize) -> Result<()> {
    if buf.remaining() < expected {
        return Err(NasError::BufferTooShort {
            expected,
            actual: buf.remaining(),
        });
    }
    Ok(())
}

/// Plain 5GMM NAS message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainMmHeader {
    pub message_type: MmMessageType,
}

impl PlainMmHeader {
    pub const SIZE: usize = 3;

    pub fn new(message_type: MmMessageType) -> Self {
        Self { message_type }
    }

    /// Decodes the header after the EPD octet has been consumed.
    fn decode_after_epd<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, Self::SIZE - 1)?;
        let sht_byte = buf.get_u8();
        let sht = SecurityHeaderType::try_from(sht_byte & 0x0F)
            .map_err(|_| NasError::InvalidSecurityHeaderType(sht_byte))?;
        if sht.is_protected() {
            return Err(NasError::ProtectedMessage);
        }
        let mt_byte = buf.get_u8();
        let message_type =
            MmMessageType::try_from(mt_byte).map_err(|_| NasError::UnknownMessageType(mt_byte))?;
        Ok(Self { message_type })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(ExtendedProtocolDiscriminator::MobilityManagement.into());
        buf.put_u8(SecurityHeaderType::NotProtected.into());
        buf.put_u8(self.message_type.into());
    }
}

/// Plain 5GSM NAS message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlainSmHeader {
    pub pdu_session_id: u8,
    /// Procedure transaction identity
    pub pti: u8,
    pub message_type: SmMessageType,
}

impl PlainSmHeader {
    pub const SIZE: usize = 4;

    pub fn new(pdu_session_id: u8, pti: u8, message_type: SmMessageType) -> Self {
        Self {
            pdu_session_id,
            pti,
            message_type,
        }
    }

    fn decode_after_epd<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, Self::SIZE - 1)?;
        let pdu_session_id = buf.get_u8();
        let pti = buf.get_u8();
        let mt_byte = buf.get_u8();
        let message_type =
            SmMessageType::try_from(mt_byte).map_err(|_| NasError::UnknownMessageType(mt_byte))?;
        Ok(Self {
            pdu_session_id,
            pti,
            message_type,
        })
    }

    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        buf.put_u8(ExtendedProtocolDiscriminator::SessionManagement.into());
        buf.put_u8(self.pdu_session_id);
        buf.put_u8(self.pti);
        buf.put_u8(self.message_type.into());
    }
}

/// Either header, selected by the EPD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NasHeader {
    Mm(PlainMmHeader),
    Sm(PlainSmHeader),
}

impl NasHeader {
    pub fn decode<B: Buf>(buf: &mut B) -> Result<Self> {
        need(buf, 1)?;
        let epd_byte = buf.get_u8();
        match ExtendedProtocolDiscriminator::try_from(epd_byte) {
            Ok(ExtendedProtocolDiscriminator::MobilityManagement) => {
                PlainMmHeader::decode_after_epd(buf).map(NasHeader::Mm)
            }
            Ok(ExtendedProtocolDiscriminator::SessionManagement) => {
                PlainSmHeader::decode_after_epd(buf).map(NasHeader::Sm)
            }
            Err(_) => Err(NasError::InvalidEpd(epd_byte)),
        }
    }
}

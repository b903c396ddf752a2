//! NAS message bodies

pub mod mm;
pub mod sm;

pub use mm::*;
pub use sm::*;

use crate::error::Result;
use crate::ies::IeReader;

/// Body encoding after the plain header.
pub(crate) trait MessageBody: Sized {
    fn encode_body(&self, out: &mut Vec<u8>) -> Result<()>;
    fn decode_body(r: &mut IeReader<'_>) -> Result<Self>;
}

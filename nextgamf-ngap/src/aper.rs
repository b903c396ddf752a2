//! Aligned PER building blocks over `asn1-codecs`
//!
//! Most NGAP structures are extensible SEQUENCEs whose last optional
//! component is an `iE-Extensions` container. [`put_sequence`] and
//! [`get_sequence`] encode that shape; extension containers received from a
//! peer are skipped, never produced.

use std::fmt::Debug;

use asn1_codecs::aper::{decode, encode};
use asn1_codecs::PerCodecData;
use bitvec::prelude::*;

/// BIT STRING value as exchanged with the codec.
pub type Bits = BitVec<u8, Msb0>;

/// Failures carry a reason; the caller knows which IE it was decoding.
pub type PerResult<T> = Result<T, String>;

/// maxProtocolExtensions
const MAX_PROTOCOL_EXTENSIONS: i128 = 65535;

fn lift<T, E: Debug>(result: Result<T, E>) -> PerResult<T> {
    result.map_err(|e| format!("{e:?}"))
}

fn check_range(value: i128, lb: i128, ub: i128) -> PerResult<()> {
    if (lb..=ub).contains(&value) {
        Ok(())
    } else {
        Err(format!("{value} outside {lb}..={ub}"))
    }
}

/// Constrained, non-extensible INTEGER.
pub fn put_integer(data: &mut PerCodecData, lb: i128, ub: i128, value: i128) -> PerResult<()> {
    check_range(value, lb, ub)?;
    lift(encode::encode_integer(data, Some(lb), Some(ub), false, value, false))
}

pub fn get_integer(data: &mut PerCodecData, lb: i128, ub: i128) -> PerResult<i128> {
    let (value, _) = lift(decode::decode_integer(data, Some(lb), Some(ub), false))?;
    check_range(value, lb, ub)?;
    Ok(value)
}

/// ENUMERATED with `root` values, extension values are never sent.
pub fn put_enumerated(
    data: &mut PerCodecData,
    root: i128,
    extensible: bool,
    value: i128,
) -> PerResult<()> {
    check_range(value, 0, root - 1)?;
    lift(encode::encode_enumerated(
        data,
        Some(0),
        Some(root - 1),
        extensible,
        value,
        false,
    ))
}

/// Root index, or `root + n` for the n-th extension value.
pub fn get_enumerated(data: &mut PerCodecData, root: i128, extensible: bool) -> PerResult<i128> {
    let (value, extended) = lift(decode::decode_enumerated(
        data,
        Some(0),
        Some(root - 1),
        extensible,
    ))?;
    if extended {
        return Ok(root + value);
    }
    check_range(value, 0, root - 1)?;
    Ok(value)
}

/// CHOICE index among `alternatives` root alternatives.
pub fn put_choice(
    data: &mut PerCodecData,
    alternatives: i128,
    extensible: bool,
    index: i128,
) -> PerResult<()> {
    check_range(index, 0, alternatives - 1)?;
    lift(encode::encode_choice_idx(
        data,
        0,
        alternatives - 1,
        extensible,
        index,
        false,
    ))
}

pub fn get_choice(data: &mut PerCodecData, alternatives: i128, extensible: bool) -> PerResult<i128> {
    let (index, extended) = lift(decode::decode_choice_idx(
        data,
        0,
        alternatives - 1,
        extensible,
    ))?;
    if extended {
        return Err(format!("extension alternative {index}"));
    }
    check_range(index, 0, alternatives - 1)?;
    Ok(index)
}

/// Header of an extensible SEQUENCE. `present` flags its optional
/// components in order; the trailing `iE-Extensions` is always absent.
pub fn put_sequence(data: &mut PerCodecData, present: &[bool]) -> PerResult<()> {
    let mut optionals = Bits::with_capacity(present.len() + 1);
    optionals.extend(present.iter().copied());
    optionals.push(false);
    lift(encode::encode_sequence_header(data, true, &optionals, false))
}

/// Header of a message body: an extensible SEQUENCE holding only its
/// `protocolIEs` container.
pub fn put_body_header(data: &mut PerCodecData) -> PerResult<()> {
    lift(encode::encode_sequence_header(data, true, &Bits::new(), false))
}

pub fn get_body_header(data: &mut PerCodecData) -> PerResult<()> {
    let (_, extended) = lift(decode::decode_sequence_header(data, true, 0))?;
    if extended {
        return Err("extension additions are not supported".into());
    }
    Ok(())
}

/// Decoded header of a SEQUENCE laid out as by [`put_sequence`].
#[derive(Debug)]
pub struct Sequence {
    optionals: Bits,
}

/// Reads the header of an extensible SEQUENCE with `optional` optional
/// components before its `iE-Extensions`.
pub fn get_sequence(data: &mut PerCodecData, optional: usize) -> PerResult<Sequence> {
    let (optionals, extended) = lift(decode::decode_sequence_header(data, true, optional + 1))?;
    if extended {
        return Err("extension additions are not supported".into());
    }
    Ok(Sequence { optionals })
}

impl Sequence {
    /// Presence of the `index`-th optional component.
    pub fn has(&self, index: usize) -> bool {
        self.optionals.get(index).map(|bit| *bit).unwrap_or(false)
    }

    /// Consumes the `iE-Extensions` container if the sender included one.
    pub fn finish(self, data: &mut PerCodecData) -> PerResult<()> {
        if self.has(self.optionals.len().saturating_sub(1)) {
            skip_extensions(data)?;
        }
        Ok(())
    }
}

fn skip_extensions(data: &mut PerCodecData) -> PerResult<()> {
    let count = get_count(data, 1, MAX_PROTOCOL_EXTENSIONS)?;
    for _ in 0..count {
        get_integer(data, 0, 65535)?;
        get_enumerated(data, 3, false)?;
        get_open(data)?;
    }
    Ok(())
}

/// Size of a SEQUENCE OF constrained to `lb..=ub` items.
pub fn put_count(data: &mut PerCodecData, lb: i128, ub: i128, count: usize) -> PerResult<()> {
    check_range(count as i128, lb, ub)?;
    lift(encode::encode_length_determinent(
        data,
        Some(lb),
        Some(ub),
        false,
        count,
    ))
}

pub fn get_count(data: &mut PerCodecData, lb: i128, ub: i128) -> PerResult<usize> {
    let count = lift(decode::decode_length_determinent(data, Some(lb), Some(ub), false))?;
    check_range(count as i128, lb, ub)?;
    Ok(count)
}

/// Unconstrained OCTET STRING.
pub fn put_octets(data: &mut PerCodecData, octets: &[u8]) -> PerResult<()> {
    lift(encode::encode_octetstring(
        data,
        None,
        None,
        false,
        &octets.to_vec(),
        false,
    ))
}

pub fn get_octets(data: &mut PerCodecData) -> PerResult<Vec<u8>> {
    lift(decode::decode_octetstring(data, None, None, false))
}

/// OCTET STRING (SIZE(n)) with n the length of `octets`.
pub fn put_fixed_octets(data: &mut PerCodecData, octets: &[u8]) -> PerResult<()> {
    let size = octets.len() as i128;
    lift(encode::encode_octetstring(
        data,
        Some(size),
        Some(size),
        false,
        &octets.to_vec(),
        false,
    ))
}

pub fn get_fixed_octets<const N: usize>(data: &mut PerCodecData) -> PerResult<[u8; N]> {
    let size = N as i128;
    let octets = lift(decode::decode_octetstring(data, Some(size), Some(size), false))?;
    let len = octets.len();
    octets
        .try_into()
        .map_err(|_| format!("expected {N} octets, got {len}"))
}

/// BIT STRING (SIZE(lb..ub[, ...])).
pub fn put_bit_string(
    data: &mut PerCodecData,
    lb: i128,
    ub: i128,
    extensible: bool,
    bits: &BitSlice<u8, Msb0>,
) -> PerResult<()> {
    check_range(bits.len() as i128, lb, ub)?;
    lift(encode::encode_bitstring(
        data,
        Some(lb),
        Some(ub),
        extensible,
        bits,
        false,
    ))
}

pub fn get_bit_string(
    data: &mut PerCodecData,
    lb: i128,
    ub: i128,
    extensible: bool,
) -> PerResult<Bits> {
    lift(decode::decode_bitstring(data, Some(lb), Some(ub), extensible))
}

/// BIT STRING (SIZE(width)) holding the low `width` bits of `value`.
pub fn put_bits(data: &mut PerCodecData, value: u64, width: usize) -> PerResult<()> {
    if width < 64 && value >> width != 0 {
        return Err(format!("{value:#x} wider than {width} bits"));
    }
    put_bit_string(data, width as i128, width as i128, false, &to_bits(value, width))
}

pub fn get_bits(data: &mut PerCodecData, width: usize) -> PerResult<u64> {
    let bits = get_bit_string(data, width as i128, width as i128, false)?;
    if bits.len() != width {
        return Err(format!("expected {width} bits, got {}", bits.len()));
    }
    Ok(from_bits(&bits))
}

/// The low `width` bits of `value`, most significant first.
pub fn to_bits(value: u64, width: usize) -> Bits {
    (0..width).rev().map(|i| (value >> i) & 1 == 1).collect()
}

pub fn from_bits(bits: &BitSlice<u8, Msb0>) -> u64 {
    bits.iter().fold(0, |acc, bit| (acc << 1) | u64::from(*bit))
}

/// PrintableString (SIZE(lb..ub, ...)).
pub fn put_printable(data: &mut PerCodecData, lb: i128, ub: i128, value: &str) -> PerResult<()> {
    check_range(value.len() as i128, lb, ub)?;
    lift(encode::encode_printable_string(
        data,
        Some(lb),
        Some(ub),
        true,
        &value.to_string(),
        false,
    ))
}

pub fn get_printable(data: &mut PerCodecData, lb: i128, ub: i128) -> PerResult<String> {
    lift(decode::decode_printable_string(data, Some(lb), Some(ub), true))
}

/// Open type: a complete inner encoding carried as an unconstrained
/// octet string.
pub fn put_open(data: &mut PerCodecData, inner: &[u8]) -> PerResult<()> {
    if inner.is_empty() {
        // an empty encoding still occupies one octet
        return put_octets(data, &[0]);
    }
    put_octets(data, inner)
}

pub fn get_open(data: &mut PerCodecData) -> PerResult<Vec<u8>> {
    get_octets(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(put: impl FnOnce(&mut PerCodecData) -> PerResult<()>) -> Vec<u8> {
        let mut data = PerCodecData::new_aper();
        put(&mut data).unwrap();
        data.into_bytes()
    }

    #[test]
    fn test_bits_conversion() {
        let bits = to_bits(0b10_1100, 6);
        assert_eq!(bits.len(), 6);
        assert!(bits[0] && !bits[1] && bits[2] && bits[3]);
        assert_eq!(from_bits(&bits), 0b10_1100);
        assert_eq!(from_bits(&to_bits(u64::from(u32::MAX), 32)), u64::from(u32::MAX));
    }

    #[test]
    fn test_two_octet_integer_is_aligned() {
        // ProtocolIE-ID 38 after a two-bit sequence preamble starts on the next octet
        let bytes = encoded(|data| {
            put_sequence(data, &[])?;
            put_integer(data, 0, 65535, 38)
        });
        assert_eq!(bytes, vec![0x00, 0x00, 0x26]);
    }

    #[test]
    fn test_out_of_range_rejected_before_encoding() {
        let mut data = PerCodecData::new_aper();
        assert!(put_integer(&mut data, 0, 255, 256).is_err());
        assert!(put_enumerated(&mut data, 4, true, 4).is_err());
        assert!(put_choice(&mut data, 3, false, 3).is_err());
        assert!(put_bits(&mut data, 0x40, 6).is_err());
        assert!(put_count(&mut data, 1, 8, 0).is_err());
        assert!(put_printable(&mut data, 1, 150, "").is_err());
    }

    #[test]
    fn test_open_type_round_trip() {
        let mut inner = PerCodecData::new_aper();
        put_integer(&mut inner, 0, 4_294_967_295, 7).unwrap();
        let inner = inner.into_bytes();

        let bytes = encoded(|data| put_open(data, &inner));
        assert_eq!(bytes[0] as usize, inner.len());

        let mut data = PerCodecData::from_slice_aper(&bytes);
        let carried = get_open(&mut data).unwrap();
        assert_eq!(carried, inner);
        let mut data = PerCodecData::from_slice_aper(&carried);
        assert_eq!(get_integer(&mut data, 0, 4_294_967_295).unwrap(), 7);
    }

    #[test]
    fn test_sequence_presence() {
        let bytes = encoded(|data| {
            put_sequence(data, &[true, false])?;
            put_fixed_octets(data, &[0xAB])
        });
        let mut data = PerCodecData::from_slice_aper(&bytes);
        let seq = get_sequence(&mut data, 2).unwrap();
        assert!(seq.has(0));
        assert!(!seq.has(1));
        assert_eq!(get_fixed_octets::<1>(&mut data).unwrap(), [0xAB]);
        seq.finish(&mut data).unwrap();
    }

    #[test]
    fn test_printable_round_trip() {
        let bytes = encoded(|data| put_printable(data, 1, 150, "amf-1"));
        let mut data = PerCodecData::from_slice_aper(&bytes);
        assert_eq!(get_printable(&mut data, 1, 150).unwrap(), "amf-1");
    }
}

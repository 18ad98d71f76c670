//! CESU-8: UTF-8 applied to UTF-16 code units one at a time
//!
//! Supplementary characters are written as two three-byte sequences, one per
//! surrogate, which makes this the cheap multi-byte shape: every code unit
//! maps to a fixed byte sequence without looking at its neighbours.

use crate::descriptor::{CheapMultiByteCodec, ConverterDescriptor, Progress, Shape, Sink};
use crate::unicode::REPLACEMENT;
use crate::Encoding;

pub(crate) static DESCRIPTOR: ConverterDescriptor = ConverterDescriptor {
    encoding: Encoding::CESU8,
    shape: Shape::CheapMultiByte(CheapMultiByteCodec { to_bytes, to_unit, is_truncated }),
    max_bytes_per_unit: 3,
    max_decomposed_units: 1,
    to_bytes_fallback: None,
    to_units_fallback: Some(replacement_fallback),
    precompose: None,
    is_valid_combining: None,
};

fn to_bytes(unit: u16, out: &mut [u8; 4]) -> usize {
    match unit {
        0..=0x7F => {
            out[0] = unit as u8;
            1
        }
        0x80..=0x7FF => {
            out[0] = 0xC0 | (unit >> 6) as u8;
            out[1] = 0x80 | (unit & 0x3F) as u8;
            2
        }
        _ => {
            out[0] = 0xE0 | (unit >> 12) as u8;
            out[1] = 0x80 | ((unit >> 6) & 0x3F) as u8;
            out[2] = 0x80 | (unit & 0x3F) as u8;
            3
        }
    }
}

#[inline]
fn is_continuation(byte: u8) -> bool {
    byte & 0xC0 == 0x80
}

/// One unit from the leading bytes, rejecting overlong and truncated forms
fn to_unit(bytes: &[u8]) -> Option<(usize, u16)> {
    match *bytes {
        [lead @ 0x00..=0x7F, ..] => Some((1, u16::from(lead))),
        [lead @ 0xC2..=0xDF, second, ..] if is_continuation(second) => {
            Some((2, (u16::from(lead & 0x1F) << 6) | u16::from(second & 0x3F)))
        }
        [lead @ 0xE0..=0xEF, second, third, ..] if is_continuation(second) && is_continuation(third) => {
            let unit = (u16::from(lead & 0x0F) << 12)
                | (u16::from(second & 0x3F) << 6)
                | u16::from(third & 0x3F);
            (unit >= 0x800).then_some((3, unit))
        }
        _ => None,
    }
}

/// Whether `bytes` is a valid sequence missing its last bytes
fn is_truncated(bytes: &[u8]) -> bool {
    match *bytes {
        [0xC2..=0xDF] | [0xE0..=0xEF] => true,
        [0xE0, second] => (0xA0..=0xBF).contains(&second),
        [0xE1..=0xEF, second] => is_continuation(second),
        _ => false,
    }
}

fn replacement_fallback(bytes: &[u8], out: &mut Sink<'_, u16>) -> Progress {
    if bytes.is_empty() {
        return Progress::complete(0, 0);
    }
    if !out.push(REPLACEMENT) {
        return Progress::insufficient(0, 0);
    }
    Progress::complete(1, 1)
}

//! Non-lossy escaped ASCII
//!
//! Printable and control ASCII passes through unchanged. A backslash is
//! doubled, other units below 0x100 become `\ooo` (three octal digits) and
//! everything else becomes `\uXXXX`. Any code unit survives the round trip,
//! unpaired surrogates included.

use crate::descriptor::{CodecFlags, ConverterDescriptor, MAX_DECOMPOSITION, Progress, Shape, Sink, StandardCodec};
use crate::unicode;
use crate::Encoding;

pub(crate) static DESCRIPTOR: ConverterDescriptor = ConverterDescriptor {
    encoding: Encoding::NON_LOSSY_ASCII,
    shape: Shape::Standard(StandardCodec { to_bytes: encode, to_units: decode }),
    max_bytes_per_unit: 6,
    max_decomposed_units: 3,
    to_bytes_fallback: None,
    to_units_fallback: None,
    precompose: None,
    is_valid_combining: None,
};

const HEX: &[u8; 16] = b"0123456789abcdef";

fn escape(unit: u16, buf: &mut [u8; 6]) -> usize {
    match unit {
        0x5C => {
            buf[..2].copy_from_slice(b"\\\\");
            2
        }
        0..=0x7F => {
            buf[0] = unit as u8;
            1
        }
        0x80..=0xFF => {
            buf[0] = b'\\';
            buf[1] = b'0' + ((unit >> 6) & 0o7) as u8;
            buf[2] = b'0' + ((unit >> 3) & 0o7) as u8;
            buf[3] = b'0' + (unit & 0o7) as u8;
            4
        }
        _ => {
            buf[0] = b'\\';
            buf[1] = b'u';
            for (i, slot) in buf[2..6].iter_mut().enumerate() {
                *slot = HEX[usize::from((unit >> (12 - 4 * i)) & 0xF)];
            }
            6
        }
    }
}

pub(crate) fn encode(units: &[u16], out: &mut Sink<'_, u8>, _flags: CodecFlags) -> Progress {
    let mut buf = [0u8; 6];
    for (consumed, &unit) in units.iter().enumerate() {
        let len = escape(unit, &mut buf);
        if !out.extend(&buf[..len]) {
            return Progress::insufficient(consumed, out.written());
        }
    }
    Progress::complete(units.len(), out.written())
}

/// Parse one escape or literal byte, returning `(bytes used, unit)`
fn unescape(bytes: &[u8]) -> Option<(usize, u16)> {
    match *bytes {
        [b'\\', b'\\', ..] => Some((2, 0x5C)),
        [b'\\', b'u', ref rest @ ..] => {
            let digits = rest.get(..4)?;
            let mut unit = 0u16;
            for &digit in digits {
                unit = (unit << 4) | char::from(digit).to_digit(16)? as u16;
            }
            Some((6, unit))
        }
        [b'\\', ref rest @ ..] => {
            let digits = rest.get(..3)?;
            let mut unit = 0u16;
            for &digit in digits {
                if !(b'0'..=b'7').contains(&digit) {
                    return None;
                }
                unit = (unit << 3) | u16::from(digit - b'0');
            }
            (unit <= 0xFF).then_some((4, unit))
        }
        [byte, ..] if byte.is_ascii() => Some((1, u16::from(byte))),
        _ => None,
    }
}

/// Whether `bytes` is an escape cut off before its last digit
fn is_truncated(bytes: &[u8]) -> bool {
    match *bytes {
        [b'\\'] => true,
        [b'\\', b'u', ref digits @ ..] => digits.len() < 4 && digits.iter().all(u8::is_ascii_hexdigit),
        [b'\\', first, ref rest @ ..] => {
            rest.len() < 2 && (b'0'..=b'3').contains(&first) && rest.iter().all(|d| (b'0'..=b'7').contains(d))
        }
        _ => false,
    }
}

pub(crate) fn decode(bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress {
    let mut consumed = 0;
    let mut expanded = [0u16; MAX_DECOMPOSITION];
    while consumed < bytes.len() {
        let tail = &bytes[consumed..];
        let Some((used, unit)) = unescape(tail) else {
            if flags.partial && is_truncated(tail) {
                return Progress::complete(consumed, out.written());
            }
            return Progress::invalid(consumed, out.written());
        };
        let fits = match flags.canonical {
            Some(mode) if !unicode::is_surrogate(unit) => {
                let len = unicode::decompose(u32::from(unit), mode, &mut expanded);
                out.extend(&expanded[..len])
            }
            _ => out.push(unit),
        };
        if !fits {
            return Progress::insufficient(consumed, out.written());
        }
        consumed += used;
    }
    Progress::complete(consumed, out.written())
}

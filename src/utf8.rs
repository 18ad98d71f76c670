//! UTF-8 codec
//!
//! The reference implementation of the standard converter shape. Encoding
//! pairs surrogates into one scalar and writes it with the classic
//! leading-byte scheme; decoding validates each sequence against a 256-entry
//! trailing-byte table and the continuation-byte rules for E0, ED, F0 and F4.

use crate::descriptor::{
    CodecFlags, ConverterDescriptor, MAX_DECOMPOSITION, Progress, Shape, Sink, StandardCodec,
};
use crate::unicode::{self, REPLACEMENT};
use crate::Encoding;

/// Registry entry for UTF-8
pub static DESCRIPTOR: ConverterDescriptor = ConverterDescriptor {
    encoding: Encoding::UTF8,
    shape: Shape::Standard(StandardCodec { to_bytes: encode, to_units: decode }),
    max_bytes_per_unit: 3,
    max_decomposed_units: 3,
    to_bytes_fallback: None,
    to_units_fallback: Some(replacement_fallback),
    precompose: None,
    is_valid_combining: None,
};

/// Number of continuation bytes announced by each leading byte.
static TRAILING_BYTES: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = match i {
            0xC0..=0xDF => 1,
            0xE0..=0xEF => 2,
            0xF0..=0xF7 => 3,
            0xF8..=0xFB => 4,
            0xFC..=0xFF => 5,
            _ => 0,
        };
        i += 1;
    }
    table
};

/// Accumulated marker bits to strip after summing a sequence.
const OFFSETS: [u32; 6] = [
    0x0000_0000,
    0x0000_3080,
    0x000E_2080,
    0x03C8_2080,
    0xFA08_2080,
    0x8208_2080,
];

const FIRST_BYTE_MARK: [u8; 7] = [0x00, 0x00, 0xC0, 0xE0, 0xF0, 0xF8, 0xFC];

/// Stray byte accepted as U+00A9 even where it would be a bare continuation
/// byte; older writers emitted it unescaped.
const LEGACY_COPYRIGHT: u8 = 0xA9;

fn encode_scalar(scalar: u32, buf: &mut [u8; 6]) -> usize {
    let len = match scalar {
        0..=0x7F => 1,
        0x80..=0x7FF => 2,
        0x800..=0xFFFF => 3,
        0x1_0000..=0x1F_FFFF => 4,
        0x20_0000..=0x3FF_FFFF => 5,
        _ => 6,
    };
    let mut value = scalar;
    for slot in buf[1..len].iter_mut().rev() {
        *slot = (value & 0x3F) as u8 | 0x80;
        value >>= 6;
    }
    buf[0] = value as u8 | FIRST_BYTE_MARK[len];
    len
}

fn is_legal_second(lead: u8, second: u8) -> bool {
    if !(0x80..=0xBF).contains(&second) {
        return false;
    }
    match lead {
        0xE0 => second >= 0xA0,
        0xED => second <= 0x9F,
        0xF0 => second >= 0x90,
        0xF4 => second <= 0x8F,
        _ => true,
    }
}

fn is_legal(seq: &[u8]) -> bool {
    let lead = seq[0];
    if seq.len() > 4 || (0x80..0xC2).contains(&lead) || lead > 0xF4 {
        return false;
    }
    if seq.len() >= 2 && !is_legal_second(lead, seq[1]) {
        return false;
    }
    seq.iter().skip(2).all(|b| (0x80..=0xBF).contains(b))
}

/// Length of the maximal invalid subpart at the start of `bytes`
fn invalid_sequence_len(bytes: &[u8]) -> usize {
    let lead = bytes[0];
    let extra = usize::from(TRAILING_BYTES[usize::from(lead)]);
    if extra == 0 || extra > 3 || lead < 0xC2 || lead > 0xF4 {
        return 1;
    }
    let mut len = 1;
    while len <= extra && len < bytes.len() {
        let valid = if len == 1 {
            is_legal_second(lead, bytes[1])
        } else {
            (0x80..=0xBF).contains(&bytes[len])
        };
        if !valid {
            break;
        }
        len += 1;
    }
    len
}

/// Whether `tail` is the valid start of a sequence cut off by the end of input
fn is_truncated(tail: &[u8]) -> bool {
    let lead = tail[0];
    (0xC2..=0xF4).contains(&lead)
        && tail.len() <= usize::from(TRAILING_BYTES[usize::from(lead)])
        && invalid_sequence_len(tail) == tail.len()
}

/// Encode UTF-16 units as UTF-8
///
/// Unpaired surrogates stop conversion unless `flags.lenient` is set, in which
/// case they are written as U+FFFD. With `flags.partial`, a high surrogate
/// ending the input is left unconsumed for the next call.
pub fn encode(units: &[u16], out: &mut Sink<'_, u8>, flags: CodecFlags) -> Progress {
    let mut buf = [0u8; 6];
    let mut i = 0;
    while i < units.len() {
        let (mut scalar, len) = unicode::scalar_at(&units[i..]);
        if len == 1 && unicode::is_surrogate(units[i]) {
            if flags.partial && i + 1 == units.len() && unicode::is_high_surrogate(units[i]) {
                return Progress::complete(i, out.written());
            }
            if !flags.lenient {
                return Progress::invalid(i, out.written());
            }
            scalar = u32::from(REPLACEMENT);
        }
        let n = encode_scalar(scalar, &mut buf);
        if !out.extend(&buf[..n]) {
            return Progress::insufficient(i, out.written());
        }
        i += len;
    }
    Progress::complete(i, out.written())
}

/// Decode UTF-8 into UTF-16 units
///
/// With `flags.canonical` set, decomposable scalars are written in their
/// canonical decomposition. With `flags.partial` set, a sequence cut off by the
/// end of `bytes` is left unconsumed.
pub fn decode(bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress {
    let mut units = [0u16; MAX_DECOMPOSITION];
    let mut i = 0;
    while i < bytes.len() {
        let lead = bytes[i];
        if lead < 0x80 {
            if !out.push(u16::from(lead)) {
                return Progress::insufficient(i, out.written());
            }
            i += 1;
            continue;
        }

        let extra = usize::from(TRAILING_BYTES[usize::from(lead)]);
        let seq_len = extra + 1;
        let legal = i + seq_len <= bytes.len() && is_legal(&bytes[i..i + seq_len]);
        if !legal {
            if flags.partial && is_truncated(&bytes[i..]) {
                return Progress::complete(i, out.written());
            }
            if lead == LEGACY_COPYRIGHT {
                if !out.push(u16::from(LEGACY_COPYRIGHT)) {
                    return Progress::insufficient(i, out.written());
                }
                i += 1;
                continue;
            }
            return Progress::invalid(i, out.written());
        }

        let scalar = bytes[i..i + seq_len]
            .iter()
            .fold(0u32, |acc, &b| (acc << 6).wrapping_add(u32::from(b)))
            .wrapping_sub(OFFSETS[extra]);
        let n = match flags.canonical {
            Some(mode) => unicode::decompose(scalar, mode, &mut units),
            None => {
                let mut pair = [0u16; 2];
                let n = unicode::encode_utf16(scalar, &mut pair);
                units[..n].copy_from_slice(&pair[..n]);
                n
            }
        };
        if !out.extend(&units[..n]) {
            return Progress::insufficient(i, out.written());
        }
        i += seq_len;
    }
    Progress::complete(i, out.written())
}

/// Bytes `units` would encode to, without writing them
pub fn encoded_len(units: &[u16], flags: CodecFlags) -> Progress {
    encode(units, &mut Sink::measure(), flags)
}

/// Units `bytes` would decode to, without writing them
pub fn decoded_len(bytes: &[u8], flags: CodecFlags) -> Progress {
    decode(bytes, &mut Sink::measure(), flags)
}

fn replacement_fallback(bytes: &[u8], out: &mut Sink<'_, u16>) -> Progress {
    if !out.push(REPLACEMENT) {
        return Progress::insufficient(0, 0);
    }
    Progress::complete(invalid_sequence_len(bytes), 1)
}

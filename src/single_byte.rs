//! Table-driven 8-bit codecs
//!
//! ASCII, ISO-8859-1, ISO-8859-15 and Windows-1252 use the cheap eight-bit
//! shape (one byte per unit). Mac OS Roman uses the standard eight-bit shape so
//! a base letter followed by a combining mark can still map to one byte.

use crate::descriptor::{
    CheapEightBitCodec, ConverterDescriptor, MAX_DECOMPOSITION, Progress, Shape, Sink,
    StandardEightBitCodec,
};
use crate::tables::{self, ISO_8859_1_HIGH, ISO_8859_15_HIGH, MAC_ROMAN_HIGH, WINDOWS_1252_HIGH};
use crate::unicode;
use crate::Encoding;

macro_rules! table_codec {
    ($descriptor:ident, $encoding:expr, $table:ident, $to_byte:ident, $to_unit:ident, $precompose:ident) => {
        fn $to_byte(unit: u16) -> Option<u8> {
            tables::reverse_lookup(&$table, unit)
        }

        fn $to_unit(byte: u8) -> Option<u16> {
            tables::lookup(&$table, byte)
        }

        fn $precompose(units: &[u16], out: &mut Sink<'_, u8>) -> Progress {
            precompose_with(units, out, $to_byte)
        }

        pub(crate) static $descriptor: ConverterDescriptor = ConverterDescriptor {
            encoding: $encoding,
            shape: Shape::CheapEightBit(CheapEightBitCodec { to_byte: $to_byte, to_unit: $to_unit }),
            max_bytes_per_unit: 1,
            max_decomposed_units: 2,
            to_bytes_fallback: None,
            to_units_fallback: None,
            precompose: Some($precompose),
            is_valid_combining: Some(unicode::is_combining),
        };
    };
}

table_codec!(ISO_8859_1, Encoding::ISO_8859_1, ISO_8859_1_HIGH, latin1_to_byte, latin1_to_unit, latin1_precompose);
table_codec!(ISO_8859_15, Encoding::ISO_8859_15, ISO_8859_15_HIGH, latin9_to_byte, latin9_to_unit, latin9_precompose);
table_codec!(WINDOWS_1252, Encoding::WINDOWS_1252, WINDOWS_1252_HIGH, cp1252_to_byte, cp1252_to_unit, cp1252_precompose);

fn ascii_to_byte(unit: u16) -> Option<u8> {
    u8::try_from(unit).ok().filter(u8::is_ascii)
}

fn ascii_to_unit(byte: u8) -> Option<u16> {
    byte.is_ascii().then_some(u16::from(byte))
}

pub(crate) static ASCII: ConverterDescriptor = ConverterDescriptor {
    encoding: Encoding::ASCII,
    shape: Shape::CheapEightBit(CheapEightBitCodec { to_byte: ascii_to_byte, to_unit: ascii_to_unit }),
    max_bytes_per_unit: 1,
    max_decomposed_units: 1,
    to_bytes_fallback: None,
    to_units_fallback: None,
    precompose: None,
    is_valid_combining: None,
};

fn mac_roman_byte(unit: u16) -> Option<u8> {
    tables::reverse_lookup(&MAC_ROMAN_HIGH, unit)
}

/// A base letter plus one combining mark may map to a single byte.
fn mac_roman_to_byte(units: &[u16]) -> Option<(usize, u8)> {
    if let [base, mark, ..] = *units {
        if unicode::is_combining(mark) && !unicode::is_surrogate(base) {
            let composed = unicode::compose(u32::from(base), mark)
                .and_then(|scalar| u16::try_from(scalar).ok())
                .and_then(mac_roman_byte);
            if let Some(byte) = composed {
                return Some((2, byte));
            }
        }
    }
    mac_roman_byte(*units.first()?).map(|byte| (1, byte))
}

fn mac_roman_to_units(byte: u8, out: &mut [u16; MAX_DECOMPOSITION]) -> usize {
    match tables::lookup(&MAC_ROMAN_HIGH, byte) {
        Some(unit) => {
            out[0] = unit;
            1
        }
        None => 0,
    }
}

fn mac_roman_precompose(units: &[u16], out: &mut Sink<'_, u8>) -> Progress {
    precompose_with(units, out, mac_roman_byte)
}

pub(crate) static MAC_ROMAN: ConverterDescriptor = ConverterDescriptor {
    encoding: Encoding::MAC_ROMAN,
    shape: Shape::StandardEightBit(StandardEightBitCodec {
        to_byte: mac_roman_to_byte,
        to_units: mac_roman_to_units,
    }),
    max_bytes_per_unit: 1,
    max_decomposed_units: 2,
    to_bytes_fallback: None,
    to_units_fallback: None,
    precompose: Some(mac_roman_precompose),
    is_valid_combining: Some(unicode::is_combining),
};

/// Compose `units[0]` with as many following marks as still yield a mapped
/// character, writing that character's byte.
fn precompose_with(units: &[u16], out: &mut Sink<'_, u8>, to_byte: fn(u16) -> Option<u8>) -> Progress {
    let Some((&base, marks)) = units.split_first() else {
        return Progress::invalid(0, 0);
    };
    if unicode::is_surrogate(base) {
        return Progress::invalid(0, 0);
    }

    let mut composed = u32::from(base);
    let mut best = None;
    for (i, &mark) in marks.iter().enumerate() {
        if !unicode::is_combining(mark) {
            break;
        }
        let Some(next) = unicode::compose(composed, mark) else {
            break;
        };
        composed = next;
        if let Some(byte) = u16::try_from(composed).ok().and_then(to_byte) {
            best = Some((i + 2, byte));
        }
    }

    match best {
        Some((used, byte)) if out.push(byte) => Progress::complete(used, 1),
        Some(_) => Progress::insufficient(0, 0),
        None => Progress::invalid(0, 0),
    }
}

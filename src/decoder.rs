//! Byte-stream decoder: raw bytes in a named encoding to a [`TextValue`]
//!
//! UTF-16 and UTF-32 never touch the registry: byte order comes from the
//! encoding or a BOM and units are swapped in place. UTF-8 and the 8-bit
//! encodings skip conversion entirely for pure ASCII input. Everything else
//! goes through the conversion driver, and any stop fails the whole decode.
//! A requested canonical form applies to every path.

use crate::descriptor::{MAX_DECOMPOSITION, Status};
use crate::driver;
use crate::options::{CanonicalMode, ConversionOptions};
use crate::registry;
use crate::text::TextValue;
use crate::unicode::{self, MAX_SCALAR, REPLACEMENT};
use crate::wrapper::ConverterWrapper;
use crate::{Encoding, Error, Result};

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode `bytes` in `encoding` into a new text value
///
/// # Errors
///
/// * [`Error::UnknownEncoding`] when no converter is registered
/// * [`Error::InvalidInput`] when the bytes are malformed and the options do
///   not tolerate it
/// * [`Error::CapacityExceeded`] when the result would exceed
///   `options.max_length`
///
/// # Examples
///
/// ```rust
/// use fast_text::{decode, ConversionOptions, Encoding, Width};
///
/// let text = decode(b"\xFF\xFEh\0i\0", Encoding::UTF16, &ConversionOptions::new()).unwrap();
/// assert_eq!(text, "hi");
/// assert_eq!(text.width(), Width::Narrow);
/// ```
pub fn decode(bytes: &[u8], encoding: Encoding, options: &ConversionOptions) -> Result<TextValue<'static>> {
    let options = &options.with_partial_input(false);
    if encoding.is_utf16() {
        return decode_utf16(bytes, encoding, options);
    }
    if encoding.is_utf32() {
        return decode_utf32(bytes, encoding, options);
    }

    let wrapper = registry::require(encoding)?;
    match encoding {
        Encoding::NON_LOSSY_ASCII => {
            // A malformed escape is never substituted.
            let exact = ConversionOptions { lossy: None, strict: true, ..*options };
            let units = decode_with_driver(wrapper, bytes, &exact)?;
            finish(units, 0xFF, options)
        }
        Encoding::UTF8 => {
            let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
            if body.is_ascii() {
                return decode_ascii(body, options);
            }
            let units = decode_with_driver(wrapper, body, options)?;
            finish(units, 0xFF, options)
        }
        _ => {
            if wrapper.is_cheap_eight_bit() && bytes.is_ascii() {
                return decode_ascii(bytes, options);
            }
            let units = decode_with_driver(wrapper, bytes, options)?;
            finish(units, 0xFF, options)
        }
    }
}

fn decode_ascii(bytes: &[u8], options: &ConversionOptions) -> Result<TextValue<'static>> {
    TextValue::check_max_length(bytes.len(), options.max_length)?;
    if options.force_wide {
        let units = bytes.iter().map(|&byte| u16::from(byte)).collect();
        return Ok(TextValue::from_decoded(units, 0x7F, true));
    }
    Ok(TextValue::from_latin1(bytes))
}

fn finish(units: Vec<u16>, narrow_max: u16, options: &ConversionOptions) -> Result<TextValue<'static>> {
    TextValue::check_max_length(units.len(), options.max_length)?;
    Ok(TextValue::from_decoded(units, narrow_max, options.force_wide))
}

/// Convert into an estimated buffer, measuring exactly only if it was short
fn decode_with_driver(wrapper: &ConverterWrapper, bytes: &[u8], options: &ConversionOptions) -> Result<Vec<u16>> {
    let estimate = wrapper.units_len_estimate(bytes.len(), options.canonical_form.is_some());
    let mut units = vec![0u16; estimate];
    let progress = driver::bytes_to_units(wrapper, bytes, Some(&mut units), options);
    match progress.status {
        Status::Complete => {
            units.truncate(progress.produced);
            Ok(units)
        }
        Status::InsufficientOutput => driver::decode_all(wrapper, bytes, options),
        Status::InvalidInput => Err(Error::InvalidInput { consumed: progress.consumed, produced: progress.produced }),
    }
}

/// Canonical decomposition of decoded units; lone surrogates pass through
fn decompose_units(units: &[u16], mode: CanonicalMode) -> Vec<u16> {
    let mut expanded = Vec::with_capacity(units.len());
    let mut buf = [0u16; MAX_DECOMPOSITION];
    let mut i = 0;
    while i < units.len() {
        let (scalar, len) = unicode::scalar_at(&units[i..]);
        let n = unicode::decompose(scalar, mode, &mut buf);
        expanded.extend_from_slice(&buf[..n]);
        i += len;
    }
    expanded
}

/// Byte order and payload, honouring a BOM only for the unmarked encodings
fn split_bom(bytes: &[u8], encoding: Encoding) -> (bool, usize, &[u8]) {
    let detect = matches!(encoding, Encoding::UTF16 | Encoding::UTF32);
    let big_endian = !matches!(encoding, Encoding::UTF16LE | Encoding::UTF32LE);
    if !detect {
        return (big_endian, 0, bytes);
    }
    let (big, little) = if encoding.is_utf16() {
        (&[0xFE, 0xFF][..], &[0xFF, 0xFE][..])
    } else {
        (&[0x00, 0x00, 0xFE, 0xFF][..], &[0xFF, 0xFE, 0x00, 0x00][..])
    };
    if let Some(rest) = bytes.strip_prefix(big) {
        (true, big.len(), rest)
    } else if let Some(rest) = bytes.strip_prefix(little) {
        (false, little.len(), rest)
    } else {
        (true, 0, bytes)
    }
}

fn decode_utf16(bytes: &[u8], encoding: Encoding, options: &ConversionOptions) -> Result<TextValue<'static>> {
    let (big_endian, bom_len, body) = split_bom(bytes, encoding);
    let whole = body.len() - body.len() % 2;
    TextValue::check_max_length(body.len().div_ceil(2), options.max_length)?;

    let mut units: Vec<u16> = bytemuck::pod_collect_to_vec(&body[..whole]);
    if big_endian != cfg!(target_endian = "big") {
        for unit in &mut units {
            *unit = unit.swap_bytes();
        }
    }
    if whole < body.len() {
        if !options.lenient() {
            log::debug!("UTF-16 input ends with an odd byte");
            return Err(Error::InvalidInput { consumed: bom_len + whole, produced: units.len() });
        }
        units.push(REPLACEMENT);
    }
    if let Some(mode) = options.canonical_form {
        units = decompose_units(&units, mode);
    }
    finish(units, 0x7F, options)
}

fn decode_utf32(bytes: &[u8], encoding: Encoding, options: &ConversionOptions) -> Result<TextValue<'static>> {
    let (big_endian, bom_len, body) = split_bom(bytes, encoding);
    let whole = body.len() - body.len() % 4;

    let mut scalars: Vec<u32> = bytemuck::pod_collect_to_vec(&body[..whole]);
    if big_endian != cfg!(target_endian = "big") {
        for scalar in &mut scalars {
            *scalar = scalar.swap_bytes();
        }
    }

    let mut units = Vec::with_capacity(scalars.len());
    let mut pair = [0u16; 2];
    let mut expanded = [0u16; MAX_DECOMPOSITION];
    for (i, &scalar) in scalars.iter().enumerate() {
        if scalar > MAX_SCALAR {
            if !options.lenient() {
                log::debug!("UTF-32 scalar 0x{scalar:X} above U+10FFFF");
                return Err(Error::InvalidInput { consumed: bom_len + i * 4, produced: units.len() });
            }
            units.push(REPLACEMENT);
            continue;
        }
        match options.canonical_form {
            Some(mode) => {
                let len = unicode::decompose(scalar, mode, &mut expanded);
                units.extend_from_slice(&expanded[..len]);
            }
            None => {
                let len = unicode::encode_utf16(scalar, &mut pair);
                units.extend_from_slice(&pair[..len]);
            }
        }
    }
    if whole < body.len() {
        if !options.lenient() {
            return Err(Error::InvalidInput { consumed: bom_len + whole, produced: units.len() });
        }
        units.push(REPLACEMENT);
    }
    finish(units, 0x7F, options)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::options::{CanonicalMode, SubstitutePolicy};
    use crate::text::Width;

    fn strict() -> ConversionOptions {
        ConversionOptions::new()
    }

    #[test_case(b"\xFE\xFF\x00A\x00B", Encoding::UTF16 ; "big endian bom")]
    #[test_case(b"\xFF\xFEA\x00B\x00", Encoding::UTF16 ; "little endian bom")]
    #[test_case(b"\x00A\x00B", Encoding::UTF16 ; "no bom means big endian")]
    #[test_case(b"A\x00B\x00", Encoding::UTF16LE ; "explicit little endian")]
    #[test_case(b"\x00\x00\x00A\x00\x00\x00B", Encoding::UTF32BE ; "utf32 big endian")]
    #[test_case(b"\xFF\xFE\x00\x00A\x00\x00\x00B\x00\x00\x00", Encoding::UTF32 ; "utf32 bom")]
    #[test_case(b"\xEF\xBB\xBFAB", Encoding::UTF8 ; "utf8 bom skipped")]
    #[test_case(b"AB", Encoding::WINDOWS_1252 ; "cheap eight bit ascii")]
    fn test_ascii_content_is_narrow(bytes: &[u8], encoding: Encoding) {
        let text = decode(bytes, encoding, &strict()).unwrap();
        assert_eq!(text, "AB");
        assert_eq!(text.width(), Width::Narrow);
    }

    #[test]
    fn test_bom_is_only_honoured_for_unmarked_forms() {
        let text = decode(b"\xFF\xFEA\x00", Encoding::UTF16LE, &strict()).unwrap();
        assert_eq!(text.code_units(..).unwrap().to_vec(), vec![0xFEFF, 0x41]);
    }

    #[test]
    fn test_unicode_family_keeps_non_ascii_wide() {
        let text = decode(b"\x00\xE9", Encoding::UTF16BE, &strict()).unwrap();
        assert_eq!(text, "\u{e9}");
        assert_eq!(text.width(), Width::Wide);

        let text = decode(b"\x00\x01\xF6\x00", Encoding::UTF32BE, &strict()).unwrap();
        assert_eq!(text.code_units(..).unwrap().to_vec(), vec![0xD83D, 0xDE00]);
    }

    #[test]
    fn test_force_wide() {
        let options = ConversionOptions::new().with_force_wide(true);
        assert!(decode(b"abc", Encoding::UTF8, &options).unwrap().is_wide());
        assert!(decode(b"\x00a", Encoding::UTF16BE, &options).unwrap().is_wide());
        assert!(decode(b"caf\xE9", Encoding::ISO_8859_1, &options).unwrap().is_wide());
    }

    #[test]
    fn test_utf32_above_max_scalar() {
        let bytes = b"\x00\x00\x00A\x00\x11\x00\x00";
        assert_eq!(
            decode(bytes, Encoding::UTF32BE, &strict()),
            Err(Error::InvalidInput { consumed: 4, produced: 1 })
        );
        let lenient = ConversionOptions::new().with_strict(false);
        assert_eq!(decode(bytes, Encoding::UTF32BE, &lenient).unwrap(), "A\u{fffd}");
    }

    #[test]
    fn test_odd_utf16_tail() {
        assert_eq!(
            decode(b"\x00A\x00", Encoding::UTF16BE, &strict()),
            Err(Error::InvalidInput { consumed: 2, produced: 1 })
        );
        assert_eq!(decode(b"\x00A\x00", Encoding::UTF16BE, &ConversionOptions::lossy(b'?')).unwrap(), "A\u{fffd}");
    }

    #[test]
    fn test_utf8_general_path() {
        let text = decode("caf\u{e9}".as_bytes(), Encoding::UTF8, &strict()).unwrap();
        assert_eq!(text, "caf\u{e9}");
        assert_eq!(text.width(), Width::Narrow);

        let text = decode("tea \u{2615}".as_bytes(), Encoding::UTF8, &strict()).unwrap();
        assert_eq!(text.width(), Width::Wide);
        assert_eq!(text.to_string(), "tea \u{2615}");
    }

    #[test]
    fn test_invalid_input_fails_the_whole_decode() {
        assert_eq!(
            decode(b"ab\xFFcd", Encoding::UTF8, &strict()),
            Err(Error::InvalidInput { consumed: 2, produced: 2 })
        );
        let lossy = ConversionOptions::new().with_lossy(SubstitutePolicy::Fallback);
        assert_eq!(decode(b"ab\xFFcd", Encoding::UTF8, &lossy).unwrap(), "ab\u{fffd}cd");
        assert!(decode(b"\x81", Encoding::WINDOWS_1252, &strict()).is_err());
    }

    #[test]
    fn test_malformed_escape_ignores_lossy_options() {
        let lossy = ConversionOptions::lossy(b'?');
        assert!(decode(b"\\u20", Encoding::NON_LOSSY_ASCII, &lossy).is_err());
        assert_eq!(decode(b"\\u20ac", Encoding::NON_LOSSY_ASCII, &lossy).unwrap(), "\u{20ac}");
    }

    #[test]
    fn test_unknown_encoding() {
        let unknown = Encoding::from_id(0x0ABC_DEF0);
        assert_eq!(decode(b"x", unknown, &strict()), Err(Error::UnknownEncoding(unknown)));
    }

    #[test]
    fn test_legacy_encodings() {
        assert_eq!(decode(b"Caf\x8E", Encoding::MAC_ROMAN, &strict()).unwrap(), "Caf\u{e9}");
        assert_eq!(decode(b"\x80 5", Encoding::WINDOWS_1252, &strict()).unwrap(), "\u{20ac} 5");
        assert_eq!(decode(b"\xED\xA0\xBD\xED\xB8\x80", Encoding::CESU8, &strict()).unwrap(), "\u{1f600}");
    }

    #[test]
    fn test_canonical_form_expands() {
        let options = ConversionOptions::new().with_canonical_form(CanonicalMode::Standard);
        let text = decode(b"\xE9t\xE9", Encoding::ISO_8859_1, &options).unwrap();
        assert_eq!(text.code_units(..).unwrap().to_vec(), vec![0x65, 0x301, 0x74, 0x65, 0x301]);
        assert!(text.is_wide());
    }

    #[test_case(b"\x00\xE9\x00!", Encoding::UTF16BE ; "utf16")]
    #[test_case(b"\xE9\x00\x00\x00!\x00\x00\x00", Encoding::UTF32LE ; "utf32")]
    fn test_canonical_form_covers_unicode_family(bytes: &[u8], encoding: Encoding) {
        let options = ConversionOptions::new().with_canonical_form(CanonicalMode::Standard);
        let text = decode(bytes, encoding, &options).unwrap();
        assert_eq!(text.code_units(..).unwrap().to_vec(), vec![0x65, 0x301, 0x21]);

        let plain = decode(bytes, encoding, &strict()).unwrap();
        assert_eq!(plain.code_units(..).unwrap().to_vec(), vec![0xE9, 0x21]);
    }

    #[test]
    fn test_canonical_form_keeps_lone_surrogate() {
        let options = ConversionOptions::new().with_canonical_form(CanonicalMode::Standard);
        let text = decode(b"\xD8\x00\x00A", Encoding::UTF16BE, &options).unwrap();
        assert_eq!(text.code_units(..).unwrap().to_vec(), vec![0xD800, 0x41]);
    }

    #[test]
    fn test_max_length() {
        let options = ConversionOptions::new().with_max_length(3);
        assert_eq!(
            decode(b"abcd", Encoding::UTF8, &options),
            Err(Error::CapacityExceeded { requested: 4, max: 3 })
        );
        assert_eq!(
            decode("\u{e9}\u{e9}\u{e9}\u{e9}".as_bytes(), Encoding::UTF8, &options),
            Err(Error::CapacityExceeded { requested: 4, max: 3 })
        );
        assert!(decode(b"abc", Encoding::UTF8, &options).is_ok());
    }
}

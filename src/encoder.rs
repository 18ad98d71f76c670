//! Byte export: a range of a [`TextValue`] to bytes in a named encoding
//!
//! The UTF-16 and UTF-32 forms are written directly. Narrow ASCII content
//! is copied as-is into ASCII-compatible encodings. Everything else is
//! widened and handed to the conversion driver.

use std::borrow::Cow;
use std::ops::RangeBounds;

use crate::descriptor::{Progress, Sink};
use crate::driver;
use crate::options::ConversionOptions;
use crate::registry;
use crate::text::{TextValue, Units, resolve_range};
use crate::unicode::{self, REPLACEMENT};
use crate::{Encoding, Result};

/// Encode `range` of `text`, substituting `lossy_byte` for unconvertible
/// characters
///
/// With `out` set to `None` nothing is written and `produced` in the
/// returned [`Progress`] is the byte count a full conversion needs.
///
/// # Errors
///
/// [`crate::Error::InvalidRange`] and [`crate::Error::UnknownEncoding`].
/// Conversion stops are reported through [`Progress::status`].
pub fn encode(
    text: &TextValue<'_>,
    range: impl RangeBounds<usize>,
    encoding: Encoding,
    lossy_byte: Option<u8>,
    out: Option<&mut [u8]>,
) -> Result<Progress> {
    let options = match lossy_byte {
        Some(byte) => ConversionOptions::lossy(byte),
        None => ConversionOptions::new(),
    };
    encode_with(text, range, encoding, &options, out)
}

/// [`encode`] with the full set of conversion options
///
/// # Errors
///
/// See [`encode`].
pub fn encode_with(
    text: &TextValue<'_>,
    range: impl RangeBounds<usize>,
    encoding: Encoding,
    options: &ConversionOptions,
    out: Option<&mut [u8]>,
) -> Result<Progress> {
    let range = resolve_range(range, text.len())?;
    let units = text.as_units().slice(range);

    if encoding.is_utf16() {
        return Ok(write_utf16(units, encoding != Encoding::UTF16LE, out));
    }
    if encoding.is_utf32() {
        return Ok(write_utf32(units, encoding != Encoding::UTF32LE, options, out));
    }

    let wrapper = registry::require(encoding)?;
    let wide = match units {
        Units::Narrow(bytes) if copies_verbatim(encoding, bytes) => return Ok(copy_bytes(bytes, out)),
        Units::Narrow(_) => Cow::Owned(units.to_vec()),
        Units::Wide(units) => Cow::Borrowed(units),
    };
    Ok(driver::units_to_bytes(wrapper, &wide, out, options))
}

/// Measure, then encode `range` of `text` into a new vector
///
/// # Errors
///
/// As [`encode`], plus [`crate::Error::InvalidInput`] when some character
/// cannot be converted under `options`.
///
/// # Examples
///
/// ```rust
/// use fast_text::{encode_to_vec, ConversionOptions, Encoding, TextValue};
///
/// let text = TextValue::from("na\u{ef}ve");
/// let bytes = encode_to_vec(&text, 2.., Encoding::UTF8, &ConversionOptions::new()).unwrap();
/// assert_eq!(bytes, "\u{ef}ve".as_bytes());
/// ```
pub fn encode_to_vec(
    text: &TextValue<'_>,
    range: impl RangeBounds<usize>,
    encoding: Encoding,
    options: &ConversionOptions,
) -> Result<Vec<u8>> {
    let range = resolve_range(range, text.len())?;
    let options = &options.with_partial_input(false);
    let (_, len) = encode_with(text, range.clone(), encoding, options, None)?.into_result()?;
    let mut bytes = vec![0u8; len];
    let (_, written) = encode_with(text, range, encoding, options, Some(&mut bytes))?.into_result()?;
    bytes.truncate(written);
    Ok(bytes)
}

/// All of `text` as a self-describing byte stream
///
/// The byte-order-unspecified UTF-16 and UTF-32 forms get a big-endian BOM;
/// every other encoding is written bare.
///
/// # Errors
///
/// See [`encode_to_vec`].
pub fn external_representation(
    text: &TextValue<'_>,
    encoding: Encoding,
    options: &ConversionOptions,
) -> Result<Vec<u8>> {
    let body = encode_to_vec(text, .., encoding, options)?;
    let bom: &[u8] = match encoding {
        Encoding::UTF16 | Encoding::UTF32 => encoding.bom().unwrap_or_default(),
        _ => &[],
    };
    let mut bytes = Vec::with_capacity(bom.len() + body.len());
    bytes.extend_from_slice(bom);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

fn copies_verbatim(encoding: Encoding, bytes: &[u8]) -> bool {
    encoding == Encoding::ISO_8859_1 || (encoding.is_ascii_compatible() && bytes.is_ascii())
}

fn copy_bytes(bytes: &[u8], out: Option<&mut [u8]>) -> Progress {
    let Some(out) = out else {
        return Progress::complete(bytes.len(), bytes.len());
    };
    let len = bytes.len().min(out.len());
    out[..len].copy_from_slice(&bytes[..len]);
    if len < bytes.len() {
        Progress::insufficient(len, len)
    } else {
        Progress::complete(len, len)
    }
}

fn write_utf16(units: Units<'_>, big_endian: bool, out: Option<&mut [u8]>) -> Progress {
    let mut sink = Sink::from_option(out);
    for (i, unit) in units.iter().enumerate() {
        let bytes = if big_endian { unit.to_be_bytes() } else { unit.to_le_bytes() };
        if !sink.extend(&bytes) {
            return Progress::insufficient(i, sink.written());
        }
    }
    Progress::complete(units.len(), sink.written())
}

fn write_utf32(units: Units<'_>, big_endian: bool, options: &ConversionOptions, out: Option<&mut [u8]>) -> Progress {
    let wide = match units {
        Units::Narrow(_) => Cow::Owned(units.to_vec()),
        Units::Wide(units) => Cow::Borrowed(units),
    };
    let mut sink = Sink::from_option(out);
    let mut consumed = 0;
    while consumed < wide.len() {
        let (mut scalar, len) = unicode::scalar_at(&wide[consumed..]);
        if (0xD800..=0xDFFF).contains(&scalar) {
            if options.partial_input && consumed + 1 == wide.len() && unicode::is_high_surrogate(wide[consumed]) {
                break;
            }
            if !options.lenient() {
                log::debug!("unpaired surrogate at unit {consumed} cannot be written as UTF-32");
                return Progress::invalid(consumed, sink.written());
            }
            scalar = u32::from(REPLACEMENT);
        }
        let bytes = if big_endian { scalar.to_be_bytes() } else { scalar.to_le_bytes() };
        if !sink.extend(&bytes) {
            return Progress::insufficient(consumed, sink.written());
        }
        consumed += len;
    }
    Progress::complete(consumed, sink.written())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::Error;
    use crate::descriptor::Status;
    use crate::options::SubstitutePolicy;

    fn to_vec(text: &TextValue<'_>, encoding: Encoding) -> Result<Vec<u8>> {
        encode_to_vec(text, .., encoding, &ConversionOptions::new())
    }

    #[test_case(Encoding::UTF8 ; "utf8")]
    #[test_case(Encoding::ASCII ; "ascii")]
    #[test_case(Encoding::WINDOWS_1252 ; "windows 1252")]
    #[test_case(Encoding::MAC_ROMAN ; "mac roman")]
    #[test_case(Encoding::CESU8 ; "cesu8")]
    fn test_ascii_is_copied(encoding: Encoding) {
        let text = TextValue::from("plain text");
        assert_eq!(to_vec(&text, encoding).unwrap(), b"plain text");
    }

    #[test]
    fn test_escaped_ascii_is_not_copied() {
        let text = TextValue::from("a\\b");
        assert_eq!(to_vec(&text, Encoding::NON_LOSSY_ASCII).unwrap(), b"a\\\\b");
    }

    #[test]
    fn test_narrow_latin1() {
        let text = TextValue::from_latin1(b"caf\xE9");
        assert_eq!(to_vec(&text, Encoding::ISO_8859_1).unwrap(), b"caf\xE9");
        assert_eq!(to_vec(&text, Encoding::UTF8).unwrap(), "caf\u{e9}".as_bytes());
        assert_eq!(to_vec(&text, Encoding::MAC_ROMAN).unwrap(), b"caf\x8E");
    }

    #[test]
    fn test_decomposed_input_is_precomposed() {
        let text = TextValue::from("e\u{301}t\u{e9}");
        assert_eq!(to_vec(&text, Encoding::MAC_ROMAN).unwrap(), b"\x8Et\x8E");
    }

    #[test]
    fn test_measuring_and_short_buffers() {
        let text = TextValue::from("\u{20ac}\u{20ac}");
        let measured = encode(&text, .., Encoding::UTF8, None, None).unwrap();
        assert_eq!(measured, Progress::complete(2, 6));

        let mut buf = [0u8; 4];
        let progress = encode(&text, .., Encoding::UTF8, None, Some(&mut buf)).unwrap();
        assert_eq!(progress, Progress::insufficient(1, 3));
        assert_eq!(&buf[..3], "\u{20ac}".as_bytes());

        let text = TextValue::from("abcdef");
        let progress = encode(&text, .., Encoding::UTF8, None, Some(&mut buf)).unwrap();
        assert_eq!(progress, Progress::insufficient(4, 4));
        assert_eq!(&buf, b"abcd");
    }

    #[test]
    fn test_lossy_byte() {
        let text = TextValue::from("5 \u{20ac}");
        let mut buf = [0u8; 8];
        let progress = encode(&text, .., Encoding::ISO_8859_1, Some(b'?'), Some(&mut buf)).unwrap();
        assert_eq!(progress, Progress::complete(3, 3));
        assert_eq!(&buf[..3], b"5 ?");

        let progress = encode(&text, .., Encoding::ISO_8859_1, None, Some(&mut buf)).unwrap();
        assert_eq!(progress.status, Status::InvalidInput);
        assert_eq!(progress.consumed, 2);
        assert_eq!(
            to_vec(&text, Encoding::ASCII),
            Err(Error::InvalidInput { consumed: 2, produced: 2 })
        );
    }

    #[test]
    fn test_ranges() {
        let text = TextValue::from("hello");
        assert_eq!(encode_to_vec(&text, 1..3, Encoding::UTF8, &ConversionOptions::new()).unwrap(), b"el");
        assert_eq!(
            encode(&text, 1..10, Encoding::UTF8, None, None),
            Err(Error::InvalidRange { start: 1, end: 10, len: 5 })
        );
    }

    #[test]
    fn test_unknown_encoding() {
        let unknown = Encoding::from_id(0x0ABC_DEF0);
        assert_eq!(
            encode(&TextValue::from("x"), .., unknown, None, None),
            Err(Error::UnknownEncoding(unknown))
        );
    }

    #[test_case(Encoding::UTF16, b"\x00A\x20\xAC" ; "utf16 defaults to big endian")]
    #[test_case(Encoding::UTF16BE, b"\x00A\x20\xAC" ; "utf16 big endian")]
    #[test_case(Encoding::UTF16LE, b"A\x00\xAC\x20" ; "utf16 little endian")]
    #[test_case(Encoding::UTF32BE, b"\x00\x00\x00A\x00\x00\x20\xAC" ; "utf32 big endian")]
    #[test_case(Encoding::UTF32LE, b"A\x00\x00\x00\xAC\x20\x00\x00" ; "utf32 little endian")]
    fn test_unicode_family(encoding: Encoding, expected: &[u8]) {
        let text = TextValue::from("A\u{20ac}");
        assert_eq!(to_vec(&text, encoding).unwrap(), expected);
    }

    #[test]
    fn test_utf32_pairs_and_lone_surrogates() {
        let text = TextValue::from("\u{1f600}");
        assert_eq!(to_vec(&text, Encoding::UTF32BE).unwrap(), b"\x00\x01\xF6\x00");

        let lone = TextValue::from_units(&[0x41, 0xD800]);
        assert_eq!(
            to_vec(&lone, Encoding::UTF32BE),
            Err(Error::InvalidInput { consumed: 1, produced: 4 })
        );
        let lossy = ConversionOptions::new().with_lossy(SubstitutePolicy::Fallback);
        assert_eq!(
            encode_to_vec(&lone, .., Encoding::UTF32BE, &lossy).unwrap(),
            b"\x00\x00\x00A\x00\x00\xFF\xFD"
        );
        assert_eq!(to_vec(&lone, Encoding::UTF16BE).unwrap(), b"\x00A\xD8\x00");
    }

    #[test]
    fn test_utf32_chunk_holds_back_high_surrogate() {
        let lone = TextValue::from_units(&[0x41, 0xD800]);
        let chunk = ConversionOptions::new().with_partial_input(true);
        let mut buf = [0u8; 8];
        let progress = encode_with(&lone, .., Encoding::UTF32BE, &chunk, Some(&mut buf)).unwrap();
        assert_eq!(progress, Progress::complete(1, 4));
        assert_eq!(&buf[..4], b"\x00\x00\x00A");

        // Whole-input conversion ignores the flag.
        assert_eq!(
            encode_to_vec(&lone, .., Encoding::UTF32BE, &chunk),
            Err(Error::InvalidInput { consumed: 1, produced: 4 })
        );
    }

    #[test]
    fn test_external_representation() {
        let text = TextValue::from("hi");
        let options = ConversionOptions::new();
        assert_eq!(external_representation(&text, Encoding::UTF16, &options).unwrap(), b"\xFE\xFF\x00h\x00i");
        assert_eq!(
            external_representation(&text, Encoding::UTF32, &options).unwrap(),
            b"\x00\x00\xFE\xFF\x00\x00\x00h\x00\x00\x00i"
        );
        assert_eq!(external_representation(&text, Encoding::UTF16LE, &options).unwrap(), b"h\x00i\x00");
        assert_eq!(external_representation(&text, Encoding::UTF8, &options).unwrap(), b"hi");
    }
}

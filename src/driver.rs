//! Conversion driver
//!
//! Runs a wrapper's raw codec over a whole run of input and decides what to do
//! each time the codec stops short. When encoding, the order is:
//!
//! 1. output exhausted (confirmed by measuring the rest of the input): stop
//! 2. a combining mark the encoding can absorb: precompose it with its base
//! 3. lossy conversion requested: substitute and resume
//! 4. [`CombiningPolicy::Ignore`]: drop the run of marks and resume
//! 5. otherwise: stop with invalid input
//!
//! Decoding follows the same order without step 2 and step 4. Every stop
//! reports how much input was converted, so a caller can resume from
//! `consumed` with a fresh output buffer.
//!
//! With [`ConversionOptions::partial_input`] set, a sequence cut off by the end
//! of the input is not malformed: the codec completes just before it and the
//! fallbacks never see it.

use crate::descriptor::{CodecFlags, Progress, Sink, Status};
use crate::options::{CombiningPolicy, ConversionOptions, SubstitutePolicy};
use crate::registry;
use crate::unicode::{self, REPLACEMENT};
use crate::wrapper::ConverterWrapper;
use crate::{Encoding, Result};

const DEFAULT_SUBSTITUTE: u8 = b'?';

/// Outcome of handling one codec stop
enum Recovery {
    /// Continue converting at this input offset
    Resume(usize),
    /// Stop with this progress
    Stop(Progress),
}

/// Convert code units to bytes in `wrapper`'s encoding
///
/// With `out` set to `None` nothing is written and `produced` is the number
/// of bytes a full conversion needs.
pub fn units_to_bytes(
    wrapper: &ConverterWrapper,
    units: &[u16],
    out: Option<&mut [u8]>,
    options: &ConversionOptions,
) -> Progress {
    let flags = CodecFlags { lenient: options.lenient(), canonical: None, partial: options.partial_input };
    let mut sink = Sink::from_option(out);
    let mut consumed = 0;
    // Start of the run the codec last converted; output for it is
    // reproducible by measuring from here.
    let mut segment = (0, 0);

    while consumed < units.len() {
        let progress = wrapper.to_bytes(&units[consumed..], &mut sink, flags);
        let at = consumed + progress.consumed;
        if progress.status == Status::Complete {
            return Progress::complete(at, sink.written());
        }

        let recovery = if progress.status == Status::InsufficientOutput
            && output_exhausted(wrapper, &units[at..], flags)
        {
            Recovery::Stop(Progress::insufficient(at, sink.written()))
        } else {
            recover_encode(wrapper, units, at, segment, &mut sink, options, flags)
        };
        match recovery {
            Recovery::Resume(next) => {
                consumed = next;
                segment = (consumed, sink.written());
            }
            Recovery::Stop(progress) => return progress,
        }
    }
    Progress::complete(consumed, sink.written())
}

/// Whether the unit at the head of `rest` converts once there is room
fn output_exhausted(wrapper: &ConverterWrapper, rest: &[u16], flags: CodecFlags) -> bool {
    wrapper.to_bytes(rest, &mut Sink::measure(), flags).consumed > 0
}

fn recover_encode(
    wrapper: &ConverterWrapper,
    units: &[u16],
    at: usize,
    segment: (usize, usize),
    sink: &mut Sink<'_, u8>,
    options: &ConversionOptions,
    flags: CodecFlags,
) -> Recovery {
    if options.combining != CombiningPolicy::Substitute {
        if let Some(recovery) = precompose_run(wrapper, units, at, segment, sink, flags) {
            return recovery;
        }
    }

    if let Some(policy) = options.lossy {
        let substitute = match policy {
            SubstitutePolicy::Byte(byte) => substitute_byte(units, at, byte, sink),
            SubstitutePolicy::Fallback => match wrapper.to_bytes_fallback() {
                Some(fallback) => {
                    let progress = fallback(&units[at..], sink);
                    match progress.status {
                        Status::Complete if progress.consumed > 0 => Ok(progress.consumed),
                        Status::InsufficientOutput => Err(()),
                        _ => substitute_byte(units, at, DEFAULT_SUBSTITUTE, sink),
                    }
                }
                None => substitute_byte(units, at, DEFAULT_SUBSTITUTE, sink),
            },
        };
        return match substitute {
            Ok(used) => {
                log::trace!("substituted {used} unit(s) at offset {at} for {}", wrapper.encoding());
                Recovery::Resume(at + used)
            }
            Err(()) => Recovery::Stop(Progress::insufficient(at, sink.written())),
        };
    }

    if options.combining == CombiningPolicy::Ignore {
        let is_mark = wrapper.is_valid_combining().unwrap_or(unicode::is_combining);
        let marks = units[at..].iter().take_while(|&&unit| is_mark(unit)).count();
        if marks > 0 {
            return Recovery::Resume(at + marks);
        }
    }

    Recovery::Stop(Progress::invalid(at, sink.written()))
}

/// Write `byte` for the character at `at`, returning the units it covers
fn substitute_byte(units: &[u16], at: usize, byte: u8, sink: &mut Sink<'_, u8>) -> std::result::Result<usize, ()> {
    if sink.push(byte) {
        Ok(unicode::char_len(&units[at..]))
    } else {
        Err(())
    }
}

/// Merge the mark at `at` with its base and any marks between them
///
/// Returns `None` when there is nothing to merge or the merge fails, leaving
/// the sink untouched. A base converted before `segment` belongs to an earlier
/// recovery step and leaves the mark dangling.
fn precompose_run(
    wrapper: &ConverterWrapper,
    units: &[u16],
    at: usize,
    segment: (usize, usize),
    sink: &mut Sink<'_, u8>,
    flags: CodecFlags,
) -> Option<Recovery> {
    let precompose = wrapper.precompose()?;
    let is_mark = wrapper.is_valid_combining()?;
    if !is_mark(units[at]) {
        return None;
    }

    let (segment_start, segment_bytes) = segment;
    let base = units[segment_start..at].iter().rposition(|&unit| !is_mark(unit))? + segment_start;

    let mut composed = [0u8; 16];
    let mut scratch = Sink::new(&mut composed);
    let progress = precompose(&units[base..], &mut scratch);
    if progress.status != Status::Complete || base + progress.consumed <= at {
        return None;
    }
    let written = scratch.written();

    let base_bytes = wrapper.to_bytes(&units[segment_start..base], &mut Sink::measure(), flags);
    let rewind_to = segment_bytes + base_bytes.produced;
    sink.rewind(rewind_to);
    if !sink.extend(&composed[..written]) {
        return Some(Recovery::Stop(Progress::insufficient(base, rewind_to)));
    }
    Some(Recovery::Resume(base + progress.consumed))
}

/// Convert bytes in `wrapper`'s encoding to code units
///
/// With `out` set to `None` nothing is written and `produced` is the number
/// of units a full conversion needs.
pub fn bytes_to_units(
    wrapper: &ConverterWrapper,
    bytes: &[u8],
    out: Option<&mut [u16]>,
    options: &ConversionOptions,
) -> Progress {
    let flags = CodecFlags {
        lenient: options.lenient(),
        canonical: options.canonical_form,
        partial: options.partial_input,
    };
    let lossy = options.lossy.or((!options.strict).then_some(SubstitutePolicy::Fallback));
    let mut sink = Sink::from_option(out);
    let mut consumed = 0;

    while consumed < bytes.len() {
        let progress = wrapper.to_units(&bytes[consumed..], &mut sink, flags);
        let at = consumed + progress.consumed;
        match progress.status {
            Status::Complete => return Progress::complete(at, sink.written()),
            Status::InsufficientOutput
                if wrapper.to_units(&bytes[at..], &mut Sink::measure(), flags).consumed > 0 =>
            {
                return Progress::insufficient(at, sink.written());
            }
            _ => {}
        }

        let Some(policy) = lossy else {
            log::debug!("invalid {} input at byte {at}", wrapper.encoding());
            return Progress::invalid(at, sink.written());
        };
        let used = match policy {
            SubstitutePolicy::Byte(byte) => sink.push(u16::from(byte)).then_some(1),
            SubstitutePolicy::Fallback => match wrapper.to_units_fallback() {
                Some(fallback) => {
                    let progress = fallback(&bytes[at..], &mut sink);
                    match progress.status {
                        Status::Complete => Some(progress.consumed.max(1)),
                        _ => None,
                    }
                }
                None => sink.push(REPLACEMENT).then_some(1),
            },
        };
        let Some(used) = used else {
            return Progress::insufficient(at, sink.written());
        };
        log::trace!("substituted {used} byte(s) at offset {at} for {}", wrapper.encoding());
        consumed = at + used;
    }
    Progress::complete(consumed, sink.written())
}

/// Measure, then convert `units` into a new byte vector
///
/// # Errors
///
/// [`crate::Error::InvalidInput`] when the units cannot be converted.
pub fn encode_all(wrapper: &ConverterWrapper, units: &[u16], options: &ConversionOptions) -> Result<Vec<u8>> {
    let (_, len) = units_to_bytes(wrapper, units, None, options).into_result()?;
    let mut bytes = vec![0u8; len];
    let (_, written) = units_to_bytes(wrapper, units, Some(&mut bytes), options).into_result()?;
    bytes.truncate(written);
    Ok(bytes)
}

/// Measure, then convert `bytes` into a new unit vector
///
/// # Errors
///
/// [`crate::Error::InvalidInput`] when the bytes cannot be converted.
pub fn decode_all(wrapper: &ConverterWrapper, bytes: &[u8], options: &ConversionOptions) -> Result<Vec<u16>> {
    let (_, len) = bytes_to_units(wrapper, bytes, None, options).into_result()?;
    let mut units = vec![0u16; len];
    let (_, written) = bytes_to_units(wrapper, bytes, Some(&mut units), options).into_result()?;
    units.truncate(written);
    Ok(units)
}

/// Incremental decoder for one encoding
///
/// Each call converts as much of `bytes` as fits in `out`; feed the input
/// from `consumed` onward to the next call. When the input arrives in chunks,
/// pass every chunk but the last to [`Decoder::decode_chunk`] and carry its
/// unconsumed tail over to the next chunk.
#[derive(Debug, Clone, Copy)]
pub struct Decoder {
    wrapper: &'static ConverterWrapper,
    options: ConversionOptions,
}

impl Decoder {
    /// Decoder for `encoding`
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnknownEncoding`] when no converter is registered.
    pub fn new(encoding: Encoding, options: ConversionOptions) -> Result<Self> {
        Ok(Self { wrapper: registry::require(encoding)?, options })
    }

    /// Encoding being decoded
    pub fn encoding(&self) -> Encoding {
        self.wrapper.encoding()
    }

    /// Decode into `out`, treating the end of `bytes` as the end of input
    pub fn decode(&self, bytes: &[u8], out: &mut [u16]) -> Progress {
        bytes_to_units(self.wrapper, bytes, Some(out), &self.options.with_partial_input(false))
    }

    /// Decode one chunk of a longer input into `out`
    ///
    /// A sequence cut off at the end of `bytes` is left unconsumed rather than
    /// rejected or substituted.
    pub fn decode_chunk(&self, bytes: &[u8], out: &mut [u16]) -> Progress {
        bytes_to_units(self.wrapper, bytes, Some(out), &self.options.with_partial_input(true))
    }

    /// Units a full decode of `bytes` produces
    pub fn decoded_len(&self, bytes: &[u8]) -> Progress {
        bytes_to_units(self.wrapper, bytes, None, &self.options.with_partial_input(false))
    }
}

/// Incremental encoder for one encoding
///
/// Mirrors [`Decoder`]: chunks go through [`Encoder::encode_chunk`], the last
/// one through [`Encoder::encode`].
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    wrapper: &'static ConverterWrapper,
    options: ConversionOptions,
}

impl Encoder {
    /// Encoder for `encoding`
    ///
    /// # Errors
    ///
    /// [`crate::Error::UnknownEncoding`] when no converter is registered.
    pub fn new(encoding: Encoding, options: ConversionOptions) -> Result<Self> {
        Ok(Self { wrapper: registry::require(encoding)?, options })
    }

    /// Encoding being produced
    pub fn encoding(&self) -> Encoding {
        self.wrapper.encoding()
    }

    /// Encode into `out`, treating the end of `units` as the end of input
    pub fn encode(&self, units: &[u16], out: &mut [u8]) -> Progress {
        units_to_bytes(self.wrapper, units, Some(out), &self.options.with_partial_input(false))
    }

    /// Encode one chunk of a longer input into `out`
    ///
    /// A high surrogate ending `units` is left unconsumed for the next chunk.
    pub fn encode_chunk(&self, units: &[u16], out: &mut [u8]) -> Progress {
        units_to_bytes(self.wrapper, units, Some(out), &self.options.with_partial_input(true))
    }

    /// Bytes a full encode of `units` produces
    pub fn encoded_len(&self, units: &[u16]) -> Progress {
        units_to_bytes(self.wrapper, units, None, &self.options.with_partial_input(false))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;
    use crate::Error;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    fn encode(encoding: Encoding, units: &[u16], options: &ConversionOptions) -> Result<Vec<u8>> {
        encode_all(registry::lookup(encoding).unwrap(), units, options)
    }

    fn decode(encoding: Encoding, bytes: &[u8], options: &ConversionOptions) -> Result<Vec<u16>> {
        decode_all(registry::lookup(encoding).unwrap(), bytes, options)
    }

    #[test]
    fn test_precomposes_mark_after_converted_base() {
        let bytes = encode(Encoding::ISO_8859_1, &units("ce\u{301}!"), &ConversionOptions::new()).unwrap();
        assert_eq!(bytes, b"c\xE9!");
    }

    #[test]
    fn test_mac_roman_absorbs_mark_in_codec() {
        let bytes = encode(Encoding::MAC_ROMAN, &units("e\u{301}"), &ConversionOptions::new()).unwrap();
        assert_eq!(bytes, vec![0x8E]);
    }

    #[test]
    fn test_dangling_mark_is_invalid() {
        let result = encode(Encoding::ISO_8859_1, &units("q\u{301}"), &ConversionOptions::new());
        assert_eq!(result, Err(Error::InvalidInput { consumed: 1, produced: 1 }));
    }

    #[test]
    fn test_partially_merged_run_leaves_dangling_mark() {
        // é merges, the circumflex on top does not fit Latin-1.
        let options = ConversionOptions::new().with_combining(CombiningPolicy::Ignore);
        let bytes = encode(Encoding::ISO_8859_1, &units("ce\u{301}\u{302}d"), &options).unwrap();
        assert_eq!(bytes, b"c\xE9d");
    }

    #[test]
    fn test_ignore_drops_marks() {
        let options = ConversionOptions::new().with_combining(CombiningPolicy::Ignore);
        let bytes = encode(Encoding::ISO_8859_1, &units("q\u{301}\u{302}x"), &options).unwrap();
        assert_eq!(bytes, b"qx");
    }

    #[test]
    fn test_substitute_policy_skips_precomposition() {
        let options = ConversionOptions::lossy(b'?').with_combining(CombiningPolicy::Substitute);
        let bytes = encode(Encoding::ISO_8859_1, &units("e\u{301}"), &options).unwrap();
        assert_eq!(bytes, b"e?");
    }

    #[test_case(SubstitutePolicy::Byte(b'*'), b"A*B" ; "caller byte")]
    #[test_case(SubstitutePolicy::Fallback, b"A?B" ; "default fallback")]
    fn test_lossy_encode(policy: SubstitutePolicy, expected: &[u8]) {
        let options = ConversionOptions::new().with_lossy(policy);
        assert_eq!(encode(Encoding::ASCII, &units("A\u{20AC}B"), &options).unwrap(), expected);
    }

    #[test]
    fn test_lossy_byte_covers_surrogate_pair() {
        let bytes = encode(Encoding::WINDOWS_1252, &units("a\u{1F600}b"), &ConversionOptions::lossy(b'?')).unwrap();
        assert_eq!(bytes, b"a?b");
    }

    #[test]
    fn test_full_buffer_reports_insufficient_output() {
        let wrapper = registry::lookup(Encoding::ASCII).unwrap();
        let mut buf = [0u8; 1];
        let progress = units_to_bytes(wrapper, &units("AB"), Some(&mut buf), &ConversionOptions::new());
        assert_eq!(progress, Progress::insufficient(1, 1));

        let progress = units_to_bytes(wrapper, &units("A\u{20AC}"), Some(&mut buf), &ConversionOptions::lossy(b'?'));
        assert_eq!(progress, Progress::insufficient(1, 1));
    }

    #[test]
    fn test_encode_restarts_after_insufficient_output() {
        let wrapper = registry::lookup(Encoding::UTF8).unwrap();
        let input = units("h\u{e9}llo w\u{f6}rld \u{1F600}!");
        let options = ConversionOptions::new();
        let whole = encode_all(wrapper, &input, &options).unwrap();

        let mut pieces = Vec::new();
        let mut consumed = 0;
        while consumed < input.len() {
            let mut buf = [0u8; 5];
            let progress = units_to_bytes(wrapper, &input[consumed..], Some(&mut buf), &options);
            assert_ne!(progress.status, Status::InvalidInput);
            pieces.extend_from_slice(&buf[..progress.produced]);
            consumed += progress.consumed;
        }
        assert_eq!(pieces, whole);
    }

    #[test]
    fn test_decode_restarts_after_insufficient_output() {
        let decoder = Decoder::new(Encoding::UTF8, ConversionOptions::new()).unwrap();
        let input = "na\u{ef}ve \u{1F600} caf\u{e9}".as_bytes();
        let mut out = Vec::new();
        let mut consumed = 0;
        while consumed < input.len() {
            let mut buf = [0u16; 3];
            let progress = decoder.decode(&input[consumed..], &mut buf);
            assert_ne!(progress.status, Status::InvalidInput);
            out.extend_from_slice(&buf[..progress.produced]);
            consumed += progress.consumed;
        }
        assert_eq!(out, units("na\u{ef}ve \u{1F600} caf\u{e9}"));
        assert_eq!(decoder.decoded_len(input).produced, out.len());
    }

    #[test]
    fn test_decode_lossy() {
        let fallback = ConversionOptions::new().with_lossy(SubstitutePolicy::Fallback);
        assert_eq!(decode(Encoding::UTF8, b"A\xFFB", &fallback).unwrap(), vec![0x41, 0xFFFD, 0x42]);
        assert_eq!(decode(Encoding::UTF8, b"A\xFFB", &ConversionOptions::lossy(b'?')).unwrap(), units("A?B"));
        assert_eq!(decode(Encoding::ASCII, b"A\x80", &fallback).unwrap(), vec![0x41, 0xFFFD]);
        assert_eq!(
            decode(Encoding::UTF8, b"A\xFFB", &ConversionOptions::new()),
            Err(Error::InvalidInput { consumed: 1, produced: 1 })
        );
    }

    #[test]
    fn test_surrogate_bytes_fail_strict_and_are_replaced_leniently() {
        let encoded_surrogate = b"\xED\xA0\x80";
        assert!(decode(Encoding::UTF8, encoded_surrogate, &ConversionOptions::new()).is_err());

        let lenient = ConversionOptions::new().with_strict(false);
        let decoded = decode(Encoding::UTF8, encoded_surrogate, &lenient).unwrap();
        assert!(!decoded.is_empty());
        assert!(decoded.iter().all(|&unit| unit == REPLACEMENT));
    }

    #[test_case(ConversionOptions::new() ; "strict")]
    #[test_case(ConversionOptions::new().with_lossy(SubstitutePolicy::Fallback) ; "lossy")]
    fn test_decode_chunk_carries_split_sequence(options: ConversionOptions) {
        let decoder = Decoder::new(Encoding::UTF8, options).unwrap();
        let input = "caf\u{e9}!".as_bytes();
        let (first, second) = input.split_at(4);
        let mut buf = [0u16; 8];

        let progress = decoder.decode_chunk(first, &mut buf);
        assert_eq!(progress, Progress::complete(3, 3));
        let mut out = buf[..progress.produced].to_vec();

        let mut rest = first[progress.consumed..].to_vec();
        rest.extend_from_slice(second);
        let progress = decoder.decode(&rest, &mut buf);
        assert_eq!(progress, Progress::complete(rest.len(), 2));
        out.extend_from_slice(&buf[..progress.produced]);
        assert_eq!(out, units("caf\u{e9}!"));
    }

    #[test]
    fn test_final_decode_still_rejects_cut_sequence() {
        let decoder = Decoder::new(Encoding::UTF8, ConversionOptions::new()).unwrap();
        let mut buf = [0u16; 8];
        assert_eq!(decoder.decode(b"caf\xC3", &mut buf), Progress::invalid(3, 3));

        let lossy = Decoder::new(Encoding::UTF8, ConversionOptions::lossy(b'?')).unwrap();
        let progress = lossy.decode(b"caf\xC3", &mut buf);
        assert_eq!(progress, Progress::complete(4, 4));
        assert_eq!(&buf[..4], &units("caf?")[..]);
    }

    #[test]
    fn test_encode_chunk_carries_split_surrogate_pair() {
        let encoder = Encoder::new(Encoding::UTF8, ConversionOptions::lossy(b'?')).unwrap();
        let input = units("a\u{1F600}");
        let mut buf = [0u8; 8];

        let progress = encoder.encode_chunk(&input[..2], &mut buf);
        assert_eq!(progress, Progress::complete(1, 1));
        let progress = encoder.encode(&input[1..], &mut buf[1..]);
        assert_eq!(progress, Progress::complete(2, 4));
        assert_eq!(&buf[..5], "a\u{1F600}".as_bytes());
    }

    #[test]
    fn test_encoder_measures() {
        let encoder = Encoder::new(Encoding::CESU8, ConversionOptions::new()).unwrap();
        assert_eq!(encoder.encoded_len(&units("a\u{1F600}")), Progress::complete(3, 7));
        assert!(Encoder::new(Encoding::from_id(0x4242), ConversionOptions::new()).is_err());
    }
}

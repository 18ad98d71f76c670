//! Converter descriptors
//!
//! A descriptor is the static, process-lifetime description of one byte
//! encoding: which of the four converter shapes implements it, how many bytes
//! a single code unit can turn into, and the optional fallback, precompose and
//! combining-mark hooks. Descriptors are plain data; [`crate::wrapper`] turns
//! them into a uniform calling convention.

use serde::Serialize;

use crate::options::CanonicalMode;
use crate::{Encoding, Error, Result};

/// Largest number of UTF-16 units one input unit may decompose into
pub const MAX_DECOMPOSITION: usize = 8;

/// Why a conversion call returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    /// All input was consumed
    Complete,
    /// The destination ran out of room
    InsufficientOutput,
    /// The next input unit cannot be converted under the current options
    InvalidInput,
}

/// Counts reported by every codec and driver call
///
/// `consumed` counts input units (code units when encoding, bytes when
/// decoding) and `produced` counts output units. Raw codecs report `produced`
/// as the sink's running total; hooks report only what they wrote themselves.
/// The two counts are independent:
/// surrogate pairs, multi-byte sequences and combining runs all break any
/// fixed ratio between them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Progress {
    /// Input units converted
    pub consumed: usize,
    /// Output units written (or measured)
    pub produced: usize,
    /// Why conversion stopped
    pub status: Status,
}

impl Progress {
    /// All input converted
    pub const fn complete(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced, status: Status::Complete }
    }

    /// Stopped for lack of output room
    pub const fn insufficient(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced, status: Status::InsufficientOutput }
    }

    /// Stopped at unconvertible input
    pub const fn invalid(consumed: usize, produced: usize) -> Self {
        Self { consumed, produced, status: Status::InvalidInput }
    }

    /// Whether the call converted everything
    pub fn is_complete(&self) -> bool {
        self.status == Status::Complete
    }

    /// Shift both counts by an already-converted prefix
    pub(crate) fn offset(self, consumed: usize, produced: usize) -> Self {
        Self {
            consumed: self.consumed + consumed,
            produced: self.produced + produced,
            status: self.status,
        }
    }

    /// Turn a stop into the matching error, keeping the counts
    ///
    /// # Errors
    ///
    /// [`Error::InsufficientOutput`] or [`Error::InvalidInput`] when the
    /// conversion did not complete.
    pub fn into_result(self) -> Result<(usize, usize)> {
        let Progress { consumed, produced, status } = self;
        match status {
            Status::Complete => Ok((consumed, produced)),
            Status::InsufficientOutput => Err(Error::InsufficientOutput { consumed, produced }),
            Status::InvalidInput => Err(Error::InvalidInput { consumed, produced }),
        }
    }
}

/// Bounded output cursor shared by all codecs
///
/// A sink either writes into a caller buffer, refusing writes that do not
/// fit, or only measures, counting what would have been written.
#[derive(Debug)]
pub struct Sink<'a, T> {
    buf: Option<&'a mut [T]>,
    written: usize,
}

impl<'a, T: Copy> Sink<'a, T> {
    /// Write into `buf`
    pub fn new(buf: &'a mut [T]) -> Self {
        Self { buf: Some(buf), written: 0 }
    }

    /// Count output without storing it
    pub fn measure() -> Self {
        Self { buf: None, written: 0 }
    }

    /// Write into `buf`, or measure when `None`
    pub fn from_option(buf: Option<&'a mut [T]>) -> Self {
        Self { buf, written: 0 }
    }

    /// Whether this sink only measures
    pub fn is_measuring(&self) -> bool {
        self.buf.is_none()
    }

    /// Units written (or measured) so far
    pub fn written(&self) -> usize {
        self.written
    }

    /// Units that still fit
    pub fn remaining(&self) -> usize {
        match &self.buf {
            Some(buf) => buf.len() - self.written,
            None => usize::MAX - self.written,
        }
    }

    /// Append one unit; `false` when it does not fit
    pub fn push(&mut self, item: T) -> bool {
        self.extend(&[item])
    }

    /// Append all of `items` or nothing
    pub fn extend(&mut self, items: &[T]) -> bool {
        if self.remaining() < items.len() {
            return false;
        }
        if let Some(buf) = self.buf.as_deref_mut() {
            buf[self.written..self.written + items.len()].copy_from_slice(items);
        }
        self.written += items.len();
        true
    }

    /// Forget everything written after the first `len` units
    pub(crate) fn rewind(&mut self, len: usize) {
        self.written = self.written.min(len);
    }
}

/// Flags every raw codec call receives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CodecFlags {
    /// Substitute U+FFFD (or its encoding) for unpaired surrogates instead of
    /// stopping
    pub lenient: bool,
    /// Canonical decomposition while decoding
    pub canonical: Option<CanonicalMode>,
    /// Stop before a sequence cut off at the end of the input
    pub partial: bool,
}

/// Code units to bytes for a standard codec
pub type ToBytesFn = fn(&[u16], &mut Sink<'_, u8>, CodecFlags) -> Progress;
/// Bytes to code units for a standard codec
pub type ToUnitsFn = fn(&[u8], &mut Sink<'_, u16>, CodecFlags) -> Progress;
/// Lossy substitute for the units at the start of the slice
pub type BytesFallbackFn = fn(&[u16], &mut Sink<'_, u8>) -> Progress;
/// Lossy substitute for the bytes at the start of the slice
pub type UnitsFallbackFn = fn(&[u8], &mut Sink<'_, u16>) -> Progress;
/// Merge a base character and its trailing marks into one byte sequence
///
/// Reports `InvalidInput` when nothing beyond the base could be merged.
pub type PrecomposeFn = fn(&[u16], &mut Sink<'_, u8>) -> Progress;

/// Codec that converts whole runs itself
#[derive(Debug)]
pub struct StandardCodec {
    /// Units to bytes
    pub to_bytes: ToBytesFn,
    /// Bytes to units, honouring `CodecFlags::canonical`
    pub to_units: ToUnitsFn,
}

/// One byte per unit in both directions
#[derive(Debug)]
pub struct CheapEightBitCodec {
    /// Unit to byte, `None` when unmapped
    pub to_byte: fn(u16) -> Option<u8>,
    /// Byte to unit, `None` when unmapped
    pub to_unit: fn(u8) -> Option<u16>,
}

/// One byte per character, but a character may span several units
#[derive(Debug)]
pub struct StandardEightBitCodec {
    /// Leading units to one byte, returning how many units were used
    pub to_byte: fn(&[u16]) -> Option<(usize, u8)>,
    /// One byte to up to `MAX_DECOMPOSITION` units, returning the count
    /// (zero when unmapped)
    pub to_units: fn(u8, &mut [u16; MAX_DECOMPOSITION]) -> usize,
}

/// One unit to several bytes, several bytes to one unit
#[derive(Debug)]
pub struct CheapMultiByteCodec {
    /// Unit to bytes, returning the byte count (zero when unmapped)
    pub to_bytes: fn(u16, &mut [u8; 4]) -> usize,
    /// Leading bytes to one unit, returning how many bytes were used
    pub to_unit: fn(&[u8]) -> Option<(usize, u16)>,
    /// Whether the bytes are a valid sequence missing its tail
    pub is_truncated: fn(&[u8]) -> bool,
}

/// The four converter shapes
#[derive(Debug)]
pub enum Shape {
    /// Direct run converter
    Standard(StandardCodec),
    /// Single byte per unit
    CheapEightBit(CheapEightBitCodec),
    /// Single byte with a variable unit count
    StandardEightBit(StandardEightBitCodec),
    /// Multi-byte, one unit at a time
    CheapMultiByte(CheapMultiByteCodec),
}

impl Shape {
    /// Short name used in listings
    pub fn name(&self) -> &'static str {
        match self {
            Shape::Standard(_) => "standard",
            Shape::CheapEightBit(_) => "cheap-eight-bit",
            Shape::StandardEightBit(_) => "standard-eight-bit",
            Shape::CheapMultiByte(_) => "cheap-multi-byte",
        }
    }
}

/// Static description of one registered byte encoding
#[derive(Debug)]
pub struct ConverterDescriptor {
    /// Encoding this descriptor converts
    pub encoding: Encoding,
    /// Implementation shape
    pub shape: Shape,
    /// Most bytes one code unit can produce
    pub max_bytes_per_unit: usize,
    /// Most units one input unit produces when canonically decomposed
    pub max_decomposed_units: usize,
    /// Lossy substitute when encoding
    pub to_bytes_fallback: Option<BytesFallbackFn>,
    /// Lossy substitute when decoding
    pub to_units_fallback: Option<UnitsFallbackFn>,
    /// Base + combining marks to one precomposed byte sequence
    pub precompose: Option<PrecomposeFn>,
    /// Combining marks this encoding can absorb through `precompose`
    pub is_valid_combining: Option<fn(u16) -> bool>,
}

static BUILTIN: [&ConverterDescriptor; 8] = [
    &crate::utf8::DESCRIPTOR,
    &crate::single_byte::ASCII,
    &crate::single_byte::ISO_8859_1,
    &crate::single_byte::ISO_8859_15,
    &crate::single_byte::WINDOWS_1252,
    &crate::single_byte::MAC_ROMAN,
    &crate::cesu8::DESCRIPTOR,
    &crate::escaped_ascii::DESCRIPTOR,
];

/// Descriptor for a built-in encoding
pub fn builtin(encoding: Encoding) -> Option<&'static ConverterDescriptor> {
    BUILTIN.iter().copied().find(|d| d.encoding == encoding)
}

/// Every encoding with a built-in descriptor
pub fn builtin_encodings() -> impl Iterator<Item = Encoding> {
    BUILTIN.iter().map(|d| d.encoding)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_is_all_or_nothing() {
        let mut buf = [0u8; 3];
        let mut sink = Sink::new(&mut buf);
        assert!(sink.extend(b"ab"));
        assert!(!sink.extend(b"cd"));
        assert!(sink.push(b'c'));
        assert!(!sink.push(b'd'));
        assert_eq!(sink.written(), 3);
        assert_eq!(&buf, b"abc");
    }

    #[test]
    fn test_measuring_sink_counts_without_limit() {
        let mut sink = Sink::<u16>::measure();
        assert!(sink.extend(&[1; 1000]));
        assert!(sink.is_measuring());
        assert_eq!(sink.written(), 1000);
    }

    #[test]
    fn test_progress_into_result_keeps_counts() {
        assert_eq!(Progress::complete(4, 6).into_result(), Ok((4, 6)));
        assert_eq!(
            Progress::invalid(2, 3).into_result(),
            Err(Error::InvalidInput { consumed: 2, produced: 3 })
        );
        assert_eq!(
            Progress::insufficient(1, 1).into_result(),
            Err(Error::InsufficientOutput { consumed: 1, produced: 1 })
        );
    }

    #[test]
    fn test_builtin_descriptors_are_unique() {
        let mut seen: Vec<Encoding> = builtin_encodings().collect();
        let total = seen.len();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), total);
        assert!(builtin(Encoding::UTF8).is_some());
        assert!(builtin(Encoding::from_id(0xDEAD)).is_none());
    }
}

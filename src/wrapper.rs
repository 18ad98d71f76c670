//! Converter wrapper: one calling convention for every converter shape
//!
//! Each [`Shape`] variant implements [`ShapeCodec`], so callers see the same
//! three operations (encode, decode, decode into canonical form) whatever the
//! descriptor looks like. The wrapper also keeps copies of the descriptor's
//! hooks so the driver never has to reach back into the descriptor.

use std::fmt;

use smallvec::SmallVec;

use crate::descriptor::{
    BytesFallbackFn, CheapEightBitCodec, CheapMultiByteCodec, CodecFlags, ConverterDescriptor,
    MAX_DECOMPOSITION, PrecomposeFn, Progress, Shape, Sink, StandardCodec, StandardEightBitCodec,
    UnitsFallbackFn,
};
use crate::options::CanonicalMode;
use crate::unicode;
use crate::Encoding;

type Expanded = SmallVec<[u16; MAX_DECOMPOSITION]>;

/// Uniform conversion operations over one converter shape
pub trait ShapeCodec: Sync + fmt::Debug {
    /// Code units to bytes
    fn encode(&self, units: &[u16], out: &mut Sink<'_, u8>, flags: CodecFlags) -> Progress;

    /// Bytes to code units, as stored
    fn decode(&self, bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress;

    /// Bytes to canonically decomposed code units
    fn decode_canonical(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: CanonicalMode,
        flags: CodecFlags,
    ) -> Progress;
}

/// Append the decomposition of `unit` to `expanded`
fn push_decomposed(expanded: &mut Expanded, unit: u16, mode: CanonicalMode) {
    if unicode::is_surrogate(unit) {
        expanded.push(unit);
        return;
    }
    let mut parts = [0u16; MAX_DECOMPOSITION];
    let len = unicode::decompose(u32::from(unit), mode, &mut parts);
    expanded.extend_from_slice(&parts[..len]);
}

impl ShapeCodec for StandardCodec {
    fn encode(&self, units: &[u16], out: &mut Sink<'_, u8>, flags: CodecFlags) -> Progress {
        (self.to_bytes)(units, out, flags)
    }

    fn decode(&self, bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress {
        (self.to_units)(bytes, out, CodecFlags { canonical: None, ..flags })
    }

    fn decode_canonical(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: CanonicalMode,
        flags: CodecFlags,
    ) -> Progress {
        (self.to_units)(bytes, out, CodecFlags { canonical: Some(mode), ..flags })
    }
}

impl ShapeCodec for CheapEightBitCodec {
    fn encode(&self, units: &[u16], out: &mut Sink<'_, u8>, _flags: CodecFlags) -> Progress {
        for (consumed, &unit) in units.iter().enumerate() {
            let Some(byte) = (self.to_byte)(unit) else {
                return Progress::invalid(consumed, out.written());
            };
            if !out.push(byte) {
                return Progress::insufficient(consumed, out.written());
            }
        }
        Progress::complete(units.len(), out.written())
    }

    fn decode(&self, bytes: &[u8], out: &mut Sink<'_, u16>, _flags: CodecFlags) -> Progress {
        for (consumed, &byte) in bytes.iter().enumerate() {
            let Some(unit) = (self.to_unit)(byte) else {
                return Progress::invalid(consumed, out.written());
            };
            if !out.push(unit) {
                return Progress::insufficient(consumed, out.written());
            }
        }
        Progress::complete(bytes.len(), out.written())
    }

    fn decode_canonical(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: CanonicalMode,
        _flags: CodecFlags,
    ) -> Progress {
        let mut expanded = Expanded::new();
        for (consumed, &byte) in bytes.iter().enumerate() {
            let Some(unit) = (self.to_unit)(byte) else {
                return Progress::invalid(consumed, out.written());
            };
            expanded.clear();
            push_decomposed(&mut expanded, unit, mode);
            if !out.extend(&expanded) {
                return Progress::insufficient(consumed, out.written());
            }
        }
        Progress::complete(bytes.len(), out.written())
    }
}

impl StandardEightBitCodec {
    fn decode_with(&self, bytes: &[u8], out: &mut Sink<'_, u16>, mode: Option<CanonicalMode>) -> Progress {
        let mut units = [0u16; MAX_DECOMPOSITION];
        let mut expanded = Expanded::new();
        for (consumed, &byte) in bytes.iter().enumerate() {
            let len = (self.to_units)(byte, &mut units);
            if len == 0 {
                return Progress::invalid(consumed, out.written());
            }
            let fits = match mode {
                Some(mode) => {
                    expanded.clear();
                    for &unit in &units[..len] {
                        push_decomposed(&mut expanded, unit, mode);
                    }
                    out.extend(&expanded)
                }
                None => out.extend(&units[..len]),
            };
            if !fits {
                return Progress::insufficient(consumed, out.written());
            }
        }
        Progress::complete(bytes.len(), out.written())
    }
}

impl ShapeCodec for StandardEightBitCodec {
    fn encode(&self, units: &[u16], out: &mut Sink<'_, u8>, _flags: CodecFlags) -> Progress {
        let mut consumed = 0;
        while consumed < units.len() {
            let Some((used, byte)) = (self.to_byte)(&units[consumed..]) else {
                return Progress::invalid(consumed, out.written());
            };
            if !out.push(byte) {
                return Progress::insufficient(consumed, out.written());
            }
            consumed += used;
        }
        Progress::complete(consumed, out.written())
    }

    fn decode(&self, bytes: &[u8], out: &mut Sink<'_, u16>, _flags: CodecFlags) -> Progress {
        self.decode_with(bytes, out, None)
    }

    fn decode_canonical(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: CanonicalMode,
        _flags: CodecFlags,
    ) -> Progress {
        self.decode_with(bytes, out, Some(mode))
    }
}

impl CheapMultiByteCodec {
    fn decode_with(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: Option<CanonicalMode>,
        partial: bool,
    ) -> Progress {
        let mut consumed = 0;
        let mut expanded = Expanded::new();
        while consumed < bytes.len() {
            let tail = &bytes[consumed..];
            let Some((used, unit)) = (self.to_unit)(tail) else {
                if partial && (self.is_truncated)(tail) {
                    return Progress::complete(consumed, out.written());
                }
                return Progress::invalid(consumed, out.written());
            };
            let fits = match mode {
                Some(mode) => {
                    expanded.clear();
                    push_decomposed(&mut expanded, unit, mode);
                    out.extend(&expanded)
                }
                None => out.push(unit),
            };
            if !fits {
                return Progress::insufficient(consumed, out.written());
            }
            consumed += used;
        }
        Progress::complete(consumed, out.written())
    }
}

impl ShapeCodec for CheapMultiByteCodec {
    fn encode(&self, units: &[u16], out: &mut Sink<'_, u8>, _flags: CodecFlags) -> Progress {
        let mut buf = [0u8; 4];
        for (consumed, &unit) in units.iter().enumerate() {
            let len = (self.to_bytes)(unit, &mut buf);
            if len == 0 {
                return Progress::invalid(consumed, out.written());
            }
            if !out.extend(&buf[..len]) {
                return Progress::insufficient(consumed, out.written());
            }
        }
        Progress::complete(units.len(), out.written())
    }

    fn decode(&self, bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress {
        self.decode_with(bytes, out, None, flags.partial)
    }

    fn decode_canonical(
        &self,
        bytes: &[u8],
        out: &mut Sink<'_, u16>,
        mode: CanonicalMode,
        flags: CodecFlags,
    ) -> Progress {
        self.decode_with(bytes, out, Some(mode), flags.partial)
    }
}

/// Dispatch table built once per encoding from its descriptor
pub struct ConverterWrapper {
    descriptor: &'static ConverterDescriptor,
    codec: &'static dyn ShapeCodec,
    to_bytes_fallback: Option<BytesFallbackFn>,
    to_units_fallback: Option<UnitsFallbackFn>,
    precompose: Option<PrecomposeFn>,
    is_valid_combining: Option<fn(u16) -> bool>,
}

impl ConverterWrapper {
    /// Normalize `descriptor` into a dispatch table
    pub fn new(descriptor: &'static ConverterDescriptor) -> Self {
        let codec: &'static dyn ShapeCodec = match &descriptor.shape {
            Shape::Standard(codec) => codec,
            Shape::CheapEightBit(codec) => codec,
            Shape::StandardEightBit(codec) => codec,
            Shape::CheapMultiByte(codec) => codec,
        };
        Self {
            descriptor,
            codec,
            to_bytes_fallback: descriptor.to_bytes_fallback,
            to_units_fallback: descriptor.to_units_fallback,
            precompose: descriptor.precompose,
            is_valid_combining: descriptor.is_valid_combining,
        }
    }

    /// Encoding this wrapper converts
    pub fn encoding(&self) -> Encoding {
        self.descriptor.encoding
    }

    /// Underlying descriptor
    pub fn descriptor(&self) -> &'static ConverterDescriptor {
        self.descriptor
    }

    /// Name of the converter shape
    pub fn shape_name(&self) -> &'static str {
        self.descriptor.shape.name()
    }

    /// Whether every unit maps to exactly one byte
    pub fn is_cheap_eight_bit(&self) -> bool {
        matches!(self.descriptor.shape, Shape::CheapEightBit(_))
    }

    /// Most bytes a single code unit can produce
    pub fn max_bytes_per_unit(&self) -> usize {
        self.descriptor.max_bytes_per_unit
    }

    /// Convert code units into `out`
    pub fn to_bytes(&self, units: &[u16], out: &mut Sink<'_, u8>, flags: CodecFlags) -> Progress {
        self.codec.encode(units, out, flags)
    }

    /// Convert bytes into `out`, decomposing when `flags.canonical` is set
    pub fn to_units(&self, bytes: &[u8], out: &mut Sink<'_, u16>, flags: CodecFlags) -> Progress {
        match flags.canonical {
            Some(mode) => self.codec.decode_canonical(bytes, out, mode, flags),
            None => self.codec.decode(bytes, out, flags),
        }
    }

    /// Upper bound on bytes produced from `units` code units
    pub fn bytes_len_estimate(&self, units: usize) -> usize {
        units.saturating_mul(self.descriptor.max_bytes_per_unit)
    }

    /// Estimate of units produced from `bytes` bytes
    ///
    /// Exact for plain decoding; canonical decoding may exceed it for
    /// unusually long decompositions.
    pub fn units_len_estimate(&self, bytes: usize, canonical: bool) -> usize {
        if canonical {
            bytes.saturating_mul(self.descriptor.max_decomposed_units.max(1))
        } else {
            bytes
        }
    }

    /// Lossy substitute hook for encoding
    pub fn to_bytes_fallback(&self) -> Option<BytesFallbackFn> {
        self.to_bytes_fallback
    }

    /// Lossy substitute hook for decoding
    pub fn to_units_fallback(&self) -> Option<UnitsFallbackFn> {
        self.to_units_fallback
    }

    /// Precompose hook
    pub fn precompose(&self) -> Option<PrecomposeFn> {
        self.precompose
    }

    /// Combining marks this encoding can absorb
    pub fn is_valid_combining(&self) -> Option<fn(u16) -> bool> {
        self.is_valid_combining
    }
}

impl fmt::Debug for ConverterWrapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConverterWrapper")
            .field("encoding", &self.encoding())
            .field("shape", &self.shape_name())
            .field("max_bytes_per_unit", &self.max_bytes_per_unit())
            .finish_non_exhaustive()
    }
}

//! # FastText - Mutable Text Values and Encoding Conversion
//!
//! A compact text-value runtime: space-efficient mutable storage for UTF-16
//! code units plus a pluggable engine converting between that storage and
//! external byte encodings.
//!
//! ## Features
//!
//! - **Variable-width storage**: 8-bit units until content needs 16 bits
//! - **In-place multi-range edits** with minimal copying
//! - **Pluggable codecs** described by static converter descriptors
//! - **Lossy, precomposing and canonical conversion**, opt-in per call
//! - **Restartable conversion** into fixed-size caller buffers
//!
//! ## Quick Start
//!
//! ```rust
//! use fast_text::{decode, encode_to_vec, ConversionOptions, Encoding};
//!
//! // Decode Mac OS Roman bytes into a text value
//! let mut text = decode(b"Caf\x8E", Encoding::MAC_ROMAN, &ConversionOptions::new()).unwrap();
//! assert_eq!(text.to_string(), "Café");
//!
//! // Edit it in place and export as UTF-8
//! text.append_str(" \u{2615}").unwrap();
//! let bytes = encode_to_vec(&text, .., Encoding::UTF8, &ConversionOptions::new()).unwrap();
//! assert_eq!(std::str::from_utf8(&bytes).unwrap(), "Café ☕");
//! ```

#![deny(missing_docs)]

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};
use thiserror::Error;

mod cesu8;
pub mod decoder;
pub mod descriptor;
pub mod driver;
pub mod encoder;
mod escaped_ascii;
pub mod options;
pub mod registry;
mod single_byte;
mod tables;
pub mod text;
mod unicode;
pub mod utf8;
pub mod wrapper;

pub use decoder::decode;
pub use descriptor::{Progress, Status};
pub use encoder::{encode, encode_to_vec, encode_with, external_representation};
pub use options::{CanonicalMode, CombiningPolicy, ConversionOptions, SubstitutePolicy};
pub use text::{ContentsAllocator, Ownership, TextValue, Units, Width};

/// Result type for text and encoding operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during conversion or mutation
///
/// Allocation failure is not represented: it is fatal and reported through
/// [`std::alloc::handle_alloc_error`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The encoding has no converter
    #[error("unknown encoding {0}")]
    UnknownEncoding(Encoding),
    /// A label did not name any known encoding
    #[error("unknown encoding label {0:?}")]
    UnknownLabel(String),
    /// Input could not be converted under the requested options
    #[error("invalid input after {consumed} units consumed ({produced} produced)")]
    InvalidInput {
        /// Input units successfully converted
        consumed: usize,
        /// Output units written for that prefix
        produced: usize,
    },
    /// The destination buffer filled up
    #[error("output exhausted after {consumed} units consumed ({produced} produced)")]
    InsufficientOutput {
        /// Input units successfully converted
        consumed: usize,
        /// Output units written for that prefix
        produced: usize,
    },
    /// A length ceiling would be exceeded
    #[error("length {requested} exceeds the declared maximum of {max}")]
    CapacityExceeded {
        /// Length the operation needed
        requested: usize,
        /// Declared ceiling
        max: usize,
    },
    /// A range does not fit the text
    #[error("range {start}..{end} is out of bounds for length {len}")]
    InvalidRange {
        /// Range start
        start: usize,
        /// Range end
        end: usize,
        /// Text length
        len: usize,
    },
    /// Edit ranges were not sorted or overlapped
    #[error("edit ranges must be sorted and non-overlapping")]
    UnsortedRanges,
}

/// Encoding identifier
///
/// An opaque numeric tag: stable, comparable and used as the registry key.
/// Identifiers without a converter are representable; looking them up simply
/// fails with [`Error::UnknownEncoding`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Encoding(u32);

impl Encoding {
    /// Mac OS Roman
    pub const MAC_ROMAN: Encoding = Encoding(0x0000);
    /// UTF-16 with byte order taken from a BOM (big endian without one)
    pub const UTF16: Encoding = Encoding(0x0100);
    /// ISO-8859-1 (Latin-1)
    pub const ISO_8859_1: Encoding = Encoding(0x0201);
    /// ISO-8859-15 (Latin-9)
    pub const ISO_8859_15: Encoding = Encoding(0x020F);
    /// Windows-1252 (Western European)
    pub const WINDOWS_1252: Encoding = Encoding(0x0500);
    /// US-ASCII (7-bit)
    pub const ASCII: Encoding = Encoding(0x0600);
    /// ASCII with `\uXXXX` and octal escapes for everything else
    pub const NON_LOSSY_ASCII: Encoding = Encoding(0x0BFF);
    /// UTF-8
    pub const UTF8: Encoding = Encoding(0x0800_0100);
    /// CESU-8 (UTF-8 over UTF-16 code units)
    pub const CESU8: Encoding = Encoding(0x0900_0100);
    /// UTF-32 with byte order taken from a BOM (big endian without one)
    pub const UTF32: Encoding = Encoding(0x0C00_0100);
    /// UTF-16 big endian
    pub const UTF16BE: Encoding = Encoding(0x1000_0100);
    /// UTF-16 little endian
    pub const UTF16LE: Encoding = Encoding(0x1400_0100);
    /// UTF-32 big endian
    pub const UTF32BE: Encoding = Encoding(0x1800_0100);
    /// UTF-32 little endian
    pub const UTF32LE: Encoding = Encoding(0x1C00_0100);

    const KNOWN: [(Encoding, &'static str); 14] = [
        (Encoding::UTF8, "UTF-8"),
        (Encoding::UTF16, "UTF-16"),
        (Encoding::UTF16BE, "UTF-16BE"),
        (Encoding::UTF16LE, "UTF-16LE"),
        (Encoding::UTF32, "UTF-32"),
        (Encoding::UTF32BE, "UTF-32BE"),
        (Encoding::UTF32LE, "UTF-32LE"),
        (Encoding::ASCII, "US-ASCII"),
        (Encoding::ISO_8859_1, "ISO-8859-1"),
        (Encoding::ISO_8859_15, "ISO-8859-15"),
        (Encoding::WINDOWS_1252, "Windows-1252"),
        (Encoding::MAC_ROMAN, "MacRoman"),
        (Encoding::CESU8, "CESU-8"),
        (Encoding::NON_LOSSY_ASCII, "NonLossyASCII"),
    ];

    /// Wrap a raw identifier
    pub const fn from_id(id: u32) -> Self {
        Encoding(id)
    }

    /// The raw identifier
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Every encoding this crate can convert
    pub fn builtin() -> impl Iterator<Item = Encoding> {
        Self::KNOWN.iter().map(|(encoding, _)| *encoding)
    }

    /// Get the canonical name of this encoding
    pub fn name(self) -> &'static str {
        Self::KNOWN
            .iter()
            .find(|(encoding, _)| *encoding == self)
            .map_or("unknown", |(_, name)| name)
    }

    /// Look up an encoding by name or common alias (case-insensitive)
    pub fn for_label(label: &str) -> Option<Self> {
        let normalized: String = label
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_uppercase())
            .collect();
        let encoding = match normalized.as_str() {
            "UTF8" => Encoding::UTF8,
            "UTF16" | "UNICODE" => Encoding::UTF16,
            "UTF16BE" => Encoding::UTF16BE,
            "UTF16LE" => Encoding::UTF16LE,
            "UTF32" => Encoding::UTF32,
            "UTF32BE" => Encoding::UTF32BE,
            "UTF32LE" => Encoding::UTF32LE,
            "ASCII" | "USASCII" => Encoding::ASCII,
            "ISO88591" | "LATIN1" => Encoding::ISO_8859_1,
            "ISO885915" | "LATIN9" => Encoding::ISO_8859_15,
            "WINDOWS1252" | "WIN1252" | "CP1252" => Encoding::WINDOWS_1252,
            "MACROMAN" | "MACINTOSH" => Encoding::MAC_ROMAN,
            "CESU8" => Encoding::CESU8,
            "NONLOSSYASCII" => Encoding::NON_LOSSY_ASCII,
            _ => return None,
        };
        Some(encoding)
    }

    /// Check if this encoding is ASCII-compatible (ASCII bytes 0-127 have same meaning)
    pub fn is_ascii_compatible(self) -> bool {
        matches!(
            self,
            Encoding::UTF8
                | Encoding::CESU8
                | Encoding::ASCII
                | Encoding::ISO_8859_1
                | Encoding::ISO_8859_15
                | Encoding::WINDOWS_1252
                | Encoding::MAC_ROMAN
        )
    }

    /// Whether this is one of the UTF-16 or UTF-32 forms
    pub fn is_unicode_family(self) -> bool {
        self.is_utf16() || self.is_utf32()
    }

    pub(crate) fn is_utf16(self) -> bool {
        matches!(self, Encoding::UTF16 | Encoding::UTF16BE | Encoding::UTF16LE)
    }

    pub(crate) fn is_utf32(self) -> bool {
        matches!(self, Encoding::UTF32 | Encoding::UTF32BE | Encoding::UTF32LE)
    }

    /// Whether text in this encoding can hold every Unicode scalar
    pub fn is_unicode(self) -> bool {
        self.is_unicode_family()
            || matches!(self, Encoding::UTF8 | Encoding::CESU8 | Encoding::NON_LOSSY_ASCII)
    }

    /// Whether decode and encode accept this encoding
    pub fn is_available(self) -> bool {
        self.is_unicode_family() || registry::lookup(self).is_some()
    }

    /// Get the byte order mark (BOM) for this encoding if it has one
    pub fn bom(self) -> Option<&'static [u8]> {
        match self {
            Encoding::UTF8 => Some(&[0xEF, 0xBB, 0xBF]),
            Encoding::UTF16 | Encoding::UTF16BE => Some(&[0xFE, 0xFF]),
            Encoding::UTF16LE => Some(&[0xFF, 0xFE]),
            Encoding::UTF32 | Encoding::UTF32BE => Some(&[0x00, 0x00, 0xFE, 0xFF]),
            Encoding::UTF32LE => Some(&[0xFF, 0xFE, 0x00, 0x00]),
            _ => None,
        }
    }
}

impl fmt::Debug for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "unknown" => write!(f, "Encoding(0x{:08X})", self.0),
            name => write!(f, "Encoding({name})"),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            "unknown" => write!(f, "0x{:08X}", self.0),
            name => f.write_str(name),
        }
    }
}

impl FromStr for Encoding {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Encoding::for_label(s).ok_or_else(|| Error::UnknownLabel(s.to_string()))
    }
}

impl Serialize for Encoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

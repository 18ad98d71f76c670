//! Per-call conversion configuration
//!
//! Lossy substitution, combining-mark handling and canonical decomposition are
//! all opt-in and selected here by name.

use serde::Serialize;

/// What to emit in place of input that has no mapping in the target encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SubstitutePolicy {
    /// Emit one caller-chosen byte (when encoding) or the unit with that
    /// value (when decoding) per unconvertible character
    Byte(u8),
    /// Ask the codec's fallback hook for a substitute sequence
    ///
    /// Codecs without a hook substitute `?` when encoding and U+FFFD when
    /// decoding.
    Fallback,
}

/// How combining marks that cannot be converted on their own are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum CombiningPolicy {
    /// Try to merge the base character and its marks into one precomposed
    /// character before giving up
    #[default]
    Compose,
    /// Treat marks like any other unconvertible unit
    Substitute,
    /// Like `Compose`, but marks that still cannot be converted are dropped
    /// when no lossy policy is set
    Ignore,
}

/// Canonical decomposition applied while decoding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CanonicalMode {
    /// Full canonical decomposition (NFD-style, no reordering)
    Standard,
    /// HFS+ variant: leaves U+2000..U+2FFF, U+F900..U+FAFF and
    /// U+2F800..U+2FAFF composed
    Hfs,
}

/// Options accepted by the driver, the decoder and the encoder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ConversionOptions {
    /// Lossy substitution; `None` means unconvertible input stops conversion
    pub lossy: Option<SubstitutePolicy>,
    /// Combining-mark handling
    pub combining: CombiningPolicy,
    /// Canonical decomposition while decoding
    pub canonical_form: Option<CanonicalMode>,
    /// Reject unpaired surrogates and out-of-range scalars instead of
    /// substituting U+FFFD
    ///
    /// When `false` and no lossy policy is set, decoding also replaces
    /// malformed byte sequences through the codec's fallback.
    pub strict: bool,
    /// Keep decoded text 16 bits wide even when it is pure ASCII
    pub force_wide: bool,
    /// Maximum number of code units a decode may produce
    pub max_length: Option<usize>,
    /// More input follows this call
    ///
    /// Codecs stop before a sequence cut off at the end of the input (a
    /// truncated UTF-8 sequence, a trailing high surrogate) and report it as
    /// unconsumed instead of malformed.
    pub partial_input: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            lossy: None,
            combining: CombiningPolicy::default(),
            canonical_form: None,
            strict: true,
            force_wide: false,
            max_length: None,
            partial_input: false,
        }
    }
}

impl ConversionOptions {
    /// Strict, non-lossy conversion
    pub fn new() -> Self {
        Self::default()
    }

    /// Lossy conversion substituting `byte`
    pub fn lossy(byte: u8) -> Self {
        Self::default().with_lossy(SubstitutePolicy::Byte(byte))
    }

    /// Set the lossy substitution policy
    #[must_use]
    pub fn with_lossy(mut self, policy: SubstitutePolicy) -> Self {
        self.lossy = Some(policy);
        self
    }

    /// Set the combining-mark policy
    #[must_use]
    pub fn with_combining(mut self, policy: CombiningPolicy) -> Self {
        self.combining = policy;
        self
    }

    /// Decode into canonically decomposed form
    #[must_use]
    pub fn with_canonical_form(mut self, mode: CanonicalMode) -> Self {
        self.canonical_form = Some(mode);
        self
    }

    /// Toggle strict Unicode handling
    #[must_use]
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Keep decoded text 16 bits wide
    #[must_use]
    pub fn with_force_wide(mut self, force_wide: bool) -> Self {
        self.force_wide = force_wide;
        self
    }

    /// Cap the decoded length
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Treat the input as one chunk of a longer stream
    #[must_use]
    pub fn with_partial_input(mut self, partial_input: bool) -> Self {
        self.partial_input = partial_input;
        self
    }

    /// Whether codecs may substitute U+FFFD themselves
    pub(crate) fn lenient(&self) -> bool {
        !self.strict || self.lossy.is_some()
    }
}

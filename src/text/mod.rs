//! Mutable text values
//!
//! A [`TextValue`] stores UTF-16 code units in 8-bit form while every unit
//! fits in a byte (Latin-1), and in 16-bit form once one does not or the
//! caller asks for it. Width is never demoted except when the value becomes
//! empty. Length is a single explicit count; capacity is in bytes of backing
//! store.
//!
//! All mutation funnels through [`TextValue::replace_ranges`].

mod editor;
mod storage;

use std::borrow::Cow;
use std::fmt::{self, Write as _};
use std::ops::{Bound, Range, RangeBounds};
use std::sync::Arc;

pub use storage::{ContentsAllocator, DefaultAllocator};

use crate::{Error, Result};

/// Size of each stored code unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Width {
    /// One byte per unit, every unit at most 0xFF
    Narrow,
    /// Two bytes per unit
    Wide,
}

/// Who owns a text value's backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// Allocated and freed by the value itself
    Internal,
    /// Borrowed from the caller; never reallocated
    External,
    /// Allocated through a caller-supplied [`ContentsAllocator`]
    CallerAllocator,
}

/// Borrowed code units in their stored width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Units<'a> {
    /// 8-bit units (Latin-1)
    Narrow(&'a [u8]),
    /// 16-bit units
    Wide(&'a [u16]),
}

impl<'a> Units<'a> {
    /// Number of code units
    pub fn len(&self) -> usize {
        match self {
            Units::Narrow(bytes) => bytes.len(),
            Units::Wide(units) => units.len(),
        }
    }

    /// Whether there are no units
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unit at `index`
    pub fn get(&self, index: usize) -> Option<u16> {
        match self {
            Units::Narrow(bytes) => bytes.get(index).map(|&byte| u16::from(byte)),
            Units::Wide(units) => units.get(index).copied(),
        }
    }

    /// Iterate the units as 16-bit values
    pub fn iter(self) -> impl Iterator<Item = u16> + 'a {
        let (narrow, wide): (&'a [u8], &'a [u16]) = match self {
            Units::Narrow(bytes) => (bytes, &[]),
            Units::Wide(units) => (&[], units),
        };
        narrow.iter().map(|&byte| u16::from(byte)).chain(wide.iter().copied())
    }

    /// Sub-range of the units
    ///
    /// # Panics
    ///
    /// When `range` is out of bounds.
    pub fn slice(self, range: Range<usize>) -> Units<'a> {
        match self {
            Units::Narrow(bytes) => Units::Narrow(&bytes[range]),
            Units::Wide(units) => Units::Wide(&units[range]),
        }
    }

    /// Copy out as 16-bit units
    pub fn to_vec(self) -> Vec<u16> {
        self.iter().collect()
    }

    /// Whether any unit needs 16 bits
    pub fn needs_wide(&self) -> bool {
        match self {
            Units::Narrow(_) => false,
            Units::Wide(units) => units.iter().any(|&unit| unit > 0xFF),
        }
    }
}

/// Resolve `range` against a length of `len`
pub(crate) fn resolve_range(range: impl RangeBounds<usize>, len: usize) -> Result<Range<usize>> {
    let start = match range.start_bound() {
        Bound::Included(&start) => start,
        Bound::Excluded(&start) => start.saturating_add(1),
        Bound::Unbounded => 0,
    };
    let end = match range.end_bound() {
        Bound::Included(&end) => end.saturating_add(1),
        Bound::Excluded(&end) => end,
        Bound::Unbounded => len,
    };
    if start > end || end > len {
        return Err(Error::InvalidRange { start, end, len });
    }
    Ok(start..end)
}

enum Store<'buf> {
    Owned(Box<[u16]>),
    External(&'buf mut [u16]),
}

impl Store<'_> {
    fn units(&self) -> &[u16] {
        match self {
            Store::Owned(store) => store,
            Store::External(buf) => buf,
        }
    }

    fn units_mut(&mut self) -> &mut [u16] {
        match self {
            Store::Owned(store) => store,
            Store::External(buf) => buf,
        }
    }
}

/// Mutable, variable-width text
///
/// `'buf` is the lifetime of an external backing store; values that own
/// their store are `TextValue<'static>`.
///
/// A value has no internal synchronization. It may be shared for reading but
/// is mutated through `&mut self` only.
pub struct TextValue<'buf> {
    store: Store<'buf>,
    len: usize,
    width: Width,
    max_length: Option<usize>,
    /// Growth target in code units
    desired_capacity: usize,
    allocator: Option<Arc<dyn ContentsAllocator>>,
}

impl TextValue<'static> {
    fn from_store(store: Box<[u16]>, len: usize, width: Width) -> Self {
        Self {
            store: Store::Owned(store),
            len,
            width,
            max_length: None,
            desired_capacity: 0,
            allocator: None,
        }
    }

    /// An empty value
    pub fn new() -> Self {
        Self::from_store(Box::default(), 0, Width::Narrow)
    }

    /// An empty value that will not shrink below `units` code units
    pub fn with_capacity(units: usize) -> Self {
        let bytes = DefaultAllocator.preferred_size(units);
        let mut text = Self::from_store(storage::allocate(storage::units_for(bytes), &DefaultAllocator), 0, Width::Narrow);
        text.desired_capacity = units;
        text
    }

    /// An empty value that refuses to grow beyond `max_length` code units
    pub fn with_max_length(max_length: usize) -> Self {
        let mut text = Self::new();
        text.max_length = Some(max_length);
        text.desired_capacity = max_length;
        text
    }

    /// An empty value whose stores come from `allocator`
    pub fn with_allocator(allocator: Arc<dyn ContentsAllocator>) -> Self {
        let mut text = Self::new();
        text.allocator = Some(allocator);
        text
    }

    /// Copy of `bytes` interpreted as Latin-1
    pub fn from_latin1(bytes: &[u8]) -> Self {
        let mut store = storage::allocate(storage::units_for(bytes.len()), &DefaultAllocator);
        bytemuck::cast_slice_mut::<u16, u8>(&mut store)[..bytes.len()].copy_from_slice(bytes);
        Self::from_store(store, bytes.len(), Width::Narrow)
    }

    /// Copy of `units`, stored narrow when every unit fits in a byte
    pub fn from_units(units: &[u16]) -> Self {
        Self::from_decoded(units.to_vec(), 0xFF, false)
    }

    /// Take ownership of decoded units
    ///
    /// Narrows when no unit exceeds `narrow_max` unless `force_wide` is set.
    pub(crate) fn from_decoded(units: Vec<u16>, narrow_max: u16, force_wide: bool) -> Self {
        if !force_wide && units.iter().all(|&unit| unit <= narrow_max) {
            let mut store = storage::allocate(storage::units_for(units.len()), &DefaultAllocator);
            for (slot, &unit) in bytemuck::cast_slice_mut::<u16, u8>(&mut store).iter_mut().zip(&units) {
                *slot = unit as u8;
            }
            return Self::from_store(store, units.len(), Width::Narrow);
        }
        let len = units.len();
        Self::from_store(units.into_boxed_slice(), len, Width::Wide)
    }

    /// Check that `len` fits a declared ceiling
    pub(crate) fn check_max_length(len: usize, max_length: Option<usize>) -> Result<()> {
        match max_length {
            Some(max) if len > max => Err(Error::CapacityExceeded { requested: len, max }),
            _ => Ok(()),
        }
    }
}

impl<'buf> TextValue<'buf> {
    /// A value stored in `buf`, whose first `len` units are its content
    ///
    /// The value is always 16 bits wide and is never reallocated: edits
    /// that do not fit in `buf` fail with [`Error::CapacityExceeded`].
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] when `len` exceeds the buffer.
    pub fn with_external_buffer(buf: &'buf mut [u16], len: usize) -> Result<Self> {
        if len > buf.len() {
            return Err(Error::InvalidRange { start: 0, end: len, len: buf.len() });
        }
        Ok(Self {
            store: Store::External(buf),
            len,
            width: Width::Wide,
            max_length: None,
            desired_capacity: 0,
            allocator: None,
        })
    }

    pub(crate) fn allocator(&self) -> &dyn ContentsAllocator {
        self.allocator.as_deref().unwrap_or(&DefaultAllocator)
    }

    /// Length in code units
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the value is empty
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current storage width
    pub fn width(&self) -> Width {
        self.width
    }

    /// Whether units are stored 16 bits wide
    pub fn is_wide(&self) -> bool {
        self.width == Width::Wide
    }

    /// Allocated backing store in bytes
    pub fn capacity(&self) -> usize {
        self.store.units().len() * 2
    }

    /// Declared length ceiling
    pub fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    /// Who owns the backing store
    pub fn ownership(&self) -> Ownership {
        match (&self.store, &self.allocator) {
            (Store::External(_), _) => Ownership::External,
            (Store::Owned(_), Some(_)) => Ownership::CallerAllocator,
            (Store::Owned(_), None) => Ownership::Internal,
        }
    }

    /// Content in its stored width
    pub fn as_units(&self) -> Units<'_> {
        match self.width {
            Width::Narrow => Units::Narrow(&bytemuck::cast_slice::<u16, u8>(self.store.units())[..self.len]),
            Width::Wide => Units::Wide(&self.store.units()[..self.len]),
        }
    }

    /// Content as bytes when stored narrow
    pub fn narrow_bytes(&self) -> Option<&[u8]> {
        match self.as_units() {
            Units::Narrow(bytes) => Some(bytes),
            Units::Wide(_) => None,
        }
    }

    /// Content as 16-bit units when stored wide
    pub fn wide_units(&self) -> Option<&[u16]> {
        match self.as_units() {
            Units::Wide(units) => Some(units),
            Units::Narrow(_) => None,
        }
    }

    /// Narrow content followed by a NUL byte, for byte-pointer consumers
    pub fn narrow_bytes_with_terminator(&self) -> Option<Vec<u8>> {
        let bytes = self.narrow_bytes()?;
        let mut terminated = Vec::with_capacity(bytes.len() + 1);
        terminated.extend_from_slice(bytes);
        terminated.push(0);
        Some(terminated)
    }

    /// Unit at `index`
    pub fn code_unit_at(&self, index: usize) -> Option<u16> {
        self.as_units().get(index)
    }

    /// Units in `range` as 16-bit values, borrowed when stored wide
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] when `range` does not fit.
    pub fn code_units(&self, range: impl RangeBounds<usize>) -> Result<Cow<'_, [u16]>> {
        let range = resolve_range(range, self.len)?;
        Ok(match self.as_units().slice(range) {
            Units::Wide(units) => Cow::Borrowed(units),
            narrow @ Units::Narrow(_) => Cow::Owned(narrow.to_vec()),
        })
    }

    /// Replace each of `ranges` with `insertion`
    ///
    /// `ranges` must be sorted and non-overlapping. This is the single
    /// mutation entry point; every other editing method is built on it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`], [`Error::UnsortedRanges`], or
    /// [`Error::CapacityExceeded`] when a declared ceiling or an external
    /// store is too small. On error the value is unchanged.
    pub fn replace_ranges(&mut self, ranges: &[Range<usize>], insertion: Units<'_>) -> Result<()> {
        self.edit(ranges, insertion, false)
    }

    /// Append `units`
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] past a declared ceiling.
    pub fn append(&mut self, units: &[u16]) -> Result<()> {
        let end = self.len;
        self.edit(&[end..end], Units::Wide(units), false)
    }

    /// Append a string
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] past a declared ceiling.
    pub fn append_str(&mut self, s: &str) -> Result<()> {
        let end = self.len;
        self.insert_str(end, s)
    }

    /// Append one unit
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] past a declared ceiling.
    pub fn push(&mut self, unit: u16) -> Result<()> {
        self.append(&[unit])
    }

    /// Insert `units` before `index`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] past the end, [`Error::CapacityExceeded`] past
    /// a declared ceiling.
    pub fn insert(&mut self, index: usize, units: &[u16]) -> Result<()> {
        self.edit(&[index..index], Units::Wide(units), false)
    }

    /// Insert a string before `index`
    ///
    /// # Errors
    ///
    /// As [`TextValue::insert`].
    pub fn insert_str(&mut self, index: usize, s: &str) -> Result<()> {
        if s.is_ascii() {
            return self.edit(&[index..index], Units::Narrow(s.as_bytes()), false);
        }
        let units: Vec<u16> = s.encode_utf16().collect();
        self.edit(&[index..index], Units::Wide(&units), false)
    }

    /// Remove `range`
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] when `range` does not fit.
    pub fn delete(&mut self, range: impl RangeBounds<usize>) -> Result<()> {
        let range = resolve_range(range, self.len)?;
        self.edit(&[range], Units::Narrow(&[]), false)
    }

    /// Replace `range` with `units`
    ///
    /// # Errors
    ///
    /// As [`TextValue::replace_ranges`].
    pub fn replace(&mut self, range: impl RangeBounds<usize>, units: &[u16]) -> Result<()> {
        let range = resolve_range(range, self.len)?;
        self.edit(&[range], Units::Wide(units), false)
    }

    /// Replace every non-overlapping occurrence of `pattern`, returning the
    /// number replaced
    ///
    /// All occurrences are replaced in one multi-range edit.
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] past a declared ceiling.
    pub fn replace_all(&mut self, pattern: &[u16], replacement: &[u16]) -> Result<usize> {
        if pattern.is_empty() {
            return Ok(0);
        }
        let haystack = self.as_units();
        let mut ranges = Vec::new();
        let mut start = 0;
        while start + pattern.len() <= self.len {
            let matched = pattern
                .iter()
                .enumerate()
                .all(|(i, &unit)| haystack.get(start + i) == Some(unit));
            if matched {
                ranges.push(start..start + pattern.len());
                start += pattern.len();
            } else {
                start += 1;
            }
        }
        self.edit(&ranges, Units::Wide(replacement), false)?;
        Ok(ranges.len())
    }

    /// Remove all content
    pub fn clear(&mut self) {
        if self.len > 0 {
            self.collapse();
        }
    }

    /// Shorten to `len` units
    ///
    /// # Errors
    ///
    /// [`Error::InvalidRange`] when `len` exceeds the current length.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        self.delete(len..)
    }

    /// Store 16 bits wide from now on, whatever the content
    ///
    /// # Errors
    ///
    /// [`Error::CapacityExceeded`] when an external store cannot hold the
    /// value (never the case: external stores are already wide).
    pub fn force_wide(&mut self) -> Result<()> {
        if self.is_wide() {
            return Ok(());
        }
        let end = self.len;
        self.edit(&[end..end], Units::Narrow(&[]), true)
    }

    /// Owned copy with the same width and settings
    pub fn to_static(&self) -> TextValue<'static> {
        let len = self.len;
        let store = match self.as_units() {
            Units::Narrow(bytes) => {
                let mut store = storage::allocate(storage::units_for(len), self.allocator());
                bytemuck::cast_slice_mut::<u16, u8>(&mut store)[..len].copy_from_slice(bytes);
                store
            }
            Units::Wide(units) => {
                let mut store = storage::allocate(len, self.allocator());
                store.copy_from_slice(units);
                store
            }
        };
        TextValue {
            store: Store::Owned(store),
            len,
            width: self.width,
            max_length: self.max_length,
            desired_capacity: self.desired_capacity,
            allocator: self.allocator.clone(),
        }
    }
}

impl Default for TextValue<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for TextValue<'_> {
    fn clone(&self) -> Self {
        self.to_static()
    }
}

impl From<&str> for TextValue<'static> {
    fn from(s: &str) -> Self {
        if s.is_ascii() {
            return Self::from_latin1(s.as_bytes());
        }
        let units: Vec<u16> = s.encode_utf16().collect();
        Self::from_decoded(units, 0xFF, false)
    }
}

impl fmt::Display for TextValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in char::decode_utf16(self.as_units().iter()) {
            f.write_char(ch.unwrap_or(char::REPLACEMENT_CHARACTER))?;
        }
        Ok(())
    }
}

impl fmt::Debug for TextValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextValue")
            .field("text", &self.to_string())
            .field("len", &self.len)
            .field("width", &self.width)
            .field("capacity", &self.capacity())
            .field("ownership", &self.ownership())
            .finish()
    }
}

impl<'b> PartialEq<TextValue<'b>> for TextValue<'_> {
    fn eq(&self, other: &TextValue<'b>) -> bool {
        self.len == other.len && self.as_units().iter().eq(other.as_units().iter())
    }
}

impl Eq for TextValue<'_> {}

impl PartialEq<str> for TextValue<'_> {
    fn eq(&self, other: &str) -> bool {
        self.as_units().iter().eq(other.encode_utf16())
    }
}

impl PartialEq<&str> for TextValue<'_> {
    fn eq(&self, other: &&str) -> bool {
        self == *other
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;

    #[derive(Debug, Default)]
    struct CountingAllocator {
        allocations: AtomicUsize,
    }

    impl ContentsAllocator for CountingAllocator {
        fn allocate(&self, units: usize) -> Option<Box<[u16]>> {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            Some(vec![0; units].into_boxed_slice())
        }
    }

    #[test]
    fn test_narrow_until_needed() {
        let mut text = TextValue::from("caf\u{e9}");
        assert_eq!(text.width(), Width::Narrow);
        assert_eq!(text.narrow_bytes(), Some(&b"caf\xE9"[..]));

        text.push(0xFF).unwrap();
        assert_eq!(text.width(), Width::Narrow);

        text.push(0x100).unwrap();
        assert_eq!(text.width(), Width::Wide);
        assert_eq!(&*text.code_units(..).unwrap(), &[0x63, 0x61, 0x66, 0xE9, 0xFF, 0x100]);
    }

    #[test]
    fn test_wide_input_that_fits_stays_narrow() {
        let mut text = TextValue::new();
        text.append(&[0x41, 0xE9, 0xFF]).unwrap();
        assert_eq!(text.width(), Width::Narrow);
        assert_eq!(text, "A\u{e9}\u{ff}");
    }

    #[test]
    fn test_appends_reallocate_logarithmically() {
        let allocator = Arc::new(CountingAllocator::default());
        let mut text = TextValue::with_allocator(allocator.clone());
        assert_eq!(text.ownership(), Ownership::CallerAllocator);
        for _ in 0..10_000 {
            text.push(u16::from(b'x')).unwrap();
        }
        assert_eq!(text.len(), 10_000);
        let allocations = allocator.allocations.load(Ordering::Relaxed);
        assert!(allocations < 40, "{allocations} allocations for 10000 appends");
    }

    #[test]
    fn test_fixed_ceiling_fails_instead_of_growing() {
        let mut text = TextValue::with_max_length(4);
        text.append_str("abcd").unwrap();
        assert_eq!(
            text.append_str("e"),
            Err(Error::CapacityExceeded { requested: 5, max: 4 })
        );
        assert_eq!(text, "abcd");
        text.replace(0..1, &[0x41]).unwrap();
        assert_eq!(text, "Abcd");
    }

    #[test]
    fn test_editing_helpers() {
        let mut text = TextValue::from("hello world");
        text.insert_str(5, ",").unwrap();
        text.delete(6..7).unwrap();
        text.append_str("!").unwrap();
        assert_eq!(text.to_string(), "hello,world!");

        text.replace(6..11, &"\u{4e16}\u{754c}".encode_utf16().collect::<Vec<_>>()).unwrap();
        assert_eq!(text.to_string(), "hello,\u{4e16}\u{754c}!");

        text.truncate(5).unwrap();
        assert_eq!(text, "hello");
        assert!(text.truncate(9).is_err());

        text.clear();
        assert!(text.is_empty());
        assert_eq!(text.width(), Width::Narrow);
    }

    #[test]
    fn test_clear_narrows_and_keeps_store() {
        let mut text = TextValue::with_capacity(32);
        text.append_str("\u{3b1}\u{3b2}\u{3b3}").unwrap();
        let capacity = text.capacity();
        text.clear();
        assert!(text.is_empty());
        assert_eq!(text.width(), Width::Narrow);
        assert_eq!(text.capacity(), capacity);

        text.append_str("ok").unwrap();
        assert_eq!(text, "ok");
    }

    #[test]
    fn test_replace_all_is_one_edit() {
        let mut text = TextValue::from("a-b-c-d");
        let replaced = text.replace_all(&[u16::from(b'-')], &"\u{2192}".encode_utf16().collect::<Vec<_>>()).unwrap();
        assert_eq!(replaced, 3);
        assert_eq!(text.to_string(), "a\u{2192}b\u{2192}c\u{2192}d");
        assert_eq!(text.replace_all(&[0x7A], &[]).unwrap(), 0);
        assert_eq!(text.replace_all(&[], &[0x7A]).unwrap(), 0);
    }

    #[test]
    fn test_force_wide_keeps_content() {
        let mut text = TextValue::from("abc");
        text.force_wide().unwrap();
        assert!(text.is_wide());
        assert_eq!(text.wide_units(), Some(&[0x61, 0x62, 0x63][..]));
        assert_eq!(text.narrow_bytes_with_terminator(), None);
    }

    #[test]
    fn test_terminator_export_is_opt_in() {
        let text = TextValue::from("abc");
        assert_eq!(text.narrow_bytes(), Some(&b"abc"[..]));
        assert_eq!(text.narrow_bytes_with_terminator(), Some(b"abc\0".to_vec()));
    }

    #[test]
    fn test_clone_is_owned_and_equal() {
        let mut buf = [0x68, 0x69, 0, 0];
        let external = TextValue::with_external_buffer(&mut buf, 2).unwrap();
        assert_eq!(external.ownership(), Ownership::External);
        let copy = external.to_static();
        assert_eq!(copy.ownership(), Ownership::Internal);
        assert_eq!(copy, external);
        assert_eq!(copy.width(), Width::Wide);
        assert!(TextValue::with_external_buffer(&mut [0u16; 1], 2).is_err());
    }

    #[test]
    fn test_code_units_checks_range() {
        let text = TextValue::from("abc");
        assert_eq!(&*text.code_units(1..=2).unwrap(), &[0x62, 0x63]);
        assert_eq!(text.code_unit_at(0), Some(0x61));
        assert_eq!(text.code_unit_at(3), None);
        assert_eq!(
            text.code_units(2..5).unwrap_err(),
            Error::InvalidRange { start: 2, end: 5, len: 3 }
        );
    }

    #[test]
    fn test_display_replaces_unpaired_surrogates() {
        let text = TextValue::from_units(&[0x61, 0xD800, 0x62]);
        assert_eq!(text.to_string(), "a\u{fffd}b");
    }
}

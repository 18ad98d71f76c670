//! UTF-16 and normalization helpers shared by the codecs

use unicode_normalization::char as normalization;

use crate::descriptor::MAX_DECOMPOSITION;
use crate::options::CanonicalMode;

pub(crate) const REPLACEMENT: u16 = 0xFFFD;
pub(crate) const MAX_SCALAR: u32 = 0x10_FFFF;

#[inline]
pub(crate) fn is_high_surrogate(unit: u16) -> bool {
    (0xD800..=0xDBFF).contains(&unit)
}

#[inline]
pub(crate) fn is_low_surrogate(unit: u16) -> bool {
    (0xDC00..=0xDFFF).contains(&unit)
}

#[inline]
pub(crate) fn is_surrogate(unit: u16) -> bool {
    (0xD800..=0xDFFF).contains(&unit)
}

#[inline]
pub(crate) fn combine_surrogates(high: u16, low: u16) -> u32 {
    0x10000 + ((u32::from(high) - 0xD800) << 10) + (u32::from(low) - 0xDC00)
}

/// Scalar at the start of `units` and how many units it spans
///
/// Unpaired surrogates come back as themselves with a length of one.
#[inline]
pub(crate) fn scalar_at(units: &[u16]) -> (u32, usize) {
    let first = units[0];
    if is_high_surrogate(first) {
        if let Some(&second) = units.get(1) {
            if is_low_surrogate(second) {
                return (combine_surrogates(first, second), 2);
            }
        }
    }
    (u32::from(first), 1)
}

/// Units spanned by the character starting at `units[0]`
#[inline]
pub(crate) fn char_len(units: &[u16]) -> usize {
    scalar_at(units).1
}

/// Write `scalar` as one or two UTF-16 units, returning the count
#[inline]
pub(crate) fn encode_utf16(scalar: u32, out: &mut [u16; 2]) -> usize {
    if scalar < 0x10000 {
        out[0] = scalar as u16;
        1
    } else {
        let offset = scalar - 0x10000;
        out[0] = 0xD800 + (offset >> 10) as u16;
        out[1] = 0xDC00 + (offset & 0x3FF) as u16;
        2
    }
}

fn hfs_excluded(scalar: u32) -> bool {
    matches!(scalar, 0x2000..=0x2FFF | 0xF900..=0xFAFF | 0x2F800..=0x2FAFF)
}

/// Canonical decomposition of `scalar` as UTF-16, returning the unit count
///
/// Scalars without a decomposition (or excluded by the HFS+ rules) come back
/// unchanged.
pub(crate) fn decompose(scalar: u32, mode: CanonicalMode, out: &mut [u16; MAX_DECOMPOSITION]) -> usize {
    let mut pair = [0u16; 2];
    let Some(ch) = char::from_u32(scalar) else {
        let len = encode_utf16(scalar, &mut pair);
        out[..len].copy_from_slice(&pair[..len]);
        return len;
    };
    if mode == CanonicalMode::Hfs && hfs_excluded(scalar) {
        return ch.encode_utf16(out).len();
    }

    let mut len = 0;
    let mut overflowed = false;
    normalization::decompose_canonical(ch, |part| {
        let n = encode_utf16(u32::from(part), &mut pair);
        if len + n <= MAX_DECOMPOSITION {
            out[len..len + n].copy_from_slice(&pair[..n]);
            len += n;
        } else {
            overflowed = true;
        }
    });
    if overflowed {
        return ch.encode_utf16(out).len();
    }
    len
}

/// Whether `unit` is a BMP combining mark
pub(crate) fn is_combining(unit: u16) -> bool {
    char::from_u32(u32::from(unit)).is_some_and(normalization::is_combining_mark)
}

/// Compose a base character with one combining mark
pub(crate) fn compose(base: u32, mark: u16) -> Option<u32> {
    let base = char::from_u32(base)?;
    let mark = char::from_u32(u32::from(mark))?;
    normalization::compose(base, mark).map(u32::from)
}

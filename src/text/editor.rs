//! Multi-range editing
//!
//! Every mutation of a [`TextValue`] is a list of sorted, non-overlapping
//! ranges to delete plus one insertion repeated at each of them. When the
//! store keeps its capacity and width the surviving blocks are rearranged in
//! place: blocks moving left (or staying) are copied as soon as they are
//! reached, blocks moving right are deferred and written back to front once a
//! non-right-moving block or the end of the text is reached. Otherwise a new
//! store is filled block by block, widening 8-bit content on the way.

use std::ops::Range;

use smallvec::SmallVec;

use super::storage::{self, CapacityRequest};
use super::{Store, TextValue, Units, Width};
use crate::{Error, Result};

/// A surviving block and how far it moves
#[derive(Debug, Clone, Copy)]
struct Move {
    src: usize,
    len: usize,
    shift: isize,
}

/// Writable view of a store in its own width
enum UnitsMut<'a> {
    Narrow(&'a mut [u8]),
    Wide(&'a mut [u16]),
}

impl UnitsMut<'_> {
    /// Copy `src` to offset `at`, converting width as needed
    ///
    /// Wide content written to a narrow view must fit in 8 bits.
    fn write(&mut self, at: usize, src: Units<'_>) {
        match (self, src) {
            (UnitsMut::Narrow(dst), Units::Narrow(bytes)) => {
                dst[at..at + bytes.len()].copy_from_slice(bytes);
            }
            (UnitsMut::Narrow(dst), Units::Wide(units)) => {
                for (slot, &unit) in dst[at..at + units.len()].iter_mut().zip(units) {
                    *slot = unit as u8;
                }
            }
            (UnitsMut::Wide(dst), Units::Narrow(bytes)) => {
                for (slot, &byte) in dst[at..at + bytes.len()].iter_mut().zip(bytes) {
                    *slot = u16::from(byte);
                }
            }
            (UnitsMut::Wide(dst), Units::Wide(units)) => {
                dst[at..at + units.len()].copy_from_slice(units);
            }
        }
    }
}

fn validate_ranges(ranges: &[Range<usize>], len: usize) -> Result<()> {
    let mut previous_end = 0;
    for range in ranges {
        if range.start > range.end || range.end > len {
            return Err(Error::InvalidRange { start: range.start, end: range.end, len });
        }
        if range.start < previous_end {
            return Err(Error::UnsortedRanges);
        }
        previous_end = range.end;
    }
    Ok(())
}

/// Net length change once `range` is replaced
fn delta(range: &Range<usize>, insert_len: usize) -> isize {
    insert_len as isize - (range.end - range.start) as isize
}

fn offset(position: usize, shift: isize) -> usize {
    position.checked_add_signed(shift).unwrap_or_default()
}

fn move_block<T: Copy>(buf: &mut [T], block: Move) {
    let dest = offset(block.src, block.shift);
    buf.copy_within(block.src..block.src + block.len, dest);
}

/// Shift the surviving blocks of `buf[..len]` to their final offsets
fn rearrange<T: Copy>(buf: &mut [T], len: usize, ranges: &[Range<usize>], insert_len: usize) {
    let mut deferred: SmallVec<[Move; 8]> = SmallVec::new();
    let mut shift = 0isize;
    for (i, range) in ranges.iter().enumerate() {
        shift += delta(range, insert_len);
        let block_end = ranges.get(i + 1).map_or(len, |next| next.start);
        let block = Move { src: range.end, len: block_end - range.end, shift };
        if block.len == 0 {
            continue;
        }
        if block.shift > 0 {
            deferred.push(block);
            continue;
        }
        move_block(buf, block);
        while let Some(pending) = deferred.pop() {
            move_block(buf, pending);
        }
    }
    while let Some(pending) = deferred.pop() {
        move_block(buf, pending);
    }
}

/// Write `insertion` at each range's final offset
fn fill_insertions(dst: &mut UnitsMut<'_>, ranges: &[Range<usize>], insertion: Units<'_>) {
    if insertion.is_empty() {
        return;
    }
    let mut shift = 0isize;
    for range in ranges {
        dst.write(offset(range.start, shift), insertion);
        shift += delta(range, insertion.len());
    }
}

/// Fill a fresh store from `src`, which never aliases it
fn copy_blocks(src: Units<'_>, dst: &mut UnitsMut<'_>, ranges: &[Range<usize>], insertion: Units<'_>) {
    let first = ranges.first().map_or(src.len(), |range| range.start);
    dst.write(0, src.slice(0..first));
    let mut shift = 0isize;
    for (i, range) in ranges.iter().enumerate() {
        dst.write(offset(range.start, shift), insertion);
        shift += delta(range, insertion.len());
        let block_end = ranges.get(i + 1).map_or(src.len(), |next| next.start);
        dst.write(offset(range.end, shift), src.slice(range.end..block_end));
    }
}

impl TextValue<'_> {
    /// Replace every range in `ranges` with `insertion`
    ///
    /// `force_wide` promotes the result to 16-bit storage regardless of
    /// content.
    pub(super) fn edit(&mut self, ranges: &[Range<usize>], insertion: Units<'_>, force_wide: bool) -> Result<()> {
        validate_ranges(ranges, self.len)?;
        if ranges.is_empty() {
            return Ok(());
        }

        let insert_len = insertion.len();
        let deleted: usize = ranges.iter().map(|range| range.end - range.start).sum();
        let new_len = insert_len
            .checked_mul(ranges.len())
            .and_then(|inserted| (self.len - deleted).checked_add(inserted))
            .filter(|&len| len <= isize::MAX as usize / 2)
            .ok_or(Error::CapacityExceeded { requested: usize::MAX, max: isize::MAX as usize / 2 })?;
        if let Some(max) = self.max_length {
            if new_len > max {
                return Err(Error::CapacityExceeded { requested: new_len, max });
            }
        }

        let external = matches!(self.store, Store::External(_));
        if new_len == 0 && !force_wide {
            self.collapse();
            return Ok(());
        }

        let wide = self.width == Width::Wide
            || external
            || force_wide
            || (insert_len > 0 && insertion.needs_wide());
        let promote = wide && self.width == Width::Narrow;
        let required = if wide { new_len * 2 } else { new_len };
        let current = self.capacity();

        let reallocate = if external {
            if required > current {
                return Err(Error::CapacityExceeded { requested: new_len, max: current / 2 });
            }
            None
        } else {
            let request = CapacityRequest {
                required,
                current,
                headroom: new_len > self.len,
                desired: if wide { self.desired_capacity * 2 } else { self.desired_capacity },
                fixed: self.max_length.is_some(),
            };
            let capacity = storage::new_capacity(request, self.allocator());
            (capacity != current || promote).then_some(capacity)
        };

        match reallocate {
            Some(capacity) => {
                log::trace!(
                    "reallocating text store: {current} -> {capacity} bytes ({} units, wide: {wide})",
                    new_len
                );
                let mut fresh = storage::allocate(storage::units_for(capacity), self.allocator());
                let mut dst = if wide {
                    UnitsMut::Wide(&mut fresh[..])
                } else {
                    UnitsMut::Narrow(bytemuck::cast_slice_mut(&mut fresh[..]))
                };
                copy_blocks(self.as_units(), &mut dst, ranges, insertion);
                self.store = Store::Owned(fresh);
            }
            None => {
                let len = self.len;
                let store = self.store.units_mut();
                let mut dst = match self.width {
                    Width::Narrow => {
                        let bytes: &mut [u8] = bytemuck::cast_slice_mut(store);
                        rearrange(bytes, len, ranges, insert_len);
                        UnitsMut::Narrow(bytes)
                    }
                    Width::Wide => {
                        rearrange(store, len, ranges, insert_len);
                        UnitsMut::Wide(store)
                    }
                };
                fill_insertions(&mut dst, ranges, insertion);
            }
        }

        self.len = new_len;
        self.width = if wide { Width::Wide } else { Width::Narrow };
        Ok(())
    }

    /// Drop all content, returning to 8-bit width
    ///
    /// The store is kept unless the capacity policy would change it.
    /// External stores keep their width.
    pub(super) fn collapse(&mut self) {
        self.len = 0;
        let Store::Owned(store) = &self.store else {
            return;
        };
        let current = store.len() * 2;
        let request = CapacityRequest {
            required: 0,
            current,
            headroom: false,
            desired: self.desired_capacity,
            fixed: self.max_length.is_some(),
        };
        let capacity = storage::new_capacity(request, self.allocator());
        if capacity != current {
            self.store = Store::Owned(storage::allocate(storage::units_for(capacity), self.allocator()));
        }
        self.width = Width::Narrow;
    }
}

//! Backing-store sizing and allocation
//!
//! Capacities here are in bytes so the same policy serves 8-bit and 16-bit
//! content. Stores themselves are always `u16` slices; narrow content is
//! viewed as bytes through `bytemuck`.

use std::alloc::{Layout, handle_alloc_error};
use std::fmt;

/// Source of backing stores for a text value
///
/// Implement this to observe or bound allocations; the default methods
/// allocate from the global allocator.
pub trait ContentsAllocator: Send + Sync + fmt::Debug {
    /// Bytes actually worth allocating for a request of `size` bytes
    ///
    /// Must return at least `size`.
    fn preferred_size(&self, size: usize) -> usize {
        size
    }

    /// A zeroed store of `units` code units, or `None` when memory is
    /// exhausted
    fn allocate(&self, units: usize) -> Option<Box<[u16]>> {
        let mut store = Vec::new();
        store.try_reserve_exact(units).ok()?;
        store.resize(units, 0);
        Some(store.into_boxed_slice())
    }
}

/// Global-allocator stores rounded to malloc-like size classes
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultAllocator;

impl ContentsAllocator for DefaultAllocator {
    fn preferred_size(&self, size: usize) -> usize {
        let quantum = match size {
            0 => return 0,
            1..=1008 => 16,
            1009..=130_048 => 512,
            _ => 4096,
        };
        size.div_ceil(quantum).saturating_mul(quantum)
    }
}

/// Inputs to [`new_capacity`], all in bytes
#[derive(Debug, Clone, Copy)]
pub(crate) struct CapacityRequest {
    /// Bytes the new content needs
    pub required: usize,
    /// Bytes currently allocated
    pub current: usize,
    /// Grow by half again instead of to the exact requirement
    pub headroom: bool,
    /// Caller's desired capacity
    pub desired: usize,
    /// The caller declared a hard length ceiling
    pub fixed: bool,
}

/// Capacity the store should have after an edit
///
/// Keeps `current` when it covers the requirement without being more than
/// twice too large (or headroom was asked for). Otherwise grows to 3/2 of the
/// requirement with headroom or exactly to it without, never below the
/// desired capacity. A fixed-capacity value grows only to the larger of the
/// desired capacity and the requirement. The result is rounded up to the
/// allocator's preferred size.
pub(crate) fn new_capacity(request: CapacityRequest, allocator: &dyn ContentsAllocator) -> usize {
    let CapacityRequest { required, current, headroom, desired, fixed } = request;
    if current == 0 && required == 0 {
        return 0;
    }
    let must_change = current < required || (!headroom && required.saturating_mul(2) < current);
    if !must_change {
        return current;
    }

    let mut target = if headroom {
        required.saturating_mul(3).saturating_add(1) / 2
    } else {
        required
    };
    if target < desired {
        target = desired;
    } else if fixed {
        target = desired.max(required);
    }
    allocator.preferred_size(target).max(target)
}

/// Units needed to hold `bytes` bytes
pub(crate) fn units_for(bytes: usize) -> usize {
    bytes.div_ceil(2)
}

/// A zeroed store of `units` units from `allocator`
///
/// Allocation failure is fatal.
pub(crate) fn allocate(units: usize, allocator: &dyn ContentsAllocator) -> Box<[u16]> {
    if units == 0 {
        return Box::default();
    }
    match allocator.allocate(units) {
        Some(store) if store.len() >= units => {
            log::trace!("allocated text store of {units} units");
            store
        }
        _ => allocation_failed(units),
    }
}

fn allocation_failed(units: usize) -> ! {
    log::error!("out of memory allocating a text store of {units} units");
    let layout = Layout::array::<u16>(units).unwrap_or_else(|_| Layout::new::<u16>());
    handle_alloc_error(layout)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    fn request(required: usize, current: usize, headroom: bool) -> CapacityRequest {
        CapacityRequest { required, current, headroom, desired: 0, fixed: false }
    }

    #[derive(Debug)]
    struct Exact;

    impl ContentsAllocator for Exact {}

    #[test_case(10, 16, true, 16 ; "fits")]
    #[test_case(10, 16, false, 16 ; "fits without headroom")]
    #[test_case(10, 30, false, 10 ; "shrinks when wasteful")]
    #[test_case(10, 30, true, 30 ; "headroom keeps slack")]
    #[test_case(20, 16, true, 30 ; "grows by half")]
    #[test_case(20, 16, false, 20 ; "grows exactly")]
    #[test_case(0, 0, true, 0 ; "empty stays empty")]
    fn test_new_capacity(required: usize, current: usize, headroom: bool, expected: usize) {
        assert_eq!(new_capacity(request(required, current, headroom), &Exact), expected);
    }

    #[test]
    fn test_desired_capacity_is_a_floor() {
        let req = CapacityRequest { desired: 100, ..request(20, 0, true) };
        assert_eq!(new_capacity(req, &Exact), 100);
    }

    #[test]
    fn test_fixed_capacity_skips_headroom() {
        let req = CapacityRequest { desired: 20, fixed: true, ..request(40, 20, true) };
        assert_eq!(new_capacity(req, &Exact), 40);
        let req = CapacityRequest { desired: 64, fixed: true, ..request(40, 20, true) };
        assert_eq!(new_capacity(req, &Exact), 64);
    }

    #[test]
    fn test_default_allocator_rounds_to_size_classes() {
        assert_eq!(DefaultAllocator.preferred_size(0), 0);
        assert_eq!(DefaultAllocator.preferred_size(1), 16);
        assert_eq!(DefaultAllocator.preferred_size(17), 32);
        assert_eq!(DefaultAllocator.preferred_size(1009), 1024);
        assert_eq!(DefaultAllocator.preferred_size(200_000), 200_704);
        assert_eq!(new_capacity(request(20, 16, true), &DefaultAllocator), 32);
    }

    #[test]
    fn test_allocate_zeroes() {
        let store = allocate(5, &DefaultAllocator);
        assert_eq!(&*store, &[0u16; 5]);
        assert!(allocate(0, &DefaultAllocator).is_empty());
    }
}

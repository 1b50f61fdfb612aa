//! Pre-measurement priming of the benchmarked region.
//!
//! The first touch of a page costs a fault, a TLB fill and a cache miss, and
//! lines may sit in another core's cache in a state that needs a coherence
//! transaction. Sweeping the region a few times before timing gets all of
//! that out of the way.

use std::hint::black_box;

use crate::types::MemoryRegion;

/// What a priming pass over a region did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PrimeSweep {
    /// Words read across every sweep.
    pub words_read: u64,
    /// XOR of each sweep's sum, so the reads cannot be elided.
    pub checksum: u64,
}

/// Forced sequential 64-bit reads over the whole region, `passes` times.
pub fn prime_region(region: &MemoryRegion, passes: u32) -> PrimeSweep {
    let mut sweep = PrimeSweep::default();
    for _ in 0..passes {
        sweep.checksum ^= forward_sequential_read(region);
        sweep.words_read += region.words() as u64;
    }
    black_box(sweep)
}

/// One forward sweep of volatile reads from `base` to `base + len`.
pub fn forward_sequential_read(region: &MemoryRegion) -> u64 {
    let base = region.base();
    let mut acc = 0u64;
    for i in 0..region.words() {
        // SAFETY: i < words() and the region contract guarantees the range
        // is readable.
        acc = acc.wrapping_add(unsafe { std::ptr::read_volatile(base.add(i)) });
    }
    acc
}

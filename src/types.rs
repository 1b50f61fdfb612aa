//! Region and CPU target types shared by configuration and results.

use serde::{Deserialize, Serialize};

use crate::constants::WORD_BYTES;
use crate::error::ConfigError;

/// A borrowed view of the memory being benchmarked.
///
/// The region is owned by the controller. The worker reads (and, for write
/// kernels, writes) through it but never allocates or frees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    base: *mut u64,
    len: usize,
}

// SAFETY: the region is plain memory handed over by the controller, which
// guarantees it outlives every run that uses it (see `from_raw_parts`).
unsafe impl Send for MemoryRegion {}
unsafe impl Sync for MemoryRegion {}

impl MemoryRegion {
    /// Describe `len` bytes starting at `base`.
    ///
    /// # Errors
    ///
    /// Rejects null or misaligned bases and regions smaller than one chain
    /// link.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be valid for reads and writes for as long as
    /// any worker configured with this region may run, and every word the
    /// chosen kernels follow must hold an address inside the region.
    pub unsafe fn from_raw_parts(base: *mut u8, len: usize) -> Result<Self, ConfigError> {
        if base.is_null() {
            return Err(ConfigError::NullRegion);
        }
        let align = std::mem::align_of::<u64>();
        if (base as usize) % align != 0 {
            return Err(ConfigError::MisalignedRegion {
                base: base as usize,
                align,
            });
        }
        if (len as u64) < WORD_BYTES {
            return Err(ConfigError::RegionTooSmall {
                len,
                min: WORD_BYTES as usize,
            });
        }
        Ok(Self {
            base: base.cast::<u64>(),
            len,
        })
    }

    /// Describe the memory behind a word slice.
    ///
    /// # Safety
    ///
    /// Same contract as [`from_raw_parts`](Self::from_raw_parts): the slice
    /// must outlive every run using the region.
    pub unsafe fn from_words(words: &mut [u64]) -> Result<Self, ConfigError> {
        Self::from_raw_parts(
            words.as_mut_ptr().cast::<u8>(),
            std::mem::size_of_val(words),
        )
    }

    /// First word of the region; the chain starts here.
    pub fn base(&self) -> *mut u64 {
        self.base
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Always false; a region holds at least one word.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of whole 64-bit words in the region.
    pub fn words(&self) -> usize {
        self.len / WORD_BYTES as usize
    }
}

/// Which logical CPU the worker pins itself to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CpuTarget {
    /// No preference: pin to whichever CPU runs the worker when the run
    /// starts, so it cannot migrate mid-measurement.
    #[default]
    Current,
    /// Pin to this logical CPU index.
    Logical(usize),
}

impl CpuTarget {
    /// Map a signed index where any negative value means "no preference".
    pub fn from_index(index: i64) -> Self {
        match usize::try_from(index) {
            Ok(i) => Self::Logical(i),
            Err(_) => Self::Current,
        }
    }
}

impl std::fmt::Display for CpuTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CpuTarget::Current => write!(f, "current CPU"),
            CpuTarget::Logical(i) => write!(f, "logical CPU {}", i),
        }
    }
}

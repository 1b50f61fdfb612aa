//! Pointer-chasing kernels.
//!
//! A kernel follows one link of a pointer chain: it consumes the current chain
//! pointer and produces the next one. Because each step needs the previous
//! step's result, neither the compiler nor the CPU can overlap accesses, so
//! the time per step is the true access latency plus call overhead.
//!
//! Kernels come in pairs. The measuring kernel touches memory; the dummy
//! kernel has the same calling shape but performs no access. Timing both and
//! subtracting leaves only the memory latency.

use std::fmt;
use std::hint::black_box;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Role a kernel plays in the overhead calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KernelKind {
    /// Performs the memory access being measured.
    Measuring,
    /// Same call and loop shape, no memory access.
    Dummy,
}

/// One step of a pointer chase.
pub trait ChaseKernel: Send + Sync {
    /// Whether this kernel measures or only reproduces overhead.
    fn kind(&self) -> KernelKind;

    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    /// Follow one link starting at `chain` and return the next chain pointer.
    ///
    /// `len` is the region length in bytes in pass-bounded mode and `None` in
    /// time-bounded mode.
    ///
    /// # Safety
    ///
    /// `chain` must point at a readable (and for write kernels, writable)
    /// word whose value is itself a valid chain pointer.
    unsafe fn chase(&self, chain: *mut u64, len: Option<usize>) -> *mut u64;
}

/// Dependent 64-bit reads through the chain.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomRead;

impl ChaseKernel for RandomRead {
    fn kind(&self) -> KernelKind {
        KernelKind::Measuring
    }

    fn name(&self) -> &'static str {
        "random_read"
    }

    #[inline(never)]
    unsafe fn chase(&self, chain: *mut u64, _len: Option<usize>) -> *mut u64 {
        std::ptr::read_volatile(chain) as usize as *mut u64
    }
}

/// Dependent read, then write of the same value back to the link.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomWrite;

impl ChaseKernel for RandomWrite {
    fn kind(&self) -> KernelKind {
        KernelKind::Measuring
    }

    fn name(&self) -> &'static str {
        "random_write"
    }

    #[inline(never)]
    unsafe fn chase(&self, chain: *mut u64, _len: Option<usize>) -> *mut u64 {
        let next = std::ptr::read_volatile(chain);
        std::ptr::write_volatile(chain, next);
        next as usize as *mut u64
    }
}

/// Overhead-only counterpart of [`RandomRead`] and [`RandomWrite`].
///
/// The chain pointer passes through unchanged, so every step "lands" on the
/// region base and nothing is dereferenced.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChaseDummy;

impl ChaseKernel for ChaseDummy {
    fn kind(&self) -> KernelKind {
        KernelKind::Dummy
    }

    fn name(&self) -> &'static str {
        "chase_dummy"
    }

    #[inline(never)]
    unsafe fn chase(&self, chain: *mut u64, _len: Option<usize>) -> *mut u64 {
        black_box(chain)
    }
}

/// A measuring kernel and its dummy twin.
#[derive(Clone)]
pub struct KernelPair {
    real: Arc<dyn ChaseKernel>,
    dummy: Arc<dyn ChaseKernel>,
}

impl KernelPair {
    /// Pair a measuring kernel with its dummy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::KernelRoleMismatch`] if either kernel reports
    /// the wrong [`KernelKind`].
    pub fn new(
        real: Arc<dyn ChaseKernel>,
        dummy: Arc<dyn ChaseKernel>,
    ) -> Result<Self, ConfigError> {
        if real.kind() != KernelKind::Measuring {
            return Err(ConfigError::KernelRoleMismatch {
                slot: "real",
                found: real.kind(),
            });
        }
        if dummy.kind() != KernelKind::Dummy {
            return Err(ConfigError::KernelRoleMismatch {
                slot: "dummy",
                found: dummy.kind(),
            });
        }
        Ok(Self { real, dummy })
    }

    /// Dependent reads.
    pub fn random_read() -> Self {
        Self {
            real: Arc::new(RandomRead),
            dummy: Arc::new(ChaseDummy),
        }
    }

    /// Dependent read-then-write.
    pub fn random_write() -> Self {
        Self {
            real: Arc::new(RandomWrite),
            dummy: Arc::new(ChaseDummy),
        }
    }

    /// The measuring kernel.
    pub fn real(&self) -> &dyn ChaseKernel {
        self.real.as_ref()
    }

    /// The overhead-only kernel.
    pub fn dummy(&self) -> &dyn ChaseKernel {
        self.dummy.as_ref()
    }
}

impl Default for KernelPair {
    fn default() -> Self {
        Self::random_read()
    }
}

impl fmt::Debug for KernelPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KernelPair")
            .field("real", &self.real.name())
            .field("dummy", &self.dummy.name())
            .finish()
    }
}

/// Repeat a statement 16 times inline.
macro_rules! unroll_16 {
    ($body:expr) => {{
        $body; $body; $body; $body; $body; $body; $body; $body;
        $body; $body; $body; $body; $body; $body; $body; $body;
    }};
}

/// Repeat a statement 256 times inline.
macro_rules! unroll_256 {
    ($body:expr) => {
        $crate::kernel::unroll_16!($crate::kernel::unroll_16!($body))
    };
}

pub(crate) use {unroll_16, unroll_256};

//! # memlat
//!
//! Measure the true access latency of a memory region.
//!
//! A [`LatencyWorker`] chases a pointer chain through the region with a
//! measuring kernel, then repeats the same number of passes with a dummy
//! kernel that has identical call and loop shape but touches no memory. The
//! difference between the two tick totals is the latency signal with loop
//! and call overhead removed.
//!
//! The worker pins itself to a logical CPU and raises its priority for the
//! duration of the run (both best-effort), primes the region so first-touch
//! costs are not measured, and flags results that look untrustworthy instead
//! of retrying.
//!
//! Building the pointer chain, allocating the region and turning ticks into
//! nanoseconds are the caller's job.
//!
//! ## Quick Start
//!
//! ```ignore
//! use memlat::{CpuTarget, KernelPair, LatencyWorker, MemoryRegion, RunMode, WorkerConfig};
//!
//! let mut words: Vec<u64> = build_random_chain(1 << 20);
//! let region = unsafe { MemoryRegion::from_words(&mut words)? };
//! let config = WorkerConfig::new(
//!     region,
//!     RunMode::time_bounded(),
//!     KernelPair::random_read(),
//!     CpuTarget::Logical(2),
//! )?;
//!
//! let worker = LatencyWorker::new(config);
//! let shared = worker.shared();
//! let result = worker.spawn()?.join().expect("worker panicked")?;
//!
//! if result.warning {
//!     for w in &result.warnings {
//!         eprintln!("suspect: {}", w);
//!     }
//! }
//! assert_eq!(shared.poll(), Some(result));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
mod anomaly;
mod config;
mod constants;
mod error;
mod result;
mod state;
mod types;
mod worker;

// Functional modules
pub mod kernel;
pub mod measurement;
pub mod output;

// Re-exports for public API
pub use anomaly::{adjusted_ticks, assess, CalibrationWarning};
pub use config::{RunMode, WorkerConfig};
pub use constants::{
    BENCHMARK_DURATION, DEFAULT_BYTES_PER_PASS, LATENCY_UNROLL_LENGTH, MIN_ELAPSED_TICKS,
    PRIME_PASSES,
};
pub use error::{ConfigError, LockPhase, WorkerError};
pub use kernel::{ChaseKernel, KernelKind, KernelPair};
pub use measurement::{CycleTimer, OsScheduling, SchedulingControl, Tsc};
pub use result::WorkerResult;
pub use state::{LockWait, SharedState, StateHold};
pub use types::{CpuTarget, MemoryRegion};
pub use worker::LatencyWorker;

//! Measurement infrastructure for the latency worker.
//!
//! This module provides:
//! - Cycle counter access with fenced start/stop edges
//! - Process-wide tick-rate calibration for time-bounded runs
//! - Best-effort CPU pinning and priority elevation
//! - Region priming before the timed phase
//!
//! # Counter Selection
//!
//! - **x86_64**: `rdtsc` / `rdtscp` (invariant TSC, no privileges needed)
//! - **aarch64**: `cntvct_el0` virtual counter (rate varies by SoC)
//! - **Other**: monotonic `Instant`, in nanoseconds
//!
//! On coarse counters a time-bounded run still accumulates enough ticks,
//! because each timed batch covers 256 dependent accesses.

pub mod affinity;
pub mod priority;
mod prime;
mod scheduling;
mod timer;

pub use prime::{forward_sequential_read, prime_region, PrimeSweep};
pub use scheduling::{OsScheduling, SchedulingControl};
pub use timer::{start_ticks, stop_ticks, ticks_for, ticks_per_sec, CycleTimer, Tsc};

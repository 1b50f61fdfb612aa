//! Fixed parameters of the latency benchmark.

use std::time::Duration;

/// Number of kernel invocations unrolled into one timed batch in
/// time-bounded mode.
pub const LATENCY_UNROLL_LENGTH: u64 = 256;

/// Size of one chain link in bytes.
pub const WORD_BYTES: u64 = std::mem::size_of::<u64>() as u64;

/// Default bytes reported per pass.
pub const DEFAULT_BYTES_PER_PASS: u64 = LATENCY_UNROLL_LENGTH * WORD_BYTES;

/// Target wall-clock length of the real-kernel phase in time-bounded mode.
pub const BENCHMARK_DURATION: Duration = Duration::from_secs(4);

/// Runs shorter than this many ticks are flagged as suspect.
///
/// Below this, timer granularity and read overhead make up a visible share
/// of the total.
pub const MIN_ELAPSED_TICKS: u64 = 10_000;

/// Number of full sequential read sweeps over the region before timing.
pub const PRIME_PASSES: u32 = 4;

/// Logical CPUs the affinity mask can address.
#[cfg(target_os = "linux")]
pub const MAX_LOGICAL_CPUS: usize = libc::CPU_SETSIZE as usize;

/// Logical CPUs the affinity mask can address.
#[cfg(not(target_os = "linux"))]
pub const MAX_LOGICAL_CPUS: usize = 1024;

/// Priority requested during measurement (0-99 cross-platform scale).
///
/// High but below the maximum so system threads are not starved.
pub const BOOST_PRIORITY: u8 = 75;

/// Environment variable selecting pass-bounded mode.
pub const ENV_PASSES: &str = "MEMLAT_PASSES";

/// Environment variable selecting time-bounded mode with a custom duration.
pub const ENV_DURATION_MS: &str = "MEMLAT_DURATION_MS";

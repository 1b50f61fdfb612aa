//! Published outcome of a worker run.

use serde::{Deserialize, Serialize};

use crate::anomaly::CalibrationWarning;
use crate::config::RunMode;
use crate::types::CpuTarget;

/// Tick totals and diagnostics from one completed run.
///
/// All tick values are raw counter ticks. Turning them into nanoseconds or
/// per-access latency is left to the reporting layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResult {
    /// Ticks spent in the real-kernel phase.
    pub elapsed_ticks: u64,

    /// Ticks spent in the dummy-kernel phase.
    pub elapsed_dummy_ticks: u64,

    /// `elapsed_ticks - elapsed_dummy_ticks`; 0 when the dummy was not faster.
    ///
    /// Only meaningful when `elapsed_dummy_ticks < elapsed_ticks`.
    pub adjusted_ticks: u64,

    /// Bytes attributed to each pass.
    pub bytes_per_pass: u64,

    /// Kernel invocations in each phase.
    pub passes: u64,

    /// Words read while priming, across every sweep.
    pub primed_words: u64,

    /// Ticks spent priming. Not part of either timed phase.
    pub prime_ticks: u64,

    /// True if any calibration check failed.
    pub warning: bool,

    /// The checks that failed.
    pub warnings: Vec<CalibrationWarning>,

    /// Whether the CPU pin took effect.
    pub pinned: bool,

    /// Whether the priority boost took effect.
    pub boosted: bool,

    /// Run length the measurement used.
    pub mode: RunMode,

    /// CPU the run asked to be pinned to.
    pub cpu: CpuTarget,
}

impl WorkerResult {
    /// Adjusted ticks per pass, or `None` when the calibration is invalid or
    /// nothing ran.
    pub fn adjusted_ticks_per_pass(&self) -> Option<f64> {
        if self.passes == 0 || self.elapsed_dummy_ticks >= self.elapsed_ticks {
            return None;
        }
        Some(self.adjusted_ticks as f64 / self.passes as f64)
    }

    /// Whether the platform calls needed for full fidelity all succeeded.
    pub fn is_isolated(&self) -> bool {
        self.pinned && self.boosted
    }
}

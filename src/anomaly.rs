//! Post-run plausibility checks on the real/dummy tick totals.
//!
//! A latency benchmark cannot be repaired after the fact, so these checks
//! never trigger a rerun. They only mark the result as suspect and say why.

use serde::{Deserialize, Serialize};

/// Reason a measurement should be viewed with suspicion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CalibrationWarning {
    /// The overhead-only run took at least as long as the real run.
    DummyNotFaster {
        /// Real-kernel ticks.
        elapsed_ticks: u64,
        /// Dummy-kernel ticks.
        elapsed_dummy_ticks: u64,
    },

    /// The real run was too short for the counter to resolve reliably.
    RunTooShort {
        /// Real-kernel ticks.
        elapsed_ticks: u64,
        /// Threshold that was not reached.
        min_elapsed_ticks: u64,
    },

    /// Subtracting the overhead removed more than half of the signal.
    OverheadDominant {
        /// Real minus dummy ticks.
        adjusted_ticks: u64,
        /// Real-kernel ticks.
        elapsed_ticks: u64,
    },
}

impl CalibrationWarning {
    /// Human-readable description for operators.
    pub fn description(&self) -> String {
        match self {
            Self::DummyNotFaster {
                elapsed_ticks,
                elapsed_dummy_ticks,
            } => format!(
                "Dummy kernel ({} ticks) was not faster than the real kernel ({} ticks); \
                 overhead calibration is invalid.",
                elapsed_dummy_ticks, elapsed_ticks
            ),
            Self::RunTooShort {
                elapsed_ticks,
                min_elapsed_ticks,
            } => format!(
                "Run took {} ticks, below the {} tick minimum; counter resolution may dominate.",
                elapsed_ticks, min_elapsed_ticks
            ),
            Self::OverheadDominant {
                adjusted_ticks,
                elapsed_ticks,
            } => format!(
                "Adjusted ticks ({}) are under half of elapsed ticks ({}); \
                 loop overhead dominates the latency estimate.",
                adjusted_ticks, elapsed_ticks
            ),
        }
    }
}

impl std::fmt::Display for CalibrationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.description())
    }
}

/// Real ticks minus dummy ticks, or 0 when the dummy was not faster.
pub fn adjusted_ticks(elapsed_ticks: u64, elapsed_dummy_ticks: u64) -> u64 {
    elapsed_ticks.saturating_sub(elapsed_dummy_ticks)
}

/// Every check that fails for this pair of totals, in a fixed order.
pub fn assess(
    elapsed_ticks: u64,
    elapsed_dummy_ticks: u64,
    min_elapsed_ticks: u64,
) -> Vec<CalibrationWarning> {
    let adjusted = adjusted_ticks(elapsed_ticks, elapsed_dummy_ticks);
    let mut warnings = Vec::new();

    if elapsed_dummy_ticks >= elapsed_ticks {
        warnings.push(CalibrationWarning::DummyNotFaster {
            elapsed_ticks,
            elapsed_dummy_ticks,
        });
    }
    if elapsed_ticks < min_elapsed_ticks {
        warnings.push(CalibrationWarning::RunTooShort {
            elapsed_ticks,
            min_elapsed_ticks,
        });
    }
    // adjusted < 0.5 * elapsed, in integers.
    if (adjusted as u128) * 2 < elapsed_ticks as u128 {
        warnings.push(CalibrationWarning::OverheadDominant {
            adjusted_ticks: adjusted,
            elapsed_ticks,
        });
    }

    warnings
}

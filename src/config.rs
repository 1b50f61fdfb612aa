//! Worker configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BENCHMARK_DURATION, DEFAULT_BYTES_PER_PASS, ENV_DURATION_MS, ENV_PASSES, MIN_ELAPSED_TICKS,
    PRIME_PASSES,
};
use crate::error::ConfigError;
use crate::kernel::KernelPair;
use crate::measurement::{ticks_for, ticks_per_sec};
use crate::types::{CpuTarget, MemoryRegion};

/// How long the real-kernel phase runs.
///
/// The dummy phase always runs the same number of passes the real phase
/// executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// Time 256-pass batches until accumulated real ticks reach the target.
    TimeBounded {
        /// Minimum accumulated real ticks.
        target_ticks: u64,
    },
    /// Time one contiguous run of exactly this many passes.
    PassBounded {
        /// Kernel invocations per run.
        passes: u64,
    },
}

impl RunMode {
    /// Time-bounded for [`BENCHMARK_DURATION`] at the calibrated counter rate.
    pub fn time_bounded() -> Self {
        Self::for_duration(BENCHMARK_DURATION, ticks_per_sec())
    }

    /// Time-bounded for `duration` at `ticks_per_sec`.
    pub fn for_duration(duration: Duration, ticks_per_sec: u64) -> Self {
        Self::TimeBounded {
            target_ticks: ticks_for(duration, ticks_per_sec),
        }
    }

    /// Pass-bounded with `passes` kernel invocations per phase.
    pub fn passes(passes: u64) -> Self {
        Self::PassBounded { passes }
    }

    /// Reject modes that cannot produce a measurement.
    ///
    /// # Errors
    ///
    /// [`ConfigError::ZeroPasses`] or [`ConfigError::ZeroDuration`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::PassBounded { passes: 0 } => Err(ConfigError::ZeroPasses),
            Self::TimeBounded { target_ticks: 0 } => Err(ConfigError::ZeroDuration),
            _ => Ok(()),
        }
    }

    /// Read a mode override from the environment.
    ///
    /// `MEMLAT_PASSES=<n>` selects pass-bounded mode and takes precedence over
    /// `MEMLAT_DURATION_MS=<ms>`, which selects time-bounded mode at the
    /// calibrated counter rate. Returns `Ok(None)` when neither is set.
    ///
    /// # Errors
    ///
    /// [`ConfigError::InvalidEnv`] if a set variable does not parse, or the
    /// resulting mode fails [`validate`](Self::validate).
    pub fn try_from_env() -> Result<Option<Self>, ConfigError> {
        let mode = if let Some(raw) = read_env(ENV_PASSES) {
            let passes = parse_env(ENV_PASSES, &raw)?;
            Self::passes(passes)
        } else if let Some(raw) = read_env(ENV_DURATION_MS) {
            let ms = parse_env(ENV_DURATION_MS, &raw)?;
            Self::for_duration(Duration::from_millis(ms), ticks_per_sec())
        } else {
            return Ok(None);
        };
        mode.validate()?;
        Ok(Some(mode))
    }

    /// Environment override if present and valid, otherwise `default`.
    pub fn from_env_or(default: Self) -> Self {
        match Self::try_from_env() {
            Ok(Some(mode)) => mode,
            Ok(None) => default,
            Err(e) => {
                tracing::warn!("Ignoring run mode override: {}", e);
                default
            }
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env(name: &'static str, raw: &str) -> Result<u64, ConfigError> {
    raw.trim().parse::<u64>().map_err(|_| ConfigError::InvalidEnv {
        name,
        value: raw.to_string(),
    })
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TimeBounded { target_ticks } => {
                write!(f, "time-bounded ({} ticks)", target_ticks)
            }
            Self::PassBounded { passes } => write!(f, "pass-bounded ({} passes)", passes),
        }
    }
}

/// Everything a run needs, written by the controller and snapshotted by the
/// worker at the start of each run.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Memory being chased through. Owned by the controller.
    pub region: MemoryRegion,

    /// Run length.
    pub mode: RunMode,

    /// Measuring and dummy kernels.
    pub kernels: KernelPair,

    /// CPU the worker pins to.
    pub cpu: CpuTarget,

    /// Runs with fewer real ticks than this are flagged.
    ///
    /// Default: [`MIN_ELAPSED_TICKS`].
    pub min_elapsed_ticks: u64,

    /// Full sequential sweeps over the region before timing.
    ///
    /// Default: [`PRIME_PASSES`].
    pub prime_passes: u32,

    /// Bytes reported per pass in the result.
    ///
    /// Default: [`DEFAULT_BYTES_PER_PASS`].
    pub bytes_per_pass: u64,
}

impl WorkerConfig {
    /// Configuration with default thresholds.
    ///
    /// # Errors
    ///
    /// Fails if `mode` cannot produce a measurement.
    pub fn new(
        region: MemoryRegion,
        mode: RunMode,
        kernels: KernelPair,
        cpu: CpuTarget,
    ) -> Result<Self, ConfigError> {
        mode.validate()?;
        Ok(Self {
            region,
            mode,
            kernels,
            cpu,
            min_elapsed_ticks: MIN_ELAPSED_TICKS,
            prime_passes: PRIME_PASSES,
            bytes_per_pass: DEFAULT_BYTES_PER_PASS,
        })
    }

    /// Set the short-run threshold.
    ///
    /// # Panics
    ///
    /// Panics if `ticks == 0`; every run would pass the check.
    pub fn min_elapsed_ticks(mut self, ticks: u64) -> Self {
        assert!(ticks > 0, "min_elapsed_ticks must be > 0");
        self.min_elapsed_ticks = ticks;
        self
    }

    /// Set the number of priming sweeps. Zero disables priming.
    pub fn prime_passes(mut self, passes: u32) -> Self {
        self.prime_passes = passes;
        self
    }

    /// Set the bytes reported per pass.
    ///
    /// # Panics
    ///
    /// Panics if `bytes == 0`.
    pub fn bytes_per_pass(mut self, bytes: u64) -> Self {
        assert!(bytes > 0, "bytes_per_pass must be > 0");
        self.bytes_per_pass = bytes;
        self
    }
}

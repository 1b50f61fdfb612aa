//! Error types for worker configuration and runs.
//!
//! Calibration anomalies are not errors: they are recorded in
//! [`WorkerResult`](crate::WorkerResult) and never abort a run. The variants
//! here cover invalid configuration and failures of the surrounding protocol
//! (lock acquisition, thread spawn).

/// Error returned when a worker configuration is rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Region base address is null.
    NullRegion,

    /// Region base address is not aligned to a chain link.
    MisalignedRegion {
        /// Offending base address.
        base: usize,
        /// Required alignment in bytes.
        align: usize,
    },

    /// Region cannot hold a single chain link.
    RegionTooSmall {
        /// Region length in bytes.
        len: usize,
        /// Minimum length in bytes.
        min: usize,
    },

    /// A kernel was supplied in the wrong role.
    KernelRoleMismatch {
        /// Slot the kernel was supplied for.
        slot: &'static str,
        /// Role the kernel reports.
        found: crate::kernel::KernelKind,
    },

    /// Pass-bounded mode with zero passes.
    ZeroPasses,

    /// Time-bounded mode with a zero tick target.
    ZeroDuration,

    /// An environment override could not be parsed.
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value.
        value: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NullRegion => write!(f, "memory region base address is null"),
            Self::MisalignedRegion { base, align } => write!(
                f,
                "memory region base {:#x} is not aligned to {} bytes",
                base, align
            ),
            Self::RegionTooSmall { len, min } => write!(
                f,
                "memory region of {} bytes is smaller than one chain link ({} bytes)",
                len, min
            ),
            Self::KernelRoleMismatch { slot, found } => {
                write!(f, "{} kernel slot received a {:?} kernel", slot, found)
            }
            Self::ZeroPasses => write!(f, "pass-bounded mode requires at least one pass"),
            Self::ZeroDuration => write!(f, "time-bounded mode requires a non-zero tick target"),
            Self::InvalidEnv { name, value } => {
                write!(f, "could not parse {}={:?}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Phase of the run protocol that touches the shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockPhase {
    /// Taking the configuration snapshot.
    Snapshot,
    /// Publishing the result.
    Publish,
}

impl std::fmt::Display for LockPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Snapshot => write!(f, "config snapshot"),
            Self::Publish => write!(f, "result publication"),
        }
    }
}

/// Error returned by a worker run.
#[derive(Debug)]
pub enum WorkerError {
    /// A bounded lock wait expired.
    ///
    /// During [`LockPhase::Snapshot`] nothing was measured. During
    /// [`LockPhase::Publish`] the measurement ran but the result was not
    /// published and `completed` stays false.
    LockTimeout {
        /// Which acquisition timed out.
        phase: LockPhase,
    },

    /// The OS refused to create the worker thread.
    Spawn(std::io::Error),
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LockTimeout { phase } => {
                write!(f, "timed out acquiring worker state lock for {}", phase)
            }
            Self::Spawn(e) => write!(f, "failed to spawn latency worker thread: {}", e),
        }
    }
}

impl std::error::Error for WorkerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            Self::LockTimeout { .. } => None,
        }
    }
}

//! The latency worker and its run protocol.
//!
//! One run:
//! 1. Snapshot the configuration under the shared lock and release it.
//! 2. Pin to the configured CPU and boost priority (both best-effort).
//! 3. Prime the region with sequential reads (timed, but kept apart from
//!    the measurement).
//! 4. Time the real kernel, then the dummy kernel for the same pass count.
//! 5. Subtract, run the calibration checks.
//! 6. Unpin and revert priority, always, whatever happened in step 2.
//! 7. Publish the result under the lock, completion flag last.
//!
//! Nothing in the measurement path retries. A run that looks wrong is
//! published with its warnings; the caller decides what to do with it.

use std::hint::black_box;
use std::thread::JoinHandle;

use crate::anomaly;
use crate::config::{RunMode, WorkerConfig};
use crate::constants::LATENCY_UNROLL_LENGTH;
use crate::error::WorkerError;
use crate::kernel::{unroll_256, KernelPair};
use crate::measurement::{prime_region, CycleTimer, OsScheduling, SchedulingControl, Tsc};
use crate::result::WorkerResult;
use crate::state::{LockWait, SharedState};

/// Tick totals of the two timed phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PhaseTicks {
    elapsed_ticks: u64,
    elapsed_dummy_ticks: u64,
    passes: u64,
}

/// Measures the access latency of one memory region.
///
/// Generic over the cycle counter and the scheduling controls so both can be
/// replaced with deterministic fakes.
pub struct LatencyWorker<T = Tsc, S = OsScheduling> {
    shared: SharedState,
    timer: T,
    scheduling: S,
    lock_wait: LockWait,
}

impl LatencyWorker {
    /// Worker using the platform counter and OS scheduling controls.
    pub fn new(config: WorkerConfig) -> Self {
        Self::with_parts(config, Tsc, OsScheduling::new())
    }
}

impl<T, S> LatencyWorker<T, S>
where
    T: CycleTimer,
    S: SchedulingControl,
{
    /// Worker with an explicit counter and scheduling controls.
    pub fn with_parts(config: WorkerConfig, timer: T, scheduling: S) -> Self {
        Self::from_shared(SharedState::new(config), timer, scheduling)
    }

    /// Worker attached to existing shared state.
    pub fn from_shared(shared: SharedState, timer: T, scheduling: S) -> Self {
        Self {
            shared,
            timer,
            scheduling,
            lock_wait: LockWait::Forever,
        }
    }

    /// How long to wait for the shared lock when snapshotting and publishing.
    pub fn lock_wait(mut self, wait: LockWait) -> Self {
        self.lock_wait = wait;
        self
    }

    /// Handle for the controller to update config and read results.
    pub fn shared(&self) -> SharedState {
        self.shared.clone()
    }

    /// Execute one full run on the calling thread.
    ///
    /// # Errors
    ///
    /// Only lock timeouts under a bounded [`LockWait`]. Calibration problems
    /// and platform failures are reported in the result, not as errors.
    pub fn run(&mut self) -> Result<WorkerResult, WorkerError> {
        let config = self.shared.snapshot(self.lock_wait)?;
        tracing::debug!(
            "Latency run: {} over {} bytes with {:?}",
            config.mode,
            config.region.len(),
            config.kernels
        );

        let pinned = self.scheduling.pin(config.cpu);
        if !pinned {
            tracing::warn!(
                "Failed to lock thread to {}! Results may not be correct.",
                config.cpu
            );
        }
        let prior = self.scheduling.boost();
        let boosted = prior.is_some();
        if !boosted {
            tracing::warn!(
                "Failed to boost scheduling priority. Running with elevated privileges may help."
            );
        }

        let (primed_words, prime_ticks) = if config.prime_passes > 0 {
            let start = self.timer.start();
            let sweep = prime_region(&config.region, config.prime_passes);
            let stop = self.timer.stop();
            black_box(sweep.checksum);
            tracing::debug!(
                "Primed {} words in {} sweeps",
                sweep.words_read,
                config.prime_passes
            );
            (sweep.words_read, stop.wrapping_sub(start))
        } else {
            (0, 0)
        };

        let ticks = match config.mode {
            RunMode::TimeBounded { target_ticks } => measure_time_bounded(
                &mut self.timer,
                &config.kernels,
                config.region.base(),
                target_ticks,
            ),
            RunMode::PassBounded { passes } => measure_pass_bounded(
                &mut self.timer,
                &config.kernels,
                config.region.base(),
                config.region.len(),
                passes,
            ),
        };

        let adjusted_ticks = anomaly::adjusted_ticks(ticks.elapsed_ticks, ticks.elapsed_dummy_ticks);
        let warnings = anomaly::assess(
            ticks.elapsed_ticks,
            ticks.elapsed_dummy_ticks,
            config.min_elapsed_ticks,
        );

        if !self.scheduling.unpin() {
            tracing::warn!("Failed to release CPU affinity after run.");
        }
        if !self.scheduling.revert(prior) {
            tracing::warn!(
                "Failed to revert scheduling priority. Running with elevated privileges may help."
            );
        }

        for warning in &warnings {
            tracing::warn!("{}", warning);
        }

        let result = WorkerResult {
            elapsed_ticks: ticks.elapsed_ticks,
            elapsed_dummy_ticks: ticks.elapsed_dummy_ticks,
            adjusted_ticks,
            bytes_per_pass: config.bytes_per_pass,
            passes: ticks.passes,
            primed_words,
            prime_ticks,
            warning: !warnings.is_empty(),
            warnings,
            pinned,
            boosted,
            mode: config.mode,
            cpu: config.cpu,
        };

        tracing::info!(
            elapsed = result.elapsed_ticks,
            dummy = result.elapsed_dummy_ticks,
            adjusted = result.adjusted_ticks,
            passes = result.passes,
            warning = result.warning,
            "Latency run complete"
        );

        self.shared.publish(result.clone(), self.lock_wait)?;
        Ok(result)
    }
}

impl<T, S> LatencyWorker<T, S>
where
    T: CycleTimer + Send + 'static,
    S: SchedulingControl + Send + 'static,
{
    /// Run on a new named thread.
    ///
    /// The returned handle yields the same value as [`run`](Self::run);
    /// controllers may instead poll [`SharedState`] from [`shared`](Self::shared)
    /// before spawning.
    ///
    /// # Errors
    ///
    /// [`WorkerError::Spawn`] if the OS cannot create the thread.
    pub fn spawn(self) -> Result<JoinHandle<Result<WorkerResult, WorkerError>>, WorkerError> {
        std::thread::Builder::new()
            .name("memlat-worker".to_string())
            .spawn(move || {
                let mut worker = self;
                worker.run()
            })
            .map_err(WorkerError::Spawn)
    }
}

impl<T, S> std::fmt::Debug for LatencyWorker<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatencyWorker")
            .field("shared", &self.shared)
            .field("lock_wait", &self.lock_wait)
            .finish_non_exhaustive()
    }
}

/// Batched timing until the real phase reaches `target_ticks`, then the
/// same number of dummy passes.
///
/// Each batch is 256 unrolled, dependent kernel calls between one start and
/// one stop read. Pass counts are therefore always multiples of 256.
fn measure_time_bounded<T: CycleTimer>(
    timer: &mut T,
    kernels: &KernelPair,
    base: *mut u64,
    target_ticks: u64,
) -> PhaseTicks {
    let real = kernels.real();
    let mut elapsed_ticks = 0u64;
    let mut passes = 0u64;
    let mut chain = base;
    while elapsed_ticks < target_ticks {
        let start = timer.start();
        // SAFETY: the region contract guarantees every link is a valid chain
        // pointer.
        unsafe {
            unroll_256!(chain = real.chase(chain, None));
        }
        let stop = timer.stop();
        elapsed_ticks = elapsed_ticks.saturating_add(stop.wrapping_sub(start));
        passes += LATENCY_UNROLL_LENGTH;
    }
    black_box(chain);

    let dummy = kernels.dummy();
    let mut elapsed_dummy_ticks = 0u64;
    let mut p = 0u64;
    chain = base;
    while p < passes {
        let start = timer.start();
        // SAFETY: dummy kernels do not dereference the chain pointer.
        unsafe {
            unroll_256!(chain = dummy.chase(chain, None));
        }
        let stop = timer.stop();
        elapsed_dummy_ticks = elapsed_dummy_ticks.saturating_add(stop.wrapping_sub(start));
        p += LATENCY_UNROLL_LENGTH;
    }
    black_box(chain);

    PhaseTicks {
        elapsed_ticks,
        elapsed_dummy_ticks,
        passes,
    }
}

/// One contiguous timed run of `passes` real calls, then of `passes` dummy
/// calls.
fn measure_pass_bounded<T: CycleTimer>(
    timer: &mut T,
    kernels: &KernelPair,
    base: *mut u64,
    len: usize,
    passes: u64,
) -> PhaseTicks {
    let real = kernels.real();
    let mut chain = base;
    let start = timer.start();
    for _ in 0..passes {
        // SAFETY: see measure_time_bounded.
        chain = unsafe { real.chase(chain, Some(len)) };
    }
    let stop = timer.stop();
    let elapsed_ticks = stop.wrapping_sub(start);
    black_box(chain);

    let dummy = kernels.dummy();
    chain = base;
    let start = timer.start();
    for _ in 0..passes {
        chain = unsafe { dummy.chase(chain, Some(len)) };
    }
    let stop = timer.stop();
    let elapsed_dummy_ticks = stop.wrapping_sub(start);
    black_box(chain);

    PhaseTicks {
        elapsed_ticks,
        elapsed_dummy_ticks,
        passes,
    }
}

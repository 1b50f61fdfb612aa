//! Mutex-guarded state shared between a controller and its worker.
//!
//! The controller writes the configuration and reads the result; the worker
//! reads the configuration once per run and writes the result once per run.
//! Each side holds the lock only long enough to copy data in or out, so a
//! multi-second measurement never blocks the controller.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use crate::config::WorkerConfig;
use crate::error::{LockPhase, WorkerError};
use crate::result::WorkerResult;

/// How long to wait for the shared-state lock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LockWait {
    /// Block until the lock is free.
    #[default]
    Forever,
    /// Give up after this long.
    Timeout(Duration),
}

/// Sleep between `try_lock` attempts during a bounded wait.
const LOCK_POLL_INTERVAL: Duration = Duration::from_micros(50);

#[derive(Debug)]
struct WorkerState {
    config: WorkerConfig,
    result: Option<WorkerResult>,
    completed: bool,
}

/// Handle to a worker's shared configuration and result.
///
/// Cloning the handle shares the same state.
#[derive(Debug, Clone)]
pub struct SharedState {
    inner: Arc<Mutex<WorkerState>>,
}

impl SharedState {
    /// Fresh state holding `config` and no result.
    pub fn new(config: WorkerConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(WorkerState {
                config,
                result: None,
                completed: false,
            })),
        }
    }

    /// Acquire the lock under `wait`, recovering from poisoning.
    ///
    /// The state is plain data with no invariants a panicking holder could
    /// break halfway, so a poisoned lock is still usable.
    fn lock(&self, wait: LockWait) -> Option<MutexGuard<'_, WorkerState>> {
        match wait {
            LockWait::Forever => Some(self.inner.lock().unwrap_or_else(PoisonError::into_inner)),
            LockWait::Timeout(timeout) => {
                let start = Instant::now();
                loop {
                    match self.inner.try_lock() {
                        Ok(guard) => return Some(guard),
                        Err(TryLockError::Poisoned(p)) => return Some(p.into_inner()),
                        Err(TryLockError::WouldBlock) => {
                            if start.elapsed() >= timeout {
                                return None;
                            }
                            std::thread::sleep(LOCK_POLL_INTERVAL);
                        }
                    }
                }
            }
        }
    }

    /// Copy of the configuration as it stands now.
    ///
    /// # Errors
    ///
    /// [`WorkerError::LockTimeout`] if a bounded wait expires.
    pub fn snapshot(&self, wait: LockWait) -> Result<WorkerConfig, WorkerError> {
        let state = self.lock(wait).ok_or(WorkerError::LockTimeout {
            phase: LockPhase::Snapshot,
        })?;
        Ok(state.config.clone())
    }

    /// Store a run's result and mark the run completed.
    ///
    /// The completion flag is set last, while the lock is still held, so a
    /// reader that sees `completed` also sees every result field.
    ///
    /// # Errors
    ///
    /// [`WorkerError::LockTimeout`] if a bounded wait expires; the result is
    /// then not published.
    pub fn publish(&self, result: WorkerResult, wait: LockWait) -> Result<(), WorkerError> {
        let mut state = self.lock(wait).ok_or(WorkerError::LockTimeout {
            phase: LockPhase::Publish,
        })?;
        state.result = Some(result);
        state.completed = true;
        Ok(())
    }

    /// Replace the configuration used by the next run.
    ///
    /// Clears any previous result. A run already in flight keeps the
    /// configuration it snapshotted.
    pub fn set_config(&self, config: WorkerConfig) {
        if let Some(mut state) = self.lock(LockWait::Forever) {
            state.config = config;
            state.result = None;
            state.completed = false;
        }
    }

    /// Apply `f` to the configuration under the lock.
    pub fn update_config<F>(&self, f: F)
    where
        F: FnOnce(&mut WorkerConfig),
    {
        if let Some(mut state) = self.lock(LockWait::Forever) {
            f(&mut state.config);
        }
    }

    /// Whether the latest run has published its result.
    pub fn is_completed(&self) -> bool {
        self.lock(LockWait::Forever)
            .map(|state| state.completed)
            .unwrap_or(false)
    }

    /// The published result, or `None` while no run has completed.
    pub fn poll(&self) -> Option<WorkerResult> {
        let state = self.lock(LockWait::Forever)?;
        if state.completed {
            state.result.clone()
        } else {
            None
        }
    }

    /// Poll every `interval` until a result is published or `timeout` passes.
    pub fn wait_for_result(&self, interval: Duration, timeout: Duration) -> Option<WorkerResult> {
        let start = Instant::now();
        loop {
            if let Some(result) = self.poll() {
                return Some(result);
            }
            if start.elapsed() >= timeout {
                return None;
            }
            std::thread::sleep(interval);
        }
    }

    /// Hold the lock until the returned guard is dropped.
    ///
    /// Lets a controller (or a test) keep the worker out of the shared state
    /// for a while.
    pub fn hold(&self) -> StateHold<'_> {
        StateHold {
            _guard: self.inner.lock().unwrap_or_else(PoisonError::into_inner),
        }
    }
}

/// Exclusive hold on a [`SharedState`], released on drop.
pub struct StateHold<'a> {
    _guard: MutexGuard<'a, WorkerState>,
}

impl std::fmt::Debug for StateHold<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateHold").finish_non_exhaustive()
    }
}

//! Thread priority elevation for reduced preemption during measurement.
//!
//! A preemption inside a timed batch adds the whole time slice of another
//! task to the elapsed ticks. Raising priority makes that less likely. This
//! usually needs elevated privileges, so failure is expected and non-fatal.
//!
//! Uses the `thread-priority` crate for cross-platform support.
//!
//! # Example
//!
//! ```ignore
//! use memlat::measurement::priority::{PriorityGuard, PriorityResult};
//!
//! let guard = match PriorityGuard::try_elevate() {
//!     PriorityResult::Elevated(guard) => Some(guard),
//!     PriorityResult::NotElevated { reason } => {
//!         eprintln!("Priority elevation not available: {}", reason);
//!         None
//!     }
//! };
//!
//! // ... timed work ...
//!
//! if let Some(guard) = guard {
//!     guard.restore();
//! }
//! ```

use thread_priority::{ThreadPriority, ThreadPriorityValue};

use crate::constants::BOOST_PRIORITY;

/// Result of attempting to elevate thread priority.
#[derive(Debug)]
pub enum PriorityResult {
    /// Priority raised; the guard remembers the prior value.
    Elevated(PriorityGuard),
    /// Could not elevate priority; measurement continues at normal priority.
    NotElevated {
        /// Human-readable explanation of why elevation was not possible.
        reason: String,
    },
}

/// Prior thread priority, restored on [`restore`](Self::restore) or drop.
pub struct PriorityGuard {
    original_priority: ThreadPriority,
    restored: bool,
}

impl PriorityGuard {
    /// Try to elevate the current thread's priority.
    pub fn try_elevate() -> PriorityResult {
        let original_priority = match thread_priority::get_current_thread_priority() {
            Ok(p) => p,
            Err(e) => {
                return PriorityResult::NotElevated {
                    reason: format!("Failed to get current thread priority: {:?}", e),
                };
            }
        };

        let target_priority = match ThreadPriorityValue::try_from(BOOST_PRIORITY) {
            Ok(v) => ThreadPriority::Crossplatform(v),
            Err(_) => {
                return PriorityResult::NotElevated {
                    reason: "Failed to create valid priority value".to_string(),
                };
            }
        };

        match thread_priority::set_current_thread_priority(target_priority) {
            Ok(()) => {
                tracing::debug!(
                    "Elevated thread priority from {:?} to {:?}",
                    original_priority,
                    target_priority
                );
                PriorityResult::Elevated(PriorityGuard {
                    original_priority,
                    restored: false,
                })
            }
            Err(e) => {
                tracing::debug!("Thread priority elevation failed: {:?}", e);
                PriorityResult::NotElevated {
                    reason: format!("Priority elevation requires elevated privileges: {:?}", e),
                }
            }
        }
    }

    /// Put the prior priority back now and report whether that succeeded.
    pub fn restore(mut self) -> bool {
        self.restored = true;
        self.apply_original()
    }

    fn apply_original(&self) -> bool {
        match thread_priority::set_current_thread_priority(self.original_priority.clone()) {
            Ok(()) => {
                tracing::debug!("Restored thread priority to {:?}", self.original_priority);
                true
            }
            Err(e) => {
                tracing::warn!("Failed to restore thread priority: {:?}", e);
                false
            }
        }
    }
}

impl Drop for PriorityGuard {
    fn drop(&mut self) {
        if !self.restored {
            self.apply_original();
        }
    }
}

impl std::fmt::Debug for PriorityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriorityGuard")
            .field("original_priority", &self.original_priority)
            .field("restored", &self.restored)
            .finish()
    }
}

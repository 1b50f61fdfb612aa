//! Best-effort scheduling control around a run.
//!
//! The worker pins and boosts before measuring and always unpins and reverts
//! afterwards, whether or not the first half worked. Implementations must
//! therefore treat `unpin` without a successful `pin`, and `revert(None)`,
//! as harmless no-ops.

use crate::types::CpuTarget;

use super::affinity::{AffinityGuard, AffinityResult};
use super::priority::{PriorityGuard, PriorityResult};

/// CPU pinning and priority boosting for the measuring thread.
pub trait SchedulingControl {
    /// Prior scheduling state returned by a successful boost.
    type Token;

    /// Pin the calling thread to `target`. Returns false if the pin did not
    /// take effect.
    fn pin(&mut self, target: CpuTarget) -> bool;

    /// Release any pin taken by [`pin`](Self::pin).
    fn unpin(&mut self) -> bool;

    /// Raise the calling thread's priority, returning what to restore.
    fn boost(&mut self) -> Option<Self::Token>;

    /// Restore the priority captured by [`boost`](Self::boost).
    fn revert(&mut self, prior: Option<Self::Token>) -> bool;
}

/// Operating system affinity and priority controls.
#[derive(Debug, Default)]
pub struct OsScheduling {
    affinity: Option<AffinityGuard>,
}

impl OsScheduling {
    /// Controls with nothing pinned yet.
    pub fn new() -> Self {
        Self::default()
    }
}

impl SchedulingControl for OsScheduling {
    type Token = PriorityGuard;

    fn pin(&mut self, target: CpuTarget) -> bool {
        if let Some(previous) = self.affinity.take() {
            previous.release();
        }
        match AffinityGuard::try_pin(target) {
            AffinityResult::Pinned(guard) => {
                self.affinity = Some(guard);
                true
            }
            AffinityResult::NotPinned { reason } => {
                tracing::debug!("Affinity pin to {} failed: {}", target, reason);
                false
            }
        }
    }

    fn unpin(&mut self) -> bool {
        match self.affinity.take() {
            Some(guard) => guard.release(),
            None => true,
        }
    }

    fn boost(&mut self) -> Option<PriorityGuard> {
        match PriorityGuard::try_elevate() {
            PriorityResult::Elevated(guard) => Some(guard),
            PriorityResult::NotElevated { reason } => {
                tracing::debug!("Priority boost failed: {}", reason);
                None
            }
        }
    }

    fn revert(&mut self, prior: Option<PriorityGuard>) -> bool {
        match prior {
            Some(guard) => guard.restore(),
            None => true,
        }
    }
}

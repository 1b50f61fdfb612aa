//! CPU affinity pinning for the measuring thread.
//!
//! A thread that migrates mid-run lands on a core with cold caches and a
//! different TLB, which shows up as latency that has nothing to do with the
//! region being measured. Pinning is best-effort: failure is reported to the
//! caller, who carries on unpinned.
//!
//! # Platform Behavior
//!
//! - **Linux**: `sched_setaffinity` restricts the thread to a single CPU and
//!   the original mask is restored on release. No privileges required.
//! - **macOS**: `thread_policy_set` with `THREAD_AFFINITY_POLICY`. Advisory
//!   only; the kernel may still migrate the thread, and newer releases refuse
//!   the policy outright (`KERN_POLICY_STATIC`).
//! - **Elsewhere**: not supported, always `NotPinned`.
//!
//! # Example
//!
//! ```ignore
//! use memlat::measurement::affinity::{AffinityGuard, AffinityResult};
//! use memlat::CpuTarget;
//!
//! let guard = match AffinityGuard::try_pin(CpuTarget::Logical(2)) {
//!     AffinityResult::Pinned(guard) => Some(guard),
//!     AffinityResult::NotPinned { reason } => {
//!         eprintln!("running unpinned: {}", reason);
//!         None
//!     }
//! };
//!
//! // ... timed work ...
//!
//! if let Some(guard) = guard {
//!     guard.release();
//! }
//! ```

use crate::types::CpuTarget;

/// Result of attempting to pin the current thread.
#[derive(Debug)]
pub enum AffinityResult {
    /// Pinned; keep the guard alive for the duration of the measurement.
    Pinned(AffinityGuard),
    /// Could not pin; measurement continues wherever the scheduler puts it.
    NotPinned {
        /// Human-readable explanation of why pinning was not possible.
        reason: String,
    },
}

/// Restores the thread's original affinity on [`release`](Self::release) or
/// drop.
pub struct AffinityGuard {
    /// The CPU we pinned to.
    cpu: usize,
    /// Mask to restore (Linux only).
    #[cfg(target_os = "linux")]
    original_mask: libc::cpu_set_t,
    /// Mach thread port the hint was set on (macOS only).
    #[cfg(target_os = "macos")]
    thread_port: u32,
    released: bool,
}

impl AffinityGuard {
    /// Pin the current thread to `target`.
    pub fn try_pin(target: CpuTarget) -> AffinityResult {
        #[cfg(target_os = "linux")]
        {
            Self::try_pin_linux(target)
        }

        #[cfg(target_os = "macos")]
        {
            Self::try_pin_macos(target)
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let _ = target;
            AffinityResult::NotPinned {
                reason: "CPU affinity not supported on this platform".to_string(),
            }
        }
    }

    /// The CPU this guard pinned to.
    pub fn cpu(&self) -> usize {
        self.cpu
    }

    /// Undo the pin now and report whether that succeeded.
    pub fn release(mut self) -> bool {
        self.released = true;
        self.restore()
    }

    #[cfg(target_os = "linux")]
    fn try_pin_linux(target: CpuTarget) -> AffinityResult {
        use std::mem::MaybeUninit;

        unsafe {
            let mut original_mask = MaybeUninit::<libc::cpu_set_t>::uninit();
            let result = libc::sched_getaffinity(
                0, // current thread
                std::mem::size_of::<libc::cpu_set_t>(),
                original_mask.as_mut_ptr(),
            );
            if result != 0 {
                return AffinityResult::NotPinned {
                    reason: format!(
                        "sched_getaffinity failed: {}",
                        std::io::Error::last_os_error()
                    ),
                };
            }
            let original_mask = original_mask.assume_init();

            let cpu = match target {
                CpuTarget::Logical(cpu) => cpu,
                CpuTarget::Current => {
                    let current = libc::sched_getcpu();
                    if current < 0 {
                        return AffinityResult::NotPinned {
                            reason: format!(
                                "sched_getcpu failed: {}",
                                std::io::Error::last_os_error()
                            ),
                        };
                    }
                    current as usize
                }
            };

            if cpu >= crate::constants::MAX_LOGICAL_CPUS {
                return AffinityResult::NotPinned {
                    reason: format!(
                        "CPU {} is outside the addressable range (0..{})",
                        cpu,
                        crate::constants::MAX_LOGICAL_CPUS
                    ),
                };
            }

            let mut new_mask: libc::cpu_set_t = std::mem::zeroed();
            libc::CPU_ZERO(&mut new_mask);
            libc::CPU_SET(cpu, &mut new_mask);

            let result = libc::sched_setaffinity(
                0, // current thread
                std::mem::size_of::<libc::cpu_set_t>(),
                &new_mask,
            );
            if result != 0 {
                return AffinityResult::NotPinned {
                    reason: format!(
                        "sched_setaffinity to CPU {} failed: {}",
                        cpu,
                        std::io::Error::last_os_error()
                    ),
                };
            }

            tracing::debug!("Pinned thread to CPU {}", cpu);

            AffinityResult::Pinned(AffinityGuard {
                cpu,
                original_mask,
                released: false,
            })
        }
    }

    #[cfg(target_os = "macos")]
    fn try_pin_macos(target: CpuTarget) -> AffinityResult {
        // Threads sharing an affinity tag are kept on the same core when
        // possible. Tag 0 means "no affinity", so logical CPU n uses n + 1.
        let cpu = match target {
            CpuTarget::Logical(cpu) => cpu,
            CpuTarget::Current => 0,
        };
        let tag = match cpu.checked_add(1).and_then(|t| i32::try_from(t).ok()) {
            Some(tag) => tag,
            None => {
                return AffinityResult::NotPinned {
                    reason: format!("CPU {} does not fit an affinity tag", cpu),
                }
            }
        };

        unsafe {
            let thread_port = libc::pthread_mach_thread_np(libc::pthread_self());
            if thread_port == 0 {
                return AffinityResult::NotPinned {
                    reason: "Failed to get mach thread port".to_string(),
                };
            }

            const THREAD_AFFINITY_POLICY: u32 = 4;
            const THREAD_AFFINITY_POLICY_COUNT: u32 = 1;

            extern "C" {
                fn thread_policy_set(
                    thread: u32,
                    flavor: u32,
                    policy_info: *const i32,
                    count: u32,
                ) -> i32;
            }

            let result = thread_policy_set(
                thread_port,
                THREAD_AFFINITY_POLICY,
                &tag as *const i32,
                THREAD_AFFINITY_POLICY_COUNT,
            );

            if result != 0 {
                let reason = match result {
                    46 => "macOS kernel policy is static (KERN_POLICY_STATIC) - affinity hints not supported on this system".to_string(),
                    4 => "Invalid argument to thread_policy_set".to_string(),
                    _ => format!("thread_policy_set failed with code {}", result),
                };
                return AffinityResult::NotPinned { reason };
            }

            tracing::debug!("Set macOS affinity tag {} (advisory)", tag);

            AffinityResult::Pinned(AffinityGuard {
                cpu,
                thread_port,
                released: false,
            })
        }
    }

    #[cfg(target_os = "linux")]
    fn restore(&mut self) -> bool {
        let result = unsafe {
            libc::sched_setaffinity(
                0,
                std::mem::size_of::<libc::cpu_set_t>(),
                &self.original_mask,
            )
        };
        if result != 0 {
            tracing::warn!(
                "Failed to restore CPU affinity: {}",
                std::io::Error::last_os_error()
            );
            false
        } else {
            tracing::debug!("Restored original CPU affinity");
            true
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn restore(&mut self) -> bool {
        // Advisory hints are tied to the thread; nothing to undo.
        tracing::debug!("Affinity hint released");
        true
    }
}

impl Drop for AffinityGuard {
    fn drop(&mut self) {
        if !self.released {
            self.restore();
        }
    }
}

impl std::fmt::Debug for AffinityGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("AffinityGuard");
        s.field("cpu", &self.cpu);
        #[cfg(target_os = "macos")]
        s.field("thread_port", &self.thread_port);
        s.field("released", &self.released).finish()
    }
}

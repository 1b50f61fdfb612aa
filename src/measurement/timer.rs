//! Cycle counter access and tick-rate calibration.
//!
//! - x86_64: `lfence; rdtsc` to start, `rdtscp; lfence` to stop
//! - aarch64: `isb; mrs cntvct_el0` on both edges
//! - Fallback: nanoseconds since a process-wide `Instant`
//!
//! Ticks are never converted to time here; [`ticks_per_sec`] only exists so
//! time-bounded runs can turn a duration into a tick target.

use std::sync::atomic::{compiler_fence, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

/// Start/stop edges of a timed interval.
///
/// Both reads must come from the same monotonic counter. Elapsed ticks are
/// always `stop - start`.
pub trait CycleTimer {
    /// Read the counter at the start of an interval.
    fn start(&mut self) -> u64;

    /// Read the counter at the end of an interval.
    fn stop(&mut self) -> u64;
}

/// The platform cycle counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tsc;

impl CycleTimer for Tsc {
    #[inline(always)]
    fn start(&mut self) -> u64 {
        start_ticks()
    }

    #[inline(always)]
    fn stop(&mut self) -> u64 {
        stop_ticks()
    }
}

/// Counter read that waits for earlier instructions to retire first.
#[inline(always)]
pub fn start_ticks() -> u64 {
    compiler_fence(Ordering::SeqCst);
    let ticks = read_start();
    compiler_fence(Ordering::SeqCst);
    ticks
}

/// Counter read that later instructions cannot be hoisted above.
#[inline(always)]
pub fn stop_ticks() -> u64 {
    compiler_fence(Ordering::SeqCst);
    let ticks = read_stop();
    compiler_fence(Ordering::SeqCst);
    ticks
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_start() -> u64 {
    let ticks: u64;
    unsafe {
        std::arch::asm!(
            "lfence",
            "rdtsc",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") ticks,
            out("rdx") _,
            options(nostack, nomem),
        );
    }
    ticks
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn read_stop() -> u64 {
    let ticks: u64;
    unsafe {
        std::arch::asm!(
            "rdtscp",
            "lfence",
            "shl rdx, 32",
            "or rax, rdx",
            out("rax") ticks,
            out("rdx") _,
            out("rcx") _,
            options(nostack, nomem),
        );
    }
    ticks
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_start() -> u64 {
    let ticks: u64;
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) ticks,
            options(nostack, nomem),
        );
    }
    ticks
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn read_stop() -> u64 {
    read_start()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_start() -> u64 {
    static ANCHOR: OnceLock<Instant> = OnceLock::new();
    ANCHOR.get_or_init(Instant::now).elapsed().as_nanos() as u64
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline(always)]
fn read_stop() -> u64 {
    read_start()
}

/// Process-wide counter rate, measured once and cached.
pub fn ticks_per_sec() -> u64 {
    static TICKS_PER_SEC: OnceLock<u64> = OnceLock::new();
    *TICKS_PER_SEC.get_or_init(|| {
        let rate = detect_ticks_per_sec().unwrap_or_else(calibrate_ticks_per_sec);
        tracing::debug!("Counter rate: {:.2} MHz", rate as f64 / 1e6);
        rate
    })
}

/// Ticks corresponding to `duration` at `ticks_per_sec`, saturating.
pub fn ticks_for(duration: Duration, ticks_per_sec: u64) -> u64 {
    let ticks = duration.as_nanos().saturating_mul(ticks_per_sec as u128) / 1_000_000_000;
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

#[cfg(all(target_arch = "x86_64", target_os = "linux"))]
fn detect_ticks_per_sec() -> Option<u64> {
    let khz = std::fs::read_to_string("/sys/devices/system/cpu/cpu0/tsc_freq_khz").ok()?;
    let hz = khz.trim().parse::<u64>().ok()?.checked_mul(1000)?;
    is_reasonable_rate(hz).then_some(hz)
}

#[cfg(target_arch = "aarch64")]
fn detect_ticks_per_sec() -> Option<u64> {
    let hz: u64;
    unsafe {
        std::arch::asm!("mrs {}, cntfrq_el0", out(reg) hz, options(nostack, nomem));
    }
    is_reasonable_rate(hz).then_some(hz)
}

#[cfg(not(any(all(target_arch = "x86_64", target_os = "linux"), target_arch = "aarch64")))]
fn detect_ticks_per_sec() -> Option<u64> {
    #[cfg(not(target_arch = "x86_64"))]
    {
        // Instant fallback counts nanoseconds.
        Some(1_000_000_000)
    }
    #[cfg(target_arch = "x86_64")]
    {
        None
    }
}

/// Rates between 1 MHz and 10 GHz are plausible for any counter we read.
fn is_reasonable_rate(hz: u64) -> bool {
    (1_000_000..=10_000_000_000).contains(&hz)
}

/// Rate implied by `ticks` counted over `elapsed_ns`, if it is plausible.
fn sample_rate(ticks: u64, elapsed_ns: u128) -> Option<u64> {
    if elapsed_ns == 0 {
        return None;
    }
    let hz = u64::try_from(ticks as u128 * 1_000_000_000 / elapsed_ns).ok()?;
    is_reasonable_rate(hz).then_some(hz)
}

/// Compare counter progress against `Instant` over a few short sleeps.
fn calibrate_ticks_per_sec() -> u64 {
    const SAMPLES: usize = 5;
    const SLEEP: Duration = Duration::from_millis(20);
    const FALLBACK_HZ: u64 = 3_000_000_000;

    let mut rates = Vec::with_capacity(SAMPLES);
    for _ in 0..SAMPLES {
        let start = start_ticks();
        let started = Instant::now();
        std::thread::sleep(SLEEP);
        let end = stop_ticks();
        if let Some(hz) = sample_rate(end.wrapping_sub(start), started.elapsed().as_nanos()) {
            rates.push(hz);
        }
    }

    if rates.is_empty() {
        tracing::warn!(
            "Counter rate calibration failed, assuming {:.1} GHz",
            FALLBACK_HZ as f64 / 1e9
        );
        return FALLBACK_HZ;
    }

    rates.sort_unstable();
    rates[rates.len() / 2]
}

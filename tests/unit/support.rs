//! Deterministic fakes shared by the unit-style integration tests.
//!
//! The fake counter only advances when a fake kernel charges it, so tick
//! totals are exact multiples of the per-call costs.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use memlat::{
    ChaseKernel, CpuTarget, CycleTimer, KernelKind, KernelPair, MemoryRegion, RunMode,
    SchedulingControl, WorkerConfig,
};

/// Shared fake counter.
#[derive(Debug, Clone, Default)]
pub struct Clock(Arc<AtomicU64>);

impl Clock {
    pub fn starting_at(ticks: u64) -> Self {
        Self(Arc::new(AtomicU64::new(ticks)))
    }

    pub fn advance(&self, ticks: u64) {
        // fetch_add wraps on overflow, like a real counter
        self.0.fetch_add(ticks, Ordering::SeqCst);
    }

    pub fn now(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

impl CycleTimer for Clock {
    fn start(&mut self) -> u64 {
        self.now()
    }

    fn stop(&mut self) -> u64 {
        self.now()
    }
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Kernel that charges a fixed cost to the clock on every call.
pub struct CostKernel {
    kind: KernelKind,
    cost: u64,
    clock: Clock,
    calls: AtomicU64,
    on_first_call: Mutex<Option<Hook>>,
}

impl CostKernel {
    pub fn new(kind: KernelKind, cost: u64, clock: &Clock) -> Arc<Self> {
        Arc::new(Self {
            kind,
            cost,
            clock: clock.clone(),
            calls: AtomicU64::new(0),
            on_first_call: Mutex::new(None),
        })
    }

    /// Run `hook` once, during the first chase call.
    pub fn with_hook(
        kind: KernelKind,
        cost: u64,
        clock: &Clock,
        hook: impl Fn() + Send + Sync + 'static,
    ) -> Arc<Self> {
        let kernel = Self::new(kind, cost, clock);
        *kernel.on_first_call.lock().unwrap() = Some(Box::new(hook));
        kernel
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ChaseKernel for CostKernel {
    fn kind(&self) -> KernelKind {
        self.kind
    }

    fn name(&self) -> &'static str {
        "cost"
    }

    unsafe fn chase(&self, chain: *mut u64, _len: Option<usize>) -> *mut u64 {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            if let Some(hook) = self.on_first_call.lock().unwrap().take() {
                hook();
            }
        }
        self.clock.advance(self.cost);
        chain
    }
}

/// A clock and a kernel pair charging `real` and `dummy` ticks per call.
pub fn costed_pair(
    real: u64,
    dummy: u64,
) -> (Clock, Arc<CostKernel>, Arc<CostKernel>, KernelPair) {
    let clock = Clock::default();
    let r = CostKernel::new(KernelKind::Measuring, real, &clock);
    let d = CostKernel::new(KernelKind::Dummy, dummy, &clock);
    let pair = KernelPair::new(r.clone(), d.clone()).unwrap();
    (clock, r, d, pair)
}

/// Heap-backed region whose words form a ring: word `i` points at `i + 1`.
pub struct Ring {
    words: Box<[u64]>,
}

impl Ring {
    pub fn new(len: usize) -> Self {
        let mut words = vec![0u64; len].into_boxed_slice();
        let base = words.as_mut_ptr();
        for i in 0..len {
            let next = unsafe { base.add((i + 1) % len) };
            unsafe { base.add(i).write(next as u64) };
        }
        Self { words }
    }

    pub fn region(&mut self) -> MemoryRegion {
        unsafe { MemoryRegion::from_words(&mut self.words) }.unwrap()
    }
}

/// Pass-bounded config over `ring` with the given kernels and threshold.
pub fn config(ring: &mut Ring, kernels: KernelPair, passes: u64, min: u64) -> WorkerConfig {
    WorkerConfig::new(ring.region(), RunMode::passes(passes), kernels, CpuTarget::Current)
        .unwrap()
        .min_elapsed_ticks(min)
}

/// Calls observed by [`FakeScheduling`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedCall {
    Pin(CpuTarget),
    Unpin,
    Boost,
    Revert(Option<u32>),
}

/// Scheduling control that records calls and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct FakeScheduling {
    pub pin_ok: bool,
    pub boost_ok: bool,
    pub log: Arc<Mutex<Vec<SchedCall>>>,
}

impl FakeScheduling {
    pub fn new(pin_ok: bool, boost_ok: bool) -> Self {
        Self {
            pin_ok,
            boost_ok,
            log: Arc::default(),
        }
    }

    pub fn calls(&self) -> Vec<SchedCall> {
        self.log.lock().unwrap().clone()
    }
}

impl SchedulingControl for FakeScheduling {
    type Token = u32;

    fn pin(&mut self, target: CpuTarget) -> bool {
        self.log.lock().unwrap().push(SchedCall::Pin(target));
        self.pin_ok
    }

    fn unpin(&mut self) -> bool {
        self.log.lock().unwrap().push(SchedCall::Unpin);
        true
    }

    fn boost(&mut self) -> Option<u32> {
        self.log.lock().unwrap().push(SchedCall::Boost);
        self.boost_ok.then_some(42)
    }

    fn revert(&mut self, prior: Option<u32>) -> bool {
        self.log.lock().unwrap().push(SchedCall::Revert(prior));
        true
    }
}

/// Ordered record of timer edges and kernel milestones.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

/// [`Clock`] that also logs every start and stop read.
#[derive(Debug, Clone, Default)]
pub struct RecordingClock {
    pub clock: Clock,
    pub events: EventLog,
}

impl RecordingClock {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().clone()
    }
}

impl CycleTimer for RecordingClock {
    fn start(&mut self) -> u64 {
        self.events.lock().unwrap().push("start");
        self.clock.now()
    }

    fn stop(&mut self) -> u64 {
        self.events.lock().unwrap().push("stop");
        self.clock.now()
    }
}

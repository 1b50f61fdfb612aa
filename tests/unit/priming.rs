//! Priming happens before, and apart from, the timed phases.

use memlat::{KernelKind, KernelPair, LatencyWorker};

use crate::support::{config, CostKernel, FakeScheduling, RecordingClock, Ring};

/// Recording clock and a kernel pair that log their first calls to it.
fn recorded_pair() -> (RecordingClock, KernelPair) {
    let timer = RecordingClock::default();
    let real_log = timer.events.clone();
    let real = CostKernel::with_hook(KernelKind::Measuring, 10, &timer.clock, move || {
        real_log.lock().unwrap().push("real")
    });
    let dummy_log = timer.events.clone();
    let dummy = CostKernel::with_hook(KernelKind::Dummy, 1, &timer.clock, move || {
        dummy_log.lock().unwrap().push("dummy")
    });
    (timer, KernelPair::new(real, dummy).unwrap())
}

#[test]
fn prime_sweep_precedes_measurement() {
    let (timer, pair) = recorded_pair();
    let mut ring = Ring::new(64);
    let cfg = config(&mut ring, pair, 10, 1).prime_passes(3);
    let mut worker = LatencyWorker::with_parts(cfg, timer.clone(), FakeScheduling::default());
    let result = worker.run().unwrap();

    // prime interval, then the real phase, then the dummy phase
    assert_eq!(
        timer.events(),
        vec!["start", "stop", "start", "real", "stop", "start", "dummy", "stop"]
    );
    assert_eq!(result.primed_words, 3 * 64);
    // the fake clock only moves inside kernels
    assert_eq!(result.prime_ticks, 0);
    assert_eq!(result.elapsed_ticks, 100);
    assert_eq!(result.elapsed_dummy_ticks, 10);
}

#[test]
fn prime_passes_reach_the_sweep() {
    for passes in [1, 4, 7] {
        let (timer, pair) = recorded_pair();
        let mut ring = Ring::new(16);
        let cfg = config(&mut ring, pair, 5, 1).prime_passes(passes);
        let mut worker = LatencyWorker::with_parts(cfg, timer, FakeScheduling::default());
        let result = worker.run().unwrap();
        assert_eq!(result.primed_words, u64::from(passes) * 16);
    }
}

#[test]
fn default_config_primes_four_times() {
    let (timer, pair) = recorded_pair();
    let mut ring = Ring::new(32);
    let mut worker =
        LatencyWorker::with_parts(config(&mut ring, pair, 5, 1), timer, FakeScheduling::default());
    assert_eq!(
        worker.run().unwrap().primed_words,
        u64::from(memlat::PRIME_PASSES) * 32
    );
}

#[test]
fn zero_prime_passes_skip_priming() {
    let (timer, pair) = recorded_pair();
    let mut ring = Ring::new(16);
    let cfg = config(&mut ring, pair, 5, 1).prime_passes(0);
    let mut worker = LatencyWorker::with_parts(cfg, timer.clone(), FakeScheduling::default());
    let result = worker.run().unwrap();

    assert_eq!(result.primed_words, 0);
    assert_eq!(result.prime_ticks, 0);
    assert_eq!(
        timer.events(),
        vec!["start", "real", "stop", "start", "dummy", "stop"]
    );
}

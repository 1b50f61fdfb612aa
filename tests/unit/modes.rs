//! Time-bounded and pass-bounded run lengths.

use memlat::{
    ConfigError, CpuTarget, KernelKind, KernelPair, LatencyWorker, RunMode, WorkerConfig,
    LATENCY_UNROLL_LENGTH,
};

use crate::support::{config, costed_pair, Clock, CostKernel, FakeScheduling, Ring};

#[test]
fn time_bounded_passes_are_whole_batches() {
    for target_ticks in [1, 255, 256, 257, 1_000, 5_000] {
        let (clock, real, dummy, pair) = costed_pair(3, 1);
        let mut ring = Ring::new(32);
        let config = WorkerConfig::new(
            ring.region(),
            RunMode::TimeBounded { target_ticks },
            pair,
            CpuTarget::Current,
        )
        .unwrap();
        let mut worker =
            LatencyWorker::with_parts(config, clock, FakeScheduling::new(true, true));
        let result = worker.run().unwrap();

        assert!(result.passes > 0);
        assert_eq!(result.passes % LATENCY_UNROLL_LENGTH, 0);
        assert!(result.elapsed_ticks >= target_ticks);
        // one batch fewer would not have reached the target
        assert!(result.elapsed_ticks - 3 * LATENCY_UNROLL_LENGTH < target_ticks);
        assert_eq!(real.calls(), result.passes);
        assert_eq!(dummy.calls(), result.passes);
    }
}

#[test]
fn time_bounded_exact_batches() {
    let (clock, _, _, pair) = costed_pair(1, 0);
    let mut ring = Ring::new(32);
    let config = WorkerConfig::new(
        ring.region(),
        RunMode::TimeBounded { target_ticks: 1_000 },
        pair,
        CpuTarget::Current,
    )
    .unwrap();
    let mut worker = LatencyWorker::with_parts(config, clock, FakeScheduling::new(true, true));
    let result = worker.run().unwrap();

    assert_eq!(result.passes, 1_024);
    assert_eq!(result.elapsed_ticks, 1_024);
    assert_eq!(result.elapsed_dummy_ticks, 0);
}

#[test]
fn pass_bounded_runs_exact_count() {
    for passes in [1, 2, 10, 255, 1_000] {
        let (clock, real, dummy, pair) = costed_pair(5, 2);
        let mut ring = Ring::new(32);
        let mut worker = LatencyWorker::with_parts(
            config(&mut ring, pair, passes, 1),
            clock,
            FakeScheduling::new(true, true),
        );
        let result = worker.run().unwrap();

        assert_eq!(result.passes, passes);
        assert_eq!(real.calls(), passes);
        assert_eq!(dummy.calls(), passes);
        assert_eq!(result.elapsed_ticks, 5 * passes);
        assert_eq!(result.elapsed_dummy_ticks, 2 * passes);
        assert_eq!(result.mode, RunMode::passes(passes));
    }
}

#[test]
fn elapsed_survives_counter_wrap() {
    let clock = Clock::starting_at(u64::MAX - 50);
    let real = CostKernel::new(KernelKind::Measuring, 20, &clock);
    let dummy = CostKernel::new(KernelKind::Dummy, 2, &clock);
    let pair = KernelPair::new(real, dummy).unwrap();

    let mut ring = Ring::new(8);
    let mut worker =
        LatencyWorker::with_parts(config(&mut ring, pair, 10, 1), clock, FakeScheduling::default());
    let result = worker.run().unwrap();

    assert_eq!(result.elapsed_ticks, 200);
    assert_eq!(result.elapsed_dummy_ticks, 20);
    assert_eq!(result.adjusted_ticks, 180);
}

#[test]
fn zero_length_modes_are_rejected() {
    let mut ring = Ring::new(8);
    assert_eq!(
        WorkerConfig::new(
            ring.region(),
            RunMode::passes(0),
            KernelPair::random_read(),
            CpuTarget::Current,
        )
        .unwrap_err(),
        ConfigError::ZeroPasses
    );
    assert_eq!(
        RunMode::TimeBounded { target_ticks: 0 }.validate(),
        Err(ConfigError::ZeroDuration)
    );
}

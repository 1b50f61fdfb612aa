//! Tests for configuration validation.
//!
//! Invalid regions and kernel pairings are rejected with an error; invalid
//! builder values panic with a message naming the field.

use std::sync::Arc;

use memlat::kernel::{ChaseDummy, RandomRead, RandomWrite};
use memlat::{ConfigError, CpuTarget, KernelKind, KernelPair, MemoryRegion, RunMode, WorkerConfig};

use crate::support::Ring;

// =============================================================================
// REGION VALIDATION
// =============================================================================

#[test]
fn null_region_rejected() {
    let err = unsafe { MemoryRegion::from_raw_parts(std::ptr::null_mut(), 64) }.unwrap_err();
    assert_eq!(err, ConfigError::NullRegion);
}

#[test]
fn misaligned_region_rejected() {
    let mut words = [0u64; 4];
    let base = words.as_mut_ptr() as *mut u8;
    let err = unsafe { MemoryRegion::from_raw_parts(base.add(1), 16) }.unwrap_err();
    assert!(matches!(err, ConfigError::MisalignedRegion { align: 8, .. }));
}

#[test]
fn tiny_region_rejected() {
    let mut words = [0u64; 1];
    let base = words.as_mut_ptr() as *mut u8;
    let err = unsafe { MemoryRegion::from_raw_parts(base, 4) }.unwrap_err();
    assert_eq!(err, ConfigError::RegionTooSmall { len: 4, min: 8 });
}

#[test]
fn region_reports_words() {
    let mut ring = Ring::new(12);
    let region = ring.region();
    assert_eq!(region.len(), 96);
    assert_eq!(region.words(), 12);
    assert!(!region.is_empty());
}

// =============================================================================
// KERNEL PAIRING
// =============================================================================

#[test]
fn swapped_kernels_rejected() {
    let err = KernelPair::new(Arc::new(ChaseDummy), Arc::new(RandomRead)).unwrap_err();
    assert_eq!(
        err,
        ConfigError::KernelRoleMismatch {
            slot: "real",
            found: KernelKind::Dummy
        }
    );
}

#[test]
fn two_measuring_kernels_rejected() {
    let err = KernelPair::new(Arc::new(RandomRead), Arc::new(RandomWrite)).unwrap_err();
    assert_eq!(
        err,
        ConfigError::KernelRoleMismatch {
            slot: "dummy",
            found: KernelKind::Measuring
        }
    );
}

// =============================================================================
// BUILDERS
// =============================================================================

fn base_config(ring: &mut Ring) -> WorkerConfig {
    WorkerConfig::new(
        ring.region(),
        RunMode::passes(10),
        KernelPair::random_write(),
        CpuTarget::Logical(1),
    )
    .unwrap()
}

#[test]
#[should_panic(expected = "min_elapsed_ticks must be > 0")]
fn min_elapsed_ticks_zero_panics() {
    let mut ring = Ring::new(4);
    let _ = base_config(&mut ring).min_elapsed_ticks(0);
}

#[test]
#[should_panic(expected = "bytes_per_pass must be > 0")]
fn bytes_per_pass_zero_panics() {
    let mut ring = Ring::new(4);
    let _ = base_config(&mut ring).bytes_per_pass(0);
}

#[test]
fn builders_set_fields() {
    let mut ring = Ring::new(4);
    let config = base_config(&mut ring)
        .min_elapsed_ticks(123)
        .bytes_per_pass(64)
        .prime_passes(0);
    assert_eq!(config.min_elapsed_ticks, 123);
    assert_eq!(config.bytes_per_pass, 64);
    assert_eq!(config.prime_passes, 0);
}

// =============================================================================
// ENVIRONMENT OVERRIDES
// =============================================================================

// The only test in this binary that touches these variables.
#[test]
fn env_override_for_passes() {
    let default = RunMode::passes(3);

    std::env::remove_var("MEMLAT_PASSES");
    std::env::remove_var("MEMLAT_DURATION_MS");
    assert_eq!(RunMode::try_from_env(), Ok(None));
    assert_eq!(RunMode::from_env_or(default), default);

    std::env::set_var("MEMLAT_PASSES", "77");
    assert_eq!(RunMode::from_env_or(default), RunMode::passes(77));

    std::env::set_var("MEMLAT_PASSES", "lots");
    assert!(matches!(
        RunMode::try_from_env(),
        Err(ConfigError::InvalidEnv {
            name: "MEMLAT_PASSES",
            ..
        })
    ));
    assert_eq!(RunMode::from_env_or(default), default);

    std::env::set_var("MEMLAT_PASSES", "0");
    assert_eq!(RunMode::try_from_env(), Err(ConfigError::ZeroPasses));

    std::env::remove_var("MEMLAT_PASSES");
}

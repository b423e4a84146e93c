use std::error::Error;

use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::LayeredCacheConfig;
use crate::error::{AccessError, SimulatorError};
use crate::simulator::{sweep_l1_sizes, LayeredCacheResult, Simulator};
use crate::trace::{generate, TracePattern};

const ACCESSES: usize = 5000;

fn sequential_trace() -> Vec<u64> {
    generate(TracePattern::Sequential { stride: 4 }, ACCESSES, &mut SmallRng::seed_from_u64(0))
}

fn random_trace() -> Vec<u64> {
    generate(TracePattern::Random { bound: 0xFFFFF }, ACCESSES, &mut SmallRng::seed_from_u64(2024))
}

fn run(config: &LayeredCacheConfig, trace: &[u64]) -> Result<LayeredCacheResult, Box<dyn Error>> {
    let mut simulator = Simulator::new(config, Some(17))?;
    Ok(simulator.simulate(trace)?)
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.is_some_and(|actual| (actual - expected).abs() < 1e-9)
}

#[test]
fn sequential_stream_mostly_hits_l1() -> Result<(), Box<dyn Error>> {
    let result = run(&LayeredCacheConfig::default(), &sequential_trace())?;
    let l1 = &result.caches[0];
    let l2 = &result.caches[1];

    // 20000 bytes of 4 byte words touch 313 blocks of 64 bytes, each missed once
    assert_eq!(l1.accesses, 5000);
    assert_eq!(l1.misses, 313);
    assert!(l1.hit_ratio.unwrap() > 90.0);
    assert!(close(l1.miss_ratio, 100.0 - l1.hit_ratio.unwrap()));

    // Cold L2, so every block it sees is a miss
    assert_eq!(l2.accesses, 313);
    assert_eq!(l2.hits, 0);
    assert_eq!(result.main_memory_accesses, 313);

    assert!(close(l1.amat, 4.0 + 313.0 / 5000.0 * 10.0));
    assert!(close(l2.amat, 10.0 + 200.0));
    assert!(close(l2.hierarchical_amat, 210.0));
    assert!(close(l1.hierarchical_amat, 4.0 + 313.0 / 5000.0 * 210.0));
    Ok(())
}

#[test]
fn random_stream_hits_far_less() -> Result<(), Box<dyn Error>> {
    let config = LayeredCacheConfig::default();
    let sequential = run(&config, &sequential_trace())?;
    let random = run(&config, &random_trace())?;

    let random_l1 = random.caches[0].hit_ratio.unwrap();
    // 5000 accesses over 16384 blocks, an L1 of 512 blocks rarely sees the same one twice
    assert!(random_l1 < 25.0, "random L1 hit ratio {random_l1}");
    assert!(sequential.caches[0].hit_ratio.unwrap() - random_l1 > 50.0);
    for level in &random.caches {
        assert_eq!(level.hits + level.misses, level.accesses);
    }
    assert_eq!(random.caches[1].accesses, random.caches[0].misses);
    Ok(())
}

#[test]
fn single_level_amat_uses_memory_latency() -> Result<(), Box<dyn Error>> {
    let mut config = LayeredCacheConfig::default().without_lower_levels();
    config.memory_latency = 300;
    let result = run(&config, &sequential_trace())?;
    assert_eq!(result.caches.len(), 1);
    let l1 = &result.caches[0];
    assert!(close(l1.amat, 4.0 + 313.0 / 5000.0 * 300.0));
    assert_eq!(l1.amat, l1.hierarchical_amat);
    assert_eq!(result.main_memory_accesses, l1.misses);
    Ok(())
}

#[test]
fn metrics_are_absent_before_any_access() -> Result<(), Box<dyn Error>> {
    let simulator = Simulator::new(&LayeredCacheConfig::default(), Some(1))?;
    let result = simulator.result();
    for level in &result.caches {
        assert_eq!(level.accesses, 0);
        assert_eq!(level.hit_ratio, None);
        assert_eq!(level.miss_ratio, None);
        assert_eq!(level.amat, None);
        assert_eq!(level.hierarchical_amat, None);
    }
    let json = serde_json::to_string(&result)?;
    assert!(json.contains("\"hit_ratio\":null"));
    Ok(())
}

#[test]
fn repeated_simulation_accumulates_and_reset_keeps_contents() -> Result<(), Box<dyn Error>> {
    let trace = sequential_trace();
    let mut simulator = Simulator::new(&LayeredCacheConfig::default(), Some(3))?;
    simulator.simulate(&trace)?;
    let second = simulator.simulate(&trace)?;
    assert_eq!(second.caches[0].accesses, 10_000);
    // Everything was already resident the second time round
    assert_eq!(second.caches[0].misses, 313);

    simulator.reset();
    let warm = simulator.simulate(&trace)?;
    assert_eq!(warm.caches[0].misses, 0);
    assert_eq!(warm.caches[1].accesses, 0);
    assert_eq!(warm.caches[0].hit_ratio, Some(100.0));
    assert_eq!(simulator.occupancy(), vec![313, 313]);
    Ok(())
}

#[test]
fn out_of_bounds_trace_is_rejected_whole() -> Result<(), Box<dyn Error>> {
    let mut config = LayeredCacheConfig::default();
    config.address_bound = Some(0xFFFFF);
    let mut simulator = Simulator::new(&config, Some(5))?;
    let trace = vec![0, 64, 0x100000, 128];
    assert_eq!(
        simulator.simulate(&trace),
        Err(AccessError::AddressOutOfBounds { address: 0x100000, bound: 0xFFFFF })
    );
    assert_eq!(simulator.result().caches[0].accesses, 0);
    assert_eq!(simulator.hierarchy().address_bound(), Some(0xFFFFF));
    Ok(())
}

#[test]
fn seeded_random_policy_is_reproducible() -> Result<(), Box<dyn Error>> {
    let mut config = LayeredCacheConfig::default();
    for cache in &mut config.caches {
        cache.size_kb = 8;
        cache.replacement_policy = crate::replacement_policies::ReplacementPolicy::Random;
    }
    let trace = random_trace();
    assert_eq!(run(&config, &trace)?, run(&config, &trace)?);
    Ok(())
}

#[test]
fn sweep_builds_a_fresh_hierarchy_per_size() -> Result<(), Box<dyn Error>> {
    let config = LayeredCacheConfig::default();
    let trace = sequential_trace();
    let results = sweep_l1_sizes(&config, &[8, 16, 32], &trace, Some(9))?;
    assert_eq!(results.iter().map(|r| r.l1_size_kb).collect::<Vec<_>>(), vec![8, 16, 32]);
    for sweep in &results {
        // Every run starts cold
        assert_eq!(sweep.result.caches[0].misses, 313);
        assert_eq!(sweep.result.caches[1].misses, 313);
    }

    assert!(matches!(sweep_l1_sizes(&config, &[], &trace, None), Err(SimulatorError::Config(_))));
    assert!(matches!(sweep_l1_sizes(&config, &[0], &trace, None), Err(SimulatorError::Config(_))));
    Ok(())
}

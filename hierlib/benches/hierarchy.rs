use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hierlib::config::LayeredCacheConfig;
use hierlib::replacement_policies::ReplacementPolicy;
use hierlib::simulator::Simulator;
use hierlib::trace::{generate, TracePattern};
use rand::rngs::SmallRng;
use rand::SeedableRng;

/// Replays the default two level hierarchy over both trace shapes, once per L1 policy
pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hierarchy");
    let mut rng = SmallRng::seed_from_u64(0);
    let traces = [
        ("sequential", generate(TracePattern::Sequential { stride: 4 }, 100_000, &mut rng)),
        ("random", generate(TracePattern::Random { bound: 0xFFFFF }, 100_000, &mut rng)),
    ];

    for policy in [ReplacementPolicy::Lru, ReplacementPolicy::Fifo, ReplacementPolicy::Random] {
        let mut config = LayeredCacheConfig::default();
        config.caches[0].replacement_policy = policy;
        for (name, trace) in &traces {
            group.bench_with_input(BenchmarkId::new(policy.to_string(), name), &(&config, trace), |bench, (conf, trace)| {
                bench.iter(|| {
                    // Fresh hierarchy per iteration, otherwise later iterations run warm
                    Simulator::new(conf, Some(1)).unwrap().simulate(trace).unwrap();
                });
            });
        }
    }
}

criterion_group!(
    name = benches;
    config = Criterion::default().significance_level(0.1).sample_size(10);
    targets = criterion_benchmark
);
criterion_main!(benches);

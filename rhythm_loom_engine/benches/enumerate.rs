// Throughput benchmarks for the two producers.
//
// `enumerate_*` walks complete state spaces with an in-memory `Collector`
// host, so the numbers cover odometer, digit expansion, the filter pipeline
// and batching, but no channel traffic. `agglutinate_pool` pairs a pool
// produced by a prior enumeration, which is how the worker is driven in
// practice.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use rhythm_loom_engine::{Collector, agglutinate, enumerate};
use rhythm_loom_protocol::{FilterConfig, OddityType, Radix};

fn hex(numerator: u32, denominator: u32) -> FilterConfig {
    FilterConfig {
        radix: Radix::Hex,
        numerator,
        denominator,
        max_accepted: 0,
        ..FilterConfig::default()
    }
}

fn bench_enumerate(c: &mut Criterion) {
    let mut group = c.benchmark_group("enumerate");
    let cases = [
        ("isomorphic", hex(2, 2)),
        ("exhaustive", FilterConfig::exhaustive()),
        (
            "oddity_entropy",
            FilterConfig {
                oddity_type: OddityType::Rop23,
                only_low_entropy: true,
                ..hex(2, 2)
            },
        ),
    ];
    for (name, config) in &cases {
        let states = config.state_space_size().and_then(|n| u64::try_from(n).ok()).unwrap_or(0);
        group.throughput(Throughput::Elements(states));
        group.bench_with_input(BenchmarkId::from_parameter(name), config, |b, config| {
            b.iter(|| {
                let mut host = Collector::new();
                black_box(enumerate(black_box(config), &mut host))
            })
        });
    }
    group.finish();
}

fn bench_agglutinate(c: &mut Criterion) {
    let config = FilterConfig {
        radix: Radix::Octal,
        ..hex(2, 2)
    };
    let mut seed = Collector::new();
    enumerate(&config, &mut seed);
    let pool: Vec<_> = seed.records().cloned().collect();

    let mut group = c.benchmark_group("agglutinate");
    group.throughput(Throughput::Elements((pool.len() * pool.len()) as u64));
    group.bench_function("agglutinate_pool", |b| {
        b.iter(|| {
            let mut host = Collector::new();
            black_box(agglutinate(black_box(&pool), &config, &mut host))
        })
    });
    group.finish();
}

criterion_group!(benches, bench_enumerate, bench_agglutinate);
criterion_main!(benches);

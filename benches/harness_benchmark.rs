use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tally::{IncrementStrategy, RaceHarness, RunConfiguration};

fn bench_harness(c: &mut Criterion) {
    let mut group = c.benchmark_group("harness_run");
    group.sample_size(20);

    for strategy in [IncrementStrategy::Native, IncrementStrategy::LoadLinked] {
        let config = RunConfiguration::new(4, 10_000)
            .with_race_window(0)
            .with_strategy(strategy);
        group.bench_function(strategy.to_string(), |b| {
            let mut harness = RaceHarness::new();
            b.iter(|| black_box(harness.run::<u32>(&config).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_harness);
criterion_main!(benches);

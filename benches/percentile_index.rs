use criterion::Throughput;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use hashbrown::HashMap;

use fainderql::prelude::{FainderMode, Histogram, PercentileIndex, PercentileIndexConfig};

fn build_histograms(n: usize) -> HashMap<u32, Histogram> {
    (0..n as u32)
        .map(|h| {
            let edges = vec![0.0, 10.0, 100.0, 1_000.0, 10_000.0];
            let counts = vec![10, 20, 30, 25, 15];
            (h, Histogram::from_counts(edges, counts))
        })
        .collect()
}

fn percentile_search(c: &mut Criterion) {
    let mut group = c.benchmark_group("percentile_search");

    for nhist in [100, 10_000, 50_000] {
        group.throughput(Throughput::Elements(1));

        let histograms = build_histograms(nhist);
        let index = PercentileIndex::build(Some(histograms), PercentileIndexConfig::default());

        for mode in [
            FainderMode::LowMemory,
            FainderMode::FullPrecision,
            FainderMode::FullRecall,
            FainderMode::Exact,
        ] {
            group.bench_with_input(
                BenchmarkId::new(format!("{mode:?}"), nhist),
                &nhist,
                |b, _| {
                    b.iter(|| {
                        index
                            .search(0.9, fainderql::prelude::Cmp::Ge, 1_000.0, mode, None)
                            .unwrap()
                    })
                },
            );
        }
    }
    group.finish();
}

criterion_group!(benches, percentile_search);
criterion_main!(benches);

use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ts_audio::{FrequencyClusterer, SpectrumTransformer, ToneSource, TrialAggregator};

fn bench_transform(c: &mut Criterion) {
    let rec = ToneSource::harmonic(220.0, 12).render(10, 48_000);
    let mut fft = SpectrumTransformer::new();
    c.bench_function("transform 10s @ 48kHz", |b| {
        b.iter(|| fft.transform(black_box(&rec)));
    });
}

fn bench_cluster(c: &mut Criterion) {
    let rec = ToneSource::harmonic(220.0, 12).render(10, 48_000);
    let spectrum = SpectrumTransformer::new()
        .transform(&rec)
        .unwrap_or_default();
    let clusterer = FrequencyClusterer::default();
    c.bench_function("cluster 240k bins", |b| {
        b.iter(|| clusterer.cluster(black_box(&spectrum)));
    });
}

fn bench_trial(c: &mut Criterion) {
    let rec = ToneSource::harmonic(330.0, 8).render(2, 48_000);
    let mut fft = SpectrumTransformer::new();
    let clusterer = FrequencyClusterer::default();
    let mut aggregator = TrialAggregator::default();
    c.bench_function("full trial 2s @ 48kHz", |b| {
        b.iter(|| {
            let Ok(spectrum) = fft.transform(black_box(&rec)) else {
                return;
            };
            if let Ok(clusters) = clusterer.cluster(&spectrum) {
                let _ = aggregator.accumulate(&clusters);
            }
        });
    });
}

criterion_group!(benches, bench_transform, bench_cluster, bench_trial);
criterion_main!(benches);

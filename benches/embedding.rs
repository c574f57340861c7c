//! Benchmarks the deterministic hashed-fallback embedder: feature
//! hashing plus L2 normalization over word unigrams, bigrams, and
//! character trigrams (spec §4.5).

#![allow(clippy::unwrap_used)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};

fn sample_text(word_count: usize) -> String {
    (0..word_count)
        .map(|i| format!("token{i}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_embedding(c: &mut Criterion) {
    let embedder = HashedFallbackEmbedder::new();

    let mut group = c.benchmark_group("hashed_fallback_embed");
    for word_count in [10usize, 100, 1_000] {
        let text = sample_text(word_count);
        group.bench_with_input(BenchmarkId::from_parameter(word_count), &text, |b, text| {
            b.iter(|| embedder.embed(black_box(text)).unwrap());
        });
    }
    group.finish();
}

criterion_group!(benches, bench_embedding);
criterion_main!(benches);

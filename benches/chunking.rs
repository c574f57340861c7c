//! Benchmarks the sentence-bounded chunker's hot path: splitting a
//! document's sentences and packing them into token-budgeted chunks
//! (spec §4.4).

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ragstore::chunker::{ChunkOptions, Chunker, SentenceBoundedChunker};

fn sample_document(sentence_count: usize) -> String {
    (0..sentence_count)
        .map(|i| format!("This is sentence number {i} in a synthetic benchmark document."))
        .collect::<Vec<_>>()
        .join(" ")
}

fn bench_chunking(c: &mut Criterion) {
    let chunker = SentenceBoundedChunker::new();
    let options = ChunkOptions::default();

    let mut group = c.benchmark_group("chunk_document");
    for sentence_count in [20usize, 200, 2_000] {
        let document = sample_document(sentence_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(sentence_count),
            &document,
            |b, document| {
                b.iter(|| chunker.chunk(black_box("bench-doc"), black_box(document), options));
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_chunking);
criterion_main!(benches);

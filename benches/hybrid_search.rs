#![allow(clippy::unwrap_used)]

//! Benchmarks `hybridSearch` end-to-end against an in-memory embedded
//! store: vector candidate retrieval, the graph-proximity boost, and
//! extractive summarization (spec §4.7).

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ragstore::chunker::{ChunkOptions, SentenceBoundedChunker};
use ragstore::coordinator::Coordinator;
use ragstore::embedding::{Embedder, HashedFallbackEmbedder};
use ragstore::models::Document;
use ragstore::storage::{NewEntity, StorageAdapter};
use std::sync::Arc;

fn seeded_coordinator(document_count: usize) -> Coordinator {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let embedder: Arc<dyn Embedder> = Arc::new(HashedFallbackEmbedder::new());
    let chunker = Arc::new(SentenceBoundedChunker::new());
    let storage: Arc<dyn StorageAdapter> =
        Arc::new(ragstore::storage::SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
    let coordinator = Coordinator::new(storage, embedder);

    runtime.block_on(async {
        coordinator
            .graph()
            .create_entities(&[
                NewEntity {
                    name: "Machine Learning".into(),
                    entity_type: "CONCEPT".into(),
                    observations: vec!["A branch of artificial intelligence".into()],
                },
                NewEntity {
                    name: "Neural Networks".into(),
                    entity_type: "CONCEPT".into(),
                    observations: vec!["Used to implement machine learning models".into()],
                },
            ])
            .await
            .unwrap();

        for i in 0..document_count {
            let content = format!(
                "Document {i} discusses Machine Learning and how Neural Networks are \
                 trained on large datasets to recognize patterns. Deep architectures \
                 stack many layers to model complex relationships in the input data."
            );
            let document = Document::new(format!("doc{i}"), content, serde_json::Value::Null);
            coordinator
                .store_document(&document, ChunkOptions::default())
                .await
                .unwrap();
        }
    });

    coordinator
}

fn bench_hybrid_search(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let coordinator = seeded_coordinator(50);

    c.bench_function("hybrid_search_50_documents", |b| {
        b.iter(|| {
            runtime.block_on(async {
                coordinator
                    .retrieval()
                    .hybrid_search(black_box("How are neural networks trained?"), 5, true)
                    .await
                    .unwrap()
            })
        });
    });
}

criterion_group!(benches, bench_hybrid_search);
criterion_main!(benches);

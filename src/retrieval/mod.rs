//! Hybrid Search — the Retrieval Engine (spec §4.7).
//!
//! Vector k-NN over the union of document/entity/relationship chunks,
//! fused with an additive graph-proximity boost and a query-conditioned
//! extractive summary. `get_detailed_context` layers `chunk_index ± 1`
//! surrounding-context lookup on top of a chunk's stored fields.

#![allow(clippy::cast_precision_loss)]

use crate::embedding::{cosine_similarity, Embedder};
use crate::graph::GraphStore;
use crate::models::{ChunkKind, DetailedContext, HybridSearchResult, SearchKind};
use crate::storage::StorageAdapter;
use crate::synthesizer::extract_default_terms;
use crate::{Error, Result};
use std::collections::HashSet;
use std::sync::Arc;

/// Default result count for `hybridSearch`.
pub const DEFAULT_LIMIT: usize = 5;

/// How many sentences to pick for the extractive summary, per chunk kind
/// (spec §4.7 step 5: "N=2 for document/entity, 1 for relationship").
const fn summary_sentence_budget(kind: &ChunkKind) -> usize {
    match kind {
        ChunkKind::Relationship { .. } => 1,
        ChunkKind::Document { .. } | ChunkKind::Entity { .. } => 2,
    }
}

const KEYWORD_BUMP_TERMS: &[&str] = &[
    "important",
    "key",
    "main",
    "primary",
    "essential",
    "critical",
    "significant",
];

/// Graph boost constants (spec §4.7 step 4).
mod boost {
    pub const ENTITY_CHUNK: f32 = 0.15;
    pub const RELATIONSHIP_CHUNK: f32 = 0.25;
    pub const QUERY_TERM_MATCH: f32 = 0.30;
    pub const CONNECTED_ENTITY: f32 = 0.15;
}

/// Summarizer bump constants (spec §4.7 step 5).
mod bump {
    pub const ENTITY_MENTION: f32 = 0.10;
    pub const DIGIT: f32 = 0.05;
    pub const KEYWORD: f32 = 0.03;
}

/// The hybrid search engine (spec §4.7).
pub struct RetrievalEngine {
    storage: Arc<dyn StorageAdapter>,
    graph: Arc<GraphStore>,
    embedder: Arc<dyn Embedder>,
}

/// A sentence span within a chunk's text, with its character offset (for
/// document-order re-assembly of the content summary).
struct ScoredSentence {
    text: String,
    order: usize,
    enhanced_similarity: f32,
}

impl RetrievalEngine {
    /// Builds a retrieval engine over the given storage/graph/embedder.
    #[must_use]
    pub const fn new(
        storage: Arc<dyn StorageAdapter>,
        graph: Arc<GraphStore>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self {
            storage,
            graph,
            embedder,
        }
    }

    /// `hybridSearch(query, limit, useGraph)` (spec §4.7).
    ///
    /// Returns an empty list — never an error — on an empty corpus or when
    /// nothing clears the candidate window.
    ///
    /// # Errors
    ///
    /// Returns an error if the query cannot be embedded or the storage
    /// layer is unreachable.
    #[tracing::instrument(skip(self, query), fields(limit, use_graph))]
    pub async fn hybrid_search(
        &self,
        query: &str,
        limit: usize,
        use_graph: bool,
    ) -> Result<Vec<HybridSearchResult>> {
        let limit = if limit == 0 { DEFAULT_LIMIT } else { limit };
        let query_vector = self.embedder.embed(query)?;

        let candidates = self.storage.search_chunks(&query_vector, limit * 3).await?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        let query_terms: HashSet<String> = extract_default_terms(query)
            .into_iter()
            .map(|t| t.to_lowercase())
            .collect();

        // Entity names exactly matching an extracted query term, plus
        // everything one hop away from each of them (spec §4.7 step 3).
        let mut matched_entities: HashSet<String> = HashSet::new();
        let mut connected: HashSet<String> = HashSet::new();
        if use_graph {
            let (all_entities, _) = self.graph.read_graph().await?;
            for entity in &all_entities {
                if query_terms.contains(&entity.name.to_lowercase()) {
                    matched_entities.insert(entity.name.to_lowercase());
                    for neighbor in self.graph.neighbors(&entity.name).await? {
                        connected.insert(neighbor.to_lowercase());
                    }
                }
            }
        }

        let mut results = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let chunk = candidate.chunk;
            let vec_sim = 1.0 / (1.0 + candidate.distance);

            let associated_entities = self.storage.entities_for_chunk(&chunk.chunk_id).await?;
            let entity_names: Vec<String> = associated_entities.iter().map(|e| e.name.clone()).collect();

            let mut graph_boost = 0.0f32;
            if use_graph {
                graph_boost += match &chunk.kind {
                    ChunkKind::Entity { .. } => boost::ENTITY_CHUNK,
                    ChunkKind::Relationship { .. } => boost::RELATIONSHIP_CHUNK,
                    ChunkKind::Document { .. } => 0.0,
                };
                for name in &entity_names {
                    let lower = name.to_lowercase();
                    if matched_entities.contains(&lower) {
                        graph_boost += boost::QUERY_TERM_MATCH;
                    }
                    if connected.contains(&lower) {
                        graph_boost += boost::CONNECTED_ENTITY;
                    }
                }
            }

            let (key_highlight, content_summary, best_sentence_sim) =
                self.summarize(&chunk.text, &chunk.kind, &query_vector, &entity_names)?;

            let relevance_score = vec_sim.max(best_sentence_sim) + graph_boost;
            let document_title = match chunk.kind.document_id() {
                Some(_) => self
                    .storage
                    .chunk_context(&chunk.chunk_id)
                    .await?
                    .and_then(|(_, title)| title)
                    .unwrap_or_else(|| chunk.chunk_id.clone()),
                None => entity_or_relationship_title(&chunk),
            };

            let source_id = match &chunk.kind {
                ChunkKind::Document { document_id, .. } => document_id.clone(),
                ChunkKind::Entity { entity_id } => entity_id.to_string(),
                ChunkKind::Relationship { relationship_id } => relationship_id.to_string(),
            };

            results.push(HybridSearchResult {
                relevance_score,
                key_highlight,
                content_summary,
                chunk_id: chunk.chunk_id,
                document_title,
                entities: entity_names,
                vector_similarity: vec_sim,
                graph_boost: use_graph.then_some(graph_boost),
                full_context_available: chunk.kind.document_id().is_some(),
                chunk_type: chunk.kind.label().to_string(),
                source_id,
            });
        }

        results.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        results.truncate(limit);
        Ok(results)
    }

    /// Splits `text` into boosted, similarity-ranked sentences and picks
    /// the summary (spec §4.7 step 5). Returns `(key_highlight,
    /// content_summary, best_enhanced_similarity)`.
    fn summarize(
        &self,
        text: &str,
        kind: &ChunkKind,
        query_vector: &[f32],
        entity_names: &[String],
    ) -> Result<(String, String, f32)> {
        let raw_sentences = split_sentences(text);
        if raw_sentences.is_empty() {
            let fallback = text.chars().take(200).collect::<String>();
            return Ok((fallback.clone(), fallback, 0.0));
        }

        let mut scored = Vec::with_capacity(raw_sentences.len());
        for (order, sentence) in raw_sentences.iter().enumerate() {
            let vector = self.embedder.embed(sentence)?;
            let mut score = cosine_similarity(query_vector, &vector);

            let lower = sentence.to_lowercase();
            for name in entity_names {
                if lower.contains(&name.to_lowercase()) {
                    score += bump::ENTITY_MENTION;
                }
            }
            if sentence.chars().any(|c| c.is_ascii_digit()) {
                score += bump::DIGIT;
            }
            if KEYWORD_BUMP_TERMS.iter().any(|kw| lower.contains(kw)) {
                score += bump::KEYWORD;
            }

            scored.push(ScoredSentence {
                text: sentence.clone(),
                order,
                enhanced_similarity: score,
            });
        }

        let budget = summary_sentence_budget(kind).min(scored.len());
        let mut ranked: Vec<&ScoredSentence> = scored.iter().collect();
        ranked.sort_by(|a, b| b.enhanced_similarity.total_cmp(&a.enhanced_similarity));

        let mut picked: Vec<&ScoredSentence> = Vec::with_capacity(budget);
        for candidate in ranked {
            if picked.len() >= budget {
                break;
            }
            let adjacent = picked
                .iter()
                .any(|p| p.order.abs_diff(candidate.order) <= 1);
            if adjacent && picked.len() + 1 < budget {
                // Prefer non-adjacent sentences, but never end up with
                // fewer than the budget allows if non-adjacent options run
                // out (handled by the fallback pass below).
                continue;
            }
            picked.push(candidate);
        }
        if picked.is_empty() {
            // All remaining candidates were adjacent to something already
            // picked; take the single best sentence so we never return
            // fewer than one (spec §4.7 step 5).
            if let Some(best) = scored
                .iter()
                .max_by(|a, b| a.enhanced_similarity.total_cmp(&b.enhanced_similarity))
            {
                picked.push(best);
            }
        }

        let best_similarity = picked[0].enhanced_similarity;
        let key_highlight = picked[0].text.clone();

        let mut ordered = picked;
        ordered.sort_by_key(|s| s.order);
        let content_summary = ordered
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" [...] ");

        Ok((key_highlight, content_summary, best_similarity))
    }

    /// `getDetailedContext(chunk_id, includeSurrounding)` (spec §4.7).
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if `chunk_id` does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn get_detailed_context(
        &self,
        chunk_id: &str,
        include_surrounding: bool,
    ) -> Result<DetailedContext> {
        let Some(chunk) = self.storage.get_chunk(chunk_id).await? else {
            return Err(Error::NotFound(format!("chunk {chunk_id}")));
        };
        let document_title = self
            .storage
            .chunk_context(chunk_id)
            .await?
            .and_then(|(_, title)| title);
        let entities = self
            .storage
            .entities_for_chunk(chunk_id)
            .await?
            .into_iter()
            .map(|e| e.name)
            .collect();

        let (before, after) = if include_surrounding {
            match (&chunk.kind).document_id().zip(chunk.kind.chunk_index()) {
                Some((document_id, chunk_index)) => {
                    let (before, after) = self.storage.chunk_neighbors(document_id, chunk_index).await?;
                    (before.map(|c| c.text), after.map(|c| c.text))
                },
                None => (None, None),
            }
        } else {
            (None, None)
        };

        Ok(DetailedContext {
            chunk_id: chunk.chunk_id,
            text: chunk.text,
            chunk_type: chunk.kind.label().to_string(),
            document_title,
            entities,
            before,
            after,
        })
    }
}

fn entity_or_relationship_title(chunk: &crate::models::Chunk) -> String {
    chunk.text.split('.').next().unwrap_or(&chunk.text).trim().to_string()
}

/// Strips a leading list marker (`- `, `* `, `1. `, etc.) from a sentence.
fn strip_list_marker(sentence: &str) -> &str {
    let trimmed = sentence.trim_start();
    let without_bullet = trimmed
        .strip_prefix("- ")
        .or_else(|| trimmed.strip_prefix("* "))
        .unwrap_or(trimmed);
    without_bullet
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .and_then(|(i, c)| {
            if c == '.' || c == ')' {
                without_bullet.get(i + 1..).map(str::trim_start)
            } else {
                None
            }
        })
        .unwrap_or(without_bullet)
}

/// Splits `text` into sentences on `.?!` boundaries, dropping fragments
/// shorter than 10 chars and stripping leading list markers (spec §4.7
/// step 5).
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    for (idx, ch) in text.char_indices() {
        if matches!(ch, '.' | '?' | '!') {
            let end = idx + ch.len_utf8();
            let raw = &text[start..end];
            let stripped = strip_list_marker(raw).trim();
            if stripped.chars().count() >= 10 {
                sentences.push(stripped.to_string());
            }
            start = end;
        }
    }
    let tail = text[start..].trim();
    if tail.chars().count() >= 10 {
        sentences.push(strip_list_marker(tail).trim().to_string());
    }
    sentences
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::{ChunkOptions, SentenceBoundedChunker};
    use crate::embedding::HashedFallbackEmbedder;
    use crate::models::Document;
    use crate::storage::{NewEntity, RelationTriple, SqliteStorage};

    fn make_engine() -> RetrievalEngine {
        let embedder = Arc::new(HashedFallbackEmbedder::new());
        let chunker = Arc::new(SentenceBoundedChunker::new());
        let storage: Arc<dyn StorageAdapter> =
            Arc::new(SqliteStorage::in_memory(chunker, embedder.clone()).unwrap());
        let graph = Arc::new(GraphStore::new(storage.clone(), embedder.clone()));
        RetrievalEngine::new(storage, graph, embedder)
    }

    #[tokio::test]
    async fn empty_corpus_returns_empty_list_not_error() {
        let engine = make_engine();
        let results = engine.hybrid_search("anything", 5, true).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn split_sentences_drops_short_fragments_and_strips_markers() {
        let text = "1. Machine learning is powerful. Hi. - Neural networks learn from data.";
        let sentences = split_sentences(text);
        assert!(sentences.iter().any(|s| s.starts_with("Machine learning")));
        assert!(sentences.iter().any(|s| s.starts_with("Neural networks")));
        assert!(!sentences.iter().any(|s| s == "Hi."));
    }

    #[tokio::test]
    async fn hybrid_search_with_graph_boost_surfaces_ingested_content() {
        let engine = make_engine();
        engine
            .graph
            .create_entities(&[
                NewEntity {
                    name: "Machine Learning".into(),
                    entity_type: "CONCEPT".into(),
                    observations: vec![],
                },
                NewEntity {
                    name: "Neural Networks".into(),
                    entity_type: "CONCEPT".into(),
                    observations: vec![],
                },
                NewEntity {
                    name: "Deep Learning".into(),
                    entity_type: "CONCEPT".into(),
                    observations: vec![],
                },
            ])
            .await
            .unwrap();
        engine
            .graph
            .create_relations(&[
                RelationTriple {
                    from: "Deep Learning".into(),
                    to: "Machine Learning".into(),
                    relation_type: "IS_A".into(),
                },
                RelationTriple {
                    from: "Neural Networks".into(),
                    to: "Machine Learning".into(),
                    relation_type: "PART_OF".into(),
                },
            ])
            .await
            .unwrap();

        let doc1 = Document::new(
            "d1",
            "Machine learning is a powerful approach to artificial intelligence.",
            serde_json::json!({"title": "ML overview"}),
        );
        engine.storage.store_document(&doc1).await.unwrap();
        engine
            .storage
            .chunk_document("d1", ChunkOptions::default())
            .await
            .unwrap();
        engine.storage.embed_chunks("d1").await.unwrap();

        let doc2 = Document::new(
            "d2",
            "Deep learning uses neural networks with multiple layers.",
            serde_json::json!({"title": "DL overview"}),
        );
        engine.storage.store_document(&doc2).await.unwrap();
        engine
            .storage
            .chunk_document("d2", ChunkOptions::default())
            .await
            .unwrap();
        engine.storage.embed_chunks("d2").await.unwrap();

        engine.storage.generate_knowledge_graph_chunks().await.unwrap();
        engine.storage.embed_knowledge_graph_chunks().await.unwrap();

        let results = engine
            .hybrid_search("artificial intelligence machine learning", 5, true)
            .await
            .unwrap();
        assert!(!results.is_empty());

        let relationship_hit = results.iter().find(|r| r.chunk_type == "relationship");
        if let Some(hit) = relationship_hit {
            assert!(hit.graph_boost.unwrap_or(0.0) >= 0.25);
        }
    }

    #[tokio::test]
    async fn get_detailed_context_first_chunk_has_no_before() {
        let engine = make_engine();
        let doc = Document::new(
            "d1",
            "First sentence here. Second sentence follows. Third one ends it.",
            serde_json::json!({"title": "T"}),
        );
        engine.storage.store_document(&doc).await.unwrap();
        engine
            .storage
            .chunk_document("d1", ChunkOptions {
                max_tokens: 5,
                overlap: 1,
            })
            .await
            .unwrap();

        let chunks = engine.storage.get_document_chunks("d1").await.unwrap();
        let first = &chunks[0];
        let context = engine.get_detailed_context(&first.chunk_id, true).await.unwrap();
        assert!(context.before.is_none());
    }

    #[tokio::test]
    async fn get_detailed_context_missing_chunk_is_not_found() {
        let engine = make_engine();
        let err = engine.get_detailed_context("nope", false).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}

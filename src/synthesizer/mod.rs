//! Graph-chunk rendering and the shared term extractor (spec §4.6).
//!
//! Rendering entity/relation text into searchable chunks is done at the
//! storage layer (`generate_knowledge_graph_chunks`, `embed_knowledge_graph_chunks`
//! in [`crate::storage::StorageAdapter`]), mirroring the teacher's habit of
//! keeping row-shaping close to the SQL it feeds. What lives here is the
//! part that's genuinely storage-independent: `extractTerms`'s candidate-term
//! extraction, reused verbatim by the Retrieval Engine's query-term step
//! (spec §4.7 step 3, "same extractor as §4.6 with default options").

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// `extractTerms` options (spec §4.1/§4.6).
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Minimum character length for a candidate term to be kept.
    pub min_length: usize,
    /// Whether to extract `\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b` matches.
    pub include_capitalized: bool,
    /// Additional case-insensitive user patterns.
    pub custom_patterns: Vec<String>,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            min_length: 3,
            include_capitalized: true,
            custom_patterns: Vec::new(),
        }
    }
}

#[allow(clippy::expect_used)]
static CAPITALIZED_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*\b").expect("static regex"));

/// One user-regex failure recorded for the caller to log, not fail on
/// (spec §4.6: "An invalid regex is logged and skipped; it is not fatal").
#[derive(Debug, Clone)]
pub struct InvalidPattern {
    /// The offending pattern source.
    pub pattern: String,
    /// The compilation error message.
    pub error: String,
}

/// Result of [`extract_terms`]: the de-duplicated terms plus any user
/// patterns that failed to compile (for the caller to log).
#[derive(Debug, Clone, Default)]
pub struct ExtractedTerms {
    /// De-duplicated candidate terms, insertion-ordered (spec §4.6:
    /// "sorted or insertion-ordered — implementers pick one and document
    /// it"; this implementation keeps insertion order since the caller
    /// already controls presentation order if it wants sorting).
    pub terms: Vec<String>,
    /// User patterns that failed to compile; logged by the caller, never
    /// fatal to the extraction.
    pub invalid_patterns: Vec<InvalidPattern>,
}

/// Extracts de-duplicated candidate terms from `content` (spec §4.6).
///
/// Used both by `extractTerms` directly and, with default options, by the
/// Retrieval Engine's query-term extraction (spec §4.7 step 3) — the same
/// code path both times, per spec.
#[must_use]
pub fn extract_terms(content: &str, options: &ExtractOptions) -> ExtractedTerms {
    let mut seen = BTreeSet::new();
    let mut terms = Vec::new();
    let mut push = |candidate: &str, seen: &mut BTreeSet<String>, terms: &mut Vec<String>| {
        let candidate = candidate.trim();
        if candidate.chars().count() < options.min_length {
            return;
        }
        if seen.insert(candidate.to_string()) {
            terms.push(candidate.to_string());
        }
    };

    if options.include_capitalized {
        for m in CAPITALIZED_PATTERN.find_iter(content) {
            push(m.as_str(), &mut seen, &mut terms);
        }
    }

    let mut invalid_patterns = Vec::new();
    for pattern in &options.custom_patterns {
        let compiled = Regex::new(&format!("(?i){pattern}"));
        match compiled {
            Ok(re) => {
                for m in re.find_iter(content) {
                    push(m.as_str(), &mut seen, &mut terms);
                }
            },
            Err(e) => {
                tracing::warn!(pattern = %pattern, error = %e, "extractTerms: invalid custom regex, skipping");
                invalid_patterns.push(InvalidPattern {
                    pattern: pattern.clone(),
                    error: e.to_string(),
                });
            },
        }
    }

    ExtractedTerms {
        terms,
        invalid_patterns,
    }
}

/// Extracts terms using [`ExtractOptions::default`] — the exact path the
/// Retrieval Engine reuses for query-term extraction (spec §4.7 step 3).
#[must_use]
pub fn extract_default_terms(content: &str) -> Vec<String> {
    extract_terms(content, &ExtractOptions::default()).terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_capitalized_phrases() {
        let result = extract_terms(
            "Machine Learning is a branch of Artificial Intelligence.",
            &ExtractOptions::default(),
        );
        assert!(result.terms.contains(&"Machine Learning".to_string()));
        assert!(result.terms.contains(&"Artificial Intelligence".to_string()));
    }

    #[test]
    fn respects_min_length() {
        let result = extract_terms(
            "Go is fast. Rust is fast too.",
            &ExtractOptions {
                min_length: 5,
                ..ExtractOptions::default()
            },
        );
        assert!(!result.terms.iter().any(|t| t == "Go"));
    }

    #[test]
    fn deduplicates_repeated_terms() {
        let result = extract_terms(
            "Neural Networks power Neural Networks everywhere.",
            &ExtractOptions::default(),
        );
        assert_eq!(result.terms.iter().filter(|t| *t == "Neural Networks").count(), 1);
    }

    #[test]
    fn custom_pattern_matches_are_included() {
        let result = extract_terms(
            "version 2.5.1 shipped",
            &ExtractOptions {
                include_capitalized: false,
                custom_patterns: vec![r"\d+\.\d+\.\d+".to_string()],
                ..ExtractOptions::default()
            },
        );
        assert_eq!(result.terms, vec!["2.5.1".to_string()]);
    }

    #[test]
    fn invalid_custom_pattern_is_reported_not_fatal() {
        let result = extract_terms(
            "Machine Learning works",
            &ExtractOptions {
                custom_patterns: vec!["[unterminated".to_string()],
                ..ExtractOptions::default()
            },
        );
        assert_eq!(result.invalid_patterns.len(), 1);
        assert!(result.terms.contains(&"Machine Learning".to_string()));
    }

    #[test]
    fn extract_default_terms_matches_default_options_path() {
        let a = extract_default_terms("Deep Learning models");
        let b = extract_terms("Deep Learning models", &ExtractOptions::default()).terms;
        assert_eq!(a, b);
    }
}

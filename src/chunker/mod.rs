//! Text chunker (spec §4.4).
//!
//! Per Open Question (d), this crate picks the **sentence-bounded**
//! algorithm: no external tokenizer dependency is in the teacher's stack,
//! and the spec explicitly permits either implementation as long as
//! positions stay internally consistent. Token count is approximated as
//! `⌈len/4⌉`, exactly as spec.md specifies. `start_pos`/`end_pos` are
//! character offsets into the document.

use crate::models::Chunk;

/// Default maximum tokens per chunk.
pub const DEFAULT_MAX_TOKENS: usize = 200;
/// Default token overlap between consecutive chunks.
pub const DEFAULT_OVERLAP: usize = 20;

/// `chunkDocument` options (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkOptions {
    /// Soft cap on tokens (approximated as `⌈len/4⌉`) per chunk.
    pub max_tokens: usize,
    /// How many trailing tokens of the previous chunk to re-open the next
    /// chunk with.
    pub overlap: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

/// Splits a document's text into ordered, positioned chunks.
pub trait Chunker: Send + Sync {
    /// Splits `content` into 0-based, contiguous chunks for `document_id`,
    /// honoring `options`.
    fn chunk(&self, document_id: &str, content: &str, options: ChunkOptions) -> Vec<Chunk>;
}

/// Approximates a token count as `⌈len/4⌉` (spec §4.4), over characters.
#[must_use]
pub fn approx_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}

/// A sentence span within the source text, boundaries measured in chars.
struct Sentence<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

/// Splits `text` into sentences on `.?!` boundaries, keeping the
/// terminating punctuation attached and recording character offsets.
fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    let mut sentences = Vec::new();
    let mut byte_start = 0usize;
    let mut char_start = 0usize;

    for (char_idx, (byte_idx, ch)) in text.char_indices().enumerate() {
        if matches!(ch, '.' | '?' | '!') {
            let end_byte = byte_idx + ch.len_utf8();
            let char_end = char_idx + 1;
            let slice = &text[byte_start..end_byte];
            if !slice.trim().is_empty() {
                sentences.push(Sentence {
                    text: slice,
                    start: char_start,
                    end: char_end,
                });
            }
            byte_start = end_byte;
            char_start = char_end;
        }
    }

    if byte_start < text.len() {
        let slice = &text[byte_start..];
        if !slice.trim().is_empty() {
            sentences.push(Sentence {
                text: slice,
                start: char_start,
                end: char_start + slice.chars().count(),
            });
        }
    }

    sentences
}

/// Sentence-bounded chunker (Open Question (d)).
///
/// Accumulates sentences until adding the next would exceed `max_tokens`;
/// the next chunk re-opens with the trailing sentences of the previous
/// chunk up to `overlap` tokens.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentenceBoundedChunker;

impl SentenceBoundedChunker {
    /// Creates a new sentence-bounded chunker.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Chunker for SentenceBoundedChunker {
    fn chunk(&self, document_id: &str, content: &str, options: ChunkOptions) -> Vec<Chunk> {
        let sentences = split_sentences(content);
        if sentences.is_empty() {
            if content.trim().is_empty() {
                return Vec::new();
            }
            return vec![Chunk::new_document(
                document_id,
                0,
                content,
                0,
                content.chars().count(),
            )];
        }

        let mut chunks = Vec::new();
        let mut index = 0usize;
        let mut window_start = 0usize;

        while window_start < sentences.len() {
            let mut window_end = window_start;
            let mut tokens = 0usize;

            // Always take at least one sentence, even if it alone exceeds
            // max_tokens, so the chunker always makes forward progress.
            loop {
                let s_tokens = approx_tokens(sentences[window_end].text);
                if window_end > window_start && tokens + s_tokens > options.max_tokens {
                    break;
                }
                tokens += s_tokens;
                window_end += 1;
                if window_end >= sentences.len() {
                    break;
                }
                if tokens >= options.max_tokens {
                    break;
                }
            }

            let first = &sentences[window_start];
            let last = &sentences[window_end - 1];
            let text = content[byte_range(content, first.start, last.end)].to_string();

            chunks.push(Chunk::new_document(
                document_id,
                index,
                text,
                first.start,
                last.end,
            ));
            index += 1;

            if window_end >= sentences.len() {
                break;
            }

            // Back up into the current window to build the overlap, up to
            // `overlap` tokens worth of trailing sentences.
            let mut overlap_tokens = 0usize;
            let mut next_start = window_end;
            while next_start > window_start {
                let candidate_tokens = approx_tokens(sentences[next_start - 1].text);
                if overlap_tokens + candidate_tokens > options.overlap && overlap_tokens > 0 {
                    break;
                }
                overlap_tokens += candidate_tokens;
                next_start -= 1;
            }
            window_start = next_start.max(window_start + 1).min(window_end);
        }

        chunks
    }
}

fn byte_range(text: &str, char_start: usize, char_end: usize) -> std::ops::Range<usize> {
    let byte_start = text
        .char_indices()
        .nth(char_start)
        .map_or(text.len(), |(b, _)| b);
    let byte_end = text
        .char_indices()
        .nth(char_end)
        .map_or(text.len(), |(b, _)| b);
    byte_start..byte_end
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_are_contiguous_and_zero_indexed() {
        let chunker = SentenceBoundedChunker::new();
        let text = "Machine learning is powerful. It powers many apps. \
                     Neural networks learn from data. Deep learning uses many layers. \
                     Training requires large datasets. Models generalize to new inputs.";
        let chunks = chunker.chunk("doc1", text, ChunkOptions { max_tokens: 20, overlap: 5 });
        assert!(chunks.len() >= 2);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.kind.chunk_index(), Some(i));
        }
    }

    #[test]
    fn positions_are_half_open_and_increasing() {
        let chunker = SentenceBoundedChunker::new();
        let text = "First sentence here. Second sentence follows. Third one ends it.";
        let chunks = chunker.chunk("doc1", text, ChunkOptions { max_tokens: 10, overlap: 2 });
        for c in &chunks {
            assert!(c.start_pos < c.end_pos);
            assert!(c.end_pos <= text.chars().count());
        }
    }

    #[test]
    fn empty_document_yields_no_chunks() {
        let chunker = SentenceBoundedChunker::new();
        let chunks = chunker.chunk("doc1", "   ", ChunkOptions::default());
        assert!(chunks.is_empty());
    }

    #[test]
    fn chunking_is_deterministic() {
        let chunker = SentenceBoundedChunker::new();
        let text = "A. B. C. D. E. F. G. H.";
        let first = chunker.chunk("doc1", text, ChunkOptions::default());
        let second = chunker.chunk("doc1", text, ChunkOptions::default());
        assert_eq!(first, second);
    }

    #[test]
    fn approx_tokens_matches_spec_formula() {
        assert_eq!(approx_tokens("abcd"), 1);
        assert_eq!(approx_tokens("abcde"), 2);
        assert_eq!(approx_tokens(""), 0);
    }
}

//! Two-pass fitting of boundary-tagged segments into a target token range.
//!
//! Pass one (expand) splits any segment that exceeds `max_tokens`; pass two
//! (merge) fuses consecutive undersize segments, never crossing a chapter
//! boundary.

use crate::core::chunk::Chunk;

use super::models::{BoundaryType, ChunkConfig, TextSegment};
use super::token_estimator::TokenEstimator;

/// Fits segments from the boundary detector into `config`'s token range and
/// assigns them book-local indices.
pub struct ChunkNormalizer<'a> {
    estimator: &'a dyn TokenEstimator,
    config: ChunkConfig,
}

impl<'a> ChunkNormalizer<'a> {
    /// Creates a normalizer for the given token budget.
    #[must_use]
    pub const fn new(estimator: &'a dyn TokenEstimator, config: ChunkConfig) -> Self {
        Self { estimator, config }
    }

    /// Runs both passes over `segments` and assigns chunk indices starting
    /// from `start_index`.
    #[must_use]
    pub fn normalize(&self, segments: Vec<TextSegment>, start_index: usize) -> Vec<Chunk> {
        let expanded = self.expand_large_segments(segments);
        let merged = self.merge_small_segments(expanded);
        self.to_chunks(merged, start_index)
    }

    fn expand_large_segments(&self, segments: Vec<TextSegment>) -> Vec<TextSegment> {
        let mut out = Vec::with_capacity(segments.len());
        for seg in segments {
            if seg.estimated_tokens <= self.config.max_tokens {
                out.push(seg);
                continue;
            }
            out.extend(self.split_segment(&seg));
        }
        out
    }

    fn split_segment(&self, seg: &TextSegment) -> Vec<TextSegment> {
        let paragraphs: Vec<&str> = seg.text.split("\n\n").filter(|p| !p.trim().is_empty()).collect();
        if paragraphs.len() <= 1 {
            return self.split_by_sentences(seg);
        }

        let mut result = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;
        for para in paragraphs {
            let para_tokens = self.estimator.estimate(para);
            if para_tokens > self.config.max_tokens {
                if !current.is_empty() {
                    result.push(self.make_subsegment(&current, seg));
                    current.clear();
                    current_tokens = 0;
                }
                let oversized = TextSegment {
                    text: para.to_string(),
                    boundary_type: BoundaryType::Paragraph,
                    source_section: seg.source_section,
                    original_position: seg.original_position,
                    estimated_tokens: para_tokens,
                };
                result.extend(self.split_by_sentences(&oversized));
                continue;
            }
            if current_tokens + para_tokens > self.config.max_tokens && !current.is_empty() {
                result.push(self.make_subsegment(&current, seg));
                current.clear();
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(para);
            current_tokens += para_tokens;
        }
        if !current.is_empty() {
            result.push(self.make_subsegment(&current, seg));
        }
        result
    }

    fn split_by_sentences(&self, seg: &TextSegment) -> Vec<TextSegment> {
        let sentences = split_sentences(&seg.text);
        if sentences.len() <= 1 {
            return vec![TextSegment {
                boundary_type: BoundaryType::Paragraph,
                ..seg.clone_with_text(seg.text.clone())
            }];
        }

        let mut result = Vec::new();
        let mut current = String::new();
        let mut current_tokens = 0usize;
        for sentence in sentences {
            let sentence_tokens = self.estimator.estimate(sentence);
            if current_tokens + sentence_tokens > self.config.max_tokens && !current.is_empty() {
                result.push(self.make_subsegment(&current, seg));
                current.clear();
                current_tokens = 0;
            }
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(sentence);
            current_tokens += sentence_tokens;
        }
        if !current.is_empty() {
            result.push(self.make_subsegment(&current, seg));
        }
        result
    }

    fn make_subsegment(&self, text: &str, parent: &TextSegment) -> TextSegment {
        let trimmed = text.trim().to_string();
        let estimated_tokens = self.estimator.estimate(&trimmed);
        TextSegment {
            text: trimmed,
            boundary_type: BoundaryType::Paragraph,
            source_section: parent.source_section,
            original_position: parent.original_position,
            estimated_tokens,
        }
    }

    /// Chapters are sacred boundaries: a merge never reaches across one.
    fn merge_small_segments(&self, segments: Vec<TextSegment>) -> Vec<TextSegment> {
        let mut merged: Vec<TextSegment> = Vec::with_capacity(segments.len());
        for seg in segments {
            if let Some(prev) = merged.last() {
                let combined = prev.estimated_tokens + seg.estimated_tokens;
                let can_merge = prev.estimated_tokens < self.config.min_tokens
                    && combined <= self.config.max_tokens
                    && prev.boundary_type != BoundaryType::Chapter
                    && seg.boundary_type != BoundaryType::Chapter;
                if can_merge {
                    let prev = merged.pop().expect("checked via last()");
                    let mut text = prev.text;
                    text.push_str("\n\n");
                    text.push_str(&seg.text);
                    merged.push(TextSegment {
                        text,
                        boundary_type: prev.boundary_type,
                        source_section: prev.source_section,
                        original_position: prev.original_position,
                        estimated_tokens: combined,
                    });
                    continue;
                }
            }
            merged.push(seg);
        }
        merged
    }

    fn to_chunks(&self, segments: Vec<TextSegment>, start_index: usize) -> Vec<Chunk> {
        segments
            .into_iter()
            .enumerate()
            .map(|(i, seg)| {
                Chunk::new(
                    start_index + i,
                    seg.text,
                    seg.source_section,
                    seg.estimated_tokens,
                )
            })
            .collect()
    }
}

/// Splits text into sentences on `.`/`!`/`?` followed by whitespace or
/// end of input. A heuristic, not a proper sentence boundary detector —
/// good enough for deciding where a too-long segment can be cut.
fn split_sentences(s: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;

    let bytes = s.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        let c = bytes[i];
        if matches!(c, b'.' | b'!' | b'?') && (i + 1 >= bytes.len() || bytes[i + 1].is_ascii_whitespace()) {
            let end = i + 1;
            if end > start {
                sentences.push(&s[start..end]);
            }
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            start = i;
            continue;
        }
        i += 1;
    }

    if start < s.len() {
        sentences.push(&s[start..]);
    }

    sentences
}

impl TextSegment {
    fn clone_with_text(&self, text: String) -> Self {
        Self {
            text,
            boundary_type: self.boundary_type,
            source_section: self.source_section,
            original_position: self.original_position,
            estimated_tokens: self.estimated_tokens,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::detector::BoundaryDetector;
    use crate::chunking::token_estimator::SimpleTokenEstimator;

    fn run(text: &str, config: ChunkConfig) -> Vec<Chunk> {
        let est = SimpleTokenEstimator;
        let segments = BoundaryDetector::new(&est).detect(text, 0);
        ChunkNormalizer::new(&est, config).normalize(segments, 0)
    }

    #[test]
    fn never_crosses_chapter_boundary_when_merging() {
        let small_cfg = ChunkConfig {
            min_tokens: 1000,
            max_tokens: 5000,
            target_tokens: 2000,
        };
        let text = "Capítulo 1\n\nTexto corto.\n\nCapítulo 2\n\nOtro texto corto.\n";
        let chunks = run(text, small_cfg);
        // Each chapter heading must start its own chunk; they cannot be fused
        // together even though both are well under min_tokens.
        assert!(chunks.iter().any(|c| c.original.contains("Capítulo 1")));
        assert!(chunks.iter().any(|c| c.original.contains("Capítulo 2")));
        assert!(
            !chunks
                .iter()
                .any(|c| c.original.contains("Capítulo 1") && c.original.contains("Capítulo 2"))
        );
    }

    #[test]
    fn preserves_word_multiset() {
        let text = "Capítulo 1\n\n".to_string()
            + &"Oración cualquiera de relleno. ".repeat(15)
            + "\n\n"
            + &"***\n\n"
            + &"Final cortito. ".repeat(5);
        let cfg = ChunkConfig {
            min_tokens: 10,
            max_tokens: 40,
            target_tokens: 25,
        };
        let chunks = run(&text, cfg);
        let mut original_words: Vec<&str> = text.split_whitespace().collect();
        let mut chunk_words: Vec<&str> = chunks
            .iter()
            .flat_map(|c| c.original.split_whitespace())
            .collect();
        original_words.sort_unstable();
        chunk_words.sort_unstable();
        assert_eq!(original_words, chunk_words);
    }

    #[test]
    fn assigns_sequential_indices() {
        let text = "Uno. Dos. Tres.\n\nCuatro. Cinco.\n";
        let chunks = run(text, ChunkConfig::standard());
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
    }

    #[test]
    fn split_sentences_splits_on_terminal_punctuation() {
        let text = "Hello world. How are you? I am fine!";
        let sentences = split_sentences(text);
        assert_eq!(sentences, vec!["Hello world.", "How are you?", "I am fine!"]);
    }

    #[test]
    fn split_sentences_keeps_trailing_fragment_without_punctuation() {
        let text = "First sentence. Second part";
        let sentences = split_sentences(text);
        assert_eq!(sentences, vec!["First sentence.", "Second part"]);
    }

    #[test]
    fn oversize_single_sentence_emitted_alone() {
        let huge_sentence = format!("{}.", "palabra ".repeat(5000));
        let cfg = ChunkConfig {
            min_tokens: 10,
            max_tokens: 50,
            target_tokens: 25,
        };
        let chunks = run(&huge_sentence, cfg);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].token_estimated > cfg.max_tokens);
    }
}

//! Two-pass semantic chunking: boundary detection, then fit-to-budget
//! normalization into book-local [`crate::core::Chunk`]s.
//!
//! - [`BoundaryDetector`] walks a source section line by line, tagging
//!   chapter/scene/POV/paragraph/sentence boundaries.
//! - [`ChunkNormalizer`] expands oversize segments and merges undersize
//!   ones (never across a chapter boundary), then assigns sequential
//!   book-local indices.
//! - [`chunk_sections`] runs both passes across every source section in
//!   order, keeping indices contiguous across section boundaries.

pub mod detector;
pub mod models;
pub mod normalizer;
pub mod token_estimator;

pub use detector::BoundaryDetector;
pub use models::{BoundaryType, ChunkConfig, TextSegment};
pub use normalizer::ChunkNormalizer;
pub use token_estimator::{SimpleTokenEstimator, TokenEstimator};

use crate::core::Chunk;

/// Chunks every section in `sections` in order, producing a single
/// sequentially-indexed `Vec<Chunk>` for the whole book.
#[must_use]
pub fn chunk_sections(sections: &[String], config: ChunkConfig, estimator: &dyn TokenEstimator) -> Vec<Chunk> {
    let detector = BoundaryDetector::new(estimator);
    let normalizer = ChunkNormalizer::new(estimator, config);
    let mut chunks = Vec::new();
    for (section_index, text) in sections.iter().enumerate() {
        let segments = detector.detect(text, section_index);
        let section_chunks = normalizer.normalize(segments, chunks.len());
        chunks.extend(section_chunks);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prop_assert_eq;

    #[test]
    fn chunk_sections_keeps_indices_contiguous_across_sections() {
        let sections = vec![
            "Capítulo 1\n\nTexto primero.\n".to_string(),
            "Capítulo 2\n\nTexto segundo.\n".to_string(),
        ];
        let est = SimpleTokenEstimator;
        let chunks = chunk_sections(&sections, ChunkConfig::standard(), &est);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
        }
        assert!(chunks.iter().any(|c| c.source_section == 0));
        assert!(chunks.iter().any(|c| c.source_section == 1));
    }

    #[test]
    fn chunk_sections_empty_input_yields_no_chunks() {
        let est = SimpleTokenEstimator;
        let chunks = chunk_sections(&[], ChunkConfig::standard(), &est);
        assert!(chunks.is_empty());
    }

    proptest::proptest! {
        /// Chunking never drops or duplicates a word: the multiset of
        /// whitespace-separated tokens across every chunk equals the
        /// multiset of the input section.
        #[test]
        fn chunking_preserves_the_word_multiset(words in proptest::collection::vec("[a-zA-Z]{1,12}", 1..200)) {
            let text = words.join(" ");
            let est = SimpleTokenEstimator;
            let chunks = chunk_sections(&[text.clone()], ChunkConfig::standard(), &est);

            let mut expected: Vec<&str> = text.split_whitespace().collect();
            let mut actual: Vec<&str> = chunks.iter().flat_map(|c| c.original.split_whitespace()).collect();
            expected.sort_unstable();
            actual.sort_unstable();
            prop_assert_eq!(expected, actual);
        }
    }
}

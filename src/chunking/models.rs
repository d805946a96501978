//! Shared data types for the chunking pipeline.
//!
//! These are pure value types with no I/O; the boundary detector and
//! normalizer build and consume them.

use serde::{Deserialize, Serialize};

/// Semantic category assigned to a detected boundary.
///
/// Ordered roughly by how strong a separator each boundary represents;
/// chapters are the only kind the normalizer refuses to merge across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BoundaryType {
    /// A chapter heading ("Capítulo 3", "Chapter III", markdown `#`/`##`, ...).
    Chapter,
    /// A scene break within a chapter (`***`, `---`, a lone em-dash, ...).
    Scene,
    /// A point-of-view marker (`*Name*` or an ALL-CAPS single-word line).
    Pov,
    /// An ordinary paragraph break.
    Paragraph,
    /// A sentence-level split, used only when a segment must be split finer
    /// than paragraphs to fit the token budget.
    Sentence,
}

/// A contiguous run of text produced by the boundary detector, before the
/// normalizer has packed it into the target token range.
#[derive(Debug, Clone)]
pub struct TextSegment {
    /// The segment's text, trailing whitespace stripped.
    pub text: String,
    /// The boundary type that opened this segment.
    pub boundary_type: BoundaryType,
    /// Index of the source section (chapter file, EPUB spine item, ...) this
    /// segment came from.
    pub source_section: usize,
    /// Byte offset of the segment's first character within its source section.
    pub original_position: usize,
    /// Estimated token count, filled in by the token estimator.
    pub estimated_tokens: usize,
}

/// Token-budget configuration for the normalizer.
///
/// Use [`ChunkConfig::standard`], [`ChunkConfig::large`], or
/// [`ChunkConfig::xlarge`] for the closed set of presets the CLI exposes;
/// construct directly only in tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Segments below this token count are candidates for merging with a
    /// neighbor.
    pub min_tokens: usize,
    /// Segments above this token count are split.
    pub max_tokens: usize,
    /// Aspirational size; currently informational only (the expand/merge
    /// passes are driven purely by min/max).
    pub target_tokens: usize,
}

impl ChunkConfig {
    /// Standard preset: 800/2000/1400 tokens.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            min_tokens: 800,
            max_tokens: 2000,
            target_tokens: 1400,
        }
    }

    /// Large preset: 1200/3500/2500 tokens.
    #[must_use]
    pub const fn large() -> Self {
        Self {
            min_tokens: 1200,
            max_tokens: 3500,
            target_tokens: 2500,
        }
    }

    /// Extra-large preset: 2000/5000/3500 tokens.
    #[must_use]
    pub const fn xlarge() -> Self {
        Self {
            min_tokens: 2000,
            max_tokens: 5000,
            target_tokens: 3500,
        }
    }

    /// Resolves a preset by its CLI name.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::ChunkingError::UnknownStrategy`] for any name
    /// outside the closed set `{standard, large, xlarge}`.
    pub fn from_preset_name(name: &str) -> crate::error::Result<Self> {
        match name.to_lowercase().as_str() {
            "standard" => Ok(Self::standard()),
            "large" => Ok(Self::large()),
            "xlarge" => Ok(Self::xlarge()),
            other => Err(crate::error::ChunkingError::UnknownStrategy {
                name: other.to_string(),
            }
            .into()),
        }
    }
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_are_internally_consistent() {
        for cfg in [
            ChunkConfig::standard(),
            ChunkConfig::large(),
            ChunkConfig::xlarge(),
        ] {
            assert!(cfg.min_tokens < cfg.target_tokens);
            assert!(cfg.target_tokens < cfg.max_tokens);
        }
    }

    #[test]
    fn from_preset_name_is_case_insensitive() {
        assert_eq!(
            ChunkConfig::from_preset_name("LARGE").unwrap(),
            ChunkConfig::large()
        );
    }

    #[test]
    fn from_preset_name_rejects_unknown() {
        assert!(ChunkConfig::from_preset_name("huge").is_err());
    }
}

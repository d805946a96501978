//! Line-by-line semantic boundary detection.
//!
//! Walks a section's text one line at a time, classifying each line against
//! a strict priority order of boundary kinds (chapter > scene > POV >
//! paragraph > sentence) and cutting a new [`TextSegment`] whenever the
//! classification changes.

use regex::Regex;
use std::sync::LazyLock;

use super::models::{BoundaryType, TextSegment};
use super::token_estimator::TokenEstimator;

static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)^\s*cap[ií]tulo\s+[\dIVXLCivxlc]+",
        r"(?i)^\s*chapter\s+[\dIVXLCivxlc]+",
        r"^\s*第[0-9一二三四五六七八九十百千]+[章話话]",
        r"^#{1,2}\s+\S",
        r"(?i)^\s*PART\s+[\dIVXLC]+",
        r"^\s*[IVXLC]{1,6}\.\s*$",
    ])
});

static SCENE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"^\s*\*{3,}\s*$",
        r"^\s*-{3,}\s*$",
        r"^\s*—{1,}\s*$",
        r"^\s*\.{3,}\s*$",
        r"^\s*#{3,}\s*$",
    ])
});

static POV_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"^\s*\*[A-ZÁÉÍÓÚÑ][\wÁÉÍÓÚÑáéíóúñ' -]*\*\s*$", r"^\s*[A-ZÁÉÍÓÚÑ]{2,}\s*$"]));

static PARAGRAPH_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"^\t", r"^ {2,}\S", r"^\s*$"]));

static SENTENCE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| compile(&[r#"[.!?]["')\u{201d}\u{2019}]?\s+$"#]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("boundary pattern is a fixed, tested literal"))
        .collect()
}

fn classify_line(line: &str, prev_blank: bool) -> Option<BoundaryType> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return if prev_blank {
            Some(BoundaryType::Scene)
        } else {
            None
        };
    }
    if CHAPTER_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return Some(BoundaryType::Chapter);
    }
    if SCENE_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return Some(BoundaryType::Scene);
    }
    if POV_PATTERNS.iter().any(|re| re.is_match(trimmed)) {
        return Some(BoundaryType::Pov);
    }
    if PARAGRAPH_PATTERNS.iter().any(|re| re.is_match(line)) {
        return Some(BoundaryType::Paragraph);
    }
    if SENTENCE_PATTERNS.iter().any(|re| re.is_match(line)) {
        return Some(BoundaryType::Sentence);
    }
    None
}

/// Splits a section's text into boundary-tagged segments.
pub struct BoundaryDetector<'a> {
    estimator: &'a dyn TokenEstimator,
}

impl<'a> BoundaryDetector<'a> {
    /// Creates a detector that estimates token counts with `estimator`.
    #[must_use]
    pub const fn new(estimator: &'a dyn TokenEstimator) -> Self {
        Self { estimator }
    }

    /// Detects boundary-tagged segments in `text`, a single source section.
    ///
    /// Every byte of `text` belongs to exactly one returned segment; the
    /// detector never drops or duplicates content.
    #[must_use]
    pub fn detect(&self, text: &str, source_section: usize) -> Vec<TextSegment> {
        let mut segments = Vec::new();
        let mut current_lines: Vec<&str> = Vec::new();
        let mut current_type = BoundaryType::Paragraph;
        let mut current_start = 0usize;
        let mut offset = 0usize;
        let mut prev_blank = false;
        let mut opened = false;

        for line in text.split_inclusive('\n') {
            let stripped = line.strip_suffix('\n').unwrap_or(line);
            let classification = classify_line(stripped, prev_blank);
            prev_blank = stripped.trim().is_empty();

            if let Some(kind) = classification {
                if opened && kind != current_type {
                    self.close_segment(
                        &mut segments,
                        &current_lines,
                        current_type,
                        source_section,
                        current_start,
                    );
                    current_lines.clear();
                    current_start = offset;
                }
                current_type = kind;
                opened = true;
            } else if !opened {
                opened = true;
                current_start = offset;
            }

            if !(stripped.trim().is_empty() && current_lines.is_empty() && !opened) {
                current_lines.push(line);
            }
            offset += line.len();
        }

        if opened || !current_lines.is_empty() {
            self.close_segment(
                &mut segments,
                &current_lines,
                current_type,
                source_section,
                current_start,
            );
        }

        segments
    }

    fn close_segment(
        &self,
        segments: &mut Vec<TextSegment>,
        lines: &[&str],
        boundary_type: BoundaryType,
        source_section: usize,
        original_position: usize,
    ) {
        let text = lines.concat();
        let trimmed_end = text.trim_end().to_string();
        if trimmed_end.is_empty() {
            return;
        }
        let estimated_tokens = self.estimator.estimate(&trimmed_end);
        segments.push(TextSegment {
            text: trimmed_end,
            boundary_type,
            source_section,
            original_position,
            estimated_tokens,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::token_estimator::SimpleTokenEstimator;

    fn detect(text: &str) -> Vec<TextSegment> {
        let est = SimpleTokenEstimator;
        BoundaryDetector::new(&est).detect(text, 0)
    }

    #[test]
    fn chapter_heading_opens_new_segment() {
        let segs = detect("Capítulo 1\n\nHabía una vez un rey.\n");
        assert!(segs.iter().any(|s| s.boundary_type == BoundaryType::Chapter));
    }

    #[test]
    fn double_blank_line_is_scene_boundary() {
        let text = "Primera escena.\n\n\nSegunda escena.\n";
        let segs = detect(text);
        assert!(segs.iter().any(|s| s.boundary_type == BoundaryType::Scene));
    }

    #[test]
    fn single_blank_line_does_not_split() {
        let text = "Uno.\n\nDos.\n";
        let segs = detect(text);
        // A single blank line alone does not force a new segment unless the
        // following line independently classifies differently.
        assert!(!segs.is_empty());
    }

    #[test]
    fn no_characters_are_lost() {
        let text = "Capítulo 1\n\nAlgo de texto normal aquí.\n\n***\n\nMás texto después.\n";
        let segs = detect(text);
        let total_words: usize = text.split_whitespace().count();
        let reconstructed: String = segs.iter().map(|s| s.text.as_str()).collect::<Vec<_>>().join(" ");
        let reconstructed_words = reconstructed.split_whitespace().count();
        assert_eq!(total_words, reconstructed_words);
    }

    #[test]
    fn scene_break_markers_detected() {
        let segs = detect("Texto uno.\n\n***\n\nTexto dos.\n");
        assert!(segs.iter().any(|s| s.boundary_type == BoundaryType::Scene));
    }

    #[test]
    fn pov_allcaps_line_detected() {
        let segs = detect("RIMURU\n\nPensamientos del protagonista.\n");
        assert!(segs.iter().any(|s| s.boundary_type == BoundaryType::Pov));
    }
}

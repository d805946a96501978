//! Projects a [`BookBible`] down to the subset relevant to one chunk.
//!
//! In books with large casts this can cut the bible's contribution to a
//! prompt by a large margin without losing anything the current fragment
//! actually needs.

use crate::core::bible::BookBible;

const MAX_DECISIONS_IN_PROMPT: usize = 8;
const MAX_LAST_SCENE_IN_PROMPT: usize = 320;

/// Produces per-chunk projections of a bible. Never mutates the bible it is
/// given; always returns a fresh, smaller copy.
#[derive(Debug, Clone, Copy, Default)]
pub struct BibleCompressor;

impl BibleCompressor {
    /// Filters glossary and character entries to those mentioned in
    /// `chunk_text`; truncates decisions and the last-scene digest to a
    /// prompt-sized budget regardless of mentions.
    #[must_use]
    pub fn compress(&self, bible: &BookBible, chunk_text: &str) -> BookBible {
        let chunk_lower = chunk_text.to_lowercase();

        let glossary = bible
            .glossary
            .iter()
            .filter(|(term, _)| chunk_lower.contains(&term.to_lowercase()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let characters = bible
            .characters
            .iter()
            .filter(|(name, _)| chunk_lower.contains(&name.to_lowercase()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        BookBible {
            voice: bible.voice.clone(),
            decisions: select_recent_decisions(&bible.decisions),
            glossary,
            characters,
            last_scene: truncate_scene(&bible.last_scene),
            version: bible.version,
        }
    }

    /// Fraction of glossary+character entries the compression retained; 1.0
    /// when there was nothing to compress.
    #[must_use]
    pub fn compression_ratio(&self, original: &BookBible, compressed: &BookBible) -> f64 {
        let original_entries = original.glossary.len() + original.characters.len();
        let compressed_entries = compressed.glossary.len() + compressed.characters.len();
        if original_entries == 0 {
            return 1.0;
        }
        #[allow(clippy::cast_precision_loss)]
        let ratio = compressed_entries as f64 / original_entries as f64;
        ratio
    }
}

fn select_recent_decisions(decisions: &[String]) -> Vec<String> {
    if decisions.len() <= MAX_DECISIONS_IN_PROMPT {
        return decisions.to_vec();
    }
    decisions[decisions.len() - MAX_DECISIONS_IN_PROMPT..].to_vec()
}

fn truncate_scene(scene: &str) -> String {
    let clean = scene.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.chars().count() <= MAX_LAST_SCENE_IN_PROMPT {
        return clean;
    }
    let mut truncated: String = clean.chars().take(MAX_LAST_SCENE_IN_PROMPT - 1).collect();
    while truncated.ends_with(' ') {
        truncated.pop();
    }
    truncated.push('…');
    truncated
}

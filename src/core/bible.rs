//! The book bible: per-book editorial memory, append-merged across chunks.
//!
//! A bible never loses information once written (glossary terms, confirmed
//! characters) except where an invariant explicitly allows an overwrite
//! (placeholder character descriptions, the default voice).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::BibleError;

/// Sentinel description assigned to a character detected heuristically but
/// not yet confirmed or enriched by the extractor.
pub const PLACEHOLDER_DESCRIPTION: &str = "mentioned-in-scene";

/// Default narrative voice, overwritable until something else sets it.
pub const DEFAULT_VOICE: &str = "third-person past";

const MAX_GLOSSARY: usize = 600;
const MAX_CHARACTERS: usize = 240;
const MAX_DECISIONS: usize = 18;
const MAX_DECISION_LEN: usize = 220;
const MAX_LAST_SCENE_LEN: usize = 420;
const DECISION_SIMILARITY_THRESHOLD: f64 = 0.84;

/// Per-book editorial memory, versioned immutably: every `apply` that
/// changes anything should be persisted as a new version, never mutated
/// in place in storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookBible {
    /// Narrative voice, e.g. "third-person past" or "first-person present".
    pub voice: String,
    /// Ordered, most-recent-last list of style/terminology decisions.
    pub decisions: Vec<String>,
    /// Source-term to target-term mapping.
    pub glossary: BTreeMap<String, String>,
    /// Proper-name to description mapping.
    pub characters: BTreeMap<String, String>,
    /// Short prose digest of the most recently processed fragment.
    pub last_scene: String,
    /// Monotonically increasing version number, starting at 1.
    pub version: u32,
}

impl Default for BookBible {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            decisions: Vec::new(),
            glossary: BTreeMap::new(),
            characters: BTreeMap::new(),
            last_scene: String::new(),
            version: 1,
        }
    }
}

/// Delta produced by processing one chunk, from either the local detector
/// or the AI extractor (see [`BibleUpdate::merge`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BibleUpdate {
    /// New narrative voice, if the source inferred or confirmed one.
    pub voice: Option<String>,
    /// Source-term to target-term additions.
    pub glossary: BTreeMap<String, String>,
    /// Proper-name to description additions or corrections.
    pub characters: BTreeMap<String, String>,
    /// Newly observed style/terminology decisions.
    pub decisions: Vec<String>,
    /// Updated last-scene digest, if this source produced one.
    pub last_scene: Option<String>,
    /// Names the source confirmed are not characters; removed on apply.
    pub rejected: Vec<String>,
}

impl BibleUpdate {
    /// Combines a local heuristic update with an AI-extracted update,
    /// extracted taking precedence on conflicts.
    ///
    /// Decisions are concatenated local-first then de-duplicated by exact
    /// string equality, preserving order; voice and last_scene prefer
    /// extracted, falling back to local.
    #[must_use]
    pub fn merge(local: Self, extracted: Self) -> Self {
        let mut glossary = local.glossary;
        glossary.extend(extracted.glossary);

        let mut characters = local.characters;
        characters.extend(extracted.characters);
        for rejected_name in &extracted.rejected {
            characters.remove(rejected_name);
        }

        let mut decisions = local.decisions;
        decisions.extend(extracted.decisions);
        let mut seen = std::collections::HashSet::new();
        decisions.retain(|d| seen.insert(d.clone()));

        Self {
            voice: extracted.voice.or(local.voice),
            glossary,
            characters,
            decisions,
            last_scene: extracted.last_scene.or(local.last_scene),
            rejected: extracted.rejected,
        }
    }
}

/// A character name is valid for bible insertion iff it is 2-80 characters,
/// drawn from letters/apostrophe/hyphen/space, has at least one token
/// starting with an uppercase letter, and is not a single bare stopword.
#[must_use]
pub fn is_valid_character_name(name: &str) -> bool {
    let len = name.chars().count();
    if !(2..=80).contains(&len) {
        return false;
    }
    let allowed = name
        .chars()
        .all(|c| c.is_alphabetic() || c == '\'' || c == '-' || c == ' ');
    if !allowed {
        return false;
    }
    let has_uppercase_token = name
        .split_whitespace()
        .any(|tok| tok.chars().next().is_some_and(char::is_uppercase));
    if !has_uppercase_token {
        return false;
    }
    const STOPWORDS: &[&str] = &["the", "el", "la", "los", "las", "de", "un", "una", "and", "y"];
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.len() == 1 && STOPWORDS.contains(&tokens[0].to_lowercase().as_str()) {
        return false;
    }
    true
}

impl BookBible {
    /// Applies an update in place, enforcing every merge invariant.
    ///
    /// # Errors
    ///
    /// Never currently fails; returns `Result` to leave room for future
    /// validation without breaking callers.
    pub fn apply(&mut self, update: &BibleUpdate) -> Result<(), BibleError> {
        if let Some(voice) = &update.voice {
            if !voice.trim().is_empty() {
                self.voice = voice.clone();
            }
        }

        for name in &update.rejected {
            self.characters.remove(name);
        }

        for (term, translation) in &update.glossary {
            if !self.glossary.contains_key(term) && self.glossary.len() < MAX_GLOSSARY {
                self.glossary.insert(term.clone(), translation.clone());
            }
        }

        for (name, description) in &update.characters {
            if !is_valid_character_name(name) {
                continue;
            }
            match self.characters.get(name) {
                None => {
                    if self.characters.len() < MAX_CHARACTERS {
                        self.characters.insert(name.clone(), description.clone());
                    }
                }
                Some(existing) if existing == PLACEHOLDER_DESCRIPTION => {
                    if !description.is_empty() && description != PLACEHOLDER_DESCRIPTION {
                        self.characters.insert(name.clone(), description.clone());
                    }
                }
                Some(_) => {}
            }
        }

        for decision in &update.decisions {
            let trimmed: String = decision.chars().take(MAX_DECISION_LEN).collect();
            let is_duplicate = self
                .decisions
                .iter()
                .any(|existing| existing == &trimmed || similarity(existing, &trimmed) >= DECISION_SIMILARITY_THRESHOLD);
            if !is_duplicate {
                self.decisions.push(trimmed);
            }
        }
        if self.decisions.len() > MAX_DECISIONS {
            let overflow = self.decisions.len() - MAX_DECISIONS;
            self.decisions.drain(0..overflow);
        }

        if let Some(scene) = &update.last_scene {
            if !scene.trim().is_empty() {
                let collapsed = scene.split_whitespace().collect::<Vec<_>>().join(" ");
                self.last_scene = collapsed.chars().take(MAX_LAST_SCENE_LEN).collect();
            }
        }

        Ok(())
    }

    /// Returns a new bible with `version` incremented, for persisting as
    /// the next immutable row.
    #[must_use]
    pub fn next_version(&self) -> Self {
        Self {
            version: self.version + 1,
            ..self.clone()
        }
    }
}

fn similarity(a: &str, b: &str) -> f64 {
    strsim::normalized_levenshtein(a, b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glossary_is_write_once() {
        let mut bible = BookBible::default();
        let mut update = BibleUpdate::default();
        update.glossary.insert("sensei".into(), "master".into());
        bible.apply(&update).unwrap();

        let mut second = BibleUpdate::default();
        second.glossary.insert("sensei".into(), "teacher".into());
        bible.apply(&second).unwrap();

        assert_eq!(bible.glossary.get("sensei"), Some(&"master".to_string()));
    }

    #[test]
    fn character_placeholder_is_overwritten_once() {
        let mut bible = BookBible::default();
        let mut first = BibleUpdate::default();
        first.characters.insert("Akira Tanaka".into(), PLACEHOLDER_DESCRIPTION.into());
        bible.apply(&first).unwrap();

        let mut second = BibleUpdate::default();
        second
            .characters
            .insert("Akira Tanaka".into(), "Gender: male. Role: protagonist.".into());
        bible.apply(&second).unwrap();
        assert_eq!(
            bible.characters.get("Akira Tanaka"),
            Some(&"Gender: male. Role: protagonist.".to_string())
        );

        let mut third = BibleUpdate::default();
        third.characters.insert("Akira Tanaka".into(), "Something else entirely.".into());
        bible.apply(&third).unwrap();
        assert_eq!(
            bible.characters.get("Akira Tanaka"),
            Some(&"Gender: male. Role: protagonist.".to_string())
        );
    }

    #[test]
    fn invalid_character_names_are_rejected() {
        assert!(!is_valid_character_name("a"));
        assert!(!is_valid_character_name("the"));
        assert!(!is_valid_character_name("a very long name that exceeds eighty characters total length for sure yes indeed absolutely"));
        assert!(is_valid_character_name("Akira Tanaka"));
    }

    #[test]
    fn voice_overwritten_only_while_default() {
        let mut bible = BookBible::default();
        let mut update = BibleUpdate {
            voice: Some("first-person present".into()),
            ..Default::default()
        };
        bible.apply(&update).unwrap();
        assert_eq!(bible.voice, "first-person present");

        update.voice = Some("omniscient".into());
        bible.apply(&update).unwrap();
        // apply() itself always overwrites on a non-empty voice; callers
        // (the local update builder) are responsible for only producing a
        // voice update while the bible still holds the default.
        assert_eq!(bible.voice, "omniscient");
    }

    #[test]
    fn decisions_deduplicate_by_similarity_and_cap_at_eighteen() {
        let mut bible = BookBible::default();
        for i in 0..25 {
            let update = BibleUpdate {
                decisions: vec![format!("Keep character name {i} untranslated")],
                ..Default::default()
            };
            bible.apply(&update).unwrap();
        }
        assert!(bible.decisions.len() <= MAX_DECISIONS);
    }

    #[test]
    fn near_duplicate_decision_is_dropped() {
        let mut bible = BookBible::default();
        bible
            .apply(&BibleUpdate {
                decisions: vec!["Preserve honorific -san on all names".into()],
                ..Default::default()
            })
            .unwrap();
        bible
            .apply(&BibleUpdate {
                decisions: vec!["Preserve honorific -san on all name".into()],
                ..Default::default()
            })
            .unwrap();
        assert_eq!(bible.decisions.len(), 1);
    }

    #[test]
    fn last_scene_collapses_whitespace_and_truncates() {
        let mut bible = BookBible::default();
        let long_scene = "word ".repeat(200);
        bible
            .apply(&BibleUpdate {
                last_scene: Some(long_scene),
                ..Default::default()
            })
            .unwrap();
        assert!(bible.last_scene.chars().count() <= MAX_LAST_SCENE_LEN);
        assert!(!bible.last_scene.contains('\n'));
    }

    #[test]
    fn rejected_names_are_removed() {
        let mut bible = BookBible::default();
        bible.characters.insert("Ghost Town".into(), PLACEHOLDER_DESCRIPTION.into());
        bible
            .apply(&BibleUpdate {
                rejected: vec!["Ghost Town".into()],
                ..Default::default()
            })
            .unwrap();
        assert!(!bible.characters.contains_key("Ghost Town"));
    }

    #[test]
    fn merge_prefers_extracted_on_conflict() {
        let mut local = BibleUpdate::default();
        local.glossary.insert("term".into(), "local-translation".into());
        local.characters.insert("Name".into(), "local-desc".into());

        let mut extracted = BibleUpdate::default();
        extracted.glossary.insert("term".into(), "extracted-translation".into());
        extracted.characters.insert("Name".into(), "extracted-desc".into());

        let merged = BibleUpdate::merge(local, extracted);
        assert_eq!(merged.glossary.get("term"), Some(&"extracted-translation".to_string()));
        assert_eq!(merged.characters.get("Name"), Some(&"extracted-desc".to_string()));
    }

    #[test]
    fn merge_deduplicates_decisions_preserving_order() {
        let local = BibleUpdate {
            decisions: vec!["A".into(), "B".into()],
            ..Default::default()
        };
        let extracted = BibleUpdate {
            decisions: vec!["B".into(), "C".into()],
            ..Default::default()
        };
        let merged = BibleUpdate::merge(local, extracted);
        assert_eq!(merged.decisions, vec!["A".to_string(), "B".to_string(), "C".to_string()]);
    }
}

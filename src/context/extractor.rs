//! Model-mediated validation and enrichment of bible entries.
//!
//! Complements the local [`super::character_detector`]: where the detector
//! finds candidates by heuristic, the extractor asks a model to confirm or
//! reject them and to surface glossary terms, decisions, and a scene digest
//! that heuristics cannot reliably produce.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::warn;

use crate::core::bible::BibleUpdate;

/// Extract on every book's first chunk regardless of cadence, and at least
/// this often afterward even if nothing in the notes hints at new content.
const DEFAULT_EXTRACT_EVERY_N: u32 = 5;

static MARKDOWN_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("fixed literal"));
static BARE_JSON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("fixed literal"));

const NEW_CONTENT_KEYWORDS: &[&str] = &[
    "nuevo", "new", "termino", "term", "personaje", "character", "nombre", "name", "decision",
];

/// Minimal capability the extractor needs from a model: send a prompt, get
/// text back. Decoupled from the router so tests can stub it trivially.
pub trait ExtractionModel {
    /// Sends `prompt` to the model and returns its raw text response.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying call fails; the extractor treats
    /// any error as "no update this chunk" rather than propagating it.
    fn call(&self, prompt: &str) -> crate::error::Result<String>;
}

/// Decides when to invoke the model and turns its response into a
/// [`BibleUpdate`].
pub struct BibleExtractor<M: ExtractionModel> {
    model: M,
    extract_every_n: u32,
    chunks_since_last_extract: u32,
}

impl<M: ExtractionModel> BibleExtractor<M> {
    /// Creates an extractor with the default cadence (every 5 chunks).
    pub const fn new(model: M) -> Self {
        Self {
            model,
            extract_every_n: DEFAULT_EXTRACT_EVERY_N,
            chunks_since_last_extract: 0,
        }
    }

    /// Creates an extractor with an explicit cadence, for configuration or
    /// tests that want tighter control.
    pub const fn with_cadence(model: M, extract_every_n: u32) -> Self {
        Self {
            model,
            extract_every_n,
            chunks_since_last_extract: 0,
        }
    }

    /// Decides whether this chunk warrants an extraction call.
    #[must_use]
    pub fn should_extract(&self, chunk_index: usize, notes: &str, force: bool) -> bool {
        if chunk_index == 0 || force {
            return true;
        }
        let notes_lower = notes.to_lowercase();
        if NEW_CONTENT_KEYWORDS.iter().any(|kw| notes_lower.contains(kw)) {
            return true;
        }
        self.chunks_since_last_extract + 1 >= self.extract_every_n
    }

    /// Extracts a bible update from one chunk's original/translation pair,
    /// optionally validating locally detected character candidates.
    ///
    /// Returns `None` when [`Self::should_extract`] declines, or when the
    /// model call fails — extraction failures never abort the pipeline.
    pub fn extract(
        &mut self,
        original: &str,
        translation: &str,
        notes: &str,
        chunk_index: usize,
        character_candidates: Option<&HashMap<String, String>>,
        force: bool,
    ) -> Option<BibleUpdate> {
        if !self.should_extract(chunk_index, notes, force) {
            self.chunks_since_last_extract += 1;
            return None;
        }

        let prompt = build_extraction_prompt(original, translation, notes, character_candidates);
        match self.model.call(&prompt) {
            Ok(raw_text) => {
                self.chunks_since_last_extract = 0;
                Some(parse_update(&raw_text))
            }
            Err(err) => {
                warn!(chunk_index, error = %err, "extractor call failed, bible unchanged");
                None
            }
        }
    }
}

/// Object-safe facade over [`BibleExtractor`], letting callers hold either
/// a real model-backed extractor or a no-op stand-in without being
/// generic themselves.
pub trait BibleExtraction: Send {
    /// Same contract as [`BibleExtractor::extract`].
    fn extract(
        &mut self,
        original: &str,
        translation: &str,
        notes: &str,
        chunk_index: usize,
        character_candidates: Option<&HashMap<String, String>>,
        force: bool,
    ) -> Option<BibleUpdate>;
}

impl<M: ExtractionModel + Send> BibleExtraction for BibleExtractor<M> {
    fn extract(
        &mut self,
        original: &str,
        translation: &str,
        notes: &str,
        chunk_index: usize,
        character_candidates: Option<&HashMap<String, String>>,
        force: bool,
    ) -> Option<BibleUpdate> {
        BibleExtractor::extract(self, original, translation, notes, chunk_index, character_candidates, force)
    }
}

/// Stands in for a configured extractor when no extraction model is
/// available: every chunk keeps its local heuristic bible update only.
#[derive(Debug, Default)]
pub struct NoopExtractor;

impl BibleExtraction for NoopExtractor {
    fn extract(
        &mut self,
        _original: &str,
        _translation: &str,
        _notes: &str,
        _chunk_index: usize,
        _character_candidates: Option<&HashMap<String, String>>,
        _force: bool,
    ) -> Option<BibleUpdate> {
        None
    }
}

fn build_extraction_prompt(
    original: &str,
    translation: &str,
    notes: &str,
    character_candidates: Option<&HashMap<String, String>>,
) -> String {
    let candidates_section = character_candidates
        .filter(|c| !c.is_empty())
        .map(|candidates| {
            let list = candidates.keys().map(|name| format!("  - {name}")).collect::<Vec<_>>().join("\n");
            format!(
                "CANDIDATOS DE PERSONAJES DETECTADOS AUTOMATICAMENTE:\n{list}\n\n\
                 Para la seccion \"characters\": confirma cada candidato real con su \
                 descripcion, o mueve a \"rejected\" los que sean lugares, grupos u otros \
                 falsos positivos.\n\n"
            )
        })
        .unwrap_or_default();

    format!(
        "Analiza el fragmento original y su traduccion. Extrae unicamente informacion \
         nueva que deba recordarse para mantener consistencia en el resto del libro.\n\n\
         FRAGMENTO ORIGINAL:\n{original}\n\nTRADUCCION:\n{translation}\n\n\
         NOTAS DEL TRADUCTOR:\n{}\n\n{candidates_section}\
         Responde UNICAMENTE con JSON valido con las claves voice, glossary, characters, \
         rejected, decisions, last_scene.",
        if notes.is_empty() { "Sin notas." } else { notes },
    )
}

fn parse_update(raw_text: &str) -> BibleUpdate {
    let Some(data) = try_parse_json(raw_text.trim()) else {
        warn!("extractor response not parseable, bible unchanged");
        return BibleUpdate::default();
    };

    BibleUpdate {
        voice: non_empty_string(data.get("voice")),
        glossary: safe_string_map(data.get("glossary")),
        characters: safe_string_map(data.get("characters")),
        decisions: safe_string_list(data.get("decisions")),
        last_scene: non_empty_string(data.get("last_scene")),
        rejected: safe_string_list(data.get("rejected")),
    }
}

fn try_parse_json(text: &str) -> Option<Value> {
    if let Ok(v) = serde_json::from_str::<Value>(text) {
        if v.is_object() {
            return Some(v);
        }
    }
    if let Some(caps) = MARKDOWN_JSON_RE.captures(text) {
        if let Ok(v) = serde_json::from_str::<Value>(&caps[1]) {
            if v.is_object() {
                return Some(v);
            }
        }
    }
    if let Some(m) = BARE_JSON_RE.find(text) {
        if let Ok(v) = serde_json::from_str::<Value>(m.as_str()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }
    None
}

fn non_empty_string(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

fn safe_string_map(value: Option<&Value>) -> std::collections::BTreeMap<String, String> {
    value
        .and_then(Value::as_object)
        .map(|obj| {
            obj.iter()
                .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

fn safe_string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct StubModel(String);
    impl ExtractionModel for StubModel {
        fn call(&self, _prompt: &str) -> crate::error::Result<String> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn first_chunk_always_extracts() {
        let extractor = BibleExtractor::new(StubModel(String::new()));
        assert!(extractor.should_extract(0, "", false));
    }

    #[test]
    fn cadence_triggers_after_n_chunks() {
        let mut extractor = BibleExtractor::with_cadence(StubModel("{}".into()), 2);
        extractor.extract("o", "t", "", 1, None, false);
        assert!(extractor.should_extract(5, "nada relevante", false));
    }

    #[test]
    fn keyword_in_notes_forces_extraction() {
        let extractor = BibleExtractor::with_cadence(StubModel(String::new()), 100);
        assert!(extractor.should_extract(3, "encontre un personaje nuevo", false));
    }

    #[test]
    fn direct_json_parses() {
        let raw = r#"{"voice": "tercera persona", "glossary": {"Void": "Void"}, "characters": {}, "rejected": [], "decisions": [], "last_scene": "Algo paso."}"#;
        let update = parse_update(raw);
        assert_eq!(update.voice.as_deref(), Some("tercera persona"));
        assert_eq!(update.glossary.get("Void"), Some(&"Void".to_string()));
    }

    #[test]
    fn markdown_fenced_json_parses() {
        let raw = "Aqui esta:\n```json\n{\"voice\": \"x\", \"glossary\": {}, \"characters\": {}, \"rejected\": [], \"decisions\": [], \"last_scene\": \"\"}\n```";
        let update = parse_update(raw);
        assert_eq!(update.voice.as_deref(), Some("x"));
    }

    #[test]
    fn unparseable_response_yields_empty_update() {
        let update = parse_update("no json here at all");
        assert!(update.voice.is_none());
        assert!(update.glossary.is_empty());
    }

    #[test]
    fn extract_returns_none_when_cadence_not_met() {
        let mut extractor = BibleExtractor::with_cadence(StubModel("{}".into()), 100);
        extractor.chunks_since_last_extract = 1;
        assert!(extractor.extract("o", "t", "nada", 1, None, false).is_none());
    }
}

//! Progressive-degradation JSON extraction from raw model output.
//!
//! Model responses are contractually JSON, but providers routinely wrap
//! them in markdown fences or pad them with commentary. This parser never
//! fails outright: the last resort treats the whole response as the
//! translation with a low confidence, flagging it for review.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::{error, warn};

static MARKDOWN_JSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*?\})\s*```").expect("fixed literal"));
static BARE_JSON_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)\{.*\}").expect("fixed literal"));

/// Emergency-tier confidence assigned when nothing parses as JSON.
pub const EMERGENCY_CONFIDENCE: f64 = 0.3;

/// The three fields every parse attempt ultimately produces.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    /// The translated/fixed/polished text.
    pub translation: String,
    /// Confidence, already clamped to [0, 1].
    pub confidence: f64,
    /// Notes, defaulted to a fixed string when absent.
    pub notes: String,
}

/// Parses `raw_text`, trying direct JSON, then JSON inside a markdown
/// fence, then the first bare JSON object found anywhere, before falling
/// back to treating the whole response as the translation.
#[must_use]
pub fn parse_model_response(raw_text: &str, model_name: &str) -> ParsedResponse {
    let text = raw_text.trim();

    if let Some(value) = try_parse(text) {
        return validate_and_fill(&value);
    }

    if let Some(caps) = MARKDOWN_JSON_RE.captures(text) {
        if let Some(value) = try_parse(&caps[1]) {
            warn!(model = model_name, "response wrapped in markdown fence");
            return validate_and_fill(&value);
        }
    }

    if let Some(m) = BARE_JSON_RE.find(text) {
        if let Some(value) = try_parse(m.as_str()) {
            warn!(model = model_name, "response had extra text around JSON");
            return validate_and_fill(&value);
        }
    }

    error!(model = model_name, "response not parseable, using raw text as translation");
    ParsedResponse {
        translation: text.to_string(),
        confidence: EMERGENCY_CONFIDENCE,
        notes: format!("ADVERTENCIA: respuesta no estructurada de {model_name}. Requiere revision manual."),
    }
}

fn try_parse(text: &str) -> Option<Value> {
    serde_json::from_str::<Value>(text).ok().filter(Value::is_object)
}

fn validate_and_fill(data: &Value) -> ParsedResponse {
    let mut translation = data.get("translation").and_then(Value::as_str).unwrap_or_default().trim().to_string();
    if translation.is_empty() {
        translation = data
            .get("text")
            .or_else(|| data.get("result"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
    }

    let confidence = data
        .get("confidence")
        .and_then(Value::as_f64)
        .map_or(0.5, |c| c.clamp(0.0, 1.0));

    let notes = data
        .get("notes")
        .or_else(|| data.get("note"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("Sin notas.")
        .to_string();

    ParsedResponse { translation, confidence, notes }
}

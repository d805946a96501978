//! The `Chunk` domain model: a unit of model invocation and persistence.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a chunk.
///
/// Transitions only move forward: `Pending -> {Done, Flagged}`, and
/// `Flagged -> Reviewed` once a human resolves the flag. Nothing moves
/// backward except an explicit reset performed outside the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStatus {
    /// Not yet sent to any model.
    Pending,
    /// Translated with confidence >= 0.75.
    Done,
    /// Translated with confidence < 0.75, or the model call failed.
    Flagged,
    /// A human has reviewed and accepted a flagged chunk.
    Reviewed,
}

impl ChunkStatus {
    /// The confidence threshold above which a translated chunk is `Done`
    /// rather than `Flagged`.
    pub const CONFIDENCE_THRESHOLD: f64 = 0.75;

    /// Resolves the status a translation result should receive.
    #[must_use]
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= Self::CONFIDENCE_THRESHOLD {
            Self::Done
        } else {
            Self::Flagged
        }
    }
}

/// A single text fragment belonging to one book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Database identity, `None` until persisted.
    pub id: Option<i64>,
    /// Owning book's database id, `None` until both are persisted together.
    pub book_id: Option<i64>,
    /// Book-local, zero-based ordering index.
    pub index: usize,
    /// Source-language text.
    pub original: String,
    /// Model output, if any.
    pub translated: Option<String>,
    /// Approximate token count of `original`.
    pub token_estimated: usize,
    /// Index of the upstream structural section (chapter file, EPUB spine
    /// item) this chunk came from; used by the reconstructor to decide
    /// where to insert paragraph breaks.
    pub source_section: usize,
    /// Name of the model that produced `translated`, if any.
    pub model_used: Option<String>,
    /// Model's self-reported confidence in [0, 1].
    pub confidence: Option<f64>,
    /// Current lifecycle state.
    pub status: ChunkStatus,
    /// Ordered diagnostic strings (e.g. `"error: RouterError: ..."`).
    pub flags: Vec<String>,
}

impl Chunk {
    /// Creates a new `Pending` chunk with no translation yet.
    #[must_use]
    pub fn new(index: usize, original: String, source_section: usize, token_estimated: usize) -> Self {
        Self {
            id: None,
            book_id: None,
            index,
            original,
            translated: None,
            token_estimated,
            source_section,
            model_used: None,
            confidence: None,
            status: ChunkStatus::Pending,
            flags: Vec::new(),
        }
    }

    /// Applies a successful model response: sets translation, model,
    /// confidence, and the derived status, all in one place so callers
    /// cannot forget one of the four fields.
    pub fn apply_translation(&mut self, translated: String, model_used: String, confidence: f64) {
        self.status = ChunkStatus::from_confidence(confidence);
        self.translated = Some(translated);
        self.model_used = Some(model_used);
        self.confidence = Some(confidence);
    }

    /// Flags the chunk with a diagnostic string and marks it `Flagged`,
    /// without touching any existing translation.
    pub fn flag(&mut self, diagnostic: impl Into<String>) {
        self.flags.push(diagnostic.into());
        self.status = ChunkStatus::Flagged;
    }

    /// Returns the text a reconstructor or reviewer should display: the
    /// translation if present, otherwise the original.
    #[must_use]
    pub fn best_text(&self) -> &str {
        self.translated.as_deref().unwrap_or(&self.original)
    }
}

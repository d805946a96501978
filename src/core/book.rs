//! The `Book` domain model: one manuscript under translation, fix, or
//! polish, identified by a content hash.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// What the pipeline is doing to a manuscript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookMode {
    /// Source-language text to target-language text.
    Translate,
    /// Corrective pass over an existing draft against its source.
    Fix,
    /// Stylistic pass over an existing draft, no source comparison.
    Polish,
}

impl BookMode {
    /// The mode's identifier as used in hash prefixes and CLI flags.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Fix => "fix",
            Self::Polish => "polish",
        }
    }
}

/// Where a book is in its run lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookStatus {
    /// At least one chunk is not yet `Done`/`Reviewed`.
    InProgress,
    /// All chunks resolved but at least one is `Flagged`, awaiting a human.
    Review,
    /// Every chunk is `Done` or `Reviewed`.
    Done,
}

/// A manuscript tracked by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    /// Database identity, `None` until persisted.
    pub id: Option<i64>,
    /// Content hash identifying this logical unit of work; globally unique.
    pub file_hash: String,
    /// Human-readable title, typically the input filename stem.
    pub title: String,
    /// Source language tag (e.g. "ja", "es"); meaningless for `Polish`.
    pub source_lang: Option<String>,
    /// Target language tag (e.g. "en").
    pub target_lang: String,
    /// What this run is doing to the manuscript.
    pub mode: BookMode,
    /// Current lifecycle status.
    pub status: BookStatus,
    /// Unix timestamp of first creation.
    pub created_at: i64,
}

impl Book {
    /// Computes the identity hash for a `translate` run: the SHA-256 of the
    /// raw input bytes.
    #[must_use]
    pub fn compute_hash(input: &[u8]) -> String {
        hex_sha256(input)
    }

    /// Computes the identity hash for a `fix` run: source and draft are
    /// hashed independently and combined, so the same source re-paired with
    /// a different draft resumes a distinct book.
    #[must_use]
    pub fn compute_fix_hash(source: &[u8], draft: &[u8]) -> String {
        format!("fix|{}|{}", hex_sha256(source), hex_sha256(draft))
    }

    /// Computes the identity hash for a `polish` run: there is no source to
    /// compare against, so the target language is folded into the hash
    /// instead, lowercased so `"EN"` and `"en"` resume the same book.
    #[must_use]
    pub fn compute_fix_style_hash(target_lang: &str, draft: &[u8]) -> String {
        format!("fix_style|{}|{}", target_lang.to_lowercase(), hex_sha256(draft))
    }

    /// Creates a new book in `InProgress` status at the current time.
    #[must_use]
    pub fn new(file_hash: String, title: String, target_lang: String, mode: BookMode, created_at: i64) -> Self {
        Self {
            id: None,
            file_hash,
            title,
            source_lang: None,
            target_lang,
            mode,
            status: BookStatus::InProgress,
            created_at,
        }
    }

    /// Derives this book's status from its chunks' statuses.
    ///
    /// An empty chunk list is `InProgress`: a book with nothing chunked yet
    /// has not started, let alone finished.
    #[must_use]
    pub fn derive_status(chunk_statuses: &[super::chunk::ChunkStatus]) -> BookStatus {
        use super::chunk::ChunkStatus;

        if chunk_statuses.is_empty() {
            return BookStatus::InProgress;
        }
        let all_resolved = chunk_statuses
            .iter()
            .all(|s| matches!(s, ChunkStatus::Done | ChunkStatus::Reviewed));
        if all_resolved {
            return BookStatus::Done;
        }
        let any_pending = chunk_statuses.iter().any(|s| matches!(s, ChunkStatus::Pending));
        if any_pending {
            BookStatus::InProgress
        } else {
            BookStatus::Review
        }
    }
}

fn hex_sha256(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

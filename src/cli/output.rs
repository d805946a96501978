//! Output formatting for CLI commands.
//!
//! Supports text and JSON output formats.

use serde::Serialize;
use std::fmt::Write;

use crate::core::{Book, BookBible, BookStatus, Chunk, ChunkStatus};
use crate::orchestrator::PipelineResult;

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Human-readable text output.
    Text,
    /// JSON output.
    Json,
    /// Newline-delimited JSON (NDJSON) for streaming.
    /// Each record is a single JSON object on its own line.
    Ndjson,
}

impl OutputFormat {
    /// Parses format from string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "ndjson" | "jsonl" | "stream" => Self::Ndjson,
            _ => Self::Text,
        }
    }

    /// Returns true if this format is a streaming format.
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Ndjson)
    }
}

/// Formats the result of a `translate` or `fix` run.
#[must_use]
pub fn format_pipeline_result(result: &PipelineResult, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_pipeline_result_text(result),
        OutputFormat::Json | OutputFormat::Ndjson => format_json(result),
    }
}

/// True when a run stopped because every model was exhausted or cooling
/// down, leaving pending chunks behind rather than finishing the book.
#[must_use]
pub fn models_were_exhausted(result: &PipelineResult) -> bool {
    result.translated + result.flagged < result.total_chunks
}

fn format_pipeline_result_text(result: &PipelineResult) -> String {
    let mut output = String::new();
    let _ = writeln!(
        output,
        "{} book {}",
        if result.was_resumed { "Resumed" } else { "Started" },
        result.book_id
    );
    let _ = writeln!(output, "  Chunks:    {}", result.total_chunks);
    let _ = writeln!(output, "  Translated: {}", result.translated);
    let _ = writeln!(output, "  Flagged:    {}", result.flagged);
    let _ = writeln!(output, "  Output:     {}", result.output_path.display());
    if result.translated + result.flagged < result.total_chunks {
        output.push_str("  Models exhausted; remaining chunks left pending for the next run.\n");
    }
    output
}

/// Formats a book's status along with its chunks and bible, without
/// running the pipeline.
#[must_use]
pub fn format_status(book: &Book, chunks: &[Chunk], bible: Option<&BookBible>, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => format_status_text(book, chunks, bible),
        OutputFormat::Json | OutputFormat::Ndjson => {
            #[derive(Serialize)]
            struct StatusOutput<'a> {
                book: &'a Book,
                pending: usize,
                done: usize,
                flagged: usize,
                reviewed: usize,
                bible: Option<&'a BookBible>,
            }
            let counts = count_by_status(chunks);
            format_json(&StatusOutput {
                book,
                pending: counts.0,
                done: counts.1,
                flagged: counts.2,
                reviewed: counts.3,
                bible,
            })
        }
    }
}

fn count_by_status(chunks: &[Chunk]) -> (usize, usize, usize, usize) {
    let pending = chunks.iter().filter(|c| c.status == ChunkStatus::Pending).count();
    let done = chunks.iter().filter(|c| c.status == ChunkStatus::Done).count();
    let flagged = chunks.iter().filter(|c| c.status == ChunkStatus::Flagged).count();
    let reviewed = chunks.iter().filter(|c| c.status == ChunkStatus::Reviewed).count();
    (pending, done, flagged, reviewed)
}

fn format_status_text(book: &Book, chunks: &[Chunk], bible: Option<&BookBible>) -> String {
    let mut output = String::new();
    let _ = writeln!(output, "Book {}: {}", book.id.unwrap_or(0), book.title);
    let _ = writeln!(output, "  Mode:   {}", book.mode.as_str());
    if let Some(ref src) = book.source_lang {
        let _ = writeln!(output, "  From:   {src}");
    }
    let _ = writeln!(output, "  To:     {}", book.target_lang);
    let _ = writeln!(
        output,
        "  Status: {}",
        match book.status {
            BookStatus::InProgress => "in_progress",
            BookStatus::Review => "review",
            BookStatus::Done => "done",
        }
    );

    let (pending, done, flagged, reviewed) = count_by_status(chunks);
    let _ = writeln!(output, "  Chunks: {} total", chunks.len());
    let _ = writeln!(output, "    pending:  {pending}");
    let _ = writeln!(output, "    done:     {done}");
    let _ = writeln!(output, "    flagged:  {flagged}");
    let _ = writeln!(output, "    reviewed: {reviewed}");

    if let Some(bible) = bible {
        output.push_str("  Bible:\n");
        let _ = writeln!(output, "    voice:      {}", bible.voice);
        let _ = writeln!(output, "    characters: {}", bible.characters.len());
        let _ = writeln!(output, "    glossary:   {}", bible.glossary.len());
        let _ = writeln!(output, "    decisions:  {}", bible.decisions.len());
    }

    output
}

/// Formats a value as JSON.
fn format_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Formats an error for output.
///
/// When format is JSON, returns a structured error object.
/// When format is Text, returns the error message string.
#[must_use]
pub fn format_error(error: &crate::Error, format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => error.to_string(),
        OutputFormat::Json | OutputFormat::Ndjson => {
            let (error_type, suggestion) = get_error_details(error);
            let json = serde_json::json!({
                "success": false,
                "error": {
                    "type": error_type,
                    "message": error.to_string(),
                    "suggestion": suggestion
                }
            });
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| "{}".to_string())
        }
    }
}

/// Extracts error type and recovery suggestion from an error.
const fn get_error_details(error: &crate::Error) -> (&'static str, Option<&'static str>) {
    use crate::error::{ChunkingError, CommandError, IoError, OrchestratorError, RouterError, StorageError};

    match error {
        crate::Error::Storage(e) => match e {
            StorageError::ChunkNotFound { .. } => ("ChunkNotFound", None),
            StorageError::BookNotFound { .. } => (
                "BookNotFound",
                Some("run 'status --book <path>' against the same input that was translated"),
            ),
            StorageError::BibleNotFound { .. } => ("BibleNotFound", None),
            StorageError::Database(_) => ("DatabaseError", None),
            StorageError::Migration(_) => ("MigrationError", None),
            StorageError::Transaction(_) => ("TransactionError", None),
            StorageError::Serialization(_) => ("SerializationError", None),
        },
        crate::Error::Io(e) => match e {
            IoError::ReadFailed { .. } => ("ReadError", Some("verify the file path exists")),
            IoError::WriteFailed { .. } => ("WriteError", None),
            IoError::DirectoryFailed { .. } => ("DirectoryError", None),
        },
        crate::Error::Chunking(e) => match e {
            ChunkingError::Regex(_) => ("RegexError", None),
            ChunkingError::UnknownStrategy { .. } => (
                "UnknownStrategy",
                Some("valid chunk sizes: standard, large, xlarge"),
            ),
        },
        crate::Error::Command(e) => match e {
            CommandError::UnknownCommand(_) => ("UnknownCommand", None),
            CommandError::InvalidArgument(_) => ("InvalidArgument", None),
            CommandError::MissingArgument(_) => ("MissingArgument", None),
            CommandError::ExecutionFailed(_) => ("ExecutionFailed", None),
            CommandError::Cancelled => ("Cancelled", None),
            CommandError::OutputFormat(_) => ("OutputFormatError", None),
        },
        crate::Error::Router(e) => match e {
            RouterError::Retryable { .. } => ("RouterRetryable", None),
            RouterError::Content { .. } => ("RouterContentRejected", None),
            RouterError::AllModelsExhausted => (
                "AllModelsExhausted",
                Some("re-run the same command later; progress so far is preserved"),
            ),
            RouterError::UnknownModel(_) => ("UnknownModel", None),
            RouterError::ConfigLoad(_) => (
                "ModelConfigLoadFailed",
                Some("check --models-config or TRADNOVELA_MODELS_CONFIG"),
            ),
        },
        crate::Error::Bible(_) => ("BibleError", None),
        crate::Error::Orchestrator(e) => match e {
            OrchestratorError::BookAlreadyDone { .. } => ("BookAlreadyDone", None),
            OrchestratorError::ChunkFailed { .. } => ("ChunkFailed", None),
        },
        crate::Error::InvalidState { .. } => ("InvalidState", None),
        crate::Error::Config { .. } => ("ConfigError", None),
    }
}

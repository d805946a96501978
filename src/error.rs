//! Error types for the translation pipeline.
//!
//! A `thiserror` hierarchy split by subsystem: storage, chunking, I/O, CLI
//! commands, model routing, bible merging, and the orchestrator run loop.

use thiserror::Error;

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type returned by every public pipeline operation.
#[derive(Error, Debug)]
pub enum Error {
    /// Storage-related errors (database operations).
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Chunking-related errors (text processing).
    #[error("chunking error: {0}")]
    Chunking(#[from] ChunkingError),

    /// I/O errors (file operations).
    #[error("I/O error: {0}")]
    Io(#[from] IoError),

    /// CLI command errors.
    #[error("command error: {0}")]
    Command(#[from] CommandError),

    /// Invalid state errors.
    #[error("invalid state: {message}")]
    InvalidState {
        /// Description of the invalid state.
        message: String,
    },

    /// Configuration errors.
    #[error("configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Model routing errors (dispatch, failover, quota).
    #[error("router error: {0}")]
    Router(#[from] RouterError),

    /// Book bible merge/compression errors.
    #[error("bible error: {0}")]
    Bible(#[from] BibleError),

    /// Orchestrator run-loop errors.
    #[error("orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),
}

/// Errors raised while dispatching a chunk to a model adapter.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The call failed for a reason the same model might succeed at on
    /// retry or after its cooldown (timeout, rate limit, 5xx).
    #[error("retryable failure from {model}: {reason}")]
    Retryable {
        /// Name of the model that failed.
        model: String,
        /// Underlying reason.
        reason: String,
    },

    /// The call failed for a reason retrying would not fix (the model
    /// refused the content, or returned an unparseable response after all
    /// degradation tiers).
    #[error("content rejected by {model}: {reason}")]
    Content {
        /// Name of the model that rejected the content.
        model: String,
        /// Underlying reason.
        reason: String,
    },

    /// Every configured model is either exhausted or in cooldown.
    #[error("all models exhausted")]
    AllModelsExhausted,

    /// No adapter is registered for a model name found in configuration.
    #[error("no adapter registered for model: {0}")]
    UnknownModel(String),

    /// The model list YAML failed to load or parse.
    #[error("failed to load model configuration: {0}")]
    ConfigLoad(String),
}

/// Errors raised while merging editorial state into a book bible.
#[derive(Error, Debug)]
pub enum BibleError {
    /// A bible update referenced a field that does not exist.
    #[error("unknown bible field: {0}")]
    UnknownField(String),

    /// Compression of the bible for prompt inclusion failed.
    #[error("bible compression failed: {0}")]
    CompressionFailed(String),
}

/// Errors raised by the orchestrator's run loop.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The book has no pending chunks left to process.
    #[error("book already done: {book_id}")]
    BookAlreadyDone {
        /// Identifier of the completed book.
        book_id: i64,
    },

    /// A single chunk failed and was flagged rather than aborting the run.
    #[error("chunk {index} failed: {reason}")]
    ChunkFailed {
        /// Index of the failed chunk.
        index: usize,
        /// Underlying reason.
        reason: String,
    },
}

/// Storage-specific errors for database operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(String),

    /// Chunk not found by ID.
    #[error("chunk not found: {id}")]
    ChunkNotFound {
        /// Chunk ID that was not found.
        id: i64,
    },

    /// Book not found by ID or content hash.
    #[error("book not found: {identifier}")]
    BookNotFound {
        /// Book ID or file hash that was not found.
        identifier: String,
    },

    /// Bible not found for a book that has none persisted yet.
    #[error("no bible found for book {book_id}")]
    BibleNotFound {
        /// Book ID that has no bible row.
        book_id: i64,
    },

    /// Schema migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// Transaction error.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Chunking-specific errors for text processing.
#[derive(Error, Debug)]
pub enum ChunkingError {
    /// Regex compilation error.
    #[error("regex error: {0}")]
    Regex(String),

    /// Unknown chunking strategy.
    #[error("unknown chunking strategy: {name}")]
    UnknownStrategy {
        /// Name of the unknown strategy.
        name: String,
    },
}

/// I/O-specific errors for file operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Failed to read file.
    #[error("failed to read file: {path}: {reason}")]
    ReadFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Failed to write file.
    #[error("failed to write file: {path}: {reason}")]
    WriteFailed {
        /// Path to the file.
        path: String,
        /// Reason for failure.
        reason: String,
    },

    /// Directory creation error.
    #[error("failed to create directory: {path}: {reason}")]
    DirectoryFailed {
        /// Path to the directory.
        path: String,
        /// Reason for failure.
        reason: String,
    },
}

/// CLI command-specific errors.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Unknown command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Invalid argument provided.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Missing required argument.
    #[error("missing required argument: {0}")]
    MissingArgument(String),

    /// Command execution failed.
    #[error("command execution failed: {0}")]
    ExecutionFailed(String),

    /// User cancelled operation.
    #[error("operation cancelled by user")]
    Cancelled,

    /// Output format error.
    #[error("output format error: {0}")]
    OutputFormat(String),
}

// Implement From traits for standard library errors

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage(StorageError::Database(err.to_string()))
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database(err.to_string())
    }
}

impl From<regex::Error> for ChunkingError {
    fn from(err: regex::Error) -> Self {
        Self::Regex(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidState {
            message: "test error".to_string(),
        };
        assert_eq!(err.to_string(), "invalid state: test error");
    }

    #[test]
    fn test_command_error_display() {
        let err = CommandError::MissingArgument("--file".to_string());
        assert_eq!(err.to_string(), "missing required argument: --file");
    }

    #[test]
    fn test_error_from_chunking() {
        let chunk_err = ChunkingError::Regex("bad pattern".to_string());
        let err: Error = chunk_err.into();
        assert!(matches!(err, Error::Chunking(_)));
    }

    #[test]
    fn test_error_from_command() {
        let cmd_err = CommandError::Cancelled;
        let err: Error = cmd_err.into();
        assert!(matches!(err, Error::Command(_)));
    }

    #[test]
    fn test_error_config() {
        let err = Error::Config {
            message: "bad config".to_string(),
        };
        assert_eq!(err.to_string(), "configuration error: bad config");
    }

    #[test]
    fn test_storage_error_variants() {
        let err = StorageError::Database("connection failed".to_string());
        assert!(err.to_string().contains("connection failed"));

        let err = StorageError::ChunkNotFound { id: 42 };
        assert_eq!(err.to_string(), "chunk not found: 42");

        let err = StorageError::BookNotFound {
            identifier: "deadbeef".to_string(),
        };
        assert_eq!(err.to_string(), "book not found: deadbeef");

        let err = StorageError::BibleNotFound { book_id: 7 };
        assert_eq!(err.to_string(), "no bible found for book 7");

        let err = StorageError::Migration("schema error".to_string());
        assert!(err.to_string().contains("schema error"));

        let err = StorageError::Transaction("rollback".to_string());
        assert!(err.to_string().contains("rollback"));

        let err = StorageError::Serialization("invalid json".to_string());
        assert!(err.to_string().contains("invalid json"));
    }

    #[test]
    fn test_chunking_error_variants() {
        let err = ChunkingError::Regex("invalid pattern".to_string());
        assert!(err.to_string().contains("invalid pattern"));

        let err = ChunkingError::UnknownStrategy {
            name: "foobar".to_string(),
        };
        assert!(err.to_string().contains("foobar"));
    }

    #[test]
    fn test_io_error_variants() {
        let err = IoError::ReadFailed {
            path: "/tmp/test".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(err.to_string().contains("/tmp/test"));
        assert!(err.to_string().contains("permission denied"));

        let err = IoError::WriteFailed {
            path: "/tmp/out".to_string(),
            reason: "disk full".to_string(),
        };
        assert!(err.to_string().contains("disk full"));

        let err = IoError::DirectoryFailed {
            path: "/tmp/dir".to_string(),
            reason: "exists".to_string(),
        };
        assert!(err.to_string().contains("directory"));
    }

    #[test]
    fn test_command_error_variants() {
        let err = CommandError::UnknownCommand("foo".to_string());
        assert!(err.to_string().contains("unknown command"));

        let err = CommandError::InvalidArgument("--bad".to_string());
        assert!(err.to_string().contains("invalid argument"));

        let err = CommandError::ExecutionFailed("timeout".to_string());
        assert!(err.to_string().contains("execution failed"));

        let err = CommandError::Cancelled;
        assert!(err.to_string().contains("cancelled"));

        let err = CommandError::OutputFormat("json error".to_string());
        assert!(err.to_string().contains("output format"));
    }

    #[test]
    fn test_from_rusqlite_error_to_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: Error = rusqlite_err.into();
        assert!(matches!(err, Error::Storage(StorageError::Database(_))));
    }

    #[test]
    fn test_from_rusqlite_error_to_storage_error() {
        let rusqlite_err = rusqlite::Error::InvalidQuery;
        let err: StorageError = rusqlite_err.into();
        assert!(matches!(err, StorageError::Database(_)));
    }

    #[test]
    #[allow(clippy::invalid_regex)]
    fn test_from_regex_error_to_chunking_error() {
        let regex_err = regex::Regex::new("[invalid").unwrap_err();
        let err: ChunkingError = regex_err.into();
        assert!(matches!(err, ChunkingError::Regex(_)));
    }

    #[test]
    fn test_from_serde_json_error_to_storage_error() {
        let json_err: serde_json::Error = serde_json::from_str::<i32>("invalid").unwrap_err();
        let err: StorageError = json_err.into();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn test_router_error_variants() {
        let err = RouterError::Retryable {
            model: "claude-a".to_string(),
            reason: "timeout".to_string(),
        };
        assert!(err.to_string().contains("claude-a"));

        let err = RouterError::Content {
            model: "claude-a".to_string(),
            reason: "refused".to_string(),
        };
        assert!(err.to_string().contains("refused"));

        assert_eq!(RouterError::AllModelsExhausted.to_string(), "all models exhausted");

        let err = RouterError::UnknownModel("ghost-model".to_string());
        assert!(err.to_string().contains("ghost-model"));

        let err = RouterError::ConfigLoad("bad yaml".to_string());
        assert!(err.to_string().contains("bad yaml"));
    }

    #[test]
    fn test_bible_error_variants() {
        let err = BibleError::UnknownField("glossery".to_string());
        assert!(err.to_string().contains("glossery"));

        let err = BibleError::CompressionFailed("too dense".to_string());
        assert!(err.to_string().contains("too dense"));
    }

    #[test]
    fn test_orchestrator_error_variants() {
        let err = OrchestratorError::BookAlreadyDone { book_id: 7 };
        assert!(err.to_string().contains('7'));

        let err = OrchestratorError::ChunkFailed {
            index: 3,
            reason: "parse failure".to_string(),
        };
        assert!(err.to_string().contains("parse failure"));
    }

    #[test]
    fn test_error_from_router_bible_orchestrator() {
        let err: Error = RouterError::AllModelsExhausted.into();
        assert!(matches!(err, Error::Router(_)));

        let err: Error = BibleError::UnknownField("x".to_string()).into();
        assert!(matches!(err, Error::Bible(_)));

        let err: Error = OrchestratorError::BookAlreadyDone { book_id: 1 }.into();
        assert!(matches!(err, Error::Orchestrator(_)));
    }
}

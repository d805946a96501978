//! The single interface between the rest of the crate and `SQLite`.
//!
//! Mirrors the reference implementation's repository one-to-one: book
//! and chunk CRUD, bulk idempotent chunk inserts, atomic per-chunk
//! translation updates, bible versioning, and per-(model, day) quota
//! increments.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::core::{Book, BookBible, BookMode, BookStatus, Chunk, ChunkStatus};
use crate::error::{Result, StorageError};
use crate::router::QuotaSource;

use super::schema::{CHECK_SCHEMA_SQL, CURRENT_SCHEMA_VERSION, GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL};

/// Durable storage for books, chunks, bibles, and daily model quotas.
pub struct Repository {
    conn: Connection,
    path: Option<PathBuf>,
}

impl Repository {
    /// Opens (creating if absent) a database at `path`, initializing the
    /// schema if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the parent directory cannot be created or the
    /// connection/schema setup fails.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| StorageError::Database(e.to_string()))?;
            }
        }
        let conn = Connection::open(&path).map_err(StorageError::from)?;
        let mut repo = Self { conn, path: Some(path) };
        repo.init()?;
        Ok(repo)
    }

    /// Opens an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection or schema setup fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let mut repo = Self { conn, path: None };
        repo.init()?;
        Ok(repo)
    }

    /// The database file path, `None` for an in-memory instance.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&mut self) -> Result<()> {
        self.conn.execute("PRAGMA foreign_keys = ON;", []).map_err(StorageError::from)?;
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        let is_init: i64 = self.conn.query_row(CHECK_SCHEMA_SQL, [], |row| row.get(0)).map_err(StorageError::from)?;
        if is_init == 0 {
            self.conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
            self.conn
                .execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION.to_string()])
                .map_err(StorageError::from)?;
        }
        Ok(())
    }

    #[allow(dead_code)]
    fn schema_version(&self) -> Result<Option<u32>> {
        let version: Option<String> =
            self.conn.query_row(GET_VERSION_SQL, [], |row| row.get(0)).optional().map_err(StorageError::from)?;
        Ok(version.and_then(|v| v.parse().ok()))
    }

    // ---------------------------------------------------------------
    // Books
    // ---------------------------------------------------------------

    /// Inserts a new book, returning its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if `file_hash` collides with an existing row
    /// (the caller is expected to check `get_book_by_hash` first).
    pub fn create_book(&self, book: &Book) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO books (title, source_lang, target_lang, mode, status, file_hash, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    book.title,
                    book.source_lang,
                    book.target_lang,
                    book.mode.as_str(),
                    book_status_str(book.status),
                    book.file_hash,
                    book.created_at,
                ],
            )
            .map_err(StorageError::from)?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Looks up a book by its content hash.
    ///
    /// # Errors
    ///
    /// Returns an error on a query/decode failure.
    pub fn get_book_by_hash(&self, file_hash: &str) -> Result<Option<Book>> {
        self.conn
            .query_row("SELECT * FROM books WHERE file_hash = ?", params![file_hash], row_to_book)
            .optional()
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    /// Looks up a book by id.
    ///
    /// # Errors
    ///
    /// Returns an error on a query/decode failure.
    pub fn get_book_by_id(&self, book_id: i64) -> Result<Option<Book>> {
        self.conn
            .query_row("SELECT * FROM books WHERE id = ?", params![book_id], row_to_book)
            .optional()
            .map_err(StorageError::from)
            .map_err(Into::into)
    }

    /// Updates a book's status.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn update_book_status(&self, book_id: i64, status: BookStatus) -> Result<()> {
        self.conn
            .execute("UPDATE books SET status = ? WHERE id = ?", params![book_status_str(status), book_id])
            .map_err(StorageError::from)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Chunks
    // ---------------------------------------------------------------

    /// Bulk-inserts `chunks` for `book_id`, ignoring rows whose
    /// `(book_id, chunk_index)` already exists — idempotent under re-runs.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn save_chunks(&self, book_id: i64, chunks: &[Chunk]) -> Result<()> {
        let tx = self.conn.unchecked_transaction().map_err(StorageError::from)?;
        for chunk in chunks {
            tx.execute(
                "INSERT OR IGNORE INTO chunks
                    (book_id, chunk_index, original, token_estimated, source_section, status, flags)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
                params![
                    book_id,
                    chunk.index as i64,
                    chunk.original,
                    chunk.token_estimated as i64,
                    chunk.source_section as i64,
                    chunk_status_str(chunk.status),
                    serde_json::to_string(&chunk.flags).map_err(StorageError::from)?,
                ],
            )
            .map_err(StorageError::from)?;
        }
        tx.commit().map_err(StorageError::from)?;
        Ok(())
    }

    /// Pending chunks for `book_id`, ordered by index ascending.
    ///
    /// # Errors
    ///
    /// Returns an error on a query/decode failure.
    pub fn get_pending_chunks(&self, book_id: i64) -> Result<Vec<Chunk>> {
        self.chunks_with_status_filter(book_id, Some(ChunkStatus::Pending))
    }

    /// All chunks for `book_id`, ordered by index ascending.
    ///
    /// # Errors
    ///
    /// Returns an error on a query/decode failure.
    pub fn get_all_chunks(&self, book_id: i64) -> Result<Vec<Chunk>> {
        self.chunks_with_status_filter(book_id, None)
    }

    fn chunks_with_status_filter(&self, book_id: i64, status: Option<ChunkStatus>) -> Result<Vec<Chunk>> {
        let mut stmt = if status.is_some() {
            self.conn
                .prepare("SELECT * FROM chunks WHERE book_id = ? AND status = ? ORDER BY chunk_index ASC")
                .map_err(StorageError::from)?
        } else {
            self.conn.prepare("SELECT * FROM chunks WHERE book_id = ? ORDER BY chunk_index ASC").map_err(StorageError::from)?
        };

        let rows = if let Some(status) = status {
            stmt.query_map(params![book_id, chunk_status_str(status)], row_to_chunk)
        } else {
            stmt.query_map(params![book_id], row_to_chunk)
        }
        .map_err(StorageError::from)?;

        rows.collect::<std::result::Result<Vec<_>, _>>().map_err(StorageError::from).map_err(Into::into)
    }

    /// Atomically persists a chunk's translation, model, confidence, and
    /// status in one statement.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn update_chunk_translation(&self, chunk_id: i64, translated: &str, model_used: &str, confidence: f64, status: ChunkStatus) -> Result<()> {
        self.conn
            .execute(
                "UPDATE chunks SET translated = ?, model_used = ?, confidence = ?, status = ? WHERE id = ?",
                params![translated, model_used, confidence, chunk_status_str(status), chunk_id],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Marks a chunk flagged, replacing its flags list.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn flag_chunk(&self, chunk_id: i64, flags: &[String]) -> Result<()> {
        let flags_json = serde_json::to_string(flags).map_err(StorageError::from)?;
        self.conn
            .execute(
                "UPDATE chunks SET flags = ?, status = ? WHERE id = ?",
                params![flags_json, chunk_status_str(ChunkStatus::Flagged), chunk_id],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Bible
    // ---------------------------------------------------------------

    /// Saves `bible` as a new version (max existing version + 1) for
    /// `book_id`, returning the assigned version number.
    ///
    /// # Errors
    ///
    /// Returns an error on a serialization or query failure.
    pub fn save_bible(&self, book_id: i64, bible: &BookBible) -> Result<u32> {
        let current_max: Option<i64> = self
            .conn
            .query_row("SELECT MAX(version) FROM bible WHERE book_id = ?", params![book_id], |row| row.get(0))
            .map_err(StorageError::from)?;
        let next_version = current_max.unwrap_or(0) + 1;
        let content_json = serde_json::to_string(bible).map_err(StorageError::from)?;
        self.conn
            .execute(
                "INSERT INTO bible (book_id, version, content_json, updated_at) VALUES (?, ?, ?, ?)",
                params![book_id, next_version, content_json, now()],
            )
            .map_err(StorageError::from)?;
        Ok(next_version as u32)
    }

    /// Fetches the highest-versioned bible for `book_id`, if any exists.
    ///
    /// # Errors
    ///
    /// Returns an error on a query/deserialization failure.
    pub fn get_latest_bible(&self, book_id: i64) -> Result<Option<BookBible>> {
        let content_json: Option<String> = self
            .conn
            .query_row(
                "SELECT content_json FROM bible WHERE book_id = ? ORDER BY version DESC LIMIT 1",
                params![book_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;
        match content_json {
            Some(json) => Ok(Some(serde_json::from_str(&json).map_err(StorageError::from)?)),
            None => Ok(None),
        }
    }

    // ---------------------------------------------------------------
    // Quota
    // ---------------------------------------------------------------

    /// Increments today's token usage for `model` by `tokens` (upsert).
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn add_token_usage(&self, model: &str, tokens: u32) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO quota_usage (model, date, tokens_used) VALUES (?, ?, ?)
                 ON CONFLICT (model, date) DO UPDATE SET tokens_used = tokens_used + excluded.tokens_used",
                params![model, today(), tokens],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    /// Tokens consumed by `model` today.
    ///
    /// # Errors
    ///
    /// Returns an error on a query failure.
    pub fn get_token_usage_today(&self, model: &str) -> Result<u64> {
        let tokens: Option<i64> = self
            .conn
            .query_row("SELECT tokens_used FROM quota_usage WHERE model = ? AND date = ?", params![model, today()], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        Ok(tokens.unwrap_or(0) as u64)
    }
}

impl QuotaSource for Repository {
    fn tokens_used_today(&self, model: &str) -> u64 {
        self.get_token_usage_today(model).unwrap_or(0)
    }
}

fn today() -> String {
    let secs = std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    let days = secs / 86_400;
    civil_date_from_epoch_days(days as i64)
}

fn now() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| d.as_secs() as i64)
}

/// Converts a days-since-epoch count into an ISO `YYYY-MM-DD` string
/// using the proleptic Gregorian calendar (Howard Hinnant's algorithm),
/// avoiding a dependency on a full datetime crate for one quota key.
fn civil_date_from_epoch_days(days: i64) -> String {
    let z = days + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    format!("{y:04}-{m:02}-{d:02}")
}

fn book_status_str(status: BookStatus) -> &'static str {
    match status {
        BookStatus::InProgress => "in_progress",
        BookStatus::Review => "review",
        BookStatus::Done => "done",
    }
}

fn book_status_from_str(value: &str) -> BookStatus {
    match value {
        "done" => BookStatus::Done,
        "review" => BookStatus::Review,
        _ => BookStatus::InProgress,
    }
}

fn book_mode_from_str(value: &str) -> BookMode {
    match value {
        "fix" => BookMode::Fix,
        "polish" => BookMode::Polish,
        _ => BookMode::Translate,
    }
}

fn chunk_status_str(status: ChunkStatus) -> &'static str {
    match status {
        ChunkStatus::Pending => "pending",
        ChunkStatus::Done => "done",
        ChunkStatus::Flagged => "flagged",
        ChunkStatus::Reviewed => "reviewed",
    }
}

fn chunk_status_from_str(value: &str) -> ChunkStatus {
    match value {
        "done" => ChunkStatus::Done,
        "flagged" => ChunkStatus::Flagged,
        "reviewed" => ChunkStatus::Reviewed,
        _ => ChunkStatus::Pending,
    }
}

fn row_to_book(row: &rusqlite::Row) -> rusqlite::Result<Book> {
    Ok(Book {
        id: Some(row.get("id")?),
        file_hash: row.get("file_hash")?,
        title: row.get("title")?,
        source_lang: row.get("source_lang")?,
        target_lang: row.get("target_lang")?,
        mode: book_mode_from_str(&row.get::<_, String>("mode")?),
        status: book_status_from_str(&row.get::<_, String>("status")?),
        created_at: row.get("created_at")?,
    })
}

fn row_to_chunk(row: &rusqlite::Row) -> rusqlite::Result<Chunk> {
    let flags_json: String = row.get("flags")?;
    let flags: Vec<String> = serde_json::from_str(&flags_json).unwrap_or_default();
    Ok(Chunk {
        id: Some(row.get("id")?),
        book_id: Some(row.get("book_id")?),
        index: row.get::<_, i64>("chunk_index")? as usize,
        original: row.get("original")?,
        translated: row.get("translated")?,
        token_estimated: row.get::<_, i64>("token_estimated")? as usize,
        source_section: row.get::<_, i64>("source_section")? as usize,
        model_used: row.get("model_used")?,
        confidence: row.get("confidence")?,
        status: chunk_status_from_str(&row.get::<_, String>("status")?),
        flags,
    })
}

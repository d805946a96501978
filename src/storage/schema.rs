//! Database schema for the book pipeline.

/// Current schema version.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

/// SQL schema for initial database setup. Idempotent.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_info (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS books (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL,
    source_lang TEXT,
    target_lang TEXT,
    mode        TEXT    NOT NULL DEFAULT 'translate',
    status      TEXT    NOT NULL DEFAULT 'in_progress',
    file_hash   TEXT    NOT NULL UNIQUE,
    created_at  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS chunks (
    id              INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id         INTEGER NOT NULL,
    chunk_index     INTEGER NOT NULL,
    original        TEXT    NOT NULL,
    translated      TEXT,
    token_estimated INTEGER NOT NULL DEFAULT 0,
    source_section  INTEGER NOT NULL DEFAULT 0,
    model_used      TEXT,
    confidence      REAL,
    status          TEXT    NOT NULL DEFAULT 'pending',
    flags           TEXT    NOT NULL DEFAULT '[]',
    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
    UNIQUE (book_id, chunk_index)
);

CREATE INDEX IF NOT EXISTS idx_chunks_book_order ON chunks(book_id, chunk_index);
CREATE INDEX IF NOT EXISTS idx_chunks_book_status ON chunks(book_id, status);

CREATE TABLE IF NOT EXISTS bible (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    book_id      INTEGER NOT NULL,
    version      INTEGER NOT NULL DEFAULT 1,
    content_json TEXT    NOT NULL,
    updated_at   INTEGER NOT NULL,
    FOREIGN KEY (book_id) REFERENCES books(id) ON DELETE CASCADE,
    UNIQUE (book_id, version)
);

CREATE TABLE IF NOT EXISTS quota_usage (
    model       TEXT    NOT NULL,
    date        TEXT    NOT NULL,
    tokens_used INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (model, date)
);
";

/// SQL to check if schema is initialized.
pub const CHECK_SCHEMA_SQL: &str = r"
SELECT COUNT(*) FROM sqlite_master
WHERE type='table' AND name='schema_info';
";

/// SQL to get schema version.
pub const GET_VERSION_SQL: &str = r"
SELECT value FROM schema_info WHERE key = 'version';
";

/// SQL to set schema version.
pub const SET_VERSION_SQL: &str = r"
INSERT OR REPLACE INTO schema_info (key, value) VALUES ('version', ?);
";

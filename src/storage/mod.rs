//! Persistence: the `SQLite`-backed repository for books, chunks, bibles,
//! and daily model quotas.

pub mod repository;
pub mod schema;

pub use repository::Repository;
pub use schema::{CURRENT_SCHEMA_VERSION, SCHEMA_SQL};

use std::path::PathBuf;

/// Default database file name.
pub const DEFAULT_DB_NAME: &str = "tradnovela.db";

/// Resolves the default database path: `$XDG_DATA_HOME/tradnovela/tradnovela.db`
/// (or the platform equivalent via [`dirs::data_dir`]).
///
/// Resolution order used by callers: explicit `--db` flag →
/// `TRADNOVELA_DB_PATH` env var → this default.
#[must_use]
pub fn default_db_path() -> PathBuf {
    std::env::var("TRADNOVELA_DB_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("tradnovela").join(DEFAULT_DB_NAME)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_db_path_ends_with_db_name() {
        // SAFETY: test-local env mutation, no concurrent access in this test.
        unsafe {
            std::env::remove_var("TRADNOVELA_DB_PATH");
        }
        assert!(default_db_path().ends_with(DEFAULT_DB_NAME));
    }

    #[test]
    fn default_db_path_honors_env_override() {
        // SAFETY: test-local env mutation, no concurrent access in this test.
        unsafe {
            std::env::set_var("TRADNOVELA_DB_PATH", "/tmp/custom.db");
        }
        assert_eq!(default_db_path(), PathBuf::from("/tmp/custom.db"));
        unsafe {
            std::env::remove_var("TRADNOVELA_DB_PATH");
        }
    }
}

//! Reassembles a book's stored chunks into the final output manuscript.
//!
//! Knows nothing about models, parsers, or translation: given a book id
//! it reads chunks back out in order and writes one text file.

use std::path::{Path, PathBuf};

use crate::core::{Chunk, ChunkStatus};
use crate::error::{IoError, Result, StorageError};
use crate::storage::Repository;

const REVIEW_MARKER: &str = "[⚠ PENDIENTE DE REVISION]\n";

/// Writes a book's chunks back out as one manuscript file.
pub struct Reconstructor<'a> {
    repo: &'a Repository,
    output_dir: PathBuf,
}

impl<'a> Reconstructor<'a> {
    /// Creates a reconstructor writing under `output_dir`.
    #[must_use]
    pub fn new(repo: &'a Repository, output_dir: PathBuf) -> Self {
        Self { repo, output_dir }
    }

    /// Builds the output file for `book_id` under `output_filename` and
    /// returns its path.
    ///
    /// Chunks are read back already ordered by index. A paragraph break is
    /// inserted wherever `source_section` changes, preserving the original
    /// structural divisions (chapters, EPUB spine items). A `Flagged`
    /// chunk with no translation falls back to the original text behind a
    /// visible review marker rather than silently dropping content.
    ///
    /// # Errors
    ///
    /// Returns an error if the book has no chunks, the output directory
    /// cannot be created, or the file cannot be written.
    pub fn build(&self, book_id: i64, output_filename: &str) -> Result<PathBuf> {
        let chunks = self.repo.get_all_chunks(book_id)?;
        if chunks.is_empty() {
            return Err(StorageError::BookNotFound {
                identifier: book_id.to_string(),
            }
            .into());
        }

        std::fs::create_dir_all(&self.output_dir).map_err(|e| IoError::DirectoryFailed {
            path: self.output_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let output_path = self.output_dir.join(output_filename);
        let body = Self::render(&chunks);
        std::fs::write(&output_path, body).map_err(|e| IoError::WriteFailed {
            path: output_path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(output_path)
    }

    fn render(chunks: &[Chunk]) -> String {
        let mut parts: Vec<String> = Vec::new();
        let mut prev_section: Option<usize> = None;

        for chunk in chunks {
            if let Some(prev) = prev_section {
                if prev != chunk.source_section {
                    parts.push(String::new());
                }
            }
            parts.push(resolve_chunk_text(chunk));
            prev_section = Some(chunk.source_section);
        }

        parts.join("\n\n")
    }
}

fn resolve_chunk_text(chunk: &Chunk) -> String {
    if let Some(translated) = &chunk.translated {
        return translated.clone();
    }
    if chunk.status == ChunkStatus::Flagged {
        return format!("{REVIEW_MARKER}{}", chunk.original);
    }
    chunk.original.clone()
}

/// Default output directory: `$XDG_DATA_HOME/tradnovela/output` (or the
/// platform equivalent), overridable via `TRADNOVELA_OUTPUT_DIR`.
#[must_use]
pub fn default_output_dir() -> PathBuf {
    std::env::var("TRADNOVELA_OUTPUT_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("tradnovela").join("output"))
}

/// Converts a title into a filesystem-safe slug: lowercase, non-word
/// characters stripped, whitespace collapsed to underscores.
#[must_use]
pub fn slugify(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped: String = lowered.chars().filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-').collect();
    stripped.split_whitespace().collect::<Vec<_>>().join("_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{Book, BookMode};

    fn repo_with_book() -> (Repository, i64) {
        let repo = Repository::in_memory().unwrap();
        let book = Book::new("h".into(), "Titulo".into(), "en".into(), BookMode::Translate, 1);
        let id = repo.create_book(&book).unwrap();
        (repo, id)
    }

    #[test]
    fn missing_book_is_an_error() {
        let (repo, _) = repo_with_book();
        let dir = tempfile::tempdir().unwrap();
        let reconstructor = Reconstructor::new(&repo, dir.path().to_path_buf());
        assert!(reconstructor.build(9999, "out.txt").is_err());
    }

    #[test]
    fn prefers_translation_over_original() {
        let (repo, book_id) = repo_with_book();
        repo.save_chunks(book_id, &[Chunk::new(0, "orig".into(), 0, 1)]).unwrap();
        let chunk_id = repo.get_all_chunks(book_id).unwrap()[0].id.unwrap();
        repo.update_chunk_translation(chunk_id, "traducido", "m", 0.9, ChunkStatus::Done).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let reconstructor = Reconstructor::new(&repo, dir.path().to_path_buf());
        let path = reconstructor.build(book_id, "out.txt").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents, "traducido");
    }

    #[test]
    fn flagged_without_translation_gets_review_marker() {
        let (repo, book_id) = repo_with_book();
        repo.save_chunks(book_id, &[Chunk::new(0, "orig".into(), 0, 1)]).unwrap();
        let chunk_id = repo.get_all_chunks(book_id).unwrap()[0].id.unwrap();
        repo.flag_chunk(chunk_id, &["error".to_string()]).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let reconstructor = Reconstructor::new(&repo, dir.path().to_path_buf());
        let path = reconstructor.build(book_id, "out.txt").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert!(contents.contains("PENDIENTE DE REVISION"));
        assert!(contents.contains("orig"));
    }

    #[test]
    fn section_change_inserts_paragraph_break() {
        let (repo, book_id) = repo_with_book();
        let chunks = vec![Chunk::new(0, "uno".into(), 0, 1), Chunk::new(1, "dos".into(), 1, 1)];
        repo.save_chunks(book_id, &chunks).unwrap();
        for chunk in repo.get_all_chunks(book_id).unwrap() {
            repo.update_chunk_translation(chunk.id.unwrap(), chunk.best_text(), "m", 0.9, ChunkStatus::Done).unwrap();
        }

        let dir = tempfile::tempdir().unwrap();
        let reconstructor = Reconstructor::new(&repo, dir.path().to_path_buf());
        let path = reconstructor.build(book_id, "out.txt").unwrap();
        let contents = std::fs::read_to_string(path).unwrap();
        assert_eq!(contents, "uno\n\n\n\ndos");
    }

    #[test]
    fn slugify_strips_punctuation_and_joins_with_underscores() {
        assert_eq!(slugify("El Nombre del Viento!"), "el_nombre_del_viento");
    }
}

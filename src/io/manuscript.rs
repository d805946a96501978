//! Splits a raw manuscript file into ordered sections the chunker can
//! walk independently.
//!
//! Two strategies, tried in order:
//! 1. Chapter markers (`Chapter 3`, `Capitulo IV`, `***`, `---`, markdown
//!    headings) — if at least two lines match, split on them.
//! 2. Blank-line paragraph blocks, merging any block under 40 words into
//!    the next one so a lone short paragraph never becomes its own chunk.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{IoError, Result};

static CHAPTER_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)^\s*(chapter|capitulo|capítulo|chapitre|kapitel)\s+[\divxlc]+").expect("fixed literal"),
        Regex::new(r"(?i)^\s*(chapter|capitulo|capítulo)\s+\w+").expect("fixed literal"),
        Regex::new(r"(?i)^\s*[\divxlc]{1,6}[.\-)]\s").expect("fixed literal"),
        Regex::new(r"^\s*\*{3,}\s*$").expect("fixed literal"),
        Regex::new(r"^\s*-{3,}\s*$").expect("fixed literal"),
        Regex::new(r"^\s*#{1,3}\s+\w").expect("fixed literal"),
    ]
});

const MIN_PARAGRAPH_WORDS: usize = 40;

/// A manuscript split into ordered sections, ready for chunking.
#[derive(Debug, Clone)]
pub struct RawManuscript {
    /// Title derived from the first line, or the file stem.
    pub title: String,
    /// Ordered text sections.
    pub sections: Vec<String>,
}

/// Reads and splits the manuscript at `path`. Only `.txt`/`.md` are
/// understood; anything else returns an [`IoError::ReadFailed`].
///
/// # Errors
///
/// Returns an error if the file cannot be read as UTF-8/Latin-1 text or
/// has an unsupported extension.
pub fn parse_manuscript(path: &Path) -> Result<RawManuscript> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default().to_lowercase();
    if ext != "txt" && ext != "md" {
        return Err(IoError::ReadFailed {
            path: path.display().to_string(),
            reason: format!("unsupported manuscript extension: .{ext}"),
        }
        .into());
    }

    let raw = read_text_lossy(path)?;
    let title = extract_title(&raw, path);
    let sections = split_sections(&raw);
    Ok(RawManuscript { title, sections })
}

fn read_text_lossy(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| IoError::ReadFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(String::from_utf8(bytes).unwrap_or_else(|e| e.into_bytes().iter().map(|&b| b as char).collect()))
}

fn extract_title(text: &str, path: &Path) -> String {
    let first_line = text.trim().lines().next().unwrap_or("").trim().trim_start_matches('#').trim();
    let word_count = first_line.split_whitespace().count();
    if word_count > 0 && word_count <= 10 && !first_line.ends_with('.') {
        return first_line.to_string();
    }
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("untitled").to_string()
}

fn split_sections(text: &str) -> Vec<String> {
    if has_chapter_markers(text) { split_by_chapters(text) } else { split_by_paragraphs(text) }
}

fn has_chapter_markers(text: &str) -> bool {
    let mut matches = 0;
    for line in text.lines() {
        if CHAPTER_PATTERNS.iter().any(|p| p.is_match(line)) {
            matches += 1;
            if matches >= 2 {
                return true;
            }
        }
    }
    false
}

fn split_by_chapters(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        let is_boundary = CHAPTER_PATTERNS.iter().any(|p| p.is_match(line));
        if is_boundary && !current.is_empty() {
            let section = current.join("\n").trim().to_string();
            if !section.is_empty() {
                sections.push(section);
            }
            current = vec![line];
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        let section = current.join("\n").trim().to_string();
        if !section.is_empty() {
            sections.push(section);
        }
    }

    if sections.is_empty() { vec![text.trim().to_string()] } else { sections }
}

fn split_by_paragraphs(text: &str) -> Vec<String> {
    let blocks: Vec<&str> = text.split("\n\n").map(str::trim).filter(|b| !b.is_empty()).collect();

    let mut merged: Vec<String> = Vec::new();
    let mut buffer = String::new();

    for block in blocks {
        buffer = if buffer.is_empty() { block.to_string() } else { format!("{buffer}\n\n{block}").trim().to_string() };
        if buffer.split_whitespace().count() >= MIN_PARAGRAPH_WORDS {
            merged.push(std::mem::take(&mut buffer));
        }
    }
    if !buffer.is_empty() {
        if let Some(last) = merged.last_mut() {
            last.push_str("\n\n");
            last.push_str(&buffer);
        } else {
            merged.push(buffer);
        }
    }

    if merged.is_empty() { vec![text.trim().to_string()] } else { merged }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &str, ext: &str) -> tempfile::TempPath {
        let mut file = tempfile::Builder::new().suffix(ext).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.into_temp_path()
    }

    #[test]
    fn rejects_unsupported_extension() {
        let path = write_temp("hello", ".bin");
        assert!(parse_manuscript(&path).is_err());
    }

    #[test]
    fn splits_on_chapter_markers() {
        let text = "Capitulo 1\n\nTexto uno.\n\nCapitulo 2\n\nTexto dos.\n";
        let path = write_temp(text, ".txt");
        let manuscript = parse_manuscript(&path).unwrap();
        assert_eq!(manuscript.sections.len(), 2);
        assert!(manuscript.sections[0].starts_with("Capitulo 1"));
    }

    #[test]
    fn falls_back_to_paragraph_blocks_without_markers() {
        let long_block = "palabra ".repeat(45);
        let text = format!("{long_block}\n\n{long_block}");
        let path = write_temp(&text, ".md");
        let manuscript = parse_manuscript(&path).unwrap();
        assert_eq!(manuscript.sections.len(), 2);
    }

    #[test]
    fn short_trailing_block_merges_into_previous() {
        let long_block = "palabra ".repeat(45);
        let text = format!("{long_block}\n\nmuy corto");
        let path = write_temp(&text, ".txt");
        let manuscript = parse_manuscript(&path).unwrap();
        assert_eq!(manuscript.sections.len(), 1);
        assert!(manuscript.sections[0].contains("muy corto"));
    }

    #[test]
    fn title_prefers_short_first_line() {
        let text = "El Nombre del Viento\n\nCapitulo 1\n\nTexto.";
        let path = write_temp(text, ".txt");
        let manuscript = parse_manuscript(&path).unwrap();
        assert_eq!(manuscript.title, "El Nombre del Viento");
    }

    #[test]
    fn title_falls_back_to_file_stem_for_long_first_line() {
        let text = "Esta es una primera linea demasiado larga para ser un titulo valido.\n\nTexto.";
        let path = write_temp(text, ".txt");
        let manuscript = parse_manuscript(&path).unwrap();
        assert_eq!(manuscript.title, path.file_stem().unwrap().to_str().unwrap());
    }
}

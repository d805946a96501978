//! Drives a book from raw manuscript to reconstructed output.
//!
//! Holds no business logic of its own beyond sequencing: resolve book
//! identity by content hash, chunk if new, dispatch every pending chunk
//! through the router, fold what came back into the bible, and hand the
//! result to the [`crate::reconstructor::Reconstructor`]. A single
//! chunk's failure never aborts a run — it gets flagged and the loop
//! continues; quota exhaustion across every model pauses the run instead,
//! leaving the remaining chunks `Pending` for the next invocation.

mod align;

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::chunking::{chunk_sections, ChunkConfig, SimpleTokenEstimator, TokenEstimator};
use crate::context::{
    extract_character_mentions, BibleCompressor, BibleExtraction, NoopExtractor,
};
use crate::core::bible::{BibleUpdate, DEFAULT_VOICE, PLACEHOLDER_DESCRIPTION};
use crate::core::{Book, BookBible, BookMode, BookStatus, Chunk, ChunkStatus};
use crate::error::{Error, IoError, OrchestratorError, Result, RouterError, StorageError};
use crate::io::parse_manuscript;
use crate::reconstructor::{default_output_dir, slugify, Reconstructor};
use crate::router::{build_fix_prompt, build_polish_prompt, build_translate_prompt, ModelResponse, PromptContext, Router};
use crate::storage::Repository;

/// At most this many freshly detected character candidates are surfaced
/// to the extractor per chunk; a single fragment naming a crowd of
/// extras is not worth enriching them all.
const MAX_CHARACTER_CANDIDATES: usize = 8;

const DECISION_KEYWORDS: &[&str] = &[
    "mantener", "preservar", "adaptar", "traducir", "estilo", "tono", "registro", "consistencia",
    "voz", "narrador", "tiempo verbal", "perspectiva", "tutear", "ustedear", "nombre propio", "termino",
];
const MAX_DECISIONS_FROM_NOTES: usize = 5;
const MAX_SCENE_DIGEST_CHARS: usize = 280;

/// Outcome of one end-to-end run, resumed or otherwise.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PipelineResult {
    /// Database id of the processed book.
    pub book_id: i64,
    /// Where the reconstructed manuscript was written.
    pub output_path: PathBuf,
    /// Total chunks the book has, across every prior run.
    pub total_chunks: usize,
    /// Chunks currently `Done` or `Reviewed`.
    pub translated: usize,
    /// Chunks currently `Flagged`.
    pub flagged: usize,
    /// Whether this call resumed a book created by a previous invocation.
    pub was_resumed: bool,
}

/// Coordinates parsing, chunking, model dispatch, bible maintenance, and
/// reconstruction for one book at a time.
pub struct Orchestrator {
    repo: Repository,
    router: Router,
    chunk_config: ChunkConfig,
    token_estimator: Box<dyn TokenEstimator>,
    compressor: BibleCompressor,
    extractor: Box<dyn BibleExtraction>,
    output_dir: PathBuf,
}

impl Orchestrator {
    /// Creates an orchestrator with the standard chunk budget, a no-op
    /// extractor, and the default output directory.
    #[must_use]
    pub fn new(repo: Repository, router: Router) -> Self {
        Self {
            repo,
            router,
            chunk_config: ChunkConfig::standard(),
            token_estimator: Box::new(SimpleTokenEstimator),
            compressor: BibleCompressor,
            extractor: Box::new(NoopExtractor),
            output_dir: default_output_dir(),
        }
    }

    /// Replaces the no-op extractor with a model-backed one.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Box<dyn BibleExtraction>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Overrides where reconstructed manuscripts are written.
    #[must_use]
    pub fn with_output_dir(mut self, output_dir: PathBuf) -> Self {
        self.output_dir = output_dir;
        self
    }

    /// Overrides the chunk size/overlap budget.
    #[must_use]
    pub fn with_chunk_config(mut self, chunk_config: ChunkConfig) -> Self {
        self.chunk_config = chunk_config;
        self
    }

    /// Translates `file_path` from `source_lang` to `target_lang`.
    ///
    /// Calling this twice on the same bytes resumes the first run instead
    /// of starting a second one.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the book is already
    /// fully done, or a storage operation fails.
    pub fn run(&mut self, file_path: &Path, source_lang: &str, target_lang: &str) -> Result<PipelineResult> {
        let bytes = read_file(file_path)?;
        let file_hash = Book::compute_hash(&bytes);

        let (book_id, was_resumed) = match self.repo.get_book_by_hash(&file_hash)? {
            Some(existing) => {
                self.assert_book_can_run(&existing)?;
                let resumed_id = existing.id.expect("persisted book has id");
                info!(book_id = resumed_id, title = %existing.title, "resuming translate run");
                (resumed_id, true)
            }
            None => {
                let manuscript = parse_manuscript(file_path)?;
                let chunks = chunk_sections(&manuscript.sections, self.chunk_config.clone(), self.token_estimator.as_ref());
                let mut book = Book::new(file_hash, manuscript.title.clone(), target_lang.to_string(), BookMode::Translate, now());
                book.source_lang = Some(source_lang.to_string());
                let book_id = self.repo.create_book(&book)?;
                self.repo.save_chunks(book_id, &chunks)?;
                info!(book_id, title = %manuscript.title, chunks = chunks.len(), "new translate book created");
                (book_id, false)
            }
        };

        let pending = self.repo.get_pending_chunks(book_id)?;
        if pending.is_empty() {
            return self.finish(book_id, was_resumed);
        }

        let mut bible = self.load_or_init_bible(book_id)?;
        self.process_translate(book_id, pending, source_lang, target_lang, &mut bible)?;
        self.finish(book_id, was_resumed)
    }

    /// Corrects an existing translation against its source text.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be read, the book is
    /// already fully done, or a storage operation fails.
    pub fn run_fix(&mut self, original_path: &Path, translation_path: &Path, source_lang: &str, target_lang: &str) -> Result<PipelineResult> {
        let source_bytes = read_file(original_path)?;
        let draft_bytes = read_file(translation_path)?;
        let file_hash = Book::compute_fix_hash(&source_bytes, &draft_bytes);

        let source_manuscript = parse_manuscript(original_path)?;
        let source_chunks = chunk_sections(&source_manuscript.sections, self.chunk_config.clone(), self.token_estimator.as_ref());

        let (book_id, was_resumed) = match self.repo.get_book_by_hash(&file_hash)? {
            Some(existing) => {
                self.assert_book_can_run(&existing)?;
                let resumed_id = existing.id.expect("persisted book has id");
                info!(book_id = resumed_id, title = %existing.title, "resuming fix run");
                (resumed_id, true)
            }
            None => {
                let draft_manuscript = parse_manuscript(translation_path)?;
                let aligned = align::align_translation_by_reference_chunks(&source_chunks, &draft_manuscript.sections);
                let staged: Vec<Chunk> = source_chunks
                    .iter()
                    .enumerate()
                    .map(|(i, reference)| Chunk::new(reference.index, aligned.get(i).cloned().unwrap_or_default(), reference.source_section, reference.token_estimated))
                    .collect();

                let mut book = Book::new(file_hash, draft_manuscript.title.clone(), target_lang.to_string(), BookMode::Fix, now());
                book.source_lang = Some(source_lang.to_string());
                let book_id = self.repo.create_book(&book)?;
                self.repo.save_chunks(book_id, &staged)?;
                info!(book_id, title = %draft_manuscript.title, chunks = staged.len(), "new fix book created");
                (book_id, false)
            }
        };

        let pending = self.repo.get_pending_chunks(book_id)?;
        if pending.is_empty() {
            return self.finish(book_id, was_resumed);
        }

        let source_by_index: HashMap<usize, String> = source_chunks.into_iter().map(|c| (c.index, c.original)).collect();
        let mut bible = self.load_or_init_bible(book_id)?;
        self.process_fix(book_id, pending, &source_by_index, source_lang, target_lang, &mut bible)?;
        self.finish(book_id, was_resumed)
    }

    /// Polishes an existing translation's prose with no source to compare
    /// against.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the book is already
    /// fully done, or a storage operation fails.
    pub fn run_fix_style(&mut self, translation_path: &Path, target_lang: &str) -> Result<PipelineResult> {
        let draft_bytes = read_file(translation_path)?;
        let file_hash = Book::compute_fix_style_hash(target_lang, &draft_bytes);

        let (book_id, was_resumed) = match self.repo.get_book_by_hash(&file_hash)? {
            Some(existing) => {
                self.assert_book_can_run(&existing)?;
                let resumed_id = existing.id.expect("persisted book has id");
                info!(book_id = resumed_id, title = %existing.title, "resuming polish run");
                (resumed_id, true)
            }
            None => {
                let manuscript = parse_manuscript(translation_path)?;
                let chunks = chunk_sections(&manuscript.sections, self.chunk_config.clone(), self.token_estimator.as_ref());
                let book = Book::new(file_hash, manuscript.title.clone(), target_lang.to_string(), BookMode::Polish, now());
                let book_id = self.repo.create_book(&book)?;
                self.repo.save_chunks(book_id, &chunks)?;
                info!(book_id, title = %manuscript.title, chunks = chunks.len(), "new polish book created");
                (book_id, false)
            }
        };

        let pending = self.repo.get_pending_chunks(book_id)?;
        if pending.is_empty() {
            return self.finish(book_id, was_resumed);
        }

        let mut bible = self.load_or_init_bible(book_id)?;
        self.process_polish(book_id, pending, target_lang, &mut bible)?;
        self.finish(book_id, was_resumed)
    }

    fn process_translate(&mut self, book_id: i64, pending: Vec<Chunk>, source_lang: &str, target_lang: &str, bible: &mut BookBible) -> Result<()> {
        let total = pending.len();
        for (i, chunk) in pending.into_iter().enumerate() {
            let compressed = self.compressor.compress(bible, &chunk.original);
            let ctx = prompt_context(&compressed);
            let system_prompt = build_translate_prompt(source_lang, target_lang, &ctx);

            match self.router.translate(&chunk.original, &system_prompt, &self.repo) {
                Ok(response) => {
                    self.absorb_response(book_id, &chunk, &chunk.original, &response, bible)?;
                    info!(progress = format!("{}/{total}", i + 1), model = %response.model_used, confidence = response.confidence, "chunk translated");
                }
                Err(Error::Router(RouterError::AllModelsExhausted)) => {
                    warn!(chunk = chunk.index, "all models exhausted, pausing run");
                    break;
                }
                Err(err) => {
                    self.repo.flag_chunk(chunk.id.expect("persisted chunk has id"), &[format!("error: {err}")])?;
                }
            }
        }
        Ok(())
    }

    fn process_fix(&mut self, book_id: i64, pending: Vec<Chunk>, source_by_index: &HashMap<usize, String>, source_lang: &str, target_lang: &str, bible: &mut BookBible) -> Result<()> {
        let total = pending.len();
        for (i, chunk) in pending.into_iter().enumerate() {
            let source_chunk = source_by_index.get(&chunk.index).map(String::as_str).unwrap_or_default();
            let draft_chunk = chunk.original.as_str();
            if source_chunk.is_empty() {
                warn!(chunk = chunk.index, "fix chunk has no reference original, correcting from draft alone");
            }
            let reference_text = if source_chunk.is_empty() { draft_chunk } else { source_chunk };

            let compressed = self.compressor.compress(bible, reference_text);
            let ctx = prompt_context(&compressed);
            let system_prompt = build_fix_prompt(source_lang, target_lang, &ctx);
            let user_payload = build_fix_payload(source_chunk, draft_chunk, source_lang, target_lang);

            match self.router.translate(&user_payload, &system_prompt, &self.repo) {
                Ok(response) => {
                    self.absorb_response(book_id, &chunk, reference_text, &response, bible)?;
                    info!(progress = format!("{}/{total}", i + 1), model = %response.model_used, confidence = response.confidence, "chunk fixed");
                }
                Err(Error::Router(RouterError::AllModelsExhausted)) => {
                    warn!(chunk = chunk.index, "all models exhausted, pausing fix run");
                    break;
                }
                Err(err) => {
                    self.repo.flag_chunk(chunk.id.expect("persisted chunk has id"), &[format!("error: {err}")])?;
                }
            }
        }
        Ok(())
    }

    fn process_polish(&mut self, book_id: i64, pending: Vec<Chunk>, target_lang: &str, bible: &mut BookBible) -> Result<()> {
        let total = pending.len();
        for (i, chunk) in pending.into_iter().enumerate() {
            let compressed = self.compressor.compress(bible, &chunk.original);
            let ctx = prompt_context(&compressed);
            let system_prompt = build_polish_prompt(target_lang, &ctx);
            let user_payload = build_polish_payload(&chunk.original, target_lang);

            match self.router.translate(&user_payload, &system_prompt, &self.repo) {
                Ok(response) => {
                    self.absorb_response(book_id, &chunk, &chunk.original, &response, bible)?;
                    info!(progress = format!("{}/{total}", i + 1), model = %response.model_used, confidence = response.confidence, "chunk polished");
                }
                Err(Error::Router(RouterError::AllModelsExhausted)) => {
                    warn!(chunk = chunk.index, "all models exhausted, pausing polish run");
                    break;
                }
                Err(err) => {
                    self.repo.flag_chunk(chunk.id.expect("persisted chunk has id"), &[format!("error: {err}")])?;
                }
            }
        }
        Ok(())
    }

    /// Persists a successful model response and folds what it taught us
    /// about the book back into the bible, shared across all three modes.
    fn absorb_response(&mut self, book_id: i64, chunk: &Chunk, reference_text: &str, response: &ModelResponse, bible: &mut BookBible) -> Result<()> {
        let chunk_id = chunk.id.expect("persisted chunk has id");
        let status = ChunkStatus::from_confidence(response.confidence);
        self.repo.update_chunk_translation(chunk_id, &response.translation, &response.model_used, response.confidence, status)?;
        self.repo.add_token_usage(&response.model_used, response.tokens_output)?;

        let existing_characters: HashMap<String, String> = bible.characters.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let candidates = extract_character_mentions(reference_text, &response.translation, MAX_CHARACTER_CANDIDATES, &existing_characters);
        let force = has_unenriched_candidates(&candidates, bible);

        let extracted = self
            .extractor
            .extract(reference_text, &response.translation, &response.notes, chunk.index, Some(&candidates), force)
            .unwrap_or_default();

        let local = build_local_bible_update(reference_text, &response.translation, &response.notes, &bible.voice, &candidates);
        let merged = BibleUpdate::merge(local, extracted);
        bible.apply(&merged)?;
        let version = self.repo.save_bible(book_id, bible)?;
        debug!(book_id, version, "bible updated");
        Ok(())
    }

    fn load_or_init_bible(&self, book_id: i64) -> Result<BookBible> {
        if let Some(bible) = self.repo.get_latest_bible(book_id)? {
            return Ok(bible);
        }
        let bible = BookBible::default();
        let version = self.repo.save_bible(book_id, &bible)?;
        debug!(book_id, version, "initial bible created");
        Ok(bible)
    }

    /// Repairs a legacy inconsistency (marked `Done` but chunks remain
    /// `Pending`) by forcing the book back to `InProgress`; raises only
    /// when the book is genuinely finished.
    fn assert_book_can_run(&self, book: &Book) -> Result<()> {
        if book.status != BookStatus::Done {
            return Ok(());
        }
        let book_id = book.id.expect("persisted book has id");
        let pending = self.repo.get_pending_chunks(book_id)?;
        if pending.is_empty() {
            return Err(OrchestratorError::BookAlreadyDone { book_id }.into());
        }
        warn!(book_id, pending = pending.len(), "book was marked done with pending chunks, forcing resume");
        self.repo.update_book_status(book_id, BookStatus::InProgress)?;
        Ok(())
    }

    fn finish(&self, book_id: i64, was_resumed: bool) -> Result<PipelineResult> {
        let all_chunks = self.repo.get_all_chunks(book_id)?;
        let statuses: Vec<ChunkStatus> = all_chunks.iter().map(|c| c.status).collect();
        self.repo.update_book_status(book_id, Book::derive_status(&statuses))?;

        let book = self.repo.get_book_by_id(book_id)?.ok_or(StorageError::BookNotFound { identifier: book_id.to_string() })?;
        let output_filename = format!("{}_{}.txt", slugify(&book.title), book.target_lang.to_lowercase());
        let reconstructor = Reconstructor::new(&self.repo, self.output_dir.clone());
        let output_path = reconstructor.build(book_id, &output_filename)?;

        let translated = all_chunks.iter().filter(|c| matches!(c.status, ChunkStatus::Done | ChunkStatus::Reviewed)).count();
        let flagged = all_chunks.iter().filter(|c| c.status == ChunkStatus::Flagged).count();
        info!(book_id, translated, flagged, total = all_chunks.len(), output = %output_path.display(), "run finished");

        Ok(PipelineResult {
            book_id,
            output_path,
            total_chunks: all_chunks.len(),
            translated,
            flagged,
            was_resumed,
        })
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        IoError::ReadFailed {
            path: path.display().to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

fn now() -> i64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map_or(0, |d| d.as_secs() as i64)
}

fn prompt_context(bible: &BookBible) -> PromptContext<'_> {
    PromptContext {
        voice: &bible.voice,
        decisions: &bible.decisions,
        glossary: &bible.glossary,
        characters: &bible.characters,
        last_scene: &bible.last_scene,
    }
}

fn build_fix_payload(source_chunk: &str, draft_chunk: &str, source_lang: &str, target_lang: &str) -> String {
    let source_text = non_empty_or_placeholder(source_chunk);
    let draft_text = non_empty_or_placeholder(draft_chunk);
    format!(
        "TEXTO ORIGINAL ({source_lang}):\n<original>\n{source_text}\n</original>\n\n\
         TRADUCCION EXISTENTE ({target_lang}):\n<traduccion_existente>\n{draft_text}\n</traduccion_existente>"
    )
}

fn build_polish_payload(draft_chunk: &str, target_lang: &str) -> String {
    let draft_text = non_empty_or_placeholder(draft_chunk);
    format!("TRADUCCION EXISTENTE ({target_lang}):\n<traduccion_existente>\n{draft_text}\n</traduccion_existente>")
}

fn non_empty_or_placeholder(text: &str) -> &str {
    let trimmed = text.trim();
    if trimmed.is_empty() { "[VACIO]" } else { trimmed }
}

fn has_unenriched_candidates(candidates: &HashMap<String, String>, bible: &BookBible) -> bool {
    candidates.keys().any(|name| bible.characters.get(name).is_none_or(|desc| desc == PLACEHOLDER_DESCRIPTION))
}

/// Deterministic bible contribution from one chunk, independent of
/// whether the AI extractor ever runs: voice bootstrapping while the
/// bible is still at its default, locally detected character candidates,
/// notes-derived style decisions, and a scene digest for continuity.
fn build_local_bible_update(_source_text: &str, translated_text: &str, notes: &str, existing_voice: &str, candidates: &HashMap<String, String>) -> BibleUpdate {
    let voice = if existing_voice.is_empty() || existing_voice == DEFAULT_VOICE {
        Some(infer_narrative_voice(translated_text, existing_voice))
    } else {
        None
    };

    BibleUpdate {
        voice,
        characters: candidates.iter().map(|(k, v)| (k.clone(), v.clone())).collect::<BTreeMap<_, _>>(),
        decisions: extract_style_decisions(notes),
        last_scene: Some(scene_digest(translated_text)),
        ..Default::default()
    }
}

fn infer_narrative_voice(text: &str, fallback: &str) -> String {
    if text.trim().is_empty() {
        return fallback.to_string();
    }
    let lowered = format!(" {} ", text.to_lowercase());
    let first_person_hits = [" yo ", " me ", " mi ", " mi ", " conmigo ", " nosotros ", " nos "]
        .iter()
        .filter(|token| lowered.contains(*token))
        .count();
    let third_person_hits = [" el ", " ella ", " ellos ", " ellas ", " le ", " les ", " su ", " sus "]
        .iter()
        .filter(|token| lowered.contains(*token))
        .count();
    let person = if first_person_hits >= (third_person_hits + 1).max(2) { "primera persona" } else { "tercera persona" };

    let past_markers = ["fue", "era", "estaba", "habia", "dijo", "penso", "miro", "entro"];
    let present_markers = ["es", "esta", "dice", "piensa", "mira", "entra", "hay"];
    let past_hits = count_word_hits(&lowered, &past_markers);
    let present_hits = count_word_hits(&lowered, &present_markers);
    let tense = if past_hits >= present_hits { "tiempo pasado" } else { "tiempo presente" };

    format!("narrador en {person}, {tense}")
}

fn count_word_hits(text: &str, markers: &[&str]) -> usize {
    text.split_whitespace().filter(|word| markers.contains(&word.trim_matches(|c: char| !c.is_alphanumeric()))).count()
}

fn extract_style_decisions(notes: &str) -> Vec<String> {
    if notes.trim().is_empty() {
        return Vec::new();
    }
    let mut decisions = Vec::new();
    for sentence in notes.split('.') {
        let fragment = sentence.trim();
        if fragment.is_empty() {
            continue;
        }
        let lowered = fragment.to_lowercase();
        if DECISION_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
            decisions.push(fragment.to_string());
        }
        if decisions.len() >= MAX_DECISIONS_FROM_NOTES {
            break;
        }
    }
    decisions
}

fn scene_digest(text: &str) -> String {
    let clean = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if clean.is_empty() {
        return "Sin contenido suficiente para resumir la escena.".to_string();
    }
    let sentences: Vec<&str> = clean.split_inclusive(['.', '!', '?']).collect();
    let mut summary = sentences.iter().take(2).map(|s| s.trim()).collect::<Vec<_>>().join(" ").trim().to_string();
    if summary.is_empty() {
        summary = clean;
    }
    if summary.chars().count() > MAX_SCENE_DIGEST_CHARS {
        let mut truncated: String = summary.chars().take(MAX_SCENE_DIGEST_CHARS - 1).collect();
        while truncated.ends_with(' ') {
            truncated.pop();
        }
        truncated.push('…');
        return truncated;
    }
    summary
}

//! End-to-end tests against the public API: a real on-disk database
//! reopened across two `Orchestrator` instances, the way two separate
//! CLI invocations would share state.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use tempfile::TempDir;
use tradnovela::core::ChunkStatus;
use tradnovela::error::{Error, RouterError};
use tradnovela::router::{AdapterState, ModelAdapter, ModelResponse, QuotaSource, Router};
use tradnovela::storage::Repository;
use tradnovela::Orchestrator;

/// Echoes the chunk back uppercased, so translated output is easy to spot.
struct StubAdapter {
    state: AdapterState,
}

impl ModelAdapter for StubAdapter {
    fn name(&self) -> &str {
        &self.state.name
    }
    fn daily_token_limit(&self) -> u64 {
        self.state.daily_token_limit
    }
    fn is_available(&self, quota: &dyn QuotaSource) -> bool {
        self.state.is_available(quota)
    }
    fn trigger_cooldown(&self) {
        self.state.trigger_cooldown();
    }
    fn translate(&self, chunk: &str, _system_prompt: &str) -> tradnovela::Result<ModelResponse> {
        Ok(ModelResponse {
            translation: chunk.to_uppercase(),
            confidence: 0.9,
            notes: "kept the formal register".to_string(),
            model_used: self.state.name.clone(),
            tokens_input: chunk.len() as u32,
            tokens_output: chunk.len() as u32,
        })
    }
}

/// Always reports a retryable failure, so a run against it alone leaves
/// every chunk pending.
struct ExhaustedAdapter {
    state: AdapterState,
}

impl ModelAdapter for ExhaustedAdapter {
    fn name(&self) -> &str {
        &self.state.name
    }
    fn daily_token_limit(&self) -> u64 {
        self.state.daily_token_limit
    }
    fn is_available(&self, quota: &dyn QuotaSource) -> bool {
        self.state.is_available(quota)
    }
    fn trigger_cooldown(&self) {
        self.state.trigger_cooldown();
    }
    fn translate(&self, _chunk: &str, _system_prompt: &str) -> tradnovela::Result<ModelResponse> {
        Err(RouterError::Retryable {
            model: self.state.name.clone(),
            reason: "simulated outage".to_string(),
        }
        .into())
    }
}

fn orchestrator_with(db_path: &std::path::Path, output_dir: &std::path::Path, adapter: Box<dyn ModelAdapter>) -> Orchestrator {
    let repo = Repository::open(db_path).expect("open repository");
    let router = Router::new(vec![adapter]).expect("build router");
    Orchestrator::new(repo, router).with_output_dir(output_dir.to_path_buf())
}

#[test]
fn translate_persists_across_process_restarts() {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("pipeline.db");
    let input = dir.path().join("book.txt");
    std::fs::write(
        &input,
        "Capitulo 1\n\nHabia una vez un dragon de cristal que vigilaba el valle.\n\n\
         Capitulo 2\n\nUn dia, el dragon desperto y vio el mundo cambiado por completo.\n",
    )
    .expect("write input");

    {
        let mut orchestrator = orchestrator_with(
            &db_path,
            dir.path(),
            Box::new(StubAdapter { state: AdapterState::new("claude-stub".into(), 1_000_000) }),
        );
        let result = orchestrator.run(&input, "es", "en").expect("first run");
        assert!(!result.was_resumed);
        assert_eq!(result.flagged, 0);
        assert_eq!(result.translated, result.total_chunks);
    }

    // Reopen the same database as a fresh process would, and confirm the
    // second run resumes the already-completed book instead of duplicating it.
    {
        let mut orchestrator = orchestrator_with(
            &db_path,
            dir.path(),
            Box::new(StubAdapter { state: AdapterState::new("claude-stub".into(), 1_000_000) }),
        );
        let result = orchestrator.run(&input, "es", "en").expect("second run");
        assert!(result.was_resumed);
        assert_eq!(result.flagged, 0);
    }
}

#[test]
fn interrupted_run_resumes_only_the_pending_suffix() {
    let dir = TempDir::new().expect("tempdir");
    let db_path = dir.path().join("pipeline.db");
    let input = dir.path().join("book.txt");
    std::fs::write(
        &input,
        "Capitulo uno.\n\nHabia una vez un dragon de cristal en la montana lejana que custodiaba el valle entero.\n",
    )
    .expect("write input");

    let book_id = {
        let mut orchestrator = orchestrator_with(
            &db_path,
            dir.path(),
            Box::new(ExhaustedAdapter { state: AdapterState::new("claude-stub".into(), 1_000_000) }),
        );
        let result = orchestrator.run(&input, "es", "en").expect("first run pauses on exhaustion");
        assert_eq!(result.translated, 0);
        assert!(result.total_chunks > 0);
        result.book_id
    };

    {
        let repo = Repository::open(&db_path).expect("reopen repository");
        let pending = repo.get_pending_chunks(book_id).expect("pending chunks");
        assert!(!pending.is_empty());
    }

    let mut orchestrator = orchestrator_with(
        &db_path,
        dir.path(),
        Box::new(StubAdapter { state: AdapterState::new("claude-stub".into(), 1_000_000) }),
    );
    let result = orchestrator.run(&input, "es", "en").expect("second run completes the suffix");
    assert!(result.was_resumed);
    assert_eq!(result.flagged, 0);
    assert_eq!(result.translated, result.total_chunks);

    let repo = Repository::open(&db_path).expect("reopen repository again");
    let chunks = repo.get_all_chunks(book_id).expect("all chunks");
    assert!(chunks.iter().all(|c| c.status == ChunkStatus::Done));
}

#[test]
fn all_models_exhausted_error_is_distinguishable() {
    let dir = TempDir::new().expect("tempdir");
    let router = Router::new(vec![Box::new(ExhaustedAdapter {
        state: AdapterState::new("claude-stub".into(), 1_000_000),
    }) as Box<dyn ModelAdapter>])
    .expect("build router");
    let repo = Repository::open(dir.path().join("pipeline.db")).expect("open repository");
    let translate_result = router.translate("hola", "system", &repo);
    assert!(matches!(translate_result, Err(Error::Router(RouterError::AllModelsExhausted))));
}

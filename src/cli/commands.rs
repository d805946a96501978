//! CLI command implementations.
//!
//! Contains the business logic for each CLI command: wiring together a
//! [`Repository`], a [`Router`] built from the model configuration file,
//! and an [`Orchestrator`] to actually run the pipeline.

use std::path::{Path, PathBuf};

use crate::chunking::ChunkConfig;
use crate::cli::output::{models_were_exhausted, format_pipeline_result, format_status, OutputFormat};
use crate::cli::parser::{Cli, Commands};
use crate::core::Book;
use crate::error::{CommandError, Result, StorageError};
use crate::orchestrator::Orchestrator;
use crate::router::{build_adapters, load_model_configs, Router};
use crate::storage::{default_db_path, Repository};

/// Outcome of a CLI invocation: the text to print and whether the run
/// stopped early because every model was exhausted.
pub struct CommandOutput {
    /// Formatted output to print to stdout.
    pub text: String,
    /// Set when a `translate`/`fix` run paused with chunks still pending
    /// because every configured model was exhausted or cooling down.
    pub models_exhausted: bool,
}

impl CommandOutput {
    fn complete(text: String) -> Self {
        Self { text, models_exhausted: false }
    }
}

/// Executes the CLI command.
///
/// # Errors
///
/// Returns an error if the command fails to execute.
pub fn execute(cli: &Cli) -> Result<CommandOutput> {
    let format = OutputFormat::parse(&cli.format);

    match &cli.command {
        Commands::Translate { book, from, to, chunk_size } => {
            cmd_translate(cli, book, from, to, chunk_size, format)
        }
        Commands::Fix { translation, original, to, from, chunk_size } => {
            cmd_fix(cli, translation, original.as_deref(), to, from.as_deref(), chunk_size, format)
        }
        Commands::Status { book } => cmd_status(cli, book, format),
        Commands::Review => Err(CommandError::UnknownCommand(
            "review is reserved for a later phase".to_string(),
        )
        .into()),
        Commands::Write => Err(CommandError::UnknownCommand(
            "write is reserved for a later phase".to_string(),
        )
        .into()),
    }
}

fn db_path(cli: &Cli) -> PathBuf {
    cli.db_path.clone().unwrap_or_else(default_db_path)
}

fn build_orchestrator(cli: &Cli) -> Result<Orchestrator> {
    let repo = Repository::open(db_path(cli))?;
    let configs = load_model_configs(cli.models_config.as_deref())?;
    let adapters = build_adapters(&configs)?;
    let router = Router::new(adapters)?;
    let mut orchestrator = Orchestrator::new(repo, router);
    if let Some(ref output_dir) = cli.output_dir {
        orchestrator = orchestrator.with_output_dir(output_dir.clone());
    }
    Ok(orchestrator)
}

fn cmd_translate(cli: &Cli, book: &Path, from: &str, to: &str, chunk_size: &str, format: OutputFormat) -> Result<CommandOutput> {
    let chunk_config = ChunkConfig::from_preset_name(chunk_size)?;
    let mut orchestrator = build_orchestrator(cli)?.with_chunk_config(chunk_config);
    let result = orchestrator.run(book, from, to)?;
    Ok(CommandOutput {
        models_exhausted: models_were_exhausted(&result),
        text: format_pipeline_result(&result, format),
    })
}

fn cmd_fix(cli: &Cli, translation: &Path, original: Option<&Path>, to: &str, from: Option<&str>, chunk_size: &str, format: OutputFormat) -> Result<CommandOutput> {
    let chunk_config = ChunkConfig::from_preset_name(chunk_size)?;
    let mut orchestrator = build_orchestrator(cli)?.with_chunk_config(chunk_config);

    let result = match original {
        Some(original) => {
            let from = from.ok_or_else(|| {
                CommandError::MissingArgument("--from is required when --original is given".to_string())
            })?;
            orchestrator.run_fix(original, translation, from, to)?
        }
        None => orchestrator.run_fix_style(translation, to)?,
    };
    Ok(CommandOutput {
        models_exhausted: models_were_exhausted(&result),
        text: format_pipeline_result(&result, format),
    })
}

fn cmd_status(cli: &Cli, book: &Path, format: OutputFormat) -> Result<CommandOutput> {
    let repo = Repository::open(db_path(cli))?;
    let bytes = std::fs::read(book).map_err(|e| crate::error::IoError::ReadFailed {
        path: book.display().to_string(),
        reason: e.to_string(),
    })?;
    let file_hash = Book::compute_hash(&bytes);

    let book_record = repo.get_book_by_hash(&file_hash)?.ok_or_else(|| StorageError::BookNotFound {
        identifier: book.display().to_string(),
    })?;
    let book_id = book_record.id.expect("persisted book has id");
    let chunks = repo.get_all_chunks(book_id)?;
    let bible = repo.get_latest_bible(book_id)?;

    Ok(CommandOutput::complete(format_status(&book_record, &chunks, bible.as_ref(), format)))
}

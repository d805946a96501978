//! Command-line argument parsing.
//!
//! Defines the CLI structure using clap derive macros.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// A resumable pipeline that translates, corrects, or polishes
/// book-length manuscripts through LLM dispatch.
#[derive(Parser, Debug)]
#[command(name = "tradnovela")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the database file.
    ///
    /// Defaults to `$XDG_DATA_HOME/tradnovela/tradnovela.db`.
    #[arg(long, env = "TRADNOVELA_DB_PATH")]
    pub db_path: Option<PathBuf>,

    /// Path to the model configuration YAML.
    ///
    /// Defaults to `$XDG_CONFIG_HOME/tradnovela/models.yaml`.
    #[arg(long, env = "TRADNOVELA_MODELS_CONFIG")]
    pub models_config: Option<PathBuf>,

    /// Directory reconstructed manuscripts are written into.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, default_value = "text", global = true)]
    pub format: String,

    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Translate a manuscript from one language to another.
    Translate {
        /// Path to the source manuscript.
        #[arg(long)]
        book: PathBuf,

        /// Source language tag (e.g. "ja", "es").
        #[arg(long)]
        from: String,

        /// Target language tag (e.g. "en").
        #[arg(long)]
        to: String,

        /// Chunk size preset.
        #[arg(long, default_value = "standard")]
        chunk_size: String,
    },

    /// Correct or polish an existing translation.
    Fix {
        /// Path to the existing translation draft.
        #[arg(long)]
        translation: PathBuf,

        /// Path to the original source text. Omit to polish without a
        /// reference.
        #[arg(long)]
        original: Option<PathBuf>,

        /// Target language tag (e.g. "en").
        #[arg(long)]
        to: String,

        /// Source language tag, required when `--original` is given.
        #[arg(long)]
        from: Option<String>,

        /// Chunk size preset.
        #[arg(long, default_value = "standard")]
        chunk_size: String,
    },

    /// Report a book's status without running the pipeline.
    Status {
        /// Path to the manuscript whose book record should be reported.
        #[arg(long)]
        book: PathBuf,
    },

    /// Interactive review of flagged chunks. Reserved for a later phase.
    Review,

    /// Apply a human-edited manuscript back into storage. Reserved for a
    /// later phase.
    Write,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_translate_command() {
        let cli = Cli::parse_from([
            "tradnovela",
            "translate",
            "--book",
            "novel.txt",
            "--from",
            "ja",
            "--to",
            "en",
        ]);
        match cli.command {
            Commands::Translate { book, from, to, chunk_size } => {
                assert_eq!(book, PathBuf::from("novel.txt"));
                assert_eq!(from, "ja");
                assert_eq!(to, "en");
                assert_eq!(chunk_size, "standard");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_fix_command_without_original() {
        let cli = Cli::parse_from([
            "tradnovela",
            "fix",
            "--translation",
            "draft.txt",
            "--to",
            "en",
        ]);
        match cli.command {
            Commands::Fix { translation, original, to, .. } => {
                assert_eq!(translation, PathBuf::from("draft.txt"));
                assert!(original.is_none());
                assert_eq!(to, "en");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}

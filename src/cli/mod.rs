//! CLI layer.
//!
//! Provides the command-line interface using clap, with commands for
//! translating, fixing, and reporting the status of a book.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, CommandOutput};
pub use output::OutputFormat;
pub use parser::{Cli, Commands};

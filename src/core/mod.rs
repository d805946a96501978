//! Core domain models for the pipeline: books, chunks, and the book
//! bible. These are pure data structures with no I/O dependencies.

pub mod bible;
pub mod book;
pub mod chunk;

pub use bible::{BibleUpdate, BookBible};
pub use book::{Book, BookMode, BookStatus};
pub use chunk::{Chunk, ChunkStatus};

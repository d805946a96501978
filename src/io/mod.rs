//! Manuscript reading: splits a raw input file into ordered sections
//! before the chunker sees it.

pub mod manuscript;

pub use manuscript::{RawManuscript, parse_manuscript};

//! Output file generation.
//!
//! TSV summaries, pretty JSON records and abstract Markdown.

pub mod generator;

pub use generator::*;

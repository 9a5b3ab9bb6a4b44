//! Streaming JSON path selection.
//!
//! A path expression is compiled once with [`selector::compile`] and then
//! driven over a byte stream by [`matcher::match_once`] or
//! [`matcher::match_stream`]. Selected values are re-serialized compactly as
//! they are encountered; everything else is skipped without being parsed
//! into a tree.

pub mod arena;
pub mod decompress;
pub mod error;
pub mod input;
pub mod matcher;
pub mod output;
pub mod selector;
pub mod tokenizer;

pub use error::{Error, Result};
pub use matcher::{match_once, match_stream};
pub use output::OutputConfig;
pub use selector::{Query, SelectorError, compile};

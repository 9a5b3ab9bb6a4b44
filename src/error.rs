//! Error types shared by the compiler, tokenizer and matcher.
//!
//! Every fallible boundary in the library returns [`Result`]. Nothing in the
//! library terminates the process; the binary decides how to report and which
//! exit status to use.

use std::io;

use crate::arena::ArenaError;
use crate::selector::SelectorError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    /// Malformed input bytes (unterminated string, bad escape, stray byte).
    #[error("error at offset {offset}: {message}")]
    Lexical { offset: u64, message: String },

    /// A token sequence that violates JSON grammar where a specific token was required.
    #[error("error at offset {offset}: expected {expected}, got {found}{}", in_path(.path))]
    Structural {
        offset: u64,
        expected: &'static str,
        found: &'static str,
        /// Matched path at the point of failure, empty at top level.
        path: String,
    },

    #[error(transparent)]
    Arena(#[from] ArenaError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

fn in_path(path: &str) -> String {
    if path.is_empty() {
        String::new()
    } else {
        format!(" (inside {path})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_message_with_path() {
        let err = Error::Structural {
            offset: 12,
            expected: "':'",
            found: "number",
            path: ".a[3]".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "error at offset 12: expected ':', got number (inside .a[3])"
        );
    }

    #[test]
    fn structural_message_top_level() {
        let err = Error::Structural {
            offset: 0,
            expected: "a value",
            found: "EOF",
            path: String::new(),
        };
        assert_eq!(err.to_string(), "error at offset 0: expected a value, got EOF");
    }
}

//! Error types.

use std::path::PathBuf;

/// Syntax error in a generator script, located by physical line and column (1-based).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl ParseError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Failure of a whole extraction run. Anything recoverable is a
/// [`Diagnostic`](crate::ir::Diagnostic) instead. The underlying error is
/// reported through `source()`, not repeated in the message.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("syntax error")]
    Parse(#[from] ParseError),
    #[error("invalid configuration")]
    Config(#[from] toml::de::Error),
}

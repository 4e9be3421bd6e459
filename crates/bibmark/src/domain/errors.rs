//! Domain-specific errors.

use thiserror::Error;

/// Errors raised while reading BibTeX source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BibError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },
    #[error("duplicate entry key '{key}' on line {line}")]
    DuplicateKey { key: String, line: usize },
    #[error("undefined string macro '{name}' on line {line}")]
    UndefinedMacro { name: String, line: usize },
}

/// Errors raised while resolving citations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CiteError {
    #[error("citation key '{0}' not found in bibliography")]
    UnknownKey(String),
    #[error("Must supply a bibtex file or directory for bibtex files")]
    NoSource,
    #[error("footnote format '{0}' must contain '{{number}}'")]
    InvalidFootnoteFormat(String),
}

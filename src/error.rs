//! Error types for the engine.
//!
//! Structural failures (parse errors, unresolvable sources, refactoring
//! conflicts) abort the single request they occur in and are returned as
//! an [`EngineError`].  Gaps in type resolution are not errors; they
//! degrade to [`InferredType::Unknown`](crate::types::InferredType).
use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// The parser rejected the source text.
    #[error("syntax error in {path} at offset {offset}: {message}")]
    Syntax {
        path: PathBuf,
        offset: u32,
        message: String,
    },

    /// A path or class name does not resolve through the source registry,
    /// or the resolved file does not exist.
    #[error("source not found: {subject}")]
    SourceNotFound { subject: String },

    /// A file was expected to declare exactly one class-like.
    #[error("expected exactly one class in {path}, found {found}")]
    ClassNotFoundInSource { path: PathBuf, found: usize },

    #[error("unknown snippet generator \"{kind}\"")]
    GeneratorNotFound { kind: String },

    #[error("invalid value {value} for option \"{option}\" of generator \"{generator}\"")]
    InvalidOption {
        generator: String,
        option: String,
        value: String,
    },

    /// The destination of a class move is already occupied.
    #[error("cannot move class: destination {path} already exists")]
    MoveConflict { path: PathBuf },

    /// The filesystem backend failed while moving the file.  Nothing was
    /// written.
    #[error("failed to move {from} to {to}: {message}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    /// The file was moved but the rewritten source could not be written.
    #[error("class move from {from} to {to} left the tree inconsistent: {message}")]
    InconsistentMove {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    /// Two autoload prefixes map the same namespace to different roots.
    #[error("conflicting autoload prefix \"{prefix}\": {first} and {second}")]
    PrefixConflict {
        prefix: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl EngineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        EngineError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn source_not_found(subject: impl ToString) -> Self {
        EngineError::SourceNotFound {
            subject: subject.to_string(),
        }
    }
}

//! Typed failures raised inside the generation pipeline.
//!
//! Most of these never escape a pass: the pipeline turns them into
//! [`Issue`](crate::issues::Issue)s scoped to a line, a file or a service.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenError {
    /// Directive arguments could not be tokenized or resolved.
    #[error("{message}")]
    DirectiveSyntax { message: String },

    /// A directive precedes the wrong kind of declaration.
    #[error("@{directive} must precede a {expected}, found {found}")]
    Placement {
        directive: String,
        expected: &'static str,
        found: String,
    },

    /// Mutually exclusive metadata within one service.
    #[error("{message}")]
    Conflict {
        message: String,
        /// `file:line` of the other side, if there is one.
        other: Option<String>,
    },

    /// The import resolver produced an ambiguous set. Internal invariant
    /// violation; never caused by user input.
    #[error("import alias `{alias}` is ambiguous between {}", paths.join(", "))]
    ImportAmbiguity { alias: String, paths: Vec<String> },

    /// The cache manifest could not be read. Recovered by treating every
    /// file as updated.
    #[error("cache manifest {path} is unreadable: {reason}")]
    CacheCorruption { path: String, reason: String },
}

impl GenError {
    pub fn syntax(message: impl Into<String>) -> Self {
        GenError::DirectiveSyntax {
            message: message.into(),
        }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        GenError::Conflict {
            message: message.into(),
            other: None,
        }
    }
}

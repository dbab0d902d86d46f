//! Errors surfaced by a simulation run
//!
//! The rewriter never fails (it records
//! [`RewriteAmbiguity`](crate::rewriter::RewriteAmbiguity) notes instead). Everything from parsing onwards ends the run with a [`SimError`].

use thiserror::Error;

use crate::gamma::ColorError;
use crate::strip::StripError;

/// Syntax error in the rewritten sketch
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: u32,
    pub message: String,
}

impl ParseError {
    pub fn new(line: u32, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// A failure that ended a run
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    /// The rewritten program is not valid sketch script
    #[error("evaluation error on line {line}: {message}")]
    Evaluation { line: u32, message: String },
    /// Raised while running top-level code, `setup()` or `loop()`
    #[error("runtime error on line {line}: {message}")]
    Runtime { line: u32, message: String },
    /// Strip contract violation
    #[error("strip error on line {line}: {source}")]
    Strip { line: u32, source: StripError },
    /// Color helper contract violation
    #[error("color error on line {line}: {source}")]
    Color { line: u32, source: ColorError },
}

impl SimError {
    pub fn runtime(line: u32, message: impl Into<String>) -> Self {
        Self::Runtime {
            line,
            message: message.into(),
        }
    }

    /// Line of the sketch the error points at
    pub const fn line(&self) -> u32 {
        match self {
            Self::Evaluation { line, .. }
            | Self::Runtime { line, .. }
            | Self::Strip { line, .. }
            | Self::Color { line, .. } => *line,
        }
    }
}

impl From<ParseError> for SimError {
    fn from(error: ParseError) -> Self {
        Self::Evaluation {
            line: error.line,
            message: error.message,
        }
    }
}

/// Failure of a native capability call, before a line is attached
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CallError {
    #[error(transparent)]
    Strip(#[from] StripError),
    #[error(transparent)]
    Color(#[from] ColorError),
    #[error("{0}")]
    Type(String),
    /// The run that issued the call is no longer current
    #[error("run superseded")]
    Superseded,
}

impl CallError {
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::Type(message.into())
    }
}

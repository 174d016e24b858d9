//! Error types
//!
//! Three taxonomies, kept distinct: JavaScript throws (any value, routed to
//! handler regions), parse errors (typed results that never enter the
//! exception channel), and engine-internal errors (never catchable by user
//! code).

use thiserror::Error;

use crate::value::Value;

/// Source position, 1-based line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A half-open source range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }
}

/// Error produced by the front end before the core runs.
#[derive(Debug, Clone, Error)]
#[error("SyntaxError: {reason} at {}", .span.start)]
pub struct ParseError {
    pub reason: String,
    pub span: Span,
}

impl ParseError {
    pub fn new(reason: impl Into<String>, span: Span) -> Self {
        Self {
            reason: reason.into(),
            span,
        }
    }
}

/// Runtime error channel of the interpreter.
///
/// `Throw` is the only variant handler regions catch; everything else
/// aborts the activation and surfaces to the embedder as an internal error.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Uncaught {0:?}")]
    Throw(Value),

    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn throw(value: Value) -> Self {
        EngineError::Throw(value)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        EngineError::Internal(message.into())
    }

    /// The thrown JS value, if this is the catchable variant.
    pub fn thrown_value(&self) -> Option<&Value> {
        match self {
            EngineError::Throw(value) => Some(value),
            EngineError::Internal(_) => None,
        }
    }
}

/// What an embedder gets back from `run`.
#[derive(Debug)]
pub enum RunResult {
    /// Evaluation completed; the completion value of the source.
    Success(Value),
    /// A JavaScript value was thrown and nothing caught it.
    RuntimeError(Value),
    /// The source did not parse.
    ParseError(ParseError),
    /// The engine violated one of its own invariants.
    InternalError(String),
}

impl RunResult {
    pub fn success_value(self) -> Option<Value> {
        match self {
            RunResult::Success(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunResult::Success(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thrown_value_extraction() {
        let err = EngineError::throw(Value::from(1.0));
        assert_eq!(err.thrown_value().and_then(|v| v.as_number()), Some(1.0));
        assert!(EngineError::internal("x").thrown_value().is_none());
    }

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(
            "Unexpected token",
            Span::new(
                Position {
                    line: 2,
                    column: 5,
                    offset: 10,
                },
                Position {
                    line: 2,
                    column: 6,
                    offset: 11,
                },
            ),
        );
        assert_eq!(err.to_string(), "SyntaxError: Unexpected token at 2:5");
    }
}

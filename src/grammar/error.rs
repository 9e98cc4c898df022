//! Defines the error types for the grammar module.
use thiserror::Error;

/// Errors raised while turning equation text into expression trees.
///
/// Every variant carries the 1-based line number of the offending statement.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Syntax error on line {line}, column {column}: unexpected '{found}', expected {expected}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        found: String,
        expected: String,
    },
    #[error("Syntax error on line {line}: unexpected end of input, expected {expected}")]
    UnexpectedEnd { line: usize, expected: String },
    #[error("Syntax error on line {line}, column {column}: illegal character(s) '{text}'")]
    InvalidCharacter {
        line: usize,
        column: usize,
        text: String,
    },
    #[error("Unknown function '{name}' on line {line}")]
    UnknownFunction { line: usize, name: String },
    #[error("Function '{name}' on line {line} takes {expected} argument(s), got {actual}")]
    ArityMismatch {
        line: usize,
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("Invalid LAG on line {line}: {message}")]
    InvalidLag { line: usize, message: String },
    #[error("Variable '{name}' on line {line} was already defined on line {first_line}")]
    Redefinition {
        line: usize,
        name: String,
        first_line: usize,
    },
}

impl ParseError {
    pub fn line(&self) -> usize {
        match self {
            ParseError::UnexpectedToken { line, .. }
            | ParseError::UnexpectedEnd { line, .. }
            | ParseError::InvalidCharacter { line, .. }
            | ParseError::UnknownFunction { line, .. }
            | ParseError::ArityMismatch { line, .. }
            | ParseError::InvalidLag { line, .. }
            | ParseError::Redefinition { line, .. } => *line,
        }
    }

    /// True for malformed statements: bad characters, unexpected tokens, or a truncated line.
    pub fn is_syntax(&self) -> bool {
        matches!(
            self,
            ParseError::UnexpectedToken { .. }
                | ParseError::UnexpectedEnd { .. }
                | ParseError::InvalidCharacter { .. }
        )
    }
}

//! Error types for parsing and running scripts
//!
//! - [`ParseError`]: script text is not valid
//! - [`ScriptError`]: evaluation ended with an uncaught exception or ran past
//!   its deadline
//! - [`ConversionError`]: a value could not be turned into JSON

use crate::parser::Rule;
use pest::error::{Error as PestError, LineColLocation};

/// Script text could not be parsed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Grammar mismatch
    #[error("line {line}, column {column}: {message}")]
    Syntax {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// What was expected
        message: String,
    },

    /// Grammatically valid but semantically invalid construct
    #[error("line {line}, column {column}: {message}")]
    Invalid {
        /// 1-based line
        line: usize,
        /// 1-based column
        column: usize,
        /// What is wrong
        message: String,
    },
}

impl ParseError {
    pub(crate) fn invalid(span: pest::Span<'_>, message: impl Into<String>) -> Self {
        let (line, column) = span.start_pos().line_col();
        Self::Invalid {
            line,
            column,
            message: message.into(),
        }
    }

    pub(crate) fn from_pest(e: PestError<Rule>) -> Self {
        let (line, column) = match e.line_col {
            LineColLocation::Pos(pos) | LineColLocation::Span(pos, _) => pos,
        };
        Self::Syntax {
            line,
            column,
            message: e.variant.message().into_owned(),
        }
    }

    /// 1-based line of the error
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. } | Self::Invalid { line, .. } => *line,
        }
    }
}

/// Evaluation did not complete normally
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScriptError {
    /// Uncaught exception
    #[error("{message}")]
    Uncaught {
        /// Error name (`Error`, `TypeError`, ...) when an error object was thrown
        name: Option<String>,
        /// Error message, or the string form of a thrown non-error value
        message: String,
    },

    /// Deadline passed while the script was still running
    #[error("execution deadline exceeded")]
    DeadlineExceeded,
}

/// Value cannot be converted to JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConversionError {
    /// An array or object contains itself
    #[error("Converting circular structure to JSON")]
    Circular,

    /// Arrays and objects nest deeper than [`crate::value::MAX_NESTING_DEPTH`]
    #[error("Maximum nesting depth exceeded")]
    TooDeep,
}

impl ConversionError {
    /// Name of the script error raised for this failure
    #[must_use]
    pub fn error_name(self) -> &'static str {
        match self {
            Self::Circular => "TypeError",
            Self::TooDeep => "RangeError",
        }
    }
}

impl ScriptError {
    /// Check if this is a deadline failure
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::DeadlineExceeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncaught_displays_bare_message() {
        let err = ScriptError::Uncaught {
            name: Some("Error".to_string()),
            message: "boom".to_string(),
        };
        assert_eq!(err.to_string(), "boom");
        assert!(!err.is_timeout());
        assert!(ScriptError::DeadlineExceeded.is_timeout());
    }

    #[test]
    fn parse_error_reports_position() {
        let err = crate::parse("let = ;").unwrap_err();
        assert_eq!(err.line(), 1);
        assert!(err.to_string().starts_with("line 1, column"));
    }
}

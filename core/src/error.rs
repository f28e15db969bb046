//! Error types shared by the cursor, lexer, parser, and coordinator.
//!
//! The framework uses a single positioned error enum rather than per-layer
//! error types: a lex error and a parse error travel through the same
//! aggregation path in the coordinator, and user state functions construct
//! them through the [`Lexer::lex_error`](crate::Lexer::lex_error) and
//! [`Parser::parse_error`](crate::Parser::parse_error) helpers.

use std::io;

use crate::position::Position;

/// Any failure the framework can report.
///
/// Every variant that corresponds to a point in the input carries a
/// [`Position`]. Two variants are control-flow sentinels rather than true
/// failures: [`Error::ExpectedEof`] signals clean termination from deep
/// inside a parser state stack and is never surfaced to callers, and
/// [`Error::Cancelled`] is reported only when no prior error exists.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying byte stream failed. Sticky on the cursor.
    #[error("{pos}: read failed: {source}")]
    Read {
        /// Reader position at the time of the failure.
        pos: Position,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The input contained a byte sequence that is not valid UTF-8.
    /// Sticky on the cursor.
    #[error("{pos}: input is not valid UTF-8")]
    InvalidUtf8 {
        /// Position of the first undecodable rune.
        pos: Position,
    },

    /// A lexer state function rejected the input.
    #[error("{pos}: {message}")]
    Lex {
        /// Reader position when the state gave up.
        pos: Position,
        /// Grammar-supplied description.
        message: String,
    },

    /// A parser state function rejected a token.
    #[error("{pos}: {message}")]
    Parse {
        /// Start position of the offending token.
        pos: Position,
        /// Grammar-supplied description.
        message: String,
    },

    /// A parser state required a token but received the EOF sentinel.
    ///
    /// Distinguished from [`Error::Parse`] so diagnostics can tell a
    /// truncated input from a malformed one.
    #[error("{pos}: unexpected end of input, expected {expected}")]
    UnexpectedEof {
        /// Position where the input ran out.
        pos: Position,
        /// What the grammar was looking for.
        expected: String,
    },

    /// Clean-termination sentinel: a parser state consumed EOF exactly where
    /// the grammar permits it. Converted into successful completion by the
    /// parser driver.
    #[error("expected end of input")]
    ExpectedEof,

    /// The cancellation signal fired.
    #[error("cancelled")]
    Cancelled,
}

impl Error {
    /// Returns the position attached to this error, if any.
    pub fn position(&self) -> Option<&Position> {
        match self {
            Error::Read { pos, .. }
            | Error::InvalidUtf8 { pos }
            | Error::Lex { pos, .. }
            | Error::Parse { pos, .. }
            | Error::UnexpectedEof { pos, .. } => Some(pos),
            Error::ExpectedEof | Error::Cancelled => None,
        }
    }

    /// True for the clean-termination sentinel.
    #[inline]
    pub fn is_expected_eof(&self) -> bool {
        matches!(self, Error::ExpectedEof)
    }

    /// True for cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positioned_variants_expose_position() {
        let pos = Position::default();
        let err = Error::Lex {
            pos: pos.clone(),
            message: "bad rune".into(),
        };
        assert_eq!(err.position(), Some(&pos));
        assert!(Error::Cancelled.position().is_none());
        assert!(Error::ExpectedEof.position().is_none());
    }

    #[test]
    fn display_includes_position_and_message() {
        let err = Error::Parse {
            pos: Position::default(),
            message: "unexpected token `}}`".into(),
        };
        assert_eq!(err.to_string(), "1:1: unexpected token `}}`");
    }

    #[test]
    fn unexpected_eof_is_distinguishable() {
        let err = Error::UnexpectedEof {
            pos: Position::default(),
            expected: "`}}`".into(),
        };
        assert!(err.to_string().contains("unexpected end of input"));
        assert!(!err.is_expected_eof());
        assert!(Error::ExpectedEof.is_expected_eof());
    }
}

//! Parse error types.

use hipify_ast::{FrontEndError, Span};
use hipify_lexer::Token;
use std::fmt;

/// Parse error with source location and context.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// Kind of parse error
    pub kind: ParseErrorKind,
    /// Source location where error occurred
    pub span: Span,
    /// Human-readable error message
    pub message: String,
}

/// Category of parse error.
///
/// Only some categories abort a translation unit; the others are recovered
/// from by skimming the construct that produced them.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token encountered where a specific token was expected.
    UnexpectedToken,

    /// Unexpected end of input while parsing was incomplete.
    UnexpectedEof,

    /// Tokens are present but do not form a construct the parser knows.
    InvalidSyntax,

    /// `(`, `[` or `{` without its partner, or a stray closer.
    ///
    /// Fatal: skimming relies on balanced groups.
    UnbalancedDelimiter,

    /// Kernel launch with too few or too many configuration arguments.
    ///
    /// Fatal.
    LaunchConfig,

    /// `#error`, a malformed conditional, or an unterminated `#if`.
    ///
    /// Fatal.
    Preprocessor,

    /// The compiler argument list could not be understood.
    ///
    /// Fatal.
    Invocation,
}

impl ParseError {
    /// Create an "expected token" error.
    pub fn expected_token(expected: Token, found: Option<Token>, span: Span) -> Self {
        let message = match &found {
            Some(token) => format!("expected '{}', found '{}'", expected, token),
            None => format!("expected '{}', found end of input", expected),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "unexpected token" error.
    pub fn unexpected_token(found: Option<&Token>, context: &str, span: Span) -> Self {
        let message = match found {
            Some(token) => format!("unexpected '{}' {}", token, context),
            None => format!("unexpected end of input {}", context),
        };
        Self {
            kind: if found.is_none() {
                ParseErrorKind::UnexpectedEof
            } else {
                ParseErrorKind::UnexpectedToken
            },
            span,
            message,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::InvalidSyntax, message, span)
    }

    pub fn unbalanced(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::UnbalancedDelimiter, message, span)
    }

    pub fn launch_config(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::LaunchConfig, message, span)
    }

    pub fn preprocessor(message: impl Into<String>, span: Span) -> Self {
        Self::new(ParseErrorKind::Preprocessor, message, span)
    }

    pub fn invocation(message: impl Into<String>) -> Self {
        Self::new(ParseErrorKind::Invocation, message, Span::default())
    }

    fn new(kind: ParseErrorKind, message: impl Into<String>, span: Span) -> Self {
        Self {
            kind,
            span,
            message: message.into(),
        }
    }

    /// True when the error aborts the translation unit instead of being
    /// skimmed over.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind,
            ParseErrorKind::UnbalancedDelimiter
                | ParseErrorKind::LaunchConfig
                | ParseErrorKind::Preprocessor
                | ParseErrorKind::Invocation
        )
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}..{}", self.message, self.span.start, self.span.end)
    }
}

impl std::error::Error for ParseError {}

impl From<ParseError> for FrontEndError {
    fn from(error: ParseError) -> Self {
        let span = match error.kind {
            ParseErrorKind::Invocation => None,
            _ => Some(error.span),
        };
        FrontEndError::new(error.message, span)
    }
}

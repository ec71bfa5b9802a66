//! Error reported by a front end.

use crate::foundation::Span;
use std::fmt;

/// The front end could not build a translation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontEndError {
    pub message: String,
    /// Location in the main file, when known
    pub span: Option<Span>,
}

impl FrontEndError {
    pub fn new(message: impl Into<String>, span: Option<Span>) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }
}

impl fmt::Display for FrontEndError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for FrontEndError {}

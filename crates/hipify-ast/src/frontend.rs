//! The contract a front end fulfils for the rewriting engine.

use crate::ast::TranslationUnit;
use crate::error::FrontEndError;
use crate::foundation::Span;
use std::rc::Rc;

/// Category of a token produced by re-tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawTokenKind {
    Identifier(Rc<str>),
    StringLiteral {
        /// One byte per code unit
        narrow: bool,
        /// Length of the encoding prefix
        prefix_len: u8,
    },
    /// Keywords, punctuation, numbers, character literals
    Other,
}

/// A token with its absolute position in the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToken {
    pub kind: RawTokenKind,
    pub span: Span,
}

impl RawToken {
    pub fn identifier(&self) -> Option<&str> {
        match &self.kind {
            RawTokenKind::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

/// Re-tokenize an arbitrary span in isolation.
pub trait Retokenizer {
    /// Tokens of `source[span]`, in order, with positions relative to the
    /// start of `source`. No macro expansion is performed.
    fn retokenize(&self, source: &str, span: Span) -> Vec<RawToken>;
}

/// Produces the AST and preprocessor events of one translation unit.
pub trait FrontEnd: Retokenizer {
    /// Parse `source` under the compilation view selected by `args`.
    fn parse(&self, source: &str, args: &[String]) -> Result<TranslationUnit, FrontEndError>;
}

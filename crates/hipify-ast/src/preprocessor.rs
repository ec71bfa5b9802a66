//! Preprocessor events recorded for the main file.

use crate::ast::Ident;
use crate::foundation::Span;
use crate::frontend::RawToken;
use std::rc::Rc;

/// One preprocessor callback, in source order.
#[derive(Debug, Clone, PartialEq)]
pub enum PpEvent {
    Inclusion(InclusionDirective),
    MacroDefinition(MacroDefinition),
    MacroExpansion(MacroExpansion),
}

impl PpEvent {
    pub fn span(&self) -> Span {
        match self {
            PpEvent::Inclusion(i) => i.span,
            PpEvent::MacroDefinition(d) => d.span,
            PpEvent::MacroExpansion(e) => e.span,
        }
    }
}

/// `#include <file>` or `#include "file"`.
#[derive(Debug, Clone, PartialEq)]
pub struct InclusionDirective {
    /// The `#` token
    pub hash: Span,
    /// File name without delimiters
    pub file_name: Rc<str>,
    /// Written with `<...>`
    pub angled: bool,
    /// File name including its delimiters
    pub filename_range: Span,
    pub span: Span,
}

/// `#define NAME body` or `#define NAME(params) body`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroDefinition {
    pub name: Ident,
    /// `None` for object-like macros
    pub params: Option<Vec<Rc<str>>>,
    /// Replacement list tokens with their positions
    pub body: Vec<RawToken>,
    pub span: Span,
}

impl MacroDefinition {
    pub fn is_function_like(&self) -> bool {
        self.params.is_some()
    }
}

/// Invocation of a macro in the main file.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroExpansion {
    pub name: Ident,
    /// Raw source range of each actual argument, `None` for object-like use
    pub args: Option<Vec<Span>>,
    /// Name through closing `)`
    pub span: Span,
}

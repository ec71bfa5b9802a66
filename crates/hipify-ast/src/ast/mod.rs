//! AST of one translation unit.
//!
//! The tree only contains constructs written in the main file. Declarations
//! pulled in from headers are not represented as nodes; references to them
//! carry a [`ResolvedDecl`] whose origin is [`DeclOrigin::Vendor`].

mod decl;
mod expr;
mod stmt;
mod types;
pub mod walk;

pub use decl::*;
pub use expr::*;
pub use stmt::*;
pub use types::*;

use crate::foundation::Span;
use crate::preprocessor::PpEvent;
use std::rc::Rc;

/// Trait for types that have a source span.
pub trait HasSpan {
    /// Returns the source span of this item.
    fn span(&self) -> Span;
}

/// Name as written, with the span of its token.
#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: Rc<str>,
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<Rc<str>>, span: Span) -> Self {
        Self {
            name: name.into(),
            span,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.name
    }
}

/// Index of a function declaration in [`TranslationUnit::functions`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionId(pub usize);

/// Registry entry for one function declaration written in the main file.
///
/// Kernel launches refer to their callee through this registry so that the
/// callee's parameter list can be located without walking the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub id: FunctionId,
    pub name: Rc<str>,
    pub params: ParamListLoc,
    /// Declaration has a body
    pub is_definition: bool,
    /// Declaration is the pattern of a function template
    pub is_template: bool,
}

/// One translation unit as seen through one compilation view.
#[derive(Debug, Clone, Default)]
pub struct TranslationUnit {
    /// Top-level declarations written in the main file
    pub decls: Vec<Decl>,
    /// Preprocessor events for the main file, in source order
    pub preprocessor: Vec<PpEvent>,
    /// Every function declaration of the main file, indexed by `FunctionId`
    pub functions: Vec<FunctionEntry>,
}

impl TranslationUnit {
    /// Look up a function registry entry.
    pub fn function(&self, id: FunctionId) -> Option<&FunctionEntry> {
        self.functions.get(id.0)
    }

    /// Every main-file declaration of the function `id` refers to, in
    /// source order: prototypes and the definition alike.
    ///
    /// Overloads are told apart by parameter count. An unknown `id` yields
    /// nothing.
    pub fn redeclarations(&self, id: FunctionId) -> impl Iterator<Item = &FunctionEntry> + '_ {
        let target = self.function(id);
        self.functions.iter().filter(move |f| {
            target.is_some_and(|t| {
                f.name == t.name
                    && f.is_template == t.is_template
                    && f.params.param_count == t.params.param_count
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: usize, name: &str, params: usize, is_definition: bool) -> FunctionEntry {
        FunctionEntry {
            id: FunctionId(id),
            name: name.into(),
            params: ParamListLoc {
                open: Span::new(0, 1),
                close: Span::new(1, 2),
                first_param: None,
                void_span: None,
                param_count: params,
            },
            is_definition,
            is_template: false,
        }
    }

    #[test]
    fn test_redeclarations_include_prototypes_and_definition() {
        let unit = TranslationUnit {
            functions: vec![
                entry(0, "scale", 2, false),
                entry(1, "scale", 1, true),
                entry(2, "scale", 2, true),
                entry(3, "shift", 2, false),
            ],
            ..Default::default()
        };
        let ids: Vec<_> = unit.redeclarations(FunctionId(2)).map(|f| f.id).collect();
        assert_eq!(ids, [FunctionId(0), FunctionId(2)], "other overloads stay out");
    }

    #[test]
    fn test_redeclarations_of_unknown_function() {
        let unit = TranslationUnit {
            functions: vec![entry(0, "scale", 1, false)],
            ..Default::default()
        };
        assert_eq!(unit.redeclarations(FunctionId(0)).count(), 1);
        assert_eq!(unit.redeclarations(FunctionId(3)).count(), 0);
    }
}

//! Statement nodes.

use super::{Decl, Expr, HasSpan, Ident};
use crate::foundation::Span;

/// `{ ... }`
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Declaration statement; one entry per declarator
    Decl(Vec<Decl>),
    Expr(Expr),
    Block(Block),
    /// `if`, `for`, `while`, `do`, `switch`
    Control {
        keyword: Ident,
        /// Init statement and condition, in source order
        header: Vec<Stmt>,
        /// Controlled statements (`then` and `else` for `if`)
        body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    /// Label, `break`, `continue`, `goto` or `;`
    Other(Span),
}

impl HasSpan for Stmt {
    fn span(&self) -> Span {
        match self {
            Stmt::Decl(decls) => decls
                .iter()
                .map(HasSpan::span)
                .reduce(|a, b| a.merge(&b))
                .unwrap_or_default(),
            Stmt::Expr(e) => e.span,
            Stmt::Block(b) => b.span,
            Stmt::Control { span, .. } | Stmt::Return { span, .. } | Stmt::Other(span) => *span,
        }
    }
}

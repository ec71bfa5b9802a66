//! Expression nodes.

use super::{
    Block, DeclKind, FunctionId, HasSpan, Ident, ParamDecl, ResolvedDecl, TemplateArg, TypeRef,
};
use crate::foundation::{SourceLocation, Span};
use std::rc::Rc;

/// An expression written in the main file.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    /// Spelled source range of the whole expression
    pub span: Span,
    /// Location of the expression's first token
    pub loc: SourceLocation,
}

impl Expr {
    /// Create an expression located directly in the file at `span`.
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            loc: SourceLocation::file(span.start),
        }
    }

    /// Create an expression with an explicit location.
    pub fn with_loc(kind: ExprKind, span: Span, loc: SourceLocation) -> Self {
        Self { kind, span, loc }
    }

    /// Offset a rewrite of this expression's leading token should target.
    ///
    /// Inside a macro argument the token was spelled in the argument text, not
    /// at the invocation, so the spelling location wins there.
    pub fn rewrite_offset(&self) -> u32 {
        if self.loc.is_macro_arg_expansion() {
            self.loc.spelling()
        } else {
            self.loc.expansion()
        }
    }

    /// Strip any number of enclosing parentheses.
    pub fn ignore_parens(&self) -> &Expr {
        let mut expr = self;
        while let ExprKind::Paren(inner) = &expr.kind {
            expr = inner;
        }
        expr
    }
}

impl HasSpan for Expr {
    fn span(&self) -> Span {
        self.span
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Reference to a named declaration
    DeclRef(DeclRefExpr),
    Call(CallExpr),
    /// `callee<<<config>>>(args)`
    KernelLaunch(Box<KernelLaunchExpr>),
    /// `base.member` or `base->member`
    Member(MemberExpr),
    /// Synthetic wrapper around a compiler-provided object
    OpaqueValue(Box<Expr>),
    Sizeof(SizeofExpr),
    /// One or more adjacent string literal tokens
    StringLiteral(Vec<StringLiteral>),
    /// Numeric, character, boolean or `nullptr` literal
    Literal,
    Unary(Box<Expr>),
    Binary(Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    /// C-style or named cast
    Cast { ty: TypeRef, operand: Box<Expr> },
    /// Functional cast or braced construction, `T(args)` / `T{args}`
    Construct { ty: TypeRef, args: Vec<Expr> },
    Index(Box<Expr>, Box<Expr>),
    InitList(Vec<Expr>),
    Lambda { params: Vec<ParamDecl>, body: Block },
    New { ty: TypeRef, args: Vec<Expr> },
    /// Invocation of a macro; arguments were parsed in place
    MacroExpansion { name: Ident, args: Vec<Expr> },
    Paren(Box<Expr>),
    /// Construct the parser skimmed; holds any expressions it recovered
    Unknown(Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeclRefExpr {
    /// Last component of the written name
    pub name: Ident,
    /// Explicit template arguments, `k<float>`
    pub template_args: Vec<TemplateArg>,
    pub decl: Option<ResolvedDecl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: Box<Expr>,
    pub args: Vec<Expr>,
}

impl CallExpr {
    /// The callee as a reference to a function, when it is one.
    pub fn direct_callee(&self) -> Option<&DeclRefExpr> {
        match &self.callee.ignore_parens().kind {
            ExprKind::DeclRef(r)
                if matches!(
                    r.decl.as_ref().map(|d| &d.kind),
                    Some(DeclKind::Function)
                ) =>
            {
                Some(r)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemberExpr {
    pub base: Box<Expr>,
    pub member: Ident,
    /// Name of the field declaration the member resolved to.
    ///
    /// For builtin coordinate objects this is the internal accessor name,
    /// e.g. `__fetch_builtin_x`.
    pub member_decl: Option<Rc<str>>,
    pub arrow: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SizeofOperand {
    Type(TypeRef),
    Expr(Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SizeofExpr {
    pub operand: SizeofOperand,
}

/// One string literal token.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StringLiteral {
    /// Whole token, encoding prefix and quotes included
    pub span: Span,
    /// Length of the encoding prefix (`u8` is 2, none is 0)
    pub prefix_len: u8,
    /// One byte per code unit (no prefix or `u8`)
    pub narrow: bool,
}

impl StringLiteral {
    /// Span of the characters between the quotes.
    pub fn content_span(&self) -> Span {
        let start = self.span.start + self.prefix_len as u32 + 1;
        let end = self.span.end.saturating_sub(1).max(start);
        Span::new(start, end)
    }
}

/// How the callee of a kernel launch resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalleeResolution {
    /// A concrete function declared in the main file
    Function(FunctionId),
    /// A function template; the specialization is not known
    Template,
    /// Nothing visible by that name
    Unresolved,
}

/// One entry of a launch's execution configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigArg {
    /// Declared type of the configuration parameter (`dim3`, `size_t`, ...)
    pub param_type: Rc<str>,
    /// Written argument, `None` when defaulted
    pub value: Option<Expr>,
}

impl ConfigArg {
    pub fn is_defaulted(&self) -> bool {
        self.value.is_none()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct KernelLaunchExpr {
    /// Callee as written, template arguments included
    pub callee: Box<Expr>,
    /// Unqualified callee name
    pub callee_name: Ident,
    pub resolution: CalleeResolution,
    /// Resolved against the execution-configuration signature, so every
    /// parameter has an entry
    pub config: Vec<ConfigArg>,
    pub args: Vec<Expr>,
    /// `<<<` through `>>>`
    pub config_span: Span,
}

//! Declaration nodes.

use super::{Block, Expr, FunctionId, HasSpan, Ident, TypeRef};
use crate::foundation::Span;

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    FunctionTemplate(FunctionTemplateDecl),
    Var(VarDecl),
    Record(RecordDecl),
    Enum(EnumDecl),
    Typedef(TypedefDecl),
    Namespace(NamespaceDecl),
    /// Top-level macro invocation with no trailing `;`
    MacroInvocation(Expr),
    /// Declaration the parser skimmed
    Opaque(Span),
}

impl HasSpan for Decl {
    fn span(&self) -> Span {
        match self {
            Decl::Function(f) => f.span,
            Decl::FunctionTemplate(t) => t.span,
            Decl::Var(v) => v.span,
            Decl::Record(r) => r.span,
            Decl::Enum(e) => e.span,
            Decl::Typedef(t) => t.span,
            Decl::Namespace(n) => n.span,
            Decl::MacroInvocation(e) => e.span,
            Decl::Opaque(span) => *span,
        }
    }
}

/// Execution space qualifiers of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CudaQualifiers {
    /// `__global__`
    pub global: bool,
    /// `__device__`
    pub device: bool,
    /// `__host__`
    pub host: bool,
}

impl CudaQualifiers {
    /// A kernel entry point.
    pub fn is_kernel(&self) -> bool {
        self.global
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub id: FunctionId,
    pub name: Ident,
    /// `None` for constructors, destructors and conversion operators
    pub return_type: Option<TypeRef>,
    pub params: ParamList,
    pub body: Option<Block>,
    pub qualifiers: CudaQualifiers,
    pub span: Span,
}

impl FunctionDecl {
    pub fn is_definition(&self) -> bool {
        self.body.is_some()
    }
}

/// Where a parameter list sits in the source.
///
/// Enough to insert a parameter without re-parsing the declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamListLoc {
    /// The `(` token
    pub open: Span,
    /// The `)` token
    pub close: Span,
    /// Span of the first parameter declaration
    pub first_param: Option<Span>,
    /// A lone `void` standing for an empty list
    pub void_span: Option<Span>,
    pub param_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamList {
    pub loc: ParamListLoc,
    pub params: Vec<ParamDecl>,
    /// Ends in `...`
    pub variadic: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParamDecl {
    pub ty: TypeRef,
    pub name: Option<Ident>,
    pub default: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionTemplateDecl {
    /// `template<...>` header
    pub template_params: Span,
    /// The templated function
    pub function: FunctionDecl,
    pub span: Span,
}

impl FunctionTemplateDecl {
    pub fn name(&self) -> &str {
        self.function.name.as_str()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarStorage {
    /// Namespace scope
    Global,
    /// Block scope
    Local,
    /// Data member of a record
    Member,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: Ident,
    pub ty: TypeRef,
    /// Initializer expressions (`= e`, `(a, b)` or `{a, b}`)
    pub init: Vec<Expr>,
    pub storage: VarStorage,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordDecl {
    pub name: Option<Ident>,
    pub members: Vec<Decl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Enumerator {
    pub name: Ident,
    pub value: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDecl {
    pub name: Option<Ident>,
    pub enumerators: Vec<Enumerator>,
    pub span: Span,
}

/// `typedef` or `using` alias.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedefDecl {
    pub name: Ident,
    pub ty: TypeRef,
    pub span: Span,
}

/// Namespace or `extern "C"` block.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceDecl {
    pub name: Option<Ident>,
    pub decls: Vec<Decl>,
    pub span: Span,
}

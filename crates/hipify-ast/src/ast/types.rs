//! Type references and resolved declarations.

use super::{Expr, Ident};
use crate::foundation::Span;
use std::rc::Rc;

/// Where a declaration the front end resolved to lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclOrigin {
    /// Declared in the main file
    MainFile,
    /// Declared by the vendor runtime header
    Vendor,
}

/// Category of a named type's declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Fundamental type (`int`, `float`, `void`, ...)
    Builtin,
    /// `struct`/`class`/`union`
    Record,
    /// `enum`
    Enum,
    /// `typedef` or alias declaration
    Typedef,
    /// Template type parameter
    TemplateParam,
    /// Name the front end could not resolve
    Unknown,
}

/// Semantic information about a written type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeInfo {
    /// Kind of the declaration the name refers to
    pub kind: TypeKind,
    /// Kind after looking through typedefs
    pub canonical: TypeKind,
    /// Pointer levels introduced by typedefs (`cudaStream_t` has one)
    pub alias_pointer_depth: u8,
    pub origin: DeclOrigin,
}

impl TypeInfo {
    /// A main-file or builtin type with no aliasing.
    pub fn plain(kind: TypeKind, origin: DeclOrigin) -> Self {
        Self {
            kind,
            canonical: kind,
            alias_pointer_depth: 0,
            origin,
        }
    }

    /// An unresolved type name.
    pub fn unknown() -> Self {
        Self::plain(TypeKind::Unknown, DeclOrigin::MainFile)
    }
}

/// Template argument written inside a type.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateArg {
    Type(TypeRef),
    Expr(Expr),
}

/// A type as written at one declaration site.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeRef {
    /// The type name token (last component of a qualified name)
    pub name: Ident,
    pub info: TypeInfo,
    pub template_args: Vec<TemplateArg>,
    /// Pointer levels written in the declarator
    pub pointer_depth: u8,
    /// Whole type specifier, qualifiers included
    pub span: Span,
}

impl TypeRef {
    /// True when the name refers to a declaration of the vendor header.
    pub fn is_vendor(&self) -> bool {
        self.info.origin == DeclOrigin::Vendor
            && !matches!(self.info.kind, TypeKind::Builtin | TypeKind::Unknown)
    }

    /// Pointer levels after looking through typedefs.
    pub fn total_pointer_depth(&self) -> u8 {
        self.pointer_depth + self.info.alias_pointer_depth
    }

    /// Canonical kind of the named type.
    pub fn canonical(&self) -> TypeKind {
        self.info.canonical
    }
}

/// Kind of a declaration an identifier resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclKind {
    Function,
    FunctionTemplate,
    Variable,
    Parameter,
    /// Enumerator of the named enumeration
    EnumConstant { enumeration: Rc<str> },
    /// Compiler-provided coordinate object of the named record type
    BuiltinVariable { record: Rc<str> },
    Type,
}

/// Declaration an identifier was resolved to by the front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDecl {
    pub name: Rc<str>,
    pub kind: DeclKind,
    pub origin: DeclOrigin,
}

impl ResolvedDecl {
    pub fn new(name: impl Into<Rc<str>>, kind: DeclKind, origin: DeclOrigin) -> Self {
        Self {
            name: name.into(),
            kind,
            origin,
        }
    }

    pub fn is_vendor(&self) -> bool {
        self.origin == DeclOrigin::Vendor
    }
}

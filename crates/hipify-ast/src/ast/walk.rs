//! Tree walking utilities.
//!
//! One pre-order traversal feeds every consumer of the tree; the caller's
//! closure decides which nodes it cares about.
//!
//! # Design
//!
//! - **Minimal API** - `walk_unit` plus per-node-kind entry points, not a trait hierarchy
//! - **Visitor pattern** - Caller provides `FnMut(Node<'_>)` for node inspection
//! - **Pre-order traversal** - Visitor called before recursing into children
//!
//! Statements, records, enums and typedefs are traversed but not reported;
//! the nodes a rewriter can match are the ones in [`Node`].
//!
//! # Examples
//!
//! ```rust,ignore
//! use hipify_ast::walk::{walk_unit, Node};
//!
//! let mut launches = 0;
//! walk_unit(&unit, &mut |node| {
//!     if let Node::Expr(e) = node {
//!         if matches!(e.kind, ExprKind::KernelLaunch(_)) {
//!             launches += 1;
//!         }
//!     }
//! });
//! ```

use super::{
    Decl, Expr, ExprKind, FunctionDecl, FunctionTemplateDecl, ParamDecl, SizeofOperand, Stmt,
    TemplateArg, TranslationUnit, TypeRef, VarDecl,
};

/// A node reported to the visitor.
#[derive(Debug, Clone, Copy)]
pub enum Node<'a> {
    Function(&'a FunctionDecl),
    FunctionTemplate(&'a FunctionTemplateDecl),
    Var(&'a VarDecl),
    Param(&'a ParamDecl),
    Expr(&'a Expr),
}

/// Walk every declaration of a translation unit in source order.
pub fn walk_unit<V>(unit: &TranslationUnit, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    for decl in &unit.decls {
        walk_decl(decl, visitor);
    }
}

/// Walk one declaration and everything nested in it.
pub fn walk_decl<V>(decl: &Decl, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    match decl {
        Decl::Function(function) => walk_function(function, visitor),
        Decl::FunctionTemplate(template) => {
            visitor(Node::FunctionTemplate(template));
            walk_function(&template.function, visitor);
        }
        Decl::Var(var) => walk_var(var, visitor),
        Decl::Record(record) => {
            for member in &record.members {
                walk_decl(member, visitor);
            }
        }
        Decl::Enum(enumeration) => {
            for value in enumeration.enumerators.iter().filter_map(|e| e.value.as_ref()) {
                walk_expr(value, visitor);
            }
        }
        Decl::Typedef(typedef) => walk_type(&typedef.ty, visitor),
        Decl::Namespace(namespace) => {
            for decl in &namespace.decls {
                walk_decl(decl, visitor);
            }
        }
        Decl::MacroInvocation(expr) => walk_expr(expr, visitor),
        Decl::Opaque(_) => {}
    }
}

fn walk_function<V>(function: &FunctionDecl, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    visitor(Node::Function(function));
    if let Some(ty) = &function.return_type {
        walk_type(ty, visitor);
    }
    for param in &function.params.params {
        walk_param(param, visitor);
    }
    if let Some(body) = &function.body {
        for stmt in &body.stmts {
            walk_stmt(stmt, visitor);
        }
    }
}

fn walk_param<V>(param: &ParamDecl, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    visitor(Node::Param(param));
    walk_type(&param.ty, visitor);
    if let Some(default) = &param.default {
        walk_expr(default, visitor);
    }
}

fn walk_var<V>(var: &VarDecl, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    visitor(Node::Var(var));
    walk_type(&var.ty, visitor);
    for init in &var.init {
        walk_expr(init, visitor);
    }
}

/// Walk the expressions nested in a written type (template arguments).
pub fn walk_type<V>(ty: &TypeRef, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    for arg in &ty.template_args {
        match arg {
            TemplateArg::Type(inner) => walk_type(inner, visitor),
            TemplateArg::Expr(expr) => walk_expr(expr, visitor),
        }
    }
}

/// Walk one statement.
pub fn walk_stmt<V>(stmt: &Stmt, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    match stmt {
        Stmt::Decl(decls) => {
            for decl in decls {
                walk_decl(decl, visitor);
            }
        }
        Stmt::Expr(expr) => walk_expr(expr, visitor),
        Stmt::Block(block) => {
            for stmt in &block.stmts {
                walk_stmt(stmt, visitor);
            }
        }
        Stmt::Control { header, body, .. } => {
            for stmt in header.iter().chain(body) {
                walk_stmt(stmt, visitor);
            }
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(value, visitor);
            }
        }
        Stmt::Other(_) => {}
    }
}

/// Recursively walk an expression tree in pre-order, calling visitor for each node.
pub fn walk_expr<V>(expr: &Expr, visitor: &mut V)
where
    V: FnMut(Node<'_>),
{
    visitor(Node::Expr(expr));

    match &expr.kind {
        ExprKind::DeclRef(r) => {
            for arg in &r.template_args {
                match arg {
                    TemplateArg::Type(ty) => walk_type(ty, visitor),
                    TemplateArg::Expr(e) => walk_expr(e, visitor),
                }
            }
        }

        ExprKind::Call(call) => {
            walk_expr(&call.callee, visitor);
            for arg in &call.args {
                walk_expr(arg, visitor);
            }
        }

        ExprKind::KernelLaunch(launch) => {
            walk_expr(&launch.callee, visitor);
            for value in launch.config.iter().filter_map(|c| c.value.as_ref()) {
                walk_expr(value, visitor);
            }
            for arg in &launch.args {
                walk_expr(arg, visitor);
            }
        }

        ExprKind::Member(member) => walk_expr(&member.base, visitor),

        ExprKind::OpaqueValue(inner) | ExprKind::Unary(inner) | ExprKind::Paren(inner) => {
            walk_expr(inner, visitor)
        }

        ExprKind::Sizeof(sizeof) => match &sizeof.operand {
            SizeofOperand::Type(ty) => walk_type(ty, visitor),
            SizeofOperand::Expr(e) => walk_expr(e, visitor),
        },

        ExprKind::Binary(lhs, rhs) | ExprKind::Index(lhs, rhs) => {
            walk_expr(lhs, visitor);
            walk_expr(rhs, visitor);
        }

        ExprKind::Conditional(cond, then, otherwise) => {
            walk_expr(cond, visitor);
            walk_expr(then, visitor);
            walk_expr(otherwise, visitor);
        }

        ExprKind::Cast { ty, operand } => {
            walk_type(ty, visitor);
            walk_expr(operand, visitor);
        }

        ExprKind::Construct { ty, args } | ExprKind::New { ty, args } => {
            walk_type(ty, visitor);
            for arg in args {
                walk_expr(arg, visitor);
            }
        }

        ExprKind::InitList(items) | ExprKind::Unknown(items) => {
            for item in items {
                walk_expr(item, visitor);
            }
        }

        ExprKind::MacroExpansion { args, .. } => {
            for arg in args {
                walk_expr(arg, visitor);
            }
        }

        ExprKind::Lambda { params, body } => {
            for param in params {
                walk_param(param, visitor);
            }
            for stmt in &body.stmts {
                walk_stmt(stmt, visitor);
            }
        }

        // === Leaf nodes ===
        ExprKind::StringLiteral(_) | ExprKind::Literal => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{
        Block, CallExpr, CudaQualifiers, DeclRefExpr, FunctionId, Ident, ParamList, ParamListLoc,
        TypeInfo, TypeKind, VarStorage,
    };
    use crate::foundation::Span;

    fn leaf(start: u32) -> Expr {
        Expr::new(ExprKind::Literal, Span::new(start, start + 1))
    }

    fn int_type(start: u32) -> TypeRef {
        TypeRef {
            name: Ident::new("int", Span::new(start, start + 3)),
            info: TypeInfo::plain(TypeKind::Builtin, crate::ast::DeclOrigin::MainFile),
            template_args: vec![],
            pointer_depth: 0,
            span: Span::new(start, start + 3),
        }
    }

    #[test]
    fn test_walk_leaf_node() {
        let mut visit_count = 0;
        walk_expr(&leaf(0), &mut |_| visit_count += 1);
        assert_eq!(visit_count, 1, "Leaf node should be visited exactly once");
    }

    #[test]
    fn test_walk_call_is_pre_order() {
        let callee = Expr::new(
            ExprKind::DeclRef(DeclRefExpr {
                name: Ident::new("f", Span::new(0, 1)),
                template_args: vec![],
                decl: None,
            }),
            Span::new(0, 1),
        );
        let call = Expr::new(
            ExprKind::Call(CallExpr {
                callee: Box::new(callee),
                args: vec![leaf(2), leaf(5)],
            }),
            Span::new(0, 7),
        );

        let mut starts = Vec::new();
        walk_expr(&call, &mut |node| {
            if let Node::Expr(e) = node {
                starts.push(e.span.start);
            }
        });
        assert_eq!(starts, vec![0, 0, 2, 5], "call, callee, then arguments");
    }

    #[test]
    fn test_walk_function_reports_params_and_locals() {
        let local = VarDecl {
            name: Ident::new("n", Span::new(20, 21)),
            ty: int_type(16),
            init: vec![leaf(24)],
            storage: VarStorage::Local,
            span: Span::new(16, 25),
        };
        let function = FunctionDecl {
            id: FunctionId(0),
            name: Ident::new("k", Span::new(5, 6)),
            return_type: None,
            params: ParamList {
                loc: ParamListLoc {
                    open: Span::new(6, 7),
                    close: Span::new(12, 13),
                    first_param: Some(Span::new(7, 12)),
                    void_span: None,
                    param_count: 1,
                },
                params: vec![ParamDecl {
                    ty: int_type(7),
                    name: Some(Ident::new("a", Span::new(11, 12))),
                    default: None,
                    span: Span::new(7, 12),
                }],
                variadic: false,
            },
            body: Some(Block {
                stmts: vec![Stmt::Decl(vec![Decl::Var(local)])],
                span: Span::new(14, 27),
            }),
            qualifiers: CudaQualifiers::default(),
            span: Span::new(0, 27),
        };
        let unit = TranslationUnit {
            decls: vec![Decl::Function(function)],
            ..Default::default()
        };

        let mut seen = Vec::new();
        walk_unit(&unit, &mut |node| {
            seen.push(match node {
                Node::Function(_) => "function",
                Node::FunctionTemplate(_) => "template",
                Node::Var(_) => "var",
                Node::Param(_) => "param",
                Node::Expr(_) => "expr",
            })
        });
        assert_eq!(seen, vec!["function", "param", "var", "expr"]);
    }
}

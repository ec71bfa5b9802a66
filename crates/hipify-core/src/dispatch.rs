//! Match dispatch.
//!
//! One pre-order walk of a translation unit classifies every node against the
//! registered AST patterns; each preprocessor event is then dispatched once.
//! A pattern maps to exactly one [`MatchHandler`], so each rewriter can be
//! exercised on a hand-built binding without a traversal.
//!
//! Structural patterns only fire for declarations the front end attributes to
//! the vendor header. String, include and macro patterns are lexical.

use hipify_ast::walk::{walk_unit, Node};
use hipify_ast::{
    DeclKind, Expr, ExprKind, FunctionTemplateDecl, InclusionDirective, MacroDefinition,
    MacroExpansion, ParamDecl, PpEvent, Retokenizer, SizeofOperand, TranslationUnit, TypeKind,
    TypeRef, VarDecl,
};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use tracing::trace;

use crate::edit::{RewriteContext, TextEdit};
use crate::launch::{KernelLaunchRewriter, LaunchSyntax, TemplateParamsRewriter};
use crate::rewrite::{
    BuiltinMemberRewriter, CallRewriter, DeclTypeRewriter, EnumConstantRewriter,
    IncludeRewriter, MacroDefineRewriter, MacroExpansionRewriter, SizeofRewriter,
    StringLiteralRewriter,
};
use crate::table::RenameTable;

/// Identifier of a registered pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pattern {
    Call,
    KernelLaunch,
    BuiltinCoordinateMember,
    EnumConstantRef,
    EnumTypedVar,
    StructVar,
    StructPointerVar,
    ParamType,
    PointerParamType,
    SizeofType,
    StringLiteral,
    IncludeDirective,
    MacroDefine,
    MacroExpansion,
    /// Function template named by a launch whose callee did not resolve
    UnresolvedTemplate,
}

/// The construct a pattern matched.
#[derive(Debug, Clone, Copy)]
pub enum MatchBinding<'a> {
    Expr(&'a Expr),
    Var(&'a VarDecl),
    Param(&'a ParamDecl),
    FunctionTemplate(&'a FunctionTemplateDecl),
    Inclusion(&'a InclusionDirective),
    MacroDefinition(&'a MacroDefinition),
    MacroExpansion(&'a MacroExpansion),
}

/// Everything a handler may consult while rewriting one pass.
pub struct MatchContext<'a> {
    pub source: &'a str,
    pub table: &'a RenameTable,
    pub unit: &'a TranslationUnit,
    pub retokenizer: &'a dyn Retokenizer,
    pub launch: &'a LaunchSyntax,
}

/// A vendor symbol matched structurally but absent from the rename table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct SkippedMatch {
    pub context: RewriteContext,
    pub name: String,
    pub offset: u32,
}

/// What one pass produced.
#[derive(Debug, Default)]
pub struct PassOutput {
    pub edits: Vec<TextEdit>,
    pub skipped: Vec<SkippedMatch>,
    /// Callee names of launches whose parameter list rewrite was deferred
    pub deferred_templates: IndexSet<String>,
}

impl PassOutput {
    pub fn skip(&mut self, context: RewriteContext, name: impl Into<String>, offset: u32) {
        self.skipped.push(SkippedMatch {
            context,
            name: name.into(),
            offset,
        });
    }
}

/// Rewrites the construct bound by one pattern.
pub trait MatchHandler: Send + Sync {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput);
}

/// Pattern registry and traversal.
#[derive(Default)]
pub struct MatchFinder {
    handlers: IndexMap<Pattern, Box<dyn MatchHandler>>,
}

impl MatchFinder {
    /// A finder with no handlers.
    pub fn new() -> Self {
        Self::default()
    }

    /// A finder with every CUDA to HIP rewriter registered.
    pub fn hipify() -> Self {
        let mut finder = Self::new();
        finder.register(Pattern::Call, CallRewriter);
        finder.register(Pattern::KernelLaunch, KernelLaunchRewriter);
        finder.register(Pattern::BuiltinCoordinateMember, BuiltinMemberRewriter);
        finder.register(Pattern::EnumConstantRef, EnumConstantRewriter);
        finder.register(
            Pattern::EnumTypedVar,
            DeclTypeRewriter::new(RewriteContext::EnumTypedVar),
        );
        finder.register(Pattern::StructVar, DeclTypeRewriter::new(RewriteContext::StructVar));
        finder.register(
            Pattern::StructPointerVar,
            DeclTypeRewriter::new(RewriteContext::StructPointerVar),
        );
        finder.register(Pattern::ParamType, DeclTypeRewriter::new(RewriteContext::ParamType));
        finder.register(
            Pattern::PointerParamType,
            DeclTypeRewriter::new(RewriteContext::PointerParamType),
        );
        finder.register(Pattern::SizeofType, SizeofRewriter);
        finder.register(Pattern::StringLiteral, StringLiteralRewriter);
        finder.register(Pattern::IncludeDirective, IncludeRewriter);
        finder.register(Pattern::MacroDefine, MacroDefineRewriter);
        finder.register(Pattern::MacroExpansion, MacroExpansionRewriter);
        finder.register(Pattern::UnresolvedTemplate, TemplateParamsRewriter);
        finder
    }

    /// Register `handler` for `pattern`, replacing any previous handler.
    pub fn register(&mut self, pattern: Pattern, handler: impl MatchHandler + 'static) {
        self.handlers.insert(pattern, Box::new(handler));
    }

    pub fn patterns(&self) -> impl Iterator<Item = Pattern> + '_ {
        self.handlers.keys().copied()
    }

    /// Run every registered pattern over one translation unit.
    pub fn run(&self, cx: &MatchContext<'_>) -> PassOutput {
        let mut out = PassOutput::default();

        walk_unit(cx.unit, &mut |node| {
            if let Some((pattern, binding)) = classify(node) {
                self.dispatch(pattern, binding, cx, &mut out);
            }
        });

        for event in &cx.unit.preprocessor {
            let (pattern, binding) = match event {
                PpEvent::Inclusion(i) => (Pattern::IncludeDirective, MatchBinding::Inclusion(i)),
                PpEvent::MacroDefinition(d) => {
                    (Pattern::MacroDefine, MatchBinding::MacroDefinition(d))
                }
                PpEvent::MacroExpansion(e) => {
                    (Pattern::MacroExpansion, MatchBinding::MacroExpansion(e))
                }
            };
            self.dispatch(pattern, binding, cx, &mut out);
        }

        if !out.deferred_templates.is_empty() {
            let deferred = std::mem::take(&mut out.deferred_templates);
            walk_unit(cx.unit, &mut |node| {
                if let Node::FunctionTemplate(template) = node {
                    if deferred.contains(template.name()) {
                        self.dispatch(
                            Pattern::UnresolvedTemplate,
                            MatchBinding::FunctionTemplate(template),
                            cx,
                            &mut out,
                        );
                    }
                }
            });
            out.deferred_templates = deferred;
        }

        out
    }

    fn dispatch(
        &self,
        pattern: Pattern,
        binding: MatchBinding<'_>,
        cx: &MatchContext<'_>,
        out: &mut PassOutput,
    ) {
        if let Some(handler) = self.handlers.get(&pattern) {
            trace!(?pattern, "match");
            handler.on_match(binding, cx, out);
        }
    }
}

/// The AST pattern a node matches, if any.
pub fn classify(node: Node<'_>) -> Option<(Pattern, MatchBinding<'_>)> {
    match node {
        Node::Expr(expr) => classify_expr(expr).map(|p| (p, MatchBinding::Expr(expr))),
        Node::Var(var) => {
            let pattern = vendor_type_pattern(&var.ty, false)?;
            Some((pattern, MatchBinding::Var(var)))
        }
        Node::Param(param) => {
            let pattern = vendor_type_pattern(&param.ty, true)?;
            Some((pattern, MatchBinding::Param(param)))
        }
        Node::Function(_) | Node::FunctionTemplate(_) => None,
    }
}

fn classify_expr(expr: &Expr) -> Option<Pattern> {
    match &expr.kind {
        ExprKind::Call(call) => call
            .direct_callee()
            .filter(|r| r.decl.as_ref().is_some_and(|d| d.is_vendor()))
            .map(|_| Pattern::Call),
        ExprKind::KernelLaunch(_) => Some(Pattern::KernelLaunch),
        ExprKind::Member(member)
            if member.member_decl.is_some()
                && matches!(member.base.kind, ExprKind::OpaqueValue(_)) =>
        {
            Some(Pattern::BuiltinCoordinateMember)
        }
        ExprKind::DeclRef(r) => r
            .decl
            .as_ref()
            .filter(|d| d.is_vendor() && matches!(d.kind, DeclKind::EnumConstant { .. }))
            .map(|_| Pattern::EnumConstantRef),
        ExprKind::Sizeof(sizeof) => match &sizeof.operand {
            SizeofOperand::Type(ty) if ty.is_vendor() => Some(Pattern::SizeofType),
            _ => None,
        },
        ExprKind::StringLiteral(_) => Some(Pattern::StringLiteral),
        _ => None,
    }
}

fn vendor_type_pattern(ty: &TypeRef, param: bool) -> Option<Pattern> {
    if !ty.is_vendor() {
        return None;
    }
    let pointer = ty.total_pointer_depth() > 0;
    Some(match (param, pointer) {
        (true, false) => Pattern::ParamType,
        (true, true) => Pattern::PointerParamType,
        (false, _) if ty.canonical() == TypeKind::Enum => Pattern::EnumTypedVar,
        (false, false) => Pattern::StructVar,
        (false, true) => Pattern::StructPointerVar,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hipify_ast::{
        CallExpr, DeclOrigin, DeclRefExpr, Ident, ResolvedDecl, Span, TypeInfo, VarStorage,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn vendor_type(name: &str, kind: TypeKind, canonical: TypeKind, alias: u8) -> TypeRef {
        TypeRef {
            name: Ident::new(name, Span::new(0, name.len() as u32)),
            info: TypeInfo {
                kind,
                canonical,
                alias_pointer_depth: alias,
                origin: DeclOrigin::Vendor,
            },
            template_args: vec![],
            pointer_depth: 0,
            span: Span::new(0, name.len() as u32),
        }
    }

    fn var(ty: TypeRef) -> VarDecl {
        VarDecl {
            name: Ident::new("v", Span::new(20, 21)),
            ty,
            init: vec![],
            storage: VarStorage::Local,
            span: Span::new(0, 22),
        }
    }

    fn decl_ref(name: &str, decl: Option<ResolvedDecl>) -> Expr {
        Expr::new(
            ExprKind::DeclRef(DeclRefExpr {
                name: Ident::new(name, Span::new(0, name.len() as u32)),
                template_args: vec![],
                decl,
            }),
            Span::new(0, name.len() as u32),
        )
    }

    fn pattern_of(node: Node<'_>) -> Option<Pattern> {
        classify(node).map(|(p, _)| p)
    }

    #[test]
    fn test_var_patterns_follow_type_shape() {
        let error = var(vendor_type("cudaError_t", TypeKind::Typedef, TypeKind::Enum, 0));
        let stream = var(vendor_type("cudaStream_t", TypeKind::Typedef, TypeKind::Record, 1));
        let prop = var(vendor_type("cudaDeviceProp", TypeKind::Record, TypeKind::Record, 0));
        let mut prop_ptr = prop.clone();
        prop_ptr.ty.pointer_depth = 1;

        assert_eq!(pattern_of(Node::Var(&error)), Some(Pattern::EnumTypedVar));
        assert_eq!(pattern_of(Node::Var(&stream)), Some(Pattern::StructPointerVar));
        assert_eq!(pattern_of(Node::Var(&prop)), Some(Pattern::StructVar));
        assert_eq!(pattern_of(Node::Var(&prop_ptr)), Some(Pattern::StructPointerVar));

        let mut local = prop.clone();
        local.ty.info.origin = DeclOrigin::MainFile;
        assert_eq!(pattern_of(Node::Var(&local)), None, "main-file types never match");
    }

    #[test]
    fn test_param_patterns() {
        let param = ParamDecl {
            ty: vendor_type("cudaStream_t", TypeKind::Typedef, TypeKind::Record, 1),
            name: None,
            default: None,
            span: Span::new(0, 12),
        };
        assert_eq!(pattern_of(Node::Param(&param)), Some(Pattern::PointerParamType));

        let mut by_value = param.clone();
        by_value.ty = vendor_type("cudaError_t", TypeKind::Typedef, TypeKind::Enum, 0);
        assert_eq!(pattern_of(Node::Param(&by_value)), Some(Pattern::ParamType));
    }

    #[test]
    fn test_call_pattern_requires_vendor_callee() {
        let vendor = ResolvedDecl::new("cudaFree", DeclKind::Function, DeclOrigin::Vendor);
        let call = |callee: Expr| {
            Expr::new(
                ExprKind::Call(CallExpr {
                    callee: Box::new(callee),
                    args: vec![],
                }),
                Span::new(0, 10),
            )
        };
        let vendor_call = call(decl_ref("cudaFree", Some(vendor)));
        let local_call = call(decl_ref(
            "helper",
            Some(ResolvedDecl::new("helper", DeclKind::Function, DeclOrigin::MainFile)),
        ));
        assert_eq!(pattern_of(Node::Expr(&vendor_call)), Some(Pattern::Call));
        assert_eq!(pattern_of(Node::Expr(&local_call)), None);
    }

    #[test]
    fn test_enum_constant_pattern() {
        let constant = decl_ref(
            "cudaSuccess",
            Some(ResolvedDecl::new(
                "cudaSuccess",
                DeclKind::EnumConstant {
                    enumeration: "cudaError".into(),
                },
                DeclOrigin::Vendor,
            )),
        );
        assert_eq!(pattern_of(Node::Expr(&constant)), Some(Pattern::EnumConstantRef));
        assert_eq!(pattern_of(Node::Expr(&decl_ref("n", None))), None);
    }

    struct Counting(Arc<AtomicUsize>);

    impl MatchHandler for Counting {
        fn on_match(&self, _: MatchBinding<'_>, _: &MatchContext<'_>, _: &mut PassOutput) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct NoTokens;

    impl Retokenizer for NoTokens {
        fn retokenize(&self, _: &str, _: Span) -> Vec<hipify_ast::RawToken> {
            Vec::new()
        }
    }

    #[test]
    fn test_only_registered_patterns_dispatch() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut finder = MatchFinder::new();
        finder.register(Pattern::EnumTypedVar, Counting(hits.clone()));

        let unit = TranslationUnit {
            decls: vec![
                hipify_ast::Decl::Var(var(vendor_type(
                    "cudaError_t",
                    TypeKind::Typedef,
                    TypeKind::Enum,
                    0,
                ))),
                hipify_ast::Decl::Var(var(vendor_type(
                    "cudaDeviceProp",
                    TypeKind::Record,
                    TypeKind::Record,
                    0,
                ))),
            ],
            ..Default::default()
        };
        let table = RenameTable::default();
        let launch = LaunchSyntax::default();
        let cx = MatchContext {
            source: "",
            table: &table,
            unit: &unit,
            retokenizer: &NoTokens,
            launch: &launch,
        };

        finder.run(&cx);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(finder.patterns().collect::<Vec<_>>(), vec![Pattern::EnumTypedVar]);
    }

    #[test]
    fn test_hipify_registers_every_pattern() {
        assert_eq!(MatchFinder::hipify().patterns().count(), 15);
    }
}

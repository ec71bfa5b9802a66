use hipify_ast::TypeRef;

use super::rename_or_skip;
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Renames the type name written in a variable or parameter declaration.
///
/// One instance is registered per declaration pattern; `context` tags the
/// edits it produces. The name as written is the lookup key, so a typedef
/// such as `cudaError_t` maps to its own HIP spelling.
pub struct DeclTypeRewriter {
    context: RewriteContext,
}

impl DeclTypeRewriter {
    pub fn new(context: RewriteContext) -> Self {
        Self { context }
    }
}

impl MatchHandler for DeclTypeRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let ty: &TypeRef = match binding {
            MatchBinding::Var(var) => &var.ty,
            MatchBinding::Param(param) => &param.ty,
            _ => return,
        };
        rename_or_skip(
            cx,
            out,
            self.context,
            LookupContext::TypeName,
            ty.name.as_str(),
            ty.name.span,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{MatchFinder, Pattern};
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_enum_typed_var() {
        let source = "void f() { cudaError_t err; cudaMemcpyKind kind; }";
        let out = run_pattern(
            Pattern::EnumTypedVar,
            DeclTypeRewriter::new(RewriteContext::EnumTypedVar),
            source,
        );
        assert_eq!(
            apply(source, &out),
            "void f() { hipError_t err; hipMemcpyKind kind; }"
        );
    }

    #[test]
    fn test_struct_and_pointer_vars() {
        let source = "cudaDeviceProp prop; cudaDeviceProp *props; cudaStream_t stream;";
        let direct = run_pattern(
            Pattern::StructVar,
            DeclTypeRewriter::new(RewriteContext::StructVar),
            source,
        );
        assert_eq!(
            apply(source, &direct),
            "hipDeviceProp_t prop; cudaDeviceProp *props; cudaStream_t stream;"
        );

        let pointers = run_pattern(
            Pattern::StructPointerVar,
            DeclTypeRewriter::new(RewriteContext::StructPointerVar),
            source,
        );
        assert_eq!(
            apply(source, &pointers),
            "cudaDeviceProp prop; hipDeviceProp_t *props; hipStream_t stream;"
        );
    }

    #[test]
    fn test_param_types() {
        let source = "void f(cudaStream_t s, cudaError_t e, cudaEvent_t *events) {}";
        let out = run_pattern(
            Pattern::PointerParamType,
            DeclTypeRewriter::new(RewriteContext::PointerParamType),
            source,
        );
        assert_eq!(
            apply(source, &out),
            "void f(hipStream_t s, cudaError_t e, hipEvent_t *events) {}"
        );
        let out = run_pattern(
            Pattern::ParamType,
            DeclTypeRewriter::new(RewriteContext::ParamType),
            source,
        );
        assert_eq!(
            apply(source, &out),
            "void f(cudaStream_t s, hipError_t e, cudaEvent_t *events) {}"
        );
    }

    #[test]
    fn test_record_members_are_variables() {
        let source = "struct Ctx { cudaStream_t stream; int n; };";
        let out = run_pattern(
            Pattern::StructPointerVar,
            DeclTypeRewriter::new(RewriteContext::StructPointerVar),
            source,
        );
        assert_eq!(apply(source, &out), "struct Ctx { hipStream_t stream; int n; };");
    }

    #[test]
    fn test_standard_types_never_match() {
        let source = "void f(size_t n) { size_t m = n; }";
        let finder = MatchFinder::hipify();
        let out = crate::rewrite::testing::run_finder(&finder, source);
        assert!(out.edits.is_empty());
        assert!(out.skipped.is_empty());
    }

    #[test]
    fn test_unmapped_vendor_type_skipped() {
        let source = "dim3 grid;";
        let out = run_pattern(
            Pattern::StructVar,
            DeclTypeRewriter::new(RewriteContext::StructVar),
            source,
        );
        assert!(out.edits.is_empty());
        assert_eq!(out.skipped[0].name, "dim3");
    }
}

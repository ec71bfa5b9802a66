use hipify_ast::ExprKind;

use super::{name_span, rename_or_skip};
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Renames references to vendor enumerators.
pub struct EnumConstantRewriter;

impl MatchHandler for EnumConstantRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::DeclRef(reference) = &expr.kind else {
            return;
        };
        rename_or_skip(
            cx,
            out,
            RewriteContext::EnumConstantRef,
            LookupContext::EnumConstant,
            reference.name.as_str(),
            name_span(expr, &reference.name),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pattern;
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_enumerators_renamed() {
        let source = "int f(int e) { if (e != cudaSuccess) return cudaMemcpyHostToDevice; return 0; }";
        let out = run_pattern(Pattern::EnumConstantRef, EnumConstantRewriter, source);
        assert_eq!(
            apply(source, &out),
            "int f(int e) { if (e != hipSuccess) return hipMemcpyHostToDevice; return 0; }"
        );
    }

    #[test]
    fn test_enumerator_in_type_template_argument() {
        let source = "texture<float, 1, cudaReadModeElementType> tex;";
        let out = run_pattern(Pattern::EnumConstantRef, EnumConstantRewriter, source);
        assert_eq!(
            apply(source, &out),
            "texture<float, 1, hipReadModeElementType> tex;"
        );
    }

    #[test]
    fn test_unmapped_enumerator_skipped() {
        let source = "int m = cudaFilterModeLinear;";
        let out = run_pattern(Pattern::EnumConstantRef, EnumConstantRewriter, source);
        assert!(out.edits.is_empty());
        assert_eq!(out.skipped[0].name, "cudaFilterModeLinear");
    }
}

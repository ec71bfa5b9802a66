use hipify_ast::ExprKind;

use super::{name_span, rename_or_skip};
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Renames the callee of a call to a vendor runtime function.
pub struct CallRewriter;

impl MatchHandler for CallRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::Call(call) = &expr.kind else {
            return;
        };
        let Some(callee) = call.direct_callee() else {
            return;
        };
        let span = name_span(call.callee.ignore_parens(), &callee.name);
        rename_or_skip(
            cx,
            out,
            RewriteContext::Call,
            LookupContext::Callee,
            callee.name.as_str(),
            span,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pattern;
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_call_renamed_in_place() {
        let source = "void f(void **p, int n) { cudaMalloc(p, n); }";
        let out = run_pattern(Pattern::Call, CallRewriter, source);
        assert_eq!(
            apply(source, &out),
            "void f(void **p, int n) { hipMalloc(p, n); }"
        );
    }

    #[test]
    fn test_call_inside_macro_argument_targets_spelling() {
        let source = "#define CHECK(x) x\nvoid f(float *d) { CHECK(cudaFree(d)); }";
        let out = run_pattern(Pattern::Call, CallRewriter, source);
        assert_eq!(out.edits.len(), 1);
        assert_eq!(
            out.edits[0].offset as usize,
            source.find("cudaFree").unwrap()
        );
    }

    #[test]
    fn test_unmapped_vendor_call_is_skipped() {
        let source = "__global__ void k() { __syncthreads(); }";
        let out = run_pattern(Pattern::Call, CallRewriter, source);
        assert!(out.edits.is_empty());
        assert_eq!(out.skipped.len(), 1);
        assert_eq!(out.skipped[0].name, "__syncthreads");
    }

    #[test]
    fn test_local_function_untouched() {
        let source = "void cudaHelper(); void f() { cudaHelper(); }";
        let out = run_pattern(Pattern::Call, CallRewriter, source);
        assert!(out.edits.is_empty());
        assert!(out.skipped.is_empty());
    }
}

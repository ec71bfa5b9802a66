use hipify_ast::ExprKind;

use super::{expr_span, rename_or_skip};
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Prefix of the accessor fields of the builtin coordinate records.
const FIELD_PREFIX: &str = "__fetch_builtin_";

/// Replaces `threadIdx.x` style accesses with the HIP coordinate macro.
///
/// The receiver and the axis are looked up together as `receiver.axis`, and
/// the whole member expression is replaced.
pub struct BuiltinMemberRewriter;

impl MatchHandler for BuiltinMemberRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::Member(member) = &expr.kind else {
            return;
        };
        let (ExprKind::OpaqueValue(receiver), Some(field)) =
            (&member.base.kind, member.member_decl.as_deref())
        else {
            return;
        };
        let ExprKind::DeclRef(receiver) = &receiver.ignore_parens().kind else {
            return;
        };

        let axis = field.strip_prefix(FIELD_PREFIX).unwrap_or(field);
        let key = format!("{}.{}", receiver.name.as_str(), axis);
        rename_or_skip(
            cx,
            out,
            RewriteContext::BuiltinMember,
            LookupContext::BuiltinMember,
            &key,
            expr_span(expr),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pattern;
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_coordinate_members_replaced_whole() {
        let source = "__global__ void k(int *o) { o[threadIdx.x] = blockIdx.y * blockDim.z + gridDim.x; }";
        let out = run_pattern(Pattern::BuiltinCoordinateMember, BuiltinMemberRewriter, source);
        assert_eq!(
            apply(source, &out),
            "__global__ void k(int *o) { o[hipThreadIdx_x] = hipBlockIdx_y * hipBlockDim_z + hipGridDim_x; }"
        );
    }

    #[test]
    fn test_ordinary_member_untouched() {
        let source = "struct P { int x; }; void f(P p) { int a = p.x; }";
        let out = run_pattern(Pattern::BuiltinCoordinateMember, BuiltinMemberRewriter, source);
        assert!(out.edits.is_empty());
    }
}

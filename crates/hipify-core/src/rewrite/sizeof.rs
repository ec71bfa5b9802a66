use hipify_ast::{ExprKind, SizeofOperand};

use super::rename_or_skip;
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Renames a vendor type named as the operand of `sizeof`.
pub struct SizeofRewriter;

impl MatchHandler for SizeofRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::Sizeof(sizeof) = &expr.kind else {
            return;
        };
        let SizeofOperand::Type(ty) = &sizeof.operand else {
            return;
        };
        rename_or_skip(
            cx,
            out,
            RewriteContext::SizeofType,
            LookupContext::TypeName,
            ty.name.as_str(),
            ty.name.span,
        );
    }
}

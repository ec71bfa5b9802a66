//! Context rewriters.
//!
//! One handler per recognized context. Each consumes a [`MatchBinding`],
//! looks the symbol up in the rename table under its [`LookupContext`] and
//! emits zero or more edits. A lookup miss is never an error: structural
//! contexts record it as a skipped match, lexical contexts ignore it.
//!
//! [`MatchBinding`]: crate::dispatch::MatchBinding

mod builtin;
mod call;
mod enums;
mod include;
mod macros;
mod sizeof;
mod strings;
mod types;

pub use builtin::BuiltinMemberRewriter;
pub use call::CallRewriter;
pub use enums::EnumConstantRewriter;
pub use include::IncludeRewriter;
pub use macros::{MacroDefineRewriter, MacroExpansionRewriter};
pub use sizeof::SizeofRewriter;
pub use strings::{scan_string_literal, StringLiteralRewriter};
pub use types::DeclTypeRewriter;

use hipify_ast::{Expr, Ident, Span};
use tracing::debug;

use crate::dispatch::{MatchContext, PassOutput};
use crate::edit::{Provenance, RewriteContext, TextEdit};
use crate::table::LookupContext;

/// Replace `span` with the table entry for `key`, recording a skipped match
/// on a miss.
pub(crate) fn rename_or_skip(
    cx: &MatchContext<'_>,
    out: &mut PassOutput,
    context: RewriteContext,
    lookup: LookupContext,
    key: &str,
    span: Span,
) {
    if !rename(cx, out, context, lookup, key, span) {
        debug!(%context, symbol = key, offset = span.start, "no replacement, skipped");
        out.skip(context, key, span.start);
    }
}

/// Replace `span` with the table entry for `key`; returns false on a miss.
pub(crate) fn rename(
    cx: &MatchContext<'_>,
    out: &mut PassOutput,
    context: RewriteContext,
    lookup: LookupContext,
    key: &str,
    span: Span,
) -> bool {
    let Some(replacement) = cx.table.lookup(lookup, key) else {
        return false;
    };
    debug!(%context, from = key, to = replacement, offset = span.start, "rename");
    out.edits.push(TextEdit::replace(
        span,
        replacement,
        Provenance::new(context, key),
    ));
    true
}

/// The whole expression, anchored where its first token was spelled.
pub(crate) fn expr_span(expr: &Expr) -> Span {
    let start = expr.rewrite_offset();
    Span::new(start, start + expr.span.len())
}

/// The span of `name` inside `expr`, anchored at the expression's rewrite
/// offset.
pub(crate) fn name_span(expr: &Expr, name: &Ident) -> Span {
    let start = expr.rewrite_offset() + name.span.start.saturating_sub(expr.span.start);
    Span::new(start, start + name.as_str().len() as u32)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Run one rewriter over a snippet parsed by the reference front end.

    use hipify_ast::FrontEnd;
    use hipify_frontend::ReferenceFrontEnd;

    use crate::dispatch::{MatchContext, MatchFinder, MatchHandler, PassOutput, Pattern};
    use crate::edit::EditCollector;
    use crate::launch::LaunchSyntax;
    use crate::table::RenameTable;

    /// Parse `source` for the host view and run only `handler` on `pattern`.
    pub fn run_pattern(
        pattern: Pattern,
        handler: impl MatchHandler + 'static,
        source: &str,
    ) -> PassOutput {
        let mut finder = MatchFinder::new();
        finder.register(pattern, handler);
        run_finder(&finder, source)
    }

    /// Parse `source` for the host view and run `finder` over it.
    pub fn run_finder(finder: &MatchFinder, source: &str) -> PassOutput {
        let front_end = ReferenceFrontEnd::default();
        let unit = front_end
            .parse(source, &["--cuda-host-only".to_string()])
            .expect("snippet should parse");
        let table = RenameTable::cuda_to_hip();
        let launch = LaunchSyntax::default();
        let cx = MatchContext {
            source,
            table: &table,
            unit: &unit,
            retokenizer: &front_end,
            launch: &launch,
        };
        finder.run(&cx)
    }

    /// Commit and apply a pass's edits.
    pub fn apply(source: &str, out: &PassOutput) -> String {
        let mut collector = EditCollector::new();
        collector.extend(out.edits.iter().cloned());
        collector
            .commit(source)
            .expect("edits should not conflict")
            .apply(source)
    }
}

use hipify_ast::{RawToken, RawTokenKind, StringLiteral};

use super::{rename, scan_string_literal};
use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::RewriteContext;
use crate::table::LookupContext;

/// Renames identifiers in the replacement list of a `#define`.
///
/// The body is rewritten whether or not the macro is ever expanded.
pub struct MacroDefineRewriter;

impl MatchHandler for MacroDefineRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::MacroDefinition(definition) = binding else {
            return;
        };
        for token in &definition.body {
            if let Some(name) = token.identifier() {
                rename(
                    cx,
                    out,
                    RewriteContext::MacroDefine,
                    LookupContext::Token,
                    name,
                    token.span,
                );
            }
        }
    }
}

/// Renames identifiers and string contents in the actual arguments of a
/// macro invocation.
///
/// Each argument is re-tokenized in isolation, so names the parser could not
/// attribute to a declaration are still found.
pub struct MacroExpansionRewriter;

impl MatchHandler for MacroExpansionRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::MacroExpansion(expansion) = binding else {
            return;
        };
        let Some(args) = &expansion.args else {
            return;
        };
        for arg in args {
            for token in cx.retokenizer.retokenize(cx.source, *arg) {
                rewrite_token(cx, out, &token);
            }
        }
    }
}

fn rewrite_token(cx: &MatchContext<'_>, out: &mut PassOutput, token: &RawToken) {
    match &token.kind {
        RawTokenKind::Identifier(name) => {
            rename(
                cx,
                out,
                RewriteContext::MacroExpansionArg,
                LookupContext::Token,
                name,
                token.span,
            );
        }
        RawTokenKind::StringLiteral { narrow, prefix_len } => {
            let literal = StringLiteral {
                span: token.span,
                prefix_len: *prefix_len,
                narrow: *narrow,
            };
            scan_string_literal(cx, out, &literal);
        }
        RawTokenKind::Other => {}
    }
}

use hipify_ast::{ExprKind, Span, StringLiteral};
use tracing::debug;

use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::{Provenance, RewriteContext, TextEdit};
use crate::table::LookupContext;

/// Renames API names embedded in narrow string literals.
pub struct StringLiteralRewriter;

impl MatchHandler for StringLiteralRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Expr(expr) = binding else {
            return;
        };
        let ExprKind::StringLiteral(literals) = &expr.kind else {
            return;
        };
        for literal in literals {
            scan_string_literal(cx, out, literal);
        }
    }
}

/// Emit one edit per word of `literal` that has a table entry.
///
/// Words are maximal runs of `[A-Za-z0-9_]` starting with a letter or `_`.
/// Escape sequences are skipped. Wide literals are left alone.
pub fn scan_string_literal(cx: &MatchContext<'_>, out: &mut PassOutput, literal: &StringLiteral) {
    if !literal.narrow {
        return;
    }
    let content = literal.content_span();
    let Some(text) = cx.source.get(content.range()) else {
        return;
    };
    for (offset, word) in words(text) {
        let Some(replacement) = cx.table.lookup(LookupContext::Token, word) else {
            continue;
        };
        let start = content.start + offset as u32;
        debug!(from = word, to = replacement, offset = start, "rename in string literal");
        out.edits.push(TextEdit::replace(
            Span::new(start, start + word.len() as u32),
            replacement,
            Provenance::new(RewriteContext::StringLiteral, word),
        ));
    }
}

/// Identifier-like words of a string literal's content with their offsets.
fn words(text: &str) -> Vec<(usize, &str)> {
    let bytes = text.as_bytes();
    let mut words = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let byte = bytes[i];
        if byte == b'\\' {
            i = skip_escape(bytes, i + 1);
        } else if byte.is_ascii_alphabetic() || byte == b'_' {
            let start = i;
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
            words.push((start, &text[start..i]));
        } else if byte.is_ascii_digit() {
            while i < bytes.len() && is_word_byte(bytes[i]) {
                i += 1;
            }
        } else {
            i += 1;
        }
    }
    words
}

fn is_word_byte(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_'
}

/// Index just past the escape sequence whose introducer follows the
/// backslash at `i - 1`.
fn skip_escape(bytes: &[u8], i: usize) -> usize {
    let Some(&introducer) = bytes.get(i) else {
        return i;
    };
    let run = |from: usize, max: usize, accept: fn(&u8) -> bool| {
        from + bytes[from..].iter().take(max).take_while(|b| accept(b)).count()
    };
    match introducer {
        b'x' => run(i + 1, usize::MAX, u8::is_ascii_hexdigit),
        b'u' => run(i + 1, 4, u8::is_ascii_hexdigit),
        b'U' => run(i + 1, 8, u8::is_ascii_hexdigit),
        b'0'..=b'7' => run(i, 3, |b| (b'0'..=b'7').contains(b)),
        _ => i + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pattern;
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_words_skip_escapes_and_numbers() {
        let found: Vec<_> = words(r"\ncudaFree 2cudaMalloc \x41 \101cudaMemcpy,warpSize")
            .into_iter()
            .map(|(_, w)| w)
            .collect();
        assert_eq!(found, vec!["cudaFree", "cudaMemcpy", "warpSize"]);
    }

    #[test]
    fn test_each_occurrence_bounded_to_its_word() {
        let source = r#"const char *m = "cudaMalloc failed, call cudaFree";"#;
        let out = run_pattern(Pattern::StringLiteral, StringLiteralRewriter, source);
        assert_eq!(out.edits.len(), 2);
        for edit in &out.edits {
            let original = &source[edit.span().range()];
            assert!(!original.contains('"'), "edit should not touch quotes");
            assert!(original.starts_with("cuda"));
        }
        assert_eq!(
            apply(source, &out),
            r#"const char *m = "hipMalloc failed, call hipFree";"#
        );
    }

    #[test]
    fn test_word_boundaries() {
        let source = r#"const char *m = "mycudaFree cudaFreeX cudaFree_ \ncudaFree";"#;
        let out = run_pattern(Pattern::StringLiteral, StringLiteralRewriter, source);
        assert_eq!(
            apply(source, &out),
            r#"const char *m = "mycudaFree cudaFreeX cudaFree_ \nhipFree";"#
        );
    }

    #[test]
    fn test_prefixed_literals() {
        let source = r#"const char *a = u8"cudaFree"; const wchar_t *b = L"cudaFree";"#;
        let out = run_pattern(Pattern::StringLiteral, StringLiteralRewriter, source);
        assert_eq!(
            apply(source, &out),
            r#"const char *a = u8"hipFree"; const wchar_t *b = L"cudaFree";"#
        );
    }
}

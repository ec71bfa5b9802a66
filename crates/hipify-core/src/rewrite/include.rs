use tracing::debug;

use crate::dispatch::{MatchBinding, MatchContext, MatchHandler, PassOutput};
use crate::edit::{Provenance, RewriteContext, TextEdit};
use crate::table::LookupContext;

/// Renames angle-bracket inclusions of vendor headers.
///
/// Quoted inclusions name project files and are never rewritten.
pub struct IncludeRewriter;

impl MatchHandler for IncludeRewriter {
    fn on_match(&self, binding: MatchBinding<'_>, cx: &MatchContext<'_>, out: &mut PassOutput) {
        let MatchBinding::Inclusion(include) = binding else {
            return;
        };
        if !include.angled {
            return;
        }
        let Some(replacement) = cx.table.lookup(LookupContext::Header, &include.file_name) else {
            return;
        };
        debug!(from = %include.file_name, to = replacement, "rename include");
        out.edits.push(TextEdit::replace(
            include.filename_range,
            format!("<{}>", replacement),
            Provenance::new(RewriteContext::IncludeDirective, &*include.file_name),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::Pattern;
    use crate::rewrite::testing::{apply, run_pattern};

    #[test]
    fn test_angled_include_renamed() {
        let source = "#include <cuda_runtime.h>\n#include <cuda_runtime_api.h>\n#include <stdio.h>\n";
        let out = run_pattern(Pattern::IncludeDirective, IncludeRewriter, source);
        assert_eq!(
            apply(source, &out),
            "#include <hip_runtime.h>\n#include <hip_runtime_api.h>\n#include <stdio.h>\n"
        );
    }

    #[test]
    fn test_quoted_include_untouched() {
        let source = "#include \"cuda_runtime.h\"\n";
        let out = run_pattern(Pattern::IncludeDirective, IncludeRewriter, source);
        assert!(out.edits.is_empty());
    }
}

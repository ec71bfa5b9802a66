//! Directive processing for one compilation view.
//!
//! The preprocessor filters the token stream down to what the view can see
//! and records what happened along the way:
//!
//! - conditional directives are evaluated against the view's macros;
//!   tokens in inactive regions are dropped
//! - `#include` is recorded, never followed
//! - `#define` / `#undef` update the macro table and are recorded
//! - uses of defined macros are recorded with their argument ranges, but not
//!   substituted; the parser sees the invocation as written. An invocation
//!   with the wrong number of arguments aborts the unit
//! - `#error` in an active region aborts the unit

mod condition;

use crate::invocation::CompilerInvocation;
use crate::parser::ParseError;
use hipify_ast::{
    Ident, InclusionDirective, MacroDefinition, MacroExpansion, PpEvent, RawToken, RawTokenKind,
    Span,
};
use hipify_lexer::{tokenize, Lexeme, Token};
use std::collections::HashMap;
use std::ops::Range;
use std::rc::Rc;
use tracing::{debug, trace};

/// A token with its spelling, as stored in macro bodies.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct PpToken {
    pub token: Token,
    pub text: Rc<str>,
}

/// Lex a standalone snippet (a `-D` value) into spelled tokens.
pub(crate) fn pp_tokens(text: &str) -> Vec<PpToken> {
    tokenize(text)
        .into_iter()
        .filter(|l| l.token != Token::Newline)
        .map(|l| PpToken {
            text: Rc::from(l.text(text)),
            token: l.token,
        })
        .collect()
}

#[derive(Debug)]
pub(crate) struct MacroInfo {
    /// `None` for object-like macros
    pub params: Option<Vec<Rc<str>>>,
    /// The last parameter takes the remaining arguments
    pub variadic: bool,
    pub body: Vec<PpToken>,
}

pub(crate) type MacroTable = HashMap<Rc<str>, Rc<MacroInfo>>;

/// A macro invocation, located in the active token stream.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpansionSite {
    pub name: Rc<str>,
    /// Token index ranges of the actual arguments; `None` for object-like use
    pub args: Option<Vec<Range<usize>>>,
    /// Token index one past the invocation
    pub end: usize,
}

/// Output of preprocessing one unit under one view.
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    /// Active tokens, directives and newlines removed
    pub tokens: Vec<Lexeme>,
    /// Macro invocations keyed by the token index of the macro name
    pub expansions: HashMap<usize, ExpansionSite>,
    /// Main-file events in source order
    pub events: Vec<PpEvent>,
}

/// Convert a lexeme to the contract's token form.
pub(crate) fn raw_token(lexeme: &Lexeme) -> RawToken {
    let kind = match &lexeme.token {
        Token::Ident(name) => RawTokenKind::Identifier(name.clone()),
        Token::Str => RawTokenKind::StringLiteral {
            narrow: true,
            prefix_len: 0,
        },
        Token::Utf8Str => RawTokenKind::StringLiteral {
            narrow: true,
            prefix_len: 2,
        },
        Token::WideStr => RawTokenKind::StringLiteral {
            narrow: false,
            prefix_len: 1,
        },
        _ => RawTokenKind::Other,
    };
    RawToken {
        kind,
        span: Span::from(lexeme.span.clone()),
    }
}

/// Preprocess `source` for the view described by `invocation`.
pub fn preprocess(
    source: &str,
    invocation: &CompilerInvocation,
) -> Result<Preprocessed, ParseError> {
    let mut pp = Preprocessor::new(source, invocation);
    pp.run()?;
    pp.finish()
}

#[derive(Debug, Clone, Copy)]
struct Conditional {
    /// Enclosing region is active
    parent_active: bool,
    /// Current branch is active
    active: bool,
    /// Some branch of this conditional has been taken
    taken: bool,
    seen_else: bool,
    span: Span,
}

struct Preprocessor<'src> {
    source: &'src str,
    macros: MacroTable,
    conditions: Vec<Conditional>,
    tokens: Vec<Lexeme>,
    /// Macro-name tokens that may start an invocation
    candidates: Vec<(usize, Rc<MacroInfo>)>,
    events: Vec<PpEvent>,
}

impl<'src> Preprocessor<'src> {
    fn new(source: &'src str, invocation: &CompilerInvocation) -> Self {
        let mut macros = MacroTable::new();
        for (name, value) in invocation.predefined_macros() {
            match value {
                Some(value) => {
                    macros.insert(
                        Rc::from(name),
                        Rc::new(MacroInfo {
                            params: None,
                            variadic: false,
                            body: pp_tokens(&value),
                        }),
                    );
                }
                None => {
                    macros.remove(name.as_str());
                }
            }
        }
        Self {
            source,
            macros,
            conditions: Vec::new(),
            tokens: Vec::new(),
            candidates: Vec::new(),
            events: Vec::new(),
        }
    }

    fn is_active(&self) -> bool {
        self.conditions.last().map_or(true, |c| c.active)
    }

    fn run(&mut self) -> Result<(), ParseError> {
        let lexemes = tokenize(self.source);
        let mut i = 0;
        let mut line_start = true;

        while i < lexemes.len() {
            let lexeme = &lexemes[i];
            match lexeme.token {
                Token::Newline => {
                    line_start = true;
                    i += 1;
                    continue;
                }
                Token::Hash if line_start => {
                    let end = lexemes[i..]
                        .iter()
                        .position(|l| l.token == Token::Newline)
                        .map_or(lexemes.len(), |p| i + p);
                    self.directive(&lexemes[i..end])?;
                    i = end;
                    continue;
                }
                _ => {}
            }

            line_start = false;
            if self.is_active() {
                if let Token::Ident(name) = &lexeme.token {
                    if let Some(info) = self.macros.get(name) {
                        self.candidates.push((self.tokens.len(), info.clone()));
                    }
                }
                self.tokens.push(lexeme.clone());
            }
            i += 1;
        }

        match self.conditions.last() {
            Some(open) => Err(ParseError::preprocessor(
                "unterminated conditional directive",
                open.span,
            )),
            None => Ok(()),
        }
    }

    fn directive(&mut self, line: &[Lexeme]) -> Result<(), ParseError> {
        let span = match (line.first(), line.last()) {
            (Some(first), Some(last)) => Span::new(first.span.start as u32, last.span.end as u32),
            _ => return Ok(()),
        };
        // Null directive, or `# 12 "file"` line markers.
        let Some(name) = line.get(1).and_then(|l| l.token.ident()) else {
            return Ok(());
        };
        let rest = &line[2..];

        match name {
            "if" => {
                let value = self.is_active() && self.evaluate(rest, span)?;
                self.push_conditional(value, span);
            }
            "ifdef" | "ifndef" => {
                let value = if self.is_active() {
                    let macro_name = rest.first().and_then(|l| l.token.ident()).ok_or_else(|| {
                        ParseError::preprocessor(format!("macro name missing after #{}", name), span)
                    })?;
                    self.macros.contains_key(macro_name) == (name == "ifdef")
                } else {
                    false
                };
                self.push_conditional(value, span);
            }
            "elif" => {
                let frame = self.current_conditional("#elif", span)?;
                if frame.seen_else {
                    return Err(ParseError::preprocessor("#elif after #else", span));
                }
                let value = frame.parent_active && !frame.taken && self.evaluate(rest, span)?;
                if let Some(frame) = self.conditions.last_mut() {
                    frame.active = value;
                    frame.taken |= value;
                }
            }
            "else" => {
                let frame = self.current_conditional("#else", span)?;
                if frame.seen_else {
                    return Err(ParseError::preprocessor("#else after #else", span));
                }
                if let Some(frame) = self.conditions.last_mut() {
                    frame.active = frame.parent_active && !frame.taken;
                    frame.taken = true;
                    frame.seen_else = true;
                }
            }
            "endif" => {
                if self.conditions.pop().is_none() {
                    return Err(ParseError::preprocessor("#endif without #if", span));
                }
            }
            _ if !self.is_active() => {}
            "define" => self.define(rest, span)?,
            "undef" => {
                if let Some(macro_name) = rest.first().and_then(|l| l.token.ident()) {
                    trace!(name = macro_name, "undefining macro");
                    self.macros.remove(macro_name);
                }
            }
            "include" | "include_next" | "import" => self.include(&line[0], rest, span),
            "error" => {
                let message = match (rest.first(), rest.last()) {
                    (Some(first), Some(last)) => &self.source[first.span.start..last.span.end],
                    _ => "",
                };
                return Err(ParseError::preprocessor(format!("#error {}", message), span));
            }
            other => trace!(directive = other, "ignoring directive"),
        }
        Ok(())
    }

    fn current_conditional(&self, directive: &str, span: Span) -> Result<Conditional, ParseError> {
        self.conditions
            .last()
            .copied()
            .ok_or_else(|| ParseError::preprocessor(format!("{} without #if", directive), span))
    }

    fn push_conditional(&mut self, value: bool, span: Span) {
        let parent_active = self.is_active();
        self.conditions.push(Conditional {
            parent_active,
            active: parent_active && value,
            taken: value,
            seen_else: false,
            span,
        });
    }

    fn evaluate(&self, tokens: &[Lexeme], span: Span) -> Result<bool, ParseError> {
        let spelled: Vec<PpToken> = tokens
            .iter()
            .map(|l| PpToken {
                token: l.token.clone(),
                text: Rc::from(l.text(self.source)),
            })
            .collect();
        condition::evaluate(&spelled, &self.macros)
            .map_err(|message| ParseError::preprocessor(message, span))
    }

    fn define(&mut self, rest: &[Lexeme], span: Span) -> Result<(), ParseError> {
        let Some(name_lexeme) = rest.first() else {
            return Err(ParseError::preprocessor("macro name missing after #define", span));
        };
        let Some(name) = name_lexeme.token.ident() else {
            return Err(ParseError::preprocessor("macro name must be an identifier", span));
        };

        // Function-like only when `(` touches the name.
        let function_like = matches!(
            rest.get(1),
            Some(l) if l.token == Token::LParen && l.span.start == name_lexeme.span.end
        );

        let mut variadic = false;
        let (params, body_start) = if function_like {
            let close = rest
                .iter()
                .position(|l| l.token == Token::RParen)
                .ok_or_else(|| ParseError::preprocessor("missing ')' in macro parameter list", span))?;
            let mut params = Vec::new();
            for (i, lexeme) in rest[2..close].iter().enumerate() {
                match &lexeme.token {
                    Token::Ident(param) => params.push(param.clone()),
                    Token::Ellipsis if i + 2 + 1 == close => {
                        variadic = true;
                        // `NAME...` names the variadic pack; `...` alone is `__VA_ARGS__`.
                        if !matches!(rest.get(i + 1).map(|l| &l.token), Some(Token::Ident(_))) {
                            params.push(Rc::from("__VA_ARGS__"));
                        }
                    }
                    Token::Comma => {}
                    other => {
                        return Err(ParseError::preprocessor(
                            format!("unexpected '{}' in macro parameter list", other),
                            span,
                        ))
                    }
                }
            }
            (Some(params), close + 1)
        } else {
            (None, 1)
        };

        let body_lexemes = &rest[body_start.min(rest.len())..];
        let body = body_lexemes
            .iter()
            .map(|l| PpToken {
                token: l.token.clone(),
                text: Rc::from(l.text(self.source)),
            })
            .collect();

        debug!(name, function_like, "macro defined");
        self.events.push(PpEvent::MacroDefinition(MacroDefinition {
            name: Ident::new(name, Span::from(name_lexeme.span.clone())),
            params: params.clone(),
            body: body_lexemes
                .iter()
                .map(raw_token)
                .collect(),
            span,
        }));
        self.macros
                        .insert(Rc::from(name), Rc::new(MacroInfo { params, variadic, body }));
        Ok(())
    }

    fn include(&mut self, hash: &Lexeme, rest: &[Lexeme], span: Span) {
        let (file_name, angled, range) = match rest.first().map(|l| &l.token) {
            Some(Token::Str) => {
                let text = rest[0].text(self.source);
                (&text[1..text.len() - 1], false, rest[0].span.clone())
            }
            Some(Token::Lt) => {
                let Some(close) = rest.iter().position(|l| l.token == Token::Gt) else {
                    trace!("ignoring malformed #include");
                    return;
                };
                let name = &self.source[rest[0].span.end..rest[close].span.start];
                (name, true, rest[0].span.start..rest[close].span.end)
            }
            _ => {
                trace!("ignoring computed #include");
                return;
            }
        };

        debug!(file = file_name, angled, "inclusion directive");
        self.events.push(PpEvent::Inclusion(InclusionDirective {
            hash: Span::from(hash.span.clone()),
            file_name: Rc::from(file_name),
            angled,
            filename_range: Span::from(range),
            span,
        }));
    }

    fn finish(self) -> Result<Preprocessed, ParseError> {
        let Preprocessor {
            source: _,
            tokens,
            candidates,
            mut events,
            ..
        } = self;

        let mut expansions = HashMap::new();
        for (index, info) in candidates {
            let Some(site) = expansion_site(&tokens, index, &info)? else {
                continue;
            };
            let name_span = Span::from(tokens[index].span.clone());
            let end_span = Span::from(tokens[site.end - 1].span.clone());
            let args = site.args.as_ref().map(|ranges| {
                ranges
                    .iter()
                    .map(|range| arg_span(&tokens, range))
                    .collect()
            });
            events.push(PpEvent::MacroExpansion(MacroExpansion {
                name: Ident::new(site.name.clone(), name_span),
                args,
                span: name_span.merge(&end_span),
            }));
            expansions.insert(index, site);
        }

        events.sort_by_key(|event| event.span().start);
        Ok(Preprocessed {
            tokens,
            expansions,
            events,
        })
    }
}

/// Locate the invocation starting at the macro name `index`, if it is one.
///
/// A complete invocation whose argument count does not fit the macro is an
/// error.
fn expansion_site(
    tokens: &[Lexeme],
    index: usize,
    info: &MacroInfo,
) -> Result<Option<ExpansionSite>, ParseError> {
    let Some(name) = tokens[index].token.ident().map(Rc::<str>::from) else {
        return Ok(None);
    };
    let Some(params) = &info.params else {
        return Ok(Some(ExpansionSite {
            name,
            args: None,
            end: index + 1,
        }));
    };

    // A function-like macro name not followed by `(` is not an invocation.
    if tokens.get(index + 1).map(|l| &l.token) != Some(&Token::LParen) {
        return Ok(None);
    }

    let mut args = Vec::new();
    let mut depth = 0usize;
    let mut arg_start = index + 2;
    for (i, lexeme) in tokens.iter().enumerate().skip(index + 2) {
        match lexeme.token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen if depth == 0 => {
                args.push(arg_start..i);
                if params.is_empty() && args.len() == 1 && args[0].is_empty() {
                    args.clear();
                }
                let fits = if info.variadic {
                    args.len() + 1 >= params.len()
                } else {
                    args.len() == params.len()
                };
                if !fits {
                    let (bound, expected) = if info.variadic {
                        ("at least ", params.len() - 1)
                    } else {
                        ("", params.len())
                    };
                    let span = Span::new(tokens[index].span.start as u32, lexeme.span.end as u32);
                    return Err(ParseError::preprocessor(
                        format!(
                            "macro '{}' takes {}{} argument{}, {} given",
                            name,
                            bound,
                            expected,
                            if expected == 1 { "" } else { "s" },
                            args.len()
                        ),
                        span,
                    ));
                }
                return Ok(Some(ExpansionSite {
                    name,
                    args: Some(args),
                    end: i + 1,
                }));
            }
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            Token::Comma if depth == 0 => {
                args.push(arg_start..i);
                arg_start = i + 1;
            }
            _ => {}
        }
    }
    Ok(None)
}

/// Raw source range of one actual argument.
fn arg_span(tokens: &[Lexeme], range: &Range<usize>) -> Span {
    if range.is_empty() {
        // Empty argument: zero-length range at the following delimiter.
        return Span::empty(tokens[range.end].span.start as u32);
    }
    Span::new(
        tokens[range.start].span.start as u32,
        tokens[range.end - 1].span.end as u32,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::CompilationView;

    fn run(source: &str, view: CompilationView) -> Preprocessed {
        let invocation = CompilerInvocation {
            view,
            ..Default::default()
        };
        preprocess(source, &invocation).unwrap()
    }

    fn texts(source: &str, pp: &Preprocessed) -> Vec<String> {
        pp.tokens.iter().map(|l| l.text(source).to_string()).collect()
    }

    #[test]
    fn test_views_select_regions() {
        let source = "#ifdef __CUDA_ARCH__\ndevice_side();\n#else\nhost_side();\n#endif\n";
        let host = run(source, CompilationView::Host);
        assert_eq!(texts(source, &host), vec!["host_side", "(", ")", ";"]);
        let device = run(source, CompilationView::Device);
        assert_eq!(texts(source, &device), vec!["device_side", "(", ")", ";"]);
    }

    #[test]
    fn test_elif_chain_takes_first_true_branch() {
        let source = "#if 0\na\n#elif 1\nb\n#elif 1\nc\n#else\nd\n#endif\n";
        let pp = run(source, CompilationView::Host);
        assert_eq!(texts(source, &pp), vec!["b"]);
    }

    #[test]
    fn test_nested_inactive_regions() {
        let source = "#if 0\n#if 1\na\n#else\nb\n#endif\n#else\nc\n#endif\n";
        let pp = run(source, CompilationView::Host);
        assert_eq!(texts(source, &pp), vec!["c"]);
    }

    #[test]
    fn test_include_recorded() {
        let source = "#include <cuda_runtime.h>\n#include \"local.h\"\n";
        let pp = run(source, CompilationView::Host);
        assert_eq!(pp.events.len(), 2);
        match &pp.events[0] {
            PpEvent::Inclusion(inc) => {
                assert_eq!(&*inc.file_name, "cuda_runtime.h");
                assert!(inc.angled);
                assert_eq!(inc.filename_range.text(source), "<cuda_runtime.h>");
            }
            other => panic!("expected inclusion, got {:?}", other),
        }
        match &pp.events[1] {
            PpEvent::Inclusion(inc) => {
                assert_eq!(&*inc.file_name, "local.h");
                assert!(!inc.angled);
            }
            other => panic!("expected inclusion, got {:?}", other),
        }
    }

    #[test]
    fn test_define_records_body_tokens() {
        let source = "#define CHECK(x) if ((x) != cudaSuccess) return x;\n";
        let pp = run(source, CompilationView::Host);
        let PpEvent::MacroDefinition(def) = &pp.events[0] else {
            panic!("expected a macro definition");
        };
        assert_eq!(def.name.as_str(), "CHECK");
        assert_eq!(def.params.as_deref(), Some(&[Rc::from("x")][..]));
        let success = def
            .body
            .iter()
            .find(|t| t.identifier() == Some("cudaSuccess"))
            .unwrap();
        assert_eq!(success.span.text(source), "cudaSuccess");
    }

    #[test]
    fn test_object_like_when_paren_is_separated() {
        let source = "#define PAIR (1, 2)\n";
        let pp = run(source, CompilationView::Host);
        let PpEvent::MacroDefinition(def) = &pp.events[0] else {
            panic!("expected a macro definition");
        };
        assert!(!def.is_function_like());
    }

    #[test]
    fn test_expansion_argument_ranges() {
        let source = "#define CALL(f, a) f(a)\nCALL(cudaFree, (p, q));\n";
        let pp = run(source, CompilationView::Host);
        let expansion = pp
            .events
            .iter()
            .find_map(|e| match e {
                PpEvent::MacroExpansion(m) => Some(m),
                _ => None,
            })
            .unwrap();
        let args: Vec<&str> = expansion
            .args
            .as_ref()
            .unwrap()
            .iter()
            .map(|s| s.text(source))
            .collect();
        assert_eq!(args, vec!["cudaFree", "(p, q)"]);
        assert_eq!(expansion.span.text(source), "CALL(cudaFree, (p, q))");

        let site = pp.expansions.get(&0).unwrap();
        assert_eq!(site.end, 10);
    }

    #[test]
    fn test_function_like_without_parens_is_not_expanded() {
        let source = "#define F(x) x\nint F;\n";
        let pp = run(source, CompilationView::Host);
        assert!(pp.expansions.is_empty());
    }

    #[test]
    fn test_undef_stops_recording() {
        let source = "#define N 4\nint a = N;\n#undef N\nint b = N;\n";
        let pp = run(source, CompilationView::Host);
        assert_eq!(pp.expansions.len(), 1);
    }

    #[test]
    fn test_error_directive_is_fatal_only_when_active() {
        let invocation = CompilerInvocation::default();
        let err = preprocess("#error unsupported target\n", &invocation).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.contains("unsupported target"));

        assert!(preprocess("#if 0\n#error hidden\n#endif\n", &invocation).is_ok());
    }

    #[test]
    fn test_unterminated_conditional() {
        let err = preprocess("#ifdef X\nint a;\n", &CompilerInvocation::default()).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_command_line_defines() {
        let invocation = CompilerInvocation::from_args(&["-DFAST".to_string()]).unwrap();
        let source = "#ifdef FAST\nfast\n#endif\n";
        let pp = preprocess(source, &invocation).unwrap();
        assert_eq!(texts(source, &pp), vec!["fast"]);
    }

    #[test]
    fn test_macro_argument_count_mismatch() {
        let source = "#define K(x) x\nvoid h() { K(k<<<1, 1>>>()); }\n";
        let err = preprocess(source, &CompilerInvocation::default()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.message.contains("'K' takes 1 argument, 2 given"));
        assert_eq!(err.span.start as usize, source.find("K(k").unwrap());
    }

    #[test]
    fn test_variadic_macro_argument_counts() {
        let source = "#define LOG(fmt, ...) f(fmt)\nLOG(a);\nLOG(a, b, c);\n";
        let pp = run(source, CompilationView::Host);
        assert_eq!(pp.expansions.len(), 2);

        let invocation = CompilerInvocation::default();
        assert!(preprocess("#define LOG(fmt, ...) f(fmt)\nLOG();\n", &invocation).is_ok());
        let err = preprocess("#define P(a, b, ...) a\nP(1);\n", &invocation).unwrap_err();
        assert!(err.message.contains("takes at least 2 arguments, 1 given"));
    }
}

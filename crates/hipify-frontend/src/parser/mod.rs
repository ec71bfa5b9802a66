//! Hand-written recursive descent parser for CUDA C++.
//!
//! The parser is lenient: it builds nodes for the constructs the rewriter
//! cares about (functions, variables, calls, kernel launches, member
//! accesses, `sizeof`, string literals, macro invocations) and skims the
//! rest. A declaration or statement it cannot make sense of becomes an
//! opaque node and parsing resumes after it.
//!
//! ## Architecture
//!
//! - `stream`: TokenStream wrapper with lookahead
//! - `error`: ParseError and the fatal/recoverable split
//! - `scope`: main-file symbols for name resolution
//! - `types`: type specifiers, template arguments, type lookahead
//! - `decl`: declarations (functions, templates, records, enums, variables)
//! - `stmt`: statements inside function bodies
//! - `expr`: expressions, by precedence climbing
//!
//! Names resolve against main-file declarations first and the
//! [`VendorModel`] second.

mod decl;
mod error;
mod expr;
mod scope;
mod stmt;
mod stream;
mod types;

pub use error::{ParseError, ParseErrorKind};
pub use stream::TokenStream;

use crate::preprocess::{ExpansionSite, Preprocessed};
use crate::vendor::VendorModel;
use hipify_ast::{
    DeclKind, DeclOrigin, Expr, ExprKind, FunctionEntry, ResolvedDecl, SourceLocation, Span,
    TranslationUnit, TypeInfo, VarStorage,
};
use hipify_lexer::{Lexeme, Token};
use scope::{Scopes, Symbol};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Parse the active tokens of one preprocessed unit.
///
/// Delimiters are checked for balance up front; an unbalanced stream is a
/// fatal error since recovery relies on skipping whole groups.
pub fn parse_unit(
    pp: Preprocessed,
    vendor: &VendorModel,
) -> Result<TranslationUnit, ParseError> {
    let Preprocessed {
        tokens,
        expansions,
        events,
    } = pp;
    check_delimiters(&tokens)?;

    let mut parser = Parser::new(&tokens, &expansions, vendor);
    let decls = parser.parse_declarations(VarStorage::Global)?;
    if !parser.stream.at_end() {
        return Err(ParseError::unexpected_token(
            parser.stream.peek(),
            "at namespace scope",
            parser.stream.current_span(),
        ));
    }
    debug!(
        decls = decls.len(),
        functions = parser.functions.len(),
        "parsed translation unit"
    );

    Ok(TranslationUnit {
        decls,
        preprocessor: events,
        functions: parser.functions,
    })
}

fn check_delimiters(tokens: &[Lexeme]) -> Result<(), ParseError> {
    let mut open: Vec<&Lexeme> = Vec::new();
    for lexeme in tokens {
        let expected = match lexeme.token {
            Token::LParen | Token::LBracket | Token::LBrace => {
                open.push(lexeme);
                continue;
            }
            Token::RParen => Token::LParen,
            Token::RBracket => Token::LBracket,
            Token::RBrace => Token::LBrace,
            _ => continue,
        };
        match open.pop() {
            Some(opener) if opener.token == expected => {}
            Some(opener) => {
                return Err(ParseError::unbalanced(
                    format!("'{}' does not close '{}'", lexeme.token, opener.token),
                    Span::from(lexeme.span.clone()),
                ))
            }
            None => {
                return Err(ParseError::unbalanced(
                    format!("unmatched '{}'", lexeme.token),
                    Span::from(lexeme.span.clone()),
                ))
            }
        }
    }
    match open.pop() {
        Some(opener) => Err(ParseError::unbalanced(
            format!("'{}' is never closed", opener.token),
            Span::from(opener.span.clone()),
        )),
        None => Ok(()),
    }
}

pub(crate) struct Parser<'src> {
    pub(crate) stream: TokenStream<'src>,
    expansions: &'src HashMap<usize, ExpansionSite>,
    vendor: &'src VendorModel,
    scopes: Scopes,
    functions: Vec<FunctionEntry>,
    /// Offset of the macro invocation whose argument is being parsed
    macro_arg: Option<u32>,
    /// A `>` ends the expression (template argument context)
    no_gt: bool,
    /// `>` still owed to enclosing template argument lists after a `>>`
    pending_closes: usize,
    /// Template argument lists currently open
    template_depth: usize,
    /// The declaration being parsed follows a `template<...>` header
    in_template: bool,
    /// Names of the records whose bodies are open, innermost last
    records: Vec<std::rc::Rc<str>>,
}

impl<'src> Parser<'src> {
    fn new(
        tokens: &'src [Lexeme],
        expansions: &'src HashMap<usize, ExpansionSite>,
        vendor: &'src VendorModel,
    ) -> Self {
        Self {
            stream: TokenStream::new(tokens),
            expansions,
            vendor,
            scopes: Scopes::new(),
            functions: Vec::new(),
            macro_arg: None,
            no_gt: false,
            pending_closes: 0,
            template_depth: 0,
            in_template: false,
            records: Vec::new(),
        }
    }

    /// Build an expression at `span`, located for the current context.
    fn expr(&self, kind: ExprKind, span: Span) -> Expr {
        self.expr_at(kind, span, span.start)
    }

    /// Build an expression whose leading token is at `offset`.
    fn expr_at(&self, kind: ExprKind, span: Span, offset: u32) -> Expr {
        let loc = match self.macro_arg {
            Some(expansion) => SourceLocation::macro_arg(offset, expansion),
            None => SourceLocation::file(offset),
        };
        Expr::with_loc(kind, span, loc)
    }

    /// Turn a recoverable error into `None` after skipping the construct.
    ///
    /// Fatal errors pass through. Scopes opened by the failed construct are
    /// closed and context flags reset.
    fn recover<T>(
        &mut self,
        start: usize,
        depth: usize,
        result: Result<T, ParseError>,
    ) -> Result<Option<T>, ParseError> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                self.scopes.truncate(depth);
                self.pending_closes = 0;
                self.template_depth = 0;
                self.stream.seek(start);
                self.stream.synchronize();
                let skimmed = self.stream.span_from(start);
                warn!(
                    error = %err,
                    start = skimmed.start,
                    end = skimmed.end,
                    "skimmed unsupported construct, names inside are not rewritten"
                );
                Ok(None)
            }
        }
    }

    /// Run `f` with template-argument context switched off, as inside a
    /// parenthesized group.
    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let no_gt = std::mem::replace(&mut self.no_gt, false);
        let result = f(self);
        self.no_gt = no_gt;
        result
    }

    /// Macro invocation starting `n` tokens ahead.
    fn expansion_at(&self, n: usize) -> Option<&'src ExpansionSite> {
        let index = self.stream.current_pos() + n;
        if index < self.stream.limit() {
            self.expansions.get(&index)
        } else {
            None
        }
    }

    /// An object-like macro `n` tokens ahead standing in for a specifier,
    /// as in `DEVICE float f(...)`: a type and a name still follow it.
    fn is_specifier_macro(&self, n: usize) -> bool {
        let object_like = matches!(self.expansion_at(n), Some(site) if site.args.is_none());
        object_like
            && matches!(self.stream.peek_nth(n + 1), Some(Token::Ident(_)))
            && matches!(
                self.stream.peek_nth(n + 2),
                Some(Token::Ident(_) | Token::Star | Token::Amp | Token::ColonColon | Token::Lt)
            )
    }

    /// Type information for a type name, main file first.
    fn type_info(&self, name: &str) -> Option<TypeInfo> {
        match self.scopes.lookup(name) {
            Some(Symbol::Type(info)) => Some(*info),
            Some(_) => None,
            None => self.vendor.type_info(name),
        }
    }

    /// Resolve a name used as an expression.
    fn resolve_value(&self, name: &str) -> Option<ResolvedDecl> {
        let (kind, origin) = match self.scopes.lookup(name) {
            Some(Symbol::Functions(_)) => (DeclKind::Function, DeclOrigin::MainFile),
            Some(Symbol::FunctionTemplate) => (DeclKind::FunctionTemplate, DeclOrigin::MainFile),
            Some(Symbol::Value(kind)) => (kind.clone(), DeclOrigin::MainFile),
            Some(Symbol::Type(info)) => (DeclKind::Type, info.origin),
            None => {
                if let Some(decl) = self.vendor.resolve_value(name) {
                    return Some(decl);
                }
                let info = self.vendor.type_info(name)?;
                (DeclKind::Type, info.origin)
            }
        };
        Some(ResolvedDecl::new(name, kind, origin))
    }

    /// The name denotes a variable, parameter, enumerator or function.
    fn is_value_name(&self, name: &str) -> bool {
        matches!(self.resolve_value(name), Some(d) if d.kind != DeclKind::Type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::invocation::CompilerInvocation;
    use crate::preprocess::preprocess;

    fn parse(source: &str) -> Result<TranslationUnit, ParseError> {
        let pp = preprocess(source, &CompilerInvocation::default())?;
        parse_unit(pp, &VendorModel::default())
    }

    #[test]
    fn test_unbalanced_delimiters_are_fatal() {
        let err = parse("void f() { g(1; }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);

        let err = parse("int x = 1; }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::UnbalancedDelimiter);

        let err = parse("void f() {").unwrap_err();
        assert!(err.message.contains("never closed"));
    }

    #[test]
    fn test_garbage_declaration_is_skimmed() {
        let unit = parse("= = nonsense ( a ) ; int after = 1;").unwrap();
        assert!(matches!(unit.decls.last(), Some(hipify_ast::Decl::Var(v)) if v.name.as_str() == "after"));
    }

    #[test]
    fn test_vendor_names_resolve() {
        let tokens = hipify_lexer::tokenize("x");
        let expansions = HashMap::new();
        let vendor = VendorModel::default();
        let parser = Parser::new(&tokens, &expansions, &vendor);
        let decl = parser.resolve_value("cudaMalloc").unwrap();
        assert_eq!(decl.kind, DeclKind::Function);
        assert!(decl.is_vendor());
        assert_eq!(parser.resolve_value("cudaStream_t").unwrap().kind, DeclKind::Type);
        assert!(parser.resolve_value("undeclared").is_none());
        assert!(!parser.is_value_name("dim3"));
    }
}

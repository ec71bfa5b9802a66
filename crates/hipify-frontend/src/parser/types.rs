//! Type specifiers, template argument lists and type lookahead.

use super::{ParseError, Parser};
use hipify_ast::{DeclOrigin, Ident, TemplateArg, TypeInfo, TypeKind, TypeRef};
use hipify_lexer::Token;

const BUILTIN_TYPES: &[&str] = &[
    "void", "bool", "char", "short", "int", "long", "float", "double", "signed", "unsigned",
    "wchar_t", "char8_t", "char16_t", "char32_t", "auto", "__int128", "_Bool",
];

const CV_QUALIFIERS: &[&str] = &[
    "const",
    "volatile",
    "__restrict__",
    "__restrict",
    "restrict",
];

const ELABORATED: &[&str] = &["struct", "class", "union", "enum"];

/// Decl-specifiers that carry no type information.
const STORAGE_SPECIFIERS: &[&str] = &[
    "static",
    "extern",
    "inline",
    "__inline__",
    "__forceinline__",
    "__noinline__",
    "constexpr",
    "register",
    "mutable",
    "thread_local",
    "virtual",
    "explicit",
    "__global__",
    "__device__",
    "__host__",
    "__shared__",
    "__constant__",
    "__managed__",
];

/// Attribute-like keywords, optionally followed by a parenthesized group.
const ATTRIBUTES: &[&str] = &[
    "__launch_bounds__",
    "__attribute__",
    "__declspec",
    "alignas",
    "__align__",
    "__builtin_align__",
];

/// Words that never name a declaration.
const RESERVED: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "return", "break",
    "continue", "goto", "sizeof", "new", "delete", "this", "true", "false", "nullptr", "typedef",
    "using", "template", "namespace", "public", "private", "protected", "try", "catch", "throw",
    "static_cast", "dynamic_cast", "reinterpret_cast", "const_cast", "operator",
];

pub(super) fn is_builtin_type(word: &str) -> bool {
    BUILTIN_TYPES.contains(&word)
}

pub(super) fn is_cv(word: &str) -> bool {
    CV_QUALIFIERS.contains(&word)
}

pub(super) fn is_elaborated(word: &str) -> bool {
    ELABORATED.contains(&word)
}

pub(super) fn is_storage_specifier(word: &str) -> bool {
    STORAGE_SPECIFIERS.contains(&word)
}

pub(super) fn is_attribute(word: &str) -> bool {
    ATTRIBUTES.contains(&word)
}

pub(super) fn is_reserved(word: &str) -> bool {
    RESERVED.contains(&word) || is_builtin_type(word) || is_cv(word) || is_elaborated(word)
}

impl<'src> Parser<'src> {
    pub(super) fn expect_ident(&mut self) -> Result<Ident, ParseError> {
        match self.stream.peek() {
            Some(Token::Ident(name)) => {
                let ident = Ident::new(name.clone(), self.stream.current_span());
                self.stream.advance();
                Ok(ident)
            }
            other => Err(ParseError::unexpected_token(
                other,
                "where a name was expected",
                self.stream.current_span(),
            )),
        }
    }

    pub(super) fn skip_cv(&mut self) {
        while matches!(self.stream.peek(), Some(Token::Ident(k)) if is_cv(k)) {
            self.stream.advance();
        }
    }

    /// Skip `__attribute__((...))`, `__launch_bounds__(...)`, `[[...]]` and
    /// the like.
    pub(super) fn skip_attributes(&mut self) {
        loop {
            match self.stream.peek() {
                Some(Token::Ident(k)) if is_attribute(k) => {
                    self.stream.advance();
                    if self.stream.check(&Token::LParen) {
                        self.stream.skip_group();
                    }
                }
                Some(Token::LBracket) if self.stream.peek_nth(1) == Some(&Token::LBracket) => {
                    self.stream.skip_group();
                }
                _ => return,
            }
        }
    }

    /// The name refers to a type in the current scope.
    pub(super) fn is_type_name(&self, name: &str) -> bool {
        is_builtin_type(name) || self.type_info(name).is_some()
    }

    /// A type specifier starts `n` tokens ahead.
    pub(super) fn is_type_start(&self, n: usize) -> bool {
        match self.stream.peek_nth(n) {
            Some(Token::Ident(k)) => {
                is_cv(k) || is_elaborated(k) || &**k == "typename" || self.is_type_name(k)
            }
            Some(Token::ColonColon) => {
                matches!(self.stream.peek_nth(n + 1), Some(Token::Ident(k)) if self.is_type_name(k))
            }
            _ => false,
        }
    }

    /// Length of a type-id starting `n` tokens ahead, without consuming.
    ///
    /// Returns the relative index just past it and whether pointer or
    /// reference declarators were part of it.
    pub(super) fn scan_type_id(&self, n: usize) -> Option<(usize, bool)> {
        let base = self.stream.current_pos();
        let mut i = n;
        let mut named = false;
        loop {
            match self.stream.peek_nth(i) {
                Some(Token::Ident(k)) if is_cv(k) || is_elaborated(k) || &**k == "typename" => {
                    i += 1
                }
                Some(Token::Ident(k)) if is_builtin_type(k) => {
                    named = true;
                    i += 1;
                }
                Some(Token::Ident(k)) if !named && !is_reserved(k) => {
                    named = true;
                    i += 1;
                    loop {
                        if self.stream.peek_nth(i) == Some(&Token::Lt) {
                            i = self.stream.angles_end(base + i)? - base;
                        }
                        if self.stream.peek_nth(i) == Some(&Token::ColonColon)
                            && matches!(self.stream.peek_nth(i + 1), Some(Token::Ident(_)))
                        {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                }
                Some(Token::ColonColon) if !named => i += 1,
                _ => break,
            }
        }
        if !named {
            return None;
        }

        let mut pointer = false;
        loop {
            match self.stream.peek_nth(i) {
                Some(Token::Star | Token::Amp | Token::AmpAmp) => {
                    pointer = true;
                    i += 1;
                }
                Some(Token::Ident(k)) if is_cv(k) => i += 1,
                _ => break,
            }
        }
        Some((i, pointer))
    }

    /// Parse a type specifier: cv-qualifiers, an optional elaborated
    /// keyword, and a builtin or (qualified, templated) type name.
    ///
    /// Pointer declarators are not included; see [`Parser::parse_pointers`].
    pub(super) fn parse_type_specifier(&mut self) -> Result<TypeRef, ParseError> {
        let start = self.stream.current_pos();
        self.skip_cv();
        let elaborated = match self.stream.peek() {
            Some(Token::Ident(k)) if is_elaborated(k) => {
                let kind = if &**k == "enum" {
                    TypeKind::Enum
                } else {
                    TypeKind::Record
                };
                self.stream.advance();
                if kind == TypeKind::Enum && !self.stream.eat_keyword("class") {
                    self.stream.eat_keyword("struct");
                }
                self.skip_attributes();
                Some(kind)
            }
            _ => None,
        };
        self.stream.eat_keyword("typename");

        if let Some(Token::Ident(first)) = self.stream.peek() {
            if is_builtin_type(first) {
                let first_pos = self.stream.current_pos();
                while matches!(
                    self.stream.peek(),
                    Some(Token::Ident(k)) if is_builtin_type(k) || is_cv(k)
                ) {
                    self.stream.advance();
                }
                let name = Ident::new(first.clone(), self.stream.span_from(first_pos));
                return Ok(TypeRef {
                    name,
                    info: TypeInfo::plain(TypeKind::Builtin, DeclOrigin::MainFile),
                    template_args: Vec::new(),
                    pointer_depth: 0,
                    span: self.stream.span_from(start),
                });
            }
            if matches!(&**first, "decltype" | "__typeof__" | "typeof") {
                let name = self.expect_ident()?;
                if self.stream.check(&Token::LParen) {
                    self.stream.skip_group();
                }
                return Ok(TypeRef {
                    name,
                    info: TypeInfo::unknown(),
                    template_args: Vec::new(),
                    pointer_depth: 0,
                    span: self.stream.span_from(start),
                });
            }
        }

        self.stream.eat(&Token::ColonColon);
        let mut name = self.expect_ident()?;
        if is_reserved(&name.name) {
            return Err(ParseError::invalid_syntax(
                format!("'{}' does not name a type", name.name),
                name.span,
            ));
        }
        let mut template_args = Vec::new();
        loop {
            let pos = self.stream.current_pos();
            if self.stream.check(&Token::Lt) && self.stream.angles_end(pos).is_some() {
                template_args = self.parse_template_args()?;
                if self.pending_closes > 0 {
                    break;
                }
            }
            if self.stream.check(&Token::ColonColon)
                && matches!(self.stream.peek_nth(1), Some(Token::Ident(_)))
            {
                self.stream.advance();
                self.stream.eat_keyword("template");
                name = self.expect_ident()?;
                template_args.clear();
                continue;
            }
            break;
        }

        let info = match (self.type_info(&name.name), elaborated) {
            (Some(info), _) => info,
            (None, Some(kind)) => TypeInfo::plain(kind, DeclOrigin::MainFile),
            (None, None) => TypeInfo::unknown(),
        };
        if self.pending_closes == 0 {
            self.skip_cv();
        }
        Ok(TypeRef {
            name,
            info,
            template_args,
            pointer_depth: 0,
            span: self.stream.span_from(start),
        })
    }

    /// Consume `*`, `&`, `&&` and trailing cv-qualifiers; returns the
    /// number of `*`.
    pub(super) fn parse_pointers(&mut self) -> u8 {
        let mut depth = 0u8;
        loop {
            match self.stream.peek() {
                Some(Token::Star) => depth = depth.saturating_add(1),
                Some(Token::Amp | Token::AmpAmp) => {}
                Some(Token::Ident(k)) if is_cv(k) => {}
                _ => return depth,
            }
            self.stream.advance();
        }
    }

    /// Parse `<args>` at the current `<`.
    ///
    /// A `>>` or `>>>` closing an inner list also closes enclosing ones;
    /// the surplus is carried in `pending_closes` for them to claim.
    pub(super) fn parse_template_args(&mut self) -> Result<Vec<TemplateArg>, ParseError> {
        let open = self.stream.expect(Token::Lt)?;
        self.template_depth += 1;
        let result = self.template_arg_list(open);
        self.template_depth -= 1;
        result
    }

    fn template_arg_list(
        &mut self,
        open: hipify_ast::Span,
    ) -> Result<Vec<TemplateArg>, ParseError> {
        let mut args = Vec::new();
        if self.eat_template_close() {
            return Ok(args);
        }
        loop {
            let arg = if self.template_arg_is_type() {
                let mut ty = self.parse_type_specifier()?;
                if self.pending_closes == 0 {
                    ty.pointer_depth = self.parse_pointers();
                }
                TemplateArg::Type(ty)
            } else {
                let no_gt = std::mem::replace(&mut self.no_gt, true);
                let result = self.parse_assignment();
                self.no_gt = no_gt;
                TemplateArg::Expr(result?)
            };
            args.push(arg);
            self.stream.eat(&Token::Ellipsis);

            if self.eat_template_close() {
                return Ok(args);
            }
            if !self.stream.eat(&Token::Comma) {
                return Err(ParseError::invalid_syntax(
                    "unterminated template argument list",
                    open,
                ));
            }
        }
    }

    /// Known type names, and unknown names used the way a type would be
    /// (`vector<float>`, `T*`, a lone `Foo`).
    fn template_arg_is_type(&self) -> bool {
        if self.is_type_start(0) {
            return true;
        }
        match (self.stream.peek(), self.stream.peek_nth(1)) {
            (Some(Token::Ident(k)), Some(next))
                if !is_reserved(k) && !self.is_value_name(k) && self.expansion_at(0).is_none() =>
            {
                matches!(
                    next,
                    Token::Lt | Token::ColonColon | Token::Comma | Token::Star | Token::Amp
                ) || next.closing_angles() > 0
            }
            _ => false,
        }
    }

    /// Close the innermost template argument list, if the next token (or a
    /// `>` left over from a `>>`) does so.
    pub(super) fn eat_template_close(&mut self) -> bool {
        if self.pending_closes > 0 {
            self.pending_closes -= 1;
            return true;
        }
        let closes = match self.stream.peek() {
            Some(token) => token.closing_angles(),
            None => 0,
        };
        if closes == 0 {
            return false;
        }
        self.stream.advance();
        let enclosing = self.template_depth.saturating_sub(1);
        self.pending_closes = (closes - 1).min(enclosing);
        true
    }
}

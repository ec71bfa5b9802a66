//! Declaration parsing.
//!
//! Dispatch is keyword-driven (`template`, `namespace`, `typedef`, ...);
//! everything else is a simple declaration: decl-specifiers, a type, and
//! one or more declarators, each a variable or a function.

use super::scope::Symbol;
use super::types::{
    is_attribute, is_builtin_type, is_cv, is_elaborated, is_reserved, is_storage_specifier,
};
use super::{ParseError, Parser};
use hipify_ast::{
    Block, CudaQualifiers, Decl, DeclKind, DeclOrigin, EnumDecl, Enumerator, ExprKind,
    FunctionDecl, FunctionEntry, FunctionId, FunctionTemplateDecl, Ident, NamespaceDecl,
    ParamDecl, ParamList, ParamListLoc, RecordDecl, Span, TypeInfo, TypeKind, TypeRef,
    TypedefDecl, VarDecl, VarStorage,
};
use hipify_lexer::Token;
use std::rc::Rc;

impl<'src> Parser<'src> {
    /// Parse declarations until the end of input or a closing `}`.
    ///
    /// A declaration that fails to parse is skimmed and kept as
    /// [`Decl::Opaque`].
    pub(super) fn parse_declarations(
        &mut self,
        storage: VarStorage,
    ) -> Result<Vec<Decl>, ParseError> {
        let mut decls = Vec::new();
        while !self.stream.at_end() && !self.stream.check(&Token::RBrace) {
            let start = self.stream.current_pos();
            let depth = self.scopes.depth();
            let result = self.parse_declaration(storage);
            match self.recover(start, depth, result)? {
                Some(mut parsed) => decls.append(&mut parsed),
                None => decls.push(Decl::Opaque(self.stream.span_from(start))),
            }
        }
        Ok(decls)
    }

    pub(super) fn parse_declaration(
        &mut self,
        storage: VarStorage,
    ) -> Result<Vec<Decl>, ParseError> {
        let start = self.stream.current_pos();
        let keyword = match self.stream.peek() {
            None => return Ok(Vec::new()),
            Some(Token::Semicolon) => {
                self.stream.advance();
                return Ok(Vec::new());
            }
            Some(Token::Ident(k)) => k.clone(),
            Some(_) => return self.parse_simple_declaration(storage),
        };

        match &*keyword {
            "template" => self.parse_template_declaration(storage),
            "namespace" => Ok(vec![self.parse_namespace()?]),
            "inline" if self.stream.peek_nth(1).is_some_and(|t| t.is_keyword("namespace")) => {
                self.stream.advance();
                Ok(vec![self.parse_namespace()?])
            }
            "extern" if self.stream.peek_nth(1) == Some(&Token::Str) => {
                self.parse_linkage(storage)
            }
            "using" => self.parse_using(),
            "typedef" => self.parse_typedef(),
            "public" | "private" | "protected"
                if self.stream.peek_nth(1) == Some(&Token::Colon) =>
            {
                self.stream.advance();
                self.stream.advance();
                Ok(Vec::new())
            }
            "static_assert" | "friend" | "asm" | "__asm__" => {
                self.stream.synchronize();
                Ok(vec![Decl::Opaque(self.stream.span_from(start))])
            }
            _ if self.at_macro_invocation_decl() => {
                let expr = self.parse_expression()?;
                self.stream.eat(&Token::Semicolon);
                Ok(vec![Decl::MacroInvocation(expr)])
            }
            _ => self.parse_simple_declaration(storage),
        }
    }

    /// A macro invocation standing alone at declaration level, such as a
    /// function-like macro that expands to whole definitions.
    fn at_macro_invocation_decl(&self) -> bool {
        let Some(site) = self.expansion_at(0) else {
            return false;
        };
        match site.args {
            Some(_) => !self.is_specifier_invocation(),
            None => matches!(
                self.stream.peek_nth(1),
                None | Some(Token::Semicolon | Token::RBrace)
            ),
        }
    }

    /// A function-like macro used as a specifier: a type follows it.
    fn is_specifier_invocation(&self) -> bool {
        let Some(site) = self.expansion_at(0) else {
            return false;
        };
        if site.args.is_none() || site.end >= self.stream.limit() {
            return false;
        }
        match self.stream.token_at(site.end) {
            Some(Token::Ident(k)) => {
                is_builtin_type(k) || is_storage_specifier(k) || is_cv(k) || self.is_type_name(k)
            }
            _ => false,
        }
    }

    /// Skip decl-specifiers that carry no type, collecting execution space
    /// qualifiers.
    pub(super) fn parse_decl_specifiers(&mut self) -> CudaQualifiers {
        let mut qualifiers = CudaQualifiers::default();
        loop {
            match self.stream.peek() {
                Some(Token::Ident(k)) => match &**k {
                    "__global__" => qualifiers.global = true,
                    "__device__" => qualifiers.device = true,
                    "__host__" => qualifiers.host = true,
                    k if is_storage_specifier(k) => {}
                    k if is_attribute(k) => {
                        self.skip_attributes();
                        continue;
                    }
                    _ if self.is_specifier_macro(0) => {}
                    _ if self.is_specifier_invocation() => {
                        if let Some(site) = self.expansion_at(0) {
                            self.stream.seek(site.end);
                        }
                        continue;
                    }
                    _ => break,
                },
                Some(Token::LBracket) if self.stream.peek_nth(1) == Some(&Token::LBracket) => {
                    self.stream.skip_group();
                    continue;
                }
                _ => break,
            }
            self.stream.advance();
        }
        qualifiers
    }

    pub(super) fn parse_simple_declaration(
        &mut self,
        storage: VarStorage,
    ) -> Result<Vec<Decl>, ParseError> {
        let (decls, complete) = self.parse_declaration_body(storage)?;
        if !complete {
            self.stream.expect(Token::Semicolon)?;
        }
        Ok(decls)
    }

    /// Parse a simple declaration up to, not including, its terminator.
    ///
    /// Returns the declarations and whether the declaration was already
    /// complete (a function definition needs no `;`).
    pub(super) fn parse_declaration_body(
        &mut self,
        storage: VarStorage,
    ) -> Result<(Vec<Decl>, bool), ParseError> {
        let start = self.stream.current_pos();
        let qualifiers = self.parse_decl_specifiers();
        let mut decls = Vec::new();

        let ty = if self.at_record_definition() {
            let record = self.parse_record()?;
            let ty = defined_type(record.name.as_ref(), TypeKind::Record, record.span);
            decls.push(Decl::Record(record));
            Some(ty)
        } else if self.at_enum_definition() {
            let decl = self.parse_enum()?;
            let ty = defined_type(decl.name.as_ref(), TypeKind::Enum, decl.span);
            decls.push(Decl::Enum(decl));
            Some(ty)
        } else if self.at_constructor() {
            None
        } else {
            Some(self.parse_type_specifier()?)
        };
        if !decls.is_empty() && self.stream.check(&Token::Semicolon) {
            return Ok((decls, false));
        }

        loop {
            self.skip_attributes();
            let pointers = self.parse_pointers();
            let name = self.parse_declarator_name()?;

            if self.stream.check(&Token::LParen) && (ty.is_none() || self.looks_like_param_list()) {
                let return_type = ty.map(|mut t| {
                    t.pointer_depth = pointers;
                    t
                });
                let (function, complete) =
                    self.parse_function_rest(qualifiers, return_type, name, start)?;
                decls.push(Decl::Function(function));
                return Ok((decls, complete));
            }

            let Some(base) = &ty else {
                return Err(ParseError::invalid_syntax(
                    "expected a parameter list",
                    self.stream.current_span(),
                ));
            };
            let var = self.parse_variable_rest(base, pointers, name, storage, start)?;
            decls.push(Decl::Var(var));
            if !self.stream.eat(&Token::Comma) {
                return Ok((decls, false));
            }
        }
    }

    /// Declarator name: possibly qualified, a destructor, or an operator.
    fn parse_declarator_name(&mut self) -> Result<Ident, ParseError> {
        self.stream.eat(&Token::ColonColon);
        loop {
            let start = self.stream.current_pos();
            if self.stream.eat(&Token::Tilde) {
                let ident = self.expect_ident()?;
                return Ok(Ident::new(
                    format!("~{}", ident.name),
                    self.stream.span_from(start),
                ));
            }
            if self.stream.eat_keyword("operator") {
                if self.stream.check(&Token::LParen) {
                    self.stream.skip_group();
                }
                while !self.stream.at_end() && !self.stream.check(&Token::LParen) {
                    self.stream.advance();
                }
                return Ok(Ident::new("operator", self.stream.span_from(start)));
            }

            let ident = self.expect_ident()?;
            if is_reserved(&ident.name) {
                return Err(ParseError::invalid_syntax(
                    format!("expected a declarator, found '{}'", ident.name),
                    ident.span,
                ));
            }
            let pos = self.stream.current_pos();
            if let Some(end) = self.stream.angles_end(pos) {
                if matches!(
                    self.stream.token_at(end),
                    Some(Token::ColonColon | Token::LParen)
                ) {
                    self.stream.seek(end);
                }
            }
            if self.stream.check(&Token::ColonColon)
                && matches!(
                    self.stream.peek_nth(1),
                    Some(Token::Ident(_) | Token::Tilde)
                )
            {
                self.stream.advance();
                continue;
            }
            return Ok(ident);
        }
    }

    /// At a `(` after a declarator name: does a parameter list follow, or
    /// a direct initializer?
    fn looks_like_param_list(&self) -> bool {
        match self.stream.peek_nth(1) {
            Some(Token::RParen | Token::Ellipsis | Token::ColonColon) => true,
            Some(Token::LBracket) => self.stream.peek_nth(2) == Some(&Token::LBracket),
            Some(Token::Ident(k)) => {
                if is_builtin_type(k)
                    || is_cv(k)
                    || is_elaborated(k)
                    || is_storage_specifier(k)
                    || is_attribute(k)
                    || &**k == "typename"
                {
                    return true;
                }
                if let Some(site) = self.expansion_at(1) {
                    return site.args.is_none()
                        && matches!(
                            self.stream.peek_nth(2),
                            Some(Token::Ident(_) | Token::Star | Token::Amp)
                        );
                }
                if self.is_type_name(k) {
                    return true;
                }
                if self.is_value_name(k) {
                    return false;
                }
                match self.scan_type_id(1) {
                    Some((end, pointer)) => match self.stream.peek_nth(end) {
                        Some(Token::Ident(_)) => true,
                        Some(Token::Comma | Token::RParen) => pointer,
                        _ => false,
                    },
                    None => false,
                }
            }
            _ => false,
        }
    }

    fn at_constructor(&self) -> bool {
        match (
            self.stream.peek(),
            self.stream.peek_nth(1),
            self.stream.peek_nth(2),
        ) {
            (Some(Token::Tilde), Some(Token::Ident(_)), _) => true,
            (Some(Token::Ident(name)), Some(Token::LParen), _) => {
                self.records.last().is_some_and(|record| record == name)
            }
            (Some(Token::Ident(a)), Some(Token::ColonColon), Some(Token::Ident(b))) => {
                a == b && self.stream.peek_nth(3) == Some(&Token::LParen)
            }
            (Some(Token::Ident(_)), Some(Token::ColonColon), Some(Token::Tilde)) => true,
            _ => false,
        }
    }

    /// Parameter list, suffixes and optional body of a function declarator.
    fn parse_function_rest(
        &mut self,
        qualifiers: CudaQualifiers,
        return_type: Option<TypeRef>,
        name: Ident,
        start: usize,
    ) -> Result<(FunctionDecl, bool), ParseError> {
        let params = self.parse_param_list()?;
        self.skip_function_suffix()?;

        let id = FunctionId(self.functions.len());
        let is_template = self.in_template;
        self.functions.push(FunctionEntry {
            id,
            name: name.name.clone(),
            params: params.loc,
            is_definition: false,
            is_template,
        });
        let symbol = if is_template {
            Symbol::FunctionTemplate
        } else {
            Symbol::Functions(vec![id])
        };
        self.scopes.declare(name.name.clone(), symbol);

        let body = if self.stream.eat(&Token::Colon) {
            self.skip_member_initializers()?;
            Some(self.parse_function_body(&params.params)?)
        } else if self.stream.check(&Token::LBrace) {
            Some(self.parse_function_body(&params.params)?)
        } else {
            if self.stream.eat(&Token::Eq) {
                // `= 0`, `= default`, `= delete`
                while !self.stream.at_end() && !self.stream.check(&Token::Semicolon) {
                    self.stream.advance();
                }
            }
            None
        };

        let complete = body.is_some();
        if let Some(entry) = self.functions.get_mut(id.0) {
            entry.is_definition = complete;
        }
        let function = FunctionDecl {
            id,
            name,
            return_type,
            params,
            body,
            qualifiers,
            span: self.stream.span_from(start),
        };
        Ok((function, complete))
    }

    pub(super) fn parse_param_list(&mut self) -> Result<ParamList, ParseError> {
        let open = self.stream.expect(Token::LParen)?;
        let mut params = Vec::new();
        let mut variadic = false;
        let mut void_span = None;

        if self.stream.check_keyword("void") && self.stream.peek_nth(1) == Some(&Token::RParen) {
            void_span = Some(self.stream.current_span());
            self.stream.advance();
        } else if !self.stream.check(&Token::RParen) {
            loop {
                if self.stream.eat(&Token::Ellipsis) {
                    variadic = true;
                    break;
                }
                params.push(self.parse_param()?);
                if self.stream.eat(&Token::Ellipsis) {
                    variadic = true;
                }
                if !self.stream.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let close = self.stream.expect(Token::RParen)?;

        let loc = ParamListLoc {
            open,
            close,
            first_param: params.first().map(|p| p.span),
            void_span,
            param_count: params.len(),
        };
        Ok(ParamList {
            loc,
            params,
            variadic,
        })
    }

    fn parse_param(&mut self) -> Result<ParamDecl, ParseError> {
        let start = self.stream.current_pos();
        self.parse_decl_specifiers();
        let mut ty = self.parse_type_specifier()?;
        ty.pointer_depth = self.parse_pointers();

        let mut name = None;
        if self.stream.check(&Token::LParen) {
            // function pointer or array-reference parameter
            while self.stream.check(&Token::LParen) || self.stream.check(&Token::LBracket) {
                self.stream.skip_group();
            }
        } else {
            if let Some(Token::Ident(k)) = self.stream.peek() {
                if !is_reserved(k) {
                    name = Some(self.expect_ident()?);
                }
            }
            while self.stream.check(&Token::LBracket) {
                self.stream.skip_group();
            }
        }
        self.skip_attributes();

        let default = if self.stream.eat(&Token::Eq) {
            Some(self.nested(|p| p.parse_assignment())?)
        } else {
            None
        };
        Ok(ParamDecl {
            ty,
            name,
            default,
            span: self.stream.span_from(start),
        })
    }

    /// cv-qualifiers, `noexcept`, `override`, trailing return types and
    /// attributes after a parameter list.
    fn skip_function_suffix(&mut self) -> Result<(), ParseError> {
        loop {
            match self.stream.peek() {
                Some(Token::Ident(k))
                    if is_cv(k) || matches!(&**k, "override" | "final" | "mutable") =>
                {
                    self.stream.advance();
                }
                Some(Token::Ident(k)) if matches!(&**k, "noexcept" | "throw") => {
                    self.stream.advance();
                    if self.stream.check(&Token::LParen) {
                        self.stream.skip_group();
                    }
                }
                Some(Token::Ident(k)) if is_attribute(k) => self.skip_attributes(),
                Some(Token::LBracket) if self.stream.peek_nth(1) == Some(&Token::LBracket) => {
                    self.skip_attributes();
                }
                Some(Token::Amp | Token::AmpAmp) => {
                    self.stream.advance();
                }
                Some(Token::Arrow) => {
                    self.stream.advance();
                    self.parse_type_specifier()?;
                    self.parse_pointers();
                }
                _ => return Ok(()),
            }
        }
    }

    /// Constructor member initializers after `:`.
    fn skip_member_initializers(&mut self) -> Result<(), ParseError> {
        loop {
            while matches!(
                self.stream.peek(),
                Some(Token::Ident(_) | Token::ColonColon)
            ) {
                self.stream.advance();
                if self.stream.check(&Token::Lt) && !self.stream.skip_angles() {
                    self.stream.advance();
                }
            }
            if self.stream.check(&Token::LParen) || self.stream.check(&Token::LBrace) {
                self.stream.skip_group();
            } else {
                return Err(ParseError::unexpected_token(
                    self.stream.peek(),
                    "in member initializer list",
                    self.stream.current_span(),
                ));
            }
            self.stream.eat(&Token::Ellipsis);
            if !self.stream.eat(&Token::Comma) {
                return Ok(());
            }
        }
    }

    /// Body of a function or lambda, with its parameters in scope.
    pub(super) fn parse_function_body(
        &mut self,
        params: &[ParamDecl],
    ) -> Result<Block, ParseError> {
        self.scopes.push();
        for param in params {
            if let Some(name) = &param.name {
                self.scopes
                    .declare(name.name.clone(), Symbol::Value(DeclKind::Parameter));
            }
        }
        let in_template = std::mem::replace(&mut self.in_template, false);
        let result = self.parse_block();
        self.in_template = in_template;
        self.scopes.pop();
        result
    }

    fn parse_variable_rest(
        &mut self,
        base: &TypeRef,
        pointers: u8,
        name: Ident,
        storage: VarStorage,
        start: usize,
    ) -> Result<VarDecl, ParseError> {
        while self.stream.check(&Token::LBracket) {
            self.stream.skip_group();
        }
        if storage == VarStorage::Member && self.stream.eat(&Token::Colon) {
            self.parse_conditional()?;
        }
        self.skip_attributes();
        self.scopes
            .declare(name.name.clone(), Symbol::Value(DeclKind::Variable));

        let init = self.parse_initializer()?;
        let mut ty = base.clone();
        ty.pointer_depth = pointers;
        Ok(VarDecl {
            name,
            ty,
            init,
            storage,
            span: self.stream.span_from(start),
        })
    }

    fn parse_initializer(&mut self) -> Result<Vec<hipify_ast::Expr>, ParseError> {
        if self.stream.eat(&Token::Eq) {
            return Ok(vec![self.parse_assignment()?]);
        }
        if self.stream.check(&Token::LParen) {
            return self.parse_call_args();
        }
        if self.stream.check(&Token::LBrace) {
            let list = self.parse_init_list()?;
            return Ok(match list.kind {
                ExprKind::InitList(items) => items,
                _ => vec![list],
            });
        }
        Ok(Vec::new())
    }

    fn at_record_definition(&self) -> bool {
        if !matches!(self.stream.peek(), Some(Token::Ident(k)) if matches!(&**k, "struct" | "class" | "union"))
        {
            return false;
        }
        let base = self.stream.current_pos();
        let mut n = 1;
        while let Some(Token::Ident(k)) = self.stream.peek_nth(n) {
            if !is_attribute(k) {
                break;
            }
            n += 1;
            if self.stream.peek_nth(n) == Some(&Token::LParen) {
                n = self.stream.group_end(base + n) - base;
            }
        }
        if let Some(Token::Ident(k)) = self.stream.peek_nth(n) {
            if &**k != "final" {
                n += 1;
                if self.stream.peek_nth(n) == Some(&Token::Lt) {
                    match self.stream.angles_end(base + n) {
                        Some(end) => n = end - base,
                        None => return false,
                    }
                }
            }
        }
        if self.stream.peek_nth(n).is_some_and(|t| t.is_keyword("final")) {
            n += 1;
        }
        matches!(self.stream.peek_nth(n), Some(Token::LBrace | Token::Colon))
    }

    fn parse_record(&mut self) -> Result<RecordDecl, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        self.skip_attributes();
        let name = match self.stream.peek() {
            Some(Token::Ident(k)) if &**k != "final" => Some(self.expect_ident()?),
            _ => None,
        };
        if self.stream.check(&Token::Lt) {
            self.stream.skip_angles();
        }
        self.stream.eat_keyword("final");
        if let Some(name) = &name {
            self.scopes.declare(
                name.name.clone(),
                Symbol::Type(TypeInfo::plain(TypeKind::Record, DeclOrigin::MainFile)),
            );
        }
        if self.stream.eat(&Token::Colon) {
            while !self.stream.at_end() && !self.stream.check(&Token::LBrace) {
                if !(self.stream.check(&Token::Lt) && self.stream.skip_angles()) {
                    self.stream.advance();
                }
            }
        }

        self.stream.expect(Token::LBrace)?;
        self.scopes.push();
        self.records
            .push(name.as_ref().map_or_else(|| Rc::from(""), |n| n.name.clone()));
        let in_template = std::mem::replace(&mut self.in_template, false);
        let members = self.parse_declarations(VarStorage::Member);
        self.in_template = in_template;
        self.records.pop();
        let members = members?;
        self.stream.expect(Token::RBrace)?;
        self.scopes.pop();

        Ok(RecordDecl {
            name,
            members,
            span: self.stream.span_from(start),
        })
    }

    fn at_enum_definition(&self) -> bool {
        if !self.stream.check_keyword("enum") {
            return false;
        }
        let mut n = 1;
        if matches!(self.stream.peek_nth(n), Some(t) if t.is_keyword("class") || t.is_keyword("struct"))
        {
            n += 1;
        }
        if matches!(self.stream.peek_nth(n), Some(Token::Ident(_))) {
            n += 1;
        }
        if self.stream.peek_nth(n) == Some(&Token::Colon) {
            n += 1;
            while matches!(
                self.stream.peek_nth(n),
                Some(Token::Ident(_) | Token::ColonColon)
            ) {
                n += 1;
            }
        }
        self.stream.peek_nth(n) == Some(&Token::LBrace)
    }

    fn parse_enum(&mut self) -> Result<EnumDecl, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        if !self.stream.eat_keyword("class") {
            self.stream.eat_keyword("struct");
        }
        let name = match self.stream.peek() {
            Some(Token::Ident(_)) => Some(self.expect_ident()?),
            _ => None,
        };
        if self.stream.eat(&Token::Colon) {
            self.parse_type_specifier()?;
        }
        let enumeration: Rc<str> = name
            .as_ref()
            .map_or_else(|| Rc::from("<anonymous>"), |n| n.name.clone());
        if let Some(name) = &name {
            self.scopes.declare(
                name.name.clone(),
                Symbol::Type(TypeInfo::plain(TypeKind::Enum, DeclOrigin::MainFile)),
            );
        }

        self.stream.expect(Token::LBrace)?;
        let mut enumerators = Vec::new();
        while !self.stream.check(&Token::RBrace) {
            let constant = self.expect_ident()?;
            let value = if self.stream.eat(&Token::Eq) {
                Some(self.nested(|p| p.parse_assignment())?)
            } else {
                None
            };
            self.scopes.declare(
                constant.name.clone(),
                Symbol::Value(DeclKind::EnumConstant {
                    enumeration: enumeration.clone(),
                }),
            );
            enumerators.push(Enumerator {
                name: constant,
                value,
            });
            if !self.stream.eat(&Token::Comma) {
                break;
            }
        }
        self.stream.expect(Token::RBrace)?;

        Ok(EnumDecl {
            name,
            enumerators,
            span: self.stream.span_from(start),
        })
    }

    fn parse_typedef(&mut self) -> Result<Vec<Decl>, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        let mut decls = Vec::new();
        let base = if self.at_record_definition() {
            let record = self.parse_record()?;
            let ty = defined_type(record.name.as_ref(), TypeKind::Record, record.span);
            decls.push(Decl::Record(record));
            ty
        } else if self.at_enum_definition() {
            let decl = self.parse_enum()?;
            let ty = defined_type(decl.name.as_ref(), TypeKind::Enum, decl.span);
            decls.push(Decl::Enum(decl));
            ty
        } else {
            self.parse_type_specifier()?
        };

        loop {
            let mut pointers = self.parse_pointers();
            let name = if self.stream.eat(&Token::LParen) {
                // function pointer: `typedef void (*callback)(int);`
                pointers = self.parse_pointers();
                let name = self.expect_ident()?;
                self.stream.expect(Token::RParen)?;
                while self.stream.check(&Token::LParen) || self.stream.check(&Token::LBracket) {
                    self.stream.skip_group();
                }
                name
            } else {
                let name = self.expect_ident()?;
                while self.stream.check(&Token::LBracket) {
                    self.stream.skip_group();
                }
                name
            };
            decls.push(self.declare_alias(name, &base, pointers, start));
            if !self.stream.eat(&Token::Comma) {
                break;
            }
        }
        self.stream.expect(Token::Semicolon)?;
        Ok(decls)
    }

    fn declare_alias(&mut self, name: Ident, base: &TypeRef, pointers: u8, start: usize) -> Decl {
        let info = TypeInfo {
            kind: TypeKind::Typedef,
            canonical: base.info.canonical,
            alias_pointer_depth: pointers.saturating_add(base.info.alias_pointer_depth),
            origin: DeclOrigin::MainFile,
        };
        self.scopes.declare(name.name.clone(), Symbol::Type(info));
        let mut ty = base.clone();
        ty.pointer_depth = pointers;
        Decl::Typedef(TypedefDecl {
            name,
            ty,
            span: self.stream.span_from(start),
        })
    }

    fn parse_using(&mut self) -> Result<Vec<Decl>, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        let is_alias = matches!(self.stream.peek(), Some(Token::Ident(_)))
            && self.stream.peek_nth(1) == Some(&Token::Eq);
        if !is_alias {
            // using-directive or using-declaration
            self.stream.synchronize();
            return Ok(vec![Decl::Opaque(self.stream.span_from(start))]);
        }

        let name = self.expect_ident()?;
        self.stream.advance();
        let base = self.parse_type_specifier()?;
        let pointers = self.parse_pointers();
        let decl = self.declare_alias(name, &base, pointers, start);
        self.stream.expect(Token::Semicolon)?;
        Ok(vec![decl])
    }

    fn parse_namespace(&mut self) -> Result<Decl, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        let mut name = None;
        while let Some(Token::Ident(_)) = self.stream.peek() {
            name = Some(self.expect_ident()?);
            if !self.stream.eat(&Token::ColonColon) {
                break;
            }
            self.stream.eat_keyword("inline");
        }
        if self.stream.check(&Token::Eq) {
            // namespace alias
            self.stream.synchronize();
            return Ok(Decl::Opaque(self.stream.span_from(start)));
        }
        self.skip_attributes();

        self.stream.expect(Token::LBrace)?;
        let decls = self.parse_declarations(VarStorage::Global)?;
        self.stream.expect(Token::RBrace)?;
        Ok(Decl::Namespace(NamespaceDecl {
            name,
            decls,
            span: self.stream.span_from(start),
        }))
    }

    /// `extern "C" { ... }` or `extern "C" declaration`.
    fn parse_linkage(&mut self, storage: VarStorage) -> Result<Vec<Decl>, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        self.stream.advance();
        if !self.stream.eat(&Token::LBrace) {
            return self.parse_declaration(storage);
        }
        let decls = self.parse_declarations(storage)?;
        self.stream.expect(Token::RBrace)?;
        Ok(vec![Decl::Namespace(NamespaceDecl {
            name: None,
            decls,
            span: self.stream.span_from(start),
        })])
    }

    fn parse_template_declaration(
        &mut self,
        storage: VarStorage,
    ) -> Result<Vec<Decl>, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        if !self.stream.check(&Token::Lt) {
            // explicit instantiation
            self.stream.synchronize();
            return Ok(vec![Decl::Opaque(self.stream.span_from(start))]);
        }

        let header_start = self.stream.current_pos();
        let depth = self.scopes.depth();
        let declared = self.parse_template_params()?;
        let template_params = self.stream.span_from(header_start);

        let in_template = std::mem::replace(&mut self.in_template, true);
        let result = self.parse_declaration(storage);
        self.in_template = in_template;
        if result.is_err() {
            self.scopes.truncate(depth);
        }
        for (name, previous) in declared.into_iter().rev() {
            self.scopes.restore(name, previous);
        }

        let span = self.stream.span_from(start);
        Ok(result?
            .into_iter()
            .map(|decl| match decl {
                Decl::Function(function) => Decl::FunctionTemplate(FunctionTemplateDecl {
                    template_params,
                    function,
                    span,
                }),
                other => other,
            })
            .collect())
    }

    /// Skim `<...>`, declaring type parameters in the current scope.
    ///
    /// Returns what each declaration replaced so the caller can undo them.
    fn parse_template_params(
        &mut self,
    ) -> Result<Vec<(Rc<str>, Option<Symbol>)>, ParseError> {
        let open = self.stream.expect(Token::Lt)?;
        let mut declared = Vec::new();
        let mut depth = 1usize;
        while depth > 0 {
            let Some(token) = self.stream.peek() else {
                return Err(ParseError::invalid_syntax(
                    "unterminated template parameter list",
                    open,
                ));
            };
            match token {
                Token::Lt => depth += 1,
                Token::LParen | Token::LBracket => {
                    self.stream.skip_group();
                    continue;
                }
                Token::Semicolon | Token::LBrace => {
                    return Err(ParseError::invalid_syntax(
                        "unterminated template parameter list",
                        open,
                    ));
                }
                Token::Ident(k) if depth == 1 && matches!(&**k, "typename" | "class") => {
                    if let Some(Token::Ident(name)) = self.stream.peek_nth(1) {
                        let previous = self.scopes.declare(
                            name.clone(),
                            Symbol::Type(TypeInfo::plain(
                                TypeKind::TemplateParam,
                                DeclOrigin::MainFile,
                            )),
                        );
                        declared.push((name.clone(), previous));
                    }
                }
                t => depth = depth.saturating_sub(t.closing_angles()),
            }
            self.stream.advance();
        }
        Ok(declared)
    }
}

/// Type reference naming a record or enum defined in place.
fn defined_type(name: Option<&Ident>, kind: TypeKind, span: Span) -> TypeRef {
    TypeRef {
        name: name
            .cloned()
            .unwrap_or_else(|| Ident::new("", Span::empty(span.start))),
        info: TypeInfo::plain(kind, DeclOrigin::MainFile),
        template_args: Vec::new(),
        pointer_depth: 0,
        span,
    }
}

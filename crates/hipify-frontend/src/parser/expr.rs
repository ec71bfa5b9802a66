//! Expression parsing by precedence climbing.
//!
//! ## Precedence (lowest to highest)
//!
//! | Level | Operators |
//! |-------|-----------|
//! | 1  | `\|\|` |
//! | 2  | `&&` |
//! | 3  | `\|` |
//! | 4  | `^` |
//! | 5  | `&` |
//! | 6  | `==` `!=` |
//! | 7  | `<` `<=` `>` `>=` |
//! | 8  | `<<` `>>` |
//! | 9  | `+` `-` |
//! | 10 | `*` `/` `%` |
//!
//! Assignment and `?:` sit below level 1, the comma operator below those.

use super::scope::Symbol;
use super::types::{is_builtin_type, is_cv, is_elaborated, is_reserved};
use super::{ParseError, Parser};
use crate::preprocess::ExpansionSite;
use hipify_ast::{
    CallExpr, CalleeResolution, ConfigArg, DeclKind, DeclRefExpr, Expr, ExprKind, Ident,
    KernelLaunchExpr, MemberExpr, SizeofExpr, SizeofOperand, Span, StringLiteral, TypeInfo,
    TypeRef,
};
use hipify_lexer::Token;
use std::ops::Range;

const NAMED_CASTS: &[&str] = &[
    "static_cast",
    "dynamic_cast",
    "reinterpret_cast",
    "const_cast",
];

impl<'src> Parser<'src> {
    /// Full expression, comma operator included.
    pub(super) fn parse_expression(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        let mut expr = self.parse_assignment()?;
        while self.pending_closes == 0 && self.stream.eat(&Token::Comma) {
            let rhs = self.parse_assignment()?;
            expr = self.expr(
                ExprKind::Binary(Box::new(expr), Box::new(rhs)),
                self.stream.span_from(start),
            );
        }
        Ok(expr)
    }

    pub(super) fn parse_assignment(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        if self.stream.check_keyword("throw") {
            self.stream.advance();
            let operand = if self.starts_operand() {
                vec![self.parse_assignment()?]
            } else {
                Vec::new()
            };
            return Ok(self.expr(ExprKind::Unknown(operand), self.stream.span_from(start)));
        }

        let lhs = self.parse_conditional()?;
        if self.pending_closes == 0
            && (self.stream.check(&Token::Eq) || self.stream.check(&Token::AssignOp))
        {
            self.stream.advance();
            let rhs = self.parse_assignment()?;
            return Ok(self.expr(
                ExprKind::Binary(Box::new(lhs), Box::new(rhs)),
                self.stream.span_from(start),
            ));
        }
        Ok(lhs)
    }

    pub(super) fn parse_conditional(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        let condition = self.parse_binary(1)?;
        if self.pending_closes > 0 || !self.stream.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.nested(|p| p.parse_expression())?;
        self.stream.expect(Token::Colon)?;
        let otherwise = self.parse_assignment()?;
        Ok(self.expr(
            ExprKind::Conditional(Box::new(condition), Box::new(then), Box::new(otherwise)),
            self.stream.span_from(start),
        ))
    }

    fn parse_binary(&mut self, min_prec: u8) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        let mut lhs = self.parse_unary()?;
        while let Some(prec) = self.binary_precedence() {
            if prec < min_prec {
                break;
            }
            self.stream.advance();
            let rhs = self.parse_binary(prec + 1)?;
            lhs = self.expr(
                ExprKind::Binary(Box::new(lhs), Box::new(rhs)),
                self.stream.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn binary_precedence(&self) -> Option<u8> {
        if self.pending_closes > 0 {
            return None;
        }
        let prec = match self.stream.peek()? {
            Token::PipePipe => 1,
            Token::AmpAmp => 2,
            Token::Pipe => 3,
            Token::Caret => 4,
            Token::Amp => 5,
            Token::EqEq | Token::BangEq => 6,
            Token::Gt | Token::Shr if self.no_gt => return None,
            Token::Lt | Token::LtEq | Token::Gt | Token::GtEq => 7,
            Token::Shl | Token::Shr => 8,
            Token::Plus | Token::Minus => 9,
            Token::Star | Token::Slash | Token::Percent => 10,
            Token::Ident(k) if matches!(&**k, "and" | "or" | "bitand" | "bitor" | "xor") => 2,
            _ => return None,
        };
        Some(prec)
    }

    /// The next token can begin an operand.
    fn starts_operand(&self) -> bool {
        match self.stream.peek() {
            Some(Token::Ident(k)) => !matches!(&**k, "and" | "or"),
            Some(
                Token::Number
                | Token::Str
                | Token::Utf8Str
                | Token::WideStr
                | Token::Char
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::ColonColon
                | Token::Bang
                | Token::Tilde
                | Token::Minus
                | Token::Plus
                | Token::Star
                | Token::Amp
                | Token::PlusPlus
                | Token::MinusMinus,
            ) => true,
            _ => false,
        }
    }

    fn parse_unary(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        match self.stream.peek() {
            Some(
                Token::Bang
                | Token::Tilde
                | Token::Minus
                | Token::Plus
                | Token::Star
                | Token::Amp
                | Token::AmpAmp
                | Token::PlusPlus
                | Token::MinusMinus,
            ) => {
                self.stream.advance();
                let operand = self.parse_unary()?;
                Ok(self.expr(
                    ExprKind::Unary(Box::new(operand)),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::LParen) if self.is_cast() => {
                self.stream.advance();
                let ty = self.parse_full_type()?;
                self.stream.expect(Token::RParen)?;
                let operand = self.parse_unary()?;
                Ok(self.expr(
                    ExprKind::Cast {
                        ty,
                        operand: Box::new(operand),
                    },
                    self.stream.span_from(start),
                ))
            }
            Some(Token::Ident(k)) if self.expansion_at(0).is_none() => match &**k {
                "sizeof" => self.parse_sizeof(),
                "new" => self.parse_new(),
                "delete" => {
                    self.stream.advance();
                    if self.stream.check(&Token::LBracket) {
                        self.stream.skip_group();
                    }
                    let operand = self.parse_unary()?;
                    Ok(self.expr(
                        ExprKind::Unary(Box::new(operand)),
                        self.stream.span_from(start),
                    ))
                }
                "alignof" | "__alignof__" | "typeid" | "noexcept" | "decltype" => {
                    self.stream.advance();
                    if self.stream.check(&Token::LParen) {
                        self.stream.skip_group();
                    }
                    Ok(self.expr(ExprKind::Unknown(Vec::new()), self.stream.span_from(start)))
                }
                "not" | "compl" => {
                    self.stream.advance();
                    let operand = self.parse_unary()?;
                    Ok(self.expr(
                        ExprKind::Unary(Box::new(operand)),
                        self.stream.span_from(start),
                    ))
                }
                _ => self.parse_postfix(),
            },
            _ => self.parse_postfix(),
        }
    }

    /// Type specifier plus pointer declarators, as in a cast or `sizeof`.
    fn parse_full_type(&mut self) -> Result<TypeRef, ParseError> {
        let mut ty = self.parse_type_specifier()?;
        if self.pending_closes == 0 {
            ty.pointer_depth = self.parse_pointers();
            while self.stream.check(&Token::LBracket) {
                self.stream.skip_group();
            }
        }
        Ok(ty)
    }

    /// At `(`: is this a C-style cast?
    fn is_cast(&self) -> bool {
        let typeish = match self.stream.peek_nth(1) {
            Some(Token::Ident(k)) => {
                if self.expansion_at(1).is_some() {
                    return false;
                }
                is_builtin_type(k)
                    || is_cv(k)
                    || is_elaborated(k)
                    || &**k == "typename"
                    || (self.is_type_name(k) && !self.is_value_name(k))
            }
            Some(Token::ColonColon) => true,
            _ => return false,
        };
        let Some((end, pointer)) = self.scan_type_id(1) else {
            return false;
        };
        if self.stream.peek_nth(end) != Some(&Token::RParen) {
            return false;
        }
        if !(typeish || pointer) {
            return false;
        }
        // `(T)` must be followed by an operand
        match self.stream.peek_nth(end + 1) {
            Some(Token::Ident(k)) => !matches!(&**k, "and" | "or"),
            Some(
                Token::Number
                | Token::Str
                | Token::Utf8Str
                | Token::WideStr
                | Token::Char
                | Token::LParen
                | Token::LBrace
                | Token::Bang
                | Token::Tilde
                | Token::Minus
                | Token::Plus
                | Token::Star
                | Token::Amp
                | Token::PlusPlus
                | Token::MinusMinus
                | Token::ColonColon,
            ) => true,
            _ => false,
        }
    }

    fn parse_sizeof(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        if self.stream.eat(&Token::Ellipsis) {
            self.stream.skip_group();
            return Ok(self.expr(ExprKind::Unknown(Vec::new()), self.stream.span_from(start)));
        }

        let type_operand = self.stream.check(&Token::LParen)
            && self.is_type_start(1)
            && self.expansion_at(1).is_none()
            && matches!(
                self.scan_type_id(1),
                Some((end, _)) if matches!(self.stream.peek_nth(end), Some(Token::RParen | Token::LBracket))
            );
        let operand = if type_operand {
            self.stream.advance();
            let ty = self.nested(|p| p.parse_full_type())?;
            self.stream.expect(Token::RParen)?;
            SizeofOperand::Type(ty)
        } else {
            SizeofOperand::Expr(Box::new(self.parse_unary()?))
        };
        Ok(self.expr(
            ExprKind::Sizeof(SizeofExpr { operand }),
            self.stream.span_from(start),
        ))
    }

    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        if self.stream.check(&Token::LParen) {
            // placement arguments
            self.stream.skip_group();
        }
        let mut ty = self.parse_type_specifier()?;
        ty.pointer_depth = self.parse_pointers();
        let mut args = Vec::new();
        while self.stream.eat(&Token::LBracket) {
            args.push(self.nested(|p| p.parse_expression())?);
            self.stream.expect(Token::RBracket)?;
        }
        if self.stream.check(&Token::LParen) {
            args.extend(self.parse_call_args()?);
        } else if self.stream.check(&Token::LBrace) {
            args.push(self.parse_init_list()?);
        }
        Ok(self.expr(ExprKind::New { ty, args }, self.stream.span_from(start)))
    }

    fn parse_postfix(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        let mut expr = self.parse_primary()?;
        while self.pending_closes == 0 {
            match self.stream.peek() {
                Some(Token::LParen) => {
                    let args = self.parse_call_args()?;
                    expr = self.expr_at(
                        ExprKind::Call(CallExpr {
                            callee: Box::new(expr),
                            args,
                        }),
                        self.stream.span_from(start),
                        self.stream.span_at(start).start,
                    );
                }
                Some(Token::LaunchOpen) => {
                    expr = self.parse_kernel_launch(expr, start)?;
                }
                Some(Token::LBracket) => {
                    self.stream.advance();
                    let index = self.nested(|p| p.parse_expression())?;
                    self.stream.expect(Token::RBracket)?;
                    expr = self.expr(
                        ExprKind::Index(Box::new(expr), Box::new(index)),
                        self.stream.span_from(start),
                    );
                }
                Some(Token::Dot | Token::Arrow) => {
                    expr = self.parse_member(expr, start)?;
                }
                Some(Token::PlusPlus | Token::MinusMinus) => {
                    self.stream.advance();
                    expr = self.expr(
                        ExprKind::Unary(Box::new(expr)),
                        self.stream.span_from(start),
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_member(&mut self, base: Expr, start: usize) -> Result<Expr, ParseError> {
        let arrow = self.stream.check(&Token::Arrow);
        self.stream.advance();
        self.stream.eat_keyword("template");
        let member = if self.stream.check(&Token::Tilde) {
            let tilde = self.stream.current_pos();
            self.stream.advance();
            let name = self.expect_ident()?;
            Ident::new(format!("~{}", name.name), self.stream.span_from(tilde))
        } else {
            self.expect_ident()?
        };
        if self.stream.check(&Token::Lt) {
            let pos = self.stream.current_pos();
            if let Some(end) = self.stream.angles_end(pos) {
                if self.stream.token_at(end) == Some(&Token::LParen) {
                    self.parse_template_args()?;
                }
            }
        }

        let member_decl = match &base.kind {
            ExprKind::DeclRef(r) => match r.decl.as_ref().map(|d| &d.kind) {
                Some(DeclKind::BuiltinVariable { record }) => {
                    self.vendor.builtin_member(record, member.as_str())
                }
                _ => None,
            },
            _ => None,
        };
        // The coordinate object is reached through a compiler-provided value
        let base = if member_decl.is_some() {
            let (span, loc) = (base.span, base.loc);
            Expr::with_loc(ExprKind::OpaqueValue(Box::new(base)), span, loc)
        } else {
            base
        };
        Ok(self.expr(
            ExprKind::Member(MemberExpr {
                base: Box::new(base),
                member,
                member_decl,
                arrow,
            }),
            self.stream.span_from(start),
        ))
    }

    /// `( args )`
    pub(super) fn parse_call_args(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.stream.expect(Token::LParen)?;
        let args = self.nested(|p| p.parse_argument_list(&Token::RParen))?;
        self.stream.expect(Token::RParen)?;
        Ok(args)
    }

    fn parse_argument_list(&mut self, close: &Token) -> Result<Vec<Expr>, ParseError> {
        let mut args = Vec::new();
        if self.stream.check(close) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_assignment()?);
            self.stream.eat(&Token::Ellipsis);
            if !self.stream.eat(&Token::Comma) || self.stream.check(close) {
                return Ok(args);
            }
        }
    }

    /// `{ items }`, designators skipped.
    pub(super) fn parse_init_list(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::LBrace)?;
        let items = self.nested(|p| {
            let mut items = Vec::new();
            while !p.stream.check(&Token::RBrace) {
                if p.stream.check(&Token::Dot)
                    && matches!(p.stream.peek_nth(1), Some(Token::Ident(_)))
                    && p.stream.peek_nth(2) == Some(&Token::Eq)
                {
                    p.stream.advance();
                    p.stream.advance();
                    p.stream.advance();
                }
                items.push(p.parse_assignment()?);
                if !p.stream.eat(&Token::Comma) {
                    break;
                }
            }
            Ok(items)
        })?;
        self.stream.expect(Token::RBrace)?;
        Ok(self.expr(ExprKind::InitList(items), self.stream.span_from(start)))
    }

    /// `callee<<<config>>>(args)`.
    ///
    /// The configuration is matched against the launch signature; too few
    /// or too many arguments abort the unit.
    fn parse_kernel_launch(&mut self, callee: Expr, start: usize) -> Result<Expr, ParseError> {
        let open = self.stream.current_pos();
        self.stream.expect(Token::LaunchOpen)?;
        let values = self.nested(|p| p.parse_argument_list(&Token::LaunchClose))?;
        self.stream.expect(Token::LaunchClose)?;
        let config_span = self.stream.span_from(open);

        let signature = self.vendor.launch_config();
        let required = self.vendor.required_config_args();
        if values.len() > signature.len() {
            return Err(ParseError::launch_config(
                format!(
                    "too many execution configuration arguments: expected at most {}, found {}",
                    signature.len(),
                    values.len()
                ),
                config_span,
            ));
        }
        if values.len() < required {
            return Err(ParseError::launch_config(
                format!(
                    "too few execution configuration arguments: expected at least {}, found {}",
                    required,
                    values.len()
                ),
                config_span,
            ));
        }
        let mut values = values.into_iter();
        let config = signature
            .iter()
            .map(|param| ConfigArg {
                param_type: param.ty.clone(),
                value: values.next(),
            })
            .collect();

        let args = self.parse_call_args()?;
        let (callee_name, resolution) = match &callee.ignore_parens().kind {
            ExprKind::DeclRef(r) => (r.name.clone(), self.resolve_callee(&r.name, args.len())),
            _ => (
                Ident::new(format!("<callee at {}>", callee.span.start), callee.span),
                CalleeResolution::Unresolved,
            ),
        };

        let launch = KernelLaunchExpr {
            callee: Box::new(callee),
            callee_name,
            resolution,
            config,
            args,
            config_span,
        };
        Ok(self.expr_at(
            ExprKind::KernelLaunch(Box::new(launch)),
            self.stream.span_from(start),
            self.stream.span_at(start).start,
        ))
    }

    /// Pick the launched function: an overload with a matching parameter
    /// count if there is one, otherwise the most recent declaration.
    fn resolve_callee(&self, name: &Ident, argc: usize) -> CalleeResolution {
        match self.scopes.lookup(&name.name) {
            Some(Symbol::Functions(ids)) => {
                let matching = ids.iter().rev().find(|id| {
                    self.functions
                        .get(id.0)
                        .is_some_and(|f| f.params.param_count == argc)
                });
                match matching.or(ids.last()) {
                    Some(id) => CalleeResolution::Function(*id),
                    None => CalleeResolution::Unresolved,
                }
            }
            Some(Symbol::FunctionTemplate) => CalleeResolution::Template,
            _ => CalleeResolution::Unresolved,
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        if let Some(site) = self.expansion_at(0) {
            return self.parse_macro_expansion(site);
        }
        match self.stream.peek() {
            Some(Token::Number | Token::Char) => {
                self.stream.advance();
                Ok(self.expr(ExprKind::Literal, self.stream.span_from(start)))
            }
            Some(Token::Str | Token::Utf8Str | Token::WideStr) => Ok(self.parse_strings()),
            Some(Token::LParen) => {
                self.stream.advance();
                let inner = self.nested(|p| p.parse_expression())?;
                self.stream.expect(Token::RParen)?;
                Ok(self.expr(
                    ExprKind::Paren(Box::new(inner)),
                    self.stream.span_from(start),
                ))
            }
            Some(Token::LBracket) => self.parse_lambda(),
            Some(Token::LBrace) => self.parse_init_list(),
            Some(Token::Ident(_) | Token::ColonColon) => self.parse_identifier_expr(),
            other => Err(ParseError::unexpected_token(
                other,
                "in expression",
                self.stream.current_span(),
            )),
        }
    }

    /// Adjacent string literal tokens form one literal.
    fn parse_strings(&mut self) -> Expr {
        let start = self.stream.current_pos();
        let mut pieces = Vec::new();
        loop {
            let span = self.stream.current_span();
            let (narrow, prefix_len) = match self.stream.peek() {
                Some(Token::Str) => (true, 0),
                Some(Token::Utf8Str) => (true, 2),
                Some(Token::WideStr) => (false, 1),
                _ => break,
            };
            pieces.push(StringLiteral {
                span,
                prefix_len,
                narrow,
            });
            self.stream.advance();
        }
        self.expr(ExprKind::StringLiteral(pieces), self.stream.span_from(start))
    }

    fn parse_identifier_expr(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        if let Some(Token::Ident(k)) = self.stream.peek() {
            match &**k {
                "true" | "false" | "nullptr" | "this" | "__null" => {
                    self.stream.advance();
                    return Ok(self.expr(ExprKind::Literal, self.stream.span_from(start)));
                }
                k if NAMED_CASTS.contains(&k) => return self.parse_named_cast(),
                k if is_builtin_type(k) => {
                    // functional cast, `float(x)` / `int{x}`
                    let ty = self.parse_type_specifier()?;
                    return self.parse_construct(ty, start);
                }
                _ => {}
            }
        }

        self.stream.eat(&Token::ColonColon);
        let (name, template_args) = loop {
            self.stream.eat_keyword("template");
            let name = self.expect_ident()?;
            if is_reserved(&name.name) {
                return Err(ParseError::invalid_syntax(
                    format!("unexpected '{}' in expression", name.name),
                    name.span,
                ));
            }
            let template_args = if self.template_args_follow(&name.name) {
                self.parse_template_args()?
            } else {
                Vec::new()
            };
            if self.pending_closes == 0
                && self.stream.check(&Token::ColonColon)
                && matches!(self.stream.peek_nth(1), Some(Token::Ident(_)))
            {
                self.stream.advance();
                continue;
            }
            break (name, template_args);
        };

        let is_type = !self.is_value_name(&name.name) && self.type_info(&name.name).is_some();
        if is_type
            && self.pending_closes == 0
            && (self.stream.check(&Token::LParen) || self.stream.check(&Token::LBrace))
        {
            let info = self.type_info(&name.name).unwrap_or_else(TypeInfo::unknown);
            let ty = TypeRef {
                name,
                info,
                template_args,
                pointer_depth: 0,
                span: self.stream.span_from(start),
            };
            return self.parse_construct(ty, start);
        }

        // qualified names resolve by their last component
        let decl = self.resolve_value(&name.name);
        let offset = name.span.start;
        Ok(self.expr_at(
            ExprKind::DeclRef(DeclRefExpr {
                name,
                template_args,
                decl,
            }),
            self.stream.span_from(start),
            offset,
        ))
    }

    /// `T(args)` or `T{args}` after a type.
    fn parse_construct(&mut self, ty: TypeRef, start: usize) -> Result<Expr, ParseError> {
        let args = if self.stream.check(&Token::LParen) {
            self.parse_call_args()?
        } else if self.stream.check(&Token::LBrace) {
            match self.parse_init_list()?.kind {
                ExprKind::InitList(items) => items,
                _ => Vec::new(),
            }
        } else {
            return Err(ParseError::unexpected_token(
                self.stream.peek(),
                "after a type in expression",
                self.stream.current_span(),
            ));
        };
        Ok(self.expr(ExprKind::Construct { ty, args }, self.stream.span_from(start)))
    }

    /// At `<` after `name`: template arguments, or a less-than?
    fn template_args_follow(&self, name: &str) -> bool {
        if !self.stream.check(&Token::Lt) {
            return false;
        }
        if matches!(
            self.resolve_value(name).map(|d| d.kind),
            Some(DeclKind::Variable | DeclKind::Parameter | DeclKind::EnumConstant { .. })
        ) {
            return false;
        }
        let pos = self.stream.current_pos();
        match self.stream.angles_end(pos) {
            Some(end) => matches!(
                self.stream.token_at(end),
                Some(Token::LParen | Token::LaunchOpen | Token::ColonColon | Token::LBrace)
            ),
            None => false,
        }
    }

    fn parse_named_cast(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        self.stream.advance();
        let open = self.stream.expect(Token::Lt)?;
        self.template_depth += 1;
        let ty = self.parse_full_type();
        let closed = ty.is_ok() && self.eat_template_close();
        self.template_depth -= 1;
        let ty = ty?;
        if !closed {
            return Err(ParseError::invalid_syntax("expected '>' after cast type", open));
        }
        self.stream.expect(Token::LParen)?;
        let operand = self.nested(|p| p.parse_expression())?;
        self.stream.expect(Token::RParen)?;
        Ok(self.expr(
            ExprKind::Cast {
                ty,
                operand: Box::new(operand),
            },
            self.stream.span_from(start),
        ))
    }

    fn parse_lambda(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        self.stream.skip_group();
        let params = if self.stream.check(&Token::LParen) {
            self.nested(|p| p.parse_param_list())?.params
        } else {
            Vec::new()
        };
        loop {
            match self.stream.peek() {
                Some(Token::Ident(k))
                    if matches!(
                        &**k,
                        "mutable" | "constexpr" | "__device__" | "__host__" | "noexcept"
                    ) =>
                {
                    self.stream.advance();
                }
                Some(Token::Arrow) => {
                    self.stream.advance();
                    self.parse_full_type()?;
                }
                _ => break,
            }
        }
        let body = self.nested(|p| p.parse_function_body(&params))?;
        Ok(self.expr(
            ExprKind::Lambda { params, body },
            self.stream.span_from(start),
        ))
    }

    /// A macro invocation as written. Arguments that parse as expressions
    /// are kept, located inside the argument text.
    fn parse_macro_expansion(&mut self, site: &ExpansionSite) -> Result<Expr, ParseError> {
        let start = self.stream.current_pos();
        let name = Ident::new(site.name.clone(), self.stream.current_span());
        let mut args = Vec::new();
        if let Some(ranges) = &site.args {
            for range in ranges {
                if !range.is_empty() {
                    args.push(self.parse_macro_argument(range.clone(), name.span.start)?);
                }
            }
        }
        self.stream.seek(site.end);
        Ok(self.expr_at(
            ExprKind::MacroExpansion { name, args },
            self.stream.span_from(start),
            self.stream.span_at(start).start,
        ))
    }

    fn parse_macro_argument(
        &mut self,
        range: Range<usize>,
        expansion: u32,
    ) -> Result<Expr, ParseError> {
        let saved_pos = self.stream.current_pos();
        let saved_limit = self.stream.set_limit(range.end);
        self.stream.seek(range.start);
        let outer = self.macro_arg;
        if outer.is_none() {
            self.macro_arg = Some(expansion);
        }
        let saved_no_gt = std::mem::replace(&mut self.no_gt, false);
        let saved_closes = std::mem::replace(&mut self.pending_closes, 0);

        let result = self.parse_expression().and_then(|expr| {
            if self.stream.at_end() {
                Ok(expr)
            } else {
                Err(ParseError::invalid_syntax(
                    "macro argument is not a single expression",
                    self.stream.current_span(),
                ))
            }
        });

        self.no_gt = saved_no_gt;
        self.pending_closes = saved_closes;
        let span = Span::new(
            self.stream.span_at(range.start).start,
            self.stream.span_at(range.end - 1).end,
        );
        let fallback = self.expr(ExprKind::Unknown(Vec::new()), span);
        self.macro_arg = outer;
        self.stream.set_limit(saved_limit);
        self.stream.seek(saved_pos);

        match result {
            Ok(expr) => Ok(expr),
            Err(err) if err.is_fatal() => Err(err),
            Err(err) => {
                tracing::debug!(
                    error = %err,
                    start = span.start,
                    end = span.end,
                    "macro argument kept as text"
                );
                Ok(fallback)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::{parse_unit, ParseErrorKind};
    use crate::invocation::CompilerInvocation;
    use crate::preprocess::preprocess;
    use crate::vendor::VendorModel;
    use hipify_ast::walk::{walk_unit, Node};
    use hipify_ast::{
        CalleeResolution, Expr, ExprKind, FunctionId, SizeofOperand, SourceLocation,
        TranslationUnit,
    };

    fn parse(source: &str) -> Result<TranslationUnit, super::ParseError> {
        let pp = preprocess(source, &CompilerInvocation::default())?;
        parse_unit(pp, &VendorModel::default())
    }

    /// Every expression of the unit, outermost first.
    fn exprs(source: &str) -> Vec<Expr> {
        let unit = parse(source).unwrap();
        let mut found = Vec::new();
        walk_unit(&unit, &mut |node| {
            if let Node::Expr(e) = node {
                found.push(e.clone());
            }
        });
        found
    }

    fn text<'a>(source: &'a str, expr: &Expr) -> &'a str {
        expr.span.text(source)
    }

    #[test]
    fn test_launch_with_defaulted_config() {
        let source = "__global__ void k(int n) {}\nvoid h() { k<<<1, 2>>>(3); }";
        let found = exprs(source);
        let launch = found
            .iter()
            .find_map(|e| match &e.kind {
                ExprKind::KernelLaunch(l) => Some(l),
                _ => None,
            })
            .unwrap();
        assert_eq!(launch.callee_name.as_str(), "k");
        assert_eq!(launch.resolution, CalleeResolution::Function(FunctionId(0)));
        assert_eq!(launch.config.len(), 4);
        assert!(!launch.config[1].is_defaulted());
        assert!(launch.config[2].is_defaulted());
        assert!(launch.config[3].is_defaulted());
        assert_eq!(&*launch.config[0].param_type, "dim3");
        assert_eq!(launch.args.len(), 1);
        assert_eq!(launch.config_span.text(source), "<<<1, 2>>>");
    }

    #[test]
    fn test_launch_of_template_callee() {
        let source = "template <typename T> __global__ void k(T x) {}\n\
                      void h() { k<float><<<dim3(1), 64, 0, 0>>>(1.0f); }";
        let found = exprs(source);
        let launch = found
            .iter()
            .find_map(|e| match &e.kind {
                ExprKind::KernelLaunch(l) => Some(l),
                _ => None,
            })
            .unwrap();
        assert_eq!(launch.resolution, CalleeResolution::Template);
        assert!(launch.config.iter().all(|c| !c.is_defaulted()));
        assert_eq!(text(source, &launch.callee), "k<float>");
    }

    #[test]
    fn test_launch_overload_picked_by_argument_count() {
        let source = "__global__ void k(int a) {}\n__global__ void k(int a, int b) {}\n\
                      void h() { k<<<1, 1>>>(1, 2); }";
        let found = exprs(source);
        let resolution = found.iter().find_map(|e| match &e.kind {
            ExprKind::KernelLaunch(l) => Some(l.resolution),
            _ => None,
        });
        assert_eq!(resolution, Some(CalleeResolution::Function(FunctionId(1))));
    }

    #[test]
    fn test_bad_launch_config_is_fatal() {
        let err = parse("void h() { k<<<1, 2, 3, 4, 5>>>(); }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LaunchConfig);

        let err = parse("void h() { k<<<1>>>(); }").unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::LaunchConfig);
        assert!(err.message.contains("too few"));
    }

    #[test]
    fn test_builtin_member_access() {
        let source = "__global__ void k() { int i = threadIdx.x + blockDim.y; }";
        let members: Vec<_> = exprs(source)
            .into_iter()
            .filter_map(|e| match e.kind {
                ExprKind::Member(m) => Some(m),
                _ => None,
            })
            .collect();
        assert_eq!(members.len(), 2);
        assert_eq!(
            members[0].member_decl.as_deref(),
            Some("__fetch_builtin_x")
        );
        assert!(matches!(members[0].base.kind, ExprKind::OpaqueValue(_)));
        assert_eq!(text(source, &members[1].base), "blockDim");
    }

    #[test]
    fn test_plain_member_access_is_not_builtin() {
        let source = "struct P { int x; };\nvoid h(P p) { int v = p.x; }";
        let member = exprs(source)
            .into_iter()
            .find_map(|e| match e.kind {
                ExprKind::Member(m) => Some(m),
                _ => None,
            })
            .unwrap();
        assert!(member.member_decl.is_none());
        assert!(matches!(member.base.kind, ExprKind::DeclRef(_)));
    }

    #[test]
    fn test_sizeof_type_and_expression() {
        let source = "void h(int n) { int a = sizeof(cudaStream_t *); int b = sizeof n; }";
        let operands: Vec<_> = exprs(source)
            .into_iter()
            .filter_map(|e| match e.kind {
                ExprKind::Sizeof(s) => Some(s.operand),
                _ => None,
            })
            .collect();
        match &operands[0] {
            SizeofOperand::Type(ty) => {
                assert_eq!(ty.name.as_str(), "cudaStream_t");
                assert!(ty.is_vendor());
                assert_eq!(ty.total_pointer_depth(), 2);
            }
            other => panic!("expected type operand, got {:?}", other),
        }
        assert!(matches!(operands[1], SizeofOperand::Expr(_)));
    }

    #[test]
    fn test_adjacent_string_literals() {
        let source = r#"void h() { puts("cuda" u8"Malloc" L"wide"); }"#;
        let pieces = exprs(source)
            .into_iter()
            .find_map(|e| match e.kind {
                ExprKind::StringLiteral(p) => Some(p),
                _ => None,
            })
            .unwrap();
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].content_span().text(source), "cuda");
        assert_eq!(pieces[1].prefix_len, 2);
        assert_eq!(pieces[1].content_span().text(source), "Malloc");
        assert!(!pieces[2].narrow);
    }

    #[test]
    fn test_macro_argument_located_at_spelling() {
        let source = "#define CHECK(x) x\nvoid h(void **p) { CHECK(cudaMalloc(p, 4)); }";
        let found = exprs(source);
        let expansion = found
            .iter()
            .find(|e| matches!(e.kind, ExprKind::MacroExpansion { .. }))
            .unwrap();
        let check = source.find("CHECK(cuda").unwrap() as u32;
        assert_eq!(expansion.loc, SourceLocation::file(check));

        let call = found
            .iter()
            .find(|e| matches!(e.kind, ExprKind::Call(_)))
            .unwrap();
        let spelling = source.find("cudaMalloc").unwrap() as u32;
        assert_eq!(call.loc, SourceLocation::macro_arg(spelling, check));
        assert_eq!(call.rewrite_offset(), spelling);
        assert_eq!(text(source, call), "cudaMalloc(p, 4)");
    }

    #[test]
    fn test_unparsable_macro_argument_kept_as_text() {
        let source = "#define WRAP(x) x\nvoid h() { WRAP(int); }";
        let expansion = exprs(source)
            .into_iter()
            .find_map(|e| match e.kind {
                ExprKind::MacroExpansion { name, args } => Some((name, args)),
                _ => None,
            })
            .unwrap();
        assert_eq!(expansion.0.as_str(), "WRAP");
        assert!(matches!(expansion.1[0].kind, ExprKind::Unknown(_)));
    }

    #[test]
    fn test_casts() {
        let source = "void h(int n, void *v) { float f = (float)n; int *p = static_cast<int *>(v); }";
        let casts: Vec<_> = exprs(source)
            .into_iter()
            .filter_map(|e| match e.kind {
                ExprKind::Cast { ty, .. } => Some(ty),
                _ => None,
            })
            .collect();
        assert_eq!(casts.len(), 2);
        assert_eq!(casts[0].name.as_str(), "float");
        assert_eq!(casts[1].pointer_depth, 1);
    }

    #[test]
    fn test_less_than_is_not_template() {
        let source = "void h(int a, int b, int c, int d) { bool r = a < b && c > d; }";
        let refs = exprs(source)
            .into_iter()
            .filter(|e| matches!(e.kind, ExprKind::DeclRef(_)))
            .count();
        assert_eq!(refs, 4);
    }

    #[test]
    fn test_nested_template_close_in_cast() {
        let source = "void h(int v) { auto x = static_cast<vector<vector<int>>>(v); int y = 1; }";
        let unit = parse(source).unwrap();
        let mut vars = Vec::new();
        walk_unit(&unit, &mut |node| {
            if let Node::Var(v) = node {
                vars.push(v.name.as_str().to_string());
            }
        });
        assert_eq!(vars, ["x", "y"]);
    }
}

//! Statements inside function bodies.

use super::types::{is_builtin_type, is_elaborated, is_reserved, is_storage_specifier};
use super::{ParseError, Parser};
use hipify_ast::{Block, Expr, ExprKind, Stmt, VarStorage};
use hipify_lexer::Token;

impl<'src> Parser<'src> {
    /// Parse `{ ... }`; statements that fail to parse are skimmed.
    pub(super) fn parse_block(&mut self) -> Result<Block, ParseError> {
        let start = self.stream.current_pos();
        self.stream.expect(Token::LBrace)?;
        self.scopes.push();

        let mut stmts = Vec::new();
        while !self.stream.at_end() && !self.stream.check(&Token::RBrace) {
            let stmt_start = self.stream.current_pos();
            let depth = self.scopes.depth();
            let result = self.parse_statement();
            match self.recover(stmt_start, depth, result)? {
                Some(stmt) => stmts.push(stmt),
                None => stmts.push(Stmt::Other(self.stream.span_from(stmt_start))),
            }
        }

        self.stream.expect(Token::RBrace)?;
        self.scopes.pop();
        Ok(Block {
            stmts,
            span: self.stream.span_from(start),
        })
    }

    pub(super) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        match self.stream.peek() {
            Some(Token::LBrace) => return Ok(Stmt::Block(self.parse_block()?)),
            Some(Token::Semicolon) => {
                self.stream.advance();
                return Ok(Stmt::Other(self.stream.span_from(start)));
            }
            _ => {}
        }

        if let Some(Token::Ident(word)) = self.stream.peek() {
            if self.expansion_at(0).is_none() {
                match &**word {
                    "if" => return self.parse_if(),
                    "while" | "switch" => return self.parse_while_like(),
                    "for" => return self.parse_for(),
                    "do" => return self.parse_do(),
                    "return" | "co_return" => {
                        self.stream.advance();
                        let value = if self.stream.check(&Token::Semicolon) {
                            None
                        } else {
                            Some(self.parse_expression()?)
                        };
                        self.stream.expect(Token::Semicolon)?;
                        return Ok(Stmt::Return {
                            value,
                            span: self.stream.span_from(start),
                        });
                    }
                    "break" | "continue" => {
                        self.stream.advance();
                        self.stream.expect(Token::Semicolon)?;
                        return Ok(Stmt::Other(self.stream.span_from(start)));
                    }
                    "goto" | "asm" | "__asm__" | "__asm" => {
                        self.stream.synchronize();
                        return Ok(Stmt::Other(self.stream.span_from(start)));
                    }
                    "case" => {
                        let keyword = self.expect_ident()?;
                        let value = self.parse_conditional()?;
                        self.stream.expect(Token::Colon)?;
                        return Ok(Stmt::Control {
                            keyword,
                            header: vec![Stmt::Expr(value)],
                            body: Vec::new(),
                            span: self.stream.span_from(start),
                        });
                    }
                    "default" if self.stream.peek_nth(1) == Some(&Token::Colon) => {
                        self.stream.advance();
                        self.stream.advance();
                        return Ok(Stmt::Other(self.stream.span_from(start)));
                    }
                    "try" => return self.parse_try(),
                    "typedef" | "using" | "static_assert" | "template" | "namespace" => {
                        return Ok(Stmt::Decl(self.parse_declaration(VarStorage::Local)?));
                    }
                    k if is_elaborated(k) => {
                        return Ok(Stmt::Decl(self.parse_declaration(VarStorage::Local)?));
                    }
                    label
                        if !is_reserved(label)
                            && self.stream.peek_nth(1) == Some(&Token::Colon) =>
                    {
                        self.stream.advance();
                        self.stream.advance();
                        return Ok(Stmt::Other(self.stream.span_from(start)));
                    }
                    _ => {}
                }
            }
        }

        if self.looks_like_declaration() {
            return Ok(Stmt::Decl(
                self.parse_simple_declaration(VarStorage::Local)?,
            ));
        }

        let expr = self.parse_expression()?;
        if !self.stream.eat(&Token::Semicolon) && !self.ends_macro_statement(&expr) {
            return Err(ParseError::expected_token(
                Token::Semicolon,
                self.stream.peek().cloned(),
                self.stream.current_span(),
            ));
        }
        Ok(Stmt::Expr(expr))
    }

    /// A macro invocation may stand for a whole statement, `;` included.
    fn ends_macro_statement(&self, expr: &Expr) -> bool {
        matches!(expr.kind, ExprKind::MacroExpansion { .. })
    }

    /// Decide whether a statement starting here is a declaration.
    pub(super) fn looks_like_declaration(&self) -> bool {
        let mut n = 0;
        loop {
            match self.stream.peek_nth(n) {
                Some(Token::Ident(k)) if is_storage_specifier(k) => return true,
                Some(Token::Ident(k)) if k.as_ref() == "const" || k.as_ref() == "volatile" => {
                    n += 1
                }
                _ if self.is_specifier_macro(n) => return true,
                _ => break,
            }
        }

        match self.stream.peek_nth(n) {
            Some(Token::Ident(k)) if is_builtin_type(k) || &**k == "typename" => true,
            Some(Token::Ident(name)) => {
                if self.expansion_at(n).is_some() || is_reserved(name) {
                    return false;
                }
                let known_type = self.is_type_name(name);
                if !known_type && self.is_value_name(name) {
                    return false;
                }
                let Some((end, _)) = self.scan_type_id(n) else {
                    return false;
                };
                match self.stream.peek_nth(end) {
                    Some(Token::Ident(next)) if !is_reserved(next) => {
                        known_type
                            || matches!(
                                self.stream.peek_nth(end + 1),
                                Some(
                                    Token::Semicolon
                                        | Token::Eq
                                        | Token::Comma
                                        | Token::LBracket
                                        | Token::LParen
                                        | Token::LBrace
                                        | Token::Colon
                                )
                            )
                    }
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// `( condition )`; a declaration is allowed as the condition.
    fn parse_condition(&mut self) -> Result<Vec<Stmt>, ParseError> {
        self.stream.expect(Token::LParen)?;
        let header = self.nested(|p| {
            let mut header = Vec::new();
            if p.looks_like_declaration() {
                let (decls, _) = p.parse_declaration_body(VarStorage::Local)?;
                header.push(Stmt::Decl(decls));
                if !p.stream.eat(&Token::Semicolon) {
                    return Ok(header);
                }
            }
            header.push(Stmt::Expr(p.parse_expression()?));
            Ok(header)
        })?;
        self.stream.expect(Token::RParen)?;
        Ok(header)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        let keyword = self.expect_ident()?;
        self.stream.eat_keyword("constexpr");
        self.scopes.push();
        let header = self.parse_condition()?;
        let mut body = vec![self.parse_statement()?];
        if self.stream.eat_keyword("else") {
            body.push(self.parse_statement()?);
        }
        self.scopes.pop();
        Ok(Stmt::Control {
            keyword,
            header,
            body,
            span: self.stream.span_from(start),
        })
    }

    fn parse_while_like(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        let keyword = self.expect_ident()?;
        self.scopes.push();
        let header = self.parse_condition()?;
        let body = vec![self.parse_statement()?];
        self.scopes.pop();
        Ok(Stmt::Control {
            keyword,
            header,
            body,
            span: self.stream.span_from(start),
        })
    }

    fn parse_do(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        let keyword = self.expect_ident()?;
        let body = vec![self.parse_statement()?];
        if !self.stream.eat_keyword("while") {
            return Err(ParseError::unexpected_token(
                self.stream.peek(),
                "after 'do' body, expected 'while'",
                self.stream.current_span(),
            ));
        }
        let header = self.parse_condition()?;
        self.stream.expect(Token::Semicolon)?;
        Ok(Stmt::Control {
            keyword,
            header,
            body,
            span: self.stream.span_from(start),
        })
    }

    /// Classic and range-based `for`.
    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        let keyword = self.expect_ident()?;
        self.stream.expect(Token::LParen)?;
        self.scopes.push();

        let header = self.nested(|p| {
            let mut header = Vec::new();
            if p.looks_like_declaration() {
                let (decls, _) = p.parse_declaration_body(VarStorage::Local)?;
                header.push(Stmt::Decl(decls));
                if p.stream.eat(&Token::Colon) {
                    header.push(Stmt::Expr(p.parse_expression()?));
                    return Ok(header);
                }
            } else if !p.stream.check(&Token::Semicolon) {
                header.push(Stmt::Expr(p.parse_expression()?));
            }
            p.stream.expect(Token::Semicolon)?;
            if !p.stream.check(&Token::Semicolon) {
                header.push(Stmt::Expr(p.parse_expression()?));
            }
            p.stream.expect(Token::Semicolon)?;
            if !p.stream.check(&Token::RParen) {
                header.push(Stmt::Expr(p.parse_expression()?));
            }
            Ok(header)
        })?;
        self.stream.expect(Token::RParen)?;

        let body = vec![self.parse_statement()?];
        self.scopes.pop();
        Ok(Stmt::Control {
            keyword,
            header,
            body,
            span: self.stream.span_from(start),
        })
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.current_pos();
        let keyword = self.expect_ident()?;
        let mut body = vec![Stmt::Block(self.parse_block()?)];
        while self.stream.eat_keyword("catch") {
            if self.stream.check(&Token::LParen) {
                self.stream.skip_group();
            }
            body.push(Stmt::Block(self.parse_block()?));
        }
        Ok(Stmt::Control {
            keyword,
            header: Vec::new(),
            body,
            span: self.stream.span_from(start),
        })
    }
}

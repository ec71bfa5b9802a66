//! Token stream wrapper for the hand-written parser.

use super::ParseError;
use hipify_ast::Span;
use hipify_lexer::{Lexeme, Token};

/// Token stream with lookahead, position tracking and backtracking.
///
/// Each token is paired with its byte span in the main file, so every node
/// the parser builds carries exact source offsets.
///
/// The stream can be narrowed to a sub-range (a macro argument) with
/// [`TokenStream::set_limit`]; tokens past the limit read as end of input.
pub struct TokenStream<'src> {
    tokens: &'src [Lexeme],
    pos: usize,
    limit: usize,
}

impl<'src> TokenStream<'src> {
    /// Create a new token stream over the active tokens of a unit.
    pub fn new(tokens: &'src [Lexeme]) -> Self {
        Self {
            tokens,
            pos: 0,
            limit: tokens.len(),
        }
    }

    /// Peek at the current token without consuming it.
    pub fn peek(&self) -> Option<&'src Token> {
        self.peek_nth(0)
    }

    /// Peek at the nth token ahead without consuming.
    pub fn peek_nth(&self, n: usize) -> Option<&'src Token> {
        let index = self.pos + n;
        if index < self.limit {
            self.tokens.get(index).map(|l| &l.token)
        } else {
            None
        }
    }

    /// Token at an absolute index, ignoring the limit.
    pub fn token_at(&self, index: usize) -> Option<&'src Token> {
        self.tokens.get(index).map(|l| &l.token)
    }

    /// Advance to the next token and return the current one.
    pub fn advance(&mut self) -> Option<&'src Token> {
        let token = self.peek();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Check if the current token matches the expected token.
    pub fn check(&self, expected: &Token) -> bool {
        matches!(self.peek(), Some(t) if std::mem::discriminant(t) == std::mem::discriminant(expected))
    }

    /// Check if the current token is the identifier `keyword`.
    pub fn check_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(t) if t.is_keyword(keyword))
    }

    /// Consume the current token if it matches.
    pub fn eat(&mut self, expected: &Token) -> bool {
        if self.check(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the current token if it is the identifier `keyword`.
    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.check_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Expect a specific token and advance if it matches.
    pub fn expect(&mut self, expected: Token) -> Result<Span, ParseError> {
        if self.check(&expected) {
            let span = self.current_span();
            self.pos += 1;
            Ok(span)
        } else {
            Err(ParseError::expected_token(
                expected,
                self.peek().cloned(),
                self.current_span(),
            ))
        }
    }

    /// Check if we've reached the end of the stream (or its limit).
    pub fn at_end(&self) -> bool {
        self.pos >= self.limit
    }

    /// Get the current position in the token stream.
    pub fn current_pos(&self) -> usize {
        self.pos
    }

    /// Rewind or fast-forward to an absolute position.
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos.min(self.tokens.len());
    }

    /// Current limit; tokens at or past it are invisible.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Narrow (or restore) the visible range. Returns the previous limit.
    pub fn set_limit(&mut self, limit: usize) -> usize {
        std::mem::replace(&mut self.limit, limit.min(self.tokens.len()))
    }

    /// Span of the token at an absolute index.
    pub fn span_at(&self, index: usize) -> Span {
        match self.tokens.get(index) {
            Some(lexeme) => Span::from(lexeme.span.clone()),
            None => self.eof_span(),
        }
    }

    /// Create a span from a starting position to the end of the last
    /// consumed token.
    pub fn span_from(&self, start: usize) -> Span {
        let start_byte = self.span_at(start).start;
        if self.pos > start {
            Span::new(start_byte, self.span_at(self.pos - 1).end)
        } else {
            Span::empty(start_byte)
        }
    }

    /// Get a span for the current token.
    pub fn current_span(&self) -> Span {
        if self.pos < self.limit {
            self.span_at(self.pos)
        } else {
            self.eof_span()
        }
    }

    fn eof_span(&self) -> Span {
        let end = self
            .tokens
            .get(..self.limit)
            .and_then(|visible| visible.last())
            .map(|l| l.span.end)
            .unwrap_or(0);
        Span::empty(end as u32)
    }

    /// Skip one balanced group starting at the current opener.
    ///
    /// The current token must be `(`, `[` or `{`; anything else is consumed
    /// alone. Delimiters were checked for balance before parsing started,
    /// so a group always ends before the stream does.
    pub fn skip_group(&mut self) {
        self.pos = self.group_end(self.pos);
    }

    /// Index one past the balanced group opening at `index`.
    pub fn group_end(&self, index: usize) -> usize {
        let mut depth = 0usize;
        let mut i = index;
        while i < self.limit {
            match self.token_at(i) {
                Some(Token::LParen | Token::LBracket | Token::LBrace) => depth += 1,
                Some(Token::RParen | Token::RBracket | Token::RBrace) => {
                    depth = depth.saturating_sub(1);
                }
                _ => {}
            }
            i += 1;
            if depth == 0 {
                break;
            }
        }
        i
    }

    /// Index one past the `>` closing the `<...>` list that opens at `index`.
    ///
    /// Returns `None` when something that cannot appear in a template
    /// argument list (`;`, braces, `&&`, `||`, an unmatched closer) comes
    /// first, so `a < b && c > d` is not mistaken for a template-id.
    pub fn angles_end(&self, index: usize) -> Option<usize> {
        if self.token_at(index) != Some(&Token::Lt) || index >= self.limit {
            return None;
        }
        let mut depth = 1usize;
        let mut i = index + 1;
        while i < self.limit {
            match self.token_at(i)? {
                Token::Lt => depth += 1,
                Token::LParen | Token::LBracket => {
                    i = self.group_end(i);
                    continue;
                }
                Token::Semicolon
                | Token::LBrace
                | Token::RBrace
                | Token::RParen
                | Token::RBracket
                | Token::AmpAmp
                | Token::PipePipe => return None,
                t if t.closing_angles() > 0 => {
                    // A `>>` may also close lists enclosing this one.
                    let closes = t.closing_angles();
                    if closes >= depth {
                        return Some(i + 1);
                    }
                    depth -= closes;
                }
                _ => {}
            }
            i += 1;
        }
        None
    }

    /// Skip a `<...>` list starting at the current `<`.
    ///
    /// Returns false, without moving, when the list is not closed.
    pub fn skip_angles(&mut self) -> bool {
        match self.angles_end(self.pos) {
            Some(end) => {
                self.pos = end;
                true
            }
            None => false,
        }
    }

    /// Skip to the end of the current statement or declaration.
    ///
    /// Consumes through the next `;` at nesting depth zero, or through a
    /// brace group (and a `;` directly after it). Stops before a `}` that
    /// closes an enclosing group.
    pub fn synchronize(&mut self) {
        let start = self.pos;
        while let Some(token) = self.peek() {
            match token {
                Token::Semicolon => {
                    self.pos += 1;
                    return;
                }
                Token::RBrace | Token::RParen | Token::RBracket => {
                    if self.pos == start {
                        self.pos += 1;
                    }
                    return;
                }
                Token::LBrace => {
                    self.skip_group();
                    self.eat(&Token::Semicolon);
                    return;
                }
                Token::LParen | Token::LBracket => self.skip_group(),
                _ => self.pos += 1,
            }
        }
    }
}

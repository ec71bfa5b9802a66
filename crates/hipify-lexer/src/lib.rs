// Allow unwrap in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Lexical analysis for C, C++ and CUDA sources.
//!
//! This crate tokenizes translation units using logos. It is deliberately
//! lossy about *values* (numbers and literals carry no decoded payload) and
//! exact about *positions*: every token keeps its byte span so that callers can
//! slice the original buffer and produce byte-precise edits.
//!
//! # Design
//!
//! - `Token` — punctuators, identifiers and literal classes
//! - Comments, blanks and line continuations are skipped
//! - `Newline` is kept because preprocessor directives are line oriented
//! - `<<<` and `>>>` are single tokens (CUDA execution configuration)
//!
//! # Examples
//!
//! ```
//! # use hipify_lexer::*;
//! let lexemes = tokenize("cudaMalloc(&p, n);");
//! assert_eq!(lexemes[0].token.ident(), Some("cudaMalloc"));
//! assert_eq!(lexemes[0].span, 0..10);
//! ```

use logos::Logos;
use std::ops::Range;
use std::rc::Rc;

/// C/C++/CUDA token.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\f\r\x0b]+")] // Skip horizontal whitespace
#[logos(skip r"\\\r?\n")] // Skip line continuations
#[logos(skip r"//[^\n]*")] // Skip // comments
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")] // Skip /* */ comments
pub enum Token {
    /// End of a physical line (significant for directives only)
    #[token("\n")]
    Newline,

    // === Preprocessor ===
    #[token("#")]
    Hash,
    #[token("##")]
    HashHash,

    // === Execution configuration ===
    /// `<<<` opening a kernel launch configuration
    #[token("<<<")]
    LaunchOpen,
    /// `>>>` closing a kernel launch configuration
    #[token(">>>")]
    LaunchClose,

    // === Delimiters ===
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,

    // === Punctuation ===
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
    #[token(":")]
    Colon,
    #[token("::")]
    ColonColon,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("->")]
    Arrow,
    #[token("?")]
    Question,

    // === Operators ===
    #[token("=")]
    Eq,
    #[token("==")]
    EqEq,
    #[token("!=")]
    BangEq,
    #[token("<")]
    Lt,
    #[token("<=")]
    LtEq,
    #[token(">")]
    Gt,
    #[token(">=")]
    GtEq,
    #[token("<<")]
    Shl,
    #[token(">>")]
    Shr,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&")]
    Amp,
    #[token("&&")]
    AmpAmp,
    #[token("|")]
    Pipe,
    #[token("||")]
    PipePipe,
    #[token("^")]
    Caret,
    #[token("~")]
    Tilde,
    #[token("!")]
    Bang,
    #[token("++")]
    PlusPlus,
    #[token("--")]
    MinusMinus,
    /// Compound assignment (`+=`, `<<=`, ...)
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("<<=")]
    #[token(">>=")]
    AssignOp,

    // === Literals ===
    /// Preprocessing number (integer or floating, any suffix)
    #[regex(r"[0-9]([0-9a-zA-Z_.]|[eEpP][+-])*")]
    #[regex(r"\.[0-9]([0-9a-zA-Z_.]|[eEpP][+-])*")]
    Number,

    /// Narrow string literal
    #[regex(r#""([^"\\\n]|\\.)*""#)]
    Str,

    /// UTF-8 string literal (`u8"..."`)
    #[regex(r#"u8"([^"\\\n]|\\.)*""#)]
    Utf8Str,

    /// Wide string literal (`L"..."`, `u"..."`, `U"..."`)
    #[regex(r#"[LuU]"([^"\\\n]|\\.)*""#)]
    WideStr,

    /// Character literal
    #[regex(r#"(u8|[LuU])?'([^'\\\n]|\\.)*'"#)]
    Char,

    #[regex(r"[a-zA-Z_][a-zA-Z0-9_]*", |lex| Rc::from(lex.slice()))]
    Ident(Rc<str>),
}

impl Token {
    /// Identifier text, if this is an identifier.
    pub fn ident(&self) -> Option<&str> {
        match self {
            Token::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// True for identifiers (keywords are identifiers at this level).
    pub fn is_ident(&self) -> bool {
        matches!(self, Token::Ident(_))
    }

    /// True when this identifier spells `keyword`.
    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.ident() == Some(keyword)
    }

    /// True for string literals of any width.
    pub fn is_string_literal(&self) -> bool {
        matches!(self, Token::Str | Token::Utf8Str | Token::WideStr)
    }

    /// Number of `>` a token closes when it terminates a template argument list.
    ///
    /// `>>` and `>>>` close two and three nested lists respectively.
    pub fn closing_angles(&self) -> usize {
        match self {
            Token::Gt => 1,
            Token::Shr => 2,
            Token::LaunchClose => 3,
            _ => 0,
        }
    }

    fn fixed_text(&self) -> &'static str {
        match self {
            Token::Newline => "\\n",
            Token::Hash => "#",
            Token::HashHash => "##",
            Token::LaunchOpen => "<<<",
            Token::LaunchClose => ">>>",
            Token::LParen => "(",
            Token::RParen => ")",
            Token::LBrace => "{",
            Token::RBrace => "}",
            Token::LBracket => "[",
            Token::RBracket => "]",
            Token::Comma => ",",
            Token::Semicolon => ";",
            Token::Colon => ":",
            Token::ColonColon => "::",
            Token::Dot => ".",
            Token::Ellipsis => "...",
            Token::Arrow => "->",
            Token::Question => "?",
            Token::Eq => "=",
            Token::EqEq => "==",
            Token::BangEq => "!=",
            Token::Lt => "<",
            Token::LtEq => "<=",
            Token::Gt => ">",
            Token::GtEq => ">=",
            Token::Shl => "<<",
            Token::Shr => ">>",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Amp => "&",
            Token::AmpAmp => "&&",
            Token::Pipe => "|",
            Token::PipePipe => "||",
            Token::Caret => "^",
            Token::Tilde => "~",
            Token::Bang => "!",
            Token::PlusPlus => "++",
            Token::MinusMinus => "--",
            Token::AssignOp => "<op>=",
            Token::Number => "<number>",
            Token::Str => "<string>",
            Token::Utf8Str => "<u8 string>",
            Token::WideStr => "<wide string>",
            Token::Char => "<char>",
            Token::Ident(_) => "<identifier>",
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Token::Ident(id) => write!(f, "{}", id),
            other => write!(f, "{}", other.fixed_text()),
        }
    }
}

/// A token together with its byte span in the buffer it was lexed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Lexeme {
    pub token: Token,
    pub span: Range<usize>,
}

impl Lexeme {
    /// Source text of this lexeme.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.span.clone()]
    }
}

/// Tokenize a whole buffer, keeping `Newline` tokens.
///
/// Characters that do not start any token (stray `@`, `$`, a lone `\`) are
/// dropped; they never carry API names.
pub fn tokenize(source: &str) -> Vec<Lexeme> {
    Token::lexer(source)
        .spanned()
        .filter_map(|(result, span)| result.ok().map(|token| Lexeme { token, span }))
        .collect()
}

/// Re-tokenize `range` of `source` in isolation.
///
/// The returned spans are absolute offsets into `source`. Newlines are
/// dropped: a re-tokenized span is never interpreted line by line.
///
/// # Panics
///
/// Panics if `range` is out of bounds or not on character boundaries.
pub fn retokenize(source: &str, range: Range<usize>) -> Vec<Lexeme> {
    let base = range.start;
    Token::lexer(&source[range])
        .spanned()
        .filter_map(|(result, span)| match result {
            Ok(Token::Newline) | Err(_) => None,
            Ok(token) => Some(Lexeme {
                token,
                span: span.start + base..span.end + base,
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source).into_iter().map(|l| l.token).collect()
    }

    fn ident(s: &str) -> Token {
        Token::Ident(Rc::from(s))
    }

    #[test]
    fn test_call_statement() {
        let tokens = lex("cudaMalloc(&p, n);");
        assert_eq!(
            tokens,
            vec![
                ident("cudaMalloc"),
                Token::LParen,
                Token::Amp,
                ident("p"),
                Token::Comma,
                ident("n"),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_launch_brackets() {
        let tokens = lex("k<<<g, b>>>(x);");
        assert_eq!(
            tokens,
            vec![
                ident("k"),
                Token::LaunchOpen,
                ident("g"),
                Token::Comma,
                ident("b"),
                Token::LaunchClose,
                Token::LParen,
                ident("x"),
                Token::RParen,
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_shift_operators_are_not_launch() {
        let tokens = lex("a << b >> c");
        assert_eq!(
            tokens,
            vec![ident("a"), Token::Shl, ident("b"), Token::Shr, ident("c")]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        let tokens = lex("a /* cudaFree ** */ b // cudaMalloc\nc");
        assert_eq!(tokens, vec![ident("a"), ident("b"), Token::Newline, ident("c")]);
    }

    #[test]
    fn test_line_continuation_is_skipped() {
        let tokens = lex("#define X \\\n  cudaSuccess\n");
        assert_eq!(
            tokens,
            vec![
                Token::Hash,
                ident("define"),
                ident("X"),
                ident("cudaSuccess"),
                Token::Newline,
            ]
        );
    }

    #[test]
    fn test_string_literal_classes() {
        let tokens = lex(r#""narrow" u8"utf8" L"wide" u"16" U"32" 'c' L'w'"#);
        assert_eq!(
            tokens,
            vec![
                Token::Str,
                Token::Utf8Str,
                Token::WideStr,
                Token::WideStr,
                Token::WideStr,
                Token::Char,
                Token::Char,
            ]
        );
    }

    #[test]
    fn test_string_with_escaped_quote() {
        let lexemes = tokenize(r#"printf("say \"cudaFree\"\n");"#);
        assert_eq!(lexemes[2].token, Token::Str);
        assert_eq!(lexemes[2].span, 7..27);
    }

    #[test]
    fn test_numbers() {
        let tokens = lex("42 0x1Fu 3.5e-3f .25 1ull");
        assert_eq!(tokens, vec![Token::Number; 5]);
    }

    #[test]
    fn test_member_access_is_not_number() {
        let tokens = lex("threadIdx.x");
        assert_eq!(tokens, vec![ident("threadIdx"), Token::Dot, ident("x")]);
    }

    #[test]
    fn test_compound_assignment() {
        let tokens = lex("a += 1; b <<= 2;");
        assert_eq!(tokens[1], Token::AssignOp);
        assert_eq!(tokens[5], Token::AssignOp);
    }

    #[test]
    fn test_spans_are_byte_offsets() {
        let lexemes = tokenize("int  x;");
        let spans: Vec<_> = lexemes.iter().map(|l| l.span.clone()).collect();
        assert_eq!(spans, vec![0..3, 5..6, 6..7]);
    }

    #[test]
    fn test_retokenize_offsets_and_drops_newlines() {
        let source = "CHECK(cudaMalloc(&p,\n n))";
        let lexemes = retokenize(source, 6..24);
        assert_eq!(lexemes[0].token, ident("cudaMalloc"));
        assert_eq!(lexemes[0].span, 6..16);
        assert!(lexemes.iter().all(|l| l.token != Token::Newline));
        assert_eq!(lexemes.last().unwrap().text(source), ")");
    }

    #[test]
    fn test_closing_angles() {
        assert_eq!(Token::Gt.closing_angles(), 1);
        assert_eq!(Token::Shr.closing_angles(), 2);
        assert_eq!(Token::LaunchClose.closing_angles(), 3);
        assert_eq!(Token::Lt.closing_angles(), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Token::LaunchOpen.to_string(), "<<<");
        assert_eq!(ident("dim3").to_string(), "dim3");
    }
}

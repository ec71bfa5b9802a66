//! Evaluation of `#if` and `#elif` conditions.

use super::{MacroTable, PpToken};
use hipify_lexer::Token;

/// Nesting limit for object-like macro substitution inside a condition.
const MAX_EXPANSION_DEPTH: usize = 32;

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Value(i64),
    Op(Token),
}

/// Evaluate a controlling expression against the current macro table.
///
/// `defined NAME` and `defined(NAME)` test the table, object-like macros are
/// replaced by their bodies, and any other identifier evaluates to 0.
pub(super) fn evaluate(tokens: &[PpToken], macros: &MacroTable) -> Result<bool, String> {
    let mut items = Vec::new();
    expand(tokens, macros, 0, &mut items)?;
    if items.is_empty() {
        return Err("expected value in expression".to_string());
    }

    let mut eval = Evaluator { items: &items, pos: 0 };
    let value = eval.conditional()?;
    match eval.items.get(eval.pos) {
        None => Ok(value != 0),
        Some(item) => Err(format!("unexpected {} in expression", describe(item))),
    }
}

fn expand(
    tokens: &[PpToken],
    macros: &MacroTable,
    depth: usize,
    out: &mut Vec<Item>,
) -> Result<(), String> {
    let mut i = 0;
    while i < tokens.len() {
        let token = &tokens[i];
        match &token.token {
            Token::Ident(name) if &**name == "defined" => {
                let (operand, next) = match tokens.get(i + 1).map(|t| &t.token) {
                    Some(Token::LParen) => {
                        let operand = tokens.get(i + 2).and_then(|t| t.token.ident());
                        match tokens.get(i + 3).map(|t| &t.token) {
                            Some(Token::RParen) => (operand, i + 4),
                            _ => return Err("missing ')' after 'defined'".to_string()),
                        }
                    }
                    _ => (tokens.get(i + 1).and_then(|t| t.token.ident()), i + 2),
                };
                let operand = operand.ok_or("macro name missing after 'defined'")?;
                out.push(Item::Value(macros.contains_key(operand) as i64));
                i = next;
                continue;
            }
            Token::Ident(name) => {
                let followed_by_paren =
                    matches!(tokens.get(i + 1).map(|t| &t.token), Some(Token::LParen));
                match macros.get(name) {
                    Some(info) if info.params.is_none() && depth < MAX_EXPANSION_DEPTH => {
                        expand(&info.body, macros, depth + 1, out)?;
                    }
                    _ if &**name == "true" => out.push(Item::Value(1)),
                    _ if followed_by_paren => {
                        // Function-like macros and feature-test builtins.
                        out.push(Item::Value(0));
                        i = skip_parens(tokens, i + 1);
                        continue;
                    }
                    _ => out.push(Item::Value(0)),
                }
            }
            Token::Number => out.push(Item::Value(parse_integer(&token.text)?)),
            Token::Char => out.push(Item::Value(char_value(&token.text))),
            other => out.push(Item::Op(other.clone())),
        }
        i += 1;
    }
    Ok(())
}

/// Index just past the parenthesized group starting at `open`.
fn skip_parens(tokens: &[PpToken], open: usize) -> usize {
    let mut depth = 0usize;
    for (offset, token) in tokens[open..].iter().enumerate() {
        match token.token {
            Token::LParen => depth += 1,
            Token::RParen => {
                depth -= 1;
                if depth == 0 {
                    return open + offset + 1;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

fn parse_integer(text: &str) -> Result<i64, String> {
    let digits: String = text
        .trim_end_matches(|c| matches!(c, 'u' | 'U' | 'l' | 'L'))
        .chars()
        .filter(|c| *c != '\'')
        .collect();
    let parsed = if let Some(hex) = digits.strip_prefix("0x").or(digits.strip_prefix("0X")) {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0b").or(digits.strip_prefix("0B")) {
        u64::from_str_radix(bin, 2)
    } else if digits.len() > 1 && digits.starts_with('0') {
        u64::from_str_radix(&digits[1..], 8)
    } else {
        digits.parse::<u64>()
    };
    parsed
        .map(|v| v as i64)
        .map_err(|_| format!("invalid integer '{}' in preprocessor expression", text))
}

fn char_value(text: &str) -> i64 {
    let body = text
        .trim_start_matches(|c| matches!(c, 'u' | '8' | 'U' | 'L'))
        .trim_matches('\'');
    let mut chars = body.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(escaped)) => match escaped {
            'n' => 10,
            't' => 9,
            'r' => 13,
            '0' => 0,
            other => other as i64,
        },
        (Some(c), _) => c as i64,
        _ => 0,
    }
}

fn describe(item: &Item) -> String {
    match item {
        Item::Value(v) => format!("'{}'", v),
        Item::Op(token) => format!("'{}'", token),
    }
}

struct Evaluator<'a> {
    items: &'a [Item],
    pos: usize,
}

impl Evaluator<'_> {
    fn peek_op(&self) -> Option<&Token> {
        match self.items.get(self.pos) {
            Some(Item::Op(token)) => Some(token),
            _ => None,
        }
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek_op() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn conditional(&mut self) -> Result<i64, String> {
        let condition = self.binary(1)?;
        if !self.eat(&Token::Question) {
            return Ok(condition);
        }
        let then = self.conditional()?;
        if !self.eat(&Token::Colon) {
            return Err("expected ':' in conditional expression".to_string());
        }
        let otherwise = self.conditional()?;
        Ok(if condition != 0 { then } else { otherwise })
    }

    fn binary(&mut self, min_prec: u8) -> Result<i64, String> {
        let mut lhs = self.unary()?;
        while let Some(op) = self.peek_op().cloned() {
            let prec = precedence(&op);
            if prec == 0 || prec < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(prec + 1)?;
            lhs = apply(&op, lhs, rhs)?;
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<i64, String> {
        match self.items.get(self.pos).cloned() {
            Some(Item::Value(v)) => {
                self.pos += 1;
                Ok(v)
            }
            Some(Item::Op(Token::Bang)) => {
                self.pos += 1;
                Ok((self.unary()? == 0) as i64)
            }
            Some(Item::Op(Token::Tilde)) => {
                self.pos += 1;
                Ok(!self.unary()?)
            }
            Some(Item::Op(Token::Minus)) => {
                self.pos += 1;
                Ok(self.unary()?.wrapping_neg())
            }
            Some(Item::Op(Token::Plus)) => {
                self.pos += 1;
                self.unary()
            }
            Some(Item::Op(Token::LParen)) => {
                self.pos += 1;
                let value = self.conditional()?;
                if !self.eat(&Token::RParen) {
                    return Err("expected ')' in expression".to_string());
                }
                Ok(value)
            }
            Some(other) => Err(format!("unexpected {} in expression", describe(&other))),
            None => Err("expected value in expression".to_string()),
        }
    }
}

fn precedence(op: &Token) -> u8 {
    match op {
        Token::PipePipe => 1,
        Token::AmpAmp => 2,
        Token::Pipe => 3,
        Token::Caret => 4,
        Token::Amp => 5,
        Token::EqEq | Token::BangEq => 6,
        Token::Lt | Token::LtEq | Token::Gt | Token::GtEq => 7,
        Token::Shl | Token::Shr => 8,
        Token::Plus | Token::Minus => 9,
        Token::Star | Token::Slash | Token::Percent => 10,
        _ => 0,
    }
}

fn apply(op: &Token, lhs: i64, rhs: i64) -> Result<i64, String> {
    Ok(match op {
        Token::PipePipe => (lhs != 0 || rhs != 0) as i64,
        Token::AmpAmp => (lhs != 0 && rhs != 0) as i64,
        Token::Pipe => lhs | rhs,
        Token::Caret => lhs ^ rhs,
        Token::Amp => lhs & rhs,
        Token::EqEq => (lhs == rhs) as i64,
        Token::BangEq => (lhs != rhs) as i64,
        Token::Lt => (lhs < rhs) as i64,
        Token::LtEq => (lhs <= rhs) as i64,
        Token::Gt => (lhs > rhs) as i64,
        Token::GtEq => (lhs >= rhs) as i64,
        Token::Shl => lhs.wrapping_shl(rhs as u32),
        Token::Shr => lhs.wrapping_shr(rhs as u32),
        Token::Plus => lhs.wrapping_add(rhs),
        Token::Minus => lhs.wrapping_sub(rhs),
        Token::Star => lhs.wrapping_mul(rhs),
        Token::Slash | Token::Percent if rhs == 0 => {
            return Err("division by zero in preprocessor expression".to_string())
        }
        Token::Slash => lhs.wrapping_div(rhs),
        Token::Percent => lhs.wrapping_rem(rhs),
        other => return Err(format!("unexpected '{}' in expression", other)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preprocess::{pp_tokens, MacroInfo};
    use std::collections::HashMap;
    use std::rc::Rc;

    fn table(defs: &[(&str, &str)]) -> MacroTable {
        let mut macros: MacroTable = HashMap::new();
        for (name, body) in defs {
            macros.insert(
                Rc::from(*name),
                Rc::new(MacroInfo {
                    params: None,
                    variadic: false,
                    body: pp_tokens(body),
                }),
            );
        }
        macros
    }

    fn eval(expr: &str, macros: &MacroTable) -> Result<bool, String> {
        evaluate(&pp_tokens(expr), macros)
    }

    #[test]
    fn test_defined_forms() {
        let macros = table(&[("__CUDA_ARCH__", "350")]);
        assert_eq!(eval("defined(__CUDA_ARCH__)", &macros), Ok(true));
        assert_eq!(eval("defined __CUDA_ARCH__", &macros), Ok(true));
        assert_eq!(eval("!defined(__CUDA_ARCH__)", &macros), Ok(false));
        assert_eq!(eval("defined(OTHER) || 0", &macros), Ok(false));
    }

    #[test]
    fn test_arithmetic_and_macro_values() {
        let macros = table(&[("__CUDA_ARCH__", "350"), ("TWICE", "(2 * __CUDA_ARCH__)")]);
        assert_eq!(eval("__CUDA_ARCH__ >= 300", &macros), Ok(true));
        assert_eq!(eval("__CUDA_ARCH__ < 300", &macros), Ok(false));
        assert_eq!(eval("TWICE == 700", &macros), Ok(true));
        assert_eq!(eval("1 + 2 * 3 == 7", &macros), Ok(true));
        assert_eq!(eval("(1 << 4) == 0x10", &macros), Ok(true));
        assert_eq!(eval("UNKNOWN ? 1 : 0", &macros), Ok(false));
        assert_eq!(eval("__cplusplus >= 201103L", &table(&[("__cplusplus", "201103L")])), Ok(true));
    }

    #[test]
    fn test_function_like_names_evaluate_to_zero() {
        let macros = table(&[]);
        assert_eq!(eval("__has_include(<cuda.h>)", &macros), Ok(false));
        assert_eq!(eval("!__has_feature(x) && 1", &macros), Ok(true));
    }

    #[test]
    fn test_malformed_conditions() {
        let macros = table(&[]);
        assert!(eval("", &macros).is_err());
        assert!(eval("1 +", &macros).is_err());
        assert!(eval("(1", &macros).is_err());
        assert!(eval("4 / 0", &macros).is_err());
        assert!(eval("defined", &macros).is_err());
    }
}

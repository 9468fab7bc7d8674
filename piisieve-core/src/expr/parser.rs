//! Recursive-descent parser for rule constraints and actions.
//!
//! Grammar:
//!
//! ```text
//! predicate := expr [NOT] (REGEXP | RLIKE) ( string | '(' string ')' ) [AS ident]
//! redaction := expr AS ident
//! expr      := string | ['-'] integer | NULL
//!            | CAST '(' expr AS ident ')'
//!            | ident '(' [expr {',' expr}] ')'
//!            | ident | `quoted ident`
//! ```

use serde_json::Value;

use crate::errors::ExprError;
use crate::expr::functions::{build_call, cached_regex};
use crate::expr::{Expr, Predicate, Redaction};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Quoted(String),
    Str(String),
    Int(i64),
    LParen,
    RParen,
    Comma,
    Minus,
    Eof,
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn syntax(&self, offset: usize, message: impl Into<String>) -> ExprError {
        ExprError::Syntax { offset, message: message.into() }
    }

    fn tokenize(mut self) -> Result<Vec<(usize, Token)>, ExprError> {
        let mut out = Vec::new();
        loop {
            self.skip_whitespace();
            let start = self.pos;
            let Some(c) = self.peek() else {
                out.push((start, Token::Eof));
                return Ok(out);
            };
            let token = match c {
                '(' => { self.bump(); Token::LParen }
                ')' => { self.bump(); Token::RParen }
                ',' => { self.bump(); Token::Comma }
                '-' => { self.bump(); Token::Minus }
                '\'' | '"' => Token::Str(self.string_literal(c)?),
                '`' => Token::Quoted(self.quoted_ident()?),
                c if c.is_ascii_digit() => Token::Int(self.integer()?),
                c if c.is_alphabetic() || c == '_' => Token::Ident(self.ident()),
                other => return Err(self.syntax(start, format!("unexpected character '{}'", other))),
            };
            out.push((start, token));
        }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn string_literal(&mut self, quote: char) -> Result<String, ExprError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.syntax(start, "unterminated string literal")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(self.syntax(start, "unterminated string literal")),
                    Some('\\') => out.push('\\'),
                    Some('\'') => out.push('\''),
                    Some('"') => out.push('"'),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    // Regex escapes such as \d and \w are kept verbatim.
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn quoted_ident(&mut self) -> Result<String, ExprError> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.syntax(start, "unterminated quoted identifier")),
                Some('`') => {
                    if self.peek() == Some('`') {
                        self.bump();
                        out.push('`');
                    } else {
                        return Ok(out);
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn integer(&mut self) -> Result<i64, ExprError> {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos]
            .parse()
            .map_err(|_| self.syntax(start, "integer literal out of range"))
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    idx: usize,
}

impl Parser {
    fn new(src: &str) -> Result<Self, ExprError> {
        Ok(Self { tokens: Lexer::new(src).tokenize()?, idx: 0 })
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.idx.min(self.tokens.len() - 1)].1
    }

    fn offset(&self) -> usize {
        self.tokens[self.idx.min(self.tokens.len() - 1)].0
    }

    fn next(&mut self) -> Token {
        let t = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> ExprError {
        ExprError::Syntax { offset: self.offset(), message: message.into() }
    }

    fn is_keyword(&self, kw: &str) -> bool {
        matches!(self.peek(), Token::Ident(s) if s.eq_ignore_ascii_case(kw))
    }

    fn expect_keyword(&mut self, kw: &str) -> Result<(), ExprError> {
        if self.is_keyword(kw) {
            self.next();
            Ok(())
        } else {
            Err(self.err(format!("expected {}", kw)))
        }
    }

    fn expect(&mut self, want: Token, what: &str) -> Result<(), ExprError> {
        if *self.peek() == want {
            self.next();
            Ok(())
        } else {
            Err(self.err(format!("expected {}", what)))
        }
    }

    fn expect_eof(&self) -> Result<(), ExprError> {
        match self.peek() {
            Token::Eof => Ok(()),
            other => Err(self.err(format!("unexpected trailing token {:?}", other))),
        }
    }

    fn identifier(&mut self) -> Result<String, ExprError> {
        match self.next() {
            Token::Ident(s) | Token::Quoted(s) => Ok(s),
            other => Err(self.err(format!("expected an identifier, found {:?}", other))),
        }
    }

    fn expr(&mut self) -> Result<Expr, ExprError> {
        match self.next() {
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Int(i) => Ok(Expr::Literal(Value::from(i))),
            Token::Minus => match self.next() {
                Token::Int(i) => Ok(Expr::Literal(Value::from(-i))),
                _ => Err(self.err("expected an integer after '-'")),
            },
            Token::Quoted(name) => Ok(Expr::Column(name)),
            Token::Ident(name) => {
                if name.eq_ignore_ascii_case("null") {
                    return Ok(Expr::Literal(Value::Null));
                }
                if *self.peek() != Token::LParen {
                    return Ok(Expr::Column(name));
                }
                self.next();
                if name.eq_ignore_ascii_case("cast") {
                    let inner = self.expr()?;
                    self.expect_keyword("AS")?;
                    let target = self.identifier()?;
                    self.expect(Token::RParen, "')'")?;
                    return match target.to_ascii_uppercase().as_str() {
                        "STRING" | "VARCHAR" => Ok(Expr::CastString(Box::new(inner))),
                        _ => Err(ExprError::UnsupportedCast(target)),
                    };
                }
                let mut args = Vec::new();
                if *self.peek() != Token::RParen {
                    loop {
                        args.push(self.expr()?);
                        if *self.peek() == Token::Comma {
                            self.next();
                        } else {
                            break;
                        }
                    }
                }
                self.expect(Token::RParen, "')'")?;
                Ok(Expr::Call(build_call(&name, args)?))
            }
            other => Err(self.err(format!("unexpected token {:?}", other))),
        }
    }

    fn pattern_literal(&mut self) -> Result<String, ExprError> {
        let parenthesised = *self.peek() == Token::LParen;
        if parenthesised {
            self.next();
        }
        let pattern = match self.next() {
            Token::Str(s) => s,
            _ => return Err(self.err("expected a string pattern")),
        };
        if parenthesised {
            self.expect(Token::RParen, "')'")?;
        }
        Ok(pattern)
    }
}

/// Parses a rule constraint such as `` CAST(`c` AS STRING) NOT REGEXP("...") AS result ``.
pub fn parse_predicate(src: &str) -> Result<Predicate, ExprError> {
    let mut p = Parser::new(src)?;
    let subject = p.expr()?;
    let negated = if p.is_keyword("NOT") {
        p.next();
        true
    } else {
        false
    };
    if p.is_keyword("REGEXP") || p.is_keyword("RLIKE") {
        p.next();
    } else {
        return Err(p.err("expected REGEXP or RLIKE"));
    }
    let pattern = cached_regex(&p.pattern_literal()?)?;
    // The alias names the boolean result column and carries no meaning here.
    if p.is_keyword("AS") {
        p.next();
        p.identifier()?;
    }
    p.expect_eof()?;
    Ok(Predicate { subject, pattern, negated })
}

/// Parses a rule action such as `` '[REDACTED]' AS `ssn` ``.
pub fn parse_redaction(src: &str) -> Result<Redaction, ExprError> {
    let mut p = Parser::new(src)?;
    let expr = p.expr()?;
    p.expect_keyword("AS")?;
    let target = p.identifier()?;
    p.expect_eof()?;
    Ok(Redaction { expr, target })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predicate_with_parenthesised_pattern() {
        let p = parse_predicate(r#"CAST(`card` AS STRING) NOT REGEXP("^4[0-9]{12}$") AS result"#).unwrap();
        assert!(p.negated);
        assert_eq!(p.pattern.as_str(), "^4[0-9]{12}$");
        assert!(matches!(p.subject, Expr::CastString(_)));
    }

    #[test]
    fn test_parse_positive_rlike() {
        let p = parse_predicate("`email` RLIKE '@'").unwrap();
        assert!(!p.negated);
    }

    #[test]
    fn test_string_escapes_keep_regex_classes() {
        let p = parse_predicate(r#"`a` NOT REGEXP '^\\d{3}-\d{2}$'"#).unwrap();
        assert_eq!(p.pattern.as_str(), r"^\d{3}-\d{2}$");
    }

    #[test]
    fn test_quoted_identifier_with_doubled_backtick() {
        let r = parse_redaction("'x' AS `we``ird`").unwrap();
        assert_eq!(r.target, "we`ird");
    }

    #[test]
    fn test_negative_integer_argument() {
        let r = parse_redaction("substr(`c`, -3, 3) AS `c`").unwrap();
        assert_eq!(r.target, "c");
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse_predicate("`a` REGEXP"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_predicate("`a` NOT LIKE 'x'"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_redaction("'x'"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_redaction("'x AS `a`"), Err(ExprError::Syntax { .. })));
        assert!(matches!(parse_redaction("mask(`a`) AS `a`"), Err(ExprError::UnknownFunction(_))));
        assert!(matches!(parse_redaction("CAST(`a` AS INT) AS `a`"), Err(ExprError::UnsupportedCast(_))));
        assert!(matches!(parse_predicate("`a` REGEXP '('"), Err(ExprError::InvalidPattern { .. })));
        assert!(matches!(parse_redaction("'x' AS `a` extra"), Err(ExprError::Syntax { .. })));
    }
}

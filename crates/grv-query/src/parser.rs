//! Filter-query parser: precedence-climbing recursive descent over the
//! grammar in spec.md §6 (low→high: OR, AND, NOT, comparisons).

use crate::scanner::{self, Token, TokenKind};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Glob,
    Regexp,
}

impl CmpOp {
    pub fn as_str(self) -> &'static str {
        match self {
            CmpOp::Eq => "=",
            CmpOp::Ne => "!=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Glob => "GLOB",
            CmpOp::Regexp => "REGEXP",
        }
    }
}

/// Tagged sum type for the filter-query AST (spec.md §9: re-architected
/// away from dynamic dispatch).
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Paren(Box<Expr>),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Cmp(CmpOp, Box<Expr>, Box<Expr>),
    Identifier(String),
    StringLit(String),
    NumberLit(f64),
}

impl Expr {
    /// Structural equality ignoring `Paren` wrapper nodes, used to compare
    /// an AST against one produced by re-parsing its `Display` output
    /// (spec.md §8: `parse(e).to_string()` re-parses to an equal AST).
    pub fn semantically_eq(&self, other: &Expr) -> bool {
        fn strip(e: &Expr) -> &Expr {
            match e {
                Expr::Paren(inner) => strip(inner),
                other => other,
            }
        }
        match (strip(self), strip(other)) {
            (Expr::Not(a), Expr::Not(b)) => a.semantically_eq(b),
            (Expr::And(a1, b1), Expr::And(a2, b2)) => {
                a1.semantically_eq(a2) && b1.semantically_eq(b2)
            }
            (Expr::Or(a1, b1), Expr::Or(a2, b2)) => {
                a1.semantically_eq(a2) && b1.semantically_eq(b2)
            }
            (Expr::Cmp(op1, a1, b1), Expr::Cmp(op2, a2, b2)) => {
                op1 == op2 && a1.semantically_eq(a2) && b1.semantically_eq(b2)
            }
            (Expr::Identifier(a), Expr::Identifier(b)) => a == b,
            (Expr::StringLit(a), Expr::StringLit(b)) => a == b,
            (Expr::NumberLit(a), Expr::NumberLit(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Paren(inner) => write!(f, "({inner})"),
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::And(a, b) => write!(f, "{a} AND {b}"),
            Expr::Or(a, b) => write!(f, "{a} OR {b}"),
            Expr::Cmp(op, a, b) => write!(f, "{a} {} {b}", op.as_str()),
            Expr::Identifier(name) => write!(f, "{name}"),
            Expr::StringLit(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            Expr::NumberLit(n) => write!(f, "{n}"),
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{pos}: {message}")]
pub struct QueryError {
    pub pos: usize,
    pub message: String,
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        let tokens: Vec<Token> = scanner::tokenize(input)
            .into_iter()
            .filter(|t| t.kind != TokenKind::Whitespace)
            .collect();
        Self { tokens, idx: 0 }
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.idx]
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens[self.idx].clone();
        if self.idx + 1 < self.tokens.len() {
            self.idx += 1;
        }
        t
    }

    fn err(&self, message: impl Into<String>) -> QueryError {
        QueryError {
            pos: self.peek().pos,
            message: message.into(),
        }
    }

    fn describe(tok: &Token) -> String {
        if tok.kind == TokenKind::Eof {
            "end of input".to_string()
        } else {
            tok.lexeme.clone()
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, QueryError> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_and()?;
        while self.peek().kind == TokenKind::Or {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, QueryError> {
        let mut left = self.parse_not()?;
        while self.peek().kind == TokenKind::And {
            self.advance();
            let right = self.parse_not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_not(&mut self) -> Result<Expr, QueryError> {
        if self.peek().kind == TokenKind::Not {
            self.advance();
            let inner = self.parse_not()?;
            return Ok(Expr::Not(Box::new(inner)));
        }
        self.parse_cmp()
    }

    fn parse_cmp(&mut self) -> Result<Expr, QueryError> {
        let left = self.parse_atom()?;
        let op = match self.peek().kind {
            TokenKind::CmpEq => CmpOp::Eq,
            TokenKind::CmpNe => CmpOp::Ne,
            TokenKind::CmpGt => CmpOp::Gt,
            TokenKind::CmpGe => CmpOp::Ge,
            TokenKind::CmpLt => CmpOp::Lt,
            TokenKind::CmpLe => CmpOp::Le,
            TokenKind::CmpGlob => CmpOp::Glob,
            TokenKind::CmpRegexp => CmpOp::Regexp,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_atom()?;
        Ok(Expr::Cmp(op, Box::new(left), Box::new(right)))
    }

    fn parse_atom(&mut self) -> Result<Expr, QueryError> {
        let tok = self.peek().clone();
        match tok.kind {
            TokenKind::Lparen => {
                self.advance();
                let inner = self.parse_expr()?;
                if self.peek().kind != TokenKind::Rparen {
                    let found = Self::describe(self.peek());
                    return Err(self.err(format!("Expected ')' but found: {found}")));
                }
                self.advance();
                Ok(Expr::Paren(Box::new(inner)))
            }
            TokenKind::Identifier => {
                self.advance();
                Ok(Expr::Identifier(tok.lexeme))
            }
            TokenKind::Number => {
                self.advance();
                let n: f64 = tok.lexeme.parse().map_err(|_| {
                    self.err(format!("Invalid number literal: {}", tok.lexeme))
                })?;
                Ok(Expr::NumberLit(n))
            }
            TokenKind::String => {
                self.advance();
                Ok(Expr::StringLit(scanner::unescape_string(&tok.lexeme)))
            }
            _ => {
                let found = Self::describe(&tok);
                Err(self.err(format!(
                    "Expected Identifier, String or Number but found: {found}"
                )))
            }
        }
    }

    fn parse_top_level(&mut self) -> Result<Expr, QueryError> {
        let expr = self.parse_expr()?;
        if self.peek().kind != TokenKind::Eof {
            // Any leftover token at this position that isn't an operator
            // the climbers above consume is, by construction, something
            // we expected an operator to continue with.
            let found = Self::describe(self.peek());
            return Err(self.err(format!("Expected operator but found: {found}")));
        }
        Ok(expr)
    }
}

pub fn parse(input: &str) -> Result<Expr, QueryError> {
    let mut parser = Parser::new(input);
    parser.parse_top_level()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precedence_and_binds_tighter_than_or() {
        let expr = parse("A AND B OR C AND D").unwrap();
        let expected = Expr::Or(
            Box::new(Expr::And(
                Box::new(Expr::Identifier("A".into())),
                Box::new(Expr::Identifier("B".into())),
            )),
            Box::new(Expr::And(
                Box::new(Expr::Identifier("C".into())),
                Box::new(Expr::Identifier("D".into())),
            )),
        );
        assert!(expr.semantically_eq(&expected));
    }

    #[test]
    fn not_binds_tighter_than_and() {
        let expr = parse("NOT A AND B").unwrap();
        let expected = Expr::And(
            Box::new(Expr::Not(Box::new(Expr::Identifier("A".into())))),
            Box::new(Expr::Identifier("B".into())),
        );
        assert!(expr.semantically_eq(&expected));
    }

    #[test]
    fn comparisons_bind_tighter_than_and() {
        let expr = parse("A = 1 AND B = 2").unwrap();
        let expected = Expr::And(
            Box::new(Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Identifier("A".into())),
                Box::new(Expr::NumberLit(1.0)),
            )),
            Box::new(Expr::Cmp(
                CmpOp::Eq,
                Box::new(Expr::Identifier("B".into())),
                Box::new(Expr::NumberLit(2.0)),
            )),
        );
        assert!(expr.semantically_eq(&expected));
    }

    #[test]
    fn round_trip_through_display_preserves_meaning() {
        for src in [
            "A AND B OR C",
            "NOT (A OR B)",
            "AuthorName GLOB \"*Smith*\"",
            "ParentCount >= 2",
        ] {
            let expr = parse(src).unwrap();
            let printed = expr.to_string();
            let reparsed = parse(&printed).unwrap();
            assert!(
                expr.semantically_eq(&reparsed),
                "round trip mismatch for {src}: printed as {printed}"
            );
        }
    }

    #[test]
    fn missing_close_paren_reports_position() {
        let err = parse("(A AND B").unwrap_err();
        assert!(err.message.starts_with("Expected ')' but found:"));
    }

    #[test]
    fn missing_atom_reports_position() {
        let err = parse("A AND").unwrap_err();
        assert!(err
            .message
            .starts_with("Expected Identifier, String or Number but found:"));
    }
}

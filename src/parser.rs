use std::fmt;
use std::rc::Rc;

use crate::error::{LispError, Result};
pub use crate::lexer::{Literal, NumericLiteral};
use crate::lexer::{Token, TokenKind, LR};

#[derive(Debug, PartialEq)]
pub struct Ast {
    pub expressions: Vec<Sexpr>,
}

/// A parsed expression. Lists are reference counted so the evaluator can hold
/// on to sub-expressions (lambda bodies, tail positions) without deep copies.
#[derive(Debug, PartialEq, Clone)]
pub enum Sexpr {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Symbol(String),
    List(Rc<[Sexpr]>),
    Quote(Box<Sexpr>),
}

impl Sexpr {
    pub fn list(items: Vec<Sexpr>) -> Sexpr {
        Sexpr::List(items.into())
    }

    pub fn symbol(name: &str) -> Sexpr {
        Sexpr::Symbol(name.to_string())
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match self {
            Sexpr::Symbol(s) => Some(s),
            _ => None,
        }
    }
}

/// Deepest list or quote nesting accepted in source text.
pub const MAX_NESTING: usize = 1_000;

fn parse_list(rest_tokens: &[Token], open_line: usize, depth: usize) -> Result<(Vec<Sexpr>, usize)> {
    let mut list = vec![];

    let mut i = 0;
    loop {
        match rest_tokens.get(i) {
            None => return Err(LispError::syntax(open_line, "unclosed '('")),
            Some(token) if token.kind == TokenKind::Parenthesis(LR::Right) => {
                i += 1;
                break;
            }
            Some(_) => {
                let (sexpr, i_diff) = parse_nested(&rest_tokens[i..], depth)?;
                list.push(sexpr);
                i += i_diff;
            }
        }
    }

    Ok((list, i))
}

/// Parses one expression from the front of `rest_tokens`, returning it along
/// with the number of tokens consumed.
pub fn parse_sexpr(rest_tokens: &[Token]) -> Result<(Sexpr, usize)> {
    parse_nested(rest_tokens, 0)
}

fn parse_nested(rest_tokens: &[Token], depth: usize) -> Result<(Sexpr, usize)> {
    let first = rest_tokens
        .first()
        .ok_or_else(|| LispError::syntax(1, "unexpected end of input"))?;

    match &first.kind {
        TokenKind::Parenthesis(LR::Left) | TokenKind::Quote if depth >= MAX_NESTING => Err(
            LispError::syntax(first.line, format!("nesting deeper than {}", MAX_NESTING)),
        ),
        TokenKind::Parenthesis(LR::Left) => {
            let (sexprs, i_diff) = stacker::maybe_grow(64 * 1024, 1024 * 1024, || {
                parse_list(&rest_tokens[1..], first.line, depth + 1)
            })?;
            Ok((Sexpr::list(sexprs), i_diff + 1))
        }
        TokenKind::Parenthesis(LR::Right) => Err(LispError::syntax(first.line, "unexpected ')'")),
        TokenKind::Quote => {
            if rest_tokens.len() < 2 {
                return Err(LispError::syntax(first.line, "nothing to quote after '"));
            }
            let (quoted, i_diff) = parse_nested(&rest_tokens[1..], depth + 1)?;
            Ok((Sexpr::Quote(Box::new(quoted)), i_diff + 1))
        }
        TokenKind::Literal(lit) => {
            let sexpr = match lit {
                Literal::Numeric(NumericLiteral::Int(i)) => Sexpr::Int(*i),
                Literal::Numeric(NumericLiteral::Float(f)) => Sexpr::Float(*f),
                Literal::String(s) => Sexpr::Str(s.clone()),
                Literal::Boolean(b) => Sexpr::Bool(*b),
            };
            Ok((sexpr, 1))
        }
        TokenKind::Symbol(sym) => Ok((Sexpr::Symbol(sym.clone()), 1)),
    }
}

/// Parses every top-level expression in `tokens`.
pub fn parse(tokens: &[Token]) -> Result<Ast> {
    let mut expressions = vec![];
    let mut i = 0;
    while i < tokens.len() {
        let (sexpr, i_diff) = parse_sexpr(&tokens[i..])?;
        expressions.push(sexpr);
        i += i_diff;
    }
    Ok(Ast { expressions })
}

/// Parses exactly one expression; trailing tokens are an error.
pub fn parse_one(tokens: &[Token]) -> Result<Sexpr> {
    let (sexpr, consumed) = parse_sexpr(tokens)?;
    match tokens.get(consumed) {
        None => Ok(sexpr),
        Some(extra) => Err(LispError::syntax(
            extra.line,
            "expected a single expression",
        )),
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sexpr::Int(i) => write!(f, "{}", i),
            Sexpr::Float(fl) => write!(f, "{:?}", fl),
            Sexpr::Bool(true) => write!(f, "#t"),
            Sexpr::Bool(false) => write!(f, "#f"),
            Sexpr::Str(s) => write!(f, "\"{}\"", s),
            Sexpr::Symbol(s) => write!(f, "{}", s),
            Sexpr::Quote(inner) => write!(f, "'{}", inner),
            Sexpr::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

use crate::error::{LispError, Result};

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum LR {
    Left,
    Right,
}

#[derive(Debug, PartialEq, Clone, Copy)]
pub enum NumericLiteral {
    Float(f64),
    Int(i64),
}

#[derive(Debug, PartialEq, Clone)]
pub enum Literal {
    Numeric(NumericLiteral),
    String(String),
    Boolean(bool),
}

#[derive(Debug, PartialEq, Clone)]
pub enum TokenKind {
    Parenthesis(LR),
    Quote,
    Literal(Literal),
    Symbol(String),
}

#[derive(Debug, PartialEq, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub line: usize,
}

impl Token {
    fn new(kind: TokenKind, line: usize) -> Token {
        Token { kind, line }
    }

    /// Resolves a run of non-delimiter characters to a number, boolean, or symbol.
    fn from_atom(s: &str, line: usize) -> Token {
        let kind = match s {
            "#t" | "true" => TokenKind::Literal(Literal::Boolean(true)),
            "#f" | "false" => TokenKind::Literal(Literal::Boolean(false)),
            _ if looks_numeric(s) => {
                if let Ok(i) = s.parse::<i64>() {
                    TokenKind::Literal(Literal::Numeric(NumericLiteral::Int(i)))
                } else if let Ok(f) = s.parse::<f64>() {
                    TokenKind::Literal(Literal::Numeric(NumericLiteral::Float(f)))
                } else {
                    TokenKind::Symbol(s.to_string())
                }
            }
            _ => TokenKind::Symbol(s.to_string()),
        };
        Token::new(kind, line)
    }
}

// `nan`, `inf`, `-` and `+` must stay symbols even though `f64::from_str` accepts some of them.
fn looks_numeric(s: &str) -> bool {
    let body = s.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(s);
    let body = body.strip_prefix('.').unwrap_or(body);
    body.starts_with(|c: char| c.is_ascii_digit())
}

fn is_delimiter(c: char) -> bool {
    c.is_whitespace() || ['(', ')', ';', '"', '\''].contains(&c)
}

enum LexerState {
    None,
    Atom(String),
    StringLiteral { value: String, line: usize }, // no escaping
    Comment,
}

pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut state = LexerState::None;
    let mut tokens: Vec<Token> = vec![];
    let mut line = 1;

    let chars = source.chars().collect::<Vec<_>>();

    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];

        match state {
            LexerState::Comment => {
                if c == '\n' {
                    line += 1;
                    state = LexerState::None;
                }
                i += 1;
            }
            LexerState::StringLiteral { ref mut value, .. } => {
                if c == '"' {
                    tokens.push(Token::new(
                        TokenKind::Literal(Literal::String(std::mem::take(value))),
                        line,
                    ));
                    state = LexerState::None;
                } else {
                    if c == '\n' {
                        line += 1;
                    }
                    value.push(c);
                }
                i += 1;
            }
            LexerState::Atom(ref mut s) => {
                // the delimiter is left for the `None` state to handle
                if is_delimiter(c) {
                    tokens.push(Token::from_atom(s, line));
                    state = LexerState::None;
                } else {
                    s.push(c);
                    i += 1;
                }
            }
            LexerState::None => {
                match c {
                    '(' => tokens.push(Token::new(TokenKind::Parenthesis(LR::Left), line)),
                    ')' => tokens.push(Token::new(TokenKind::Parenthesis(LR::Right), line)),
                    '\'' => tokens.push(Token::new(TokenKind::Quote, line)),
                    ';' => state = LexerState::Comment,
                    '"' => {
                        state = LexerState::StringLiteral {
                            value: String::new(),
                            line,
                        }
                    }
                    '\n' => line += 1,
                    c if c.is_whitespace() => {}
                    c => state = LexerState::Atom(c.to_string()),
                }
                i += 1;
            }
        }
    }

    match state {
        LexerState::Atom(s) => tokens.push(Token::from_atom(&s, line)),
        LexerState::StringLiteral { line, .. } => {
            return Err(LispError::syntax(line, "unterminated string literal"));
        }
        LexerState::None | LexerState::Comment => (),
    }

    Ok(tokens)
}

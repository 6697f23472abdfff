use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LispError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("name error: {0}")]
    Name(String),

    #[error("evaluation error: {0}")]
    Evaluation(String),

    #[error("recursion limit of {0} exceeded")]
    RecursionLimit(usize),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid config: {0}")]
    Config(#[from] toml::de::Error),
}

impl LispError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        LispError::Syntax {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn eval(message: impl Into<String>) -> Self {
        LispError::Evaluation(message.into())
    }
}

pub type Result<T> = std::result::Result<T, LispError>;

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::rc::Rc;

use log::debug;

use crate::config::Config;
use crate::error::Result;
use crate::evaluator::Evaluator;
use crate::frame::Frame;
use crate::lexer::{tokenize, TokenKind, LR};
use crate::parser::{parse, Ast, Sexpr};
use crate::value::Value;

/// `map`, `filter` and `reduce`, written in Lisp.
pub const PRELUDE: &str = include_str!("prelude.lisp");

/// A global frame plus the evaluator that runs code in it. Definitions
/// persist across calls.
#[derive(Debug)]
pub struct Session {
    evaluator: Evaluator,
    global: Rc<Frame>,
}

impl Session {
    pub fn new() -> Result<Session> {
        Session::with_config(&Config::default())
    }

    pub fn with_config(config: &Config) -> Result<Session> {
        let session = Session {
            evaluator: Evaluator::new(config.max_depth),
            global: Frame::global(),
        };
        if config.prelude {
            debug!("loading prelude");
            session.eval_str(PRELUDE)?;
        }
        Ok(session)
    }

    /// Evaluates every expression in `source` and returns the last value
    /// (`()` when there is none).
    pub fn eval_str(&self, source: &str) -> Result<Value> {
        let tokens = tokenize(source)?;
        let ast = parse(&tokens)?;
        self.eval_ast(&ast)
    }

    pub fn eval_ast(&self, ast: &Ast) -> Result<Value> {
        let mut last = Value::nil();
        for expr in &ast.expressions {
            last = self.eval(expr)?;
        }
        Ok(last)
    }

    pub fn eval(&self, expr: &Sexpr) -> Result<Value> {
        self.evaluator.eval(expr, &self.global)
    }

    pub fn run_file(&self, path: impl AsRef<Path>) -> Result<Value> {
        let path = path.as_ref();
        debug!("running {}", path.display());
        let source = fs::read_to_string(path)?;
        self.eval_str(&source)
    }

    pub fn define(&self, name: &str, value: Value) {
        self.global.define(name, value);
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.global.lookup(name)
    }

    /// Calls the procedure bound to `name` with `args`.
    pub fn call(&self, name: &str, args: Vec<Value>) -> Result<Value> {
        let procedure = self.lookup(name)?;
        self.evaluator.apply(&procedure, args)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // functions defined at top level capture the global frame
        self.global.clear();
    }
}

/// True once every `(` has a matching `)` and no string is left open.
fn is_complete(source: &str) -> bool {
    match tokenize(source) {
        Ok(tokens) => {
            let depth = tokens.iter().fold(0i64, |depth, token| match token.kind {
                TokenKind::Parenthesis(LR::Left) => depth + 1,
                TokenKind::Parenthesis(LR::Right) => depth - 1,
                _ => depth,
            });
            depth <= 0
        }
        Err(_) => false,
    }
}

/// Reads expressions from `input` until EOF or `quit`, printing each result
/// (or error) to `output`. Input is buffered across lines until parentheses balance.
pub fn repl<R: BufRead, W: Write>(
    session: &Session,
    input: R,
    mut output: W,
    prompt: &str,
) -> io::Result<()> {
    let mut buffer = String::new();

    write!(output, "{}", prompt)?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;
        if buffer.is_empty() && matches!(line.trim(), "quit" | "(exit)") {
            return Ok(());
        }

        buffer.push_str(&line);
        buffer.push('\n');
        if !is_complete(&buffer) {
            write!(output, "{}", ".".repeat(prompt.trim_end().len().max(1)) + " ")?;
            output.flush()?;
            continue;
        }

        if !buffer.trim().is_empty() {
            match session.eval_str(&buffer) {
                Ok(value) => writeln!(output, "{}", value)?,
                Err(e) => writeln!(output, "error: {}", e)?,
            }
        }
        buffer.clear();

        write!(output, "{}", prompt)?;
        output.flush()?;
    }

    writeln!(output)?;
    Ok(())
}

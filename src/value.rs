use std::fmt;
use std::rc::Rc;

use crate::builtins::BuiltIn;
use crate::error::{LispError, Result};
use crate::frame::Frame;
use crate::list::{Iter, List};
use crate::parser::Sexpr;

/// A user-defined procedure together with the frame it closes over.
pub struct Lambda {
    pub name: Option<String>,
    pub parameters: Vec<String>,
    pub body: Rc<[Sexpr]>,
    pub frame: Rc<Frame>,
}

impl Lambda {
    /// Creates the call frame for `args`, a child of the captured frame.
    pub fn bind(&self, args: Vec<Value>) -> Result<Rc<Frame>> {
        if args.len() != self.parameters.len() {
            return Err(LispError::eval(format!(
                "{} expects {} argument(s), got {}",
                self.describe(),
                self.parameters.len(),
                args.len()
            )));
        }

        let frame = Frame::child(&self.frame);
        for (parameter, arg) in self.parameters.iter().zip(args) {
            frame.define(parameter.clone(), arg);
        }
        Ok(frame)
    }

    fn describe(&self) -> String {
        match &self.name {
            Some(name) => format!("<function {}>", name),
            None => "<function>".to_string(),
        }
    }
}

// The captured frame is left out: it usually contains this lambda.
impl fmt::Debug for Lambda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lambda")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Symbol(String),
    List(List<Value>),
    Lambda(Rc<Lambda>),
    BuiltIn(BuiltIn),
}

impl Value {
    /// The empty list, bound to `nil` in every session.
    pub fn nil() -> Value {
        Value::List(List::new())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    /// Only `#f` is false.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Bool(false))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::List(list) if list.is_empty())
    }

    pub fn as_list(&self) -> Option<&List<Value>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Bool(_) => "boolean",
            Value::Str(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::List(_) => "list",
            Value::Lambda(_) | Value::BuiltIn(_) => "procedure",
        }
    }

    /// Converts quoted source into data without evaluating it.
    pub fn from_datum(datum: &Sexpr) -> Value {
        match datum {
            Sexpr::Int(i) => Value::Int(*i),
            Sexpr::Float(f) => Value::Float(*f),
            Sexpr::Bool(b) => Value::Bool(*b),
            Sexpr::Str(s) => Value::Str(s.clone()),
            Sexpr::Symbol(s) => Value::Symbol(s.clone()),
            Sexpr::List(items) => Value::list(items.iter().map(Value::from_datum)),
            Sexpr::Quote(inner) => Value::list([
                Value::Symbol("quote".to_string()),
                Value::from_datum(inner),
            ]),
        }
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<List<Value>> for Value {
    fn from(list: List<Value>) -> Self {
        Value::List(list)
    }
}

impl Value {
    /// Equality for everything except lists.
    fn atom_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Rc::ptr_eq(a, b),
            (Value::BuiltIn(a), Value::BuiltIn(b)) => a == b,
            _ => false,
        }
    }

    fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{:?}", fl),
            Value::Bool(true) => write!(f, "#t"),
            Value::Bool(false) => write!(f, "#f"),
            Value::Str(s) => write!(f, "\"{}\"", s),
            Value::Symbol(s) => write!(f, "{}", s),
            Value::List(_) => write!(f, "(...)"),
            Value::Lambda(lambda) => write!(f, "{}", lambda.describe()),
            Value::BuiltIn(builtin) => write!(f, "<builtin {}>", builtin.symbol),
        }
    }
}

/// Structural equality, as used by `equal?`. Procedures compare by identity
/// and `1` is not `equal?` to `1.0`.
///
/// Nested lists are walked with an explicit stack, so arbitrarily deep values
/// compare without recursion.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        let mut pending: Vec<(Iter<'_, Value>, Iter<'_, Value>)> = Vec::new();
        let (mut a, mut b): (&Value, &Value) = (self, other);
        loop {
            match (a, b) {
                (Value::List(xs), Value::List(ys)) => {
                    if !xs.ptr_eq(ys) {
                        pending.push((xs.iter(), ys.iter()));
                    }
                }
                _ => {
                    if !a.atom_eq(b) {
                        return false;
                    }
                }
            }

            loop {
                let Some((xs, ys)) = pending.last_mut() else {
                    return true;
                };
                match (xs.next(), ys.next()) {
                    (Some(x), Some(y)) => {
                        a = x;
                        b = y;
                        break;
                    }
                    (None, None) => {
                        pending.pop();
                    }
                    _ => return false,
                }
            }
        }
    }
}

enum Pending<'a> {
    Value(&'a Value),
    Items { rest: Iter<'a, Value>, first: bool },
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut stack = vec![Pending::Value(self)];
        while let Some(next) = stack.pop() {
            match next {
                Pending::Value(Value::List(list)) => {
                    write!(f, "(")?;
                    stack.push(Pending::Items {
                        rest: list.iter(),
                        first: true,
                    });
                }
                Pending::Value(atom) => atom.fmt_atom(f)?,
                Pending::Items { mut rest, first } => match rest.next() {
                    Some(item) => {
                        if !first {
                            write!(f, " ")?;
                        }
                        stack.push(Pending::Items { rest, first: false });
                        stack.push(Pending::Value(item));
                    }
                    None => write!(f, ")")?,
                },
            }
        }
        Ok(())
    }
}

// `List` only unlinks along tails; nested lists in head position are moved
// onto a work stack here so dropping deep nesting does not recurse.
impl Drop for Value {
    fn drop(&mut self) {
        let Value::List(list) = self else {
            return;
        };
        if list.is_empty() {
            return;
        }

        let mut stack = vec![std::mem::take(list)];
        while let Some(mut list) = stack.pop() {
            while let Some(mut head) = list.pop_unique() {
                if let Value::List(inner) = &mut head {
                    if !inner.is_empty() {
                        stack.push(std::mem::take(inner));
                    }
                }
            }
        }
    }
}

use std::cmp::Ordering;
use std::fmt;
use std::io::{self, Write};

use crate::error::{LispError, Result};
use crate::list::List;
use crate::value::Value;

#[derive(Clone, Copy)]
pub struct BuiltIn {
    pub symbol: &'static str,
    eval: fn(&[Value]) -> Result<Value>,
}

impl BuiltIn {
    pub fn call(&self, args: &[Value]) -> Result<Value> {
        (self.eval)(args)
    }
}

impl PartialEq for BuiltIn {
    fn eq(&self, other: &Self) -> bool {
        self.symbol == other.symbol
    }
}

impl fmt::Debug for BuiltIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BuiltIn({})", self.symbol)
    }
}

fn expect_arity(symbol: &str, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(LispError::eval(format!(
            "{} expects {} argument(s), got {}",
            symbol,
            n,
            args.len()
        )));
    }
    Ok(())
}

fn expect_list<'a>(symbol: &str, value: &'a Value) -> Result<&'a List<Value>> {
    value.as_list().ok_or_else(|| {
        LispError::eval(format!("{} expects a list, got {} {}", symbol, value.type_name(), value))
    })
}

#[derive(Debug, Clone, Copy)]
enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    fn from_value(symbol: &str, value: &Value) -> Result<Number> {
        match value {
            Value::Int(i) => Ok(Number::Int(*i)),
            Value::Float(f) => Ok(Number::Float(*f)),
            other => Err(LispError::eval(format!(
                "{} expects numbers, got {} {}",
                symbol,
                other.type_name(),
                other
            ))),
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Number::Int(i) => i as f64,
            Number::Float(f) => f,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }

    fn partial_cmp(self, other: Number) -> Option<Ordering> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Some(a.cmp(&b)),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        }
    }
}

fn overflow(symbol: &str) -> LispError {
    LispError::eval(format!("integer overflow in {}", symbol))
}

fn add(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_add(y).map(Number::Int).ok_or_else(|| overflow("+")),
        (x, y) => Ok(Number::Float(x.as_f64() + y.as_f64())),
    }
}

fn sub(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_sub(y).map(Number::Int).ok_or_else(|| overflow("-")),
        (x, y) => Ok(Number::Float(x.as_f64() - y.as_f64())),
    }
}

fn mul(a: Number, b: Number) -> Result<Number> {
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => x.checked_mul(y).map(Number::Int).ok_or_else(|| overflow("*")),
        (x, y) => Ok(Number::Float(x.as_f64() * y.as_f64())),
    }
}

/// Integer division stays integral only when it is exact.
fn div(a: Number, b: Number) -> Result<Number> {
    if b.as_f64() == 0.0 {
        return Err(LispError::eval("division by zero"));
    }
    match (a, b) {
        (Number::Int(x), Number::Int(y)) => match x.checked_rem(y) {
            Some(0) => x.checked_div(y).map(Number::Int).ok_or_else(|| overflow("/")),
            Some(_) => Ok(Number::Float(x as f64 / y as f64)),
            None => Err(overflow("/")),
        },
        (x, y) => Ok(Number::Float(x.as_f64() / y.as_f64())),
    }
}

fn fold_numbers(
    symbol: &str,
    args: &[Value],
    init: Number,
    op: fn(Number, Number) -> Result<Number>,
) -> Result<Value> {
    args.iter()
        .try_fold(init, |acc, arg| op(acc, Number::from_value(symbol, arg)?))
        .map(Number::into_value)
}

/// `(- x)` negates and `(/ x)` takes the reciprocal; otherwise the first
/// argument is folded against the rest.
fn fold_from_first(
    symbol: &str,
    args: &[Value],
    identity: Number,
    op: fn(Number, Number) -> Result<Number>,
) -> Result<Value> {
    match args {
        [] => Err(LispError::eval(format!("{} expects at least one argument", symbol))),
        [only] => op(identity, Number::from_value(symbol, only)?).map(Number::into_value),
        [first, rest @ ..] => fold_numbers(symbol, rest, Number::from_value(symbol, first)?, op),
    }
}

/// Chained comparison: every adjacent pair must satisfy `accept`.
fn compare(symbol: &str, args: &[Value], accept: fn(Ordering) -> bool) -> Result<Value> {
    if args.is_empty() {
        return Err(LispError::eval(format!("{} expects at least one argument", symbol)));
    }
    let numbers = args
        .iter()
        .map(|arg| Number::from_value(symbol, arg))
        .collect::<Result<Vec<Number>>>()?;
    let holds = numbers
        .windows(2)
        .all(|pair| pair[0].partial_cmp(pair[1]).map_or(false, accept));
    Ok(Value::Bool(holds))
}

/// Writes `args` space-separated on one line; strings are written without quotes.
fn write_line<W: Write>(mut out: W, args: &[Value]) -> Result<Value> {
    let line = args
        .iter()
        .map(|arg| match arg {
            Value::Str(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(out, "{}", line)?;
    Ok(Value::nil())
}

fn write_values(args: &[Value]) -> Result<Value> {
    write_line(io::stdout().lock(), args)
}

const ADD: BuiltIn = BuiltIn {
    symbol: "+",
    eval: |args| fold_numbers("+", args, Number::Int(0), add),
};

const SUB: BuiltIn = BuiltIn {
    symbol: "-",
    eval: |args| fold_from_first("-", args, Number::Int(0), sub),
};

const MUL: BuiltIn = BuiltIn {
    symbol: "*",
    eval: |args| fold_numbers("*", args, Number::Int(1), mul),
};

const DIV: BuiltIn = BuiltIn {
    symbol: "/",
    eval: |args| fold_from_first("/", args, Number::Int(1), div),
};

const EQ: BuiltIn = BuiltIn {
    symbol: "=",
    eval: |args| compare("=", args, |o| o == Ordering::Equal),
};

const LT: BuiltIn = BuiltIn {
    symbol: "<",
    eval: |args| compare("<", args, |o| o == Ordering::Less),
};

const GT: BuiltIn = BuiltIn {
    symbol: ">",
    eval: |args| compare(">", args, |o| o == Ordering::Greater),
};

const LE: BuiltIn = BuiltIn {
    symbol: "<=",
    eval: |args| compare("<=", args, |o| o != Ordering::Greater),
};

const GE: BuiltIn = BuiltIn {
    symbol: ">=",
    eval: |args| compare(">=", args, |o| o != Ordering::Less),
};

const EQUAL: BuiltIn = BuiltIn {
    symbol: "equal?",
    eval: |args| {
        expect_arity("equal?", args, 2)?;
        Ok(Value::Bool(args[0] == args[1]))
    },
};

const NOT: BuiltIn = BuiltIn {
    symbol: "not",
    eval: |args| {
        expect_arity("not", args, 1)?;
        Ok(Value::Bool(!args[0].is_truthy()))
    },
};

const CONS: BuiltIn = BuiltIn {
    symbol: "cons",
    eval: |args| {
        expect_arity("cons", args, 2)?;
        let tail = expect_list("cons", &args[1])?;
        Ok(Value::List(List::cons(args[0].clone(), tail.clone())))
    },
};

const CAR: BuiltIn = BuiltIn {
    symbol: "car",
    eval: |args| {
        expect_arity("car", args, 1)?;
        expect_list("car", &args[0])?
            .first()
            .cloned()
            .ok_or_else(|| LispError::eval("car of empty list"))
    },
};

const CDR: BuiltIn = BuiltIn {
    symbol: "cdr",
    eval: |args| {
        expect_arity("cdr", args, 1)?;
        expect_list("cdr", &args[0])?
            .rest()
            .map(Value::List)
            .ok_or_else(|| LispError::eval("cdr of empty list"))
    },
};

const LIST: BuiltIn = BuiltIn {
    symbol: "list",
    eval: |args| Ok(Value::list(args.iter().cloned())),
};

const IS_NULL: BuiltIn = BuiltIn {
    symbol: "null?",
    eval: |args| {
        expect_arity("null?", args, 1)?;
        Ok(Value::Bool(args[0].is_nil()))
    },
};

const IS_EMPTY: BuiltIn = BuiltIn {
    symbol: "empty?",
    eval: |args| {
        expect_arity("empty?", args, 1)?;
        Ok(Value::Bool(args[0].is_nil()))
    },
};

const IS_LIST: BuiltIn = BuiltIn {
    symbol: "list?",
    eval: |args| {
        expect_arity("list?", args, 1)?;
        Ok(Value::Bool(args[0].as_list().is_some()))
    },
};

const LENGTH: BuiltIn = BuiltIn {
    symbol: "length",
    eval: |args| {
        expect_arity("length", args, 1)?;
        let len = expect_list("length", &args[0])?.len();
        i64::try_from(len)
            .map(Value::Int)
            .map_err(|_| overflow("length"))
    },
};

const LIST_REF: BuiltIn = BuiltIn {
    symbol: "list-ref",
    eval: |args| {
        expect_arity("list-ref", args, 2)?;
        let list = expect_list("list-ref", &args[0])?;
        let index = match &args[1] {
            Value::Int(i) => usize::try_from(*i).ok(),
            other => {
                return Err(LispError::eval(format!(
                    "list-ref expects an integer index, got {}",
                    other
                )))
            }
        };
        index
            .and_then(|i| list.get(i))
            .cloned()
            .ok_or_else(|| LispError::eval(format!("list-ref index {} out of range", args[1])))
    },
};

const APPEND: BuiltIn = BuiltIn {
    symbol: "append",
    eval: |args| {
        let lists = args
            .iter()
            .map(|arg| expect_list("append", arg))
            .collect::<Result<Vec<&List<Value>>>>()?;
        let joined = lists
            .into_iter()
            .rev()
            .fold(List::new(), |tail, front| front.append(&tail));
        Ok(Value::List(joined))
    },
};

const REVERSE: BuiltIn = BuiltIn {
    symbol: "reverse",
    eval: |args| {
        expect_arity("reverse", args, 1)?;
        Ok(Value::List(expect_list("reverse", &args[0])?.reverse()))
    },
};

const PRINT: BuiltIn = BuiltIn {
    symbol: "print",
    eval: write_values,
};

const DISPLAY: BuiltIn = BuiltIn {
    symbol: "display",
    eval: write_values,
};

pub const BUILTINS: [BuiltIn; 24] = [
    ADD, SUB, MUL, DIV, EQ, LT, GT, LE, GE, EQUAL, NOT, CONS, CAR, CDR, LIST, IS_NULL, IS_EMPTY,
    IS_LIST, LENGTH, LIST_REF, APPEND, REVERSE, PRINT, DISPLAY,
];

#[cfg(test)]
mod tests {
    use super::*;

    fn ints(items: &[i64]) -> Value {
        Value::list(items.iter().map(|i| Value::Int(*i)))
    }

    #[test]
    fn test_add_and_mul() {
        assert_eq!(ADD.call(&[]).unwrap(), Value::Int(0));
        assert_eq!(ADD.call(&[Value::Int(1), Value::Int(2)]).unwrap(), Value::Int(3));
        assert_eq!(ADD.call(&[Value::Int(1), Value::Float(0.5)]).unwrap(), Value::Float(1.5));
        assert_eq!(
            MUL.call(&[Value::Int(1), Value::Int(2), Value::Int(-3)]).unwrap(),
            Value::Int(-6)
        );
    }

    #[test]
    fn test_sub() {
        assert_eq!(SUB.call(&[Value::Int(5)]).unwrap(), Value::Int(-5));
        assert_eq!(
            SUB.call(&[Value::Int(3), Value::Int(1), Value::Int(1)]).unwrap(),
            Value::Int(1)
        );
        assert!(SUB.call(&[]).is_err());
    }

    #[test]
    fn test_div() {
        assert_eq!(DIV.call(&[Value::Int(6), Value::Int(3)]).unwrap(), Value::Int(2));
        assert_eq!(DIV.call(&[Value::Int(7), Value::Int(2)]).unwrap(), Value::Float(3.5));
        assert_eq!(DIV.call(&[Value::Int(4)]).unwrap(), Value::Float(0.25));
        assert!(DIV.call(&[Value::Int(1), Value::Int(0)]).is_err());
        assert!(DIV.call(&[Value::Float(1.0), Value::Float(0.0)]).is_err());
        assert!(DIV.call(&[Value::Int(i64::MIN), Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_overflow_is_an_error() {
        assert!(ADD.call(&[Value::Int(i64::MAX), Value::Int(1)]).is_err());
        assert!(MUL.call(&[Value::Int(i64::MAX), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_non_numbers_are_rejected() {
        let err = ADD.call(&[Value::Int(1), Value::Bool(true)]).unwrap_err();
        assert!(err.to_string().contains("expects numbers"));
    }

    #[test]
    fn test_comparisons_chain() {
        let args = [Value::Int(1), Value::Int(2), Value::Float(2.5)];
        assert_eq!(LT.call(&args).unwrap(), Value::Bool(true));
        assert_eq!(GT.call(&args).unwrap(), Value::Bool(false));
        assert_eq!(
            LE.call(&[Value::Int(1), Value::Int(1), Value::Int(2)]).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(EQ.call(&[Value::Int(1), Value::Float(1.0)]).unwrap(), Value::Bool(true));
        assert_eq!(EQ.call(&[Value::Int(3)]).unwrap(), Value::Bool(true));
        assert_eq!(
            GE.call(&[Value::Float(f64::NAN), Value::Int(1)]).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn test_cons() {
        let args = vec![Value::Int(1), ints(&[2, 3])];
        assert_eq!(CONS.call(&args).unwrap(), ints(&[1, 2, 3]));
        assert!(CONS.call(&[Value::Int(1), Value::Int(2)]).is_err());
    }

    #[test]
    fn test_car_cdr() {
        assert_eq!(CAR.call(&[ints(&[4, 5])]).unwrap(), Value::Int(4));
        assert_eq!(CDR.call(&[ints(&[4, 5])]).unwrap(), ints(&[5]));
        assert!(CAR.call(&[Value::nil()]).is_err());
        assert!(CDR.call(&[Value::nil()]).is_err());
        assert!(CAR.call(&[Value::Int(1)]).is_err());
    }

    #[test]
    fn test_list_predicates() {
        assert_eq!(IS_NULL.call(&[Value::nil()]).unwrap(), Value::Bool(true));
        assert_eq!(IS_NULL.call(&[Value::Int(0)]).unwrap(), Value::Bool(false));
        assert_eq!(IS_EMPTY.call(&[ints(&[1])]).unwrap(), Value::Bool(false));
        assert_eq!(IS_LIST.call(&[Value::nil()]).unwrap(), Value::Bool(true));
        assert_eq!(IS_LIST.call(&[Value::Int(1)]).unwrap(), Value::Bool(false));
    }

    #[test]
    fn test_length_and_list_ref() {
        assert_eq!(LENGTH.call(&[ints(&[1, 2, 3])]).unwrap(), Value::Int(3));
        assert_eq!(
            LIST_REF.call(&[ints(&[7, 8, 9]), Value::Int(1)]).unwrap(),
            Value::Int(8)
        );
        assert!(LIST_REF.call(&[ints(&[7]), Value::Int(1)]).is_err());
        assert!(LIST_REF.call(&[ints(&[7]), Value::Int(-1)]).is_err());
    }

    #[test]
    fn test_append_and_reverse() {
        assert_eq!(
            APPEND.call(&[ints(&[1]), ints(&[]), ints(&[2, 3])]).unwrap(),
            ints(&[1, 2, 3])
        );
        assert_eq!(APPEND.call(&[]).unwrap(), Value::nil());
        assert_eq!(REVERSE.call(&[ints(&[1, 2, 3])]).unwrap(), ints(&[3, 2, 1]));
    }

    #[test]
    fn test_equal_and_not() {
        assert_eq!(EQUAL.call(&[ints(&[1, 2]), ints(&[1, 2])]).unwrap(), Value::Bool(true));
        assert_eq!(EQUAL.call(&[Value::Int(1), Value::Float(1.0)]).unwrap(), Value::Bool(false));
        assert_eq!(NOT.call(&[Value::Bool(false)]).unwrap(), Value::Bool(true));
        assert_eq!(NOT.call(&[Value::nil()]).unwrap(), Value::Bool(false));
    }

    struct ClosedPipe;

    impl Write for ClosedPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::BrokenPipe))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_line() {
        let mut out = Vec::new();
        let args = [Value::Int(1), Value::Str("hi".to_string()), ints(&[2, 3])];
        assert!(write_line(&mut out, &args).unwrap().is_nil());
        assert_eq!(String::from_utf8(out).unwrap(), "1 hi (2 3)\n");
    }

    #[test]
    fn test_write_to_closed_output_is_an_error() {
        assert!(matches!(
            write_line(ClosedPipe, &[Value::Int(1)]),
            Err(LispError::Io(_))
        ));
    }

    #[test]
    fn test_symbols_are_unique() {
        let mut symbols: Vec<&str> = BUILTINS.iter().map(|b| b.symbol).collect();
        symbols.sort();
        symbols.dedup();
        assert_eq!(symbols.len(), BUILTINS.len());
    }
}

use std::cell::Cell;
use std::rc::Rc;

use log::trace;

use crate::error::{LispError, Result};
use crate::frame::Frame;
use crate::parser::Sexpr;
use crate::value::{Lambda, Value};

/// What is left to do after one evaluation step. `Tail` carries an
/// expression in tail position so the caller can loop instead of recursing.
enum Step {
    Done(Value),
    Tail(Sexpr, Rc<Frame>),
}

const RED_ZONE: usize = 128 * 1024;
const STACK_SEGMENT: usize = 2 * 1024 * 1024;

struct DepthGuard<'a>(&'a Cell<usize>);

impl Drop for DepthGuard<'_> {
    fn drop(&mut self) {
        self.0.set(self.0.get() - 1);
    }
}

/// Tree-walking evaluator. Tail calls run in a loop; every other nested
/// evaluation counts against `max_depth`.
#[derive(Debug)]
pub struct Evaluator {
    max_depth: usize,
    depth: Cell<usize>,
}

impl Evaluator {
    pub fn new(max_depth: usize) -> Evaluator {
        Evaluator {
            max_depth,
            depth: Cell::new(0),
        }
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    fn enter(&self) -> Result<DepthGuard<'_>> {
        let depth = self.depth.get();
        if depth >= self.max_depth {
            return Err(LispError::RecursionLimit(self.max_depth));
        }
        self.depth.set(depth + 1);
        Ok(DepthGuard(&self.depth))
    }

    pub fn eval(&self, expr: &Sexpr, frame: &Rc<Frame>) -> Result<Value> {
        let _guard = self.enter()?;
        // the depth counter, not the native stack, decides when recursion stops
        stacker::maybe_grow(RED_ZONE, STACK_SEGMENT, || self.eval_loop(expr, frame))
    }

    fn eval_loop(&self, expr: &Sexpr, frame: &Rc<Frame>) -> Result<Value> {
        let mut expr = expr.clone();
        let mut frame = Rc::clone(frame);
        loop {
            match self.step(&expr, &frame)? {
                Step::Done(value) => return Ok(value),
                Step::Tail(next, next_frame) => {
                    expr = next;
                    frame = next_frame;
                }
            }
        }
    }

    /// Calls `procedure` with already evaluated arguments.
    pub fn apply(&self, procedure: &Value, args: Vec<Value>) -> Result<Value> {
        match self.apply_step(procedure.clone(), args)? {
            Step::Done(value) => Ok(value),
            Step::Tail(expr, frame) => self.eval(&expr, &frame),
        }
    }

    fn step(&self, expr: &Sexpr, frame: &Rc<Frame>) -> Result<Step> {
        let value = match expr {
            Sexpr::Int(i) => Value::Int(*i),
            Sexpr::Float(f) => Value::Float(*f),
            Sexpr::Bool(b) => Value::Bool(*b),
            Sexpr::Str(s) => Value::Str(s.clone()),
            Sexpr::Symbol(name) => frame.lookup(name)?,
            Sexpr::Quote(datum) => Value::from_datum(datum),
            Sexpr::List(items) => return self.step_list(items, frame),
        };
        Ok(Step::Done(value))
    }

    fn step_list(&self, items: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        let Some((head, rest)) = items.split_first() else {
            return Ok(Step::Done(Value::nil()));
        };

        // special forms cannot be shadowed
        if let Some(form) = head.as_symbol() {
            match form {
                "quote" => return eval_quote(rest),
                "define" => return self.eval_define(rest, frame),
                "lambda" => return eval_lambda(rest, frame),
                "if" => return self.eval_if(rest, frame),
                "cond" => return self.eval_cond(rest, frame),
                "and" => return self.eval_and(rest, frame),
                "or" => return self.eval_or(rest, frame),
                "let" => return self.eval_let(rest, frame),
                "begin" => return self.body_step(rest, frame),
                "set!" => return self.eval_set(rest, frame),
                _ => {}
            }
        }

        let procedure = self.eval(head, frame)?;
        let args = rest
            .iter()
            .map(|arg| self.eval(arg, frame))
            .collect::<Result<Vec<Value>>>()?;
        self.apply_step(procedure, args)
    }

    fn apply_step(&self, procedure: Value, args: Vec<Value>) -> Result<Step> {
        match &procedure {
            Value::BuiltIn(builtin) => builtin.call(&args).map(Step::Done),
            Value::Lambda(lambda) => {
                let call_frame = lambda.bind(args)?;
                self.body_step(&lambda.body, &call_frame)
            }
            other => Err(LispError::eval(format!(
                "cannot call {} {}",
                other.type_name(),
                other
            ))),
        }
    }

    /// Evaluates all but the last expression; the last is returned as a tail call.
    fn body_step(&self, body: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        match body.split_last() {
            None => Ok(Step::Done(Value::nil())),
            Some((last, init)) => {
                for expr in init {
                    self.eval(expr, frame)?;
                }
                Ok(Step::Tail(last.clone(), Rc::clone(frame)))
            }
        }
    }

    fn eval_define(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        match rest {
            // (define name value)
            [Sexpr::Symbol(name), value] => {
                let value = self.eval(value, frame)?;
                trace!("define {} = {}", name, value);
                frame.define(name.clone(), value.clone());
                Ok(Step::Done(value))
            }
            // (define (name params...) body...)
            [Sexpr::List(signature), body @ ..] if !body.is_empty() => {
                let (name, params) = signature
                    .split_first()
                    .ok_or_else(|| LispError::eval("define: empty function signature"))?;
                let name = name
                    .as_symbol()
                    .ok_or_else(|| LispError::eval("define: function name must be a symbol"))?;
                let lambda = Value::Lambda(Rc::new(Lambda {
                    name: Some(name.to_string()),
                    parameters: parameter_names(params)?,
                    body: body.into(),
                    frame: Rc::clone(frame),
                }));
                trace!("define {}", lambda);
                frame.define(name, lambda.clone());
                Ok(Step::Done(lambda))
            }
            _ => Err(LispError::eval(
                "define expects (define name value) or (define (name params...) body...)",
            )),
        }
    }

    fn eval_if(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        let (condition, then, otherwise) = match rest {
            [condition, then] => (condition, then, None),
            [condition, then, otherwise] => (condition, then, Some(otherwise)),
            _ => return Err(LispError::eval("if expects 2 or 3 arguments")),
        };

        if self.eval(condition, frame)?.is_truthy() {
            Ok(Step::Tail(then.clone(), Rc::clone(frame)))
        } else {
            match otherwise {
                Some(otherwise) => Ok(Step::Tail(otherwise.clone(), Rc::clone(frame))),
                None => Ok(Step::Done(Value::nil())),
            }
        }
    }

    fn eval_cond(&self, clauses: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        for clause in clauses {
            let Sexpr::List(clause) = clause else {
                return Err(LispError::eval("cond clauses must be lists"));
            };
            let Some((test, body)) = clause.split_first() else {
                return Err(LispError::eval("cond clauses cannot be empty"));
            };

            let result = match test.as_symbol() {
                Some("else") => Value::Bool(true),
                _ => self.eval(test, frame)?,
            };
            if result.is_truthy() {
                if body.is_empty() {
                    return Ok(Step::Done(result));
                }
                return self.body_step(body, frame);
            }
        }
        Ok(Step::Done(Value::nil()))
    }

    fn eval_and(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        for expr in rest {
            if !self.eval(expr, frame)?.is_truthy() {
                return Ok(Step::Done(Value::Bool(false)));
            }
        }
        Ok(Step::Done(Value::Bool(true)))
    }

    fn eval_or(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        for expr in rest {
            if self.eval(expr, frame)?.is_truthy() {
                return Ok(Step::Done(Value::Bool(true)));
            }
        }
        Ok(Step::Done(Value::Bool(false)))
    }

    /// `(let ((name value)...) body...)`: values are evaluated in the outer frame.
    fn eval_let(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        let Some((Sexpr::List(bindings), body)) = rest.split_first() else {
            return Err(LispError::eval("let expects a list of bindings"));
        };

        let let_frame = Frame::child(frame);
        for binding in bindings.iter() {
            match binding {
                Sexpr::List(pair) => match &pair[..] {
                    [Sexpr::Symbol(name), value] => {
                        let value = self.eval(value, frame)?;
                        let_frame.define(name.clone(), value);
                    }
                    _ => return Err(LispError::eval("let bindings must be (name value)")),
                },
                _ => return Err(LispError::eval("let bindings must be (name value)")),
            }
        }
        self.body_step(body, &let_frame)
    }

    fn eval_set(&self, rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
        let [Sexpr::Symbol(name), value] = rest else {
            return Err(LispError::eval("set! expects a name and a value"));
        };
        let value = self.eval(value, frame)?;
        frame.set(name, value.clone())?;
        Ok(Step::Done(value))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Evaluator::new(crate::config::DEFAULT_MAX_DEPTH)
    }
}

fn eval_quote(rest: &[Sexpr]) -> Result<Step> {
    match rest {
        [datum] => Ok(Step::Done(Value::from_datum(datum))),
        _ => Err(LispError::eval("quote expects exactly 1 argument")),
    }
}

fn eval_lambda(rest: &[Sexpr], frame: &Rc<Frame>) -> Result<Step> {
    match rest {
        [Sexpr::List(params), body @ ..] if !body.is_empty() => {
            Ok(Step::Done(Value::Lambda(Rc::new(Lambda {
                name: None,
                parameters: parameter_names(params)?,
                body: body.into(),
                frame: Rc::clone(frame),
            }))))
        }
        _ => Err(LispError::eval("lambda expects (lambda (params...) body...)")),
    }
}

fn parameter_names(params: &[Sexpr]) -> Result<Vec<String>> {
    let names = params
        .iter()
        .map(|param| {
            param
                .as_symbol()
                .map(str::to_string)
                .ok_or_else(|| LispError::eval(format!("parameter {} is not a symbol", param)))
        })
        .collect::<Result<Vec<String>>>()?;

    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(LispError::eval(format!("duplicate parameter {}", name)));
        }
    }
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use crate::parser::parse;

    fn run(source: &str) -> Result<Value> {
        run_with(&Evaluator::default(), source)
    }

    fn run_with(evaluator: &Evaluator, source: &str) -> Result<Value> {
        let frame = Frame::global();
        let ast = parse(&tokenize(source)?)?;
        let mut last = Value::nil();
        for expr in &ast.expressions {
            last = evaluator.eval(expr, &frame)?;
        }
        Ok(last)
    }

    #[test]
    fn test_self_evaluating() -> Result<()> {
        assert_eq!(run("6.101")?, Value::Float(6.101));
        assert_eq!(run("#t")?, Value::Bool(true));
        assert_eq!(run("\"hi\"")?, Value::Str("hi".to_string()));
        assert_eq!(run("()")?, Value::nil());
        Ok(())
    }

    #[test]
    fn test_nested_arithmetic() -> Result<()> {
        assert_eq!(run("(+ 3 (- 3 1 1) 2)")?, Value::Int(6));
        assert_eq!(run("(+ 1 2 (- 4 3) 5 (* 1 2))")?, Value::Int(11));
        Ok(())
    }

    #[test]
    fn test_define_and_lookup() -> Result<()> {
        assert_eq!(run("(define x 2) (* x 3)")?, Value::Int(6));
        assert_eq!(run("(define x (+ 1 1))")?, Value::Int(2));
        Ok(())
    }

    #[test]
    fn test_undefined_symbol() {
        assert!(matches!(run("(+ y 1)"), Err(LispError::Name(_))));
        assert!(matches!(run("(a 1 2)"), Err(LispError::Name(_))));
    }

    #[test]
    fn test_calling_a_non_procedure() {
        assert!(matches!(run("(3.14)"), Err(LispError::Evaluation(_))));
        assert!(matches!(run("((+ 1 2) 4)"), Err(LispError::Evaluation(_))));
    }

    #[test]
    fn test_lambda_and_closures() -> Result<()> {
        assert_eq!(run("((lambda (x y) (+ x y)) 2 3)")?, Value::Int(5));
        let source = "
            (define (make-adder n) (lambda (x) (+ x n)))
            (define add5 (make-adder 5))
            (add5 10)";
        assert_eq!(run(source)?, Value::Int(15));
        Ok(())
    }

    #[test]
    fn test_arity_mismatch() {
        assert!(matches!(
            run("((lambda (x) x) 1 2)"),
            Err(LispError::Evaluation(_))
        ));
    }

    #[test]
    fn test_if_and_cond() -> Result<()> {
        assert_eq!(run("(if (> 2 1) 'yes 'no)")?, Value::Symbol("yes".to_string()));
        assert_eq!(run("(if #f 1)")?, Value::nil());
        // only #f is false
        assert_eq!(run("(if () 1 2)")?, Value::Int(1));

        let source = "
            (define (sign n)
              (cond ((< n 0) -1)
                    ((= n 0) 0)
                    (else 1)))
            (list (sign -5) (sign 0) (sign 9))";
        assert_eq!(run(source)?.to_string(), "(-1 0 1)");
        Ok(())
    }

    #[test]
    fn test_and_or_short_circuit() -> Result<()> {
        assert_eq!(run("(and #t (> 1 2) undefined-name)")?, Value::Bool(false));
        assert_eq!(run("(or #f (< 1 2) undefined-name)")?, Value::Bool(true));
        assert_eq!(run("(and)")?, Value::Bool(true));
        assert_eq!(run("(or)")?, Value::Bool(false));
        Ok(())
    }

    #[test]
    fn test_let_and_begin() -> Result<()> {
        assert_eq!(run("(let ((x 2) (y 3)) (* x y))")?, Value::Int(6));
        // bindings see the outer frame, not each other
        assert_eq!(run("(define x 10) (let ((x 1) (y x)) y)")?, Value::Int(10));
        assert_eq!(run("(begin 1 2 3)")?, Value::Int(3));
        Ok(())
    }

    #[test]
    fn test_set() -> Result<()> {
        let source = "
            (define counter 0)
            (define (bump) (set! counter (+ counter 1)))
            (bump) (bump)
            counter";
        assert_eq!(run(source)?, Value::Int(2));
        assert!(matches!(run("(set! missing 1)"), Err(LispError::Name(_))));
        Ok(())
    }

    #[test]
    fn test_quote() -> Result<()> {
        assert_eq!(run("'(1 (2 x))")?.to_string(), "(1 (2 x))");
        assert_eq!(run("(quote a)")?, Value::Symbol("a".to_string()));
        assert_eq!(run("(car ''a)")?, Value::Symbol("quote".to_string()));
        Ok(())
    }

    #[test]
    fn test_malformed_special_forms() {
        for source in [
            "(define)",
            "(define (f x))",
            "(lambda x x)",
            "(if 1)",
            "(let (x 1) x)",
            "(quote 1 2)",
            "(lambda (x x) x)",
            "(cond 3 (1 2))",
        ] {
            assert!(
                matches!(run(source), Err(LispError::Evaluation(_))),
                "{} should fail",
                source
            );
        }
    }

    #[test]
    fn test_tail_calls_do_not_consume_depth() -> Result<()> {
        let evaluator = Evaluator::new(50);
        let source = "
            (define (count-down n) (if (= n 0) 'done (count-down (- n 1))))
            (count-down 10000)";
        assert_eq!(run_with(&evaluator, source)?, Value::Symbol("done".to_string()));
        Ok(())
    }

    #[test]
    fn test_recursion_limit() {
        let evaluator = Evaluator::new(50);
        let source = "
            (define (sum-to n) (if (= n 0) 0 (+ n (sum-to (- n 1)))))
            (sum-to 1000)";
        assert!(matches!(
            run_with(&evaluator, source),
            Err(LispError::RecursionLimit(50))
        ));
        // the depth counter unwinds after an error
        assert_eq!(run_with(&evaluator, "(+ 1 2)").unwrap(), Value::Int(3));
    }

    #[test]
    fn test_special_forms_cannot_be_shadowed() -> Result<()> {
        let source = "
            (define (if a b c) 1)
            (define quote 5)
            (list (if #t 1 2) (quote x))";
        assert_eq!(run(source)?.to_string(), "(1 x)");
        Ok(())
    }

    #[test]
    fn test_default_limit_fires_before_the_stack_runs_out() {
        let evaluator = Evaluator::default();
        let source = "
            (define (sum-to n) (if (= n 0) 0 (+ n (sum-to (- n 1)))))
            (sum-to 1900)";
        assert_eq!(run_with(&evaluator, source).unwrap(), Value::Int(1_805_950));

        let source = "
            (define (sum-to n) (if (= n 0) 0 (+ n (sum-to (- n 1)))))
            (sum-to 100000)";
        assert!(matches!(
            run_with(&evaluator, source),
            Err(LispError::RecursionLimit(crate::config::DEFAULT_MAX_DEPTH))
        ));
    }

    #[test]
    fn test_apply_from_rust() -> Result<()> {
        let evaluator = Evaluator::default();
        let frame = Frame::global();
        let ast = parse(&tokenize("(define (square x) (* x x))")?)?;
        evaluator.eval(&ast.expressions[0], &frame)?;

        let square = frame.lookup("square")?;
        assert_eq!(evaluator.apply(&square, vec![Value::Int(7)])?, Value::Int(49));
        Ok(())
    }
}

//! A small Lisp interpreter built around persistent cons lists.
//!
//! ```
//! use conscell::Session;
//!
//! # fn main() -> conscell::Result<()> {
//! let session = Session::new()?;
//! let squares = session.eval_str("(map (lambda (x) (* x x)) '(1 2 3))")?;
//! assert_eq!(squares.to_string(), "(1 4 9)");
//!
//! let big = session.eval_str("(filter (lambda (x) (> x 2)) '(1 2 3 4))")?;
//! assert_eq!(big.to_string(), "(3 4)");
//! # Ok(())
//! # }
//! ```

pub mod builtins;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod frame;
pub mod interpreter;
pub mod lexer;
pub mod list;
pub mod parser;
pub mod value;

pub use config::Config;
pub use error::{LispError, Result};
pub use interpreter::{repl, Session};
pub use list::List;
pub use value::Value;

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::builtins::BUILTINS;
use crate::error::{LispError, Result};
use crate::value::Value;

/// A single scope. Lookups fall through to the parent frame.
#[derive(Default)]
pub struct Frame {
    parent: Option<Rc<Frame>>,
    bindings: RefCell<HashMap<String, Value>>,
}

impl Frame {
    pub fn new() -> Rc<Frame> {
        Rc::new(Frame::default())
    }

    pub fn child(parent: &Rc<Frame>) -> Rc<Frame> {
        Rc::new(Frame {
            parent: Some(Rc::clone(parent)),
            bindings: RefCell::default(),
        })
    }

    /// A root frame holding every built-in procedure plus `nil`.
    pub fn builtins() -> Rc<Frame> {
        let frame = Frame::new();
        for builtin in BUILTINS {
            frame.define(builtin.symbol, Value::BuiltIn(builtin));
        }
        frame.define("nil", Value::nil());
        frame
    }

    /// The frame user programs run in. Its parent holds the built-ins, so a
    /// user definition shadows a built-in without replacing it.
    pub fn global() -> Rc<Frame> {
        Frame::child(&Frame::builtins())
    }

    /// Binds `name` in this frame, replacing any local binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.bindings.borrow_mut().insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        let mut frame = self;
        loop {
            if let Some(value) = frame.bindings.borrow().get(name) {
                return Ok(value.clone());
            }
            match &frame.parent {
                Some(parent) => frame = &**parent,
                None => return Err(LispError::Name(format!("'{}' is not defined", name))),
            }
        }
    }

    /// Rebinds the nearest existing binding of `name`.
    pub fn set(&self, name: &str, value: Value) -> Result<()> {
        let mut frame = self;
        loop {
            if let Some(slot) = frame.bindings.borrow_mut().get_mut(name) {
                *slot = value;
                return Ok(());
            }
            match &frame.parent {
                Some(parent) => frame = &**parent,
                None => {
                    return Err(LispError::Name(format!(
                        "cannot set! '{}': not defined",
                        name
                    )))
                }
            }
        }
    }

    pub fn contains_local(&self, name: &str) -> bool {
        self.bindings.borrow().contains_key(name)
    }

    /// Drops every local binding. Closures defined in a frame keep that frame
    /// alive, so this is how an owner breaks the cycle.
    pub fn clear(&self) {
        let bindings = std::mem::take(&mut *self.bindings.borrow_mut());
        drop(bindings);
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("Frame")
            .field("bindings", &names)
            .field("has_parent", &self.parent.is_some())
            .finish()
    }
}

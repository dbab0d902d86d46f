//! Lexical scopes
//!
//! Functions hold their declaring scope weakly. Sketch functions are all
//! declared at top level, so the global scope (owned by the interpreter)
//! outlives every closure and no reference cycle is created.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::value::Value;

#[derive(Debug, Default)]
struct Frame {
    vars: RefCell<HashMap<Rc<str>, Value>>,
    parent: Option<Scope>,
}

#[derive(Debug, Clone, Default)]
pub struct Scope(Rc<Frame>);

#[derive(Debug, Clone)]
pub struct WeakScope(Weak<Frame>);

impl Scope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn child(&self) -> Self {
        Self(Rc::new(Frame {
            vars: RefCell::default(),
            parent: Some(self.clone()),
        }))
    }

    /// Bind `name` in this scope, shadowing any outer binding
    pub fn declare(&self, name: Rc<str>, value: Value) {
        self.0.vars.borrow_mut().insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut frame = &self.0;
        loop {
            if let Some(value) = frame.vars.borrow().get(name) {
                return Some(value.clone());
            }
            frame = &frame.parent.as_ref()?.0;
        }
    }

    /// Update the nearest binding of `name`; `false` if there is none
    pub fn set(&self, name: &str, value: Value) -> bool {
        let mut frame = &self.0;
        loop {
            if let Some(slot) = frame.vars.borrow_mut().get_mut(name) {
                *slot = value;
                return true;
            }
            match &frame.parent {
                Some(parent) => frame = &parent.0,
                None => return false,
            }
        }
    }

    pub fn downgrade(&self) -> WeakScope {
        WeakScope(Rc::downgrade(&self.0))
    }
}

impl WeakScope {
    pub fn upgrade(&self) -> Option<Scope> {
        self.0.upgrade().map(Scope)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_sees_and_updates_parent() {
        let global = Scope::new();
        global.declare("x".into(), Value::Int(1));
        let inner = global.child();
        assert_eq!(inner.get("x"), Some(Value::Int(1)));
        assert!(inner.set("x", Value::Int(2)));
        assert_eq!(global.get("x"), Some(Value::Int(2)));
        assert!(!inner.set("y", Value::Int(0)));
    }

    #[test]
    fn test_shadowing() {
        let global = Scope::new();
        global.declare("x".into(), Value::Int(1));
        let inner = global.child();
        inner.declare("x".into(), Value::Int(5));
        assert_eq!(inner.get("x"), Some(Value::Int(5)));
        assert_eq!(global.get("x"), Some(Value::Int(1)));
    }
}

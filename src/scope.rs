//! Immutable scope chains.
//!
//! A scope is a cons list of (name, value) frames. Binding allocates a new
//! frame in front of the old chain; the old chain is untouched, so closures
//! can capture a scope by cloning the head pointer. The same structure
//! serves as the type environment (`Scope<TypeRef>`) and the value
//! environment (`Scope<Value>`).

use std::rc::Rc;

#[derive(Debug)]
struct Frame<T> {
    parent: Scope<T>,
    name: String,
    val: T,
}

#[derive(Debug)]
pub struct Scope<T>(Option<Rc<Frame<T>>>);

impl<T> Clone for Scope<T> {
    fn clone(&self) -> Self {
        Scope(self.0.clone())
    }
}

impl<T> Default for Scope<T> {
    fn default() -> Self {
        Scope(None)
    }
}

impl<T> Scope<T> {
    pub fn empty() -> Self {
        Scope(None)
    }

    /// Returns a new scope with `name` bound in front of `self`.
    pub fn bind(&self, name: impl Into<String>, val: T) -> Scope<T> {
        Scope(Some(Rc::new(Frame {
            parent: self.clone(),
            name: name.into(),
            val,
        })))
    }

    /// The scope without its innermost binding.
    pub fn parent(&self) -> Scope<T> {
        match &self.0 {
            Some(frame) => frame.parent.clone(),
            None => Scope(None),
        }
    }

    /// Walks the chain for the innermost binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<&T> {
        let mut current = self;
        while let Some(frame) = &current.0 {
            if frame.name == name {
                return Some(&frame.val);
            }
            current = &frame.parent;
        }
        None
    }
}

//! Symbol environments: chained frames of bindings.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::schema::{Device, Structure, TypeRegistry};
use crate::value::Value;

/// Shared handle to a frame.
pub type Env = Rc<Frame>;

/// One scope of bindings with an optional parent.
#[derive(Debug, Default)]
pub struct Frame {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Env>,
}

impl Frame {
    /// Root frame with `nil`, `true` and `false` bound.
    pub fn global() -> Env {
        let frame = Frame::default();
        frame.define("nil", Value::Nil);
        frame.define("true", Value::Bool(true));
        frame.define("false", Value::Bool(false));
        Rc::new(frame)
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Frame {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.bindings.borrow_mut().insert(name.to_string(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.bindings.borrow().get(name) {
            return Some(v.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn lookup_device(&self, name: &str) -> Option<Rc<Device>> {
        match self.lookup(name)? {
            Value::Device(d) => Some(d),
            _ => None,
        }
    }

    /// Names bound in this frame (not parents), sorted.
    pub fn local_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.bindings.borrow().keys().cloned().collect();
        names.sort();
        names
    }
}

impl TypeRegistry for Frame {
    fn lookup_structure(&self, name: &str) -> Option<Rc<Structure>> {
        match self.lookup(name)? {
            Value::Structure(s) => Some(s),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_shadows_and_falls_back() {
        let global = Frame::global();
        global.define("x", Value::Int(1));
        global.define("y", Value::Int(2));
        let child = Frame::child(&global);
        child.define("x", Value::Int(10));
        assert_eq!(child.lookup("x").and_then(|v| v.as_i64()), Some(10));
        assert_eq!(child.lookup("y").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(global.lookup("x").and_then(|v| v.as_i64()), Some(1));
        assert!(child.lookup("missing").is_none());
    }

    #[test]
    fn primitive_types_resolve_without_bindings() {
        let global = Frame::global();
        assert_eq!(global.size_of("uint16"), Some(2));
        assert!(global.is_valid_type("int64"));
        assert!(!global.is_valid_type("Status"));
        assert!(!global.is_valid_type("nil"));
    }
}

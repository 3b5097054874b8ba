//! The universal runtime value.
//!
//! One `Value` type serves the VM operand stack, environments, and the
//! evaluator. Lists and dicts are reference-counted with interior
//! mutability so aliases observe mutation; `freeze` produces an
//! immutable `FrozenDict` snapshot used for imported namespaces.
//!
//! Coercion rules:
//! - `as_int`: ints pass through, strings parse, bools map to 0/1,
//!   collections yield their length, none is 0.
//! - `as_bool` (truthiness): `false`, `0`, `""`, `[]`, `{}`, none are
//!   falsy; everything else is truthy.
//! - `Display` renders a human-readable form with cycle detection, so
//!   self-referential lists print `[...]` instead of recursing forever.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use tarn_parser::Stmt;

use crate::error::VmError;

/// A user-defined function captured by the evaluator.
///
/// Top-level procs capture an empty environment; nested procs copy the
/// enclosing locals. `globals` is the defining module's global table,
/// so procs exported through an import keep writing and reading their
/// own module's globals.
pub struct FuncValue {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Stmt>,
    pub captured: HashMap<String, Value>,
    pub globals: Rc<RefCell<HashMap<String, Value>>>,
}

/// Value type for the VM stack and environments.
#[derive(Clone)]
pub enum Value {
    /// 64-bit signed integer.
    Int(i64),
    /// UTF-8 string.
    Str(String),
    /// Boolean.
    Bool(bool),
    /// Mutable list, shared by reference.
    List(Rc<RefCell<Vec<Value>>>),
    /// Mutable dictionary, shared by reference.
    Dict(Rc<RefCell<HashMap<String, Value>>>),
    /// Immutable dictionary snapshot.
    FrozenDict(Rc<HashMap<String, Value>>),
    /// Evaluator closure. Never appears on the VM path, where
    /// functions are first-class as name strings.
    Func(Rc<FuncValue>),
    /// The absent value.
    None,
}

impl Value {
    /// Builds a list value from plain elements.
    pub fn list(elements: Vec<Value>) -> Self {
        Value::List(Rc::new(RefCell::new(elements)))
    }

    /// Builds a dict value from plain pairs.
    pub fn dict(map: HashMap<String, Value>) -> Self {
        Value::Dict(Rc::new(RefCell::new(map)))
    }

    /// Coerces to an integer.
    pub fn as_int(&self) -> Result<i64, VmError> {
        match self {
            Value::Int(i) => Ok(*i),
            Value::Str(s) => s
                .parse::<i64>()
                .map_err(|_| VmError::Type(format!("Invalid literal for int(): '{}'", s))),
            Value::Bool(b) => Ok(i64::from(*b)),
            Value::List(l) => Ok(l.borrow().len() as i64),
            Value::Dict(d) => Ok(d.borrow().len() as i64),
            Value::FrozenDict(d) => Ok(d.len() as i64),
            Value::Func(f) => Err(VmError::Type(format!(
                "proc '{}' cannot be converted to int",
                f.name
            ))),
            Value::None => Ok(0),
        }
    }

    /// Truthiness.
    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Str(s) => !s.is_empty(),
            Value::List(l) => !l.borrow().is_empty(),
            Value::Dict(d) => !d.borrow().is_empty(),
            Value::FrozenDict(d) => !d.is_empty(),
            Value::Func(_) => true,
            Value::None => false,
        }
    }

    fn render(&self, seen: &mut HashSet<usize>, out: &mut String) {
        match self {
            Value::Int(i) => out.push_str(&i.to_string()),
            Value::Str(s) => out.push_str(s),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::List(list) => {
                let ptr = Rc::as_ptr(list) as usize;
                if !seen.insert(ptr) {
                    out.push_str("[...]");
                    return;
                }
                out.push('[');
                for (i, item) in list.borrow().iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.render(seen, out);
                }
                out.push(']');
                seen.remove(&ptr);
            }
            Value::Dict(map) => {
                let ptr = Rc::as_ptr(map) as usize;
                if !seen.insert(ptr) {
                    out.push_str("{...}");
                    return;
                }
                render_map(map.borrow().iter(), seen, out);
                seen.remove(&ptr);
            }
            Value::FrozenDict(map) => {
                let ptr = Rc::as_ptr(map) as usize;
                if !seen.insert(ptr) {
                    out.push_str("{...}");
                    return;
                }
                render_map(map.iter(), seen, out);
                seen.remove(&ptr);
            }
            Value::Func(f) => {
                out.push_str("<proc ");
                out.push_str(&f.name);
                out.push('>');
            }
            Value::None => {}
        }
    }
}

fn render_map<'a, I>(entries: I, seen: &mut HashSet<usize>, out: &mut String)
where
    I: Iterator<Item = (&'a String, &'a Value)>,
{
    out.push('{');
    for (i, (key, value)) in entries.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(key);
        out.push_str(": ");
        value.render(seen, out);
    }
    out.push('}');
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        let mut out = String::new();
        self.render(&mut seen, &mut out);
        f.write_str(&out)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{:?}", s),
            Value::None => write!(f, "none"),
            other => write!(f, "{}", other),
        }
    }
}

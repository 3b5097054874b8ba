//! Structural operations: indexing, slicing, attribute access, and
//! their store forms. Shared by the VM and the evaluator.
//!
//! - Lists index by non-negative integer; strings index to a
//!   one-character string; dicts index by string key, with integer
//!   keys stringified.
//! - Indexed stores grow a list to fit, padding with zeros.
//! - Attribute access is dictionary field access; writes to a frozen
//!   dict raise `FrozenWriteError`.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::VmError;
use crate::value::Value;

pub(crate) fn index(base: Value, idx: Value) -> Result<Value, VmError> {
    match (base, idx) {
        (Value::List(list), Value::Int(i)) => {
            let list = list.borrow();
            if i < 0 || i as usize >= list.len() {
                return Err(VmError::Index("List index out of bounds!".to_string()));
            }
            Ok(list[i as usize].clone())
        }
        (Value::Dict(map), key) => {
            let key = dict_key(key)?;
            map.borrow()
                .get(&key)
                .cloned()
                .ok_or(VmError::Key(key))
        }
        (Value::FrozenDict(map), key) => {
            let key = dict_key(key)?;
            map.get(&key).cloned().ok_or(VmError::Key(key))
        }
        (Value::Str(s), Value::Int(i)) => {
            if i < 0 {
                return Err(VmError::Index("String index out of bounds!".to_string()));
            }
            s.chars()
                .nth(i as usize)
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| VmError::Index("String index out of bounds!".to_string()))
        }
        (other, _) => Err(VmError::Type(format!("{} is not indexable", other))),
    }
}

fn dict_key(key: Value) -> Result<String, VmError> {
    match key {
        Value::Str(k) => Ok(k),
        Value::Int(i) => Ok(i.to_string()),
        other => Err(VmError::Type(format!("{} is not a dictionary key", other))),
    }
}

pub(crate) fn slice(base: Value, start: Value, end: Value) -> Result<Value, VmError> {
    let start = start.as_int()?;
    match base {
        Value::List(list) => {
            let list = list.borrow();
            let (from, to) = slice_bounds(start, end, list.len())?;
            Ok(Value::List(Rc::new(RefCell::new(list[from..to].to_vec()))))
        }
        Value::Str(s) => {
            let chars: Vec<char> = s.chars().collect();
            let (from, to) = slice_bounds(start, end, chars.len())?;
            Ok(Value::Str(chars[from..to].iter().collect()))
        }
        _ => Ok(Value::Int(0)),
    }
}

fn slice_bounds(start: i64, end: Value, len: usize) -> Result<(usize, usize), VmError> {
    let out_of_bounds = || VmError::Index("Slice indices out of bounds!".to_string());
    if start < 0 {
        return Err(out_of_bounds());
    }
    let end = match end {
        Value::None => len as i64,
        v => v.as_int()?,
    };
    if end < 0 {
        return Err(out_of_bounds());
    }
    let (start, end) = (start as usize, end as usize);
    if start > end || end > len {
        return Err(out_of_bounds());
    }
    Ok((start, end))
}

pub(crate) fn store_index(base: Value, idx: Value, value: Value) -> Result<(), VmError> {
    match (base, idx) {
        (Value::List(list), Value::Int(i)) => {
            if i < 0 {
                return Err(VmError::Index("List index out of bounds!".to_string()));
            }
            let mut list = list.borrow_mut();
            let i = i as usize;
            if i >= list.len() {
                list.resize(i + 1, Value::Int(0));
            }
            list[i] = value;
            Ok(())
        }
        (Value::Dict(map), key) => {
            map.borrow_mut().insert(dict_key(key)?, value);
            Ok(())
        }
        (Value::FrozenDict(_), _) => Err(VmError::FrozenWrite),
        _ => Ok(()),
    }
}

pub(crate) fn attr(base: Value, name: &str) -> Result<Value, VmError> {
    match base {
        Value::Dict(map) => map
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::Key(name.to_string())),
        Value::FrozenDict(map) => map
            .get(name)
            .cloned()
            .ok_or_else(|| VmError::Key(name.to_string())),
        other => Err(VmError::Type(format!(
            "{} has no attribute '{}'",
            other, name
        ))),
    }
}

pub(crate) fn store_attr(base: Value, name: &str, value: Value) -> Result<(), VmError> {
    match base {
        Value::Dict(map) => {
            map.borrow_mut().insert(name.to_string(), value);
            Ok(())
        }
        Value::FrozenDict(_) => Err(VmError::FrozenWrite),
        _ => Ok(()),
    }
}

//! Arithmetic, comparison, bitwise, and boolean operations on values.
//!
//! These are shared between the VM dispatch loop and the tree-walking
//! evaluator so both paths agree on coercion behavior:
//!
//! - `+` concatenates when either side is a string (the other side is
//!   stringified) and extends the left list in place for list + list;
//!   otherwise it is integer addition.
//! - `==`/`!=` compare stringified forms, so heterogeneous values
//!   compare consistently.
//! - Ordering comparisons are lexicographic for string/string and
//!   integer otherwise.
//! - `/` and `%` by zero raise `ZeroDivisionError`. `*` uses checked
//!   multiplication and yields 0 on overflow.

use crate::error::VmError;
use crate::value::Value;

pub(crate) fn add(a: Value, b: Value) -> Result<Value, VmError> {
    match (a, b) {
        (Value::Str(sa), Value::Str(sb)) => Ok(Value::Str(sa + &sb)),
        (Value::Str(sa), v) => Ok(Value::Str(sa + &v.to_string())),
        (v, Value::Str(sb)) => Ok(Value::Str(v.to_string() + &sb)),
        (Value::List(la), Value::List(lb)) => {
            {
                let mut left = la.borrow_mut();
                let extra: Vec<Value> = lb.borrow().iter().cloned().collect();
                left.extend(extra);
            }
            Ok(Value::List(la))
        }
        (a, b) => Ok(Value::Int(a.as_int()? + b.as_int()?)),
    }
}

pub(crate) fn sub(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? - b.as_int()?))
}

pub(crate) fn mul(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()?.checked_mul(b.as_int()?).unwrap_or(0)))
}

pub(crate) fn div(a: Value, b: Value) -> Result<Value, VmError> {
    let divisor = b.as_int()?;
    if divisor == 0 {
        return Err(VmError::ZeroDivision);
    }
    Ok(Value::Int(a.as_int()? / divisor))
}

pub(crate) fn modulo(a: Value, b: Value) -> Result<Value, VmError> {
    let divisor = b.as_int()?;
    if divisor == 0 {
        return Err(VmError::ZeroDivision);
    }
    Ok(Value::Int(a.as_int()? % divisor))
}

pub(crate) fn eq(a: Value, b: Value) -> Value {
    Value::Bool(a.to_string() == b.to_string())
}

pub(crate) fn ne(a: Value, b: Value) -> Value {
    Value::Bool(a.to_string() != b.to_string())
}

macro_rules! ordering_op {
    ($name:ident, $op:tt) => {
        pub(crate) fn $name(a: Value, b: Value) -> Result<Value, VmError> {
            let result = match (&a, &b) {
                (Value::Str(sa), Value::Str(sb)) => sa $op sb,
                _ => a.as_int()? $op b.as_int()?,
            };
            Ok(Value::Bool(result))
        }
    };
}

ordering_op!(lt, <);
ordering_op!(le, <=);
ordering_op!(gt, >);
ordering_op!(ge, >=);

pub(crate) fn band(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? & b.as_int()?))
}

pub(crate) fn bor(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? | b.as_int()?))
}

pub(crate) fn bxor(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? ^ b.as_int()?))
}

pub(crate) fn shl(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? << b.as_int()? as u32))
}

pub(crate) fn shr(a: Value, b: Value) -> Result<Value, VmError> {
    Ok(Value::Int(a.as_int()? >> b.as_int()? as u32))
}

/// Eager logical and; the compiler lowers `and` to jumps, but the
/// opcode stays executable.
pub(crate) fn and(a: Value, b: Value) -> Value {
    Value::Bool(a.as_bool() && b.as_bool())
}

/// Eager logical or.
pub(crate) fn or(a: Value, b: Value) -> Value {
    Value::Bool(a.as_bool() || b.as_bool())
}

/// Bitwise complement, not logical negation.
pub(crate) fn not(v: Value) -> Result<Value, VmError> {
    Ok(Value::Int(!v.as_int()?))
}

pub(crate) fn neg(v: Value) -> Result<Value, VmError> {
    Ok(Value::Int(-v.as_int()?))
}

//! Arithmetic, comparison and unary operators on [`Value`]s.

use std::cmp::Ordering;
use std::rc::Rc;

use lumen_compiler::bytecode::OpCode;
use lumen_core::{RuntimeError, Value};

use super::Result;

/// Apply a binary operator. `+` concatenates when either side is a string or
/// an object.
pub(super) fn binary(op: OpCode, lhs: &Value, rhs: &Value) -> Result<Value> {
    let value = match op {
        OpCode::Add => add(lhs, rhs),
        OpCode::Sub => Value::Number(lhs.to_number() - rhs.to_number()),
        OpCode::Mul => Value::Number(lhs.to_number() * rhs.to_number()),
        OpCode::Div => Value::Number(lhs.to_number() / rhs.to_number()),
        OpCode::Mod => Value::Number(lhs.to_number() % rhs.to_number()),
        OpCode::Less => Value::Bool(compare(lhs, rhs) == Some(Ordering::Less)),
        OpCode::LessEqual => Value::Bool(matches!(
            compare(lhs, rhs),
            Some(Ordering::Less | Ordering::Equal)
        )),
        OpCode::Greater => Value::Bool(compare(lhs, rhs) == Some(Ordering::Greater)),
        OpCode::GreaterEqual => Value::Bool(matches!(
            compare(lhs, rhs),
            Some(Ordering::Greater | Ordering::Equal)
        )),
        OpCode::Equal => Value::Bool(lhs.loose_equals(rhs)),
        OpCode::NotEqual => Value::Bool(!lhs.loose_equals(rhs)),
        OpCode::StrictEqual => Value::Bool(lhs.strict_equals(rhs)),
        OpCode::StrictNotEqual => Value::Bool(!lhs.strict_equals(rhs)),
        other => {
            return Err(RuntimeError::internal(format!(
                "{} is not a binary operator",
                other.name()
            )));
        }
    };
    Ok(value)
}

pub(super) fn unary(op: OpCode, operand: &Value) -> Result<Value> {
    let value = match op {
        OpCode::Neg => Value::Number(-operand.to_number()),
        OpCode::Plus => Value::Number(operand.to_number()),
        OpCode::Not => Value::Bool(!operand.to_boolean()),
        other => {
            return Err(RuntimeError::internal(format!(
                "{} is not a unary operator",
                other.name()
            )));
        }
    };
    Ok(value)
}

fn add(lhs: &Value, rhs: &Value) -> Value {
    let concatenates = |v: &Value| matches!(v, Value::String(_) | Value::Object(_));
    if concatenates(lhs) || concatenates(rhs) {
        let mut text = String::from(&*lhs.to_display_string());
        text.push_str(&rhs.to_display_string());
        Value::String(Rc::from(text))
    } else {
        Value::Number(lhs.to_number() + rhs.to_number())
    }
}

/// Strings compare lexicographically, everything else numerically. `None`
/// when either side is NaN.
fn compare(lhs: &Value, rhs: &Value) -> Option<Ordering> {
    match (lhs, rhs) {
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => lhs.to_number().partial_cmp(&rhs.to_number()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Value {
        Value::Number(n)
    }

    #[test]
    fn addition_and_concatenation() {
        assert_eq!(binary(OpCode::Add, &num(1.0), &num(2.0)).unwrap(), num(3.0));
        assert_eq!(
            binary(OpCode::Add, &Value::string("a"), &num(1.0)).unwrap(),
            Value::string("a1")
        );
        assert_eq!(
            binary(OpCode::Add, &Value::Bool(true), &num(1.0)).unwrap(),
            num(2.0)
        );
    }

    #[test]
    fn nan_compares_false() {
        let nan = num(f64::NAN);
        for op in [
            OpCode::Less,
            OpCode::LessEqual,
            OpCode::Greater,
            OpCode::GreaterEqual,
        ] {
            assert_eq!(binary(op, &nan, &num(1.0)).unwrap(), Value::Bool(false));
        }
    }

    #[test]
    fn string_comparison_is_lexicographic() {
        assert_eq!(
            binary(OpCode::Less, &Value::string("10"), &Value::string("9")).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(OpCode::Less, &Value::string("10"), &num(9.0)).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn equality_flavours() {
        assert_eq!(
            binary(OpCode::Equal, &Value::string("1"), &num(1.0)).unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            binary(OpCode::StrictEqual, &Value::string("1"), &num(1.0)).unwrap(),
            Value::Bool(false)
        );
        assert_eq!(
            binary(OpCode::NotEqual, &Value::Null, &Value::Undefined).unwrap(),
            Value::Bool(false)
        );
    }

    #[test]
    fn unary_operators() {
        assert_eq!(unary(OpCode::Neg, &Value::string("3")).unwrap(), num(-3.0));
        assert_eq!(unary(OpCode::Not, &Value::string("")).unwrap(), Value::Bool(true));
        assert!(unary(OpCode::Add, &num(1.0)).is_err());
    }
}

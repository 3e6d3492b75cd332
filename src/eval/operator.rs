//! Binary and unary operators.
//!
//! Operands are never coerced into each other: apart from `==`/`!=`, both
//! sides must have the same type and that type must be allowed for the
//! operator. Numbers are computed in the wider kind of the two operands.

use std::cmp::Ordering;

use thiserror::Error;

use crate::ast::{BinaryOperator, UnaryOperator};
use crate::secret::OptionalSecret;
use crate::value::{Number, NumberKind, Type, Value};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    #[error("should be one of {} for binop {op}, got {actual}", format_types(.allowed))]
    Operand {
        op: BinaryOperator,
        allowed: &'static [Type],
        actual: Type,
    },
    #[error("expected {expected}, got {actual}")]
    Mismatch { expected: Type, actual: Type },
    #[error("division by zero")]
    DivisionByZero,
}

fn format_types(types: &[Type]) -> String {
    let names: Vec<String> = types.iter().map(Type::to_string).collect();
    format!("[{}]", names.join(" "))
}

/// Operand types each operator accepts. Equality accepts anything.
pub fn allowed_types(op: BinaryOperator) -> &'static [Type] {
    use BinaryOperator::*;
    match op {
        Or | And => &[Type::Bool],
        Add | LessThan | LessThanEqual | GreaterThan | GreaterThanEqual => {
            &[Type::Number, Type::String]
        }
        Subtract | Multiply | Divide | Modulo | Power => &[Type::Number],
        Equal | NotEqual => &[
            Type::Null,
            Type::Number,
            Type::String,
            Type::Bool,
            Type::Array,
            Type::Object,
            Type::Function,
            Type::Capsule,
        ],
    }
}

/// A non-secret optional secret takes part in operators as a plain string.
fn unwrap_optional_secret(value: &Value) -> Value {
    if let Value::Capsule(capsule) = value {
        if let Some(optional) = capsule.downcast_ref::<OptionalSecret>() {
            if !optional.is_secret {
                return Value::from(optional.value.as_str());
            }
        }
    }
    value.clone()
}

pub fn binary(op: BinaryOperator, left: &Value, right: &Value) -> Result<Value, OperatorError> {
    let left = unwrap_optional_secret(left);
    let right = unwrap_optional_secret(right);

    match op {
        BinaryOperator::Equal => return Ok(Value::Bool(left == right)),
        BinaryOperator::NotEqual => return Ok(Value::Bool(left != right)),
        _ => {}
    }

    let allowed = allowed_types(op);
    for operand in [&left, &right] {
        if !allowed.contains(&operand.ty()) {
            return Err(OperatorError::Operand {
                op,
                allowed,
                actual: operand.ty(),
            });
        }
    }
    if left.ty() != right.ty() {
        return Err(OperatorError::Mismatch {
            expected: left.ty(),
            actual: right.ty(),
        });
    }

    match (&left, &right) {
        (Value::Bool(l), Value::Bool(r)) => Ok(Value::Bool(match op {
            BinaryOperator::Or => *l || *r,
            _ => *l && *r,
        })),
        (Value::String(l), Value::String(r)) => Ok(match op {
            BinaryOperator::Add => Value::from(format!("{l}{r}")),
            _ => Value::Bool(compare(op, l.as_ref().cmp(r.as_ref()).into())),
        }),
        (Value::Number(l), Value::Number(r)) => match op {
            BinaryOperator::LessThan
            | BinaryOperator::LessThanEqual
            | BinaryOperator::GreaterThan
            | BinaryOperator::GreaterThanEqual => Ok(Value::Bool(compare(op, l.loose_cmp(r)))),
            _ => arithmetic(op, *l, *r).map(Value::Number),
        },
        _ => unreachable!("operand types were checked above"),
    }
}

fn compare(op: BinaryOperator, ordering: Option<Ordering>) -> bool {
    let Some(ordering) = ordering else {
        // NaN は何とも比較できない
        return false;
    };
    match op {
        BinaryOperator::LessThan => ordering.is_lt(),
        BinaryOperator::LessThanEqual => ordering.is_le(),
        BinaryOperator::GreaterThan => ordering.is_gt(),
        _ => ordering.is_ge(),
    }
}

/// Wrapping power by squaring; the same bits as repeated multiplication.
fn wrapping_pow(mut base: u64, mut exp: u64) -> u64 {
    let mut acc = 1u64;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = acc.wrapping_mul(base);
        }
        base = base.wrapping_mul(base);
        exp >>= 1;
    }
    acc
}

fn arithmetic(op: BinaryOperator, l: Number, r: Number) -> Result<Number, OperatorError> {
    use BinaryOperator::*;
    let result = match l.kind().max(r.kind()) {
        NumberKind::Uint => {
            let (a, b) = (l.as_u64(), r.as_u64());
            Number::uint(match op {
                Add => a.wrapping_add(b),
                Subtract => a.wrapping_sub(b),
                Multiply => a.wrapping_mul(b),
                Divide => a.checked_div(b).ok_or(OperatorError::DivisionByZero)?,
                Modulo => a.checked_rem(b).ok_or(OperatorError::DivisionByZero)?,
                _ => wrapping_pow(a, b),
            })
        }
        NumberKind::Int => {
            let (a, b) = (l.as_i64(), r.as_i64());
            if b == 0 && matches!(op, Divide | Modulo) {
                return Err(OperatorError::DivisionByZero);
            }
            Number::int(match op {
                Add => a.wrapping_add(b),
                Subtract => a.wrapping_sub(b),
                Multiply => a.wrapping_mul(b),
                Divide => a.wrapping_div(b),
                Modulo => a.wrapping_rem(b),
                // negative exponents multiply zero times
                _ if b < 0 => a,
                _ => wrapping_pow(a as u64, b as u64) as i64,
            })
        }
        NumberKind::Float => {
            let (a, b) = (l.as_f64(), r.as_f64());
            Number::float(match op {
                Add => a + b,
                Subtract => a - b,
                Multiply => a * b,
                Divide => a / b,
                // Rust の % は fmod と同じ
                Modulo => a % b,
                _ => a.powf(b),
            })
        }
    };
    Ok(result)
}

pub fn unary(op: UnaryOperator, operand: &Value) -> Result<Value, OperatorError> {
    match (op, operand) {
        (UnaryOperator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOperator::Negate, Value::Number(n)) => Ok(Value::Number(match n.kind() {
            NumberKind::Float => Number::float(-n.as_f64()),
            // unsigned values are negated as signed
            _ => Number::int(n.as_i64().wrapping_neg()),
        })),
        (UnaryOperator::Not, other) => Err(OperatorError::Mismatch {
            expected: Type::Bool,
            actual: other.ty(),
        }),
        (UnaryOperator::Negate, other) => Err(OperatorError::Mismatch {
            expected: Type::Number,
            actual: other.ty(),
        }),
    }
}

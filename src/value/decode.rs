//! The decode engine: write a [`Value`] into any [`HostValue`].

use std::borrow::Cow;

use tracing::trace;

use super::capsule::{capsule_mismatch, ConvertError};
use super::host::{river_type, HookError, HostValue};
use super::{Dynamic, Number, Type, Value, ValueError};

/// Decode `value` into `target`.
///
/// Null zeroes the target. References are allocated and followed. Strings
/// and numbers convert into each other; any other mismatch is a type error
/// unless a capsule conversion hook takes over.
pub fn decode(value: &Value, target: &mut dyn HostValue) -> Result<(), ValueError> {
    Decoder { hooks: true }.decode(value, target)
}

/// Decode into a fresh `T`.
pub fn decode_into<T: HostValue + Default>(value: &Value) -> Result<T, ValueError> {
    let mut out = T::default();
    decode(value, &mut out)?;
    Ok(out)
}

/// Decode without running `target`'s own lifecycle hooks. Nested values
/// still run theirs.
pub(crate) fn decode_without_hooks(value: &Value, target: &mut dyn HostValue) -> Result<(), ValueError> {
    Decoder { hooks: false }.decode(value, target)
}

/// Turn a hook error back into the value error it carries, if any.
pub(crate) fn hook_to_value_error(value: &Value, err: HookError) -> ValueError {
    match err.downcast::<ValueError>() {
        Ok(err) => *err,
        Err(err) => ValueError::wrapped(value, err.to_string()),
    }
}

/// Convert between String and Number; every other pair is a type error.
pub fn convert_value(value: &Value, to: Type) -> Result<Value, ValueError> {
    if value.ty() == to {
        return Ok(value.clone());
    }
    match (value, to) {
        (Value::Number(n), Type::String) => Ok(Value::from(n.to_string())),
        (Value::String(text), Type::Number) => Number::parse(text)
            .map(Value::Number)
            .map_err(|_| ValueError::type_mismatch(value, to)),
        _ => Err(ValueError::type_mismatch(value, to)),
    }
}

fn conversion_result(value: &Value, result: Result<(), ConvertError>) -> Result<bool, ValueError> {
    match result {
        Ok(()) => Ok(true),
        Err(ConvertError::NoConversion) => Ok(false),
        Err(ConvertError::Failed(message)) => Err(ValueError::wrapped(value, message)),
    }
}

/// Give capsule hooks a chance: the target's `convert_from` first, then the
/// source capsule's `convert_into`.
pub(crate) fn try_capsule_conversion(
    value: &Value,
    target: &mut dyn HostValue,
    target_type: Type,
) -> Result<bool, ValueError> {
    if target_type == Type::Capsule && conversion_result(value, target.convert_from(value))? {
        trace!(host = target.type_of().name, "converted from {}", value.describe());
        return Ok(true);
    }
    if let Value::Capsule(capsule) = value {
        if conversion_result(value, capsule.convert_into(target))? {
            trace!(source = capsule.type_name(), "converted into {}", target.type_of().name);
            return Ok(true);
        }
    }
    Ok(false)
}

#[derive(Clone, Copy)]
struct Decoder {
    hooks: bool,
}

impl Decoder {
    fn decode(self, value: &Value, target: &mut dyn HostValue) -> Result<(), ValueError> {
        if value.is_null() {
            target.set_zero();
            return Ok(());
        }
        if let Some(inner) = target.deref_alloc() {
            return self.decode(value, inner);
        }

        let ty = target.type_of();
        let caps = ty.capabilities;
        if !caps.capsule && (caps.text || caps.duration) {
            let mut text = String::new();
            decode(value, &mut text)?;
            return target
                .unmarshal_text(&text)
                .map_err(|e| ValueError::wrapped(value, e.to_string()));
        }

        if target.assign_exact(value) {
            return Ok(());
        }
        if let Some(dynamic) = target.as_any_mut().downcast_mut::<Dynamic>() {
            *dynamic = Dynamic::from_value(value);
            return Ok(());
        }

        if self.hooks {
            if let Some(unmarshaler) = target.unmarshaler() {
                let mut inner = |into: &mut dyn HostValue| -> Result<(), HookError> {
                    decode_without_hooks(value, into).map_err(|e| Box::new(e) as HookError)
                };
                return unmarshaler
                    .unmarshal_river(&mut inner)
                    .map_err(|e| hook_to_value_error(value, e));
            }
        }

        let target_type = river_type(&ty);
        let mut converted = Cow::Borrowed(value);
        if value.ty() != target_type {
            if try_capsule_conversion(value, target, target_type)? {
                return Ok(());
            }
            converted = Cow::Owned(convert_value(value, target_type)?);
        } else if target_type == Type::Capsule {
            if try_capsule_conversion(value, target, target_type)? {
                return Ok(());
            }
            return Err(capsule_mismatch(&ty, value));
        }

        if self.hooks {
            if let Some(defaulter) = target.defaulter() {
                defaulter.set_to_default();
            }
        }
        target.decode_converted(&converted)?;
        if self.hooks {
            if let Some(validator) = target.validator() {
                validator
                    .validate()
                    .map_err(|e| hook_to_value_error(value, e))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_string_number_coercion() {
        assert_eq!(decode_into::<i64>(&Value::from("15")).unwrap(), 15);
        assert_eq!(decode_into::<f64>(&Value::from("1.5")).unwrap(), 1.5);
        assert_eq!(decode_into::<String>(&Value::from(15i64)).unwrap(), "15");
        assert_eq!(decode_into::<i32>(&Value::from("-3")).unwrap(), -3);
    }

    #[test]
    fn test_unparseable_string_is_type_error() {
        let err = decode_into::<i64>(&Value::from("abc")).unwrap_err();
        assert_eq!(err.to_string(), "expected number, got string");
        assert!(decode_into::<i64>(&Value::from("")).is_err());
    }

    #[test]
    fn test_other_mismatches_are_type_errors() {
        let err = decode_into::<bool>(&Value::from(1i64)).unwrap_err();
        assert!(matches!(err, ValueError::Type { expected: Type::Bool, .. }));
        let err = decode_into::<Vec<i64>>(&Value::from("x")).unwrap_err();
        assert!(matches!(err, ValueError::Type { expected: Type::Array, .. }));
    }

    #[test]
    fn test_null_zeroes() {
        let mut n = 5i64;
        decode(&Value::Null, &mut n).unwrap();
        assert_eq!(n, 0);

        let mut opt = Some(3i64);
        decode(&Value::Null, &mut opt).unwrap();
        assert_eq!(opt, None);
    }

    #[test]
    fn test_reference_is_allocated() {
        let mut opt: Option<Box<i64>> = None;
        decode(&Value::from(7i64), &mut opt).unwrap();
        assert_eq!(opt.as_deref(), Some(&7));
    }

    #[test]
    fn test_element_errors_carry_index() {
        let value = Value::array(vec![Value::from(1i64), Value::from(true)]);
        let err = decode_into::<Vec<i64>>(&value).unwrap_err();
        match &err {
            ValueError::Element { index, .. } => assert_eq!(*index, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_map_decoding() {
        let value = Value::from_entries([("a", Value::from(1i64)), ("b", Value::from("2"))]);
        let out = decode_into::<HashMap<String, u8>>(&value).unwrap();
        assert_eq!(out.get("a"), Some(&1));
        assert_eq!(out.get("b"), Some(&2));
    }

    #[test]
    fn test_fixed_array_length() {
        let value = Value::array(vec![Value::from(1i64)]);
        assert!(decode_into::<[i64; 2]>(&value).is_err());
        let value = Value::array(vec![Value::from(1i64), Value::from(2i64)]);
        assert_eq!(decode_into::<[i64; 2]>(&value).unwrap(), [1, 2]);
    }

    #[test]
    fn test_duration_from_string() {
        let out = decode_into::<std::time::Duration>(&Value::from("1m30s")).unwrap();
        assert_eq!(out, std::time::Duration::from_secs(90));
        assert!(decode_into::<std::time::Duration>(&Value::from("soon")).is_err());
    }

    #[test]
    fn test_exact_host_copy() {
        let source = vec![1i64, 2, 3];
        let value = source.encode();
        let mut out: Vec<i64> = Vec::new();
        assert!(out.assign_exact(&value));
        assert_eq!(out, source);
    }
}

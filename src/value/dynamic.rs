use std::any::Any;

use indexmap::IndexMap;

use super::host::{HostKind, HostType, HostValue};
use super::{CapsuleValue, Function, Value, ValueError};

/// Untyped host data, the target for "any" slots.
///
/// Numbers become `f64`. Functions and capsules are kept as River values.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Dynamic {
    #[default]
    Null,
    Number(f64),
    String(String),
    Bool(bool),
    Array(Vec<Dynamic>),
    Object(IndexMap<String, Dynamic>),
    Function(Function),
    Capsule(CapsuleValue),
}

impl Dynamic {
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Null => Dynamic::Null,
            Value::Number(n) => Dynamic::Number(n.as_f64()),
            Value::String(s) => Dynamic::String(s.to_string()),
            Value::Bool(b) => Dynamic::Bool(*b),
            Value::Array(array) => Dynamic::Array(array.iter().map(Dynamic::from_value).collect()),
            Value::Object(object) => Dynamic::Object(
                object
                    .iter()
                    .map(|(k, v)| (k.clone(), Dynamic::from_value(v)))
                    .collect(),
            ),
            Value::Function(f) => Dynamic::Function(f.clone()),
            Value::Capsule(c) => Dynamic::Capsule(c.clone()),
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Dynamic::Null => Value::Null,
            Dynamic::Number(n) => Value::from(*n),
            Dynamic::String(s) => Value::from(s.as_str()),
            Dynamic::Bool(b) => Value::Bool(*b),
            Dynamic::Array(items) => Value::array(items.iter().map(Dynamic::to_value).collect()),
            Dynamic::Object(entries) => Value::object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect(),
            ),
            Dynamic::Function(f) => Value::Function(f.clone()),
            Dynamic::Capsule(c) => Value::Capsule(c.clone()),
        }
    }
}

impl From<&Value> for Dynamic {
    fn from(value: &Value) -> Self {
        Dynamic::from_value(value)
    }
}

impl HostValue for Dynamic {
    fn host_type() -> HostType {
        HostType::of::<Dynamic>(HostKind::Dynamic)
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        self.to_value()
    }

    fn set_zero(&mut self) {
        *self = Dynamic::Null;
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        *self = Dynamic::from_value(value);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_numbers_become_floats() {
        let value = Value::array(vec![Value::from(1u64), Value::from("a"), Value::Null]);
        assert_eq!(
            Dynamic::from_value(&value),
            Dynamic::Array(vec![
                Dynamic::Number(1.0),
                Dynamic::String("a".into()),
                Dynamic::Null
            ])
        );
    }

    #[test]
    fn test_any_value_decodes_into_dynamic() {
        let value = Value::from_entries([("k", Value::from(true))]);
        let mut out = Dynamic::Null;
        crate::value::decode(&value, &mut out).unwrap();
        assert_eq!(out.to_value(), value);
    }
}

//! The River value model.
//!
//! A [`Value`] is an immutable handle over exactly one of eight [`Type`]s.
//! Containers are reference counted, so cloning a value never copies its
//! contents. Values built from host data remember the host value they came
//! from, which lets the decode engine copy a value back into an identical host
//! type without walking it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

mod capsule;
pub mod decode;
pub mod duration;
mod dynamic;
mod error;
mod function;
mod host;
mod number;
mod record;

pub use capsule::{Capsule, CapsuleObject, CapsuleValue, ConvertError};
pub use decode::{decode, decode_into};
pub use dynamic::Dynamic;
pub use error::{ValueError, ValueResult};
pub use function::{CallError, Function};
pub use host::{
    river_type, Capabilities, Defaulter, FunctionShape, HookError, HostKind, HostType, HostValue,
    Record, Sequence, Unmarshaler, Validator,
};
pub use number::{Bits, Number, NumberKind};
pub use record::{assign_exact, decode_record, encode_record, field, field_mut};

/// The eight River types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Type {
    Null,
    Number,
    String,
    Bool,
    Array,
    Object,
    Function,
    Capsule,
}

/// Wrap a host value.
pub fn encode<T: HostValue + ?Sized>(host: &T) -> Value {
    host.encode()
}

#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Number(Number),
    String(Arc<str>),
    Bool(bool),
    Array(Array),
    Object(Object),
    Function(Function),
    Capsule(CapsuleValue),
}

impl Value {
    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(Array::new(items))
    }

    pub fn object(entries: IndexMap<String, Value>) -> Self {
        Value::Object(Object::new(entries))
    }

    pub fn from_entries<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn ty(&self) -> Type {
        match self {
            Value::Null => Type::Null,
            Value::Number(_) => Type::Number,
            Value::String(_) => Type::String,
            Value::Bool(_) => Type::Bool,
            Value::Array(_) => Type::Array,
            Value::Object(_) => Type::Object,
            Value::Function(_) => Type::Function,
            Value::Capsule(_) => Type::Capsule,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Human-readable type name used in diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Value::Capsule(capsule) => format!("capsule({:?})", capsule.type_name()),
            other => other.ty().to_string(),
        }
    }

    fn expect_type(&self, expected: Type) -> ! {
        panic!("river: expected {}, got {}", expected, self.describe())
    }

    pub fn to_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => other.expect_type(Type::Bool),
        }
    }

    pub fn number(&self) -> Number {
        match self {
            Value::Number(n) => *n,
            other => other.expect_type(Type::Number),
        }
    }

    pub fn to_int(&self) -> i64 {
        self.number().as_i64()
    }

    pub fn to_uint(&self) -> u64 {
        self.number().as_u64()
    }

    pub fn to_float(&self) -> f64 {
        self.number().as_f64()
    }

    pub fn text(&self) -> &str {
        match self {
            Value::String(s) => s,
            other => other.expect_type(Type::String),
        }
    }

    /// Number of elements of an Array or keys of an Object.
    pub fn len(&self) -> usize {
        match self {
            Value::Array(array) => array.len(),
            Value::Object(object) => object.len(),
            other => other.expect_type(Type::Array),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn index(&self, index: usize) -> Value {
        match self {
            Value::Array(array) => match array.get(index) {
                Some(item) => item.clone(),
                None => panic!(
                    "river: index {index} out of range of array with length {}",
                    array.len()
                ),
            },
            other => other.expect_type(Type::Array),
        }
    }

    pub fn keys(&self) -> Vec<String> {
        match self {
            Value::Object(object) => object.keys().map(str::to_string).collect(),
            other => other.expect_type(Type::Object),
        }
    }

    pub fn key(&self, key: &str) -> Option<Value> {
        match self {
            Value::Object(object) => object.get(key).cloned(),
            other => other.expect_type(Type::Object),
        }
    }

    pub fn capsule(&self) -> &CapsuleValue {
        match self {
            Value::Capsule(capsule) => capsule,
            other => other.expect_type(Type::Capsule),
        }
    }

    /// Invoke a Function value.
    pub fn call(&self, args: &[Value]) -> Result<Value, ValueError> {
        let function = match self {
            Value::Function(function) => function,
            other => other.expect_type(Type::Function),
        };
        function.invoke(args).map_err(|err| match err {
            CallError::Argument { index, error } => ValueError::Argument {
                function: self.clone(),
                argument: args.get(index).cloned().unwrap_or_default(),
                index,
                inner: Box::new(error),
            },
            other => ValueError::wrapped(self, other.to_string()),
        })
    }

    /// The host value this value was encoded from, if it remembers one.
    pub fn host_any(&self) -> Option<&dyn Any> {
        match self {
            Value::Array(array) => array.host().map(|host| host.as_any()),
            Value::Object(object) => object.host().map(|host| host.as_any()),
            Value::Function(function) => function.host_any(),
            Value::Capsule(capsule) => Some(capsule.as_any()),
            _ => None,
        }
    }

    /// Identity of the allocation behind this value. Scalars have none.
    pub(crate) fn identity(&self) -> Option<usize> {
        match self {
            Value::String(s) => Some(Arc::as_ptr(s) as *const u8 as usize),
            Value::Array(array) => Some(Arc::as_ptr(&array.items) as usize),
            Value::Object(object) => Some(Arc::as_ptr(&object.entries) as usize),
            Value::Function(function) => Some(function.identity()),
            Value::Capsule(capsule) => Some(capsule.identity()),
            _ => None,
        }
    }
}

/// Ordered sequence of values.
#[derive(Clone)]
pub struct Array {
    items: Arc<Vec<Value>>,
    host: Option<Arc<dyn HostValue>>,
}

impl Array {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Arc::new(items),
            host: None,
        }
    }

    pub(crate) fn with_host(items: Vec<Value>, host: Arc<dyn HostValue>) -> Self {
        Self {
            items: Arc::new(items),
            host: Some(host),
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Value> {
        self.items.iter()
    }

    pub fn as_slice(&self) -> &[Value] {
        &self.items
    }

    pub fn host(&self) -> Option<&Arc<dyn HostValue>> {
        self.host.as_ref()
    }
}

/// String-keyed values in insertion order.
#[derive(Clone)]
pub struct Object {
    entries: Arc<IndexMap<String, Value>>,
    host: Option<Arc<dyn HostValue>>,
}

impl Object {
    pub fn new(entries: IndexMap<String, Value>) -> Self {
        Self {
            entries: Arc::new(entries),
            host: None,
        }
    }

    pub(crate) fn with_host(entries: IndexMap<String, Value>, host: Arc<dyn HostValue>) -> Self {
        Self {
            entries: Arc::new(entries),
            host: Some(host),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, String, Value> {
        self.entries.iter()
    }

    pub fn host(&self) -> Option<&Arc<dyn HostValue>> {
        self.host.as_ref()
    }
}

/// Structural equality: cross-type comparisons are unequal, numbers compare
/// after promotion, capsules by deep equality and functions never compare
/// equal, not even to themselves.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Number(a), Value::Number(b)) => a.loose_eq(b),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| x == y)
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            (Value::Capsule(a), Value::Capsule(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{}", crate::ast::quote(s)),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Array(array) => {
                write!(f, "[")?;
                for (i, item) in array.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Object(object) => {
                if object.is_empty() {
                    return write!(f, "{{}}");
                }
                write!(f, "{{ ")?;
                for (i, (key, value)) in object.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} = {value}", crate::ast::object_key(key))?;
                }
                write!(f, " }}")
            }
            Value::Function(function) => write!(f, "function({})", function.signature()),
            Value::Capsule(_) => write!(f, "{}", self.describe()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Number(n) => write!(f, "Number({n:?})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Array(array) => f.debug_list().entries(array.iter()).finish(),
            Value::Object(object) => f.debug_map().entries(object.iter()).finish(),
            Value::Function(function) => write!(f, "Function({})", function.signature()),
            Value::Capsule(capsule) => write!(f, "Capsule({})", capsule.type_name()),
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Number(Number::int(v))
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::Number(Number::uint(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Number(Number::float(v))
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(Arc::from(v))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::array(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Value::object(entries)
    }
}

impl From<Function> for Value {
    fn from(function: Function) -> Self {
        Value::Function(function)
    }
}

impl From<CapsuleValue> for Value {
    fn from(capsule: CapsuleValue) -> Self {
        Value::Capsule(capsule)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_describe() {
        assert_eq!(Value::Null.describe(), "null");
        assert_eq!(Value::from(1i64).describe(), "number");
        assert_eq!(Value::array(vec![]).describe(), "array");
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::array(vec![Value::from(1u64), Value::from("x")]);
        let b = Value::array(vec![Value::from(1.0), Value::from("x")]);
        assert_eq!(a, b);
        assert_ne!(Value::from("1"), Value::from(1i64));

        let left = Value::from_entries([("a", Value::from(true))]);
        let right = Value::from_entries([("a", Value::from(true))]);
        assert_eq!(left, right);
        assert_ne!(left, Value::from_entries([("b", Value::from(true))]));
    }

    fn add_one(x: i64) -> i64 {
        x + 1
    }

    #[test]
    fn test_functions_never_equal() {
        let f = Value::Function(Function::from_fn1(add_one));
        assert!(f != f.clone());
    }

    #[test]
    fn test_accessors() {
        let object = Value::from_entries([("b", Value::from(12i64)), ("a", Value::Null)]);
        assert_eq!(object.keys(), vec!["b".to_string(), "a".to_string()]);
        assert_eq!(object.key("b"), Some(Value::from(12i64)));
        assert_eq!(object.key("missing"), None);
        assert_eq!(object.len(), 2);

        let array = Value::array(vec![Value::from("x")]);
        assert_eq!(array.index(0).text(), "x");
    }

    #[test]
    #[should_panic(expected = "expected bool, got number")]
    fn test_accessor_type_mismatch_panics() {
        Value::from(1i64).to_bool();
    }

    #[test]
    fn test_display_renders_river_syntax() {
        let value = Value::from_entries([
            ("name", Value::from("John")),
            ("tags", Value::array(vec![Value::from(1u64), Value::Null])),
        ]);
        assert_eq!(value.to_string(), r#"{ name = "John", tags = [1, null] }"#);
    }
}

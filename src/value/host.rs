use std::any::{type_name, Any};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;

use super::capsule::ConvertError;
use super::decode::decode;
use super::number::{Bits, Number};
use super::{Array, Object, Type, Value, ValueError};
use crate::tags::{Field, RawTag};

/// Error type returned by user-supplied hooks.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

/// Capability markers that take precedence over the structural kind when
/// classifying a host type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub capsule: bool,
    pub text: bool,
    pub duration: bool,
}

/// Result shape of a host function type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionShape {
    pub results: usize,
    pub first_is_error: bool,
    pub last_is_error: bool,
}

impl FunctionShape {
    /// One non-error result.
    pub const VALUE: FunctionShape = FunctionShape {
        results: 1,
        first_is_error: false,
        last_is_error: false,
    };

    /// A value followed by an error.
    pub const FALLIBLE: FunctionShape = FunctionShape {
        results: 2,
        first_is_error: false,
        last_is_error: true,
    };
}

/// Structural kind of a host type.
#[derive(Debug, Clone, Copy)]
pub enum HostKind {
    Int(Bits),
    Uint(Bits),
    Float(Bits),
    Text,
    Bool,
    Sequence(fn() -> HostType),
    Array(usize, fn() -> HostType),
    Map { text_keys: bool },
    Record(fn() -> Arc<[Field]>),
    Function(FunctionShape),
    Dynamic,
    Opaque,
}

/// Static description of a host type.
#[derive(Debug, Clone, Copy)]
pub struct HostType {
    pub name: &'static str,
    pub kind: HostKind,
    pub capabilities: Capabilities,
}

impl HostType {
    pub fn of<T: ?Sized>(kind: HostKind) -> Self {
        Self {
            name: type_name::<T>(),
            kind,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn record<R: Record + 'static>() -> Self {
        Self::of::<R>(HostKind::Record(crate::tags::resolve::<R>))
    }

    pub fn capsule<T: ?Sized>() -> Self {
        Self::of::<T>(HostKind::Opaque).with_capabilities(Capabilities {
            capsule: true,
            ..Capabilities::default()
        })
    }

    pub fn text<T: ?Sized>() -> Self {
        Self::of::<T>(HostKind::Opaque).with_capabilities(Capabilities {
            text: true,
            ..Capabilities::default()
        })
    }

    pub fn duration<T: ?Sized>() -> Self {
        Self::of::<T>(HostKind::Opaque).with_capabilities(Capabilities {
            duration: true,
            ..Capabilities::default()
        })
    }

    /// Fields of a record type, if this is one.
    pub fn fields(&self) -> Option<Arc<[Field]>> {
        match self.kind {
            HostKind::Record(fields) => Some(fields()),
            _ => None,
        }
    }

    /// Whether this is a record type declaring a label field.
    pub fn is_labelled_record(&self) -> bool {
        !self.capabilities.capsule
            && self
                .fields()
                .is_some_and(|fields| fields.iter().any(Field::is_label))
    }
}

/// Classify a host type into one of the eight River types.
pub fn river_type(ty: &HostType) -> Type {
    let caps = ty.capabilities;
    if caps.capsule {
        return Type::Capsule;
    }
    if caps.text || caps.duration {
        return Type::String;
    }
    match ty.kind {
        HostKind::Int(_) | HostKind::Uint(_) | HostKind::Float(_) => Type::Number,
        HostKind::Text => Type::String,
        HostKind::Bool => Type::Bool,
        HostKind::Sequence(elem) | HostKind::Array(_, elem) => {
            if elem().is_labelled_record() {
                Type::Object
            } else {
                Type::Array
            }
        }
        HostKind::Map { text_keys: true } => Type::Object,
        HostKind::Map { text_keys: false } => Type::Capsule,
        HostKind::Record(fields) => {
            if fields().is_empty() {
                Type::Capsule
            } else {
                Type::Object
            }
        }
        HostKind::Function(shape) => {
            let value = shape.results == 1 && !shape.first_is_error;
            let fallible = shape.results == 2 && !shape.first_is_error && shape.last_is_error;
            if value || fallible {
                Type::Function
            } else {
                Type::Capsule
            }
        }
        HostKind::Dynamic | HostKind::Opaque => Type::Capsule,
    }
}

/// A Rust type that can be encoded into and decoded from River values.
///
/// Besides the required conversions, types opt into the optional
/// capabilities (hooks, record access, sequence access) by overriding the
/// corresponding accessor. Absent capabilities are simply skipped.
pub trait HostValue: Any + Send + Sync {
    fn host_type() -> HostType
    where
        Self: Sized;

    /// Dynamic counterpart of [`HostValue::host_type`].
    fn type_of(&self) -> HostType;

    fn encode(&self) -> Value;

    /// Encoding used for values inside an encoded container. Containers leave
    /// out their own host copy here, the outermost one already holds it.
    fn encode_nested(&self) -> Value {
        self.encode()
    }

    /// Reset to the zero value of the type.
    fn set_zero(&mut self);

    /// Write a value whose River type already matches this type's.
    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Fast path: copy the value when it wraps a host value of exactly this
    /// type.
    fn assign_exact(&mut self, _value: &Value) -> bool {
        false
    }

    /// References (`Option`, `Box`) return their pointee, allocating it first
    /// when absent.
    fn deref_alloc(&mut self) -> Option<&mut dyn HostValue> {
        None
    }

    /// Parse from text. Only called when the type declares the text or
    /// duration capability.
    fn unmarshal_text(&mut self, _text: &str) -> Result<(), HookError> {
        Err(format!("{} cannot be parsed from text", self.type_of().name).into())
    }

    /// Capsule conversion from an arbitrary value.
    fn convert_from(&mut self, _from: &Value) -> Result<(), ConvertError> {
        Err(ConvertError::NoConversion)
    }

    fn unmarshaler(&mut self) -> Option<&mut dyn Unmarshaler> {
        None
    }

    fn defaulter(&mut self) -> Option<&mut dyn Defaulter> {
        None
    }

    fn validator(&self) -> Option<&dyn Validator> {
        None
    }

    fn record(&self) -> Option<&dyn Record> {
        None
    }

    /// Record access for writing; references allocate on the way.
    fn record_mut(&mut self) -> Option<&mut dyn Record> {
        None
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn Sequence> {
        None
    }
}

/// Takes over decoding of a block or value entirely.
///
/// `decode` populates any target, bypassing that target's own lifecycle
/// hooks, so an implementation can pass itself to it and post-process.
pub trait Unmarshaler {
    fn unmarshal_river(
        &mut self,
        decode: &mut dyn FnMut(&mut dyn HostValue) -> Result<(), HookError>,
    ) -> Result<(), HookError>;
}

/// Called before a record is populated.
pub trait Defaulter {
    fn set_to_default(&mut self);
}

/// Called after a record is populated.
pub trait Validator {
    fn validate(&self) -> Result<(), HookError>;
}

/// Field access for host records. Implemented by `#[derive(River)]`.
pub trait Record: Send + Sync {
    /// Annotation text of every struct field, in declaration order.
    fn raw_tags() -> Vec<RawTag>
    where
        Self: Sized;

    fn fields(&self) -> Arc<[Field]>;

    fn field(&self, index: usize) -> &dyn HostValue;

    fn field_mut(&mut self, index: usize) -> &mut dyn HostValue;

    fn as_host(&self) -> &dyn HostValue;

    fn as_host_mut(&mut self) -> &mut dyn HostValue;
}

/// Indexed access used when repeated blocks fill a sequence.
pub trait Sequence {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` for growable sequences.
    fn fixed_len(&self) -> Option<usize>;

    /// Replace the contents with `len` zero values. Fixed arrays only zero
    /// their elements.
    fn reset(&mut self, len: usize);

    fn element_mut(&mut self, index: usize) -> &mut dyn HostValue;
}

macro_rules! number_host {
    ($($ty:ty => $kind:ident($bits:ident), $ctor:ident as $repr:ty, $read:ident;)*) => {
        $(
            impl HostValue for $ty {
                fn host_type() -> HostType {
                    HostType::of::<$ty>(HostKind::$kind(Bits::$bits))
                }

                fn type_of(&self) -> HostType {
                    Self::host_type()
                }

                fn encode(&self) -> Value {
                    Value::Number(Number::$ctor(*self as $repr).with_bits(Bits::$bits))
                }

                fn set_zero(&mut self) {
                    *self = Default::default();
                }

                fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
                    match value {
                        Value::Number(n) => {
                            *self = n.$read() as $ty;
                            Ok(())
                        }
                        other => Err(ValueError::type_mismatch(other, Type::Number)),
                    }
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn Any {
                    self
                }
            }
        )*
    };
}

number_host! {
    i8 => Int(B8), int as i64, as_i64;
    i16 => Int(B16), int as i64, as_i64;
    i32 => Int(B32), int as i64, as_i64;
    i64 => Int(B64), int as i64, as_i64;
    isize => Int(Native), int as i64, as_i64;
    u8 => Uint(B8), uint as u64, as_u64;
    u16 => Uint(B16), uint as u64, as_u64;
    u32 => Uint(B32), uint as u64, as_u64;
    u64 => Uint(B64), uint as u64, as_u64;
    usize => Uint(Native), uint as u64, as_u64;
    f32 => Float(B32), float as f64, as_f64;
    f64 => Float(B64), float as f64, as_f64;
}

impl HostValue for String {
    fn host_type() -> HostType {
        HostType::of::<String>(HostKind::Text)
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        Value::from(self.as_str())
    }

    fn set_zero(&mut self) {
        self.clear();
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        match value {
            Value::String(s) => {
                *self = s.to_string();
                Ok(())
            }
            other => Err(ValueError::type_mismatch(other, Type::String)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

impl HostValue for bool {
    fn host_type() -> HostType {
        HostType::of::<bool>(HostKind::Bool)
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        Value::Bool(*self)
    }

    fn set_zero(&mut self) {
        *self = false;
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        match value {
            Value::Bool(b) => {
                *self = *b;
                Ok(())
            }
            other => Err(ValueError::type_mismatch(other, Type::Bool)),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Copy `value` into `target` when it was encoded from a `T`.
fn clone_exact<T: Clone + 'static>(target: &mut T, value: &Value) -> bool {
    match value.host_any().and_then(|host| host.downcast_ref::<T>()) {
        Some(source) => {
            *target = source.clone();
            true
        }
        None => false,
    }
}

/// Decode an Object keyed by label into fresh labelled records.
fn decode_labelled<T: HostValue + Default>(value: &Value) -> Result<Vec<T>, ValueError> {
    let Value::Object(object) = value else {
        return Err(ValueError::type_mismatch(value, Type::Object));
    };
    let mut out = Vec::with_capacity(object.len());
    for (label, inner) in object.iter() {
        // a one-key object is exactly what a labelled record decodes from
        let wrapped = Value::from_entries([(label.clone(), inner.clone())]);
        let mut elem = T::default();
        decode(&wrapped, &mut elem).map_err(|e| ValueError::field(value, label, e))?;
        out.push(elem);
    }
    Ok(out)
}

fn decode_elements<T: HostValue + Default>(value: &Value) -> Result<Vec<T>, ValueError> {
    let Value::Array(array) = value else {
        return Err(ValueError::type_mismatch(value, Type::Array));
    };
    let mut out = Vec::with_capacity(array.len());
    for (i, item) in array.iter().enumerate() {
        let mut elem = T::default();
        decode(item, &mut elem).map_err(|e| ValueError::element(value, i, e))?;
        out.push(elem);
    }
    Ok(out)
}

fn encode_elements<'a, T: HostValue>(
    items: impl Iterator<Item = &'a T>,
    labelled: bool,
    host: Option<Arc<dyn HostValue>>,
) -> Value {
    if labelled {
        let mut entries = IndexMap::new();
        for item in items {
            if let Value::Object(object) = item.encode_nested() {
                for (label, inner) in object.iter() {
                    entries.insert(label.clone(), inner.clone());
                }
            }
        }
        return match host {
            Some(host) => Value::Object(Object::with_host(entries, host)),
            None => Value::object(entries),
        };
    }
    let items: Vec<Value> = items.map(|item| item.encode_nested()).collect();
    match host {
        Some(host) => Value::Array(Array::with_host(items, host)),
        None => Value::array(items),
    }
}

impl<T: HostValue + Clone + Default> HostValue for Vec<T> {
    fn host_type() -> HostType {
        HostType::of::<Vec<T>>(HostKind::Sequence(T::host_type))
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        let labelled = T::host_type().is_labelled_record();
        encode_elements(self.iter(), labelled, Some(Arc::new(self.clone())))
    }

    fn encode_nested(&self) -> Value {
        encode_elements(self.iter(), T::host_type().is_labelled_record(), None)
    }

    fn set_zero(&mut self) {
        self.clear();
    }

    fn assign_exact(&mut self, value: &Value) -> bool {
        clone_exact(self, value)
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        *self = match value {
            Value::Object(_) => decode_labelled(value)?,
            _ => decode_elements(value)?,
        };
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn Sequence> {
        Some(self)
    }
}

impl<T: HostValue + Default> Sequence for Vec<T> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn fixed_len(&self) -> Option<usize> {
        None
    }

    fn reset(&mut self, len: usize) {
        self.clear();
        self.resize_with(len, T::default);
    }

    fn element_mut(&mut self, index: usize) -> &mut dyn HostValue {
        &mut self[index]
    }
}

impl<T: HostValue + Clone + Default, const N: usize> HostValue for [T; N] {
    fn host_type() -> HostType {
        HostType::of::<[T; N]>(HostKind::Array(N, T::host_type))
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        let labelled = T::host_type().is_labelled_record();
        encode_elements(self.iter(), labelled, Some(Arc::new(self.clone())))
    }

    fn encode_nested(&self) -> Value {
        encode_elements(self.iter(), T::host_type().is_labelled_record(), None)
    }

    fn set_zero(&mut self) {
        self.iter_mut().for_each(|item| *item = T::default());
    }

    fn assign_exact(&mut self, value: &Value) -> bool {
        clone_exact(self, value)
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        let items: Vec<T> = match value {
            Value::Object(_) => decode_labelled(value)?,
            _ => decode_elements(value)?,
        };
        if items.len() != N {
            return Err(ValueError::wrapped(
                value,
                format!("array must have exactly {N} elements, got {}", items.len()),
            ));
        }
        for (slot, item) in self.iter_mut().zip(items) {
            *slot = item;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn Sequence> {
        Some(self)
    }
}

impl<T: HostValue + Default, const N: usize> Sequence for [T; N] {
    fn len(&self) -> usize {
        N
    }

    fn fixed_len(&self) -> Option<usize> {
        Some(N)
    }

    fn reset(&mut self, _len: usize) {
        self.iter_mut().for_each(|item| *item = T::default());
    }

    fn element_mut(&mut self, index: usize) -> &mut dyn HostValue {
        &mut self[index]
    }
}

fn encode_entries<'a, V: HostValue>(
    entries: impl Iterator<Item = (&'a String, &'a V)>,
) -> IndexMap<String, Value> {
    entries
        .map(|(key, value)| (key.clone(), value.encode_nested()))
        .collect()
}

macro_rules! map_host {
    ($($map:ident),*) => {
        $(
            impl<V: HostValue + Clone + Default> HostValue for $map<String, V> {
                fn host_type() -> HostType {
                    HostType::of::<$map<String, V>>(HostKind::Map { text_keys: true })
                }

                fn type_of(&self) -> HostType {
                    Self::host_type()
                }

                fn encode(&self) -> Value {
                    Value::Object(Object::with_host(encode_entries(self.iter()), Arc::new(self.clone())))
                }

                fn encode_nested(&self) -> Value {
                    Value::object(encode_entries(self.iter()))
                }

                fn set_zero(&mut self) {
                    self.clear();
                }

                fn assign_exact(&mut self, value: &Value) -> bool {
                    clone_exact(self, value)
                }

                fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
                    let Value::Object(object) = value else {
                        return Err(ValueError::type_mismatch(value, Type::Object));
                    };
                    let mut out = $map::new();
                    for (key, item) in object.iter() {
                        let mut elem = V::default();
                        decode(item, &mut elem).map_err(|e| ValueError::field(value, key, e))?;
                        out.insert(key.clone(), elem);
                    }
                    *self = out;
                    Ok(())
                }

                fn as_any(&self) -> &dyn Any {
                    self
                }

                fn as_any_mut(&mut self) -> &mut dyn Any {
                    self
                }
            }
        )*
    };
}

map_host!(HashMap, BTreeMap, IndexMap);

/// Optional reference: `None` is River's null, and writing through it
/// allocates.
impl<T: HostValue + Default> HostValue for Option<T> {
    fn host_type() -> HostType {
        T::host_type()
    }

    fn type_of(&self) -> HostType {
        match self {
            Some(inner) => inner.type_of(),
            None => T::host_type(),
        }
    }

    fn encode(&self) -> Value {
        match self {
            Some(inner) => inner.encode(),
            None => Value::Null,
        }
    }

    fn encode_nested(&self) -> Value {
        match self {
            Some(inner) => inner.encode_nested(),
            None => Value::Null,
        }
    }

    fn set_zero(&mut self) {
        *self = None;
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        self.get_or_insert_with(T::default).decode_converted(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn deref_alloc(&mut self) -> Option<&mut dyn HostValue> {
        Some(self.get_or_insert_with(T::default))
    }

    fn record(&self) -> Option<&dyn Record> {
        self.as_ref().and_then(|inner| inner.record())
    }

    fn record_mut(&mut self) -> Option<&mut dyn Record> {
        self.get_or_insert_with(T::default).record_mut()
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn Sequence> {
        self.get_or_insert_with(T::default).sequence_mut()
    }
}

impl<T: HostValue + Default> HostValue for Box<T> {
    fn host_type() -> HostType {
        T::host_type()
    }

    fn type_of(&self) -> HostType {
        (**self).type_of()
    }

    fn encode(&self) -> Value {
        (**self).encode()
    }

    fn encode_nested(&self) -> Value {
        (**self).encode_nested()
    }

    fn set_zero(&mut self) {
        **self = T::default();
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        (**self).decode_converted(value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn deref_alloc(&mut self) -> Option<&mut dyn HostValue> {
        Some(&mut **self)
    }

    fn record(&self) -> Option<&dyn Record> {
        (**self).record()
    }

    fn record_mut(&mut self) -> Option<&mut dyn Record> {
        (**self).record_mut()
    }

    fn sequence_mut(&mut self) -> Option<&mut dyn Sequence> {
        (**self).sequence_mut()
    }
}

/// Opt a `Display + FromStr` type into River as a String.
#[macro_export]
macro_rules! text_value {
    ($ty:ty) => {
        impl $crate::HostValue for $ty {
            fn host_type() -> $crate::HostType {
                $crate::HostType::text::<$ty>()
            }

            fn type_of(&self) -> $crate::HostType {
                <$ty as $crate::HostValue>::host_type()
            }

            fn encode(&self) -> $crate::Value {
                $crate::Value::from(::std::string::ToString::to_string(self))
            }

            fn set_zero(&mut self) {
                *self = ::core::default::Default::default();
            }

            fn decode_converted(
                &mut self,
                value: &$crate::Value,
            ) -> ::core::result::Result<(), $crate::ValueError> {
                let text = value.text().to_string();
                $crate::HostValue::unmarshal_text(self, &text)
                    .map_err(|e| $crate::ValueError::wrapped(value, e.to_string()))
            }

            fn unmarshal_text(&mut self, text: &str) -> ::core::result::Result<(), $crate::HookError> {
                *self = text
                    .parse::<$ty>()
                    .map_err(|e| -> $crate::HookError { e.to_string().into() })?;
                Ok(())
            }

            fn as_any(&self) -> &dyn ::core::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::core::any::Any {
                self
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn opaque(kind: HostKind) -> HostType {
        HostType::of::<()>(kind)
    }

    #[test]
    fn test_capability_precedence() {
        let both = opaque(HostKind::Text).with_capabilities(Capabilities {
            capsule: true,
            text: true,
            duration: false,
        });
        assert_eq!(river_type(&both), Type::Capsule);

        let text = opaque(HostKind::Bool).with_capabilities(Capabilities {
            text: true,
            ..Default::default()
        });
        assert_eq!(river_type(&text), Type::String);
        assert_eq!(river_type(&std::time::Duration::host_type()), Type::String);
    }

    #[test]
    fn test_structural_kinds() {
        assert_eq!(river_type(&i8::host_type()), Type::Number);
        assert_eq!(river_type(&f32::host_type()), Type::Number);
        assert_eq!(river_type(&String::host_type()), Type::String);
        assert_eq!(river_type(&bool::host_type()), Type::Bool);
        assert_eq!(river_type(&Vec::<i64>::host_type()), Type::Array);
        assert_eq!(river_type(&<[u8; 4]>::host_type()), Type::Array);
        assert_eq!(river_type(&HashMap::<String, i64>::host_type()), Type::Object);
        assert_eq!(river_type(&opaque(HostKind::Map { text_keys: false })), Type::Capsule);
        assert_eq!(river_type(&opaque(HostKind::Dynamic)), Type::Capsule);
        assert_eq!(river_type(&opaque(HostKind::Opaque)), Type::Capsule);
        assert_eq!(river_type(&Option::<Box<i64>>::host_type()), Type::Number);
    }

    #[test]
    fn test_function_shapes() {
        let shape = |results, first_is_error, last_is_error| {
            opaque(HostKind::Function(FunctionShape {
                results,
                first_is_error,
                last_is_error,
            }))
        };
        assert_eq!(river_type(&shape(1, false, false)), Type::Function);
        assert_eq!(river_type(&shape(2, false, true)), Type::Function);
        assert_eq!(river_type(&shape(1, true, true)), Type::Capsule);
        assert_eq!(river_type(&shape(2, false, false)), Type::Capsule);
        assert_eq!(river_type(&shape(3, false, true)), Type::Capsule);
        assert_eq!(river_type(&shape(0, false, false)), Type::Capsule);
    }

    #[test]
    fn test_encode_numbers_keep_kind() {
        assert_eq!(5u8.encode().number().kind(), crate::NumberKind::Uint);
        assert_eq!((-5i16).encode().number().kind(), crate::NumberKind::Int);
        assert_eq!(2.5f32.encode().number().bits(), Bits::B32);
    }

    #[test]
    fn test_option_encodes_null() {
        assert!(Option::<i64>::None.encode().is_null());
        assert_eq!(Some(3i64).encode(), Value::from(3i64));
    }

    #[test]
    fn test_nested_sequences_share_one_host_copy() {
        let source = vec![vec![1i64], vec![2, 3]];
        let value = source.encode();
        let Value::Array(outer) = &value else {
            panic!("expected array, got {}", value.describe());
        };
        assert!(outer.host().is_some());
        assert!(outer
            .iter()
            .all(|item| matches!(item, Value::Array(inner) if inner.host().is_none())));

        assert_eq!(crate::value::decode_into::<Vec<Vec<i64>>>(&value).unwrap(), source);
        assert_eq!(crate::value::decode_into::<Vec<i64>>(&value.index(1)).unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_nested_maps_share_one_host_copy() {
        let source = HashMap::from([("a".to_string(), vec![1i64, 2])]);
        let value = source.encode();
        let Value::Object(outer) = &value else {
            panic!("expected object, got {}", value.describe());
        };
        assert!(outer.host().is_some());
        assert!(matches!(outer.get("a"), Some(Value::Array(inner)) if inner.host().is_none()));
        assert_eq!(crate::value::decode_into::<HashMap<String, Vec<i64>>>(&value).unwrap(), source);
    }
}

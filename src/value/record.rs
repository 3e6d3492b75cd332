//! Records seen as Objects.
//!
//! A record exposes one key per attribute or block field, nested along
//! multi-part block names. The label field is not a key: a labelled record
//! is wrapped as `{ <label> = { ... } }` instead.

use std::sync::Arc;

use indexmap::IndexMap;

use super::decode::decode;
use super::host::{HostValue, Record};
use super::{CapsuleValue, Object, Type, Value, ValueError};
use crate::tags::Field;

/// Copy `value` into `target` when it was encoded from a `T`.
pub fn assign_exact<T: HostValue + Clone>(target: &mut T, value: &Value) -> bool {
    match value.host_any().and_then(|host| host.downcast_ref::<T>()) {
        Some(source) => {
            *target = source.clone();
            true
        }
        None => false,
    }
}

/// Follow an index path. `None` when it crosses an unallocated reference.
pub fn field<'a>(record: &'a dyn Record, path: &[usize]) -> Option<&'a dyn HostValue> {
    let (first, rest) = path.split_first()?;
    let mut current = record.field(*first);
    for index in rest {
        current = current.record()?.field(*index);
    }
    Some(current)
}

/// Follow an index path for writing, allocating references on the way.
pub fn field_mut<'a>(record: &'a mut dyn Record, path: &[usize]) -> &'a mut dyn HostValue {
    let Some((first, rest)) = path.split_first() else {
        return record.as_host_mut();
    };
    let mut current = record.field_mut(*first);
    for index in rest {
        let name = current.type_of().name;
        current = match current.record_mut() {
            Some(inner) => inner.field_mut(*index),
            None => panic!("river: squashed field of type {name} is not a record"),
        };
    }
    current
}

fn insert_path(entries: &mut IndexMap<String, Value>, path: &[String], value: Value) {
    match path {
        [] => {}
        [last] => {
            entries.insert(last.clone(), value);
        }
        [first, rest @ ..] => {
            let mut inner: IndexMap<String, Value> = match entries.get(first) {
                Some(Value::Object(object)) => object
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
                _ => IndexMap::new(),
            };
            insert_path(&mut inner, rest, value);
            entries.insert(first.clone(), Value::object(inner));
        }
    }
}

/// Encode a record as an Object, or as an opaque capsule when it declares no
/// fields.
pub fn encode_record<R: Record + HostValue + Clone>(record: &R) -> Value {
    let fields = record.fields();
    if fields.is_empty() {
        return Value::Capsule(CapsuleValue::opaque(record.clone()));
    }

    let mut entries = IndexMap::new();
    let mut label = None;
    for f in fields.iter() {
        let Some(host) = field(record, &f.index) else {
            continue;
        };
        let value = host.encode_nested();
        if f.is_label() {
            if let Value::String(text) = value {
                label = Some(text.to_string());
            }
            continue;
        }
        if f.is_optional() && f.is_block() && value.is_null() {
            continue;
        }
        insert_path(&mut entries, &f.name, value);
    }

    let host: Arc<dyn HostValue> = Arc::new(record.clone());
    match label {
        Some(label) => {
            let wrapped = IndexMap::from([(label, Value::object(entries))]);
            Value::Object(Object::with_host(wrapped, host))
        }
        None => Value::Object(Object::with_host(entries, host)),
    }
}

/// Populate a record from an Object by matching keys against field names.
pub fn decode_record(value: &Value, target: &mut dyn Record) -> Result<(), ValueError> {
    let fields = target.fields();
    let label = fields
        .iter()
        .find(|f| f.is_label())
        .map(|f| f.index.clone());
    decode_fields(value, target, &fields, &[], label.as_deref())
}

fn decode_fields(
    value: &Value,
    target: &mut dyn Record,
    fields: &[Field],
    prefix: &[String],
    label: Option<&[usize]>,
) -> Result<(), ValueError> {
    let Value::Object(object) = value else {
        return Err(ValueError::type_mismatch(value, Type::Object));
    };
    let source = object
        .host()
        .and_then(|host| host.record())
        .map(|record| record.fields());

    for (key, inner) in object.iter() {
        // labelled records arrive wrapped in their label
        if let Some(label) = label {
            if !matches!(inner, Value::Object(_)) {
                return Err(ValueError::field(
                    value,
                    key,
                    ValueError::type_mismatch(inner, Type::Object),
                ));
            }
            decode(&Value::from(key.as_str()), field_mut(target, label))
                .map_err(|e| ValueError::field(value, key, e))?;
            decode_fields(inner, target, fields, prefix, None)?;
            continue;
        }

        let mut path = prefix.to_vec();
        path.push(key.clone());

        if let Some(f) = fields.iter().find(|f| !f.is_label() && f.name == path) {
            decode(inner, field_mut(target, &f.index))
                .map_err(|e| ValueError::field(value, key, e))?;
        } else if fields
            .iter()
            .any(|f| f.name.len() > path.len() && f.name.starts_with(&path))
        {
            decode_fields(inner, target, fields, &path, None)
                .map_err(|e| ValueError::field(value, key, e))?;
        } else if source.as_ref().is_some_and(|source| {
            source
                .iter()
                .any(|f| f.name == path && f.is_optional())
        }) {
            continue;
        } else {
            return Err(ValueError::missing_key(value, key));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::decode_into;
    use crate::River;
    use pretty_assertions::assert_eq;

    #[derive(River, Debug, Clone, Default, PartialEq)]
    struct Client {
        #[river("ca,attr")]
        ca: String,
    }

    #[derive(River, Debug, Clone, Default, PartialEq)]
    struct Remote {
        #[river("tls.client,block")]
        client: Client,
    }

    #[test]
    fn test_dotted_names_decode_from_nested_objects() {
        let client = Value::from_entries([("ca", Value::from("root.pem"))]);
        let value = Value::from_entries([("tls", Value::from_entries([("client", client)]))]);
        let remote: Remote = decode_into(&value).unwrap();
        assert_eq!(remote.client.ca, "root.pem");
    }

    #[test]
    fn test_missing_nested_key_names_inner_object() {
        let tls = Value::from_entries([
            ("client", Value::from_entries([("ca", Value::from("x"))])),
            ("bogus", Value::from(1i64)),
        ]);
        let value = Value::from_entries([("tls", tls.clone())]);
        let err = decode_into::<Remote>(&value).unwrap_err();
        let ValueError::Field { field, inner, .. } = &err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(field, "tls");
        match inner.as_ref() {
            ValueError::MissingKey { value, missing } => {
                assert_eq!(missing, "bogus");
                assert_eq!(value, &tls);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), r#"key "bogus" does not exist"#);
    }
}

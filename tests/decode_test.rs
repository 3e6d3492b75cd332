use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use river::ast::{Expression, Statement};
use river::value::{decode, decode_into, encode};
use river::{Capsule, ConvertError, Dynamic, Evaluator, River, Value, ValueError};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[ctor::ctor]
fn init_tests() {
    // tracing_subscriberの初期化
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

#[test]
fn test_numeric_coercions() {
    assert_eq!(decode_into::<f32>(&encode(&15i64)).unwrap(), 15.0);
    assert_eq!(decode_into::<u64>(&encode(&"15".to_string())).unwrap(), 15);
    assert_eq!(decode_into::<i8>(&encode(&15u32)).unwrap(), 15);
    assert_eq!(decode_into::<String>(&encode(&15u8)).unwrap(), "15");
    assert_eq!(decode_into::<String>(&encode(&-15i16)).unwrap(), "-15");
    assert_eq!(decode_into::<String>(&encode(&1.25f64)).unwrap(), "1.25");
    assert_eq!(decode_into::<f64>(&encode(&"2.5e1".to_string())).unwrap(), 25.0);
}

proptest! {
    #[test]
    fn test_small_numbers_survive_every_width(n in 0u8..=127) {
        let value = encode(&n);
        prop_assert_eq!(decode_into::<i8>(&value).unwrap(), n as i8);
        prop_assert_eq!(decode_into::<u16>(&value).unwrap(), n as u16);
        prop_assert_eq!(decode_into::<i32>(&value).unwrap(), n as i32);
        prop_assert_eq!(decode_into::<usize>(&value).unwrap(), n as usize);
        prop_assert_eq!(decode_into::<f32>(&value).unwrap(), n as f32);
        prop_assert_eq!(decode_into::<u64>(&encode(&n.to_string())).unwrap(), n as u64);
    }
}

#[test]
fn test_decoded_sequence_is_independent() {
    let mut source = vec![vec![1i64, 2], vec![3]];
    let value = encode(&source);
    let copy: Vec<Vec<i64>> = decode_into(&value).unwrap();
    source[0].push(99);
    assert_eq!(copy, vec![vec![1, 2], vec![3]]);

    let mut again: Vec<Vec<i64>> = decode_into(&value).unwrap();
    again[1].clear();
    assert_eq!(copy[1], vec![3]);
}

#[test]
fn test_decoded_map_is_independent() {
    let mut source: HashMap<String, Vec<String>> = HashMap::new();
    source.insert("a".into(), vec!["x".into()]);
    let value = encode(&source);
    let copy: HashMap<String, Vec<String>> = decode_into(&value).unwrap();
    source.get_mut("a").unwrap().push("y".into());
    assert_eq!(copy["a"], vec!["x".to_string()]);
}

#[derive(Debug, Default)]
struct Registry {
    names: Mutex<Vec<String>>,
}

impl Capsule for Registry {}

#[test]
fn test_shared_capsule_aliases_its_source() {
    let registry = Arc::new(Registry::default());
    let value = encode(&registry);

    let mut first: Arc<Registry> = Arc::default();
    let mut second: Arc<Registry> = Arc::default();
    decode(&value, &mut first).unwrap();
    decode(&value, &mut second).unwrap();

    first.names.lock().unwrap().push("exporter".into());
    assert_eq!(*second.names.lock().unwrap(), vec!["exporter".to_string()]);
    assert!(Arc::ptr_eq(&registry, &second));
}

#[derive(Debug, Clone, Default, PartialEq)]
struct Level(u8);

impl Capsule for Level {
    fn convert_from(&mut self, from: &Value) -> Result<(), ConvertError> {
        let Value::String(text) = from else {
            return Err(ConvertError::NoConversion);
        };
        self.0 = match text.as_ref() {
            "debug" => 0,
            "info" => 1,
            "warn" => 2,
            other => return Err(ConvertError::Failed(format!("unknown level {other:?}"))),
        };
        Ok(())
    }
}

river::capsule!(Level);

#[test]
fn test_capsule_conversion_hook() {
    assert_eq!(decode_into::<Level>(&Value::from("warn")).unwrap(), Level(2));

    let err = decode_into::<Level>(&Value::from("loud")).unwrap_err();
    assert_eq!(err.to_string(), "unknown level \"loud\"");

    // フックが対応しない型は通常の型エラー
    assert!(decode_into::<Level>(&Value::from(true)).is_err());
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Target {
    #[river("url,attr")]
    url: String,
    #[river("retries,attr,optional")]
    retries: u32,
}

#[test]
fn test_object_into_record() {
    let value = Value::from_entries([("url", Value::from("http://a")), ("retries", Value::from(3i64))]);
    let target: Target = decode_into(&value).unwrap();
    assert_eq!(
        target,
        Target {
            url: "http://a".into(),
            retries: 3,
        }
    );

    let value = Value::from_entries([("name", Value::from("John"))]);
    let err = decode_into::<Target>(&value).unwrap_err();
    match err {
        ValueError::MissingKey { missing, .. } => assert_eq!(missing, "name"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_record_round_trips_through_object() {
    let source = Target {
        url: "http://b".into(),
        retries: 1,
    };
    let value = encode(&source);
    assert_eq!(value.keys(), vec!["url".to_string(), "retries".to_string()]);
    let copy: Target = decode_into(&value).unwrap();
    assert_eq!(copy, source);
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Listener {
    #[river(",label")]
    name: String,
    #[river("port,attr")]
    port: u16,
}

#[test]
fn test_labelled_record_into_map() {
    let listener = Listener {
        name: "web".into(),
        port: 8080,
    };
    let out: HashMap<String, Dynamic> = decode_into(&encode(&listener)).unwrap();
    assert_eq!(out.len(), 1);
    let expected = Dynamic::Object(IndexMap::from([("port".to_string(), Dynamic::Number(8080.0))]));
    assert_eq!(out.get("web"), Some(&expected));

    let back: Listener = decode_into(&encode(&out)).unwrap();
    assert_eq!(back, listener);
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Inner {
    #[river("enabled,attr,optional")]
    enabled: bool,
}

#[derive(River, Debug, Clone, Default, PartialEq)]
struct Mixed {
    #[river("required_attr,attr")]
    required_attr: i64,
    #[river("optional_attr,attr,optional")]
    optional_attr: i64,
    #[river("required_block,block")]
    required_block: Inner,
    #[river("optional_block,block,optional")]
    optional_block: Option<Inner>,
}

#[test]
fn test_struct_decode_completeness() {
    for mask in 0u8..16 {
        let mut body = Vec::new();
        if mask & 1 != 0 {
            body.push(Statement::attribute("required_attr", Expression::number(1)));
        }
        if mask & 2 != 0 {
            body.push(Statement::attribute("optional_attr", Expression::number(2)));
        }
        if mask & 4 != 0 {
            body.push(Statement::block("required_block", vec![]));
        }
        if mask & 8 != 0 {
            body.push(Statement::block(
                "optional_block",
                vec![Statement::attribute("enabled", Expression::bool(true))],
            ));
        }

        let result = Evaluator::new(body).evaluate_into::<Mixed>(None);
        let complete = mask & 1 != 0 && mask & 4 != 0;
        assert_eq!(result.is_ok(), complete, "mask {mask:04b}");
        if let Ok(mixed) = result {
            assert_eq!(mixed.optional_attr, if mask & 2 != 0 { 2 } else { 0 });
            assert_eq!(mixed.optional_block.is_some(), mask & 8 != 0);
        }
    }
}

#[test]
fn test_field_resolution_is_cached() {
    let first = river::tags::resolve::<Mixed>();
    let second = river::tags::resolve::<Mixed>();
    assert_eq!(first, second);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(river::tags::resolution_count::<Mixed>(), 1);
}

#[test]
fn test_concurrent_resolution() {
    #[derive(River, Debug, Clone, Default)]
    struct Concurrent {
        #[river("a,attr")]
        a: i64,
    }

    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(river::tags::resolve::<Concurrent>))
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results[0][0].name, vec!["a".to_string()]);
    // 競合しても全スレッドが同じキャッシュ済みリストを受け取る
    assert!(results.iter().all(|fields| Arc::ptr_eq(fields, &results[0])));
}

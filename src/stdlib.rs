//! Identifiers available to every evaluation.
//!
//! The table is built once and never changes. A [`crate::Scope`] consults it
//! after its whole parent chain, so variables can shadow any builtin.

use std::collections::HashMap;

use indexmap::IndexMap;
use lazy_static::lazy_static;

use crate::ast::quote;
use crate::secret::{OptionalSecret, Secret};
use crate::value::{decode_into, CallError, Dynamic, Function, Type, Value, ValueError};

lazy_static! {
    static ref IDENTIFIERS: HashMap<&'static str, Value> = {
        let mut table = HashMap::new();
        table.insert("constants", constants());
        table.insert("env", Function::from_fn1(env).into());
        table.insert("nonsensitive", Function::from_fn1(nonsensitive).into());
        table.insert("concat", Function::new("func(...array) array", concat).into());
        table.insert("coalesce", Function::new("func(...any) any", coalesce).into());
        table.insert("json_decode", Function::try_fn1(json_decode).into());
        table.insert("format", Function::new("func(string, ...any) string", format).into());
        table.insert("join", Function::from_fn2(join).into());
        table.insert("replace", Function::new("func(string, string, string) string", replace).into());
        table.insert("split", Function::from_fn2(split).into());
        table.insert("to_lower", Function::from_fn1(to_lower).into());
        table.insert("to_upper", Function::from_fn1(to_upper).into());
        table.insert("trim", Function::from_fn2(trim).into());
        table.insert("trim_prefix", Function::from_fn2(trim_prefix).into());
        table.insert("trim_suffix", Function::from_fn2(trim_suffix).into());
        table.insert("trim_space", Function::from_fn1(trim_space).into());
        table
    };
}

/// Look up a builtin.
pub fn lookup(name: &str) -> Option<Value> {
    IDENTIFIERS.get(name).cloned()
}

/// Names of every builtin, sorted.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = IDENTIFIERS.keys().copied().collect();
    names.sort_unstable();
    names
}

fn constants() -> Value {
    Value::from_entries([
        ("os", Value::from(std::env::consts::OS)),
        ("arch", Value::from(std::env::consts::ARCH)),
    ])
}

// 未定義の場合は空文字列
fn env(name: String) -> String {
    std::env::var(name).unwrap_or_default()
}

fn nonsensitive(secret: Secret) -> String {
    secret.expose().to_string()
}

fn string_arg(args: &[Value], index: usize) -> Result<String, CallError> {
    let value = args.get(index).cloned().unwrap_or_default();
    decode_into(&value).map_err(|error| CallError::Argument { index, error })
}

fn concat(args: &[Value]) -> Result<Value, CallError> {
    let mut items = Vec::new();
    for (index, arg) in args.iter().enumerate() {
        let Value::Array(array) = arg else {
            return Err(CallError::Argument {
                index,
                error: ValueError::type_mismatch(arg, Type::Array),
            });
        };
        items.extend(array.iter().cloned());
    }
    Ok(Value::array(items))
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n) => n.as_f64() == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Bool(b) => !b,
        Value::Array(array) => array.is_empty(),
        Value::Object(object) => object.is_empty(),
        Value::Function(_) | Value::Capsule(_) => false,
    }
}

fn coalesce(args: &[Value]) -> Result<Value, CallError> {
    let found = args
        .iter()
        .find(|arg| !is_zero(arg))
        .or_else(|| args.last())
        .cloned();
    Ok(found.unwrap_or_default())
}

fn from_json(json: serde_json::Value) -> Dynamic {
    match json {
        serde_json::Value::Null => Dynamic::Null,
        serde_json::Value::Bool(b) => Dynamic::Bool(b),
        serde_json::Value::Number(n) => Dynamic::Number(n.as_f64().unwrap_or_default()),
        serde_json::Value::String(s) => Dynamic::String(s),
        serde_json::Value::Array(items) => Dynamic::Array(items.into_iter().map(from_json).collect()),
        serde_json::Value::Object(entries) => Dynamic::Object(
            entries
                .into_iter()
                .map(|(k, v)| (k, from_json(v)))
                .collect::<IndexMap<_, _>>(),
        ),
    }
}

fn json_decode(text: String) -> Result<Dynamic, serde_json::Error> {
    serde_json::from_str(&text).map(from_json)
}

fn join(elems: Vec<String>, sep: String) -> String {
    elems.join(&sep)
}

fn split(s: String, sep: String) -> Vec<String> {
    if sep.is_empty() {
        return s.chars().map(String::from).collect();
    }
    s.split(sep.as_str()).map(str::to_string).collect()
}

fn replace(args: &[Value]) -> Result<Value, CallError> {
    if args.len() != 3 {
        return Err(CallError::Arity {
            expected: 3,
            got: args.len(),
        });
    }
    let s = string_arg(args, 0)?;
    let old = string_arg(args, 1)?;
    let new = string_arg(args, 2)?;
    Ok(Value::from(s.replace(&old, &new)))
}

fn to_lower(s: String) -> String {
    s.to_lowercase()
}

fn to_upper(s: String) -> String {
    s.to_uppercase()
}

fn trim(s: String, cutset: String) -> String {
    s.trim_matches(|c: char| cutset.contains(c)).to_string()
}

fn trim_prefix(s: String, prefix: String) -> String {
    s.strip_prefix(prefix.as_str()).unwrap_or(&s).to_string()
}

fn trim_suffix(s: String, suffix: String) -> String {
    s.strip_suffix(suffix.as_str()).unwrap_or(&s).to_string()
}

fn trim_space(s: String) -> String {
    s.trim().to_string()
}

/// Text of a value as `%s` prints it: strings without quotes.
fn plain(value: &Value) -> String {
    match value {
        Value::String(s) => s.to_string(),
        Value::Capsule(capsule) => match capsule.downcast_ref::<OptionalSecret>() {
            Some(optional) => optional.to_string(),
            None => value.to_string(),
        },
        other => other.to_string(),
    }
}

fn format_verb(verb: char, sharp: bool, arg: &Value) -> String {
    match (verb, arg) {
        ('v', _) if sharp => arg.to_string(),
        ('s' | 'v', _) => plain(arg),
        ('d', Value::Number(n)) => n.as_i64().to_string(),
        ('f', Value::Number(n)) => format!("{:.6}", n.as_f64()),
        ('q', Value::String(s)) => quote(s),
        ('t', Value::Bool(b)) => b.to_string(),
        _ => format!("%!{verb}({}={})", arg.describe(), plain(arg)),
    }
}

/// printf-style formatting with the `%s %v %#v %d %f %q %t %%` verbs.
fn format(args: &[Value]) -> Result<Value, CallError> {
    if args.is_empty() {
        return Err(CallError::MinArity { min: 1, got: 0 });
    }
    let pattern = string_arg(args, 0)?;
    let mut rest = args[1..].iter();
    let mut out = String::with_capacity(pattern.len());

    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        let mut verb = chars.next();
        let sharp = verb == Some('#');
        if sharp {
            verb = chars.next();
        }
        match verb {
            None => out.push_str("%!(NOVERB)"),
            Some('%') => out.push('%'),
            Some(verb) => match rest.next() {
                Some(arg) => out.push_str(&format_verb(verb, sharp, arg)),
                None => out.push_str(&format!("%!{verb}(MISSING)")),
            },
        }
    }

    let extra: Vec<String> = rest
        .map(|arg| format!("{}={}", arg.describe(), plain(arg)))
        .collect();
    if !extra.is_empty() {
        out.push_str(&format!("%!(EXTRA {})", extra.join(", ")));
    }
    Ok(Value::from(out))
}

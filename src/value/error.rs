use thiserror::Error;

use super::{Type, Value};

/// Errors produced while converting or decoding values.
///
/// The path variants wrap an inner error, so a failure deep inside a nested
/// value forms a chain mirroring the access path (`a.b[2]`) to it.
#[derive(Error, Debug, Clone)]
pub enum ValueError {
    #[error("expected {expected}, got {}", .value.describe())]
    Type { value: Value, expected: Type },

    #[error("key {missing:?} does not exist")]
    MissingKey { value: Value, missing: String },

    #[error("{inner}")]
    Element {
        value: Value,
        index: usize,
        inner: Box<ValueError>,
    },

    #[error("{inner}")]
    Field {
        value: Value,
        field: String,
        inner: Box<ValueError>,
    },

    #[error("{inner}")]
    Argument {
        function: Value,
        argument: Value,
        index: usize,
        inner: Box<ValueError>,
    },

    #[error("{message}")]
    Wrapped { value: Value, message: String },
}

pub type ValueResult<T> = Result<T, ValueError>;

impl ValueError {
    pub fn type_mismatch(value: &Value, expected: Type) -> Self {
        ValueError::Type {
            value: value.clone(),
            expected,
        }
    }

    pub fn missing_key(value: &Value, missing: impl Into<String>) -> Self {
        ValueError::MissingKey {
            value: value.clone(),
            missing: missing.into(),
        }
    }

    pub fn element(value: &Value, index: usize, inner: ValueError) -> Self {
        ValueError::Element {
            value: value.clone(),
            index,
            inner: Box::new(inner),
        }
    }

    pub fn field(value: &Value, field: impl Into<String>, inner: ValueError) -> Self {
        ValueError::Field {
            value: value.clone(),
            field: field.into(),
            inner: Box::new(inner),
        }
    }

    pub fn wrapped(value: &Value, message: impl Into<String>) -> Self {
        ValueError::Wrapped {
            value: value.clone(),
            message: message.into(),
        }
    }

    /// The value this link of the chain refers to.
    pub fn value(&self) -> &Value {
        match self {
            ValueError::Type { value, .. }
            | ValueError::MissingKey { value, .. }
            | ValueError::Element { value, .. }
            | ValueError::Field { value, .. }
            | ValueError::Wrapped { value, .. } => value,
            ValueError::Argument { argument, .. } => argument,
        }
    }

    /// The innermost error of the chain.
    pub fn root(&self) -> &ValueError {
        match self {
            ValueError::Element { inner, .. }
            | ValueError::Field { inner, .. }
            | ValueError::Argument { inner, .. } => inner.root(),
            other => other,
        }
    }
}

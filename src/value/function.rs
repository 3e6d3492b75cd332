use std::any::{type_name, Any};
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::decode::decode;
use super::host::{FunctionShape, HostKind, HostType, HostValue};
use super::{Value, ValueError};

#[derive(Error, Debug)]
pub enum CallError {
    #[error("expected {expected} arguments, got {got}")]
    Arity { expected: usize, got: usize },
    #[error("expected at least {min} arguments, got {got}")]
    MinArity { min: usize, got: usize },
    /// An argument could not be converted to the parameter type.
    #[error("{error}")]
    Argument { index: usize, error: ValueError },
    #[error("{0}")]
    Failed(String),
}

impl CallError {
    pub fn failed(message: impl fmt::Display) -> Self {
        CallError::Failed(message.to_string())
    }
}

type Callable = dyn Fn(&[Value]) -> Result<Value, CallError> + Send + Sync;

/// A callable River value.
///
/// Functions built from plain `fn` pointers remember the pointer, so decoding
/// them back into the same `fn` type returns the original.
#[derive(Clone)]
pub struct Function {
    signature: Cow<'static, str>,
    call: Arc<Callable>,
    host: Option<Arc<dyn Any + Send + Sync>>,
}

/// Decode argument `index` into a fresh `T`.
pub(crate) fn argument<T: HostValue + Default>(args: &[Value], index: usize) -> Result<T, CallError> {
    let mut out = T::default();
    let value = args.get(index).cloned().unwrap_or_default();
    decode(&value, &mut out).map_err(|error| CallError::Argument { index, error })?;
    Ok(out)
}

fn arity(args: &[Value], expected: usize) -> Result<(), CallError> {
    if args.len() != expected {
        return Err(CallError::Arity {
            expected,
            got: args.len(),
        });
    }
    Ok(())
}

impl Function {
    /// A function over raw values, used for variadic builtins.
    pub fn new(
        signature: impl Into<Cow<'static, str>>,
        call: impl Fn(&[Value]) -> Result<Value, CallError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            signature: signature.into(),
            call: Arc::new(call),
            host: None,
        }
    }

    fn with_host(mut self, host: Arc<dyn Any + Send + Sync>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn from_fn0<R: HostValue>(f: fn() -> R) -> Self {
        let signature = format!("func() {}", type_name::<R>());
        Self::new(signature, move |args| {
            arity(args, 0)?;
            Ok(f().encode())
        })
        .with_host(Arc::new(f))
    }

    pub fn from_fn1<A, R>(f: fn(A) -> R) -> Self
    where
        A: HostValue + Default,
        R: HostValue,
    {
        let signature = format!("func({}) {}", type_name::<A>(), type_name::<R>());
        Self::new(signature, move |args| {
            arity(args, 1)?;
            Ok(f(argument(args, 0)?).encode())
        })
        .with_host(Arc::new(f))
    }

    pub fn from_fn2<A, B, R>(f: fn(A, B) -> R) -> Self
    where
        A: HostValue + Default,
        B: HostValue + Default,
        R: HostValue,
    {
        let signature = format!(
            "func({}, {}) {}",
            type_name::<A>(),
            type_name::<B>(),
            type_name::<R>()
        );
        Self::new(signature, move |args| {
            arity(args, 2)?;
            Ok(f(argument(args, 0)?, argument(args, 1)?).encode())
        })
        .with_host(Arc::new(f))
    }

    /// A fallible function: its error is reported as a call failure.
    pub fn try_fn1<A, R, E>(f: fn(A) -> Result<R, E>) -> Self
    where
        A: HostValue + Default,
        R: HostValue,
        E: fmt::Display + 'static,
    {
        let signature = format!("func({}) ({}, error)", type_name::<A>(), type_name::<R>());
        Self::new(signature, move |args| {
            arity(args, 1)?;
            f(argument(args, 0)?)
                .map(|r| r.encode())
                .map_err(CallError::failed)
        })
        .with_host(Arc::new(f))
    }

    pub fn try_fn2<A, B, R, E>(f: fn(A, B) -> Result<R, E>) -> Self
    where
        A: HostValue + Default,
        B: HostValue + Default,
        R: HostValue,
        E: fmt::Display + 'static,
    {
        let signature = format!(
            "func({}, {}) ({}, error)",
            type_name::<A>(),
            type_name::<B>(),
            type_name::<R>()
        );
        Self::new(signature, move |args| {
            arity(args, 2)?;
            f(argument(args, 0)?, argument(args, 1)?)
                .map(|r| r.encode())
                .map_err(CallError::failed)
        })
        .with_host(Arc::new(f))
    }

    pub fn invoke(&self, args: &[Value]) -> Result<Value, CallError> {
        (self.call)(args)
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    /// The `fn` pointer this function was built from.
    pub fn host_any(&self) -> Option<&dyn Any> {
        self.host.as_deref().map(|host| host as &dyn Any)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.call) as *const () as usize
    }
}

impl Default for Function {
    fn default() -> Self {
        Self::new("func() null", |_| Ok(Value::Null))
    }
}

// functions are never equal, not even to themselves
impl PartialEq for Function {
    fn eq(&self, _other: &Self) -> bool {
        false
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Function({})", self.signature)
    }
}

impl HostValue for Function {
    fn host_type() -> HostType {
        HostType::of::<Function>(HostKind::Function(FunctionShape::FALLIBLE))
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        Value::Function(self.clone())
    }

    fn set_zero(&mut self) {
        *self = Function::default();
    }

    fn assign_exact(&mut self, value: &Value) -> bool {
        match value {
            Value::Function(function) => {
                *self = function.clone();
                true
            }
            _ => false,
        }
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        if self.assign_exact(value) {
            return Ok(());
        }
        Err(ValueError::type_mismatch(value, super::Type::Function))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn function_mismatch(target: &'static str, value: &Value) -> ValueError {
    ValueError::wrapped(
        value,
        format!("cannot convert {} to {target}", value.describe()),
    )
}

macro_rules! fn_pointer_host {
    ($ctor:ident; $($arg:ident),*) => {
        impl<$($arg,)* R> HostValue for fn($($arg),*) -> R
        where
            $($arg: HostValue + Default,)*
            R: HostValue,
        {
            fn host_type() -> HostType {
                HostType::of::<fn($($arg),*) -> R>(HostKind::Function(FunctionShape::VALUE))
            }

            fn type_of(&self) -> HostType {
                Self::host_type()
            }

            fn encode(&self) -> Value {
                Value::Function(Function::$ctor(*self))
            }

            // fn pointers have no zero value
            fn set_zero(&mut self) {}

            fn assign_exact(&mut self, value: &Value) -> bool {
                match value.host_any().and_then(|host| host.downcast_ref::<Self>()) {
                    Some(source) => {
                        *self = *source;
                        true
                    }
                    None => false,
                }
            }

            fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
                Err(function_mismatch(type_name::<Self>(), value))
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }
    };
}

fn_pointer_host!(from_fn0;);
fn_pointer_host!(from_fn1; A);
fn_pointer_host!(from_fn2; A, B);

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn double(x: i64) -> i64 {
        x * 2
    }

    fn add(a: i64, b: i64) -> i64 {
        a + b
    }

    fn parse(text: String) -> Result<i64, std::num::ParseIntError> {
        text.parse()
    }

    #[test]
    fn test_invoke_converts_arguments() {
        let f = Function::from_fn1(double);
        // strings convert to numbers on the way in
        let out = f.invoke(&[Value::from("21")]).unwrap();
        assert_eq!(out, Value::from(42i64));
    }

    #[test]
    fn test_arity_is_checked() {
        let f = Function::from_fn2(add);
        let err = f.invoke(&[Value::from(1i64)]).unwrap_err();
        assert_eq!(err.to_string(), "expected 2 arguments, got 1");
    }

    #[test]
    fn test_argument_error_carries_index() {
        let f = Function::from_fn2(add);
        let err = f.invoke(&[Value::from(1i64), Value::from(true)]).unwrap_err();
        match err {
            CallError::Argument { index, error } => {
                assert_eq!(index, 1);
                assert_eq!(error.to_string(), "expected number, got bool");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fallible_functions_report_failures() {
        let f = Function::try_fn1(parse);
        assert_eq!(f.invoke(&[Value::from("7")]).unwrap(), Value::from(7i64));
        assert!(matches!(
            f.invoke(&[Value::from("x")]),
            Err(CallError::Failed(_))
        ));
    }

    #[test]
    fn test_fn_pointer_round_trip() {
        let f: fn(i64) -> i64 = double;
        let mut out: fn(i64) -> i64 = add_nothing;
        assert!(out.assign_exact(&f.encode()));
        assert_eq!(out(4), 8);
    }

    fn add_nothing(x: i64) -> i64 {
        x
    }
}

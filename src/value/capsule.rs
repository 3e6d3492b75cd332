use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use super::host::{HostType, HostValue};
use super::{Value, ValueError};

/// Outcome of a capsule conversion hook.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConvertError {
    /// The hook does not handle this pair of types; decoding falls back to
    /// the default type error.
    #[error("no conversion available")]
    NoConversion,
    #[error("{0}")]
    Failed(String),
}

/// Marker for host types River treats as opaque capsules.
///
/// Both hooks are optional. `convert_from` lets the capsule be built from any
/// value, `convert_into` lets it be written into any other host type.
pub trait Capsule: Any + Send + Sync {
    fn convert_from(&mut self, _from: &Value) -> Result<(), ConvertError> {
        Err(ConvertError::NoConversion)
    }

    fn convert_into(&self, _into: &mut dyn HostValue) -> Result<(), ConvertError> {
        Err(ConvertError::NoConversion)
    }
}

/// Type-erased capsule storage.
#[doc(hidden)]
pub trait CapsuleObject: Send + Sync {
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn equals(&self, other: &dyn CapsuleObject) -> bool;
    fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError>;
}

struct Owned<T>(T);

impl<T: Capsule + PartialEq> CapsuleObject for Owned<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, other: &dyn CapsuleObject) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| *other == self.0)
    }

    fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError> {
        self.0.convert_into(into)
    }
}

// shared handles compare by identity
struct Shared<T>(Arc<T>);

impl<T: Capsule> CapsuleObject for Shared<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, other: &dyn CapsuleObject) -> bool {
        other
            .as_any()
            .downcast_ref::<Arc<T>>()
            .is_some_and(|other| Arc::ptr_eq(other, &self.0))
    }

    fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError> {
        self.0.convert_into(into)
    }
}

struct Opaque<T>(T);

impl<T: Any + Send + Sync> CapsuleObject for Opaque<T> {
    fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn equals(&self, _other: &dyn CapsuleObject) -> bool {
        false
    }

    fn convert_into(&self, _into: &mut dyn HostValue) -> Result<(), ConvertError> {
        Err(ConvertError::NoConversion)
    }
}

/// The payload of a Capsule value.
#[derive(Clone)]
pub struct CapsuleValue(Arc<dyn CapsuleObject>);

impl CapsuleValue {
    pub fn new<T: Capsule + PartialEq>(value: T) -> Self {
        Self(Arc::new(Owned(value)))
    }

    /// Wrap a shared handle; decoding it back yields the same `Arc`.
    pub fn shared<T: Capsule>(value: Arc<T>) -> Self {
        Self(Arc::new(Shared(value)))
    }

    /// Host values with no River structure and no capsule hooks.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Self(Arc::new(Opaque(value)))
    }

    pub fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    pub fn as_any(&self) -> &dyn Any {
        self.0.as_any()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &CapsuleValue) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError> {
        self.0.convert_into(into)
    }

    pub(crate) fn identity(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl PartialEq for CapsuleValue {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || self.0.equals(other.0.as_ref())
    }
}

impl fmt::Debug for CapsuleValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "capsule({:?})", self.type_name())
    }
}

/// Error for a capsule target that could not be filled.
pub(crate) fn capsule_mismatch(target: &HostType, value: &Value) -> ValueError {
    ValueError::wrapped(
        value,
        format!("expected capsule({:?}), got {}", target.name, value.describe()),
    )
}

/// Capsule handles: decoding preserves the pointer.
impl<T: Capsule + Default> HostValue for Arc<T> {
    fn host_type() -> HostType {
        HostType::capsule::<T>()
    }

    fn type_of(&self) -> HostType {
        Self::host_type()
    }

    fn encode(&self) -> Value {
        Value::Capsule(CapsuleValue::shared(Arc::clone(self)))
    }

    fn set_zero(&mut self) {
        *self = Arc::default();
    }

    fn assign_exact(&mut self, value: &Value) -> bool {
        match value.host_any().and_then(|host| host.downcast_ref::<Arc<T>>()) {
            Some(source) => {
                *self = Arc::clone(source);
                true
            }
            None => false,
        }
    }

    fn decode_converted(&mut self, value: &Value) -> Result<(), ValueError> {
        Err(capsule_mismatch(&self.type_of(), value))
    }

    fn convert_from(&mut self, from: &Value) -> Result<(), ConvertError> {
        let mut fresh = T::default();
        fresh.convert_from(from)?;
        *self = Arc::new(fresh);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Opt a `Clone + PartialEq + Default` type implementing [`Capsule`] into
/// River.
#[macro_export]
macro_rules! capsule {
    ($ty:ty) => {
        impl $crate::HostValue for $ty {
            fn host_type() -> $crate::HostType {
                $crate::HostType::capsule::<$ty>()
            }

            fn type_of(&self) -> $crate::HostType {
                <$ty as $crate::HostValue>::host_type()
            }

            fn encode(&self) -> $crate::Value {
                $crate::Value::Capsule($crate::CapsuleValue::new(
                    ::core::clone::Clone::clone(self),
                ))
            }

            fn set_zero(&mut self) {
                *self = ::core::default::Default::default();
            }

            fn assign_exact(&mut self, value: &$crate::Value) -> bool {
                $crate::value::assign_exact(self, value)
            }

            fn decode_converted(
                &mut self,
                value: &$crate::Value,
            ) -> ::core::result::Result<(), $crate::ValueError> {
                ::core::result::Result::Err($crate::ValueError::wrapped(
                    value,
                    ::std::format!(
                        "expected capsule({:?}), got {}",
                        ::core::any::type_name::<$ty>(),
                        value.describe()
                    ),
                ))
            }

            fn convert_from(
                &mut self,
                from: &$crate::Value,
            ) -> ::core::result::Result<(), $crate::ConvertError> {
                <$ty as $crate::Capsule>::convert_from(self, from)
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

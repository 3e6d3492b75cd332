//! Secret capsules.
//!
//! A [`Secret`] never converts back to a plain string implicitly; the
//! `nonsensitive` builtin is the only way out. [`OptionalSecret`] is a string
//! that may or may not be sensitive, and behaves like a String while it is
//! not.

use std::fmt;

use secrecy::{ExposeSecret, SecretString};

use crate::value::{Capsule, ConvertError, HostValue, Value};

pub struct Secret(SecretString);

impl Secret {
    pub fn new(text: impl Into<String>) -> Self {
        Secret(SecretString::from(text.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl Default for Secret {
    fn default() -> Self {
        Secret::new(String::new())
    }
}

impl Clone for Secret {
    fn clone(&self) -> Self {
        Secret::new(self.expose())
    }
}

impl PartialEq for Secret {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Secret(***)")
    }
}

impl fmt::Display for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(secret)")
    }
}

impl Capsule for Secret {
    fn convert_from(&mut self, from: &Value) -> Result<(), ConvertError> {
        match from {
            Value::String(text) => {
                *self = Secret::new(text.to_string());
                Ok(())
            }
            Value::Capsule(capsule) => match capsule.downcast_ref::<OptionalSecret>() {
                Some(optional) => {
                    *self = Secret::new(optional.value.clone());
                    Ok(())
                }
                None => Err(ConvertError::NoConversion),
            },
            _ => Err(ConvertError::NoConversion),
        }
    }

    fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError> {
        match into.as_any_mut().downcast_mut::<OptionalSecret>() {
            Some(optional) => {
                *optional = OptionalSecret::secret(self.expose());
                Ok(())
            }
            None => Err(ConvertError::NoConversion),
        }
    }
}

crate::capsule!(Secret);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionalSecret {
    pub is_secret: bool,
    pub value: String,
}

impl OptionalSecret {
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            is_secret: false,
            value: value.into(),
        }
    }

    pub fn secret(value: impl Into<String>) -> Self {
        Self {
            is_secret: true,
            value: value.into(),
        }
    }
}

impl fmt::Display for OptionalSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_secret {
            write!(f, "(secret)")
        } else {
            write!(f, "{}", self.value)
        }
    }
}

impl Capsule for OptionalSecret {
    fn convert_from(&mut self, from: &Value) -> Result<(), ConvertError> {
        match from {
            Value::String(text) => {
                *self = OptionalSecret::plain(text.to_string());
                Ok(())
            }
            Value::Capsule(capsule) => match capsule.downcast_ref::<Secret>() {
                Some(secret) => {
                    *self = OptionalSecret::secret(secret.expose());
                    Ok(())
                }
                None => Err(ConvertError::NoConversion),
            },
            _ => Err(ConvertError::NoConversion),
        }
    }

    fn convert_into(&self, into: &mut dyn HostValue) -> Result<(), ConvertError> {
        if let Some(secret) = into.as_any_mut().downcast_mut::<Secret>() {
            *secret = Secret::new(self.value.clone());
            return Ok(());
        }
        match into.as_any_mut().downcast_mut::<String>() {
            Some(text) if !self.is_secret => {
                text.clone_from(&self.value);
                Ok(())
            }
            Some(_) => Err(ConvertError::Failed(
                "secrets may not be converted into strings".to_string(),
            )),
            None => Err(ConvertError::NoConversion),
        }
    }
}

crate::capsule!(OptionalSecret);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{decode, decode_into};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_secret_from_string() {
        let secret: Secret = decode_into(&Value::from("hunter2")).unwrap();
        assert_eq!(secret.expose(), "hunter2");
        assert_eq!(secret.to_string(), "(secret)");
        assert_eq!(format!("{secret:?}"), "Secret(***)");
    }

    #[test]
    fn test_secret_never_becomes_string() {
        let value = Secret::new("hunter2").encode();
        let err = decode_into::<String>(&value).unwrap_err();
        assert!(err.to_string().contains("expected string"));
    }

    #[test]
    fn test_optional_secret_into_string() {
        let plain = OptionalSecret::plain("visible").encode();
        assert_eq!(decode_into::<String>(&plain).unwrap(), "visible");

        let hidden = OptionalSecret::secret("hidden").encode();
        let err = decode_into::<String>(&hidden).unwrap_err();
        assert_eq!(err.to_string(), "secrets may not be converted into strings");
    }

    #[test]
    fn test_secret_to_optional_secret() {
        let mut out = OptionalSecret::default();
        decode(&Secret::new("s").encode(), &mut out).unwrap();
        assert_eq!(out, OptionalSecret::secret("s"));

        let out: OptionalSecret = decode_into(&Value::from("p")).unwrap();
        assert_eq!(out, OptionalSecret::plain("p"));
    }
}

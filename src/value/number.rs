use std::cmp::Ordering;
use std::fmt;

/// Originating kind of a number. The derived ordering is the promotion
/// order used by arithmetic: `Uint < Int < Float`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum NumberKind {
    Uint,
    Int,
    Float,
}

/// Bit width of the host type a number came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bits {
    B8,
    B16,
    B32,
    #[default]
    B64,
    Native,
}

#[derive(Clone, Copy)]
enum Repr {
    Uint(u64),
    Int(i64),
    Float(f64),
}

/// A River number. Keeps its kind and width so that values round-trip
/// through the language without losing signedness or precision.
#[derive(Clone, Copy)]
pub struct Number {
    repr: Repr,
    bits: Bits,
}

impl Number {
    pub fn int(value: i64) -> Self {
        Self {
            repr: Repr::Int(value),
            bits: Bits::B64,
        }
    }

    pub fn uint(value: u64) -> Self {
        Self {
            repr: Repr::Uint(value),
            bits: Bits::B64,
        }
    }

    pub fn float(value: f64) -> Self {
        Self {
            repr: Repr::Float(value),
            bits: Bits::B64,
        }
    }

    pub fn with_bits(mut self, bits: Bits) -> Self {
        self.bits = bits;
        self
    }

    pub fn kind(&self) -> NumberKind {
        match self.repr {
            Repr::Uint(_) => NumberKind::Uint,
            Repr::Int(_) => NumberKind::Int,
            Repr::Float(_) => NumberKind::Float,
        }
    }

    pub fn bits(&self) -> Bits {
        self.bits
    }

    /// Value as a signed integer. Floats truncate, unsigned values wrap.
    pub fn as_i64(&self) -> i64 {
        match self.repr {
            Repr::Uint(v) => v as i64,
            Repr::Int(v) => v,
            Repr::Float(v) => v as i64,
        }
    }

    pub fn as_u64(&self) -> u64 {
        match self.repr {
            Repr::Uint(v) => v,
            Repr::Int(v) => v as u64,
            Repr::Float(v) => v as u64,
        }
    }

    pub fn as_f64(&self) -> f64 {
        match self.repr {
            Repr::Uint(v) => v as f64,
            Repr::Int(v) => v as f64,
            Repr::Float(v) => v,
        }
    }

    /// Re-express the number in `kind`.
    pub fn to_kind(&self, kind: NumberKind) -> Number {
        match kind {
            NumberKind::Uint => Number::uint(self.as_u64()),
            NumberKind::Int => Number::int(self.as_i64()),
            NumberKind::Float => Number::float(self.as_f64()),
        }
    }

    /// Parse text into a number.
    ///
    /// A leading `-` parses as a signed integer, a `.`, `e` or `E` anywhere
    /// parses as a float, anything else as an unsigned integer.
    pub fn parse(text: &str) -> Result<Number, String> {
        if text.is_empty() {
            return Err("cannot convert empty string to number".to_string());
        }
        if text.starts_with('-') {
            return text
                .parse::<i64>()
                .map(Number::int)
                .map_err(|e| format!("invalid number {text:?}: {e}"));
        }
        if text.contains(['.', 'e', 'E']) {
            return text
                .parse::<f64>()
                .map(Number::float)
                .map_err(|e| format!("invalid number {text:?}: {e}"));
        }
        text.parse::<u64>()
            .map(Number::uint)
            .map_err(|e| format!("invalid number {text:?}: {e}"))
    }

    /// Numeric equality after promoting both sides to the wider kind.
    pub fn loose_eq(&self, other: &Number) -> bool {
        self.loose_cmp(other) == Some(Ordering::Equal)
    }

    pub fn loose_cmp(&self, other: &Number) -> Option<Ordering> {
        match self.kind().max(other.kind()) {
            NumberKind::Uint => Some(self.as_u64().cmp(&other.as_u64())),
            NumberKind::Int => Some(self.as_i64().cmp(&other.as_i64())),
            NumberKind::Float => self.as_f64().partial_cmp(&other.as_f64()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repr {
            Repr::Uint(v) => write!(f, "{v}"),
            Repr::Int(v) => write!(f, "{v}"),
            // 32-bit floats render from f32 so 3.2f32 prints as "3.2"
            Repr::Float(v) if self.bits == Bits::B32 => write!(f, "{}", v as f32),
            Repr::Float(v) => write!(f, "{v}"),
        }
    }
}

impl fmt::Debug for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind(), self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_parse_follows_leading_characters() {
        assert_eq!(Number::parse("15").unwrap().kind(), NumberKind::Uint);
        assert_eq!(Number::parse("-15").unwrap().kind(), NumberKind::Int);
        assert_eq!(Number::parse("1.5").unwrap().kind(), NumberKind::Float);
        assert_eq!(Number::parse("1e3").unwrap().as_f64(), 1000.0);
        assert!(Number::parse("").is_err());
        assert!(Number::parse("abc").is_err());
    }

    #[test]
    fn test_display_uses_originating_kind() {
        assert_eq!(Number::uint(15).to_string(), "15");
        assert_eq!(Number::int(-15).to_string(), "-15");
        assert_eq!(Number::float(3.9).to_string(), "3.9");
        assert_eq!(
            Number::float(3.2f32 as f64).with_bits(Bits::B32).to_string(),
            "3.2"
        );
    }

    #[test]
    fn test_loose_equality_promotes() {
        assert!(Number::uint(3).loose_eq(&Number::float(3.0)));
        assert!(Number::int(-1).loose_eq(&Number::int(-1)));
        assert!(!Number::int(2).loose_eq(&Number::float(2.5)));
    }

    proptest! {
        #[test]
        fn test_uint_text_round_trip(v in any::<u64>()) {
            let parsed = Number::parse(&Number::uint(v).to_string()).unwrap();
            prop_assert_eq!(parsed.kind(), NumberKind::Uint);
            prop_assert_eq!(parsed.as_u64(), v);
        }

        #[test]
        fn test_negative_int_text_round_trip(v in i64::MIN..0i64) {
            let parsed = Number::parse(&Number::int(v).to_string()).unwrap();
            prop_assert_eq!(parsed.kind(), NumberKind::Int);
            prop_assert_eq!(parsed.as_i64(), v);
        }
    }
}

//! Property values.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Type of a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueType {
    /// UTF-8 text.
    String,
    /// Raw bytes.
    Binary,
    /// 64-bit signed integer.
    Long,
    /// 64-bit float.
    Double,
    /// Arbitrary precision decimal, kept as text.
    Decimal,
    /// ISO 8601 timestamp, kept as text.
    Date,
    /// Boolean.
    Boolean,
    /// Qualified name.
    Name,
    /// Repository path.
    Path,
    /// Reference to a referenceable node.
    Reference,
    /// Reference that does not enforce integrity.
    WeakReference,
    /// URI.
    Uri,
    /// Any type; only meaningful in definitions.
    Undefined,
}

impl ValueType {
    /// All value types, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::String,
        Self::Binary,
        Self::Long,
        Self::Double,
        Self::Decimal,
        Self::Date,
        Self::Boolean,
        Self::Name,
        Self::Path,
        Self::Reference,
        Self::WeakReference,
        Self::Uri,
        Self::Undefined,
    ];

    /// Canonical upper-case name, as stored in the type registry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "STRING",
            Self::Binary => "BINARY",
            Self::Long => "LONG",
            Self::Double => "DOUBLE",
            Self::Decimal => "DECIMAL",
            Self::Date => "DATE",
            Self::Boolean => "BOOLEAN",
            Self::Name => "NAME",
            Self::Path => "PATH",
            Self::Reference => "REFERENCE",
            Self::WeakReference => "WEAKREFERENCE",
            Self::Uri => "URI",
            Self::Undefined => "UNDEFINED",
        }
    }

    /// Parses a type name case-insensitively.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown property type '{s}'"))
    }
}

/// A single property value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Text.
    String(String),
    /// Bytes.
    Binary(Vec<u8>),
    /// Integer.
    Long(i64),
    /// Float.
    Double(f64),
    /// Decimal text.
    Decimal(String),
    /// Timestamp text.
    Date(String),
    /// Boolean.
    Boolean(bool),
    /// Qualified name.
    Name(String),
    /// Path.
    Path(String),
    /// Node reference.
    Reference(String),
    /// Weak node reference.
    WeakReference(String),
    /// URI.
    Uri(String),
}

impl Value {
    /// Returns the value's type.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        match self {
            Self::String(_) => ValueType::String,
            Self::Binary(_) => ValueType::Binary,
            Self::Long(_) => ValueType::Long,
            Self::Double(_) => ValueType::Double,
            Self::Decimal(_) => ValueType::Decimal,
            Self::Date(_) => ValueType::Date,
            Self::Boolean(_) => ValueType::Boolean,
            Self::Name(_) => ValueType::Name,
            Self::Path(_) => ValueType::Path,
            Self::Reference(_) => ValueType::Reference,
            Self::WeakReference(_) => ValueType::WeakReference,
            Self::Uri(_) => ValueType::Uri,
        }
    }

    /// Returns the text of any string-like value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s)
            | Self::Decimal(s)
            | Self::Date(s)
            | Self::Name(s)
            | Self::Path(s)
            | Self::Reference(s)
            | Self::WeakReference(s)
            | Self::Uri(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the boolean, if this is one.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub const fn as_long(&self) -> Option<i64> {
        match self {
            Self::Long(n) => Some(*n),
            _ => None,
        }
    }

    /// Parses `text` as a value of type `ty`.
    ///
    /// `Undefined` parses as a string. Binary values are taken as the UTF-8
    /// bytes of the text.
    ///
    /// # Errors
    ///
    /// Returns a message describing why `text` is not a valid `ty`.
    pub fn parse(ty: ValueType, text: &str) -> Result<Self, String> {
        let invalid = || format!("'{text}' is not a valid {}", ty.as_str().to_lowercase());
        match ty {
            ValueType::String | ValueType::Undefined => Ok(Self::String(text.to_string())),
            ValueType::Binary => Ok(Self::Binary(text.as_bytes().to_vec())),
            ValueType::Long => text.trim().parse().map(Self::Long).map_err(|_| invalid()),
            ValueType::Double => text.trim().parse().map(Self::Double).map_err(|_| invalid()),
            ValueType::Decimal => {
                let t = text.trim();
                if is_decimal(t) {
                    Ok(Self::Decimal(t.to_string()))
                } else {
                    Err(invalid())
                }
            }
            ValueType::Date => {
                if is_date(text) {
                    Ok(Self::Date(text.to_string()))
                } else {
                    Err(invalid())
                }
            }
            ValueType::Boolean => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Self::Boolean(true)),
                "false" => Ok(Self::Boolean(false)),
                _ => Err(invalid()),
            },
            ValueType::Name => {
                if text.is_empty() || text.contains(['/', '[', ']', '|', '*']) {
                    Err(invalid())
                } else {
                    Ok(Self::Name(text.to_string()))
                }
            }
            ValueType::Path => {
                if text.is_empty() {
                    Err(invalid())
                } else {
                    Ok(Self::Path(text.to_string()))
                }
            }
            ValueType::Reference => Ok(Self::Reference(text.to_string())),
            ValueType::WeakReference => Ok(Self::WeakReference(text.to_string())),
            ValueType::Uri => {
                if text.contains(char::is_whitespace) {
                    Err(invalid())
                } else {
                    Ok(Self::Uri(text.to_string()))
                }
            }
        }
    }
}

/// `[+-] digits [. digits] [(e|E) [+-] digits]`, where either side of the
/// point may be empty but not both.
fn is_decimal(text: &str) -> bool {
    fn digits(s: &str) -> usize {
        s.bytes().take_while(u8::is_ascii_digit).count()
    }

    let unsigned = text.strip_prefix(['+', '-']).unwrap_or(text);
    let (mantissa, exponent) = match unsigned.find(['e', 'E']) {
        Some(at) => (&unsigned[..at], Some(&unsigned[at + 1..])),
        None => (unsigned, None),
    };
    let (whole, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let mantissa_ok = digits(whole) == whole.len()
        && digits(frac) == frac.len()
        && whole.len() + frac.len() > 0;
    let exponent_ok = exponent.map_or(true, |e| {
        let e = e.strip_prefix(['+', '-']).unwrap_or(e);
        !e.is_empty() && digits(e) == e.len()
    });
    mantissa_ok && exponent_ok
}

/// RFC 3339 timestamp, a local `YYYY-MM-DDTHH:MM:SS[.fff]` or a bare date.
fn is_date(text: &str) -> bool {
    DateTime::parse_from_rfc3339(text).is_ok()
        || NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
        || NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok()
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary(bytes) => write!(f, "<{} bytes>", bytes.len()),
            Self::Long(n) => write!(f, "{n}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::Boolean(b) => write!(f, "{b}"),
            other => f.write_str(other.as_str().unwrap_or_default()),
        }
    }
}

/// The stored state of one property: its type, multiplicity and values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyState {
    value_type: ValueType,
    multiple: bool,
    values: Vec<Value>,
}

impl PropertyState {
    /// A single-valued property.
    #[must_use]
    pub fn single(value: Value) -> Self {
        Self {
            value_type: value.value_type(),
            multiple: false,
            values: vec![value],
        }
    }

    /// A multi-valued property. The values should all be of `value_type`.
    #[must_use]
    pub fn multiple(value_type: ValueType, values: Vec<Value>) -> Self {
        Self {
            value_type,
            multiple: true,
            values,
        }
    }

    /// A single string.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::single(Value::String(value.into()))
    }

    /// A single name.
    #[must_use]
    pub fn name(value: impl Into<String>) -> Self {
        Self::single(Value::Name(value.into()))
    }

    /// A single boolean.
    #[must_use]
    pub fn boolean(value: bool) -> Self {
        Self::single(Value::Boolean(value))
    }

    /// A single integer.
    #[must_use]
    pub fn long(value: i64) -> Self {
        Self::single(Value::Long(value))
    }

    /// A multi-valued string property.
    #[must_use]
    pub fn strings<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::multiple(
            ValueType::String,
            values.into_iter().map(|v| Value::String(v.into())).collect(),
        )
    }

    /// A multi-valued name property.
    #[must_use]
    pub fn names<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::multiple(
            ValueType::Name,
            values.into_iter().map(|v| Value::Name(v.into())).collect(),
        )
    }

    /// Value type.
    #[must_use]
    pub const fn value_type(&self) -> ValueType {
        self.value_type
    }

    /// True for multi-valued properties.
    #[must_use]
    pub const fn is_multiple(&self) -> bool {
        self.multiple
    }

    /// All values.
    #[must_use]
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// The value of a single-valued property.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        if self.multiple {
            None
        } else {
            self.values.first()
        }
    }

    /// Text of a single string-like value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        self.value().and_then(Value::as_str)
    }

    /// A single boolean value.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        self.value().and_then(Value::as_bool)
    }

    /// Texts of all string-like values.
    #[must_use]
    pub fn as_strings(&self) -> Vec<&str> {
        self.values.iter().filter_map(Value::as_str).collect()
    }
}

use core::fmt;

use serde::{Deserialize, Serialize};

/// A value attached to an accepted key.
///
/// Two classes of value round-trip through the binary container: non-negative
/// integers and strings. The JSON interchange format round-trips both as
/// well, using the natural JSON representation for each (`serde` untagged).
///
/// Inside the binary value table an integer is written as its ASCII decimal
/// digits; a non-empty all-digit byte string therefore decodes back as
/// [`Value::Int`]. A string value that happens to consist only of digits will
/// come back as an integer after a binary round trip. Callers that must
/// distinguish `"100"` from `100` should use the text format.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// A non-negative integer value.
    Int(u64),
    /// A string value.
    Str(String),
}

impl Value {
    /// Returns the integer payload, if this value is an integer.
    pub fn as_int(&self) -> Option<u64> {
        match *self {
            Value::Int(n) => Some(n),
            Value::Str(_) => None,
        }
    }

    /// Returns the string payload, if this value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match *self {
            Value::Int(_) => None,
            Value::Str(ref s) => Some(s),
        }
    }

    /// The character representation written into the binary value table:
    /// decimal digits for integers, the string itself otherwise.
    pub(crate) fn to_table_string(&self) -> String {
        match *self {
            Value::Int(n) => n.to_string(),
            Value::Str(ref s) => s.clone(),
        }
    }

    /// The inverse of [`Value::to_table_string`]: a non-empty all-ASCII-digit
    /// string that fits in a `u64` decodes as an integer, anything else as a
    /// string.
    pub(crate) fn from_table_string(s: String) -> Value {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(n) = s.parse::<u64>() {
                return Value::Int(n);
            }
        }
        Value::Str(s)
    }

}

impl From<u64> for Value {
    fn from(n: u64) -> Value {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(ref s) => write!(f, "{}", s),
        }
    }
}

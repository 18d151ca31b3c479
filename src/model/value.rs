// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Dynamic values stored in subject fields and interaction slots

use rust_decimal::Decimal;
use serde_json::Value as JsonValue;
use std::fmt;

use super::subject::Subject;

/// Value passed to and returned from role and data operations
///
/// Plain data is held by value. `Object` holds a subject handle, so a value
/// copied out of a slot still refers to the same live subject.
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Boolean value
    Boolean(bool),

    /// Integer value (64-bit signed)
    Integer(i64),

    /// Decimal value with arbitrary precision
    Decimal(Decimal),

    /// String value
    String(String),

    /// Ordered collection of values
    Collection(Vec<Value>),

    /// A role-capable subject
    Object(Subject),

    /// No value
    #[default]
    Empty,
}

impl Value {
    /// Get the type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "Boolean",
            Self::Integer(_) => "Integer",
            Self::Decimal(_) => "Decimal",
            Self::String(_) => "String",
            Self::Collection(_) => "Collection",
            Self::Object(_) => "Object",
            Self::Empty => "Empty",
        }
    }

    /// Check if this is the empty value
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Try to convert to an integer
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Try to convert to a decimal; integers widen losslessly
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Self::Decimal(d) => Some(*d),
            Self::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    /// Try to convert to a string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Try to convert to a boolean
    pub fn as_boolean(&self) -> Option<bool> {
        match self {
            Self::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Borrow the subject if this value holds one
    pub fn as_subject(&self) -> Option<&Subject> {
        match self {
            Self::Object(subject) => Some(subject),
            _ => None,
        }
    }

    /// Take the subject out of this value
    pub fn into_subject(self) -> Option<Subject> {
        match self {
            Self::Object(subject) => Some(subject),
            _ => None,
        }
    }

    /// Check whether two values refer to the same subject
    pub fn same_subject(&self, other: &Value) -> bool {
        match (self, other) {
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Subjects compare by identity, everything else structurally
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            (Self::Decimal(a), Self::Decimal(b)) => a == b,
            (Self::Integer(a), Self::Decimal(b)) | (Self::Decimal(b), Self::Integer(a)) => {
                Decimal::from(*a) == *b
            }
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Collection(a), Self::Collection(b)) => a == b,
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Empty, Self::Empty) => true,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<Decimal> for Value {
    fn from(value: Decimal) -> Self {
        Self::Decimal(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(values: Vec<Value>) -> Self {
        Self::Collection(values)
    }
}

impl From<Subject> for Value {
    fn from(subject: Subject) -> Self {
        Self::Object(subject)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}

/// Convert from serde_json::Value
///
/// JSON objects become collections of their values; use
/// [`DataType::instantiate_json`](super::DataType::instantiate_json) to turn
/// an object into subject fields instead.
impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Empty,
            JsonValue::Bool(b) => Self::Boolean(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integer(i)
                } else if let Some(d) = n.as_f64().and_then(|f| Decimal::try_from(f).ok()) {
                    Self::Decimal(d)
                } else {
                    Self::String(n.to_string())
                }
            }
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => {
                Self::Collection(items.into_iter().map(Value::from).collect())
            }
            JsonValue::Object(map) => {
                Self::Collection(map.into_iter().map(|(_, v)| Value::from(v)).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "{s}"),
            Self::Collection(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Self::Object(subject) => write!(f, "<{}>", subject.type_name()),
            Self::Empty => write!(f, "{{}}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::prelude::FromPrimitive;
    use serde_json::json;

    #[test]
    fn json_numbers_become_integers_or_decimals() {
        assert_eq!(Value::from(json!(42)), Value::Integer(42));
        assert_eq!(
            Value::from(json!(1.5)),
            Value::Decimal(Decimal::from_f64(1.5).unwrap())
        );
        assert_eq!(Value::from(json!(null)), Value::Empty);
    }

    #[test]
    fn integer_and_decimal_compare_numerically() {
        assert_eq!(Value::Integer(3), Value::Decimal(Decimal::from(3)));
        assert_ne!(Value::Integer(3), Value::String("3".into()));
    }

    #[test]
    fn display_collections() {
        let value = Value::from(vec![Value::from(1), Value::from("a"), Value::Empty]);
        assert_eq!(value.to_string(), "[1, a, {}]");
    }

    #[test]
    fn option_conversion() {
        assert_eq!(Value::from(None::<i64>), Value::Empty);
        assert_eq!(Value::from(Some(true)), Value::Boolean(true));
    }
}

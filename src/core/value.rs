use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{CqlMapError, Result};

/// Dynamic column value exchanged between typed records and the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Null,
    Int(i32),
    Bigint(i64),
    Double(f64),
    Text(String),
    Boolean(bool),
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    List(Vec<Value>),
    /// Insertion-ordered, duplicate-free.
    Set(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Complex value, encoded to text by the object codec at bind time.
    Object(serde_json::Value),
    /// Components of a compound primary key, partition components first.
    Tuple(Vec<Value>),
}

impl Value {
    pub fn compare(&self, other: &Value) -> Result<Ordering> {
        match (self, other) {
            // NULL sorts last
            (Value::Null, Value::Null) => Ok(Ordering::Equal),
            (Value::Null, _) => Ok(Ordering::Greater),
            (_, Value::Null) => Ok(Ordering::Less),

            (Value::Int(a), Value::Int(b)) => Ok(a.cmp(b)),
            (Value::Bigint(a), Value::Bigint(b)) => Ok(a.cmp(b)),
            (Value::Int(a), Value::Bigint(b)) => Ok(i64::from(*a).cmp(b)),
            (Value::Bigint(a), Value::Int(b)) => Ok(a.cmp(&i64::from(*b))),

            (Value::Double(a), Value::Double(b)) => match (a.is_nan(), b.is_nan()) {
                (true, true) => Ok(Ordering::Equal),
                (true, false) => Ok(Ordering::Greater),
                (false, true) => Ok(Ordering::Less),
                (false, false) => Ok(a.partial_cmp(b).unwrap_or(Ordering::Equal)),
            },

            (Value::Text(a), Value::Text(b)) => Ok(a.cmp(b)),
            (Value::Boolean(a), Value::Boolean(b)) => Ok(a.cmp(b)),
            (Value::Uuid(a), Value::Uuid(b)) => Ok(a.cmp(b)),
            (Value::Timestamp(a), Value::Timestamp(b)) => Ok(a.cmp(b)),

            (Value::Tuple(a), Value::Tuple(b)) => {
                for (left, right) in a.iter().zip(b.iter()) {
                    let ordering = left.compare(right)?;
                    if ordering != Ordering::Equal {
                        return Ok(ordering);
                    }
                }
                Ok(a.len().cmp(&b.len()))
            }

            _ => Err(CqlMapError::TypeMismatch(format!(
                "Cannot compare incompatible types: {} and {}",
                self.type_name(),
                other.type_name()
            ))),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "NULL",
            Self::Int(_) => "INT",
            Self::Bigint(_) => "BIGINT",
            Self::Double(_) => "DOUBLE",
            Self::Text(_) => "TEXT",
            Self::Boolean(_) => "BOOLEAN",
            Self::Uuid(_) => "UUID",
            Self::Timestamp(_) => "TIMESTAMP",
            Self::List(_) => "LIST",
            Self::Set(_) => "SET",
            Self::Map(_) => "MAP",
            Self::Object(_) => "OBJECT",
            Self::Tuple(_) => "TUPLE",
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Bigint(i) => Some(*i),
            Self::Int(i) => Some(i64::from(*i)),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Plain JSON rendering, used to serialize primary keys into counter rows.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;
        match self {
            Self::Null => Json::Null,
            Self::Int(i) => Json::from(*i),
            Self::Bigint(i) => Json::from(*i),
            Self::Double(d) => serde_json::Number::from_f64(*d)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Self::Text(s) => Json::String(s.clone()),
            Self::Boolean(b) => Json::Bool(*b),
            Self::Uuid(u) => Json::String(u.to_string()),
            Self::Timestamp(t) => Json::String(t.to_rfc3339()),
            Self::List(items) | Self::Set(items) | Self::Tuple(items) => {
                Json::Array(items.iter().map(Value::to_json).collect())
            }
            Self::Map(entries) => Json::Array(
                entries
                    .iter()
                    .map(|(key, value)| Json::Array(vec![key.to_json(), value.to_json()]))
                    .collect(),
            ),
            Self::Object(json) => json.clone(),
        }
    }

    /// Splits a key value into its components; a simple key is one component.
    pub fn key_components(&self) -> Vec<Value> {
        match self {
            Self::Tuple(components) => components.clone(),
            other => vec![other.clone()],
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Bigint(a), Self::Bigint(b)) => a == b,
            (Self::Int(a), Self::Bigint(b)) | (Self::Bigint(b), Self::Int(a)) => {
                i64::from(*a) == *b
            }
            (Self::Double(a), Self::Double(b)) => {
                if a.is_nan() && b.is_nan() {
                    return true;
                }
                (a - b).abs() < f64::EPSILON
            }
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::Timestamp(a), Self::Timestamp(b)) => a == b,
            (Self::List(a), Self::List(b)) | (Self::Tuple(a), Self::Tuple(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => {
                a.len() == b.len() && a.iter().all(|value| b.contains(value))
            }
            (Self::Map(a), Self::Map(b)) => {
                a.len() == b.len()
                    && a.iter().all(|(key, value)| {
                        b.iter().any(|(other_key, other_value)| {
                            key == other_key && value == other_value
                        })
                    })
            }
            (Self::Object(a), Self::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Int(i) => write!(f, "{}", i),
            Self::Bigint(i) => write!(f, "{}", i),
            Self::Double(d) => write!(f, "{}", d),
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Self::Boolean(b) => write!(f, "{}", b),
            Self::Uuid(u) => write!(f, "{}", u),
            Self::Timestamp(t) => write!(f, "'{}'", t.to_rfc3339()),
            Self::List(items) => write!(f, "[{}]", join(items)),
            Self::Set(items) => write!(f, "{{{}}}", join(items)),
            Self::Map(entries) => {
                let rendered = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key, value))
                    .collect::<Vec<_>>();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Self::Object(json) => write!(f, "'{}'", json),
            Self::Tuple(items) => write!(f, "({})", join(items)),
        }
    }
}

fn join(values: &[Value]) -> String {
    values
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Bigint(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Double(f)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Boolean(b)
    }
}

impl From<Uuid> for Value {
    fn from(u: Uuid) -> Self {
        Self::Uuid(u)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(t: DateTime<Utc>) -> Self {
        Self::Timestamp(t)
    }
}

/// Declared type of a mapped field, independent of its structural kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Int,
    Bigint,
    Double,
    Text,
    Boolean,
    Uuid,
    Timestamp,
    Counter,
    /// Complex value stored through the object codec; carries the Rust type name.
    Object(&'static str),
    /// Compound primary key; carries the Rust type name.
    Compound(&'static str),
}

impl ValueType {
    pub fn is_compatible(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (Self::Int, Value::Int(_)) => true,
            (Self::Bigint | Self::Counter, Value::Bigint(_) | Value::Int(_)) => true,
            (Self::Double, Value::Double(_)) => true,
            (Self::Text, Value::Text(_)) => true,
            (Self::Boolean, Value::Boolean(_)) => true,
            (Self::Uuid, Value::Uuid(_)) => true,
            (Self::Timestamp, Value::Timestamp(_)) => true,
            (Self::Object(_), Value::Object(_) | Value::Text(_)) => true,
            (Self::Compound(_), Value::Tuple(_)) => true,
            _ => false,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Bigint => write!(f, "bigint"),
            Self::Double => write!(f, "double"),
            Self::Text => write!(f, "text"),
            Self::Boolean => write!(f, "boolean"),
            Self::Uuid => write!(f, "uuid"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Counter => write!(f, "counter"),
            Self::Object(name) => write!(f, "text /* {} */", name),
            Self::Compound(name) => write!(f, "compound /* {} */", name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_equality() {
        assert_eq!(Value::Bigint(42), Value::Bigint(42));
        assert_eq!(Value::Int(7), Value::Bigint(7));
        assert_ne!(Value::Bigint(1), Value::Bigint(2));
        assert_eq!(
            Value::Set(vec![Value::from("a"), Value::from("b")]),
            Value::Set(vec![Value::from("b"), Value::from("a")])
        );
        assert_ne!(
            Value::List(vec![Value::from("a"), Value::from("b")]),
            Value::List(vec![Value::from("b"), Value::from("a")])
        );
    }

    #[test]
    fn test_tuple_ordering_is_lexicographic() {
        let low = Value::Tuple(vec![Value::Bigint(1), Value::from("a")]);
        let high = Value::Tuple(vec![Value::Bigint(1), Value::from("b")]);
        assert_eq!(low.compare(&high).unwrap(), Ordering::Less);
        assert_eq!(high.compare(&low).unwrap(), Ordering::Greater);
    }

    #[test]
    fn test_incompatible_compare_fails() {
        assert!(Value::from("a").compare(&Value::Bigint(1)).is_err());
    }

    #[test]
    fn test_key_to_json() {
        let key = Value::Tuple(vec![Value::Bigint(10), Value::from("name")]);
        assert_eq!(key.to_json().to_string(), r#"[10,"name"]"#);
        assert_eq!(Value::Bigint(7).to_json().to_string(), "7");
    }

    #[test]
    fn test_type_compatibility() {
        assert!(ValueType::Bigint.is_compatible(&Value::Bigint(42)));
        assert!(ValueType::Bigint.is_compatible(&Value::Null));
        assert!(!ValueType::Bigint.is_compatible(&Value::from("hello")));
    }
}
